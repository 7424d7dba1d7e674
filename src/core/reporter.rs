//! Event reporting: every event goes to the console through tracing, important
//! ones are also forwarded to the configured notifier.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::core::notifications::{Notifier, create_notifier};
use crate::logging::TIMESTAMP_FORMAT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// A single log line produced by the engine or scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub severity: Severity,
    pub message: String,
    /// Important events fan out to the notifier.
    pub important: bool,
}

impl Event {
    /// Informational, forwarded to the notifier.
    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
            important: true,
        }
    }

    /// Informational, console only.
    pub fn detail(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
            important: false,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warn,
            message: message.into(),
            important: true,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            important: true,
        }
    }

    pub fn important(mut self, important: bool) -> Self {
        self.important = important;
        self
    }
}

#[derive(Clone, Default)]
pub struct Reporter {
    notifier: Option<Arc<dyn Notifier>>,
}

impl Reporter {
    pub fn new(notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self { notifier }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(create_notifier(config))
    }

    pub fn has_notifier(&self) -> bool {
        self.notifier.is_some()
    }

    pub async fn emit(&self, event: Event) {
        match event.severity {
            Severity::Info => info!(important = event.important, "{}", event.message),
            Severity::Warn => warn!(important = event.important, "{}", event.message),
            Severity::Error => error!(important = event.important, "{}", event.message),
        }

        if !event.important {
            return;
        }

        if let Some(notifier) = &self.notifier {
            let stamped = format!(
                "[{}] {}",
                chrono::Local::now().format(TIMESTAMP_FORMAT),
                event.message
            );
            if let Err(e) = notifier.send(&stamped).await {
                warn!(error = %e, "Failed to deliver notification");
            }
        }
    }
}
