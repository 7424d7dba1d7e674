mod discord;
mod slack;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{AppConfig, NotificationChannelType};

pub use discord::DiscordNotifier;
pub use slack::SlackNotifier;

/// Trait for notification sink implementations (Discord, Slack, etc.)
///
/// `Ok` means the sink accepted the message. Callers log failures and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Factory function to create a notifier based on config
pub fn create_notifier(config: &AppConfig) -> Option<Arc<dyn Notifier>> {
    let webhook = config.notification_target.as_ref()?;
    if webhook.trim().is_empty() {
        return None;
    }

    match config.notification_channel {
        NotificationChannelType::Discord => Some(Arc::new(DiscordNotifier::new(webhook.clone()))),
        NotificationChannelType::Slack => Some(Arc::new(SlackNotifier::new(webhook.clone()))),
    }
}

/// Turn a non-2xx webhook response into an error carrying status and body.
async fn check_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("webhook returned {}: {}", status, body)
}
