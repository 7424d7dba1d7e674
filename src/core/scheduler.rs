//! Drives migration cycles on a fixed interval.
//!
//! State machine: `Configuring -> Running -> (Stopped | Failed)`. Cycles run
//! strictly one after another on the caller's task; the only suspension point
//! is the interval sleep, which races the cancellation token.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{AppConfig, ConfigProvider};
use crate::context::AppContext;
use crate::core::console::{BANNER, Console};
use crate::core::engine::MigrationEngine;
use crate::core::models::CycleResult;
use crate::core::reporter::{Event, Reporter};

/// Builds the reporter for each configuration snapshot.
pub type ReporterFactory = Box<dyn Fn(&AppConfig) -> Reporter + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Configuring,
    Running,
    Stopped,
    Failed,
}

pub struct Scheduler {
    provider: Box<dyn ConfigProvider>,
    console: Box<dyn Console>,
    reporter_for: ReporterFactory,
    ctx: AppContext,
    state: SchedulerState,
    last_clear: Instant,
}

impl Scheduler {
    pub fn new(
        provider: Box<dyn ConfigProvider>,
        console: Box<dyn Console>,
        config: AppConfig,
    ) -> Self {
        Self {
            provider,
            console,
            reporter_for: Box::new(Reporter::from_config),
            ctx: AppContext::new(config),
            state: SchedulerState::Configuring,
            last_clear: Instant::now(),
        }
    }

    /// Replace how reporters are built, for the current snapshot and every reload.
    pub fn with_reporter_factory(
        mut self,
        factory: impl Fn(&AppConfig) -> Reporter + Send + Sync + 'static,
    ) -> Self {
        let reporter = factory(self.config());
        self.ctx = AppContext::with_reporter((*self.ctx.config).clone(), reporter);
        self.reporter_for = Box::new(factory);
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn config(&self) -> &AppConfig {
        &self.ctx.config
    }

    /// Run a single cycle with the current snapshot, without scheduling.
    pub async fn run_once(&self) -> Result<CycleResult> {
        let engine = MigrationEngine::new(self.ctx.reporter.clone());
        Ok(engine.run_cycle(&self.ctx.config).await?)
    }

    /// Loop until `cancel` fires (Ok) or a cycle fails fatally (Err).
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        self.state = SchedulerState::Running;
        self.last_clear = Instant::now();
        self.announce().await;

        match self.run_loop(&cancel).await {
            Ok(()) => {
                self.state = SchedulerState::Stopped;
                self.ctx
                    .reporter
                    .emit(Event::notice("Stopped by user."))
                    .await;
                Ok(())
            }
            Err(e) => {
                self.state = SchedulerState::Failed;
                self.ctx
                    .reporter
                    .emit(Event::failure(format!("Error during execution: {:#}", e)))
                    .await;
                Err(e)
            }
        }
    }

    async fn run_loop(&mut self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            self.clear_console_if_due().await;

            self.run_once().await?;

            let interval = run_interval(&self.ctx.config);
            let next_run = chrono::Duration::from_std(interval)
                .ok()
                .and_then(|d| chrono::Local::now().checked_add_signed(d));
            let message = match next_run {
                Some(at) => format!("Next run: {}", at.format("%H:%M:%S")),
                None => "Next run: not in the foreseeable future".to_string(),
            };
            self.ctx.reporter.emit(Event::detail(message)).await;

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(interval) => {}
            }

            self.reload()?;
        }
    }

    async fn announce(&self) {
        let config = &self.ctx.config;
        let notifications = if self.ctx.reporter.has_notifier() {
            "enabled"
        } else {
            "disabled"
        };

        self.ctx
            .reporter
            .emit(Event::notice(format!(
                "Running every {} minutes. Notifications: {}.",
                config.run_interval_minutes, notifications
            )))
            .await;

        if config.console_clear_interval_hours > 0.0 {
            self.ctx
                .reporter
                .emit(Event::detail(format!(
                    "Console is cleared every {} hours.",
                    config.console_clear_interval_hours
                )))
                .await;
        }

        self.ctx
            .reporter
            .emit(Event::detail("Press Ctrl+C to stop."))
            .await;
    }

    async fn clear_console_if_due(&mut self) {
        let hours = self.ctx.config.console_clear_interval_hours;
        if hours <= 0.0 {
            return;
        }

        if self.last_clear.elapsed() < saturating_secs(hours * 3600.0) {
            return;
        }

        self.console.clear();
        self.last_clear = Instant::now();
        self.ctx.reporter.emit(Event::detail("Console cleared")).await;
        self.ctx.reporter.emit(Event::detail(BANNER)).await;
    }

    /// Swap in a fresh snapshot so external edits apply to the next cycle.
    fn reload(&mut self) -> Result<()> {
        let config = self
            .provider
            .load()
            .context("Failed to reload configuration")?;
        debug!(
            run_interval_minutes = config.run_interval_minutes,
            console_clear_interval_hours = config.console_clear_interval_hours,
            "Configuration reloaded"
        );
        let reporter = (self.reporter_for)(&config);
        self.ctx = AppContext::with_reporter(config, reporter);
        Ok(())
    }
}

fn run_interval(config: &AppConfig) -> Duration {
    saturating_secs(config.run_interval_minutes.max(1.0) * 60.0)
}

/// Seconds to a `Duration`, capped at `Duration::MAX` instead of panicking.
fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
