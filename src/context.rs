use crate::config::AppConfig;
use crate::core::Reporter;
use std::sync::Arc;

/// Configuration snapshot plus the reporter built from it.
///
/// Never mutated: a reload replaces the whole context.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub reporter: Reporter,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        let reporter = Reporter::from_config(&config);
        Self::with_reporter(config, reporter)
    }

    pub fn with_reporter(config: AppConfig, reporter: Reporter) -> Self {
        Self {
            config: Arc::new(config),
            reporter,
        }
    }
}
