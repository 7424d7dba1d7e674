//! Interactive completion and editing of the configuration.
//!
//! Every function takes a snapshot and returns a new one. Nothing here touches
//! the config file; callers persist the result through `ConfigProvider::save`.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;

use crate::config::AppConfig;

const MASKED_TARGET: &str = "********";

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Ask for every blank source slot and a blank destination.
    pub fn complete_missing(&mut self, mut config: AppConfig) -> Result<AppConfig> {
        if config.source_paths.is_empty() {
            config = self.ask_source_count(config)?;
        }

        for i in 0..config.source_paths.len() {
            if config.source_paths[i].as_os_str().is_empty() {
                let answer = self.ask(&format!("Path to source directory {}: ", i + 1))?;
                config.source_paths[i] = PathBuf::from(answer);
            }
        }

        if config.destination_path.as_os_str().is_empty() {
            let answer = self.ask("Path to destination directory: ")?;
            config.destination_path = PathBuf::from(answer);
        }

        Ok(config)
    }

    /// Walk through every setting, then fill in any blank paths.
    pub fn edit_all(&mut self, config: AppConfig) -> Result<AppConfig> {
        let config = self.ask_source_count(config)?;
        let config = self.ask_minimum_age(config)?;
        let config = self.ask_run_interval(config)?;
        let config = self.ask_clear_interval(config)?;
        let config = self.ask_notification_target(config)?;
        self.complete_missing(config)
    }

    fn ask_source_count(&mut self, mut config: AppConfig) -> Result<AppConfig> {
        let current = config.source_paths.len().max(1);
        let answer = self.ask(&format!("How many source directories? [{}]: ", current))?;

        let count = if answer.is_empty() {
            current
        } else {
            match answer.parse::<usize>() {
                Ok(0) => {
                    self.say("At least one source directory is required, using 1.")?;
                    1
                }
                Ok(n) => n,
                Err(_) => {
                    self.say("Invalid input, the number of sources is unchanged.")?;
                    current
                }
            }
        };

        config.source_paths.resize(count, PathBuf::new());
        Ok(config)
    }

    fn ask_minimum_age(&mut self, mut config: AppConfig) -> Result<AppConfig> {
        let question = format!(
            "Minimum file age in hours? [{}]: ",
            config.minimum_age_hours
        );
        if let Some(value) = self.ask_number(&question, "minimum age")? {
            config.minimum_age_hours = if value < 0.0 {
                self.say("Age cannot be negative, using 0.")?;
                0.0
            } else {
                value
            };
        }
        Ok(config)
    }

    fn ask_run_interval(&mut self, mut config: AppConfig) -> Result<AppConfig> {
        let question = format!(
            "Minutes between runs? [{}]: ",
            config.run_interval_minutes
        );
        if let Some(value) = self.ask_number(&question, "interval")? {
            config.run_interval_minutes = if value < 1.0 {
                self.say("The interval must be at least 1 minute, using 1.")?;
                1.0
            } else {
                value
            };
        }
        Ok(config)
    }

    fn ask_clear_interval(&mut self, mut config: AppConfig) -> Result<AppConfig> {
        let question = format!(
            "Hours between console clears? [{}]: ",
            config.console_clear_interval_hours
        );
        if let Some(value) = self.ask_number(&question, "console clear interval")? {
            config.console_clear_interval_hours = if value < 0.0 {
                self.say("The interval cannot be negative, using 0 (never clear).")?;
                0.0
            } else {
                value
            };
        }
        Ok(config)
    }

    fn ask_notification_target(&mut self, mut config: AppConfig) -> Result<AppConfig> {
        if config.notification_target.is_some() {
            let answer = self.ask(&format!(
                "Notification webhook URL? [{}] (Enter to keep, 'x' to clear): ",
                MASKED_TARGET
            ))?;
            if answer.eq_ignore_ascii_case("x") {
                config.notification_target = None;
                self.say("Notification webhook removed.")?;
            } else if !answer.is_empty() {
                config.notification_target = Some(answer);
                self.say("Notification webhook updated.")?;
            }
        } else {
            let answer = self.ask("Notification webhook URL? (leave empty to skip): ")?;
            if !answer.is_empty() {
                config.notification_target = Some(answer);
                self.say("Notification webhook set.")?;
            }
        }
        Ok(config)
    }

    /// `None` keeps the current value (empty or invalid input).
    fn ask_number(&mut self, question: &str, what: &str) -> Result<Option<f64>> {
        let answer = self.ask(question)?;
        if answer.is_empty() {
            return Ok(None);
        }

        match answer.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Some(value)),
            _ => {
                self.say(&format!("Invalid input, the {} is unchanged.", what))?;
                Ok(None)
            }
        }
    }

    /// Print a question and read one trimmed line. End of input reads as empty.
    fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;

        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }

    fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{}", message)?;
        Ok(())
    }
}
