use std::io::{IsTerminal, stdin, stdout};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rraid::cli::Prompter;
use rraid::config::{
    AppConfig, ConfigOverrides, ConfigProvider, DEFAULT_CONFIG_PATH, FileConfigProvider,
    NotificationChannelType, validate_paths,
};
use rraid::core::{BANNER, Scheduler, TerminalConsole, create_notifier};
use rraid::logging::{self, LogConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "rraid")]
#[command(about = "Drain aged files from many source directories into one destination", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (.toml, .yml or .yaml)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[arg(long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run migration cycles until interrupted
    Run(RunArgs),
    /// Interactively edit the configuration
    Configure,
    /// Print the effective configuration and path warnings
    Check,
}

#[derive(Args)]
struct RunArgs {
    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Never prompt for missing paths
    #[arg(long)]
    no_prompt: bool,

    #[arg(long)]
    destination: Option<PathBuf>,

    #[arg(long)]
    min_age_hours: Option<f64>,

    #[arg(long)]
    interval_minutes: Option<f64>,

    #[arg(long)]
    clear_interval_hours: Option<f64>,

    #[arg(long)]
    notification_channel: Option<NotificationChannelType>,
}

impl RunArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            destination_path: self.destination.clone(),
            minimum_age_hours: self.min_age_hours,
            run_interval_minutes: self.interval_minutes,
            console_clear_interval_hours: self.clear_interval_hours,
            notification_channel: self.notification_channel,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(LogConfig {
        json: cli.json,
        verbose: cli.verbose,
    });

    match &cli.command {
        Commands::Run(args) => {
            let provider = FileConfigProvider::new(&cli.config).with_overrides(args.overrides());
            run(provider, args).await
        }
        Commands::Configure => configure(FileConfigProvider::new(&cli.config)).await,
        Commands::Check => check(FileConfigProvider::new(&cli.config)),
    }
}

async fn run(provider: FileConfigProvider, args: &RunArgs) -> Result<()> {
    println!("{}", BANNER);
    println!("{}\n", "=".repeat(BANNER.len()));

    let mut config = provider.load().context("Failed to load configuration")?;

    if config.has_missing_paths() && !args.no_prompt && stdin().is_terminal() {
        let completed = Prompter::new(stdin().lock(), stdout()).complete_missing(config.clone())?;
        if completed != config {
            provider
                .save_changes(&config, &completed)
                .context("Failed to save configuration")?;
            info!(path = %provider.path().display(), "Configuration updated");
        }
        config = completed;
    }

    let warnings = validate_paths(&config);
    for warning in &warnings {
        warn!("{}", warning);
    }
    if !warnings.is_empty() {
        warn!("Continuing despite warnings...");
    }

    let mut scheduler = Scheduler::new(Box::new(provider), Box::new(TerminalConsole), config);

    if args.once {
        let result = scheduler.run_once().await?;
        info!(
            moved = result.total_moved,
            eligible = result.total_eligible,
            skipped_young = result.total_skipped_young,
            "Single cycle finished"
        );
        return Ok(());
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    scheduler.run(cancel).await
}

async fn configure(provider: FileConfigProvider) -> Result<()> {
    let current = provider.load().context("Failed to load configuration")?;
    let updated = Prompter::new(stdin().lock(), stdout()).edit_all(current.clone())?;

    provider
        .save_changes(&current, &updated)
        .context("Failed to save configuration")?;
    println!("Configuration saved to {}", provider.path().display());

    if updated.notification_target.is_some()
        && updated.notification_target != current.notification_target
    {
        send_test_notification(&updated).await;
    }

    for warning in validate_paths(&updated) {
        println!("Warning: {}", warning);
    }

    Ok(())
}

async fn send_test_notification(config: &AppConfig) {
    let Some(notifier) = create_notifier(config) else {
        return;
    };

    match notifier
        .send("Test message from rraid. The webhook is set up correctly!")
        .await
    {
        Ok(()) => println!("Test message delivered."),
        Err(e) => println!("Warning: could not deliver a test message ({}). Check the webhook URL.", e),
    }
}

fn check(provider: FileConfigProvider) -> Result<()> {
    let config = provider.load().context("Failed to load configuration")?;

    println!("Config file:            {}", provider.path().display());
    for (i, source) in config.source_paths.iter().enumerate() {
        println!("Source {:<2}              {}", i + 1, source.display());
    }
    println!("Destination:            {}", config.destination_path.display());
    println!("Minimum age (hours):    {}", config.minimum_age_hours);
    println!("Run interval (minutes): {}", config.run_interval_minutes);
    println!("Console clear (hours):  {}", config.console_clear_interval_hours);
    println!(
        "Notifications:          {}",
        if config.notifications_enabled() {
            "enabled"
        } else {
            "disabled"
        }
    );

    let warnings = validate_paths(&config);
    if warnings.is_empty() {
        println!("\nAll paths look good.");
    } else {
        println!();
        for warning in warnings {
            println!("Warning: {}", warning);
        }
    }

    Ok(())
}
