use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::core::error::{CycleError, MoveError};
use crate::core::models::{CycleResult, SourceStatus, SourceSummary};
use crate::core::mover::{FsMover, MoveMethod, MoveOptions, Mover};
use crate::core::reporter::{Event, Reporter};

const SECS_PER_HOUR: f64 = 3600.0;

/// Runs migration cycles: drains aged files from every source into the destination.
///
/// Age is measured per file against the clock at the moment that file is
/// inspected, so a file that crosses the threshold mid-scan is eligible.
pub struct MigrationEngine {
    reporter: Reporter,
    mover: Arc<dyn Mover>,
}

impl MigrationEngine {
    pub fn new(reporter: Reporter) -> Self {
        Self {
            reporter,
            mover: Arc::new(FsMover),
        }
    }

    pub fn with_mover(mut self, mover: Arc<dyn Mover>) -> Self {
        self.mover = mover;
        self
    }

    /// Execute one cycle against a configuration snapshot.
    ///
    /// Only a destination that cannot be created is fatal. Bad sources and
    /// failed moves are reported and the cycle carries on.
    pub async fn run_cycle(&self, config: &AppConfig) -> Result<CycleResult, CycleError> {
        let destination = config.destination_path.as_path();
        if destination.as_os_str().is_empty() {
            return Err(CycleError::NoDestination);
        }

        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|source| CycleError::Destination {
                path: destination.to_path_buf(),
                source,
            })?;

        let span = info_span!(
            "migration_cycle",
            cycle_id = %Uuid::now_v7(),
            destination = %destination.display()
        );

        async {
            self.reporter
                .emit(Event::notice(format!(
                    "Starting migration cycle (only files older than {} hours)...",
                    config.minimum_age_hours
                )))
                .await;

            let options = MoveOptions {
                cross_device_copy: config.cross_device_copy,
            };
            let mut result = CycleResult::default();

            for (i, source) in config.source_paths.iter().enumerate() {
                let summary = self
                    .process_source(i + 1, source, destination, config.minimum_age_hours, options)
                    .await;
                result.absorb(summary);
            }

            if result.total_moved > 0 || result.total_eligible > 0 {
                self.reporter
                    .emit(Event::notice(format!(
                        "Migration complete: {} of {} files moved to {}",
                        result.total_moved,
                        result.total_eligible,
                        destination.display()
                    )))
                    .await;
            } else {
                self.reporter
                    .emit(Event::detail("No files moved this cycle"))
                    .await;
            }

            Ok(result)
        }
        .instrument(span)
        .await
    }

    async fn process_source(
        &self,
        index: usize,
        source: &Path,
        destination: &Path,
        minimum_age_hours: f64,
        options: MoveOptions,
    ) -> SourceSummary {
        let files = match list_files(source).await {
            Some(files) => files,
            None => {
                self.reporter
                    .emit(Event::warning(format!(
                        "Skipping source {}: not a directory ({})",
                        index,
                        source.display()
                    )))
                    .await;
                return SourceSummary::new(index, source.to_path_buf(), SourceStatus::Skipped);
            }
        };

        let mut summary = SourceSummary::new(index, source.to_path_buf(), SourceStatus::Scanned);

        for path in files {
            let Some(name) = path.file_name() else {
                continue;
            };
            let name = name.to_os_string();
            let display_name = name.to_string_lossy();

            let age_hours = match file_age_hours(&path).await {
                Ok(age) => age,
                Err(e) => {
                    // Vanished or unreadable between listing and inspection.
                    self.reporter
                        .emit(Event::warning(format!(
                            "  Failed to inspect {}: {}",
                            display_name, e
                        )))
                        .await;
                    continue;
                }
            };

            if age_hours < minimum_age_hours {
                self.reporter
                    .emit(Event::detail(format!(
                        "  Skipping {}: too recent (age: {:.1} hours)",
                        display_name, age_hours
                    )))
                    .await;
                summary.skipped_young += 1;
                continue;
            }

            summary.eligible += 1;

            let target = destination.join(&name);
            match self.mover.relocate(&path, &target, options).await {
                Ok(method) => {
                    let copied = method == MoveMethod::Copied;
                    debug!(file = %display_name, copied, "File relocated");
                    self.reporter
                        .emit(Event::detail(format!("  Moved: {}", display_name)))
                        .await;
                    summary.moved += 1;
                }
                Err(MoveError::DestinationExists) => {
                    self.reporter
                        .emit(Event::detail(format!(
                            "  Skipping {}: already exists in destination",
                            display_name
                        )))
                        .await;
                    summary.collisions += 1;
                }
                Err(e) => {
                    self.reporter
                        .emit(Event::failure(format!(
                            "  Failed to move {}: {}",
                            display_name, e
                        )))
                        .await;
                    summary.failed += 1;
                }
            }
        }

        if summary.eligible > 0 {
            self.reporter
                .emit(
                    Event::notice(format!(
                        "Source {}: {} of {} files moved from {}",
                        index,
                        summary.moved,
                        summary.eligible,
                        source.display()
                    ))
                    .important(summary.moved > 0),
                )
                .await;
        }

        summary
    }
}

/// Regular files directly inside `dir`, sorted by name. `None` if `dir` can't be listed.
async fn list_files(dir: &Path) -> Option<Vec<PathBuf>> {
    if !tokio::fs::metadata(dir).await.ok()?.is_dir() {
        return None;
    }

    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut files = Vec::new();

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                // file_type() does not follow symlinks; links and subdirectories are left alone.
                match entry.file_type().await {
                    Ok(ft) if ft.is_file() => files.push(entry.path()),
                    Ok(_) => {}
                    Err(e) => {
                        debug!(path = %entry.path().display(), error = %e, "Skipping unreadable entry");
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "Stopped listing directory early");
                break;
            }
        }
    }

    files.sort();
    Some(files)
}

async fn file_age_hours(path: &Path) -> std::io::Result<f64> {
    let modified = tokio::fs::symlink_metadata(path).await?.modified()?;
    Ok(age_hours(modified, SystemTime::now()))
}

/// Hours elapsed since `modified`. Timestamps in the future count as age zero.
pub fn age_hours(modified: SystemTime, now: SystemTime) -> f64 {
    now.duration_since(modified)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
        / SECS_PER_HOUR
}
