pub mod console;
pub mod engine;
pub mod error;
pub mod models;
pub mod mover;
pub mod notifications;
pub mod reporter;
pub mod scheduler;

pub use console::{BANNER, Console, TerminalConsole};
pub use engine::MigrationEngine;
pub use error::{CycleError, MoveError};
pub use models::{CycleResult, SourceStatus, SourceSummary};
pub use mover::{FsMover, MoveMethod, MoveOptions, Mover};
pub use notifications::{Notifier, create_notifier};
pub use reporter::{Event, Reporter, Severity};
pub use scheduler::{ReporterFactory, Scheduler, SchedulerState};
