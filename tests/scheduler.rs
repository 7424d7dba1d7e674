//! Scheduler loop tests.
//!
//! These run with a paused tokio clock, so interval sleeps resolve instantly
//! while `tokio::time::Instant` still advances by the slept amount.

use async_trait::async_trait;
use filetime::FileTime;
use rraid::config::{AppConfig, ConfigError, ConfigProvider};
use rraid::core::{Console, Notifier, Reporter, Scheduler, SchedulerState};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

/// Serves queued snapshots on each reload (repeating the last one) and
/// cancels the token once `cancel_after` reloads have happened.
struct ScriptedProvider {
    queue: Mutex<VecDeque<AppConfig>>,
    last: Mutex<AppConfig>,
    loads: Arc<AtomicUsize>,
    cancel_after: usize,
    cancel: CancellationToken,
    fail: bool,
}

impl ScriptedProvider {
    fn new(config: AppConfig, cancel_after: usize, cancel: CancellationToken) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            last: Mutex::new(config),
            loads: Arc::new(AtomicUsize::new(0)),
            cancel_after,
            cancel,
            fail: false,
        }
    }

    fn then(self, config: AppConfig) -> Self {
        self.queue.lock().unwrap().push_back(config);
        self
    }
}

impl ConfigProvider for ScriptedProvider {
    fn load(&self) -> Result<AppConfig, ConfigError> {
        let loads = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        if loads >= self.cancel_after {
            self.cancel.cancel();
        }
        if self.fail {
            return Err(ConfigError::Serialize("config store unavailable".into()));
        }

        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.queue.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }

    fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        *self.last.lock().unwrap() = config.clone();
        Ok(())
    }
}

#[derive(Clone, Default)]
struct CountingConsole {
    clears: Arc<AtomicUsize>,
}

impl Console for CountingConsole {
    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

fn create_aged_file(path: &Path, hours: f64) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"data").unwrap();
    let mtime = SystemTime::now() - Duration::from_secs_f64(hours * 3600.0);
    filetime::set_file_mtime(path, FileTime::from_system_time(mtime)).unwrap();
}

fn base_config(source: PathBuf, destination: PathBuf) -> AppConfig {
    AppConfig {
        source_paths: vec![source],
        destination_path: destination,
        minimum_age_hours: 12.0,
        run_interval_minutes: 10.0,
        console_clear_interval_hours: 0.0,
        ..AppConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_runs_until_cancelled_then_stops() {
    let temp = tempdir().unwrap();
    let source = temp.path().join("disk1");
    let dest = temp.path().join("pool");
    create_aged_file(&source.join("old.txt"), 24.0);

    let config = base_config(source.clone(), dest.clone());
    let cancel = CancellationToken::new();
    let provider = ScriptedProvider::new(config.clone(), 3, cancel.clone());
    let loads = provider.loads.clone();

    let mut scheduler = Scheduler::new(
        Box::new(provider),
        Box::new(CountingConsole::default()),
        config,
    );
    assert_eq!(scheduler.state(), SchedulerState::Configuring);

    scheduler.run(cancel).await.unwrap();

    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert_eq!(loads.load(Ordering::SeqCst), 3);
    assert!(dest.join("old.txt").exists());
    assert!(!source.join("old.txt").exists());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_start_runs_no_cycle() {
    let temp = tempdir().unwrap();
    let source = temp.path().join("disk1");
    let dest = temp.path().join("pool");
    create_aged_file(&source.join("old.txt"), 24.0);

    let config = base_config(source.clone(), dest.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut scheduler = Scheduler::new(
        Box::new(ScriptedProvider::new(config.clone(), usize::MAX, cancel.clone())),
        Box::new(CountingConsole::default()),
        config,
    );

    scheduler.run(cancel).await.unwrap();

    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert!(source.join("old.txt").exists());
}

#[tokio::test(start_paused = true)]
async fn test_reloaded_config_applies_to_next_cycle() {
    let temp = tempdir().unwrap();
    let source = temp.path().join("disk1");
    let first_dest = temp.path().join("pool-a");
    let second_dest = temp.path().join("pool-b");
    create_aged_file(&source.join("first.txt"), 24.0);

    let config = base_config(source.clone(), first_dest.clone());
    let edited = base_config(source.clone(), second_dest.clone());
    let cancel = CancellationToken::new();

    // Cancel on the second reload: cycles run with `config`, then `edited`.
    let provider = ScriptedProvider::new(config.clone(), 2, cancel.clone()).then(edited);

    let mut scheduler = Scheduler::new(
        Box::new(provider),
        Box::new(CountingConsole::default()),
        config,
    );

    // Drop a second file in once the first cycle has run.
    let source_for_task = source.clone();
    let dropper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5 * 60)).await;
        create_aged_file(&source_for_task.join("second.txt"), 24.0);
    });

    scheduler.run(cancel).await.unwrap();
    dropper.await.unwrap();

    assert!(first_dest.join("first.txt").exists());
    assert!(second_dest.join("second.txt").exists());
    assert_eq!(scheduler.config().destination_path, second_dest);
}

#[tokio::test(start_paused = true)]
async fn test_console_cleared_on_its_own_interval() {
    let temp = tempdir().unwrap();
    let config = AppConfig {
        // 27 minutes: due on the fourth iteration (t = 30 min).
        console_clear_interval_hours: 0.45,
        ..base_config(temp.path().join("disk1"), temp.path().join("pool"))
    };
    let cancel = CancellationToken::new();
    let console = CountingConsole::default();
    let clears = console.clears.clone();

    let mut scheduler = Scheduler::new(
        Box::new(ScriptedProvider::new(config.clone(), 4, cancel.clone())),
        Box::new(console),
        config,
    );

    scheduler.run(cancel).await.unwrap();

    assert_eq!(clears.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_clear_interval_never_clears() {
    let temp = tempdir().unwrap();
    let config = base_config(temp.path().join("disk1"), temp.path().join("pool"));
    let cancel = CancellationToken::new();
    let console = CountingConsole::default();
    let clears = console.clears.clone();

    let mut scheduler = Scheduler::new(
        Box::new(ScriptedProvider::new(config.clone(), 10, cancel.clone())),
        Box::new(console),
        config,
    );

    scheduler.run(cancel).await.unwrap();

    assert_eq!(clears.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reload_failure_moves_to_failed() {
    let temp = tempdir().unwrap();
    let config = base_config(temp.path().join("disk1"), temp.path().join("pool"));
    let cancel = CancellationToken::new();
    let mut provider = ScriptedProvider::new(config.clone(), usize::MAX, cancel.clone());
    provider.fail = true;

    let mut scheduler = Scheduler::new(
        Box::new(provider),
        Box::new(CountingConsole::default()),
        config,
    );

    let result = scheduler.run(cancel).await;

    assert!(result.is_err());
    assert_eq!(scheduler.state(), SchedulerState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_uncreatable_destination_moves_to_failed() {
    let temp = tempdir().unwrap();
    let blocker = temp.path().join("blocker");
    std::fs::write(&blocker, b"file").unwrap();

    let config = base_config(temp.path().join("disk1"), blocker.join("pool"));
    let cancel = CancellationToken::new();

    let mut scheduler = Scheduler::new(
        Box::new(ScriptedProvider::new(config.clone(), usize::MAX, cancel.clone())),
        Box::new(CountingConsole::default()),
        config,
    );

    let result = scheduler.run(cancel).await;

    assert!(result.is_err());
    assert!(format!("{:#}", result.unwrap_err()).contains("destination"));
    assert_eq!(scheduler.state(), SchedulerState::Failed);
}

#[tokio::test]
async fn test_run_once_executes_single_cycle() {
    let temp = tempdir().unwrap();
    let source = temp.path().join("disk1");
    let dest = temp.path().join("pool");
    create_aged_file(&source.join("a.txt"), 24.0);
    create_aged_file(&source.join("b.txt"), 2.0);

    let config = base_config(source, dest.clone());
    let cancel = CancellationToken::new();
    let provider = ScriptedProvider::new(config.clone(), usize::MAX, cancel);
    let loads = provider.loads.clone();

    let scheduler = Scheduler::new(
        Box::new(provider),
        Box::new(CountingConsole::default()),
        config,
    );

    let result = scheduler.run_once().await.unwrap();

    assert_eq!(result.total_moved, 1);
    assert_eq!(result.total_skipped_young, 1);
    assert_eq!(loads.load(Ordering::SeqCst), 0);
    assert!(dest.join("a.txt").exists());
}

#[tokio::test(start_paused = true)]
async fn test_reloaded_interval_sets_next_sleep() {
    let temp = tempdir().unwrap();
    let config = base_config(temp.path().join("disk1"), temp.path().join("pool"));
    let slower = AppConfig {
        run_interval_minutes: 60.0,
        ..config.clone()
    };
    let cancel = CancellationToken::new();

    // Sleeps: 10 minutes with `config`, then 60 with `slower`, then cancel.
    let provider = ScriptedProvider::new(config.clone(), 2, cancel.clone()).then(slower);

    let mut scheduler = Scheduler::new(
        Box::new(provider),
        Box::new(CountingConsole::default()),
        config,
    );

    let started = tokio::time::Instant::now();
    scheduler.run(cancel).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(70 * 60), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(71 * 60), "{elapsed:?}");
    assert_eq!(scheduler.config().run_interval_minutes, 60.0);
}

#[tokio::test(start_paused = true)]
async fn test_huge_intervals_do_not_panic() {
    let temp = tempdir().unwrap();
    let config = AppConfig {
        run_interval_minutes: 1e18,
        console_clear_interval_hours: 1e16,
        ..base_config(temp.path().join("disk1"), temp.path().join("pool"))
    };
    let cancel = CancellationToken::new();
    let console = CountingConsole::default();
    let clears = console.clears.clone();

    let mut scheduler = Scheduler::new(
        Box::new(ScriptedProvider::new(config.clone(), 1, cancel.clone())),
        Box::new(console),
        config,
    );

    scheduler.run(cancel).await.unwrap();

    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert_eq!(clears.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_lifecycle_messages_reach_the_notifier() {
    let temp = tempdir().unwrap();
    let source = temp.path().join("disk1");
    create_aged_file(&source.join("old.txt"), 24.0);

    let config = base_config(source, temp.path().join("pool"));
    let cancel = CancellationToken::new();
    let recording = Arc::new(RecordingNotifier::default());
    let sink = recording.clone();

    let mut scheduler = Scheduler::new(
        Box::new(ScriptedProvider::new(config.clone(), 1, cancel.clone())),
        Box::new(CountingConsole::default()),
        config,
    )
    .with_reporter_factory(move |_config: &AppConfig| {
        Reporter::new(Some(sink.clone() as Arc<dyn Notifier>))
    });

    scheduler.run(cancel).await.unwrap();

    let sent = recording.sent.lock().unwrap();
    assert!(sent.iter().any(|m| m.contains("Notifications: enabled.")));
    assert!(sent.iter().any(|m| m.contains("Source 1: 1 of 1 files moved")));
    assert!(sent.last().unwrap().ends_with("Stopped by user."));
    assert!(!sent.iter().any(|m| m.contains("Press Ctrl+C")));
    assert!(!sent.iter().any(|m| m.contains("Next run:")));
}
