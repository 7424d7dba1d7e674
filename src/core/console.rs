use std::io::stdout;

use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{Clear, ClearType},
};

/// Banner re-emitted after every console clear.
pub const BANNER: &str = "Reverse RAID 0 Simulator";

/// Terminal side effects driven by the scheduler.
pub trait Console: Send + Sync {
    /// Wipe the visible terminal. Failures are ignored.
    fn clear(&self);
}

pub struct TerminalConsole;

impl Console for TerminalConsole {
    fn clear(&self) {
        let _ = execute!(stdout(), Clear(ClearType::All), MoveTo(0, 0));
    }
}
