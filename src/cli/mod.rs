//! Command-line helpers for RRAID.

pub mod prompt;

pub use prompt::Prompter;
