use std::path::PathBuf;

/// Outcome of one source directory within a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Scanned,
    /// Path missing, not a directory, or unreadable.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    /// 1-based position in `source_paths`.
    pub index: usize,
    pub path: PathBuf,
    pub status: SourceStatus,
    pub eligible: u64,
    pub moved: u64,
    pub skipped_young: u64,
    pub collisions: u64,
    pub failed: u64,
}

impl SourceSummary {
    pub(crate) fn new(index: usize, path: PathBuf, status: SourceStatus) -> Self {
        Self {
            index,
            path,
            status,
            eligible: 0,
            moved: 0,
            skipped_young: 0,
            collisions: 0,
            failed: 0,
        }
    }
}

/// Counters for a single migration cycle. Built fresh each cycle, never persisted.
///
/// `total_eligible == total_moved + total_collisions + total_failed` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleResult {
    pub total_eligible: u64,
    pub total_moved: u64,
    pub total_skipped_young: u64,
    pub total_collisions: u64,
    pub total_failed: u64,
    pub sources: Vec<SourceSummary>,
}

impl CycleResult {
    pub(crate) fn absorb(&mut self, summary: SourceSummary) {
        self.total_eligible += summary.eligible;
        self.total_moved += summary.moved;
        self.total_skipped_young += summary.skipped_young;
        self.total_collisions += summary.collisions;
        self.total_failed += summary.failed;
        self.sources.push(summary);
    }

    pub fn skipped_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| s.status == SourceStatus::Skipped)
            .count()
    }
}
