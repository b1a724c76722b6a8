/// A trait for reporting progress of long-running operations.
pub trait Progress: Send + Sync {
    /// Set the phase label for the current operation (e.g., "Listing", "Enriching").
    fn set_phase(&self, phase: &str);

    /// Announce how many steps the current phase has.
    fn set_total(&self, total: u64);

    /// Record that one more step of the current phase has finished.
    fn advance(&self, message: &str);

    /// Finish and clear the progress indicator.
    fn done(&self);
}

/// Progress sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn set_phase(&self, _phase: &str) {}
    fn set_total(&self, _total: u64) {}
    fn advance(&self, _message: &str) {}
    fn done(&self) {}
}
