/// Counts from one scheduler pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Records found due
    pub due: usize,
    /// Records claimed and dispatched
    pub dispatched: usize,
    /// Records another pass claimed first
    pub skipped: usize,
    /// Records whose claim or enqueue failed
    pub failed: usize,
}
