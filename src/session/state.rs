//! Session lifecycle states

/// Lifecycle state of one session activation
///
/// Transitions are validated at entry: `prepare` only runs from `Created`,
/// the frame loop only starts from `Prepared`. The `detecting` flag is
/// independent of this state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Checked out and configured, processes not yet spawned
    Created,
    /// External processes spawned and pipes wired
    Prepared,
    /// Frame loop active
    Running,
    /// Cancellation observed, cleanup underway
    Stopping,
    /// All owned resources released, identity cleared, ready for reuse
    Reset,
}

impl SessionState {
    /// Whether this state counts as a live activation
    ///
    /// `Created` and `Prepared` count so that the health sweep cannot reap a
    /// session that is still being set up.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Created | Self::Prepared | Self::Running)
    }
}
