//! The per-pass "tree changed, scan again" signal.

use std::cell::Cell;

/// Set-only flag shared by every handler invocation within one pass.
///
/// Handlers can only raise it. The convergence driver creates a fresh flag
/// for each pass and checks it once the pass has completed.
#[derive(Debug, Default)]
pub struct DirtyFlag(Cell<bool>);

impl DirtyFlag {
    /// A clean flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the pass dirty. Cannot be undone for the rest of the pass.
    pub fn set_dirty(&self) {
        self.0.set(true);
    }

    pub fn is_dirty(&self) -> bool {
        self.0.get()
    }
}
