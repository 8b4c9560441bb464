//! Single-writer guard for the terminal transition of a run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Lets exactly one of success, cancel or error hand-off proceed.
///
/// Clones share the same flag. Ticking components poll [`is_terminal`]
/// before mutating anything; terminal paths race on [`try_enter_terminal`].
///
/// [`is_terminal`]: CancellationGate::is_terminal
/// [`try_enter_terminal`]: CancellationGate::try_enter_terminal
#[derive(Debug, Clone, Default)]
pub struct CancellationGate {
    terminal: Arc<AtomicBool>,
}

impl CancellationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the gate. Returns `true` for the first caller only.
    pub fn try_enter_terminal(&self) -> bool {
        self.terminal
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::Acquire)
    }
}
