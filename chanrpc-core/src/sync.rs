//! Thin wrapper around the `triggered` crate providing a single named
//! trigger/listener pair. `triggered::Listener` is cloneable and implements
//! `Future`, so every clone independently observes the fire — exactly the
//! multi-waiter broadcast a channel's terminal close signal needs (every
//! blocked `wait_for_response` caller must unblock simultaneously, not just
//! the first one to poll).

pub use triggered::{Listener, Trigger};

#[derive(Debug, Clone)]
pub struct CloseSignal {
    trigger: Trigger,
    pub listener: Listener,
}

impl CloseSignal {
    pub fn new() -> CloseSignal {
        let (trigger, listener) = triggered::trigger();
        CloseSignal { trigger, listener }
    }

    /// Fires the signal. Idempotent: firing an already-fired trigger is a no-op.
    pub fn fire(&self) {
        self.trigger.trigger();
    }

    pub fn is_set(&self) -> bool {
        self.listener.is_triggered()
    }
}

impl Default for CloseSignal {
    fn default() -> Self {
        Self::new()
    }
}
