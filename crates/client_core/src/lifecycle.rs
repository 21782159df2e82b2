//! Generation bookkeeping shared by the controllers.
//!
//! Every request records the generation it was issued under. A reset bumps the
//! generation and cancels the token handed to in-flight requests, so their
//! completions can be told apart from current ones and dropped.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub(crate) struct Lifecycle {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Debug, Clone)]
pub(crate) struct Ticket {
    pub generation: u64,
    pub cancel: CancellationToken,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            generation: 0,
            cancel: CancellationToken::new(),
        }
    }

    pub fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation,
            cancel: self.cancel.clone(),
        }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.generation == ticket.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancels everything issued so far and opens a new generation.
    pub fn invalidate(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.generation = self.generation.wrapping_add(1);
    }
}

/// State locks are never held across an await, so a poisoned lock only means
/// a panic happened mid-mutation in another task; the data is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidate_cancels_outstanding_tickets_only() {
        let mut lifecycle = Lifecycle::new();
        let stale = lifecycle.ticket();
        lifecycle.invalidate();
        let fresh = lifecycle.ticket();

        assert!(stale.cancel.is_cancelled());
        assert!(!lifecycle.is_current(&stale));
        assert!(!fresh.cancel.is_cancelled());
        assert!(lifecycle.is_current(&fresh));
        assert_eq!(lifecycle.generation(), 1);
    }
}
