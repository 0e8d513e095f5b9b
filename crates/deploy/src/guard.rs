//! Per-session save state: the in-flight flag and the open container.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Incremental-save state of one session.
///
/// Only the incremental workflow mutates it, through a [`SaveTicket`];
/// everyone else gets read-only queries.
#[derive(Debug, Default)]
pub struct SaveState {
    in_flight: AtomicBool,
    container_id: Mutex<Option<String>>,
}

impl SaveState {
    /// True while an incremental save is running.
    pub fn is_saving(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Id of the container the running save holds open.
    pub fn open_container(&self) -> Option<String> {
        self.container_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Claims the session for one save, or `None` if a save is running.
    pub(crate) fn try_begin(&self) -> Option<SaveTicket<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SaveTicket { state: self })
    }
}

/// Exclusive right to run one incremental save.
///
/// Dropping the ticket clears the in-flight flag on every exit path.
pub(crate) struct SaveTicket<'a> {
    state: &'a SaveState,
}

impl SaveTicket<'_> {
    /// Remembers the container this save created.
    pub(crate) fn record_container(&self, id: String) {
        *self.slot() = Some(id);
    }

    /// Forgets the open container and returns it for teardown.
    pub(crate) fn take_container(&self) -> Option<String> {
        self.slot().take()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.state
            .container_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SaveTicket<'_> {
    fn drop(&mut self) {
        self.state.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_ticket_refused_while_held() {
        let state = SaveState::default();
        let ticket = state.try_begin().unwrap();
        assert!(state.is_saving());
        assert!(state.try_begin().is_none());

        drop(ticket);
        assert!(!state.is_saving());
        assert!(state.try_begin().is_some());
    }

    #[test]
    fn container_slot() {
        let state = SaveState::default();
        let ticket = state.try_begin().unwrap();
        ticket.record_container("1dc1".into());
        assert_eq!(state.open_container().as_deref(), Some("1dc1"));

        assert_eq!(ticket.take_container().as_deref(), Some("1dc1"));
        assert!(state.open_container().is_none());
        assert!(ticket.take_container().is_none());
    }

    #[test]
    fn flag_cleared_on_unwind() {
        let state = SaveState::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ticket = state.try_begin().unwrap();
            panic!("save blew up");
        }));
        assert!(result.is_err());
        assert!(!state.is_saving());
    }
}
