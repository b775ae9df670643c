//! Gate that holds state renders back while the manifest loads.
//!
//! The gate moves one way: `Idle` until `init` starts, `Loading` while the
//! manifest fetch is in flight, and `Drained` once the waiting operations have
//! been handed back for replay. Operations admitted during `Loading` are kept
//! in arrival order.

use crate::core::{HandlebarError, Result};

#[derive(Debug)]
enum GateState<T> {
    Idle,
    Loading(Vec<T>),
    Drained,
}

/// Outcome of offering an operation to the gate.
#[derive(Debug)]
pub enum Admission<T> {
    /// The manifest is loading; the operation was queued
    Deferred,
    /// The manifest has been processed; run the operation now
    Ready(T),
    /// `init` has not been called; the operation is handed back
    Uninitialized(T),
}

/// FIFO queue of operations waiting on the manifest.
#[derive(Debug)]
pub struct PendingQueue<T> {
    state: GateState<T>,
}

impl<T> Default for PendingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PendingQueue<T> {
    /// Create an idle gate
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: GateState::Idle,
        }
    }

    /// Start holding operations back.
    ///
    /// # Errors
    ///
    /// Returns [`HandlebarError::AlreadyInitialized`] unless the gate is idle.
    pub fn begin_loading(&mut self) -> Result<()> {
        match self.state {
            GateState::Idle => {
                self.state = GateState::Loading(Vec::new());
                Ok(())
            }
            _ => Err(HandlebarError::AlreadyInitialized),
        }
    }

    /// Offer an operation to the gate
    pub fn admit(&mut self, op: T) -> Admission<T> {
        match &mut self.state {
            GateState::Idle => Admission::Uninitialized(op),
            GateState::Loading(waiting) => {
                waiting.push(op);
                Admission::Deferred
            }
            GateState::Drained => Admission::Ready(op),
        }
    }

    /// Open the gate for good, returning everything queued in arrival order.
    ///
    /// Draining an idle or already drained gate returns nothing.
    pub fn drain(&mut self) -> Vec<T> {
        match std::mem::replace(&mut self.state, GateState::Drained) {
            GateState::Loading(waiting) => waiting,
            GateState::Idle | GateState::Drained => Vec::new(),
        }
    }

    /// Number of queued operations
    #[cfg(test)]
    pub(crate) fn waiting(&self) -> usize {
        match &self.state {
            GateState::Loading(waiting) => waiting.len(),
            _ => 0,
        }
    }

    /// Whether the manifest load is in flight
    #[cfg(test)]
    pub(crate) fn is_loading(&self) -> bool {
        matches!(self.state, GateState::Loading(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_gate_hands_operations_back() {
        let mut queue = PendingQueue::new();
        assert!(matches!(queue.admit(1), Admission::Uninitialized(1)));
    }

    #[test]
    fn test_loading_queues_in_order_then_drains_once() {
        let mut queue = PendingQueue::new();
        queue.begin_loading().unwrap();
        assert!(queue.is_loading());
        for op in ["a", "b", "c"] {
            assert!(matches!(queue.admit(op), Admission::Deferred));
        }
        assert_eq!(queue.waiting(), 3);

        assert_eq!(queue.drain(), vec!["a", "b", "c"]);
        assert!(queue.drain().is_empty());
        assert!(matches!(queue.admit("d"), Admission::Ready("d")));
    }

    #[test]
    fn test_begin_loading_only_once() {
        let mut queue: PendingQueue<()> = PendingQueue::new();
        queue.begin_loading().unwrap();
        assert_eq!(queue.begin_loading(), Err(HandlebarError::AlreadyInitialized));
        queue.drain();
        assert_eq!(queue.begin_loading(), Err(HandlebarError::AlreadyInitialized));
    }
}
