//! Single-slot rendezvous for request/response pairs the server does not
//! correlate (one outstanding invite at a time).

use std::time::Duration;

use tokio::sync::watch;

#[derive(Debug, Clone)]
enum SlotState<T> {
    Empty,
    Filled(T),
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome<T> {
    Filled(T),
    TimedOut,
    Closed,
}

#[derive(Debug)]
pub struct PendingSlot<T> {
    tx: watch::Sender<SlotState<T>>,
}

impl<T: Clone> Default for PendingSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> PendingSlot<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SlotState::Empty);
        Self { tx }
    }

    /// Discard any earlier result and return a waiter for the next one.
    ///
    /// A reply that arrived after its own waiter gave up is dropped here, so it
    /// can never be delivered to a later request.
    pub fn arm(&self) -> SlotWaiter<T> {
        let rx = self.tx.subscribe();
        self.tx.send_if_modified(|state| match state {
            SlotState::Closed => false,
            _ => {
                *state = SlotState::Empty;
                true
            }
        });
        SlotWaiter { rx }
    }

    /// Returns false once the slot is closed.
    pub fn fill(&self, value: T) -> bool {
        self.tx.send_if_modified(|state| match state {
            SlotState::Closed => false,
            _ => {
                *state = SlotState::Filled(value);
                true
            }
        })
    }

    /// Wake every waiter with [`SlotOutcome::Closed`]. Permanent.
    pub fn close(&self) {
        self.tx.send_replace(SlotState::Closed);
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.tx.borrow(), SlotState::Closed)
    }
}

#[derive(Debug)]
pub struct SlotWaiter<T> {
    rx: watch::Receiver<SlotState<T>>,
}

impl<T: Clone> SlotWaiter<T> {
    pub async fn wait(mut self, timeout: Duration) -> SlotOutcome<T> {
        let waited = tokio::time::timeout(
            timeout,
            self.rx.wait_for(|state| !matches!(state, SlotState::Empty)),
        )
        .await;
        match waited {
            Err(_) => SlotOutcome::TimedOut,
            Ok(Err(_)) => SlotOutcome::Closed,
            Ok(Ok(state)) => match &*state {
                SlotState::Filled(value) => SlotOutcome::Filled(value.clone()),
                SlotState::Closed | SlotState::Empty => SlotOutcome::Closed,
            },
        }
    }
}
