//! Concurrent-game admission.
//!
//! Two counters:
//! - active slots, a semaphore of `max` permits held by running games
//! - in-flight starts, the games a batch loop launched and still waits on;
//!   reaching zero is the drain barrier
//!
//! An in-flight start is first a bare reservation, then bound to the room tag
//! the server handed out. Only bound tags leave the count when their game
//! releases its slot, so games the batch never launched cannot open the barrier.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::error::AdmissionError;

/// Permit for one running game. Dropping it frees the slot.
#[derive(Debug)]
pub struct AdmissionSlot {
    _permit: OwnedSemaphorePermit,
}

#[derive(Debug, Default)]
struct InFlight {
    /// Launched, room tag not known yet.
    reserved: usize,
    /// Launched games by room tag.
    games: HashSet<String>,
}

impl InFlight {
    fn len(&self) -> usize {
        self.reserved + self.games.len()
    }
}

#[derive(Debug)]
pub struct AdmissionController {
    max: usize,
    slots: Arc<Semaphore>,
    held: Mutex<HashMap<String, AdmissionSlot>>,
    in_flight: watch::Sender<InFlight>,
    closed: AtomicBool,
}

impl AdmissionController {
    pub fn new(max_concurrent_games: usize) -> Self {
        let max = max_concurrent_games.max(1);
        let (in_flight, _) = watch::channel(InFlight::default());
        Self {
            max,
            slots: Arc::new(Semaphore::new(max)),
            held: Mutex::new(HashMap::new()),
            in_flight,
            closed: AtomicBool::new(false),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Games currently holding a slot.
    pub fn active(&self) -> usize {
        self.max - self.slots.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.borrow().len()
    }

    /// Whether `tag` is a launched game the drain barrier waits for.
    pub fn is_tracked(&self, tag: &str) -> bool {
        self.in_flight.borrow().games.contains(tag)
    }

    /// Suspend until fewer than `max` games are active.
    pub async fn acquire_slot(&self) -> Result<AdmissionSlot, AdmissionError> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| AdmissionError::Closed)?;
        Ok(AdmissionSlot { _permit: permit })
    }

    pub fn try_acquire_slot(&self) -> Option<AdmissionSlot> {
        Arc::clone(&self.slots)
            .try_acquire_owned()
            .ok()
            .map(|permit| AdmissionSlot { _permit: permit })
    }

    /// Park `slot` under the game's tag until [`release_slot`](Self::release_slot).
    pub fn hold(&self, tag: &str, slot: AdmissionSlot) {
        let replaced = self.held().insert(tag.to_string(), slot);
        if replaced.is_some() {
            warn!(tag, "game already held a slot; released the older one");
        }
    }

    /// Free the game's slot; a tracked game also leaves the in-flight count.
    ///
    /// Returns false if the game held no slot.
    pub fn release_slot(&self, tag: &str) -> bool {
        let slot = self.held().remove(tag);
        let was_tracked = self.untrack(tag);
        let Some(slot) = slot else {
            return false;
        };
        drop(slot);
        debug!(
            tag,
            tracked = was_tracked,
            active = self.active(),
            in_flight = self.in_flight(),
            "slot released"
        );
        true
    }

    /// Reserve one more launched game, suspending while `max` are already in flight.
    pub async fn track_start(&self) -> Result<(), AdmissionError> {
        let mut rx = self.in_flight.subscribe();
        loop {
            rx.wait_for(|f| self.is_closed() || f.len() < self.max)
                .await
                .map_err(|_| AdmissionError::Closed)?;
            if self.is_closed() {
                return Err(AdmissionError::Closed);
            }
            let max = self.max;
            let tracked = self.in_flight.send_if_modified(|f| {
                if f.len() >= max {
                    return false;
                }
                f.reserved += 1;
                true
            });
            if tracked {
                return Ok(());
            }
        }
    }

    /// Turn a reservation into the game with room tag `tag`.
    pub fn bind_start(&self, tag: &str) {
        self.in_flight.send_modify(|f| {
            f.reserved = f.reserved.saturating_sub(1);
            f.games.insert(tag.to_string());
        });
    }

    /// Undo a [`track_start`](Self::track_start) for a game that never began.
    pub fn abandon_start(&self) {
        self.in_flight.send_if_modified(|f| {
            if f.reserved == 0 {
                return false;
            }
            f.reserved -= 1;
            true
        });
    }

    /// Drop `tag` from the in-flight count. False if it was not tracked.
    pub fn untrack(&self, tag: &str) -> bool {
        self.in_flight.send_if_modified(|f| f.games.remove(tag))
    }

    /// Drain barrier: returns once every tracked game has released its slot.
    pub async fn await_all_finished(&self) -> Result<(), AdmissionError> {
        let mut rx = self.in_flight.subscribe();
        rx.wait_for(|f| self.is_closed() || f.len() == 0)
            .await
            .map_err(|_| AdmissionError::Closed)?;
        if self.is_closed() && self.in_flight() > 0 {
            return Err(AdmissionError::Closed);
        }
        Ok(())
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.slots.close();
        // Wake counter waiters so they observe the flag.
        self.in_flight.send_modify(|_| {});
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn held(&self) -> std::sync::MutexGuard<'_, HashMap<String, AdmissionSlot>> {
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn test_slots_never_exceed_max() {
        let admission = AdmissionController::new(2);
        let a = admission.acquire_slot().await.unwrap();
        let _b = admission.acquire_slot().await.unwrap();
        assert_eq!(admission.active(), 2);
        assert!(admission.try_acquire_slot().is_none());

        let mut third = task::spawn(admission.acquire_slot());
        assert_pending!(third.poll());

        drop(a);
        assert!(third.is_woken());
        let _c = assert_ready!(third.poll()).unwrap();
        assert_eq!(admission.active(), 2);
    }

    #[tokio::test]
    async fn test_release_by_tag() {
        let admission = AdmissionController::new(1);
        let slot = admission.acquire_slot().await.unwrap();
        admission.hold("room1", slot);
        assert_eq!(admission.active(), 1);

        assert!(admission.release_slot("room1"));
        assert_eq!(admission.active(), 0);
        assert!(!admission.release_slot("room1"));
    }

    #[tokio::test]
    async fn test_track_start_is_bounded() {
        let admission = AdmissionController::new(1);
        admission.track_start().await.unwrap();
        admission.bind_start("room1");
        assert_eq!(admission.in_flight(), 1);
        assert!(admission.is_tracked("room1"));

        let mut second = task::spawn(admission.track_start());
        assert_pending!(second.poll());

        let slot = admission.acquire_slot().await.unwrap();
        admission.hold("room1", slot);
        admission.release_slot("room1");
        assert!(second.is_woken());
        assert_ready!(second.poll()).unwrap();
        assert_eq!(admission.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_drain_barrier_waits_for_every_game() {
        let admission = Arc::new(AdmissionController::new(2));
        for tag in ["room1", "room2"] {
            admission.track_start().await.unwrap();
            admission.bind_start(tag);
            let slot = admission.acquire_slot().await.unwrap();
            admission.hold(tag, slot);
        }

        let drained = {
            let admission = Arc::clone(&admission);
            tokio::spawn(async move { admission.await_all_finished().await })
        };

        admission.release_slot("room1");
        tokio::task::yield_now().await;
        assert!(!drained.is_finished());

        admission.release_slot("room2");
        timeout(Duration::from_secs(2), drained)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_untracked_game_does_not_open_the_barrier() {
        let admission = AdmissionController::new(1);

        // Round one gives up on its invite; the server starts that game anyway.
        admission.track_start().await.unwrap();
        admission.abandon_start();
        let late = admission.acquire_slot().await.unwrap();
        admission.hold("late", late);

        admission.track_start().await.unwrap();
        admission.bind_start("round2");

        let mut drain = task::spawn(admission.await_all_finished());
        assert_pending!(drain.poll());

        assert!(admission.release_slot("late"));
        let own = admission.acquire_slot().await.unwrap();
        admission.hold("round2", own);
        assert_pending!(drain.poll());
        assert_eq!(admission.in_flight(), 1);

        admission.release_slot("round2");
        assert!(drain.is_woken());
        assert_ready!(drain.poll()).unwrap();
    }

    #[tokio::test]
    async fn test_untrack_is_idempotent() {
        let admission = AdmissionController::new(1);
        admission.track_start().await.unwrap();
        admission.bind_start("room1");
        assert!(admission.untrack("room1"));
        assert!(!admission.untrack("room1"));
        assert!(!admission.release_slot("room1"));
        assert_eq!(admission.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_abandon_start() {
        let admission = AdmissionController::new(1);
        admission.track_start().await.unwrap();
        admission.abandon_start();
        assert_eq!(admission.in_flight(), 0);
        admission.abandon_start();
        assert_eq!(admission.in_flight(), 0);
        admission.await_all_finished().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_fails_waiters() {
        let admission = AdmissionController::new(1);
        let _slot = admission.acquire_slot().await.unwrap();
        admission.track_start().await.unwrap();

        let mut slot_wait = task::spawn(admission.acquire_slot());
        let mut drain_wait = task::spawn(admission.await_all_finished());
        assert_pending!(slot_wait.poll());
        assert_pending!(drain_wait.poll());

        admission.close();
        assert_eq!(assert_ready!(slot_wait.poll()).unwrap_err(), AdmissionError::Closed);
        assert_eq!(assert_ready!(drain_wait.poll()), Err(AdmissionError::Closed));
        assert_eq!(admission.track_start().await, Err(AdmissionError::Closed));
    }
}
