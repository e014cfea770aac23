//! Resizable worker slots.
//!
//! A `WorkerSlots` bounds how many executions run at once. Unlike a plain
//! semaphore, its capacity can shrink while permits are held: holders keep
//! their slot until they finish, and no new slot is handed out until the
//! active count drops below the new capacity.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

#[derive(Debug)]
struct SlotState {
    capacity: usize,
    active: usize,
}

/// Bounded set of execution slots.
#[derive(Debug)]
pub(crate) struct WorkerSlots {
    state: Mutex<SlotState>,
    released: Notify,
}

/// A held execution slot, released on drop.
#[derive(Debug)]
pub(crate) struct WorkerPermit {
    slots: Arc<WorkerSlots>,
}

impl WorkerSlots {
    /// Create slots with the given capacity.
    pub(crate) fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SlotState {
                capacity,
                active: 0,
            }),
            released: Notify::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configured capacity.
    pub(crate) fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Number of slots currently held.
    pub(crate) fn active(&self) -> usize {
        self.lock().active
    }

    /// Check if every slot is held.
    pub(crate) fn is_saturated(&self) -> bool {
        let state = self.lock();
        state.active >= state.capacity
    }

    /// Change the capacity. Waiters are woken when it grows.
    pub(crate) fn set_capacity(&self, capacity: usize) {
        let grew = {
            let mut state = self.lock();
            let grew = capacity > state.capacity;
            state.capacity = capacity;
            grew
        };
        if grew {
            self.released.notify_waiters();
        }
    }

    /// Take a slot if one is free.
    pub(crate) fn try_acquire(self: &Arc<Self>) -> Option<WorkerPermit> {
        let mut state = self.lock();
        if state.active < state.capacity {
            state.active += 1;
            Some(WorkerPermit {
                slots: Arc::clone(self),
            })
        } else {
            None
        }
    }

    /// Wait for a free slot.
    ///
    /// Cancel safe: dropping the future before it resolves holds no slot.
    pub(crate) async fn acquire(self: &Arc<Self>) -> WorkerPermit {
        loop {
            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            if let Some(permit) = self.try_acquire() {
                return permit;
            }

            released.await;
        }
    }

    fn release(&self) {
        {
            let mut state = self.lock();
            state.active = state.active.saturating_sub(1);
        }
        self.released.notify_waiters();
    }
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        self.slots.release();
    }
}
