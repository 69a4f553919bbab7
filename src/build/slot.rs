// src/build/slot.rs

//! The global build lock.
//!
//! At most one build run may hold the slot at any instant, system-wide.
//! Acquisition is a single check-and-set under the mutex with no suspension
//! point between the check and the set. Release is keyed by the holder id,
//! which makes it idempotent: whichever of the normal-completion path and
//! the cancellation path runs second becomes a no-op.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct BuildSlot {
    holder: Mutex<Option<Uuid>>,
}

impl BuildSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim the slot for `build_id`. Returns false when another
    /// build already holds it.
    pub fn try_acquire(&self, build_id: Uuid) -> bool {
        let mut holder = self.lock();
        if holder.is_some() {
            return false;
        }
        *holder = Some(build_id);
        debug!(build_id = %build_id, "build slot acquired");
        true
    }

    /// Release the slot if `build_id` still holds it. Returns whether the
    /// slot was actually freed by this call.
    pub fn release(&self, build_id: Uuid) -> bool {
        let mut holder = self.lock();
        if *holder == Some(build_id) {
            *holder = None;
            debug!(build_id = %build_id, "build slot released");
            true
        } else {
            false
        }
    }

    pub fn is_held(&self) -> bool {
        self.lock().is_some()
    }

    pub fn holder(&self) -> Option<Uuid> {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Uuid>> {
        self.holder.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
