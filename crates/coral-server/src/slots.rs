//! Per-user award serialization.
//!
//! Each user id maps to its own async mutex. Holding a [`SlotGuard`] means no
//! other award for that user is between its ledger append and its fold.
//! Awards for different users never wait on each other beyond the brief map
//! lookup.

use std::collections::HashMap;
use std::sync::Arc;

use coral_shared::UserId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Exclusive hold on one user's slot; released on drop.
pub struct SlotGuard {
    _guard: OwnedMutexGuard<()>,
}

#[derive(Clone, Default)]
pub struct UserSlots {
    slots: Arc<Mutex<HashMap<UserId, Arc<Mutex<()>>>>>,
}

impl UserSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: &UserId) -> SlotGuard {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(user_id.clone()).or_default().clone()
        };
        SlotGuard {
            _guard: slot.lock_owned().await,
        }
    }

    /// Drop slots nobody holds or waits on. Returns how many were removed.
    pub async fn purge_idle(&self) -> usize {
        let mut slots = self.slots.lock().await;
        let before = slots.len();
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        before - slots.len()
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }
}
