//! Volatile ledger with the same semantics as the SQLite one.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use coral_shared::{ContributionEvent, ContributionId, NewContribution, UserId};

use crate::error::{Result, StoreError};
use crate::ledger::LedgerStore;
use crate::models::Appended;

#[derive(Default)]
struct Inner {
    events: Vec<ContributionEvent>,
    ids: HashSet<ContributionId>,
    /// (user, idempotency key) -> index into `events`
    keys: HashMap<(UserId, String), usize>,
}

/// In-memory [`LedgerStore`]. Sequences start at 1.
#[derive(Default)]
pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl LedgerStore for MemoryLedger {
    fn append(&self, new: NewContribution) -> Result<Appended> {
        new.validate()?;
        let mut inner = self.lock()?;

        if let Some(key) = &new.idempotency_key {
            if let Some(&idx) = inner.keys.get(&(new.user_id.clone(), key.clone())) {
                return Ok(Appended::Replayed(inner.events[idx].clone()));
            }
        }
        if !inner.ids.insert(new.id) {
            return Err(StoreError::Conflict(format!(
                "contribution {} already exists",
                new.id
            )));
        }

        let idx = inner.events.len();
        if let Some(key) = &new.idempotency_key {
            inner.keys.insert((new.user_id.clone(), key.clone()), idx);
        }
        let event = new.into_event(idx as u64 + 1);
        inner.events.push(event.clone());
        Ok(Appended::Stored(event))
    }

    fn events_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
        before: Option<u64>,
    ) -> Result<Vec<ContributionEvent>> {
        let inner = self.lock()?;
        Ok(inner
            .events
            .iter()
            .rev()
            .filter(|e| &e.user_id == user_id)
            .filter(|e| before.map_or(true, |cursor| e.sequence < cursor))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    fn replay(&self) -> Result<Vec<ContributionEvent>> {
        Ok(self.lock()?.events.clone())
    }
}
