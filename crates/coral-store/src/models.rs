//! Results returned by ledger writes.

use coral_shared::ContributionEvent;

/// Outcome of an append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Appended {
    /// The event was written and is now part of the ledger.
    Stored(ContributionEvent),
    /// An event with the same idempotency key already existed for this user;
    /// it is returned unchanged and nothing was written.
    Replayed(ContributionEvent),
}

impl Appended {
    pub fn event(&self) -> &ContributionEvent {
        match self {
            Appended::Stored(event) | Appended::Replayed(event) => event,
        }
    }

    pub fn into_event(self) -> ContributionEvent {
        match self {
            Appended::Stored(event) | Appended::Replayed(event) => event,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, Appended::Replayed(_))
    }
}
