//! Per-user aggregates folded from ledger events.
//!
//! An aggregate is a deterministic fold over one user's events, so the whole
//! map can always be rebuilt by replaying the ledger in insertion order.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use coral_shared::constants::RECENT_CONTRIBUTIONS_LIMIT;
use coral_shared::{Category, ContributionEvent, UserId};

/// Folded state for a single user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAggregate {
    pub user_id: UserId,
    /// Unclamped sum of every amount, corrections included.
    pub raw_total: i64,
    /// Always holds all categories; values sum to `raw_total`.
    pub category_breakdown: BTreeMap<Category, i64>,
    /// Newest first by `created_at`, then by ledger sequence.
    pub recent: Vec<ContributionEvent>,
    pub first_contribution_at: DateTime<Utc>,
    pub last_sequence: u64,
    pub event_count: u64,
}

impl UserAggregate {
    fn empty(user_id: UserId, first_contribution_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            raw_total: 0,
            category_breakdown: Category::ALL.into_iter().map(|c| (c, 0)).collect(),
            recent: Vec::with_capacity(RECENT_CONTRIBUTIONS_LIMIT + 1),
            first_contribution_at,
            last_sequence: 0,
            event_count: 0,
        }
    }

    /// Total used for levels and ranking; never negative.
    pub fn effective_total(&self) -> u64 {
        self.raw_total.max(0) as u64
    }
}

/// Fold one event into an aggregate (or start one).
pub fn apply(aggregate: Option<UserAggregate>, event: &ContributionEvent) -> UserAggregate {
    let mut agg = aggregate
        .unwrap_or_else(|| UserAggregate::empty(event.user_id.clone(), event.created_at));

    agg.raw_total = agg.raw_total.saturating_add(event.amount);
    let slot = agg.category_breakdown.entry(event.category).or_insert(0);
    *slot = slot.saturating_add(event.amount);

    let newer_than = |e: &ContributionEvent| {
        (e.created_at, e.sequence) > (event.created_at, event.sequence)
    };
    let pos = agg.recent.partition_point(newer_than);
    agg.recent.insert(pos, event.clone());
    agg.recent.truncate(RECENT_CONTRIBUTIONS_LIMIT);

    agg.first_contribution_at = agg.first_contribution_at.min(event.created_at);
    agg.last_sequence = agg.last_sequence.max(event.sequence);
    agg.event_count += 1;
    agg
}

/// Owner of every user's aggregate.
#[derive(Debug, Default)]
pub struct Aggregator {
    users: HashMap<UserId, UserAggregate>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `event` into its user's aggregate. Returns `None` when the event
    /// was already folded (its sequence is not newer than the user's last).
    pub fn apply(&mut self, event: &ContributionEvent) -> Option<&UserAggregate> {
        if let Some(existing) = self.users.get(&event.user_id) {
            if event.sequence <= existing.last_sequence {
                tracing::debug!(
                    user = %event.user_id,
                    sequence = event.sequence,
                    last = existing.last_sequence,
                    "event already folded, skipping"
                );
                return None;
            }
        }
        let current = self.users.remove(&event.user_id);
        let next = apply(current, event);
        Some(self.users.entry(event.user_id.clone()).or_insert(next))
    }

    pub fn get(&self, user_id: &UserId) -> Option<&UserAggregate> {
        self.users.get(user_id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserAggregate> {
        self.users.values()
    }
}
