//! The contribution service facade.
//!
//! Award path: validate, take the user's slot, append to the ledger (the
//! durability point), then fold and re-rank under the standings write lock.
//! The commit runs on its own task, so a caller that gives up waiting never
//! leaves an appended event unfolded or a slot held.

use std::sync::Arc;

use coral_shared::constants::{DEFAULT_HISTORY_LIMIT, MAX_REASON_CHARS};
use coral_shared::{
    Category, Clock, ContributionEvent, ContributionId, LevelTable, NewContribution, UserId,
    ValidationError,
};
use coral_store::{Appended, LedgerStore};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::ContributionError;
use crate::ranking::RankedUser;
use crate::slots::UserSlots;
use crate::standings::Standings;
use crate::summary::UserContributionSummary;

pub type Result<T> = std::result::Result<T, ContributionError>;

/// Caller-supplied award, validated by [`ContributionService::award`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardRequest {
    pub user_id: String,
    pub amount: i64,
    pub reason: String,
    pub category: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// An award that passed validation but has no id or timestamp yet.
#[derive(Debug)]
struct ValidatedAward {
    user_id: UserId,
    amount: i64,
    reason: String,
    category: Category,
    project_id: Option<String>,
    idempotency_key: Option<String>,
}

impl ValidatedAward {
    fn parse(request: AwardRequest) -> std::result::Result<Self, ValidationError> {
        let user_id = UserId::parse(&request.user_id)?;
        if request.amount == 0 {
            return Err(ValidationError::ZeroAmount);
        }
        let category: Category = request.category.parse()?;
        if request.reason.chars().count() > MAX_REASON_CHARS {
            return Err(ValidationError::ReasonTooLong {
                max: MAX_REASON_CHARS,
            });
        }
        Ok(Self {
            user_id,
            amount: request.amount,
            reason: request.reason,
            category,
            project_id: non_blank(request.project_id),
            idempotency_key: non_blank(request.idempotency_key),
        })
    }

    fn into_new(self, clock: &dyn Clock) -> NewContribution {
        NewContribution {
            id: ContributionId::new(),
            user_id: self.user_id,
            amount: self.amount,
            reason: self.reason,
            category: self.category,
            project_id: self.project_id,
            created_at: clock.now(),
            idempotency_key: self.idempotency_key,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Upper bound on `top(k)`.
    pub max_top_k: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self { max_top_k: 100 }
    }
}

#[derive(Clone)]
pub struct ContributionService {
    ledger: Arc<dyn LedgerStore>,
    levels: Arc<LevelTable>,
    clock: Arc<dyn Clock>,
    standings: Arc<RwLock<Standings>>,
    slots: UserSlots,
    options: ServiceOptions,
}

impl ContributionService {
    /// Build the service and fold the existing ledger into memory.
    pub async fn open(
        ledger: Arc<dyn LedgerStore>,
        levels: Arc<LevelTable>,
        clock: Arc<dyn Clock>,
        options: ServiceOptions,
    ) -> Result<Self> {
        let service = Self {
            ledger,
            levels,
            clock,
            standings: Arc::new(RwLock::new(Standings::new())),
            slots: UserSlots::new(),
            options,
        };
        service.reconcile().await?;
        Ok(service)
    }

    /// Record a contribution and return the user's updated summary.
    ///
    /// Retrying with the same idempotency key returns the current summary
    /// without recording anything new.
    pub async fn award(&self, request: AwardRequest) -> Result<UserContributionSummary> {
        let award = ValidatedAward::parse(request)?;
        let service = self.clone();
        tokio::spawn(async move { service.commit(award).await })
            .await
            .map_err(|e| {
                error!(error = %e, "award task aborted");
                ContributionError::Integrity(format!("award task aborted: {e}"))
            })?
    }

    async fn commit(&self, award: ValidatedAward) -> Result<UserContributionSummary> {
        let _slot = self.slots.acquire(&award.user_id).await;
        self.check_headroom(&award).await?;

        let new = award.into_new(self.clock.as_ref());
        let user_id = new.user_id.clone();
        let ledger = Arc::clone(&self.ledger);
        let appended = tokio::task::spawn_blocking(move || ledger.append(new))
            .await
            .map_err(|e| {
                ContributionError::StorageUnavailable(format!("ledger task failed: {e}"))
            })?
            .map_err(|e| {
                warn!(user = %user_id, error = %e, transient = e.is_transient(), "ledger append failed");
                ContributionError::from(e)
            })?;

        match appended {
            Appended::Replayed(event) => {
                info!(
                    user = %event.user_id,
                    sequence = event.sequence,
                    "duplicate award ignored"
                );
                self.standings.read().await.summary(&event.user_id, &self.levels)
            }
            Appended::Stored(event) => {
                let mut standings = self.standings.write().await;
                if !standings.apply(&event) {
                    debug!(sequence = event.sequence, "event already folded by a replay");
                }
                let summary = standings.summary(&event.user_id, &self.levels)?;
                info!(
                    user = %event.user_id,
                    amount = event.amount,
                    category = %event.category,
                    total = summary.total_points,
                    level = summary.level,
                    rank = summary.rank,
                    "contribution awarded"
                );
                Ok(summary)
            }
        }
    }

    /// Reject an award the user's totals could not absorb, before it reaches
    /// the ledger. Callers hold the user's slot, so the totals cannot move.
    async fn check_headroom(&self, award: &ValidatedAward) -> Result<()> {
        let standings = self.standings.read().await;
        let Ok(aggregate) = standings.aggregate(&award.user_id) else {
            return Ok(());
        };
        let in_category = aggregate
            .category_breakdown
            .get(&award.category)
            .copied()
            .unwrap_or(0);
        if aggregate.raw_total.checked_add(award.amount).is_none()
            || in_category.checked_add(award.amount).is_none()
        {
            warn!(user = %award.user_id, amount = award.amount, "award would overflow totals");
            return Err(ValidationError::AmountOverflow.into());
        }
        Ok(())
    }

    pub async fn summary(&self, user_id: &str) -> Result<UserContributionSummary> {
        let user_id = UserId::parse(user_id)?;
        self.standings.read().await.summary(&user_id, &self.levels)
    }

    pub async fn rank(&self, user_id: &str) -> Result<usize> {
        let user_id = UserId::parse(user_id)?;
        self.standings.read().await.rank(&user_id)
    }

    /// Best `k` users; `k` is capped by [`ServiceOptions::max_top_k`].
    pub async fn top(&self, k: usize) -> Vec<RankedUser> {
        let k = k.min(self.options.max_top_k);
        self.standings.read().await.top(k)
    }

    pub fn level_table(&self) -> &LevelTable {
        &self.levels
    }

    /// A user's ledger entries, newest first. `before` is the sequence of
    /// the last event of the previous page.
    pub async fn history(
        &self,
        user_id: &str,
        limit: Option<u32>,
        before: Option<u64>,
    ) -> Result<Vec<ContributionEvent>> {
        let user_id = UserId::parse(user_id)?;
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(DEFAULT_HISTORY_LIMIT * 4);
        let ledger = Arc::clone(&self.ledger);
        let events = tokio::task::spawn_blocking(move || {
            ledger.events_for_user(&user_id, limit, before)
        })
        .await
        .map_err(|e| ContributionError::StorageUnavailable(format!("ledger task failed: {e}")))??;
        Ok(events)
    }

    /// Rebuild aggregates and ranking by replaying the whole ledger.
    ///
    /// The standings write lock is held for the duration, so readers keep
    /// seeing the old state until the new one is complete.
    pub async fn reconcile(&self) -> Result<usize> {
        let mut standings = self.standings.write().await;
        let ledger = Arc::clone(&self.ledger);
        let events = tokio::task::spawn_blocking(move || ledger.replay())
            .await
            .map_err(|e| {
                ContributionError::StorageUnavailable(format!("ledger task failed: {e}"))
            })??;

        let rebuilt = Standings::rebuild(&events);
        rebuilt.verify()?;
        let users = rebuilt.user_count();
        *standings = rebuilt;

        info!(events = events.len(), users, "standings rebuilt from ledger");
        Ok(users)
    }

    pub fn slots(&self) -> &UserSlots {
        &self.slots
    }
}
