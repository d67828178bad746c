//! Aggregates and ranking, kept in step with each other.
//!
//! The service guards a [`Standings`] with a single `RwLock`, so the fold and
//! the ranking upsert for one event become visible to readers together.

use coral_shared::{ContributionEvent, LevelTable, UserId};

use crate::aggregator::{Aggregator, UserAggregate};
use crate::error::ContributionError;
use crate::ranking::{RankedUser, RankingIndex};
use crate::summary::UserContributionSummary;

#[derive(Debug, Default)]
pub struct Standings {
    aggregator: Aggregator,
    ranking: RankingIndex,
}

impl Standings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a whole ledger, in insertion order, from scratch.
    pub fn rebuild<'a>(events: impl IntoIterator<Item = &'a ContributionEvent>) -> Self {
        let mut standings = Self::new();
        for event in events {
            standings.apply(event);
        }
        standings
    }

    /// Fold one stored event and reposition its user. Returns `false` when the
    /// event had already been folded.
    pub fn apply(&mut self, event: &ContributionEvent) -> bool {
        let Some(aggregate) = self.aggregator.apply(event) else {
            return false;
        };
        self.ranking.upsert(
            aggregate.user_id.clone(),
            aggregate.effective_total(),
            aggregate.first_contribution_at,
        );
        true
    }

    pub fn aggregate(&self, user_id: &UserId) -> Result<&UserAggregate, ContributionError> {
        self.aggregator
            .get(user_id)
            .ok_or_else(|| ContributionError::NotFound(user_id.clone()))
    }

    pub fn summary(
        &self,
        user_id: &UserId,
        levels: &LevelTable,
    ) -> Result<UserContributionSummary, ContributionError> {
        let aggregate = self.aggregate(user_id)?;
        let rank = self.ranking.rank_of(user_id)?;
        Ok(UserContributionSummary::build(aggregate, levels, rank))
    }

    pub fn rank(&self, user_id: &UserId) -> Result<usize, ContributionError> {
        self.ranking.rank_of(user_id)
    }

    pub fn top(&self, k: usize) -> Vec<RankedUser> {
        self.ranking.top(k)
    }

    pub fn user_count(&self) -> usize {
        self.aggregator.len()
    }

    /// Check that every aggregate has exactly one ranking entry at its
    /// effective total.
    pub fn verify(&self) -> Result<(), ContributionError> {
        if self.aggregator.len() != self.ranking.len() {
            return Err(ContributionError::Integrity(format!(
                "{} aggregates but {} ranking entries",
                self.aggregator.len(),
                self.ranking.len()
            )));
        }
        for aggregate in self.aggregator.iter() {
            self.ranking.rank_of(&aggregate.user_id).map_err(|_| {
                ContributionError::Integrity(format!("user {} is not ranked", aggregate.user_id))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use coral_shared::{Category, ContributionId};

    use super::*;

    fn event(user: &str, amount: i64, seq: u64) -> ContributionEvent {
        ContributionEvent {
            id: ContributionId::new(),
            user_id: UserId::parse(user).unwrap(),
            amount,
            reason: "r".into(),
            category: Category::TaskCompletion,
            project_id: None,
            created_at: Utc::now() + Duration::milliseconds(seq as i64),
            idempotency_key: None,
            sequence: seq,
        }
    }

    #[test]
    fn test_rebuild_matches_incremental() {
        let events: Vec<_> = [("a", 50), ("b", 120), ("a", 100), ("c", -5), ("b", -30)]
            .into_iter()
            .enumerate()
            .map(|(i, (u, amt))| event(u, amt, i as u64 + 1))
            .collect();

        let mut incremental = Standings::new();
        for e in &events {
            assert!(incremental.apply(e));
        }
        let rebuilt = Standings::rebuild(&events);
        let levels = LevelTable::default();

        for user in ["a", "b", "c"] {
            let user = UserId::parse(user).unwrap();
            assert_eq!(
                incremental.summary(&user, &levels).unwrap(),
                rebuilt.summary(&user, &levels).unwrap()
            );
        }
        rebuilt.verify().unwrap();
    }

    #[test]
    fn test_summary_includes_rank_and_level() {
        let mut standings = Standings::new();
        standings.apply(&event("a", 150, 1));
        standings.apply(&event("b", 600, 2));
        let levels = LevelTable::default();

        let a = standings
            .summary(&UserId::parse("a").unwrap(), &levels)
            .unwrap();
        assert_eq!(a.rank, 2);
        assert_eq!(a.level, 2);
        assert_eq!(a.points_to_next_level, Some(350));
    }

    #[test]
    fn test_duplicate_event_not_applied_twice() {
        let mut standings = Standings::new();
        let e = event("a", 10, 1);
        assert!(standings.apply(&e));
        assert!(!standings.apply(&e));
        assert_eq!(
            standings
                .aggregate(&UserId::parse("a").unwrap())
                .unwrap()
                .raw_total,
            10
        );
    }

    #[test]
    fn test_unknown_user_is_not_found() {
        let standings = Standings::new();
        let err = standings
            .summary(&UserId::parse("ghost").unwrap(), &LevelTable::default())
            .unwrap_err();
        assert!(matches!(err, ContributionError::NotFound(_)));
    }
}
