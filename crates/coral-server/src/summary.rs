//! Read model handed to callers after awards and on summary queries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use coral_shared::{Category, ContributionEvent, LevelTable, UserId};
use serde::Serialize;

use crate::aggregator::UserAggregate;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContributionSummary {
    pub user_id: UserId,
    /// Effective total: the raw sum clamped at zero.
    pub total_points: u64,
    pub raw_total: i64,
    pub category_breakdown: BTreeMap<Category, i64>,
    pub recent_contributions: Vec<ContributionEvent>,
    pub level: u32,
    pub level_title: String,
    pub progress_to_next: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_to_next_level: Option<u64>,
    pub rank: usize,
    pub first_contribution_at: DateTime<Utc>,
}

impl UserContributionSummary {
    pub fn build(aggregate: &UserAggregate, levels: &LevelTable, rank: usize) -> Self {
        let total = aggregate.effective_total() as i64;
        let level = levels.level_for(total);
        Self {
            user_id: aggregate.user_id.clone(),
            total_points: aggregate.effective_total(),
            raw_total: aggregate.raw_total,
            category_breakdown: aggregate.category_breakdown.clone(),
            recent_contributions: aggregate.recent.clone(),
            level: level.level,
            level_title: level.title.clone(),
            progress_to_next: levels.progress_to_next(total),
            points_to_next_level: levels.points_to_next(total),
            rank,
            first_contribution_at: aggregate.first_contribution_at,
        }
    }
}
