//! Level tiers and the pure functions that interpret them.
//!
//! The table is configuration data: it is validated once when constructed and
//! never mutated afterwards. Every lookup clamps negative totals to zero, so a
//! user whose raw sum dropped below zero still resolves to the first tier.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One tier of the level table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LevelDescriptor {
    pub level: u32,
    pub title: String,
    pub required_points: u64,
    pub benefits: Vec<String>,
}

impl LevelDescriptor {
    fn new(level: u32, title: &str, required_points: u64, benefits: &[&str]) -> Self {
        Self {
            level,
            title: title.to_string(),
            required_points,
            benefits: benefits.iter().map(|b| b.to_string()).collect(),
        }
    }
}

/// Ordered, validated list of tiers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct LevelTable {
    tiers: Vec<LevelDescriptor>,
}

impl LevelTable {
    /// Build a table, checking that thresholds start at zero and that both
    /// levels and thresholds are strictly increasing.
    pub fn new(tiers: Vec<LevelDescriptor>) -> Result<Self, ValidationError> {
        let first = tiers
            .first()
            .ok_or_else(|| ValidationError::InvalidLevelTable("table is empty".into()))?;
        if first.required_points != 0 {
            return Err(ValidationError::InvalidLevelTable(format!(
                "first tier must require 0 points, requires {}",
                first.required_points
            )));
        }
        for pair in tiers.windows(2) {
            if pair[1].level <= pair[0].level {
                return Err(ValidationError::InvalidLevelTable(format!(
                    "level {} follows level {}",
                    pair[1].level, pair[0].level
                )));
            }
            if pair[1].required_points <= pair[0].required_points {
                return Err(ValidationError::InvalidLevelTable(format!(
                    "level {} requires {} points, not more than level {}",
                    pair[1].level, pair[1].required_points, pair[0].level
                )));
            }
        }
        Ok(Self { tiers })
    }

    /// Parse a JSON array of tiers.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let tiers: Vec<LevelDescriptor> = serde_json::from_str(json)
            .map_err(|e| ValidationError::InvalidLevelTable(e.to_string()))?;
        Self::new(tiers)
    }

    /// Load a JSON tier file from disk.
    pub fn load(path: &Path) -> Result<Self, ValidationError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::InvalidLevelTable(format!("{}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn tiers(&self) -> &[LevelDescriptor] {
        &self.tiers
    }

    /// Highest tier whose threshold is reached. Never fails: the first tier
    /// requires zero points.
    pub fn level_for(&self, total: i64) -> &LevelDescriptor {
        let idx = self.index_for(total);
        &self.tiers[idx]
    }

    pub fn next_level(&self, level: u32) -> Option<&LevelDescriptor> {
        self.tiers.iter().find(|tier| tier.level > level)
    }

    /// Percentage of the way from the current tier to the next, in `[0, 100]`.
    /// Always 100 in the final tier.
    pub fn progress_to_next(&self, total: i64) -> f64 {
        let idx = self.index_for(total);
        let Some(next) = self.tiers.get(idx + 1) else {
            return 100.0;
        };
        let current = &self.tiers[idx];
        let span = (next.required_points - current.required_points) as f64;
        let into = (clamp_total(total) - current.required_points) as f64;
        (100.0 * into / span).clamp(0.0, 100.0)
    }

    /// Points still missing to reach the next tier; `None` in the final tier.
    pub fn points_to_next(&self, total: i64) -> Option<u64> {
        let idx = self.index_for(total);
        self.tiers
            .get(idx + 1)
            .map(|next| next.required_points - clamp_total(total))
    }

    fn index_for(&self, total: i64) -> usize {
        let total = clamp_total(total);
        // Thresholds are strictly increasing, so the partition point is the
        // count of tiers already reached; the first tier is always reached.
        let reached = self
            .tiers
            .partition_point(|tier| tier.required_points <= total);
        reached.saturating_sub(1)
    }
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            tiers: vec![
                LevelDescriptor::new(1, "新芽のサンゴ", 0, &["基本的な機能へのアクセス"]),
                LevelDescriptor::new(
                    2,
                    "成長するサンゴ",
                    100,
                    &["プロジェクト作成権限", "投票の重み付け1.2倍"],
                ),
                LevelDescriptor::new(
                    3,
                    "活発なサンゴ",
                    500,
                    &["専門家バッジの取得", "投票の重み付け1.5倍"],
                ),
                LevelDescriptor::new(
                    4,
                    "サンゴの守護者",
                    2000,
                    &["コミュニティモデレーター権限", "投票の重み付け2倍"],
                ),
                LevelDescriptor::new(
                    5,
                    "サンゴ礁の王",
                    10000,
                    &["プラットフォーム開発への参加権限", "カスタムバッジの作成"],
                ),
            ],
        }
    }
}

fn clamp_total(total: i64) -> u64 {
    total.max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_valid() {
        let table = LevelTable::default();
        let rebuilt = LevelTable::new(table.tiers().to_vec()).unwrap();
        assert_eq!(rebuilt.tiers().len(), 5);
    }

    #[test]
    fn test_level_for_thresholds() {
        let table = LevelTable::default();
        assert_eq!(table.level_for(0).level, 1);
        assert_eq!(table.level_for(99).level, 1);
        assert_eq!(table.level_for(100).level, 2);
        assert_eq!(table.level_for(110).title, "成長するサンゴ");
        assert_eq!(table.level_for(499).level, 2);
        assert_eq!(table.level_for(500).level, 3);
        assert_eq!(table.level_for(2000).level, 4);
        assert_eq!(table.level_for(10_000).level, 5);
        assert_eq!(table.level_for(i64::MAX).level, 5);
    }

    #[test]
    fn test_negative_totals_are_level_one() {
        let table = LevelTable::default();
        assert_eq!(table.level_for(-10).level, 1);
        assert_eq!(table.level_for(i64::MIN).level, 1);
    }

    #[test]
    fn test_level_for_is_monotonic() {
        let table = LevelTable::default();
        let mut previous = 0;
        for total in (-50..12_000).step_by(7) {
            let level = table.level_for(total).level;
            assert!(level >= previous, "level dropped at {total}");
            previous = level;
        }
    }

    #[test]
    fn test_progress_to_next() {
        let table = LevelTable::default();
        assert_eq!(table.progress_to_next(80), 80.0);
        assert_eq!(table.progress_to_next(0), 0.0);
        assert_eq!(table.progress_to_next(-10), 0.0);
        assert_eq!(table.progress_to_next(300), 50.0);
        assert_eq!(table.progress_to_next(10_000), 100.0);
        assert_eq!(table.progress_to_next(50_000), 100.0);
    }

    #[test]
    fn test_progress_restarts_at_tier_boundary() {
        let table = LevelTable::default();
        assert_eq!(table.progress_to_next(99), 99.0);
        assert_eq!(table.level_for(100).level, 2);
        assert_eq!(table.progress_to_next(100), 0.0);
        let almost = table.progress_to_next(499);
        assert!(almost > 99.0 && almost < 100.0, "got {almost}");
        assert_eq!(table.level_for(500).level, 3);
        assert_eq!(table.progress_to_next(500), 0.0);
        assert_eq!(table.progress_to_next(9_999), 100.0 * 7_999.0 / 8_000.0);
    }

    #[test]
    fn test_progress_stays_in_range() {
        let table = LevelTable::default();
        for total in (-1_000..11_000).step_by(13) {
            let progress = table.progress_to_next(total);
            assert!((0.0..=100.0).contains(&progress));
        }
    }

    #[test]
    fn test_points_to_next() {
        let table = LevelTable::default();
        assert_eq!(table.points_to_next(80), Some(20));
        assert_eq!(table.points_to_next(-5), Some(100));
        assert_eq!(table.points_to_next(110), Some(390));
        assert_eq!(table.points_to_next(10_000), None);
    }

    #[test]
    fn test_next_level() {
        let table = LevelTable::default();
        assert_eq!(table.next_level(1).map(|t| t.level), Some(2));
        assert!(table.next_level(5).is_none());
    }

    #[test]
    fn test_rejects_nonzero_first_threshold() {
        let tiers = vec![LevelDescriptor::new(1, "a", 10, &[])];
        assert!(LevelTable::new(tiers).is_err());
    }

    #[test]
    fn test_rejects_non_increasing_thresholds() {
        let tiers = vec![
            LevelDescriptor::new(1, "a", 0, &[]),
            LevelDescriptor::new(2, "b", 100, &[]),
            LevelDescriptor::new(3, "c", 100, &[]),
        ];
        assert!(LevelTable::new(tiers).is_err());
    }

    #[test]
    fn test_rejects_empty_table() {
        assert!(LevelTable::new(Vec::new()).is_err());
    }

    #[test]
    fn test_extra_tier_from_json() {
        let json = r#"[
            {"level": 1, "title": "a", "requiredPoints": 0, "benefits": []},
            {"level": 2, "title": "b", "requiredPoints": 10, "benefits": ["x"]},
            {"level": 3, "title": "c", "requiredPoints": 20, "benefits": []},
            {"level": 4, "title": "d", "requiredPoints": 40, "benefits": []},
            {"level": 5, "title": "e", "requiredPoints": 80, "benefits": []},
            {"level": 6, "title": "f", "requiredPoints": 160, "benefits": []}
        ]"#;
        let table = LevelTable::from_json(json).unwrap();
        assert_eq!(table.level_for(200).level, 6);
        assert_eq!(table.progress_to_next(120), 100.0 * 40.0 / 80.0);
    }
}
