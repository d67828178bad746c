//! # coral-server
//!
//! Contribution scoring and leveling service.
//!
//! - **Aggregator** folds ledger events into per-user totals, category
//!   breakdowns and a bounded window of recent contributions
//! - **Ranking index** keeps users ordered by effective total with
//!   logarithmic rank lookups and cheap top-k pages
//! - **Contribution service** serializes awards per user, appends them to the
//!   durable ledger and folds them so readers always see a consistent state
//! - **REST API** (axum) exposing awards, summaries, ranks, the leaderboard
//!   and admin corrections

pub mod aggregator;
pub mod api;
pub mod config;
pub mod error;
pub mod ranking;
pub mod service;
pub mod slots;
pub mod standings;
pub mod summary;

pub use aggregator::{Aggregator, UserAggregate};
pub use error::{ApiError, ContributionError};
pub use ranking::{RankedUser, RankingIndex};
pub use service::{AwardRequest, ContributionService, ServiceOptions};
pub use summary::UserContributionSummary;
