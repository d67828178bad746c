use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{MAX_REASON_CHARS, MAX_USER_ID_LEN};
use crate::error::ValidationError;

// User identity = opaque id handed to us by the platform's account layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyUserId);
        }
        if trimmed.len() > MAX_USER_ID_LEN {
            return Err(ValidationError::UserIdTooLong {
                max: MAX_USER_ID_LEN,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ContributionId(pub Uuid);

impl ContributionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContributionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContributionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed set of activities that earn points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ProjectCreation,
    TaskCompletion,
    CodeReview,
    Documentation,
    IdeaSuggestion,
    BugReport,
    CommunitySupport,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::ProjectCreation,
        Category::TaskCompletion,
        Category::CodeReview,
        Category::Documentation,
        Category::IdeaSuggestion,
        Category::BugReport,
        Category::CommunitySupport,
    ];

    /// Wire / storage name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectCreation => "project_creation",
            Self::TaskCompletion => "task_completion",
            Self::CodeReview => "code_review",
            Self::Documentation => "documentation",
            Self::IdeaSuggestion => "idea_suggestion",
            Self::BugReport => "bug_report",
            Self::CommunitySupport => "community_support",
        }
    }

    /// Human-readable name, e.g. `Code Review`.
    pub fn label(&self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub const fn icon(&self) -> &'static str {
        match self {
            Self::ProjectCreation => "🌟",
            Self::TaskCompletion => "✅",
            Self::CodeReview => "💻",
            Self::Documentation => "📝",
            Self::IdeaSuggestion => "💡",
            Self::BugReport => "🐛",
            Self::CommunitySupport => "🤝",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

/// An immutable, stored contribution fact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContributionEvent {
    pub id: ContributionId,
    pub user_id: UserId,
    /// Negative only for administrative corrections.
    pub amount: i64,
    pub reason: String,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Ledger insertion sequence, assigned by the store.
    pub sequence: u64,
}

/// A validated contribution that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContribution {
    pub id: ContributionId,
    pub user_id: UserId,
    pub amount: i64,
    pub reason: String,
    pub category: Category,
    pub project_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub idempotency_key: Option<String>,
}

impl NewContribution {
    /// Check the invariants every stored event must satisfy.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.as_str().is_empty() {
            return Err(ValidationError::EmptyUserId);
        }
        if self.amount == 0 {
            return Err(ValidationError::ZeroAmount);
        }
        if self.reason.chars().count() > MAX_REASON_CHARS {
            return Err(ValidationError::ReasonTooLong {
                max: MAX_REASON_CHARS,
            });
        }
        Ok(())
    }

    pub fn into_event(self, sequence: u64) -> ContributionEvent {
        ContributionEvent {
            id: self.id,
            user_id: self.user_id,
            amount: self.amount,
            reason: self.reason,
            category: self.category,
            project_id: self.project_id,
            created_at: self.created_at,
            idempotency_key: self.idempotency_key,
            sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trips_through_name() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
    }

    #[test]
    fn test_unknown_category_rejected() {
        let err = "karma_farming".parse::<Category>().unwrap_err();
        assert_eq!(err, ValidationError::UnknownCategory("karma_farming".into()));
    }

    #[test]
    fn test_category_serde_uses_snake_case() {
        let json = serde_json::to_string(&Category::CodeReview).unwrap();
        assert_eq!(json, "\"code_review\"");
        assert!(serde_json::from_str::<Category>("\"CodeReview\"").is_err());
    }

    #[test]
    fn test_category_label() {
        assert_eq!(Category::CodeReview.label(), "Code Review");
        assert_eq!(Category::Documentation.label(), "Documentation");
    }

    #[test]
    fn test_category_icons_are_distinct() {
        assert_eq!(Category::BugReport.icon(), "🐛");
        let icons: std::collections::HashSet<_> =
            Category::ALL.iter().map(|c| c.icon()).collect();
        assert_eq!(icons.len(), Category::ALL.len());
    }

    #[test]
    fn test_user_id_parse() {
        assert_eq!(UserId::parse("  alice ").unwrap().as_str(), "alice");
        assert_eq!(UserId::parse("   "), Err(ValidationError::EmptyUserId));
        assert!(UserId::parse(&"x".repeat(MAX_USER_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_new_contribution_rejects_zero_amount() {
        let new = NewContribution {
            id: ContributionId::new(),
            user_id: UserId::parse("u").unwrap(),
            amount: 0,
            reason: "nothing".into(),
            category: Category::BugReport,
            project_id: None,
            created_at: Utc::now(),
            idempotency_key: None,
        };
        assert_eq!(new.validate(), Err(ValidationError::ZeroAmount));
    }
}
