use thiserror::Error;

/// Input rejected before any state change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("user id must not be empty")]
    EmptyUserId,

    #[error("user id exceeds {max} bytes")]
    UserIdTooLong { max: usize },

    #[error("amount must not be zero")]
    ZeroAmount,

    #[error("unknown contribution category: {0}")]
    UnknownCategory(String),

    #[error("reason exceeds {max} characters")]
    ReasonTooLong { max: usize },

    #[error("amount would overflow the user's point total")]
    AmountOverflow,

    #[error("invalid level table: {0}")]
    InvalidLevelTable(String),
}
