use crate::order::{OrderEvent, OrderStatus};

/// Domain error taxonomy. Every variant is a recoverable outcome returned to
/// the caller; the engine never retries on its own and leaves no partial
/// writes behind.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MarketError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("event {event:?} is not legal while order is {status}")]
    InvalidTransition {
        status: OrderStatus,
        event: OrderEvent,
    },
    #[error("conflicting update: {0}")]
    Conflict(String),
    #[error("arbitration not eligible yet, {hours_remaining}h remaining")]
    NotEligible { hours_remaining: i64 },
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl MarketError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
