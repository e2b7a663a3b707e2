//! Bid record and proposal validation
use super::error::MarketError;
use super::types::TimeStamp;
use super::utils;
use chrono::Utc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Accepted,
    #[n(2)]
    Rejected,
}

/// What an executor sends when bidding. On a regular order `price` and
/// `estimated_duration_days` are binding and required; on an estimation
/// request only the free-text `comment` is.
#[derive(Debug, Clone, Default)]
pub struct BidProposal {
    pub price: Option<u64>,
    pub estimated_duration_days: Option<u32>,
    pub comment: Option<String>,
}

impl BidProposal {
    pub fn priced(price: u64, estimated_duration_days: u32) -> Self {
        Self {
            price: Some(price),
            estimated_duration_days: Some(estimated_duration_days),
            comment: None,
        }
    }

    pub fn estimate(comment: &str) -> Self {
        Self {
            price: None,
            estimated_duration_days: None,
            comment: Some(comment.to_string()),
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    pub fn validate(&self, is_estimation_request: bool) -> Result<(), MarketError> {
        if is_estimation_request {
            match &self.comment {
                Some(comment) if !comment.trim().is_empty() => Ok(()),
                _ => Err(MarketError::Validation(
                    "estimation request bids require a non-empty comment".into(),
                )),
            }
        } else {
            match self.price {
                Some(price) if price > 0 => {}
                _ => {
                    return Err(MarketError::Validation(
                        "bid price must be a positive amount".into(),
                    ));
                }
            }
            match self.estimated_duration_days {
                Some(days) if days > 0 => Ok(()),
                _ => Err(MarketError::Validation(
                    "estimated duration must be a positive number of days".into(),
                )),
            }
        }
    }
}

/// Persisted bid row.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Bid {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub order_id: String,
    #[n(2)]
    pub executor_id: String,
    #[n(3)]
    pub price: Option<u64>,
    #[n(4)]
    pub estimated_duration_days: Option<u32>,
    #[n(5)]
    pub comment: Option<String>,
    #[n(6)]
    pub status: BidStatus,
    #[n(7)]
    pub created_at: TimeStamp<Utc>,
}

impl Bid {
    pub fn new(order_id: &str, executor_id: &str, proposal: BidProposal) -> anyhow::Result<Self> {
        Ok(Self {
            id: utils::new_uuid_to_bech32("bid")?,
            order_id: order_id.to_string(),
            executor_id: executor_id.to_string(),
            price: proposal.price,
            estimated_duration_days: proposal.estimated_duration_days,
            comment: proposal.comment,
            status: BidStatus::Pending,
            created_at: TimeStamp::new(),
        })
    }

    /// Price rendered for system messages; estimation bids carry none.
    pub fn display_price(&self) -> String {
        match self.price {
            Some(price) => price.to_string(),
            None => "unquoted".to_string(),
        }
    }
}
