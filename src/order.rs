//! Order record, line items and the status state machine
use super::error::MarketError;
use super::types::TimeStamp;
use super::utils;
use chrono::Utc;

/// Lifecycle states of an order.
///
/// `Searching` is a synonym of `Open` kept as its own wire value; both mean
/// "awaiting bids" and every legality check treats them identically.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    #[n(0)]
    Draft,
    #[n(1)]
    Open,
    #[n(2)]
    Searching,
    #[n(3)]
    Booked,
    #[n(4)]
    InProgress,
    #[n(5)]
    AwaitingPayment,
    #[n(6)]
    Completed,
    #[n(7)]
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Open => "open",
            OrderStatus::Searching => "searching",
            OrderStatus::Booked => "booked",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::AwaitingPayment => "awaiting_payment",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// True while the order can still collect and accept bids.
    pub fn is_awaiting_bids(&self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::Searching)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// An order is active once published and until it reaches a terminal
    /// state. Drafts are only visible to their requester.
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            OrderStatus::Draft | OrderStatus::Completed | OrderStatus::Cancelled
        )
    }

    /// Compute the successor state for `event`, or fail with
    /// [`MarketError::InvalidTransition`]. Booking is not an event here; it
    /// only happens through the bid ledger's accept transaction.
    pub fn apply(self, event: OrderEvent) -> Result<OrderStatus, MarketError> {
        use OrderStatus::*;

        let next = match (self, event) {
            (Draft, OrderEvent::Publish) => Open,
            (Booked, OrderEvent::StartWork) => InProgress,
            (InProgress, OrderEvent::SendInvoice) => AwaitingPayment,
            (AwaitingPayment, OrderEvent::ConfirmPayment) => Completed,
            (status, OrderEvent::Cancel) if !status.is_terminal() => Cancelled,
            (status, event) => return Err(MarketError::InvalidTransition { status, event }),
        };

        Ok(next)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events a caller can apply through [`crate::store::OrderStore::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    Publish,
    StartWork,
    SendInvoice,
    ConfirmPayment,
    Cancel,
}

impl OrderEvent {
    /// Text of the system message appended to the order chat when the
    /// transition succeeds.
    pub fn system_note(&self) -> &'static str {
        match self {
            OrderEvent::Publish => "Order published and open for bids",
            OrderEvent::StartWork => "Executor started work on the order",
            OrderEvent::SendInvoice => "Invoice sent, awaiting payment",
            OrderEvent::ConfirmPayment => "Payment confirmed, order completed",
            OrderEvent::Cancel => "Order cancelled",
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackagingType {
    #[n(0)]
    Box,
    #[n(1)]
    Crate,
    #[n(2)]
    Pallet,
    #[n(3)]
    Envelope,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    #[n(0)]
    pub sku: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub quantity: u32,
    #[n(3)]
    pub packaging_type: PackagingType,
}

/// Persisted order row. Never physically deleted, only transitioned to a
/// terminal status.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Order {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub requester_id: String,
    #[n(2)]
    pub title: String,
    #[n(3)]
    pub description: String,
    #[n(4)]
    pub budget: Option<u64>,
    #[n(5)]
    pub deadline: Option<TimeStamp<Utc>>,
    #[n(6)]
    pub items: Vec<LineItem>,
    #[n(7)]
    pub status: OrderStatus,
    #[n(8)]
    pub accepted_executor_id: Option<String>,
    #[n(9)]
    pub is_disputed: bool,
    #[n(10)]
    pub is_estimation_request: bool,
    #[n(11)]
    pub invoice_sent_at: Option<TimeStamp<Utc>>,
    #[n(12)]
    pub created_at: TimeStamp<Utc>,
    #[n(13)]
    pub updated_at: TimeStamp<Utc>,
}

// Also used for constructing drafts before they are persisted
#[derive(Default)]
pub struct OrderDraft {
    requester_id: Option<String>,
    title: String,
    description: String,
    budget: Option<u64>,
    deadline: Option<TimeStamp<Utc>>,
    items: Vec<LineItem>,
    is_estimation_request: bool,
    publish: bool,
}

impl OrderDraft {
    /// Construct a new builder object, this becomes the basis for a draft
    pub fn new() -> Self {
        Self::default()
    }
    pub fn requester(mut self, requester_id: &str) -> Self {
        self.requester_id = Some(requester_id.to_string());
        self
    }
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
    pub fn budget(mut self, budget: u64) -> Self {
        self.budget = Some(budget);
        self
    }
    pub fn deadline(mut self, deadline: TimeStamp<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }
    pub fn add_item(mut self, sku: &str, name: &str, quantity: u32, packaging_type: PackagingType) -> Self {
        self.items.push(LineItem {
            sku: sku.to_string(),
            name: name.to_string(),
            quantity,
            packaging_type,
        });
        self
    }
    /// Turn the draft into an estimation request: bids carry free-text
    /// comments instead of a binding price and duration.
    pub fn estimation_request(mut self) -> Self {
        self.is_estimation_request = true;
        self
    }
    /// Publish immediately instead of leaving the order in `Draft`.
    pub fn publish_on_create(mut self) -> Self {
        self.publish = true;
        self
    }

    // Checks required fields then mints the order row. Budget and deadline
    // are advisory only and are not validated here.
    pub fn validate_and_build(self) -> anyhow::Result<Order> {
        let requester_id = self
            .requester_id
            .ok_or(MarketError::Validation("requester is not set".into()))?;
        if self.title.trim().is_empty() {
            return Err(MarketError::Validation("title must not be empty".into()).into());
        }

        let now = TimeStamp::new();
        Ok(Order {
            id: utils::new_uuid_to_bech32("order")?,
            requester_id,
            title: self.title,
            description: self.description,
            budget: self.budget,
            deadline: self.deadline,
            items: self.items,
            status: if self.publish {
                OrderStatus::Open
            } else {
                OrderStatus::Draft
            },
            accepted_executor_id: None,
            is_disputed: false,
            is_estimation_request: self.is_estimation_request,
            invoice_sent_at: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }
}
