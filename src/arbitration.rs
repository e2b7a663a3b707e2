//! Time-gated dispute eligibility and dispute requests
//!
//! Eligibility is a pure function of order state and a caller-supplied `now`;
//! nothing here reads the wall clock, so the 24h window is deterministic
//! under test. Both parties share the same window: a client may dispute once
//! the deadline is more than 24h overdue on an in-progress order, an
//! executor once an invoice has gone unpaid for 24h.
use super::chat::ChatChannel;
use super::error::MarketError;
use super::order::{Order, OrderStatus};
use super::store::OrderStore;
use super::types::TimeStamp;
use chrono::{DateTime, Duration, Utc};

pub const ELIGIBILITY_WINDOW_HOURS: i64 = 24;

fn window() -> Duration {
    Duration::hours(ELIGIBILITY_WINDOW_HOURS)
}

/// Who is asking for arbitration. A manager files on behalf of one of the
/// two parties; there is no manager-originated dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeParty {
    Client,
    Executor,
}

pub fn client_eligible(order: &Order, now: DateTime<Utc>) -> bool {
    if order.status != OrderStatus::InProgress {
        return false;
    }
    match &order.deadline {
        Some(deadline) => now - deadline.to_datetime_utc() >= window(),
        None => false,
    }
}

pub fn executor_eligible(
    order: &Order,
    now: DateTime<Utc>,
    invoice_sent_at: Option<&TimeStamp<Utc>>,
) -> bool {
    if order.status != OrderStatus::AwaitingPayment {
        return false;
    }
    match invoice_sent_at {
        Some(sent_at) => now - sent_at.to_datetime_utc() >= window(),
        None => false,
    }
}

/// Whole hours left until `anchor + 24h`, rounded up, clamped at zero. Every
/// countdown in every role view goes through this one function.
pub fn hours_until_eligible(anchor: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let remaining = anchor + window() - now;
    if remaining <= Duration::zero() {
        0
    } else {
        (remaining.num_seconds() + 3599) / 3600
    }
}

/// Countdown anchored on the order deadline; `None` when no deadline is set.
pub fn hours_until_client_eligible(order: &Order, now: DateTime<Utc>) -> Option<i64> {
    order
        .deadline
        .as_ref()
        .map(|deadline| hours_until_eligible(deadline.to_datetime_utc(), now))
}

/// Countdown anchored on the invoice timestamp; `None` before any invoice.
pub fn hours_until_executor_eligible(order: &Order, now: DateTime<Utc>) -> Option<i64> {
    order
        .invoice_sent_at
        .as_ref()
        .map(|sent_at| hours_until_eligible(sent_at.to_datetime_utc(), now))
}

/// Records dispute requests against the order store. Stateless beyond its
/// collaborators.
#[derive(Clone)]
pub struct ArbitrationGate {
    store: OrderStore,
    chat: ChatChannel,
}

impl ArbitrationGate {
    pub fn new(store: OrderStore, chat: ChatChannel) -> Self {
        Self { store, chat }
    }

    /// Request arbitration on an order. Idempotent for already disputed
    /// orders; otherwise fails with [`MarketError::NotEligible`] unless the
    /// requesting party's predicate holds at `now`. On success the order is
    /// marked disputed and a templated system message records the reason.
    pub fn request(
        &self,
        order_id: &str,
        actor: &str,
        party: DisputeParty,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Order> {
        let order = self.store.get(order_id)?;
        if order.is_disputed {
            return Ok(order);
        }

        let (eligible, hours_remaining, reason) = match party {
            DisputeParty::Client => (
                client_eligible(&order, now),
                hours_until_client_eligible(&order, now).unwrap_or(ELIGIBILITY_WINDOW_HOURS),
                "Deadline overdue by >24h",
            ),
            DisputeParty::Executor => (
                executor_eligible(&order, now, order.invoice_sent_at.as_ref()),
                hours_until_executor_eligible(&order, now).unwrap_or(ELIGIBILITY_WINDOW_HOURS),
                "Invoice unpaid >24h",
            ),
        };

        if !eligible {
            return Err(MarketError::NotEligible { hours_remaining }.into());
        }

        let order = self.store.mark_disputed(order_id)?;
        self.chat.append(order_id, actor, reason, true)?;

        Ok(order)
    }
}
