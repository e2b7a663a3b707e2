//! Read-side projection of per-role notification counts
//!
//! Counts are recomputed from current (order, bid, message) state on every
//! query; nothing here maintains incremental counters. "Unread" is
//! approximated by a 24h recency window since the store keeps no read
//! receipts.
use super::bid::{Bid, BidStatus};
use super::chat::{ChatChannel, Message};
use super::ledger::BidLedger;
use super::order::Order;
use super::store::OrderStore;
use super::types::Role;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

pub const FRESHNESS_WINDOW_HOURS: i64 = 24;

fn is_fresh(at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - at < Duration::hours(FRESHNESS_WINDOW_HOURS)
}

/// What a role's badge is made of. Fields that don't apply to the viewer's
/// role stay zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NotificationCounts {
    /// Packer view: orders awaiting bids posted within the window.
    pub fresh_orders: u64,
    /// Client view: pending bids on the viewer's orders within the window.
    pub fresh_bids: u64,
    /// Manager view: orders currently flagged as disputed.
    pub disputed_orders: u64,
    /// All views: recent messages by other senders on relevant orders.
    pub unread_messages: u64,
}

impl NotificationCounts {
    pub fn total(&self) -> u64 {
        self.fresh_orders + self.fresh_bids + self.disputed_orders + self.unread_messages
    }
}

fn unread_on(
    messages: &[Message],
    relevant: &BTreeSet<&str>,
    viewer_id: &str,
    now: DateTime<Utc>,
) -> u64 {
    messages
        .iter()
        .filter(|m| {
            relevant.contains(m.order_id.as_str())
                && m.sender_id != viewer_id
                && is_fresh(m.created_at.to_datetime_utc(), now)
        })
        .count() as u64
}

/// Pure projection over current state, parameterized by `now`. Zero input
/// always yields zero output.
pub fn project(
    orders: &[Order],
    bids: &[Bid],
    messages: &[Message],
    viewer_id: &str,
    role: Role,
    now: DateTime<Utc>,
) -> NotificationCounts {
    let mut counts = NotificationCounts::default();

    match role {
        Role::Client => {
            let own: BTreeSet<&str> = orders
                .iter()
                .filter(|o| o.requester_id == viewer_id)
                .map(|o| o.id.as_str())
                .collect();

            counts.fresh_bids = bids
                .iter()
                .filter(|b| {
                    own.contains(b.order_id.as_str())
                        && b.status == BidStatus::Pending
                        && is_fresh(b.created_at.to_datetime_utc(), now)
                })
                .count() as u64;
            counts.unread_messages = unread_on(messages, &own, viewer_id, now);
        }
        Role::Packer => {
            counts.fresh_orders = orders
                .iter()
                .filter(|o| {
                    o.status.is_awaiting_bids() && is_fresh(o.created_at.to_datetime_utc(), now)
                })
                .count() as u64;

            let active: BTreeSet<&str> = orders
                .iter()
                .filter(|o| {
                    o.accepted_executor_id.as_deref() == Some(viewer_id) && o.status.is_active()
                })
                .map(|o| o.id.as_str())
                .collect();
            counts.unread_messages = unread_on(messages, &active, viewer_id, now);
        }
        Role::Manager | Role::Admin => {
            counts.disputed_orders = orders.iter().filter(|o| o.is_disputed).count() as u64;

            let active: BTreeSet<&str> = orders
                .iter()
                .filter(|o| o.status.is_active())
                .map(|o| o.id.as_str())
                .collect();
            counts.unread_messages = unread_on(messages, &active, viewer_id, now);
        }
    }

    counts
}

/// Loads current state from the stores and delegates to [`project`].
#[derive(Clone)]
pub struct NotificationAggregator {
    store: OrderStore,
    ledger: BidLedger,
    chat: ChatChannel,
}

impl NotificationAggregator {
    pub fn new(store: OrderStore, ledger: BidLedger, chat: ChatChannel) -> Self {
        Self {
            store,
            ledger,
            chat,
        }
    }

    pub fn counts_for(
        &self,
        viewer_id: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> anyhow::Result<NotificationCounts> {
        let orders = self.store.all()?;
        let bids = self.ledger.all()?;
        let messages = self.chat.all()?;

        Ok(project(&orders, &bids, &messages, viewer_id, role, now))
    }
}
