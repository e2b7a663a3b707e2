//! Bid ownership and the atomic accept/reject transaction
use super::bid::{Bid, BidProposal, BidStatus};
use super::chat::ChatChannel;
use super::error::MarketError;
use super::order::{Order, OrderStatus};
use super::store::OrderStore;
use super::types::TimeStamp;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};

pub const BIDS_TREE: &str = "bids";

fn abort(e: MarketError) -> ConflictableTransactionError<anyhow::Error> {
    ConflictableTransactionError::Abort(e.into())
}

fn codec_abort<E>(e: E) -> ConflictableTransactionError<anyhow::Error>
where
    E: std::error::Error + Send + Sync + 'static,
{
    ConflictableTransactionError::Abort(e.into())
}

// Bid keys sort under their order, so one prefix scan lists an order's bids
// in submission order (bid ids are uuid7-based and time-ordered).
fn bid_key(order_id: &str, bid_id: &str) -> Vec<u8> {
    format!("{order_id}/{bid_id}").into_bytes()
}

/// Owns the bid rows and enforces the at-most-one-accepted invariant per
/// order. Accepting a bid is the only operation that spans the bid tree and
/// the order row, and it runs as a single sled transaction.
#[derive(Clone)]
pub struct BidLedger {
    orders: Tree,
    bids: Tree,
    chat: ChatChannel,
}

impl BidLedger {
    pub fn new(db: &Db, store: &OrderStore, chat: ChatChannel) -> anyhow::Result<Self> {
        Ok(Self {
            orders: store.orders_tree().clone(),
            bids: db.open_tree(BIDS_TREE)?,
            chat,
        })
    }

    fn load_order(&self, order_id: &str) -> anyhow::Result<Order> {
        let bytes = self
            .orders
            .get(order_id.as_bytes())?
            .ok_or_else(|| MarketError::not_found("order", order_id))?;
        Ok(minicbor::decode(&bytes)?)
    }

    fn load_bid(&self, order_id: &str, bid_id: &str) -> anyhow::Result<Bid> {
        let bytes = self
            .bids
            .get(bid_key(order_id, bid_id))?
            .ok_or_else(|| MarketError::not_found("bid", bid_id))?;
        Ok(minicbor::decode(&bytes)?)
    }

    /// Record a new pending bid. Validation depends on the order kind: a
    /// regular order needs a positive price and duration, an estimation
    /// request needs a non-empty comment.
    ///
    /// Bids against orders that already left `open`/`searching` are still
    /// recorded for bookkeeping; they never touch the order and can no
    /// longer be accepted.
    pub fn submit(
        &self,
        order_id: &str,
        executor_id: &str,
        proposal: BidProposal,
    ) -> anyhow::Result<Bid> {
        let order = self.load_order(order_id)?;
        proposal.validate(order.is_estimation_request)?;

        let bid = Bid::new(order_id, executor_id, proposal)?;
        self.bids
            .insert(bid_key(order_id, &bid.id), minicbor::to_vec(&bid)?)?;

        Ok(bid)
    }

    /// Accept one bid and reject every other pending bid on the order,
    /// booking the order for the winning executor. Runs as one transaction
    /// over the bid tree and the order row, so two concurrent accepts on the
    /// same order yield exactly one success; the loser gets
    /// [`MarketError::Conflict`]. Re-accepting the already-winning bid is a
    /// no-op success.
    pub fn accept(
        &self,
        order_id: &str,
        bid_id: &str,
        actor: &str,
    ) -> anyhow::Result<(Order, Bid)> {
        let chosen_key = bid_key(order_id, bid_id);

        // Snapshot of sibling keys; rewritten conditionally inside the
        // transaction so a re-run always sees current state.
        let mut sibling_keys = Vec::new();
        for row in self.bids.scan_prefix(format!("{order_id}/").as_bytes()) {
            let (key, _) = row?;
            if key.as_ref() != chosen_key.as_slice() {
                sibling_keys.push(key.to_vec());
            }
        }

        let result = (&self.orders, &self.bids).transaction(|(orders_tx, bids_tx)| {
            let order_bytes = orders_tx
                .get(order_id.as_bytes())?
                .ok_or_else(|| abort(MarketError::not_found("order", order_id)))?;
            let mut order: Order = minicbor::decode(&order_bytes).map_err(codec_abort)?;

            let chosen_bytes = bids_tx
                .get(chosen_key.as_slice())?
                .ok_or_else(|| abort(MarketError::not_found("bid", bid_id)))?;
            let mut chosen: Bid = minicbor::decode(&chosen_bytes).map_err(codec_abort)?;

            if chosen.status == BidStatus::Accepted
                && order.accepted_executor_id.as_deref() == Some(chosen.executor_id.as_str())
            {
                return Ok((order, chosen, false));
            }
            if chosen.status != BidStatus::Pending {
                return Err(abort(MarketError::Conflict(format!(
                    "bid {bid_id} is no longer pending"
                ))));
            }
            if !order.status.is_awaiting_bids() {
                return Err(abort(MarketError::Conflict(format!(
                    "order {order_id} is no longer accepting bids"
                ))));
            }

            chosen.status = BidStatus::Accepted;
            bids_tx.insert(
                chosen_key.as_slice(),
                minicbor::to_vec(&chosen).map_err(codec_abort)?,
            )?;

            for key in &sibling_keys {
                if let Some(bytes) = bids_tx.get(key.as_slice())? {
                    let mut other: Bid = minicbor::decode(&bytes).map_err(codec_abort)?;
                    if other.status == BidStatus::Pending {
                        other.status = BidStatus::Rejected;
                        bids_tx.insert(
                            key.as_slice(),
                            minicbor::to_vec(&other).map_err(codec_abort)?,
                        )?;
                    }
                }
            }

            order.status = OrderStatus::Booked;
            order.accepted_executor_id = Some(chosen.executor_id.clone());
            order.updated_at = TimeStamp::new();
            orders_tx.insert(
                order_id.as_bytes(),
                minicbor::to_vec(&order).map_err(codec_abort)?,
            )?;

            Ok((order, chosen, true))
        });

        let (order, bid, newly_accepted) = match result {
            Ok(outcome) => outcome,
            Err(TransactionError::Abort(e)) => return Err(e),
            Err(TransactionError::Storage(e)) => return Err(e.into()),
        };

        if newly_accepted {
            self.chat.append(
                order_id,
                actor,
                &format!(
                    "Bid accepted: executor {} at price {}",
                    bid.executor_id,
                    bid.display_price()
                ),
                true,
            )?;
        }

        Ok((order, bid))
    }

    /// Reject a pending bid. No order side effect. Re-rejecting is a no-op;
    /// rejecting the accepted bid is a conflict.
    pub fn reject(&self, order_id: &str, bid_id: &str) -> anyhow::Result<Bid> {
        let mut bid = self.load_bid(order_id, bid_id)?;

        match bid.status {
            BidStatus::Rejected => Ok(bid),
            BidStatus::Accepted => Err(MarketError::Conflict(format!(
                "bid {bid_id} was already accepted"
            ))
            .into()),
            BidStatus::Pending => {
                bid.status = BidStatus::Rejected;
                self.bids
                    .insert(bid_key(order_id, bid_id), minicbor::to_vec(&bid)?)?;
                Ok(bid)
            }
        }
    }

    /// All bids on one order, in submission order.
    pub fn bids_for_order(&self, order_id: &str) -> anyhow::Result<Vec<Bid>> {
        let mut out = Vec::new();
        for row in self.bids.scan_prefix(format!("{order_id}/").as_bytes()) {
            let (_, value) = row?;
            out.push(minicbor::decode(&value)?);
        }
        Ok(out)
    }

    /// Every bid row, for read-side projections.
    pub fn all(&self) -> anyhow::Result<Vec<Bid>> {
        let mut out = Vec::new();
        for row in self.bids.iter() {
            let (_, value) = row?;
            out.push(minicbor::decode(&value)?);
        }
        Ok(out)
    }
}
