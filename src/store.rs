//! Order persistence and legal status transitions
use super::chat::ChatChannel;
use super::error::MarketError;
use super::order::{Order, OrderDraft, OrderEvent, OrderStatus};
use super::types::TimeStamp;
use sled::{Db, IVec, Tree};

pub const ORDERS_TREE: &str = "orders";

/// Owns the order rows. All status changes funnel through [`transition`]
/// (or the bid ledger's accept transaction), so the state machine in
/// [`OrderStatus::apply`] is the single authority on legality.
///
/// [`transition`]: OrderStore::transition
#[derive(Clone)]
pub struct OrderStore {
    orders: Tree,
    chat: ChatChannel,
}

impl OrderStore {
    pub fn new(db: &Db, chat: ChatChannel) -> anyhow::Result<Self> {
        Ok(Self {
            orders: db.open_tree(ORDERS_TREE)?,
            chat,
        })
    }

    pub(crate) fn orders_tree(&self) -> &Tree {
        &self.orders
    }

    fn load(&self, order_id: &str) -> anyhow::Result<(IVec, Order)> {
        let bytes = self
            .orders
            .get(order_id.as_bytes())?
            .ok_or_else(|| MarketError::not_found("order", order_id))?;
        let order = minicbor::decode(&bytes)?;
        Ok((bytes, order))
    }

    /// Validate the draft and persist the new order. Publishing on create is
    /// externally visible, so it gets the same system message as the Publish
    /// transition.
    pub fn create(&self, draft: OrderDraft) -> anyhow::Result<Order> {
        let order = draft.validate_and_build()?;

        self.orders
            .insert(order.id.as_bytes(), minicbor::to_vec(&order)?)?;

        if order.status == OrderStatus::Open {
            self.chat.append(
                &order.id,
                &order.requester_id,
                OrderEvent::Publish.system_note(),
                true,
            )?;
        }

        Ok(order)
    }

    /// Apply a lifecycle event. Fails with [`MarketError::InvalidTransition`]
    /// when the event is not legal from the current status and
    /// [`MarketError::Conflict`] when another writer got there first. Every
    /// successful transition appends one system message to the order chat.
    pub fn transition(
        &self,
        order_id: &str,
        event: OrderEvent,
        actor: &str,
    ) -> anyhow::Result<Order> {
        let (old_bytes, mut order) = self.load(order_id)?;

        order.status = order.status.apply(event)?;
        match event {
            OrderEvent::SendInvoice => order.invoice_sent_at = Some(TimeStamp::new()),
            // a cancelled order has no accepted executor, per the row invariant
            OrderEvent::Cancel => order.accepted_executor_id = None,
            _ => {}
        }
        order.updated_at = TimeStamp::new();

        // Status-guarded conditional update: the write only lands if the row
        // is still what we read. A lost race surfaces as Conflict instead of
        // silently clobbering the other writer's transition.
        self.orders
            .compare_and_swap(
                order_id.as_bytes(),
                Some(old_bytes),
                Some(minicbor::to_vec(&order)?),
            )?
            .map_err(|_| MarketError::Conflict(format!("order {order_id} changed concurrently")))?;

        self.chat.append(order_id, actor, event.system_note(), true)?;

        Ok(order)
    }

    /// Flag the order as disputed. Idempotent: re-marking an already disputed
    /// order is a no-op success, and losing a race against another marker is
    /// treated the same way.
    pub fn mark_disputed(&self, order_id: &str) -> anyhow::Result<Order> {
        let (old_bytes, mut order) = self.load(order_id)?;
        if order.is_disputed {
            return Ok(order);
        }

        order.is_disputed = true;
        order.updated_at = TimeStamp::new();

        let swapped = self.orders.compare_and_swap(
            order_id.as_bytes(),
            Some(old_bytes),
            Some(minicbor::to_vec(&order)?),
        )?;

        match swapped {
            Ok(()) => Ok(order),
            Err(_) => {
                let (_, current) = self.load(order_id)?;
                if current.is_disputed {
                    Ok(current)
                } else {
                    Err(MarketError::Conflict(format!(
                        "order {order_id} changed concurrently"
                    ))
                    .into())
                }
            }
        }
    }

    pub fn get(&self, order_id: &str) -> anyhow::Result<Order> {
        Ok(self.load(order_id)?.1)
    }

    /// Every order row, for read-side projections.
    pub fn all(&self) -> anyhow::Result<Vec<Order>> {
        let mut out = Vec::new();
        for row in self.orders.iter() {
            let (_, value) = row?;
            out.push(minicbor::decode(&value)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::PackagingType;

    fn store() -> OrderStore {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let chat = ChatChannel::new(&db).unwrap();
        OrderStore::new(&db, chat.clone()).unwrap()
    }

    fn open_order(store: &OrderStore) -> Order {
        store
            .create(
                OrderDraft::new()
                    .requester("user1client")
                    .title("pack 40 crates")
                    .add_item("SKU-1", "ceramic vases", 40, PackagingType::Crate)
                    .publish_on_create(),
            )
            .unwrap()
    }

    #[test]
    fn transition_on_unknown_order_is_not_found() {
        let err = store()
            .transition("order1missing", OrderEvent::Publish, "user1a")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MarketError>(),
            Some(MarketError::NotFound { .. })
        ));
    }

    #[test]
    fn illegal_event_is_invalid_transition() {
        let store = store();
        let order = open_order(&store);

        let err = store
            .transition(&order.id, OrderEvent::SendInvoice, "user1a")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MarketError>(),
            Some(MarketError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn mark_disputed_is_idempotent() {
        let store = store();
        let order = open_order(&store);

        let first = store.mark_disputed(&order.id).unwrap();
        assert!(first.is_disputed);

        let second = store.mark_disputed(&order.id).unwrap();
        assert!(second.is_disputed);
        assert_eq!(first.updated_at, second.updated_at);
    }

    #[test]
    fn cancel_clears_accepted_executor() {
        let store = store();
        let mut order = open_order(&store);

        // book directly through the row to exercise the invariant
        order.status = OrderStatus::Booked;
        order.accepted_executor_id = Some("user1packer".to_string());
        store
            .orders
            .insert(order.id.as_bytes(), minicbor::to_vec(&order).unwrap())
            .unwrap();

        let cancelled = store
            .transition(&order.id, OrderEvent::Cancel, "user1client")
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(cancelled.accepted_executor_id.is_none());
    }
}
