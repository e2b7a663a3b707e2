//! Append-only per-order message log
use super::types::TimeStamp;
use super::utils;
use chrono::Utc;
use sled::{Db, Tree};
use std::collections::BTreeSet;

pub const MESSAGES_TREE: &str = "messages";

/// A chat message on an order. System messages are appended by the engine
/// itself when externally-visible state changes; user messages come from the
/// participants. Rows are insert-only and never mutated.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Message {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub order_id: String,
    #[n(2)]
    pub sender_id: String,
    #[n(3)]
    pub content: String,
    #[n(4)]
    pub is_system: bool,
    #[n(5)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(Clone)]
pub struct ChatChannel {
    messages: Tree,
}

impl ChatChannel {
    pub fn new(db: &Db) -> anyhow::Result<Self> {
        Ok(Self {
            messages: db.open_tree(MESSAGES_TREE)?,
        })
    }

    // Keys sort as order_id / creation nanos / message id, so a prefix scan
    // yields one order's messages in createdAt ascending order.
    fn key_for(message: &Message) -> anyhow::Result<Vec<u8>> {
        let nanos = message
            .created_at
            .to_datetime_utc()
            .timestamp_nanos_opt()
            .ok_or_else(|| anyhow::anyhow!("message timestamp out of range"))?;

        Ok(format!("{}/{:020}/{}", message.order_id, nanos, message.id).into_bytes())
    }

    /// Append a message to an order's log and return the stored row.
    pub fn append(
        &self,
        order_id: &str,
        sender_id: &str,
        content: &str,
        is_system: bool,
    ) -> anyhow::Result<Message> {
        let message = Message {
            id: utils::new_uuid_to_bech32("msg")?,
            order_id: order_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            is_system,
            created_at: TimeStamp::new(),
        };

        self.messages
            .insert(Self::key_for(&message)?, minicbor::to_vec(&message)?)?;

        Ok(message)
    }

    /// All messages for an order, createdAt ascending.
    pub fn list(&self, order_id: &str) -> anyhow::Result<Vec<Message>> {
        let prefix = format!("{order_id}/");
        let mut out = Vec::new();
        for row in self.messages.scan_prefix(prefix.as_bytes()) {
            let (_, value) = row?;
            out.push(minicbor::decode(&value)?);
        }
        Ok(out)
    }

    /// Distinct senders on an order's log. A manager "connects" to an order
    /// simply by sending its first message, so participation is observable
    /// here without any extra state.
    pub fn participants(&self, order_id: &str) -> anyhow::Result<BTreeSet<String>> {
        let mut senders = BTreeSet::new();
        for message in self.list(order_id)? {
            senders.insert(message.sender_id);
        }
        Ok(senders)
    }

    /// Every message in the store, for read-side projections.
    pub fn all(&self) -> anyhow::Result<Vec<Message>> {
        let mut out = Vec::new();
        for row in self.messages.iter() {
            let (_, value) = row?;
            out.push(minicbor::decode(&value)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> ChatChannel {
        let db = sled::Config::new().temporary(true).open().unwrap();
        ChatChannel::new(&db).unwrap()
    }

    #[test]
    fn list_returns_messages_in_append_order() {
        let chat = channel();

        chat.append("order1a", "user1x", "first", false).unwrap();
        chat.append("order1a", "user1y", "second", false).unwrap();
        chat.append("order1b", "user1x", "other order", false).unwrap();

        let log = chat.list("order1a").unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].content, "first");
        assert_eq!(log[1].content, "second");
        assert!(log[0].created_at <= log[1].created_at);
    }

    #[test]
    fn participants_are_distinct_senders() {
        let chat = channel();

        chat.append("order1a", "user1x", "hello", false).unwrap();
        chat.append("order1a", "user1x", "again", false).unwrap();
        chat.append("order1a", "manager1z", "joining this order", false).unwrap();

        let participants = chat.participants("order1a").unwrap();
        assert_eq!(participants.len(), 2);
        assert!(participants.contains("manager1z"));
    }

    #[test]
    fn system_flag_is_preserved() {
        let chat = channel();

        chat.append("order1a", "user1x", "Order published", true).unwrap();
        let log = chat.list("order1a").unwrap();
        assert!(log[0].is_system);
    }
}
