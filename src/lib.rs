pub mod arbitration;
pub mod bid;
pub mod chat;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod order;
pub mod store;
pub mod types;
pub mod utils;

pub use bid::{Bid, BidProposal, BidStatus};
pub use chat::{ChatChannel, Message};
pub use error::MarketError;
pub use ledger::BidLedger;
pub use notify::{NotificationAggregator, NotificationCounts};
pub use order::{LineItem, Order, OrderDraft, OrderEvent, OrderStatus, PackagingType};
pub use store::OrderStore;
pub use types::{Role, TimeStamp};
