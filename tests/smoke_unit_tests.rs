//! Smoke screen unit tests for the marketplace engine components
//!
//! These span the codebase and test behavior in isolation from integration
//! scenarios; they are intended as a smoke screen and generally cover the
//! happy path plus the documented edge cases.
use chrono::{Duration, Utc};
use packbid::arbitration::{
    client_eligible, executor_eligible, hours_until_client_eligible, hours_until_eligible,
};
use packbid::{
    BidProposal, MarketError, OrderDraft, OrderEvent, OrderStatus, PackagingType, TimeStamp,
    utils::new_uuid_to_bech32,
};

mod utils_tests {
    use super::*;

    #[test]
    fn generates_valid_bech32_with_hrp() {
        let encoded = new_uuid_to_bech32("order").unwrap();
        assert!(encoded.starts_with("order1"));
        assert!(encoded.len() > 10);
    }

    #[test]
    fn handles_empty_hrp() {
        assert!(new_uuid_to_bech32("").is_err());
    }

    #[test]
    fn generates_unique_ids() {
        let id1 = new_uuid_to_bech32("bid").unwrap();
        let id2 = new_uuid_to_bech32("bid").unwrap();
        assert_ne!(id1, id2);
    }
}

mod order_tests {
    use super::*;

    #[test]
    fn status_strings_match_wire_values() {
        assert_eq!(OrderStatus::Draft.as_str(), "draft");
        assert_eq!(OrderStatus::Open.as_str(), "open");
        assert_eq!(OrderStatus::Searching.as_str(), "searching");
        assert_eq!(OrderStatus::Booked.as_str(), "booked");
        assert_eq!(OrderStatus::InProgress.as_str(), "in_progress");
        assert_eq!(OrderStatus::AwaitingPayment.as_str(), "awaiting_payment");
        assert_eq!(OrderStatus::Completed.as_str(), "completed");
        assert_eq!(OrderStatus::Cancelled.as_str(), "cancelled");
    }

    #[test]
    fn full_happy_path_through_the_state_machine() {
        let mut status = OrderStatus::Draft;
        for event in [
            OrderEvent::Publish,
            OrderEvent::StartWork,
            OrderEvent::SendInvoice,
            OrderEvent::ConfirmPayment,
        ] {
            // booking happens through the ledger, not through an event
            if status.is_awaiting_bids() {
                status = OrderStatus::Booked;
            }
            status = status.apply(event).unwrap();
        }
        assert_eq!(status, OrderStatus::Completed);
    }

    #[test]
    fn searching_behaves_like_open() {
        assert!(OrderStatus::Searching.is_awaiting_bids());
        assert_eq!(
            OrderStatus::Searching.apply(OrderEvent::Cancel).unwrap(),
            OrderStatus::Cancelled
        );
        assert!(matches!(
            OrderStatus::Searching.apply(OrderEvent::Publish),
            Err(MarketError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn draft_builder_collects_line_items_in_order() {
        let order = OrderDraft::new()
            .requester("user1client")
            .title("office move")
            .add_item("SKU-1", "monitors", 24, PackagingType::Box)
            .add_item("SKU-2", "server rack", 1, PackagingType::Pallet)
            .add_item("SKU-3", "contracts", 300, PackagingType::Envelope)
            .validate_and_build()
            .unwrap();

        assert_eq!(order.items.len(), 3);
        assert_eq!(order.items[0].sku, "SKU-1");
        assert_eq!(order.items[2].packaging_type, PackagingType::Envelope);
    }

    #[test]
    fn budget_and_deadline_are_advisory() {
        // no hard validation: an order without either still builds
        let order = OrderDraft::new()
            .requester("user1client")
            .title("pack 40 crates")
            .validate_and_build()
            .unwrap();
        assert!(order.budget.is_none());
        assert!(order.deadline.is_none());
    }
}

mod bid_tests {
    use super::*;

    #[test]
    fn priced_bid_validation_matrix() {
        assert!(BidProposal::priced(45_000, 5).validate(false).is_ok());
        assert!(BidProposal::priced(0, 5).validate(false).is_err());
        assert!(BidProposal::priced(45_000, 0).validate(false).is_err());

        // a comment alone is not enough on a regular order
        assert!(BidProposal::estimate("cheap and fast").validate(false).is_err());
    }

    #[test]
    fn estimation_bid_validation_matrix() {
        assert!(BidProposal::estimate("~40000 in 5 days").validate(true).is_ok());
        assert!(BidProposal::estimate("").validate(true).is_err());

        // price on an estimation request is tolerated as long as the
        // comment is there
        let proposal = BidProposal::priced(45_000, 5).with_comment("roughly this");
        assert!(proposal.validate(true).is_ok());
    }
}

mod arbitration_tests {
    use super::*;

    fn in_progress(deadline_hours_ago: i64, now: chrono::DateTime<Utc>) -> packbid::Order {
        let mut order = OrderDraft::new()
            .requester("user1client")
            .title("pack 40 crates")
            .deadline((now - Duration::hours(deadline_hours_ago)).into())
            .validate_and_build()
            .unwrap();
        order.status = OrderStatus::InProgress;
        order.accepted_executor_id = Some("user1packer".to_string());
        order
    }

    #[test]
    fn eligibility_is_a_step_function_of_elapsed_time() {
        let now = Utc::now();

        // 23h59m after the deadline: one minute short
        let order = in_progress(0, now);
        let just_before = order.deadline.clone().unwrap().to_datetime_utc()
            + Duration::hours(23)
            + Duration::minutes(59);
        assert!(!client_eligible(&order, just_before));

        let at_the_window =
            order.deadline.clone().unwrap().to_datetime_utc() + Duration::hours(24);
        assert!(client_eligible(&order, at_the_window));
    }

    #[test]
    fn client_countdown_at_known_offsets() {
        let now = Utc::now();

        let overdue = in_progress(25, now);
        assert!(client_eligible(&overdue, now));
        assert_eq!(hours_until_client_eligible(&overdue, now), Some(0));

        let recent = in_progress(10, now);
        assert!(!client_eligible(&recent, now));
        assert_eq!(hours_until_client_eligible(&recent, now), Some(14));
    }

    #[test]
    fn executor_window_anchors_on_the_invoice() {
        let now = Utc::now();
        let mut order = in_progress(48, now);
        order.status = OrderStatus::AwaitingPayment;

        let invoice: TimeStamp<Utc> = (now - Duration::hours(25)).into();
        assert!(executor_eligible(&order, now, Some(&invoice)));

        // the overdue deadline is irrelevant to the executor's window
        let invoice: TimeStamp<Utc> = (now - Duration::hours(1)).into();
        assert!(!executor_eligible(&order, now, Some(&invoice)));
    }

    #[test]
    fn countdown_never_goes_negative() {
        let now = Utc::now();
        assert_eq!(hours_until_eligible(now - Duration::hours(500), now), 0);
        assert_eq!(hours_until_eligible(now, now), 24);
    }
}
