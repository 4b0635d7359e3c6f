mod common;

use std::time::Duration;

use boxo_commerce::prelude::*;
use boxo_commerce::store::{DiscountRepository, OrderRepository, SagaRepository};
use common::*;

async fn place_order(f: &Fixture) -> Order {
    f.cart_worth_100k().await;
    f.orchestrator
        .process_payment(&f.user, PaymentRequest::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_status_moves_forward_only() {
    let f = fixture();
    let order = place_order(&f).await;

    f.orchestrator.checkout_order(&f.user, &order.id).await.unwrap();
    let shipped = f
        .orchestrator
        .update_status(&order.id, OrderStatus::Shipped)
        .await
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
    f.orchestrator
        .update_status(&order.id, OrderStatus::Delivered)
        .await
        .unwrap();

    let err = f
        .orchestrator
        .update_status(&order.id, OrderStatus::Paid)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(err.to_string(), "Invalid order transition from DELIVERED to PAID");

    let err = f
        .orchestrator
        .update_status(&order.id, OrderStatus::Canceled)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    let stored = f.orchestrator.get_order(&order.id).await.unwrap().order;
    assert_eq!(stored.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn test_pending_order_can_be_canceled() {
    let f = fixture();
    let order = place_order(&f).await;

    let canceled = f
        .orchestrator
        .update_status(&order.id, OrderStatus::Canceled)
        .await
        .unwrap();
    assert_eq!(canceled.status, OrderStatus::Canceled);

    let err = f
        .orchestrator
        .update_status(&OrderId::new("ghost"), OrderStatus::Canceled)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_status_changes_land_in_the_inbox() {
    let f = fixture();
    let mut events = f.channel.subscribe();
    let order = place_order(&f).await;

    f.orchestrator
        .update_status(&order.id, OrderStatus::Canceled)
        .await
        .unwrap();

    // Pushes run on spawned tasks, so skip ahead to the status change.
    let event = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.unwrap();
            if event.payload.order_status == Some(OrderStatus::Canceled) {
                return event;
            }
        }
    })
    .await
    .expect("no live event");
    assert_eq!(event.payload.title, "Đơn hàng đã bị hủy");

    let inbox = f.orchestrator.notifications_for(&f.user).await.unwrap();
    assert_eq!(inbox.len(), 2);
    assert_eq!(inbox[0].order_status, Some(OrderStatus::Canceled));
    assert_eq!(inbox[1].title, "Đặt hàng thành công");

    let read = f
        .orchestrator
        .mark_notification_read(&f.user, &inbox[0].id)
        .await
        .unwrap();
    assert!(read.is_read);

    let err = f
        .orchestrator
        .mark_notification_read(&UserId::new("someone-else"), &inbox[1].id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_shipping_updates_follow_the_state_machine() {
    let f = fixture();
    let order = place_order(&f).await;

    let shipping = f
        .orchestrator
        .update_shipping(
            &order.id,
            ShippingUpdate {
                status: None,
                description: Some("Packed at Thu Duc warehouse".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(shipping.status, ShippingStatus::Pending);
    assert_eq!(shipping.description.as_deref(), Some("Packed at Thu Duc warehouse"));

    let err = f
        .orchestrator
        .update_shipping(
            &order.id,
            ShippingUpdate {
                status: Some(ShippingStatus::Delivered),
                description: Some("skipped ahead".into()),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    // A rejected update changes nothing.
    let current = f.orchestrator.get_shipping(&order.id).await.unwrap();
    assert_eq!(current.status, ShippingStatus::Pending);
    assert_eq!(current.description.as_deref(), Some("Packed at Thu Duc warehouse"));

    for status in [ShippingStatus::Shipped, ShippingStatus::Delivered] {
        f.orchestrator
            .update_shipping(
                &order.id,
                ShippingUpdate {
                    status: Some(status),
                    description: None,
                },
            )
            .await
            .unwrap();
    }
    let current = f.orchestrator.get_shipping(&order.id).await.unwrap();
    assert_eq!(current.status, ShippingStatus::Delivered);

    let err = f
        .orchestrator
        .get_shipping(&OrderId::new("ghost"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_order_listing_pages_and_summaries() {
    let f = fixture();
    let mut placed = Vec::new();
    for _ in 0..3 {
        placed.push(place_order(&f).await);
    }
    f.orchestrator
        .update_status(&placed[0].id, OrderStatus::Canceled)
        .await
        .unwrap();

    let first = f
        .orchestrator
        .list_orders(&OrderFilter::for_user(f.user.clone()), PageRequest::new(1, 2))
        .await
        .unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first.pagination.total, 3);
    assert_eq!(first.pagination.total_pages, 2);
    assert!(first.pagination.has_next);

    let second = f
        .orchestrator
        .list_orders(&OrderFilter::for_user(f.user.clone()), PageRequest::new(2, 2))
        .await
        .unwrap();
    assert_eq!(second.len(), 1);
    assert!(!second.pagination.has_next);

    let canceled = f
        .orchestrator
        .list_orders(
            &OrderFilter::default().with_status(OrderStatus::Canceled),
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(canceled.len(), 1);
    assert_eq!(canceled.items[0].id, placed[0].id);

    let nobody = f
        .orchestrator
        .list_orders(&OrderFilter::for_user(UserId::new("nobody")), PageRequest::default())
        .await
        .unwrap();
    assert!(nobody.is_empty());
    assert_eq!(nobody.pagination.total_pages, 0);

    let summaries = f
        .orchestrator
        .list_order_summaries(&OrderFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(summaries.len(), 3);
    for summary in &summaries.items {
        assert_eq!(summary.quantity, 2);
        assert_eq!(summary.payment_type, Some(PaymentType::CashOnDelivery));
        assert_eq!(summary.total_payment, Money::from_dong(111_500));
    }
}

#[tokio::test]
async fn test_public_discounts_skip_private_and_expired() {
    let f = fixture();
    f.store
        .put_discount(percentage_discount("PUBLIC10", 10.0, 5, 0).public());
    f.store.put_discount(percentage_discount("SECRET", 10.0, 5, 0));
    let now = chrono::Utc::now();
    f.store.put_discount(
        Discount::new(
            "OLD",
            "Old",
            DiscountKind::Percentage(5.0),
            now - chrono::Duration::days(30),
            now - chrono::Duration::days(1),
        )
        .public(),
    );

    let listed = f.orchestrator.public_discounts().await.unwrap();
    let codes: Vec<_> = listed.iter().map(|d| d.code.as_str()).collect();
    assert_eq!(codes, vec!["PUBLIC10"]);
}

#[tokio::test]
async fn test_reconcile_unwinds_failed_payment_step() {
    let store = seeded_store();
    let f = fixture_with(store.clone(), |mut stores| {
        stores.payments = Arc::new(FailingPayments {
            inner: store.clone(),
        });
        stores
    });
    f.cart_worth_100k().await;

    let err = f
        .orchestrator
        .process_payment(&f.user, PaymentRequest::default())
        .await
        .unwrap_err();
    let CommerceError::CheckoutInterrupted { order_id, step, .. } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(*step, CheckoutStep::PaymentCreated);
    assert_eq!(err.kind(), ErrorKind::Storage);
    let order_id = OrderId::new(order_id.clone());

    // Nothing past the failed step happened.
    assert_eq!(f.stock(BOOK_A), 10);
    assert_eq!(f.carts().get_cart(&f.user).await.unwrap().items.len(), 1);

    let report = f.orchestrator.reconcile().await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.compensated, vec![order_id.clone()]);

    let details = f.orchestrator.get_order(&order_id).await.unwrap();
    assert_eq!(details.order.status, OrderStatus::Canceled);
    assert_eq!(details.shipping.unwrap().status, ShippingStatus::Canceled);
    assert!(details.payment.is_none());

    let saga = store.find_saga_by_order(&order_id).await.unwrap().unwrap();
    assert_eq!(saga.state, SagaState::Compensated);

    let again = f.orchestrator.reconcile().await.unwrap();
    assert_eq!(again.examined, 0);
}

#[tokio::test]
async fn test_reconcile_restores_cart_and_stock_after_redemption_race() {
    let store = seeded_store();
    store.put_discount(percentage_discount("SAVE10", 10.0, 1, 0));
    let f = fixture_with(store.clone(), |mut stores| {
        stores.discounts = Arc::new(RedemptionRace {
            inner: store.clone(),
        });
        stores
    });
    f.cart_worth_100k().await;

    let err = f
        .orchestrator
        .process_payment(
            &f.user,
            PaymentRequest::default().with_discount_code("SAVE10"),
        )
        .await
        .unwrap_err();
    let CommerceError::CheckoutInterrupted { order_id, step, .. } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(*step, CheckoutStep::DiscountRedeemed);
    let order_id = OrderId::new(order_id.clone());

    assert_eq!(f.stock(BOOK_A), 8);
    assert!(f.carts().get_cart(&f.user).await.unwrap().is_empty());

    // A half-finished checkout cannot be paid for.
    let err = f
        .orchestrator
        .checkout_order(&f.user, &order_id)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Order checkout did not complete");

    let report = f.orchestrator.reconcile().await.unwrap();
    assert_eq!(report.compensated, vec![order_id.clone()]);

    assert_eq!(f.stock(BOOK_A), 10);
    let cart = f.carts().get_cart(&f.user).await.unwrap();
    assert_eq!(cart.get_item(&BookId::new(BOOK_A)).unwrap().quantity, 2);

    let details = f.orchestrator.get_order(&order_id).await.unwrap();
    assert_eq!(details.order.status, OrderStatus::Canceled);
    assert!(details.payment.unwrap().voided);

    // The redemption never happened, so nothing was handed back.
    let discount = store.find_by_code("SAVE10").await.unwrap().unwrap();
    assert_eq!(discount.quantity, 1);
}

#[tokio::test]
async fn test_reconcile_handles_abandoned_sagas() {
    let f = fixture();
    let order = place_order(&f).await;
    let stale = chrono::Utc::now() - chrono::Duration::hours(1);

    // A process that died after the order row was written.
    let mut orphan = order.clone();
    orphan.id = OrderId::new("orphan");
    f.store.insert_order(&orphan).await.unwrap();
    let mut saga = CheckoutSaga::begin(f.user.clone(), orphan.id.clone());
    saga.record(CheckoutStep::OrderCreated);
    saga.updated_at = stale;
    f.store.save_saga(&saga).await.unwrap();

    // One that died after every mutation but before notifying the customer.
    let mut finished = f.store.find_saga_by_order(&order.id).await.unwrap().unwrap();
    finished.state = SagaState::InProgress;
    finished
        .completed
        .retain(|step| *step != CheckoutStep::CustomerNotified);
    finished.updated_at = stale;
    f.store.save_saga(&finished).await.unwrap();

    // A checkout still running is left alone.
    let fresh = CheckoutSaga::begin(f.user.clone(), OrderId::new("in-flight"));
    f.store.save_saga(&fresh).await.unwrap();

    let placed_notices = |inbox: &[Notification]| {
        inbox
            .iter()
            .filter(|n| n.order_id.as_ref() == Some(&order.id) && n.title == "Đặt hàng thành công")
            .count()
    };
    let before = f.orchestrator.notifications_for(&f.user).await.unwrap();
    assert_eq!(placed_notices(&before), 1);

    let report = f.orchestrator.reconcile().await.unwrap();
    assert_eq!(report.examined, 2);
    assert_eq!(report.compensated, vec![orphan.id.clone()]);
    assert_eq!(report.completed, vec![order.id.clone()]);

    let after = f.orchestrator.notifications_for(&f.user).await.unwrap();
    assert_eq!(placed_notices(&after), 2);
    let closed = f.store.find_saga_by_order(&order.id).await.unwrap().unwrap();
    assert!(closed.is_completed());
    assert!(closed.has_completed(CheckoutStep::CustomerNotified));

    assert_eq!(
        f.store.get_order(&orphan.id).await.unwrap().unwrap().status,
        OrderStatus::Canceled
    );
    assert_eq!(
        f.store.get_order(&order.id).await.unwrap().unwrap().status,
        OrderStatus::Pending
    );
    f.orchestrator.checkout_order(&f.user, &order.id).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_reconciliation() {
    let store = seeded_store();
    let f = fixture_with(store.clone(), |mut stores| {
        stores.payments = Arc::new(FailingPayments {
            inner: store.clone(),
        });
        stores
    });
    f.cart_worth_100k().await;
    assert!(f
        .orchestrator
        .process_payment(&f.user, PaymentRequest::default())
        .await
        .is_err());

    let mut scheduler = JobScheduler::new();
    scheduler.register(
        Arc::new(ReconciliationJob::new(f.orchestrator.clone())),
        f.orchestrator.settings().reconcile_interval(),
    );
    scheduler.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    scheduler.stop().await;

    let status = scheduler.status("reconcile-checkouts").unwrap();
    assert_eq!(status.runs, 1);
    assert_eq!(status.failures, 0);

    let sagas = store.list_sagas().await.unwrap();
    assert_eq!(sagas.len(), 1);
    assert_eq!(sagas[0].state, SagaState::Compensated);
}
