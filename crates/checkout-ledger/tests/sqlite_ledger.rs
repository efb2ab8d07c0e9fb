#![cfg(feature = "sqlite")]

use checkout_ledger::sqlite::SqliteLedger;
use checkout_types::domain::order::{ItemSnapshot, NewOrder, OrderPatch, OrderStatus};
use checkout_types::ports::order_ledger::{LedgerError, OrderLedger};
use std::path::PathBuf;

fn temp_db_url() -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut path = PathBuf::from(dir.path());
    path.push("orders.db");
    let url = format!("sqlite://{}", path.display());
    (dir, url)
}

fn new_order(user_id: i64) -> NewOrder {
    NewOrder::new(
        user_id,
        vec![ItemSnapshot {
            product_id: 7,
            product_name: "Widget".into(),
            quantity: 2,
            price_cents: 2999,
        }],
    )
    .unwrap()
    .with_shipping_address(Some("1 Main St".into()))
}

#[tokio::test]
async fn sqlite_ledger_create_get_update_flow() {
    let (_dir, url) = temp_db_url();
    let ledger = SqliteLedger::new(&url).await.unwrap();

    let created = ledger
        .create_order_with_items(new_order(1).with_inventory_adjusted(true))
        .await
        .unwrap();
    assert_eq!(created.total_cents, 5998);

    let fetched = ledger.get(created.id).await.unwrap().unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched.items[0].product_name, "Widget");
    assert!(fetched.inventory_adjusted);

    let updated = ledger
        .update(
            created.id,
            OrderPatch::new()
                .expect_status(OrderStatus::Pending)
                .status(OrderStatus::Processing),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Processing);
    assert_eq!(updated.shipping_address.as_deref(), Some("1 Main St"));

    let shipped = ledger
        .update(
            created.id,
            OrderPatch::new()
                .status(OrderStatus::Shipped)
                .tracking_number(Some("TRK1".into())),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert_eq!(shipped.tracking_number.as_deref(), Some("TRK1"));
    assert_eq!(shipped.items.len(), 1);
}

#[tokio::test]
async fn sqlite_ledger_rejects_stale_expected_status() {
    let (_dir, url) = temp_db_url();
    let ledger = SqliteLedger::new(&url).await.unwrap();
    let created = ledger.create_order_with_items(new_order(1)).await.unwrap();

    let patch = OrderPatch::new()
        .expect_status(OrderStatus::Pending)
        .status(OrderStatus::Cancelled);
    ledger.update(created.id, patch.clone()).await.unwrap();

    let second = ledger.update(created.id, patch).await;
    assert!(matches!(
        second,
        Err(LedgerError::StatusConflict {
            actual: OrderStatus::Cancelled
        })
    ));
}

#[tokio::test]
async fn sqlite_ledger_lists_newest_first_per_user() {
    let (_dir, url) = temp_db_url();
    let ledger = SqliteLedger::new(&url).await.unwrap();

    let first = ledger.create_order_with_items(new_order(1)).await.unwrap();
    ledger.create_order_with_items(new_order(2)).await.unwrap();
    let second = ledger.create_order_with_items(new_order(1)).await.unwrap();

    let ids: Vec<i64> = ledger
        .list_for_user(1)
        .await
        .unwrap()
        .iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn sqlite_ledger_handles_missing_rows_and_reopens() {
    let (_dir, url) = temp_db_url();
    let ledger = SqliteLedger::new(&url).await.unwrap();
    assert!(ledger.get(404).await.unwrap().is_none());
    let updated = ledger
        .update(404, OrderPatch::new().status(OrderStatus::Shipped))
        .await
        .unwrap();
    assert!(updated.is_none());

    let created = ledger.create_order_with_items(new_order(3)).await.unwrap();
    drop(ledger);

    // Schema bootstrap is idempotent and data survives a reopen.
    let reopened = SqliteLedger::new(&url).await.unwrap();
    let fetched = reopened.get(created.id).await.unwrap().unwrap();
    assert_eq!(fetched.user_id, 3);
}

#[tokio::test]
async fn failed_item_insert_rolls_back_whole_order() {
    let (_dir, url) = temp_db_url();
    let ledger = SqliteLedger::new(&url).await.unwrap();

    let mut order = new_order(5);
    order.items.push(ItemSnapshot {
        product_id: 8,
        product_name: "Gadget".into(),
        quantity: 0,
        price_cents: 550,
    });

    let res = ledger.create_order_with_items(order).await;
    assert!(matches!(res, Err(LedgerError::DbError(_))));
    assert!(ledger.list_for_user(5).await.unwrap().is_empty());

    // The rolled-back insert leaves the ledger usable.
    let created = ledger.create_order_with_items(new_order(5)).await.unwrap();
    let listed = ledger.list_for_user(5).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);
    assert_eq!(listed[0].items.len(), 1);
}
