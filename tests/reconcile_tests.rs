//! Reconciliation engine behavior: idempotence, grace-period boundaries,
//! price-change history, and partial-batch resilience.

mod common;

use chrono::NaiveDate;
use std::sync::Arc;

use common::{active_row, MemoryListingStore};
use land_collector_lib::application::ReconciliationEngine;
use land_collector_lib::domain::listing::{CanonicalListing, TradeType, GRACE_PERIOD_DAYS};

const REGION: &str = "1168010700";

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

fn sale_listing(id: &str, price: i64, collected: NaiveDate) -> CanonicalListing {
    let mut listing = CanonicalListing::new(id.to_string(), REGION.to_string(), collected);
    listing.trade_type = TradeType::Sale;
    listing.sale_price = Some(price);
    listing
}

fn engine(store: &Arc<MemoryListingStore>) -> ReconciliationEngine<MemoryListingStore> {
    ReconciliationEngine::new(store.clone(), GRACE_PERIOD_DAYS)
}

#[tokio::test]
async fn new_listing_is_inserted() {
    let store = Arc::new(MemoryListingStore::new());
    let batch = vec![sale_listing("A1", 50000, day(1))];

    let report = engine(&store)
        .reconcile_region(REGION, &batch, day(1))
        .await
        .unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.processed, 1);
    let row = store.row("A1").unwrap();
    assert!(row.is_active);
    assert_eq!(row.sale_price, Some(50000));
    assert_eq!(row.first_seen_date, day(1));
}

#[tokio::test]
async fn second_identical_run_is_idempotent() {
    let store = Arc::new(MemoryListingStore::new());
    let engine = engine(&store);
    let batch = vec![sale_listing("A1", 50000, day(1))];

    engine.reconcile_region(REGION, &batch, day(1)).await.unwrap();
    let second = engine.reconcile_region(REGION, &batch, day(1)).await.unwrap();

    assert_eq!(second.inserted, 0);
    assert_eq!(second.unchanged, 1);
    assert!(store.price_history.lock().unwrap().is_empty());
    assert_eq!(store.row("A1").unwrap().last_seen_date, day(1));
}

#[tokio::test]
async fn price_change_updates_and_emits_history() {
    // Stored: A1 at 50,000 seen on day 1; incoming: 55,000 on day 2.
    let store = Arc::new(MemoryListingStore::new());
    store.seed("A1", active_row(REGION, Some(50000), day(1), day(1)));

    let batch = vec![sale_listing("A1", 55000, day(2))];
    let report = engine(&store)
        .reconcile_region(REGION, &batch, day(2))
        .await
        .unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.price_changes, 1);

    let row = store.row("A1").unwrap();
    assert_eq!(row.sale_price, Some(55000));
    assert_eq!(row.last_seen_date, day(2));

    let history = store.price_history.lock().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].prev_sale_price, Some(50000));
    assert_eq!(history[0].new_sale_price, Some(55000));
    assert_eq!(history[0].change_amount, Some(5000));
    assert_eq!(history[0].change_percent, Some(10.0));
    assert_eq!(history[0].changed_date, day(2));
}

#[tokio::test]
async fn unchanged_prices_only_refresh_last_seen() {
    let store = Arc::new(MemoryListingStore::new());
    store.seed("A1", active_row(REGION, Some(50000), day(1), day(1)));

    let batch = vec![sale_listing("A1", 50000, day(2))];
    let report = engine(&store)
        .reconcile_region(REGION, &batch, day(2))
        .await
        .unwrap();

    assert_eq!(report.unchanged, 1);
    assert_eq!(report.updated, 0);
    assert!(store.price_history.lock().unwrap().is_empty());
    assert_eq!(store.row("A1").unwrap().last_seen_date, day(2));
}

#[tokio::test]
async fn two_days_missing_stays_active_and_untouched() {
    let store = Arc::new(MemoryListingStore::new());
    store.seed("A1", active_row(REGION, Some(50000), day(1), day(1)));

    // Empty results on day 3: 2 days missing, inside the grace window.
    let report = engine(&store)
        .reconcile_region(REGION, &[], day(3))
        .await
        .unwrap();

    assert_eq!(report.deactivated, 0);
    let row = store.row("A1").unwrap();
    assert!(row.is_active);
    // The grace countdown anchors on the last confirmed sighting.
    assert_eq!(row.last_seen_date, day(1));
    assert!(store.deletion_history.lock().unwrap().is_empty());
}

#[tokio::test]
async fn three_days_missing_soft_deletes_with_history() {
    let store = Arc::new(MemoryListingStore::new());
    store.seed("A1", active_row(REGION, Some(50000), day(1), day(1)));

    let report = engine(&store)
        .reconcile_region(REGION, &[], day(4))
        .await
        .unwrap();

    assert_eq!(report.deactivated, 1);
    let row = store.row("A1").unwrap();
    assert!(!row.is_active);
    assert_eq!(row.deleted_date, Some(day(4)));

    let history = store.deletion_history.lock().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].deletion_reason, "not_found_after_grace_period");
    assert_eq!(history[0].days_active, Some(3));
    assert_eq!(history[0].last_sale_price, Some(50000));
    assert_eq!(history[0].region_code, REGION);
}

#[tokio::test]
async fn delisted_after_grace_period_end_to_end() {
    // Snapshot first seen day 0 equivalent (day 1 here), absent from results
    // on day 5 (> grace period): deactivated, days_active derived from
    // first sighting to deletion.
    let store = Arc::new(MemoryListingStore::new());
    store.seed("A1", active_row(REGION, Some(50000), day(1), day(1)));

    let other = vec![sale_listing("B2", 30000, day(5))];
    let report = engine(&store)
        .reconcile_region(REGION, &other, day(5))
        .await
        .unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.deactivated, 1);
    assert!(!store.row("A1").unwrap().is_active);
    assert_eq!(
        store.deletion_history.lock().unwrap()[0].days_active,
        Some(4)
    );
}

#[tokio::test]
async fn snapshot_read_failure_aborts_the_pass() {
    let store = Arc::new(MemoryListingStore::new());
    let engine = engine(&store);

    engine
        .reconcile_region(REGION, &[sale_listing("A1", 50000, day(1))], day(1))
        .await
        .unwrap();

    // Store outage at the start of the next pass: run-level error, nothing
    // from the new batch is applied, earlier writes stay in place.
    store.fail_snapshot_reads();
    let result = engine
        .reconcile_region(REGION, &[sale_listing("B2", 30000, day(2))], day(2))
        .await;

    assert!(result.is_err());
    assert!(store.row("A1").is_some());
    assert!(store.row("B2").is_none());
}

#[tokio::test]
async fn one_failing_record_does_not_abort_the_batch() {
    let store = Arc::new(MemoryListingStore::new());
    store.fail_writes_for("bad-7");

    let batch: Vec<_> = (0..10)
        .map(|i| {
            let id = if i == 7 { "bad-7".to_string() } else { format!("ok-{i}") };
            sale_listing(&id, 10000 + i, day(1))
        })
        .collect();

    let report = engine(&store)
        .reconcile_region(REGION, &batch, day(1))
        .await
        .unwrap();

    assert_eq!(report.inserted, 9);
    assert_eq!(report.persist_failures, 1);
    assert!(store.row("bad-7").is_none());
    assert!(store.row("ok-0").is_some());
    assert!(store.row("ok-9").is_some());
}

#[tokio::test]
async fn reactivated_listing_is_revived_through_upsert() {
    let store = Arc::new(MemoryListingStore::new());
    let mut row = active_row(REGION, Some(50000), day(1), day(1));
    row.is_active = false;
    row.deleted_date = Some(day(4));
    store.seed("A1", row);

    // Not in the active snapshot set, so it goes through the upsert path.
    let batch = vec![sale_listing("A1", 52000, day(10))];
    let report = engine(&store)
        .reconcile_region(REGION, &batch, day(10))
        .await
        .unwrap();

    assert_eq!(report.inserted + report.updated, 1);
    let row = store.row("A1").unwrap();
    assert!(row.is_active);
    assert_eq!(row.deleted_date, None);
    assert_eq!(row.sale_price, Some(52000));
    // First sighting is preserved across the revival.
    assert_eq!(row.first_seen_date, day(1));
}

#[tokio::test]
async fn grace_period_ignores_listings_from_other_regions() {
    let store = Arc::new(MemoryListingStore::new());
    store.seed("A1", active_row("9999999999", Some(50000), day(1), day(1)));

    let report = engine(&store)
        .reconcile_region(REGION, &[], day(10))
        .await
        .unwrap();

    assert_eq!(report.deactivated, 0);
    assert!(store.row("A1").unwrap().is_active);
}
