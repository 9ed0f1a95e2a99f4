//! Reconciliation engine
//!
//! Merges one batch of freshly collected listings for a region against the
//! store's active snapshots: inserts new listings, updates changed prices
//! with history entries, refreshes sightings, and applies the grace-period
//! soft-delete policy to listings missing from the results.
//!
//! The whole read-snapshot / process-incoming / compute-missing sequence is
//! one logical pass per region; callers must not start the next pass for a
//! region before the previous one finishes, or the missing-set computation
//! is unsound.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::listing::{CanonicalListing, DeletionHistoryEntry, PriceHistoryEntry};
use crate::domain::repositories::ListingStore;
use crate::domain::stats::RegionRunReport;

pub struct ReconciliationEngine<S: ListingStore> {
    store: Arc<S>,
    grace_period_days: i64,
}

impl<S: ListingStore> ReconciliationEngine<S> {
    pub fn new(store: Arc<S>, grace_period_days: i64) -> Self {
        Self {
            store,
            grace_period_days,
        }
    }

    /// Run one reconciliation pass for a region.
    ///
    /// A failure reading the active snapshots aborts the pass (run-level
    /// error, nothing rolled back); failures persisting individual records
    /// are logged with the offending listing id and the batch continues.
    pub async fn reconcile_region(
        &self,
        region_code: &str,
        batch: &[CanonicalListing],
        today: NaiveDate,
    ) -> Result<RegionRunReport> {
        let started = Instant::now();
        let mut report = RegionRunReport::new(region_code, today);

        let snapshots: HashMap<String, _> = self
            .store
            .active_snapshots(region_code)
            .await
            .with_context(|| format!("reading active snapshots for region {region_code}"))?
            .into_iter()
            .map(|snap| (snap.listing_id.clone(), snap))
            .collect();
        debug!(
            region = region_code,
            stored = snapshots.len(),
            incoming = batch.len(),
            "starting reconciliation pass"
        );

        let mut seen: HashSet<&str> = HashSet::with_capacity(batch.len());

        for listing in batch {
            if !listing.is_persistable() {
                warn!(listing_id = %listing.listing_id, "skipping non-persistable record");
                report.persist_failures += 1;
                continue;
            }
            seen.insert(listing.listing_id.as_str());
            report.processed += 1;

            match snapshots.get(&listing.listing_id) {
                None => {
                    // New (or previously deactivated) listing - idempotent
                    // upsert keyed on listing_id, so repeated runs never
                    // produce duplicate-key failures.
                    match self.store.upsert_listing(listing).await {
                        Ok(true) => report.inserted += 1,
                        Ok(false) => report.updated += 1,
                        Err(e) => {
                            warn!(listing_id = %listing.listing_id, error = %e, "upsert failed, skipping record");
                            report.persist_failures += 1;
                        }
                    }
                }
                Some(snapshot) if snapshot.prices_differ(listing) => {
                    match self.store.update_prices(listing, today).await {
                        Ok(()) => {
                            report.updated += 1;
                            let entry = PriceHistoryEntry::from_change(snapshot, listing, today);
                            debug!(
                                listing_id = %listing.listing_id,
                                amount = ?entry.change_amount,
                                percent = ?entry.change_percent,
                                "price change detected"
                            );
                            if let Err(e) = self.store.insert_price_history(&entry).await {
                                warn!(listing_id = %listing.listing_id, error = %e, "price history write failed");
                                report.persist_failures += 1;
                            } else {
                                report.price_changes += 1;
                            }
                        }
                        Err(e) => {
                            warn!(listing_id = %listing.listing_id, error = %e, "price update failed, skipping record");
                            report.persist_failures += 1;
                        }
                    }
                }
                Some(_) => match self.store.touch_last_seen(&listing.listing_id, today).await {
                    Ok(()) => report.unchanged += 1,
                    Err(e) => {
                        warn!(listing_id = %listing.listing_id, error = %e, "last-seen refresh failed");
                        report.persist_failures += 1;
                    }
                },
            }
        }

        // Stored listings missing from this run's results. The countdown is
        // anchored to the last confirmed sighting: inside the grace window
        // last_seen_date stays untouched, so run frequency cannot advance it.
        for (listing_id, snapshot) in &snapshots {
            if seen.contains(listing_id.as_str()) {
                continue;
            }
            let days_missing = (today - snapshot.last_seen_date).num_days();
            if days_missing < self.grace_period_days {
                debug!(
                    listing_id = %listing_id,
                    days_missing,
                    "inside grace period, no action"
                );
                continue;
            }

            match self.store.deactivate(listing_id, today).await {
                Ok(()) => {
                    report.deactivated += 1;
                    let entry =
                        DeletionHistoryEntry::grace_period_expiry(snapshot, region_code, today);
                    info!(
                        listing_id = %listing_id,
                        days_missing,
                        days_active = ?entry.days_active,
                        "🪦 listing presumed delisted, soft-deleted"
                    );
                    if let Err(e) = self.store.insert_deletion_history(&entry).await {
                        warn!(listing_id = %listing_id, error = %e, "deletion history write failed");
                        report.persist_failures += 1;
                    }
                }
                Err(e) => {
                    warn!(listing_id = %listing_id, error = %e, "deactivation failed");
                    report.persist_failures += 1;
                }
            }
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!("✅ {}", report.summary());
        Ok(report)
    }
}
