//! Collection driver
//!
//! Paginates the region search API, fetches per-listing detail under a
//! bounded worker pool, and feeds the accumulated batch into one
//! reconciliation pass per region. Requests are paced with a small courtesy
//! delay; an authorization failure gets one credential refresh and retry
//! before it becomes fatal for the run.

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::application::reconcile::ReconciliationEngine;
use crate::domain::listing::CanonicalListing;
use crate::domain::repositories::ListingStore;
use crate::domain::stats::RegionRunReport;
use crate::error::CollectorError;
use crate::infrastructure::config::CollectorConfig;
use crate::infrastructure::credential::CredentialProvider;
use crate::infrastructure::land_api::{LandApiClient, ListingSummary};
use crate::infrastructure::parsing::RecordProcessor;

/// Collection dates are Korea-local regardless of host timezone.
pub fn kst_today() -> NaiveDate {
    let kst = FixedOffset::east_opt(9 * 3600).expect("valid offset");
    Utc::now().with_timezone(&kst).date_naive()
}

pub struct ListingCollector<S: ListingStore> {
    api: Arc<LandApiClient>,
    credentials: Arc<dyn CredentialProvider>,
    processor: Arc<RecordProcessor>,
    engine: ReconciliationEngine<S>,
    config: CollectorConfig,
}

impl<S: ListingStore + 'static> ListingCollector<S> {
    pub fn new(
        api: LandApiClient,
        credentials: Arc<dyn CredentialProvider>,
        processor: RecordProcessor,
        store: Arc<S>,
        config: CollectorConfig,
    ) -> Self {
        let engine = ReconciliationEngine::new(store, config.grace_period_days);
        Self {
            api: Arc::new(api),
            credentials,
            processor: Arc::new(processor),
            engine,
            config,
        }
    }

    /// Collect and reconcile every configured region sequentially. Returns
    /// the per-region reports; a failed region is logged and does not stop
    /// the remaining regions.
    pub async fn run(&self) -> Vec<Result<RegionRunReport>> {
        let mut reports = Vec::with_capacity(self.config.regions.len());
        for region in &self.config.regions {
            let result = self.collect_region(region).await;
            if let Err(e) = &result {
                warn!(region, error = %e, "❌ region run failed");
            }
            reports.push(result);
        }
        reports
    }

    /// One full collection + reconciliation run for a region.
    pub async fn collect_region(&self, region_code: &str) -> Result<RegionRunReport> {
        let today = kst_today();
        info!("🚀 collecting region {} ({})", region_code, today);

        let mut batch: Vec<CanonicalListing> = Vec::new();
        let mut pages_fetched = 0u32;

        for page in 1..=self.config.max_pages_per_region {
            let search = self
                .with_auth_retry(|cred| {
                    let api = self.api.clone();
                    let region = region_code.to_string();
                    async move { api.search_page(&cred, &region, page).await }
                })
                .await
                .with_context(|| format!("search page {page} for region {region_code}"))?;
            pages_fetched += 1;
            debug!(
                region = region_code,
                page,
                items = search.items.len(),
                has_more = search.has_more,
                "search page fetched"
            );

            let records = self.fetch_details(region_code, &search.items, today).await?;
            batch.extend(records);

            if !search.has_more {
                break;
            }
            sleep(Duration::from_millis(self.config.request_delay_ms)).await;
        }

        let mut report = self
            .engine
            .reconcile_region(region_code, &batch, today)
            .await?;
        report.pages_fetched = pages_fetched;
        report.parse_stats = self.processor.stats().snapshot();
        report.dropped_records = report.parse_stats.dropped_records;
        Ok(report)
    }

    /// Fetch details for one page of summaries under the bounded worker
    /// pool. A failed or unparseable detail is logged and skipped; the rest
    /// of the page is unaffected.
    async fn fetch_details(
        &self,
        region_code: &str,
        items: &[ListingSummary],
        today: NaiveDate,
    ) -> Result<Vec<CanonicalListing>> {
        let semaphore = Arc::new(Semaphore::new(self.config.detail_max_concurrent));
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            let semaphore = semaphore.clone();
            let api = self.api.clone();
            let processor = self.processor.clone();
            let credentials = self.credentials.clone();
            let article_no = item.article_no.clone();
            let region = region_code.to_string();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");

                let fetch = || async {
                    let cred = credentials.valid_credential().await?;
                    match api.fetch_detail(&cred, &article_no).await {
                        Err(CollectorError::AuthFailed { .. }) => {
                            // One refresh + retry; a second auth failure
                            // propagates as fatal.
                            let cred = credentials.valid_credential().await?;
                            Ok(api.fetch_detail(&cred, &article_no).await?)
                        }
                        other => Ok::<_, anyhow::Error>(other?),
                    }
                };

                match fetch().await {
                    Ok(payload) => Ok(processor.process(&payload, &region, today)),
                    Err(e) => Err((article_no, e)),
                }
            }));
        }

        let mut records = Vec::with_capacity(items.len());
        let mut auth_failure: Option<anyhow::Error> = None;
        for joined in join_all(handles).await {
            match joined.context("detail worker panicked")? {
                Ok(Some(listing)) => records.push(listing),
                Ok(None) => {} // dropped by the record processor, counted there
                Err((article_no, e)) => {
                    if e.downcast_ref::<CollectorError>()
                        .is_some_and(CollectorError::is_auth_failure)
                    {
                        // Credential is dead; abort the run instead of
                        // burning through the page with rejected requests.
                        auth_failure.get_or_insert(e.context(format!(
                            "repeated authorization failure fetching {article_no}"
                        )));
                    } else {
                        warn!(listing_id = %article_no, error = %e, "detail fetch failed, skipping");
                    }
                }
            }
        }
        if let Some(e) = auth_failure {
            return Err(e);
        }
        Ok(records)
    }

    /// Run a request once; on an auth failure ask the provider for a fresh
    /// credential and retry exactly once.
    async fn with_auth_retry<T, F, Fut>(&self, request: F) -> Result<T>
    where
        F: Fn(crate::infrastructure::credential::Credential) -> Fut,
        Fut: std::future::Future<Output = Result<T, CollectorError>>,
    {
        let cred = self.credentials.valid_credential().await?;
        match request(cred).await {
            Err(CollectorError::AuthFailed { url }) => {
                warn!(url, "🔐 auth failure, refreshing credential and retrying once");
                let cred = self.credentials.valid_credential().await?;
                request(cred).await.map_err(|e| {
                    if e.is_auth_failure() {
                        anyhow::anyhow!(e).context("second consecutive authorization failure")
                    } else {
                        anyhow::anyhow!(e)
                    }
                })
            }
            other => other.map_err(anyhow::Error::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::domain::listing::{
        CanonicalListing, DeletionHistoryEntry, PriceHistoryEntry, StoredListingSnapshot,
    };
    use crate::domain::stats::ParseStats;
    use crate::infrastructure::config::ApiConfig;
    use crate::infrastructure::credential::{Credential, CredentialProvider};

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicU32,
    }

    #[async_trait]
    impl CredentialProvider for CountingProvider {
        async fn valid_credential(&self) -> Result<Credential> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Credential {
                bearer_token: "token".to_string(),
                cookies: HashMap::new(),
                expires_at: Utc::now() + Duration::hours(1),
            })
        }
    }

    struct NullStore;

    #[async_trait]
    impl ListingStore for NullStore {
        async fn active_snapshots(&self, _: &str) -> Result<Vec<StoredListingSnapshot>> {
            Ok(Vec::new())
        }
        async fn upsert_listing(&self, _: &CanonicalListing) -> Result<bool> {
            Ok(true)
        }
        async fn update_prices(&self, _: &CanonicalListing, _: NaiveDate) -> Result<()> {
            Ok(())
        }
        async fn touch_last_seen(&self, _: &str, _: NaiveDate) -> Result<()> {
            Ok(())
        }
        async fn deactivate(&self, _: &str, _: NaiveDate) -> Result<()> {
            Ok(())
        }
        async fn insert_price_history(&self, _: &PriceHistoryEntry) -> Result<()> {
            Ok(())
        }
        async fn insert_deletion_history(&self, _: &DeletionHistoryEntry) -> Result<()> {
            Ok(())
        }
    }

    fn collector(provider: Arc<CountingProvider>) -> ListingCollector<NullStore> {
        ListingCollector::new(
            LandApiClient::new(ApiConfig::default()).expect("client builds"),
            provider,
            RecordProcessor::new(Arc::new(ParseStats::new())),
            Arc::new(NullStore),
            CollectorConfig::default(),
        )
    }

    fn auth_failed() -> CollectorError {
        CollectorError::AuthFailed {
            url: "https://example.test/api".to_string(),
        }
    }

    #[tokio::test]
    async fn auth_failure_gets_one_refresh_then_succeeds() {
        let provider = Arc::new(CountingProvider::default());
        let collector = collector(provider.clone());
        let attempts = AtomicU32::new(0);

        let result = collector
            .with_auth_retry(|_cred| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(auth_failed())
                    } else {
                        Ok(42u32)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        // One credential per attempt: initial fetch plus the refresh.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_consecutive_auth_failure_is_fatal() {
        let provider = Arc::new(CountingProvider::default());
        let collector = collector(provider.clone());

        let result: Result<u32> = collector
            .with_auth_retry(|_cred| async { Err(auth_failed()) })
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("second consecutive authorization failure"));
        // Exactly one refresh, no retry loop.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_auth_error_is_not_retried() {
        let provider = Arc::new(CountingProvider::default());
        let collector = collector(provider.clone());
        let attempts = AtomicU32::new(0);

        let result: Result<u32> = collector
            .with_auth_retry(|_cred| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(CollectorError::Http {
                        status: 500,
                        url: "https://example.test/api".to_string(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
