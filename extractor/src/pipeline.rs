use crate::catalog::CatalogSource;
use crate::ingest::IdentifierSource;
use crate::model::{
    AccessToken, IdentifierPage, ItemFailure, MarketCredential, MarketSummary, RunSummary,
};
use crate::pacing::Sleeper;
use crate::store::CatalogWriter;
use crate::token::TokenExchange;
use crate::validate;
use catalog_core::backoff::retry_with_backoff;
use catalog_core::config::{ApiConfig, WarehouseConfig};
use catalog_core::telemetry::{ITEMS_FAILED, MARKETS_ABANDONED, MARKETS_SKIPPED};
use catalog_core::Result;
use chrono::NaiveDate;
use metrics::counter;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(60);

pub struct PipelineSettings {
    pub pacing_delay: Duration,
    pub page_retries: u32,
    pub page_retry_base_delay_ms: u64,
}

impl PipelineSettings {
    pub fn from_config(api: &ApiConfig, warehouse: &WarehouseConfig) -> Self {
        Self {
            pacing_delay: Duration::from_secs(api.pacing_delay_secs),
            page_retries: warehouse.max_retries.max(1),
            page_retry_base_delay_ms: warehouse.retry_base_delay_ms,
        }
    }
}

/// Walks markets in credential order and ASINs in warehouse order, one at a time.
pub struct Pipeline {
    tokens: Arc<dyn TokenExchange>,
    identifiers: Arc<dyn IdentifierSource>,
    catalog: Arc<dyn CatalogSource>,
    writer: CatalogWriter,
    sleeper: Arc<dyn Sleeper>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        tokens: Arc<dyn TokenExchange>,
        identifiers: Arc<dyn IdentifierSource>,
        catalog: Arc<dyn CatalogSource>,
        writer: CatalogWriter,
        sleeper: Arc<dyn Sleeper>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            tokens,
            identifiers,
            catalog,
            writer,
            sleeper,
            settings,
        }
    }

    /// Process every market. Market and item failures are reported in the
    /// summary; nothing below run level aborts the run.
    #[instrument(skip(self, credentials), fields(markets = credentials.len()))]
    pub async fn run(
        &self,
        credentials: &[MarketCredential],
        ingestion_date: NaiveDate,
    ) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary {
            ingestion_date,
            markets: Vec::with_capacity(credentials.len()),
        };

        info!(
            ingestion_date = %ingestion_date,
            bucket = self.writer.bucket(),
            "Starting catalog extraction"
        );

        for credential in credentials {
            let span = info_span!(
                "market",
                market = %credential.market,
                marketplace_id = %credential.marketplace_id
            );
            let market_summary = self
                .run_market(credential, ingestion_date)
                .instrument(span)
                .await;
            summary.markets.push(market_summary);
        }

        info!(
            "Extraction finished in {}s | Stored: {} | Failed: {} | Markets skipped: {} | Markets abandoned: {}",
            started.elapsed().as_secs(),
            summary.stored(),
            summary.failed(),
            summary.skipped_markets().count(),
            summary.abandoned_markets().count()
        );

        summary
    }

    async fn run_market(
        &self,
        credential: &MarketCredential,
        ingestion_date: NaiveDate,
    ) -> MarketSummary {
        let market = credential.market;
        let marketplace_id = credential.marketplace_id.as_str();
        let mut summary = MarketSummary::new(market, marketplace_id);

        info!("Our market is {} and marketplace ID is {}", market, marketplace_id);

        let token = match self.tokens.exchange(credential).await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "Skipping market: no access token");
                counter!(MARKETS_SKIPPED, "market" => market.code()).increment(1);
                summary.skipped = Some(e.to_string());
                return summary;
            }
        };

        let total_rows = match self.identifiers.count(marketplace_id).await {
            Ok(total) => total,
            Err(e) => {
                error!(error = %e, "Skipping market: identifier count failed");
                counter!(MARKETS_SKIPPED, "market" => market.code()).increment(1);
                summary.skipped = Some(e.to_string());
                return summary;
            }
        };
        summary.total_rows = total_rows;

        info!("Market contains total of {} products", total_rows);

        let mut offset = (total_rows > 0).then_some(0u64);
        let mut current_row = 0u64;
        let mut last_progress_update = Instant::now();

        while let Some(page_offset) = offset {
            let page = match self.fetch_identifier_page(marketplace_id, page_offset).await {
                Ok(page) => page,
                Err(e) => {
                    error!(
                        error = %e,
                        offset = page_offset,
                        processed = current_row,
                        unread = total_rows.saturating_sub(current_row),
                        "Abandoning market: identifier page could not be read"
                    );
                    counter!(MARKETS_ABANDONED, "market" => market.code()).increment(1);
                    summary.abandoned = Some(e.to_string());
                    break;
                }
            };
            offset = page.next_offset;

            for asin in page.asins {
                current_row += 1;
                // The count and the pages are separate reads; never report a position past the total
                let total = total_rows.max(current_row);

                if let Some(reason) = self
                    .process_item(&asin, credential, &token, ingestion_date)
                    .await
                {
                    let failure = ItemFailure {
                        asin,
                        market,
                        marketplace_id: marketplace_id.to_string(),
                        current_row,
                        total_rows: total,
                        reason,
                    };
                    warn!("{}", failure);
                    counter!(ITEMS_FAILED, "market" => market.code()).increment(1);
                    summary.failures.push(failure);
                } else {
                    summary.stored += 1;
                }
                summary.processed = current_row;

                if last_progress_update.elapsed() > PROGRESS_INTERVAL {
                    info!(
                        "📊 Progress: {}/{} | Stored: {} | Failed: {}",
                        current_row,
                        total,
                        summary.stored,
                        summary.failures.len()
                    );
                    last_progress_update = Instant::now();
                }
            }
        }

        info!(
            stored = summary.stored,
            failed = summary.failures.len(),
            "Market {} done",
            market
        );

        summary
    }

    async fn fetch_identifier_page(
        &self,
        marketplace_id: &str,
        offset: u64,
    ) -> Result<IdentifierPage> {
        retry_with_backoff(
            || self.identifiers.fetch_page(marketplace_id, offset),
            self.settings.page_retries,
            self.settings.page_retry_base_delay_ms,
            "fetch_identifier_page",
        )
        .await
    }

    /// Fetch, pace, validate, store. Returns why the item was not stored, if it wasn't.
    async fn process_item(
        &self,
        asin: &str,
        credential: &MarketCredential,
        token: &AccessToken,
        ingestion_date: NaiveDate,
    ) -> Option<String> {
        let market = credential.market;
        let outcome = self
            .catalog
            .fetch(asin, &credential.marketplace_id, token, market)
            .await;

        // Paced after every fetch regardless of how it went
        self.sleeper.sleep(self.settings.pacing_delay).await;

        let reason = outcome.to_string();
        let Some(payload) = outcome.into_payload() else {
            return Some(reason);
        };

        if !validate::validate(&payload) {
            return Some(
                validate::check(&payload)
                    .err()
                    .map_or_else(|| "payload failed validation".to_string(), |v| v.to_string()),
            );
        }

        match self
            .writer
            .store(&payload, asin, market, ingestion_date)
            .await
        {
            Ok(path) => {
                debug!(asin, key = %path, "Stored");
                None
            }
            Err(e) => Some(e.to_string()),
        }
    }
}
