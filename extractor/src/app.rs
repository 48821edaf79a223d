use crate::catalog::CatalogClient;
use crate::credentials;
use crate::ingest::{IdentifierSource, WarehouseSource};
use crate::market::Market;
use crate::model::{MarketCredential, RunSummary};
use crate::pacing::{Sleeper, TokioSleeper};
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::store::{CatalogWriter, S3ObjectStore};
use crate::token::LwaTokenClient;
use catalog_core::{Config, Result};
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub struct App {
    credentials: Vec<MarketCredential>,
    pipeline: Pipeline,
}

impl App {
    #[instrument(skip(config))]
    pub async fn new(config: Config) -> Result<Self> {
        info!("Initializing application");

        let credentials = credentials::load(&config.credentials.path)?;

        let store = Arc::new(
            S3ObjectStore::new(
                &config.storage,
                config.credentials.service_account_path.as_deref(),
            )
            .await?,
        );
        let writer = CatalogWriter::new(store, &config.storage.bucket, &config.storage.prefix);

        let pool = PgPoolOptions::new()
            .max_connections(config.warehouse.max_connections)
            .min_connections(config.warehouse.min_connections)
            .acquire_timeout(Duration::from_secs(config.warehouse.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.warehouse.idle_timeout_secs))
            .connect(&config.warehouse.url)
            .await?;

        let identifiers = Arc::new(WarehouseSource::new(pool, &config.warehouse));

        info!("Performing health checks");
        identifiers.health_check().await?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api.request_timeout_secs))
            .user_agent(config.api.user_agent.clone())
            .build()?;

        let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);

        let pipeline = Pipeline::new(
            Arc::new(LwaTokenClient::new(http.clone(), &config.api.token_url)),
            identifiers,
            Arc::new(CatalogClient::new(http, Arc::clone(&sleeper), &config.api)),
            writer,
            sleeper,
            PipelineSettings::from_config(&config.api, &config.warehouse),
        );

        Ok(Self {
            credentials,
            pipeline,
        })
    }

    /// Runs every credentialed market, or only those in `markets` when it is non-empty.
    pub async fn run(&self, markets: &[Market], ingestion_date: NaiveDate) -> RunSummary {
        let selected = select_markets(&self.credentials, markets);

        for market in markets {
            if !selected.iter().any(|c| c.market == *market) {
                warn!(market = %market, "Requested market has no credentials, ignoring");
            }
        }

        self.pipeline.run(&selected, ingestion_date).await
    }
}

fn select_markets(credentials: &[MarketCredential], markets: &[Market]) -> Vec<MarketCredential> {
    credentials
        .iter()
        .filter(|c| markets.is_empty() || markets.contains(&c.market))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn credential(market: Market) -> MarketCredential {
        MarketCredential {
            market,
            marketplace_id: market.descriptor().marketplace_id.to_string(),
            app_id: "app".into(),
            app_secret: "secret".into(),
            refresh_token: "refresh".into(),
        }
    }

    #[test]
    fn empty_filter_keeps_every_market_in_order() {
        let all = vec![credential(Market::Fr), credential(Market::De), credential(Market::Us)];
        let selected: Vec<Market> = select_markets(&all, &[]).iter().map(|c| c.market).collect();
        assert_eq!(selected, vec![Market::Fr, Market::De, Market::Us]);
    }

    #[test]
    fn filter_keeps_credential_order() {
        let all = vec![credential(Market::Fr), credential(Market::De), credential(Market::Us)];
        let selected: Vec<Market> = select_markets(&all, &[Market::Us, Market::Fr])
            .iter()
            .map(|c| c.market)
            .collect();
        assert_eq!(selected, vec![Market::Fr, Market::Us]);
    }
}
