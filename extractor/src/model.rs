use crate::market::Market;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;

/// LWA application credentials for one market, as listed in the credentials file.
#[derive(Clone, Deserialize)]
pub struct MarketCredential {
    #[serde(rename = "marketName")]
    pub market: Market,
    #[serde(rename = "marketplaceId")]
    pub marketplace_id: String,
    #[serde(rename = "lwa_app_id")]
    pub app_id: String,
    #[serde(rename = "lwa_client_secret")]
    pub app_secret: String,
    pub refresh_token: String,
}

impl fmt::Debug for MarketCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketCredential")
            .field("market", &self.market)
            .field("marketplace_id", &self.marketplace_id)
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Bearer token for the catalog API. Valid for roughly an hour and never refreshed mid-run.
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    pub expires_in_secs: Option<u64>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_in_secs: Option<u64>) -> Self {
        Self {
            value: value.into(),
            expires_in_secs,
        }
    }

    pub fn secret(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_in_secs", &self.expires_in_secs)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierPage {
    pub asins: Vec<String>,
    pub next_offset: Option<u64>,
}

/// One ASIN that did not end up in the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub asin: String,
    pub market: Market,
    pub marketplace_id: String,
    pub current_row: u64,
    pub total_rows: u64,
    pub reason: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to get or validate product info for ASIN: {}, Marketplace market {} and ID: {} - {}/{} ({})",
            self.asin, self.market, self.marketplace_id, self.current_row, self.total_rows, self.reason
        )
    }
}

#[derive(Debug, Clone)]
pub struct MarketSummary {
    pub market: Market,
    pub marketplace_id: String,
    pub total_rows: u64,
    pub processed: u64,
    pub stored: u64,
    pub failures: Vec<ItemFailure>,
    /// Set when the market was given up before any ASIN was fetched
    pub skipped: Option<String>,
    /// Set when the identifier pages stopped partway; `processed` rows were handled
    pub abandoned: Option<String>,
}

impl MarketSummary {
    pub fn new(market: Market, marketplace_id: impl Into<String>) -> Self {
        Self {
            market,
            marketplace_id: marketplace_id.into(),
            total_rows: 0,
            processed: 0,
            stored: 0,
            failures: Vec::new(),
            skipped: None,
            abandoned: None,
        }
    }

    /// Rows the count promised that were never read from the identifier source.
    pub fn unread_rows(&self) -> u64 {
        self.total_rows.saturating_sub(self.processed)
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub ingestion_date: NaiveDate,
    pub markets: Vec<MarketSummary>,
}

impl RunSummary {
    pub fn stored(&self) -> u64 {
        self.markets.iter().map(|m| m.stored).sum()
    }

    pub fn failed(&self) -> usize {
        self.markets.iter().map(|m| m.failures.len()).sum()
    }

    pub fn skipped_markets(&self) -> impl Iterator<Item = &MarketSummary> {
        self.markets.iter().filter(|m| m.skipped.is_some())
    }

    pub fn abandoned_markets(&self) -> impl Iterator<Item = &MarketSummary> {
        self.markets.iter().filter(|m| m.abandoned.is_some())
    }
}
