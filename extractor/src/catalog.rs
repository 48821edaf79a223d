//! Catalog Items API client.
//!
//! A fetch is a small state machine over HTTP status classes:
//!
//! | Status | Next step |
//! |--------|-----------|
//! | 200 | decode body, done |
//! | 202 | item still being prepared: wait, retry while attempts remain |
//! | 202 on the last attempt | done, no payload, no wait |
//! | >= 400 | done, no payload |
//! | anything else | done, no payload |
//!
//! The 5 s wait is only spent when another attempt follows, so three 202s
//! cost two waits rather than three.
//!
//! Transport failures end the fetch immediately as well. None of the terminal
//! failures raise; they come back as a [`FetchOutcome`] so the caller can log
//! and move on to the next ASIN.

use crate::market::Market;
use crate::model::AccessToken;
use crate::pacing::Sleeper;
use async_trait::async_trait;
use catalog_core::config::ApiConfig;
use catalog_core::telemetry::{FETCH_DURATION_MS, FETCH_OUTCOMES};
use metrics::{counter, histogram};
use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

pub const CATALOG_API_VERSION: &str = "2022-04-01";

pub const INCLUDED_DATA: &str = "summaries,identifiers,vendorDetails,attributes,classifications,relationships,salesRanks,images,productTypes";

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(Value),
    /// Every attempt answered 202
    StillProcessing { attempts: u32 },
    Rejected(StatusCode),
    UnexpectedStatus(StatusCode),
    Transport(String),
    Undecodable(String),
}

impl FetchOutcome {
    pub fn into_payload(self) -> Option<Value> {
        match self {
            FetchOutcome::Found(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Found(_) => "found",
            FetchOutcome::StillProcessing { .. } => "still_processing",
            FetchOutcome::Rejected(_) => "rejected",
            FetchOutcome::UnexpectedStatus(_) => "unexpected_status",
            FetchOutcome::Transport(_) => "transport",
            FetchOutcome::Undecodable(_) => "undecodable",
        }
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Found(_) => write!(f, "payload received"),
            FetchOutcome::StillProcessing { attempts } => {
                write!(f, "still processing (HTTP 202) after {attempts} attempts")
            }
            FetchOutcome::Rejected(status) => write!(f, "rejected with HTTP {}", status.as_u16()),
            FetchOutcome::UnexpectedStatus(status) => {
                write!(f, "unexpected HTTP {}", status.as_u16())
            }
            FetchOutcome::Transport(e) => write!(f, "request failed: {e}"),
            FetchOutcome::Undecodable(e) => write!(f, "body is not valid JSON: {e}"),
        }
    }
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(
        &self,
        asin: &str,
        marketplace_id: &str,
        token: &AccessToken,
        market: Market,
    ) -> FetchOutcome;
}

/// What to do after one response.
#[derive(Debug)]
enum Step {
    Decode,
    Done(FetchOutcome),
    RetryAfterWait,
}

fn classify(status: StatusCode) -> Step {
    match status.as_u16() {
        200 => Step::Decode,
        202 => Step::RetryAfterWait,
        s if s >= 400 => Step::Done(FetchOutcome::Rejected(status)),
        _ => Step::Done(FetchOutcome::UnexpectedStatus(status)),
    }
}

pub struct CatalogClient {
    http: reqwest::Client,
    sleeper: Arc<dyn Sleeper>,
    endpoint_override: Option<String>,
    max_attempts: u32,
    processing_retry_delay: Duration,
}

impl CatalogClient {
    pub fn new(http: reqwest::Client, sleeper: Arc<dyn Sleeper>, config: &ApiConfig) -> Self {
        Self {
            http,
            sleeper,
            endpoint_override: config
                .endpoint_override
                .as_ref()
                .map(|e| e.trim_end_matches('/').to_string()),
            max_attempts: config.max_attempts.max(1),
            processing_retry_delay: Duration::from_secs(config.processing_retry_delay_secs),
        }
    }

    pub fn item_url(&self, market: Market, asin: &str) -> String {
        let endpoint = self
            .endpoint_override
            .as_deref()
            .unwrap_or(market.descriptor().api_endpoint);
        format!("{endpoint}/catalog/{CATALOG_API_VERSION}/items/{asin}")
    }

    /// One GET. `None` means the item is still being prepared (202).
    async fn attempt(
        &self,
        url: &str,
        marketplace_id: &str,
        token: &AccessToken,
    ) -> Option<FetchOutcome> {
        let response = match self
            .http
            .get(url)
            .query(&[("marketplaceIds", marketplace_id), ("includedData", INCLUDED_DATA)])
            .header(reqwest::header::ACCEPT, "application/json")
            .header("x-amz-access-token", token.secret())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Some(FetchOutcome::Transport(e.to_string())),
        };

        match classify(response.status()) {
            Step::Decode => match response.json::<Value>().await {
                Ok(payload) => Some(FetchOutcome::Found(payload)),
                Err(e) => Some(FetchOutcome::Undecodable(e.to_string())),
            },
            Step::Done(outcome) => Some(outcome),
            Step::RetryAfterWait => None,
        }
    }
}

#[async_trait]
impl CatalogSource for CatalogClient {
    #[instrument(skip(self, token, market), fields(market = %market))]
    async fn fetch(
        &self,
        asin: &str,
        marketplace_id: &str,
        token: &AccessToken,
        market: Market,
    ) -> FetchOutcome {
        let url = self.item_url(market, asin);
        let started = Instant::now();
        let mut attempts_remaining = self.max_attempts;

        let outcome = loop {
            attempts_remaining -= 1;
            match self.attempt(&url, marketplace_id, token).await {
                Some(outcome) => break outcome,
                None if attempts_remaining == 0 => {
                    break FetchOutcome::StillProcessing {
                        attempts: self.max_attempts,
                    };
                }
                None => {
                    debug!(
                        attempts_remaining,
                        wait_secs = self.processing_retry_delay.as_secs(),
                        "Catalog item not ready (202), retrying"
                    );
                    self.sleeper.sleep(self.processing_retry_delay).await;
                }
            }
        };

        histogram!(FETCH_DURATION_MS).record(started.elapsed().as_millis() as f64);
        counter!(FETCH_OUTCOMES, "outcome" => outcome.label()).increment(1);

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::TokioSleeper;
    use pretty_assertions::assert_eq;

    fn client(endpoint_override: Option<&str>) -> CatalogClient {
        let config = ApiConfig {
            endpoint_override: endpoint_override.map(str::to_string),
            ..catalog_core::Config::default().api
        };
        CatalogClient::new(reqwest::Client::new(), Arc::new(TokioSleeper), &config)
    }

    #[test]
    fn item_url_uses_regional_endpoint() {
        let c = client(None);
        assert_eq!(
            c.item_url(Market::De, "B001"),
            "https://sellingpartnerapi-eu.amazon.com/catalog/2022-04-01/items/B001"
        );
        assert_eq!(
            c.item_url(Market::Jp, "B002"),
            "https://sellingpartnerapi-fe.amazon.com/catalog/2022-04-01/items/B002"
        );
    }

    #[test]
    fn item_url_honours_override() {
        let c = client(Some("http://127.0.0.1:9000/"));
        assert_eq!(
            c.item_url(Market::Us, "B003"),
            "http://127.0.0.1:9000/catalog/2022-04-01/items/B003"
        );
    }

    #[test]
    fn status_classes() {
        assert!(matches!(classify(StatusCode::OK), Step::Decode));
        assert!(matches!(classify(StatusCode::ACCEPTED), Step::RetryAfterWait));
        assert!(matches!(
            classify(StatusCode::NOT_FOUND),
            Step::Done(FetchOutcome::Rejected(StatusCode::NOT_FOUND))
        ));
        assert!(matches!(
            classify(StatusCode::TOO_MANY_REQUESTS),
            Step::Done(FetchOutcome::Rejected(_))
        ));
        assert!(matches!(
            classify(StatusCode::INTERNAL_SERVER_ERROR),
            Step::Done(FetchOutcome::Rejected(_))
        ));
        assert!(matches!(
            classify(StatusCode::NO_CONTENT),
            Step::Done(FetchOutcome::UnexpectedStatus(_))
        ));
        assert!(matches!(
            classify(StatusCode::MOVED_PERMANENTLY),
            Step::Done(FetchOutcome::UnexpectedStatus(_))
        ));
    }

    #[test]
    fn only_found_yields_a_payload() {
        assert_eq!(
            FetchOutcome::Found(serde_json::json!({"asin": "B001"})).into_payload(),
            Some(serde_json::json!({"asin": "B001"}))
        );
        assert_eq!(FetchOutcome::StillProcessing { attempts: 3 }.into_payload(), None);
        assert_eq!(FetchOutcome::Rejected(StatusCode::NOT_FOUND).into_payload(), None);
    }
}
