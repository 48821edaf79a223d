use crate::model::{AccessToken, MarketCredential};
use async_trait::async_trait;
use catalog_core::{Error, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, instrument};

#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Trades the market's refresh token for a bearer token. Failure means the
    /// market cannot be processed.
    async fn exchange(&self, credential: &MarketCredential) -> Result<AccessToken>;
}

/// Token endpoint reply. Only `access_token` decides success; the other
/// fields are informational and tolerated in any shape.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    token_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_secs")]
    expires_in: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    error: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    error_description: Option<String>,
}

fn lenient<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Accepts `3600` or `"3600"`; anything else is dropped.
fn lenient_secs<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Login-with-Amazon token endpoint client.
pub struct LwaTokenClient {
    http: reqwest::Client,
    token_url: String,
}

impl LwaTokenClient {
    pub fn new(http: reqwest::Client, token_url: impl Into<String>) -> Self {
        Self {
            http,
            token_url: token_url.into(),
        }
    }

    /// Single attempt, no retry. The returned error text never contains the secrets.
    pub async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> std::result::Result<AccessToken, String> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| format!("token request failed: {}", e.without_url()))?;

        let status = response.status();
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| format!("token response (HTTP {status}) is not valid JSON: {e}"))?;

        match body.access_token {
            Some(token) if !token.is_empty() => {
                debug!(
                    token_type = body.token_type.as_deref().unwrap_or("unknown"),
                    expires_in = ?body.expires_in,
                    refresh_token_returned = body.refresh_token.is_some(),
                    "Obtained access token"
                );
                Ok(AccessToken::new(token, body.expires_in))
            }
            _ => {
                let mut details = format!("HTTP {status}: response did not contain access_token");
                if let Some(error) = body.error {
                    details.push_str(&format!(
                        " (error: {error}{})",
                        body.error_description
                            .map(|d| format!(", {d}"))
                            .unwrap_or_default()
                    ));
                }
                Err(details)
            }
        }
    }
}

#[async_trait]
impl TokenExchange for LwaTokenClient {
    #[instrument(skip_all, fields(market = %credential.market))]
    async fn exchange(&self, credential: &MarketCredential) -> Result<AccessToken> {
        self.exchange_refresh_token(
            &credential.refresh_token,
            &credential.app_id,
            &credential.app_secret,
        )
        .await
        .map_err(|details| Error::TokenExchange {
            market: credential.market.to_string(),
            details,
        })
    }
}
