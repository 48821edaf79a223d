use crate::market::Market;
use async_trait::async_trait;
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use catalog_core::config::StorageConfig;
use catalog_core::telemetry::ITEMS_STORED;
use catalog_core::{Error, Result};
use chrono::NaiveDate;
use metrics::counter;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Hive-partitioned object key:
/// `<prefix>/dt=<YYYY-MM-DD>/market=<market>/<asin>_payload.json`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath(String);

impl ObjectPath {
    pub fn new(prefix: &str, date: NaiveDate, market: Market, asin: &str) -> Self {
        Self(format!(
            "{}/dt={}/market={}/{}_payload.json",
            prefix,
            date.format("%Y-%m-%d"),
            market,
            asin
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `body` at `key`, replacing whatever is there
    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str) -> Result<()>;
}

pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    /// `credentials_file`, when given, is read as an AWS shared credentials
    /// file in place of `~/.aws/credentials`.
    pub async fn new(config: &StorageConfig, credentials_file: Option<&Path>) -> Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let Some(path) = credentials_file {
            if !path.exists() {
                return Err(Error::Credentials(format!(
                    "service account file {} does not exist",
                    path.display()
                )));
            }
            let files = ProfileFiles::builder()
                .include_default_config_file(true)
                .with_file(ProfileFileKind::Credentials, path)
                .build();
            config_loader = config_loader.profile_files(files);
        }

        if let Some(profile) = &config.aws_profile {
            config_loader = config_loader.profile_name(profile);
        }

        let sdk_config = config_loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint_url {
            // S3-compatible services generally want path-style addressing
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: S3Client::from_conf(builder.build()),
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                let details = match e {
                    aws_sdk_s3::error::SdkError::ServiceError(ref err) => {
                        format!("S3 service error: {:?}", err.err())
                    }
                    _ => e.to_string(),
                };
                Error::Storage {
                    key: key.to_string(),
                    details,
                }
            })?;

        Ok(())
    }
}

/// Serializes validated payloads into the partitioned layout.
pub struct CatalogWriter {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: String,
}

impl CatalogWriter {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn path_for(&self, date: NaiveDate, market: Market, asin: &str) -> ObjectPath {
        ObjectPath::new(&self.prefix, date, market, asin)
    }

    #[instrument(skip(self, payload), fields(bucket = %self.bucket))]
    pub async fn store(
        &self,
        payload: &Value,
        asin: &str,
        market: Market,
        date: NaiveDate,
    ) -> Result<ObjectPath> {
        let path = self.path_for(date, market, asin);
        let body = Bytes::from(serde_json::to_vec(payload)?);
        let size = body.len();

        self.store
            .put(&self.bucket, path.as_str(), body, JSON_CONTENT_TYPE)
            .await?;

        counter!(ITEMS_STORED, "market" => market.code()).increment(1);
        debug!(key = %path, bytes = size, "Stored catalog payload");

        Ok(path)
    }
}
