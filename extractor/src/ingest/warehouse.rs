use super::IdentifierSource;
use crate::model::IdentifierPage;
use async_trait::async_trait;
use catalog_core::config::WarehouseConfig;
use catalog_core::{Error, Result};
use sqlx::PgPool;
use tracing::{debug, instrument};

/// Reads ASINs from the vendor sales view in the analytical warehouse.
pub struct WarehouseSource {
    pool: PgPool,
    count_sql: String,
    page_sql: String,
    page_size: u32,
}

impl WarehouseSource {
    /// `view` and `marketplace_column` must already have passed config validation;
    /// they are spliced into the SQL text.
    pub fn new(pool: PgPool, config: &WarehouseConfig) -> Self {
        let (count_sql, page_sql) = build_queries(&config.asin_view, &config.marketplace_column);
        Self {
            pool,
            count_sql,
            page_sql,
            page_size: config.page_size,
        }
    }
}

fn build_queries(view: &str, marketplace_column: &str) -> (String, String) {
    let count_sql = format!(
        "SELECT COUNT(DISTINCT asin) FROM {view} WHERE {marketplace_column} = $1"
    );
    let page_sql = format!(
        "SELECT DISTINCT asin FROM {view} WHERE {marketplace_column} = $1 ORDER BY asin LIMIT $2 OFFSET $3"
    );
    (count_sql, page_sql)
}

fn next_offset(offset: u64, fetched: usize, page_size: u32) -> Option<u64> {
    if fetched as u64 >= u64::from(page_size) {
        Some(offset + fetched as u64)
    } else {
        None
    }
}

#[async_trait]
impl IdentifierSource for WarehouseSource {
    #[instrument(skip(self))]
    async fn count(&self, marketplace_id: &str) -> Result<u64> {
        let total: i64 = sqlx::query_scalar(&self.count_sql)
            .bind(marketplace_id)
            .fetch_one(&self.pool)
            .await?;

        u64::try_from(total).map_err(|_| Error::Warehouse {
            marketplace_id: marketplace_id.to_string(),
            details: format!("negative row count {total}"),
        })
    }

    #[instrument(skip(self))]
    async fn fetch_page(&self, marketplace_id: &str, offset: u64) -> Result<IdentifierPage> {
        let offset_param = i64::try_from(offset).map_err(|_| Error::Warehouse {
            marketplace_id: marketplace_id.to_string(),
            details: format!("offset {offset} out of range"),
        })?;

        let asins: Vec<Option<String>> = sqlx::query_scalar(&self.page_sql)
            .bind(marketplace_id)
            .bind(i64::from(self.page_size))
            .bind(offset_param)
            .fetch_all(&self.pool)
            .await?;

        let fetched = asins.len();
        // A NULL asin still occupies a row, so paging counts it before dropping it
        let asins: Vec<String> = asins.into_iter().flatten().collect();

        let next_offset = next_offset(offset, fetched, self.page_size);

        debug!(
            offset,
            fetched,
            has_more = next_offset.is_some(),
            "Fetched identifier page"
        );

        Ok(IdentifierPage { asins, next_offset })
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| Error::Warehouse {
                marketplace_id: "-".to_string(),
                details: format!("health check failed: {e}"),
            })
    }
}
