pub mod warehouse;

use crate::model::IdentifierPage;
use async_trait::async_trait;
use catalog_core::Result;

#[async_trait]
pub trait IdentifierSource: Send + Sync {
    /// Number of distinct ASINs associated with the marketplace
    async fn count(&self, marketplace_id: &str) -> Result<u64>;

    /// Fetch a page of distinct ASINs starting at `offset`, in a stable order
    async fn fetch_page(&self, marketplace_id: &str, offset: u64) -> Result<IdentifierPage>;

    /// Check if the source is reachable
    async fn health_check(&self) -> Result<()>;
}

pub use warehouse::WarehouseSource;
