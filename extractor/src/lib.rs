//! Extracts Selling Partner API catalog items for warehouse-listed ASINs and
//! lands them in an object store partitioned by ingestion date and market.

pub mod app;
pub mod catalog;
pub mod credentials;
pub mod ingest;
pub mod market;
pub mod model;
pub mod pacing;
pub mod pipeline;
pub mod store;
pub mod token;
pub mod validate;
