use crate::model::MarketCredential;
use catalog_core::{Error, Result};
use std::path::Path;
use tracing::{info, warn};

/// Reads the per-market credential list. Any problem here is a startup failure.
pub fn load(path: &Path) -> Result<Vec<MarketCredential>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::Credentials(format!("cannot read {}: {}", path.display(), e))
    })?;

    let credentials = parse(&raw).map_err(|e| match e {
        Error::Credentials(details) => {
            Error::Credentials(format!("{}: {}", path.display(), details))
        }
        other => other,
    })?;

    info!(
        path = %path.display(),
        markets = credentials.len(),
        "Loaded market credentials"
    );

    Ok(credentials)
}

pub fn parse(raw: &str) -> Result<Vec<MarketCredential>> {
    let credentials: Vec<MarketCredential> = serde_json::from_str(raw)
        .map_err(|e| Error::Credentials(format!("malformed credential list: {e}")))?;

    for credential in &credentials {
        let expected = credential.market.descriptor().marketplace_id;
        if credential.marketplace_id != expected {
            warn!(
                market = %credential.market,
                configured = %credential.marketplace_id,
                expected,
                "Credential marketplace id differs from the market table; the configured id is used"
            );
        }
    }

    Ok(credentials)
}
