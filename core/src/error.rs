use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("credentials error: {0}")]
    Credentials(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("token exchange failed for market {market}: {details}")]
    TokenExchange { market: String, details: String },

    #[error("unknown market code: {0}")]
    UnknownMarket(String),

    #[error("identifier source error for marketplace {marketplace_id}: {details}")]
    Warehouse { marketplace_id: String, details: String },

    #[error("object store write to '{key}' failed: {details}")]
    Storage { key: String, details: String },

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Database(e) => !matches!(
                e,
                sqlx::Error::RowNotFound | sqlx::Error::ColumnNotFound(_) | sqlx::Error::Configuration(_)
            ),
            Error::Http(_) => true,
            _ => false,
        }
    }
}
