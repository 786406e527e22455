use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Invalid settings: {0}")]
    Settings(#[from] upstream_cache::ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] upstream_cache::StoreError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Resolve failed with status {status}: {source}")]
    Resolve {
        status: u16,
        #[source]
        source: upstream_cache::ResolveError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<upstream_cache::ResolveError> for AppError {
    fn from(source: upstream_cache::ResolveError) -> Self {
        AppError::Resolve {
            status: source.status_code().as_u16(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
