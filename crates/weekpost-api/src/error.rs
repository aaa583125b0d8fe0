use weekpost_gateway::SyncError;
use weekpost_types::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    Validation(String),

    /// No entry with this id in the current week.
    #[error("Entry #{0} not found in the current week")]
    NotFound(i64),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ApiError {
    pub fn category(&self) -> &str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Config(_) => "config",
            Self::Sync(e) => e.category(),
            Self::Storage(_) => "storage",
        }
    }

    /// Correlation id to show the user, when the failure was logged with one.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::Sync(e) => e.correlation_id(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", e))
    }
}
