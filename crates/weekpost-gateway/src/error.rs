use crate::client::RemoteError;

/// Why a reconciliation (or test send) did not complete.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Channel blank, unknown, or gone.
    #[error("Configuration error: {message} (id {correlation_id})")]
    Configuration {
        message: String,
        correlation_id: String,
    },

    #[error("{context}: {source} (id {correlation_id})")]
    Remote {
        source: RemoteError,
        context: String,
        correlation_id: String,
    },

    #[error("Storage error: {message} (id {correlation_id})")]
    Storage {
        message: String,
        correlation_id: String,
    },

    #[error("Messaging client not connected")]
    NotConnected,

    /// The worker stopped before answering.
    #[error("Sync worker unavailable: {0}")]
    Unavailable(String),
}

impl SyncError {
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::Configuration { correlation_id, .. }
            | Self::Remote { correlation_id, .. }
            | Self::Storage { correlation_id, .. } => Some(correlation_id),
            Self::NotConnected | Self::Unavailable(_) => None,
        }
    }

    /// Whether a later tick or forced sync can be expected to succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Remote { source, .. } => !matches!(source, RemoteError::Fatal(_)),
            Self::NotConnected => true,
            Self::Configuration { .. } | Self::Storage { .. } | Self::Unavailable(_) => false,
        }
    }

    pub fn category(&self) -> &str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Remote { source, .. } => source.kind(),
            Self::Storage { .. } => "storage",
            Self::NotConnected => "not_connected",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_keep_their_kind() {
        let err = SyncError::Remote {
            source: RemoteError::Transient("429".into()),
            context: "Failed to edit weekly message 1".into(),
            correlation_id: "20240101-120000-1".into(),
        };
        assert_eq!(err.category(), "transient");
        assert!(err.is_recoverable());
        assert_eq!(err.correlation_id(), Some("20240101-120000-1"));
        assert!(err.to_string().contains("Failed to edit weekly message 1"));

        let fatal = SyncError::Remote {
            source: RemoteError::Fatal("403".into()),
            context: "send".into(),
            correlation_id: "x".into(),
        };
        assert_eq!(fatal.category(), "fatal");
        assert!(!fatal.is_recoverable());
    }

    #[test]
    fn configuration_is_not_recoverable() {
        let err = SyncError::Configuration {
            message: "channel_id is empty".into(),
            correlation_id: "x".into(),
        };
        assert_eq!(err.category(), "configuration");
        assert!(!err.is_recoverable());
        assert_eq!(SyncError::NotConnected.correlation_id(), None);
    }
}
