use async_trait::async_trait;

use weekpost_render::RenderedMessage;

/// A channel the client resolved and can post into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
    pub id: String,
    pub name: Option<String>,
}

/// Remote failures, classified at the client boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The referenced message no longer exists.
    #[error("Remote message not found")]
    NotFound,

    /// Worth trying again later (rate limit, 5xx, network).
    #[error("Transient remote failure: {0}")]
    Transient(String),

    #[error("Remote failure: {0}")]
    Fatal(String),
}

impl RemoteError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Transient(_) => "transient",
            Self::Fatal(_) => "fatal",
        }
    }
}

/// The messaging backend the reconciler talks to.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    fn is_connected(&self) -> bool;

    /// `Ok(None)` when the channel does not exist or is not visible.
    async fn resolve_channel(&self, channel_id: &str) -> Result<Option<ChannelRef>, RemoteError>;

    /// Post a new message, returning its remote id.
    async fn send(&self, channel: &ChannelRef, message: &RenderedMessage) -> Result<String, RemoteError>;

    async fn edit(
        &self,
        channel: &ChannelRef,
        message_id: &str,
        message: &RenderedMessage,
    ) -> Result<(), RemoteError>;

    /// `Ok(())` when the message exists, `Err(NotFound)` when it is gone.
    async fn fetch(&self, channel: &ChannelRef, message_id: &str) -> Result<(), RemoteError>;
}
