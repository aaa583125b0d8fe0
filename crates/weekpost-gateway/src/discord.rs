//! Discord REST adapter for [`MessagingClient`].
//!
//! Messages go out as a components-v2 container: one text block per rendered
//! block, separated by dividers, tinted with the render's accent colour.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use weekpost_render::RenderedMessage;

use crate::client::{ChannelRef, MessagingClient, RemoteError};

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
const USER_AGENT: &str = concat!("weekpost/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const FLAG_SUPPRESS_EMBEDS: u64 = 1 << 2;
const FLAG_COMPONENTS_V2: u64 = 1 << 15;

const COMPONENT_TEXT_DISPLAY: u8 = 10;
const COMPONENT_SEPARATOR: u8 = 14;
const COMPONENT_CONTAINER: u8 = 17;

const CODE_UNKNOWN_CHANNEL: u64 = 10003;
const CODE_UNKNOWN_MESSAGE: u64 = 10008;

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<u64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiscordMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DiscordChannel {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiscordUser {
    username: String,
}

pub struct DiscordClient {
    http: Client,
    token: String,
    base_url: String,
    connected: AtomicBool,
}

impl DiscordClient {
    pub fn new(token: impl Into<String>) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RemoteError::Fatal(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            http,
            token: token.into(),
            base_url: DISCORD_API_BASE.to_string(),
            connected: AtomicBool::new(false),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Check the token against `/users/@me` and mark the client connected.
    pub async fn connect(&self) -> Result<String, RemoteError> {
        let user: DiscordUser = self.call(Method::GET, "/users/@me", None).await?;
        self.connected.store(true, Ordering::SeqCst);
        info!(user = %user.username, "Discord client connected");
        Ok(user.username)
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// A rejected token means the session is gone until `connect` succeeds again.
    fn track_auth(&self, status: StatusCode) {
        if status == StatusCode::UNAUTHORIZED && self.connected.swap(false, Ordering::SeqCst) {
            warn!("Discord rejected the bot token, marking client disconnected");
        }
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<T, RemoteError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(method = %method, url = %url, "Discord API request");

        let mut request = self
            .http
            .request(method, &url)
            .header("Authorization", format!("Bot {}", self.token));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Transient(format!("Discord API request failed: {}", e)))?;

        let status = response.status();
        self.track_auth(status);
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify(status, &text));
        }

        response
            .json()
            .await
            .map_err(|e| RemoteError::Fatal(format!("Failed to parse Discord response: {}", e)))
    }
}

#[async_trait]
impl MessagingClient for DiscordClient {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn resolve_channel(&self, channel_id: &str) -> Result<Option<ChannelRef>, RemoteError> {
        let endpoint = format!("/channels/{}", channel_id);
        match self.call::<DiscordChannel>(Method::GET, &endpoint, None).await {
            Ok(channel) => Ok(Some(ChannelRef {
                id: channel.id,
                name: channel.name,
            })),
            Err(RemoteError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn send(&self, channel: &ChannelRef, message: &RenderedMessage) -> Result<String, RemoteError> {
        let endpoint = format!("/channels/{}/messages", channel.id);
        let payload = message_payload(message);
        let sent: DiscordMessage = self.call(Method::POST, &endpoint, Some(&payload)).await?;
        Ok(sent.id)
    }

    async fn edit(
        &self,
        channel: &ChannelRef,
        message_id: &str,
        message: &RenderedMessage,
    ) -> Result<(), RemoteError> {
        let endpoint = format!("/channels/{}/messages/{}", channel.id, message_id);
        let payload = message_payload(message);
        let _: DiscordMessage = self.call(Method::PATCH, &endpoint, Some(&payload)).await?;
        Ok(())
    }

    async fn fetch(&self, channel: &ChannelRef, message_id: &str) -> Result<(), RemoteError> {
        let endpoint = format!("/channels/{}/messages/{}", channel.id, message_id);
        let _: DiscordMessage = self.call(Method::GET, &endpoint, None).await?;
        Ok(())
    }
}

/// Components-v2 body for a rendered message.
pub fn message_payload(message: &RenderedMessage) -> Value {
    let mut components = Vec::with_capacity(message.blocks.len() * 2);
    for (i, block) in message.blocks.iter().enumerate() {
        if i > 0 {
            components.push(json!({ "type": COMPONENT_SEPARATOR }));
        }
        components.push(json!({ "type": COMPONENT_TEXT_DISPLAY, "content": block }));
    }
    json!({
        "flags": FLAG_COMPONENTS_V2 | FLAG_SUPPRESS_EMBEDS,
        "components": [{
            "type": COMPONENT_CONTAINER,
            "accent_color": message.accent_color,
            "components": components,
        }],
    })
}

/// Map a failed response onto the reconciler's error kinds.
fn classify(status: StatusCode, body: &str) -> RemoteError {
    let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
    let code = parsed.as_ref().and_then(|b| b.code);
    let detail = parsed
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.chars().take(200).collect());

    match code {
        Some(CODE_UNKNOWN_MESSAGE) | Some(CODE_UNKNOWN_CHANNEL) => return RemoteError::NotFound,
        _ => {}
    }
    if status == StatusCode::NOT_FOUND {
        return RemoteError::NotFound;
    }
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return RemoteError::Transient(format!("Discord API error {}: {}", status, detail));
    }
    RemoteError::Fatal(format!("Discord API error {}: {}", status, detail))
}
