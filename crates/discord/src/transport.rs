//! Seam between the adapter and the chat client library.
//!
//! Everything above this module works with the plain native model defined
//! here. The serenity implementation lives in [`crate::gateway`].

use std::sync::Arc;

use {async_trait::async_trait, secrecy::Secret, tokio::sync::mpsc};

use crate::{Result, config::NetworkOptions};

/// A platform user as reported by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeUser {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeAttachment {
    pub filename: String,
    pub url: String,
    pub content_type: Option<String>,
}

/// A message as delivered by the gateway or fetched over REST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeMessage {
    pub id: String,
    pub channel_id: String,
    /// Set for guild channels, `None` for direct messages.
    pub guild_id: Option<String>,
    pub author: NativeUser,
    pub content: String,
    pub attachments: Vec<NativeAttachment>,
    /// ID of the message this one replies to.
    pub reply_to: Option<String>,
    /// Unix seconds.
    pub timestamp: i64,
}

/// A postable guild channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeChannel {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeGuild {
    pub id: String,
    pub name: String,
    pub channels: Vec<NativeChannel>,
}

/// Attachment contents ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileData {
    Bytes(Vec<u8>),
    /// Local reference handed to the client library unread.
    Path(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundAttachment {
    pub name: String,
    pub data: FileData,
}

/// One native message to be created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundPayload {
    pub content: String,
    pub attachments: Vec<OutboundAttachment>,
    pub reply_to: Option<String>,
}

impl OutboundPayload {
    /// Nothing would be visible if this were sent.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.attachments.is_empty()
    }

    pub fn content_chars(&self) -> usize {
        self.content.chars().count()
    }
}

/// Signals a connection emits, in order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Handshake finished. Carries the account identity when the client
    /// reported one.
    Ready(Option<NativeUser>),
    /// The connection failed, before or after the handshake.
    Error(String),
    MessageCreate(NativeMessage),
}

/// An open connection for one credential.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Client library name and version.
    fn library(&self) -> (&'static str, &'static str);

    fn cached_users(&self) -> Vec<NativeUser>;

    fn cached_user(&self, user_id: &str) -> Option<NativeUser>;

    /// Guilds with their postable channels.
    fn cached_guilds(&self) -> Vec<NativeGuild>;

    /// Create a message and return its ID.
    async fn create_message(&self, channel_id: &str, payload: OutboundPayload) -> Result<String>;

    async fn get_message(&self, channel_id: &str, message_id: &str) -> Result<NativeMessage>;

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()>;

    /// ID of the direct-message channel with `user_id`, opening it if needed.
    async fn dm_channel(&self, user_id: &str) -> Result<String>;

    async fn disconnect(&self);
}

pub struct Connection {
    pub transport: Arc<dyn Transport>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens connections. The returned event stream must eventually yield
/// `Ready` or `Error` unless the platform never answers.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, token: &Secret<String>, options: &NetworkOptions) -> Result<Connection>;
}
