//! A connected account and the capability objects scoped to it.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, RwLock},
};

use {
    async_trait::async_trait,
    chrono::Utc,
    dcbridge_channels::{
        BotInfo, BotSession, ContactRef, Contactable, FetchedMessage, ForwardNode, GroupRef,
        Groupable, MemberRef, MessageSegment, SendReceipt, VersionInfo,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use crate::{
    Error, Result,
    codec::{self, Encoded, MessageCodec},
    directory,
    forward::{self, Delivery},
    id::IdNamespace,
    transport::{NativeUser, Transport},
};

/// Adapter implementation ID reported in [`VersionInfo`].
pub const ADAPTER_ID: &str = "DiscordBot";

/// State shared by a session and every capability object it hands out.
pub struct SessionCore {
    self_id: String,
    account: NativeUser,
    start_time: i64,
    ns: IdNamespace,
    transport: Arc<dyn Transport>,
    codec: MessageCodec,
    /// Native user ID to DM channel ID.
    dm_channels: RwLock<HashMap<String, String>>,
    /// Guild channels messages have arrived from, cached or not.
    group_channels: RwLock<HashSet<String>>,
}

impl SessionCore {
    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn namespace(&self) -> IdNamespace {
        self.ns
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Whether `native_user_id` is this session's own account.
    pub fn is_own(&self, native_user_id: &str) -> bool {
        self.account.id == native_user_id
    }

    /// Record the DM channel a user wrote from, so replies skip the lookup.
    pub fn remember_dm_channel(&self, native_user_id: &str, channel_id: &str) {
        let mut channels = self.dm_channels.write().unwrap_or_else(|e| e.into_inner());
        channels.insert(native_user_id.to_string(), channel_id.to_string());
    }

    /// Record a guild channel a message arrived from, so replies to it are
    /// group sends even when the client cache does not list it.
    pub fn remember_group_channel(&self, channel_id: &str) {
        let mut channels = self.group_channels.write().unwrap_or_else(|e| e.into_inner());
        channels.insert(channel_id.to_string());
    }

    fn cached_dm_channel(&self, native_user_id: &str) -> Option<String> {
        let channels = self.dm_channels.read().unwrap_or_else(|e| e.into_inner());
        channels.get(native_user_id).cloned()
    }

    fn native<'a>(&self, host_id: &'a str) -> Result<&'a str> {
        let native = self.ns.strip_prefix(host_id);
        if native.is_empty() {
            return Err(Error::invalid_input(format!("empty target id: {host_id:?}")));
        }
        Ok(native)
    }

    async fn dm_channel_for(&self, user_id: &str) -> Result<String> {
        let native = self.native(user_id)?;
        if let Some(channel_id) = self.cached_dm_channel(native) {
            return Ok(channel_id);
        }
        let channel_id = self.transport.dm_channel(native).await?;
        debug!(self_id = %self.self_id, user_id, channel_id, "opened dm channel");
        self.remember_dm_channel(native, &channel_id);
        Ok(channel_id)
    }

    fn is_group_channel(&self, native_channel_id: &str) -> bool {
        let seen = self.group_channels.read().unwrap_or_else(|e| e.into_inner());
        if seen.contains(native_channel_id) {
            return true;
        }
        self.transport
            .cached_guilds()
            .iter()
            .any(|guild| guild.channels.iter().any(|c| c.id == native_channel_id))
    }

    /// Channel a host target ID resolves to: a cached or previously seen
    /// guild channel is a group, anything else is a user reached by DM.
    async fn channel_for(&self, target_id: &str) -> Result<String> {
        let native = self.native(target_id)?;
        if self.is_group_channel(native) {
            return Ok(native.to_string());
        }
        self.dm_channel_for(target_id).await
    }

    async fn deliver(&self, channel_id: &str, encoded: Encoded) -> Result<SendReceipt> {
        if encoded.payload.is_empty() {
            return Err(Error::invalid_input("message has no sendable content"));
        }
        info!(
            self_id = %self.self_id,
            channel_id,
            text = %encoded.log,
            "sending message"
        );
        let message_id = self
            .transport
            .create_message(channel_id, encoded.payload)
            .await?;
        Ok(SendReceipt { message_id })
    }

    async fn send_to(&self, channel_id: &str, segments: &[MessageSegment]) -> Result<SendReceipt> {
        let encoded = self.codec.encode(segments).await?;
        self.deliver(channel_id, encoded).await
    }

    async fn forward_to(
        &self,
        channel_id: &str,
        nodes: &[ForwardNode],
    ) -> Result<Vec<SendReceipt>> {
        let parts = forward::expand(nodes, |node| self.codec.encode(&node.message)).await?;
        match forward::plan(parts) {
            Delivery::Folded(encoded) if encoded.payload.is_empty() => Ok(Vec::new()),
            Delivery::Folded(encoded) => Ok(vec![self.deliver(channel_id, encoded).await?]),
            Delivery::Sequential(parts) => {
                debug!(
                    self_id = %self.self_id,
                    channel_id,
                    count = parts.len(),
                    "forward bundle too large for one message, sending per node"
                );
                forward::expand(parts, |part| self.deliver(channel_id, part)).await
            },
        }
    }

    async fn fetch(&self, channel_id: &str, message_id: &str) -> Result<FetchedMessage> {
        let message = self.transport.get_message(channel_id, message_id).await?;
        let decoded = codec::decode(&message, self.ns);
        Ok(FetchedMessage {
            message_id: message.id,
            sender: directory::contact(&message.author, self.ns),
            message: decoded.segments,
            raw_message: decoded.raw,
            time: message.timestamp,
        })
    }

    async fn recall(&self, channel_id: &str, message_id: &str) -> Result<bool> {
        self.transport.delete_message(channel_id, message_id).await?;
        info!(self_id = %self.self_id, channel_id, message_id, "recalled message");
        Ok(true)
    }

    fn avatar_of(&self, user_id: &str) -> Option<String> {
        directory::friend(self.transport.as_ref(), self.ns, user_id).and_then(|c| c.avatar)
    }
}

/// The host-facing handle of one connected account.
pub struct DiscordSession {
    core: Arc<SessionCore>,
    cancel: CancellationToken,
}

impl DiscordSession {
    pub fn new(
        account: NativeUser,
        transport: Arc<dyn Transport>,
        codec: MessageCodec,
    ) -> Self {
        let ns = codec.namespace();
        Self {
            core: Arc::new(SessionCore {
                self_id: ns.to_host_user(&account.id),
                account,
                start_time: Utc::now().timestamp(),
                ns,
                transport,
                codec,
                dm_channels: RwLock::new(HashMap::new()),
                group_channels: RwLock::new(HashSet::new()),
            }),
            cancel: CancellationToken::new(),
        }
    }

    pub fn core(&self) -> &SessionCore {
        &self.core
    }

    /// Cancelled when the session disconnects.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn friend(&self, user_id: &str) -> Friend {
        Friend {
            core: Arc::clone(&self.core),
            user_id: user_id.to_string(),
        }
    }

    pub fn group(&self, group_id: &str) -> Group {
        Group {
            core: Arc::clone(&self.core),
            group_id: group_id.to_string(),
        }
    }
}

#[async_trait]
impl BotSession for DiscordSession {
    fn self_id(&self) -> &str {
        &self.core.self_id
    }

    fn info(&self) -> BotInfo {
        let (library, version) = self.core.transport.library();
        BotInfo {
            self_id: self.core.self_id.clone(),
            nickname: self.core.account.name.clone(),
            avatar: self.core.account.avatar_url.clone(),
            start_time: self.core.start_time,
            version: VersionInfo {
                id: ADAPTER_ID.to_string(),
                name: library.to_string(),
                version: version.to_string(),
            },
        }
    }

    async fn send_message(
        &self,
        target_id: &str,
        message: Vec<MessageSegment>,
    ) -> dcbridge_channels::Result<SendReceipt> {
        let channel_id = self.core.channel_for(target_id).await?;
        Ok(self.core.send_to(&channel_id, &message).await?)
    }

    async fn get_message(
        &self,
        target_id: &str,
        message_id: &str,
    ) -> dcbridge_channels::Result<FetchedMessage> {
        let channel_id = self.core.channel_for(target_id).await?;
        Ok(self.core.fetch(&channel_id, message_id).await?)
    }

    async fn recall_message(
        &self,
        target_id: &str,
        message_id: &str,
    ) -> dcbridge_channels::Result<bool> {
        let channel_id = self.core.channel_for(target_id).await?;
        Ok(self.core.recall(&channel_id, message_id).await?)
    }

    async fn make_forward_msg(
        &self,
        target_id: &str,
        nodes: Vec<ForwardNode>,
    ) -> dcbridge_channels::Result<Vec<SendReceipt>> {
        let channel_id = self.core.channel_for(target_id).await?;
        Ok(self.core.forward_to(&channel_id, &nodes).await?)
    }

    fn pick_friend(&self, user_id: &str) -> Box<dyn Contactable> {
        Box::new(self.friend(user_id))
    }

    fn pick_group(&self, group_id: &str) -> Box<dyn Groupable> {
        Box::new(self.group(group_id))
    }

    fn pick_member(&self, group_id: &str, user_id: &str) -> Box<dyn Contactable> {
        Box::new(self.group(group_id).member(user_id))
    }

    fn friends_list(&self) -> Vec<ContactRef> {
        directory::friends(self.core.transport(), self.core.ns)
    }

    fn groups_list(&self) -> Vec<GroupRef> {
        directory::groups(self.core.transport(), self.core.ns)
    }

    fn member_info(&self, group_id: &str, user_id: &str) -> MemberRef {
        directory::member(self.core.transport(), self.core.ns, group_id, user_id)
    }

    fn avatar_url(&self, target_id: &str) -> Option<String> {
        self.core.avatar_of(target_id)
    }

    async fn disconnect(&self) {
        info!(self_id = %self.core.self_id, "disconnecting session");
        self.cancel.cancel();
        self.core.transport.disconnect().await;
    }
}

/// A user reached through direct messages.
pub struct Friend {
    core: Arc<SessionCore>,
    user_id: String,
}

#[async_trait]
impl Contactable for Friend {
    fn id(&self) -> &str {
        &self.user_id
    }

    async fn send_msg(
        &self,
        message: Vec<MessageSegment>,
    ) -> dcbridge_channels::Result<SendReceipt> {
        let channel_id = self.core.dm_channel_for(&self.user_id).await?;
        Ok(self.core.send_to(&channel_id, &message).await?)
    }

    async fn make_forward_msg(
        &self,
        nodes: Vec<ForwardNode>,
    ) -> dcbridge_channels::Result<Vec<SendReceipt>> {
        let channel_id = self.core.dm_channel_for(&self.user_id).await?;
        Ok(self.core.forward_to(&channel_id, &nodes).await?)
    }

    async fn recall_msg(&self, message_id: &str) -> dcbridge_channels::Result<bool> {
        let channel_id = self.core.dm_channel_for(&self.user_id).await?;
        Ok(self.core.recall(&channel_id, message_id).await?)
    }

    async fn get_msg(&self, message_id: &str) -> dcbridge_channels::Result<FetchedMessage> {
        let channel_id = self.core.dm_channel_for(&self.user_id).await?;
        Ok(self.core.fetch(&channel_id, message_id).await?)
    }

    fn avatar_url(&self) -> Option<String> {
        self.core.avatar_of(&self.user_id)
    }
}

/// A guild channel.
pub struct Group {
    core: Arc<SessionCore>,
    group_id: String,
}

impl Group {
    fn channel_id(&self) -> Result<&str> {
        self.core.native(&self.group_id)
    }

    pub fn member(&self, user_id: &str) -> Member {
        Member {
            group_id: self.group_id.clone(),
            friend: Friend {
                core: Arc::clone(&self.core),
                user_id: user_id.to_string(),
            },
        }
    }
}

#[async_trait]
impl Contactable for Group {
    fn id(&self) -> &str {
        &self.group_id
    }

    async fn send_msg(
        &self,
        message: Vec<MessageSegment>,
    ) -> dcbridge_channels::Result<SendReceipt> {
        Ok(self.core.send_to(self.channel_id()?, &message).await?)
    }

    async fn make_forward_msg(
        &self,
        nodes: Vec<ForwardNode>,
    ) -> dcbridge_channels::Result<Vec<SendReceipt>> {
        Ok(self.core.forward_to(self.channel_id()?, &nodes).await?)
    }

    async fn recall_msg(&self, message_id: &str) -> dcbridge_channels::Result<bool> {
        Ok(self.core.recall(self.channel_id()?, message_id).await?)
    }

    async fn get_msg(&self, message_id: &str) -> dcbridge_channels::Result<FetchedMessage> {
        Ok(self.core.fetch(self.channel_id()?, message_id).await?)
    }

    fn avatar_url(&self) -> Option<String> {
        None
    }
}

impl Groupable for Group {
    fn pick_member(&self, user_id: &str) -> Box<dyn Contactable> {
        Box::new(self.member(user_id))
    }

    fn info(&self) -> Option<GroupRef> {
        directory::group(self.core.transport(), self.core.ns, &self.group_id)
    }
}

/// A user seen through a group. Messages go to the user directly.
pub struct Member {
    group_id: String,
    friend: Friend,
}

impl Member {
    pub fn info(&self) -> MemberRef {
        directory::member(
            self.friend.core.transport(),
            self.friend.core.ns,
            &self.group_id,
            &self.friend.user_id,
        )
    }
}

#[async_trait]
impl Contactable for Member {
    fn id(&self) -> &str {
        self.friend.id()
    }

    async fn send_msg(
        &self,
        message: Vec<MessageSegment>,
    ) -> dcbridge_channels::Result<SendReceipt> {
        self.friend.send_msg(message).await
    }

    async fn make_forward_msg(
        &self,
        nodes: Vec<ForwardNode>,
    ) -> dcbridge_channels::Result<Vec<SendReceipt>> {
        self.friend.make_forward_msg(nodes).await
    }

    async fn recall_msg(&self, message_id: &str) -> dcbridge_channels::Result<bool> {
        self.friend.recall_msg(message_id).await
    }

    async fn get_msg(&self, message_id: &str) -> dcbridge_channels::Result<FetchedMessage> {
        self.friend.get_msg(message_id).await
    }

    fn avatar_url(&self) -> Option<String> {
        self.friend.avatar_url()
    }
}
