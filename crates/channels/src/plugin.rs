use {async_trait::async_trait, serde::Serialize};

use crate::{
    Result,
    event::{ContactRef, GroupRef, MemberRef},
    message::{ForwardNode, MessageSegment},
};

// ── Session capabilities ────────────────────────────────────────────────────

/// Receipt for a message an adapter delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReceipt {
    pub message_id: String,
}

/// A message fetched back from the platform.
#[derive(Debug, Clone, Serialize)]
pub struct FetchedMessage {
    pub message_id: String,
    pub sender: ContactRef,
    pub message: Vec<MessageSegment>,
    pub raw_message: String,
    /// Unix seconds.
    pub time: i64,
}

/// Which adapter and client library serve a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    /// Adapter implementation ID, e.g. `DiscordBot`.
    pub id: String,
    pub name: String,
    /// Version of the underlying client library.
    pub version: String,
}

/// Identity snapshot of a connected account.
#[derive(Debug, Clone, Serialize)]
pub struct BotInfo {
    pub self_id: String,
    pub nickname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Unix seconds.
    pub start_time: i64,
    pub version: VersionInfo,
}

/// Something messages can be sent to: a friend, a group, or a group member.
#[async_trait]
pub trait Contactable: Send + Sync {
    /// Host ID of the target.
    fn id(&self) -> &str;

    async fn send_msg(&self, message: Vec<MessageSegment>) -> Result<SendReceipt>;

    /// Deliver a forwarded bundle, folded into one message where possible.
    async fn make_forward_msg(&self, nodes: Vec<ForwardNode>) -> Result<Vec<SendReceipt>>;

    /// Delete a message previously sent to this target.
    async fn recall_msg(&self, message_id: &str) -> Result<bool>;

    async fn get_msg(&self, message_id: &str) -> Result<FetchedMessage>;

    fn avatar_url(&self) -> Option<String>;
}

/// A group-scoped target that can narrow to its members.
pub trait Groupable: Contactable {
    fn pick_member(&self, user_id: &str) -> Box<dyn Contactable>;

    /// Directory entry for this group, if the client cache knows it.
    fn info(&self) -> Option<GroupRef>;
}

/// One connected account as exposed to the host framework.
#[async_trait]
pub trait BotSession: Send + Sync {
    fn self_id(&self) -> &str;

    fn info(&self) -> BotInfo;

    async fn send_message(
        &self,
        target_id: &str,
        message: Vec<MessageSegment>,
    ) -> Result<SendReceipt>;

    async fn get_message(&self, target_id: &str, message_id: &str) -> Result<FetchedMessage>;

    async fn recall_message(&self, target_id: &str, message_id: &str) -> Result<bool>;

    async fn make_forward_msg(
        &self,
        target_id: &str,
        nodes: Vec<ForwardNode>,
    ) -> Result<Vec<SendReceipt>>;

    fn pick_friend(&self, user_id: &str) -> Box<dyn Contactable>;

    fn pick_group(&self, group_id: &str) -> Box<dyn Groupable>;

    fn pick_member(&self, group_id: &str, user_id: &str) -> Box<dyn Contactable>;

    fn friends_list(&self) -> Vec<ContactRef>;

    fn groups_list(&self) -> Vec<GroupRef>;

    fn member_info(&self, group_id: &str, user_id: &str) -> MemberRef;

    fn avatar_url(&self, target_id: &str) -> Option<String>;

    /// Close the underlying connection. The registry entry is removed by the
    /// caller.
    async fn disconnect(&self);
}
