//! Events published on the host bus and the directory views they carry.

use serde::{Deserialize, Serialize};

use crate::message::MessageSegment;

/// A user as seen through one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRef {
    pub user_id: String,
    pub native_id: String,
    pub nickname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// A channel that messages can be posted to, addressed as a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    pub group_id: String,
    pub native_id: String,
    pub guild_id: String,
    /// `"<guild>-<channel>"`.
    pub group_name: String,
}

/// A contact narrowed to a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    pub group_id: String,
    pub user_id: String,
    pub nickname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl MemberRef {
    pub fn new(group_id: impl Into<String>, contact: ContactRef) -> Self {
        Self {
            group_id: group_id.into(),
            user_id: contact.user_id,
            nickname: contact.nickname,
            avatar: contact.avatar,
        }
    }
}

/// Conversation scope of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageScope {
    Private,
    Group,
}

impl MessageScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
        }
    }
}

impl std::fmt::Display for MessageScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded inbound message, ready for application logic.
#[derive(Debug, Clone, Serialize)]
pub struct InboundEvent {
    pub self_id: String,
    pub message_id: String,
    pub user_id: String,
    pub sender: ContactRef,
    /// Human-readable rendering for logs; attachments appear as markers.
    pub raw_message: String,
    pub message: Vec<MessageSegment>,
    pub post_type: &'static str,
    pub message_type: MessageScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<MemberRef>,
    /// Unix seconds.
    pub time: i64,
}

impl InboundEvent {
    /// The ID a reply to this event should be sent to.
    pub fn reply_target(&self) -> &str {
        match &self.group {
            Some(group) => &group.group_id,
            None => &self.user_id,
        }
    }

    /// Concatenated text segments, without mentions or attachments.
    pub fn plain_text(&self) -> String {
        self.message
            .iter()
            .filter_map(|segment| match segment {
                MessageSegment::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Everything the adapter publishes on the host bus.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostEvent {
    Message(InboundEvent),
    Connect { self_id: String },
}
