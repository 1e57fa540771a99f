//! Platform-neutral, segment-based message representation.
//!
//! A message is an ordered `Vec<MessageSegment>`. Segment order carries
//! meaning: interleaved text and mentions keep their original positions.

use {
    serde::{Deserialize, Deserializer, Serialize},
    serde_json::Value,
    tracing::debug,
};

/// `at` target meaning "everyone in the conversation".
pub const MENTION_ALL: &str = "all";

/// Segment tags this crate knows how to deserialize.
const KNOWN_KINDS: &[&str] = &[
    "text", "image", "record", "video", "file", "reply", "at", "node", "button",
];

/// One typed unit of a structured message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MessageSegment {
    Text {
        text: String,
    },
    Image {
        file: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Audio clip.
    Record {
        file: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Video {
        file: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Generic attachment with no richer classification.
    File {
        file: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Reply {
        id: String,
    },
    /// Mention of a host user ID, or [`MENTION_ALL`].
    At {
        qq: String,
    },
    /// Forwarded bundle of nested messages.
    Node(Vec<ForwardNode>),
    /// Interactive buttons. Accepted but never translated.
    Button(Value),
    /// Object input whose tag is not recognized.
    #[serde(skip)]
    Unsupported {
        kind: String,
    },
}

impl MessageSegment {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn at(target: impl Into<String>) -> Self {
        Self::At { qq: target.into() }
    }

    pub fn reply(id: impl Into<String>) -> Self {
        Self::Reply { id: id.into() }
    }

    pub fn image(file: impl Into<String>) -> Self {
        Self::Image {
            file: file.into(),
            name: None,
        }
    }

    /// Tag name as it appears on the wire.
    pub fn kind(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Record { .. } => "record",
            Self::Video { .. } => "video",
            Self::File { .. } => "file",
            Self::Reply { .. } => "reply",
            Self::At { .. } => "at",
            Self::Node(_) => "node",
            Self::Button(_) => "button",
            Self::Unsupported { kind } => kind,
        }
    }
}

impl From<&str> for MessageSegment {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for MessageSegment {
    fn from(text: String) -> Self {
        Self::Text { text }
    }
}

/// One message inside a forwarded bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(deserialize_with = "deserialize_message")]
    pub message: Vec<MessageSegment>,
}

impl ForwardNode {
    pub fn new(message: Vec<MessageSegment>) -> Self {
        Self {
            user_id: None,
            nickname: None,
            message,
        }
    }
}

/// Parse loosely-typed host input into segments.
///
/// Accepts a single element or an array. Strings become text, tagged objects
/// become segments, objects with an unknown tag become
/// [`MessageSegment::Unsupported`], and every other value is stringified into
/// a text segment.
pub fn parse_message(value: Value) -> Vec<MessageSegment> {
    match value {
        Value::Array(items) => items.into_iter().filter_map(parse_element).collect(),
        other => parse_element(other).into_iter().collect(),
    }
}

fn parse_element(value: Value) -> Option<MessageSegment> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(MessageSegment::Text { text }),
        Value::Object(ref map) => {
            let Some(kind) = map.get("type").and_then(Value::as_str) else {
                return Some(MessageSegment::text(value.to_string()));
            };
            if !KNOWN_KINDS.contains(&kind) {
                debug!(kind, "unsupported message segment");
                return Some(MessageSegment::Unsupported {
                    kind: kind.to_string(),
                });
            }
            if kind == "button" {
                return Some(MessageSegment::Button(
                    map.get("data").cloned().unwrap_or(Value::Null),
                ));
            }
            let raw = value.to_string();
            match serde_json::from_value::<MessageSegment>(value) {
                Ok(segment) => Some(segment),
                Err(e) => {
                    debug!(error = %e, "malformed message segment, keeping as text");
                    Some(MessageSegment::Text { text: raw })
                },
            }
        },
        other => Some(MessageSegment::text(other.to_string())),
    }
}

fn deserialize_message<'de, D>(deserializer: D) -> Result<Vec<MessageSegment>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(parse_message)
}
