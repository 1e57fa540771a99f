//! Translation between host segments and native messages.

use std::sync::LazyLock;

use {
    dcbridge_channels::{MENTION_ALL, MessageSegment},
    futures::future::BoxFuture,
    regex::Regex,
    tracing::debug,
};

use crate::{
    Result,
    file::FileResolver,
    id::IdNamespace,
    transport::{NativeMessage, OutboundAttachment, OutboundPayload},
};

#[allow(clippy::expect_used)]
static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?(\d+)>").expect("mention pattern is valid"));

/// Attachment classes shared by both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Record,
    Video,
    File,
}

impl MediaKind {
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
        if content_type.starts_with("audio/") {
            Self::Record
        } else if content_type.starts_with("image/") {
            Self::Image
        } else if content_type.starts_with("video/") {
            Self::Video
        } else {
            Self::File
        }
    }

    /// Log marker label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Image => "图片",
            Self::Record => "音频",
            Self::Video => "视频",
            Self::File => "文件",
        }
    }

    /// Upload name when neither the segment nor the content names the file.
    pub fn fallback_name(self) -> &'static str {
        match self {
            Self::Image => "image.png",
            Self::Record => "audio.mp3",
            Self::Video => "video.mp4",
            Self::File => "file",
        }
    }

    pub fn marker(self, name: &str, url: &str) -> String {
        format!("[{}：{name}({url})]", self.label())
    }

    fn segment(self, file: String, name: String) -> MessageSegment {
        let name = Some(name);
        match self {
            Self::Image => MessageSegment::Image { file, name },
            Self::Record => MessageSegment::Record { file, name },
            Self::Video => MessageSegment::Video { file, name },
            Self::File => MessageSegment::File { file, name },
        }
    }
}

/// Result of encoding: what goes on the wire and what goes in the log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoded {
    pub payload: OutboundPayload,
    pub log: String,
}

impl Encoded {
    /// Append `other` on a new line. An existing reply reference is kept.
    pub fn append(&mut self, other: Encoded) {
        push_line(&mut self.payload.content, &other.payload.content);
        push_line(&mut self.log, &other.log);
        self.payload.attachments.extend(other.payload.attachments);
        if self.payload.reply_to.is_none() {
            self.payload.reply_to = other.payload.reply_to;
        }
    }
}

fn push_line(buf: &mut String, line: &str) {
    if line.is_empty() {
        return;
    }
    if !buf.is_empty() {
        buf.push('\n');
    }
    buf.push_str(line);
}

/// A decoded native message.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub segments: Vec<MessageSegment>,
    /// Log rendering with mentions and attachments as markers.
    pub raw: String,
}

/// Encodes host segments into native payloads.
#[derive(Clone)]
pub struct MessageCodec {
    ns: IdNamespace,
    files: FileResolver,
}

impl MessageCodec {
    pub fn new(ns: IdNamespace, files: FileResolver) -> Self {
        Self { ns, files }
    }

    pub fn namespace(&self) -> IdNamespace {
        self.ns
    }

    /// Encode `segments` into one payload. Fails only if a file cannot be
    /// resolved.
    pub async fn encode(&self, segments: &[MessageSegment]) -> Result<Encoded> {
        let mut out = Encoded::default();
        self.encode_into(segments, &mut out).await?;
        Ok(out)
    }

    fn encode_into<'a>(
        &'a self,
        segments: &'a [MessageSegment],
        out: &'a mut Encoded,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for segment in segments {
                match segment {
                    MessageSegment::Text { text } => {
                        out.payload.content.push_str(text);
                        out.log.push_str(text);
                    },
                    MessageSegment::Image { file, name } => {
                        self.attach(out, MediaKind::Image, file, name.as_deref())
                            .await?
                    },
                    MessageSegment::Record { file, name } => {
                        self.attach(out, MediaKind::Record, file, name.as_deref())
                            .await?
                    },
                    MessageSegment::Video { file, name } => {
                        self.attach(out, MediaKind::Video, file, name.as_deref())
                            .await?
                    },
                    MessageSegment::File { file, name } => {
                        self.attach(out, MediaKind::File, file, name.as_deref())
                            .await?
                    },
                    MessageSegment::Reply { id } => out.payload.reply_to = Some(id.clone()),
                    MessageSegment::At { qq } => {
                        let token = if qq == MENTION_ALL {
                            "@everyone".to_string()
                        } else {
                            format!("<@{}>", self.ns.strip_prefix(qq))
                        };
                        out.payload.content.push_str(&token);
                        out.log.push_str(&token);
                    },
                    MessageSegment::Node(nodes) => {
                        for node in nodes {
                            let mut nested = Encoded::default();
                            self.encode_into(&node.message, &mut nested).await?;
                            out.append(nested);
                        }
                    },
                    MessageSegment::Button(_) => debug!("dropping button segment"),
                    MessageSegment::Unsupported { kind } => {
                        debug!(kind, "dropping unsupported segment")
                    },
                }
            }
            Ok(())
        })
    }

    async fn attach(
        &self,
        out: &mut Encoded,
        kind: MediaKind,
        file: &str,
        name: Option<&str>,
    ) -> Result<()> {
        let resolved = self
            .files
            .resolve(file, name, kind.fallback_name())
            .await?;
        out.log
            .push_str(&kind.marker(&resolved.name, &resolved.display_url));
        out.payload.attachments.push(OutboundAttachment {
            name: resolved.name,
            data: resolved.data,
        });
        Ok(())
    }
}

/// Decode a native message into host segments.
pub fn decode(message: &NativeMessage, ns: IdNamespace) -> Decoded {
    let mut segments = Vec::new();
    let mut raw = String::new();

    if let Some(id) = &message.reply_to {
        segments.push(MessageSegment::reply(id.as_str()));
        raw.push_str(&format!("[回复：{id}]"));
    }

    let content = message.content.as_str();
    let mut last = 0;
    for caps in MENTION.captures_iter(content) {
        let (Some(whole), Some(id)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let before = &content[last..whole.start()];
        if !before.is_empty() {
            segments.push(MessageSegment::text(before));
            raw.push_str(before);
        }
        let host = ns.to_host_user(id.as_str());
        raw.push_str(&format!("[提及：{host}]"));
        segments.push(MessageSegment::at(host));
        last = whole.end();
    }
    let rest = &content[last..];
    if !rest.is_empty() {
        segments.push(MessageSegment::text(rest));
        raw.push_str(rest);
    }

    for attachment in &message.attachments {
        let kind = MediaKind::from_content_type(attachment.content_type.as_deref());
        raw.push_str(&kind.marker(&attachment.filename, &attachment.url));
        segments.push(kind.segment(attachment.url.clone(), attachment.filename.clone()));
    }

    Decoded { segments, raw }
}
