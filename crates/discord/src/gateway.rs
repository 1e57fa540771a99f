//! [`Connector`] backed by serenity.

use std::sync::Arc;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serenity::{
        all::{
            ChannelId, ChannelType, ClientBuilder, Context, CreateAttachment, CreateMessage,
            EventHandler, GatewayIntents, Message, MessageId, Ready, User, UserId,
        },
        cache::Cache,
        gateway::ShardManager,
        http::{Http, HttpBuilder},
    },
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use crate::{
    Error, Result,
    config::NetworkOptions,
    transport::{
        Connection, Connector, FileData, NativeAttachment, NativeChannel, NativeGuild,
        NativeMessage, NativeUser, OutboundPayload, Transport, TransportEvent,
    },
};

const LIBRARY: &str = "serenity";
const LIBRARY_VERSION: &str = "0.12";

/// Gateway intents requested for every account.
pub fn intents() -> GatewayIntents {
    GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT
}

fn snowflake(raw: &str, what: &str) -> Result<u64> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| Error::invalid_input(format!("invalid {what} id: {raw:?}")))
}

fn native_user(user: &User) -> NativeUser {
    NativeUser {
        id: user.id.to_string(),
        name: user.global_name.clone().unwrap_or_else(|| user.name.clone()),
        avatar_url: Some(user.face()),
    }
}

fn native_message(msg: &Message) -> NativeMessage {
    NativeMessage {
        id: msg.id.to_string(),
        channel_id: msg.channel_id.to_string(),
        guild_id: msg.guild_id.map(|id| id.to_string()),
        author: native_user(&msg.author),
        content: msg.content.clone(),
        attachments: msg
            .attachments
            .iter()
            .map(|a| NativeAttachment {
                filename: a.filename.clone(),
                url: a.url.clone(),
                content_type: a.content_type.clone(),
            })
            .collect(),
        reply_to: msg
            .message_reference
            .as_ref()
            .and_then(|r| r.message_id)
            .map(|id| id.to_string()),
        timestamp: msg.timestamp.unix_timestamp(),
    }
}

/// Forwards gateway events into the connection's event stream.
struct GatewayHandler {
    events: mpsc::UnboundedSender<TransportEvent>,
}

#[serenity::async_trait]
impl EventHandler for GatewayHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            user = %ready.user.name,
            guilds = ready.guilds.len(),
            "discord gateway ready"
        );
        let _ = self
            .events
            .send(TransportEvent::Ready(Some(native_user(&ready.user))));
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        if self
            .events
            .send(TransportEvent::MessageCreate(native_message(&msg)))
            .is_err()
        {
            debug!(message_id = %msg.id, "event stream closed, dropping message");
        }
    }
}

/// Opens serenity clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerenityConnector;

#[async_trait]
impl Connector for SerenityConnector {
    async fn open(&self, token: &Secret<String>, options: &NetworkOptions) -> Result<Connection> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut http = HttpBuilder::new(token.expose_secret());
        if let Some(endpoint) = &options.rest_endpoint {
            debug!(endpoint, "routing discord REST calls through override");
            http = http.proxy(endpoint.as_str());
        }

        let handler = GatewayHandler { events: tx.clone() };
        let mut client = ClientBuilder::new_with_http(http.build(), intents())
            .event_handler(handler)
            .await?;

        let transport = Arc::new(SerenityTransport {
            http: Arc::clone(&client.http),
            cache: Arc::clone(&client.cache),
            shard_manager: Arc::clone(&client.shard_manager),
        });

        tokio::spawn(async move {
            if let Err(e) = client.start().await {
                warn!(error = %e, "discord client stopped");
                let _ = tx.send(TransportEvent::Error(e.to_string()));
            }
        });

        Ok(Connection {
            transport,
            events: rx,
        })
    }
}

/// REST and cache access for one serenity client.
pub struct SerenityTransport {
    http: Arc<Http>,
    cache: Arc<Cache>,
    shard_manager: Arc<ShardManager>,
}

#[async_trait]
impl Transport for SerenityTransport {
    fn library(&self) -> (&'static str, &'static str) {
        (LIBRARY, LIBRARY_VERSION)
    }

    fn cached_users(&self) -> Vec<NativeUser> {
        self.cache
            .users()
            .iter()
            .map(|entry| native_user(entry.value()))
            .collect()
    }

    fn cached_user(&self, user_id: &str) -> Option<NativeUser> {
        let id = snowflake(user_id, "user").ok()?;
        self.cache
            .user(UserId::new(id))
            .map(|user| native_user(&user))
    }

    fn cached_guilds(&self) -> Vec<NativeGuild> {
        self.cache
            .guilds()
            .into_iter()
            .filter_map(|guild_id| {
                let guild = self.cache.guild(guild_id)?;
                let mut channels: Vec<NativeChannel> = guild
                    .channels
                    .values()
                    .filter(|c| matches!(c.kind, ChannelType::Text | ChannelType::News))
                    .map(|c| NativeChannel {
                        id: c.id.to_string(),
                        name: c.name.clone(),
                    })
                    .collect();
                channels.sort_by(|a, b| a.id.cmp(&b.id));
                Some(NativeGuild {
                    id: guild_id.to_string(),
                    name: guild.name.clone(),
                    channels,
                })
            })
            .collect()
    }

    async fn create_message(&self, channel_id: &str, payload: OutboundPayload) -> Result<String> {
        let channel = ChannelId::new(snowflake(channel_id, "channel")?);

        let mut builder = CreateMessage::new();
        if !payload.content.is_empty() {
            builder = builder.content(payload.content);
        }
        for attachment in payload.attachments {
            let file = match attachment.data {
                FileData::Bytes(bytes) => CreateAttachment::bytes(bytes, attachment.name),
                FileData::Path(path) => CreateAttachment::path(&path).await?,
            };
            builder = builder.add_file(file);
        }
        if let Some(reply_to) = payload.reply_to {
            match snowflake(&reply_to, "message") {
                Ok(id) => builder = builder.reference_message((channel, MessageId::new(id))),
                Err(e) => warn!(channel_id, error = %e, "dropping reply reference"),
            }
        }

        let message = channel.send_message(&self.http, builder).await?;
        Ok(message.id.to_string())
    }

    async fn get_message(&self, channel_id: &str, message_id: &str) -> Result<NativeMessage> {
        let channel = ChannelId::new(snowflake(channel_id, "channel")?);
        let id = MessageId::new(snowflake(message_id, "message")?);
        let message = channel.message(&self.http, id).await?;
        Ok(native_message(&message))
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        let channel = ChannelId::new(snowflake(channel_id, "channel")?);
        let id = MessageId::new(snowflake(message_id, "message")?);
        channel.delete_message(&self.http, id).await?;
        Ok(())
    }

    async fn dm_channel(&self, user_id: &str) -> Result<String> {
        let user = UserId::new(snowflake(user_id, "user")?);
        let channel = user.create_dm_channel(&self.http).await?;
        Ok(channel.id.to_string())
    }

    async fn disconnect(&self) {
        self.shard_manager.shutdown_all().await;
    }
}
