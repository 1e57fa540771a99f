//! Operator commands sent as chat messages.
//!
//! - `#dc账号` lists configured accounts
//! - `#dc设置<token>` removes a known credential, or connects and saves a new one
//! - `#dc代理<url>` / `#dc反代<url>` set the forward proxy / REST override
//!   (empty clears)
//!
//! Only host users listed in `masters` may run them. Proxy changes and
//! removals apply on the next start.

use std::{path::PathBuf, sync::Arc};

use {
    dcbridge_channels::{HostEvent, InboundEvent, MessageSegment, Published, SessionRegistry},
    dcbridge_config::{DiscordConfig, load_config, save_config_to},
    secrecy::{ExposeSecret, Secret},
    tokio::sync::broadcast::{self, error::RecvError},
    tracing::{debug, error, info, warn},
};

use crate::{
    bot::{ConnectionManager, fingerprint},
    id::DISCORD,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ListAccounts,
    ToggleToken(String),
    SetProxy(String),
    SetReverseProxy(String),
}

/// Parse an operator command. The `dc` keyword is case-insensitive.
pub fn parse(text: &str) -> Option<Command> {
    let rest = text.trim().strip_prefix('#')?;
    if !rest.get(..2)?.eq_ignore_ascii_case("dc") {
        return None;
    }
    let rest = &rest[2..];

    if rest == "账号" {
        return Some(Command::ListAccounts);
    }
    if let Some(token) = rest.strip_prefix("设置") {
        let token = token.trim();
        return (!token.is_empty()).then(|| Command::ToggleToken(token.to_string()));
    }
    if let Some(url) = rest.strip_prefix("代理") {
        return Some(Command::SetProxy(url.trim().to_string()));
    }
    if let Some(url) = rest.strip_prefix("反代") {
        return Some(Command::SetReverseProxy(url.trim().to_string()));
    }
    None
}

/// `rendered` with the credential of a `#dc设置` command in `plain_text`
/// replaced by its fingerprint. Other text is returned unchanged.
pub fn redact_credentials(plain_text: &str, rendered: &str) -> String {
    match parse(plain_text) {
        Some(Command::ToggleToken(token)) => rendered.replace(&token, &fingerprint(&token)),
        _ => rendered.to_string(),
    }
}

fn set_or_cleared(value: &str) -> &'static str {
    if value.is_empty() {
        "删除"
    } else {
        "设置"
    }
}

/// Runs commands against the config file at `config_path`.
pub struct CommandHandler {
    manager: Arc<ConnectionManager>,
    config_path: PathBuf,
}

impl CommandHandler {
    pub fn new(manager: Arc<ConnectionManager>, config_path: PathBuf) -> Self {
        Self {
            manager,
            config_path,
        }
    }

    fn load(&self) -> DiscordConfig {
        if !self.config_path.exists() {
            return DiscordConfig::default();
        }
        load_config(&self.config_path).unwrap_or_else(|e| {
            warn!(path = %self.config_path.display(), error = %e, "failed to read config");
            DiscordConfig::default()
        })
    }

    fn save(&self, config: &DiscordConfig) {
        if let Err(e) = save_config_to(config, &self.config_path) {
            error!(path = %self.config_path.display(), error = %e, "failed to save config");
        }
    }

    /// Reply text for `event`, or `None` if it is not a command the sender
    /// may run.
    pub async fn handle(&self, event: &InboundEvent) -> Option<String> {
        let command = parse(&event.plain_text())?;
        let mut config = self.load();
        if !config.is_master(&event.user_id) {
            debug!(user_id = %event.user_id, "ignoring operator command from non-master");
            return None;
        }
        info!(
            user_id = %event.user_id,
            command = ?CommandKind(&command),
            "running operator command"
        );
        Some(self.run(command, &mut config).await)
    }

    async fn run(&self, command: Command, config: &mut DiscordConfig) -> String {
        match command {
            Command::ListAccounts => {
                let mut reply = format!("共{}个账号：", config.token.len());
                for token in &config.token {
                    reply.push('\n');
                    reply.push_str(&fingerprint(token.expose_secret()));
                }
                reply
            },
            Command::ToggleToken(token) if config.has_token(&token) => {
                config.toggle_token(&token);
                self.save(config);
                format!("账号已删除，重启后生效，共{}个账号", config.token.len())
            },
            Command::ToggleToken(token) => {
                match self.manager.connect(Secret::new(token.clone())).await {
                    Ok(self_id) => {
                        config.toggle_token(&token);
                        self.save(config);
                        info!(self_id, "account added");
                        format!("账号已连接，共{}个账号", config.token.len())
                    },
                    Err(e) => {
                        warn!(credential = %fingerprint(&token), error = %e, "account not added");
                        "账号连接失败".to_string()
                    },
                }
            },
            Command::SetProxy(url) => {
                let reply = format!("代理已{}，重启后生效", set_or_cleared(&url));
                config.proxy = url;
                self.save(config);
                reply
            },
            Command::SetReverseProxy(url) => {
                let reply = format!("反代已{}，重启后生效", set_or_cleared(&url));
                config.reverse_proxy = url;
                self.save(config);
                reply
            },
        }
    }
}

/// Command name without its argument, for logs.
struct CommandKind<'a>(&'a Command);

impl std::fmt::Debug for CommandKind<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self.0 {
            Command::ListAccounts => "list_accounts",
            Command::ToggleToken(_) => "toggle_token",
            Command::SetProxy(_) => "set_proxy",
            Command::SetReverseProxy(_) => "set_reverse_proxy",
        })
    }
}

/// Answer operator commands seen on the bus until it closes.
pub async fn serve(
    handler: Arc<CommandHandler>,
    registry: Arc<SessionRegistry>,
    mut events: broadcast::Receiver<Published>,
) {
    loop {
        let published = match events.recv().await {
            Ok(published) => published,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "command listener lagged behind the bus");
                continue;
            },
            Err(RecvError::Closed) => break,
        };
        if published.topic != "message" {
            continue;
        }
        let HostEvent::Message(event) = published.event.as_ref() else {
            continue;
        };
        // Other adapters share the bus.
        if !DISCORD.owns(&event.self_id) {
            continue;
        }
        if parse(&event.plain_text()).is_none() {
            continue;
        }

        let handler = Arc::clone(&handler);
        let registry = Arc::clone(&registry);
        let event = event.clone();
        tokio::spawn(async move {
            let Some(reply) = handler.handle(&event).await else {
                return;
            };
            if let Err(e) = send_reply(&registry, &event, reply).await {
                warn!(self_id = %event.self_id, error = %e, "failed to send command reply");
            }
        });
    }
}

/// Quote `event` and answer it through the session that received it.
async fn send_reply(
    registry: &SessionRegistry,
    event: &InboundEvent,
    reply: String,
) -> dcbridge_channels::Result<()> {
    let session = registry.require(&event.self_id)?;
    let message = vec![
        MessageSegment::reply(event.message_id.as_str()),
        MessageSegment::text(reply),
    ];
    session.send_message(event.reply_target(), message).await?;
    Ok(())
}
