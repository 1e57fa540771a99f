use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use {
    secrecy::{ExposeSecret, Secret},
    sha2::{Digest, Sha256},
    tokio::sync::mpsc,
    tracing::{debug, error, info, warn},
};

use dcbridge_channels::{BotSession, EventBus, SessionRegistry, publish_connect};

use crate::{
    Error, Result,
    codec::MessageCodec,
    config::NetworkOptions,
    file::FileResolver,
    handlers,
    id::DISCORD,
    session::DiscordSession,
    transport::{Connection, Connector, NativeUser, TransportEvent},
};

/// Lifecycle of one credential's connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Failed,
}

/// Result of one startup connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected { self_id: String },
    Failed { credential: String, error: String },
    /// Still connecting when the startup timeout fired. The attempt keeps
    /// running and registers itself if it succeeds.
    Pending { credential: String },
}

/// Loggable stand-in for a credential: `abcd…wxyz`.
///
/// At most a quarter of the token is shown, and never more than four
/// characters at each end.
pub fn fingerprint(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    let shown = (chars.len() / 8).min(4);
    if shown == 0 {
        return "****".to_string();
    }
    let head: String = chars[..shown].iter().collect();
    let tail: String = chars[chars.len() - shown..].iter().collect();
    format!("{head}…{tail}")
}

/// Map key for a credential. Distinct tokens never share a key, and the
/// token itself is not kept.
fn credential_key(token: &Secret<String>) -> [u8; 32] {
    Sha256::digest(token.expose_secret().as_bytes()).into()
}

/// Connects credentials and registers the resulting sessions.
pub struct ConnectionManager {
    registry: Arc<SessionRegistry>,
    bus: Arc<dyn EventBus>,
    connector: Arc<dyn Connector>,
    options: NetworkOptions,
    codec: MessageCodec,
    /// Keyed by [`credential_key`].
    states: RwLock<HashMap<[u8; 32], ConnectionState>>,
}

impl ConnectionManager {
    pub fn new(
        registry: Arc<SessionRegistry>,
        bus: Arc<dyn EventBus>,
        connector: Arc<dyn Connector>,
        options: NetworkOptions,
    ) -> Result<Self> {
        let files = FileResolver::new(options.http_client()?);
        Ok(Self {
            registry,
            bus,
            connector,
            options,
            codec: MessageCodec::new(DISCORD, files),
            states: RwLock::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn state(&self, token: &Secret<String>) -> ConnectionState {
        let states = self.states.read().unwrap_or_else(|e| e.into_inner());
        states
            .get(&credential_key(token))
            .copied()
            .unwrap_or(ConnectionState::Disconnected)
    }

    fn set_state(&self, key: [u8; 32], state: ConnectionState) {
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        states.insert(key, state);
    }

    /// Connect one credential and wait for the handshake to finish.
    ///
    /// On success the session is registered, its inbound pump is running,
    /// and `connect` events have been published. On failure the transport
    /// is closed and the registry is left untouched.
    pub async fn connect(&self, token: Secret<String>) -> Result<String> {
        let key = credential_key(&token);
        let credential = fingerprint(token.expose_secret());
        self.set_state(key, ConnectionState::Connecting);
        info!(credential, "connecting discord account");

        let Connection {
            transport,
            mut events,
        } = match self.connector.open(&token, &self.options).await {
            Ok(connection) => connection,
            Err(e) => {
                warn!(credential, error = %e, "discord connection failed");
                self.set_state(key, ConnectionState::Failed);
                return Err(e);
            },
        };

        let account = match wait_ready(&mut events).await {
            Ok(account) => account,
            Err(e) => {
                transport.disconnect().await;
                warn!(credential, error = %e, "discord connection failed");
                self.set_state(key, ConnectionState::Failed);
                return Err(e);
            },
        };

        let session = Arc::new(DiscordSession::new(
            account,
            transport,
            self.codec.clone(),
        ));
        let self_id = session.core().self_id().to_string();
        if let Some(previous) = self.registry.register(Arc::clone(&session) as Arc<dyn BotSession>)
        {
            warn!(self_id, "account connected twice, closing the older session");
            previous.disconnect().await;
        }
        spawn_pump(Arc::clone(&session), Arc::clone(&self.bus), events);
        self.set_state(key, ConnectionState::Ready);

        let info = session.info();
        info!(
            self_id,
            credential,
            nickname = %info.nickname,
            "discord account connected"
        );
        publish_connect(self.bus.as_ref(), &self_id);
        Ok(self_id)
    }

    /// Connect every credential in turn. Each attempt gets at most `timeout`
    /// before the next one starts; slow attempts finish in the background.
    pub async fn connect_all(
        self: &Arc<Self>,
        tokens: Vec<Secret<String>>,
        timeout: Duration,
    ) -> Vec<ConnectOutcome> {
        let mut outcomes = Vec::with_capacity(tokens.len());
        for token in tokens {
            let credential = fingerprint(token.expose_secret());
            let manager = Arc::clone(self);
            let mut handle = tokio::spawn(async move { manager.connect(token).await });

            let outcome = match tokio::time::timeout(timeout, &mut handle).await {
                Ok(Ok(Ok(self_id))) => ConnectOutcome::Connected { self_id },
                Ok(Ok(Err(e))) => ConnectOutcome::Failed {
                    credential,
                    error: e.to_string(),
                },
                Ok(Err(e)) => {
                    error!(credential, error = %e, "discord connect task failed");
                    ConnectOutcome::Failed {
                        credential,
                        error: e.to_string(),
                    }
                },
                Err(_) => {
                    warn!(
                        credential,
                        timeout_secs = timeout.as_secs_f64(),
                        "discord connect timed out, continuing in background"
                    );
                    ConnectOutcome::Pending { credential }
                },
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Remove a session, stop its inbound pump, and close its transport.
    pub async fn disconnect(&self, self_id: &str) -> bool {
        let Some(session) = self.registry.remove(self_id) else {
            return false;
        };
        session.disconnect().await;
        info!(self_id, "discord account disconnected");
        true
    }
}

/// Wait for the first `Ready` or `Error`, whichever arrives first.
async fn wait_ready(events: &mut mpsc::UnboundedReceiver<TransportEvent>) -> Result<NativeUser> {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Ready(Some(account)) => return Ok(account),
            TransportEvent::Ready(None) => {
                return Err(Error::transport("ready without an account identity"));
            },
            TransportEvent::Error(message) => return Err(Error::transport(message)),
            TransportEvent::MessageCreate(message) => {
                debug!(message_id = %message.id, "dropping message received before ready");
            },
        }
    }
    Err(Error::transport("connection closed before ready"))
}

fn spawn_pump(
    session: Arc<DiscordSession>,
    bus: Arc<dyn EventBus>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    let cancel = session.cancel_token();
    tokio::spawn(async move {
        let self_id = session.core().self_id().to_string();
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(TransportEvent::MessageCreate(message)) => {
                        handlers::handle_message(&session, bus.as_ref(), message);
                    },
                    Some(TransportEvent::Error(e)) => {
                        warn!(self_id, error = %e, "discord transport error");
                    },
                    Some(TransportEvent::Ready(_)) => {
                        debug!(self_id, "discord session resumed");
                    },
                    None => break,
                },
            }
        }
        debug!(self_id, "inbound pump stopped");
    });
}
