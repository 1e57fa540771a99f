//! In-memory transport for tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tokio::sync::{Notify, mpsc},
};

use crate::{
    Error, Result,
    config::NetworkOptions,
    transport::{
        Connection, Connector, NativeChannel, NativeGuild, NativeMessage, NativeUser,
        OutboundPayload, Transport, TransportEvent,
    },
};

pub(crate) fn user(id: &str, name: &str) -> NativeUser {
    NativeUser {
        id: id.into(),
        name: name.into(),
        avatar_url: Some(format!("https://cdn.example/avatars/{id}.png")),
    }
}

pub(crate) fn message(
    id: &str,
    channel_id: &str,
    author: NativeUser,
    content: &str,
) -> NativeMessage {
    NativeMessage {
        id: id.into(),
        channel_id: channel_id.into(),
        guild_id: None,
        author,
        content: content.into(),
        attachments: Vec::new(),
        reply_to: None,
        timestamp: 1_700_000_000,
    }
}

#[derive(Default)]
pub(crate) struct FakeTransportBuilder {
    users: Vec<NativeUser>,
    guilds: Vec<NativeGuild>,
}

impl FakeTransportBuilder {
    pub(crate) fn user(mut self, id: &str, name: &str) -> Self {
        self.users.push(user(id, name));
        self
    }

    pub(crate) fn guild(mut self, id: &str, name: &str, channels: &[(&str, &str)]) -> Self {
        self.guilds.push(guild(id, name, channels));
        self
    }

    pub(crate) fn build(self) -> Arc<FakeTransport> {
        Arc::new(FakeTransport {
            users: Mutex::new(self.users),
            guilds: Mutex::new(self.guilds),
            messages: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            dm_lookups: AtomicUsize::new(0),
            disconnected: AtomicBool::new(false),
            reject_sends: AtomicBool::new(false),
            next_id: AtomicU64::new(1000),
            events: Mutex::new(None),
        })
    }
}

fn guild(id: &str, name: &str, channels: &[(&str, &str)]) -> NativeGuild {
    NativeGuild {
        id: id.into(),
        name: name.into(),
        channels: channels
            .iter()
            .map(|(id, name)| NativeChannel {
                id: (*id).into(),
                name: (*name).into(),
            })
            .collect(),
    }
}

/// Cache and REST calls backed by plain collections. Sent payloads and
/// deletions are recorded for assertions.
pub(crate) struct FakeTransport {
    users: Mutex<Vec<NativeUser>>,
    guilds: Mutex<Vec<NativeGuild>>,
    messages: Mutex<HashMap<String, NativeMessage>>,
    sent: Mutex<Vec<(String, OutboundPayload)>>,
    deleted: Mutex<Vec<(String, String)>>,
    dm_lookups: AtomicUsize,
    disconnected: AtomicBool,
    reject_sends: AtomicBool,
    next_id: AtomicU64,
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
}

impl FakeTransport {
    pub(crate) fn builder() -> FakeTransportBuilder {
        FakeTransportBuilder::default()
    }

    pub(crate) fn add_user(&self, id: &str, name: &str) {
        self.users.lock().unwrap().push(user(id, name));
    }

    pub(crate) fn add_guild(&self, id: &str, name: &str, channels: &[(&str, &str)]) {
        self.guilds.lock().unwrap().push(guild(id, name, channels));
    }

    pub(crate) fn store_message(&self, message: NativeMessage) {
        self.messages
            .lock()
            .unwrap()
            .insert(message.id.clone(), message);
    }

    pub(crate) fn sent(&self) -> Vec<(String, OutboundPayload)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().unwrap().clone()
    }

    pub(crate) fn dm_lookups(&self) -> usize {
        self.dm_lookups.load(Ordering::SeqCst)
    }

    pub(crate) fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    pub(crate) fn reject_sends(&self) {
        self.reject_sends.store(true, Ordering::SeqCst);
    }

    fn attach_events(&self, tx: mpsc::UnboundedSender<TransportEvent>) {
        *self.events.lock().unwrap() = Some(tx);
    }

    /// Deliver an event as if it came from the gateway.
    pub(crate) fn emit(&self, event: TransportEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn library(&self) -> (&'static str, &'static str) {
        ("fake", "0.0.0")
    }

    fn cached_users(&self) -> Vec<NativeUser> {
        self.users.lock().unwrap().clone()
    }

    fn cached_user(&self, user_id: &str) -> Option<NativeUser> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
    }

    fn cached_guilds(&self) -> Vec<NativeGuild> {
        self.guilds.lock().unwrap().clone()
    }

    async fn create_message(&self, channel_id: &str, payload: OutboundPayload) -> Result<String> {
        if self.reject_sends.load(Ordering::SeqCst) {
            return Err(Error::transport("send rejected"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), payload));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst).to_string())
    }

    async fn get_message(&self, channel_id: &str, message_id: &str) -> Result<NativeMessage> {
        self.messages
            .lock()
            .unwrap()
            .get(message_id)
            .filter(|m| m.channel_id == channel_id)
            .cloned()
            .ok_or_else(|| Error::invalid_input(format!("unknown message {message_id}")))
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        self.deleted
            .lock()
            .unwrap()
            .push((channel_id.to_string(), message_id.to_string()));
        Ok(())
    }

    async fn dm_channel(&self, user_id: &str) -> Result<String> {
        self.dm_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(format!("dm-{user_id}"))
    }

    async fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
        *self.events.lock().unwrap() = None;
    }
}

/// How a scripted connection behaves after it opens.
pub(crate) enum Script {
    Ready(NativeUser),
    /// Handshake completes without reporting an account.
    ReadyWithoutIdentity,
    Fail(String),
    /// Stays silent until `release` is notified, then becomes ready.
    Hang {
        release: Arc<Notify>,
        user: NativeUser,
    },
    /// `open` itself returns an error.
    Refuse,
}

/// Connector whose outcome per credential is scripted up front.
#[derive(Default)]
pub(crate) struct FakeConnector {
    scripts: Mutex<HashMap<String, Script>>,
    transports: Mutex<HashMap<String, Arc<FakeTransport>>>,
    opened: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub(crate) fn script(self, token: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(token.to_string(), script);
        self
    }

    pub(crate) fn transport(&self, token: &str) -> Arc<FakeTransport> {
        self.transports.lock().unwrap()[token].clone()
    }

    /// Credentials in the order they were opened.
    pub(crate) fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(&self, token: &Secret<String>, _options: &NetworkOptions) -> Result<Connection> {
        let token = token.expose_secret().clone();
        self.opened.lock().unwrap().push(token.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .remove(&token)
            .unwrap_or_else(|| Script::Fail("invalid token".into()));

        let (tx, rx) = mpsc::unbounded_channel();
        let transport = FakeTransport::builder().build();
        transport.attach_events(tx.clone());
        self.transports
            .lock()
            .unwrap()
            .insert(token, Arc::clone(&transport));

        match script {
            Script::Ready(user) => {
                transport.add_user(&user.id, &user.name);
                let _ = tx.send(TransportEvent::Ready(Some(user)));
            },
            Script::ReadyWithoutIdentity => {
                let _ = tx.send(TransportEvent::Ready(None));
            },
            Script::Fail(message) => {
                let _ = tx.send(TransportEvent::Error(message));
            },
            Script::Hang { release, user } => {
                transport.add_user(&user.id, &user.name);
                tokio::spawn(async move {
                    release.notified().await;
                    let _ = tx.send(TransportEvent::Ready(Some(user)));
                });
            },
            Script::Refuse => return Err(Error::transport("connection refused")),
        }

        Ok(Connection {
            transport,
            events: rx,
        })
    }
}

/// Log sink for asserting on formatted `tracing` output.
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub(crate) fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + use<> {
        tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish()
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
