//! Discord adapter for the host bot framework.
//!
//! Connects bot accounts through serenity, translates gateway messages into
//! host events and host segments into Discord payloads, and answers the
//! operator commands that manage accounts and proxies.

pub mod bot;
pub mod codec;
pub mod commands;
pub mod config;
pub mod directory;
pub mod error;
pub mod file;
pub mod forward;
pub mod gateway;
pub mod handlers;
pub mod id;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use {
    bot::{ConnectOutcome, ConnectionManager, ConnectionState, fingerprint},
    codec::MessageCodec,
    commands::CommandHandler,
    config::NetworkOptions,
    error::{Error, Result},
    file::FileResolver,
    gateway::SerenityConnector,
    id::{DISCORD, IdNamespace},
    session::DiscordSession,
};
