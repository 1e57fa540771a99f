//! Host-side session model shared by platform adapters.
//!
//! Defines the segment-based message format, the events adapters publish on
//! the host bus, the capability traits a connected session exposes, and the
//! registry that maps host IDs to live sessions.

pub mod bus;
pub mod error;
pub mod event;
pub mod message;
pub mod plugin;
pub mod registry;

pub use {
    bus::{BroadcastBus, EventBus, Published, publish_connect, publish_message},
    error::{Error, Result},
    event::{ContactRef, GroupRef, HostEvent, InboundEvent, MemberRef, MessageScope},
    message::{ForwardNode, MENTION_ALL, MessageSegment, parse_message},
    plugin::{
        BotInfo, BotSession, Contactable, FetchedMessage, Groupable, SendReceipt, VersionInfo,
    },
    registry::SessionRegistry,
};
