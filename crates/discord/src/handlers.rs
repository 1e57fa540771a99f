//! Inbound pipeline: native message to host event.

use {
    dcbridge_channels::{
        EventBus, GroupRef, InboundEvent, MemberRef, MessageScope, publish_message,
    },
    tracing::{debug, info},
};

use crate::{codec, commands, directory, session::DiscordSession, transport::NativeMessage};

/// Build the host event for `message`, or `None` if the session's own
/// account wrote it.
pub fn build_event(session: &DiscordSession, message: NativeMessage) -> Option<InboundEvent> {
    let core = session.core();
    if core.is_own(&message.author.id) {
        debug!(self_id = core.self_id(), message_id = %message.id, "ignoring own message");
        return None;
    }

    let ns = core.namespace();
    let decoded = codec::decode(&message, ns);
    let sender = directory::contact(&message.author, ns);

    let (message_type, group, member) = match &message.guild_id {
        Some(guild_id) => {
            core.remember_group_channel(&message.channel_id);
            let group_id = ns.to_host_group(&message.channel_id);
            let group = directory::group(core.transport(), ns, &group_id).unwrap_or_else(|| {
                GroupRef {
                    group_id: group_id.clone(),
                    native_id: message.channel_id.clone(),
                    guild_id: guild_id.clone(),
                    group_name: message.channel_id.clone(),
                }
            });
            let member = MemberRef::new(group.group_id.clone(), sender.clone());
            (MessageScope::Group, Some(group), Some(member))
        },
        None => {
            core.remember_dm_channel(&message.author.id, &message.channel_id);
            (MessageScope::Private, None, None)
        },
    };

    let event = InboundEvent {
        self_id: core.self_id().to_string(),
        message_id: message.id,
        user_id: sender.user_id.clone(),
        sender,
        raw_message: decoded.raw,
        message: decoded.segments,
        post_type: "message",
        message_type,
        group,
        member,
        time: message.timestamp,
    };
    log_inbound(&event);
    Some(event)
}

fn log_inbound(event: &InboundEvent) {
    let text = commands::redact_credentials(&event.plain_text(), &event.raw_message);
    match &event.group {
        Some(group) => info!(
            self_id = %event.self_id,
            group = %group.group_name,
            group_id = %group.group_id,
            user = %event.sender.nickname,
            user_id = %event.user_id,
            text = %text,
            "group message"
        ),
        None => info!(
            self_id = %event.self_id,
            user = %event.sender.nickname,
            user_id = %event.user_id,
            text = %text,
            "private message"
        ),
    }
}

/// Decode `message` and publish it on `bus`.
pub fn handle_message(session: &DiscordSession, bus: &dyn EventBus, message: NativeMessage) {
    if let Some(event) = build_event(session, message) {
        publish_message(bus, event);
    }
}
