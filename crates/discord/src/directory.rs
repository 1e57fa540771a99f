//! Contact and group views derived from the client cache.
//!
//! Nothing here is stored: every call re-reads the cache, so results track
//! the client's current view and never wait on the network.

use dcbridge_channels::{ContactRef, GroupRef, MemberRef};

use crate::{
    id::IdNamespace,
    transport::{NativeUser, Transport},
};

pub fn contact(user: &NativeUser, ns: IdNamespace) -> ContactRef {
    ContactRef {
        user_id: ns.to_host_user(&user.id),
        native_id: user.id.clone(),
        nickname: user.name.clone(),
        avatar: user.avatar_url.clone(),
    }
}

/// Every cached user.
pub fn friends(transport: &dyn Transport, ns: IdNamespace) -> Vec<ContactRef> {
    let mut friends: Vec<ContactRef> = transport
        .cached_users()
        .iter()
        .map(|user| contact(user, ns))
        .collect();
    friends.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    friends
}

/// Every postable channel of every cached guild.
pub fn groups(transport: &dyn Transport, ns: IdNamespace) -> Vec<GroupRef> {
    transport
        .cached_guilds()
        .into_iter()
        .flat_map(|guild| {
            guild.channels.into_iter().map(move |channel| GroupRef {
                group_id: ns.to_host_group(&channel.id),
                group_name: format!("{}-{}", guild.name, channel.name),
                native_id: channel.id,
                guild_id: guild.id.clone(),
            })
        })
        .collect()
}

pub fn friend(transport: &dyn Transport, ns: IdNamespace, user_id: &str) -> Option<ContactRef> {
    transport
        .cached_user(ns.strip_prefix(user_id))
        .map(|user| contact(&user, ns))
}

pub fn group(transport: &dyn Transport, ns: IdNamespace, group_id: &str) -> Option<GroupRef> {
    groups(transport, ns)
        .into_iter()
        .find(|group| group.group_id == group_id)
}

/// `user_id` as a member of `group_id`. Membership is not checked; unknown
/// users are named by their native ID.
pub fn member(
    transport: &dyn Transport,
    ns: IdNamespace,
    group_id: &str,
    user_id: &str,
) -> MemberRef {
    let contact = friend(transport, ns, user_id).unwrap_or_else(|| {
        let native = ns.strip_prefix(user_id);
        ContactRef {
            user_id: ns.to_host_user(native),
            native_id: native.to_string(),
            nickname: native.to_string(),
            avatar: None,
        }
    });
    MemberRef::new(group_id, contact)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{id::DISCORD, testing::FakeTransport},
    };

    fn transport() -> std::sync::Arc<FakeTransport> {
        FakeTransport::builder()
            .user("2", "bob")
            .user("3", "carol")
            .guild("400", "Guild", &[("500", "general"), ("501", "news")])
            .build()
    }

    #[test]
    fn groups_are_named_guild_dash_channel() {
        let transport = transport();
        let groups = groups(transport.as_ref(), DISCORD);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].group_id, "dc_500");
        assert_eq!(groups[0].group_name, "Guild-general");
        assert_eq!(groups[1].guild_id, "400");
    }

    #[test]
    fn friends_come_from_cached_users() {
        let transport = transport();
        let ids: Vec<String> = friends(transport.as_ref(), DISCORD)
            .into_iter()
            .map(|c| c.user_id)
            .collect();
        assert!(ids.contains(&"dc_2".to_string()));
        assert!(ids.contains(&"dc_3".to_string()));
        assert_eq!(
            friend(transport.as_ref(), DISCORD, "dc_3").unwrap().nickname,
            "carol"
        );
        assert!(friend(transport.as_ref(), DISCORD, "dc_9").is_none());
    }

    #[test]
    fn member_does_not_check_membership() {
        let transport = transport();
        let known = member(transport.as_ref(), DISCORD, "dc_500", "dc_2");
        assert_eq!(known.nickname, "bob");
        assert_eq!(known.group_id, "dc_500");

        let unknown = member(transport.as_ref(), DISCORD, "dc_500", "dc_77");
        assert_eq!(unknown.user_id, "dc_77");
        assert_eq!(unknown.nickname, "77");
    }

    #[test]
    fn directory_sees_cache_updates() {
        let transport = transport();
        assert!(group(transport.as_ref(), DISCORD, "dc_600").is_none());
        transport.add_guild("401", "Other", &[("600", "lobby")]);
        assert_eq!(
            group(transport.as_ref(), DISCORD, "dc_600").unwrap().group_name,
            "Other-lobby"
        );
    }
}
