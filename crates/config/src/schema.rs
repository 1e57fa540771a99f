//! Discord adapter configuration schema.

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Default startup connect timeout, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Root configuration (`discord.toml`).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Free-form note kept at the top of the file for operators.
    pub tips: String,
    /// Who may run operator commands. Only `"master"` is recognized.
    pub permission: String,
    /// Host user IDs allowed to run operator commands.
    pub masters: Vec<String>,
    /// Forward proxy URL for outbound HTTP. Empty means direct.
    pub proxy: String,
    /// REST endpoint override (reverse proxy). Empty means the default API.
    pub reverse_proxy: String,
    /// How long startup waits on each account before moving on.
    pub connect_timeout_secs: u64,
    /// Bot credentials, one per account.
    #[serde(serialize_with = "serialize_secrets")]
    pub token: Vec<Secret<String>>,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("tips", &self.tips)
            .field("permission", &self.permission)
            .field("masters", &self.masters)
            .field("proxy", &self.proxy)
            .field("reverse_proxy", &self.reverse_proxy)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("token", &format_args!("[{} redacted]", self.token.len()))
            .finish()
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            tips: "Bot tokens are listed under `token`; use the #dc设置 command to add or remove one."
                .into(),
            permission: "master".into(),
            masters: Vec::new(),
            proxy: String::new(),
            reverse_proxy: String::new(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            token: Vec::new(),
        }
    }
}

impl DiscordConfig {
    /// Forward proxy, if one is configured.
    pub fn proxy_url(&self) -> Option<&str> {
        non_empty(&self.proxy)
    }

    /// REST endpoint override, if one is configured.
    pub fn reverse_proxy_url(&self) -> Option<&str> {
        non_empty(&self.reverse_proxy)
    }

    /// Whether `user_id` may run operator commands.
    pub fn is_master(&self, user_id: &str) -> bool {
        self.permission == "master" && self.masters.iter().any(|m| m == user_id)
    }

    pub fn has_token(&self, token: &str) -> bool {
        self.token.iter().any(|t| t.expose_secret() == token)
    }

    /// Add `token` if absent, remove it if present. Returns `true` when the
    /// token was added.
    pub fn toggle_token(&mut self, token: &str) -> bool {
        if self.has_token(token) {
            self.token.retain(|t| t.expose_secret() != token);
            false
        } else {
            self.token.push(Secret::new(token.to_string()));
            true
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn serialize_secrets<S: serde::Serializer>(
    secrets: &[Secret<String>],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(secrets.iter().map(|s| s.expose_secret()))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let cfg: DiscordConfig = toml::from_str(r#"masters = ["dc_1"]"#).unwrap();
        assert_eq!(cfg.permission, "master");
        assert_eq!(cfg.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert!(cfg.token.is_empty());
        assert!(cfg.proxy_url().is_none());
        assert!(cfg.is_master("dc_1"));
        assert!(!cfg.is_master("dc_2"));
    }

    #[test]
    fn debug_redacts_tokens() {
        let mut cfg = DiscordConfig::default();
        cfg.toggle_token("super-secret-token");
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret-token"));
        assert!(rendered.contains("1 redacted"));
    }

    #[test]
    fn tokens_serialize_verbatim() {
        let mut cfg = DiscordConfig::default();
        cfg.toggle_token("abc");
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["token"], serde_json::json!(["abc"]));
    }

    #[test]
    fn toggle_adds_then_removes() {
        let mut cfg = DiscordConfig::default();
        assert!(cfg.toggle_token("abc"));
        assert!(cfg.has_token("abc"));
        assert!(!cfg.toggle_token("abc"));
        assert!(!cfg.has_token("abc"));
    }

    #[test]
    fn blank_proxy_counts_as_unset() {
        let cfg = DiscordConfig {
            proxy: "  ".into(),
            reverse_proxy: "https://relay.example".into(),
            ..Default::default()
        };
        assert!(cfg.proxy_url().is_none());
        assert_eq!(cfg.reverse_proxy_url(), Some("https://relay.example"));
    }
}
