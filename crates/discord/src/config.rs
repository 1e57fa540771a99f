use std::time::Duration;

use dcbridge_config::DiscordConfig;

use crate::Result;

/// Timeout applied to file downloads.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Network settings resolved from [`DiscordConfig`] for one connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkOptions {
    /// Forward proxy for outbound HTTP (file downloads).
    pub proxy: Option<String>,
    /// Replacement base URL for REST calls.
    pub rest_endpoint: Option<String>,
}

impl NetworkOptions {
    pub fn from_config(config: &DiscordConfig) -> Self {
        Self {
            proxy: config.proxy_url().map(str::to_string),
            rest_endpoint: config.reverse_proxy_url().map(str::to_string),
        }
    }

    /// HTTP client for file downloads, routed through the forward proxy.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().timeout(FETCH_TIMEOUT);
        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(builder.build()?)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_resolve_to_none() {
        let options = NetworkOptions::from_config(&DiscordConfig::default());
        assert_eq!(options, NetworkOptions::default());
        assert!(options.http_client().is_ok());
    }

    #[test]
    fn settings_carry_over() {
        let config = DiscordConfig {
            proxy: "http://127.0.0.1:7890".into(),
            reverse_proxy: "https://relay.example/api".into(),
            ..Default::default()
        };
        let options = NetworkOptions::from_config(&config);
        assert_eq!(options.proxy.as_deref(), Some("http://127.0.0.1:7890"));
        assert_eq!(
            options.rest_endpoint.as_deref(),
            Some("https://relay.example/api")
        );
        assert!(options.http_client().is_ok());
    }
}
