use std::path::Path;

use {
    anyhow::Result,
    clap::Subcommand,
    dcbridge_config::{DiscordConfig, load_config, save_config_to},
    dcbridge_discord::fingerprint,
    secrecy::ExposeSecret,
};

#[derive(Subcommand)]
pub enum AccountAction {
    /// List configured accounts by credential fingerprint.
    List,
    /// Add a bot token. It connects on the next `run`.
    Add { token: String },
    /// Remove a bot token.
    Remove { token: String },
}

#[derive(Subcommand)]
pub enum NetworkAction {
    /// Set the forward proxy for file downloads. Omit the URL to clear it.
    Proxy { url: Option<String> },
    /// Set the Discord REST endpoint override. Omit the URL to clear it.
    ReverseProxy { url: Option<String> },
}

fn load_or_default(path: &Path) -> Result<DiscordConfig> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(DiscordConfig::default())
    }
}

pub fn handle_accounts(action: AccountAction, path: &Path) -> Result<()> {
    let mut config = load_or_default(path)?;
    match action {
        AccountAction::List => {
            if config.token.is_empty() {
                println!("No accounts configured.");
            }
            for token in &config.token {
                println!("  {}", fingerprint(token.expose_secret()));
            }
            return Ok(());
        },
        AccountAction::Add { token } => {
            if config.has_token(&token) {
                println!("Account {} is already configured.", fingerprint(&token));
                return Ok(());
            }
            config.toggle_token(&token);
            println!("Added account {}.", fingerprint(&token));
        },
        AccountAction::Remove { token } => {
            if !config.has_token(&token) {
                anyhow::bail!("account {} is not configured", fingerprint(&token));
            }
            config.toggle_token(&token);
            println!("Removed account {}.", fingerprint(&token));
        },
    }
    save_config_to(&config, path)?;
    println!("{} account(s) in {}", config.token.len(), path.display());
    Ok(())
}

pub fn handle_network(action: NetworkAction, path: &Path) -> Result<()> {
    let mut config = load_or_default(path)?;
    let (label, slot, url) = match action {
        NetworkAction::Proxy { url } => ("Proxy", &mut config.proxy, url),
        NetworkAction::ReverseProxy { url } => ("Reverse proxy", &mut config.reverse_proxy, url),
    };
    *slot = url.unwrap_or_default().trim().to_string();
    if slot.is_empty() {
        println!("{label} cleared. Restart to apply.");
    } else {
        println!("{label} set to {slot}. Restart to apply.");
    }
    save_config_to(&config, path)?;
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove_round_trip_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("discord.toml");

        handle_accounts(
            AccountAction::Add {
                token: "token-one-value".into(),
            },
            &path,
        )
        .unwrap();
        handle_accounts(
            AccountAction::Add {
                token: "token-one-value".into(),
            },
            &path,
        )
        .unwrap();
        assert_eq!(load_config(&path).unwrap().token.len(), 1);

        handle_accounts(
            AccountAction::Remove {
                token: "token-one-value".into(),
            },
            &path,
        )
        .unwrap();
        assert!(load_config(&path).unwrap().token.is_empty());
    }

    #[test]
    fn removing_unknown_account_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("discord.toml");
        let err = handle_accounts(
            AccountAction::Remove {
                token: "missing-token".into(),
            },
            &path,
        )
        .unwrap_err();
        assert!(err.to_string().contains("m…n"));
        assert!(!path.exists());
    }

    #[test]
    fn proxy_is_set_and_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("discord.yaml");

        handle_network(
            NetworkAction::Proxy {
                url: Some(" http://127.0.0.1:7890 ".into()),
            },
            &path,
        )
        .unwrap();
        assert_eq!(
            load_config(&path).unwrap().proxy_url(),
            Some("http://127.0.0.1:7890")
        );

        handle_network(NetworkAction::Proxy { url: None }, &path).unwrap();
        assert!(load_config(&path).unwrap().proxy_url().is_none());

        handle_network(
            NetworkAction::ReverseProxy {
                url: Some("https://relay.example/api".into()),
            },
            &path,
        )
        .unwrap();
        assert_eq!(
            load_config(&path).unwrap().reverse_proxy_url(),
            Some("https://relay.example/api")
        );
    }
}
