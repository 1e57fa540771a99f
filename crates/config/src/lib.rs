//! Configuration loading and persistence.
//!
//! Config files: `discord.toml`, `discord.yaml`, or `discord.json`.
//! Searched in `./` then `~/.config/dcbridge/`, unless an override
//! directory is set.

pub mod loader;
pub mod schema;

pub use {
    loader::{
        clear_config_dir, config_dir, discover_and_load, find_or_default_config_path,
        load_config, save_config_to, set_config_dir,
    },
    schema::{DEFAULT_CONNECT_TIMEOUT_SECS, DiscordConfig},
};
