//! Startup settings, their validation, and the per-bot routing table.
//!
//! Settings come from flags or environment variables and are checked once
//! before the session opens. The bot table is read from a JSON file once
//! and never mutated afterwards.

pub mod bot_config;
pub mod error;
pub mod proxy;
pub mod settings;

pub use {
    bot_config::{
        BotConfig, DEFAULT_BOT_CONFIG_PATH, filter_configs, load_bot_configs, unique_targets,
    },
    error::{Error, Result},
    proxy::parse_proxy_url,
    settings::{ChannelRetention, DEFAULT_CHANNEL_DELETE_DELAY, Settings, StartupSettings},
};
