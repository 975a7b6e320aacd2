use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    serde::{Deserialize, Deserializer, Serialize},
    tracing::{debug, error, info},
};

use crate::{Error, Result};

/// Where the bot table is looked up when no path is given.
pub const DEFAULT_BOT_CONFIG_PATH: &str = "config/bot_config.json";

/// One routing entry: which foreign bot to talk to, optionally pinned to a
/// channel and guarded by a caller secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    /// Fixed channel for this bot; `None` means an ephemeral channel per exchange.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub channel_id: Option<String>,

    #[serde(alias = "cozeBotId")]
    pub bot_id: String,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub proxy_secret: Option<String>,
}

impl BotConfig {
    #[must_use]
    pub fn new(channel_id: Option<String>, bot_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.filter(|c| !c.is_empty()),
            bot_id: bot_id.into(),
            proxy_secret: None,
        }
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// Loads the bot table from `path`.
///
/// A missing or empty file yields an empty table. A file that exists but
/// cannot be read is logged and also yields an empty table. Malformed JSON
/// is an error.
pub fn load_bot_configs(path: &Path) -> Result<Arc<[BotConfig]>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no bot config file, continuing without one");
            return Ok(Arc::from([]));
        },
        Err(source) => {
            let err = Error::BotConfigRead {
                path: path.to_path_buf(),
                source,
            };
            error!(error = %err, "ignoring unreadable bot config");
            return Ok(Arc::from([]));
        },
    };

    if raw.trim().is_empty() {
        return Ok(Arc::from([]));
    }

    let configs: Vec<BotConfig> =
        serde_json::from_str(&raw).map_err(|source| Error::BotConfigParse {
            path: PathBuf::from(path),
            source,
        })?;

    info!(path = %path.display(), count = configs.len(), "loaded bot configs");
    Ok(configs.into())
}

/// Selects the configs a caller may use.
///
/// An empty `secret` matches every config; otherwise only exact
/// `proxy_secret` matches. A `channel_id` of `None` or `""` matches every
/// channel.
#[must_use]
pub fn filter_configs(
    configs: &[BotConfig],
    secret: &str,
    channel_id: Option<&str>,
) -> Vec<BotConfig> {
    configs
        .iter()
        .filter(|config| secret.is_empty() || config.proxy_secret.as_deref() == Some(secret))
        .filter(|config| match channel_id {
            None | Some("") => true,
            Some(id) => config.channel_id.as_deref() == Some(id),
        })
        .cloned()
        .collect()
}

/// Drops repeated `(channel_id, bot_id)` pairs, keeping the first occurrence.
#[must_use]
pub fn unique_targets(configs: impl IntoIterator<Item = BotConfig>) -> Vec<BotConfig> {
    let mut seen = HashSet::new();
    configs
        .into_iter()
        .filter(|config| seen.insert((config.channel_id.clone(), config.bot_id.clone())))
        .collect()
}
