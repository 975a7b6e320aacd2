use std::{path::PathBuf, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    tracing::info,
    url::Url,
};

use crate::{Error, Result, bot_config::DEFAULT_BOT_CONFIG_PATH, proxy::parse_proxy_url};

/// Deletion delay applied when `CHANNEL_AUTO_DEL_TIME` is not set.
pub const DEFAULT_CHANNEL_DELETE_DELAY: Duration = Duration::from_secs(5);

/// What happens to a channel once the bot finished answering in it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelRetention {
    /// Not configured: delete after [`DEFAULT_CHANNEL_DELETE_DELAY`].
    #[default]
    Default,
    /// Configured as `0`: cancel any pending deletion and keep the channel.
    Keep,
    /// Configured as a positive number of seconds.
    After(Duration),
    /// Configured as a negative number: leave timers alone.
    Untouched,
}

impl ChannelRetention {
    /// Parses the raw `CHANNEL_AUTO_DEL_TIME` value.
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            return Ok(Self::Default);
        };
        let seconds: i64 = raw.parse().map_err(|_| Error::InvalidAutoDelete {
            value: raw.to_string(),
        })?;
        Ok(match seconds {
            0 => Self::Keep,
            s if s > 0 => Self::After(Duration::from_secs(s.unsigned_abs())),
            _ => Self::Untouched,
        })
    }
}

/// Raw startup values as read from flags or the environment.
#[derive(Debug, Default)]
pub struct StartupSettings {
    pub bot_token: Option<Secret<String>>,
    pub bot_id: Option<String>,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    pub proxy_url: Option<String>,
    pub auto_delete: Option<String>,
    pub bot_config_path: Option<PathBuf>,
}

/// Validated settings the engine runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: Secret<String>,
    /// Id of the foreign bot every outbound message mentions.
    pub bot_id: String,
    pub guild_id: String,
    /// Channel used when a request does not pick one.
    pub channel_id: String,
    pub proxy: Option<Url>,
    pub retention: ChannelRetention,
    pub bot_config_path: PathBuf,
}

fn required(value: Option<String>, name: &'static str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(Error::MissingSetting { name })
}

impl StartupSettings {
    /// Runs every check that does not need a live session.
    pub fn validate(self) -> Result<Settings> {
        let bot_token = self
            .bot_token
            .filter(|t| !t.expose_secret().trim().is_empty())
            .ok_or(Error::MissingSetting { name: "BOT_TOKEN" })?;
        let guild_id = required(self.guild_id, "GUILD_ID")?;
        let channel_id = required(self.channel_id, "CHANNEL_ID")?;
        let bot_id = required(self.bot_id, "COZE_BOT_ID")?;

        let proxy = self
            .proxy_url
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(parse_proxy_url)
            .transpose()?;
        let retention = ChannelRetention::parse(self.auto_delete.as_deref())?;

        Ok(Settings {
            bot_token,
            bot_id,
            guild_id,
            channel_id,
            proxy,
            retention,
            bot_config_path: self
                .bot_config_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BOT_CONFIG_PATH)),
        })
    }
}

impl Settings {
    /// Fails when the foreign bot id is the id this service is logged in as.
    pub fn check_identity(&self, self_id: &str) -> Result<()> {
        if self.bot_id == self_id {
            return Err(Error::IdentityCollision {
                bot_id: self.bot_id.clone(),
            });
        }
        info!("environment variable check passed");
        Ok(())
    }
}
