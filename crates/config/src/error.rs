use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Startup configuration problems. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("required setting {name} is not set")]
    MissingSetting { name: &'static str },

    #[error("PROXY_URL is not a valid URL: {url}")]
    InvalidProxyUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported proxy scheme `{scheme}`, only http and socks proxies are accepted")]
    UnsupportedProxyScheme { scheme: String },

    #[error("CHANNEL_AUTO_DEL_TIME must be an integer number of seconds, got `{value}`")]
    InvalidAutoDelete { value: String },

    #[error("COZE_BOT_ID must not be the id of the bot this service logs in as ({bot_id})")]
    IdentityCollision { bot_id: String },

    #[error("failed to read bot config {}", path.display())]
    BotConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse bot config {}", path.display())]
    BotConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
