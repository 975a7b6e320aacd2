mod ask_commands;
mod serve_commands;

use std::path::PathBuf;

use {
    botbridge_config::{Settings, StartupSettings},
    clap::{Parser, Subcommand},
    secrecy::Secret,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "botbridge", about = "botbridge: talk to a chat bot through Discord")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Discord token of the account this service logs in as.
    #[arg(long, global = true, env = "BOT_TOKEN", hide_env_values = true)]
    bot_token: Option<String>,
    /// Id of the foreign bot every prompt mentions.
    #[arg(long, global = true, env = "COZE_BOT_ID")]
    bot_id: Option<String>,
    #[arg(long, global = true, env = "GUILD_ID")]
    guild_id: Option<String>,
    /// Default channel for prompts and the nightly canary.
    #[arg(long, global = true, env = "CHANNEL_ID")]
    channel_id: Option<String>,
    /// HTTP or SOCKS proxy for REST calls.
    #[arg(long, global = true, env = "PROXY_URL")]
    proxy_url: Option<String>,
    /// Seconds before a finished channel is deleted; 0 keeps it.
    #[arg(long, global = true, env = "CHANNEL_AUTO_DEL_TIME", allow_hyphen_values = true)]
    channel_auto_del_time: Option<String>,
    /// JSON file listing the bots to route to.
    #[arg(long, global = true, env = "BOT_CONFIG_PATH")]
    bot_config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and keep running (default when no subcommand is provided).
    Serve,
    /// Send one prompt and print the replies as they arrive.
    Ask(ask_commands::AskArgs),
}

impl Cli {
    fn settings(&self) -> anyhow::Result<Settings> {
        let raw = StartupSettings {
            bot_token: self.bot_token.clone().map(Secret::new),
            bot_id: self.bot_id.clone(),
            guild_id: self.guild_id.clone(),
            channel_id: self.channel_id.clone(),
            proxy_url: self.proxy_url.clone(),
            auto_delete: self.channel_auto_del_time.clone(),
            bot_config_path: self.bot_config.clone(),
        };
        Ok(raw.validate()?)
    }
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "botbridge starting");

    let settings = cli.settings()?;
    match cli.command {
        None | Some(Commands::Serve) => serve_commands::serve(settings).await,
        Some(Commands::Ask(args)) => ask_commands::ask(settings, args).await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {botbridge_config::ChannelRetention, std::time::Duration};

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let base = [
            "botbridge",
            "--bot-token",
            "t",
            "--bot-id",
            "1000",
            "--guild-id",
            "2000",
            "--channel-id",
            "3000",
        ];
        Cli::try_parse_from(base.iter().chain(args).copied()).unwrap()
    }

    #[test]
    fn defaults_to_serve() {
        let cli = parse(&[]);
        assert!(cli.command.is_none());
        let settings = cli.settings().unwrap();
        assert_eq!(settings.retention, ChannelRetention::Default);
    }

    #[test]
    fn negative_auto_delete_is_accepted() {
        let cli = parse(&["--channel-auto-del-time", "-1"]);
        assert_eq!(cli.settings().unwrap().retention, ChannelRetention::Untouched);

        let cli = parse(&["--channel-auto-del-time", "90"]);
        assert_eq!(
            cli.settings().unwrap().retention,
            ChannelRetention::After(Duration::from_secs(90))
        );
    }

    #[test]
    fn ask_subcommand_parses() {
        let cli = parse(&["ask", "--message", "hi", "--kind", "chat-completion"]);
        let Some(Commands::Ask(args)) = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(args.message, "hi");
        assert_eq!(args.kind, ask_commands::KindArg::ChatCompletion);
    }
}
