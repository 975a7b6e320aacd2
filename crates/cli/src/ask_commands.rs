use std::time::Duration;

use {
    anyhow::bail,
    botbridge_common::ReplyKind,
    botbridge_config::{BotConfig, Settings, filter_configs, load_bot_configs},
    botbridge_core::{ChannelTarget, ExchangeRequest, ReplyEvent, StopReason},
    botbridge_discord::{DEFAULT_READY_TIMEOUT, DiscordBot},
    clap::{Args, ValueEnum},
    tracing::{info, warn},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Raw,
    ChatCompletion,
    ImageGeneration,
}

impl From<KindArg> for ReplyKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Raw => Self::Raw,
            KindArg::ChatCompletion => Self::ChatCompletion,
            KindArg::ImageGeneration => Self::ImageGeneration,
        }
    }
}

#[derive(Debug, Args)]
pub struct AskArgs {
    /// Prompt text.
    #[arg(short, long)]
    pub message: String,
    /// Payload shape to print.
    #[arg(long, value_enum, default_value = "raw")]
    pub kind: KindArg,
    /// Only use bot configs guarded by this secret.
    #[arg(long, default_value = "")]
    pub secret: String,
    /// Only use bot configs pinned to this channel.
    #[arg(long)]
    pub channel: Option<String>,
    /// Base64 data URI of an image to upload with the prompt (repeatable).
    #[arg(long = "image")]
    pub images: Vec<String>,
    /// Give up when no reply arrives for this many seconds.
    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,
}

/// Picks the first matching bot config, or the default pair when none match.
fn pick_target(configs: &[BotConfig], settings: &Settings, args: &AskArgs) -> BotConfig {
    filter_configs(configs, &args.secret, args.channel.as_deref())
        .into_iter()
        .next()
        .unwrap_or_else(|| BotConfig::new(Some(settings.channel_id.clone()), &settings.bot_id))
}

pub async fn ask(settings: Settings, args: AskArgs) -> anyhow::Result<()> {
    let configs = load_bot_configs(&settings.bot_config_path)?;
    let target = pick_target(&configs, &settings, &args);
    info!(bot_id = %target.bot_id, channel_id = ?target.channel_id, "asking bot");

    let bot = DiscordBot::start(&settings, DEFAULT_READY_TIMEOUT).await?;
    let request = ExchangeRequest {
        target: ChannelTarget::from_channel_id(target.channel_id.as_deref()),
        bot_id: target.bot_id,
        prompt: args.message,
        kind: args.kind.into(),
        attachments: args.images,
    };

    let opened = bot.bridge().open_exchange(request).await;
    let mut exchange = match opened {
        Ok(exchange) => exchange,
        Err(e) => {
            bot.shutdown().await;
            return Err(e.into());
        },
    };

    let idle = Duration::from_secs(args.timeout_secs);
    let completed = loop {
        match exchange.reply.recv_timeout(idle).await {
            Ok(Some(ReplyEvent::Reply(payload))) => {
                println!("{}", serde_json::to_string(&payload)?);
            },
            Ok(Some(ReplyEvent::Stopped(signal))) => {
                break signal.reason == StopReason::Completed;
            },
            Ok(None) => break false,
            Err(_) => {
                warn!(timeout_secs = args.timeout_secs, "no reply in time");
                break false;
            },
        }
    };

    // The process exits right after, so a pending delete timer would never fire.
    if exchange.ephemeral {
        let channel_id = exchange.channel_id().to_string();
        drop(exchange);
        bot.bridge().lifecycle().delete_now(&channel_id).await;
    }
    bot.shutdown().await;

    if !completed {
        bail!("the bot did not finish its reply");
    }
    Ok(())
}
