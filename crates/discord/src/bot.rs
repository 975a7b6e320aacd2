use std::{sync::Arc, time::Duration};

use {
    anyhow::Context as _,
    botbridge_channels::Session,
    botbridge_config::Settings,
    botbridge_core::{Bridge, CorrelationRegistry},
    secrecy::ExposeSecret,
    serenity::{client::ClientBuilder, gateway::ShardManager},
    tokio::task::JoinHandle,
    tracing::{error, info},
};

use crate::{handler::BridgeHandler, http::build_http, session::DiscordSession};

/// How long [`DiscordBot::start`] waits for the gateway's ready event.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// A connected gateway client plus the bridge that talks through it.
pub struct DiscordBot {
    session: Arc<DiscordSession>,
    bridge: Arc<Bridge>,
    shard_manager: Arc<ShardManager>,
    gateway: JoinHandle<()>,
}

impl DiscordBot {
    /// Connects to the gateway and returns once the account is known and
    /// differs from the foreign bot.
    pub async fn start(settings: &Settings, ready_timeout: Duration) -> anyhow::Result<Self> {
        let token = settings.bot_token.expose_secret();
        let proxy = settings.proxy.as_ref();

        let handler = BridgeHandler::new();
        let mut client =
            ClientBuilder::new_with_http(build_http(token, proxy)?, BridgeHandler::intents())
                .event_handler_arc(Arc::clone(&handler))
                .await
                .context("failed to create discord client")?;

        // REST calls and the gateway client share one Http and its rate limits.
        let session = Arc::new(DiscordSession::new(Arc::clone(&client.http)));
        let shared: Arc<dyn Session> = session.clone();
        let bridge = Arc::new(Bridge::with_registry(
            shared,
            settings.guild_id.clone(),
            CorrelationRegistry::new(),
        ));
        handler.attach(Arc::clone(&session), bridge.dispatcher(settings.retention));

        let shard_manager = Arc::clone(&client.shard_manager);

        let gateway = tokio::spawn(async move {
            if let Err(e) = client.start().await {
                error!(error = %e, "discord gateway stopped");
            }
        });

        let bot = Self {
            session,
            bridge,
            shard_manager,
            gateway,
        };

        let self_id = match bot.session.wait_ready(ready_timeout).await {
            Ok(self_id) => self_id,
            Err(e) => {
                bot.shutdown().await;
                return Err(e).context("discord session did not become ready");
            },
        };
        if let Err(e) = settings.check_identity(&self_id) {
            bot.shutdown().await;
            return Err(e.into());
        }

        info!(user_id = %self_id, guild_id = %settings.guild_id, "discord session started");
        Ok(bot)
    }

    #[must_use]
    pub fn session(&self) -> &Arc<DiscordSession> {
        &self.session
    }

    #[must_use]
    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    /// Closes every shard and waits for the gateway task to end.
    pub async fn shutdown(self) {
        self.shard_manager.shutdown_all().await;
        if let Err(e) = self.gateway.await {
            error!(error = %e, "discord gateway task failed");
        }
        info!("discord session closed");
    }
}
