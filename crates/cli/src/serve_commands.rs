use {
    botbridge_config::{BotConfig, Settings, load_bot_configs},
    botbridge_core::CanaryScheduler,
    botbridge_discord::{DEFAULT_READY_TIMEOUT, DiscordBot},
    tokio_util::sync::CancellationToken,
    tracing::{error, info},
};

pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let configs = load_bot_configs(&settings.bot_config_path)?;
    let bot = DiscordBot::start(&settings, DEFAULT_READY_TIMEOUT).await?;

    let scheduler = CanaryScheduler::new(
        bot.session().clone(),
        settings.guild_id.clone(),
        &configs,
        BotConfig::new(Some(settings.channel_id.clone()), &settings.bot_id),
    );
    let cancel = CancellationToken::new();
    let canary = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });

    info!(targets = configs.len(), "botbridge running, press ctrl-c to stop");
    shutdown_signal().await;
    info!("shutting down");

    cancel.cancel();
    if let Err(e) = canary.await {
        error!(error = %e, "canary task failed");
    }
    bot.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
