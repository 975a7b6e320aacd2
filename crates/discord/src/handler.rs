//! Gateway event handler feeding message edits to the dispatcher.

use std::sync::{Arc, OnceLock};

use {
    botbridge_channels::{InboundUpdate, ReferencedMessage, Session, UpdateEmbed},
    botbridge_core::{DispatchOutcome, Dispatcher},
    serenity::{
        all::{Context, EventHandler, GatewayIntents, Message, MessageUpdateEvent, Ready},
        async_trait,
    },
    tracing::{debug, info, warn},
};

use crate::session::DiscordSession;

struct Wiring {
    session: Arc<DiscordSession>,
    dispatcher: Dispatcher,
}

/// Gateway handler. Events are dropped until [`attach`](Self::attach) ran,
/// since the session shares the `Http` the client is built around.
#[derive(Default)]
pub struct BridgeHandler {
    wiring: OnceLock<Wiring>,
}

impl BridgeHandler {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Connects the handler to its session and dispatcher. Only the first
    /// call takes effect.
    pub fn attach(&self, session: Arc<DiscordSession>, dispatcher: Dispatcher) -> bool {
        let attached = self
            .wiring
            .set(Wiring {
                session,
                dispatcher,
            })
            .is_ok();
        if !attached {
            warn!("gateway handler already attached, ignoring");
        }
        attached
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.wiring.get().is_some()
    }

    /// Gateway intents needed to see the bot's replies and their content.
    #[must_use]
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
    }
}

/// Reduces a partial message update to the fields correlation looks at.
#[must_use]
pub fn inbound_update(event: &MessageUpdateEvent) -> InboundUpdate {
    let referenced = event
        .referenced_message
        .as_ref()
        .and_then(Option::as_ref)
        .map(|message| ReferencedMessage {
            id: message.id.to_string(),
            content: message.content.clone(),
        });

    InboundUpdate {
        message_id: event.id.to_string(),
        channel_id: event.channel_id.to_string(),
        referenced,
        author_id: event.author.as_ref().map(|author| author.id.to_string()),
        mentions: event
            .mentions
            .iter()
            .flatten()
            .map(|user| user.id.to_string())
            .collect(),
        content: event.content.clone().unwrap_or_default(),
        embeds: event
            .embeds
            .iter()
            .flatten()
            .map(|embed| UpdateEmbed {
                image_url: embed.image.as_ref().map(|image| image.url.clone()),
            })
            .collect(),
        has_components: event
            .components
            .as_ref()
            .is_some_and(|rows| !rows.is_empty()),
    }
}

#[async_trait]
impl EventHandler for BridgeHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        let Some(wiring) = self.wiring.get() else {
            warn!("ready before the handler was attached");
            return;
        };
        info!(
            bot_name = %ready.user.name,
            user_id = %ready.user.id,
            guilds = ready.guilds.len(),
            "discord bot ready"
        );
        wiring.session.set_identity(ready.user.id.to_string());
    }

    async fn message_update(
        &self,
        _ctx: Context,
        _old_if_available: Option<Message>,
        _new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        let Some(wiring) = self.wiring.get() else {
            return;
        };
        let Some(self_id) = wiring.session.self_identity() else {
            debug!("message update before ready, skipping");
            return;
        };

        let update = inbound_update(&event);
        match wiring.dispatcher.handle_update(&update, &self_id).await {
            DispatchOutcome::Ignored | DispatchOutcome::NotAddressed => {},
            outcome => debug!(
                message_id = %update.message_id,
                channel_id = %update.channel_id,
                ?outcome,
                "message update dispatched"
            ),
        }
    }
}
