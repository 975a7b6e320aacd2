//! Caller-side orchestration of one exchange with a foreign bot.
//!
//! The correlation id is the id of the last message sent, so it only exists
//! once the send returned; registration therefore follows the send. The
//! foreign bot needs far longer to start answering than that window.

use std::{sync::Arc, time::Duration};

use {
    botbridge_channels::{ChannelKind, SentMessage, Session},
    botbridge_common::ReplyKind,
    botbridge_config::{ChannelRetention, DEFAULT_CHANNEL_DELETE_DELAY},
    tracing::{info, warn},
    uuid::Uuid,
};

use crate::{
    Result,
    dispatch::Dispatcher,
    lifecycle::ChannelLifecycle,
    outbound::OutboundSender,
    registry::{CorrelationRegistry, PendingReply},
    upload::upload_data_uri,
};

/// Name for a channel that lives for a single exchange.
#[must_use]
pub fn ephemeral_channel_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("chat-{}", &id[..8])
}

/// Where a prompt is posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelTarget {
    Fixed(String),
    /// A fresh top-level channel, removed once the exchange is over.
    Ephemeral,
    /// A fresh channel inside the given category.
    EphemeralUnder(String),
}

impl ChannelTarget {
    /// Fixed when a channel id is given, ephemeral otherwise.
    #[must_use]
    pub fn from_channel_id(channel_id: Option<&str>) -> Self {
        match channel_id.filter(|c| !c.is_empty()) {
            Some(channel_id) => Self::Fixed(channel_id.to_string()),
            None => Self::Ephemeral,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub target: ChannelTarget,
    pub bot_id: String,
    pub prompt: String,
    pub kind: ReplyKind,
    /// Base64 data URIs uploaded to the channel before the prompt; their
    /// hosted URLs are appended to the prompt.
    pub attachments: Vec<String>,
}

/// An exchange in flight.
pub struct Exchange {
    pub reply: PendingReply,
    /// Whether the channel was created for this exchange.
    pub ephemeral: bool,
}

impl Exchange {
    #[must_use]
    pub fn channel_id(&self) -> &str {
        self.reply.channel_id()
    }
}

pub struct Bridge {
    session: Arc<dyn Session>,
    registry: Arc<CorrelationRegistry>,
    lifecycle: Arc<ChannelLifecycle>,
    outbound: OutboundSender,
    guild_id: String,
    abandon_delay: Duration,
}

impl Bridge {
    #[must_use]
    pub fn new(session: Arc<dyn Session>, guild_id: impl Into<String>) -> Self {
        Self::with_registry(session, guild_id, CorrelationRegistry::new())
    }

    #[must_use]
    pub fn with_registry(
        session: Arc<dyn Session>,
        guild_id: impl Into<String>,
        registry: Arc<CorrelationRegistry>,
    ) -> Self {
        Self {
            lifecycle: ChannelLifecycle::new(Arc::clone(&session)),
            outbound: OutboundSender::new(Arc::clone(&session)),
            session,
            registry,
            guild_id: guild_id.into(),
            abandon_delay: DEFAULT_CHANNEL_DELETE_DELAY,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<CorrelationRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn lifecycle(&self) -> &Arc<ChannelLifecycle> {
        &self.lifecycle
    }

    /// A dispatcher feeding this bridge's pending exchanges.
    #[must_use]
    pub fn dispatcher(&self, retention: ChannelRetention) -> Dispatcher {
        Dispatcher::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.lifecycle),
            retention,
        )
    }

    /// Posts the prompt and starts waiting for the bot's reply.
    pub async fn open_exchange(&self, request: ExchangeRequest) -> Result<Exchange> {
        let (channel_id, ephemeral) = self.resolve_channel(&request.target).await?;

        let sent = match self.post_prompt(&channel_id, &request).await {
            Ok(sent) => sent,
            Err(e) => {
                if ephemeral {
                    self.lifecycle.delete_now(&channel_id).await;
                }
                return Err(e);
            },
        };

        let reply = match self.registry.register(&sent.id, &channel_id, request.kind) {
            Ok(reply) => reply,
            Err(e) => {
                if ephemeral {
                    self.lifecycle.delete_now(&channel_id).await;
                }
                return Err(e);
            },
        };
        info!(
            correlation_id = %sent.id,
            channel_id,
            bot_id = %request.bot_id,
            kind = ?request.kind,
            "exchange opened"
        );

        Ok(Exchange { reply, ephemeral })
    }

    /// Gives up on an exchange. Its ephemeral channel is scheduled for
    /// deletion; a fixed channel is left alone.
    pub fn abandon(&self, exchange: Exchange) {
        let channel_id = exchange.channel_id().to_string();
        warn!(
            correlation_id = exchange.reply.correlation_id(),
            channel_id, "exchange abandoned"
        );
        if exchange.ephemeral {
            self.lifecycle
                .set_delete_timer(&channel_id, self.abandon_delay);
        }
    }

    /// Uploads a base64 data URI and returns the hosted URL.
    pub async fn upload(&self, channel_id: &str, data_uri: &str) -> Result<String> {
        upload_data_uri(self.session.as_ref(), channel_id, data_uri).await
    }

    async fn post_prompt(
        &self,
        channel_id: &str,
        request: &ExchangeRequest,
    ) -> Result<SentMessage> {
        let mut prompt = request.prompt.clone();
        for data_uri in &request.attachments {
            let url = self.upload(channel_id, data_uri).await?;
            prompt.push('\n');
            prompt.push_str(&url);
        }
        self.outbound
            .send(channel_id, &prompt, &request.bot_id)
            .await
    }

    async fn resolve_channel(&self, target: &ChannelTarget) -> Result<(String, bool)> {
        match target {
            ChannelTarget::Fixed(channel_id) => Ok((channel_id.clone(), false)),
            ChannelTarget::Ephemeral => {
                let channel_id = self
                    .session
                    .create_channel(&self.guild_id, &ephemeral_channel_name(), ChannelKind::Text)
                    .await?;
                Ok((channel_id, true))
            },
            ChannelTarget::EphemeralUnder(parent_id) => {
                let channel_id = self
                    .session
                    .create_sub_channel(
                        &self.guild_id,
                        parent_id,
                        &ephemeral_channel_name(),
                        ChannelKind::Text,
                    )
                    .await?;
                Ok((channel_id, true))
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        botbridge_channels::{InboundUpdate, ReferencedMessage},
        botbridge_common::{RawReply, ReplyPayload},
    };

    use super::*;
    use crate::{
        Error,
        dispatch::DispatchOutcome,
        lifecycle::TimerState,
        registry::{ReplyEvent, StopReason},
        test_support::{FakeSession, SELF_ID},
    };

    fn request(target: ChannelTarget) -> ExchangeRequest {
        ExchangeRequest {
            target,
            bot_id: "42".into(),
            prompt: "hello".into(),
            kind: ReplyKind::Raw,
            attachments: Vec::new(),
        }
    }

    #[test]
    fn ephemeral_names_are_short_and_distinct() {
        let a = ephemeral_channel_name();
        assert!(a.starts_with("chat-"));
        assert_eq!(a.len(), 13);
        assert_ne!(a, ephemeral_channel_name());
    }

    #[test]
    fn target_from_optional_channel() {
        assert_eq!(
            ChannelTarget::from_channel_id(Some("c1")),
            ChannelTarget::Fixed("c1".into())
        );
        assert_eq!(ChannelTarget::from_channel_id(Some("")), ChannelTarget::Ephemeral);
        assert_eq!(ChannelTarget::from_channel_id(None), ChannelTarget::Ephemeral);
    }

    #[tokio::test]
    async fn fixed_channel_exchange_end_to_end() {
        let session = FakeSession::new();
        let bridge = Bridge::new(session.clone(), "g1");
        let dispatcher = bridge.dispatcher(ChannelRetention::Untouched);

        let mut exchange = bridge
            .open_exchange(request(ChannelTarget::Fixed("c1".into())))
            .await
            .unwrap();
        assert!(!exchange.ephemeral);
        assert_eq!(session.sent_to("c1"), ["hello <@42>"]);

        let update = InboundUpdate {
            message_id: "r1".into(),
            channel_id: "c1".into(),
            referenced: Some(ReferencedMessage {
                id: exchange.reply.correlation_id().to_string(),
                content: "hello <@42>".into(),
            }),
            author_id: Some("42".into()),
            mentions: vec![SELF_ID.into()],
            content: "hi there".into(),
            has_components: true,
            ..Default::default()
        };
        assert_eq!(
            dispatcher.handle_update(&update, SELF_ID).await,
            DispatchOutcome::Delivered { terminal: true }
        );

        assert_eq!(
            exchange.reply.recv().await,
            Some(ReplyEvent::Reply(ReplyPayload::Raw(RawReply {
                content: "hi there".into(),
                embed_urls: Vec::new(),
            })))
        );
        let Some(ReplyEvent::Stopped(stop)) = exchange.reply.recv().await else {
            panic!("expected stop");
        };
        assert_eq!(stop.reason, StopReason::Completed);
        assert!(bridge.registry().is_empty());
    }

    #[tokio::test]
    async fn ephemeral_channel_is_created() {
        let session = FakeSession::new();
        let bridge = Bridge::new(session.clone(), "g1");

        let exchange = bridge
            .open_exchange(request(ChannelTarget::Ephemeral))
            .await
            .unwrap();
        assert!(exchange.ephemeral);
        assert_eq!(session.created_channels(), [exchange.channel_id()]);
        assert!(session.created_names()[0].starts_with("chat-"));
        assert_eq!(bridge.registry().len(), 1);
    }

    #[tokio::test]
    async fn failed_send_removes_ephemeral_channel() {
        let session = FakeSession::new();
        session.fail_after_sends(0);
        let bridge = Bridge::new(session.clone(), "g1");

        let err = bridge
            .open_exchange(request(ChannelTarget::EphemeralUnder("cat".into())))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Session(_)));
        assert_eq!(session.deleted_channels(), session.created_channels());
        assert!(bridge.registry().is_empty());
    }

    #[tokio::test]
    async fn attachments_are_uploaded_before_the_prompt() {
        use base64::{Engine, engine::general_purpose::STANDARD};

        let session = FakeSession::new();
        let bridge = Bridge::new(session.clone(), "g1");

        let mut with_image = request(ChannelTarget::Fixed("c1".into()));
        with_image.attachments = vec![format!(
            "data:image/png;base64,{}",
            STANDARD.encode(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR")
        )];
        bridge.open_exchange(with_image).await.unwrap();

        let uploads = session.uploads();
        assert_eq!(uploads.len(), 1);
        let sent = session.sent_to("c1");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("hello\nhttps://cdn.test/c1/image-"));
        assert!(sent[0].ends_with(".png <@42>"));
    }

    #[tokio::test]
    async fn failed_upload_removes_ephemeral_channel() {
        let session = FakeSession::new();
        let bridge = Bridge::new(session.clone(), "g1");

        let mut broken = request(ChannelTarget::Ephemeral);
        broken.attachments = vec!["not a data uri".into()];
        let err = bridge.open_exchange(broken).await.err().unwrap();
        assert!(matches!(err, Error::MalformedDataUri));
        assert_eq!(session.deleted_channels(), session.created_channels());
        assert!(session.sent().is_empty());
    }

    #[tokio::test]
    async fn oversized_prompt_keeps_fixed_channel() {
        let session = FakeSession::new();
        let bridge = Bridge::new(session.clone(), "g1");

        let mut oversized = request(ChannelTarget::Fixed("c1".into()));
        oversized.prompt = "x".repeat(60_000);
        let err = bridge.open_exchange(oversized).await.err().unwrap();
        assert!(matches!(err, Error::ContentTooLarge { .. }));
        assert!(session.deleted_channels().is_empty());
        assert!(session.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoning_schedules_ephemeral_deletion() {
        let session = FakeSession::new();
        let bridge = Bridge::new(session.clone(), "g1");

        let exchange = bridge
            .open_exchange(request(ChannelTarget::Ephemeral))
            .await
            .unwrap();
        let channel_id = exchange.channel_id().to_string();
        bridge.abandon(exchange);

        assert!(bridge.registry().is_empty());
        assert_eq!(bridge.lifecycle().state(&channel_id), TimerState::Scheduled);
    }

    #[tokio::test]
    async fn abandoning_fixed_channel_leaves_it() {
        let session = FakeSession::new();
        let bridge = Bridge::new(session.clone(), "g1");

        let exchange = bridge
            .open_exchange(request(ChannelTarget::Fixed("c1".into())))
            .await
            .unwrap();
        bridge.abandon(exchange);
        assert_eq!(bridge.lifecycle().state("c1"), TimerState::Idle);
    }
}
