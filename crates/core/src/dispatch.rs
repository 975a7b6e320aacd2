//! Turns "message updated" events into replies for waiting callers.
//!
//! Every update is classified on its own; nothing about an exchange is kept
//! here beyond what the registry and the lifecycle manager already hold.

use std::sync::Arc;

use {
    botbridge_channels::InboundUpdate,
    botbridge_common::{
        ChatChoice, ChatCompletionReply, ChatMessage, ImageData, ImageGenerationReply, RawReply,
        ReplyKind, ReplyPayload, Usage,
    },
    botbridge_config::{ChannelRetention, DEFAULT_CHANNEL_DELETE_DELAY},
    tracing::{debug, info, warn},
};

use crate::{
    lifecycle::ChannelLifecycle,
    registry::{CorrelationRegistry, Resolution, StopReason, StopSignal},
    tokens::{ApproxTokenCounter, TokenCounter},
};

/// Model name reported in chat completion payloads.
pub const DEFAULT_MODEL: &str = "gpt-4-turbo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No caller is waiting on the referenced message.
    Ignored,
    /// Our own echo or an author-less update: the exchange was stopped.
    Aborted,
    /// A reply by someone else that does not address us.
    NotAddressed,
    /// Content was handed over; `terminal` when the bot also finished.
    Delivered { terminal: bool },
}

pub struct Dispatcher {
    registry: Arc<CorrelationRegistry>,
    lifecycle: Arc<ChannelLifecycle>,
    token_counter: Arc<dyn TokenCounter>,
    retention: ChannelRetention,
    model: String,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        registry: Arc<CorrelationRegistry>,
        lifecycle: Arc<ChannelLifecycle>,
        retention: ChannelRetention,
    ) -> Self {
        Self {
            registry,
            lifecycle,
            token_counter: Arc::new(ApproxTokenCounter),
            retention,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    #[must_use]
    pub fn with_token_counter(mut self, token_counter: Arc<dyn TokenCounter>) -> Self {
        self.token_counter = token_counter;
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub async fn handle_update(&self, update: &InboundUpdate, self_id: &str) -> DispatchOutcome {
        let Some(correlation_id) = update.referenced_id() else {
            return DispatchOutcome::Ignored;
        };
        let Some(kind) = self.registry.kind_of(correlation_id) else {
            return DispatchOutcome::Ignored;
        };
        let channel_id = update.channel_id.as_str();

        if update.author_id.as_deref().is_none_or(|author| author == self_id) {
            info!(correlation_id, channel_id, "echo of our own message, aborting exchange");
            self.lifecycle.delete_now(channel_id).await;
            self.registry.signal_stop(correlation_id, StopSignal {
                channel_id: channel_id.to_string(),
                reason: StopReason::Aborted,
            });
            return DispatchOutcome::Aborted;
        }

        if !update.mentions_user(self_id) {
            return DispatchOutcome::NotAddressed;
        }

        let payload = self.build_payload(kind, update);
        let completion = match &payload {
            ReplyPayload::ChatCompletion(reply) => Some(reply.clone()),
            _ => None,
        };
        self.deliver(correlation_id, payload).await;

        if !update.has_components {
            return DispatchOutcome::Delivered { terminal: false };
        }

        if let Some(completion) = completion {
            self.deliver(
                correlation_id,
                ReplyPayload::ChatCompletion(completion.finished()),
            )
            .await;
        }
        self.apply_retention(channel_id);
        self.registry.signal_stop(correlation_id, StopSignal {
            channel_id: channel_id.to_string(),
            reason: StopReason::Completed,
        });
        debug!(correlation_id, channel_id, "bot finished replying");

        DispatchOutcome::Delivered { terminal: true }
    }

    async fn deliver(&self, correlation_id: &str, payload: ReplyPayload) {
        match self.registry.resolve_reply(correlation_id, payload).await {
            Resolution::Delivered => {},
            resolution => warn!(correlation_id, ?resolution, "reply was not delivered"),
        }
    }

    fn apply_retention(&self, channel_id: &str) {
        match self.retention {
            ChannelRetention::Keep => {
                self.lifecycle.cancel_delete_timer(channel_id);
            },
            ChannelRetention::After(delay) => self.lifecycle.set_delete_timer(channel_id, delay),
            ChannelRetention::Default => {
                self.lifecycle
                    .set_delete_timer(channel_id, DEFAULT_CHANNEL_DELETE_DELAY);
            },
            ChannelRetention::Untouched => {},
        }
    }

    fn build_payload(&self, kind: ReplyKind, update: &InboundUpdate) -> ReplyPayload {
        match kind {
            ReplyKind::Raw => ReplyPayload::Raw(raw_reply(update)),
            ReplyKind::ChatCompletion => {
                ReplyPayload::ChatCompletion(self.chat_completion(update))
            },
            ReplyKind::ImageGeneration => ReplyPayload::ImageGeneration(image_generation(update)),
        }
    }

    fn chat_completion(&self, update: &InboundUpdate) -> ChatCompletionReply {
        let content = merge_image_urls(&update.content, update.image_urls());
        let prompt = update
            .referenced
            .as_ref()
            .map_or("", |r| r.content.as_str());
        let usage = Usage::new(
            self.token_counter.count(prompt),
            self.token_counter.count(&content),
        );

        ChatCompletionReply {
            id: update.message_id.clone(),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: self.model.clone(),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content,
                },
                finish_reason: None,
            }],
            usage,
        }
    }
}

/// Bot text as-is plus every embedded image URL.
#[must_use]
pub fn raw_reply(update: &InboundUpdate) -> RawReply {
    RawReply {
        content: update.content.clone(),
        embed_urls: update.image_urls().map(str::to_string).collect(),
    }
}

/// Image URLs the bot did not already spell out in its text.
#[must_use]
pub fn image_generation(update: &InboundUpdate) -> ImageGenerationReply {
    ImageGenerationReply {
        created: chrono::Utc::now().timestamp(),
        data: update
            .image_urls()
            .filter(|url| !update.content.contains(url))
            .map(|url| ImageData {
                url: url.to_string(),
            })
            .collect(),
    }
}

/// Appends each URL missing from `content` as a markdown image.
#[must_use]
pub fn merge_image_urls<'a>(content: &str, urls: impl IntoIterator<Item = &'a str>) -> String {
    let mut merged = content.to_string();
    for url in urls {
        if merged.contains(url) {
            continue;
        }
        if !merged.is_empty() {
            merged.push('\n');
        }
        merged.push_str(&format!("{url}\n![Image]({url})"));
    }
    merged
}
