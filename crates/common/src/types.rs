use serde::{Deserialize, Serialize};

/// Which payload shape a waiting caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Raw,
    ChatCompletion,
    ImageGeneration,
}

/// A reply delivered to a waiting caller. Exactly one variant per hand-off,
/// always matching the [`ReplyKind`] the caller registered with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyPayload {
    Raw(RawReply),
    ChatCompletion(ChatCompletionReply),
    ImageGeneration(ImageGenerationReply),
}

impl ReplyPayload {
    #[must_use]
    pub fn kind(&self) -> ReplyKind {
        match self {
            Self::Raw(_) => ReplyKind::Raw,
            Self::ChatCompletion(_) => ReplyKind::ChatCompletion,
            Self::ImageGeneration(_) => ReplyKind::ImageGeneration,
        }
    }
}

/// Bot text as-is plus the image URLs found in its embeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReply {
    pub content: String,
    pub embed_urls: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    /// `None` while the bot is still writing, `Some(Stop)` on the final update.
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    #[must_use]
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// OpenAI-compatible chat completion body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionReply {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

impl ChatCompletionReply {
    /// Marks every choice as finished.
    #[must_use]
    pub fn finished(mut self) -> Self {
        for choice in &mut self.choices {
            choice.finish_reason = Some(FinishReason::Stop);
        }
        self
    }

    /// Text of the first choice, if any.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub url: String,
}

/// OpenAI-compatible image generation body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageGenerationReply {
    pub created: i64,
    pub data: Vec<ImageData>,
}
