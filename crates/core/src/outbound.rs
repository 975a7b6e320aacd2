use std::sync::Arc;

use {
    botbridge_channels::{SentMessage, Session},
    tracing::{debug, error},
};

use crate::{Error, Result, segment::reverse_segment};

/// Hard ceiling on a prompt, mention included, in characters.
pub const MAX_CONTENT_CHARS: usize = 50_000;

/// Per-message character limit of the upstream platform.
pub const MESSAGE_CHUNK_CHARS: usize = 2_000;

/// Appends the mention that makes the foreign bot answer.
#[must_use]
pub fn with_mention(body: &str, mention_target: &str) -> String {
    format!("{body} <@{mention_target}>")
}

/// Pads the two-character sequence `\n` with spaces so the platform keeps it
/// as literal text instead of folding it into the surrounding words.
#[must_use]
pub fn escape_literal_newlines(content: &str) -> String {
    content.replace("\\n", " \\n ")
}

/// Sends prompts to the foreign bot, split into message-sized pieces.
#[derive(Clone)]
pub struct OutboundSender {
    session: Arc<dyn Session>,
}

impl OutboundSender {
    #[must_use]
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self { session }
    }

    /// Sends `body` to `channel_id`, mentioning `mention_target`.
    ///
    /// The returned message is the last piece sent; its id is what the bot's
    /// reply will reference. Nothing is sent when the content is too large,
    /// and a failed piece stops the remaining ones.
    pub async fn send(
        &self,
        channel_id: &str,
        body: &str,
        mention_target: &str,
    ) -> Result<SentMessage> {
        let content = with_mention(body, mention_target);
        let len = content.chars().count();
        if len > MAX_CONTENT_CHARS {
            error!(channel_id, len, "prompt over the size limit, not sending");
            return Err(Error::ContentTooLarge {
                len,
                max: MAX_CONTENT_CHARS,
            });
        }

        let content = escape_literal_newlines(&content);
        let chunks = reverse_segment(&content, MESSAGE_CHUNK_CHARS);
        let total = chunks.len();

        let mut last = None;
        for (index, chunk) in chunks.iter().enumerate() {
            let sent = self
                .session
                .send_message(channel_id, chunk)
                .await
                .map_err(|e| {
                    error!(channel_id, index, total, error = %e, "error sending message");
                    e
                })?;
            debug!(channel_id, index, total, message_id = %sent.id, "sent prompt piece");
            last = Some(sent);
        }

        // Content always carries the mention, so there is at least one piece.
        last.ok_or_else(|| Error::Session(botbridge_channels::Error::invalid_input("empty prompt")))
    }
}
