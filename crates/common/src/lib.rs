//! Reply payload shapes handed from the dispatch engine to waiting callers.

pub mod types;

pub use types::{
    ChatChoice, ChatCompletionReply, ChatMessage, FinishReason, ImageData, ImageGenerationReply,
    RawReply, ReplyKind, ReplyPayload, Usage,
};
