//! Correlation engine between callers and a foreign chat bot.
//!
//! A caller posts a prompt through the [`Bridge`], which registers the sent
//! message id in the [`CorrelationRegistry`]. The platform adapter feeds every
//! "message updated" event to the [`Dispatcher`], which turns the bot's edits
//! into reply payloads and a final stop signal. Channels created for a single
//! exchange are removed by the [`ChannelLifecycle`] manager.

pub mod bridge;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod outbound;
pub mod registry;
pub mod scheduler;
pub mod segment;
pub mod tokens;
pub mod upload;

#[cfg(test)]
mod test_support;

pub use {
    bridge::{Bridge, ChannelTarget, Exchange, ExchangeRequest, ephemeral_channel_name},
    dispatch::{DEFAULT_MODEL, DispatchOutcome, Dispatcher},
    error::{Error, Result},
    lifecycle::{ChannelLifecycle, TimerState},
    outbound::{MAX_CONTENT_CHARS, MESSAGE_CHUNK_CHARS, OutboundSender},
    registry::{
        CorrelationRegistry, DEFAULT_HANDOFF_TIMEOUT, PendingReply, ReplyEvent, Resolution,
        StopReason, StopSignal,
    },
    scheduler::{CANARY_MESSAGE, CanaryReport, CanaryScheduler, delay_until_next_midnight},
    segment::reverse_segment,
    tokens::{ApproxTokenCounter, TokenCounter},
    upload::upload_data_uri,
};
