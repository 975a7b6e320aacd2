//! Discord transport: a serenity-backed [`Session`](botbridge_channels::Session)
//! and the gateway handler that feeds message edits to the dispatcher.

pub mod bot;
pub mod handler;
pub mod http;
pub mod session;

pub use {
    bot::{DEFAULT_READY_TIMEOUT, DiscordBot},
    handler::BridgeHandler,
    session::DiscordSession,
};
