//! Platform-neutral view of the upstream chat session.
//!
//! The correlation engine only talks to the platform through the [`Session`]
//! trait and only sees inbound traffic as [`InboundUpdate`] values, so the
//! Discord transport can be swapped for a fake in tests.

pub mod error;
pub mod event;
pub mod session;

pub use {
    error::{Error, Result},
    event::{InboundUpdate, ReferencedMessage, UpdateEmbed},
    session::{ArchiveDuration, ChannelKind, SentMessage, Session},
};
