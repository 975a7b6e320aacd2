use async_trait::async_trait;

use crate::Result;

/// Kind of channel to create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelKind {
    #[default]
    Text,
    Category,
}

/// Inactivity period after which a thread is archived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArchiveDuration {
    OneHour,
    #[default]
    OneDay,
    ThreeDays,
    OneWeek,
}

impl ArchiveDuration {
    /// Picks the smallest supported duration that covers `minutes`.
    #[must_use]
    pub fn from_minutes(minutes: u32) -> Self {
        match minutes {
            0..=60 => Self::OneHour,
            61..=1440 => Self::OneDay,
            1441..=4320 => Self::ThreeDays,
            _ => Self::OneWeek,
        }
    }
}

/// Handle of a message the session has sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub id: String,
    pub channel_id: String,
    /// URLs of files attached to the message, in upload order.
    pub attachment_urls: Vec<String>,
}

/// The live connection to the upstream platform.
///
/// One instance exists per process; every component holds an
/// `Arc<dyn Session>` and none of them owns it. Implementations must be safe
/// to call concurrently, but no ordering is promised between distinct calls.
#[async_trait]
pub trait Session: Send + Sync {
    /// Id of the account this session is logged in as, once known.
    fn self_identity(&self) -> Option<String>;

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<SentMessage>;

    /// Sends a single file as an attachment.
    async fn send_attachment(
        &self,
        channel_id: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<SentMessage>;

    /// Creates a top-level channel and returns its id.
    async fn create_channel(&self, guild_id: &str, name: &str, kind: ChannelKind)
    -> Result<String>;

    /// Creates a channel nested under `parent_id` and returns its id.
    async fn create_sub_channel(
        &self,
        guild_id: &str,
        parent_id: &str,
        name: &str,
        kind: ChannelKind,
    ) -> Result<String>;

    /// Deletes a channel and returns the id of what was deleted.
    async fn delete_channel(&self, channel_id: &str) -> Result<String>;

    /// Starts a thread in `channel_id` and returns the thread id.
    async fn start_thread(
        &self,
        channel_id: &str,
        name: &str,
        archive: ArchiveDuration,
    ) -> Result<String>;
}
