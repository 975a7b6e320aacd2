use std::{num::NonZeroU64, sync::Arc, time::Duration};

use {
    botbridge_channels::{ArchiveDuration, ChannelKind, Error, Result, SentMessage, Session},
    serenity::{
        all::{
            AutoArchiveDuration, ChannelId, ChannelType, CreateAttachment, CreateChannel,
            CreateMessage, CreateThread, GuildId, Message,
        },
        async_trait,
        http::Http,
    },
    tokio::sync::watch,
    tracing::debug,
};

/// [`Session`] over Discord's REST API.
///
/// The account id is learned from the gateway's ready event and published
/// through [`set_identity`](Self::set_identity).
pub struct DiscordSession {
    http: Arc<Http>,
    identity: watch::Sender<Option<String>>,
}

fn snowflake(what: &str, id: &str) -> Result<NonZeroU64> {
    id.trim()
        .parse()
        .map_err(|_| Error::invalid_input(format!("{what} id {id:?} is not a snowflake")))
}

fn channel_id(id: &str) -> Result<ChannelId> {
    snowflake("channel", id).map(ChannelId::from)
}

fn guild_id(id: &str) -> Result<GuildId> {
    snowflake("guild", id).map(GuildId::from)
}

fn channel_type(kind: ChannelKind) -> ChannelType {
    match kind {
        ChannelKind::Text => ChannelType::Text,
        ChannelKind::Category => ChannelType::Category,
    }
}

fn archive_duration(archive: ArchiveDuration) -> AutoArchiveDuration {
    match archive {
        ArchiveDuration::OneHour => AutoArchiveDuration::OneHour,
        ArchiveDuration::OneDay => AutoArchiveDuration::OneDay,
        ArchiveDuration::ThreeDays => AutoArchiveDuration::ThreeDays,
        ArchiveDuration::OneWeek => AutoArchiveDuration::OneWeek,
    }
}

fn sent(message: Message) -> SentMessage {
    SentMessage {
        id: message.id.to_string(),
        channel_id: message.channel_id.to_string(),
        attachment_urls: message.attachments.into_iter().map(|a| a.url).collect(),
    }
}

impl DiscordSession {
    #[must_use]
    pub fn new(http: Arc<Http>) -> Self {
        let (identity, _) = watch::channel(None);
        Self { http, identity }
    }

    pub fn set_identity(&self, user_id: impl Into<String>) {
        self.identity.send_replace(Some(user_id.into()));
    }

    /// Waits until the gateway reported which account we are.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<String> {
        let mut identity = self.identity.subscribe();
        let ready = tokio::time::timeout(timeout, identity.wait_for(Option::is_some))
            .await
            .map_err(|_| Error::unavailable(format!("gateway not ready after {timeout:?}")))?
            .map_err(|e| Error::transport("identity watch closed", e))?;
        (*ready)
            .clone()
            .ok_or_else(|| Error::unavailable("gateway ready without identity"))
    }
}

#[async_trait]
impl Session for DiscordSession {
    fn self_identity(&self) -> Option<String> {
        self.identity.borrow().clone()
    }

    async fn send_message(&self, channel: &str, text: &str) -> Result<SentMessage> {
        let message = channel_id(channel)?
            .send_message(self.http.as_ref(), CreateMessage::new().content(text))
            .await
            .map_err(|e| Error::transport("send message", e))?;
        Ok(sent(message))
    }

    async fn send_attachment(
        &self,
        channel: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<SentMessage> {
        let attachment = CreateAttachment::bytes(data, file_name);
        let message = channel_id(channel)?
            .send_message(self.http.as_ref(), CreateMessage::new().add_file(attachment))
            .await
            .map_err(|e| Error::transport("send attachment", e))?;
        Ok(sent(message))
    }

    async fn create_channel(&self, guild: &str, name: &str, kind: ChannelKind) -> Result<String> {
        let created = guild_id(guild)?
            .create_channel(
                self.http.as_ref(),
                CreateChannel::new(name).kind(channel_type(kind)),
            )
            .await
            .map_err(|e| Error::transport("create channel", e))?;
        debug!(channel_id = %created.id, name, "channel created");
        Ok(created.id.to_string())
    }

    async fn create_sub_channel(
        &self,
        guild: &str,
        parent_id: &str,
        name: &str,
        kind: ChannelKind,
    ) -> Result<String> {
        let parent = channel_id(parent_id)?;
        let created = guild_id(guild)?
            .create_channel(
                self.http.as_ref(),
                CreateChannel::new(name)
                    .kind(channel_type(kind))
                    .category(parent),
            )
            .await
            .map_err(|e| Error::transport("create sub-channel", e))?;
        debug!(channel_id = %created.id, parent_id, name, "sub-channel created");
        Ok(created.id.to_string())
    }

    async fn delete_channel(&self, channel: &str) -> Result<String> {
        let deleted = channel_id(channel)?
            .delete(self.http.as_ref())
            .await
            .map_err(|e| Error::transport("delete channel", e))?;
        Ok(deleted.id().to_string())
    }

    async fn start_thread(
        &self,
        channel: &str,
        name: &str,
        archive: ArchiveDuration,
    ) -> Result<String> {
        let thread = channel_id(channel)?
            .create_thread(
                self.http.as_ref(),
                CreateThread::new(name)
                    .kind(ChannelType::PublicThread)
                    .auto_archive_duration(archive_duration(archive)),
            )
            .await
            .map_err(|e| Error::transport("start thread", e))?;
        Ok(thread.id.to_string())
    }
}
