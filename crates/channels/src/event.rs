/// The message an update replies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferencedMessage {
    pub id: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateEmbed {
    pub image_url: Option<String>,
}

/// A "message updated" event, reduced to what correlation needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundUpdate {
    pub message_id: String,
    pub channel_id: String,
    /// Set when the updated message is a reply to another message.
    pub referenced: Option<ReferencedMessage>,
    /// Absent when the platform omitted the author from the partial update.
    pub author_id: Option<String>,
    pub mentions: Vec<String>,
    pub content: String,
    pub embeds: Vec<UpdateEmbed>,
    /// Interactive components are attached once the bot finishes generating.
    pub has_components: bool,
}

impl InboundUpdate {
    #[must_use]
    pub fn referenced_id(&self) -> Option<&str> {
        self.referenced.as_ref().map(|r| r.id.as_str())
    }

    #[must_use]
    pub fn mentions_user(&self, user_id: &str) -> bool {
        self.mentions.iter().any(|m| m == user_id)
    }

    /// Image URLs carried by embeds, in embed order.
    pub fn image_urls(&self) -> impl Iterator<Item = &str> {
        self.embeds.iter().filter_map(|e| e.image_url.as_deref())
    }
}
