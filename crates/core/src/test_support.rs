//! In-memory [`Session`] used by the unit tests of this crate.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use {
    async_trait::async_trait,
    botbridge_channels::{ArchiveDuration, ChannelKind, Error, Result, SentMessage, Session},
    tokio::sync::watch,
};

pub const SELF_ID: &str = "900";

#[derive(Default)]
struct Recorded {
    next_id: u64,
    sent: Vec<(String, String)>,
    created: Vec<(String, String)>,
    deleted: Vec<String>,
    uploads: Vec<(String, String, usize)>,
    failing_channels: HashSet<String>,
    fail_after_sends: Option<usize>,
    attach_urls: bool,
}

pub struct FakeSession {
    state: Mutex<Recorded>,
    delete_gate: watch::Sender<bool>,
}

#[allow(clippy::unwrap_used)]
impl FakeSession {
    pub fn new() -> Arc<Self> {
        let (delete_gate, _) = watch::channel(true);
        Arc::new(Self {
            state: Mutex::new(Recorded {
                attach_urls: true,
                ..Default::default()
            }),
            delete_gate,
        })
    }

    fn with<T>(&self, f: impl FnOnce(&mut Recorded) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.with(|s| s.sent.clone())
    }

    pub fn sent_to(&self, channel_id: &str) -> Vec<String> {
        self.with(|s| {
            s.sent
                .iter()
                .filter(|(c, _)| c == channel_id)
                .map(|(_, t)| t.clone())
                .collect()
        })
    }

    /// Ids of channels created so far.
    pub fn created_channels(&self) -> Vec<String> {
        self.with(|s| s.created.iter().map(|(id, _)| id.clone()).collect())
    }

    pub fn created_names(&self) -> Vec<String> {
        self.with(|s| s.created.iter().map(|(_, name)| name.clone()).collect())
    }

    pub fn deleted_channels(&self) -> Vec<String> {
        self.with(|s| s.deleted.clone())
    }

    pub fn uploads(&self) -> Vec<(String, String, usize)> {
        self.with(|s| s.uploads.clone())
    }

    /// Every send to `channel_id` fails.
    pub fn fail_channel(&self, channel_id: &str) {
        self.with(|s| s.failing_channels.insert(channel_id.to_string()));
    }

    /// Sends succeed `n` times, then fail.
    pub fn fail_after_sends(&self, n: usize) {
        self.with(|s| s.fail_after_sends = Some(n));
    }

    pub fn drop_attachments(&self) {
        self.with(|s| s.attach_urls = false);
    }

    /// Deletions block until [`release_deletes`](Self::release_deletes).
    pub fn hold_deletes(&self) {
        self.delete_gate.send_replace(false);
    }

    pub fn release_deletes(&self) {
        self.delete_gate.send_replace(true);
    }

    fn next_id(&self, prefix: &str) -> String {
        self.with(|s| {
            s.next_id += 1;
            format!("{prefix}-{}", s.next_id)
        })
    }
}

fn refused(context: &str) -> Error {
    Error::transport(
        context.to_string(),
        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
    )
}

#[async_trait]
impl Session for FakeSession {
    fn self_identity(&self) -> Option<String> {
        Some(SELF_ID.to_string())
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<SentMessage> {
        let fail = self.with(|s| {
            let over_budget = s.fail_after_sends.is_some_and(|n| s.sent.len() >= n);
            s.failing_channels.contains(channel_id) || over_budget
        });
        if fail {
            return Err(refused("send message"));
        }
        let id = self.next_id("msg");
        self.with(|s| s.sent.push((channel_id.to_string(), text.to_string())));
        Ok(SentMessage {
            id,
            channel_id: channel_id.to_string(),
            attachment_urls: Vec::new(),
        })
    }

    async fn send_attachment(
        &self,
        channel_id: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<SentMessage> {
        let id = self.next_id("msg");
        let attach = self.with(|s| {
            s.uploads
                .push((channel_id.to_string(), file_name.to_string(), data.len()));
            s.attach_urls
        });
        Ok(SentMessage {
            id,
            channel_id: channel_id.to_string(),
            attachment_urls: if attach {
                vec![format!("https://cdn.test/{channel_id}/{file_name}")]
            } else {
                Vec::new()
            },
        })
    }

    async fn create_channel(
        &self,
        _guild_id: &str,
        name: &str,
        _kind: ChannelKind,
    ) -> Result<String> {
        let id = self.next_id("chan");
        self.with(|s| s.created.push((id.clone(), name.to_string())));
        Ok(id)
    }

    async fn create_sub_channel(
        &self,
        guild_id: &str,
        _parent_id: &str,
        name: &str,
        kind: ChannelKind,
    ) -> Result<String> {
        self.create_channel(guild_id, name, kind).await
    }

    async fn delete_channel(&self, channel_id: &str) -> Result<String> {
        let mut gate = self.delete_gate.subscribe();
        gate.wait_for(|open| *open)
            .await
            .map_err(|e| Error::transport("delete gate", e))?;
        self.with(|s| s.deleted.push(channel_id.to_string()));
        Ok(channel_id.to_string())
    }

    async fn start_thread(
        &self,
        _channel_id: &str,
        _name: &str,
        _archive: ArchiveDuration,
    ) -> Result<String> {
        Ok(self.next_id("thread"))
    }
}
