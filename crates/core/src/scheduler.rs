//! Nightly canary job that keeps the foreign bots active.

use std::{sync::Arc, time::Duration};

use {
    botbridge_channels::{ChannelKind, Session},
    botbridge_config::{BotConfig, unique_targets},
    chrono::{DateTime, Local, TimeZone},
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
};

use crate::{bridge::ephemeral_channel_name, outbound::OutboundSender};

pub const CANARY_MESSAGE: &str = "CDP Scheduled Task Job Send Msg Success！";

/// Pause between two targets of the same batch.
pub const DEFAULT_TARGET_PAUSE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanaryReport {
    pub sent: usize,
    pub failed: usize,
    pub ephemeral_deleted: usize,
}

pub struct CanaryScheduler {
    session: Arc<dyn Session>,
    outbound: OutboundSender,
    guild_id: String,
    targets: Vec<BotConfig>,
    pause: Duration,
}

impl CanaryScheduler {
    /// `default_target` is appended to `configs` unless an identical
    /// `(channel, bot)` pair is already configured.
    #[must_use]
    pub fn new(
        session: Arc<dyn Session>,
        guild_id: impl Into<String>,
        configs: &[BotConfig],
        default_target: BotConfig,
    ) -> Self {
        let targets = unique_targets(
            configs
                .iter()
                .cloned()
                .chain(std::iter::once(default_target)),
        );
        Self {
            outbound: OutboundSender::new(Arc::clone(&session)),
            session,
            guild_id: guild_id.into(),
            targets,
            pause: DEFAULT_TARGET_PAUSE,
        }
    }

    #[must_use]
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    #[must_use]
    pub fn targets(&self) -> &[BotConfig] {
        &self.targets
    }

    /// Runs until `cancel` fires, once per local midnight.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            let delay = delay_until_next_midnight(&Local::now());
            info!(delay_secs = delay.as_secs(), "next canary batch scheduled");

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {},
            }

            let report = self.run_batch(&cancel).await;
            info!(
                sent = report.sent,
                failed = report.failed,
                ephemeral_deleted = report.ephemeral_deleted,
                "canary batch finished"
            );
        }
        info!("canary scheduler stopped");
    }

    /// Sends one canary to every target right away.
    pub async fn run_once(&self) -> CanaryReport {
        self.run_batch(&CancellationToken::new()).await
    }

    /// A cancelled batch stops sending but still removes the channels it
    /// created.
    async fn run_batch(&self, cancel: &CancellationToken) -> CanaryReport {
        info!(targets = self.targets.len(), "canary batch started");
        let mut report = CanaryReport::default();
        let mut ephemeral = Vec::new();

        for (index, target) in self.targets.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("canary batch cancelled");
                break;
            }
            if index > 0 {
                tokio::time::sleep(self.pause).await;
            }

            let channel_id = match &target.channel_id {
                Some(channel_id) => channel_id.clone(),
                None => {
                    let name = ephemeral_channel_name();
                    match self
                        .session
                        .create_channel(&self.guild_id, &name, ChannelKind::Text)
                        .await
                    {
                        Ok(channel_id) => {
                            ephemeral.push(channel_id.clone());
                            channel_id
                        },
                        Err(e) => {
                            error!(bot_id = %target.bot_id, error = %e, "failed to create canary channel");
                            report.failed += 1;
                            continue;
                        },
                    }
                },
            };

            match self
                .outbound
                .send(&channel_id, CANARY_MESSAGE, &target.bot_id)
                .await
            {
                Ok(_) => {
                    info!(channel_id, bot_id = %target.bot_id, "canary sent");
                    report.sent += 1;
                },
                Err(e) => {
                    error!(channel_id, bot_id = %target.bot_id, error = %e, "canary send failed");
                    report.failed += 1;
                },
            }
        }

        for channel_id in ephemeral {
            match self.session.delete_channel(&channel_id).await {
                Ok(_) => report.ephemeral_deleted += 1,
                Err(e) => warn!(channel_id, error = %e, "failed to delete canary channel"),
            }
        }
        report
    }
}

/// Time left until the next midnight in `now`'s time zone.
#[must_use]
pub fn delay_until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    let next = now
        .date_naive()
        .succ_opt()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|midnight| midnight.and_local_timezone(now.timezone()).earliest());
    match next {
        Some(next) => next.signed_duration_since(now).to_std().unwrap_or(DAY),
        None => DAY,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {chrono::Utc, rstest::rstest, tokio::time::Instant};

    use super::*;
    use crate::test_support::FakeSession;

    fn configs() -> Vec<BotConfig> {
        vec![
            BotConfig::new(Some("c1".into()), "b1"),
            BotConfig::new(None, "b2"),
            BotConfig::new(Some("c1".into()), "b1"),
        ]
    }

    #[rstest]
    #[case("2024-01-01T23:59:00Z", 60)]
    #[case("2024-01-01T00:00:00Z", 24 * 60 * 60)]
    #[case("2024-02-28T12:00:00Z", 12 * 60 * 60)]
    fn delay_to_midnight(#[case] now: &str, #[case] secs: u64) {
        let now: DateTime<Utc> = now.parse().unwrap();
        assert_eq!(delay_until_next_midnight(&now), Duration::from_secs(secs));
    }

    #[test]
    fn targets_are_deduplicated_with_default_last() {
        let session = FakeSession::new();
        let scheduler =
            CanaryScheduler::new(session, "g1", &configs(), BotConfig::new(Some("c0".into()), "b0"));
        let pairs: Vec<_> = scheduler
            .targets()
            .iter()
            .map(|t| (t.channel_id.as_deref(), t.bot_id.as_str()))
            .collect();
        assert_eq!(pairs, [(Some("c1"), "b1"), (None, "b2"), (Some("c0"), "b0")]);
    }

    #[test]
    fn configured_default_is_not_repeated() {
        let session = FakeSession::new();
        let scheduler =
            CanaryScheduler::new(session, "g1", &configs(), BotConfig::new(Some("c1".into()), "b1"));
        assert_eq!(scheduler.targets().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_reaches_every_target_and_cleans_up() {
        let session = FakeSession::new();
        let scheduler = CanaryScheduler::new(
            session.clone(),
            "g1",
            &configs(),
            BotConfig::new(Some("c0".into()), "b0"),
        );

        let start = Instant::now();
        let report = scheduler.run_once().await;
        assert_eq!(start.elapsed(), DEFAULT_TARGET_PAUSE * 2);

        assert_eq!(report, CanaryReport {
            sent: 3,
            failed: 0,
            ephemeral_deleted: 1,
        });
        assert_eq!(session.sent_to("c1"), [format!("{CANARY_MESSAGE} <@b1>")]);
        assert_eq!(session.sent_to("c0"), [format!("{CANARY_MESSAGE} <@b0>")]);

        let created = session.created_channels();
        assert_eq!(created.len(), 1);
        assert_eq!(session.sent_to(&created[0]), [format!("{CANARY_MESSAGE} <@b2>")]);
        assert_eq!(session.deleted_channels(), created);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_pause_spaces_out_targets() {
        let session = FakeSession::new();
        let scheduler = CanaryScheduler::new(
            session.clone(),
            "g1",
            &configs(),
            BotConfig::new(Some("c0".into()), "b0"),
        )
        .with_pause(Duration::from_millis(250));

        let start = Instant::now();
        let report = scheduler.run_once().await;
        assert_eq!(start.elapsed(), Duration::from_millis(500));
        assert_eq!(report.sent, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_target_does_not_stop_the_batch() {
        let session = FakeSession::new();
        session.fail_channel("c1");
        let scheduler = CanaryScheduler::new(
            session.clone(),
            "g1",
            &configs(),
            BotConfig::new(Some("c0".into()), "b0"),
        );

        let report = scheduler.run_once().await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.sent, 2);
        assert_eq!(report.ephemeral_deleted, 1);
        assert_eq!(session.sent_to("c0").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_scheduler_returns() {
        let session = FakeSession::new();
        let scheduler = CanaryScheduler::new(
            session.clone(),
            "g1",
            &[],
            BotConfig::new(Some("c0".into()), "b0"),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        scheduler.run(cancel).await;
        assert!(session.sent().is_empty());
    }
}
