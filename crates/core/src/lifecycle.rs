//! Deferred deletion of ephemeral channels.
//!
//! Each channel id owns at most one slot. Every transition of a slot happens
//! while holding its map shard, and a firing timer only proceeds when its
//! generation is still the current one and the slot is still `Scheduled`.
//! A reset or cancel therefore either wins before the fire (the fire becomes
//! a no-op) or observes `Fired` and leaves the deletion alone.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    botbridge_channels::Session,
    dashmap::{DashMap, mapref::entry::Entry},
    tokio::task::JoinHandle,
    tracing::{debug, info, warn},
};

/// Observable state of a channel's deletion timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// No timer exists for the channel.
    Idle,
    Scheduled,
    /// The deadline passed and the deletion is in progress.
    Fired,
    /// A pending timer was stopped before its deadline.
    Cancelled,
}

struct TimerSlot {
    generation: u64,
    state: TimerState,
    handle: JoinHandle<()>,
}

pub struct ChannelLifecycle {
    session: Arc<dyn Session>,
    timers: DashMap<String, TimerSlot>,
    next_generation: AtomicU64,
}

impl ChannelLifecycle {
    #[must_use]
    pub fn new(session: Arc<dyn Session>) -> Arc<Self> {
        Arc::new(Self {
            session,
            timers: DashMap::new(),
            next_generation: AtomicU64::new(1),
        })
    }

    /// Schedules deletion of `channel_id` after `delay`, replacing any timer
    /// already pending for it.
    pub fn set_delete_timer(self: &Arc<Self>, channel_id: &str, delay: Duration) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        match self.timers.entry(channel_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if slot.state == TimerState::Scheduled {
                    slot.handle.abort();
                }
                *slot = TimerSlot {
                    generation,
                    state: TimerState::Scheduled,
                    handle: self.spawn_timer(channel_id, generation, delay),
                };
                debug!(
                    channel_id,
                    delay_ms = delay.as_millis() as u64,
                    "channel delete timer reset"
                );
            },
            Entry::Vacant(vacant) => {
                vacant.insert(TimerSlot {
                    generation,
                    state: TimerState::Scheduled,
                    handle: self.spawn_timer(channel_id, generation, delay),
                });
                debug!(
                    channel_id,
                    delay_ms = delay.as_millis() as u64,
                    "channel delete timer set"
                );
            },
        }
    }

    /// Stops the pending timer for `channel_id`, keeping the channel alive.
    ///
    /// Returns the state that was observed. `Idle` and `Fired` mean there
    /// was nothing to stop; both are logged and otherwise harmless.
    pub fn cancel_delete_timer(&self, channel_id: &str) -> TimerState {
        let Entry::Occupied(occupied) = self.timers.entry(channel_id.to_string()) else {
            warn!(channel_id, "channel has no pending delete timer");
            return TimerState::Idle;
        };

        match occupied.get().state {
            TimerState::Scheduled => {
                let (_, slot) = occupied.remove_entry();
                slot.handle.abort();
                debug!(channel_id, "channel delete timer cancelled");
                TimerState::Cancelled
            },
            state => {
                warn!(channel_id, ?state, "delete timer already fired, channel may be gone");
                state
            },
        }
    }

    /// Current timer state for `channel_id`.
    #[must_use]
    pub fn state(&self, channel_id: &str) -> TimerState {
        self.timers
            .get(channel_id)
            .map_or(TimerState::Idle, |slot| slot.state)
    }

    /// Deletes `channel_id` right away, dropping any pending timer first.
    pub async fn delete_now(&self, channel_id: &str) {
        if let Some((_, slot)) = self
            .timers
            .remove_if(channel_id, |_, slot| slot.state == TimerState::Scheduled)
        {
            slot.handle.abort();
        }
        self.delete_channel(channel_id).await;
    }

    fn spawn_timer(
        self: &Arc<Self>,
        channel_id: &str,
        generation: u64,
        delay: Duration,
    ) -> JoinHandle<()> {
        let lifecycle = Arc::clone(self);
        let channel_id = channel_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            lifecycle.fire(&channel_id, generation).await;
        })
    }

    async fn fire(&self, channel_id: &str, generation: u64) {
        {
            let Some(mut slot) = self.timers.get_mut(channel_id) else {
                return;
            };
            if slot.generation != generation || slot.state != TimerState::Scheduled {
                return;
            }
            slot.state = TimerState::Fired;
        }

        self.delete_channel(channel_id).await;
        self.timers
            .remove_if(channel_id, |_, slot| slot.generation == generation);
    }

    async fn delete_channel(&self, channel_id: &str) {
        match self.session.delete_channel(channel_id).await {
            Ok(_) => info!(channel_id, "channel deleted"),
            Err(e) => warn!(channel_id, error = %e, "failed to delete channel"),
        }
    }
}
