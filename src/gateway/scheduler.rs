//! Reminder timers, one self-rescheduling job per chat.
//!
//! Each armed chat owns a spawned task that sleeps for a random delay,
//! sends one reminder, draws a fresh delay, and repeats. The schedule is
//! memoryless: every delay is drawn independently of the previous one.

use super::keyboards;
use nudge_core::{
    config::SchedulerConfig, message::OutgoingMessage, phrases::Phrasebook, traits::Channel,
};
use nudge_memory::Store;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Bounds for the random delay between reminders, in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    min_minutes: u64,
    max_minutes: u64,
    minute: Duration,
}

impl DelayRange {
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            max_minutes,
            minute: Duration::from_secs(60),
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.min_interval_minutes, config.max_interval_minutes)
    }

    /// Same bounds with a shorter "minute", so tests can watch timers fire.
    #[cfg(test)]
    pub(super) fn with_minute(mut self, minute: Duration) -> Self {
        self.minute = minute;
        self
    }

    /// Draw a delay uniformly over the whole minutes in range.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let minutes = rng.gen_range(self.min_minutes..=self.max_minutes);
        self.minute * minutes as u32
    }
}

/// What a single reminder firing did to its timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Reminder sent; the timer re-arms.
    Delivered,
    /// Storage or transport hiccup; the timer re-arms and tries again next time.
    Retry,
    /// The chat is gone (blocked the bot, or its state was deleted); the timer ends.
    Cancelled,
}

struct Timer {
    generation: u64,
    next_delay: Duration,
    handle: JoinHandle<()>,
}

struct SchedulerInner {
    store: Store,
    channel: Arc<dyn Channel>,
    phrases: Arc<Phrasebook>,
    delays: DelayRange,
    timers: Mutex<HashMap<i64, Timer>>,
    generation: AtomicU64,
}

/// Owns every chat's reminder timer. Cheap to clone.
#[derive(Clone)]
pub struct ReminderScheduler {
    inner: Arc<SchedulerInner>,
}

impl ReminderScheduler {
    pub fn new(
        store: Store,
        channel: Arc<dyn Channel>,
        phrases: Arc<Phrasebook>,
        delays: DelayRange,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                channel,
                phrases,
                delays,
                timers: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Start (or restart) the reminder timer for a chat.
    ///
    /// Any existing timer for the chat is cancelled first. Returns the
    /// delay until the first reminder.
    pub fn arm(&self, chat_id: i64) -> Duration {
        let delay = self.inner.delays.pick(&mut rand::thread_rng());
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);

        let mut timers = self.inner.lock_timers();
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            inner.run_timer(chat_id, generation, delay).await;
        });
        let previous = timers.insert(
            chat_id,
            Timer {
                generation,
                next_delay: delay,
                handle,
            },
        );
        drop(timers);

        if let Some(old) = previous {
            old.handle.abort();
        }
        info!("job for {chat_id} has been set, first reminder in {}s", delay.as_secs());
        delay
    }

    /// Cancel a chat's timer. Returns `true` if one was live.
    pub fn cancel(&self, chat_id: i64) -> bool {
        let removed = self.inner.lock_timers().remove(&chat_id);
        match removed {
            Some(timer) => {
                let live = !timer.handle.is_finished();
                timer.handle.abort();
                live
            }
            None => false,
        }
    }

    pub fn is_armed(&self, chat_id: i64) -> bool {
        self.inner
            .lock_timers()
            .get(&chat_id)
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Delay the chat's timer is currently waiting out.
    #[cfg(test)]
    pub fn next_delay(&self, chat_id: i64) -> Option<Duration> {
        self.inner
            .lock_timers()
            .get(&chat_id)
            .filter(|t| !t.handle.is_finished())
            .map(|t| t.next_delay)
    }

    /// Chats with a live timer, in ascending order.
    pub fn live_chats(&self) -> Vec<i64> {
        let mut chats: Vec<i64> = self
            .inner
            .lock_timers()
            .iter()
            .filter(|(_, t)| !t.handle.is_finished())
            .map(|(id, _)| *id)
            .collect();
        chats.sort_unstable();
        chats
    }

    /// Cancel every timer. Used at shutdown, after the live set has been checkpointed.
    pub fn drain(&self) -> usize {
        let timers: Vec<Timer> = self.inner.lock_timers().drain().map(|(_, t)| t).collect();
        for timer in &timers {
            timer.handle.abort();
        }
        timers.len()
    }

    /// Fire one reminder for a chat right now, without touching its timer.
    #[cfg(test)]
    pub(super) async fn tick(&self, chat_id: i64) -> TickOutcome {
        self.inner.tick(chat_id).await
    }
}

impl SchedulerInner {
    fn lock_timers(&self) -> MutexGuard<'_, HashMap<i64, Timer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_timer(self: Arc<Self>, chat_id: i64, generation: u64, first_delay: Duration) {
        let mut delay = first_delay;
        loop {
            tokio::time::sleep(delay).await;
            match self.tick(chat_id).await {
                TickOutcome::Delivered | TickOutcome::Retry => {
                    delay = self.delays.pick(&mut rand::thread_rng());
                    self.set_next_delay(chat_id, generation, delay);
                }
                TickOutcome::Cancelled => {
                    self.forget(chat_id, generation);
                    return;
                }
            }
        }
    }

    async fn tick(&self, chat_id: i64) -> TickOutcome {
        let user = match self.store.get_user(chat_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                info!("no stored state for {chat_id}, dropping its reminder job");
                return TickOutcome::Cancelled;
            }
            Err(e) => {
                warn!("reminder for {chat_id} skipped, failed to load state: {e}");
                return TickOutcome::Retry;
            }
        };

        let text = self
            .phrases
            .compose_reminder(&user.species, &user.task, &mut rand::thread_rng());
        let message =
            OutgoingMessage::new(chat_id, text).with_keyboard(keyboards::stop(&self.phrases));

        match self.channel.send(message).await {
            Ok(()) => {
                info!("for {chat_id} was sent a reminder");
                TickOutcome::Delivered
            }
            Err(e) if e.is_unreachable() => {
                info!("job for {chat_id} was stopped because user has blocked bot: {e}");
                TickOutcome::Cancelled
            }
            Err(e) => {
                warn!("reminder for {chat_id} failed to send: {e}");
                TickOutcome::Retry
            }
        }
    }

    fn set_next_delay(&self, chat_id: i64, generation: u64, delay: Duration) {
        if let Some(timer) = self.lock_timers().get_mut(&chat_id) {
            if timer.generation == generation {
                timer.next_delay = delay;
            }
        }
    }

    /// Drop the map entry for a timer that ended by itself, unless it was already replaced.
    fn forget(&self, chat_id: i64, generation: u64) {
        let mut timers = self.lock_timers();
        if timers.get(&chat_id).is_some_and(|t| t.generation == generation) {
            timers.remove(&chat_id);
        }
    }
}
