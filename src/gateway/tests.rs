use super::routing::Intent;
use super::scheduler::{ReminderScheduler, TickOutcome};
use super::*;
use async_trait::async_trait;
use nudge_core::{
    config::MemoryConfig,
    error::NudgeError,
    message::{Keyboard, OutgoingMessage},
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Create a temporary on-disk store for testing (unique per call).
async fn test_store() -> Store {
    let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir =
        std::env::temp_dir().join(format!("__nudge_gw_test_{}_{}__", std::process::id(), id));
    let _ = std::fs::create_dir_all(&dir);
    let db_path = dir.join("test.db").to_string_lossy().to_string();
    let _ = std::fs::remove_file(&db_path);
    Store::new(&MemoryConfig { db_path }).await.unwrap()
}

/// Records every outbound message instead of talking to a network.
#[derive(Default)]
struct FakeChannel {
    sent: std::sync::Mutex<Vec<OutgoingMessage>>,
    blocked: std::sync::Mutex<HashSet<i64>>,
    failing: AtomicBool,
}

impl FakeChannel {
    fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    fn last(&self) -> OutgoingMessage {
        self.sent().pop().expect("nothing was sent")
    }

    fn block(&self, chat_id: i64) {
        self.blocked.lock().unwrap().insert(chat_id);
    }
}

#[async_trait]
impl Channel for FakeChannel {
    fn name(&self) -> &str {
        "fake"
    }

    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<IncomingMessage>, NudgeError> {
        let (_tx, rx) = tokio::sync::mpsc::channel(1);
        Ok(rx)
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), NudgeError> {
        if self.blocked.lock().unwrap().contains(&message.chat_id) {
            return Err(NudgeError::Unreachable("Forbidden: bot was blocked by the user".into()));
        }
        if self.failing.load(Ordering::Relaxed) {
            return Err(NudgeError::Channel("Too Many Requests".into()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn stop(&self) -> Result<(), NudgeError> {
        Ok(())
    }
}

struct Harness {
    gateway: Arc<Gateway>,
    channel: Arc<FakeChannel>,
    store: Store,
}

impl Harness {
    async fn new() -> Self {
        Self::with_delays(DelayRange::new(1, 15)).await
    }

    async fn with_delays(delays: DelayRange) -> Self {
        Self::on_store(test_store().await, delays)
    }

    fn on_store(store: Store, delays: DelayRange) -> Self {
        let channel = Arc::new(FakeChannel::default());
        let phrases = Arc::new(Phrasebook::bundled("en").unwrap());
        let gateway = Arc::new(Gateway::new(
            channel.clone(),
            store.clone(),
            phrases,
            delays,
        ));
        Self {
            gateway,
            channel,
            store,
        }
    }

    async fn say(&self, chat_id: i64, text: &str) {
        self.gateway.handle_message(incoming(chat_id, text)).await;
    }

    fn scheduler(&self) -> &ReminderScheduler {
        &self.gateway.scheduler
    }

    fn phrases(&self) -> &Phrasebook {
        &self.gateway.phrases
    }
}

fn incoming(chat_id: i64, text: &str) -> IncomingMessage {
    IncomingMessage {
        channel: "fake".into(),
        chat_id,
        sender_id: chat_id,
        text: text.into(),
        timestamp: chrono::Utc::now(),
    }
}

/// Poll until `cond` holds or a second has passed.
async fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

// --- conversation ---

#[tokio::test]
async fn test_new_user_species_then_task_arms_timer() {
    let h = Harness::new().await;

    h.say(555, "cat").await;
    let reply = h.channel.last();
    assert_eq!(reply.text, h.phrases().prompts.ask_task);
    assert_eq!(reply.keyboard, Some(Keyboard::Remove));
    assert!(!h.scheduler().is_armed(555));

    let user = h.store.get_user(555).await.unwrap().unwrap();
    assert_eq!(user.species, "cat");

    h.say(555, "wash dishes").await;
    let reply = h.channel.last();
    assert_eq!(reply.text, h.phrases().prompts.armed);
    assert!(h.scheduler().is_armed(555));

    let user = h.store.get_user(555).await.unwrap().unwrap();
    assert_eq!(user.species, "cat");
    assert_eq!(user.task, "wash dishes");
}

#[tokio::test]
async fn test_species_change_for_existing_user_arms_immediately() {
    let h = Harness::new().await;
    h.store.upsert_species(555, "cat").await.unwrap();
    h.store.upsert_task(555, "wash dishes").await.unwrap();

    h.say(555, "sloth").await;

    assert_eq!(h.channel.last().text, h.phrases().prompts.armed);
    assert!(h.scheduler().is_armed(555));
    let user = h.store.get_user(555).await.unwrap().unwrap();
    assert_eq!(user.species, "sloth");
    assert_eq!(user.task, "wash dishes");
}

#[tokio::test]
async fn test_task_without_species_uses_default() {
    let h = Harness::new().await;

    h.say(555, "  water the plants  ").await;

    let user = h.store.get_user(555).await.unwrap().unwrap();
    assert_eq!(user.species, nudge_core::phrases::DEFAULT_SPECIES);
    assert_eq!(user.task, "water the plants");
    assert!(h.scheduler().is_armed(555));
}

#[tokio::test]
async fn test_restart_new_user_asks_species() {
    let h = Harness::new().await;

    h.say(555, &h.phrases().keywords.restart.clone()).await;

    let reply = h.channel.last();
    assert_eq!(reply.text, h.phrases().prompts.ask_species);
    let keyboard = reply.keyboard.unwrap();
    assert_eq!(keyboard.labels(), vec!["human", "cat", "sloth"]);
    assert!(h.store.get_user(555).await.unwrap().is_none());
}

#[tokio::test]
async fn test_start_command_is_restart() {
    let h = Harness::new().await;
    h.store.upsert_species(555, "cat").await.unwrap();
    h.store.upsert_task(555, "wash dishes").await.unwrap();

    h.say(555, "/start").await;

    let reply = h.channel.last();
    assert!(reply.text.contains("cat"));
    assert!(reply.text.contains("wash dishes"));
    let labels = reply.keyboard.unwrap().labels().len();
    assert_eq!(labels, 4);
}

#[tokio::test]
async fn test_restart_existing_user_keeps_timer() {
    let h = Harness::new().await;
    h.say(555, "cat").await;
    h.say(555, "wash dishes").await;

    h.say(555, &h.phrases().keywords.restart.clone()).await;

    let reply = h.channel.last();
    assert_eq!(
        reply.text,
        h.phrases().current_settings("cat", "wash dishes")
    );
    let keyboard = reply.keyboard.unwrap();
    assert_eq!(keyboard.labels(), h.phrases().change_options().to_vec());
    assert!(h.scheduler().is_armed(555));
}

#[tokio::test]
async fn test_change_species_and_task_only_prompt() {
    let h = Harness::new().await;
    h.say(555, "cat").await;
    h.say(555, "wash dishes").await;

    h.say(555, &h.phrases().keywords.change_species.clone()).await;
    assert_eq!(h.channel.last().text, h.phrases().prompts.ask_species);

    h.say(555, &h.phrases().keywords.change_task.clone()).await;
    assert_eq!(h.channel.last().text, h.phrases().prompts.ask_task);

    // Asking to change touches nothing until the new value arrives.
    let user = h.store.get_user(555).await.unwrap().unwrap();
    assert_eq!(user.species, "cat");
    assert_eq!(user.task, "wash dishes");
    assert!(h.scheduler().is_armed(555));

    h.say(555, "feed the cat").await;
    let user = h.store.get_user(555).await.unwrap().unwrap();
    assert_eq!(user.task, "feed the cat");
}

#[tokio::test]
async fn test_change_all_forgets_user() {
    let h = Harness::new().await;
    h.say(555, "cat").await;
    h.say(555, "wash dishes").await;

    h.say(555, &h.phrases().keywords.change_all.clone()).await;

    assert!(h.store.get_user(555).await.unwrap().is_none());
    assert_eq!(h.channel.last().text, h.phrases().prompts.ask_species);
    assert!(!h.scheduler().is_armed(555));

    // Picking a species again goes through the new-user path.
    h.say(555, "human").await;
    assert_eq!(h.channel.last().text, h.phrases().prompts.ask_task);
    assert!(!h.scheduler().is_armed(555));
}

#[tokio::test]
async fn test_no_reminders_while_awaiting_task_after_change_all() {
    let delays = DelayRange::new(1, 2).with_minute(Duration::from_millis(10));
    let h = Harness::with_delays(delays).await;
    h.say(555, "cat").await;
    h.say(555, "wash dishes").await;

    h.say(555, &h.phrases().keywords.change_all.clone()).await;
    h.say(555, "human").await;
    let before = h.channel.sent().len();

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!h.scheduler().is_armed(555));
    assert_eq!(h.channel.sent().len(), before, "reminder sent while awaiting task");
    assert_eq!(h.gateway.checkpoint_timers().await, 0);
    assert!(h.store.list_ongoing().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_keep_current_arms_existing_user() {
    let h = Harness::new().await;
    h.store.upsert_species(555, "sloth").await.unwrap();
    h.store.upsert_task(555, "read a book").await.unwrap();

    let before = h.store.get_user(555).await.unwrap().unwrap();

    h.say(555, &h.phrases().keywords.keep_current.clone()).await;

    assert_eq!(h.channel.last().text, h.phrases().prompts.armed);
    assert!(h.scheduler().is_armed(555));
    let after = h.store.get_user(555).await.unwrap().unwrap();
    assert_eq!(after, before);
    assert_eq!(after.species, "sloth");
    assert_eq!(after.task, "read a book");
}

#[tokio::test]
async fn test_keep_current_without_state_asks_species() {
    let h = Harness::new().await;

    h.say(555, &h.phrases().keywords.keep_current.clone()).await;

    assert_eq!(h.channel.last().text, h.phrases().prompts.ask_species);
    assert!(!h.scheduler().is_armed(555));
}

#[tokio::test]
async fn test_stop_cancels_timer_and_marker() {
    let h = Harness::new().await;
    h.say(555, "cat").await;
    h.say(555, "wash dishes").await;
    h.store.insert_ongoing(&[555]).await.unwrap();

    h.say(555, &h.phrases().keywords.stop.clone()).await;

    assert!(!h.scheduler().is_armed(555));
    assert!(h.store.list_ongoing().await.unwrap().is_empty());
    let reply = h.channel.last();
    assert_eq!(reply.text, h.phrases().prompts.stopped);
    assert_eq!(
        reply.keyboard,
        Some(Keyboard::persistent(h.phrases().keywords.restart.clone()))
    );

    // Stored settings survive a stop.
    assert!(h.store.get_user(555).await.unwrap().is_some());
}

#[tokio::test]
async fn test_stop_without_timer_still_replies() {
    let h = Harness::new().await;

    h.gateway.apply(555, Intent::Stop).await.unwrap();

    assert_eq!(h.channel.last().text, h.phrases().prompts.stopped);
}

#[tokio::test]
async fn test_dispatch_keeps_arrival_order_per_chat() {
    let h = Harness::new().await;

    // Both arrive before the first is handled; the second must wait its turn.
    h.gateway.dispatch_message(incoming(555, "cat")).await;
    h.gateway.dispatch_message(incoming(555, "wash dishes")).await;
    h.gateway.dispatch_message(incoming(777, "human")).await;

    let gateway = h.gateway.clone();
    assert!(
        wait_for(|| gateway
            .active_chats
            .try_lock()
            .is_ok_and(|active| active.is_empty()))
        .await
    );

    let replies: Vec<String> = h
        .channel
        .sent()
        .into_iter()
        .filter(|m| m.chat_id == 555)
        .map(|m| m.text)
        .collect();
    assert_eq!(
        replies,
        vec![
            h.phrases().prompts.ask_task.clone(),
            h.phrases().prompts.armed.clone()
        ]
    );
    let user = h.store.get_user(555).await.unwrap().unwrap();
    assert_eq!(user.species, "cat");
    assert_eq!(user.task, "wash dishes");
    assert!(h.store.get_user(777).await.unwrap().is_some());
}

#[tokio::test]
async fn test_chats_are_independent() {
    let h = Harness::new().await;
    h.say(555, "cat").await;
    h.say(555, "wash dishes").await;
    h.say(777, "human").await;

    assert!(h.scheduler().is_armed(555));
    assert!(!h.scheduler().is_armed(777));
    assert_eq!(h.scheduler().live_chats(), vec![555]);
}

// --- scheduler ---

#[test]
fn test_delay_range_covers_every_minute() {
    let delays = DelayRange::new(1, 15);
    let mut rng = rand::thread_rng();
    let mut seen = HashSet::new();
    for _ in 0..2_000 {
        let d = delays.pick(&mut rng);
        assert_eq!(d.as_secs() % 60, 0);
        let minutes = d.as_secs() / 60;
        assert!((1..=15).contains(&minutes), "out of range: {minutes}");
        seen.insert(minutes);
    }
    assert_eq!(seen.len(), 15);
}

#[test]
fn test_delay_range_single_value() {
    let delays = DelayRange::new(5, 5);
    let mut rng = rand::thread_rng();
    assert_eq!(delays.pick(&mut rng), Duration::from_secs(300));
}

#[tokio::test]
async fn test_arm_twice_keeps_one_timer() {
    let h = Harness::new().await;

    let first = h.scheduler().arm(555);
    let second = h.scheduler().arm(555);

    assert_eq!(h.scheduler().live_chats(), vec![555]);
    assert_eq!(h.scheduler().next_delay(555), Some(second));
    for d in [first, second] {
        assert!(d >= Duration::from_secs(60) && d <= Duration::from_secs(900));
        assert_eq!(d.as_secs() % 60, 0);
    }
}

#[tokio::test]
async fn test_cancel_reports_live_timer() {
    let h = Harness::new().await;
    h.scheduler().arm(555);

    assert!(h.scheduler().cancel(555));
    assert!(!h.scheduler().cancel(555));
    assert_eq!(h.scheduler().next_delay(555), None);
}

#[tokio::test]
async fn test_tick_delivers_reminder_with_stop_button() {
    let h = Harness::new().await;
    h.store.upsert_species(555, "cat").await.unwrap();
    h.store.upsert_task(555, "wash dishes").await.unwrap();

    assert_eq!(h.scheduler().tick(555).await, TickOutcome::Delivered);

    let reminder = h.channel.last();
    assert!(reminder.text.contains("wash dishes"));
    let known: Vec<String> = h
        .phrases()
        .reminder_pool("cat")
        .iter()
        .map(|t| t.render("wash dishes"))
        .collect();
    assert!(known.contains(&reminder.text), "unexpected: {}", reminder.text);
    assert_eq!(
        reminder.keyboard.unwrap().labels(),
        vec![h.phrases().keywords.stop.as_str()]
    );
}

#[tokio::test]
async fn test_tick_without_user_cancels() {
    let h = Harness::new().await;
    assert_eq!(h.scheduler().tick(555).await, TickOutcome::Cancelled);
    assert!(h.channel.sent().is_empty());
}

#[tokio::test]
async fn test_tick_blocked_chat_cancels() {
    let h = Harness::new().await;
    h.store.upsert_task(555, "wash dishes").await.unwrap();
    h.channel.block(555);

    assert_eq!(h.scheduler().tick(555).await, TickOutcome::Cancelled);
}

#[tokio::test]
async fn test_tick_transient_failure_retries() {
    let h = Harness::new().await;
    h.store.upsert_task(555, "wash dishes").await.unwrap();
    h.channel.failing.store(true, Ordering::Relaxed);

    assert_eq!(h.scheduler().tick(555).await, TickOutcome::Retry);
}

#[tokio::test]
async fn test_timer_fires_and_rearms() {
    let delays = DelayRange::new(1, 2).with_minute(Duration::from_millis(10));
    let h = Harness::with_delays(delays).await;
    h.say(555, "cat").await;
    h.say(555, "wash dishes").await;
    let before = h.channel.sent().len();

    let channel = h.channel.clone();
    assert!(wait_for(|| channel.sent().len() >= before + 2).await);
    assert!(h.scheduler().is_armed(555));
    assert!(h.channel.last().text.contains("wash dishes"));
}

#[tokio::test]
async fn test_timer_ends_when_chat_blocks_bot() {
    let delays = DelayRange::new(1, 2).with_minute(Duration::from_millis(10));
    let h = Harness::with_delays(delays).await;
    h.say(555, "cat").await;
    h.say(555, "wash dishes").await;
    h.channel.block(555);

    let scheduler = h.scheduler().clone();
    assert!(wait_for(|| !scheduler.is_armed(555)).await);
    assert!(h.scheduler().live_chats().is_empty());
    // State stays; only the timer is gone.
    assert!(h.store.get_user(555).await.unwrap().is_some());
}

#[tokio::test]
async fn test_timer_ends_after_change_all() {
    let delays = DelayRange::new(1, 2).with_minute(Duration::from_millis(10));
    let h = Harness::with_delays(delays).await;
    h.say(555, "cat").await;
    h.say(555, "wash dishes").await;

    h.say(555, &h.phrases().keywords.change_all.clone()).await;

    let scheduler = h.scheduler().clone();
    assert!(wait_for(|| !scheduler.is_armed(555)).await);
}

#[tokio::test]
async fn test_drain_stops_everything() {
    let h = Harness::new().await;
    h.scheduler().arm(555);
    h.scheduler().arm(777);

    assert_eq!(h.scheduler().drain(), 2);
    assert!(h.scheduler().live_chats().is_empty());
}

// --- recovery ---

#[tokio::test]
async fn test_checkpoint_records_live_timers() {
    let h = Harness::new().await;
    h.scheduler().arm(555);
    h.scheduler().arm(777);
    h.store.insert_ongoing(&[555]).await.unwrap();

    let inserted = h.gateway.checkpoint_timers().await;

    assert_eq!(inserted, 1);
    assert_eq!(h.store.list_ongoing().await.unwrap(), vec![555, 777]);
}

#[tokio::test]
async fn test_checkpoint_with_no_timers() {
    let h = Harness::new().await;
    assert_eq!(h.gateway.checkpoint_timers().await, 0);
    assert!(h.store.list_ongoing().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_rearms_and_clears_markers() {
    let store = test_store().await;
    for chat_id in [555, 777] {
        store.upsert_species(chat_id, "cat").await.unwrap();
        store.upsert_task(chat_id, "wash dishes").await.unwrap();
    }
    store.insert_ongoing(&[555, 777]).await.unwrap();

    let h = Harness::on_store(store, DelayRange::new(1, 15));
    let restored = h.gateway.restore_ongoing().await;

    assert_eq!(restored, 2);
    assert_eq!(h.scheduler().live_chats(), vec![555, 777]);
    assert!(h.store.list_ongoing().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_discards_orphan_marker() {
    let store = test_store().await;
    store.upsert_task(555, "wash dishes").await.unwrap();
    store.insert_ongoing(&[555, 999]).await.unwrap();

    let h = Harness::on_store(store, DelayRange::new(1, 15));
    let restored = h.gateway.restore_ongoing().await;

    assert_eq!(restored, 1);
    assert!(!h.scheduler().is_armed(999));
    assert!(h.store.list_ongoing().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_shutdown_then_restore_round_trip() {
    let h = Harness::new().await;
    h.say(555, "cat").await;
    h.say(555, "wash dishes").await;

    h.gateway.shutdown().await;
    assert!(h.scheduler().live_chats().is_empty());
    assert_eq!(h.store.list_ongoing().await.unwrap(), vec![555]);

    let next = Harness::on_store(h.store.clone(), DelayRange::new(1, 15));
    assert_eq!(next.gateway.restore_ongoing().await, 1);
    assert!(next.scheduler().is_armed(555));
}
