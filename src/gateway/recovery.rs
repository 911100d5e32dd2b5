//! Restart recovery: checkpoint live timers at shutdown, re-arm them at startup.
//!
//! The `ongoing_processes` markers are a best-effort hint. A crash between a
//! reminder firing and the checkpoint can lose or repeat one round.

use super::Gateway;
use tracing::{info, warn};

impl Gateway {
    /// Re-arm timers for chats that had one when the process last stopped.
    ///
    /// Markers are removed once handled. A marker whose chat no longer has
    /// stored state is dropped without arming. Returns the number of timers armed.
    pub(super) async fn restore_ongoing(&self) -> usize {
        let chat_ids = match self.store.list_ongoing().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("failed to read ongoing processes, no timers restored: {e}");
                return 0;
            }
        };

        if chat_ids.is_empty() {
            info!("There are no ongoing processes for now");
            return 0;
        }

        let mut armed = 0;
        for chat_id in chat_ids {
            match self.store.get_user(chat_id).await {
                Ok(Some(_)) => {
                    self.scheduler.arm(chat_id);
                    armed += 1;
                    info!("job for {chat_id} has been restored from ongoing_processes");
                }
                Ok(None) => {
                    info!("ongoing marker for {chat_id} has no stored state, discarding it");
                }
                Err(e) => {
                    warn!("failed to restore job for {chat_id}, keeping its marker: {e}");
                    continue;
                }
            }
            if let Err(e) = self.store.delete_ongoing(chat_id).await {
                warn!("failed to clear ongoing marker for {chat_id}: {e}");
            }
        }
        armed
    }

    /// Record every live timer as an ongoing marker. Returns how many were new.
    pub(super) async fn checkpoint_timers(&self) -> u64 {
        let live = self.scheduler.live_chats();
        if live.is_empty() {
            info!("No jobs were inserted to ongoing_processes because there are no current jobs");
            return 0;
        }

        match self.store.insert_ongoing(&live).await {
            Ok(inserted) => {
                info!(
                    "checkpointed {} live jobs ({inserted} new markers)",
                    live.len()
                );
                inserted
            }
            Err(e) => {
                warn!("failed to checkpoint live jobs: {e}");
                0
            }
        }
    }
}
