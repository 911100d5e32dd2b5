//! Restart-recovery markers: chats that had a live reminder timer at shutdown.

use super::Store;
use nudge_core::error::NudgeError;
use tracing::info;

impl Store {
    /// Record markers for `chat_ids`, skipping any already present.
    ///
    /// Returns how many new markers were written.
    pub async fn insert_ongoing(&self, chat_ids: &[i64]) -> Result<u64, NudgeError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| NudgeError::Memory(format!("begin ongoing insert failed: {e}")))?;

        let mut inserted = 0;
        for chat_id in chat_ids {
            let result = sqlx::query("INSERT OR IGNORE INTO ongoing_processes (chat_id) VALUES (?)")
                .bind(*chat_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| NudgeError::Memory(format!("insert ongoing failed: {e}")))?;
            if result.rows_affected() > 0 {
                info!("{chat_id} was inserted to ongoing_processes");
                inserted += result.rows_affected();
            }
        }

        tx.commit()
            .await
            .map_err(|e| NudgeError::Memory(format!("commit ongoing insert failed: {e}")))?;

        Ok(inserted)
    }

    /// All chats with a marker, in ascending order.
    pub async fn list_ongoing(&self) -> Result<Vec<i64>, NudgeError> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT chat_id FROM ongoing_processes ORDER BY chat_id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| NudgeError::Memory(format!("list ongoing failed: {e}")))?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Remove a chat's marker. Returns `true` if one existed.
    pub async fn delete_ongoing(&self, chat_id: i64) -> Result<bool, NudgeError> {
        let result = sqlx::query("DELETE FROM ongoing_processes WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(|e| NudgeError::Memory(format!("delete ongoing failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}
