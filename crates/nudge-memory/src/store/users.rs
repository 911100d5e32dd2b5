//! Per-chat species and task.

use super::Store;
use nudge_core::error::NudgeError;
use tracing::info;

/// Task stored for a chat that has not described one yet.
pub const DEFAULT_TASK: &str = "no task assigned";

/// One chat's persisted conversation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserState {
    pub chat_id: i64,
    pub species: String,
    pub task: String,
}

impl Store {
    /// Fetch the state for a chat, if it has one.
    pub async fn get_user(&self, chat_id: i64) -> Result<Option<UserState>, NudgeError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT species, task FROM reminder_users WHERE chat_id = ?")
                .bind(chat_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| NudgeError::Memory(format!("get user failed: {e}")))?;

        Ok(row.map(|(species, task)| UserState {
            chat_id,
            species,
            task,
        }))
    }

    /// Set the species, creating the row with the default task if needed.
    pub async fn upsert_species(&self, chat_id: i64, species: &str) -> Result<(), NudgeError> {
        sqlx::query(
            "INSERT INTO reminder_users (chat_id, species) VALUES (?, ?) \
             ON CONFLICT(chat_id) DO UPDATE SET \
                species = excluded.species, updated_at = datetime('now')",
        )
        .bind(chat_id)
        .bind(species)
        .execute(&self.pool)
        .await
        .map_err(|e| NudgeError::Memory(format!("upsert species failed: {e}")))?;

        info!("{chat_id} has updated species to {species}");
        Ok(())
    }

    /// Set the task, creating the row with the default species if needed.
    pub async fn upsert_task(&self, chat_id: i64, task: &str) -> Result<(), NudgeError> {
        sqlx::query(
            "INSERT INTO reminder_users (chat_id, task) VALUES (?, ?) \
             ON CONFLICT(chat_id) DO UPDATE SET \
                task = excluded.task, updated_at = datetime('now')",
        )
        .bind(chat_id)
        .bind(task)
        .execute(&self.pool)
        .await
        .map_err(|e| NudgeError::Memory(format!("upsert task failed: {e}")))?;

        info!("{chat_id} has updated task");
        Ok(())
    }

    /// Delete a chat's state. Returns `true` if a row was removed.
    pub async fn delete_user(&self, chat_id: i64) -> Result<bool, NudgeError> {
        let result = sqlx::query("DELETE FROM reminder_users WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(|e| NudgeError::Memory(format!("delete user failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}
