//! Per-chat conversation flow: species → task → reminders.
//!
//! Every intent reads or writes at most one `reminder_users` row and answers
//! with the next prompt plus its reply menu.

use super::keyboards;
use super::routing::{classify, Intent};
use super::Gateway;
use nudge_core::{
    error::NudgeError,
    message::{IncomingMessage, Keyboard, OutgoingMessage},
};
use tracing::{error, info};

impl Gateway {
    /// Classify one inbound message and act on it.
    pub(super) async fn handle_message(&self, incoming: IncomingMessage) {
        let chat_id = incoming.chat_id;
        let intent = classify(&self.phrases, &incoming.text);
        if let Err(e) = self.apply(chat_id, intent).await {
            error!("{chat_id}: failed to handle message: {e}");
        }
    }

    pub(super) async fn apply(&self, chat_id: i64, intent: Intent) -> Result<(), NudgeError> {
        match intent {
            Intent::Restart => self.restart(chat_id).await,
            Intent::SetSpecies(species) => self.set_species(chat_id, &species).await,
            Intent::SetTask(task) => self.set_task(chat_id, &task).await,
            Intent::ChangeSpeciesOnly => {
                info!("{chat_id} wanted to change species");
                self.ask_species(chat_id).await
            }
            Intent::ChangeTaskOnly => {
                info!("{chat_id} wanted to change task");
                self.ask_task(chat_id).await
            }
            Intent::ChangeAll => self.change_all(chat_id).await,
            Intent::KeepCurrent => self.keep_current(chat_id).await,
            Intent::Stop => self.stop(chat_id).await,
        }
    }

    /// New chats are asked for a species; returning chats see their settings and the change menu.
    async fn restart(&self, chat_id: i64) -> Result<(), NudgeError> {
        match self.store.get_user(chat_id).await? {
            None => {
                info!("{chat_id} is new user and start conversation");
                self.ask_species(chat_id).await
            }
            Some(user) => {
                info!(
                    "{chat_id} is old user and start conversation (job running: {})",
                    self.scheduler.is_armed(chat_id)
                );
                let text = self.phrases.current_settings(&user.species, &user.task);
                self.reply(chat_id, text, keyboards::change_options(&self.phrases))
                    .await
            }
        }
    }

    /// A species for a chat without a row leads on to the task prompt.
    /// For a chat that already has one, only the species changes and reminders resume.
    async fn set_species(&self, chat_id: i64, species: &str) -> Result<(), NudgeError> {
        let existed = self.store.get_user(chat_id).await?.is_some();
        self.store.upsert_species(chat_id, species).await?;

        if existed {
            self.scheduler.arm(chat_id);
            info!("job for {chat_id} has been set after species change");
            self.confirm_armed(chat_id).await
        } else {
            info!("{chat_id} set species. Now user need to set task");
            self.ask_task(chat_id).await
        }
    }

    async fn set_task(&self, chat_id: i64, task: &str) -> Result<(), NudgeError> {
        self.store.upsert_task(chat_id, task).await?;
        self.scheduler.arm(chat_id);
        info!("job for {chat_id} has been set after task change");
        self.confirm_armed(chat_id).await
    }

    /// Forget everything about the chat and start over as if it were new.
    async fn change_all(&self, chat_id: i64) -> Result<(), NudgeError> {
        self.scheduler.cancel(chat_id);
        self.store.delete_user(chat_id).await?;
        info!("{chat_id} has started over with change everything");
        self.restart(chat_id).await
    }

    async fn keep_current(&self, chat_id: i64) -> Result<(), NudgeError> {
        if self.store.get_user(chat_id).await?.is_none() {
            info!("{chat_id} asked to keep settings it does not have");
            return self.ask_species(chat_id).await;
        }
        self.scheduler.arm(chat_id);
        info!("job for {chat_id} has been set with unchanged settings");
        self.confirm_armed(chat_id).await
    }

    async fn stop(&self, chat_id: i64) -> Result<(), NudgeError> {
        let had_job = self.scheduler.cancel(chat_id);
        if self.store.delete_ongoing(chat_id).await? {
            info!("{chat_id} was deleted from ongoing_processes");
        }
        info!("{chat_id} has stopped job by stop keyword (job was running: {had_job})");
        self.reply(
            chat_id,
            self.phrases.prompts.stopped.clone(),
            keyboards::restart(&self.phrases),
        )
        .await
    }

    async fn ask_species(&self, chat_id: i64) -> Result<(), NudgeError> {
        self.reply(
            chat_id,
            self.phrases.prompts.ask_species.clone(),
            keyboards::species(&self.phrases),
        )
        .await
    }

    async fn ask_task(&self, chat_id: i64) -> Result<(), NudgeError> {
        self.reply(chat_id, self.phrases.prompts.ask_task.clone(), Keyboard::Remove)
            .await
    }

    async fn confirm_armed(&self, chat_id: i64) -> Result<(), NudgeError> {
        self.reply(chat_id, self.phrases.prompts.armed.clone(), Keyboard::Remove)
            .await
    }

    async fn reply(&self, chat_id: i64, text: String, keyboard: Keyboard) -> Result<(), NudgeError> {
        self.channel
            .send(OutgoingMessage::new(chat_id, text).with_keyboard(keyboard))
            .await
    }
}
