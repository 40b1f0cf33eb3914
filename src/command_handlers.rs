//! Command handlers module
//!
//! The work behind each CLI subcommand. `main.rs` only parses arguments and
//! prints what these return.

use crate::calendar::export::success_notice;
use crate::error::{AppError, AppResult};
use crate::models::{CategoryFilter, Notice, SyncNotice, DEFAULT_CATEGORIES};
use crate::rsvp::RsvpOutcome;
use crate::utils::summarize_event;
use crate::EventListing;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How long a one-shot command waits for the first snapshot.
pub const FIRST_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct CommandHandlers {
    app: Arc<EventListing>,
}

impl CommandHandlers {
    pub fn new(app: Arc<EventListing>) -> Self {
        Self { app }
    }

    /// Start syncing and wait for the list to leave the loading state.
    pub async fn load(&self, timeout: Duration) -> AppResult<()> {
        self.app.activate()?;
        tokio::time::timeout(timeout, self.app.core().wait_until_ready())
            .await
            .map_err(|_| AppError::subscription("Timed out waiting for the first snapshot"))??;

        if let Some(message) = self.app.core().last_error() {
            return Err(AppError::subscription(message));
        }
        Ok(())
    }

    /// One line per event passing `filter`.
    pub fn list_lines(&self, filter: &CategoryFilter) -> Vec<String> {
        let events = self.app.core().filtered(filter);
        info!("Listing {} events for '{}'", events.len(), filter.as_str());
        events.iter().map(summarize_event).collect()
    }

    /// The fixed category choices, then any other category the list holds.
    pub fn category_lines(&self) -> Vec<String> {
        let mut choices: Vec<String> = DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect();
        for category in self.app.core().categories() {
            if !choices.contains(&category) {
                choices.push(category);
            }
        }
        choices
    }

    pub async fn rsvp(&self, id: &str) -> AppResult<Notice> {
        match self.app.rsvp().toggle_rsvp(id).await? {
            RsvpOutcome::NotFound { id } => Err(AppError::invalid_input(format!("No event with id '{}'", id))),
            outcome => Ok(outcome
                .notice()
                .unwrap_or_else(|| Notice::new("RSVP Status", "RSVP updated."))),
        }
    }

    pub async fn export(&self, id: &str) -> AppResult<Notice> {
        let receipt = self.app.export_event(id).await?;
        info!(
            "Exported '{}' to calendar '{}' ({} - {})",
            id, receipt.calendar_id, receipt.start, receipt.end
        );
        Ok(success_notice())
    }

    /// Print the filtered list after every snapshot until `shutdown` fires.
    pub async fn watch<F>(
        &self,
        filter: &CategoryFilter,
        mut notices: mpsc::UnboundedReceiver<SyncNotice>,
        shutdown: CancellationToken,
        mut emit: F,
    ) -> AppResult<()>
    where
        F: FnMut(String),
    {
        self.app.activate()?;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Watch stopped");
                    break;
                }
                notice = notices.recv() => match notice {
                    Some(SyncNotice::SnapshotApplied { .. }) => {
                        emit(format!("--- {} ---", filter.as_str()));
                        for line in self.list_lines(filter) {
                            emit(line);
                        }
                    }
                    Some(SyncNotice::Error(message)) => {
                        warn!("Sync error while watching: {}", message);
                        let notice = AppError::subscription(message).notice();
                        emit(notice.to_string());
                    }
                    None => break,
                },
            }
        }

        self.app.close();
        Ok(())
    }
}
