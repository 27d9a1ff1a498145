use crate::models::{AppData, FuturePlan};
use crate::storage::persist_data;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Trailing-edge delay for the debounced writer: rapid successive edits
/// collapse into a single write.
pub const SAVE_DEBOUNCE: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub data: Arc<Mutex<AppData>>,
    /// Hypothetical planner marks; in-memory only, never persisted.
    pub plan: Arc<Mutex<FuturePlan>>,
    pending_save: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AppState {
    pub fn new(data_path: PathBuf, data: AppData) -> Self {
        Self {
            data_path,
            data: Arc::new(Mutex::new(data)),
            plan: Arc::new(Mutex::new(FuturePlan::new())),
            pending_save: Arc::new(Mutex::new(None)),
        }
    }

    /// Schedule a debounced write of the current data. A newer call
    /// supersedes any write still waiting out its delay. Write failures are
    /// logged and swallowed; the in-memory state stays authoritative and the
    /// next edit schedules a fresh attempt.
    pub async fn schedule_save(&self) {
        let state = self.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(SAVE_DEBOUNCE).await;
            let snapshot = state.data.lock().await.clone();
            match persist_data(&state.data_path, &snapshot).await {
                Ok(()) => debug!(path = %state.data_path.display(), "saved data"),
                Err(err) => error!("failed to save data: {}", err.message),
            }
        });

        let mut pending = self.pending_save.lock().await;
        if let Some(previous) = pending.replace(task) {
            previous.abort();
        }
    }
}
