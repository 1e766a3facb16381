use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use alloy::primitives::Address;
use levo_models::{SessionId, SessionState};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cycle::CyclePipeline;
use crate::error::SessionError;
use crate::notify::system;

struct SessionEntry {
    account: Address,
    state: SessionState,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Owns every session: its lifecycle state, its cancellation handle and its
/// cycle loop task.
pub struct SessionManager {
    pipeline: Arc<CyclePipeline>,
    interval: Duration,
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl SessionManager {
    pub fn new(pipeline: Arc<CyclePipeline>, interval: Duration) -> Self {
        Self {
            pipeline,
            interval,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a session under a fresh identifier.
    pub async fn start(&self, account: Address) -> Result<SessionId, SessionError> {
        self.start_with_id(SessionId::generate(), account).await
    }

    /// Start a session under a caller-chosen identifier (a chat id).
    ///
    /// Cycle 0 runs before this returns; the periodic loop is armed afterwards.
    /// An identifier that is already running, or that was stopped, is rejected.
    pub async fn start_with_id(
        &self,
        id: SessionId,
        account: Address,
    ) -> Result<SessionId, SessionError> {
        let cancel = CancellationToken::new();
        {
            let mut sessions = self.sessions();
            if let Some(existing) = sessions.get(&id) {
                return Err(match existing.state {
                    SessionState::Stopped => SessionError::AlreadyStopped(id),
                    _ => SessionError::AlreadyActive(id),
                });
            }
            sessions.insert(
                id.clone(),
                SessionEntry {
                    account,
                    state: SessionState::Created,
                    cancel: cancel.clone(),
                    handle: None,
                },
            );
        }
        info!(session_id = %id, account = %account, "Session created");
        self.pipeline
            .notify(system(&id, format!("Session started for {account}")))
            .await;

        self.pipeline.run_cycle(&id, account, 0, &cancel).await;

        let stopped_early = {
            let mut sessions = self.sessions();
            match sessions.get_mut(&id) {
                Some(entry) if !cancel.is_cancelled() => {
                    entry.state = SessionState::Active;
                    entry.handle = Some(tokio::spawn(run_loop(
                        self.pipeline.clone(),
                        id.clone(),
                        account,
                        self.interval,
                        cancel,
                    )));
                    false
                }
                Some(entry) => {
                    entry.state = SessionState::Stopped;
                    true
                }
                None => true,
            }
        };

        if stopped_early {
            info!(session_id = %id, "Session stopped during its first cycle");
            self.pipeline.notify(system(&id, "Session stopped")).await;
        } else {
            info!(session_id = %id, interval_secs = self.interval.as_secs(), "Session active");
        }
        Ok(id)
    }

    /// Stop a session. Absent, stopping and stopped sessions are left alone.
    ///
    /// An in-flight cycle is allowed to reach its next checkpoint; this waits
    /// for it when the session is already active.
    pub async fn stop(&self, id: &SessionId) {
        let handle = {
            let mut sessions = self.sessions();
            let Some(entry) = sessions.get_mut(id) else {
                return;
            };
            match entry.state {
                SessionState::Stopping | SessionState::Stopped => return,
                SessionState::Created => {
                    // start_with_id finalizes once cycle 0 returns.
                    entry.state = SessionState::Stopping;
                    entry.cancel.cancel();
                    return;
                }
                SessionState::Active => {
                    entry.state = SessionState::Stopping;
                    entry.cancel.cancel();
                    entry.handle.take()
                }
            }
        };
        info!(session_id = %id, "Stopping session");

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(session_id = %id, error = %e, "Session loop ended abnormally");
            }
        }

        if let Some(entry) = self.sessions().get_mut(id) {
            entry.state = SessionState::Stopped;
        }
        info!(session_id = %id, "Session stopped");
        self.pipeline.notify(system(id, "Session stopped")).await;
    }

    /// Stop every session that has not stopped yet.
    pub async fn shutdown(&self) {
        let ids: Vec<SessionId> = self
            .sessions()
            .iter()
            .filter(|(_, e)| !e.state.is_terminal())
            .map(|(id, _)| id.clone())
            .collect();
        info!(sessions = ids.len(), "Shutting down sessions");
        futures::future::join_all(ids.iter().map(|id| self.stop(id))).await;
    }

    pub fn state(&self, id: &SessionId) -> Option<SessionState> {
        self.sessions().get(id).map(|e| e.state)
    }

    pub fn account(&self, id: &SessionId) -> Option<Address> {
        self.sessions().get(id).map(|e| e.account)
    }

    /// Identifiers of sessions whose loop is running, sorted.
    pub fn active_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self
            .sessions()
            .iter()
            .filter(|(_, e)| e.state == SessionState::Active)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// Cycles 1.. of a session. The next sleep is armed only after the previous
/// cycle has finished, so cycles never overlap.
async fn run_loop(
    pipeline: Arc<CyclePipeline>,
    id: SessionId,
    account: Address,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut cycle: u64 = 1;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(session_id = %id, "Session loop shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                pipeline.run_cycle(&id, account, cycle, &cancel).await;
                cycle += 1;
            }
        }
    }
}
