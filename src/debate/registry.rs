//! In-memory debate registry
//!
//! Keyed map of debate id to the authoritative `Debate` record. Snapshots
//! are replaced wholesale per turn: readers always observe either the state
//! before a turn committed or after, never a half-updated record.

use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{Debate, DebateStatus};
use crate::error::{QuorumError, QuorumResult};

#[derive(Default)]
pub struct DebateRegistry {
    debates: RwLock<HashMap<String, Debate>>,
}

impl DebateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, debate: Debate) {
        self.debates.write().await.insert(debate.id.clone(), debate);
    }

    /// Snapshot of a debate, if registered.
    pub async fn get(&self, id: &str) -> Option<Debate> {
        self.debates.read().await.get(id).cloned()
    }

    /// Replace the published snapshot. Per-key replacement is atomic;
    /// holders of an old snapshot are unaffected.
    pub async fn commit(&self, debate: Debate) {
        self.debates.write().await.insert(debate.id.clone(), debate);
    }

    pub async fn list(&self) -> Vec<Debate> {
        let mut debates: Vec<Debate> = self.debates.read().await.values().cloned().collect();
        debates.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        debates
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.debates.write().await.remove(id).is_some()
    }

    /// Whether a running driver should wind down: the authoritative record
    /// was stopped or reached a terminal state.
    pub async fn stop_requested(&self, id: &str) -> bool {
        self.debates
            .read()
            .await
            .get(id)
            .map(|d| d.stopped_manually || d.status == DebateStatus::Stopped)
            .unwrap_or(true)
    }

    /// Mark a debate stopped. No-op for debates already terminal.
    pub async fn stop(&self, id: &str) -> QuorumResult<Debate> {
        let mut debates = self.debates.write().await;
        let debate = debates
            .get_mut(id)
            .ok_or_else(|| QuorumError::NotFound(id.to_string()))?;

        if !debate.status.is_terminal() {
            debate.status = DebateStatus::Stopped;
            debate.stopped_manually = true;
            debate.updated_at = chrono::Utc::now();
        }
        Ok(debate.clone())
    }

    /// Pause a running debate.
    pub async fn pause(&self, id: &str) -> QuorumResult<Debate> {
        let mut debates = self.debates.write().await;
        let debate = debates
            .get_mut(id)
            .ok_or_else(|| QuorumError::NotFound(id.to_string()))?;

        if debate.status != DebateStatus::Running {
            return Err(QuorumError::InvalidState(format!(
                "Debate {id} is not running (status: {})",
                debate.status.as_str()
            )));
        }
        debate.status = DebateStatus::Paused;
        debate.updated_at = chrono::Utc::now();
        Ok(debate.clone())
    }

    /// Resume a paused debate.
    pub async fn resume(&self, id: &str) -> QuorumResult<Debate> {
        let mut debates = self.debates.write().await;
        let debate = debates
            .get_mut(id)
            .ok_or_else(|| QuorumError::NotFound(id.to_string()))?;

        if debate.status != DebateStatus::Paused {
            return Err(QuorumError::InvalidState(format!(
                "Debate {id} is not paused (status: {})",
                debate.status.as_str()
            )));
        }
        debate.status = DebateStatus::Running;
        debate.updated_at = chrono::Utc::now();
        Ok(debate.clone())
    }
}
