//! Persisted agent state
//!
//! One small JSON record tracking the stored access token, the last
//! completed command and the last poll timestamp. The record is overwritten
//! wholesale on every mutation; a missing or corrupt file degrades to the
//! default state instead of aborting startup.

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Durable agent state
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentState {
    pub access_token: Option<String>,
    pub last_command_id: Option<i64>,
    pub last_polled_at: Option<DateTime<Utc>>,
}

/// Storage backend for [`AgentState`].
///
/// File-backed in production, in-memory for tests.
pub trait StateStore: Send + Sync {
    /// Load the persisted state; storage problems degrade to default.
    fn load(&self) -> AgentState;
    /// Overwrite the whole record.
    fn save(&self, state: &AgentState) -> std::io::Result<()>;
}

/// File-backed store writing via a temp file + rename so a crash mid-save
/// never leaves a truncated record behind.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> AgentState {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return AgentState::default(),
        };
        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "State file is corrupt, starting fresh");
                AgentState::default()
            }
        }
    }

    fn save(&self, state: &AgentState) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)
    }
}

/// In-memory store for tests.
pub struct MemoryStore {
    slot: std::sync::Mutex<AgentState>,
}

impl MemoryStore {
    pub fn new(initial: AgentState) -> Self {
        Self {
            slot: std::sync::Mutex::new(initial),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(AgentState::default())
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> AgentState {
        self.slot.lock().unwrap().clone()
    }

    fn save(&self, state: &AgentState) -> std::io::Result<()> {
        *self.slot.lock().unwrap() = state.clone();
        Ok(())
    }
}

/// Shared handle over the live state, threaded through the poll loop and
/// command handlers. Every mutation persists the full record immediately.
#[derive(Clone)]
pub struct AgentStateHandle {
    state: Arc<RwLock<AgentState>>,
    store: Arc<dyn StateStore>,
}

impl AgentStateHandle {
    /// Load the persisted state from the store.
    pub fn load(store: Arc<dyn StateStore>) -> Self {
        let state = store.load();
        Self {
            state: Arc::new(RwLock::new(state)),
            store,
        }
    }

    pub async fn snapshot(&self) -> AgentState {
        self.state.read().await.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state.read().await.access_token.clone()
    }

    pub async fn set_token(&self, token: Option<String>) -> Result<()> {
        let mut state = self.state.write().await;
        state.access_token = token;
        self.persist(&state)
    }

    pub async fn set_last_command_id(&self, id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        state.last_command_id = Some(id);
        self.persist(&state)
    }

    pub async fn set_last_polled_at(&self, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        state.last_polled_at = Some(at);
        self.persist(&state)
    }

    fn persist(&self, state: &AgentState) -> Result<()> {
        self.store.save(state)?;
        debug!("Agent state persisted");
        Ok(())
    }
}
