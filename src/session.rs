use crate::error::MapError;
use crate::legend::{LegendController, LegendState};
use crate::processing::MapDataset;
use crate::types::LegendSpec;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub type SessionId = u64;

/// Open sessions kept per server. Opening one more evicts the oldest.
pub const MAX_SESSIONS: usize = 1024;

/// Per-viewer context: a shared read-only dataset plus this viewer's legend state.
pub struct Session {
    pub id: SessionId,
    pub dataset: Arc<MapDataset>,
    legend: LegendController,
}

impl Session {
    pub fn new(id: SessionId, dataset: Arc<MapDataset>) -> Self {
        let legend = LegendController::new(dataset.legends());
        Self { id, dataset, legend }
    }

    pub fn select_layer(&mut self, layer: &str) -> Result<&LegendSpec, MapError> {
        self.legend.on_layer_changed(layer)
    }

    pub fn legend_state(&self) -> &LegendState {
        self.legend.state()
    }

    pub fn current_legend(&self) -> Option<&LegendSpec> {
        self.legend.current()
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SessionError {
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    #[error(transparent)]
    Map(#[from] MapError),
}

/// Sessions for one server process. Each handler holds the lock only for
/// one legend transition. Ids only grow, so the smallest id is the oldest.
pub struct SessionRegistry {
    dataset: Arc<MapDataset>,
    capacity: usize,
    next_id: AtomicU64,
    sessions: Mutex<BTreeMap<SessionId, Session>>,
}

impl SessionRegistry {
    pub fn new(dataset: Arc<MapDataset>) -> Self {
        Self::with_capacity(dataset, MAX_SESSIONS)
    }

    pub fn with_capacity(dataset: Arc<MapDataset>, capacity: usize) -> Self {
        Self {
            dataset,
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            sessions: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn open(&self) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = Session::new(id, Arc::clone(&self.dataset));

        let mut sessions = self.lock();
        while sessions.len() >= self.capacity {
            if let Some((evicted, _)) = sessions.pop_first() {
                debug!("Evicting session {}", evicted);
            }
        }
        sessions.insert(id, session);
        id
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn select_layer(&self, id: SessionId, layer: &str) -> Result<LegendSpec, SessionError> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(&id).ok_or(SessionError::UnknownSession(id))?;
        Ok(session.select_layer(layer)?.clone())
    }

    pub fn current_legend(&self, id: SessionId) -> Result<Option<LegendSpec>, SessionError> {
        let sessions = self.lock();
        let session = sessions.get(&id).ok_or(SessionError::UnknownSession(id))?;
        Ok(session.current_legend().cloned())
    }

    pub fn close(&self, id: SessionId) -> bool {
        self.lock().remove(&id).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<SessionId, Session>> {
        // transitions never leave partial state, so a poisoned map is still valid
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
