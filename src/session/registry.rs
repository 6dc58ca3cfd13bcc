use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::Session;
use crate::ingest::IngestOptions;
use crate::types::{AppError, AppResult};

pub type SessionHandle = Arc<RwLock<Session>>;

/// Live sessions of the HTTP API, keyed by id.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
    options: IngestOptions,
}

impl SessionRegistry {
    pub fn new(options: IngestOptions) -> Self {
        Self {
            inner: Arc::default(),
            options,
        }
    }

    pub async fn create(&self) -> (Uuid, SessionHandle) {
        let session = Session::new(self.options);
        let id = session.id();
        let handle = Arc::new(RwLock::new(session));
        let mut guard = self.inner.write().await;
        guard.insert(id, handle.clone());
        (id, handle)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<SessionHandle> {
        let guard = self.inner.read().await;
        guard
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("session {}", id)))
    }

    pub async fn remove(&self, id: Uuid) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        guard
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("session {}", id)))
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
