//! Per-upload session state.
//!
//! A session holds the text extracted from one upload and the latest
//! analysis of it, so a reprocess re-runs the model without re-reading the
//! PDF. Sessions are never shared between uploads and never persisted; the
//! store keeps at most `capacity` of them and evicts the oldest first.

use crate::analyze::AnalysisStats;
use crate::record::InvoiceRecord;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// One upload and its most recent analysis.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub file_name: String,
    pub text: String,
    pub record: Option<InvoiceRecord>,
    /// Inline message from the last failed analysis.
    pub message: Option<String>,
    pub stats: Option<AnalysisStats>,
}

impl Session {
    pub fn new(file_name: impl Into<String>, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            text,
            record: None,
            message: None,
            stats: None,
        }
    }
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<Uuid, Session>,
    order: VecDeque<Uuid>,
}

/// Bounded in-memory session store.
pub struct SessionStore {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    /// Store `session`, evicting the oldest ones beyond capacity.
    pub async fn insert(&self, session: Session) -> Uuid {
        let id = session.id;
        let mut inner = self.inner.write().await;
        if inner.sessions.insert(id, session).is_none() {
            inner.order.push_back(id);
        }
        while inner.order.len() > self.capacity {
            if let Some(old) = inner.order.pop_front() {
                inner.sessions.remove(&old);
                debug!(session = %old, "Evicted session");
            }
        }
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<Session> {
        self.inner.read().await.sessions.get(id).cloned()
    }

    /// Apply `f` to the session and return the updated copy.
    pub async fn update<F>(&self, id: &Uuid, f: F) -> Option<Session>
    where
        F: FnOnce(&mut Session),
    {
        let mut inner = self.inner.write().await;
        let session = inner.sessions.get_mut(id)?;
        f(session);
        Some(session.clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_get() {
        let store = SessionStore::new(4);
        let id = store.insert(Session::new("a.pdf", "texto".into())).await;
        let session = store.get(&id).await.expect("session");
        assert_eq!(session.file_name, "a.pdf");
        assert_eq!(session.text, "texto");
        assert!(session.record.is_none());
    }

    #[tokio::test]
    async fn oldest_session_evicted() {
        let store = SessionStore::new(2);
        let first = store.insert(Session::new("1.pdf", String::new())).await;
        let second = store.insert(Session::new("2.pdf", String::new())).await;
        let third = store.insert(Session::new("3.pdf", String::new())).await;

        assert_eq!(store.len().await, 2);
        assert!(store.get(&first).await.is_none());
        assert!(store.get(&second).await.is_some());
        assert!(store.get(&third).await.is_some());
    }

    #[tokio::test]
    async fn update_returns_new_state() {
        let store = SessionStore::new(2);
        let id = store.insert(Session::new("a.pdf", String::new())).await;
        let updated = store
            .update(&id, |s| s.message = Some("fallo".into()))
            .await
            .unwrap();
        assert_eq!(updated.message.as_deref(), Some("fallo"));
        assert!(store.update(&Uuid::new_v4(), |_| {}).await.is_none());
    }
}
