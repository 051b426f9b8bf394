//! Background index worker.
//!
//! A single bounded worker drains a dedup queue keyed by session id, so a
//! burst of appends collapses to at most one re-index per session. Failures
//! are logged and never propagate to the enqueueing caller.

use crate::index::IndexManager;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

struct QueueState {
    pending: VecDeque<String>,
    /// Session ids currently queued; duplicates are dropped.
    queued: HashSet<String>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Condvar,
}

/// Owns the worker thread; dropping joins it.
pub struct IndexWorker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl IndexWorker {
    /// Spawn the worker around an index manager.
    #[must_use]
    pub fn spawn(index: Arc<IndexManager>) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                queued: HashSet::new(),
                shutdown: false,
            }),
            wake: Condvar::new(),
        });

        let handle = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("mnemo-indexer".to_string())
                .spawn(move || run(&shared, &index))
                .expect("failed to spawn index worker")
        };

        Self {
            shared,
            handle: Some(handle),
        }
    }

    /// Queue a session for re-indexing. Duplicate requests collapse.
    pub fn enqueue(&self, session_id: &str) {
        let mut state = self.shared.state.lock().expect("queue lock poisoned");
        if state.shutdown || state.queued.contains(session_id) {
            return;
        }
        state.queued.insert(session_id.to_string());
        state.pending.push_back(session_id.to_string());
        drop(state);
        self.shared.wake.notify_one();
    }

    /// Number of sessions waiting (the in-flight one excluded).
    #[must_use]
    pub fn backlog(&self) -> usize {
        self.shared.state.lock().expect("queue lock poisoned").pending.len()
    }

    /// Stop accepting work, drain the queue, and join the thread.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.shared.state.lock().expect("queue lock poisoned");
            state.shutdown = true;
        }
        self.shared.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for IndexWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(shared: &Shared, index: &IndexManager) {
    loop {
        let session_id = {
            let mut state = shared.state.lock().expect("queue lock poisoned");
            loop {
                if let Some(id) = state.pending.pop_front() {
                    state.queued.remove(&id);
                    break id;
                }
                if state.shutdown {
                    return;
                }
                state = shared.wake.wait(state).expect("queue lock poisoned");
            }
        };

        // The trigger condition was evaluated at enqueue time.
        if let Err(e) = index.index_session(&session_id, true) {
            tracing::warn!("background indexing failed for {session_id}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedding;
    use crate::model::{Message, Role, Session};
    use crate::storage::{SqliteStorage, StorageBackend};

    #[test]
    fn worker_indexes_enqueued_sessions() {
        let storage = Arc::new(SqliteStorage::open_memory().unwrap());
        storage.create_session(&Session::new("s", "Worker", None)).unwrap();
        let mut msg = Message::new("s", Role::User, "async channels in rust", 5);
        storage.add_message(&mut msg).unwrap();

        let index = Arc::new(IndexManager::new(
            Arc::clone(&storage) as Arc<dyn StorageBackend>,
            Some(Arc::new(HashEmbedding::new(8))),
        ));
        let mut worker = IndexWorker::spawn(index);
        worker.enqueue("s");
        worker.shutdown();

        let session = storage.get_session("s").unwrap().unwrap();
        assert!(!session.keywords.is_empty());
    }

    #[test]
    fn duplicate_enqueues_collapse() {
        let storage = Arc::new(SqliteStorage::open_memory().unwrap());
        let index = Arc::new(IndexManager::new(
            Arc::clone(&storage) as Arc<dyn StorageBackend>,
            None,
        ));
        let worker = IndexWorker::spawn(index);
        // Queue inspection races the drain, so only the upper bound is
        // meaningful here.
        for _ in 0..50 {
            worker.enqueue("same");
            worker.enqueue("same");
        }
        assert!(worker.backlog() <= 1 + 1);
    }

    #[test]
    fn shutdown_drains_pending_work() {
        let storage = Arc::new(SqliteStorage::open_memory().unwrap());
        for i in 0..3 {
            let id = format!("s{i}");
            storage.create_session(&Session::new(&id, "T", None)).unwrap();
            let mut msg = Message::new(&id, Role::User, "drain me please", 3);
            storage.add_message(&mut msg).unwrap();
        }
        let index = Arc::new(IndexManager::new(
            Arc::clone(&storage) as Arc<dyn StorageBackend>,
            None,
        ));
        let mut worker = IndexWorker::spawn(index);
        for i in 0..3 {
            worker.enqueue(&format!("s{i}"));
        }
        worker.shutdown();

        for i in 0..3 {
            let session = storage.get_session(&format!("s{i}")).unwrap().unwrap();
            assert!(!session.keywords.is_empty(), "s{i} not indexed");
        }
    }
}
