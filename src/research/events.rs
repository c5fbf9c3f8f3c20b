//! Append-only research progress log.
//!
//! Every component that reports progress writes through one shared
//! [`UpdateLog`]. Identifier assignment, storage and observer notification
//! happen under a single lock, so the id order is the emission order even
//! when searches of a batch run concurrently.

use crate::types::{AgentPersona, ResearchUpdate, UpdateContent, UpdateKind};
use parking_lot::Mutex;
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct LogState {
    next_id: u64,
    updates: Vec<ResearchUpdate>,
}

#[derive(Debug, Default)]
pub struct UpdateLog {
    state: Mutex<LogState>,
    observer: Option<mpsc::UnboundedSender<ResearchUpdate>>,
}

impl UpdateLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log that forwards each update to `observer` as it is appended.
    pub fn with_observer(observer: mpsc::UnboundedSender<ResearchUpdate>) -> Self {
        Self {
            state: Mutex::new(LogState::default()),
            observer: Some(observer),
        }
    }

    /// Append an update and return it with its assigned id.
    pub fn emit(
        &self,
        kind: UpdateKind,
        persona: Option<AgentPersona>,
        content: impl Into<UpdateContent>,
    ) -> ResearchUpdate {
        let mut state = self.state.lock();
        let update = ResearchUpdate {
            id: state.next_id,
            kind,
            persona,
            content: content.into(),
        };
        state.next_id += 1;
        state.updates.push(update.clone());

        if let Some(observer) = &self.observer {
            // A dropped receiver only means nobody is watching anymore.
            let _ = observer.send(update.clone());
        }
        update
    }

    pub fn thought(&self, persona: Option<AgentPersona>, text: impl Into<String>) -> ResearchUpdate {
        self.emit(UpdateKind::Thought, persona, UpdateContent::Text(text.into()))
    }

    pub fn search(&self, query: impl Into<String>) -> ResearchUpdate {
        self.emit(UpdateKind::Search, None, UpdateContent::Text(query.into()))
    }

    pub fn read(&self, text: impl Into<String>) -> ResearchUpdate {
        self.emit(UpdateKind::Read, None, UpdateContent::Text(text.into()))
    }

    pub fn snapshot(&self) -> Vec<ResearchUpdate> {
        self.state.lock().updates.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completed search cycles: the number of `search` updates so far.
    pub fn search_cycles(&self) -> usize {
        self.state
            .lock()
            .updates
            .iter()
            .filter(|u| u.kind == UpdateKind::Search)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_ids_strictly_increase() {
        let log = UpdateLog::new();
        let a = log.thought(Some(AgentPersona::Alpha), "plan");
        let b = log.search("q");
        let c = log.read("summary");

        assert!(a.id < b.id && b.id < c.id);
        assert_eq!(log.len(), 3);
        assert_eq!(log.search_cycles(), 1);
    }

    #[test]
    fn test_observer_receives_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let log = UpdateLog::with_observer(tx);
        log.thought(None, "one");
        log.thought(None, "two");

        assert_eq!(rx.try_recv().unwrap().content, UpdateContent::Text("one".into()));
        assert_eq!(rx.try_recv().unwrap().content, UpdateContent::Text("two".into()));
    }

    #[test]
    fn test_dropped_observer_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let log = UpdateLog::with_observer(tx);
        log.read("still recorded");
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_concurrent_appends_keep_total_order() {
        let log = Arc::new(UpdateLog::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        log.read(format!("{}-{}", i, j));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let updates = log.snapshot();
        assert_eq!(updates.len(), 400);
        assert!(updates.windows(2).all(|w| w[0].id < w[1].id));
    }
}
