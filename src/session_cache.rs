//! Snapshots of conversations that are not on screen
//!
//! Switching away captures the live view model under the outgoing key;
//! switching back restores it verbatim. A snapshot lives until `evict`.

use crate::state_machine::ViewModel;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Frozen copy of a view model
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub view: ViewModel,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct SessionCache {
    snapshots: HashMap<String, SessionSnapshot>,
    active: Option<String>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key of the session whose state is live, if any
    pub fn active_key(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Capture `live` under `key`, overwriting any earlier snapshot
    pub fn save(&mut self, key: &str, live: &ViewModel) {
        self.snapshots.insert(
            key.to_string(),
            SessionSnapshot {
                view: live.clone(),
                captured_at: Utc::now(),
            },
        );
    }

    /// Swap the live view model for `incoming`'s.
    ///
    /// The outgoing session is saved first. Unknown or absent keys give a
    /// blank idle view model.
    pub fn switch(&mut self, live: &mut ViewModel, incoming: Option<&str>) {
        if let Some(outgoing) = self.active.take() {
            self.save(&outgoing, live);
        }

        match incoming.and_then(|key| self.snapshots.get(key)) {
            Some(snapshot) => {
                tracing::debug!(session = ?incoming, captured_at = %snapshot.captured_at, "Restoring session");
                *live = snapshot.view.clone();
            }
            None => live.reset(),
        }
        self.active = incoming.map(str::to_string);
    }

    /// Drop a snapshot for good
    pub fn evict(&mut self, key: &str) -> Option<SessionSnapshot> {
        if self.active.as_deref() == Some(key) {
            self.active = None;
        }
        self.snapshots.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&SessionSnapshot> {
        self.snapshots.get(key)
    }

    /// Replace an existing snapshot's view with a background turn's progress.
    ///
    /// Returns false when `key` has no snapshot; nothing is inserted then.
    pub fn update(&mut self, key: &str, view: ViewModel) -> bool {
        match self.snapshots.get_mut(key) {
            Some(snapshot) => {
                snapshot.view = view;
                snapshot.captured_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{ChatMessage, SessionStatus};

    fn busy_view(token: &str) -> ViewModel {
        let mut view = ViewModel {
            conversation_token: Some(token.to_string()),
            status: SessionStatus::Done,
            cost: 0.25,
            ..ViewModel::default()
        };
        view.push_entry(ChatMessage::user("u1", "hello", Utc::now()));
        view.push_entry(ChatMessage::assistant("a1", "hi there", Utc::now()));
        view
    }

    #[test]
    fn test_round_trip_restores_exact_view() {
        let mut cache = SessionCache::new();
        let mut live = busy_view("abc");
        let captured = live.clone();

        cache.switch(&mut live, Some("a"));
        live = captured.clone();
        cache.save("a", &live);

        cache.switch(&mut live, Some("b"));
        assert!(live.is_blank());
        live.push_entry(ChatMessage::user("u2", "other", Utc::now()));

        cache.switch(&mut live, Some("a"));
        assert_eq!(live, captured);
    }

    #[test]
    fn test_switch_saves_outgoing_implicitly() {
        let mut cache = SessionCache::new();
        let mut live = ViewModel::default();
        cache.switch(&mut live, Some("a"));
        live = busy_view("tok");
        let expected = live.clone();

        cache.switch(&mut live, Some("b"));
        assert_eq!(cache.get("a").map(|s| &s.view), Some(&expected));
    }

    #[test]
    fn test_unknown_key_is_blank() {
        let mut cache = SessionCache::new();
        let mut live = busy_view("abc");
        cache.switch(&mut live, Some("never-seen"));
        assert!(live.is_blank());
        assert_eq!(cache.active_key(), Some("never-seen"));
    }

    #[test]
    fn test_switch_to_none_resets() {
        let mut cache = SessionCache::new();
        let mut live = ViewModel::default();
        cache.switch(&mut live, Some("a"));
        live = busy_view("abc");

        cache.switch(&mut live, None);
        assert!(live.is_blank());
        assert_eq!(cache.active_key(), None);
        assert!(cache.get("a").is_some());
    }

    #[test]
    fn test_snapshot_is_independent_of_live() {
        let mut cache = SessionCache::new();
        let mut live = busy_view("abc");
        cache.save("a", &live);
        live.cost = 99.0;
        let snapshot = cache.get("a").map(|s| s.view.cost);
        assert!(snapshot.is_some_and(|cost| (cost - 0.25).abs() < f64::EPSILON));
    }

    #[test]
    fn test_update_refreshes_capture_time() {
        let mut cache = SessionCache::new();
        cache.save("a", &ViewModel::default());
        let stale = Utc::now() - chrono::Duration::hours(1);
        if let Some(snapshot) = cache.snapshots.get_mut("a") {
            snapshot.captured_at = stale;
        }

        let progressed = busy_view("abc");
        assert!(cache.update("a", progressed.clone()));

        let snapshot = cache.get("a").unwrap();
        assert_eq!(snapshot.view, progressed);
        assert!(snapshot.captured_at > stale);
    }

    #[test]
    fn test_update_unknown_key_inserts_nothing() {
        let mut cache = SessionCache::new();
        assert!(!cache.update("ghost", busy_view("abc")));
        assert!(cache.get("ghost").is_none());
    }

    #[test]
    fn test_evict_forgets_session() {
        let mut cache = SessionCache::new();
        let mut live = ViewModel::default();
        cache.switch(&mut live, Some("a"));
        live = busy_view("abc");
        cache.save("a", &live);

        assert!(cache.evict("a").is_some());
        assert!(cache.get("a").is_none());
        assert_eq!(cache.active_key(), None);

        cache.switch(&mut live, Some("a"));
        assert!(live.is_blank());
    }
}
