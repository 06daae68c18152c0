//! Session lifecycle: creation, resumption, TTL eviction, and the
//! hard cap on live sessions.
//!
//! A [`Session`] owns its own message log and a back-reference value
//! the Agent Loop reads from (never a pointer back into the
//! [`SessionManager`] — the manager owns sessions, sessions don't own
//! each other or their owner).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use review_domain::config::SessionsConfig;
use review_domain::error::{Error, Result};
use review_domain::tool::Message;
use review_domain::trace::TraceEvent;
use uuid::Uuid;

use super::cancel::{CancelMap, CancelToken};
use super::session_lock::SessionLockMap;

pub struct Session {
    pub id: String,
    pub messages: RwLock<Vec<Message>>,
    pub created_at: Instant,
    pub last_active: RwLock<Instant>,
}

impl Session {
    fn new(id: String) -> Self {
        let now = Instant::now();
        Self {
            id,
            messages: RwLock::new(Vec::new()),
            created_at: now,
            last_active: RwLock::new(now),
        }
    }

    pub fn touch(&self) {
        *self.last_active.write() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.read().elapsed()
    }

    pub fn message_count(&self) -> usize {
        self.messages.read().len()
    }
}

/// Owns all live sessions plus the locks and cancellation tokens keyed
/// alongside them. Sweeps expired sessions on a timer; evicts the
/// least-recently-active session when the live-session cap is hit.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    locks: SessionLockMap,
    cancel_map: CancelMap,
    config: SessionsConfig,
}

impl SessionManager {
    pub fn new(config: SessionsConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            locks: SessionLockMap::new(),
            cancel_map: CancelMap::new(),
            config,
        }
    }

    /// Create a brand-new session with a fresh id.
    pub fn create(&self) -> Arc<Session> {
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(id.clone()));
        self.evict_if_over_capacity();
        self.sessions.write().insert(id.clone(), session.clone());
        TraceEvent::SessionCreated {
            session_id: id.clone(),
        }
        .emit();
        session
    }

    /// Resume an existing session by id, or error if it has expired or
    /// never existed.
    pub fn resume(&self, session_id: &str) -> Result<Arc<Session>> {
        let session = self
            .sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(session_id.to_owned()))?;
        session.touch();
        TraceEvent::SessionResumed {
            session_id: session_id.to_owned(),
            message_count: session.message_count(),
        }
        .emit();
        Ok(session)
    }

    /// Get an existing session or create a new one with the given id
    /// already assigned.
    pub fn get_or_create(&self, session_id: Option<&str>) -> Arc<Session> {
        match session_id {
            Some(id) => {
                if let Some(session) = self.sessions.read().get(id).cloned() {
                    session.touch();
                    return session;
                }
                let session = Arc::new(Session::new(id.to_owned()));
                self.evict_if_over_capacity();
                self.sessions.write().insert(id.to_owned(), session.clone());
                TraceEvent::SessionCreated {
                    session_id: id.to_owned(),
                }
                .emit();
                session
            }
            None => self.create(),
        }
    }

    pub fn delete(&self, session_id: &str) {
        self.sessions.write().remove(session_id);
        self.cancel_map.cancel(session_id);
        self.cancel_map.remove(session_id);
        TraceEvent::SessionDeleted {
            session_id: session_id.to_owned(),
        }
        .emit();
    }

    pub async fn acquire_run_lock(&self, session_id: &str) -> tokio::sync::OwnedSemaphorePermit {
        self.locks.acquire(session_id).await
    }

    pub fn register_cancel_token(&self, session_id: &str) -> CancelToken {
        self.cancel_map.register(session_id)
    }

    pub fn cancel(&self, session_id: &str) -> bool {
        self.cancel_map.cancel(session_id)
    }

    pub fn clear_cancel_token(&self, session_id: &str) {
        self.cancel_map.remove(session_id);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn max_turns(&self) -> u32 {
        self.config.max_turns
    }

    /// Remove every session idle longer than the configured TTL. Meant
    /// to be called from a periodic background sweep.
    pub fn sweep_expired(&self) {
        let ttl = Duration::from_secs(self.config.ttl_minutes as u64 * 60);
        let expired: Vec<String> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.idle_for() > ttl)
            .map(|s| s.id.clone())
            .collect();

        for id in expired {
            self.sessions.write().remove(&id);
            self.cancel_map.cancel(&id);
            self.cancel_map.remove(&id);
            TraceEvent::SessionEvicted {
                session_id: id,
                reason: "ttl_expired".into(),
            }
            .emit();
        }

        self.locks.prune_idle();
    }

    fn evict_if_over_capacity(&self) {
        let over = {
            let sessions = self.sessions.read();
            sessions.len() >= self.config.max_sessions
        };
        if !over {
            return;
        }
        let lru_id = {
            let sessions = self.sessions.read();
            sessions
                .values()
                .min_by_key(|s| *s.last_active.read())
                .map(|s| s.id.clone())
        };
        if let Some(id) = lru_id {
            self.sessions.write().remove(&id);
            self.cancel_map.cancel(&id);
            self.cancel_map.remove(&id);
            TraceEvent::SessionEvicted {
                session_id: id,
                reason: "capacity".into(),
            }
            .emit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SessionsConfig {
        SessionsConfig {
            ttl_minutes: 30,
            sweep_interval_secs: 300,
            max_sessions: 2,
            max_turns: 20,
        }
    }

    #[test]
    fn create_then_resume() {
        let mgr = SessionManager::new(cfg());
        let session = mgr.create();
        let resumed = mgr.resume(&session.id).unwrap();
        assert_eq!(session.id, resumed.id);
    }

    #[test]
    fn resume_unknown_session_errors() {
        let mgr = SessionManager::new(cfg());
        assert!(mgr.resume("nope").is_err());
    }

    #[test]
    fn capacity_eviction_drops_lru() {
        let mgr = SessionManager::new(cfg());
        let first = mgr.create();
        std::thread::sleep(Duration::from_millis(5));
        let _second = mgr.create();
        std::thread::sleep(Duration::from_millis(5));
        // third creation exceeds max_sessions=2, evicts the LRU (first)
        let _third = mgr.create();
        assert!(mgr.resume(&first.id).is_err());
        assert_eq!(mgr.session_count(), 2);
    }

    #[test]
    fn get_or_create_reuses_existing_id() {
        let mgr = SessionManager::new(cfg());
        let a = mgr.get_or_create(Some("fixed-id"));
        let b = mgr.get_or_create(Some("fixed-id"));
        assert_eq!(a.id, b.id);
        assert_eq!(mgr.session_count(), 1);
    }

    #[test]
    fn delete_removes_session_and_cancel_token() {
        let mgr = SessionManager::new(cfg());
        let session = mgr.create();
        mgr.register_cancel_token(&session.id);
        mgr.delete(&session.id);
        assert!(mgr.resume(&session.id).is_err());
        assert!(!mgr.cancel(&session.id));
    }

    #[test]
    fn delete_cancels_running_turn_before_removing_token() {
        let mgr = SessionManager::new(cfg());
        let session = mgr.create();
        let token = mgr.register_cancel_token(&session.id);
        mgr.delete(&session.id);
        assert!(token.is_cancelled());
    }

    #[test]
    fn sweep_expired_cancels_running_turn_before_removing_token() {
        let mgr = SessionManager::new(SessionsConfig {
            ttl_minutes: 0,
            sweep_interval_secs: 300,
            max_sessions: 2,
            max_turns: 20,
        });
        let session = mgr.create();
        let token = mgr.register_cancel_token(&session.id);
        std::thread::sleep(Duration::from_millis(5));
        mgr.sweep_expired();
        assert!(token.is_cancelled());
    }

    #[test]
    fn capacity_eviction_cancels_running_turn_before_removing_token() {
        let mgr = SessionManager::new(cfg());
        let first = mgr.create();
        let token = mgr.register_cancel_token(&first.id);
        std::thread::sleep(Duration::from_millis(5));
        let _second = mgr.create();
        std::thread::sleep(Duration::from_millis(5));
        let _third = mgr.create();
        assert!(token.is_cancelled());
    }
}
