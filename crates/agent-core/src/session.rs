use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Author of a history turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// The person chatting with the agent.
    User,
    /// Raw oracle decision text.
    Agent,
    /// Knowledge base results, tool reports and loop errors.
    Tool,
}

/// One entry of a session's history. Never edited after it is appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Agent, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Tool, content)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    turns: Vec<Turn>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            turns: Vec::new(),
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The last `window` turns, oldest first.
    pub fn recent(&self, window: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(window);
        &self.turns[start..]
    }
}

/// Process-lifetime session registry.
///
/// A session is created the first time its id is seen. Holding the lock
/// returned by [`SessionStore::lock`] serializes messages of one session;
/// different sessions never contend.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, Arc<Mutex<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, id: &str) -> Arc<Mutex<Session>> {
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(id))))
            .clone()
    }

    pub async fn lock(&self, id: &str) -> OwnedMutexGuard<Session> {
        self.handle(id).lock_owned().await
    }

    /// Copy of a session's history, if the session exists.
    pub async fn history(&self, id: &str) -> Option<Vec<Turn>> {
        let handle = self.sessions.get(id).map(|entry| entry.value().clone())?;
        let session = handle.lock().await;
        Some(session.turns().to_vec())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_window_keeps_latest_turns() {
        let mut session = Session::new("s");
        for i in 0..12 {
            session.push(Turn::user(format!("m{i}")));
        }
        let recent = session.recent(10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].content, "m2");
        assert_eq!(session.recent(50).len(), 12);
    }

    #[tokio::test]
    async fn sessions_are_created_on_first_lock() {
        let store = SessionStore::new();
        assert!(store.history("a").await.is_none());
        {
            let mut session = store.lock("a").await;
            session.push(Turn::user("hello"));
        }
        let history = store.history("a").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, TurnRole::User);
        assert_eq!(store.len(), 1);
    }
}
