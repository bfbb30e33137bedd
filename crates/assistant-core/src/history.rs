//! Conversation History
//!
//! Per-user turn history consulted when a request arrives without prior
//! messages. Persistence is pluggable through [`HistoryStore`].

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{AssistantError, Result};
use crate::message::{Message, Role};

/// Default number of turns kept per user by [`MemoryHistoryStore`]
pub const DEFAULT_MAX_TURNS: usize = 40;

/// History store trait for persistence
pub trait HistoryStore: Send + Sync {
    /// Most recent `limit` turns, oldest first
    fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<Message>>;

    /// Append one turn
    fn append(&self, user_id: &str, message: Message) -> Result<()>;

    /// Forget a user's history
    fn clear(&self, user_id: &str) -> Result<()>;
}

/// In-memory history store (for development/testing)
pub struct MemoryHistoryStore {
    turns: RwLock<HashMap<String, Vec<Message>>>,
    max_turns: usize,
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl MemoryHistoryStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: RwLock::new(HashMap::new()),
            max_turns: max_turns.max(1),
        }
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> AssistantError {
    AssistantError::Storage(format!("history lock poisoned: {e}"))
}

impl HistoryStore for MemoryHistoryStore {
    fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<Message>> {
        let turns = self.turns.read().map_err(poisoned)?;
        let Some(history) = turns.get(user_id) else {
            return Ok(Vec::new());
        };
        let mut start = history.len().saturating_sub(limit);
        // Never start on a dangling assistant reply
        while history.get(start).is_some_and(|m| m.role != Role::User) {
            start += 1;
        }
        Ok(history[start..].to_vec())
    }

    fn append(&self, user_id: &str, message: Message) -> Result<()> {
        let mut turns = self.turns.write().map_err(poisoned)?;
        let history = turns.entry(user_id.to_string()).or_default();
        history.push(message);
        if history.len() > self.max_turns {
            let excess = history.len() - self.max_turns;
            history.drain(..excess);
        }
        Ok(())
    }

    fn clear(&self, user_id: &str) -> Result<()> {
        self.turns.write().map_err(poisoned)?.remove(user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryHistoryStore::default();
        store.append("u-1", Message::user("Hi")).unwrap();
        store.append("u-1", Message::assistant("Hello!")).unwrap();

        let recent = store.recent("u-1", 10).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(store.recent("u-2", 10).unwrap().is_empty());

        store.clear("u-1").unwrap();
        assert!(store.recent("u-1", 10).unwrap().is_empty());
    }

    #[test]
    fn test_recent_starts_on_user_turn() {
        let store = MemoryHistoryStore::default();
        for i in 0..3 {
            store.append("u-1", Message::user(format!("q{i}"))).unwrap();
            store.append("u-1", Message::assistant(format!("a{i}"))).unwrap();
        }
        let recent = store.recent("u-1", 3).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text(), "q2");
    }

    #[test]
    fn test_store_caps_turns() {
        let store = MemoryHistoryStore::new(4);
        for i in 0..10 {
            store.append("u-1", Message::user(format!("q{i}"))).unwrap();
        }
        let recent = store.recent("u-1", 100).unwrap();
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].text(), "q6");
    }
}
