//! Needs-input session state
//!
//! Answers collected across needs-input rounds are kept per session until
//! a fill completes. Only a needs-input result creates or updates a
//! session; failed fills leave the store as they found it. The store
//! belongs to one engine instance.

use crate::facts::Question;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use taxdoc_calc::FactSet;
use uuid::Uuid;

/// Conversation identifier shared by the rounds of one fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate new session ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone)]
struct SessionState {
    answers: FactSet,
    pending: Vec<Question>,
    updated_at: DateTime<Utc>,
}

/// Per-session answers and outstanding questions
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<SessionId, SessionState>,
}

impl SessionStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored answers overlaid with fresh ones, without touching the store
    ///
    /// Blank answers do not erase earlier ones.
    #[must_use]
    pub fn answers(&self, id: SessionId, responses: &FactSet) -> FactSet {
        let mut answers = self
            .sessions
            .get(&id)
            .map(|s| s.answers.clone())
            .unwrap_or_default();
        for (name, value) in responses {
            if !value.is_blank() {
                answers.insert(name.clone(), value.clone());
            }
        }
        answers
    }

    /// Keep answers so far and the questions sent back to the caller
    pub fn suspend(&self, id: SessionId, answers: FactSet, questions: Vec<Question>) {
        self.sessions.insert(
            id,
            SessionState {
                answers,
                pending: questions,
                updated_at: Utc::now(),
            },
        );
    }

    /// Outstanding questions for a session
    #[must_use]
    pub fn pending(&self, id: SessionId) -> Vec<Question> {
        self.sessions
            .get(&id)
            .map(|s| s.pending.clone())
            .unwrap_or_default()
    }

    /// Forget a completed session
    pub fn clear(&self, id: SessionId) {
        if self.sessions.remove(&id).is_some() {
            tracing::debug!(session = %id, "cleared session");
        }
    }

    /// Drop sessions idle since before `cutoff`
    pub fn evict_idle(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.updated_at >= cutoff);
        before - self.sessions.len()
    }

    #[inline]
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxdoc_calc::FactValue;

    fn answers(pairs: &[(&str, &str)]) -> FactSet {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), FactValue::text(*v)))
            .collect()
    }

    fn question(field: &str) -> Question {
        Question {
            field: field.to_string(),
            prompt: format!("{field}?"),
        }
    }

    #[test]
    fn answers_accumulate_across_rounds() {
        let store = SessionStore::new();
        let id = SessionId::new();
        let first = store.answers(id, &answers(&[("routing_number", "021000021")]));
        store.suspend(id, first, vec![question("account_number")]);

        let all = store.answers(id, &answers(&[("account_number", "12345678"), ("routing_number", "")]));
        assert_eq!(all.len(), 2);
        assert_eq!(all["routing_number"], FactValue::text("021000021"));
        assert_eq!(store.pending(id), vec![question("account_number")]);
    }

    #[test]
    fn reading_answers_creates_no_session() {
        let store = SessionStore::new();
        for _ in 0..10 {
            let merged = store.answers(SessionId::new(), &answers(&[("routing_number", "1")]));
            assert_eq!(merged.len(), 1);
        }
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn sessions_are_isolated_and_clearable() {
        let store = SessionStore::new();
        let a = SessionId::new();
        let b = SessionId::new();
        store.suspend(a, answers(&[("routing_number", "1")]), vec![question("account_number")]);
        store.suspend(b, FactSet::new(), vec![question("routing_number")]);
        assert!(store.answers(b, &FactSet::new()).is_empty());

        store.clear(a);
        assert_eq!(store.active_count(), 1);
        assert!(store.pending(a).is_empty());
        assert!(store.answers(a, &FactSet::new()).is_empty());
    }

    #[test]
    fn evicts_idle_sessions() {
        let store = SessionStore::new();
        store.suspend(SessionId::new(), FactSet::new(), Vec::new());
        assert_eq!(store.evict_idle(Utc::now() + chrono::Duration::seconds(1)), 1);
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn session_id_round_trips_text() {
        let id = SessionId::new();
        assert_eq!(id.to_string().parse::<SessionId>().unwrap(), id);
    }
}
