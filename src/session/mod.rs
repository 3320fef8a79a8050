//! Per-conversation memory
//!
//! One `SessionContext` per chat id: a sticky scope, an optional pinned
//! anchor, a bounded turn history and an optional route override. The store
//! serializes access per chat id; different chats share nothing.

use crate::corpus::Filters;
use crate::error::{Result, ScoliaError};
use crate::retrieval::RetrievalResult;
use crate::router::RouteMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Margin by which the top retrieval score must beat the runner-up for the
/// turn to qualify as a strong single-chunk match.
const STRONG_MATCH_MARGIN: f32 = 1.5;

/// A retrieval anchor fixed to a specific block.
///
/// Anchors are only ever derived from a successful retrieval, so a pinned
/// (chapter, block_id) pair always references something that was actually
/// surfaced to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinnedAnchor {
    pub filters: Filters,
    pub anchor_chunk_id: u64,
}

impl PinnedAnchor {
    /// Derive an anchor candidate from a retrieval outcome: the top hit
    /// must clearly dominate the runner-up (or be the only hit) and carry
    /// both a chapter and a block_id.
    pub fn from_retrieval(result: &RetrievalResult) -> Option<Self> {
        let top = result.top()?;

        let dominant = match result.hits().get(1) {
            Some(second) => top.score >= second.score * STRONG_MATCH_MARGIN,
            None => true,
        };
        if !dominant {
            return None;
        }

        let chapter = top.chunk.chapter.as_deref()?;
        let block_id = top.chunk.block_id.as_deref()?;

        Some(Self {
            filters: Filters::new(Some(chapter), None, Some(block_id), None),
            anchor_chunk_id: top.chunk.id,
        })
    }
}

/// One completed turn, as remembered by the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub question: String,
    pub answer_summary: String,
    pub filters: Filters,
    pub asked_at: DateTime<Utc>,
}

/// Mutable conversational state for one chat id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    /// Sticky filters applied to every retrieval until cleared
    pub scope: Filters,

    /// Explicitly pinned anchor, if any
    pub pinned: Option<PinnedAnchor>,

    /// Anchor candidate from the last strong retrieval; promoted by `pin`
    pub pin_candidate: Option<PinnedAnchor>,

    /// Most recent turns, oldest evicted first
    pub history: VecDeque<HistoryTurn>,

    /// Explicit user directive forcing a route mode
    pub route_override: Option<RouteMode>,

    /// Whether follow-ups may auto-link to the pinned anchor
    pub auto_link: bool,

    history_cap: usize,
}

impl SessionContext {
    pub fn new(history_cap: usize, auto_link: bool) -> Self {
        Self {
            scope: Filters::default(),
            pinned: None,
            pin_candidate: None,
            history: VecDeque::new(),
            route_override: None,
            auto_link,
            history_cap: history_cap.max(1),
        }
    }

    /// Append a turn, evicting the oldest beyond the cap.
    pub fn push_turn(&mut self, turn: HistoryTurn) {
        if self.history.len() == self.history_cap {
            self.history.pop_front();
        }
        self.history.push_back(turn);
    }

    /// The most recent turns, newest last.
    pub fn recent_turns(&self, n: usize) -> impl Iterator<Item = &HistoryTurn> {
        let skip = self.history.len().saturating_sub(n);
        self.history.iter().skip(skip)
    }

    pub fn history_cap(&self) -> usize {
        self.history_cap
    }
}

/// Keyed store of session contexts.
///
/// Per-key `Mutex` serializes turns for one chat id; the outer map lock is
/// held only long enough to fetch or insert the entry, so chats never block
/// each other.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionContext>>>>,
    history_cap: usize,
    default_auto_link: bool,
}

impl SessionStore {
    pub fn new(history_cap: usize, default_auto_link: bool) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            history_cap,
            default_auto_link,
        }
    }

    /// Fetch the entry for a chat id, creating a default lazily.
    pub async fn handle(&self, chat_id: &str) -> Arc<Mutex<SessionContext>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(entry) = sessions.get(chat_id) {
                return Arc::clone(entry);
            }
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(chat_id.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(SessionContext::new(
                self.history_cap,
                self.default_auto_link,
            )))
        }))
    }

    /// Read a point-in-time copy of the context.
    pub async fn get(&self, chat_id: &str) -> SessionContext {
        let entry = self.handle(chat_id).await;
        let guard = entry.lock().await;
        guard.clone()
    }

    /// Commit one completed turn: history append plus, when the turn
    /// yielded a strong single-chunk match, the new pin anchor candidate.
    /// Pinning itself stays an explicit user action.
    pub async fn update(
        &self,
        chat_id: &str,
        question: &str,
        answer_summary: &str,
        derived_filters: Filters,
        pin_candidate: Option<PinnedAnchor>,
    ) {
        let entry = self.handle(chat_id).await;
        let mut session = entry.lock().await;

        session.push_turn(HistoryTurn {
            question: question.to_string(),
            answer_summary: answer_summary.to_string(),
            filters: derived_filters,
            asked_at: Utc::now(),
        });

        if let Some(candidate) = pin_candidate {
            session.pin_candidate = Some(candidate);
        }
    }

    pub async fn set_scope(&self, chat_id: &str, filters: Filters) {
        let entry = self.handle(chat_id).await;
        entry.lock().await.scope = filters;
    }

    pub async fn clear_scope(&self, chat_id: &str) {
        let entry = self.handle(chat_id).await;
        entry.lock().await.scope = Filters::default();
    }

    /// Promote the current anchor candidate to the pinned anchor.
    pub async fn pin(&self, chat_id: &str) -> Result<PinnedAnchor> {
        let entry = self.handle(chat_id).await;
        let mut session = entry.lock().await;

        match session.pin_candidate.clone() {
            Some(candidate) => {
                session.pinned = Some(candidate.clone());
                Ok(candidate)
            }
            None => Err(ScoliaError::Session(
                "No anchor candidate to pin; ask a question that resolves to a specific block first"
                    .to_string(),
            )),
        }
    }

    pub async fn unpin(&self, chat_id: &str) {
        let entry = self.handle(chat_id).await;
        entry.lock().await.pinned = None;
    }

    pub async fn set_route_override(&self, chat_id: &str, mode: Option<RouteMode>) {
        let entry = self.handle(chat_id).await;
        entry.lock().await.route_override = mode;
    }

    pub async fn set_auto_link(&self, chat_id: &str, auto_link: bool) {
        let entry = self.handle(chat_id).await;
        entry.lock().await.auto_link = auto_link;
    }

    /// Drop all state for a chat id.
    pub async fn reset(&self, chat_id: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(chat_id);
    }

    /// Mint a fresh chat id.
    pub fn new_session(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Chunk, DocType};
    use crate::retrieval::ScoredChunk;

    fn turn(question: &str) -> HistoryTurn {
        HistoryTurn {
            question: question.to_string(),
            answer_summary: String::new(),
            filters: Filters::default(),
            asked_at: Utc::now(),
        }
    }

    fn hit(id: u64, score: f32, chapter: Option<&str>, block: Option<&str>) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id,
                text: format!("chunk {}", id),
                page: None,
                chapter: chapter.map(String::from),
                block_kind: Some("theoreme".to_string()),
                block_id: block.map(String::from),
                doc_type: Some(DocType::Theory),
            },
            score,
        }
    }

    #[test]
    fn test_history_eviction() {
        let mut session = SessionContext::new(5, true);
        for i in 0..10 {
            session.push_turn(turn(&format!("q{}", i)));
        }

        assert_eq!(session.history.len(), 5);
        assert_eq!(session.history.front().unwrap().question, "q5");
        assert_eq!(session.history.back().unwrap().question, "q9");
    }

    #[test]
    fn test_anchor_from_dominant_retrieval() {
        let result = RetrievalResult::new(vec![
            hit(1, 0.9, Some("28"), Some("28.7")),
            hit(2, 0.3, Some("12"), Some("12.1")),
        ]);

        let anchor = PinnedAnchor::from_retrieval(&result).unwrap();
        assert_eq!(anchor.anchor_chunk_id, 1);
        assert_eq!(anchor.filters.chapter.as_deref(), Some("28"));
        assert_eq!(anchor.filters.block_id.as_deref(), Some("28.7"));
    }

    #[test]
    fn test_no_anchor_without_dominance() {
        let result = RetrievalResult::new(vec![
            hit(1, 0.9, Some("28"), Some("28.7")),
            hit(2, 0.8, Some("12"), Some("12.1")),
        ]);
        assert!(PinnedAnchor::from_retrieval(&result).is_none());
    }

    #[test]
    fn test_no_anchor_without_block_metadata() {
        let result = RetrievalResult::new(vec![hit(1, 0.9, Some("28"), None)]);
        assert!(PinnedAnchor::from_retrieval(&result).is_none());
    }

    #[tokio::test]
    async fn test_pin_requires_candidate() {
        let store = SessionStore::new(5, true);
        assert!(store.pin("chat").await.is_err());

        let result = RetrievalResult::new(vec![hit(1, 0.9, Some("28"), Some("28.7"))]);
        let candidate = PinnedAnchor::from_retrieval(&result);
        store
            .update("chat", "q", "a", Filters::default(), candidate)
            .await;

        let anchor = store.pin("chat").await.unwrap();
        assert_eq!(anchor.anchor_chunk_id, 1);

        let session = store.get("chat").await;
        assert_eq!(session.pinned, Some(anchor));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new(5, true);
        store.set_scope("a", Filters::chapter("28")).await;

        assert_eq!(store.get("a").await.scope.chapter.as_deref(), Some("28"));
        assert!(store.get("b").await.scope.is_empty());
    }
}
