//! crates/tutor_core/src/memory.rs
//!
//! In-process implementations of the ports for tests. Compiled only under
//! `cfg(test)` or the `testing` feature.

use crate::domain::{EmbeddingEntry, RawDocument, RetrievedChunk, UserRecord};
use crate::knowledge::cosine_similarity;
use crate::ports::{
    CorpusSource, LanguageModelService, PortError, PortResult, TextStream, UserStore, VectorIndex,
};
use async_trait::async_trait;
use futures::stream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

//=========================================================================================
// Users
//=========================================================================================

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
    auth_sessions: RwLock<HashMap<String, String>>,
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert_user(&self, user: &UserRecord) -> PortResult<()> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Err(PortError::Conflict(format!("User {} already exists", user.username)));
        }
        if users.values().any(|u| u.email == user.email) {
            return Err(PortError::Conflict(format!("Email {} already registered", user.email)));
        }
        users.insert(user.username.clone(), user.clone());
        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> PortResult<Option<UserRecord>> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> PortResult<Option<UserRecord>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn save_user(&self, user: &UserRecord) -> PortResult<()> {
        let mut users = self.users.write().await;
        match users.get_mut(&user.username) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(PortError::NotFound(format!("User {} not found", user.username))),
        }
    }

    async fn create_auth_session(&self, session_id: &str, username: &str) -> PortResult<()> {
        self.auth_sessions
            .write()
            .await
            .insert(session_id.to_string(), username.to_string());
        Ok(())
    }

    async fn resolve_auth_session(&self, session_id: &str) -> PortResult<String> {
        self.auth_sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.auth_sessions.write().await.remove(session_id);
        Ok(())
    }
}

//=========================================================================================
// Vector Index
//=========================================================================================

/// Readers clone the current snapshot, so a rebuild swaps the whole index at once.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    entries: RwLock<Arc<Vec<EmbeddingEntry>>>,
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn replace_all(&self, entries: Vec<EmbeddingEntry>) -> PortResult<usize> {
        let count = entries.len();
        *self.entries.write().await = Arc::new(entries);
        Ok(count)
    }

    async fn search(&self, vector: &[f32], k: usize) -> PortResult<Vec<RetrievedChunk>> {
        let snapshot = self.entries.read().await.clone();
        let mut hits: Vec<RetrievedChunk> = snapshot
            .iter()
            .filter(|entry| entry.vector.len() == vector.len())
            .map(|entry| RetrievedChunk {
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
                score: cosine_similarity(vector, &entry.vector),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> PortResult<usize> {
        Ok(self.entries.read().await.len())
    }
}

//=========================================================================================
// Corpus
//=========================================================================================

/// A fixed set of documents.
pub struct StaticCorpus {
    documents: Vec<RawDocument>,
}

impl StaticCorpus {
    pub fn new(documents: Vec<RawDocument>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl CorpusSource for StaticCorpus {
    async fn load_all(&self) -> PortResult<Vec<RawDocument>> {
        Ok(self.documents.clone())
    }
}

//=========================================================================================
// Language Model
//=========================================================================================

/// A language model that replies with a fixed text, split on spaces into
/// stream pieces, and remembers every prompt it was given.
pub struct ScriptedLanguageModel {
    reply: Option<String>,
    breaks_midway: bool,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLanguageModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            breaks_midway: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A model whose every call fails.
    pub fn failing() -> Self {
        Self {
            reply: None,
            breaks_midway: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A model whose stream yields `partial` and then an error.
    pub fn breaking_after(partial: &str) -> Self {
        Self {
            reply: Some(partial.to_string()),
            breaks_midway: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    async fn record(&self, prompt: &str) -> PortResult<String> {
        self.prompts.lock().await.push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| PortError::Unexpected("model unavailable".to_string()))
    }
}

#[async_trait]
impl LanguageModelService for ScriptedLanguageModel {
    async fn complete(&self, prompt: &str) -> PortResult<String> {
        self.record(prompt).await
    }

    async fn complete_streaming(&self, prompt: &str) -> PortResult<TextStream> {
        let reply = self.record(prompt).await?;
        let mut pieces: Vec<PortResult<String>> = reply
            .split_inclusive(' ')
            .map(|piece| Ok(piece.to_string()))
            .collect();
        if self.breaks_midway {
            pieces.push(Err(PortError::Unexpected("connection reset".to_string())));
        }
        Ok(Box::pin(stream::iter(pieces)))
    }
}
