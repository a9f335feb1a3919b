//! crates/tutor_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the tutor's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use crate::domain::{EmbeddingEntry, RawDocument, RetrievedChunk, UserRecord};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflicting item: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Incrementally delivered model output.
pub type TextStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence for user records and the opaque auth sessions issued at login.
#[async_trait]
pub trait UserStore: Send + Sync {
    // --- Users ---
    /// Inserts a new record. Fails with `Conflict` if the username or the email exists.
    async fn insert_user(&self, user: &UserRecord) -> PortResult<()>;

    async fn find_by_username(&self, username: &str) -> PortResult<Option<UserRecord>>;

    async fn find_by_email(&self, email: &str) -> PortResult<Option<UserRecord>>;

    /// Overwrites an existing record. Fails with `NotFound` if it does not exist.
    async fn save_user(&self, user: &UserRecord) -> PortResult<()>;

    // --- Auth Sessions ---
    async fn create_auth_session(&self, session_id: &str, username: &str) -> PortResult<()>;

    /// Returns the username the session belongs to.
    async fn resolve_auth_session(&self, session_id: &str) -> PortResult<String>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embeds every input, returning one vector per input in the same order.
    async fn embed_batch(&self, inputs: &[String]) -> PortResult<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> PortResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| PortError::Unexpected("embedding provider returned no vector".to_string()))
    }
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Atomically replaces the whole index with `entries`.
    /// Concurrent readers observe either the previous or the new contents.
    async fn replace_all(&self, entries: Vec<EmbeddingEntry>) -> PortResult<usize>;

    /// Returns up to `k` entries ordered by descending similarity to `vector`.
    async fn search(&self, vector: &[f32], k: usize) -> PortResult<Vec<RetrievedChunk>>;

    async fn count(&self) -> PortResult<usize>;
}

#[async_trait]
pub trait LanguageModelService: Send + Sync {
    /// Completes a prompt and returns the whole reply.
    async fn complete(&self, prompt: &str) -> PortResult<String>;

    /// Completes a prompt, delivering the reply in pieces as they arrive.
    async fn complete_streaming(&self, prompt: &str) -> PortResult<TextStream>;
}

/// Produces the raw course documents to index.
#[async_trait]
pub trait CorpusSource: Send + Sync {
    async fn load_all(&self) -> PortResult<Vec<RawDocument>>;
}
