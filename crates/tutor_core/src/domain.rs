//! crates/tutor_core/src/domain.rs
//!
//! Defines the pure, core data structures for the tutoring assistant.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

//=========================================================================================
// Users
//=========================================================================================

/// The role attached to a user record. Registration only ever assigns `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// A learner's preferred way of receiving explanations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearningStyle {
    Visual,
    Logical,
    Practical,
}

impl LearningStyle {
    pub const ALL: [LearningStyle; 3] = [
        LearningStyle::Visual,
        LearningStyle::Logical,
        LearningStyle::Practical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LearningStyle::Visual => "visual",
            LearningStyle::Logical => "logical",
            LearningStyle::Practical => "practical",
        }
    }
}

impl fmt::Display for LearningStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LearningStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "visual" => Ok(LearningStyle::Visual),
            "logical" => Ok(LearningStyle::Logical),
            "practical" => Ok(LearningStyle::Practical),
            other => Err(format!("unknown learning style '{}'", other)),
        }
    }
}

/// A persisted user record, owned by the account directory.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub learning_style: Option<LearningStyle>,
    pub interaction_count: u64,
}

/// A partial update merged into an existing `UserRecord`.
/// `None` leaves the corresponding field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub learning_style: Option<LearningStyle>,
    pub interaction_count: Option<u64>,
}

/// What the authentication boundary hands back on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub role: Role,
    pub email: String,
}

impl From<&UserRecord> for Identity {
    fn from(record: &UserRecord) -> Self {
        Self {
            username: record.username.clone(),
            role: record.role,
            email: record.email.clone(),
        }
    }
}

/// Whether an authentication request is a sign-up or a sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Register,
    Login,
}

//=========================================================================================
// Course Content
//=========================================================================================

/// The full text of one loaded document (or one page of a PDF).
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub text: String,
    pub source: PathBuf,
    pub page: Option<u32>,
}

/// Where a chunk came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMetadata {
    pub source: PathBuf,
    pub page: Option<u32>,
    pub chunk_index: usize,
    /// Character offset of the chunk within its raw document.
    pub offset: usize,
}

/// A bounded text fragment ready for embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A chunk together with its vector, as stored in the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A search hit returned from the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

//=========================================================================================
// Conversation
//=========================================================================================

/// The response mode controlling which prompt template is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Persona {
    #[default]
    Teacher,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DifficultyLevel {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl DifficultyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyLevel::Easy => "easy",
            DifficultyLevel::Medium => "medium",
            DifficultyLevel::Hard => "hard",
        }
    }
}
