pub mod accounts;
pub mod chunking;
pub mod commands;
pub mod domain;
pub mod embedding;
pub mod knowledge;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod ports;
pub mod prompts;
pub mod tutor;

pub use accounts::{hash_password, AccountError, AccountResult, Accounts};
pub use chunking::{Chunker, ChunkerConfig};
pub use domain::{
    AuthMode, ChunkMetadata, DifficultyLevel, DocumentChunk, EmbeddingEntry, Identity,
    LearningStyle, Persona, RawDocument, RetrievedChunk, Role, UserRecord, UserUpdate,
};
pub use embedding::{HashEmbedder, HashEmbedderConfig};
pub use knowledge::{IngestError, IngestReport, KnowledgeBase};
pub use ports::{
    CorpusSource, EmbeddingService, LanguageModelService, PortError, PortResult, TextStream,
    UserStore, VectorIndex,
};
pub use prompts::{PromptRequest, PromptTemplates};
pub use tutor::{Reply, SessionContext, SessionOpening, Tutor, RETRY_MESSAGE};
