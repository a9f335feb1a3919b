pub mod chat_llm;
pub mod course_loader;
pub mod embeddings;
pub mod sqlite;
pub mod user_db;
pub mod vector_db;

pub use chat_llm::OpenAiChatAdapter;
pub use course_loader::FsCourseLoader;
pub use embeddings::{build_embedder, OpenAiEmbeddingAdapter};
pub use user_db::SqliteUserStore;
pub use vector_db::SqliteVectorIndex;
