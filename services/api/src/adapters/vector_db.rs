//! services/api/src/adapters/vector_db.rs
//!
//! SQLite-backed `VectorIndex`. Vectors are stored as little-endian `f32`
//! blobs and scored with cosine similarity in process; course corpora are
//! small enough that a full scan per query is fine.

use crate::adapters::sqlite::{open_pool, port_error};
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tutor_core::domain::{ChunkMetadata, EmbeddingEntry, RetrievedChunk};
use tutor_core::knowledge::cosine_similarity;
use tutor_core::ports::{PortResult, VectorIndex};

const DB_FILE: &str = "index.sqlite";

#[derive(Clone)]
pub struct SqliteVectorIndex {
    pool: SqlitePool,
}

impl SqliteVectorIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn open(dir: &Path) -> Result<Self, crate::error::ApiError> {
        let index = Self::new(open_pool(dir, DB_FILE).await?);
        index.run_migrations().await?;
        Ok(index)
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations/index").run(&self.pool).await
    }
}

#[derive(FromRow)]
struct EntryRow {
    source: String,
    page: Option<i64>,
    chunk_index: i64,
    char_offset: i64,
    text: String,
    vector: Vec<u8>,
}

impl EntryRow {
    fn vector(&self) -> Vec<f32> {
        bytemuck::pod_collect_to_vec::<u8, f32>(&self.vector)
    }

    fn into_hit(self, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            metadata: ChunkMetadata {
                source: PathBuf::from(self.source),
                page: self.page.map(|p| p as u32),
                chunk_index: self.chunk_index as usize,
                offset: self.char_offset as usize,
            },
            text: self.text,
            score,
        }
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn replace_all(&self, entries: Vec<EmbeddingEntry>) -> PortResult<usize> {
        // The delete and every insert commit together, so a concurrent search
        // sees either the previous index or the new one.
        let mut tx = self.pool.begin().await.map_err(port_error)?;
        sqlx::query("DELETE FROM entries")
            .execute(&mut *tx)
            .await
            .map_err(port_error)?;

        for entry in &entries {
            sqlx::query(
                "INSERT OR REPLACE INTO entries (id, source, page, chunk_index, char_offset, text, dims, vector) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&entry.id)
            .bind(entry.metadata.source.to_string_lossy().into_owned())
            .bind(entry.metadata.page.map(i64::from))
            .bind(entry.metadata.chunk_index as i64)
            .bind(entry.metadata.offset as i64)
            .bind(&entry.text)
            .bind(entry.vector.len() as i64)
            .bind(bytemuck::cast_slice::<f32, u8>(&entry.vector))
            .execute(&mut *tx)
            .await
            .map_err(port_error)?;
        }

        let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(&mut *tx)
            .await
            .map_err(port_error)?;
        tx.commit().await.map_err(port_error)?;

        if stored as usize != entries.len() {
            warn!("{} duplicate entries collapsed during index rebuild", entries.len() - stored as usize);
        }
        info!("Vector index now holds {} entries", stored);
        Ok(stored as usize)
    }

    async fn search(&self, vector: &[f32], k: usize) -> PortResult<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, EntryRow>(
            "SELECT source, page, chunk_index, char_offset, text, vector FROM entries WHERE dims = ?",
        )
        .bind(vector.len() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;

        let mut hits: Vec<RetrievedChunk> = rows
            .into_iter()
            .map(|row| {
                let score = cosine_similarity(vector, &row.vector());
                row.into_hit(score)
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> PortResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(count as usize)
    }
}
