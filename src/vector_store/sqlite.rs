//! SQLite-based vector index.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity. A video's
//! transcript is a few hundred chunks at most, so a linear scan over the
//! video-scoped rows is cheap.

use super::{rank_records, validate_records, IndexedVideo, SearchResult, VectorIndex, VectorRecord};
use crate::error::{ClipseekError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS collections (
        name TEXT PRIMARY KEY,
        dimensions INTEGER
    );

    CREATE TABLE IF NOT EXISTS records (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        video_id TEXT NOT NULL,
        text TEXT NOT NULL,
        start_seconds REAL NOT NULL,
        duration_seconds REAL NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL,
        PRIMARY KEY (collection, id)
    );

    CREATE INDEX IF NOT EXISTS idx_records_video_id ON records(collection, video_id);
"#;

const INSERT_RECORD: &str = r#"
    INSERT OR REPLACE INTO records
    (collection, id, video_id, text, start_seconds, duration_seconds, embedding, indexed_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#;

/// SQLite-based vector index over a single named collection.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    collection: String,
}

impl SqliteVectorStore {
    /// Open (or create) the index at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path, collection: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let store = Self::with_connection(conn, collection)?;
        info!("Initialized SQLite vector index at {:?} (collection {})", path, collection);
        Ok(store)
    }

    /// Create an in-memory SQLite index (useful for testing).
    pub fn in_memory(collection: &str) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, collection)
    }

    fn with_connection(conn: Connection, collection: &str) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        conn.execute(
            "INSERT OR IGNORE INTO collections (name, dimensions) VALUES (?1, NULL)",
            params![collection],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
        })
    }

    /// Embedding dimensionality fixed by the first write, if anything was written.
    pub fn dimensions(&self) -> Result<Option<usize>> {
        let conn = self.lock()?;
        Self::stored_dimensions(&conn, &self.collection)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ClipseekError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<VectorRecord> {
        let embedding_bytes: Vec<u8> = row.get(5)?;
        let indexed_at_str: String = row.get(6)?;

        Ok(VectorRecord {
            id: row.get(0)?,
            video_id: row.get(1)?,
            text: row.get(2)?,
            start: row.get(3)?,
            duration: row.get(4)?,
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: parse_timestamp(&indexed_at_str),
        })
    }

    fn stored_dimensions(conn: &Connection, collection: &str) -> Result<Option<usize>> {
        let dims: Option<i64> = conn.query_row(
            "SELECT dimensions FROM collections WHERE name = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(dims.map(|d| d as usize))
    }

    fn video_exists(conn: &Connection, collection: &str, video_id: &str) -> Result<bool> {
        let hit: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM records WHERE collection = ?1 AND video_id = ?2 LIMIT 1",
                params![collection, video_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hit.is_some())
    }

    /// Write records inside an open transaction, recording the collection dimensionality.
    fn write_records(
        conn: &Connection,
        collection: &str,
        video_id: Option<&str>,
        records: &[VectorRecord],
    ) -> Result<()> {
        let expected = Self::stored_dimensions(conn, collection)?;
        let dims = validate_records(expected, video_id, records)?;

        if expected.is_none() {
            if let Some(d) = dims {
                conn.execute(
                    "UPDATE collections SET dimensions = ?1 WHERE name = ?2",
                    params![d as i64, collection],
                )?;
            }
        }

        let mut stmt = conn.prepare(INSERT_RECORD)?;
        for record in records {
            stmt.execute(params![
                collection,
                record.id,
                record.video_id,
                record.text,
                record.start,
                record.duration,
                Self::embedding_to_bytes(&record.embedding),
                record.indexed_at.to_rfc3339(),
            ])?;
        }
        Ok(())
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl VectorIndex for SqliteVectorStore {
    #[instrument(skip(self))]
    async fn exists(&self, video_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        Self::video_exists(&conn, &self.collection, video_id)
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        Self::write_records(&tx, &self.collection, None, records)?;
        tx.commit()?;

        info!("Upserted {} records", records.len());
        Ok(records.len())
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn insert_if_absent(&self, video_id: &str, records: &[VectorRecord]) -> Result<bool> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        if Self::video_exists(&tx, &self.collection, video_id)? {
            debug!("Video {} already present, nothing inserted", video_id);
            return Ok(false);
        }

        Self::write_records(&tx, &self.collection, Some(video_id), records)?;
        tx.commit()?;

        info!("Inserted {} records for video {}", records.len(), video_id);
        Ok(true)
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        video_id: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, video_id, text, start_seconds, duration_seconds, embedding, indexed_at
            FROM records
            WHERE collection = ?1 AND (?2 IS NULL OR video_id = ?2)
            ORDER BY rowid
            "#,
        )?;

        let records: Vec<VectorRecord> = stmt
            .query_map(params![self.collection, video_id], Self::row_to_record)?
            .collect::<rusqlite::Result<_>>()?;

        let results = rank_records(query_embedding, records, limit);
        debug!("Found {} matching records", results.len());
        Ok(results)
    }

    async fn count_for_video(&self, video_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1 AND video_id = ?2",
            params![self.collection, video_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    #[instrument(skip(self))]
    async fn delete_by_video_id(&self, video_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND video_id = ?2",
            params![self.collection, video_id],
        )?;

        info!("Deleted {} records for video {}", deleted, video_id);
        Ok(deleted)
    }

    async fn list_videos(&self) -> Result<Vec<IndexedVideo>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT video_id, COUNT(*) AS chunk_count,
                   MAX(start_seconds) AS last_start, MAX(indexed_at) AS indexed_at
            FROM records
            WHERE collection = ?1
            GROUP BY video_id
            ORDER BY indexed_at DESC
            "#,
        )?;

        let videos = stmt
            .query_map(params![self.collection], |row| {
                let indexed_at_str: String = row.get(3)?;
                Ok(IndexedVideo {
                    video_id: row.get(0)?,
                    chunk_count: row.get(1)?,
                    last_start_seconds: row.get(2)?,
                    indexed_at: parse_timestamp(&indexed_at_str),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(videos)
    }

    async fn record_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::test_record;

    #[tokio::test]
    async fn test_sqlite_vector_store() {
        let store = SqliteVectorStore::in_memory("test").unwrap();
        assert!(!store.exists("video1").await.unwrap());

        store
            .upsert(&[
                test_record("video1", 1, vec![1.0, 0.0, 0.0]),
                test_record("video1", 2, vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        assert!(store.exists("video1").await.unwrap());

        let videos = store.list_videos().await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].video_id, "video1");
        assert_eq!(videos[0].chunk_count, 2);
        assert_eq!(videos[0].last_start_seconds, 20.0);

        let results = store.search(&[1.0, 0.0, 0.0], 10, Some("video1")).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.id, "video1#text1");
        assert!((results[0].score - 1.0).abs() < 0.001);
        assert_eq!(results[0].record.text, "chunk 1 of video1");

        let deleted = store.delete_by_video_id("video1").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(!store.exists("video1").await.unwrap());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.db");

        {
            let store = SqliteVectorStore::new(&path, "videos").unwrap();
            assert!(!store.exists("abc").await.unwrap());
            assert_eq!(store.dimensions().unwrap(), None);
            store
                .insert_if_absent("abc", &[test_record("abc", 1, vec![0.6, 0.8])])
                .await
                .unwrap();
        }

        let reopened = SqliteVectorStore::new(&path, "videos").unwrap();
        assert!(reopened.exists("abc").await.unwrap());
        assert_eq!(reopened.count_for_video("abc").await.unwrap(), 1);
        assert_eq!(reopened.dimensions().unwrap(), Some(2));

        // Collections are independent within one file
        let other = SqliteVectorStore::new(&path, "other").unwrap();
        assert!(!other.exists("abc").await.unwrap());
        assert_eq!(other.dimensions().unwrap(), None);
    }

    #[tokio::test]
    async fn test_insert_if_absent_is_idempotent() {
        let store = SqliteVectorStore::in_memory("test").unwrap();
        let records = vec![
            test_record("v", 1, vec![1.0, 0.0]),
            test_record("v", 2, vec![0.0, 1.0]),
        ];

        assert!(store.insert_if_absent("v", &records).await.unwrap());
        assert!(!store.insert_if_absent("v", &records).await.unwrap());
        assert_eq!(store.count_for_video("v").await.unwrap(), 2);
        assert_eq!(store.record_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rejects_dimension_change_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");

        {
            let store = SqliteVectorStore::new(&path, "videos").unwrap();
            store.upsert(&[test_record("a", 1, vec![1.0, 0.0])]).await.unwrap();
        }

        let store = SqliteVectorStore::new(&path, "videos").unwrap();
        let err = store
            .insert_if_absent("b", &[test_record("b", 1, vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dimension"));
        assert!(!store.exists("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_rejects_foreign_records() {
        let store = SqliteVectorStore::in_memory("test").unwrap();
        let result = store
            .insert_if_absent("v", &[test_record("w", 1, vec![1.0])])
            .await;
        assert!(result.is_err());
        assert_eq!(store.record_count().await.unwrap(), 0);
    }
}
