//! In-memory vector index.
//!
//! Useful for testing and small datasets.

use super::{rank_records, validate_records, IndexedVideo, SearchResult, VectorIndex, VectorRecord};
use crate::error::{ClipseekError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct State {
    /// Records in insertion order.
    records: Vec<VectorRecord>,
    /// Position of each record id in `records`.
    positions: HashMap<String, usize>,
    dimensions: Option<usize>,
}

impl State {
    fn put(&mut self, record: VectorRecord) {
        match self.positions.get(&record.id) {
            Some(&pos) => self.records[pos] = record,
            None => {
                self.positions.insert(record.id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    fn reindex(&mut self) {
        self.positions = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
    }
}

/// In-memory vector index.
pub struct MemoryVectorStore {
    state: RwLock<State>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector index.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| ClipseekError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| ClipseekError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorStore {
    async fn exists(&self, video_id: &str) -> Result<bool> {
        let state = self.read()?;
        Ok(state.records.iter().any(|r| r.video_id == video_id))
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        let mut state = self.write()?;
        state.dimensions = validate_records(state.dimensions, None, records)?;
        for record in records {
            state.put(record.clone());
        }
        Ok(records.len())
    }

    async fn insert_if_absent(&self, video_id: &str, records: &[VectorRecord]) -> Result<bool> {
        let mut state = self.write()?;
        if state.records.iter().any(|r| r.video_id == video_id) {
            return Ok(false);
        }
        state.dimensions = validate_records(state.dimensions, Some(video_id), records)?;
        for record in records {
            state.put(record.clone());
        }
        Ok(true)
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        video_id: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        let state = self.read()?;
        let candidates = state
            .records
            .iter()
            .filter(|r| video_id.is_none_or(|vid| r.video_id == vid))
            .cloned();
        Ok(rank_records(query_embedding, candidates, limit))
    }

    async fn count_for_video(&self, video_id: &str) -> Result<usize> {
        let state = self.read()?;
        Ok(state.records.iter().filter(|r| r.video_id == video_id).count())
    }

    async fn delete_by_video_id(&self, video_id: &str) -> Result<usize> {
        let mut state = self.write()?;
        let initial_len = state.records.len();
        state.records.retain(|r| r.video_id != video_id);
        state.reindex();
        Ok(initial_len - state.records.len())
    }

    async fn list_videos(&self) -> Result<Vec<IndexedVideo>> {
        let state = self.read()?;

        let mut video_map: HashMap<String, IndexedVideo> = HashMap::new();

        for record in &state.records {
            let entry = video_map
                .entry(record.video_id.clone())
                .or_insert_with(|| IndexedVideo {
                    video_id: record.video_id.clone(),
                    chunk_count: 0,
                    last_start_seconds: 0.0,
                    indexed_at: record.indexed_at,
                });

            entry.chunk_count += 1;
            if record.start > entry.last_start_seconds {
                entry.last_start_seconds = record.start;
            }
            if record.indexed_at > entry.indexed_at {
                entry.indexed_at = record.indexed_at;
            }
        }

        let mut videos: Vec<IndexedVideo> = video_map.into_values().collect();
        videos.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));

        Ok(videos)
    }

    async fn record_count(&self) -> Result<usize> {
        Ok(self.read()?.records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::test_record;

    #[tokio::test]
    async fn test_memory_vector_store() {
        let store = MemoryVectorStore::new();
        assert!(!store.exists("video1").await.unwrap());

        let records = vec![
            test_record("video1", 1, vec![1.0, 0.0, 0.0]),
            test_record("video1", 2, vec![0.0, 1.0, 0.0]),
            test_record("video2", 1, vec![0.9, 0.1, 0.0]),
        ];
        store.upsert(&records).await.unwrap();

        assert!(store.exists("video1").await.unwrap());
        assert_eq!(store.record_count().await.unwrap(), 3);

        let results = store.search(&[1.0, 0.0, 0.0], 10, None).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].score >= results[1].score);

        let scoped = store.search(&[1.0, 0.0, 0.0], 10, Some("video2")).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].record.id, "video2#text1");

        let videos = store.list_videos().await.unwrap();
        assert_eq!(videos.len(), 2);

        assert_eq!(store.delete_by_video_id("video1").await.unwrap(), 2);
        assert!(!store.exists("video1").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let store = MemoryVectorStore::new();
        store.upsert(&[test_record("v", 1, vec![1.0, 0.0])]).await.unwrap();
        store.upsert(&[test_record("v", 1, vec![0.0, 1.0])]).await.unwrap();

        assert_eq!(store.count_for_video("v").await.unwrap(), 1);
        let results = store.search(&[0.0, 1.0], 1, None).await.unwrap();
        assert!((results[0].score - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_insert_if_absent() {
        let store = MemoryVectorStore::new();
        let first = vec![test_record("v", 1, vec![1.0, 0.0]), test_record("v", 2, vec![0.0, 1.0])];
        assert!(store.insert_if_absent("v", &first).await.unwrap());

        let second = vec![test_record("v", 3, vec![1.0, 1.0])];
        assert!(!store.insert_if_absent("v", &second).await.unwrap());
        assert_eq!(store.count_for_video("v").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rejects_dimension_change() {
        let store = MemoryVectorStore::new();
        store.upsert(&[test_record("a", 1, vec![1.0, 0.0])]).await.unwrap();
        let err = store
            .insert_if_absent("b", &[test_record("b", 1, vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dimension"));
        assert!(!store.exists("b").await.unwrap());
    }
}
