//! Bounded in-memory transcript cache

use super::transcript::TranscriptSegment;
use crate::metrics::METRICS;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Transcripts keyed by video id, kept for the lifetime of the process
#[derive(Clone)]
pub struct TranscriptCache {
    entries: Cache<String, Arc<Vec<TranscriptSegment>>>,
}

impl TranscriptCache {
    /// Create a cache holding at most `max_entries` transcripts
    pub fn new(max_entries: u64, time_to_idle: Option<Duration>) -> Self {
        let mut builder = Cache::builder().max_capacity(max_entries);
        if let Some(idle) = time_to_idle {
            builder = builder.time_to_idle(idle);
        }

        Self {
            entries: builder.build(),
        }
    }

    /// Get a cached transcript
    pub async fn get(&self, video_id: &str) -> Option<Arc<Vec<TranscriptSegment>>> {
        let hit = self.entries.get(video_id).await;
        METRICS.record_transcript_cache(hit.is_some());
        hit
    }

    /// Store a transcript
    pub async fn insert(&self, video_id: &str, segments: Arc<Vec<TranscriptSegment>>) {
        self.entries.insert(video_id.to_string(), segments).await;
    }

    /// Number of cached transcripts (approximate until pending tasks run)
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }
}
