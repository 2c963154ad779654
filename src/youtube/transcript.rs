//! Transcript retrieval and formatting

use super::cache::TranscriptCache;
use super::time::format_timestamp;
use super::url::video_id;
use crate::config::TranscriptConfig;
use crate::tools::{http_error, ToolError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// One captioned span of a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start, in seconds
    pub start: f64,
    /// Duration, in seconds
    pub duration: f64,
    pub text: String,
}

impl TranscriptSegment {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Source of raw transcripts
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch_transcript(&self, video_id: &str) -> Result<Vec<TranscriptSegment>, ToolError>;
}

/// Reads captions from YouTube's `timedtext` endpoint in `json3` format
pub struct TimedTextSource {
    http: Client,
    endpoint: String,
    language: String,
    timeout: Duration,
}

impl TimedTextSource {
    pub fn new(config: &TranscriptConfig, user_agent: &str, timeout: Duration) -> Result<Self, ToolError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ToolError::Exec(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.timedtext_url.clone(),
            language: config.language.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl TranscriptSource for TimedTextSource {
    async fn fetch_transcript(&self, video_id: &str) -> Result<Vec<TranscriptSegment>, ToolError> {
        debug!("Fetching transcript for {} ({})", video_id, self.language);

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("v", video_id), ("lang", self.language.as_str()), ("fmt", "json3")])
            .send()
            .await
            .map_err(|e| http_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Upstream(format!(
                "Transcript request for {} returned {}",
                video_id, status
            )));
        }

        let body = response.text().await.map_err(|e| http_error(e, self.timeout))?;
        if body.trim().is_empty() {
            return Err(ToolError::Upstream(format!(
                "No transcript available for video {}",
                video_id
            )));
        }

        let parsed: TimedText = serde_json::from_str(&body)?;
        let segments: Vec<TranscriptSegment> = parsed
            .events
            .into_iter()
            .filter_map(|event| {
                let text = event
                    .segs
                    .iter()
                    .map(|seg| seg.utf8.as_str())
                    .collect::<String>()
                    .replace('\n', " ");
                let text = text.trim();
                (!text.is_empty()).then(|| TranscriptSegment {
                    start: event.t_start_ms as f64 / 1000.0,
                    duration: event.d_duration_ms as f64 / 1000.0,
                    text: text.to_string(),
                })
            })
            .collect();

        if segments.is_empty() {
            return Err(ToolError::Upstream(format!(
                "No transcript available for video {}",
                video_id
            )));
        }

        Ok(segments)
    }
}

#[derive(Debug, Deserialize)]
struct TimedText {
    #[serde(default)]
    events: Vec<TimedTextEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimedTextEvent {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    #[serde(default)]
    segs: Vec<TimedTextSeg>,
}

#[derive(Debug, Deserialize)]
struct TimedTextSeg {
    #[serde(default)]
    utf8: String,
}

/// Render segments as `HH:MM:SS.mmm - HH:MM:SS.mmm: text` lines
pub fn format_transcript(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|segment| {
            format!(
                "{} - {}: {}",
                format_timestamp(segment.start),
                format_timestamp(segment.end()),
                segment.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Loads transcripts through the cache
pub struct TranscriptLoader {
    source: Arc<dyn TranscriptSource>,
    cache: TranscriptCache,
}

impl TranscriptLoader {
    pub fn new(source: Arc<dyn TranscriptSource>, cache: TranscriptCache) -> Self {
        Self { source, cache }
    }

    /// Segments for a video id, fetched once per cache lifetime
    pub async fn load(&self, video_id: &str) -> Result<Arc<Vec<TranscriptSegment>>, ToolError> {
        if let Some(cached) = self.cache.get(video_id).await {
            debug!("Transcript cache hit for {}", video_id);
            return Ok(cached);
        }

        let segments = Arc::new(self.source.fetch_transcript(video_id).await?);
        info!("Loaded transcript for {} ({} segments)", video_id, segments.len());
        self.cache.insert(video_id, segments.clone()).await;
        Ok(segments)
    }

    /// Formatted transcript for a video link
    pub async fn load_formatted(&self, link: &str) -> Result<String, ToolError> {
        let id = video_id(link)
            .ok_or_else(|| ToolError::Invalid(format!("Not a YouTube video link: {}", link)))?;
        let segments = self.load(&id).await?;
        Ok(format_transcript(&segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranscriptSource for CountingSource {
        async fn fetch_transcript(&self, video_id: &str) -> Result<Vec<TranscriptSegment>, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                TranscriptSegment {
                    start: 0.0,
                    duration: 2.5,
                    text: format!("intro to {}", video_id),
                },
                TranscriptSegment {
                    start: 2.5,
                    duration: 1.0,
                    text: "second line".to_string(),
                },
            ])
        }
    }

    fn source(url: &str) -> TimedTextSource {
        let config = TranscriptConfig {
            timedtext_url: url.to_string(),
            ..TranscriptConfig::default()
        };
        TimedTextSource::new(&config, "test-agent", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_format_transcript() {
        let segments = vec![TranscriptSegment {
            start: 61.0,
            duration: 2.5,
            text: "hello".to_string(),
        }];
        assert_eq!(format_transcript(&segments), "00:01:01.000 - 00:01:03.500: hello");
    }

    #[tokio::test]
    async fn test_loader_serves_repeats_from_cache() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let loader = TranscriptLoader::new(source.clone(), TranscriptCache::new(10, None));

        let first = loader
            .load_formatted("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap();
        let second = loader
            .load_formatted("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert!(first.starts_with("00:00:00.000 - 00:00:02.500: intro to dQw4w9WgXcQ"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loader_rejects_non_video_links() {
        let loader = TranscriptLoader::new(
            Arc::new(CountingSource {
                calls: AtomicUsize::new(0),
            }),
            TranscriptCache::new(10, None),
        );
        let result = loader.load_formatted("https://example.com").await;
        assert!(matches!(result, Err(ToolError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_timedtext_json3_parsing() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/timedtext")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("v".into(), "dQw4w9WgXcQ".into()),
                mockito::Matcher::UrlEncoded("fmt".into(), "json3".into()),
                mockito::Matcher::UrlEncoded("lang".into(), "en".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"events":[
                    {"tStartMs":0,"dDurationMs":1500,"segs":[{"utf8":"Never gonna "},{"utf8":"give you up"}]},
                    {"tStartMs":1500,"dDurationMs":500,"segs":[{"utf8":"\n"}]},
                    {"tStartMs":2000,"dDurationMs":1000,"segs":[{"utf8":"never gonna\nlet you down"}]}
                ]}"#,
            )
            .create_async()
            .await;

        let segments = source(&format!("{}/api/timedtext", server.url()))
            .fetch_transcript("dQw4w9WgXcQ")
            .await
            .unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Never gonna give you up");
        assert_eq!(segments[0].duration, 1.5);
        assert_eq!(segments[1].start, 2.0);
        assert_eq!(segments[1].text, "never gonna let you down");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_timedtext_empty_body_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/timedtext")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let result = source(&format!("{}/api/timedtext", server.url()))
            .fetch_transcript("dQw4w9WgXcQ")
            .await;
        assert!(matches!(result, Err(ToolError::Upstream(_))));
    }
}
