//! Transcript loading tool

use super::{url_list, Tool, ToolError};
use crate::youtube::TranscriptLoader;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Loads timestamped transcripts for YouTube videos
pub struct YoutubeTranscriptTool {
    loader: Arc<TranscriptLoader>,
}

impl YoutubeTranscriptTool {
    pub fn new(loader: Arc<TranscriptLoader>) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Tool for YoutubeTranscriptTool {
    fn name(&self) -> &'static str {
        "youtube_transcript_loader_tool"
    }

    fn description(&self) -> &'static str {
        "Use this tool to load transcript from youtube videos"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "youtube_video_links": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Links of the videos to load transcripts for. Links must contain \
`watch?v=`, `youtu.be/`, `/shorts/`, `/embed/` or `/live/` so the video id can be read from them."
                }
            },
            "required": ["youtube_video_links"]
        })
    }

    async fn invoke(&self, input: Value) -> Result<String, ToolError> {
        let links = url_list(&input, "youtube_video_links")?;
        if links.is_empty() {
            return Err(ToolError::Invalid("No video links given".to_string()));
        }

        let mut transcripts = Vec::with_capacity(links.len());
        for link in &links {
            let transcript = self.loader.load_formatted(link).await?;
            transcripts.push(format!("Transcript of {}:\n{}", link, transcript));
        }

        Ok(transcripts.join("\n\n"))
    }
}
