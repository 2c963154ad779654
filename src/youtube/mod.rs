//! Video transcripts

pub mod cache;
pub mod time;
pub mod transcript;
pub mod url;

pub use cache::TranscriptCache;
pub use time::format_timestamp;
pub use transcript::{format_transcript, TimedTextSource, TranscriptLoader, TranscriptSegment, TranscriptSource};
pub use self::url::video_id;
