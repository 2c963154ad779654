//! Token-bounded text splitting
//!
//! Text is cut at the coarsest boundary that yields pieces under the budget:
//! paragraphs, then lines, then sentences, then words, and finally raw cuts at
//! character boundaries for runs without any separator. Separators stay attached
//! to the preceding piece, so pieces tile the source exactly and chunk offsets
//! can be used to reassemble it. Pieces are then merged greedily into chunks
//! with a trailing overlap carried into the next chunk.

use super::models::TextChunk;
use super::registry::get_profile;
use super::token_counter::TokenCounter;
use super::token_estimator::TokenEstimator;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default overlap between adjacent chunks, in tokens
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Boundary levels, coarsest first
const BOUNDARY_LEVELS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];

/// Contiguous byte range of the source with its token count
#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    tokens: usize,
}

/// Splits long text into overlapping, token-bounded chunks
pub struct ChunkSplitter {
    estimator: Arc<dyn TokenEstimator>,
    chunk_size: usize,
    overlap_tokens: usize,
}

impl ChunkSplitter {
    pub fn new(estimator: Arc<dyn TokenEstimator>, chunk_size: usize, overlap_tokens: usize) -> Self {
        Self {
            estimator,
            chunk_size: chunk_size.max(1),
            overlap_tokens,
        }
    }

    /// Size chunks to the model's input budget (context window minus output reserve)
    pub fn for_model(counter: &dyn TokenCounter, model: &str, overlap_tokens: usize) -> Self {
        let profile = get_profile(model);
        Self::new(counter.estimator_for(model), profile.input_budget(), overlap_tokens)
    }

    /// Override the chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split text into chunks in document order
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        self.collect_pieces(text, 0, text.len(), 0, &mut pieces);
        let chunks = self.merge_pieces(text, &pieces);

        debug!(
            "Split {} bytes into {} pieces and {} chunks (chunk size {}, overlap {})",
            text.len(),
            pieces.len(),
            chunks.len(),
            self.chunk_size,
            self.overlap_tokens
        );

        chunks
    }

    fn collect_pieces(
        &self,
        source: &str,
        start: usize,
        end: usize,
        level: usize,
        pieces: &mut Vec<Piece>,
    ) {
        let tokens = self.estimator.estimate(&source[start..end]);
        if tokens <= self.chunk_size {
            pieces.push(Piece { start, end, tokens });
            return;
        }

        let Some(separators) = BOUNDARY_LEVELS.get(level) else {
            self.collect_raw(source, start, end, pieces);
            return;
        };

        let ends = boundaries(&source[start..end], separators);
        if ends.len() <= 1 {
            self.collect_pieces(source, start, end, level + 1, pieces);
            return;
        }

        let mut piece_start = start;
        for offset in ends {
            let piece_end = start + offset;
            self.collect_pieces(source, piece_start, piece_end, level + 1, pieces);
            piece_start = piece_end;
        }
    }

    /// Cut a span with no usable separator into the longest char-aligned
    /// prefixes that fit the chunk size
    fn collect_raw(&self, source: &str, start: usize, end: usize, pieces: &mut Vec<Piece>) {
        // End offset of every char, relative to `start`
        let char_ends: Vec<usize> = source[start..end]
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .collect();
        let tokens_to = |from: usize, idx: usize| {
            self.estimator.estimate(&source[from..start + char_ends[idx]])
        };

        let mut piece_start = start;
        let mut first = 0usize;
        while first < char_ends.len() {
            let mut fit = first;
            if tokens_to(piece_start, first) <= self.chunk_size {
                // Gallop forward, then bisect between the last fit and the first miss
                let mut step = 1usize;
                let mut miss = char_ends.len();
                loop {
                    let candidate = (fit + step).min(char_ends.len() - 1);
                    if candidate == fit {
                        break;
                    }
                    if tokens_to(piece_start, candidate) <= self.chunk_size {
                        fit = candidate;
                        step *= 2;
                    } else {
                        miss = candidate;
                        break;
                    }
                }
                while miss - fit > 1 && miss < char_ends.len() {
                    let mid = fit + (miss - fit) / 2;
                    if tokens_to(piece_start, mid) <= self.chunk_size {
                        fit = mid;
                    } else {
                        miss = mid;
                    }
                }
            } else {
                warn!(
                    "Single character at byte {} exceeds chunk size {}",
                    piece_start, self.chunk_size
                );
            }

            let piece_end = start + char_ends[fit];
            pieces.push(Piece {
                start: piece_start,
                end: piece_end,
                tokens: tokens_to(piece_start, fit),
            });
            piece_start = piece_end;
            first = fit + 1;
        }
    }

    fn merge_pieces(&self, source: &str, pieces: &[Piece]) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<Piece> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            if !window.is_empty() && total + piece.tokens > self.chunk_size {
                self.emit(source, window.make_contiguous(), &mut chunks);

                // Keep a trailing overlap that still leaves room for the next piece
                while let Some(front) = window.front() {
                    let over_overlap = total > self.overlap_tokens;
                    let no_room = total + piece.tokens > self.chunk_size && total > 0;
                    if !(over_overlap || no_room) {
                        break;
                    }
                    total -= front.tokens;
                    window.pop_front();
                }
            }

            total += piece.tokens;
            window.push_back(piece);
        }

        if !window.is_empty() {
            self.emit(source, window.make_contiguous(), &mut chunks);
        }

        chunks
    }

    /// Push the window as one chunk, bisecting it if merged text counts over budget
    fn emit(&self, source: &str, window: &[Piece], chunks: &mut Vec<TextChunk>) {
        let start = window[0].start;
        let end = window[window.len() - 1].end;
        let text = &source[start..end];
        let tokens = self.estimator.estimate(text);

        if tokens > self.chunk_size && window.len() > 1 {
            let mid = window.len() / 2;
            self.emit(source, &window[..mid], chunks);
            self.emit(source, &window[mid..], chunks);
            return;
        }

        chunks.push(TextChunk {
            sequence_index: chunks.len(),
            text: text.to_string(),
            approx_token_count: tokens,
            offset: start,
        });
    }
}

/// End offsets of the pieces of `slice` cut after each separator
fn boundaries(slice: &str, separators: &[&str]) -> Vec<usize> {
    let mut ends: Vec<usize> = separators
        .iter()
        .flat_map(|sep| slice.match_indices(sep).map(|(i, s)| i + s.len()))
        .collect();
    ends.push(slice.len());
    ends.sort_unstable();
    ends.dedup();
    ends
}

/// Rebuild the source text from chunks by dropping overlapping regions
pub fn reassemble(chunks: &[TextChunk]) -> String {
    let mut out = String::new();
    let mut covered = 0usize;

    for chunk in chunks {
        let end = chunk.offset + chunk.text.len();
        if end <= covered {
            continue;
        }
        let skip = covered.saturating_sub(chunk.offset);
        out.push_str(&chunk.text[skip..]);
        covered = end;
    }

    out
}
