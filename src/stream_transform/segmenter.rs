//! Re-segment a model delta stream into sentence/clause chunks.
//!
//! Token deltas arrive at arbitrary split points. Downstream consumers such as
//! a speech synthesizer want whole clauses, so the segmenter buffers text until
//! it sees a boundary character and the buffer holds more than one character.
//! Concatenating every chunk of a turn reproduces the input text exactly.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::time::Instant;

use crate::error::TagloopError;
use crate::types::{StreamChunk, StreamEventType};

use super::DeltaStream;

/// Characters that close a chunk: ASCII and full-width clause punctuation.
pub const BOUNDARY_CHARS: [char; 11] = [
    ',', '.', '!', ';', ':', '，', '。', '！', '？', '：', '；',
];

/// A candidate chunk must be longer than this many characters to be emitted.
const MIN_CHUNK_CHARS: usize = 1;

fn is_boundary(ch: char) -> bool {
    BOUNDARY_CHARS.contains(&ch)
}

/// Latency bookkeeping shared between a segmenter and its observers.
#[derive(Debug, Default)]
pub struct SegmentTimings {
    first_chunk: OnceLock<Duration>,
}

impl SegmentTimings {
    /// Time from the start of segmentation to the first emitted chunk.
    pub fn first_chunk_latency(&self) -> Option<Duration> {
        self.first_chunk.get().copied()
    }

    fn record_first_chunk(&self, started: Instant) {
        let elapsed = started.elapsed();
        if self.first_chunk.set(elapsed).is_ok() {
            tracing::info!(latency_ms = elapsed.as_millis() as u64, "time to first chunk");
        }
    }
}

/// Splits one model turn's delta stream into [`StreamChunk`]s.
///
/// Each instance owns the buffer for exactly one stream; create a new one per
/// model turn.
#[derive(Debug, Default)]
pub struct ChunkSegmenter {
    timings: Arc<SegmentTimings>,
}

impl ChunkSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for reading latency after (or while) the stream is consumed.
    pub fn timings(&self) -> Arc<SegmentTimings> {
        self.timings.clone()
    }

    /// Consume `deltas` and lazily produce chunks.
    ///
    /// An upstream error is yielded once and ends the stream; whatever was
    /// buffered at that point is discarded.
    pub fn segment(
        self,
        deltas: DeltaStream,
    ) -> BoxStream<'static, Result<StreamChunk, TagloopError>> {
        let timings = self.timings;
        let chunks = async_stream::stream! {
            let started = Instant::now();
            let mut buffer = String::new();
            let mut buffered_chars = 0usize;
            let mut index = 0usize;
            let mut failed = false;
            let mut inner = std::pin::pin!(deltas);

            while let Some(item) = inner.next().await {
                let delta = match item {
                    Ok(delta) => delta,
                    Err(e) => {
                        failed = true;
                        yield Err(e);
                        break;
                    }
                };

                for ch in delta.text.chars() {
                    buffer.push(ch);
                    buffered_chars += 1;
                    if is_boundary(ch) && buffered_chars > MIN_CHUNK_CHARS {
                        timings.record_first_chunk(started);
                        yield Ok(StreamChunk {
                            text: std::mem::take(&mut buffer),
                            index,
                            is_final: false,
                        });
                        index += 1;
                        buffered_chars = 0;
                    }
                }

                if delta.event_type == StreamEventType::Done {
                    break;
                }
            }

            if !failed && !buffer.is_empty() {
                timings.record_first_chunk(started);
                yield Ok(StreamChunk {
                    text: buffer,
                    index,
                    is_final: true,
                });
            }
        };

        Box::pin(chunks)
    }
}
