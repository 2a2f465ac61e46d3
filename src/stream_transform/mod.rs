//! Stream transformations for model delta streams.

pub mod segmenter;

pub use segmenter::{ChunkSegmenter, SegmentTimings, BOUNDARY_CHARS};

use std::sync::{Arc, OnceLock};

use futures::stream::BoxStream;
use futures::StreamExt;
use regex::Regex;

use crate::error::TagloopError;
use crate::types::TextStreamDelta;

/// A boxed stream of model deltas.
pub type DeltaStream = BoxStream<'static, Result<TextStreamDelta, TagloopError>>;

/// Trait for transforming a stream of text deltas.
pub trait StreamTransform: Send + Sync {
    /// Transform the stream.
    fn transform(&self, stream: DeltaStream) -> DeltaStream;
}

/// Map/transform each delta's text.
pub struct MapTransform {
    mapper: Arc<dyn Fn(String) -> String + Send + Sync>,
}

impl MapTransform {
    pub fn new<F>(mapper: F) -> Self
    where
        F: Fn(String) -> String + Send + Sync + 'static,
    {
        Self {
            mapper: Arc::new(mapper),
        }
    }

    /// The default cleaning filter applied before segmentation.
    pub fn cleaner() -> Self {
        Self::new(|text| clean_text(&text))
    }
}

impl StreamTransform for MapTransform {
    fn transform(&self, stream: DeltaStream) -> DeltaStream {
        let mapper = self.mapper.clone();
        let transformed = async_stream::stream! {
            let mut inner = std::pin::pin!(stream);
            while let Some(item) = inner.next().await {
                match item {
                    Ok(mut delta) => {
                        if !delta.text.is_empty() {
                            delta.text = (mapper)(delta.text);
                        }
                        yield Ok(delta);
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };
        Box::pin(transformed)
    }
}

/// Text-cleaning filter applied to model deltas. Currently a pass-through.
pub fn clean_text(text: &str) -> String {
    text.to_string()
}

/// Drop everything except word characters, whitespace, CJK ideographs and
/// sentence punctuation. Suitable as a [`MapTransform`] ahead of a speech
/// synthesizer.
pub fn strip_to_speakable(text: &str) -> String {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"[^\w\s,，.!?。！？:：;；\x{4e00}-\x{9fff}]").ok()
    });
    match pattern {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}
