//! Tests for the cleaning transform and chunk segmenter.

use futures::StreamExt;
use pretty_assertions::assert_eq;

use tagloop::error::TagloopError;
use tagloop::stream_transform::{
    strip_to_speakable, ChunkSegmenter, DeltaStream, MapTransform, StreamTransform,
};
use tagloop::types::{FinishReason, StreamChunk, TextStreamDelta};

fn deltas(parts: &[&str]) -> DeltaStream {
    let mut items: Vec<Result<TextStreamDelta, TagloopError>> = parts
        .iter()
        .map(|p| Ok(TextStreamDelta::text(*p)))
        .collect();
    items.push(Ok(TextStreamDelta::done(Some(FinishReason::Stop))));
    Box::pin(futures::stream::iter(items))
}

async fn collect(stream: DeltaStream) -> Vec<StreamChunk> {
    ChunkSegmenter::new()
        .segment(stream)
        .map(|c| c.unwrap())
        .collect()
        .await
}

#[tokio::test]
async fn chunks_concatenate_to_input_for_mixed_scripts() {
    let parts = [
        "今天北京",
        "天气晴，气温",
        "25度。",
        " Tomorrow: rain, ",
        "maybe! Done",
    ];
    let chunks = collect(deltas(&parts)).await;
    let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(joined, parts.concat());
    assert_eq!(
        chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
        vec!["今天北京天气晴，", "气温25度。", " Tomorrow:", " rain,", " maybe!", " Done"]
    );
    assert!(chunks.last().unwrap().is_final);
}

#[tokio::test]
async fn lone_boundary_is_held_until_the_buffer_grows() {
    let chunks = collect(deltas(&[",", "a", "."])).await;
    assert_eq!(
        chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
        vec![",a."]
    );
}

#[tokio::test]
async fn ascii_question_mark_is_not_a_boundary() {
    let chunks = collect(deltas(&["Why? Because."])).await;
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "Why? Because.");
    assert!(!chunks[0].is_final);
}

#[tokio::test]
async fn cleaner_then_segmenter_preserves_text() {
    let cleaned = MapTransform::cleaner().transform(deltas(&["<final_response>", "{\"content\":\"ok\"}", "</final_response>"]));
    let chunks = collect(cleaned).await;
    let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(joined, r#"<final_response>{"content":"ok"}</final_response>"#);
}

#[tokio::test]
async fn speakable_transform_can_be_swapped_in() {
    let speakable = MapTransform::new(|t| strip_to_speakable(&t)).transform(deltas(&["**Hi**, there."]));
    let chunks = collect(speakable).await;
    let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(joined, "Hi, there.");
}

const MIXED: &str = "今天北京天气晴，气温25度。Tomorrow: rain, maybe! 好的。x";

#[tokio::test]
async fn every_two_way_split_reproduces_the_input() {
    for (cut, _) in MIXED.char_indices().chain([(MIXED.len(), ' ')]) {
        let chunks = collect(deltas(&[&MIXED[..cut], &MIXED[cut..]])).await;
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, MIXED, "split at byte {cut}");
        assert!(chunks.iter().all(|c| c.text.chars().count() > 1 || c.is_final));
    }
}

#[tokio::test]
async fn one_character_per_delta_reproduces_the_input() {
    let parts: Vec<String> = MIXED.chars().map(String::from).collect();
    let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
    let per_char = collect(deltas(&parts)).await;
    let whole = collect(deltas(&[MIXED])).await;

    let joined: String = per_char.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(joined, MIXED);
    assert_eq!(
        per_char.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
        whole.iter().map(|c| c.text.as_str()).collect::<Vec<_>>()
    );
}
