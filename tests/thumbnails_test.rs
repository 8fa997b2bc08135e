//! Thumbnail sampling across the edited timeline.

mod common;

use clipforge::{ClipOptions, EngineConfig};
use common::{audio_only, video_only, TestHarness};

const S: u64 = 1_000_000;

#[tokio::test]
async fn test_default_cadence() {
    let harness = TestHarness::new();
    let clip = harness.clip(video_only(60)).await;

    let thumbs = clip.thumbnails().await.unwrap();
    assert_eq!(thumbs.len(), 9);
    for (i, thumb) in thumbs.iter().enumerate() {
        assert_eq!(thumb.timestamp, i as u64 * 7 * S);
        assert_eq!(thumb.image.width(), 100);
        // 32x18 source scaled to 100 wide
        assert_eq!(thumb.image.height(), 56);
    }
}

#[tokio::test]
async fn test_custom_cadence_after_edit() {
    let harness = TestHarness::new();
    let mut engine = EngineConfig::default();
    engine.thumbnail.interval_us = 5 * S;
    engine.thumbnail.width = 64;

    let mut clip = harness
        .clip_with(video_only(30), ClipOptions::with_engine(engine))
        .await;
    clip.delete_range(0, 14 * S).unwrap();

    let thumbs = clip.thumbnails().await.unwrap();
    // 16 s left at a 5 s cadence
    assert_eq!(thumbs.len(), 4);
    assert_eq!(thumbs[3].timestamp, 15 * S);
    assert_eq!(thumbs[0].image.width(), 64);
    assert_eq!(thumbs[0].image.height(), 36);
}

#[tokio::test]
async fn test_audio_only_has_no_thumbnails() {
    let harness = TestHarness::new();
    let clip = harness.clip(audio_only(10)).await;
    assert!(clip.thumbnails().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sampling_leaves_tick_cursor_alone() {
    let harness = TestHarness::new();
    let mut clip = harness.clip(video_only(20)).await;

    let first = clip.tick(0).await.unwrap().video.unwrap();
    assert_eq!(first.timestamp, 0);

    let thumbs = clip.thumbnails().await.unwrap();
    assert_eq!(thumbs.len(), 3);

    let next = clip.tick(50_000).await.unwrap().video.unwrap();
    assert_eq!(next.timestamp, 41_667);
}
