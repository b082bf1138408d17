use std::path::PathBuf;

use reframe_core::config::FramingConfig;
use reframe_core::engine::{plan_clip, FramingEngine};
use reframe_model::detection::DetectionTimeline;
use reframe_model::geometry::FrameSize;
use reframe_model::trajectory::{SubjectId, TrackingState};

const SOURCE: FrameSize = FrameSize {
    width: 1920,
    height: 1080,
};

fn load_fixture_detections() -> DetectionTimeline {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fixtures")
        .join("sample-clip")
        .join("detections.jsonl");

    DetectionTimeline::load(path).expect("fixture detections should load")
}

#[test]
fn sample_clip_fixture_parses() {
    let timeline = load_fixture_detections();
    assert_eq!(timeline.last_frame(), Some(359));
    assert!(timeline.get(150).is_empty());
    assert_eq!(timeline.get(0).len(), 3);
    assert_eq!(timeline.get(205).len(), 2);
}

#[test]
fn sample_clip_state_timeline() {
    let timeline = load_fixture_detections();
    let trajectory =
        plan_clip(&FramingConfig::default(), SOURCE, 30.0, &timeline, 360, Some(17)).unwrap();
    let frames = &trajectory.frames;

    assert_eq!(frames.len(), 360);
    assert!(frames[0].hard_cut);
    assert!(frames[150..165]
        .iter()
        .all(|p| p.state == TrackingState::Coasting));
    assert_eq!(frames[165].state, TrackingState::Active);

    // The large, confident distractor on the left never takes over.
    assert!(frames[200..230]
        .iter()
        .all(|p| p.subject == Some(SubjectId(0))));
    assert!(frames[200..230].iter().all(|p| p.window.center_x > 1000.0));

    assert!(frames[230..260]
        .iter()
        .all(|p| p.state == TrackingState::Coasting));
    assert!(frames[260..330].iter().all(|p| p.state == TrackingState::Lost));
    assert!(frames[330].hard_cut);
    assert_eq!(frames[330].subject, Some(SubjectId(1)));

    let summary = trajectory.summary();
    assert_eq!(summary.active_frames, 245);
    assert_eq!(summary.coasting_frames, 45);
    assert_eq!(summary.lost_frames, 70);
    assert_eq!(summary.hard_cuts, 2);
    assert_eq!(summary.subjects, 2);
}

#[test]
fn sample_clip_normalizer_discards_noise() {
    let timeline = load_fixture_detections();
    let mut engine = FramingEngine::with_seed(FramingConfig::default(), SOURCE, 30.0, 1).unwrap();
    for frame in 0..360 {
        engine.process(timeline.get(frame));
    }

    let stats = engine.stats();
    // Duplicates every 10th frame and low-confidence noise every 25th frame
    // of the opening walk.
    assert_eq!(stats.normalize.suppressed, 15);
    assert_eq!(stats.normalize.below_threshold, 6);
    assert_eq!(stats.normalize.malformed, 0);
    assert_eq!(stats.acquisitions, 2);
    assert_eq!(stats.reacquisitions, 1);
    assert_eq!(stats.losses, 1);
}
