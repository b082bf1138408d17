use proptest::prelude::*;
use reframe_core::config::FramingConfig;
use reframe_core::engine::FramingEngine;
use reframe_core::smoother::CropSizing;
use reframe_model::detection::Detection;
use reframe_model::geometry::{AspectRatio, BoundingBox, FrameSize};

fn detection_strategy() -> impl Strategy<Value = Detection> {
    (
        -200.0..2200.0f64,
        -200.0..1300.0f64,
        1.0..900.0f64,
        1.0..1100.0f64,
        0.0..1.0f64,
    )
        .prop_map(|(x, y, w, h, confidence)| {
            Detection::new(BoundingBox::new(x, y, w, h), confidence)
        })
}

fn frames_strategy() -> impl Strategy<Value = Vec<Vec<Detection>>> {
    prop::collection::vec(prop::collection::vec(detection_strategy(), 0..4), 1..120)
}

fn source_strategy() -> impl Strategy<Value = FrameSize> {
    (64u32..2600, 64u32..2600).prop_map(|(w, h)| FrameSize::new(w, h))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn windows_keep_aspect_and_stay_inside_frame(
        source in source_strategy(),
        frames in frames_strategy(),
        seed in any::<u64>(),
        subject_sizing in any::<bool>(),
    ) {
        let mut config = FramingConfig::default();
        if subject_sizing {
            config.smoother.sizing = CropSizing::Subject { scale: 1.6, min_height_frac: 0.4 };
        }
        let max_zoom = config.zoom.max_zoom;
        let aspect = config.aspect;
        let mut engine = FramingEngine::with_seed(config, source, 30.0, seed).unwrap();

        for raw in &frames {
            let plan = engine.process(raw);
            prop_assert!(plan.window.has_aspect(aspect));
            prop_assert!(plan.window.fits_within(source));
            prop_assert!(plan.final_window.has_aspect(aspect));
            prop_assert!(plan.final_window.fits_within(source));
            prop_assert!(plan.zoom >= 1.0 && plan.zoom <= max_zoom);
            prop_assert!(plan.effective_zoom >= 1.0 && plan.effective_zoom <= max_zoom);
            if plan.degraded {
                prop_assert_eq!(plan.effective_zoom, 1.0);
            }
        }
    }

    #[test]
    fn smoothed_motion_is_bounded_between_cuts(
        frames in frames_strategy(),
        seed in any::<u64>(),
    ) {
        let source = FrameSize::new(1920, 1080);
        let config = FramingConfig::default();
        let limit = config.smoother.max_step_frac.unwrap_or(1.0) * source.w();
        let mut engine = FramingEngine::with_seed(config, source, 30.0, seed).unwrap();

        let mut prev = engine.process(&frames[0]);
        for raw in &frames[1..] {
            let plan = engine.process(raw);
            if !plan.hard_cut {
                let moved = (plan.window.center_x - prev.window.center_x).abs();
                prop_assert!(moved <= limit + 1e-6, "moved {} > {}", moved, limit);
            }
            prev = plan;
        }
    }

    #[test]
    fn effective_zoom_respects_min_visible_area(
        min_visible_area in 0.3..1.0f64,
        seed in any::<u64>(),
    ) {
        let mut config = FramingConfig::default();
        config.zoom.max_zoom = 3.0;
        config.zoom.amplitude_min = 1.0;
        config.zoom.amplitude_max = 2.0;
        config.zoom.min_visible_area = min_visible_area;
        let source = FrameSize::new(1920, 1080);
        let mut engine = FramingEngine::with_seed(config, source, 30.0, seed).unwrap();

        for _ in 0..400 {
            let plan = engine.process(&[]);
            let visible = plan.final_window.area() / plan.window.area();
            prop_assert!(visible >= min_visible_area - 1e-9);
            prop_assert!(plan.final_window.has_aspect(AspectRatio::VERTICAL));
        }
    }
}
