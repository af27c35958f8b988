use std::cell::RefCell;

use super::*;
use crate::puppet::fixture::{Recorded, RecordingContext, loaded};
use crate::puppet::loader::MemoryPuppetLoader;
use crate::render::frame_loop::ManualScheduler;

struct Harness {
    stage: PuppetStage,
    rec: Rc<RefCell<Recorded>>,
    scheduler: Rc<ManualScheduler>,
}

fn harness(surface: PixelSize, display: Option<PixelSize>) -> Harness {
    let (ctx, rec) = RecordingContext::shared(surface);
    let loader = MemoryPuppetLoader::new().with("tester", loaded());
    let scheduler = Rc::new(ManualScheduler::new());
    let options = StageOptions {
        surface,
        display,
        ..StageOptions::default()
    };
    let stage = PuppetStage::with_context(options, ctx, Rc::new(loader), scheduler.clone()).unwrap();
    Harness {
        stage,
        rec,
        scheduler,
    }
}

fn load(h: &Harness) {
    let outcome = pollster::block_on(h.stage.load(PuppetSource::new("tester"))).unwrap();
    assert_eq!(outcome, LoadOutcome::Installed);
}

fn secs(s: f64) -> FrameTime {
    FrameTime::from_secs_f64(s)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn wide_display_without_puppet() {
    let h = harness(PixelSize::new(400, 400), Some(PixelSize::new(1600, 400)));
    let params = h.stage.adaptive_params().unwrap();
    assert!(approx(params.view_bounds.top(), 0.25 * 1.2));
    assert!(approx(params.view_bounds.bottom(), -0.3));
    assert_eq!(params.model_position, Vec2::new(0.0, -0.1));
    assert!(approx(params.model_scale, 1.6f64.powf(0.15) * 0.9));
    assert_eq!(h.stage.view().unwrap().bounds(), params.view_bounds);
    assert_eq!(h.stage.model_canvas_size(), None);
}

#[test]
fn loading_a_puppet_relayouts_for_its_aspect() {
    let h = harness(PixelSize::new(400, 400), Some(PixelSize::new(1600, 400)));
    load(&h);
    let params = h.stage.adaptive_params().unwrap();
    // Aspect 0.5 falls in the 1.3 tier.
    assert!(approx(params.view_bounds.top(), 0.25 * 1.2 * 1.3));
    let scale = h.stage.with_puppet(|p| p.model_scale()).unwrap();
    assert_eq!(scale, params.model_scale);
    assert_eq!(h.stage.lifecycle_state(), LifecycleState::Active);
}

#[test]
fn new_rejects_gpu_backend() {
    let options = StageOptions {
        backend: BackendKind::Gpu,
        ..StageOptions::default()
    };
    let err = PuppetStage::new(
        options,
        Rc::new(MemoryPuppetLoader::new()),
        Rc::new(ManualScheduler::new()),
    )
    .unwrap_err();
    assert!(matches!(err, PuppetError::Context(_)));
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let (ctx, _) = RecordingContext::shared(PixelSize::new(100, 100));
    let options = StageOptions {
        config: AdaptiveConfig {
            min_scale: 5.0,
            ..AdaptiveConfig::default()
        },
        ..StageOptions::default()
    };
    let res = PuppetStage::with_context(
        options,
        ctx,
        Rc::new(MemoryPuppetLoader::new()),
        Rc::new(ManualScheduler::new()),
    );
    assert!(matches!(res, Err(PuppetError::Configuration(_))));
}

#[test]
fn adaptive_canvas_size_follows_the_puppet_aspect() {
    let h = harness(PixelSize::new(400, 400), None);
    assert_eq!(h.stage.calculate_adaptive_canvas_size(300), None);
    assert!(!h.stage.apply_adaptive_canvas_size(300));

    load(&h);
    assert_eq!(h.stage.model_canvas_size(), Some(PixelSize::new(200, 400)));
    assert_eq!(h.stage.calculate_adaptive_canvas_size(0), None);
    assert_eq!(
        h.stage.calculate_adaptive_canvas_size(301),
        Some(PixelSize::new(301, 602))
    );

    assert!(h.stage.apply_adaptive_canvas_size(300));
    let size = PixelSize::new(300, 600);
    assert_eq!(h.stage.lifecycle().context().borrow().surface_size(), size);
    assert_eq!(h.stage.view().unwrap().canvas_size(), size);
    assert_eq!(h.stage.adaptive_status().unwrap().last_applied_size, Some(size));
}

#[test]
fn config_updates_merge_shallowly() {
    let h = harness(PixelSize::new(400, 400), Some(PixelSize::new(1600, 400)));
    h.stage
        .update_adaptive_config(&serde_json::json!({ "verticalExpansion": 1.0 }))
        .unwrap();
    let status = h.stage.adaptive_status().unwrap();
    assert!(status.enabled);
    assert_eq!(status.config.vertical_expansion, 1.0);
    assert_eq!(status.config.debounce_ms, 100);
    assert!(approx(h.stage.adaptive_params().unwrap().view_bounds.top(), 0.25));

    assert!(h.stage.update_adaptive_config(&serde_json::json!(5)).is_err());
    assert!(
        h.stage
            .update_adaptive_config(&serde_json::json!({ "minScale": 3.0 }))
            .is_err()
    );
    assert_eq!(h.stage.adaptive_status().unwrap().config.min_scale, 0.5);
}

#[test]
fn disabled_config_uses_unit_bounds_and_base_scale() {
    let h = harness(PixelSize::new(400, 400), Some(PixelSize::new(1600, 400)));
    h.stage
        .update_adaptive_config(&serde_json::json!({ "enabled": false, "baseScale": 0.7 }))
        .unwrap();
    let params = h.stage.adaptive_params().unwrap();
    assert_eq!(params.view_bounds, ViewBounds::UNIT);
    assert_eq!(params.model_scale, 0.7);
    assert_eq!(params.model_position, Vec2::ZERO);
    assert!(!h.stage.adaptive_status().unwrap().enabled);
}

#[test]
fn set_container_size_applies_immediately() {
    let h = harness(PixelSize::new(400, 400), Some(PixelSize::new(1600, 400)));
    h.stage.set_container_size(PixelSize::new(800, 400));
    assert!(approx(h.stage.adaptive_params().unwrap().view_bounds.top(), 0.6));
}

#[test]
fn notified_container_size_waits_for_the_debounce() {
    let h = harness(PixelSize::new(400, 400), Some(PixelSize::new(1600, 400)));
    h.stage.start();
    h.scheduler.fire(secs(0.0));
    h.stage.notify_container_size(PixelSize::new(800, 400));

    h.scheduler.fire(secs(0.05));
    assert!(approx(h.stage.adaptive_params().unwrap().view_bounds.top(), 0.3));

    h.scheduler.fire(secs(0.2));
    assert!(approx(h.stage.adaptive_params().unwrap().view_bounds.top(), 0.6));
}

#[test]
fn debounce_runs_from_the_first_frame_after_the_notification() {
    let h = harness(PixelSize::new(400, 400), Some(PixelSize::new(1600, 400)));
    h.stage.start();
    h.scheduler.fire(secs(0.0));
    h.stage.notify_container_size(PixelSize::new(800, 400));

    // A long idle gap does not count towards the delay.
    h.scheduler.fire(secs(5.0));
    assert!(approx(h.stage.adaptive_params().unwrap().view_bounds.top(), 0.3));
    h.scheduler.fire(secs(5.05));
    assert!(approx(h.stage.adaptive_params().unwrap().view_bounds.top(), 0.3));

    // A second notification restarts the delay.
    h.stage.notify_container_size(PixelSize::new(400, 400));
    h.scheduler.fire(secs(5.12));
    assert!(approx(h.stage.adaptive_params().unwrap().view_bounds.top(), 0.3));
    h.scheduler.fire(secs(5.3));
    assert!(approx(h.stage.adaptive_params().unwrap().view_bounds.top(), 1.0));
}

#[test]
fn frames_clear_draw_and_present() {
    let h = harness(PixelSize::new(400, 400), None);
    h.stage.start();
    h.scheduler.fire(secs(0.0));
    assert_eq!(h.rec.borrow().clears, 1);
    assert!(h.rec.borrow().draws.is_empty());

    load(&h);
    h.scheduler.fire(secs(0.016));
    h.scheduler.fire(secs(0.032));
    let rec = h.rec.borrow();
    assert_eq!(rec.presents, 3);
    assert_eq!(rec.draws.len(), 4);
    assert_eq!(h.stage.frame_count(), 3);
    drop(rec);
    assert!(h.stage.last_frame().is_some());
}

#[test]
fn taps_route_to_hit_areas() {
    let h = harness(PixelSize::new(400, 400), None);
    load(&h);

    // Lower half of the surface lands on the body.
    h.stage.handle_input(&InputEvent::PointerDown { x: 200.0, y: 300.0 });
    let motion = h.stage.with_puppet(|p| p.current_motion().map(str::to_owned)).unwrap();
    assert!(matches!(motion.as_deref(), Some("wave" | "nod")));
    assert_eq!(h.stage.with_puppet(|p| p.current_expression().is_some()), Some(false));

    h.stage.handle_input(&InputEvent::PointerUp { x: 200.0, y: 300.0 });
    h.stage.handle_input(&InputEvent::PointerDown { x: 200.0, y: 40.0 });
    assert_eq!(h.stage.with_puppet(|p| p.current_expression().is_some()), Some(true));
}

#[test]
fn drag_sets_gaze_target() {
    let h = harness(PixelSize::new(400, 400), None);
    load(&h);
    h.stage.handle_input(&InputEvent::PointerDown { x: 10.0, y: 390.0 });
    h.stage.handle_input(&InputEvent::PointerMove { x: 300.0, y: 200.0 });
    assert_eq!(h.stage.with_puppet(|p| p.gaze_target()), Some(Vec2::new(0.5, 0.0)));
    h.stage.handle_input(&InputEvent::PointerLeave);
    assert_eq!(h.stage.with_puppet(|p| p.gaze_target()), Some(Vec2::ZERO));
}

#[test]
fn zoom_limit_plays_the_scale_limit_group() {
    let h = harness(PixelSize::new(400, 400), None);
    load(&h);
    let zoom_in = InputEvent::Wheel {
        x: 200.0,
        y: 200.0,
        delta_y: -1.0,
    };
    for _ in 0..8 {
        h.stage.handle_input(&zoom_in);
    }
    assert!(h.stage.view().unwrap().is_max_scale());
    let motion = h.stage.with_puppet(|p| p.current_motion().map(str::to_owned)).unwrap();
    assert_eq!(motion.as_deref(), Some("shake"));
}

#[test]
fn release_puppet_keeps_the_stage_usable() {
    let h = harness(PixelSize::new(400, 400), None);
    load(&h);
    h.stage.release_puppet();
    assert_eq!(h.stage.lifecycle_state(), LifecycleState::Empty);
    assert_eq!(h.stage.lifecycle().context().borrow().live_textures(), 0);
    load(&h);
    assert_eq!(h.stage.lifecycle_state(), LifecycleState::Active);
}

#[test]
fn stop_releases_and_detaches() {
    let h = harness(PixelSize::new(400, 400), None);
    load(&h);
    h.stage.start();
    h.stage.stop();

    assert!(!h.stage.is_running());
    assert_eq!(h.scheduler.pending_count(), 0);
    assert_eq!(h.stage.lifecycle_state(), LifecycleState::Destroyed);
    assert_eq!(h.stage.lifecycle().context().borrow().live_textures(), 0);
    assert!(!h.rec.borrow().has_double_release());

    let scale = h.stage.view().unwrap().scale();
    h.stage.handle_input(&InputEvent::Wheel {
        x: 200.0,
        y: 200.0,
        delta_y: -1.0,
    });
    assert_eq!(h.stage.view().unwrap().scale(), scale);

    let outcome = pollster::block_on(h.stage.load(PuppetSource::new("tester"))).unwrap();
    assert_eq!(outcome, LoadOutcome::Discarded);
}
