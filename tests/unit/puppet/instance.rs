use super::*;
use crate::puppet::fixture::{RecordingContext, loaded};

fn built() -> (PuppetInstance, RecordingContext, std::rc::Rc<std::cell::RefCell<crate::puppet::fixture::Recorded>>) {
    let (mut ctx, rec) = RecordingContext::new(PixelSize::new(64, 64));
    let inst = PuppetInstance::build(loaded(), &mut ctx, 7).unwrap();
    (inst, ctx, rec)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn build_uploads_and_release_returns_textures() {
    let (inst, mut ctx, rec) = built();
    assert_eq!(inst.name(), "tester");
    assert_eq!(inst.canvas_size(), PixelSize::new(200, 400));
    assert_eq!(inst.texture_handles().len(), 2);
    assert_eq!(ctx.live_textures(), 2);

    inst.release(&mut ctx);
    assert_eq!(ctx.live_textures(), 0);
    assert_eq!(rec.borrow().released.len(), 2);
    assert!(!rec.borrow().has_double_release());
}

#[test]
fn failed_upload_releases_partial_textures() {
    let (mut ctx, rec) = RecordingContext::new(PixelSize::new(64, 64));
    rec.borrow_mut().fail_create_after = Some(1);
    let err = PuppetInstance::build(loaded(), &mut ctx, 7).unwrap_err();
    assert!(err.to_string().contains("texture upload failed"));
    assert_eq!(ctx.live_textures(), 0);
    assert_eq!(rec.borrow().created, rec.borrow().released);
}

#[test]
fn image_count_mismatch_is_rejected_before_upload() {
    let (mut ctx, rec) = RecordingContext::new(PixelSize::new(64, 64));
    let mut puppet = loaded();
    puppet.images.pop();
    assert!(PuppetInstance::build(puppet, &mut ctx, 7).is_err());
    assert!(rec.borrow().created.is_empty());
}

#[test]
fn model_matrix_centers_the_canvas() {
    let (mut inst, mut ctx, _) = built();
    let m = inst.model_matrix();
    let c = m.transform_point(Point::new(100.0, 200.0));
    assert!(approx(c.x, 0.0) && approx(c.y, 0.0));
    // Native top edge maps to logical +1 at scale 1.
    assert!(approx(m.transform_point(Point::new(100.0, 0.0)).y, 1.0));

    inst.set_layout(0.5, Vec2::new(0.2, -0.1));
    let top = inst.model_matrix().transform_point(Point::new(100.0, 0.0));
    assert!(approx(top.x, 0.2) && approx(top.y, 0.4));
    assert_eq!(inst.model_scale(), 0.5);
    inst.release(&mut ctx);
}

#[test]
fn hit_test_prefers_head() {
    let (inst, mut ctx, _) = built();
    assert_eq!(inst.hit_test(0.0, 0.75), Some(HitKind::Head));
    assert_eq!(inst.hit_test(0.0, 0.0), Some(HitKind::Body));
    assert_eq!(inst.hit_test(0.9, 0.0), None);
    inst.release(&mut ctx);
}

#[test]
fn hit_test_follows_layout() {
    let (mut inst, mut ctx, _) = built();
    inst.set_layout(1.0, Vec2::new(0.5, 0.0));
    assert_eq!(inst.hit_test(-0.1, 0.0), None);
    assert_eq!(inst.hit_test(0.5, 0.0), Some(HitKind::Body));
    inst.release(&mut ctx);
}

#[test]
fn draw_visits_parts_in_draw_order_and_restores_stack() {
    let (mut inst, mut ctx, rec) = built();
    inst.update(0.016);
    let mut stack = TransformStack::new();
    let depth = stack.depth();
    inst.draw(&mut stack, &mut ctx);
    assert_eq!(stack.depth(), depth);

    let handles = inst.texture_handles().to_vec();
    assert_eq!(rec.borrow().draws, handles);
    inst.release(&mut ctx);
}

#[test]
fn child_parts_inherit_parent_opacity() {
    let (mut inst, mut ctx, _) = built();
    assert!(inst.set_expression("pout"));
    inst.update(0.0);
    inst.draw(&mut TransformStack::new(), &mut ctx);
    assert!(approx(inst.alpha[0], 1.0));
    assert!(approx(inst.alpha[1], 0.5));
    inst.release(&mut ctx);
}

#[test]
fn idle_motion_starts_on_first_update() {
    let (mut inst, mut ctx, _) = built();
    assert_eq!(inst.current_motion(), None);
    inst.update(0.016);
    assert_eq!(inst.current_motion(), Some("breathe"));
    inst.release(&mut ctx);
}

#[test]
fn tap_motion_moves_the_head() {
    let (mut inst, mut ctx, _) = built();
    assert!(inst.start_motion("TapBody", 0, MotionPriority::Normal));
    inst.update(0.5);
    assert_eq!(inst.current_motion(), Some("wave"));
    assert!(approx(inst.part_pose("head").unwrap().offset_x, 10.0));
    assert!(!inst.start_motion("TapBody", 5, MotionPriority::Force));
    assert!(!inst.start_random_motion("Missing", MotionPriority::Force));
    assert_eq!(inst.motion_count("TapBody"), 2);
    inst.release(&mut ctx);
}

#[test]
fn expressions_change_the_pose() {
    let (mut inst, mut ctx, _) = built();
    assert!(!inst.set_expression("frown"));
    assert!(inst.set_expression("smile"));
    inst.update(0.0);
    assert_eq!(inst.current_expression(), Some("smile"));
    assert!(approx(inst.part_pose("head").unwrap().scale, 1.2));

    assert!(inst.set_random_expression());
    assert!(inst.current_expression().is_some());
    inst.release(&mut ctx);
}

#[test]
fn gaze_is_clamped_and_smoothed() {
    let (mut inst, mut ctx, _) = built();
    inst.set_gaze_target(3.0, f64::NAN);
    assert_eq!(inst.gaze_target(), Vec2::new(1.0, 0.0));

    inst.update(0.1);
    let expected = 1.0 - (-1.0f64).exp();
    assert!(approx(inst.gaze().x, expected));
    let head = inst.part_pose("head").unwrap();
    assert!(approx(head.offset_x, expected * 10.0));
    assert!(approx(head.rotation, expected * 0.1));
    assert_eq!(inst.part_pose("body").unwrap().offset_x, 0.0);

    for _ in 0..100 {
        inst.update(0.1);
    }
    assert!(approx(inst.gaze().x, 1.0));
    inst.release(&mut ctx);
}
