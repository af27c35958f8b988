use super::*;

fn view(w: u32, h: u32, bounds: (f64, f64, f64, f64)) -> ViewTransform {
    let mut v = ViewTransform::new(PixelSize::new(w, h));
    v.set_screen_rect(bounds.0, bounds.1, bounds.2, bounds.3)
        .unwrap();
    v
}

#[test]
fn bounds_reject_inverted_edges() {
    assert!(ViewBounds::new(1.0, -1.0, -1.0, 1.0).is_err());
    assert!(ViewBounds::new(-1.0, 1.0, 1.0, 1.0).is_err());
    assert!(ViewBounds::new(-1.0, f64::NAN, -1.0, 1.0).is_err());
    let b = ViewBounds::new(-2.0, 2.0, -0.5, 0.5).unwrap();
    assert_eq!(b.width(), 4.0);
    assert_eq!(b.height(), 1.0);
}

#[test]
fn set_screen_rect_keeps_prior_bounds_on_error() {
    let mut v = view(100, 100, (-1.0, 1.0, -0.5, 0.5));
    let err = v.set_screen_rect(0.0, 0.0, -1.0, 1.0).unwrap_err();
    assert!(matches!(err, PuppetError::Configuration(_)));
    assert_eq!(v.bounds(), ViewBounds::new(-1.0, 1.0, -0.5, 0.5).unwrap());
}

#[test]
fn corners_map_to_canvas_edges() {
    let v = view(800, 400, (-1.0, 1.0, -0.5, 0.5));
    assert_eq!(v.transform_x(-1.0), 0.0);
    assert_eq!(v.transform_x(1.0), 800.0);
    assert_eq!(v.transform_y(0.5), 0.0);
    assert_eq!(v.transform_y(-0.5), 400.0);
    assert_eq!(v.invert_transform_x(400.0), 0.0);
    assert_eq!(v.invert_transform_y(200.0), 0.0);
}

#[test]
fn device_round_trip_within_tolerance() {
    let bounds = [
        (-1.0, 1.0, -1.0, 1.0),
        (-1.0, 1.0, -0.3, 0.3),
        (-1.0, 1.0, -2.5, 2.5),
        (-3.7, 0.2, 10.0, 10.001),
    ];
    for b in bounds {
        let mut v = view(1920, 1080, b);
        v.set_max_screen_rect(-50.0, 50.0, -50.0, 50.0).unwrap();
        v.adjust_scale(0.1, -0.2, 1.7);
        let mut px = 0.0;
        while px <= 1920.0 {
            let lx = v.invert_transform_x(px);
            assert!((v.transform_x(lx) - px).abs() < 1e-6, "x {px} via {b:?}");
            let ly = v.invert_transform_y(px * 0.5625);
            assert!((v.transform_y(ly) - px * 0.5625).abs() < 1e-6);
            px += 7.3;
        }
        for p in [-1.0, -0.25, 0.0, 0.5, 1.0] {
            assert!((v.invert_transform_x(v.transform_x(p)) - p).abs() < 1e-6);
            assert!((v.invert_transform_y(v.transform_y(p)) - p).abs() < 1e-6);
        }
    }
}

#[test]
fn adjust_scale_clamps_and_reports_limits() {
    let mut v = view(100, 100, (-1.0, 1.0, -1.0, 1.0));
    v.set_max_screen_rect(-2.0, 2.0, -2.0, 2.0).unwrap();
    v.set_max_scale(2.0).unwrap();
    v.set_min_scale(0.8).unwrap();

    for _ in 0..20 {
        v.adjust_scale(0.0, 0.0, 1.1);
    }
    assert_eq!(v.scale(), 2.0);
    assert!(v.is_max_scale());
    assert!(!v.is_min_scale());

    for _ in 0..40 {
        v.adjust_scale(0.0, 0.0, 0.9);
    }
    assert_eq!(v.scale(), 0.8);
    assert!(v.is_min_scale());
}

#[test]
fn adjust_scale_keeps_anchor_fixed() {
    let mut v = view(100, 100, (-1.0, 1.0, -1.0, 1.0));
    v.set_max_screen_rect(-4.0, 4.0, -4.0, 4.0).unwrap();
    let anchor_device = (v.transform_x(0.5), v.transform_y(0.25));
    v.adjust_scale(0.5, 0.25, 1.5);
    assert!((v.transform_x(0.5) - anchor_device.0).abs() < 1e-9);
    assert!((v.transform_y(0.25) - anchor_device.1).abs() < 1e-9);
}

#[test]
fn translation_stays_inside_max_rect() {
    let mut v = view(100, 100, (-1.0, 1.0, -1.0, 1.0));
    v.set_max_screen_rect(-1.0, 1.0, -1.0, 1.0).unwrap();
    v.adjust_translate(5.0, -5.0);
    assert_eq!(v.translation(), (0.0, 0.0));

    v.adjust_scale(0.0, 0.0, 2.0);
    v.adjust_translate(5.0, -5.0);
    assert_eq!(v.translation(), (1.0, -1.0));
}

#[test]
fn scale_range_setters_validate() {
    let mut v = ViewTransform::default();
    assert!(v.set_max_scale(0.0).is_err());
    assert!(v.set_min_scale(f64::INFINITY).is_err());
    assert!(v.set_min_scale(3.0).is_err());
    v.set_max_scale(4.0).unwrap();
    v.set_min_scale(3.0).unwrap();
    assert_eq!(v.scale(), 3.0);
}

#[test]
fn matrix_matches_scale_and_translation() {
    let mut v = view(100, 100, (-1.0, 1.0, -1.0, 1.0));
    v.set_max_screen_rect(-2.0, 2.0, -2.0, 2.0).unwrap();
    v.adjust_scale(0.2, 0.0, 1.5);
    let m = v.matrix();
    assert_eq!(m.scale_x(), v.scale());
    assert_eq!((m.translate_x(), m.translate_y()), v.translation());
    v.reset_zoom();
    assert_eq!(v.matrix(), Matrix44::IDENTITY);
}

#[test]
fn projection_agrees_with_device_mapping() {
    let mut v = view(320, 80, (-1.0, 1.0, -0.3, 0.3));
    v.set_max_screen_rect(-2.0, 2.0, -0.6, 0.6).unwrap();
    v.adjust_scale(0.1, 0.05, 1.3);

    let clip = v.projection() * v.matrix();
    for (x, y) in [(0.0, 0.0), (0.4, -0.1), (-0.9, 0.25)] {
        let c = clip.transform_point(crate::foundation::core::Point::new(x, y));
        let px = (c.x + 1.0) * 0.5 * 320.0;
        let py = (1.0 - c.y) * 0.5 * 80.0;
        assert!((px - v.transform_x(x)).abs() < 1e-9);
        assert!((py - v.transform_y(y)).abs() < 1e-9);
    }
}

#[test]
fn device_mapping_uses_one_scale_on_both_axes() {
    // Portrait canvas over unit bounds: width binds, extra height shows more of the scene.
    let v = view(64, 128, (-1.0, 1.0, -1.0, 1.0));
    assert_eq!(v.pixels_per_unit(), 32.0);
    assert_eq!((v.transform_x(0.0), v.transform_y(0.0)), (32.0, 64.0));
    assert_eq!(v.transform_x(1.0) - v.transform_x(0.0), 32.0);
    assert_eq!(v.transform_y(0.0) - v.transform_y(1.0), 32.0);
    assert_eq!(v.invert_transform_y(0.0), 2.0);

    // Bounds flatter than the canvas: height binds.
    let v = view(128, 64, (-1.0, 1.0, -0.4, 0.4));
    assert_eq!(v.pixels_per_unit(), 64.0);
    assert_eq!(v.transform_x(1.0) - v.transform_x(0.0), 64.0);
    assert_eq!(v.transform_y(0.0) - v.transform_y(0.25), 16.0);
}

#[test]
fn off_center_bounds_are_centered_on_the_canvas() {
    let v = view(100, 100, (0.0, 2.0, 1.0, 2.0));
    assert_eq!(v.pixels_per_unit(), 50.0);
    assert_eq!((v.transform_x(1.0), v.transform_y(1.5)), (50.0, 50.0));
    assert_eq!(v.transform_y(2.0), 25.0);
}
