use std::time::{Duration, Instant};

use super::*;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn landscape_expands_vertical_range_by_config() {
    // 800x800 -> 1600x400 (4:1) with default config.
    let cfg = AdaptiveConfig::default();
    let square = compute_view_bounds(PixelSize::new(800, 800), None, &cfg);
    assert_eq!(square.top(), 1.0);
    assert_eq!(square.bottom(), -1.0);

    let wide = compute_view_bounds(PixelSize::new(1600, 400), None, &cfg);
    assert!(approx(wide.top(), 0.25 * cfg.vertical_expansion));
    assert!(approx(wide.bottom(), -0.25 * cfg.vertical_expansion));
    assert_eq!(wide.left(), -1.0);
    assert_eq!(wide.right(), 1.0);
}

#[test]
fn portrait_uses_display_aspect() {
    let cfg = AdaptiveConfig::default();
    let b = compute_view_bounds(PixelSize::new(400, 800), Some(0.2), &cfg);
    assert!(approx(b.top(), 0.5));
    assert!(approx(b.bottom(), -0.5));
}

#[test]
fn zero_height_is_treated_as_square() {
    let cfg = AdaptiveConfig::default();
    let b = compute_view_bounds(PixelSize::new(640, 0), None, &cfg);
    assert_eq!(b, ViewBounds::UNIT);
    let p = compute_params(LayoutInput::new(640, 0, 640, 0), None, &cfg);
    assert!(p.model_scale >= cfg.min_scale && p.model_scale <= cfg.max_scale);
    assert_eq!(
        p.model_position,
        Vec2::new(
            cfg.aspect_ratio_rules.square.offset_x,
            cfg.aspect_ratio_rules.square.offset_y
        )
    );
}

#[test]
fn zero_width_falls_back_to_unit_bounds() {
    let cfg = AdaptiveConfig::default();
    assert_eq!(
        compute_view_bounds(PixelSize::new(0, 500), None, &cfg),
        ViewBounds::UNIT
    );
}

#[test]
fn expansion_tiers_are_discrete_steps() {
    assert_eq!(expansion_tier(Some(0.1)), 2.0);
    assert_eq!(expansion_tier(Some(0.299)), 2.0);
    assert_eq!(expansion_tier(Some(0.3)), 1.6);
    assert_eq!(expansion_tier(Some(0.49)), 1.6);
    assert_eq!(expansion_tier(Some(0.5)), 1.3);
    assert_eq!(expansion_tier(Some(0.7)), 1.15);
    assert_eq!(expansion_tier(Some(0.99)), 1.15);
    assert_eq!(expansion_tier(Some(1.0)), 1.0);
    assert_eq!(expansion_tier(Some(3.0)), 1.0);
    assert_eq!(expansion_tier(None), 1.0);
    assert_eq!(expansion_tier(Some(f64::NAN)), 1.0);
}

#[test]
fn thin_puppet_gets_largest_landscape_expansion() {
    let cfg = AdaptiveConfig::default();
    let b = compute_view_bounds(PixelSize::new(1000, 500), Some(0.25), &cfg);
    assert!(approx(b.top(), 0.5 * cfg.vertical_expansion * 2.0));
}

#[test]
fn scale_example_with_square_display() {
    let cfg = AdaptiveConfig {
        base_scale: 2.0,
        min_scale: 0.5,
        max_scale: 4.0,
        size_scale_factor: 0.5,
        ..AdaptiveConfig::default()
    };
    let s = compute_model_scale(PixelSize::new(500, 500), &cfg);
    assert!(approx(s, 2.0 * 2.0_f64.sqrt()));
    assert!((s - 2.83).abs() < 0.01);
}

#[test]
fn wide_and_tall_multipliers_apply_past_thresholds() {
    let cfg = AdaptiveConfig {
        base_scale: 1.0,
        size_scale_factor: 0.0,
        wide_screen_scale: 0.5,
        tall_screen_scale: 1.5,
        min_scale: 0.1,
        max_scale: 10.0,
        ..AdaptiveConfig::default()
    };
    assert!(approx(compute_model_scale(PixelSize::new(1500, 1000), &cfg), 1.0));
    assert!(approx(compute_model_scale(PixelSize::new(1600, 1000), &cfg), 0.5));
    assert!(approx(compute_model_scale(PixelSize::new(700, 1000), &cfg), 1.0));
    assert!(approx(compute_model_scale(PixelSize::new(600, 1000), &cfg), 1.5));
}

#[test]
fn scale_is_clamped_for_extreme_dimensions() {
    let cfg = AdaptiveConfig::default();
    for (w, h) in [(1, 10_000), (10_000, 1), (1, 1), (100_000, 100_000), (0, 0)] {
        let s = compute_model_scale(PixelSize::new(w, h), &cfg);
        assert!(
            s >= cfg.min_scale && s <= cfg.max_scale,
            "{w}x{h} produced {s}"
        );
    }
    let negative_exp = AdaptiveConfig {
        size_scale_factor: -2.0,
        ..AdaptiveConfig::default()
    };
    let s = compute_model_scale(PixelSize::new(0, 100), &negative_exp);
    assert_eq!(s, negative_exp.max_scale);
}

#[test]
fn position_rule_boundary_goes_to_rule_at_threshold() {
    let rules = AspectRatioRules::default();
    let at = |a: f64| select_position(a, &rules);
    assert_eq!(at(2.5), Vec2::new(rules.ultra_wide.offset_x, rules.ultra_wide.offset_y));
    assert_eq!(at(2.4999), Vec2::new(rules.wide.offset_x, rules.wide.offset_y));
    assert_eq!(at(1.5), Vec2::new(rules.wide.offset_x, rules.wide.offset_y));
    assert_eq!(at(0.8), Vec2::new(rules.square.offset_x, rules.square.offset_y));
    assert_eq!(at(0.5), Vec2::new(rules.tall.offset_x, rules.tall.offset_y));
    assert_eq!(at(0.1), Vec2::new(rules.ultra_tall.offset_x, rules.ultra_tall.offset_y));
}

#[test]
fn first_match_wins_even_when_thresholds_are_unsorted() {
    let mut rules = AspectRatioRules::default();
    rules.ultra_wide.threshold = 0.0;
    assert_eq!(
        select_position(1.0, &rules),
        Vec2::new(rules.ultra_wide.offset_x, rules.ultra_wide.offset_y)
    );
}

#[test]
fn engine_is_deterministic_and_serves_second_call_from_cache() {
    let mut engine = AdaptiveLayoutEngine::new(AdaptiveConfig::default());
    let now = Instant::now();
    let input = LayoutInput::new(800, 600, 400, 300);
    let a = engine.compute_at(input, now);
    let b = engine.compute_at(input, now + Duration::from_secs(10));
    assert_eq!(a, b);
    let st = engine.cache_stats();
    assert_eq!(st.misses, 1);
    assert_eq!(st.hits, 1);
}

#[test]
fn engine_recomputes_after_ttl() {
    let mut engine = AdaptiveLayoutEngine::new(AdaptiveConfig::default());
    let now = Instant::now();
    let input = LayoutInput::new(800, 600, 400, 300);
    engine.compute_at(input, now);
    engine.compute_at(input, now + Duration::from_secs(301));
    assert_eq!(engine.cache_stats().hits, 0);
    assert_eq!(engine.cache_stats().misses, 2);
}

#[test]
fn engine_cache_size_plus_one_evicts_first() {
    let cfg = AdaptiveConfig {
        cache_size: 4,
        ..AdaptiveConfig::default()
    };
    let mut engine = AdaptiveLayoutEngine::new(cfg);
    let now = Instant::now();
    for i in 1..=5u32 {
        engine.compute_at(LayoutInput::new(100 * i, 100, 100 * i, 100), now);
    }
    assert_eq!(engine.cache_len(), 4);
    assert_eq!(engine.cache_stats().evictions, 1);

    // Key 2 is still cached, key 1 is recomputed.
    engine.compute_at(LayoutInput::new(200, 100, 200, 100), now);
    assert_eq!(engine.cache_stats().hits, 1);
    engine.compute_at(LayoutInput::new(100, 100, 100, 100), now);
    assert_eq!(engine.cache_stats().hits, 1);
}

#[test]
fn disabled_cache_always_computes() {
    let cfg = AdaptiveConfig {
        enable_cache: false,
        ..AdaptiveConfig::default()
    };
    let mut engine = AdaptiveLayoutEngine::new(cfg);
    let input = LayoutInput::new(10, 10, 10, 10);
    engine.compute(input);
    engine.compute(input);
    assert_eq!(engine.cache_len(), 0);
    assert_eq!(engine.cache_stats(), LayoutCacheStats::default());
}

#[test]
fn model_aspect_change_invalidates_cache() {
    let mut engine = AdaptiveLayoutEngine::new(AdaptiveConfig::default());
    let input = LayoutInput::new(1000, 500, 1000, 500);
    let before = engine.compute(input);
    engine.set_model_aspect(Some(0.25));
    assert_eq!(engine.cache_len(), 0);
    let after = engine.compute(input);
    assert!(after.view_bounds.top() > before.view_bounds.top());

    engine.set_config(AdaptiveConfig::default());
    assert_eq!(engine.cache_len(), 0);
}
