//! Adaptive layout: view bounds, puppet scale and puppet position from surface and display sizes.
//!
//! The computations are pure functions of their inputs. [`AdaptiveLayoutEngine`] adds the
//! memoization layer on top.

use std::time::Instant;

use crate::foundation::core::{PixelSize, Vec2};
use crate::layout::cache::{LayoutCache, LayoutCacheStats, LayoutKey};
use crate::layout::config::{AdaptiveConfig, AspectRatioRules};
use crate::transform::view::ViewBounds;

/// Display size, in pixels, that corresponds to a size-scale of 1.
pub const REFERENCE_DISPLAY_UNIT: f64 = 250.0;

/// Result of one adaptive layout pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdaptiveParams {
    /// Logical view rectangle.
    pub view_bounds: ViewBounds,
    /// Puppet scale, always within the configured clamp range.
    pub model_scale: f64,
    /// Puppet center offset in logical units.
    pub model_position: Vec2,
}

/// Inputs of one adaptive layout pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutInput {
    /// Drawing-surface size in pixels.
    pub canvas: PixelSize,
    /// Display (container) size in pixels.
    pub display: PixelSize,
}

impl LayoutInput {
    /// Build inputs from raw dimensions.
    pub fn new(canvas_width: u32, canvas_height: u32, display_width: u32, display_height: u32) -> Self {
        Self {
            canvas: PixelSize::new(canvas_width, canvas_height),
            display: PixelSize::new(display_width, display_height),
        }
    }

    fn key(self) -> LayoutKey {
        LayoutKey {
            canvas_width: self.canvas.width,
            canvas_height: self.canvas.height,
            display_width: self.display.width,
            display_height: self.display.height,
        }
    }
}

/// Vertical expansion multiplier for a puppet of aspect `model_aspect` (width / height).
///
/// A step function over the breakpoints 0.3, 0.5, 0.7 and 1.0; thinner puppets get more room.
/// The breakpoints are a compatibility contract and are not interpolated.
pub fn expansion_tier(model_aspect: Option<f64>) -> f64 {
    let Some(a) = model_aspect.filter(|a| a.is_finite() && *a > 0.0) else {
        return 1.0;
    };
    if a < 0.3 {
        2.0
    } else if a < 0.5 {
        1.6
    } else if a < 0.7 {
        1.3
    } else if a < 1.0 {
        1.15
    } else {
        1.0
    }
}

/// Logical view rectangle for a display.
///
/// Horizontal bounds stay at `[-1, 1]`. Landscape displays get a vertical half-range of
/// `(1 / aspect) * expansion`; portrait and square displays use `aspect`.
pub fn compute_view_bounds(
    display: PixelSize,
    model_aspect: Option<f64>,
    config: &AdaptiveConfig,
) -> ViewBounds {
    let aspect = display.aspect();
    let half = if aspect > 1.0 {
        (1.0 / aspect) * config.vertical_expansion * expansion_tier(model_aspect)
    } else {
        aspect
    };
    // Degenerate widths (0xN) give a zero half-range; fall back to unit bounds.
    ViewBounds::new(-1.0, 1.0, -half, half).unwrap_or(ViewBounds::UNIT)
}

/// Puppet scale for a display, clamped to `[min_scale, max_scale]`.
pub fn compute_model_scale(display: PixelSize, config: &AdaptiveConfig) -> f64 {
    let aspect = display.aspect();
    let size_scale = (f64::from(display.width) / REFERENCE_DISPLAY_UNIT)
        .min(f64::from(display.height) / REFERENCE_DISPLAY_UNIT);

    let mut scale = config.base_scale * size_scale.powf(config.size_scale_factor);
    if aspect > 1.5 {
        scale *= config.wide_screen_scale;
    }
    if aspect < 0.7 {
        scale *= config.tall_screen_scale;
    }
    if scale.is_nan() {
        scale = config.base_scale;
    }
    scale.clamp(config.min_scale, config.max_scale)
}

/// Offset of the first rule whose threshold is `<= aspect`, in ultraWide..ultraTall order.
///
/// When no threshold matches, the ultraTall rule applies.
pub fn select_position(aspect: f64, rules: &AspectRatioRules) -> Vec2 {
    let rule = rules
        .in_order()
        .into_iter()
        .find(|r| aspect >= r.threshold)
        .unwrap_or(&rules.ultra_tall);
    Vec2::new(rule.offset_x, rule.offset_y)
}

/// Full adaptive pass without caching.
pub fn compute_params(
    input: LayoutInput,
    model_aspect: Option<f64>,
    config: &AdaptiveConfig,
) -> AdaptiveParams {
    AdaptiveParams {
        view_bounds: compute_view_bounds(input.display, model_aspect, config),
        model_scale: compute_model_scale(input.display, config),
        model_position: select_position(input.display.aspect(), &config.aspect_ratio_rules),
    }
}

/// Memoizing front-end for [`compute_params`].
///
/// The cache key does not include the model aspect: call [`AdaptiveLayoutEngine::set_model_aspect`]
/// whenever the active puppet changes, which also clears the cache.
#[derive(Debug)]
pub struct AdaptiveLayoutEngine {
    config: AdaptiveConfig,
    model_aspect: Option<f64>,
    cache: LayoutCache,
}

impl AdaptiveLayoutEngine {
    /// Create an engine for `config`.
    pub fn new(config: AdaptiveConfig) -> Self {
        let cache = LayoutCache::new(config.cache_size, config.cache_ttl());
        Self {
            config,
            model_aspect: None,
            cache,
        }
    }

    /// Active configuration snapshot.
    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    /// Replace the configuration wholesale. Cached results are dropped.
    pub fn set_config(&mut self, config: AdaptiveConfig) {
        self.cache = LayoutCache::new(config.cache_size, config.cache_ttl());
        self.config = config;
    }

    /// Set the native aspect of the active puppet (`None` when no puppet is loaded).
    pub fn set_model_aspect(&mut self, model_aspect: Option<f64>) {
        if self.model_aspect != model_aspect {
            self.model_aspect = model_aspect;
            self.cache.clear();
        }
    }

    /// Compute (or fetch) the layout for `input` at the current time.
    pub fn compute(&mut self, input: LayoutInput) -> AdaptiveParams {
        self.compute_at(input, Instant::now())
    }

    /// Compute (or fetch) the layout for `input` as of `now`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn compute_at(&mut self, input: LayoutInput, now: Instant) -> AdaptiveParams {
        if !self.config.enable_cache {
            return compute_params(input, self.model_aspect, &self.config);
        }
        let key = input.key();
        if let Some(hit) = self.cache.get(&key, now) {
            tracing::debug!("adaptive layout served from cache");
            return hit;
        }
        let params = compute_params(input, self.model_aspect, &self.config);
        tracing::debug!(
            scale = params.model_scale,
            top = params.view_bounds.top(),
            "adaptive layout recomputed"
        );
        self.cache.insert(key, params, now);
        params
    }

    /// Drop cached results.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Number of cached results.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Cache counters.
    pub fn cache_stats(&self) -> LayoutCacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layout/engine.rs"]
mod tests;
