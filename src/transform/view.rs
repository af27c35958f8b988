//! Logical view rectangle and the device-pixel mapping built on it.

use crate::foundation::core::PixelSize;
use crate::foundation::error::{PuppetError, PuppetResult};
use crate::transform::matrix::Matrix44;

const SCALE_EPSILON: f64 = 1e-9;

/// Logical coordinate rectangle mapped onto the drawing surface.
///
/// Invariant: `right > left` and `top > bottom`. Only [`ViewBounds::new`] constructs values, so
/// a `ViewBounds` in hand is always well-formed.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ViewBounds {
    left: f64,
    right: f64,
    bottom: f64,
    top: f64,
}

impl ViewBounds {
    /// The unit rectangle `[-1, 1] x [-1, 1]`.
    pub const UNIT: Self = Self {
        left: -1.0,
        right: 1.0,
        bottom: -1.0,
        top: 1.0,
    };

    /// Validate and build bounds.
    pub fn new(left: f64, right: f64, bottom: f64, top: f64) -> PuppetResult<Self> {
        let finite = [left, right, bottom, top].iter().all(|v| v.is_finite());
        if !finite {
            return Err(PuppetError::configuration("view bounds must be finite"));
        }
        if right <= left {
            return Err(PuppetError::configuration(format!(
                "view bounds right ({right}) must be > left ({left})"
            )));
        }
        if top <= bottom {
            return Err(PuppetError::configuration(format!(
                "view bounds top ({top}) must be > bottom ({bottom})"
            )));
        }
        Ok(Self {
            left,
            right,
            bottom,
            top,
        })
    }

    /// Left edge.
    pub fn left(&self) -> f64 {
        self.left
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.right
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    /// Top edge.
    pub fn top(&self) -> f64 {
        self.top
    }

    /// `right - left`.
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// `top - bottom`.
    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    /// Bounds scaled around the origin by `k` (`k > 0`).
    pub fn scaled(&self, k: f64) -> PuppetResult<Self> {
        Self::new(self.left * k, self.right * k, self.bottom * k, self.top * k)
    }
}

impl Default for ViewBounds {
    fn default() -> Self {
        Self::UNIT
    }
}

/// View scale/translation over a logical rectangle, plus the mapping to device pixels.
///
/// A logical point `p` is first moved into view space (`p * scale + translation`), then mapped onto
/// the canvas with the y axis flipped (logical y points up, device y points down). The mapping uses
/// one pixel scale on both axes: the [`ViewBounds`] are fitted inside the canvas and centered, and
/// the axis with spare room shows more than the bounds.
#[derive(Clone, Debug)]
pub struct ViewTransform {
    bounds: ViewBounds,
    max_bounds: ViewBounds,
    min_scale: f64,
    max_scale: f64,
    scale: f64,
    translate_x: f64,
    translate_y: f64,
    canvas: PixelSize,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::new(PixelSize::new(1, 1))
    }
}

impl ViewTransform {
    /// Default lower zoom bound.
    pub const DEFAULT_MIN_SCALE: f64 = 0.8;
    /// Default upper zoom bound.
    pub const DEFAULT_MAX_SCALE: f64 = 2.0;

    /// Identity view over unit bounds for a canvas of `canvas` pixels.
    pub fn new(canvas: PixelSize) -> Self {
        Self {
            bounds: ViewBounds::UNIT,
            max_bounds: ViewBounds::UNIT,
            min_scale: Self::DEFAULT_MIN_SCALE,
            max_scale: Self::DEFAULT_MAX_SCALE,
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
            canvas,
        }
    }

    /// Set the logical view rectangle.
    ///
    /// Malformed bounds are rejected and the previous bounds are kept.
    pub fn set_screen_rect(
        &mut self,
        left: f64,
        right: f64,
        bottom: f64,
        top: f64,
    ) -> PuppetResult<()> {
        match ViewBounds::new(left, right, bottom, top) {
            Ok(b) => {
                self.bounds = b;
                self.clamp_translation();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(left, right, bottom, top, "rejected view bounds: {e}");
                Err(e)
            }
        }
    }

    /// Set the logical view rectangle from already validated bounds.
    pub fn set_bounds(&mut self, bounds: ViewBounds) {
        self.bounds = bounds;
        self.clamp_translation();
    }

    /// Set the rectangle panning and zooming must stay within.
    pub fn set_max_screen_rect(
        &mut self,
        left: f64,
        right: f64,
        bottom: f64,
        top: f64,
    ) -> PuppetResult<()> {
        self.max_bounds = ViewBounds::new(left, right, bottom, top)?;
        self.clamp_translation();
        Ok(())
    }

    /// Set the upper zoom bound.
    pub fn set_max_scale(&mut self, max: f64) -> PuppetResult<()> {
        if !max.is_finite() || max <= 0.0 || max < self.min_scale {
            return Err(PuppetError::configuration(format!(
                "max scale must be finite, > 0 and >= min scale ({}), got {max}",
                self.min_scale
            )));
        }
        self.max_scale = max;
        self.scale = self.scale.min(max);
        Ok(())
    }

    /// Set the lower zoom bound.
    pub fn set_min_scale(&mut self, min: f64) -> PuppetResult<()> {
        if !min.is_finite() || min <= 0.0 || min > self.max_scale {
            return Err(PuppetError::configuration(format!(
                "min scale must be finite, > 0 and <= max scale ({}), got {min}",
                self.max_scale
            )));
        }
        self.min_scale = min;
        self.scale = self.scale.max(min);
        Ok(())
    }

    /// Update the canvas pixel size used by the device mapping.
    pub fn set_canvas_size(&mut self, canvas: PixelSize) {
        self.canvas = canvas;
    }

    /// Current logical view rectangle.
    pub fn bounds(&self) -> ViewBounds {
        self.bounds
    }

    /// Current pan/zoom limit rectangle.
    pub fn max_bounds(&self) -> ViewBounds {
        self.max_bounds
    }

    /// Canvas pixel size.
    pub fn canvas_size(&self) -> PixelSize {
        self.canvas
    }

    /// Current zoom factor.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Current translation in view space.
    pub fn translation(&self) -> (f64, f64) {
        (self.translate_x, self.translate_y)
    }

    /// Zoom by `factor` around the view-space anchor `(cx, cy)`, clamped to the scale range.
    pub fn adjust_scale(&mut self, cx: f64, cy: f64, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let target = (self.scale * factor).clamp(self.min_scale, self.max_scale);
        let k = target / self.scale;
        self.translate_x = cx + (self.translate_x - cx) * k;
        self.translate_y = cy + (self.translate_y - cy) * k;
        self.scale = target;
        self.clamp_translation();
    }

    /// Pan by `(dx, dy)` in view space, clamped to the max screen rect.
    pub fn adjust_translate(&mut self, dx: f64, dy: f64) {
        self.translate_x += dx;
        self.translate_y += dy;
        self.clamp_translation();
    }

    /// Return `true` when the zoom sits at the upper bound.
    pub fn is_max_scale(&self) -> bool {
        self.scale >= self.max_scale - SCALE_EPSILON
    }

    /// Return `true` when the zoom sits at the lower bound.
    pub fn is_min_scale(&self) -> bool {
        self.scale <= self.min_scale + SCALE_EPSILON
    }

    /// Restore scale 1 and no translation.
    pub fn reset_zoom(&mut self) {
        self.scale = 1.0_f64.clamp(self.min_scale, self.max_scale);
        self.translate_x = 0.0;
        self.translate_y = 0.0;
        self.clamp_translation();
    }

    /// View scale/translation as a matrix (`translate × scale`).
    pub fn matrix(&self) -> Matrix44 {
        Matrix44::from_translation(self.translate_x, self.translate_y)
            * Matrix44::from_scale(self.scale, self.scale)
    }

    /// Device pixels per view-space unit, the same on both axes.
    pub fn pixels_per_unit(&self) -> f64 {
        let b = self.bounds;
        (self.canvas_w() / b.width()).min(self.canvas_h() / b.height())
    }

    /// View space onto clip space (`[-1, 1]` on both axes, y up), aspect-correct for the canvas.
    ///
    /// `projection() * matrix()` agrees with [`ViewTransform::transform_x`] and
    /// [`ViewTransform::transform_y`] once clip space is mapped onto the canvas.
    pub fn projection(&self) -> Matrix44 {
        let k = self.pixels_per_unit();
        let sx = 2.0 * k / self.canvas_w();
        let sy = 2.0 * k / self.canvas_h();
        let (cx, cy) = self.bounds_center();
        Matrix44::from_translation(-cx * sx, -cy * sy) * Matrix44::from_scale(sx, sy)
    }

    /// Logical x to device pixel x.
    pub fn transform_x(&self, x: f64) -> f64 {
        let vx = x * self.scale + self.translate_x;
        self.canvas_w() * 0.5 + (vx - self.bounds_center().0) * self.pixels_per_unit()
    }

    /// Logical y to device pixel y.
    pub fn transform_y(&self, y: f64) -> f64 {
        let vy = y * self.scale + self.translate_y;
        self.canvas_h() * 0.5 - (vy - self.bounds_center().1) * self.pixels_per_unit()
    }

    /// Device pixel x to logical x.
    pub fn invert_transform_x(&self, device_x: f64) -> f64 {
        let vx = self.bounds_center().0 + (device_x - self.canvas_w() * 0.5) / self.pixels_per_unit();
        (vx - self.translate_x) / self.scale
    }

    /// Device pixel y to logical y.
    pub fn invert_transform_y(&self, device_y: f64) -> f64 {
        let vy = self.bounds_center().1 - (device_y - self.canvas_h() * 0.5) / self.pixels_per_unit();
        (vy - self.translate_y) / self.scale
    }

    fn bounds_center(&self) -> (f64, f64) {
        let b = self.bounds;
        ((b.left + b.right) * 0.5, (b.bottom + b.top) * 0.5)
    }

    fn canvas_w(&self) -> f64 {
        f64::from(self.canvas.width.max(1))
    }

    fn canvas_h(&self) -> f64 {
        f64::from(self.canvas.height.max(1))
    }

    fn clamp_translation(&mut self) {
        fn clamp_axis(t: f64, lo_edge: f64, hi_edge: f64, max_lo: f64, max_hi: f64, s: f64) -> f64 {
            // Content spans [max_lo * s + t, max_hi * s + t] and must cover [lo_edge, hi_edge].
            let upper = lo_edge - max_lo * s;
            let lower = hi_edge - max_hi * s;
            if lower > upper {
                return (lower + upper) * 0.5;
            }
            t.clamp(lower, upper)
        }

        let b = self.bounds;
        let m = self.max_bounds;
        self.translate_x = clamp_axis(
            self.translate_x,
            b.left,
            b.right,
            m.left,
            m.right,
            self.scale,
        );
        self.translate_y = clamp_axis(
            self.translate_y,
            b.bottom,
            b.top,
            m.bottom,
            m.top,
            self.scale,
        );
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transform/view.rs"]
mod tests;
