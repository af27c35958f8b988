use crate::foundation::error::{PuppetError, PuppetResult};

/// Offset applied to the puppet center when the display aspect reaches `threshold`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AspectRule {
    /// Minimum display aspect (width / height) for this rule to match.
    pub threshold: f64,
    /// Horizontal offset in logical units.
    pub offset_x: f64,
    /// Vertical offset in logical units.
    pub offset_y: f64,
}

impl AspectRule {
    /// Build a rule.
    pub const fn new(threshold: f64, offset_x: f64, offset_y: f64) -> Self {
        Self {
            threshold,
            offset_x,
            offset_y,
        }
    }
}

/// The five aspect-ratio position rules, tested in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AspectRatioRules {
    /// Very wide displays (default threshold 2.5).
    pub ultra_wide: AspectRule,
    /// Wide displays (default threshold 1.5).
    pub wide: AspectRule,
    /// Near-square displays (default threshold 0.8).
    pub square: AspectRule,
    /// Tall displays (default threshold 0.5).
    pub tall: AspectRule,
    /// Very tall displays; acts as the fallback.
    pub ultra_tall: AspectRule,
}

impl Default for AspectRatioRules {
    fn default() -> Self {
        Self {
            ultra_wide: AspectRule::new(2.5, 0.0, -0.1),
            wide: AspectRule::new(1.5, 0.0, -0.05),
            square: AspectRule::new(0.8, 0.0, 0.0),
            tall: AspectRule::new(0.5, 0.0, 0.05),
            ultra_tall: AspectRule::new(0.0, 0.0, 0.1),
        }
    }
}

impl AspectRatioRules {
    /// Rules in matching order: ultraWide, wide, square, tall, ultraTall.
    pub fn in_order(&self) -> [&AspectRule; 5] {
        [
            &self.ultra_wide,
            &self.wide,
            &self.square,
            &self.tall,
            &self.ultra_tall,
        ]
    }
}

/// Configuration of the adaptive layout pass.
///
/// The serialized form is camelCase JSON; every field has a default so partial documents load.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdaptiveConfig {
    /// Master switch. When off, the stage keeps unit bounds and `base_scale`.
    pub enabled: bool,
    /// Starting puppet scale before size and aspect adjustments.
    pub base_scale: f64,
    /// Lower clamp for the computed scale.
    pub min_scale: f64,
    /// Upper clamp for the computed scale.
    pub max_scale: f64,
    /// Exponent applied to the display-size ratio.
    pub size_scale_factor: f64,
    /// Multiplier used when the display aspect is above 1.5.
    pub wide_screen_scale: f64,
    /// Multiplier used when the display aspect is below 0.7.
    pub tall_screen_scale: f64,
    /// Vertical half-range expansion for landscape displays.
    pub vertical_expansion: f64,
    /// Position offsets keyed by display aspect.
    pub aspect_ratio_rules: AspectRatioRules,
    /// Memoize layout results.
    pub enable_cache: bool,
    /// Maximum number of cached layout results.
    pub cache_size: usize,
    /// Lifetime of a cached result, measured from insertion.
    pub cache_ttl_ms: u64,
    /// Quiet period before a container resize is applied.
    pub debounce_ms: u64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_scale: 1.0,
            min_scale: 0.5,
            max_scale: 2.0,
            size_scale_factor: 0.15,
            wide_screen_scale: 0.9,
            tall_screen_scale: 1.1,
            vertical_expansion: 1.2,
            aspect_ratio_rules: AspectRatioRules::default(),
            enable_cache: true,
            cache_size: 50,
            cache_ttl_ms: 5 * 60 * 1000,
            debounce_ms: 100,
        }
    }
}

impl AdaptiveConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> PuppetResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| PuppetError::serde(format!("parse adaptive config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check numeric ranges.
    pub fn validate(&self) -> PuppetResult<()> {
        let positive = [
            ("baseScale", self.base_scale),
            ("minScale", self.min_scale),
            ("maxScale", self.max_scale),
            ("wideScreenScale", self.wide_screen_scale),
            ("tallScreenScale", self.tall_screen_scale),
            ("verticalExpansion", self.vertical_expansion),
        ];
        for (name, v) in positive {
            if !v.is_finite() || v <= 0.0 {
                return Err(PuppetError::configuration(format!(
                    "{name} must be finite and > 0, got {v}"
                )));
            }
        }
        if !self.size_scale_factor.is_finite() {
            return Err(PuppetError::configuration("sizeScaleFactor must be finite"));
        }
        if self.min_scale > self.max_scale {
            return Err(PuppetError::configuration(format!(
                "minScale ({}) must be <= maxScale ({})",
                self.min_scale, self.max_scale
            )));
        }
        Ok(())
    }

    /// Shallow merge: top-level keys of `patch` replace the matching fields of `self`.
    ///
    /// Nested objects (such as `aspectRatioRules`) are replaced whole, not merged.
    pub fn merged(&self, patch: &serde_json::Value) -> PuppetResult<Self> {
        let serde_json::Value::Object(patch) = patch else {
            return Err(PuppetError::configuration(
                "adaptive config patch must be a JSON object",
            ));
        };
        let mut base = serde_json::to_value(self)
            .map_err(|e| PuppetError::serde(format!("serialize adaptive config: {e}")))?;
        if let serde_json::Value::Object(fields) = &mut base {
            for (k, v) in patch {
                fields.insert(k.clone(), v.clone());
            }
        }
        let out: Self = serde_json::from_value(base)
            .map_err(|e| PuppetError::serde(format!("apply adaptive config patch: {e}")))?;
        out.validate()?;
        Ok(out)
    }

    /// Cache lifetime as a [`std::time::Duration`].
    pub fn cache_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.cache_ttl_ms)
    }

    /// Debounce delay as a [`std::time::Duration`].
    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layout/config.rs"]
mod tests;
