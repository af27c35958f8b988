//! Serializable puppet description: parts, textures, hit areas, motions and expressions.
//!
//! A definition is a JSON document. Texture paths are resolved by the loader relative to the
//! document; parts reference textures by index. All geometry is in puppet-native pixels with the
//! origin at the top-left of the puppet canvas and y pointing down.

use std::collections::{BTreeMap, HashMap};

use crate::animation::ease::Ease;
use crate::foundation::core::{PixelSize, Point, Rect};
use crate::foundation::error::{PuppetError, PuppetResult};

/// Rectangle in puppet-native pixels.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NativeRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NativeRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn to_rect(self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    pub fn center(self) -> Point {
        Point::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    fn is_valid(self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }
}

/// Point in puppet-native pixels.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NativePoint {
    pub x: f64,
    pub y: f64,
}

/// How strongly a part follows the gaze target.
///
/// A gaze of `(1, 1)` (right, up) shifts the part by `x` pixels right and `y` pixels up and
/// rotates it by `rotation` radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GazeWeights {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
}

impl GazeWeights {
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.rotation == 0.0
    }
}

fn default_opacity() -> f64 {
    1.0
}

/// One textured part of the puppet.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartDef {
    pub id: String,
    /// Parent part id; transforms of the parent apply to this part too.
    #[serde(default)]
    pub parent: Option<String>,
    /// Index into [`PuppetDefinition::textures`].
    pub texture: usize,
    /// Placement of the texture.
    pub rect: NativeRect,
    /// Rotation/scale pivot. Defaults to the rect center.
    #[serde(default)]
    pub pivot: Option<NativePoint>,
    /// Lower values draw first.
    #[serde(default)]
    pub draw_order: i32,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default, skip_serializing_if = "GazeWeights::is_zero")]
    pub gaze: GazeWeights,
}

impl PartDef {
    /// Pivot in native pixels.
    pub fn pivot_point(&self) -> Point {
        self.pivot
            .map(|p| Point::new(p.x, p.y))
            .unwrap_or_else(|| self.rect.center())
    }
}

/// What a hit area represents for tap handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HitKind {
    /// Taps here trigger a random expression.
    Head,
    /// Taps here trigger a random motion from the tap group.
    Body,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HitAreaDef {
    pub id: String,
    pub kind: HitKind,
    pub rect: NativeRect,
}

/// Animatable part property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PartProperty {
    /// Radians, added to the rest pose.
    Rotation,
    /// Native pixels, added to the rest pose.
    OffsetX,
    /// Native pixels, added to the rest pose.
    OffsetY,
    /// Multiplier on the part opacity.
    Opacity,
    /// Multiplier on the part size around its pivot.
    Scale,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KeyframeDef {
    /// Seconds from the clip start.
    pub time: f64,
    pub value: f64,
    /// Curve used to arrive at this keyframe from the previous one.
    #[serde(default)]
    pub ease: Ease,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TrackDef {
    pub part: String,
    pub property: PartProperty,
    pub keyframes: Vec<KeyframeDef>,
}

fn default_fade_secs() -> f64 {
    0.5
}

/// A keyframed motion clip.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionClipDef {
    #[serde(default)]
    pub name: String,
    pub duration_secs: f64,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default = "default_fade_secs")]
    pub fade_in_secs: f64,
    #[serde(default = "default_fade_secs")]
    pub fade_out_secs: f64,
    #[serde(default)]
    pub tracks: Vec<TrackDef>,
}

/// How an expression override combines with the animated value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpressionBlend {
    #[default]
    Add,
    Multiply,
    Overwrite,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionDef {
    pub name: String,
    #[serde(default = "default_fade_secs")]
    pub fade_in_secs: f64,
    #[serde(default = "default_fade_secs")]
    pub fade_out_secs: f64,
    #[serde(default)]
    pub overrides: Vec<ExpressionOverrideDef>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ExpressionOverrideDef {
    pub part: String,
    pub property: PartProperty,
    pub value: f64,
    #[serde(default)]
    pub blend: ExpressionBlend,
}

fn default_idle_group() -> String {
    "Idle".to_owned()
}

fn default_tap_group() -> String {
    "TapBody".to_owned()
}

/// Names of the motion groups the stage plays on its own.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionGroups {
    #[serde(default = "default_idle_group")]
    pub idle: String,
    #[serde(default = "default_tap_group")]
    pub tap_body: String,
    /// Played when a zoom gesture hits a scale limit.
    #[serde(default)]
    pub scale_limit: Option<String>,
}

impl Default for MotionGroups {
    fn default() -> Self {
        Self {
            idle: default_idle_group(),
            tap_body: default_tap_group(),
            scale_limit: None,
        }
    }
}

/// Full puppet description.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuppetDefinition {
    #[serde(default)]
    pub name: String,
    /// Native canvas size; defines the puppet aspect ratio.
    pub canvas: PixelSize,
    /// Texture paths relative to the definition document.
    pub textures: Vec<String>,
    pub parts: Vec<PartDef>,
    #[serde(default)]
    pub hit_areas: Vec<HitAreaDef>,
    #[serde(default)]
    pub motions: BTreeMap<String, Vec<MotionClipDef>>,
    #[serde(default)]
    pub expressions: Vec<ExpressionDef>,
    #[serde(default)]
    pub groups: MotionGroups,
}

impl PuppetDefinition {
    /// Parse and validate a JSON definition.
    pub fn from_json_str(s: &str) -> PuppetResult<Self> {
        let def: Self = serde_json::from_str(s)
            .map_err(|e| PuppetError::serde(format!("puppet definition: {e}")))?;
        def.validate()?;
        Ok(def)
    }

    /// Native width divided by native height.
    pub fn aspect(&self) -> f64 {
        self.canvas.aspect()
    }

    /// Index of the part named `id`.
    pub fn part_index(&self, id: &str) -> Option<usize> {
        self.parts.iter().position(|p| p.id == id)
    }

    pub fn validate(&self) -> PuppetResult<()> {
        if self.canvas.is_empty() {
            return Err(PuppetError::validation("puppet canvas width/height must be > 0"));
        }
        if self.parts.is_empty() {
            return Err(PuppetError::validation("puppet must have at least one part"));
        }

        let mut ids: HashMap<&str, usize> = HashMap::with_capacity(self.parts.len());
        for (i, part) in self.parts.iter().enumerate() {
            if ids.insert(part.id.as_str(), i).is_some() {
                return Err(PuppetError::validation(format!(
                    "duplicate part id '{}'",
                    part.id
                )));
            }
        }

        for part in &self.parts {
            if part.texture >= self.textures.len() {
                return Err(PuppetError::validation(format!(
                    "part '{}' references missing texture index {}",
                    part.id, part.texture
                )));
            }
            if !part.rect.is_valid() {
                return Err(PuppetError::validation(format!(
                    "part '{}' has an empty or non-finite rect",
                    part.id
                )));
            }
            if !(0.0..=1.0).contains(&part.opacity) {
                return Err(PuppetError::validation(format!(
                    "part '{}' opacity must be in [0, 1]",
                    part.id
                )));
            }
            if let Some(parent) = &part.parent
                && !ids.contains_key(parent.as_str())
            {
                return Err(PuppetError::validation(format!(
                    "part '{}' references missing parent '{parent}'",
                    part.id
                )));
            }
        }
        self.check_acyclic(&ids)?;

        for area in &self.hit_areas {
            if !area.rect.is_valid() {
                return Err(PuppetError::validation(format!(
                    "hit area '{}' has an empty or non-finite rect",
                    area.id
                )));
            }
        }

        for (group, clips) in &self.motions {
            for clip in clips {
                validate_clip(group, clip, &ids)?;
            }
        }

        for expr in &self.expressions {
            if !(expr.fade_in_secs >= 0.0 && expr.fade_out_secs >= 0.0) {
                return Err(PuppetError::validation(format!(
                    "expression '{}' fade times must be >= 0",
                    expr.name
                )));
            }
            for ov in &expr.overrides {
                if !ids.contains_key(ov.part.as_str()) {
                    return Err(PuppetError::validation(format!(
                        "expression '{}' references missing part '{}'",
                        expr.name, ov.part
                    )));
                }
                if !ov.value.is_finite() {
                    return Err(PuppetError::validation(format!(
                        "expression '{}' has a non-finite value",
                        expr.name
                    )));
                }
            }
        }

        Ok(())
    }

    fn check_acyclic(&self, ids: &HashMap<&str, usize>) -> PuppetResult<()> {
        for start in 0..self.parts.len() {
            let mut cur = start;
            let mut steps = 0usize;
            while let Some(parent) = self.parts[cur].parent.as_deref() {
                let Some(&next) = ids.get(parent) else {
                    break;
                };
                cur = next;
                steps += 1;
                if steps > self.parts.len() {
                    return Err(PuppetError::validation(format!(
                        "part '{}' has a cyclic parent chain",
                        self.parts[start].id
                    )));
                }
            }
        }
        Ok(())
    }
}

fn validate_clip(group: &str, clip: &MotionClipDef, ids: &HashMap<&str, usize>) -> PuppetResult<()> {
    let label = if clip.name.is_empty() {
        group.to_owned()
    } else {
        format!("{group}/{}", clip.name)
    };
    if !(clip.duration_secs.is_finite() && clip.duration_secs > 0.0) {
        return Err(PuppetError::validation(format!(
            "motion '{label}' duration must be > 0"
        )));
    }
    if !(clip.fade_in_secs >= 0.0 && clip.fade_out_secs >= 0.0) {
        return Err(PuppetError::validation(format!(
            "motion '{label}' fade times must be >= 0"
        )));
    }
    for track in &clip.tracks {
        if !ids.contains_key(track.part.as_str()) {
            return Err(PuppetError::validation(format!(
                "motion '{label}' references missing part '{}'",
                track.part
            )));
        }
        if track.keyframes.is_empty() {
            return Err(PuppetError::validation(format!(
                "motion '{label}' has a track without keyframes"
            )));
        }
        let mut prev = f64::NEG_INFINITY;
        for k in &track.keyframes {
            if !(k.time.is_finite() && k.value.is_finite()) {
                return Err(PuppetError::validation(format!(
                    "motion '{label}' has a non-finite keyframe"
                )));
            }
            if k.time < prev || k.time < 0.0 || k.time > clip.duration_secs {
                return Err(PuppetError::validation(format!(
                    "motion '{label}' keyframes must be sorted and within the clip duration"
                )));
            }
            prev = k.time;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/puppet/definition.rs"]
mod tests;
