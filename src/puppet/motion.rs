//! Motion and expression playback.
//!
//! Clips are compiled once per instance against the part index table, then shared as
//! `Rc<CompiledClip>` between the group table and whatever is currently playing.

use std::collections::HashMap;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::animation::ease::Ease;
use crate::puppet::definition::{
    ExpressionBlend, ExpressionDef, KeyframeDef, MotionClipDef, PartProperty,
};

/// Per-part animated pose, relative to the rest pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartPose {
    pub rotation: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub opacity: f64,
    pub scale: f64,
}

impl Default for PartPose {
    fn default() -> Self {
        Self::REST
    }
}

impl PartPose {
    pub const REST: Self = Self {
        rotation: 0.0,
        offset_x: 0.0,
        offset_y: 0.0,
        opacity: 1.0,
        scale: 1.0,
    };

    pub fn get(&self, property: PartProperty) -> f64 {
        match property {
            PartProperty::Rotation => self.rotation,
            PartProperty::OffsetX => self.offset_x,
            PartProperty::OffsetY => self.offset_y,
            PartProperty::Opacity => self.opacity,
            PartProperty::Scale => self.scale,
        }
    }

    pub fn set(&mut self, property: PartProperty, value: f64) {
        match property {
            PartProperty::Rotation => self.rotation = value,
            PartProperty::OffsetX => self.offset_x = value,
            PartProperty::OffsetY => self.offset_y = value,
            PartProperty::Opacity => self.opacity = value,
            PartProperty::Scale => self.scale = value,
        }
    }

    /// Blend a motion sample in with `weight`: additive properties add, multipliers lerp from 1.
    fn blend_motion(&mut self, property: PartProperty, value: f64, weight: f64) {
        match property {
            PartProperty::Rotation | PartProperty::OffsetX | PartProperty::OffsetY => {
                self.set(property, self.get(property) + value * weight);
            }
            PartProperty::Opacity | PartProperty::Scale => {
                self.set(property, self.get(property) * (1.0 + (value - 1.0) * weight));
            }
        }
    }
}

/// Playback priority. Higher priorities interrupt lower ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MotionPriority {
    Idle,
    Normal,
    Force,
}

#[derive(Clone, Debug)]
struct CompiledTrack {
    part: usize,
    property: PartProperty,
    keys: SmallVec<[KeyframeDef; 4]>,
}

/// A motion clip resolved against an instance's parts.
#[derive(Clone, Debug)]
pub struct CompiledClip {
    pub name: String,
    pub duration: f64,
    pub looping: bool,
    pub fade_in: f64,
    pub fade_out: f64,
    tracks: Vec<CompiledTrack>,
}

impl CompiledClip {
    /// Compile `def`; tracks naming unknown parts are dropped.
    pub fn compile(def: &MotionClipDef, part_index: &HashMap<String, usize>) -> Self {
        let tracks = def
            .tracks
            .iter()
            .filter_map(|t| {
                let part = *part_index.get(&t.part)?;
                Some(CompiledTrack {
                    part,
                    property: t.property,
                    keys: t.keyframes.iter().copied().collect(),
                })
            })
            .collect();
        Self {
            name: def.name.clone(),
            duration: def.duration_secs,
            looping: def.looping,
            fade_in: def.fade_in_secs.max(0.0),
            fade_out: def.fade_out_secs.max(0.0),
            tracks,
        }
    }

    fn apply(&self, t: f64, weight: f64, poses: &mut [PartPose]) {
        for track in &self.tracks {
            if let Some(pose) = poses.get_mut(track.part) {
                pose.blend_motion(track.property, sample_keys(&track.keys, t), weight);
            }
        }
    }
}

/// Sample a keyframe track at `t` seconds. Values hold before the first and after the last key.
pub fn sample_keys(keys: &[KeyframeDef], t: f64) -> f64 {
    let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
        return 0.0;
    };
    if t <= first.time {
        return first.value;
    }
    if t >= last.time {
        return last.value;
    }
    // First keyframe strictly after t.
    let i = keys.partition_point(|k| k.time <= t);
    let (a, b) = (keys[i - 1], keys[i]);
    let span = b.time - a.time;
    if span <= 0.0 {
        return b.value;
    }
    b.ease.lerp(a.value, b.value, (t - a.time) / span)
}

fn fade_weight(elapsed: f64, duration: f64) -> f64 {
    if duration <= 0.0 {
        return 1.0;
    }
    Ease::InOutSine.apply(elapsed / duration)
}

#[derive(Clone, Debug)]
struct ActiveMotion {
    clip: Rc<CompiledClip>,
    priority: MotionPriority,
    elapsed: f64,
    // Seconds since the fade-out began.
    fading_out: Option<f64>,
}

impl ActiveMotion {
    fn weight(&self) -> f64 {
        let w_in = fade_weight(self.elapsed, self.clip.fade_in);
        let w_out = match self.fading_out {
            Some(out) => 1.0 - fade_weight(out, self.clip.fade_out),
            None => 1.0,
        };
        (w_in * w_out).clamp(0.0, 1.0)
    }

    fn local_time(&self) -> f64 {
        if self.clip.looping {
            self.elapsed % self.clip.duration
        } else {
            self.elapsed.min(self.clip.duration)
        }
    }

    fn is_done(&self) -> bool {
        match self.fading_out {
            Some(out) => out >= self.clip.fade_out,
            None => !self.clip.looping && self.elapsed >= self.clip.duration,
        }
    }
}

/// Plays one motion at a time, cross-fading from the previous one.
#[derive(Clone, Debug, Default)]
pub struct MotionPlayer {
    active: SmallVec<[ActiveMotion; 2]>,
}

impl MotionPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Priority of the motion currently fading in or playing, if any.
    pub fn current_priority(&self) -> Option<MotionPriority> {
        self.active
            .iter()
            .filter(|m| m.fading_out.is_none())
            .map(|m| m.priority)
            .max()
    }

    /// Name of the motion currently fading in or playing.
    pub fn current_name(&self) -> Option<&str> {
        self.active
            .iter()
            .rev()
            .find(|m| m.fading_out.is_none())
            .map(|m| m.clip.name.as_str())
    }

    /// Return `true` when no motion (not even a fading one) is playing.
    pub fn is_idle(&self) -> bool {
        self.active.is_empty()
    }

    /// Start `clip`. Returns `false` when a higher-priority motion is playing.
    pub fn start(&mut self, clip: Rc<CompiledClip>, priority: MotionPriority) -> bool {
        if let Some(current) = self.current_priority()
            && priority < current
        {
            return false;
        }
        for m in &mut self.active {
            if m.fading_out.is_none() {
                m.fading_out = Some(0.0);
            }
        }
        self.active.push(ActiveMotion {
            clip,
            priority,
            elapsed: 0.0,
            fading_out: None,
        });
        true
    }

    /// Advance playback by `dt` seconds.
    pub fn update(&mut self, dt: f64) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        for m in &mut self.active {
            m.elapsed += dt;
            match m.fading_out.as_mut() {
                Some(out) => *out += dt,
                None => {
                    let c = &m.clip;
                    if !c.looping && m.elapsed >= c.duration - c.fade_out {
                        m.fading_out = Some(m.elapsed - (c.duration - c.fade_out).max(0.0));
                    }
                }
            }
        }
        self.active.retain(|m| !m.is_done());
    }

    /// Blend every playing motion into `poses`.
    pub fn apply(&self, poses: &mut [PartPose]) {
        for m in &self.active {
            m.clip.apply(m.local_time(), m.weight(), poses);
        }
    }

    pub fn stop_all(&mut self) {
        self.active.clear();
    }
}

#[derive(Clone, Debug)]
struct CompiledOverride {
    part: usize,
    property: PartProperty,
    value: f64,
    blend: ExpressionBlend,
}

/// An expression resolved against an instance's parts.
#[derive(Clone, Debug)]
pub struct CompiledExpression {
    pub name: String,
    pub fade_in: f64,
    pub fade_out: f64,
    overrides: Vec<CompiledOverride>,
}

impl CompiledExpression {
    pub fn compile(def: &ExpressionDef, part_index: &HashMap<String, usize>) -> Self {
        let overrides = def
            .overrides
            .iter()
            .filter_map(|o| {
                Some(CompiledOverride {
                    part: *part_index.get(&o.part)?,
                    property: o.property,
                    value: o.value,
                    blend: o.blend,
                })
            })
            .collect();
        Self {
            name: def.name.clone(),
            fade_in: def.fade_in_secs.max(0.0),
            fade_out: def.fade_out_secs.max(0.0),
            overrides,
        }
    }

    fn apply(&self, weight: f64, poses: &mut [PartPose]) {
        for o in &self.overrides {
            let Some(pose) = poses.get_mut(o.part) else {
                continue;
            };
            let cur = pose.get(o.property);
            let next = match o.blend {
                ExpressionBlend::Add => cur + o.value * weight,
                ExpressionBlend::Multiply => cur * (1.0 + (o.value - 1.0) * weight),
                ExpressionBlend::Overwrite => cur + (o.value - cur) * weight,
            };
            pose.set(o.property, next);
        }
    }
}

#[derive(Clone, Debug)]
struct ActiveExpression {
    expr: Rc<CompiledExpression>,
    elapsed: f64,
    fading_out: Option<f64>,
}

/// Holds the current expression and the one fading out behind it.
#[derive(Clone, Debug, Default)]
pub struct ExpressionPlayer {
    active: SmallVec<[ActiveExpression; 2]>,
}

impl ExpressionPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_name(&self) -> Option<&str> {
        self.active
            .iter()
            .rev()
            .find(|e| e.fading_out.is_none())
            .map(|e| e.expr.name.as_str())
    }

    /// Switch to `expr`, fading the current expression out.
    pub fn set(&mut self, expr: Rc<CompiledExpression>) {
        self.fade_out_current();
        self.active.push(ActiveExpression {
            expr,
            elapsed: 0.0,
            fading_out: None,
        });
    }

    /// Fade the current expression out without replacing it.
    pub fn clear(&mut self) {
        self.fade_out_current();
    }

    fn fade_out_current(&mut self) {
        for e in &mut self.active {
            if e.fading_out.is_none() {
                e.fading_out = Some(0.0);
            }
        }
    }

    pub fn update(&mut self, dt: f64) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        for e in &mut self.active {
            e.elapsed += dt;
            if let Some(out) = e.fading_out.as_mut() {
                *out += dt;
            }
        }
        self.active
            .retain(|e| e.fading_out.is_none_or(|out| out < e.expr.fade_out));
    }

    pub fn apply(&self, poses: &mut [PartPose]) {
        for e in &self.active {
            let w_in = fade_weight(e.elapsed, e.expr.fade_in);
            let w_out = e
                .fading_out
                .map_or(1.0, |out| 1.0 - fade_weight(out, e.expr.fade_out));
            e.expr.apply((w_in * w_out).clamp(0.0, 1.0), poses);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/puppet/motion.rs"]
mod tests;
