//! A loaded, drawable puppet.

use std::collections::HashMap;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::foundation::core::{PixelSize, Point, Rect, Vec2};
use crate::foundation::error::{PuppetError, PuppetResult};
use crate::foundation::rng::Rng64;
use crate::puppet::definition::{GazeWeights, HitKind, MotionGroups, NativeRect};
use crate::puppet::loader::LoadedPuppet;
use crate::puppet::motion::{
    CompiledClip, CompiledExpression, ExpressionPlayer, MotionPlayer, MotionPriority, PartPose,
};
use crate::render::context::{DrawQuad, RenderContext, TextureHandle};
use crate::transform::matrix::Matrix44;
use crate::transform::stack::TransformStack;

/// Gaze smoothing rate in 1/seconds.
const GAZE_FOLLOW_RATE: f64 = 10.0;

#[derive(Clone, Debug)]
struct PartRuntime {
    id: String,
    texture: usize,
    rect: Rect,
    pivot: Point,
    base_opacity: f64,
    gaze: GazeWeights,
}

#[derive(Clone, Copy, Debug)]
struct HitArea {
    kind: HitKind,
    rect: NativeRect,
}

#[derive(Clone, Copy, Debug, Default)]
struct Gaze {
    target: Vec2,
    current: Vec2,
}

/// A puppet with its textures uploaded to a drawing context.
///
/// Instances own texture handles and must be given back through [`PuppetInstance::release`].
/// `release` consumes the instance, so a released instance cannot be drawn or released again.
#[derive(Debug)]
pub struct PuppetInstance {
    name: String,
    canvas: PixelSize,
    textures: Vec<TextureHandle>,
    parts: Vec<PartRuntime>,
    children: Vec<SmallVec<[usize; 4]>>,
    roots: SmallVec<[usize; 4]>,
    draw_order: Vec<usize>,
    hit_areas: Vec<HitArea>,
    groups: MotionGroups,
    clips: HashMap<String, Vec<Rc<CompiledClip>>>,
    expressions: Vec<Rc<CompiledExpression>>,
    motions: MotionPlayer,
    expression: ExpressionPlayer,
    poses: Vec<PartPose>,
    world: Vec<Matrix44>,
    alpha: Vec<f64>,
    gaze: Gaze,
    model_scale: f64,
    model_position: Vec2,
    rng: Rng64,
}

impl PuppetInstance {
    /// Validate `loaded`, compile its animation data and upload its textures into `ctx`.
    ///
    /// On failure every texture uploaded so far is released again.
    pub fn build(loaded: LoadedPuppet, ctx: &mut dyn RenderContext, seed: u64) -> PuppetResult<Self> {
        let LoadedPuppet { definition, images } = loaded;
        definition.validate()?;
        if images.len() != definition.textures.len() {
            return Err(PuppetError::validation(format!(
                "puppet '{}' declares {} textures but {} images were provided",
                definition.name,
                definition.textures.len(),
                images.len()
            )));
        }

        let mut textures = Vec::with_capacity(images.len());
        for img in &images {
            match ctx.create_texture(img) {
                Ok(h) => textures.push(h),
                Err(e) => {
                    for h in textures {
                        ctx.release_texture(h);
                    }
                    return Err(e);
                }
            }
        }

        let part_index: HashMap<String, usize> = definition
            .parts
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();

        let n = definition.parts.len();
        let mut children: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); n];
        let mut roots = SmallVec::new();
        for (i, p) in definition.parts.iter().enumerate() {
            match p.parent.as_ref().and_then(|id| part_index.get(id)) {
                Some(&parent) => children[parent].push(i),
                None => roots.push(i),
            }
        }

        let mut draw_order: Vec<usize> = (0..n).collect();
        // Stable: equal draw orders keep declaration order.
        draw_order.sort_by_key(|&i| definition.parts[i].draw_order);

        let parts = definition
            .parts
            .iter()
            .map(|p| PartRuntime {
                id: p.id.clone(),
                texture: p.texture,
                rect: p.rect.to_rect(),
                pivot: p.pivot_point(),
                base_opacity: p.opacity,
                gaze: p.gaze,
            })
            .collect();

        let clips = definition
            .motions
            .iter()
            .map(|(group, defs)| {
                let compiled = defs
                    .iter()
                    .map(|d| Rc::new(CompiledClip::compile(d, &part_index)))
                    .collect();
                (group.clone(), compiled)
            })
            .collect();

        let expressions = definition
            .expressions
            .iter()
            .map(|e| Rc::new(CompiledExpression::compile(e, &part_index)))
            .collect();

        tracing::debug!(
            name = %definition.name,
            parts = n,
            textures = textures.len(),
            "puppet instance built"
        );

        Ok(Self {
            name: definition.name,
            canvas: definition.canvas,
            textures,
            parts,
            children,
            roots,
            draw_order,
            hit_areas: definition
                .hit_areas
                .iter()
                .map(|a| HitArea {
                    kind: a.kind,
                    rect: a.rect,
                })
                .collect(),
            groups: definition.groups,
            clips,
            expressions,
            motions: MotionPlayer::new(),
            expression: ExpressionPlayer::new(),
            poses: vec![PartPose::REST; n],
            world: vec![Matrix44::IDENTITY; n],
            alpha: vec![1.0; n],
            gaze: Gaze::default(),
            model_scale: 1.0,
            model_position: Vec2::ZERO,
            rng: Rng64::new(seed),
        })
    }

    /// Give every texture back to `ctx`.
    pub fn release(self, ctx: &mut dyn RenderContext) {
        for h in &self.textures {
            ctx.release_texture(*h);
        }
        tracing::debug!(name = %self.name, textures = self.textures.len(), "puppet instance released");
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Native canvas size of the definition.
    pub fn canvas_size(&self) -> PixelSize {
        self.canvas
    }

    pub fn texture_handles(&self) -> &[TextureHandle] {
        &self.textures
    }

    pub fn motion_groups(&self) -> &MotionGroups {
        &self.groups
    }

    /// Apply adaptive layout output.
    pub fn set_layout(&mut self, scale: f64, position: Vec2) {
        self.model_scale = scale;
        self.model_position = position;
    }

    pub fn model_scale(&self) -> f64 {
        self.model_scale
    }

    pub fn model_position(&self) -> Vec2 {
        self.model_position
    }

    /// Native pixels to logical view units.
    ///
    /// The native height spans `2 * scale` logical units, centered on the model position; native
    /// y points down, logical y points up.
    pub fn model_matrix(&self) -> Matrix44 {
        let w = f64::from(self.canvas.width.max(1));
        let h = f64::from(self.canvas.height.max(1));
        let k = self.model_scale * 2.0 / h;
        Matrix44::from_translation(self.model_position.x, self.model_position.y)
            * Matrix44::from_scale(k, -k)
            * Matrix44::from_translation(-w * 0.5, -h * 0.5)
    }

    /// Set the gaze target; both components are clamped to `[-1, 1]`.
    pub fn set_gaze_target(&mut self, x: f64, y: f64) {
        let clamp = |v: f64| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        self.gaze.target = Vec2::new(clamp(x), clamp(y));
    }

    pub fn gaze_target(&self) -> Vec2 {
        self.gaze.target
    }

    /// Smoothed gaze used for the current pose.
    pub fn gaze(&self) -> Vec2 {
        self.gaze.current
    }

    /// Kind of the hit area under the logical point `(x, y)`. Head areas win over body areas.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<HitKind> {
        let inv = self.model_matrix().inverse_2d()?;
        let p = inv.transform_point(Point::new(x, y));
        let mut found = None;
        for area in &self.hit_areas {
            if area.rect.to_rect().contains(p) {
                if area.kind == HitKind::Head {
                    return Some(HitKind::Head);
                }
                found = Some(area.kind);
            }
        }
        found
    }

    /// Number of clips in `group`.
    pub fn motion_count(&self, group: &str) -> usize {
        self.clips.get(group).map_or(0, Vec::len)
    }

    /// Name of the motion currently playing.
    pub fn current_motion(&self) -> Option<&str> {
        self.motions.current_name()
    }

    /// Name of the current expression.
    pub fn current_expression(&self) -> Option<&str> {
        self.expression.current_name()
    }

    /// Start clip `index` of `group`.
    pub fn start_motion(&mut self, group: &str, index: usize, priority: MotionPriority) -> bool {
        let Some(clip) = self.clips.get(group).and_then(|c| c.get(index)) else {
            return false;
        };
        let started = self.motions.start(Rc::clone(clip), priority);
        if started {
            tracing::debug!(group, index, ?priority, "motion started");
        }
        started
    }

    /// Start a uniformly chosen clip of `group`.
    pub fn start_random_motion(&mut self, group: &str, priority: MotionPriority) -> bool {
        let Some(index) = self.rng.pick_index(self.motion_count(group)) else {
            return false;
        };
        self.start_motion(group, index, priority)
    }

    /// Switch to the expression named `name`.
    pub fn set_expression(&mut self, name: &str) -> bool {
        let Some(expr) = self.expressions.iter().find(|e| e.name == name) else {
            return false;
        };
        self.expression.set(Rc::clone(expr));
        true
    }

    /// Switch to a uniformly chosen expression.
    pub fn set_random_expression(&mut self) -> bool {
        let Some(i) = self.rng.pick_index(self.expressions.len()) else {
            return false;
        };
        let expr = Rc::clone(&self.expressions[i]);
        tracing::debug!(expression = %expr.name, "expression set");
        self.expression.set(expr);
        true
    }

    /// Advance animation by `dt` seconds and rebuild the pose.
    pub fn update(&mut self, dt: f64) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        if self.motions.current_priority().is_none() {
            let idle = self.groups.idle.clone();
            self.start_random_motion(&idle, MotionPriority::Idle);
        }
        self.motions.update(dt);
        self.expression.update(dt);

        let follow = 1.0 - (-GAZE_FOLLOW_RATE * dt).exp();
        self.gaze.current += (self.gaze.target - self.gaze.current) * follow;

        self.poses.fill(PartPose::REST);
        self.motions.apply(&mut self.poses);
        self.expression.apply(&mut self.poses);

        let g = self.gaze.current;
        for (pose, part) in self.poses.iter_mut().zip(&self.parts) {
            pose.offset_x += g.x * part.gaze.x;
            pose.offset_y -= g.y * part.gaze.y;
            pose.rotation += g.x * part.gaze.rotation;
        }
    }

    /// Animated pose of the part named `id`.
    pub fn part_pose(&self, id: &str) -> Option<PartPose> {
        let i = self.parts.iter().position(|p| p.id == id)?;
        self.poses.get(i).copied()
    }

    /// Draw every part. The stack's current matrix must map logical units to clip space.
    ///
    /// The stack depth is the same before and after the call.
    pub fn draw(&mut self, stack: &mut TransformStack, ctx: &mut dyn RenderContext) {
        stack.push();
        stack.mult_matrix(&self.model_matrix());
        for &root in &self.roots {
            visit(
                root,
                1.0,
                &self.parts,
                &self.children,
                &self.poses,
                &mut self.world,
                &mut self.alpha,
                stack,
            );
        }
        stack.pop();

        for &i in &self.draw_order {
            let part = &self.parts[i];
            let Some(&texture) = self.textures.get(part.texture) else {
                continue;
            };
            ctx.draw_quad(&DrawQuad {
                texture,
                rect: part.rect,
                matrix: &self.world[i],
                opacity: self.alpha[i] as f32,
            });
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn visit(
    i: usize,
    parent_alpha: f64,
    parts: &[PartRuntime],
    children: &[SmallVec<[usize; 4]>],
    poses: &[PartPose],
    world: &mut [Matrix44],
    alpha: &mut [f64],
    stack: &mut TransformStack,
) {
    let part = &parts[i];
    let pose = poses[i];
    stack.push();
    stack.mult_matrix(&local_matrix(part.pivot, &pose));
    world[i] = *stack.matrix();
    alpha[i] = (parent_alpha * part.base_opacity * pose.opacity).clamp(0.0, 1.0);
    for &c in &children[i] {
        visit(c, alpha[i], parts, children, poses, world, alpha, stack);
    }
    stack.pop();
}

fn local_matrix(pivot: Point, pose: &PartPose) -> Matrix44 {
    Matrix44::from_translation(pose.offset_x + pivot.x, pose.offset_y + pivot.y)
        * Matrix44::from_rotation_z(pose.rotation)
        * Matrix44::from_scale(pose.scale, pose.scale)
        * Matrix44::from_translation(-pivot.x, -pivot.y)
}

#[cfg(test)]
#[path = "../../tests/unit/puppet/instance.rs"]
mod tests;
