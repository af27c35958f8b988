//! The stage: one drawing surface, one puppet slot, one render loop.
//!
//! [`PuppetStage`] wires the layout engine, view transform, input router, puppet lifecycle and
//! render loop together and is the surface host applications talk to.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::foundation::core::{FrameRGBA, PixelSize, Rgba8Premul, Vec2};
use crate::foundation::error::{PuppetError, PuppetResult};
use crate::input::router::{InputAction, InputEvent, InputRouter};
use crate::layout::config::AdaptiveConfig;
use crate::layout::engine::{AdaptiveLayoutEngine, AdaptiveParams, LayoutInput};
use crate::puppet::definition::HitKind;
use crate::puppet::instance::PuppetInstance;
use crate::puppet::lifecycle::{LifecycleState, LoadOutcome, PuppetLifecycle};
use crate::puppet::loader::{LocalBoxFuture, PuppetLoader, PuppetSource};
use crate::puppet::motion::MotionPriority;
use crate::render::context::{BackendKind, SharedContext, create_context, share_context};
use crate::render::frame_loop::{FrameScheduler, FrameTime, RenderLoop};
use crate::transform::stack::TransformStack;
use crate::transform::view::{ViewBounds, ViewTransform};

/// Longest time step fed to animation, so a stalled host does not fast-forward motions.
const MAX_FRAME_DT: f64 = 0.25;

/// Stage construction options.
#[derive(Clone, Debug)]
pub struct StageOptions {
    /// Drawing-surface size in pixels.
    pub surface: PixelSize,
    /// Container (display) size; defaults to the surface size when `None`.
    pub display: Option<PixelSize>,
    pub backend: BackendKind,
    pub config: AdaptiveConfig,
    /// Seed for random motion and expression choice.
    pub seed: u64,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            surface: PixelSize::new(800, 800),
            display: None,
            backend: BackendKind::Cpu,
            config: AdaptiveConfig::default(),
            seed: 0x5eed_cafe,
        }
    }
}

/// Diagnostics snapshot returned by [`PuppetStage::adaptive_status`].
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveStatus {
    pub enabled: bool,
    pub config: AdaptiveConfig,
    pub last_applied_size: Option<PixelSize>,
}

#[derive(Clone, Copy, Debug)]
struct PendingResize {
    display: PixelSize,
    /// First tick that saw the request; the delay runs from there.
    requested_at: Option<FrameTime>,
}

#[derive(Debug)]
struct StageState {
    view: ViewTransform,
    stack: TransformStack,
    layout: AdaptiveLayoutEngine,
    router: InputRouter,
    display: PixelSize,
    pending_resize: Option<PendingResize>,
    last_applied_size: Option<PixelSize>,
    last_params: Option<AdaptiveParams>,
    last_tick: Option<FrameTime>,
}

/// Facade over the whole pipeline.
pub struct PuppetStage {
    state: Rc<RefCell<StageState>>,
    lifecycle: PuppetLifecycle,
    render_loop: RenderLoop,
}

impl std::fmt::Debug for PuppetStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PuppetStage")
            .field("lifecycle", &self.lifecycle)
            .field("render_loop", &self.render_loop)
            .finish_non_exhaustive()
    }
}

impl PuppetStage {
    /// Create a stage with a context of `options.backend`.
    ///
    /// A drawing context that cannot be created is fatal and returned as a context error.
    pub fn new(
        options: StageOptions,
        loader: Rc<dyn PuppetLoader>,
        scheduler: Rc<dyn FrameScheduler>,
    ) -> PuppetResult<Self> {
        let ctx = create_context(options.backend, options.surface)?;
        Self::with_context(options, share_context(ctx), loader, scheduler)
    }

    /// Create a stage around an existing drawing context.
    pub fn with_context(
        options: StageOptions,
        context: SharedContext,
        loader: Rc<dyn PuppetLoader>,
        scheduler: Rc<dyn FrameScheduler>,
    ) -> PuppetResult<Self> {
        options.config.validate()?;
        let surface = context
            .try_borrow()
            .map_err(|_| PuppetError::context("drawing context is busy"))?
            .surface_size();

        let state = Rc::new(RefCell::new(StageState {
            view: ViewTransform::new(surface),
            stack: TransformStack::new(),
            layout: AdaptiveLayoutEngine::new(options.config),
            router: InputRouter::new(),
            display: options.display.unwrap_or(surface),
            pending_resize: None,
            last_applied_size: None,
            last_params: None,
            last_tick: None,
        }));
        let lifecycle = PuppetLifecycle::new(loader, context, options.seed);

        let tick_state = Rc::clone(&state);
        let tick_lifecycle = lifecycle.clone();
        let render_loop = RenderLoop::new(scheduler, move |now| {
            tick(&tick_state, &tick_lifecycle, now);
        });

        if let Ok(mut st) = state.try_borrow_mut() {
            relayout(&mut st, &lifecycle);
        }

        Ok(Self {
            state,
            lifecycle,
            render_loop,
        })
    }

    /// Start the render loop.
    pub fn start(&self) {
        self.render_loop.start();
    }

    /// Stop rendering, detach input, then release the puppet and refuse further loads.
    pub fn stop(&self) {
        self.render_loop.stop();
        if let Ok(mut st) = self.state.try_borrow_mut() {
            st.router.detach();
        }
        self.lifecycle.destroy();
        tracing::info!("puppet stage stopped");
    }

    pub fn is_running(&self) -> bool {
        self.render_loop.is_running()
    }

    pub fn frame_count(&self) -> u64 {
        self.render_loop.frame_count()
    }

    pub fn lifecycle(&self) -> &PuppetLifecycle {
        &self.lifecycle
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Load a puppet and swap it in. See [`PuppetLifecycle::load`].
    ///
    /// Once installed, the layout is recomputed for the new puppet's aspect ratio.
    pub fn load(&self, source: PuppetSource) -> LocalBoxFuture<'static, PuppetResult<LoadOutcome>> {
        let pending = self.lifecycle.load(source);
        let state = Rc::clone(&self.state);
        let lifecycle = self.lifecycle.clone();
        Box::pin(async move {
            let outcome = pending.await?;
            if outcome == LoadOutcome::Installed {
                let aspect = lifecycle.model_canvas_size().map(PixelSize::aspect);
                match state.try_borrow_mut() {
                    Ok(mut st) => {
                        st.layout.set_model_aspect(aspect);
                        relayout(&mut st, &lifecycle);
                    }
                    Err(_) => tracing::warn!("stage busy; layout refresh skipped"),
                }
            }
            Ok(outcome)
        })
    }

    /// Release the active puppet without stopping the stage.
    pub fn release_puppet(&self) {
        self.lifecycle.release();
        if let Ok(mut st) = self.state.try_borrow_mut() {
            st.layout.set_model_aspect(None);
            relayout(&mut st, &self.lifecycle);
        }
    }

    /// Run `f` on the drawable puppet.
    pub fn with_puppet<R>(&self, f: impl FnOnce(&mut PuppetInstance) -> R) -> Option<R> {
        self.lifecycle.with_drawable(f)
    }

    /// Feed a host input event.
    pub fn handle_input(&self, event: &InputEvent) {
        let actions = {
            let Ok(mut st) = self.state.try_borrow_mut() else {
                return;
            };
            let st = &mut *st;
            st.router.handle(event, &mut st.view)
        };
        for action in actions {
            self.apply_action(action);
        }
    }

    fn apply_action(&self, action: InputAction) {
        match action {
            InputAction::Tap { x, y } => {
                self.lifecycle.with_drawable(|p| match p.hit_test(x, y) {
                    Some(HitKind::Head) => {
                        p.set_random_expression();
                    }
                    Some(HitKind::Body) => {
                        let group = p.motion_groups().tap_body.clone();
                        p.start_random_motion(&group, MotionPriority::Normal);
                    }
                    None => {}
                });
            }
            InputAction::Gaze { x, y } => {
                self.lifecycle.with_drawable(|p| p.set_gaze_target(x, y));
            }
            InputAction::ScaleLimitReached => {
                self.lifecycle.with_drawable(|p| {
                    if let Some(group) = p.motion_groups().scale_limit.clone() {
                        p.start_random_motion(&group, MotionPriority::Normal);
                    }
                });
            }
        }
    }

    /// Apply a container size now.
    pub fn set_container_size(&self, display: PixelSize) {
        let Ok(mut st) = self.state.try_borrow_mut() else {
            return;
        };
        st.pending_resize = None;
        st.display = display;
        relayout(&mut st, &self.lifecycle);
    }

    /// Record a container size; it is applied once the debounce delay has passed, measured from
    /// the next frame.
    ///
    /// Repeated notifications restart the delay.
    pub fn notify_container_size(&self, display: PixelSize) {
        let Ok(mut st) = self.state.try_borrow_mut() else {
            return;
        };
        st.pending_resize = Some(PendingResize {
            display,
            requested_at: None,
        });
    }

    /// Native pixel size of the loaded puppet.
    pub fn model_canvas_size(&self) -> Option<PixelSize> {
        self.lifecycle.model_canvas_size()
    }

    /// Surface size with the puppet's aspect ratio for a container `container_width` wide.
    pub fn calculate_adaptive_canvas_size(&self, container_width: u32) -> Option<PixelSize> {
        let model = self.model_canvas_size()?;
        if container_width == 0 || model.is_empty() {
            return None;
        }
        let height = (f64::from(container_width) / model.aspect()).round();
        if !(height >= 1.0 && height <= f64::from(u32::MAX)) {
            return None;
        }
        Some(PixelSize::new(container_width, height as u32))
    }

    /// Resize the drawing surface to [`PuppetStage::calculate_adaptive_canvas_size`] and
    /// recompute every transform. Returns `false` when nothing was applied.
    pub fn apply_adaptive_canvas_size(&self, container_width: u32) -> bool {
        let Some(size) = self.calculate_adaptive_canvas_size(container_width) else {
            return false;
        };
        let resized = match self.lifecycle.context().try_borrow_mut() {
            Ok(mut ctx) => ctx.resize(size),
            Err(_) => Err(PuppetError::context("drawing context is busy")),
        };
        if let Err(e) = resized {
            tracing::warn!("adaptive canvas size {}x{} rejected: {e}", size.width, size.height);
            return false;
        }
        let Ok(mut st) = self.state.try_borrow_mut() else {
            return false;
        };
        st.last_applied_size = Some(size);
        relayout(&mut st, &self.lifecycle);
        tracing::debug!(width = size.width, height = size.height, "adaptive canvas size applied");
        true
    }

    pub fn adaptive_status(&self) -> Option<AdaptiveStatus> {
        let st = self.state.try_borrow().ok()?;
        let config = st.layout.config().clone();
        Some(AdaptiveStatus {
            enabled: config.enabled,
            config,
            last_applied_size: st.last_applied_size,
        })
    }

    /// Replace the adaptive configuration and relayout.
    pub fn set_adaptive_config(&self, config: AdaptiveConfig) -> PuppetResult<()> {
        config.validate()?;
        let mut st = self
            .state
            .try_borrow_mut()
            .map_err(|_| PuppetError::context("stage is busy"))?;
        st.layout.set_config(config);
        relayout(&mut st, &self.lifecycle);
        Ok(())
    }

    /// Shallow-merge `patch` (a JSON object of camelCase fields) into the configuration.
    pub fn update_adaptive_config(&self, patch: &serde_json::Value) -> PuppetResult<()> {
        let merged = {
            let st = self
                .state
                .try_borrow()
                .map_err(|_| PuppetError::context("stage is busy"))?;
            st.layout.config().merged(patch)?
        };
        self.set_adaptive_config(merged)
    }

    /// Layout result currently applied.
    pub fn adaptive_params(&self) -> Option<AdaptiveParams> {
        self.state.try_borrow().ok()?.last_params
    }

    /// Snapshot of the view transform.
    pub fn view(&self) -> Option<ViewTransform> {
        Some(self.state.try_borrow().ok()?.view.clone())
    }

    /// Most recently presented frame.
    pub fn last_frame(&self) -> Option<FrameRGBA> {
        let ctx = self.lifecycle.context().try_borrow().ok()?;
        ctx.last_frame().cloned()
    }
}

impl Drop for PuppetStage {
    fn drop(&mut self) {
        self.render_loop.stop();
    }
}

fn relayout(st: &mut StageState, lifecycle: &PuppetLifecycle) {
    let Ok(canvas) = lifecycle.context().try_borrow().map(|c| c.surface_size()) else {
        return;
    };
    st.view.set_canvas_size(canvas);

    let params = if st.layout.config().enabled {
        st.layout.compute(LayoutInput {
            canvas,
            display: st.display,
        })
    } else {
        AdaptiveParams {
            view_bounds: ViewBounds::UNIT,
            model_scale: st.layout.config().base_scale,
            model_position: Vec2::ZERO,
        }
    };

    st.view.set_bounds(params.view_bounds);
    match params.view_bounds.scaled(2.0) {
        Ok(max) => {
            if let Err(e) =
                st.view
                    .set_max_screen_rect(max.left(), max.right(), max.bottom(), max.top())
            {
                tracing::warn!("max screen rect not updated: {e}");
            }
        }
        Err(e) => tracing::warn!("max screen rect not updated: {e}"),
    }
    lifecycle.with_drawable(|p| p.set_layout(params.model_scale, params.model_position));
    st.last_params = Some(params);
}

fn tick(state: &Rc<RefCell<StageState>>, lifecycle: &PuppetLifecycle, now: FrameTime) {
    let Ok(mut st) = state.try_borrow_mut() else {
        tracing::trace!("stage busy; frame skipped");
        return;
    };
    let st = &mut *st;

    let dt = st
        .last_tick
        .map_or(0.0, |prev| now.0.saturating_sub(prev.0).as_secs_f64())
        .min(MAX_FRAME_DT);
    st.last_tick = Some(now);

    if let Some(p) = st.pending_resize.as_mut() {
        let requested_at = *p.requested_at.get_or_insert(now);
        let display = p.display;
        let debounce: Duration = st.layout.config().debounce();
        if now.0.saturating_sub(requested_at.0) >= debounce {
            st.pending_resize = None;
            st.display = display;
            relayout(st, lifecycle);
        }
    }

    st.stack.reset();
    st.stack.load_identity();
    st.stack.mult_matrix(&(st.view.projection() * st.view.matrix()));

    let Ok(mut ctx) = lifecycle.context().try_borrow_mut() else {
        tracing::trace!("drawing context busy; frame skipped");
        return;
    };
    ctx.clear(Rgba8Premul::TRANSPARENT);
    let stack = &mut st.stack;
    lifecycle.with_drawable(|p| {
        p.update(dt);
        p.draw(stack, &mut **ctx);
    });
    if let Err(e) = ctx.present() {
        tracing::warn!("present failed: {e}");
    }
}

#[cfg(test)]
#[path = "../tests/unit/stage.rs"]
mod tests;
