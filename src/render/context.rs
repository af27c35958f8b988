use std::cell::RefCell;
use std::rc::Rc;

use crate::assets::decode::PreparedImage;
use crate::foundation::core::{FrameRGBA, PixelSize, Rect, Rgba8Premul};
use crate::foundation::error::{PuppetError, PuppetResult};
use crate::transform::matrix::Matrix44;

/// Opaque handle to a texture owned by a [`RenderContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// One textured quad to draw.
///
/// `rect` is the quad in puppet-native pixels; `matrix` maps those pixels to clip space
/// (`[-1, 1]` on both axes, y up).
#[derive(Clone, Copy, Debug)]
pub struct DrawQuad<'a> {
    /// Texture sampled over the whole quad.
    pub texture: TextureHandle,
    /// Quad placement in puppet-native pixels.
    pub rect: Rect,
    /// Native pixels to clip space.
    pub matrix: &'a Matrix44,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
}

/// Drawing context the stage renders through.
///
/// Clearing is always to the given color with premultiplied source-over blending for quads.
/// Draw calls do not return errors: they run in the per-frame path and a failed quad is skipped.
pub trait RenderContext {
    /// Current surface size in pixels.
    fn surface_size(&self) -> PixelSize;

    /// Resize the drawing surface.
    fn resize(&mut self, size: PixelSize) -> PuppetResult<()>;

    /// Upload an image and return its handle.
    fn create_texture(&mut self, image: &PreparedImage) -> PuppetResult<TextureHandle>;

    /// Release a texture. Unknown handles are ignored.
    fn release_texture(&mut self, texture: TextureHandle);

    /// Start a frame by clearing the surface to `color`.
    fn clear(&mut self, color: Rgba8Premul);

    /// Queue a textured quad for the current frame.
    fn draw_quad(&mut self, quad: &DrawQuad<'_>);

    /// Finish the frame, publish it, and reset the working surface to transparent.
    fn present(&mut self) -> PuppetResult<()>;

    /// Most recently presented frame.
    fn last_frame(&self) -> Option<&FrameRGBA>;

    /// Number of textures currently alive.
    fn live_textures(&self) -> usize;
}

/// Drawing context shared between the render loop and the puppet lifecycle.
pub type SharedContext = Rc<RefCell<Box<dyn RenderContext>>>;

/// Wrap a context for sharing.
pub fn share_context(ctx: Box<dyn RenderContext>) -> SharedContext {
    Rc::new(RefCell::new(ctx))
}

/// Available backend kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// CPU raster backend powered by `vello_cpu`.
    Cpu,
    /// Hardware backend. Not compiled into this crate; requesting it is a context error.
    Gpu,
}

/// Create a drawing context of `kind` for a surface of `size` pixels.
pub fn create_context(kind: BackendKind, size: PixelSize) -> PuppetResult<Box<dyn RenderContext>> {
    match kind {
        BackendKind::Cpu => Ok(Box::new(crate::render::cpu::CpuRenderContext::new(size)?)),
        BackendKind::Gpu => Err(PuppetError::context(
            "gpu backend is not available in this build",
        )),
    }
}
