use std::collections::HashMap;
use std::sync::Arc;

use crate::assets::decode::PreparedImage;
use crate::foundation::core::{Affine, FrameRGBA, PixelSize, Rgba8Premul};
use crate::foundation::error::{PuppetError, PuppetResult};
use crate::render::context::{DrawQuad, RenderContext, TextureHandle};

#[derive(Clone)]
struct ImagePaint {
    paint: vello_cpu::Image,
    w: u32,
    h: u32,
}

/// CPU drawing context backed by `vello_cpu`.
pub struct CpuRenderContext {
    size: PixelSize,
    ctx: vello_cpu::RenderContext,
    target: vello_cpu::Pixmap,
    textures: HashMap<TextureHandle, ImagePaint>,
    next_texture: u32,
    clear_rgba: [u8; 4],
    frame: Option<FrameRGBA>,
}

impl CpuRenderContext {
    /// Create a context for a surface of `size` pixels.
    ///
    /// Sizes must be non-zero and fit in `u16` per axis.
    pub fn new(size: PixelSize) -> PuppetResult<Self> {
        let (w, h) = surface_dims(size)?;
        Ok(Self {
            size,
            ctx: vello_cpu::RenderContext::new(w, h),
            target: vello_cpu::Pixmap::new(w, h),
            textures: HashMap::new(),
            next_texture: 1,
            clear_rgba: [0, 0, 0, 0],
            frame: None,
        })
    }

    fn clip_to_pixels(&self) -> Affine {
        let w = f64::from(self.size.width);
        let h = f64::from(self.size.height);
        // x: [-1, 1] -> [0, w]; y: [-1, 1] (up) -> [h, 0] (down).
        Affine::new([w * 0.5, 0.0, 0.0, -h * 0.5, w * 0.5, h * 0.5])
    }
}

impl std::fmt::Debug for CpuRenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuRenderContext")
            .field("size", &self.size)
            .field("textures", &self.textures.len())
            .finish()
    }
}

impl RenderContext for CpuRenderContext {
    fn surface_size(&self) -> PixelSize {
        self.size
    }

    fn resize(&mut self, size: PixelSize) -> PuppetResult<()> {
        if size == self.size {
            return Ok(());
        }
        let (w, h) = surface_dims(size)?;
        self.ctx = vello_cpu::RenderContext::new(w, h);
        self.target = vello_cpu::Pixmap::new(w, h);
        self.size = size;
        self.frame = None;
        Ok(())
    }

    fn create_texture(&mut self, image: &PreparedImage) -> PuppetResult<TextureHandle> {
        let pixmap = pixmap_from_premul_bytes(&image.rgba8_premul, image.width, image.height)?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };
        let handle = TextureHandle(self.next_texture);
        self.next_texture = self.next_texture.wrapping_add(1).max(1);
        self.textures.insert(
            handle,
            ImagePaint {
                paint,
                w: image.width,
                h: image.height,
            },
        );
        Ok(handle)
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
    }

    fn clear(&mut self, color: Rgba8Premul) {
        self.ctx.reset();
        self.clear_rgba = color.to_array();
        clear_pixmap(&mut self.target, self.clear_rgba);
    }

    fn draw_quad(&mut self, quad: &DrawQuad<'_>) {
        let Some(tex) = self.textures.get(&quad.texture) else {
            tracing::trace!(texture = quad.texture.0, "draw with unknown texture skipped");
            return;
        };
        if tex.w == 0 || tex.h == 0 || quad.rect.width() <= 0.0 || quad.rect.height() <= 0.0 {
            return;
        }
        let opacity = quad.opacity.clamp(0.0, 1.0);
        if opacity <= 0.0 {
            return;
        }
        let placement = Affine::translate((quad.rect.x0, quad.rect.y0))
            * Affine::scale_non_uniform(
                quad.rect.width() / f64::from(tex.w),
                quad.rect.height() / f64::from(tex.h),
            );
        let tr = self.clip_to_pixels() * quad.matrix.to_affine() * placement;

        self.ctx
            .set_blend_mode(vello_cpu::peniko::BlendMode::default());
        self.ctx
            .set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_transform(affine_to_cpu(tr));
        self.ctx.set_paint(tex.paint.clone());
        if opacity < 1.0 {
            self.ctx.push_opacity_layer(opacity);
        }
        self.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(tex.w),
            f64::from(tex.h),
        ));
        if opacity < 1.0 {
            self.ctx.pop_layer();
        }
    }

    fn present(&mut self) -> PuppetResult<()> {
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut self.target);
        self.frame = Some(FrameRGBA {
            width: self.size.width,
            height: self.size.height,
            data: self.target.data_as_u8_slice().to_vec(),
            premultiplied: true,
        });
        // Nothing from this frame may bleed into the next one.
        self.ctx.reset();
        clear_pixmap(&mut self.target, [0, 0, 0, 0]);
        Ok(())
    }

    fn last_frame(&self) -> Option<&FrameRGBA> {
        self.frame.as_ref()
    }

    fn live_textures(&self) -> usize {
        self.textures.len()
    }
}

fn surface_dims(size: PixelSize) -> PuppetResult<(u16, u16)> {
    if size.is_empty() {
        return Err(PuppetError::context(format!(
            "surface size must be non-zero, got {}x{}",
            size.width, size.height
        )));
    }
    let w: u16 = size
        .width
        .try_into()
        .map_err(|_| PuppetError::context("surface width exceeds u16"))?;
    let h: u16 = size
        .height
        .try_into()
        .map_err(|_| PuppetError::context("surface height exceeds u16"))?;
    Ok((w, h))
}

fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap, rgba: [u8; 4]) {
    for px in pixmap.data_as_u8_slice_mut().chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> PuppetResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| PuppetError::context("texture width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| PuppetError::context("texture height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(PuppetError::context("texture byte len mismatch"));
    }
    let mut pixels = Vec::<vello_cpu::peniko::color::PremulRgba8>::with_capacity(
        (width as usize) * (height as usize),
    );
    for px in bytes.chunks_exact(4) {
        pixels.push(vello_cpu::peniko::color::PremulRgba8::from_u8_array([
            px[0], px[1], px[2], px[3],
        ]));
    }
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, true))
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
