use std::sync::Arc;

use anyhow::Context;

use crate::foundation::error::{PuppetError, PuppetResult};

/// Decoded texture image in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    /// Wrap already premultiplied RGBA8 bytes, checking the length.
    pub fn from_premul_rgba8(width: u32, height: u32, bytes: Vec<u8>) -> PuppetResult<Self> {
        let expected = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4);
        if width == 0 || height == 0 || bytes.len() != expected {
            return Err(PuppetError::validation(format!(
                "image {width}x{height} expects {expected} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(bytes),
        })
    }

    /// A single-color image, mostly useful for placeholders and tests.
    pub fn solid(width: u32, height: u32, rgba_premul: [u8; 4]) -> PuppetResult<Self> {
        let px = (width as usize).saturating_mul(height as usize);
        let mut bytes = Vec::with_capacity(px.saturating_mul(4));
        for _ in 0..px {
            bytes.extend_from_slice(&rgba_premul);
        }
        Self::from_premul_rgba8(width, height, bytes)
    }
}

/// Decode PNG/JPEG/etc. bytes into premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> PuppetResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

/// Encode premultiplied RGBA8 as PNG (un-premultiplying on the way out).
pub fn encode_png_premul(width: u32, height: u32, premul: &[u8]) -> PuppetResult<Vec<u8>> {
    let mut straight = premul.to_vec();
    unpremultiply_rgba8_in_place(&mut straight);
    let img = image::RgbaImage::from_raw(width, height, straight)
        .ok_or_else(|| PuppetError::validation("frame byte length does not match dimensions"))?;
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .context("encode png")?;
    Ok(out)
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 || a == 255 {
            continue;
        }
        px[0] = ((px[0] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[1] = ((px[1] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[2] = ((px[2] as u16 * 255 + a / 2) / a).min(255) as u8;
    }
}
