use image::{RgbaImage, imageops::FilterType};
use kurbo::{Affine, Rect};
use resvg::tiny_skia;

use crate::{
    foundation::error::{WatermarkError, WatermarkResult},
    raster::composite::{demultiply_rgba8_in_place, premultiply_rgba8_in_place},
};

/// Largest edge we are willing to allocate for a transformed canvas.
const MAX_DIM: u32 = 32_768;

/// Dimensions after scaling by `scale`, truncated toward zero.
pub fn scaled_dimensions(width: u32, height: u32, scale: f64) -> WatermarkResult<(u32, u32)> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(WatermarkError::transform(format!(
            "scale must be finite and > 0, got {scale}"
        )));
    }
    let w = (f64::from(width) * scale).trunc();
    let h = (f64::from(height) * scale).trunc();
    if w < 1.0 || h < 1.0 {
        return Err(WatermarkError::transform(format!(
            "scaling {width}x{height} by {scale} yields an empty image"
        )));
    }
    if w > f64::from(MAX_DIM) || h > f64::from(MAX_DIM) {
        return Err(WatermarkError::transform(format!(
            "scaled size too large: {w}x{h} (max {MAX_DIM}x{MAX_DIM})"
        )));
    }
    Ok((w as u32, h as u32))
}

/// Uniformly resize with a Lanczos filter. A scale of exactly 1.0 returns the image untouched.
pub fn resize(img: &RgbaImage, scale: f64) -> WatermarkResult<RgbaImage> {
    let (w, h) = scaled_dimensions(img.width(), img.height(), scale)?;
    if (w, h) == img.dimensions() {
        return Ok(img.clone());
    }
    Ok(image::imageops::resize(img, w, h, FilterType::Lanczos3))
}

/// Size of the axis-aligned box enclosing a `width x height` canvas rotated by `degrees`.
pub fn rotated_dimensions(width: u32, height: u32, degrees: f64) -> (u32, u32) {
    let rect = Rect::new(0.0, 0.0, f64::from(width), f64::from(height));
    let bbox = Affine::rotate(degrees.to_radians()).transform_rect_bbox(rect);
    // Rounding absorbs the float noise of right-angle rotations.
    let w = (bbox.width() - 1e-6).ceil().max(1.0) as u32;
    let h = (bbox.height() - 1e-6).ceil().max(1.0) as u32;
    (w, h)
}

/// Rotate clockwise around the center. The canvas grows to the rotated bounding box and every
/// pixel not covered by the source is fully transparent.
pub fn rotate(img: &RgbaImage, degrees: f64) -> WatermarkResult<RgbaImage> {
    if !degrees.is_finite() {
        return Err(WatermarkError::transform(format!(
            "rotation must be finite, got {degrees}"
        )));
    }
    let (sw, sh) = img.dimensions();
    if sw == 0 || sh == 0 {
        return Err(WatermarkError::transform("cannot rotate an empty image"));
    }

    let (dw, dh) = rotated_dimensions(sw, sh, degrees);
    if dw > MAX_DIM || dh > MAX_DIM {
        return Err(WatermarkError::transform(format!(
            "rotated size too large: {dw}x{dh} (max {MAX_DIM}x{MAX_DIM})"
        )));
    }

    let mut premul = img.as_raw().clone();
    premultiply_rgba8_in_place(&mut premul);
    let src_size = tiny_skia::IntSize::from_wh(sw, sh)
        .ok_or_else(|| WatermarkError::transform("invalid source size"))?;
    let src = tiny_skia::Pixmap::from_vec(premul, src_size)
        .ok_or_else(|| WatermarkError::transform("failed to wrap source pixels"))?;

    let mut dst = tiny_skia::Pixmap::new(dw, dh)
        .ok_or_else(|| WatermarkError::transform("failed to allocate rotation pixmap"))?;

    let xform = Affine::translate((f64::from(dw) / 2.0, f64::from(dh) / 2.0))
        * Affine::rotate(degrees.to_radians())
        * Affine::translate((-f64::from(sw) / 2.0, -f64::from(sh) / 2.0));
    let [a, b, c, d, e, f] = xform.as_coeffs();
    let ts = tiny_skia::Transform::from_row(
        a as f32, b as f32, c as f32, d as f32, e as f32, f as f32,
    );

    let paint = tiny_skia::PixmapPaint {
        quality: tiny_skia::FilterQuality::Bicubic,
        ..Default::default()
    };
    dst.draw_pixmap(0, 0, src.as_ref(), &paint, ts, None);

    let mut out = dst.take();
    demultiply_rgba8_in_place(&mut out);
    RgbaImage::from_raw(dw, dh, out)
        .ok_or_else(|| WatermarkError::transform("rotated buffer has unexpected length"))
}
