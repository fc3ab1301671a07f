use image::{Rgba, RgbaImage};

use crate::foundation::error::{WatermarkError, WatermarkResult};

pub type PremulRgba8 = [u8; 4];

/// Source-over for premultiplied pixels with an extra opacity multiplier on `src`.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

pub fn premultiply(px: [u8; 4]) -> PremulRgba8 {
    let a = u16::from(px[3]);
    if a == 0 {
        return [0, 0, 0, 0];
    }
    [
        mul_div255(u16::from(px[0]), a),
        mul_div255(u16::from(px[1]), a),
        mul_div255(u16::from(px[2]), a),
        px[3],
    ]
}

pub fn demultiply(px: PremulRgba8) -> [u8; 4] {
    let a = u32::from(px[3]);
    match a {
        0 => [0, 0, 0, 0],
        255 => px,
        _ => {
            let un = |c: u8| ((u32::from(c) * 255 + a / 2) / a).min(255) as u8;
            [un(px[0]), un(px[1]), un(px[2]), px[3]]
        }
    }
}

pub fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let out = premultiply([px[0], px[1], px[2], px[3]]);
        px.copy_from_slice(&out);
    }
}

pub fn demultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let out = demultiply([px[0], px[1], px[2], px[3]]);
        px.copy_from_slice(&out);
    }
}

/// Composite `src` over `dst` with its top-left corner at `(x, y)`.
///
/// Offsets may be negative or reach past the page; the parts of `src` outside `dst` are clipped.
pub fn composite_over(
    dst: &mut RgbaImage,
    src: &RgbaImage,
    x: i64,
    y: i64,
    opacity: f32,
) -> WatermarkResult<()> {
    if !opacity.is_finite() {
        return Err(WatermarkError::composite(format!(
            "opacity must be finite, got {opacity}"
        )));
    }

    let (dw, dh) = (i64::from(dst.width()), i64::from(dst.height()));
    let (sw, sh) = (i64::from(src.width()), i64::from(src.height()));

    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = x.saturating_add(sw).min(dw);
    let y1 = y.saturating_add(sh).min(dh);
    if x0 >= x1 || y0 >= y1 {
        return Ok(());
    }

    for dy in y0..y1 {
        for dx in x0..x1 {
            let s = src.get_pixel((dx - x) as u32, (dy - y) as u32).0;
            if s[3] == 0 {
                continue;
            }
            let d = dst.get_pixel_mut(dx as u32, dy as u32);
            let out = over(premultiply(d.0), premultiply(s), opacity);
            *d = Rgba(demultiply(out));
        }
    }
    Ok(())
}

/// Blend every pixel over an opaque background color and drop the alpha channel's effect.
pub fn flatten_alpha(img: &mut RgbaImage, bg_rgb: [u8; 3]) {
    let bg = [
        u16::from(bg_rgb[0]),
        u16::from(bg_rgb[1]),
        u16::from(bg_rgb[2]),
    ];
    for px in img.pixels_mut() {
        let a = u16::from(px[3]);
        if a == 255 {
            continue;
        }
        let inv = 255u16 - a;
        for i in 0..3 {
            let c = u16::from(mul_div255(u16::from(px[i]), a)) + u16::from(mul_div255(bg[i], inv));
            px[i] = c.min(255) as u8;
        }
        px[3] = 255;
    }
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAPER: PremulRgba8 = [250, 248, 240, 255];

    #[test]
    fn invisible_watermark_leaves_paper_alone() {
        let ink = [0, 0, 180, 255];
        assert_eq!(over(PAPER, ink, 0.0), PAPER);
        assert_eq!(over(PAPER, [0, 0, 0, 0], 1.0), PAPER);
    }

    #[test]
    fn solid_ink_covers_paper() {
        let ink = [0, 0, 180, 255];
        assert_eq!(over(PAPER, ink, 1.0), ink);
    }

    #[test]
    fn translucent_ink_mixes_with_paper() {
        let ink = premultiply([0, 0, 0, 128]);
        let out = over(PAPER, ink, 1.0);
        assert_eq!(out[3], 255);
        assert!((120..=130).contains(&out[0]), "{out:?}");
        assert!((115..=125).contains(&out[2]), "{out:?}");
    }

    #[test]
    fn opacity_out_of_range_is_clamped() {
        let ink = [0, 0, 180, 255];
        assert_eq!(over(PAPER, ink, 3.0), over(PAPER, ink, 1.0));
        assert_eq!(over(PAPER, ink, -1.0), PAPER);
    }

    #[test]
    fn premultiply_then_demultiply_keeps_opaque_and_clears_transparent() {
        assert_eq!(demultiply(premultiply([10, 20, 30, 255])), [10, 20, 30, 255]);
        assert_eq!(premultiply([10, 20, 30, 0]), [0, 0, 0, 0]);
        assert_eq!(premultiply([255, 0, 0, 128]), [128, 0, 0, 128]);
    }

    #[test]
    fn composite_over_clips_to_destination() {
        let mut dst = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let src = RgbaImage::from_pixel(3, 3, Rgba([255, 255, 255, 255]));
        composite_over(&mut dst, &src, -1, 2, 1.0).unwrap();

        assert_eq!(dst.get_pixel(0, 2).0, [255, 255, 255, 255]);
        assert_eq!(dst.get_pixel(1, 3).0, [255, 255, 255, 255]);
        assert_eq!(dst.get_pixel(2, 2).0, [0, 0, 0, 255]);
        assert_eq!(dst.get_pixel(0, 1).0, [0, 0, 0, 255]);
    }

    #[test]
    fn composite_over_fully_outside_is_noop() {
        let mut dst = RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255]));
        let before = dst.clone();
        let src = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        composite_over(&mut dst, &src, 10, 10, 1.0).unwrap();
        composite_over(&mut dst, &src, -5, 0, 1.0).unwrap();
        assert_eq!(dst, before);
    }

    #[test]
    fn composite_over_far_away_offsets_do_not_overflow() {
        let mut dst = RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255]));
        let before = dst.clone();
        let src = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        composite_over(&mut dst, &src, i64::MAX, 0, 1.0).unwrap();
        composite_over(&mut dst, &src, 0, i64::MAX - 1, 1.0).unwrap();
        composite_over(&mut dst, &src, i64::MIN, i64::MIN, 1.0).unwrap();
        assert_eq!(dst, before);
    }

    #[test]
    fn composite_over_half_opacity_blends() {
        let mut dst = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        let src = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]));
        composite_over(&mut dst, &src, 0, 0, 0.5).unwrap();
        let px = dst.get_pixel(0, 0).0;
        assert_eq!(px[3], 255);
        assert!((127..=129).contains(&px[0]));
    }

    #[test]
    fn flatten_alpha_blends_over_white() {
        let mut img = RgbaImage::from_raw(2, 1, vec![0, 0, 0, 0, 255, 0, 0, 128]).unwrap();
        flatten_alpha(&mut img, [255, 255, 255]);
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [255, 127, 127, 255]);
    }
}
