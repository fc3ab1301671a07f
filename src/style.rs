use image::RgbaImage;

use crate::{
    foundation::{
        core::Coordinate,
        error::{WatermarkError, WatermarkResult},
        log::{DebugLog, debug_log},
    },
    raster::transform,
};

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WatermarkStyle {
    /// Multiplier on the watermark's own alpha when compositing.
    pub opacity: f64,
    /// Clockwise rotation; 0 leaves the canvas untouched.
    pub degrees: f64,
    /// Scale to the page width and center vertically. Overrides `position`.
    pub autofit: bool,
    /// Top-left corner of the watermark on each page, truncated to whole pixels.
    pub position: Coordinate,
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            degrees: 0.0,
            autofit: false,
            position: Coordinate::default(),
        }
    }
}

impl WatermarkStyle {
    pub fn validate(&self) -> WatermarkResult<()> {
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(WatermarkError::validation(format!(
                "watermark opacity must be in 0..=1, got {}",
                self.opacity
            )));
        }
        if !self.degrees.is_finite() {
            return Err(WatermarkError::validation("rotation must be finite"));
        }
        if !self.autofit && !self.position.is_finite() {
            return Err(WatermarkError::validation("position must be finite"));
        }
        Ok(())
    }
}

/// Rotate and/or autofit the watermark canvas in place, relative to `page`.
///
/// Rotation always happens first, so autofit scales the rotated bounding box.
pub fn apply_style(
    watermark: &mut RgbaImage,
    page: &RgbaImage,
    style: &WatermarkStyle,
    log: DebugLog,
) -> WatermarkResult<()> {
    if style.degrees != 0.0 {
        debug_log!(
            log,
            width = watermark.width(),
            height = watermark.height(),
            degrees = style.degrees,
            "rotating watermark"
        );
        *watermark = transform::rotate(watermark, style.degrees)?;
        debug_log!(
            log,
            width = watermark.width(),
            height = watermark.height(),
            "watermark rotated"
        );
    }

    if style.autofit {
        let scale = autofit_scale(page.width(), watermark.width())?;
        debug_log!(log, scale, "autofitting watermark to page width");
        *watermark = transform::resize(watermark, scale)?;
        debug_log!(
            log,
            width = watermark.width(),
            height = watermark.height(),
            "watermark autofitted"
        );
    }
    Ok(())
}

pub fn autofit_scale(page_width: u32, watermark_width: u32) -> WatermarkResult<f64> {
    if watermark_width == 0 {
        return Err(WatermarkError::transform("cannot autofit an empty watermark"));
    }
    Ok(f64::from(page_width) / f64::from(watermark_width))
}

/// Top-left offset of the watermark on `page`.
///
/// Autofit pins the watermark to the left edge and centers it vertically (rounding down);
/// otherwise the configured position is truncated toward zero.
pub fn placement(page: &RgbaImage, watermark: &RgbaImage, style: &WatermarkStyle) -> (i64, i64) {
    if style.autofit {
        let dy = i64::from(page.height()) - i64::from(watermark.height());
        (0, dy.div_euclid(2))
    } else {
        (style.position.x as i64, style.position.y as i64)
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn canvas(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255]))
    }

    #[test]
    fn default_style_is_opaque_and_unrotated() {
        let style = WatermarkStyle::default();
        assert_eq!(style.opacity, 1.0);
        assert_eq!(style.degrees, 0.0);
        assert!(!style.autofit);
        assert!(style.validate().is_ok());
    }

    #[test]
    fn validation_rejects_out_of_range_opacity() {
        let style = WatermarkStyle {
            opacity: -0.1,
            ..WatermarkStyle::default()
        };
        assert!(matches!(style.validate(), Err(WatermarkError::Validation(_))));
    }

    #[test]
    fn no_flags_leaves_canvas_untouched() {
        let mut wm = RgbaImage::from_fn(7, 3, |x, _| Rgba([x as u8, 0, 0, 255]));
        let before = wm.clone();
        apply_style(&mut wm, &canvas(50, 50), &WatermarkStyle::default(), DebugLog::default())
            .unwrap();
        assert_eq!(wm, before);
    }

    #[test]
    fn autofit_matches_page_width() {
        for (page_w, wm_w) in [(100, 30), (640, 200), (33, 100), (1000, 999)] {
            let mut wm = canvas(wm_w, 10);
            let style = WatermarkStyle {
                autofit: true,
                ..WatermarkStyle::default()
            };
            apply_style(&mut wm, &canvas(page_w, 50), &style, DebugLog::default()).unwrap();
            assert!(
                wm.width().abs_diff(page_w) <= 1,
                "page {page_w}, watermark {wm_w} -> {}",
                wm.width()
            );
        }
    }

    #[test]
    fn rotation_happens_before_autofit() {
        let mut wm = canvas(40, 10);
        let style = WatermarkStyle {
            degrees: 90.0,
            autofit: true,
            ..WatermarkStyle::default()
        };
        apply_style(&mut wm, &canvas(20, 200), &style, DebugLog::default()).unwrap();
        // 40x10 rotated is 10x40; scaled by 20/10 it becomes 20x80.
        assert_eq!(wm.dimensions(), (20, 80));
    }

    #[test]
    fn autofit_centers_vertically() {
        let style = WatermarkStyle {
            autofit: true,
            position: Coordinate::new(99.0, 99.0),
            ..WatermarkStyle::default()
        };
        assert_eq!(placement(&canvas(80, 100), &canvas(80, 20), &style), (0, 40));
        assert_eq!(placement(&canvas(80, 101), &canvas(80, 20), &style), (0, 40));
        assert_eq!(placement(&canvas(80, 10), &canvas(80, 15), &style), (0, -3));
    }

    #[test]
    fn fixed_placement_truncates() {
        let style = WatermarkStyle {
            position: Coordinate::new(10.7, 20.2),
            ..WatermarkStyle::default()
        };
        assert_eq!(placement(&canvas(80, 100), &canvas(5, 5), &style), (10, 20));
    }
}
