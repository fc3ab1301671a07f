use image::RgbaImage;

use crate::{
    document::Document,
    foundation::{
        error::{WatermarkError, WatermarkResult},
        log::{DebugLog, debug_log},
    },
    raster::composite::composite_over,
    style::{WatermarkStyle, placement},
};

/// Composite `watermark` onto every page, in page order.
///
/// The first failing page aborts the whole operation; later pages are left untouched.
pub fn composite_all(
    doc: &mut Document,
    watermark: &RgbaImage,
    style: &WatermarkStyle,
    log: DebugLog,
) -> WatermarkResult<()> {
    if doc.pages.is_empty() {
        return Err(WatermarkError::no_pages("document has no pages"));
    }

    let opacity = style.opacity as f32;
    for (idx, page) in doc.pages.iter_mut().enumerate() {
        let (x, y) = placement(page, watermark, style);
        composite_over(page, watermark, x, y, opacity).map_err(|e| match e {
            WatermarkError::Composite(msg) => WatermarkError::composite(format!("page {idx}: {msg}")),
            other => other,
        })?;
        debug_log!(log, page = idx, x, y, "composited watermark");
    }
    Ok(())
}
