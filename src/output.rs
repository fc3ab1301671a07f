use std::path::{Path, PathBuf};

use crate::{
    document::Document,
    foundation::{
        core::Coordinate,
        error::WatermarkResult,
        log::{DebugLog, debug_log},
    },
    raster::{
        encode::{OutputOptions, write_pages},
        transform,
    },
};

/// Scale every page by `scale` with a Lanczos filter.
///
/// Density scales along with the pixels so the physical page size stays the same.
pub fn resize_document(doc: &mut Document, scale: f64, log: DebugLog) -> WatermarkResult<()> {
    for (idx, page) in doc.pages.iter_mut().enumerate() {
        let resized = transform::resize(page, scale)?;
        debug_log!(
            log,
            page = idx,
            from_width = page.width(),
            from_height = page.height(),
            to_width = resized.width(),
            to_height = resized.height(),
            "resized page"
        );
        *page = resized;
    }
    doc.density = Coordinate::new(doc.density.x * scale, doc.density.y * scale);
    Ok(())
}

/// Rescale the document and write it to `dest`. Returns the files written.
pub fn finalize(
    doc: &mut Document,
    out_scale: f64,
    dest: &Path,
    opts: &OutputOptions,
    log: DebugLog,
) -> WatermarkResult<Vec<PathBuf>> {
    opts.validate()?;
    resize_document(doc, out_scale, log)?;
    debug_log!(
        log,
        dest = %dest.display(),
        format = ?opts.format,
        quality = opts.quality,
        "writing document"
    );
    write_pages(&doc.pages, doc.density, dest, opts)
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::{WatermarkError, raster::pdf};

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "pdfmark_{name}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    fn doc() -> Document {
        Document::new(
            vec![
                RgbaImage::from_pixel(40, 20, Rgba([10, 20, 30, 255])),
                RgbaImage::from_pixel(30, 30, Rgba([10, 20, 30, 255])),
            ],
            true,
        )
    }

    #[test]
    fn resize_scales_each_page_and_density() {
        let mut d = doc();
        resize_document(&mut d, 0.5, DebugLog::default()).unwrap();
        assert_eq!(d.pages[0].dimensions(), (20, 10));
        assert_eq!(d.pages[1].dimensions(), (15, 15));
        assert_eq!(d.density, Coordinate::new(36.0, 36.0));
    }

    #[test]
    fn unit_scale_is_a_noop() {
        let mut d = doc();
        let before = d.pages.clone();
        resize_document(&mut d, 1.0, DebugLog::default()).unwrap();
        assert_eq!(d.pages, before);
    }

    #[test]
    fn zero_scale_is_a_transform_error() {
        let mut d = doc();
        assert!(matches!(
            resize_document(&mut d, 0.0, DebugLog::default()),
            Err(WatermarkError::Transform(_))
        ));
    }

    #[test]
    fn finalize_writes_every_page_to_pdf() {
        let dir = temp_dir("output_finalize");
        std::fs::create_dir_all(&dir).unwrap();
        let dest = dir.join("out.pdf");

        let mut d = doc();
        let written = finalize(
            &mut d,
            2.0,
            &dest,
            &OutputOptions::default(),
            DebugLog::default(),
        )
        .unwrap();
        assert_eq!(written, vec![dest.clone()]);

        let bytes = std::fs::read(&dest).unwrap();
        let pages = pdf::read_pages(&bytes).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].raster.dimensions(), (80, 40));
        // Page size in points is unchanged by the output scale.
        assert!((pages[0].media_size_pt.x - 40.0).abs() < 0.01);

        std::fs::remove_dir_all(&dir).ok();
    }
}
