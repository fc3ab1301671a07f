use std::path::Path;

use image::RgbaImage;

use crate::{
    compositor::composite_all,
    foundation::{
        core::ImageIoSize,
        error::{WatermarkError, WatermarkResult},
        log::{DebugLog, debug_log},
    },
    output::finalize,
    raster::{decode::decode_file, encode::OutputOptions},
    style::{WatermarkStyle, apply_style},
};

/// What to do with a source that has a single page (a flat image or a one-page PDF).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatInputPolicy {
    /// Fail with [`WatermarkError::NoPages`] and write nothing.
    #[default]
    Reject,
    /// Watermark the image as a one-page document.
    SinglePage,
}

/// Per-call settings for [`add_watermark`].
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WatermarkOptions {
    /// Emit progress events through `tracing`.
    pub debug: bool,
    pub output: OutputOptions,
    pub flat_input: FlatInputPolicy,
}

impl WatermarkOptions {
    pub fn log(&self) -> DebugLog {
        DebugLog::new(self.debug)
    }
}

/// Watermark every page of `src` and write the result to `dst`.
///
/// Steps run in order (decode, style, composite, resize, encode) and the first failure aborts
/// the call. `dst` is only created once every step succeeded.
pub fn add_watermark(
    src: &Path,
    dst: &Path,
    io: &ImageIoSize,
    mut watermark: RgbaImage,
    style: &WatermarkStyle,
    opts: &WatermarkOptions,
) -> WatermarkResult<()> {
    let log = opts.log();
    io.validate()?;
    style.validate()?;
    opts.output.validate()?;

    debug_log!(log, src = %src.display(), dst = %dst.display(), "adding watermark");
    let mut doc = decode_file(src, io.in_resolution, log)?;
    if let Some(first) = doc.first_page() {
        debug_log!(log, width = first.width(), height = first.height(), "read size");
    }

    if !doc.paginated && opts.flat_input == FlatInputPolicy::Reject {
        return Err(WatermarkError::no_pages(format!(
            "'{}' has no pages beyond the first",
            src.display()
        )));
    }

    let Some(first) = doc.first_page() else {
        return Err(WatermarkError::no_pages(format!(
            "'{}' has no pages",
            src.display()
        )));
    };
    apply_style(&mut watermark, first, style, log)?;
    composite_all(&mut doc, &watermark, style, log)?;

    let written = finalize(&mut doc, io.out_scale, dst, &opts.output, log)?;
    debug_log!(log, files = written.len(), "watermark written");
    Ok(())
}
