use std::{
    io::Write as _,
    path::{Path, PathBuf},
};

use image::{
    DynamicImage, RgbaImage,
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
};

use crate::{
    foundation::{
        core::Coordinate,
        error::{WatermarkError, WatermarkResult},
    },
    raster::{composite::flatten_alpha, pdf},
};

pub const DEFAULT_QUALITY: u8 = 90;

/// Container written to the destination, independent of its file extension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pdf,
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// Compression applied to page rasters inside a PDF.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Jpeg,
    Lossless,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    pub format: OutputFormat,
    /// Only meaningful for PDF; PNG is always lossless and JPEG always lossy.
    pub compression: Compression,
    pub quality: u8,
    pub write_all_pages: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Pdf,
            compression: Compression::Jpeg,
            quality: DEFAULT_QUALITY,
            write_all_pages: true,
        }
    }
}

impl OutputOptions {
    pub fn validate(&self) -> WatermarkResult<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(WatermarkError::validation(format!(
                "quality must be in 1..=100, got {}",
                self.quality
            )));
        }
        Ok(())
    }
}

/// Encode `pages` and move the results into place.
///
/// Every output is first written to a temporary file next to its destination; nothing is renamed
/// until all of them encoded, so a failure never leaves a truncated destination behind. Returns
/// the paths written.
pub fn write_pages(
    pages: &[RgbaImage],
    density: Coordinate,
    dest: &Path,
    opts: &OutputOptions,
) -> WatermarkResult<Vec<PathBuf>> {
    opts.validate()?;
    let Some(first) = pages.first() else {
        return Err(WatermarkError::encode("document has no pages to write"));
    };

    let mut staged = Vec::new();
    match opts.format {
        OutputFormat::Pdf => {
            let selected = if opts.write_all_pages {
                pages
            } else {
                std::slice::from_ref(first)
            };
            let bytes = pdf::write_pages(selected, density, opts.compression, opts.quality)?;
            staged.push((dest.to_path_buf(), stage(dest, &bytes)?));
        }
        OutputFormat::Jpeg | OutputFormat::Png => {
            if opts.write_all_pages && pages.len() > 1 {
                for (idx, page) in pages.iter().enumerate() {
                    let path = numbered_path(dest, idx);
                    let bytes = encode_raster(page, opts)?;
                    staged.push((path.clone(), stage(&path, &bytes)?));
                }
            } else {
                let bytes = encode_raster(first, opts)?;
                staged.push((dest.to_path_buf(), stage(dest, &bytes)?));
            }
        }
    }

    persist_all(staged)
}

/// Rename every staged file into place. If one rename fails, the outputs already moved by this
/// call are removed again so a multi-file result is never left half written.
fn persist_all(
    staged: Vec<(PathBuf, tempfile::NamedTempFile)>,
) -> WatermarkResult<Vec<PathBuf>> {
    let mut written: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for (path, tmp) in staged {
        if let Err(e) = tmp.persist(&path) {
            for done in &written {
                std::fs::remove_file(done).ok();
            }
            return Err(WatermarkError::encode(format!(
                "move output into '{}': {}",
                path.display(),
                e.error
            )));
        }
        written.push(path);
    }
    Ok(written)
}

/// `out.jpg` -> `out-0.jpg`, `out-1.jpg`, ...
pub fn numbered_path(dest: &Path, idx: usize) -> PathBuf {
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "page".to_string());
    let name = match dest.extension() {
        Some(ext) => format!("{stem}-{idx}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{idx}"),
    };
    dest.with_file_name(name)
}

fn encode_raster(page: &RgbaImage, opts: &OutputOptions) -> WatermarkResult<Vec<u8>> {
    let mut buf = Vec::new();
    match opts.format {
        OutputFormat::Jpeg => {
            let mut opaque = page.clone();
            flatten_alpha(&mut opaque, [255, 255, 255]);
            let rgb = DynamicImage::ImageRgba8(opaque).to_rgb8();
            DynamicImage::ImageRgb8(rgb)
                .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, opts.quality))
                .map_err(|e| WatermarkError::encode(format!("jpeg encode: {e}")))?;
        }
        OutputFormat::Png => {
            page.write_with_encoder(PngEncoder::new(&mut buf))
                .map_err(|e| WatermarkError::encode(format!("png encode: {e}")))?;
        }
        OutputFormat::Pdf => {
            return Err(WatermarkError::encode(
                "pdf is a container format, not a single raster",
            ));
        }
    }
    Ok(buf)
}

fn stage(dest: &Path, bytes: &[u8]) -> WatermarkResult<tempfile::NamedTempFile> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".pdfmark-")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(|e| {
            WatermarkError::encode(format!(
                "create temporary output in '{}': {e}",
                dir.display()
            ))
        })?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| WatermarkError::encode(format!("write temporary output: {e}")))?;
    Ok(tmp)
}
