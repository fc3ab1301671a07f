use std::{io::Cursor, path::Path};

use image::{
    AnimationDecoder as _, ImageFormat, ImageReader, RgbaImage, codecs::gif::GifDecoder,
    imageops::FilterType,
};

use crate::{
    document::Document,
    foundation::{
        core::Coordinate,
        error::{WatermarkError, WatermarkResult},
        log::{DebugLog, debug_log},
    },
    raster::{composite::flatten_alpha, pdf},
};

/// Background used when flattening alpha; transparent regions must not turn black in JPEG output.
pub const FLATTEN_BACKGROUND: [u8; 3] = [255, 255, 255];

/// Read `path` into a document and flatten every page's alpha channel.
///
/// The container is sniffed from content, not from the extension. A document is paginated only
/// when it holds more than one page, so a one-page PDF is as flat as a PNG. PDF pages are resampled to
/// `resolution` (dots per inch) when given; for other formats the hint only sets the density.
pub fn decode_file(
    path: &Path,
    resolution: Option<Coordinate>,
    log: DebugLog,
) -> WatermarkResult<Document> {
    let bytes = std::fs::read(path)
        .map_err(|e| WatermarkError::decode(format!("read '{}': {e}", path.display())))?;
    let mut doc = decode_bytes(&bytes, resolution)
        .map_err(|e| match e {
            WatermarkError::Decode(msg) => {
                WatermarkError::decode(format!("'{}': {msg}", path.display()))
            }
            other => other,
        })?;

    for page in &mut doc.pages {
        flatten_alpha(page, FLATTEN_BACKGROUND);
    }

    debug_log!(
        log,
        path = %path.display(),
        pages = doc.page_count(),
        paginated = doc.paginated,
        "decoded document"
    );
    Ok(doc)
}

pub fn decode_bytes(bytes: &[u8], resolution: Option<Coordinate>) -> WatermarkResult<Document> {
    if pdf::is_pdf(bytes) {
        return decode_pdf(bytes, resolution);
    }

    let format = image::guess_format(bytes)
        .map_err(|e| WatermarkError::decode(format!("unrecognized image format: {e}")))?;

    let pages = if format == ImageFormat::Gif {
        decode_gif_frames(bytes)?
    } else {
        let img = ImageReader::with_format(Cursor::new(bytes), format)
            .decode()
            .map_err(|e| WatermarkError::decode(format!("decode {format:?}: {e}")))?;
        vec![img.to_rgba8()]
    };

    let paginated = pages.len() > 1;
    let mut doc = Document::new(pages, paginated);
    if let Some(res) = resolution {
        doc = doc.with_density(res);
    }
    Ok(doc)
}

fn decode_pdf(bytes: &[u8], resolution: Option<Coordinate>) -> WatermarkResult<Document> {
    let pdf_pages = pdf::read_pages(bytes)?;

    let mut density = None;
    let mut pages = Vec::with_capacity(pdf_pages.len());
    for page in pdf_pages {
        let raster = match resolution {
            Some(res) => resample_to_density(&page.raster, page.media_size_pt, res)?,
            None => page.raster,
        };
        if density.is_none() {
            density = Some(match resolution {
                Some(res) => res,
                None => pdf::implied_density(&raster, page.media_size_pt),
            });
        }
        pages.push(raster);
    }

    let paginated = pages.len() > 1;
    let mut doc = Document::new(pages, paginated);
    if let Some(d) = density {
        doc = doc.with_density(d);
    }
    Ok(doc)
}

fn resample_to_density(
    raster: &RgbaImage,
    media_size_pt: Coordinate,
    dpi: Coordinate,
) -> WatermarkResult<RgbaImage> {
    let w = (media_size_pt.x * dpi.x / 72.0).round().max(1.0) as u32;
    let h = (media_size_pt.y * dpi.y / 72.0).round().max(1.0) as u32;
    if (w, h) == raster.dimensions() {
        return Ok(raster.clone());
    }
    if w > 32_768 || h > 32_768 {
        return Err(WatermarkError::decode(format!(
            "page raster at {}x{} dpi would be {w}x{h} pixels",
            dpi.x, dpi.y
        )));
    }
    Ok(image::imageops::resize(raster, w, h, FilterType::Lanczos3))
}

fn decode_gif_frames(bytes: &[u8]) -> WatermarkResult<Vec<RgbaImage>> {
    let decoder = GifDecoder::new(Cursor::new(bytes))
        .map_err(|e| WatermarkError::decode(format!("decode gif: {e}")))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| WatermarkError::decode(format!("decode gif frames: {e}")))?;
    if frames.is_empty() {
        return Err(WatermarkError::decode("gif has no frames"));
    }
    Ok(frames.into_iter().map(|f| f.into_buffer()).collect())
}
