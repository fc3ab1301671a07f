//! Raster-only PDF containers.
//!
//! Reading walks every page, picks the largest image XObject as the page raster and decodes it;
//! vector content is not rasterized. Writing emits one image XObject per page, scaled to fill
//! the page's MediaBox.

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage, codecs::jpeg::JpegEncoder};
use lopdf::{Dictionary, Document as PdfDocument, Object, ObjectId, Stream, dictionary};

use crate::{
    document::DEFAULT_DENSITY,
    foundation::{
        core::Coordinate,
        error::{WatermarkError, WatermarkResult},
    },
    raster::{composite::flatten_alpha, encode::Compression},
};

/// One page pulled out of a PDF: its raster and its MediaBox size in points.
#[derive(Debug)]
pub struct PdfPage {
    pub raster: RgbaImage,
    pub media_size_pt: Coordinate,
}

pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

pub fn read_pages(bytes: &[u8]) -> WatermarkResult<Vec<PdfPage>> {
    let doc = PdfDocument::load_mem(bytes)
        .map_err(|e| WatermarkError::decode(format!("parse pdf: {e}")))?;

    let mut pages = Vec::new();
    for (page_no, page_id) in doc.get_pages() {
        let media_size_pt = media_box_size(&doc, page_id).unwrap_or(Coordinate::new(612.0, 792.0));
        let stream = largest_page_image(&doc, page_id).ok_or_else(|| {
            WatermarkError::decode(format!(
                "page {page_no} has no raster image (vector pdf pages are not rasterized)"
            ))
        })?;
        let raster = decode_image_stream(stream)
            .map_err(|e| WatermarkError::decode(format!("page {page_no}: {e}")))?;
        pages.push(PdfPage {
            raster,
            media_size_pt,
        });
    }
    Ok(pages)
}

pub fn write_pages(
    pages: &[RgbaImage],
    density: Coordinate,
    compression: Compression,
    quality: u8,
) -> WatermarkResult<Vec<u8>> {
    let mut doc = PdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(pages.len());
    for (idx, page) in pages.iter().enumerate() {
        let (w, h) = page.dimensions();
        let image_stream = encode_image_stream(page, compression, quality)
            .map_err(|e| WatermarkError::encode(format!("page {idx}: {e}")))?;
        let image_id = doc.add_object(image_stream);

        let w_pt = f64::from(w) * 72.0 / density.x;
        let h_pt = f64::from(h) * 72.0 / density.y;
        let content = format!("q\n{w_pt:.4} 0 0 {h_pt:.4} 0 0 cm\n/Im0 Do\nQ\n");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(w_pt as _),
                Object::Real(h_pt as _),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| WatermarkError::encode(format!("serialize pdf: {e}")))?;
    Ok(buf)
}

/// Density implied by a raster filling a MediaBox of the given size.
pub fn implied_density(raster: &RgbaImage, media_size_pt: Coordinate) -> Coordinate {
    let axis = |px: u32, pt: f64| {
        if pt > 0.0 {
            f64::from(px) * 72.0 / pt
        } else {
            DEFAULT_DENSITY
        }
    };
    Coordinate::new(
        axis(raster.width(), media_size_pt.x),
        axis(raster.height(), media_size_pt.y),
    )
}

fn encode_image_stream(
    page: &RgbaImage,
    compression: Compression,
    quality: u8,
) -> Result<Stream, String> {
    let (w, h) = page.dimensions();
    let mut opaque = page.clone();
    flatten_alpha(&mut opaque, [255, 255, 255]);
    let rgb = DynamicImage::ImageRgba8(opaque).to_rgb8();

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(w),
        "Height" => i64::from(h),
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8i64,
    };

    match compression {
        Compression::Jpeg => {
            let mut jpeg = Vec::new();
            let encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
            DynamicImage::ImageRgb8(rgb)
                .write_with_encoder(encoder)
                .map_err(|e| format!("jpeg encode: {e}"))?;
            dict.set("Filter", "DCTDecode");
            Ok(Stream::new(dict, jpeg))
        }
        Compression::Lossless => {
            let mut stream = Stream::new(dict, rgb.into_raw());
            stream
                .compress()
                .map_err(|e| format!("flate encode: {e}"))?;
            Ok(stream)
        }
    }
}

fn decode_image_stream(stream: &Stream) -> Result<RgbaImage, String> {
    let width = dict_u32(&stream.dict, b"Width").ok_or("image has no /Width")?;
    let height = dict_u32(&stream.dict, b"Height").ok_or("image has no /Height")?;

    match first_filter(&stream.dict).as_deref() {
        Some("DCTDecode") => {
            let img = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                .map_err(|e| format!("decode jpeg image: {e}"))?;
            Ok(img.to_rgba8())
        }
        None | Some("FlateDecode") => {
            let data = if stream.dict.get(b"Filter").is_ok() {
                stream
                    .decompressed_content()
                    .map_err(|e| format!("inflate image: {e}"))?
            } else {
                stream.content.clone()
            };
            let bpc = dict_u32(&stream.dict, b"BitsPerComponent").unwrap_or(8);
            if bpc != 8 {
                return Err(format!("unsupported bits per component: {bpc}"));
            }
            raw_to_rgba(&data, width, height, &color_space(&stream.dict))
        }
        Some(other) => Err(format!("unsupported image filter: {other}")),
    }
}

fn raw_to_rgba(data: &[u8], width: u32, height: u32, color_space: &str) -> Result<RgbaImage, String> {
    let pixels = (width as usize) * (height as usize);
    match color_space {
        "DeviceRGB" => {
            let len = pixels * 3;
            if data.len() < len {
                return Err(format!("rgb image too short: {} < {len}", data.len()));
            }
            let rgb = RgbImage::from_raw(width, height, data[..len].to_vec())
                .ok_or("rgb image buffer mismatch")?;
            Ok(DynamicImage::ImageRgb8(rgb).to_rgba8())
        }
        "DeviceGray" => {
            if data.len() < pixels {
                return Err(format!("gray image too short: {} < {pixels}", data.len()));
            }
            let gray = GrayImage::from_raw(width, height, data[..pixels].to_vec())
                .ok_or("gray image buffer mismatch")?;
            Ok(DynamicImage::ImageLuma8(gray).to_rgba8())
        }
        other => Err(format!("unsupported color space: {other}")),
    }
}

fn largest_page_image(doc: &PdfDocument, page_id: ObjectId) -> Option<&Stream> {
    let resources = inherited(doc, page_id, b"Resources").and_then(|o| resolve_dict(doc, o))?;
    let xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve_dict(doc, o))?;

    let mut best: Option<(u64, &Stream)> = None;
    for (_, obj) in xobjects.iter() {
        let Ok((_, Object::Stream(stream))) = doc.dereference(obj) else {
            continue;
        };
        if !matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image") {
            continue;
        }
        let w = dict_u32(&stream.dict, b"Width").unwrap_or(0);
        let h = dict_u32(&stream.dict, b"Height").unwrap_or(0);
        let area = u64::from(w) * u64::from(h);
        if best.is_none_or(|(a, _)| area > a) {
            best = Some((area, stream));
        }
    }
    best.map(|(_, s)| s)
}

fn media_box_size(doc: &PdfDocument, page_id: ObjectId) -> Option<Coordinate> {
    let obj = inherited(doc, page_id, b"MediaBox")?;
    let (_, Object::Array(arr)) = doc.dereference(obj).ok()? else {
        return None;
    };
    if arr.len() != 4 {
        return None;
    }
    let n: Vec<f64> = arr.iter().filter_map(|o| number(doc, o)).collect();
    if n.len() != 4 {
        return None;
    }
    Some(Coordinate::new((n[2] - n[0]).abs(), (n[3] - n[1]).abs()))
}

/// Look up a page attribute, following `/Parent` for inheritable keys.
fn inherited<'a>(doc: &'a PdfDocument, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    // Page trees are shallow; the bound guards against cyclic /Parent links.
    for _ in 0..64 {
        if let Ok(v) = node.get(key) {
            return Some(v);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve_dict<'a>(doc: &'a PdfDocument, obj: &'a Object) -> Option<&'a Dictionary> {
    match doc.dereference(obj).ok()?.1 {
        Object::Dictionary(d) => Some(d),
        _ => None,
    }
}

fn number(doc: &PdfDocument, obj: &Object) -> Option<f64> {
    match doc.dereference(obj).ok()?.1 {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    match dict.get(key).ok()? {
        Object::Integer(i) => u32::try_from(*i).ok(),
        _ => None,
    }
}

fn first_filter(dict: &Dictionary) -> Option<String> {
    match dict.get(b"Filter").ok()? {
        Object::Name(n) => Some(String::from_utf8_lossy(n).to_string()),
        Object::Array(arr) => arr.first().and_then(|f| match f {
            Object::Name(n) => Some(String::from_utf8_lossy(n).to_string()),
            _ => None,
        }),
        _ => None,
    }
}

fn color_space(dict: &Dictionary) -> String {
    match dict.get(b"ColorSpace") {
        Ok(Object::Name(n)) => String::from_utf8_lossy(n).to_string(),
        _ => "DeviceRGB".to_string(),
    }
}

/// Cheap page count used by tests and diagnostics.
pub fn page_count(bytes: &[u8]) -> WatermarkResult<usize> {
    let doc = PdfDocument::load_mem(bytes)
        .map_err(|e| WatermarkError::decode(format!("parse pdf: {e}")))?;
    Ok(doc.get_pages().len())
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn page(w: u32, h: u32, rgb: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([rgb[0], rgb[1], rgb[2], 255]))
    }

    #[test]
    fn written_pdf_reads_back_page_sizes() {
        let pages = vec![page(40, 30, [255, 0, 0]), page(20, 50, [0, 0, 255])];
        let bytes = write_pages(
            &pages,
            Coordinate::new(72.0, 72.0),
            Compression::Jpeg,
            90,
        )
        .unwrap();
        assert!(is_pdf(&bytes));
        assert_eq!(page_count(&bytes).unwrap(), 2);

        let read = read_pages(&bytes).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].raster.dimensions(), (40, 30));
        assert_eq!(read[1].raster.dimensions(), (20, 50));
        assert!((read[0].media_size_pt.x - 40.0).abs() < 0.01);
        assert!((read[1].media_size_pt.y - 50.0).abs() < 0.01);
    }

    #[test]
    fn lossless_pages_keep_exact_pixels() {
        let src = RgbaImage::from_fn(8, 4, |x, y| Rgba([x as u8 * 30, y as u8 * 60, 9, 255]));
        let bytes = write_pages(
            std::slice::from_ref(&src),
            Coordinate::new(144.0, 144.0),
            Compression::Lossless,
            90,
        )
        .unwrap();
        let read = read_pages(&bytes).unwrap();
        assert_eq!(read[0].raster, src);
        assert!((read[0].media_size_pt.x - 4.0).abs() < 0.01);
        assert_eq!(
            implied_density(&read[0].raster, read[0].media_size_pt),
            Coordinate::new(144.0, 144.0)
        );
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            read_pages(b"%PDF-1.5 not really"),
            Err(WatermarkError::Decode(_))
        ));
    }
}
