use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::{
    foundation::{
        core::ImageIoSize,
        error::{WatermarkError, WatermarkResult},
        log::{DebugLog, debug_log},
    },
    pipeline::{WatermarkOptions, add_watermark},
    raster::decode::decode_file,
    style::WatermarkStyle,
    text::{TextStyle, render_text},
};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageWatermark {
    #[serde(default)]
    pub style: WatermarkStyle,
    pub file: PathBuf,
}

impl ImageWatermark {
    /// Decode the watermark file and flatten its alpha. Multi-page files contribute their first
    /// page.
    pub fn produce(&self, log: DebugLog) -> WatermarkResult<RgbaImage> {
        debug_log!(log, file = %self.file.display(), "reading watermark image");
        let doc = decode_file(&self.file, None, log)?;
        let mut pages = doc.pages.into_iter();
        pages.next().ok_or_else(|| {
            WatermarkError::decode(format!(
                "'{}' contains no image",
                self.file.display()
            ))
        })
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextWatermark {
    #[serde(default)]
    pub style: WatermarkStyle,
    pub text_style: TextStyle,
    pub text: String,
}

impl TextWatermark {
    pub fn produce(&self, log: DebugLog) -> WatermarkResult<RgbaImage> {
        debug_log!(log, text = %self.text, "drawing text watermark");
        render_text(&self.text, &self.text_style, log)
    }
}

/// Something that renders a watermark canvas.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WatermarkSource {
    Image(ImageWatermark),
    Text(TextWatermark),
}

impl WatermarkSource {
    /// Render a fresh canvas owned by the caller.
    pub fn produce(&self, log: DebugLog) -> WatermarkResult<RgbaImage> {
        match self {
            Self::Image(w) => w.produce(log),
            Self::Text(w) => w.produce(log),
        }
    }

    pub fn style(&self) -> &WatermarkStyle {
        match self {
            Self::Image(w) => &w.style,
            Self::Text(w) => &w.style,
        }
    }

    /// Produce the canvas and watermark `src` into `dst` with this source's style.
    pub fn apply(
        &self,
        src: &Path,
        dst: &Path,
        io: &ImageIoSize,
        opts: &WatermarkOptions,
    ) -> WatermarkResult<()> {
        let canvas = self.produce(opts.log())?;
        add_watermark(src, dst, io, canvas, self.style(), opts)
    }
}

impl From<ImageWatermark> for WatermarkSource {
    fn from(w: ImageWatermark) -> Self {
        Self::Image(w)
    }
}

impl From<TextWatermark> for WatermarkSource {
    fn from(w: TextWatermark) -> Self {
        Self::Text(w)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::Rgba;

    use super::*;
    use crate::foundation::core::Coordinate;

    #[test]
    fn image_source_flattens_alpha() {
        let dir = std::env::temp_dir().join(format!("pdfmark_source_image_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("logo.png");
        let img = RgbaImage::from_fn(4, 2, |x, _| {
            if x < 2 {
                Rgba([0, 0, 255, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        std::fs::write(&path, buf).unwrap();

        let source = WatermarkSource::from(ImageWatermark {
            style: WatermarkStyle::default(),
            file: path,
        });
        let canvas = source.produce(DebugLog::default()).unwrap();
        assert_eq!(canvas.dimensions(), (4, 2));
        assert_eq!(canvas.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(canvas.get_pixel(3, 1).0, [255, 255, 255, 255]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_image_is_a_decode_error() {
        let source = WatermarkSource::from(ImageWatermark {
            style: WatermarkStyle::default(),
            file: PathBuf::from("/nonexistent/pdfmark/logo.png"),
        });
        assert!(matches!(
            source.produce(DebugLog::default()),
            Err(WatermarkError::Decode(_))
        ));
    }

    #[test]
    fn text_source_reports_missing_font() {
        let source = WatermarkSource::from(TextWatermark {
            style: WatermarkStyle::default(),
            text_style: TextStyle {
                size: Coordinate::new(100.0, 40.0),
                font: "Pdfmark Nonexistent Family 9000".to_string(),
                point_size: 20.0,
                weight: 0,
                color: "black".to_string(),
                opacity: 0.3,
            },
            text: "draft".to_string(),
        });
        assert!(matches!(
            source.produce(DebugLog::default()),
            Err(WatermarkError::Font(_))
        ));
    }

    #[test]
    fn json_is_tagged_by_kind() {
        let json = r#"{"kind":"image","file":"logo.png","style":{"autofit":true}}"#;
        let source: WatermarkSource = serde_json::from_str(json).unwrap();
        let WatermarkSource::Image(w) = &source else {
            panic!("expected image watermark");
        };
        assert_eq!(w.file, PathBuf::from("logo.png"));
        assert!(source.style().autofit);
        assert_eq!(source.style().opacity, 1.0);
    }
}
