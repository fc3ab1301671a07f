//! Text watermark rasterization through `usvg`/`resvg`.
//!
//! The text is laid out as a single SVG `<text>` element, which gives font matching, shaping and
//! anti-aliased rasterization from the same stack that renders SVG assets.

use std::{path::Path, sync::Arc};

use image::RgbaImage;
use resvg::tiny_skia;
use usvg::fontdb;

use crate::{
    foundation::{
        core::Coordinate,
        error::{WatermarkError, WatermarkResult},
        log::{DebugLog, debug_log},
    },
    raster::composite::demultiply_rgba8_in_place,
};

/// Weight used when a style leaves it at zero.
pub const DEFAULT_WEIGHT: u16 = 400;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextStyle {
    /// Canvas size in pixels; fractional parts are truncated.
    pub size: Coordinate,
    /// Family name, generic family, or path to a `.ttf`/`.otf`/`.ttc` file.
    pub font: String,
    pub point_size: f64,
    #[serde(default)]
    pub weight: u16,
    pub color: String,
    #[serde(default = "default_text_opacity")]
    pub opacity: f64,
}

fn default_text_opacity() -> f64 {
    1.0
}

impl TextStyle {
    pub fn validate(&self) -> WatermarkResult<()> {
        if !self.size.is_finite() || self.size.x < 1.0 || self.size.y < 1.0 {
            return Err(WatermarkError::validation(format!(
                "text canvas size must be at least 1x1, got {}x{}",
                self.size.x, self.size.y
            )));
        }
        if !self.point_size.is_finite() || self.point_size <= 0.0 {
            return Err(WatermarkError::validation(format!(
                "point size must be > 0, got {}",
                self.point_size
            )));
        }
        if self.weight > 1000 {
            return Err(WatermarkError::validation(format!(
                "font weight must be in 0..=1000, got {}",
                self.weight
            )));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(WatermarkError::validation(format!(
                "text opacity must be in 0..=1, got {}",
                self.opacity
            )));
        }
        if self.font.trim().is_empty() {
            return Err(WatermarkError::font("font must not be empty"));
        }
        Ok(())
    }

    pub fn effective_weight(&self) -> u16 {
        if self.weight == 0 {
            DEFAULT_WEIGHT
        } else {
            self.weight
        }
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.size.x as u32, self.size.y as u32)
    }
}

/// A font database with `family` guaranteed to resolve.
pub struct ResolvedFont {
    db: fontdb::Database,
    family: String,
}

impl ResolvedFont {
    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn face_count(&self) -> usize {
        self.db.faces().count()
    }
}

/// Build a font database and make sure `font` matches a face at `weight`.
pub fn resolve_font(font: &str, weight: u16) -> WatermarkResult<ResolvedFont> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    map_missing_generic_families(&mut db);

    let family = if is_font_file(font) {
        let bytes = std::fs::read(font)
            .map_err(|e| WatermarkError::font(format!("read font file '{font}': {e}")))?;
        let ids = db.load_font_source(fontdb::Source::Binary(Arc::new(bytes)));
        ids.first()
            .and_then(|id| db.face(*id))
            .and_then(|face| face.families.first())
            .map(|(name, _)| name.clone())
            .ok_or_else(|| WatermarkError::font(format!("'{font}' contains no usable font face")))?
    } else {
        font.trim().to_string()
    };

    let families = [family_query(&family)];
    let query = fontdb::Query {
        families: &families,
        weight: fontdb::Weight(weight),
        ..Default::default()
    };
    if db.query(&query).is_none() {
        return Err(WatermarkError::font(format!(
            "font '{family}' is not available ({} faces loaded)",
            db.faces().count()
        )));
    }

    Ok(ResolvedFont { db, family })
}

/// Rasterize `text` onto a transparent canvas of `style.size` pixels.
///
/// The text is horizontally centered and its bottom edge sits on the canvas's bottom edge.
pub fn render_text(text: &str, style: &TextStyle, log: DebugLog) -> WatermarkResult<RgbaImage> {
    style.validate()?;
    let weight = style.effective_weight();
    let font = resolve_font(&style.font, weight)?;
    debug_log!(
        log,
        family = font.family(),
        faces = font.face_count(),
        point_size = style.point_size,
        weight,
        "resolved watermark font"
    );

    let (width, height) = style.canvas_size();
    let svg = text_svg(text, style, font.family(), weight)?;

    let opts = usvg::Options {
        fontdb: Arc::new(font.db),
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(&svg, &opts)
        .map_err(|e| WatermarkError::render(format!("lay out text: {e}")))?;

    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| WatermarkError::render("failed to allocate text pixmap"))?;
    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    let mut data = pixmap.take();
    demultiply_rgba8_in_place(&mut data);
    let canvas = RgbaImage::from_raw(width, height, data)
        .ok_or_else(|| WatermarkError::render("text buffer has unexpected length"))?;

    debug_log!(log, width, height, "drew text watermark");
    Ok(canvas)
}

fn text_svg(text: &str, style: &TextStyle, family: &str, weight: u16) -> WatermarkResult<String> {
    if !is_plain_color(&style.color) {
        return Err(WatermarkError::render(format!(
            "unsupported color '{}'",
            style.color
        )));
    }
    let (width, height) = style.canvas_size();
    Ok(format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            r#"<text x="{cx}" y="{h}" text-anchor="middle" dominant-baseline="text-after-edge" "#,
            r#"font-family="{family}" font-size="{size}" font-weight="{weight}" "#,
            r#"fill="{color}" fill-opacity="{opacity}" xml:space="preserve">{text}</text></svg>"#,
        ),
        w = width,
        h = height,
        cx = f64::from(width) / 2.0,
        family = escape_xml(&quote_family(family)),
        size = style.point_size,
        weight = weight,
        color = style.color.trim(),
        opacity = style.opacity,
        text = escape_xml(text),
    ))
}

/// fontdb maps generic families to Windows/macOS defaults; point the missing ones at a face that
/// is actually installed.
fn map_missing_generic_families(db: &mut fontdb::Database) {
    let Some(fallback) = db
        .faces()
        .find_map(|f| f.families.first().map(|(name, _)| name.clone()))
    else {
        return;
    };
    let missing = |db: &fontdb::Database, family: fontdb::Family<'_>| {
        db.query(&fontdb::Query {
            families: &[family],
            ..Default::default()
        })
        .is_none()
    };
    if missing(db, fontdb::Family::Serif) {
        db.set_serif_family(fallback.clone());
    }
    if missing(db, fontdb::Family::SansSerif) {
        db.set_sans_serif_family(fallback.clone());
    }
    if missing(db, fontdb::Family::Monospace) {
        db.set_monospace_family(fallback.clone());
    }
    if missing(db, fontdb::Family::Cursive) {
        db.set_cursive_family(fallback.clone());
    }
    if missing(db, fontdb::Family::Fantasy) {
        db.set_fantasy_family(fallback);
    }
}

fn family_query(family: &str) -> fontdb::Family<'_> {
    match family.to_ascii_lowercase().as_str() {
        "serif" => fontdb::Family::Serif,
        "sans-serif" | "sans" => fontdb::Family::SansSerif,
        "monospace" => fontdb::Family::Monospace,
        "cursive" => fontdb::Family::Cursive,
        "fantasy" => fontdb::Family::Fantasy,
        _ => fontdb::Family::Name(family),
    }
}

fn quote_family(family: &str) -> String {
    match family_query(family) {
        fontdb::Family::Name(name) => format!("'{}'", name.replace('\'', "")),
        fontdb::Family::Serif => "serif".to_string(),
        fontdb::Family::SansSerif => "sans-serif".to_string(),
        fontdb::Family::Monospace => "monospace".to_string(),
        fontdb::Family::Cursive => "cursive".to_string(),
        fontdb::Family::Fantasy => "fantasy".to_string(),
    }
}

fn is_font_file(font: &str) -> bool {
    let path = Path::new(font);
    let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
        return false;
    };
    matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc") && path.is_file()
}

fn is_plain_color(color: &str) -> bool {
    let color = color.trim();
    !color.is_empty()
        && color
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "#(),.% ".contains(c))
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
