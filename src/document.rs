use image::RgbaImage;

use crate::foundation::core::Coordinate;

/// Screen density assumed when a container carries none.
pub const DEFAULT_DENSITY: f64 = 72.0;

/// A decoded, possibly multi-page, source document.
///
/// Pages are straight-alpha RGBA buffers. Sources are flattened on decode, so pages are opaque
/// unless built by hand.
#[derive(Clone, Debug)]
pub struct Document {
    pub pages: Vec<RgbaImage>,
    /// `true` when the container holds more than one page or frame.
    pub paginated: bool,
    /// Pixels per inch along each axis.
    pub density: Coordinate,
}

impl Document {
    pub fn new(pages: Vec<RgbaImage>, paginated: bool) -> Self {
        Self {
            pages,
            paginated,
            density: Coordinate::new(DEFAULT_DENSITY, DEFAULT_DENSITY),
        }
    }

    pub fn with_density(mut self, density: Coordinate) -> Self {
        self.density = density;
        self
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn first_page(&self) -> Option<&RgbaImage> {
        self.pages.first()
    }
}
