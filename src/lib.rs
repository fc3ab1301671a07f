//! pdfmark composites an image or text watermark onto every page of a paginated document, then
//! rescales and re-encodes it.
//!
//! - Build a [`WatermarkSource`] (image file or rendered text) and a [`WatermarkStyle`]
//! - Call [`WatermarkSource::apply`], or [`add_watermark`] with a canvas you produced yourself
//! - Or describe the whole call in a JSON [`WatermarkJob`]
#![forbid(unsafe_code)]

pub mod compositor;
pub mod document;
mod foundation;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod raster;
pub mod source;
pub mod style;
pub mod text;

pub use crate::document::Document;
pub use crate::foundation::core::{Coordinate, ImageIoSize};
pub use crate::foundation::error::{WatermarkError, WatermarkResult};
pub use crate::foundation::log::DebugLog;
pub use crate::job::WatermarkJob;
pub use crate::pipeline::{FlatInputPolicy, WatermarkOptions, add_watermark};
pub use crate::raster::encode::{Compression, OutputFormat, OutputOptions};
pub use crate::source::{ImageWatermark, TextWatermark, WatermarkSource};
pub use crate::style::WatermarkStyle;
pub use crate::text::TextStyle;
