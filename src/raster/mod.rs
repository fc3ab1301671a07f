//! Thin adapter over the raster libraries: decode, transform, composite and encode.

pub mod composite;
pub mod decode;
pub mod encode;
pub mod pdf;
pub mod transform;
