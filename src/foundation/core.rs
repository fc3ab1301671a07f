use crate::foundation::error::{WatermarkError, WatermarkResult};

/// A pair of floating-point values used both for pixel dimensions and for placement offsets.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub(crate) fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Input resolution hint and uniform output scale.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageIoSize {
    /// Dots per inch used when rasterizing PDF pages. `None` keeps the embedded raster as-is.
    #[serde(default)]
    pub in_resolution: Option<Coordinate>,
    #[serde(default = "default_out_scale")]
    pub out_scale: f64,
}

fn default_out_scale() -> f64 {
    1.0
}

impl Default for ImageIoSize {
    fn default() -> Self {
        Self {
            in_resolution: None,
            out_scale: default_out_scale(),
        }
    }
}

impl ImageIoSize {
    pub fn validate(&self) -> WatermarkResult<()> {
        if !self.out_scale.is_finite() || self.out_scale <= 0.0 {
            return Err(WatermarkError::validation(format!(
                "out_scale must be finite and > 0, got {}",
                self.out_scale
            )));
        }
        if let Some(res) = self.in_resolution
            && (!res.is_finite() || res.x <= 0.0 || res.y <= 0.0)
        {
            return Err(WatermarkError::validation(format!(
                "in_resolution must be positive, got {}x{}",
                res.x, res.y
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_size_validation_catches_bad_values() {
        assert!(ImageIoSize::default().validate().is_ok());
        assert!(
            ImageIoSize {
                in_resolution: None,
                out_scale: 0.0,
            }
            .validate()
            .is_err()
        );
        assert!(
            ImageIoSize {
                in_resolution: None,
                out_scale: f64::NAN,
            }
            .validate()
            .is_err()
        );
        assert!(
            ImageIoSize {
                in_resolution: Some(Coordinate::new(150.0, 0.0)),
                out_scale: 1.0,
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn io_size_json_defaults_out_scale() {
        let io: ImageIoSize = serde_json::from_str("{}").unwrap();
        assert_eq!(io, ImageIoSize::default());
    }
}
