//! JSON job files: everything one watermarking call needs, in one document.
//!
//! ```json
//! {
//!   "source": "scan.pdf",
//!   "destination": "scan-marked.pdf",
//!   "watermark": { "kind": "image", "file": "logo.png", "style": { "autofit": true } },
//!   "io": { "out_scale": 0.5 },
//!   "options": { "output": { "quality": 85 } }
//! }
//! ```

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::{
    foundation::{core::ImageIoSize, error::WatermarkResult},
    pipeline::WatermarkOptions,
    source::WatermarkSource,
};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WatermarkJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub watermark: WatermarkSource,
    #[serde(default)]
    pub io: ImageIoSize,
    #[serde(default)]
    pub options: WatermarkOptions,
}

impl WatermarkJob {
    /// Read a job file. Relative paths inside it are resolved against the file's directory.
    pub fn load(path: &Path) -> WatermarkResult<Self> {
        let f = File::open(path).with_context(|| format!("open job '{}'", path.display()))?;
        let job: Self = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse job JSON '{}'", path.display()))?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(job.rooted_at(root))
    }

    pub fn rooted_at(mut self, root: &Path) -> Self {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        };
        join(&mut self.source);
        join(&mut self.destination);
        match &mut self.watermark {
            WatermarkSource::Image(w) => join(&mut w.file),
            WatermarkSource::Text(w) => {
                let font = PathBuf::from(&w.text_style.font);
                let candidate = root.join(&font);
                if font.is_relative() && font.extension().is_some() && candidate.is_file() {
                    w.text_style.font = candidate.to_string_lossy().to_string();
                }
            }
        }
        self
    }

    pub fn run(&self) -> WatermarkResult<()> {
        self.watermark
            .apply(&self.source, &self.destination, &self.io, &self.options)
    }
}
