pub type WatermarkResult<T> = Result<T, WatermarkError>;

#[derive(thiserror::Error, Debug)]
pub enum WatermarkError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("font error: {0}")]
    Font(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("composite error: {0}")]
    Composite(String),

    #[error("encode error: {0}")]
    Encode(String),

    /// The source has no pages we are willing to watermark.
    #[error("nothing to watermark: {0}")]
    NoPages(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WatermarkError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn font(msg: impl Into<String>) -> Self {
        Self::Font(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    pub fn composite(msg: impl Into<String>) -> Self {
        Self::Composite(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn no_pages(msg: impl Into<String>) -> Self {
        Self::NoPages(msg.into())
    }
}
