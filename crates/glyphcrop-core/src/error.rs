use thiserror::Error;

/// Top-level error type for the glyphcrop pipeline.
///
/// Box geometry never fails: missing ink and degenerate boxes are repaired
/// locally by the refinement stage and never show up here.
#[derive(Debug, Error)]
pub enum GlyphError {
    /// The recognition engine could not be acquired. Aborts the batch
    /// before any image is processed.
    #[error("recognition engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine failed on one image. Aborts the whole batch.
    #[error("recognition failed on '{source_image}': {message}")]
    Recognition {
        source_image: String,
        message: String,
    },

    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("Image encode error: {0}")]
    ImageEncode(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GlyphError {
    /// Whether this error came from the recognition engine boundary.
    pub fn is_engine_failure(&self) -> bool {
        matches!(
            self,
            GlyphError::EngineUnavailable(_) | GlyphError::Recognition { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GlyphError>;
