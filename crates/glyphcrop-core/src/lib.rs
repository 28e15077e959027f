pub mod error;
pub mod traits;
pub mod types;

pub use error::{GlyphError, Result};
pub use traits::{ArchiveSink, GlyphRecognizer};
pub use types::*;
