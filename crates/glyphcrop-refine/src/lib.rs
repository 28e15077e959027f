pub mod expand;
pub mod filter;
pub mod ink;
pub mod raster;
pub mod refine;

pub use expand::expand;
pub use filter::{GlyphFilter, Rejection, Script};
pub use ink::{luminance, scan_ink};
pub use raster::{crop_png, crop_region, decode_rgba, encode_png};
pub use refine::BoxRefiner;
