pub mod aggregate;
pub mod archive;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod report;

pub use aggregate::{sanitize, BucketLabel, CharBucket, CharBucketAggregator, CropEntry};
pub use archive::{DirSink, MemorySink, ZipSink};
pub use config::PipelineConfig;
pub use output::{BatchOutput, GlyphCrop, ImageGroup};
pub use pipeline::{FilterCounts, GlyphPipeline};
pub use report::{Bundle, ReportBuilder};
