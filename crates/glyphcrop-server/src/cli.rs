use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use glyphcrop_core::{GlyphLevel, SourceImage};
use glyphcrop_pipeline::{BatchOutput, Bundle, DirSink, GlyphPipeline, PipelineConfig, ZipSink};
use glyphcrop_refine::Script;

/// File extensions picked up when a directory is given as input.
pub const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp"];

#[derive(Parser)]
#[command(
    name = "glyphcrop",
    version,
    about = "Cut recognized glyphs out of scanned images and group them by label"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a pipeline config file (JSON).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Flags that override single config values.
#[derive(Args, Debug, Default)]
pub struct ConfigOverrides {
    /// Tesseract language model, e.g. `heb` or `heb+eng`.
    #[arg(long, global = true)]
    pub lang: Option<String>,
    /// Directory holding the `.traineddata` files.
    #[arg(long, global = true)]
    pub tessdata: Option<PathBuf>,
    /// Path to the Tesseract shared library.
    #[arg(long, global = true)]
    pub tesseract_lib: Option<PathBuf>,
    /// Keep only detections containing this script (hebrew, arabic, latin, ...).
    #[arg(long, global = true)]
    pub script: Option<Script>,
    /// Minimum glyph width and height in pixels.
    #[arg(long, global = true)]
    pub min_size: Option<u32>,
    /// Margin added before the ink scan.
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub pre_margin: Option<i32>,
    /// Margin added around the ink box.
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub post_margin: Option<i32>,
    /// Luminance below which a pixel counts as ink.
    #[arg(long, global = true)]
    pub threshold: Option<u8>,
    /// Detection granularity.
    #[arg(long, global = true)]
    pub level: Option<LevelArg>,
    /// Characters the engine may emit.
    #[arg(long, global = true)]
    pub whitelist: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LevelArg {
    Symbol,
    Word,
}

impl From<LevelArg> for GlyphLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Symbol => GlyphLevel::Symbol,
            LevelArg::Word => GlyphLevel::Word,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the static front-end and the crop API.
    Serve {
        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to bind to.
        #[arg(long, default_value = "3000")]
        port: u16,
        /// Directory served at `/`.
        #[arg(long, default_value = "public")]
        static_dir: PathBuf,
    },
    /// Crop a batch of images and write both bundles.
    Run {
        /// Image files or directories of images.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output directory for the bundles.
        #[arg(long, default_value = "out")]
        out: PathBuf,
        /// Bundle format.
        #[arg(long, default_value = "zip")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One zip archive per bundle.
    Zip,
    /// One directory tree per bundle.
    Dir,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(lang) = &self.lang {
            config.engine.language = lang.clone();
        }
        if let Some(td) = &self.tessdata {
            config.engine.tessdata_path = Some(td.to_string_lossy().into_owned());
        }
        if let Some(lib) = &self.tesseract_lib {
            config.engine.library_path = lib.to_string_lossy().into_owned();
        }
        if let Some(script) = self.script {
            config.filter.script = Some(script);
        }
        if let Some(min) = self.min_size {
            config.filter.min_size = min;
        }
        if let Some(m) = self.pre_margin {
            config.refine.pre_margin = m;
        }
        if let Some(m) = self.post_margin {
            config.refine.post_margin = m;
        }
        if let Some(t) = self.threshold {
            config.refine.lum_threshold = t;
        }
        if let Some(level) = self.level {
            config.level = level.into();
        }
        if let Some(w) = &self.whitelist {
            config.engine.char_whitelist = Some(w.clone());
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Expand the command-line inputs into image paths.
///
/// Files are kept in the given order; each directory contributes its
/// supported images sorted by file name (not recursive).
pub fn collect_inputs(inputs: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            found.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn load_sources(paths: &[PathBuf]) -> std::io::Result<Vec<SourceImage>> {
    paths
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(SourceImage::new(name, std::fs::read(path)?))
        })
        .collect()
}

/// `glyphcrop run`: one batch over every input, then both bundles.
pub fn run_batch(
    pipeline: &GlyphPipeline,
    inputs: &[PathBuf],
    out: &Path,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let paths = collect_inputs(inputs)?;
    if paths.is_empty() {
        anyhow::bail!("no images found in the given inputs");
    }
    tracing::info!(images = paths.len(), out = %out.display(), ?format, "loading images");

    let sources = load_sources(&paths)?;
    let output = pipeline.run_tesseract(&sources)?;
    write_bundles(pipeline, &output, out, format)?;
    Ok(())
}

fn write_bundles(
    pipeline: &GlyphPipeline,
    output: &BatchOutput,
    out: &Path,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let reports = pipeline.reports();
    std::fs::create_dir_all(out)?;
    for bundle in Bundle::ALL {
        let target = match format {
            OutputFormat::Zip => {
                let path = out.join(format!("{}.zip", bundle.name()));
                let mut sink = ZipSink::create(&path)?;
                reports.write_bundle(bundle, output, &mut sink)?;
                path
            }
            OutputFormat::Dir => {
                let mut sink = DirSink::new(out.join(bundle.name()))?;
                reports.write_bundle(bundle, output, &mut sink)?;
                sink.root().to_path_buf()
            }
        };
        tracing::info!(bundle = bundle.name(), path = %target.display(), "bundle written");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_inputs_are_filtered_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "notes.txt", "c.webp"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let explicit = PathBuf::from("explicit.tif");
        let files = collect_inputs(&[explicit.clone(), dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["explicit.tif", "a.jpg", "b.PNG", "c.webp"]);
    }

    #[test]
    fn overrides_touch_only_given_values() {
        let cli = Cli::parse_from([
            "glyphcrop",
            "run",
            "page.png",
            "--script",
            "hebrew",
            "--min-size",
            "8",
            "--pre-margin",
            "-1",
            "--level",
            "word",
        ]);
        let mut config = PipelineConfig::default();
        cli.overrides.apply(&mut config);
        assert_eq!(config.filter.script, Some(Script::Hebrew));
        assert_eq!(config.filter.min_size, 8);
        assert_eq!(config.refine.pre_margin, -1);
        assert_eq!(config.refine.post_margin, 2);
        assert_eq!(config.level, GlyphLevel::Word);
        assert_eq!(config.engine.language, "heb");
        match cli.command {
            Command::Run { inputs, format, .. } => {
                assert_eq!(inputs, [PathBuf::from("page.png")]);
                assert_eq!(format, OutputFormat::Zip);
            }
            Command::Serve { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
