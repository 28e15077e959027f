use std::path::Path;

use glyphcrop_core::{GlyphError, GlyphLevel, Result};
use glyphcrop_recognize::TesseractConfig;
use glyphcrop_refine::{BoxRefiner, GlyphFilter, Script};
use serde::{Deserialize, Serialize};

/// Runtime configuration for a glyph-cropping batch.
///
/// Every section falls back to its defaults, so a config file only needs the
/// keys it changes:
///
/// ```json
/// { "refine": { "lum_threshold": 200 }, "filter": { "min_size": 8, "script": "hebrew" } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Box refinement margins and ink threshold.
    pub refine: BoxRefiner,
    /// Which detections are kept.
    pub filter: GlyphFilter,
    /// Recognition engine options.
    pub engine: TesseractConfig,
    /// Symbol- or word-level detections.
    pub level: GlyphLevel,
}

impl PipelineConfig {
    /// Hebrew glyph harvesting: `heb` model, Hebrew-only detections.
    pub fn hebrew() -> Self {
        Self {
            filter: GlyphFilter::new(0, Some(Script::Hebrew)),
            engine: TesseractConfig {
                language: "heb".to_string(),
                ..TesseractConfig::default()
            },
            ..Self::default()
        }
    }

    /// Load a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data).map_err(|e| {
            GlyphError::InvalidInput(format!("config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.language.trim().is_empty() {
            return Err(GlyphError::InvalidInput("engine language is empty".into()));
        }
        if self.engine.library_path.trim().is_empty() {
            return Err(GlyphError::InvalidInput(
                "engine library path is empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cropping_params() {
        let config = PipelineConfig::default();
        assert_eq!(config.refine.pre_margin, 2);
        assert_eq!(config.refine.post_margin, 2);
        assert_eq!(config.refine.lum_threshold, 220);
        assert_eq!(config.filter.min_size, 0);
        assert!(config.filter.script.is_none());
        assert_eq!(config.level, GlyphLevel::Symbol);
        assert!(config.engine.preserve_interword_spaces);
    }

    #[test]
    fn partial_json_overrides_only_given_keys() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"refine": {"lum_threshold": 200}, "filter": {"min_size": 8, "script": "hebrew"}, "level": "word"}"#,
        )
        .unwrap();
        assert_eq!(config.refine.lum_threshold, 200);
        assert_eq!(config.refine.pre_margin, 2);
        assert_eq!(config.filter.min_size, 8);
        assert_eq!(config.filter.script, Some(Script::Hebrew));
        assert_eq!(config.level, GlyphLevel::Word);
        assert_eq!(config.engine.language, "heb");
    }

    #[test]
    fn hebrew_preset_restricts_script() {
        let config = PipelineConfig::hebrew();
        assert_eq!(config.filter.script, Some(Script::Hebrew));
        assert_eq!(config.engine.language, "heb");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_language_is_invalid() {
        let mut config = PipelineConfig::default();
        config.engine.language = " ".into();
        assert!(matches!(config.validate(), Err(GlyphError::InvalidInput(_))));
    }
}
