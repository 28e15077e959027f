use serde::{Deserialize, Serialize};

/// Tesseract page segmentation modes that make sense for glyph harvesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSegMode {
    /// Fully automatic page segmentation (Tesseract `PSM_AUTO`).
    #[default]
    Auto,
    /// A single uniform block of text.
    SingleBlock,
    /// A single text line.
    SingleLine,
    /// A single word.
    SingleWord,
    /// A single character.
    SingleChar,
    /// As much text as possible, in no particular order.
    SparseText,
}

impl PageSegMode {
    /// Numeric value of the `TessPageSegMode` C enum.
    pub fn as_raw(self) -> i32 {
        match self {
            PageSegMode::Auto => 3,
            PageSegMode::SingleBlock => 6,
            PageSegMode::SingleLine => 7,
            PageSegMode::SingleWord => 8,
            PageSegMode::SingleChar => 10,
            PageSegMode::SparseText => 11,
        }
    }
}

/// Explicit engine options. Each field maps to one Tesseract setting; there
/// is no free-form key/value escape hatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Shared library to load (`libtesseract.so.5`, `tesseract55.dll`, ...).
    pub library_path: String,
    /// Directory holding `.traineddata` files. `None` lets Tesseract use
    /// `TESSDATA_PREFIX`.
    pub tessdata_path: Option<String>,
    /// Language model name, `+`-joined for several (e.g. `heb+eng`).
    pub language: String,
    pub page_seg_mode: PageSegMode,
    /// Keep runs of spaces between words (`preserve_interword_spaces`).
    pub preserve_interword_spaces: bool,
    /// Only recognize these characters (`tessedit_char_whitelist`).
    pub char_whitelist: Option<String>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            library_path: default_library_path().to_string(),
            tessdata_path: None,
            language: "heb".to_string(),
            page_seg_mode: PageSegMode::default(),
            preserve_interword_spaces: true,
            char_whitelist: None,
        }
    }
}

impl TesseractConfig {
    /// `(name, value)` pairs passed to `TessBaseAPISetVariable`.
    pub fn variables(&self) -> Vec<(&'static str, String)> {
        let mut vars = vec![(
            "preserve_interword_spaces",
            if self.preserve_interword_spaces { "1" } else { "0" }.to_string(),
        )];
        if let Some(whitelist) = &self.char_whitelist {
            vars.push(("tessedit_char_whitelist", whitelist.clone()));
        }
        vars
    }
}

fn default_library_path() -> &'static str {
    if cfg!(windows) {
        "tesseract55.dll"
    } else if cfg!(target_os = "macos") {
        "libtesseract.5.dylib"
    } else {
        "libtesseract.so.5"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_variables_preserve_spaces() {
        let vars = TesseractConfig::default().variables();
        assert_eq!(vars, vec![("preserve_interword_spaces", "1".to_string())]);
    }

    #[test]
    fn whitelist_becomes_variable() {
        let config = TesseractConfig {
            char_whitelist: Some("אבג".into()),
            preserve_interword_spaces: false,
            ..Default::default()
        };
        let vars = config.variables();
        assert_eq!(vars[0], ("preserve_interword_spaces", "0".to_string()));
        assert_eq!(vars[1], ("tessedit_char_whitelist", "אבג".to_string()));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: TesseractConfig =
            serde_json::from_str(r#"{"language": "eng", "page_seg_mode": "sparse_text"}"#).unwrap();
        assert_eq!(config.language, "eng");
        assert_eq!(config.page_seg_mode, PageSegMode::SparseText);
        assert!(config.preserve_interword_spaces);
        assert_eq!(config.page_seg_mode.as_raw(), 11);
    }
}
