use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use glyphcrop_core::Detection;
use serde::{Deserialize, Serialize};

const HEBREW: &[RangeInclusive<char>] = &['\u{0590}'..='\u{05FF}'];
const ARABIC: &[RangeInclusive<char>] = &['\u{0600}'..='\u{06FF}', '\u{0750}'..='\u{077F}'];
const LATIN: &[RangeInclusive<char>] = &[
    'A'..='Z',
    'a'..='z',
    '\u{00C0}'..='\u{024F}',
    '\u{1E00}'..='\u{1EFF}',
];
const GREEK: &[RangeInclusive<char>] = &['\u{0370}'..='\u{03FF}'];
const CYRILLIC: &[RangeInclusive<char>] = &['\u{0400}'..='\u{04FF}'];
const HAN: &[RangeInclusive<char>] = &['\u{3400}'..='\u{4DBF}', '\u{4E00}'..='\u{9FFF}'];

/// Writing systems a detection can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    Hebrew,
    Arabic,
    Latin,
    Greek,
    Cyrillic,
    Han,
}

impl Script {
    /// Unicode blocks that count as this script.
    pub fn ranges(self) -> &'static [RangeInclusive<char>] {
        match self {
            Script::Hebrew => HEBREW,
            Script::Arabic => ARABIC,
            Script::Latin => LATIN,
            Script::Greek => GREEK,
            Script::Cyrillic => CYRILLIC,
            Script::Han => HAN,
        }
    }

    pub fn contains_char(self, c: char) -> bool {
        self.ranges().iter().any(|r| r.contains(&c))
    }

    /// True if at least one character of `text` belongs to this script.
    pub fn matches(self, text: &str) -> bool {
        text.chars().any(|c| self.contains_char(c))
    }

    pub fn name(self) -> &'static str {
        match self {
            Script::Hebrew => "hebrew",
            Script::Arabic => "arabic",
            Script::Latin => "latin",
            Script::Greek => "greek",
            Script::Cyrillic => "cyrillic",
            Script::Han => "han",
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Script {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hebrew" | "heb" => Ok(Script::Hebrew),
            "arabic" | "ara" => Ok(Script::Arabic),
            "latin" | "lat" => Ok(Script::Latin),
            "greek" | "ell" => Ok(Script::Greek),
            "cyrillic" | "cyr" => Ok(Script::Cyrillic),
            "han" | "chi" => Ok(Script::Han),
            other => Err(format!("unknown script '{other}'")),
        }
    }
}

/// Why a detection was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    BlankText,
    TooSmall,
    OutsideScript,
}

/// Drops noise detections before refinement. Never modifies a detection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlyphFilter {
    /// Minimum width and height of the engine box, in pixels.
    pub min_size: u32,
    /// When set, the text must contain a character of this script.
    pub script: Option<Script>,
}

impl GlyphFilter {
    pub fn new(min_size: u32, script: Option<Script>) -> Self {
        Self { min_size, script }
    }

    /// The first rule `det` breaks, if any.
    pub fn rejection(&self, det: &Detection) -> Option<Rejection> {
        if det.text.trim().is_empty() {
            return Some(Rejection::BlankText);
        }
        let min = self.min_size.min(i32::MAX as u32) as i32;
        if det.bbox.width() < min || det.bbox.height() < min {
            return Some(Rejection::TooSmall);
        }
        match self.script {
            Some(script) if !script.matches(&det.text) => Some(Rejection::OutsideScript),
            _ => None,
        }
    }

    pub fn accept(&self, det: &Detection) -> bool {
        self.rejection(det).is_none()
    }
}

#[cfg(test)]
mod tests {
    use glyphcrop_core::GlyphBox;

    use super::*;

    fn det(text: &str, w: i32, h: i32) -> Detection {
        Detection::new(text, 90.0, GlyphBox::from_xywh(10, 10, w, h))
    }

    #[test]
    fn min_size_boundary() {
        let filter = GlyphFilter::new(8, None);
        assert!(!filter.accept(&det("a", 7, 7)));
        assert!(filter.accept(&det("a", 8, 8)));
        assert_eq!(filter.rejection(&det("a", 8, 7)), Some(Rejection::TooSmall));
    }

    #[test]
    fn full_range_box_is_measured_without_overflow() {
        let filter = GlyphFilter::new(8, None);
        let wide = Detection::new("א", 90.0, GlyphBox::new(-10, 0, i32::MAX, 10));
        assert!(filter.accept(&wide));
        let flat = Detection::new("א", 90.0, GlyphBox::new(-10, 0, i32::MAX, 4));
        assert_eq!(filter.rejection(&flat), Some(Rejection::TooSmall));
    }

    #[test]
    fn blank_text_rejected() {
        let filter = GlyphFilter::default();
        assert_eq!(filter.rejection(&det("", 10, 10)), Some(Rejection::BlankText));
        assert_eq!(filter.rejection(&det(" \t\n", 10, 10)), Some(Rejection::BlankText));
        assert!(filter.accept(&det(" x ", 10, 10)));
    }

    #[test]
    fn hebrew_restriction() {
        let filter = GlyphFilter::new(0, Some(Script::Hebrew));
        assert!(filter.accept(&det("א", 10, 10)));
        assert!(filter.accept(&det("1ש", 10, 10)));
        assert_eq!(
            filter.rejection(&det("A", 10, 10)),
            Some(Rejection::OutsideScript)
        );
    }

    #[test]
    fn no_script_accepts_any_text() {
        let filter = GlyphFilter::default();
        for t in ["A", "ж", "٣", "?", "中"] {
            assert!(filter.accept(&det(t, 1, 1)), "{t}");
        }
    }

    #[test]
    fn script_membership() {
        assert!(Script::Cyrillic.matches("жук"));
        assert!(!Script::Greek.matches("abc"));
        assert!(Script::Latin.matches("é"));
        assert!(Script::Han.matches("中文"));
        assert!(Script::Arabic.matches("سلام"));
    }

    #[test]
    fn script_display_names() {
        assert_eq!(Script::Hebrew.to_string(), "hebrew");
        assert_eq!(Script::Han.name(), "han");
        assert_eq!("Hebrew".parse::<Script>(), Ok(Script::Hebrew));
        assert_eq!("heb".parse::<Script>(), Ok(Script::Hebrew));
        assert!("klingon".parse::<Script>().is_err());
    }
}
