//! Font selection and text measurement.
//!
//! Runs are shaped with rustybuzz against the same system font database
//! resvg paints with, so a measured advance is the advance that gets
//! painted. Characters no face covers, and hosts without any fonts, fall
//! back to an em-based estimate.

use once_cell::sync::Lazy;
use resvg::usvg::fontdb::{self, Family, Query, Stretch, Style, Weight};
use rustybuzz::{Face, UnicodeBuffer};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Shaped advances cached per face before the cache is cleared.
const ADVANCE_CACHE_LIMIT: usize = 4096;

const SANS_NAMES: &[&str] = &["DejaVu Sans", "Liberation Sans", "Arial", "Helvetica"];
const SERIF_NAMES: &[&str] = &["DejaVu Serif", "Liberation Serif", "Times New Roman", "Times"];
const MONO_NAMES: &[&str] = &[
    "DejaVu Sans Mono",
    "Liberation Mono",
    "Menlo",
    "Consolas",
    "Courier New",
];

/// System fonts, loaded once and shared by measurement and painting.
pub(crate) static FONTDB: Lazy<Arc<fontdb::Database>> = Lazy::new(|| {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    debug!("Loaded {} font faces from system", db.len());
    Arc::new(db)
});

static FACES: Lazy<Mutex<HashMap<FaceKey, Option<fontdb::ID>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

static ADVANCES: Lazy<Mutex<HashMap<FaceKey, HashMap<String, f32>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Generic family a run is painted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Typeface {
    Sans,
    Serif,
    Mono,
}

impl Typeface {
    /// `font-family` list handed to the painter.
    pub fn families(self) -> &'static str {
        match self {
            Typeface::Sans => "DejaVu Sans, Liberation Sans, Arial, Helvetica, sans-serif",
            Typeface::Serif => "DejaVu Serif, Liberation Serif, Times New Roman, Times, serif",
            Typeface::Mono => {
                "DejaVu Sans Mono, Liberation Mono, Menlo, Consolas, Courier New, monospace"
            }
        }
    }

    fn names(self) -> &'static [&'static str] {
        match self {
            Typeface::Sans => SANS_NAMES,
            Typeface::Serif => SERIF_NAMES,
            Typeface::Mono => MONO_NAMES,
        }
    }

    fn generic(self) -> Family<'static> {
        match self {
            Typeface::Sans => Family::SansSerif,
            Typeface::Serif => Family::Serif,
            Typeface::Mono => Family::Monospace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FaceKey {
    typeface: Typeface,
    bold: bool,
    italic: bool,
}

/// Whether any system font was found. Without fonts text is measured by
/// estimate and painted as nothing.
pub fn available() -> bool {
    !FONTDB.is_empty()
}

/// Advance of `text` in ems.
pub fn advance_em(text: &str, typeface: Typeface, bold: bool, italic: bool) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    let key = FaceKey {
        typeface,
        bold,
        italic,
    };

    if let Some(cached) = ADVANCES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
        .and_then(|per_face| per_face.get(text))
    {
        return *cached;
    }

    let fallback = |c: char| estimate_em(c, typeface, bold);
    let advance = face_for(key)
        .and_then(|id| FONTDB.with_face_data(id, |data, index| shaped_em(data, index, text, fallback)))
        .flatten()
        .unwrap_or_else(|| text.chars().map(fallback).sum());

    let mut advances = ADVANCES.lock().unwrap_or_else(PoisonError::into_inner);
    let per_face = advances.entry(key).or_default();
    if per_face.len() >= ADVANCE_CACHE_LIMIT {
        per_face.clear();
    }
    per_face.insert(text.to_string(), advance);
    advance
}

fn face_for(key: FaceKey) -> Option<fontdb::ID> {
    let mut faces = FACES.lock().unwrap_or_else(PoisonError::into_inner);
    *faces.entry(key).or_insert_with(|| {
        let mut families: Vec<Family<'static>> =
            key.typeface.names().iter().copied().map(Family::Name).collect();
        families.push(key.typeface.generic());
        let id = FONTDB.query(&Query {
            families: &families,
            weight: if key.bold { Weight::BOLD } else { Weight::NORMAL },
            stretch: Stretch::Normal,
            style: if key.italic { Style::Italic } else { Style::Normal },
        });
        debug!("Face for {:?}: {:?}", key, id);
        id
    })
}

/// Shape `text` and sum its advances. Glyphs the face lacks (`.notdef`)
/// are painted from a fallback face, so they take the estimate instead.
fn shaped_em(data: &[u8], index: u32, text: &str, fallback: impl Fn(char) -> f32) -> Option<f32> {
    let face = Face::from_slice(data, index)?;
    let units_per_em = face.units_per_em() as f32;
    if units_per_em <= 0.0 {
        return None;
    }

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str(text);
    let glyphs = rustybuzz::shape(&face, &[], buffer);

    let total = glyphs
        .glyph_infos()
        .iter()
        .zip(glyphs.glyph_positions())
        .map(|(info, pos)| {
            if info.glyph_id == 0 {
                text.get(info.cluster as usize..)
                    .and_then(|rest| rest.chars().next())
                    .map_or(0.0, &fallback)
            } else {
                pos.x_advance as f32 / units_per_em
            }
        })
        .sum();
    Some(total)
}

/// Em width of one character when no face can shape it.
fn estimate_em(c: char, typeface: Typeface, bold: bool) -> f32 {
    match c as u32 {
        // Zero-width spaces and joiners, invisible operators, combining marks.
        0x200B..=0x200D | 0x2060..=0x2064 | 0xFEFF | 0x0300..=0x036F => 0.0,
        0x1100..=0x115F
        | 0x2E80..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x1F300..=0x1FAFF
        | 0x20000..=0x3FFFD => 1.0,
        _ => match typeface {
            Typeface::Mono => 0.6,
            _ if bold => 0.58,
            _ => 0.52,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_width_characters_take_no_space() {
        assert_eq!(estimate_em('\u{200b}', Typeface::Sans, false), 0.0);
        assert_eq!(estimate_em('\u{feff}', Typeface::Mono, false), 0.0);
        let plain = advance_em("ab", Typeface::Sans, false, false);
        let joined = advance_em("a\u{200b}b", Typeface::Sans, false, false);
        assert!((plain - joined).abs() < 0.05, "{plain} vs {joined}");
    }

    #[test]
    fn wide_characters_take_a_full_em_by_estimate() {
        assert_eq!(estimate_em('中', Typeface::Sans, false), 1.0);
        assert_eq!(estimate_em('한', Typeface::Mono, true), 1.0);
        assert_eq!(estimate_em('a', Typeface::Mono, false), 0.6);
    }

    #[test]
    fn advances_grow_with_text_and_are_cached() {
        let one = advance_em("m", Typeface::Serif, false, false);
        let three = advance_em("mmm", Typeface::Serif, false, false);
        assert!(one > 0.0);
        assert!((three - 3.0 * one).abs() < 0.05, "{one} x3 vs {three}");
        assert_eq!(advance_em("mmm", Typeface::Serif, false, false), three);
    }

    #[test]
    fn monospace_advances_are_uniform() {
        let narrow = advance_em("iiii", Typeface::Mono, false, false);
        let wide = advance_em("WWWW", Typeface::Mono, false, false);
        assert!((narrow - wide).abs() < 0.01, "{narrow} vs {wide}");
    }

    #[test]
    fn empty_text_has_no_advance() {
        assert_eq!(advance_em("", Typeface::Sans, true, true), 0.0);
    }
}
