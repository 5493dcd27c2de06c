//! Font container parsing, one descriptor per logical face (made by FontLab https://www.fontlab.com/)

use thiserror::Error;

/// Fixed-shape descriptor for one logical face inside a container.
///
/// A single-face file yields one of these; a TTC/OTC collection yields one
/// per member face. Reconciliation consumes the descriptor as-is, so every
/// field the catalog stores is present here with a concrete type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceInfo {
    pub family: String,
    pub subfamily: String,
    pub postscript_name: Option<String>,
    /// OS/2 usWeightClass, 400 when the table is absent.
    pub weight: u16,
    pub italic: bool,
    /// OS/2 usWidthClass when present.
    pub width: Option<u16>,
    pub version: Option<String>,
    pub full_name: Option<String>,
}

impl Default for FaceInfo {
    fn default() -> Self {
        Self {
            family: String::new(),
            subfamily: "Regular".to_string(),
            postscript_name: None,
            weight: 400,
            italic: false,
            width: None,
            version: None,
            full_name: None,
        }
    }
}

/// A file that cannot be decoded as a supported font container.
///
/// This is a recoverable, per-file condition: the caller logs it and skips
/// the file without touching the catalog.
#[derive(Debug, Error)]
#[error("malformed font container: {0}")]
pub struct ParseError(pub String);

/// Capability seam for extracting face descriptors from container bytes.
///
/// The engine never parses fonts directly; it asks whichever parser it was
/// constructed with. Tests inject stub parsers here the same way discovery
/// backends plug into a walker.
pub trait FaceParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<FaceInfo>, ParseError>;
}

#[cfg(feature = "fontations")]
pub use fontations::FontationsParser;

#[cfg(feature = "fontations")]
mod fontations {
    use read_fonts::tables::name::NameId;
    use read_fonts::tables::os2::SelectionFlags;
    use read_fonts::{FontRef, TableProvider};

    use super::{FaceInfo, FaceParser, ParseError};

    /// Default parser backed by the fontations stack (read-fonts).
    ///
    /// Handles sfnt singles and TTC/OTC collections. WOFF containers are not
    /// decoded here; they never reach this parser because the scanner's
    /// extension allow-list mirrors what this stack supports.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct FontationsParser;

    impl FaceParser for FontationsParser {
        fn parse(&self, bytes: &[u8]) -> Result<Vec<FaceInfo>, ParseError> {
            let mut faces = Vec::new();
            for font in FontRef::fonts(bytes) {
                let font = font.map_err(|e| ParseError(e.to_string()))?;
                faces.push(read_face(&font));
            }
            Ok(faces)
        }
    }

    fn read_face(font: &FontRef) -> FaceInfo {
        let mut legacy_family = None;
        let mut typo_family = None;
        let mut legacy_subfamily = None;
        let mut typo_subfamily = None;
        let mut postscript_name = None;
        let mut full_name = None;
        let mut version = None;

        if let Ok(name_table) = font.name() {
            let data = name_table.string_data();
            for record in name_table.name_record() {
                if !record.is_unicode() {
                    continue;
                }
                let Ok(entry) = record.string(data) else {
                    continue;
                };
                let rendered = entry.to_string();
                if rendered.trim().is_empty() {
                    continue;
                }

                let id = record.name_id();
                let slot = if id == NameId::FAMILY_NAME {
                    &mut legacy_family
                } else if id == NameId::TYPOGRAPHIC_FAMILY_NAME {
                    &mut typo_family
                } else if id == NameId::SUBFAMILY_NAME {
                    &mut legacy_subfamily
                } else if id == NameId::TYPOGRAPHIC_SUBFAMILY_NAME {
                    &mut typo_subfamily
                } else if id == NameId::POSTSCRIPT_NAME {
                    &mut postscript_name
                } else if id == NameId::FULL_NAME {
                    &mut full_name
                } else if id == NameId::VERSION_STRING {
                    &mut version
                } else {
                    continue;
                };

                // First (lowest platform/language) record wins.
                if slot.is_none() {
                    *slot = Some(rendered);
                }
            }
        }

        let (weight, width, selection_italic) = match font.os2() {
            Ok(table) => (
                table.us_weight_class(),
                Some(table.us_width_class()),
                table.fs_selection().contains(SelectionFlags::ITALIC),
            ),
            Err(_) => (400, None, false),
        };

        // Typographic names take precedence over the legacy WWS ones.
        let family = typo_family.or(legacy_family).unwrap_or_default();
        let subfamily = typo_subfamily
            .or(legacy_subfamily)
            .unwrap_or_else(|| "Regular".to_string());
        let italic = selection_italic || names_slanted(&subfamily, full_name.as_deref());

        FaceInfo {
            family,
            subfamily,
            postscript_name,
            weight,
            italic,
            width,
            version,
            full_name,
        }
    }

    // Fallback for fonts whose OS/2 table is missing or lies: style names
    // are the next most reliable signal.
    fn names_slanted(subfamily: &str, full_name: Option<&str>) -> bool {
        let slanted = |s: &str| {
            let lower = s.to_ascii_lowercase();
            lower.contains("italic") || lower.contains("oblique")
        };
        slanted(subfamily) || full_name.map(slanted).unwrap_or(false)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn rejects_garbage_bytes() {
            let parser = FontationsParser;
            let err = parser.parse(b"definitely not a font").unwrap_err();
            assert!(!err.0.is_empty());
        }

        #[test]
        fn rejects_truncated_sfnt_header() {
            let parser = FontationsParser;
            // Valid sfnt magic, nothing else.
            assert!(parser.parse(&[0x00, 0x01, 0x00, 0x00]).is_err());
        }

        #[test]
        fn style_name_fallback_detects_slant() {
            assert!(names_slanted("Bold Italic", None));
            assert!(names_slanted("Regular", Some("Foo Oblique")));
            assert!(!names_slanted("Condensed", Some("Foo Sans")));
        }
    }
}
