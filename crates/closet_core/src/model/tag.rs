//! Tag record and tag-string normalization.
//!
//! # Responsibility
//! - Turn user-entered comma-separated strings into normalized tag names.
//! - Render tag sets back into the editable comma-separated form.
//!
//! # Invariants
//! - A normalized name is trimmed, lowercased and never empty.
//! - `parse_tag_string` never fails; malformed input yields fewer tags.

use serde::{Deserialize, Serialize};

/// Storage-assigned tag identifier.
pub type TagId = i64;

const TAG_SEPARATOR: char = ',';
const TAG_JOINER: &str = ", ";

/// One entry of the tag vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub tag_id: TagId,
    /// Normalized (trimmed, lowercased) name.
    pub name: String,
}

/// Normalizes one tag value.
///
/// Returns `None` when nothing is left after trimming.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Splits a raw comma-separated tag string into normalized, unique names.
///
/// Order of first appearance is preserved so callers can echo input back.
pub fn parse_tag_string(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for piece in raw.split(TAG_SEPARATOR) {
        if let Some(name) = normalize_tag(piece) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Joins tags into the comma-separated form used to prefill an edit field.
pub fn format_tag_string(tags: &[Tag]) -> String {
    tags.iter()
        .map(|tag| tag.name.as_str())
        .collect::<Vec<_>>()
        .join(TAG_JOINER)
}

#[cfg(test)]
mod tests {
    use super::{format_tag_string, normalize_tag, parse_tag_string, Tag};

    #[test]
    fn normalize_tag_trims_and_lowercases() {
        assert_eq!(normalize_tag("  Dress ").as_deref(), Some("dress"));
        assert_eq!(normalize_tag("\tÉTÉ\n").as_deref(), Some("été"));
        assert_eq!(normalize_tag("   "), None);
    }

    #[test]
    fn parse_tag_string_drops_empty_pieces_and_duplicates() {
        let parsed = parse_tag_string("Red, summer,,  Dress , red,RED, ");
        assert_eq!(parsed, vec!["red", "summer", "dress"]);
    }

    #[test]
    fn parse_tag_string_of_blank_input_is_empty() {
        assert!(parse_tag_string("").is_empty());
        assert!(parse_tag_string(" , ,\t,").is_empty());
    }

    #[test]
    fn parsed_names_are_always_normalized() {
        let inputs = ["A,b,C", " x ,X,  y", "Winter Coat, winter coat", ",,,"];
        for input in inputs {
            let parsed = parse_tag_string(input);
            for name in &parsed {
                assert!(!name.is_empty());
                assert_eq!(name.trim(), name);
                assert_eq!(&name.to_lowercase(), name);
            }
            let mut unique = parsed.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), parsed.len(), "duplicates in {input:?}");
        }
    }

    #[test]
    fn format_tag_string_joins_names() {
        let tags = vec![
            Tag {
                tag_id: 1,
                name: "coat".to_string(),
            },
            Tag {
                tag_id: 2,
                name: "winter".to_string(),
            },
        ];
        assert_eq!(format_tag_string(&tags), "coat, winter");
        assert_eq!(parse_tag_string(&format_tag_string(&tags)), vec!["coat", "winter"]);
    }
}
