//! Name handling for remote folders and files.
//!
//! ## Sibling ordering
//!
//! Teachers number their folders (`2 Intro`, `13 Vectors`, `13.5 Quiz`,
//! `14 Forces`). Listings are ordered by that leading number, read as a
//! decimal, with ties broken by the full name. Names without a leading number
//! come after every numbered name and keep the order the remote returned them
//! in. Plain lexicographic order puts `13` after `101`; natural sort splits
//! `13.5` into two numbers and is not guaranteed to keep it between `13` and
//! `14`.
//!
//! ## Display names
//!
//! Files shown in a lesson drop a trailing document extension (`Worksheet.pdf`
//! becomes "Worksheet"). The link keeps pointing at the original file.

use crate::types::ListingEntry;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;

/// Extensions stripped from file display names (matched case-insensitively).
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx"];

/// Parse the leading decimal number of a name, if any.
///
/// - `"13"` → 13.0
/// - `"13.5 Quiz"` → 13.5
/// - `"2. Intro"` → 2.0 (dot without digits is not a decimal part)
/// - `"intro"` → None
pub fn numeric_prefix(name: &str) -> Option<f64> {
    let int_len = name.bytes().take_while(u8::is_ascii_digit).count();
    if int_len == 0 {
        return None;
    }
    let rest = &name.as_bytes()[int_len..];
    let frac_len = match rest.split_first() {
        Some((&b'.', tail)) => tail.iter().take_while(|b| b.is_ascii_digit()).count(),
        _ => 0,
    };
    let end = if frac_len > 0 {
        int_len + 1 + frac_len
    } else {
        int_len
    };
    name[..end].parse().ok()
}

/// Compare two names for sibling ordering. Unnumbered names compare equal to
/// each other so a stable sort keeps their original order.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    match (numeric_prefix(a), numeric_prefix(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort a fetched listing in place.
pub fn sort_listing(items: &mut [ListingEntry]) {
    items.sort_by(|a, b| compare_names(&a.name, &b.name));
}

/// URL slug for a topic folder name.
pub fn topic_slug(name: &str) -> String {
    name.replace(' ', "-")
        .replace('.', "")
        .replace('/', "-")
        .to_lowercase()
}

/// Strip a trailing document extension for display.
pub fn display_name(file_name: &str) -> &str {
    if let Some((stem, ext)) = file_name.rsplit_once('.')
        && !stem.is_empty()
        && DOCUMENT_EXTENSIONS
            .iter()
            .any(|d| d.eq_ignore_ascii_case(ext))
    {
        return stem;
    }
    file_name
}

/// Filesystem-safe cache key for a remote id.
///
/// Drive ids are already `[A-Za-z0-9_-]` and pass through unchanged. Any other
/// character becomes `_`, and a short hash of the original id is appended so
/// two ids that differ only in replaced characters don't collide.
pub fn cache_key(id: &str) -> String {
    let safe: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe == id && !id.is_empty() {
        return safe;
    }
    let digest = Sha256::digest(id.as_bytes());
    format!("{}-{:x}", safe, digest)[..safe.len() + 13].to_string()
}

/// Extract a folder id from a Drive folder URL. Bare ids pass through.
///
/// `https://drive.google.com/drive/folders/1AbC_d-9?usp=sharing` → `1AbC_d-9`
pub fn folder_id_from_url(url: &str) -> String {
    match url.split_once("/folders/") {
        Some((_, rest)) => rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect(),
        None => url.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryKind;

    fn entries(names: &[&str]) -> Vec<ListingEntry> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| ListingEntry {
                id: format!("id{i}"),
                name: n.to_string(),
                kind: EntryKind::Folder,
            })
            .collect()
    }

    fn sorted(names: &[&str]) -> Vec<String> {
        let mut items = entries(names);
        sort_listing(&mut items);
        items.into_iter().map(|e| e.name).collect()
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    #[test]
    fn decimal_prefix_sorts_between_integers() {
        assert_eq!(
            sorted(&["13", "13.5", "14", "2", "intro"]),
            vec!["2", "13", "13.5", "14", "intro"]
        );
    }

    #[test]
    fn unnumbered_keep_encounter_order() {
        assert_eq!(
            sorted(&["zeta", "1 First", "alpha", "mid"]),
            vec!["1 First", "zeta", "alpha", "mid"]
        );
    }

    #[test]
    fn ties_broken_by_full_name() {
        assert_eq!(
            sorted(&["3 b-side", "3 a-side", "3"]),
            vec!["3", "3 a-side", "3 b-side"]
        );
    }

    #[test]
    fn larger_numbers_not_lexicographic() {
        assert_eq!(sorted(&["101", "13", "9"]), vec!["9", "13", "101"]);
    }

    #[test]
    fn numeric_prefix_variants() {
        assert_eq!(numeric_prefix("13"), Some(13.0));
        assert_eq!(numeric_prefix("13.5 Quiz"), Some(13.5));
        assert_eq!(numeric_prefix("2. Intro"), Some(2.0));
        assert_eq!(numeric_prefix("07-loops"), Some(7.0));
        assert_eq!(numeric_prefix("intro 3"), None);
        assert_eq!(numeric_prefix(""), None);
    }

    // =========================================================================
    // Slugs and display names
    // =========================================================================

    #[test]
    fn topic_slug_matches_renderer_convention() {
        assert_eq!(topic_slug("Unit 1.2 Kinematics"), "unit-12-kinematics");
        assert_eq!(topic_slug("Waves/Optics"), "waves-optics");
    }

    #[test]
    fn display_name_strips_document_extension() {
        assert_eq!(display_name("Worksheet.pdf"), "Worksheet");
        assert_eq!(display_name("Worksheet.PDF"), "Worksheet");
        assert_eq!(display_name("slides.pptx"), "slides");
    }

    #[test]
    fn display_name_keeps_other_extensions() {
        assert_eq!(display_name("photo.jpg"), "photo.jpg");
        assert_eq!(display_name("no-extension"), "no-extension");
        assert_eq!(display_name(".pdf"), ".pdf");
    }

    // =========================================================================
    // Cache keys and ids
    // =========================================================================

    #[test]
    fn cache_key_passes_drive_ids_through() {
        assert_eq!(cache_key("1ntCk-M-LEXwF9_evL"), "1ntCk-M-LEXwF9_evL");
    }

    #[test]
    fn cache_key_replaces_unsafe_chars_without_collisions() {
        let a = cache_key("a/b");
        let b = cache_key("a:b");
        assert!(a.starts_with("a_b-"));
        assert!(!a.contains('/'));
        assert_ne!(a, b);
    }

    #[test]
    fn folder_id_extracted_from_url() {
        assert_eq!(
            folder_id_from_url("https://drive.google.com/drive/folders/12g3Vab_xF-cT?usp=sharing"),
            "12g3Vab_xF-cT"
        );
        assert_eq!(folder_id_from_url("  bareId123 "), "bareId123");
    }
}
