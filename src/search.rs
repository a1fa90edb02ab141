use unicode_normalization::UnicodeNormalization;
use unicode_properties::{GeneralCategory, UnicodeGeneralCategory};

use crate::assets::{AssetRef, AssetStore};
use crate::catalog::Catalog;
use crate::fragment::{build_fragment, Fragment, FragmentOptions, Highlighter};

/// Normalize a string for comparison only (never for display).
/// Lowercases, decomposes (NFD) and drops nonspacing marks, so "Café" -> "cafe".
/// Spacing marks (e.g. Devanagari vowel signs) are kept.
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
        .nfd()
        .filter(|c| !is_nonspacing_mark(*c))
        .collect()
}

fn is_nonspacing_mark(c: char) -> bool {
    c.general_category() == GeneralCategory::NonspacingMark
}

/// Normalized needle for a query, or `None` when nothing but whitespace is left.
///
/// Edge whitespace is part of the needle, so " rose" does not match "primrose".
pub fn normalize_query(query: &str) -> Option<String> {
    let needle = normalize(query);
    if needle.trim().is_empty() {
        None
    } else {
        Some(needle)
    }
}

/// Settings shared by every search call.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub fragment: FragmentOptions,
    pub assets: AssetStore,
}

#[derive(Debug, Clone)]
pub struct MatchResult<'a> {
    pub page_id: u32,
    pub text: &'a str,
    pub fragment: Fragment,
    pub asset: AssetRef,
}

/// Pages whose normalized text contains the normalized query, ascending by page id.
///
/// A blank query matches nothing even though every text trivially contains "".
pub fn matching_pages<'a>(catalog: &'a Catalog, query: &str) -> Vec<(u32, &'a str)> {
    let Some(needle) = normalize_query(query) else {
        return Vec::new();
    };

    let mut matches: Vec<(u32, &str)> = catalog
        .pages()
        .filter(|(_, text)| normalize(text).contains(&needle))
        .collect();

    // Catalog iteration is already ordered, but the result order is part of the contract.
    matches.sort_by_key(|(page_id, _)| *page_id);
    matches
}

/// Run a query against the catalog and build the display data for every match.
pub fn search<'a>(
    catalog: &'a Catalog,
    query: &str,
    settings: &SearchSettings,
) -> Vec<MatchResult<'a>> {
    let pages = matching_pages(catalog, query);
    if pages.is_empty() {
        return Vec::new();
    }

    let highlighter = Highlighter::new(query, &settings.fragment.labels);

    let results: Vec<MatchResult<'a>> = pages
        .into_iter()
        .map(|(page_id, text)| MatchResult {
            page_id,
            text,
            fragment: build_fragment(text, &settings.fragment, &highlighter),
            asset: settings.assets.resolve(page_id),
        })
        .collect();

    let missing = results.iter().filter(|r| !r.asset.exists).count();
    tracing::debug!(
        query,
        matches = results.len(),
        missing_assets = missing,
        "search finished"
    );

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    use proptest::prelude::*;
    use tempfile::TempDir;

    fn catalog(json: &str) -> Catalog {
        Catalog::from_json_str(json).unwrap()
    }

    fn settings(dir: PathBuf) -> SearchSettings {
        SearchSettings {
            fragment: FragmentOptions {
                length: 60,
                clean: true,
                labels: Vec::new(),
            },
            assets: AssetStore::new(dir, "jpg"),
        }
    }

    fn ids(results: &[MatchResult<'_>]) -> Vec<u32> {
        results.iter().map(|r| r.page_id).collect()
    }

    #[test]
    fn test_normalize_strips_case_and_accents() {
        assert_eq!(normalize("Café"), "cafe");
        assert_eq!(normalize("cafe"), "cafe");
        assert_eq!(normalize("JOSÉ García-Núñez, 10€!"), "jose garcia-nunez, 10€!");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_keeps_spaces_and_punctuation() {
        assert_eq!(normalize("  a.b  (c) "), "  a.b  (c) ");
    }

    #[test]
    fn test_normalize_query_blank() {
        assert_eq!(normalize_query(""), None);
        assert_eq!(normalize_query("   \t"), None);
        assert_eq!(normalize_query("Rosé"), Some("rose".to_string()));
        assert_eq!(normalize_query(" Rosé"), Some(" rose".to_string()));
    }

    #[test]
    fn test_normalize_keeps_spacing_marks() {
        // KA + AA sign (Mc) must not fold into KA + I sign
        assert_eq!(normalize("\u{0915}\u{093E}").chars().count(), 2);
        assert_ne!(normalize("\u{0915}\u{093E}"), normalize("\u{0915}\u{093F}"));
        assert_eq!(normalize("\u{0915}\u{0301}"), "\u{0915}");
    }

    #[test]
    fn test_marks_only_query_returns_nothing() {
        let cat = catalog(r#"{"1": "rose", "2": "amber"}"#);
        assert_eq!(normalize_query("\u{0301}"), None);
        assert!(matching_pages(&cat, "\u{0301}").is_empty());
        assert!(matching_pages(&cat, " \u{0301}\u{0308} ").is_empty());
        assert!(matching_pages(&cat, "\t\u{0300}").is_empty());
    }

    #[test]
    fn test_edge_whitespace_is_part_of_query() {
        let cat = catalog(r#"{"1": "primrose", "2": "a rose", "3": "rose"}"#);
        let pages: Vec<u32> = matching_pages(&cat, " rose").into_iter().map(|(id, _)| id).collect();
        assert_eq!(pages, vec![2]);
        let pages: Vec<u32> = matching_pages(&cat, "rose").into_iter().map(|(id, _)| id).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[test]
    fn test_blank_query_returns_nothing() {
        let cat = catalog(r#"{"1": "rose", "2": "   "}"#);
        assert!(matching_pages(&cat, "").is_empty());
        assert!(matching_pages(&cat, "   ").is_empty());
    }

    #[test]
    fn test_substring_match_is_case_insensitive() {
        let cat = catalog(r#"{"1": "Floral rose scent", "2": "Woody amber"}"#);
        let pages = matching_pages(&cat, "ROS");
        assert_eq!(pages, vec![(1, "Floral rose scent")]);
    }

    #[test]
    fn test_substring_not_token_match() {
        let cat = catalog(r#"{"1": "lamps", "2": "flamp", "3": "lam p"}"#);
        let pages: Vec<u32> = matching_pages(&cat, "lamp").into_iter().map(|(id, _)| id).collect();
        assert_eq!(pages, vec![1, 2]);
    }

    #[test]
    fn test_accent_insensitive_both_ways() {
        let cat = catalog(r#"{"1": "Crème brûlée", "2": "Creme brulee"}"#);
        let pages: Vec<u32> = matching_pages(&cat, "BRULEE").into_iter().map(|(id, _)| id).collect();
        assert_eq!(pages, vec![1, 2]);
        let pages: Vec<u32> = matching_pages(&cat, "crème").into_iter().map(|(id, _)| id).collect();
        assert_eq!(pages, vec![1, 2]);
    }

    #[test]
    fn test_numeric_ordering() {
        let cat = catalog(r#"{"10": "rose", "2": "rose", "9": "rose"}"#);
        let pages: Vec<u32> = matching_pages(&cat, "rose").into_iter().map(|(id, _)| id).collect();
        assert_eq!(pages, vec![2, 9, 10]);
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let cat = catalog(r#"{"1": "Price: $5.00 (special)", "2": "Price: 5500"}"#);
        let temp = TempDir::new().unwrap();
        let results = search(&cat, "$5.00", &settings(temp.path().to_path_buf()));
        assert_eq!(ids(&results), vec![1]);

        let results = search(&cat, "(special)", &settings(temp.path().to_path_buf()));
        assert_eq!(ids(&results), vec![1]);
        assert!(results[0].fragment.marked().contains("**(special)**"));

        // An unbalanced pattern must neither fail nor match anything unexpected
        assert!(search(&cat, "5.00 (x", &settings(temp.path().to_path_buf())).is_empty());
    }

    #[test]
    fn test_malformed_entries_never_match() {
        let cat = catalog(r#"{"1": 42, "2": {"texto": "rose"}, "3": {"other": "rose"}}"#);
        let pages: Vec<u32> = matching_pages(&cat, "rose").into_iter().map(|(id, _)| id).collect();
        assert_eq!(pages, vec![2]);
    }

    #[test]
    fn test_search_reports_missing_assets_without_dropping() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("page_1.jpg"), b"jpeg").unwrap();
        let cat = catalog(r#"{"1": "rose one", "2": "rose two"}"#);

        let results = search(&cat, "rose", &settings(temp.path().to_path_buf()));
        assert_eq!(ids(&results), vec![1, 2]);
        assert!(results[0].asset.exists);
        assert!(!results[1].asset.exists);
        assert_eq!(results[1].asset.path, temp.path().join("page_2.jpg"));
        assert_eq!(results[1].text, "rose two");
    }

    #[test]
    fn test_search_highlights_original_query() {
        let temp = TempDir::new().unwrap();
        let cat = catalog(r#"{"4": "Rose and ROSE"}"#);
        let results = search(&cat, "rose", &settings(temp.path().to_path_buf()));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].fragment.marked(), "**Rose** and **ROSE**");

        let results = search(&cat, " ROSE", &settings(temp.path().to_path_buf()));
        assert_eq!(results[0].fragment.marked(), "Rose and** ROSE**");
    }

    #[test]
    fn test_empty_catalog() {
        let temp = TempDir::new().unwrap();
        let cat = Catalog::default();
        assert!(search(&cat, "rose", &settings(temp.path().to_path_buf())).is_empty());
    }

    #[test]
    fn test_concurrent_searches_share_catalog() {
        let cat = catalog(r#"{"1": "rose", "2": "amber", "3": "rosewood"}"#);
        let temp = TempDir::new().unwrap();
        let settings = settings(temp.path().to_path_buf());

        std::thread::scope(|scope| {
            let a = scope.spawn(|| ids(&search(&cat, "rose", &settings)));
            let b = scope.spawn(|| ids(&search(&cat, "amber", &settings)));
            assert_eq!(a.join().unwrap(), vec![1, 3]);
            assert_eq!(b.join().unwrap(), vec![2]);
        });
    }

    proptest! {
        #[test]
        fn prop_normalize_idempotent(s in "[a-zA-Z0-9À-ÿ .,$()-]{0,40}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once.clone());
            prop_assert!(once.chars().count() <= s.chars().count());
        }

        #[test]
        fn prop_normalize_has_no_marks(s in "\\PC{0,30}") {
            prop_assert!(!normalize(&s).chars().any(is_nonspacing_mark));
        }
    }
}
