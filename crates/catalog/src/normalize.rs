//! Turns uploaded file names into catalog keys and match terms.
//!
//! The transform is pure: the same name always yields the same key, which is what makes
//! re-scanning a channel idempotent.

use crate::error::{CatalogError, Result};
use std::collections::BTreeSet;

pub const DEFAULT_PACKAGE_EXTENSION: &str = "apk";

/// Fragments shorter than this never become match terms ("v1", "x" and friends are noise).
pub const MIN_TERM_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedName {
    pub key: String,
    pub terms: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNormalizer {
    /// Lowercase suffix including the leading dot, e.g. `.apk`.
    suffix: String,
}

impl Default for KeyNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_PACKAGE_EXTENSION)
    }
}

impl KeyNormalizer {
    /// Accepts the extension with or without its leading dot.
    #[must_use]
    pub fn new(extension: &str) -> Self {
        let ext = extension.trim().trim_start_matches('.').to_lowercase();
        Self {
            suffix: format!(".{ext}"),
        }
    }

    #[must_use]
    pub fn extension(&self) -> &str {
        &self.suffix[1..]
    }

    /// Case-insensitive check that `file_name` carries the package extension.
    #[must_use]
    pub fn is_package_file(&self, file_name: &str) -> bool {
        file_name.trim_end().to_lowercase().ends_with(&self.suffix)
    }

    pub fn normalize(&self, name: &str) -> Result<NormalizedName> {
        let lowered = name.to_lowercase();
        let lowered = lowered.trim_end();
        let stem = lowered.strip_suffix(&self.suffix).unwrap_or(lowered);
        let key = stem.replace(['.', '_'], "-").trim().to_string();
        if key.is_empty() {
            return Err(CatalogError::InvalidName {
                name: name.to_string(),
                reason: "name is empty once the extension is removed",
            });
        }
        // A separator-only key like `-` is contained in every hyphenated message.
        if !key.chars().any(char::is_alphanumeric) {
            return Err(CatalogError::InvalidName {
                name: name.to_string(),
                reason: "name has no letters or digits",
            });
        }

        let terms = match_terms(&key);
        Ok(NormalizedName { key, terms })
    }
}

/// The key itself plus every `-`-separated fragment long enough to be meaningful.
#[must_use]
pub fn match_terms(key: &str) -> BTreeSet<String> {
    let mut terms: BTreeSet<String> = key
        .split('-')
        .filter(|fragment| fragment.chars().count() >= MIN_TERM_CHARS)
        .map(str::to_string)
        .collect();
    terms.insert(key.to_string());
    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn strips_extension_and_collapses_punctuation() {
        let normalizer = KeyNormalizer::default();
        let name = normalizer.normalize("App_v1.2.APK").unwrap();
        assert_eq!(name.key, "app-v1-2");
        assert_eq!(name.terms, set(&["app", "app-v1-2"]));
    }

    #[test]
    fn keeps_fragments_longer_than_two_chars() {
        let normalizer = KeyNormalizer::default();
        let name = normalizer
            .normalize("Telegram_Beta_10.4.1.apk")
            .unwrap();
        assert_eq!(name.key, "telegram-beta-10-4-1");
        assert_eq!(
            name.terms,
            set(&["beta", "telegram", "telegram-beta-10-4-1"])
        );
    }

    #[test]
    fn unstructured_name_yields_single_term() {
        let normalizer = KeyNormalizer::default();
        let name = normalizer.normalize("Alpha.apk").unwrap();
        assert_eq!(name.key, "alpha");
        assert_eq!(name.terms, set(&["alpha"]));
    }

    #[test]
    fn counts_chars_not_bytes_for_the_threshold() {
        let terms = match_terms("下载-测试版-ab");
        assert!(terms.contains("测试版"));
        assert!(!terms.contains("下载"));
        assert!(!terms.contains("ab"));
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let normalizer = KeyNormalizer::default();
        assert_eq!(normalizer.normalize("  Beta .apk ").unwrap().key, "beta");
    }

    #[test]
    fn rejects_extension_only_and_empty_names() {
        let normalizer = KeyNormalizer::default();
        for raw in ["", ".apk", "  .APK", "   ", "_.apk", "..apk", "-_ .apk"] {
            let err = normalizer.normalize(raw).unwrap_err();
            assert!(matches!(err, CatalogError::InvalidName { .. }), "{raw:?}");
        }
    }

    #[test]
    fn custom_extension_accepts_leading_dot() {
        let normalizer = KeyNormalizer::new(".PKG");
        assert_eq!(normalizer.extension(), "pkg");
        assert!(normalizer.is_package_file("tool.Pkg"));
        assert!(!normalizer.is_package_file("tool.apk"));
        assert_eq!(normalizer.normalize("tool_kit.pkg").unwrap().key, "tool-kit");
    }

    #[test]
    fn package_detection_is_case_insensitive() {
        let normalizer = KeyNormalizer::default();
        assert!(normalizer.is_package_file("Beta.APK"));
        assert!(normalizer.is_package_file("beta.apk"));
        assert!(!normalizer.is_package_file("beta.apk.zip"));
        assert!(!normalizer.is_package_file("readme.txt"));
    }

    proptest! {
        #[test]
        fn proptest_normalize_is_deterministic(name in "\\PC{0,40}") {
            let normalizer = KeyNormalizer::default();
            let first = normalizer.normalize(&name).ok();
            let second = normalizer.normalize(&name).ok();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn proptest_key_is_always_a_term(name in "[A-Za-z0-9._ -]{1,32}\\.apk") {
            let normalizer = KeyNormalizer::default();
            if let Ok(normalized) = normalizer.normalize(&name) {
                prop_assert!(normalized.terms.contains(&normalized.key));
                prop_assert!(!normalized.key.contains('.'));
                prop_assert!(!normalized.key.contains('_'));
                for term in &normalized.terms {
                    prop_assert!(term == &normalized.key || term.chars().count() >= MIN_TERM_CHARS);
                }
            }
        }
    }
}
