use crate::normalize::{KeyNormalizer, NormalizedName};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Opaque handle the transport hands out for an uploaded file. Re-sending a file only needs this
/// token, never the file content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileRef(String);

impl FileRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub key: String,
    pub original_name: String,
    pub file_ref: FileRef,
    pub match_terms: BTreeSet<String>,
}

impl CatalogEntry {
    #[must_use]
    pub fn new(normalized: NormalizedName, original_name: String, file_ref: FileRef) -> Self {
        Self {
            key: normalized.key,
            original_name,
            file_ref,
            match_terms: normalized.terms,
        }
    }

    /// Builds an entry straight from an uploaded file name.
    pub fn from_upload(
        normalizer: &KeyNormalizer,
        original_name: &str,
        file_ref: FileRef,
    ) -> crate::Result<Self> {
        let normalized = normalizer.normalize(original_name)?;
        Ok(Self::new(normalized, original_name.to_string(), file_ref))
    }
}

/// Bounded list of original names for help replies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub names: Vec<String>,
    /// Entries left out because of the limit.
    pub remaining: usize,
}

/// Insertion-ordered, append-only set of entries keyed by normalized name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    positions: HashMap<String, usize>,
}

impl PartialEq for Catalog {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Catalog {}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry` unless its key is already present. The first-seen file for a key wins
    /// and existing entries are never touched.
    pub fn insert_if_absent(&mut self, entry: CatalogEntry) -> bool {
        if self.positions.contains_key(&entry.key) {
            return false;
        }
        self.positions.insert(entry.key.clone(), self.entries.len());
        self.entries.push(entry);
        true
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.positions.get(key).map(|&idx| &self.entries[idx])
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-derives every key and term set from `original_name`.
    ///
    /// Entries whose name no longer normalizes are dropped, and when two entries collapse onto
    /// the same key the earlier one is kept. Returns how many entries were re-keyed or dropped.
    pub fn reconcile(&mut self, normalizer: &KeyNormalizer) -> usize {
        let mut changed = 0;
        let mut rebuilt = Self::new();
        for entry in std::mem::take(&mut self.entries) {
            let normalized = match normalizer.normalize(&entry.original_name) {
                Ok(normalized) => normalized,
                Err(err) => {
                    log::warn!("Dropping catalog entry {:?}: {err}", entry.key);
                    changed += 1;
                    continue;
                }
            };
            let rekeyed = normalized.key != entry.key || normalized.terms != entry.match_terms;
            if rekeyed {
                log::warn!(
                    "Catalog entry {:?} re-keyed to {:?} from {:?}",
                    entry.key,
                    normalized.key,
                    entry.original_name
                );
            }
            let key = normalized.key.clone();
            let kept = rebuilt.insert_if_absent(CatalogEntry::new(
                normalized,
                entry.original_name,
                entry.file_ref,
            ));
            if !kept {
                log::warn!("Catalog entry {key:?} duplicates an earlier one; keeping the first");
            }
            if rekeyed || !kept {
                changed += 1;
            }
        }
        *self = rebuilt;
        changed
    }

    #[must_use]
    pub fn listing(&self, limit: usize) -> Listing {
        let names = self
            .entries
            .iter()
            .take(limit)
            .map(|entry| entry.original_name.clone())
            .collect::<Vec<_>>();
        Listing {
            remaining: self.entries.len().saturating_sub(names.len()),
            names,
        }
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a CatalogEntry;
    type IntoIter = std::slice::Iter<'a, CatalogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<CatalogEntry> for Catalog {
    fn from_iter<I: IntoIterator<Item = CatalogEntry>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for entry in iter {
            catalog.insert_if_absent(entry);
        }
        catalog
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PersistedEntry {
    file_ref: FileRef,
    original_name: String,
    match_terms: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedEntryRef<'a> {
    file_ref: &'a FileRef,
    original_name: &'a str,
    match_terms: &'a BTreeSet<String>,
}

// On disk the catalog is a JSON object keyed by normalized name; object order is catalog order.
impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(
                &entry.key,
                &PersistedEntryRef {
                    file_ref: &entry.file_ref,
                    original_name: &entry.original_name,
                    match_terms: &entry.match_terms,
                },
            )?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Catalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CatalogVisitor;

        impl<'de> Visitor<'de> for CatalogVisitor {
            type Value = Catalog;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of catalog keys to file records")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Catalog, A::Error> {
                let mut catalog = Catalog::new();
                while let Some((key, persisted)) =
                    access.next_entry::<String, PersistedEntry>()?
                {
                    let entry = CatalogEntry {
                        key,
                        original_name: persisted.original_name,
                        file_ref: persisted.file_ref,
                        match_terms: persisted.match_terms.into_iter().collect(),
                    };
                    if !catalog.insert_if_absent(entry) {
                        log::warn!("Duplicate catalog key in persisted file; keeping the first");
                    }
                }
                Ok(catalog)
            }
        }

        deserializer.deserialize_map(CatalogVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(name: &str, file_ref: &str) -> CatalogEntry {
        CatalogEntry::from_upload(&KeyNormalizer::default(), name, FileRef::new(file_ref)).unwrap()
    }

    #[test]
    fn first_seen_entry_wins() {
        let mut catalog = Catalog::new();
        assert!(catalog.insert_if_absent(entry("Beta.apk", "f1")));
        assert!(!catalog.insert_if_absent(entry("BETA.apk", "f2")));

        let kept = catalog.get("beta").unwrap();
        assert_eq!(kept.file_ref, FileRef::new("f1"));
        assert_eq!(kept.original_name, "Beta.apk");
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let catalog: Catalog = ["zeta.apk", "alpha.apk", "mid.apk"]
            .iter()
            .enumerate()
            .map(|(idx, name)| entry(name, &format!("f{idx}")))
            .collect();
        let keys: Vec<&str> = catalog.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn listing_reports_remaining_entries() {
        let catalog: Catalog = (0..13)
            .map(|idx| entry(&format!("pkg{idx:02}.apk"), &format!("f{idx}")))
            .collect();
        let listing = catalog.listing(10);
        assert_eq!(listing.names.len(), 10);
        assert_eq!(listing.names[0], "pkg00.apk");
        assert_eq!(listing.remaining, 3);

        let small = catalog.listing(50);
        assert_eq!(small.names.len(), 13);
        assert_eq!(small.remaining, 0);
    }

    #[test]
    fn serializes_as_keyed_object_in_catalog_order() {
        let catalog: Catalog = vec![entry("Zed_v2.apk", "f1"), entry("Alpha.apk", "f2")]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&catalog).unwrap();
        assert!(json.starts_with("{\"zed-v2\":{\"fileRef\":\"f1\",\"originalName\":\"Zed_v2.apk\""));

        let parsed: Catalog = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, catalog);
        let keys: Vec<&str> = parsed.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["zed-v2", "alpha"]);
    }

    #[test]
    fn missing_field_is_a_parse_error() {
        let json = r#"{"beta":{"fileRef":"f1","originalName":"Beta.apk"}}"#;
        assert!(serde_json::from_str::<Catalog>(json).is_err());
    }

    #[test]
    fn reconcile_rebuilds_keys_from_original_names() {
        let json = r#"{
            "Beta":{"fileRef":"f1","originalName":"Beta.apk","matchTerms":["Beta"]},
            "app-v1-2":{"fileRef":"f2","originalName":"App_v1.2.apk","matchTerms":["app","app-v1-2"]},
            "stale":{"fileRef":"f3","originalName":"beta.APK","matchTerms":["stale"]},
            "junk":{"fileRef":"f4","originalName":"_.apk","matchTerms":["junk"]}
        }"#;
        let mut catalog: Catalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.len(), 4);

        let changed = catalog.reconcile(&KeyNormalizer::default());
        assert_eq!(changed, 3);

        let keys: Vec<&str> = catalog.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["beta", "app-v1-2"]);
        let beta = catalog.get("beta").unwrap();
        assert_eq!(beta.file_ref.as_str(), "f1");
        assert_eq!(beta.match_terms, BTreeSet::from(["beta".to_string()]));
    }

    #[test]
    fn reconcile_leaves_normalized_catalog_untouched() {
        let mut catalog: Catalog = vec![entry("Zed_v2.apk", "f1"), entry("Alpha.apk", "f2")]
            .into_iter()
            .collect();
        let before = catalog.clone();
        assert_eq!(catalog.reconcile(&KeyNormalizer::default()), 0);
        assert_eq!(catalog, before);
    }

    #[test]
    fn duplicate_keys_keep_the_first_record() {
        let json = r#"{
            "beta":{"fileRef":"f1","originalName":"Beta.apk","matchTerms":["beta"]},
            "beta":{"fileRef":"f2","originalName":"beta.APK","matchTerms":["beta"]}
        }"#;
        let catalog: Catalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("beta").unwrap().file_ref.as_str(), "f1");
    }
}
