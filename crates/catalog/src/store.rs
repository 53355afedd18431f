use crate::catalog::Catalog;
use crate::error::{CatalogError, Result};
use crate::normalize::KeyNormalizer;
use std::path::{Path, PathBuf};

pub const DEFAULT_CATALOG_FILE_NAME: &str = "catalog.json";

/// Result of a lenient load: the catalog to run with, plus the reason it had to start empty.
#[derive(Debug, Default)]
pub struct LoadedCatalog {
    pub catalog: Catalog,
    pub warning: Option<CatalogError>,
    /// Entries whose stored key did not match their original name and were re-keyed or dropped.
    pub repaired: usize,
}

/// JSON file holding the whole catalog. Saves replace the file through a temp file + rename so a
/// crash mid-write leaves the previous version intact.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: PathBuf,
    normalizer: KeyNormalizer,
}

impl CatalogStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            normalizer: KeyNormalizer::default(),
        }
    }

    /// Normalizer used to check loaded keys against their original names.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: KeyNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict load. `Ok(None)` when no catalog has been saved yet. Entries come back exactly as
    /// stored; `load` is the path that reconciles them.
    pub async fn try_load(&self) -> Result<Option<Catalog>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CatalogError::persistence(&self.path, err)),
        };
        let catalog: Catalog = serde_json::from_slice(&bytes)?;
        Ok(Some(catalog))
    }

    /// Never fails: a missing file is an empty catalog, an unreadable or corrupt one is an empty
    /// catalog plus a warning. Entries whose key does not follow from their original name are
    /// re-keyed (or dropped) and counted in `repaired`.
    pub async fn load(&self) -> LoadedCatalog {
        match self.try_load().await {
            Ok(Some(mut catalog)) => {
                let repaired = catalog.reconcile(&self.normalizer);
                if repaired > 0 {
                    log::warn!(
                        "Repaired {repaired} catalog entries in {} whose keys did not match \
                         their file names",
                        self.path.display()
                    );
                }
                log::info!(
                    "Loaded {} catalog entries from {}",
                    catalog.len(),
                    self.path.display()
                );
                LoadedCatalog {
                    catalog,
                    warning: None,
                    repaired,
                }
            }
            Ok(None) => {
                log::info!(
                    "No catalog at {}; starting with an empty one",
                    self.path.display()
                );
                LoadedCatalog::default()
            }
            Err(err) => {
                log::warn!(
                    "Ignoring unreadable catalog {}: {err}",
                    self.path.display()
                );
                LoadedCatalog {
                    catalog: Catalog::new(),
                    warning: Some(err),
                    repaired: 0,
                }
            }
        }
    }

    pub async fn save(&self, catalog: &Catalog) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(catalog)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| CatalogError::persistence(parent, err))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|err| CatalogError::persistence(&tmp, err))?;
        if let Err(err) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CatalogError::persistence(&self.path, err));
        }
        log::debug!(
            "Saved {} catalog entries to {}",
            catalog.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, FileRef};
    use crate::matcher::{MatchResult, QueryMatcher};
    use crate::normalize::KeyNormalizer;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn sample_catalog() -> Catalog {
        let normalizer = KeyNormalizer::default();
        ["Beta_Build.apk", "app-v1.2.apk", "Alpha.apk"]
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                CatalogEntry::from_upload(&normalizer, name, FileRef::new(format!("file-{idx}")))
                    .unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let tmp = TempDir::new().unwrap();
        let store = CatalogStore::new(tmp.path().join("state").join("catalog.json"));
        let catalog = sample_catalog();

        store.save(&catalog).await.unwrap();
        let loaded = store.load().await;

        assert!(loaded.warning.is_none());
        assert_eq!(loaded.catalog, catalog);
        assert!(!tmp.path().join("state").join("catalog.json.tmp").exists());
    }

    #[tokio::test]
    async fn missing_file_is_empty_without_warning() {
        let tmp = TempDir::new().unwrap();
        let store = CatalogStore::new(tmp.path().join("catalog.json"));

        assert!(store.try_load().await.unwrap().is_none());
        let loaded = store.load().await;
        assert!(loaded.catalog.is_empty());
        assert!(loaded.warning.is_none());
    }

    #[tokio::test]
    async fn corrupt_file_degrades_to_empty_with_warning() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("catalog.json");
        tokio::fs::write(&path, b"{\"beta\": {\"fileRef\": ").await.unwrap();
        let store = CatalogStore::new(&path);

        let loaded = store.load().await;
        assert!(loaded.catalog.is_empty());
        assert!(matches!(
            loaded.warning,
            Some(CatalogError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn save_failure_reports_persistence_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        tokio::fs::write(&blocker, b"file").await.unwrap();
        let store = CatalogStore::new(blocker.join("catalog.json"));

        let err = store.save(&sample_catalog()).await.unwrap_err();
        assert!(matches!(err, CatalogError::Persistence { .. }));
    }

    #[tokio::test]
    async fn load_rekeys_entries_that_do_not_match_their_names() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("catalog.json");
        tokio::fs::write(
            &path,
            br#"{"Beta":{"fileRef":"f1","originalName":"Beta.apk","matchTerms":["Beta"]}}"#,
        )
        .await
        .unwrap();
        let store = CatalogStore::new(&path);

        let raw = store.try_load().await.unwrap().unwrap();
        assert!(raw.contains_key("Beta"));

        let loaded = store.load().await;
        assert!(loaded.warning.is_none());
        assert_eq!(loaded.repaired, 1);
        assert!(loaded.catalog.contains_key("beta"));

        let matcher = QueryMatcher::default();
        for text in ["beta", "download beta"] {
            match matcher.resolve(text, &loaded.catalog) {
                MatchResult::Found(entry) => assert_eq!(entry.file_ref.as_str(), "f1"),
                other => panic!("{text:?} resolved to {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn load_uses_the_configured_extension() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("catalog.json");
        tokio::fs::write(
            &path,
            br#"{"tool-kit":{"fileRef":"t","originalName":"Tool_Kit.xapk","matchTerms":["kit","tool","tool-kit"]}}"#,
        )
        .await
        .unwrap();

        let loaded = CatalogStore::new(&path)
            .with_normalizer(KeyNormalizer::new("xapk"))
            .load()
            .await;
        assert_eq!(loaded.repaired, 0);
        assert!(loaded.catalog.contains_key("tool-kit"));
    }

    #[tokio::test]
    async fn save_overwrites_previous_version() {
        let tmp = TempDir::new().unwrap();
        let store = CatalogStore::new(tmp.path().join("catalog.json"));
        store.save(&Catalog::new()).await.unwrap();
        store.save(&sample_catalog()).await.unwrap();

        let loaded = store.try_load().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 3);
    }

    fn catalog_strategy() -> impl Strategy<Value = Catalog> {
        prop::collection::vec(("[A-Za-z0-9][A-Za-z0-9._ -]{0,20}", "[a-z0-9]{1,12}"), 0..16)
            .prop_map(|uploads| {
                let normalizer = KeyNormalizer::default();
                uploads
                    .into_iter()
                    .filter_map(|(stem, file_ref)| {
                        CatalogEntry::from_upload(
                            &normalizer,
                            &format!("{stem}.apk"),
                            FileRef::new(file_ref),
                        )
                        .ok()
                    })
                    .collect()
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn proptest_save_then_load_is_identity(catalog in catalog_strategy()) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let tmp = TempDir::new().unwrap();
            let store = CatalogStore::new(tmp.path().join("catalog.json"));

            let loaded = runtime.block_on(async {
                store.save(&catalog).await.unwrap();
                store.load().await
            });
            prop_assert!(loaded.warning.is_none());
            prop_assert_eq!(loaded.repaired, 0);
            prop_assert_eq!(loaded.catalog, catalog);
        }
    }
}
