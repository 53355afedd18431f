use crate::error::{CatalogError, Result};
use crate::matcher::{QueryMatcher, TieBreak, TriggerSet, DEFAULT_LISTING_LIMIT, DEFAULT_TRIGGERS};
use crate::message::UserId;
use crate::normalize::{KeyNormalizer, DEFAULT_PACKAGE_EXTENSION};
use crate::scanner::{CatalogScanner, ScanOptions};
use crate::store::{CatalogStore, DEFAULT_CATALOG_FILE_NAME};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_SOURCE_CHANNEL: &str = "APKBOT_SOURCE_CHANNEL";
pub const ENV_ADMIN_ID: &str = "APKBOT_ADMIN_ID";
pub const ENV_CATALOG_PATH: &str = "APKBOT_CATALOG_PATH";
pub const ENV_TRIGGERS: &str = "APKBOT_TRIGGERS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BotConfig {
    /// Channel whose uploads feed the catalog.
    pub source_channel: Option<String>,
    /// The only user allowed to rescan or list the catalog from chat.
    pub admin_id: Option<UserId>,
    pub catalog_path: PathBuf,
    pub package_extension: String,
    pub triggers: Vec<String>,
    pub tie_break: TieBreak,
    pub listing_limit: usize,
    /// Upper bound on history messages requested per scan.
    pub history_limit: Option<usize>,
    pub checkpoint_every: Option<usize>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            source_channel: None,
            admin_id: None,
            catalog_path: PathBuf::from(DEFAULT_CATALOG_FILE_NAME),
            package_extension: DEFAULT_PACKAGE_EXTENSION.to_string(),
            triggers: DEFAULT_TRIGGERS.iter().map(|s| (*s).to_string()).collect(),
            tie_break: TieBreak::default(),
            listing_limit: DEFAULT_LISTING_LIMIT,
            history_limit: None,
            checkpoint_every: None,
        }
    }
}

impl BotConfig {
    /// Parses JSON, falling back to TOML.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let config = match serde_json::from_slice::<Self>(bytes) {
            Ok(config) => config,
            Err(json_err) => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|err| CatalogError::Config(format!("{json_err}; {err}")))?;
                toml::from_str::<Self>(text).map_err(|toml_err| {
                    CatalogError::Config(format!(
                        "config is not valid JSON ({json_err}) or TOML ({toml_err})"
                    ))
                })?
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|err| CatalogError::persistence(path, err))?;
        Self::from_bytes(&bytes)
    }

    /// File (if any), then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(channel) = get(ENV_SOURCE_CHANNEL) {
            self.source_channel = Some(channel);
        }
        if let Some(admin) = get(ENV_ADMIN_ID) {
            let id = admin.parse::<UserId>().map_err(|err| {
                CatalogError::Config(format!("{ENV_ADMIN_ID}={admin:?} is not a user id: {err}"))
            })?;
            self.admin_id = Some(id);
        }
        if let Some(path) = get(ENV_CATALOG_PATH) {
            self.catalog_path = PathBuf::from(path);
        }
        if let Some(triggers) = get(ENV_TRIGGERS) {
            self.triggers = triggers
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.package_extension.trim().trim_start_matches('.').is_empty() {
            return Err(CatalogError::Config(
                "package_extension must not be empty".to_string(),
            ));
        }
        if self.listing_limit == 0 {
            return Err(CatalogError::Config(
                "listing_limit must be at least 1".to_string(),
            ));
        }
        if self.checkpoint_every == Some(0) {
            return Err(CatalogError::Config(
                "checkpoint_every must be at least 1 when set".to_string(),
            ));
        }
        if self.history_limit == Some(0) {
            return Err(CatalogError::Config(
                "history_limit must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn normalizer(&self) -> KeyNormalizer {
        KeyNormalizer::new(&self.package_extension)
    }

    #[must_use]
    pub fn matcher(&self) -> QueryMatcher {
        QueryMatcher::new(
            TriggerSet::new(&self.triggers),
            self.tie_break,
            self.listing_limit,
        )
    }

    #[must_use]
    pub fn store(&self) -> CatalogStore {
        CatalogStore::new(&self.catalog_path).with_normalizer(self.normalizer())
    }

    #[must_use]
    pub fn scanner(&self) -> CatalogScanner {
        CatalogScanner::new(self.normalizer()).with_options(ScanOptions {
            checkpoint_every: self.checkpoint_every,
        })
    }
}
