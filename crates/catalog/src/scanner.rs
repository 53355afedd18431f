use crate::catalog::CatalogEntry;
use crate::error::{CatalogError, Result};
use crate::message::IncomingMessage;
use crate::normalize::KeyNormalizer;
use crate::service::CatalogService;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

/// Counters for one pass over a channel's history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Messages read from the stream.
    pub scanned: usize,
    /// New catalog entries.
    pub added: usize,
    /// Package attachments whose name could not be normalized.
    pub skipped: usize,
    /// Catalog size after the scan.
    pub total: usize,
    /// Whether the final save reached disk. When it did not, the entries still live in memory.
    pub persisted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Persist after every `n` additions instead of only at the end.
    pub checkpoint_every: Option<usize>,
}

/// Walks message history and adds every new package upload to the catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogScanner {
    normalizer: KeyNormalizer,
    options: ScanOptions,
}

impl CatalogScanner {
    #[must_use]
    pub fn new(normalizer: KeyNormalizer) -> Self {
        Self {
            normalizer,
            options: ScanOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Package entry carried by `message`, if any. Names that fail normalization are errors so the
    /// caller can count them.
    pub fn extract(&self, message: &IncomingMessage) -> Option<Result<CatalogEntry>> {
        let document = message.as_document()?;
        let file_name = document.file_name.as_deref()?;
        if !self.normalizer.is_package_file(file_name) {
            return None;
        }
        Some(CatalogEntry::from_upload(
            &self.normalizer,
            file_name,
            document.file_ref.clone(),
        ))
    }

    /// Consumes `messages` to the end, inserting unseen keys, then persists the catalog.
    ///
    /// A stream error aborts the scan. Entries added before the error stay in memory; the file on
    /// disk is only touched by checkpoints that already completed. A failed save does not fail
    /// the scan: it is logged and reported through `ScanReport::persisted`.
    pub async fn scan<S>(&self, messages: S, catalog: &CatalogService) -> Result<ScanReport>
    where
        S: Stream<Item = Result<IncomingMessage>>,
    {
        let mut messages = std::pin::pin!(messages);
        let mut report = ScanReport::default();
        let mut since_checkpoint = 0usize;

        while let Some(item) = messages.next().await {
            let message = match item {
                Ok(message) => message,
                Err(err) => {
                    log::warn!(
                        "Scan aborted after {} messages ({} added): {err}",
                        report.scanned,
                        report.added
                    );
                    return Err(CatalogError::ScanAborted {
                        scanned: report.scanned,
                        added: report.added,
                        source: Box::new(err),
                    });
                }
            };
            report.scanned += 1;

            let entry = match self.extract(&message) {
                None => continue,
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    log::debug!("Skipping message {}: {err}", message.id);
                    report.skipped += 1;
                    continue;
                }
            };

            let key = entry.key.clone();
            if catalog.insert_if_absent(entry).await {
                log::debug!("Catalogued {key} from message {}", message.id);
                report.added += 1;
                since_checkpoint += 1;
                if let Some(every) = self.options.checkpoint_every {
                    if since_checkpoint >= every {
                        if let Err(err) = catalog.persist().await {
                            log::warn!("Checkpoint save failed: {err}");
                        }
                        since_checkpoint = 0;
                    }
                }
            }
        }

        report.persisted = match catalog.persist().await {
            Ok(()) => true,
            Err(err) => {
                log::error!("Scan finished but the catalog was not saved: {err}");
                false
            }
        };
        report.total = catalog.len().await;
        log::info!(
            "Scanned {} messages: {} added, {} skipped, {} in catalog",
            report.scanned,
            report.added,
            report.skipped,
            report.total
        );
        Ok(report)
    }
}
