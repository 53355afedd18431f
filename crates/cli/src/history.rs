use apkbot_catalog::{CatalogError, HistoryItem, IncomingMessage, Result};
use std::path::Path;

/// Reads a JSON-lines history dump (one `IncomingMessage` per line).
///
/// A malformed line becomes an error item at its position, so a scan over the dump stops there
/// the same way it would on a transport failure.
pub async fn read_history(path: &Path) -> Result<Vec<HistoryItem>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| CatalogError::persistence(path, err))?;
    Ok(parse_history(&text))
}

pub fn parse_history(text: &str) -> Vec<HistoryItem> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<IncomingMessage>(line)
                .map_err(|err| format!("history line {}: {err}", idx + 1))
        })
        .collect()
}
