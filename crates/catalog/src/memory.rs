//! In-process transport: serves canned channel history and records outbound sends.
//!
//! Backs the bot and dispatcher tests; the CLI talks to the outside world through its own stdio
//! transport.

use crate::catalog::FileRef;
use crate::error::{CatalogError, Result};
use crate::message::{ChatId, IncomingMessage};
use crate::transport::{MessageStream, Transport};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SentMessage {
    File {
        chat: ChatId,
        file_ref: FileRef,
        caption: String,
    },
    Text {
        chat: ChatId,
        text: String,
    },
}

/// One history slot: either a message or a transport failure at that position.
pub type HistoryItem = std::result::Result<IncomingMessage, String>;

#[derive(Debug, Default)]
pub struct MemoryTransport {
    channels: Mutex<HashMap<String, Vec<HistoryItem>>>,
    sent: Mutex<Vec<SentMessage>>,
    fail_sends: bool,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send fails with a transport error.
    #[must_use]
    pub fn failing_sends() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    pub fn set_history(&self, channel: &str, messages: Vec<IncomingMessage>) {
        self.set_history_items(channel, messages.into_iter().map(Ok).collect());
    }

    pub fn set_history_items(&self, channel: &str, items: Vec<HistoryItem>) {
        lock(&self.channels).insert(channel.to_string(), items);
    }

    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }

    #[must_use]
    pub fn take_sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut *lock(&self.sent))
    }

    fn record(&self, message: SentMessage) -> Result<()> {
        if self.fail_sends {
            return Err(CatalogError::transport("send rejected by memory transport"));
        }
        lock(&self.sent).push(message);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn history(&self, channel: &str, limit: Option<usize>) -> Result<MessageStream> {
        let items = lock(&self.channels)
            .get(channel)
            .cloned()
            .ok_or_else(|| CatalogError::transport(format!("unknown channel {channel}")))?;
        let limit = limit.unwrap_or(usize::MAX);
        let stream = stream::iter(items)
            .take(limit)
            .map(|item| item.map_err(CatalogError::Transport));
        Ok(stream.boxed())
    }

    async fn send_file(&self, chat: ChatId, file: &FileRef, caption: &str) -> Result<()> {
        self.record(SentMessage::File {
            chat,
            file_ref: file.clone(),
            caption: caption.to_string(),
        })
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<()> {
        self.record(SentMessage::Text {
            chat,
            text: text.to_string(),
        })
    }
}
