//! JSON-lines bridge: outbound sends are written to stdout, one object per line, for whatever
//! process owns the real chat connection. Channel history comes from a dump file.

use crate::history::read_history;
use apkbot_catalog::{
    CatalogError, ChatId, FileRef, MessageStream, Result, SentMessage, Transport,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

pub struct StdioTransport<W> {
    history_path: Option<PathBuf>,
    out: Mutex<W>,
}

impl StdioTransport<tokio::io::Stdout> {
    pub fn stdout(history_path: Option<PathBuf>) -> Self {
        Self::new(history_path, tokio::io::stdout())
    }
}

impl<W> StdioTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(history_path: Option<PathBuf>, out: W) -> Self {
        Self {
            history_path,
            out: Mutex::new(out),
        }
    }

    async fn emit(&self, message: &SentMessage) -> Result<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        let mut out = self.out.lock().await;
        out.write_all(&line).await?;
        out.flush().await?;
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W> Transport for StdioTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn history(&self, channel: &str, limit: Option<usize>) -> Result<MessageStream> {
        let path = self.history_path.as_ref().ok_or_else(|| {
            CatalogError::transport(format!("no history dump configured for {channel}"))
        })?;
        // The dump is re-read on every call so a refreshed export is picked up by the next scan.
        let items = read_history(path).await?;
        let limit = limit.unwrap_or(usize::MAX);
        Ok(stream::iter(items)
            .take(limit)
            .map(|item| item.map_err(CatalogError::Transport))
            .boxed())
    }

    async fn send_file(&self, chat: ChatId, file: &FileRef, caption: &str) -> Result<()> {
        self.emit(&SentMessage::File {
            chat,
            file_ref: file.clone(),
            caption: caption.to_string(),
        })
        .await
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<()> {
        self.emit(&SentMessage::Text {
            chat,
            text: text.to_string(),
        })
        .await
    }
}
