use crate::catalog::FileRef;
use crate::error::Result;
use crate::message::{ChatId, IncomingMessage};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lazy channel history. Items are delivered in whatever order the transport uses; an `Err`
/// item aborts the scan that consumes it.
pub type MessageStream = BoxStream<'static, Result<IncomingMessage>>;

/// The chat network the bot talks to. Delivery, sessions and rate limits live behind this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Historical messages of `channel`, at most `limit` of them when set.
    async fn history(&self, channel: &str, limit: Option<usize>) -> Result<MessageStream>;

    /// Re-send a previously uploaded file by its stored reference.
    async fn send_file(&self, chat: ChatId, file: &FileRef, caption: &str) -> Result<()>;

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<()>;
}
