//! Inbound message model shared by every transport.

use crate::catalog::FileRef;
use serde::{Deserialize, Serialize};

pub type ChatId = i64;
pub type UserId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Private,
    Group,
    Channel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub kind: ChatKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub file_name: Option<String>,
    pub file_ref: FileRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: String },
    Document { document: Document },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub sender: Option<UserId>,
    pub content: MessageContent,
}

impl IncomingMessage {
    pub fn text(id: i64, chat: Chat, sender: Option<UserId>, text: impl Into<String>) -> Self {
        Self {
            id,
            chat,
            sender,
            content: MessageContent::Text { text: text.into() },
        }
    }

    pub fn document(id: i64, chat: Chat, file_name: Option<&str>, file_ref: FileRef) -> Self {
        Self {
            id,
            chat,
            sender: None,
            content: MessageContent::Document {
                document: Document {
                    file_name: file_name.map(str::to_string),
                    file_ref,
                },
            },
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text { text } => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_document(&self) -> Option<&Document> {
        match &self.content {
            MessageContent::Document { document } => Some(document),
            _ => None,
        }
    }
}
