use crate::catalog::{FileRef, Listing};
use crate::error::Result;
use crate::matcher::MatchResult;
use crate::message::ChatId;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};

/// Outbound effect of handling one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    SendFile {
        chat: ChatId,
        file_ref: FileRef,
        caption: String,
    },
    SendText {
        chat: ChatId,
        text: String,
    },
    Nothing,
}

impl Action {
    /// Hands the action to the transport; `Nothing` never touches it.
    pub async fn execute<T: Transport + ?Sized>(&self, transport: &T) -> Result<()> {
        match self {
            Self::SendFile {
                chat,
                file_ref,
                caption,
            } => transport.send_file(*chat, file_ref, caption).await,
            Self::SendText { chat, text } => transport.send_text(*chat, text).await,
            Self::Nothing => Ok(()),
        }
    }
}

/// Maps a match outcome to a reply. Pure: storage and network stay with the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplyDispatcher;

impl ReplyDispatcher {
    #[must_use]
    pub fn dispatch(&self, result: &MatchResult, chat: ChatId) -> Action {
        match result {
            MatchResult::Found(entry) => Action::SendFile {
                chat,
                file_ref: entry.file_ref.clone(),
                caption: format!("📦 {}", entry.original_name),
            },
            MatchResult::Ambiguous {
                candidates,
                remaining,
            } => {
                let names: Vec<&str> = candidates
                    .iter()
                    .map(|entry| entry.original_name.as_str())
                    .collect();
                let mut text = format!(
                    "Several packages match, please be more specific:\n{}",
                    bullet_list(&names)
                );
                push_remaining(&mut text, *remaining);
                Action::SendText { chat, text }
            }
            MatchResult::TriggeredNoMatch(listing) => Action::SendText {
                chat,
                text: help_text(listing),
            },
            MatchResult::NoMatch => Action::Nothing,
        }
    }
}

#[must_use]
pub fn help_text(listing: &Listing) -> String {
    if listing.names.is_empty() {
        return "No packages are available yet.".to_string();
    }
    let names: Vec<&str> = listing.names.iter().map(String::as_str).collect();
    let mut text = format!(
        "Which package do you need? Mention its name. Available:\n{}",
        bullet_list(&names)
    );
    push_remaining(&mut text, listing.remaining);
    text
}

fn push_remaining(text: &mut String, remaining: usize) {
    if remaining > 0 {
        text.push_str(&format!("\n…and {remaining} more"));
    }
}

fn bullet_list(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| format!("• {name}"))
        .collect::<Vec<_>>()
        .join("\n")
}
