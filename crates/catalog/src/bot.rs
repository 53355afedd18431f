//! Event handling: group chatter goes to the matcher, private slash-commands from the admin drive
//! the catalog. Each message is handled in isolation; nothing here returns an error to the event
//! loop.

use crate::config::BotConfig;
use crate::dispatch::{Action, ReplyDispatcher};
use crate::error::{CatalogError, Result};
use crate::matcher::{MatchResult, QueryMatcher};
use crate::message::{ChatKind, IncomingMessage, UserId};
use crate::scanner::{CatalogScanner, ScanReport};
use crate::service::CatalogService;
use crate::transport::Transport;
use std::sync::Arc;

/// Decides who may run privileged catalog operations. This is an identity check against the
/// transport-reported sender, not authentication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdminGate {
    admin: Option<UserId>,
}

impl AdminGate {
    #[must_use]
    pub const fn new(admin: Option<UserId>) -> Self {
        Self { admin }
    }

    #[must_use]
    pub fn allows(&self, sender: Option<UserId>) -> bool {
        matches!((self.admin, sender), (Some(admin), Some(sender)) if admin == sender)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    Rescan,
    List,
    Help,
}

impl AdminCommand {
    /// `/rescan`, `/list@SomeBot`, `/help`; anything else is not a command.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?.strip_prefix('/')?;
        let name = word.split('@').next().unwrap_or(word);
        match name.to_lowercase().as_str() {
            "rescan" | "scan" => Some(Self::Rescan),
            "list" => Some(Self::List),
            "help" | "start" => Some(Self::Help),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::Rescan | Self::List)
    }
}

const USAGE: &str = "Mention a package name in the group, or say \"download\" to see what is available.";

pub struct Bot<T: Transport> {
    config: BotConfig,
    catalog: Arc<CatalogService>,
    transport: Arc<T>,
    matcher: QueryMatcher,
    scanner: CatalogScanner,
    dispatcher: ReplyDispatcher,
    admin: AdminGate,
}

impl<T: Transport> Bot<T> {
    pub fn new(config: BotConfig, catalog: Arc<CatalogService>, transport: Arc<T>) -> Self {
        Self {
            matcher: config.matcher(),
            scanner: config.scanner(),
            dispatcher: ReplyDispatcher,
            admin: AdminGate::new(config.admin_id),
            config,
            catalog,
            transport,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<CatalogService> {
        &self.catalog
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Resolves `text` against the live catalog.
    pub async fn resolve(&self, text: &str) -> MatchResult {
        self.catalog
            .read(|catalog| self.matcher.resolve(text, catalog))
            .await
    }

    /// Handles one inbound event. Failures are logged and swallowed so the next message is
    /// processed normally.
    pub async fn handle(&self, message: &IncomingMessage) -> Action {
        let action = self.plan(message).await;
        if let Err(err) = action.execute(self.transport.as_ref()).await {
            log::warn!(
                "Reply to message {} in chat {} failed: {err}",
                message.id,
                message.chat.id
            );
        }
        action
    }

    async fn plan(&self, message: &IncomingMessage) -> Action {
        let Some(text) = message.as_text() else {
            return Action::Nothing;
        };
        let chat = message.chat.id;

        match message.chat.kind {
            ChatKind::Group => {
                let result = self.resolve(text).await;
                log::debug!("Message {} in chat {chat}: {}", message.id, result.kind());
                self.dispatcher.dispatch(&result, chat)
            }
            ChatKind::Private => match AdminCommand::parse(text) {
                Some(command) => self.run_command(command, message).await,
                None => Action::Nothing,
            },
            ChatKind::Channel => Action::Nothing,
        }
    }

    async fn run_command(&self, command: AdminCommand, message: &IncomingMessage) -> Action {
        let chat = message.chat.id;
        if command.is_privileged() && !self.admin.allows(message.sender) {
            log::info!(
                "Refused {command:?} from {:?} in chat {chat}",
                message.sender
            );
            return Action::SendText {
                chat,
                text: "This command is restricted to the bot administrator.".to_string(),
            };
        }

        let text = match command {
            AdminCommand::Help => USAGE.to_string(),
            AdminCommand::List => self.list_text().await,
            AdminCommand::Rescan => match self.rescan().await {
                Ok(report) => {
                    let mut text = format!(
                        "Scan complete: {} messages scanned, {} new packages, {} in catalog.",
                        report.scanned, report.added, report.total
                    );
                    if !report.persisted {
                        text.push_str(
                            "\nWarning: the catalog could not be saved to disk. \
                             New entries are served from memory until the next successful save.",
                        );
                    }
                    text
                }
                Err(err) => {
                    log::error!("Rescan failed: {err}");
                    format!("Scan failed: {err}")
                }
            },
        };
        Action::SendText { chat, text }
    }

    async fn list_text(&self) -> String {
        let listing = self
            .catalog
            .read(|catalog| catalog.listing(self.config.listing_limit))
            .await;
        if listing.names.is_empty() {
            return "The catalog is empty.".to_string();
        }
        let total = listing.names.len() + listing.remaining;
        let mut text = format!("{total} packages in catalog:");
        for name in &listing.names {
            text.push_str("\n• ");
            text.push_str(name);
        }
        if listing.remaining > 0 {
            text.push_str(&format!("\n…and {} more", listing.remaining));
        }
        text
    }

    /// Scans the configured source channel into the catalog.
    pub async fn rescan(&self) -> Result<ScanReport> {
        let channel = self.config.source_channel.as_deref().ok_or_else(|| {
            CatalogError::Config("no source_channel configured".to_string())
        })?;
        log::info!("Rescanning {channel}");
        let history = self
            .transport
            .history(channel, self.config.history_limit)
            .await?;
        self.scanner.scan(history, &self.catalog).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_bot_suffix() {
        assert_eq!(AdminCommand::parse("/rescan"), Some(AdminCommand::Rescan));
        assert_eq!(AdminCommand::parse("/LIST@ApkBot"), Some(AdminCommand::List));
        assert_eq!(AdminCommand::parse("/start now"), Some(AdminCommand::Help));
        assert_eq!(AdminCommand::parse("rescan"), None);
        assert_eq!(AdminCommand::parse("/unknown"), None);
        assert_eq!(AdminCommand::parse(""), None);
    }

    #[test]
    fn gate_requires_matching_sender() {
        let gate = AdminGate::new(Some(7));
        assert!(gate.allows(Some(7)));
        assert!(!gate.allows(Some(8)));
        assert!(!gate.allows(None));
        assert!(!AdminGate::default().allows(Some(7)));
    }
}
