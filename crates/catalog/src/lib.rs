//! # apkbot catalog
//!
//! Indexes package uploads from a source channel and answers chat messages with the matching
//! file.
//!
//! ## Pipeline
//!
//! ```text
//! Channel history
//!     │
//!     ├──> Scanner (package attachments only)
//!     │      └─> KeyNormalizer: file name -> key + match terms
//!     │
//!     └──> CatalogService (ordered, append-only) ──> CatalogStore (catalog.json)
//!
//! Group message
//!     │
//!     ├──> QueryMatcher (trigger phrase? terms : key)
//!     │      └─> MatchResult
//!     │
//!     └──> ReplyDispatcher ──> Action ──> Transport
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use apkbot_catalog::{CatalogService, CatalogStore, QueryMatcher};
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = CatalogService::open(CatalogStore::new("catalog.json")).await;
//!     let matcher = QueryMatcher::default();
//!     let result = service
//!         .read(|catalog| matcher.resolve("download beta", catalog))
//!         .await;
//!     println!("{}", result.kind());
//! }
//! ```

mod bot;
mod catalog;
mod config;
mod dispatch;
mod error;
mod matcher;
mod memory;
mod message;
mod normalize;
mod scanner;
mod service;
mod store;
mod transport;

pub use bot::{AdminCommand, AdminGate, Bot};
pub use catalog::{Catalog, CatalogEntry, FileRef, Listing};
pub use config::{
    BotConfig, ENV_ADMIN_ID, ENV_CATALOG_PATH, ENV_SOURCE_CHANNEL, ENV_TRIGGERS,
};
pub use dispatch::{help_text, Action, ReplyDispatcher};
pub use error::{CatalogError, Result};
pub use matcher::{
    MatchResult, QueryMatcher, TieBreak, TriggerSet, DEFAULT_LISTING_LIMIT, DEFAULT_TRIGGERS,
};
pub use memory::{HistoryItem, MemoryTransport, SentMessage};
pub use message::{Chat, ChatId, ChatKind, Document, IncomingMessage, MessageContent, UserId};
pub use normalize::{
    match_terms, KeyNormalizer, NormalizedName, DEFAULT_PACKAGE_EXTENSION, MIN_TERM_CHARS,
};
pub use scanner::{CatalogScanner, ScanOptions, ScanReport};
pub use service::CatalogService;
pub use store::{CatalogStore, LoadedCatalog, DEFAULT_CATALOG_FILE_NAME};
pub use transport::{MessageStream, Transport};
