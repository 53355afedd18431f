//! Resolves free text from a chat against the catalog.
//!
//! Matching is plain substring containment on lowercased text. Short keys can therefore match
//! inside unrelated words; that is accepted behavior, not something to tokenize away.

use crate::catalog::{Catalog, CatalogEntry, Listing};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TRIGGERS: &[&str] = &["download", "下载", "send file", "get apk"];
pub const DEFAULT_LISTING_LIMIT: usize = 10;

/// Case-insensitive phrases that mark a message as a generic "send me a file" request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSet {
    phrases: Vec<String>,
}

impl Default for TriggerSet {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGERS.iter().copied())
    }
}

impl TriggerSet {
    /// Blank phrases are dropped; they would trigger on every message.
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for phrase in phrases {
            let phrase = phrase.as_ref().trim().to_lowercase();
            if !phrase.is_empty() && !out.contains(&phrase) {
                out.push(phrase);
            }
        }
        Self { phrases: out }
    }

    /// `text` must already be lowercased.
    #[must_use]
    pub fn is_triggered(&self, text: &str) -> bool {
        self.phrases.iter().any(|phrase| text.contains(phrase.as_str()))
    }

    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.phrases.iter().map(String::as_str)
    }
}

/// What to do when more than one entry matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Earliest catalogued entry wins.
    #[default]
    FirstInserted,
    /// Entry with the longest contained term wins; equal lengths fall back to catalog order.
    LongestTerm,
    /// Several hits are returned as `MatchResult::Ambiguous`.
    Disambiguate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Found(CatalogEntry),
    /// Several entries matched; at most `listing_limit` of them are carried.
    Ambiguous {
        candidates: Vec<CatalogEntry>,
        /// Matching entries left out because of the limit.
        remaining: usize,
    },
    /// A trigger phrase was present but no entry matched; carries names to offer instead.
    TriggeredNoMatch(Listing),
    NoMatch,
}

impl MatchResult {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::Ambiguous { .. } => "ambiguous",
            Self::TriggeredNoMatch(_) => "triggered_no_match",
            Self::NoMatch => "no_match",
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryMatcher {
    triggers: TriggerSet,
    tie_break: TieBreak,
    listing_limit: usize,
}

impl Default for QueryMatcher {
    fn default() -> Self {
        Self::new(TriggerSet::default(), TieBreak::default(), DEFAULT_LISTING_LIMIT)
    }
}

impl QueryMatcher {
    #[must_use]
    pub fn new(triggers: TriggerSet, tie_break: TieBreak, listing_limit: usize) -> Self {
        Self {
            triggers,
            tie_break,
            listing_limit,
        }
    }

    #[must_use]
    pub fn triggers(&self) -> &TriggerSet {
        &self.triggers
    }

    #[must_use]
    pub fn resolve(&self, text: &str, catalog: &Catalog) -> MatchResult {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return MatchResult::NoMatch;
        }

        let triggered = self.triggers.is_triggered(&text);
        // (entry, length of the longest term it matched on)
        let candidates: Vec<(&CatalogEntry, usize)> = catalog
            .iter()
            .filter_map(|entry| {
                let hit = if triggered {
                    entry
                        .match_terms
                        .iter()
                        .filter(|term| text.contains(term.as_str()))
                        .map(|term| term.chars().count())
                        .max()
                } else {
                    text.contains(entry.key.as_str())
                        .then(|| entry.key.chars().count())
                };
                hit.map(|len| (entry, len))
            })
            .collect();

        if candidates.is_empty() {
            return if triggered {
                MatchResult::TriggeredNoMatch(catalog.listing(self.listing_limit))
            } else {
                MatchResult::NoMatch
            };
        }

        match self.tie_break {
            TieBreak::FirstInserted => MatchResult::Found(candidates[0].0.clone()),
            TieBreak::LongestTerm => {
                let mut best = candidates[0];
                for candidate in &candidates[1..] {
                    if candidate.1 > best.1 {
                        best = *candidate;
                    }
                }
                MatchResult::Found(best.0.clone())
            }
            TieBreak::Disambiguate if candidates.len() == 1 => {
                MatchResult::Found(candidates[0].0.clone())
            }
            TieBreak::Disambiguate => {
                let remaining = candidates.len().saturating_sub(self.listing_limit);
                MatchResult::Ambiguous {
                    candidates: candidates
                        .into_iter()
                        .take(self.listing_limit)
                        .map(|(entry, _)| entry.clone())
                        .collect(),
                    remaining,
                }
            }
        }
    }
}
