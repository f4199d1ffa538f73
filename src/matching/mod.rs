pub mod similarity;

use std::collections::BTreeMap;

use crate::catalog::{FontCatalog, FontEntry};
use crate::ocr::ExtractionResult;

pub const MAX_MATCHES: usize = 5;
pub const DEFAULT_SIMILARITY_CUTOFF: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStrategy {
    /// A font matches when a token occurs inside its name. Falls back to the
    /// head of the catalog when nothing matches.
    Substring,
    /// Similarity ranked, may legitimately come back empty.
    #[default]
    Approximate,
}

impl MatchStrategy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "substring" | "contains" => Some(Self::Substring),
            "approximate" | "fuzzy" => Some(Self::Approximate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Substring => "substring",
            MatchStrategy::Approximate => "approximate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchConfig {
    pub strategy: MatchStrategy,
    pub cutoff: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            strategy: MatchStrategy::default(),
            cutoff: DEFAULT_SIMILARITY_CUTOFF,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FontMatches {
    /// Overall candidates, best first, at most [`MAX_MATCHES`].
    pub ranked: Vec<FontEntry>,
    /// Candidates per extracted token. Every token has a key.
    pub by_word: BTreeMap<String, Vec<FontEntry>>,
}

pub fn match_fonts(
    extraction: &ExtractionResult,
    catalog: &FontCatalog,
    config: &MatchConfig,
) -> FontMatches {
    if extraction.is_empty() {
        return FontMatches::default();
    }
    match config.strategy {
        MatchStrategy::Substring => substring_matches(extraction, catalog),
        MatchStrategy::Approximate => approximate_matches(extraction, catalog, config.cutoff),
    }
}

fn substring_matches(extraction: &ExtractionResult, catalog: &FontCatalog) -> FontMatches {
    let lowered: Vec<String> = catalog
        .entries()
        .iter()
        .map(|entry| entry.name.to_lowercase())
        .collect();
    let containing = |needle: &str| -> Vec<FontEntry> {
        catalog
            .entries()
            .iter()
            .zip(&lowered)
            .filter(|(_, name)| name.contains(needle))
            .map(|(entry, _)| entry.clone())
            .take(MAX_MATCHES)
            .collect()
    };

    let needles: Vec<String> = extraction
        .tokens
        .iter()
        .map(|token| token.to_lowercase())
        .collect();
    let by_word = extraction
        .tokens
        .iter()
        .zip(&needles)
        .map(|(token, needle)| (token.clone(), containing(needle)))
        .collect();

    let mut ranked: Vec<FontEntry> = catalog
        .entries()
        .iter()
        .zip(&lowered)
        .filter(|(_, name)| needles.iter().any(|needle| name.contains(needle.as_str())))
        .map(|(entry, _)| entry.clone())
        .take(MAX_MATCHES)
        .collect();
    if ranked.is_empty() {
        ranked = catalog.head(MAX_MATCHES);
    }

    FontMatches { ranked, by_word }
}

fn approximate_matches(
    extraction: &ExtractionResult,
    catalog: &FontCatalog,
    cutoff: f64,
) -> FontMatches {
    let names: Vec<&str> = catalog
        .entries()
        .iter()
        .map(|entry| entry.name.as_str())
        .collect();
    let closest = |word: &str| -> Vec<FontEntry> {
        similarity::close_matches(word, &names, MAX_MATCHES, cutoff)
            .into_iter()
            .map(|(idx, _)| catalog.entries()[idx].clone())
            .collect()
    };

    let ranked = closest(&extraction.sanitized_text);
    let by_word = extraction
        .tokens
        .iter()
        .map(|token| (token.clone(), closest(token)))
        .collect();

    FontMatches { ranked, by_word }
}
