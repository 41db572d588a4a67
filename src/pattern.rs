use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;
use tracing::debug;

use crate::errors::{SearchError, SearchResult};

const SIMPLE_PATTERN_THRESHOLD: usize = 32;

static PATTERN_CACHE: Lazy<DashMap<PatternKey, MatchStrategy>> = Lazy::new(DashMap::new);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PatternKey {
    pattern: String,
    options: PatternOptions,
}

/// Options applied when compiling a pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PatternOptions {
    pub case_insensitive: bool,
    pub whole_word: bool,
}

/// Strategy for pattern matching
#[derive(Debug, Clone)]
enum MatchStrategy {
    Simple(String),
    Regex(Arc<Regex>),
}

/// A compiled search pattern with its options.
///
/// Immutable after construction. Cloning is cheap (the regex is shared
/// behind an `Arc`), and each worker clones its own copy so that no match
/// state is shared across threads.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pattern: String,
    options: PatternOptions,
    strategy: MatchStrategy,
}

impl CompiledPattern {
    /// Compiles `pattern` with the given options.
    ///
    /// Strategies are cached process-wide, so recompiling the same pattern
    /// is a map lookup.
    pub fn new(pattern: &str, options: PatternOptions) -> SearchResult<Self> {
        if pattern.is_empty() {
            return Err(SearchError::invalid_argument(
                "search pattern must not be empty",
            ));
        }

        let key = PatternKey {
            pattern: pattern.to_string(),
            options,
        };
        let strategy = match PATTERN_CACHE.get(&key) {
            Some(entry) => {
                debug!("pattern cache hit for '{}'", pattern);
                entry.clone()
            }
            None => {
                let strategy = Self::build_strategy(pattern, options)?;
                PATTERN_CACHE.insert(key, strategy.clone());
                strategy
            }
        };

        Ok(Self {
            pattern: pattern.to_string(),
            options,
            strategy,
        })
    }

    fn build_strategy(pattern: &str, options: PatternOptions) -> SearchResult<MatchStrategy> {
        if Self::is_simple_pattern(pattern, options) {
            debug!("pattern '{}' uses literal matching", pattern);
            return Ok(MatchStrategy::Simple(pattern.to_string()));
        }

        let source = if options.whole_word {
            format!(r"\b(?:{})\b", pattern)
        } else {
            pattern.to_string()
        };
        let regex = RegexBuilder::new(&source)
            .case_insensitive(options.case_insensitive)
            .build()?;
        Ok(MatchStrategy::Regex(Arc::new(regex)))
    }

    /// Gets the pattern source text.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn options(&self) -> PatternOptions {
        self.options
    }

    /// Determines if a pattern can use simple string matching
    fn is_simple_pattern(pattern: &str, options: PatternOptions) -> bool {
        !options.case_insensitive
            && !options.whole_word
            && pattern.len() < SIMPLE_PATTERN_THRESHOLD
            && !pattern.contains(|c: char| c.is_ascii_punctuation() && c != '_' && c != '-')
    }

    /// Finds all matches in `line`, returned as byte ranges in
    /// left-to-right order.
    pub fn find_matches(&self, line: &str) -> Vec<(usize, usize)> {
        match &self.strategy {
            MatchStrategy::Simple(pattern) => line
                .match_indices(pattern.as_str())
                .map(|(start, matched)| (start, start + matched.len()))
                .collect(),
            MatchStrategy::Regex(regex) => regex
                .find_iter(line)
                .map(|m| (m.start(), m.end()))
                .collect(),
        }
    }
}
