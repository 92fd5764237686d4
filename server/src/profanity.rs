//! Profanity filtering for chat messages.

use std::collections::HashSet;

const DEFAULT_WORDS: &[&str] = &[
    "arse", "ass", "asshole", "bastard", "bitch", "bollocks", "bullshit", "cock", "crap", "cunt",
    "damn", "dick", "dickhead", "fuck", "fucker", "fucking", "motherfucker", "piss", "prick",
    "shit", "slut", "twat", "wanker", "whore",
];

/// Predicate consulted before a chat message is broadcast
pub trait ProfanityFilter: Send + Sync {
    fn is_profane(&self, text: &str) -> bool;
}

/// Case-insensitive whole-word matcher over a fixed word list
///
/// Text is split on anything that is not alphanumeric or an apostrophe, so
/// "Sh*t" does not match while "SHIT!" does. Substrings inside longer words
/// ("classic", "scrap") never match.
#[derive(Debug, Clone)]
pub struct WordListFilter {
    words: HashSet<String>,
}

impl WordListFilter {
    pub fn new() -> Self {
        Self::from_words(DEFAULT_WORDS.iter().copied())
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self {
            words: HashSet::new(),
        };
        filter.extend(words);
        filter
    }

    /// Adds words on top of the current list; blank entries are ignored
    pub fn extend<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.words.extend(
            words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty()),
        );
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for WordListFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfanityFilter for WordListFilter {
    fn is_profane(&self, text: &str) -> bool {
        text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|token| !token.is_empty())
            .any(|token| self.words.contains(&token.to_lowercase()))
    }
}
