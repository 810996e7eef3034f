//! Name detection over OCR text.
//!
//! With a roster configured, only roster names are recognized (closed
//! vocabulary). Each roster entry gets an ordered pattern list:
//! - exact name
//! - name words with anything between them
//! - the same with OCR look-alike characters folded together (i/l/1, o/0, ...)
//! - user-supplied aliases
//!
//! Without a roster, every nickname line is cleaned and taken as a name.

use regex::{Regex, RegexBuilder};

use super::tokens::{name_key, CandidateName, PointRange, RawToken};
use crate::config::RosterEntry;
use crate::error::ExtractError;
use crate::log_debug;

/// Characters replaced by spaces before matching.
const PUNCTUATION: &str = r"[^\w\s]";

/// Roster entry with its compiled patterns.
struct NamePatterns {
    name: String,
    range: Option<PointRange>,
    expected: Option<u32>,
    patterns: Vec<Regex>,
}

pub struct NameDetector {
    entries: Vec<NamePatterns>,
    cleaner: NicknameCleaner,
    punctuation: Regex,
}

impl NameDetector {
    pub fn new(roster: &[RosterEntry], cleaner: NicknameCleaner) -> Result<Self, ExtractError> {
        let punctuation = Regex::new(PUNCTUATION).map_err(|source| ExtractError::InvalidPattern {
            name: "punctuation".to_string(),
            pattern: PUNCTUATION.to_string(),
            source,
        })?;
        let entries = roster
            .iter()
            .map(|entry| compile_entry(entry, &punctuation))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            entries,
            cleaner,
            punctuation,
        })
    }

    /// True when no roster is configured and any cleaned nickname counts.
    pub fn is_open(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the names present in `tokens`, each once.
    ///
    /// Roster names come back in roster order; open-vocabulary nicknames in
    /// token order.
    pub fn detect(&self, tokens: &[RawToken]) -> Vec<CandidateName> {
        if self.is_open() {
            return self.detect_open(tokens);
        }

        let normalized: Vec<String> = tokens.iter().map(|t| self.normalize(&t.text)).collect();
        let joined = normalized.join(" ");
        let mut found = Vec::new();

        for entry in &self.entries {
            let hit = tokens
                .iter()
                .zip(&normalized)
                .find_map(|(token, text)| entry.first_match(text).map(|idx| (idx, token.position)))
                .or_else(|| entry.first_match(&joined).map(|idx| (idx, None)));

            if let Some((pattern_idx, position)) = hit {
                log_debug(&format!(
                    "Found player: {} (pattern: {})",
                    entry.name,
                    entry.patterns[pattern_idx].as_str()
                ));
                found.push(CandidateName {
                    name: entry.name.clone(),
                    position,
                    range: entry.range,
                    expected: entry.expected,
                });
            }
        }

        found
    }

    fn detect_open(&self, tokens: &[RawToken]) -> Vec<CandidateName> {
        let mut found: Vec<CandidateName> = Vec::new();
        for token in tokens {
            let Some(name) = self.cleaner.clean(&token.text) else {
                continue;
            };
            let key = name_key(&name);
            if found.iter().any(|c| name_key(&c.name) == key) {
                continue;
            }
            found.push(CandidateName::unlisted(name, token.position));
        }
        found
    }

    fn normalize(&self, text: &str) -> String {
        normalize(&self.punctuation, text)
    }
}

impl NamePatterns {
    fn first_match(&self, text: &str) -> Option<usize> {
        self.patterns.iter().position(|re| re.is_match(text))
    }
}

/// Lower-cases, replaces punctuation with spaces and collapses the spaces on
/// each line. Roster names and OCR text both go through this.
fn normalize(punctuation: &Regex, text: &str) -> String {
    let replaced = punctuation.replace_all(&text.to_lowercase(), " ").into_owned();
    replaced
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

fn compile_entry(entry: &RosterEntry, punctuation: &Regex) -> Result<NamePatterns, ExtractError> {
    let normalized = normalize(punctuation, &entry.name);
    // A name made only of punctuation keeps its raw form
    let base = if normalized.is_empty() {
        entry.name.to_lowercase()
    } else {
        normalized
    };
    let mut sources = name_patterns(&base);
    sources.extend(entry.aliases.iter().cloned());

    let patterns = sources
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map_err(|source| ExtractError::InvalidPattern {
                    name: entry.name.clone(),
                    pattern: p.clone(),
                    source,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NamePatterns {
        name: entry.name.clone(),
        range: entry.range,
        expected: entry.expected,
        patterns,
    })
}

/// Builds the generated pattern sources for a name, most specific first.
fn name_patterns(name: &str) -> Vec<String> {
    let lower = name.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    let mut sources = vec![regex::escape(&words.join(" "))];
    let separated = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join(".*?");
    let confused = words
        .iter()
        .map(|w| fold_lookalikes(w))
        .collect::<Vec<_>>()
        .join(".*?");

    for pattern in [separated, confused] {
        if !sources.contains(&pattern) {
            sources.push(pattern);
        }
    }
    sources
}

/// Replaces characters OCR commonly confuses with a class of all of them.
fn fold_lookalikes(word: &str) -> String {
    word.chars()
        .map(|c| match c {
            'i' | 'l' | '1' => "[il1]".to_string(),
            'o' | '0' => "[o0]".to_string(),
            'e' | '3' => "[e3]".to_string(),
            's' | '5' => "[s5]".to_string(),
            'a' | '4' => "[a4]".to_string(),
            'b' | '8' => "[b8]".to_string(),
            other => regex::escape(&other.to_string()),
        })
        .collect()
}

/// Turns a raw nickname line into a display name, or rejects it.
pub struct NicknameCleaner {
    min_length: usize,
    max_words: usize,
    disallowed: Regex,
    clan_tag: Regex,
    leading_digits: Regex,
    trailing_digits: Regex,
}

impl NicknameCleaner {
    pub fn new(min_length: usize, max_words: usize) -> anyhow::Result<Self> {
        Ok(Self {
            min_length,
            max_words: max_words.max(1),
            disallowed: Regex::new(r"[^\w\s\[\]{}()_-]")?,
            clan_tag: Regex::new(r"\[K?\d+\]")?,
            leading_digits: Regex::new(r"^\d+\s*")?,
            trailing_digits: Regex::new(r"\s*\d+$")?,
        })
    }

    /// Cleans one OCR line.
    ///
    /// Text after a clan tag like `[K178]` is preferred. Otherwise stray
    /// leading/trailing digits are dropped and the rest must be long enough
    /// and contain a letter. At most `max_words` words are kept.
    pub fn clean(&self, raw: &str) -> Option<String> {
        let replaced = self.disallowed.replace_all(raw, " ");
        let cleaned = replaced.split_whitespace().collect::<Vec<_>>().join(" ");

        if let Some(tag) = self.clan_tag.find(&cleaned) {
            let after_tag = cleaned[tag.end()..].trim();
            if after_tag.is_empty() {
                return None;
            }
            return Some(self.first_words(after_tag));
        }

        let cleaned = self.leading_digits.replace(&cleaned, "");
        let cleaned = self.trailing_digits.replace(&cleaned, "");

        if cleaned.chars().count() >= self.min_length
            && cleaned.chars().any(|c| c.is_ascii_alphabetic())
        {
            return Some(self.first_words(&cleaned));
        }
        None
    }

    fn first_words(&self, text: &str) -> String {
        text.split_whitespace()
            .take(self.max_words)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, aliases: &[&str]) -> RosterEntry {
        RosterEntry {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            range: None,
            expected: None,
            known_totals: Vec::new(),
        }
    }

    fn detector(roster: &[RosterEntry]) -> NameDetector {
        NameDetector::new(roster, NicknameCleaner::new(2, 3).unwrap()).unwrap()
    }

    fn names(found: &[CandidateName]) -> Vec<&str> {
        found.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_name_patterns_order() {
        let patterns = name_patterns("Spider Friend");
        assert_eq!(patterns[0], "spider friend");
        assert_eq!(patterns[1], "spider.*?friend");
        assert_eq!(patterns[2], "[s5]p[il1]d[e3]r.*?fr[il1][e3]nd");
    }

    #[test]
    fn test_single_word_name_skips_duplicate_pattern() {
        let patterns = name_patterns("Akshat");
        assert_eq!(patterns, vec!["akshat".to_string(), "[a4]k[s5]h[a4]t".to_string()]);
    }

    #[test]
    fn test_detect_exact_and_separated() {
        let roster = [entry("Spider Friend", &[]), entry("Violent Violet", &[])];
        let tokens = [RawToken::new("SPIDER FRIEND\nViolent--Violet 204,205")];

        let found = detector(&roster).detect(&tokens);
        assert_eq!(names(&found), vec!["Spider Friend", "Violent Violet"]);
    }

    #[test]
    fn test_detect_lookalike_characters() {
        let roster = [entry("Violent Violet", &[]), entry("Finde", &[])];
        let tokens = [RawToken::new("v1olent vlol3t 204205\nF1nde 190960")];

        let found = detector(&roster).detect(&tokens);
        assert_eq!(names(&found), vec!["Violent Violet", "Finde"]);
    }

    #[test]
    fn test_detect_alias() {
        let roster = [entry("Akshat", &[r"aks[hl]at", r"ax[ks]hat"])];
        let found = detector(&roster).detect(&[RawToken::new("axkhat 196,570")]);
        assert_eq!(names(&found), vec!["Akshat"]);
    }

    #[test]
    fn test_detect_closed_vocabulary_only() {
        let roster = [entry("Finde", &[])];
        let found = detector(&roster).detect(&[RawToken::new("Someone Else 42")]);
        assert!(found.is_empty());
    }

    #[test]
    fn test_detect_keeps_token_position() {
        let roster = [entry("Akshat", &[])];
        let tokens = [RawToken::at("[K178] Finde", 0, 40), RawToken::at("Akshat", 1, 1720)];

        let found = detector(&roster).detect(&tokens);
        assert_eq!(found[0].position.map(|p| p.chunk), Some(1));
    }

    #[test]
    fn test_detect_name_split_across_tokens() {
        let roster = [entry("Spider Friend", &[])];
        let tokens = [RawToken::at("Spider", 0, 10), RawToken::at("Friend", 0, 50)];

        let found = detector(&roster).detect(&tokens);
        assert_eq!(names(&found), vec!["Spider Friend"]);
        assert_eq!(found[0].position, None);
    }

    #[test]
    fn test_detect_name_with_punctuation() {
        let roster = [entry("Mr. Bean", &[]), entry("O'Neil", &[])];
        let tokens = [RawToken::new("Mr. Bean 215,600 points\nO'Neil 204,205")];

        let found = detector(&roster).detect(&tokens);
        assert_eq!(names(&found), vec!["Mr. Bean", "O'Neil"]);
    }

    #[test]
    fn test_punctuation_in_name_matches_spaced_ocr() {
        let roster = [entry("x.Spider", &[])];
        let found = detector(&roster).detect(&[RawToken::new("x Spider 190,960")]);
        assert_eq!(names(&found), vec!["x.Spider"]);
    }

    #[test]
    fn test_invalid_alias_is_reported() {
        let roster = [entry("Finde", &["f(nde"])];
        let result = NameDetector::new(&roster, NicknameCleaner::new(2, 3).unwrap());
        assert!(matches!(result, Err(ExtractError::InvalidPattern { .. })));
    }

    #[test]
    fn test_clean_nickname() {
        let cleaner = NicknameCleaner::new(2, 3).unwrap();
        assert_eq!(cleaner.clean("[K178] Spider Friend"), Some("Spider Friend".to_string()));
        assert_eq!(cleaner.clean("12 Akshat 3"), Some("Akshat".to_string()));
        assert_eq!(
            cleaner.clean("one two three four"),
            Some("one two three".to_string())
        );
        assert_eq!(cleaner.clean("@@ Finde!!"), Some("Finde".to_string()));
        assert_eq!(cleaner.clean("12345"), None);
        assert_eq!(cleaner.clean("x"), None);
        assert_eq!(cleaner.clean("[K178]"), None);
    }

    #[test]
    fn test_detect_open_vocabulary_dedups() {
        let found = detector(&[]).detect(&[
            RawToken::at("[K1] Spider Friend", 0, 0),
            RawToken::at("spider friend", 1, 1680),
            RawToken::at("777", 1, 1700),
        ]);
        assert_eq!(names(&found), vec!["Spider Friend"]);
    }
}
