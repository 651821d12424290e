use regex::{Regex, RegexBuilder};
use std::path::Path;

/// Words flagged when no word-list file is configured.
pub const DEFAULT_WORDS: &[&str] = &["badword"];

/// WordFilter
///
/// Flags comment text that contains a listed word as a whole, case-insensitive token.
/// Built once at startup and shared read-only through `AppState`. A filter with no
/// words never flags anything.
#[derive(Debug, Clone, Default)]
pub struct WordFilter {
    pattern: Option<Regex>,
    word_count: usize,
}

impl WordFilter {
    /// Compiles the word list into a single pattern that matches a listed word only when
    /// it is bounded by a non-word character or the text edge. Unlike `\b`, this also
    /// holds for words that begin or end with a symbol, such as `a$$`. Blank entries
    /// are ignored. If the pattern cannot be built the filter degrades to never flagging.
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let escaped: Vec<String> = words
            .into_iter()
            .map(|word| word.as_ref().trim().to_lowercase())
            .filter(|word| !word.is_empty())
            .map(|word| regex::escape(&word))
            .collect();

        if escaped.is_empty() {
            return Self::default();
        }

        let source = format!(r"(?:^|[^\w])(?:{})(?:[^\w]|$)", escaped.join("|"));
        match RegexBuilder::new(&source).case_insensitive(true).build() {
            Ok(pattern) => Self {
                pattern: Some(pattern),
                word_count: escaped.len(),
            },
            Err(e) => {
                tracing::warn!("moderation pattern failed to compile, filter disabled: {}", e);
                Self::default()
            }
        }
    }

    /// The filter used when nothing is configured.
    pub fn with_default_words() -> Self {
        Self::new(DEFAULT_WORDS.iter().copied())
    }

    /// Loads the filter from configuration: the built-in list when `path` is `None`,
    /// otherwise the file's words. An unreadable file yields an empty filter.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::with_default_words();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let filter = Self::new(parse_word_list(&contents));
                tracing::info!(
                    "loaded {} moderation words from {}",
                    filter.word_count,
                    path.display()
                );
                filter
            }
            Err(e) => {
                tracing::warn!(
                    "moderation word list {} unreadable, comments will not be flagged: {}",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn is_inappropriate(&self, text: &str) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(text))
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
    }

    pub fn len(&self) -> usize {
        self.word_count
    }
}

/// One word per line; blank lines and `#` comments are skipped.
pub fn parse_word_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
