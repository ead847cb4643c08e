use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::speller::SpellChecker;
use crate::core::errors::SpellCheckError;
use crate::models::SpellingError;

const SUPPORTED_LANGUAGES: [&str; 3] = ["ru", "en", "uk"];

/// One entry of the `checkText` answer
#[derive(Debug, Clone, Deserialize)]
struct CheckedWord {
    word: String,
    /// Character offset of `word` in the checked text
    pos: usize,
    len: usize,
    #[serde(default)]
    s: Vec<String>,
}

/// Client for the Yandex Speller JSON service
pub struct YandexSpeller {
    client: reqwest::Client,
    endpoint: String,
}

impl YandexSpeller {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SpellCheckError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    async fn check_text(&self, text: &str, lang: &str) -> Result<Vec<CheckedWord>, SpellCheckError> {
        if !SUPPORTED_LANGUAGES.contains(&lang) {
            return Err(SpellCheckError::UnsupportedLanguage(lang.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/checkText", self.endpoint))
            .query(&[("text", text), ("lang", lang)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpellCheckError::BadStatus(status.as_u16()));
        }

        let words: Vec<CheckedWord> = response.json().await?;
        debug!(lang, count = words.len(), "Speller answered");
        Ok(words)
    }
}

#[async_trait]
impl SpellChecker for YandexSpeller {
    #[instrument(skip(self), level = "debug")]
    async fn spelled(&self, text: &str, lang: &str) -> Result<String, SpellCheckError> {
        let words = self.check_text(text, lang).await?;
        Ok(apply_suggestions(text, words))
    }

    #[instrument(skip(self), level = "debug")]
    async fn spell(&self, text: &str, lang: &str) -> Result<Vec<SpellingError>, SpellCheckError> {
        let words = self.check_text(text, lang).await?;
        Ok(words
            .into_iter()
            .map(|w| SpellingError {
                word: w.word,
                suggestions: w.s,
            })
            .collect())
    }
}

/// Replace each reported word with its first suggestion.
///
/// Edits run from the end of the text backwards so earlier offsets stay valid.
/// When the reported offset does not hold the reported word, the first
/// occurrence of the word is replaced instead.
fn apply_suggestions(text: &str, mut words: Vec<CheckedWord>) -> String {
    words.sort_by(|a, b| b.pos.cmp(&a.pos));

    let mut corrected = text.to_string();
    for word in words {
        let Some(suggestion) = word.s.first() else {
            continue;
        };

        match byte_range(&corrected, word.pos, word.len) {
            Some(range) if corrected[range.clone()] == word.word => {
                corrected.replace_range(range, suggestion);
            }
            _ => corrected = corrected.replacen(&word.word, suggestion, 1),
        }
    }
    corrected
}

/// Byte range of `len` characters starting at character `pos`
fn byte_range(text: &str, pos: usize, len: usize) -> Option<std::ops::Range<usize>> {
    let mut offsets = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len()));
    let start = offsets.nth(pos)?;
    let end = if len == 0 { start } else { offsets.nth(len - 1)? };
    Some(start..end)
}
