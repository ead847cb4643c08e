use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::language::classify;
use crate::core::errors::SpellCheckError;
use crate::models::{Language, SpellingError, TextSample};

/// Spell-checking service for one or more languages
#[async_trait]
pub trait SpellChecker: Send + Sync {
    /// Return `text` with every reported error replaced by its first suggestion
    async fn spelled(&self, text: &str, lang: &str) -> Result<String, SpellCheckError>;

    /// Report the errors in `text` without changing it
    async fn spell(&self, text: &str, lang: &str) -> Result<Vec<SpellingError>, SpellCheckError>;
}

/// Routes spans (or the words of mixed spans) to the checker for their script.
///
/// Failures never leave the router: the affected span or word is kept as it
/// was and the error is logged.
pub struct SpellRouter {
    checkers: HashMap<Language, Arc<dyn SpellChecker>>,
    timeout: Duration,
}

impl SpellRouter {
    pub fn new(
        cyrillic: Arc<dyn SpellChecker>,
        latin: Arc<dyn SpellChecker>,
        timeout: Duration,
    ) -> Self {
        let checkers = HashMap::from([(Language::Cyrillic, cyrillic), (Language::Latin, latin)]);
        Self { checkers, timeout }
    }

    /// Use one multi-language checker for both scripts
    pub fn shared(checker: Arc<dyn SpellChecker>, timeout: Duration) -> Self {
        Self::new(checker.clone(), checker, timeout)
    }

    pub async fn check_and_correct(&self, text: &str) -> String {
        if text.trim().is_empty() {
            warn!("Empty text passed to spell checker");
            return text.to_string();
        }

        let language = classify(text);
        let corrected = match language {
            Language::Cyrillic | Language::Latin => self.correct_span(text, language).await,
            Language::Mixed => self.correct_words(text).await,
            Language::Unknown => text.to_string(),
        };

        info!(%language, original = text, corrected = %corrected, "Text checked");
        corrected
    }

    pub async fn list_errors(&self, text: &str) -> Vec<SpellingError> {
        match classify(text) {
            language @ (Language::Cyrillic | Language::Latin) => {
                self.errors_in_span(text, language).await
            }
            Language::Mixed => {
                let reports = join_all(text.split_whitespace().map(|word| async move {
                    match classify(word) {
                        language @ (Language::Cyrillic | Language::Latin) => {
                            self.errors_in_span(word, language).await
                        }
                        _ => Vec::new(),
                    }
                }))
                .await;
                reports.into_iter().flatten().collect()
            }
            Language::Unknown => Vec::new(),
        }
    }

    /// Correct one OCR span into a [`TextSample`]
    pub async fn correct_sample(&self, text: &str) -> TextSample {
        TextSample {
            id: Uuid::new_v4(),
            original: text.to_string(),
            corrected: self.check_and_correct(text).await,
            language: classify(text),
        }
    }

    async fn correct_span(&self, text: &str, language: Language) -> String {
        match self.call_spelled(text, language).await {
            Ok(corrected) => corrected,
            Err(err) => {
                warn!(%language, text, error = %err, "Spell correction failed, keeping original");
                text.to_string()
            }
        }
    }

    /// Correct each word with the checker for its own script and rejoin with
    /// single spaces; words in neither script pass through.
    async fn correct_words(&self, text: &str) -> String {
        let words = join_all(text.split_whitespace().map(|word| async move {
            match classify(word) {
                language @ (Language::Cyrillic | Language::Latin) => {
                    self.correct_span(word, language).await
                }
                _ => word.to_string(),
            }
        }))
        .await;
        words.join(" ")
    }

    async fn errors_in_span(&self, text: &str, language: Language) -> Vec<SpellingError> {
        let Some((checker, lang)) = self.checker_for(language) else {
            return Vec::new();
        };

        match tokio::time::timeout(self.timeout, checker.spell(text, lang)).await {
            Ok(Ok(errors)) => {
                debug!(%language, count = errors.len(), "Spelling errors listed");
                errors
            }
            Ok(Err(err)) => {
                warn!(%language, text, error = %err, "Listing spelling errors failed");
                Vec::new()
            }
            Err(_) => {
                warn!(%language, text, timeout = ?self.timeout, "Listing spelling errors timed out");
                Vec::new()
            }
        }
    }

    async fn call_spelled(&self, text: &str, language: Language) -> Result<String, SpellCheckError> {
        let Some((checker, lang)) = self.checker_for(language) else {
            return Ok(text.to_string());
        };

        tokio::time::timeout(self.timeout, checker.spelled(text, lang))
            .await
            .map_err(|_| SpellCheckError::Timeout(self.timeout))?
    }

    fn checker_for(&self, language: Language) -> Option<(&dyn SpellChecker, &'static str)> {
        let checker = self.checkers.get(&language)?;
        Some((checker.as_ref(), language.code()?))
    }
}
