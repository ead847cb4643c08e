pub mod google;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::core::errors::TranslationError;
use crate::models::Detection;

pub use google::GoogleTranslator;

/// Text translation service
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslationError>;
}

/// What a failed label translation does to the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranslationPolicy {
    /// The first failure aborts the run
    #[default]
    Strict,
    /// Failures are logged and the source label is kept
    Lenient,
}

impl FromStr for TranslationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(TranslationPolicy::Strict),
            "lenient" => Ok(TranslationPolicy::Lenient),
            other => Err(format!("unknown translation policy '{other}'")),
        }
    }
}

/// Translates detection labels, one call per retained detection
pub struct LabelTranslator {
    translator: Arc<dyn Translator>,
    source_lang: String,
    target_lang: String,
    policy: TranslationPolicy,
    timeout: Duration,
}

impl LabelTranslator {
    pub fn new(
        translator: Arc<dyn Translator>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
        policy: TranslationPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            translator,
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            policy,
            timeout,
        }
    }

    pub fn policy(&self) -> TranslationPolicy {
        self.policy
    }

    /// Translate one label, bounded by the call timeout
    pub async fn translate_label(&self, label: &str) -> Result<String, TranslationError> {
        let call = self
            .translator
            .translate(label, &self.source_lang, &self.target_lang);

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(TranslationError::Timeout {
                text: label.to_string(),
                timeout: self.timeout,
            }),
        }
    }

    /// Replace every detection's label with its translation.
    ///
    /// Calls are issued concurrently; results come back in detection order.
    pub async fn translate_detections(
        &self,
        detections: Vec<Detection>,
    ) -> Result<Vec<Detection>, TranslationError> {
        let results = join_all(detections.iter().map(|d| self.translate_label(&d.label))).await;

        let mut translated = Vec::with_capacity(detections.len());
        for (mut detection, result) in detections.into_iter().zip(results) {
            match (result, self.policy) {
                (Ok(label), _) => {
                    debug!(source = %detection.label, translated = %label, "Translated label");
                    detection.label = label;
                }
                (Err(err), TranslationPolicy::Strict) => return Err(err),
                (Err(err), TranslationPolicy::Lenient) => {
                    warn!(label = %detection.label, error = %err, "Keeping untranslated label");
                }
            }
            translated.push(detection);
        }

        Ok(translated)
    }
}
