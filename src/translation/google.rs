use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use super::Translator;
use crate::core::errors::TranslationError;

/// Client for the public Google Translate `gtx` endpoint
pub struct GoogleTranslator {
    client: reqwest::Client,
    endpoint: String,
}

impl GoogleTranslator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TranslationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    #[instrument(skip(self), level = "debug")]
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslationError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", source_lang),
                ("tl", target_lang),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::BadStatus(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;

        parse_translation(&body)
    }
}

/// The answer is `[[["<chunk>", "<source chunk>", ...], ...], ...]`; the
/// translation is the concatenation of the first element of every chunk.
fn parse_translation(body: &Value) -> Result<String, TranslationError> {
    let chunks = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslationError::InvalidResponse("missing sentence list".to_string()))?;

    let translated: String = chunks
        .iter()
        .filter_map(|chunk| chunk.get(0).and_then(Value::as_str))
        .collect();

    if translated.trim().is_empty() {
        return Err(TranslationError::InvalidResponse("empty translation".to_string()));
    }

    Ok(translated)
}
