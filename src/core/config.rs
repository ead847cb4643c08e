use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;
use tracing::Level;

use crate::core::errors::ConfigError;
use crate::translation::TranslationPolicy;

/// Detector endpoint and the hints passed along with each frame
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub endpoint: String,
    pub confidence_threshold: f32,
    /// Inference size hint for the model
    pub image_size: u32,
    /// Pre-filter confidence hint for the model
    pub model_confidence: f32,
    pub agnostic_nms: bool,
}

/// Label translation configuration
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub endpoint: String,
    pub source_lang: String,
    pub target_lang: String,
    pub policy: TranslationPolicy,
}

/// Text extraction and spell-checking configuration
#[derive(Debug, Clone)]
pub struct TextConfig {
    pub speller_endpoint: String,
    pub ocr_model_dir: PathBuf,
}

/// Annotation and output encoding configuration
#[derive(Debug, Clone)]
pub struct RenderingConfig {
    pub font_scale: f32,
    pub jpeg_quality: u8,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub detection: DetectionConfig,
    pub translation: TranslationConfig,
    pub text: TextConfig,
    pub rendering: RenderingConfig,
    /// Upper bound for every external call
    pub call_timeout: Duration,
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detection: DetectionConfig {
                endpoint: "http://127.0.0.1:8000/detect".to_string(),
                confidence_threshold: 0.2,
                image_size: 1280,
                model_confidence: 0.1,
                agnostic_nms: true,
            },
            translation: TranslationConfig {
                endpoint: "https://translate.googleapis.com/translate_a/single".to_string(),
                source_lang: "en".to_string(),
                target_lang: "ru".to_string(),
                policy: TranslationPolicy::Strict,
            },
            text: TextConfig {
                speller_endpoint: "https://speller.yandex.net/services/spellservice.json"
                    .to_string(),
                ocr_model_dir: default_ocr_model_dir(),
            },
            rendering: RenderingConfig {
                font_scale: 32.0,
                jpeg_quality: 90,
            },
            call_timeout: Duration::from_secs(30),
            log_level: Level::INFO,
        }
    }
}

impl Config {
    /// Load configuration from `ANNOTEXT_*` environment variables on top of
    /// the defaults, then validate it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let detection = &mut config.detection;
        if let Some(url) = env_string("ANNOTEXT_DETECTOR_URL") {
            detection.endpoint = url;
        }
        detection.confidence_threshold =
            env_parse("ANNOTEXT_CONFIDENCE_THRESHOLD", detection.confidence_threshold)?;
        detection.image_size = env_parse("ANNOTEXT_DETECTOR_IMGSZ", detection.image_size)?;
        detection.model_confidence =
            env_parse("ANNOTEXT_DETECTOR_CONF", detection.model_confidence)?;
        detection.agnostic_nms = env_parse("ANNOTEXT_DETECTOR_AGNOSTIC_NMS", detection.agnostic_nms)?;

        let translation = &mut config.translation;
        if let Some(url) = env_string("ANNOTEXT_TRANSLATE_URL") {
            translation.endpoint = url;
        }
        if let Some(lang) = env_string("ANNOTEXT_SOURCE_LANG") {
            translation.source_lang = lang;
        }
        if let Some(lang) = env_string("ANNOTEXT_TARGET_LANG") {
            translation.target_lang = lang;
        }
        translation.policy = env_parse("ANNOTEXT_TRANSLATION_POLICY", translation.policy)?;

        if let Some(url) = env_string("ANNOTEXT_SPELLER_URL") {
            config.text.speller_endpoint = url;
        }
        if let Some(dir) = env_string("ANNOTEXT_OCR_MODEL_DIR") {
            config.text.ocr_model_dir = PathBuf::from(dir);
        }

        config.rendering.font_scale = env_parse("ANNOTEXT_FONT_SCALE", config.rendering.font_scale)?;
        config.rendering.jpeg_quality =
            env_parse("ANNOTEXT_JPEG_QUALITY", config.rendering.jpeg_quality)?;

        let timeout_secs: u64 = env_parse("ANNOTEXT_CALL_TIMEOUT_SECS", config.call_timeout.as_secs())?;
        config.call_timeout = Duration::from_secs(timeout_secs);

        if let Some(level) = env_string("LOG_LEVEL") {
            config.log_level = parse_log_level(&level).ok_or(ConfigError::InvalidValue {
                key: "LOG_LEVEL".to_string(),
                value: level,
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint("ANNOTEXT_DETECTOR_URL", &self.detection.endpoint)?;
        validate_endpoint("ANNOTEXT_TRANSLATE_URL", &self.translation.endpoint)?;
        validate_endpoint("ANNOTEXT_SPELLER_URL", &self.text.speller_endpoint)?;

        if !(0.0..=1.0).contains(&self.detection.confidence_threshold) {
            return Err(ConfigError::ValidationFailed(format!(
                "confidence_threshold must be between 0.0 and 1.0, got {}",
                self.detection.confidence_threshold
            )));
        }

        if !(0.0..=1.0).contains(&self.detection.model_confidence) {
            return Err(ConfigError::ValidationFailed(format!(
                "detector confidence hint must be between 0.0 and 1.0, got {}",
                self.detection.model_confidence
            )));
        }

        if self.rendering.font_scale <= 0.0 {
            return Err(ConfigError::ValidationFailed(format!(
                "font_scale must be positive, got {}",
                self.rendering.font_scale
            )));
        }

        if !(1..=100).contains(&self.rendering.jpeg_quality) {
            return Err(ConfigError::ValidationFailed(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.rendering.jpeg_quality
            )));
        }

        if self.call_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "call timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.detection.confidence_threshold
    }

    pub fn log_level(&self) -> Level {
        self.log_level
    }
}

pub fn parse_log_level(value: &str) -> Option<Level> {
    match value.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn default_ocr_model_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".cache/ocrs"))
        .unwrap_or_else(|_| PathBuf::from(".cache/ocrs"))
}

/// Endpoints must be absolute `http(s)` URLs with a host
fn validate_endpoint(key: &str, value: &str) -> Result<(), ConfigError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env_string(key) {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}
