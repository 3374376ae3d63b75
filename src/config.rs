//! # Configuration Module
//!
//! This module defines the configuration structures passed to each component at
//! construction: AI client retry settings, object storage settings and import
//! limits. Every structure has a `Default` carrying the production values, and
//! `AppConfig::from_env` overlays environment variables on top of them.

use anyhow::{Context, Result};
use backon::ExponentialBuilder;
use std::env;
use std::str::FromStr;
use std::time::Duration;

// Constants for default configuration
pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_IMAGE_BUCKET: &str = "cocktail-images";
pub const MAX_IMAGE_SIZE: u64 = 5 * 1024 * 1024; // 5MB limit for uploaded images
pub const MAX_COCKTAIL_NAME_LENGTH: usize = 100;
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Retry configuration for the generative AI client
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Additional attempts after the first one (total attempts = max_retries + 1)
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds; doubles on each further retry
    pub initial_backoff_ms: u64,
}

impl RetryConfig {
    /// Doubling backoff without jitter, capped at `MAX_BACKOFF`
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.initial_backoff_ms))
            .with_max_delay(MAX_BACKOFF)
            .with_factor(2.0)
            .with_max_times(self.max_retries as usize)
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 1000, // 1s, then 2s
        }
    }
}

/// Configuration for the generative AI endpoint
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Base URL of the models collection (`{base}/{model}:generateContent`)
    pub api_url: String,
    /// Server-held API key; never handed to the presentation layer
    pub api_key: String,
    pub text_model: String,
    pub image_model: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_GEMINI_API_URL.to_string(),
            api_key: String::new(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            request_timeout_secs: 120,
            retry: RetryConfig::default(),
        }
    }
}

/// Configuration for cocktail image storage
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Storage service base URL (e.g. `https://<project>.supabase.co`)
    pub base_url: String,
    pub service_key: String,
    pub bucket: String,
    /// Accepted upload content types
    pub allowed_content_types: Vec<String>,
    /// Maximum upload size in bytes
    pub max_image_size: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            service_key: String::new(),
            bucket: DEFAULT_IMAGE_BUCKET.to_string(),
            allowed_content_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
            max_image_size: MAX_IMAGE_SIZE,
        }
    }
}

/// Limits applied by the import pipeline
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Maximum cocktail name length in characters
    pub max_cocktail_name_length: usize,
    /// Whether to list catalog names in the recipe prompt
    pub include_catalog_in_prompt: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_cocktail_name_length: MAX_COCKTAIL_NAME_LENGTH,
            include_catalog_in_prompt: true,
        }
    }
}

/// Top-level configuration for the import binary
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub database_url: String,
    pub language: String,
    pub ai: AiConfig,
    pub storage: StorageConfig,
    pub import: ImportConfig,
}

impl AppConfig {
    /// Build the configuration from environment variables (after `.env` is loaded)
    pub fn from_env() -> Result<Self> {
        let defaults = AppConfig::default();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let api_key = env::var("GEMINI_API_KEY").context("GEMINI_API_KEY must be set")?;

        let ai = AiConfig {
            api_url: env_or("GEMINI_API_URL", defaults.ai.api_url),
            api_key,
            text_model: env_or("GEMINI_TEXT_MODEL", defaults.ai.text_model),
            image_model: env_or("GEMINI_IMAGE_MODEL", defaults.ai.image_model),
            request_timeout_secs: env_parse(
                "AI_REQUEST_TIMEOUT_SECS",
                defaults.ai.request_timeout_secs,
            )?,
            retry: RetryConfig {
                max_retries: env_parse("AI_MAX_RETRIES", defaults.ai.retry.max_retries)?,
                initial_backoff_ms: env_parse(
                    "AI_INITIAL_BACKOFF_MS",
                    defaults.ai.retry.initial_backoff_ms,
                )?,
            },
        };

        let storage = StorageConfig {
            base_url: env_or("STORAGE_URL", defaults.storage.base_url),
            service_key: env_or("STORAGE_SERVICE_KEY", defaults.storage.service_key),
            bucket: env_or("STORAGE_BUCKET", defaults.storage.bucket),
            ..defaults.storage
        };

        Ok(Self {
            database_url,
            language: env_or("APP_LANGUAGE", "ja".to_string()),
            ai,
            storage,
            import: defaults.import,
        })
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).ok().filter(|v| !v.trim().is_empty()).unwrap_or(default)
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a valid number, got {raw:?}")),
        _ => Ok(default),
    }
}
