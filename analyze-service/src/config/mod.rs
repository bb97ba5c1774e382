use crate::services::providers::GenerationParams;
use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Model used when `GENAI_TEXT_MODEL` is not set.
pub const DEFAULT_TEXT_MODEL: &str = "models/gemini-1.5-flash";

/// Public Gemini REST endpoint.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MOCK_RESPONSE: &str = "API working";

#[derive(Debug, Clone)]
pub struct AnalyzeConfig {
    pub common: core_config::Config,
    pub provider: ProviderKind,
    pub google: GoogleConfig,
    pub models: ModelConfig,
    pub mock: MockConfig,
    pub cors: CorsConfig,
}

/// Which text provider backs the analyze endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Mock,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(format!("unknown provider '{}', expected 'gemini' or 'mock'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// `None` when `GEMINI_API_KEY` is unset or blank. Startup still succeeds.
    pub api_key: Option<Secret<String>>,
    pub api_base: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Model for text output (e.g., models/gemini-1.5-flash)
    pub text_model: String,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub response: String,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins; a single `*` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

impl AnalyzeConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_lookup(common_config, |key| env::var(key).ok())
    }

    /// Resolve service settings through `lookup` instead of the process
    /// environment.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_prod = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string()) == "prod";

        let provider = parse_value(
            "GENAI_PROVIDER",
            &get_env(&lookup, "GENAI_PROVIDER", Some("gemini"), is_prod)?,
        )?;

        let request_timeout_secs: u64 = parse_value(
            "GENAI_REQUEST_TIMEOUT_SECS",
            &get_env(
                &lookup,
                "GENAI_REQUEST_TIMEOUT_SECS",
                Some(&DEFAULT_REQUEST_TIMEOUT_SECS.to_string()),
                is_prod,
            )?,
        )?;
        if request_timeout_secs == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "GENAI_REQUEST_TIMEOUT_SECS must be greater than zero"
            )));
        }

        let allowed_origins = get_env(&lookup, "CORS_ALLOWED_ORIGINS", Some("*"), is_prod)?
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect::<Vec<_>>();
        if allowed_origins.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "CORS_ALLOWED_ORIGINS must list at least one origin (or `*`)"
            )));
        }

        let temperature: Option<f32> = parse_optional(&lookup, "GENAI_TEMPERATURE")?;
        if let Some(t) = temperature {
            if !t.is_finite() || !(0.0..=2.0).contains(&t) {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "GENAI_TEMPERATURE must be between 0.0 and 2.0, got {}",
                    t
                )));
            }
        }

        let max_output_tokens: Option<i32> = parse_optional(&lookup, "GENAI_MAX_OUTPUT_TOKENS")?;
        if let Some(tokens) = max_output_tokens {
            if tokens <= 0 {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "GENAI_MAX_OUTPUT_TOKENS must be greater than zero, got {}",
                    tokens
                )));
            }
        }

        Ok(AnalyzeConfig {
            common,
            provider,
            google: GoogleConfig {
                api_key: get_optional(&lookup, "GEMINI_API_KEY").map(Secret::new),
                api_base: get_env(
                    &lookup,
                    "GEMINI_API_BASE",
                    Some(DEFAULT_GEMINI_API_BASE),
                    is_prod,
                )?
                .trim_end_matches('/')
                .to_string(),
                request_timeout_secs,
            },
            models: ModelConfig {
                text_model: get_env(&lookup, "GENAI_TEXT_MODEL", Some(DEFAULT_TEXT_MODEL), is_prod)?,
                temperature,
                max_output_tokens,
            },
            mock: MockConfig {
                response: lookup("GENAI_MOCK_RESPONSE")
                    .unwrap_or_else(|| DEFAULT_MOCK_RESPONSE.to_string()),
            },
            cors: CorsConfig { allowed_origins },
        })
    }

    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.models.temperature,
            max_output_tokens: self.models.max_output_tokens,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.google.request_timeout_secs)
    }
}

fn get_env<F>(lookup: &F, key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn get_optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

fn parse_optional<F, T>(lookup: &F, key: &str) -> Result<Option<T>, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    get_optional(lookup, key)
        .map(|raw| parse_value(key, &raw))
        .transpose()
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
    })
}
