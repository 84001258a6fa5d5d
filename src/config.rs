use axum::http::HeaderValue;
use chrono::{DateTime, Utc};
use clap::Parser;
use std::time::Duration;
use thiserror::Error;

use crate::pricing::PriceIds;

pub const DEFAULT_PROMO_EXPIRY: &str = "2026-12-31T23:59:59Z";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer clearly and concisely.";

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "assistant-gateway")]
#[command(about = "Rate-limited chat proxy and pricing catalog")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Allowed CORS origins, comma-separated, "*" for any
    #[arg(long, env = "CORS_ORIGIN", default_value = "*")]
    pub cors_origin: String,

    // Rate limit max requests per window
    #[arg(long, env = "RATE_LIMIT", default_value_t = 10)]
    pub rate_limit: usize,

    // Rate limit window in seconds
    #[arg(long, env = "RATE_WINDOW", default_value_t = 60)]
    pub rate_window: u64,

    // Tracked client count that triggers an expired-key sweep
    #[arg(long, default_value_t = 1000)]
    pub max_tracked_clients: usize,

    // Longest accepted message, in characters after trimming
    #[arg(long, default_value_t = 2000)]
    pub max_message_length: usize,

    // Background sweep interval in seconds (0 = sweep inline only)
    #[arg(long, default_value_t = 0)]
    pub sweep_interval: u64,

    // Chat-completion provider credentials
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    pub api_key: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub api_base_url: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,

    #[arg(long, default_value_t = 500)]
    pub max_tokens: u32,

    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,

    // Provider request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub provider_timeout: u64,

    #[arg(long, env = "SYSTEM_PROMPT", default_value = DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,

    // Promotion end, RFC 3339
    #[arg(long, env = "PROMO_EXPIRY", default_value = DEFAULT_PROMO_EXPIRY)]
    pub promo_expiry: String,

    // Billing provider price references
    #[arg(long, env = "STRIPE_PRICE_STARTER_MONTHLY", default_value = "price_starter_monthly")]
    pub price_starter_monthly: String,
    #[arg(long, env = "STRIPE_PRICE_STARTER_YEARLY", default_value = "price_starter_yearly")]
    pub price_starter_yearly: String,
    #[arg(long, env = "STRIPE_PRICE_PRO_MONTHLY", default_value = "price_pro_monthly")]
    pub price_pro_monthly: String,
    #[arg(long, env = "STRIPE_PRICE_PRO_YEARLY", default_value = "price_pro_yearly")]
    pub price_pro_yearly: String,
    #[arg(long, env = "STRIPE_PRICE_ENTERPRISE_MONTHLY", default_value = "price_enterprise_monthly")]
    pub price_enterprise_monthly: String,
    #[arg(long, env = "STRIPE_PRICE_ENTERPRISE_YEARLY", default_value = "price_enterprise_yearly")]
    pub price_enterprise_yearly: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("rate limit must be at least 1")]
    ZeroRateLimit,

    #[error("rate window must be at least 1 second")]
    ZeroRateWindow,

    #[error("max message length must be at least 1")]
    ZeroMessageLength,

    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("temperature {0} is outside 0.0..=2.0")]
    InvalidTemperature(f32),

    #[error("invalid promotion expiry {value:?}: {reason}")]
    InvalidPromoExpiry { value: String, reason: String },

    #[error("invalid CORS origin {0:?}")]
    InvalidCorsOrigin(String),
}

#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub rate_limit: usize,
    pub rate_window: Duration,
    pub max_tracked_clients: usize,
    pub max_message_length: usize,
    pub sweep_interval: Option<Duration>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            rate_limit: 10,
            rate_window: Duration::from_secs(60),
            max_tracked_clients: 1000,
            max_message_length: 2000,
            sweep_interval: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
    pub system_prompt: String,
}

#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub promo_expiry: DateTime<Utc>,
    pub starter: PriceIds,
    pub pro: PriceIds,
    pub enterprise: PriceIds,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            promo_expiry: DateTime::parse_from_rfc3339(DEFAULT_PROMO_EXPIRY)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            starter: PriceIds::new("price_starter_monthly", "price_starter_yearly"),
            pro: PriceIds::new("price_pro_monthly", "price_pro_yearly"),
            enterprise: PriceIds::new("price_enterprise_monthly", "price_enterprise_yearly"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CorsOrigins {
    Any,
    List(Vec<HeaderValue>),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origins: CorsOrigins,
}

// Validated configuration handed to the components at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub admission: AdmissionConfig,
    pub provider: ProviderConfig,
    pub pricing: PricingConfig,
}

impl Args {
    pub fn into_config(self) -> Result<Config, ConfigError> {
        if self.rate_limit == 0 {
            return Err(ConfigError::ZeroRateLimit);
        }
        if self.rate_window == 0 {
            return Err(ConfigError::ZeroRateWindow);
        }
        if self.max_message_length == 0 {
            return Err(ConfigError::ZeroMessageLength);
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        let promo_expiry = DateTime::parse_from_rfc3339(&self.promo_expiry)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| ConfigError::InvalidPromoExpiry {
                value: self.promo_expiry.clone(),
                reason: e.to_string(),
            })?;

        let cors_origins = parse_cors_origins(&self.cors_origin)?;

        Ok(Config {
            server: ServerConfig {
                port: self.port,
                cors_origins,
            },
            admission: AdmissionConfig {
                rate_limit: self.rate_limit,
                rate_window: Duration::from_secs(self.rate_window),
                max_tracked_clients: self.max_tracked_clients,
                max_message_length: self.max_message_length,
                sweep_interval: (self.sweep_interval > 0)
                    .then(|| Duration::from_secs(self.sweep_interval)),
            },
            provider: ProviderConfig {
                api_key: self.api_key.trim().to_string(),
                base_url: self.api_base_url.trim_end_matches('/').to_string(),
                model: self.model,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                timeout: Duration::from_secs(self.provider_timeout),
                system_prompt: self.system_prompt,
            },
            pricing: PricingConfig {
                promo_expiry,
                starter: PriceIds::new(self.price_starter_monthly, self.price_starter_yearly),
                pro: PriceIds::new(self.price_pro_monthly, self.price_pro_yearly),
                enterprise: PriceIds::new(
                    self.price_enterprise_monthly,
                    self.price_enterprise_yearly,
                ),
            },
        })
    }
}

fn parse_cors_origins(raw: &str) -> Result<CorsOrigins, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "*" {
        return Ok(CorsOrigins::Any);
    }

    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|_| ConfigError::InvalidCorsOrigin(origin.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(CorsOrigins::List)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["assistant-gateway", "--api-key", "sk-test"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_produce_valid_config() {
        let config = parse(&[]).into_config().unwrap();
        assert_eq!(config.admission.rate_limit, 10);
        assert_eq!(config.admission.rate_window, Duration::from_secs(60));
        assert_eq!(config.admission.max_tracked_clients, 1000);
        assert_eq!(config.admission.max_message_length, 2000);
        assert_eq!(config.admission.sweep_interval, None);
        assert_eq!(config.pricing.promo_expiry.to_rfc3339(), "2026-12-31T23:59:59+00:00");
        assert_eq!(config.server.cors_origins, CorsOrigins::Any);
        assert_eq!(config.pricing.pro.monthly, "price_pro_monthly");
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let args = Args::try_parse_from(["assistant-gateway", "--api-key", "  "]).unwrap();
        assert_eq!(args.into_config().unwrap_err(), ConfigError::MissingApiKey);
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert_eq!(
            parse(&["--rate-limit", "0"]).into_config().unwrap_err(),
            ConfigError::ZeroRateLimit
        );
        assert_eq!(
            parse(&["--rate-window", "0"]).into_config().unwrap_err(),
            ConfigError::ZeroRateWindow
        );
    }

    #[test]
    fn temperature_out_of_range_is_rejected() {
        assert_eq!(
            parse(&["--temperature", "2.5"]).into_config().unwrap_err(),
            ConfigError::InvalidTemperature(2.5)
        );
    }

    #[test]
    fn bad_promo_expiry_is_rejected() {
        let err = parse(&["--promo-expiry", "next tuesday"]).into_config().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPromoExpiry { .. }));
    }

    #[test]
    fn cors_origin_list_is_parsed() {
        let config = parse(&["--cors-origin", "https://a.example, https://b.example"])
            .into_config()
            .unwrap();
        match config.server.cors_origins {
            CorsOrigins::List(origins) => assert_eq!(origins.len(), 2),
            CorsOrigins::Any => panic!("expected explicit origins"),
        }
    }

    #[test]
    fn sweep_interval_enables_background_sweep() {
        let config = parse(&["--sweep-interval", "30"]).into_config().unwrap();
        assert_eq!(config.admission.sweep_interval, Some(Duration::from_secs(30)));
    }
}
