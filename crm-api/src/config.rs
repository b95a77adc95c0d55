//! API Configuration Module
//!
//! Configuration for CORS, rate limiting, CSV import limits, service-contract
//! defaults and calendar sync. Values are loaded from environment variables
//! with defaults suited to development.

use crm_core::ImportLimits;
use secrecy::SecretString;
use std::time::Duration;

pub(crate) fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => default,
        })
        .unwrap_or(default)
}

/// Check if running in a production environment.
pub fn is_production_environment() -> bool {
    std::env::var("CRM_ENVIRONMENT")
        .map(|e| matches!(e.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

// ============================================================================
// CALENDAR CONFIGURATION
// ============================================================================

/// Outbound calendar webhook settings. `webhook_url = None` disables sync.
#[derive(Debug, Clone)]
pub struct CalendarConfig {
    pub webhook_url: Option<String>,
    /// HMAC-SHA256 key used to sign request bodies
    pub signing_secret: Option<SecretString>,
    pub timeout: Duration,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            signing_secret: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl CalendarConfig {
    /// Environment variables:
    /// - `CRM_CALENDAR_WEBHOOK_URL`: endpoint receiving service events (unset = disabled)
    /// - `CRM_CALENDAR_SIGNING_SECRET`: HMAC key for `X-Crm-Signature`
    /// - `CRM_CALENDAR_TIMEOUT_SECS`: request timeout (default: 10)
    pub fn from_env() -> Self {
        Self {
            webhook_url: std::env::var("CRM_CALENDAR_WEBHOOK_URL")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            signing_secret: std::env::var("CRM_CALENDAR_SIGNING_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .map(SecretString::from),
            timeout: Duration::from_secs(env_parse("CRM_CALENDAR_TIMEOUT_SECS").unwrap_or(10)),
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for CORS, rate limiting and workflow limits.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Rate Limiting Configuration
    // ========================================================================
    pub rate_limit_enabled: bool,

    /// Rate limit for unauthenticated requests (per IP, per minute).
    pub rate_limit_unauthenticated: u32,

    /// Rate limit for authenticated requests (per tenant, per minute).
    pub rate_limit_authenticated: u32,

    /// Burst capacity beyond the per-minute limit.
    pub rate_limit_burst: u32,

    // ========================================================================
    // Workflow Configuration
    // ========================================================================
    /// Limits applied to uploaded CSV files.
    pub import_limits: ImportLimits,

    /// Service logs kept per contract when a contract does not set its own.
    pub default_log_retention: i32,

    pub calendar: CalendarConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,

            rate_limit_enabled: true,
            rate_limit_unauthenticated: 100,
            rate_limit_authenticated: 1000,
            rate_limit_burst: 10,

            import_limits: ImportLimits::default(),
            default_log_retention: 24,
            calendar: CalendarConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `CRM_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `CRM_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `CRM_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `CRM_RATE_LIMIT_ENABLED`: "true" or "false" (default: true)
    /// - `CRM_RATE_LIMIT_UNAUTHENTICATED`: Requests per minute per IP (default: 100)
    /// - `CRM_RATE_LIMIT_AUTHENTICATED`: Requests per minute per tenant (default: 1000)
    /// - `CRM_RATE_LIMIT_BURST`: Burst capacity (default: 10)
    /// - `CRM_IMPORT_MAX_ROWS`: Data rows per CSV upload (default: 5000)
    /// - `CRM_IMPORT_MAX_BYTES`: Bytes per CSV upload (default: 5 MiB)
    /// - `CRM_DEFAULT_LOG_RETENTION`: Service logs kept per contract (default: 24)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = std::env::var("CRM_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            cors_origins,
            cors_allow_credentials: env_flag("CRM_CORS_ALLOW_CREDENTIALS", false),
            cors_max_age_secs: env_parse("CRM_CORS_MAX_AGE_SECS")
                .unwrap_or(defaults.cors_max_age_secs),
            rate_limit_enabled: env_flag("CRM_RATE_LIMIT_ENABLED", true),
            rate_limit_unauthenticated: env_parse("CRM_RATE_LIMIT_UNAUTHENTICATED")
                .unwrap_or(defaults.rate_limit_unauthenticated),
            rate_limit_authenticated: env_parse("CRM_RATE_LIMIT_AUTHENTICATED")
                .unwrap_or(defaults.rate_limit_authenticated),
            rate_limit_burst: env_parse("CRM_RATE_LIMIT_BURST")
                .unwrap_or(defaults.rate_limit_burst),
            import_limits: ImportLimits {
                max_rows: env_parse("CRM_IMPORT_MAX_ROWS")
                    .unwrap_or(defaults.import_limits.max_rows),
                max_bytes: env_parse("CRM_IMPORT_MAX_BYTES")
                    .unwrap_or(defaults.import_limits.max_bytes),
            },
            default_log_retention: env_parse("CRM_DEFAULT_LOG_RETENTION")
                .filter(|n: &i32| *n > 0)
                .unwrap_or(defaults.default_log_retention),
            calendar: CalendarConfig::from_env(),
        }
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.example.com
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern))
                        || origin_domain == pattern;
                }
            }
            false
        })
    }

    /// Refuse configurations that are unsafe outside development.
    pub fn validate_for_production(&self) -> Result<(), String> {
        if self.cors_origins.is_empty() {
            return Err(
                "CORS origins not configured for production. Set CRM_CORS_ORIGINS.".to_string(),
            );
        }
        if !self.rate_limit_enabled {
            tracing::warn!(
                "Rate limiting is disabled in production. Set CRM_RATE_LIMIT_ENABLED=true."
            );
        }
        if self.calendar.webhook_url.is_some() && self.calendar.signing_secret.is_none() {
            return Err(
                "Calendar webhook configured without CRM_CALENDAR_SIGNING_SECRET.".to_string(),
            );
        }
        Ok(())
    }
}
