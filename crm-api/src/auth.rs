//! Authentication Module
//!
//! Two authentication methods are supported:
//! 1. API key authentication (via X-API-Key header), acting as the configured
//!    service role
//! 2. JWT token authentication (via Authorization: Bearer header), where `sub`
//!    is the caller's profile id and `roles` carries role strings
//!
//! The tenant comes from the X-Tenant-ID header or the JWT `tenant_id` claim.
//! A JWT carrying a tenant claim is rejected when the header names another tenant.

use crate::config::is_production_environment;
use crate::error::{ApiError, ApiResult};
use crm_core::{EntityId, Role, TenantId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

const INSECURE_DEFAULT_SECRET: &str = "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION";

// ============================================================================
// CLOCK ABSTRACTION
// ============================================================================

/// Clock used for JWT time validation.
///
/// Token times are checked against this clock instead of inside
/// `jsonwebtoken`, which keeps tests deterministic.
pub trait JwtClock: Send + Sync {
    /// Current time as Unix epoch seconds. Negative for pre-1970 clocks.
    fn now_epoch_secs(&self) -> i64;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}

/// Test clock helpers for common scenarios.
#[cfg(test)]
pub mod test_clocks {
    use super::FixedClock;

    /// 2024-01-01 00:00:00 UTC
    pub fn valid() -> FixedClock {
        FixedClock(1704067200)
    }

    /// 2020-01-01 00:00:00 UTC
    pub fn expired() -> FixedClock {
        FixedClock(1577836800)
    }

    /// 2030-01-01 00:00:00 UTC
    pub fn future() -> FixedClock {
        FixedClock(1893456000)
    }
}

// ============================================================================
// JWT SECRET
// ============================================================================

/// JWT signing secret. Never printed.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    pub fn new(secret: String) -> Result<Self, ApiError> {
        if secret.trim().is_empty() {
            return Err(ApiError::invalid_input("JWT secret must not be empty"));
        }
        Ok(Self(SecretString::from(secret)))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.expose().len()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    pub fn is_insecure_default(&self) -> bool {
        self.expose() == INSECURE_DEFAULT_SECRET
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtSecret([REDACTED])")
    }
}

fn build_jwt_secret(secret_str: String) -> JwtSecret {
    let normalized = if secret_str.trim().is_empty() {
        INSECURE_DEFAULT_SECRET.to_string()
    } else {
        secret_str
    };

    JwtSecret::new(normalized)
        .unwrap_or_else(|_| JwtSecret(SecretString::from(INSECURE_DEFAULT_SECRET.to_string())))
}

// ============================================================================
// AUTH CONFIGURATION
// ============================================================================

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Valid API keys
    pub api_keys: HashSet<String>,

    pub jwt_secret: JwtSecret,

    pub jwt_algorithm: Algorithm,

    /// Lifetime of generated tokens in seconds
    pub jwt_expiration_secs: i64,

    /// Tolerance applied to `exp` checks
    pub jwt_clock_skew_secs: i64,

    /// Reject requests that carry no tenant (header or claim)
    pub require_tenant_header: bool,

    /// Role granted to API-key callers
    pub service_role: Role,

    pub clock: Arc<dyn JwtClock>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_keys", &format!("[{} keys]", self.api_keys.len()))
            .field("jwt_secret", &self.jwt_secret)
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("jwt_expiration_secs", &self.jwt_expiration_secs)
            .field("jwt_clock_skew_secs", &self.jwt_clock_skew_secs)
            .field("require_tenant_header", &self.require_tenant_header)
            .field("service_role", &self.service_role)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_keys: HashSet::new(),
            jwt_secret: build_jwt_secret(String::new()),
            jwt_algorithm: Algorithm::HS256,
            jwt_expiration_secs: 3600,
            jwt_clock_skew_secs: 60,
            require_tenant_header: true,
            service_role: Role::Admin,
            clock: Arc::new(SystemClock),
        }
    }
}

impl AuthConfig {
    /// Load authentication configuration from the environment.
    ///
    /// - `CRM_API_KEYS`: comma-separated API keys
    /// - `CRM_JWT_SECRET`: HMAC secret for tokens
    /// - `CRM_JWT_EXPIRATION_SECS` (default: 3600)
    /// - `CRM_JWT_CLOCK_SKEW_SECS` (default: 60)
    /// - `CRM_REQUIRE_TENANT_HEADER` (default: true)
    /// - `CRM_SERVICE_ROLE`: role of API-key callers (default: Admin)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_keys = std::env::var("CRM_API_KEYS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let jwt_secret = build_jwt_secret(std::env::var("CRM_JWT_SECRET").unwrap_or_default());

        let jwt_expiration_secs = std::env::var("CRM_JWT_EXPIRATION_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.jwt_expiration_secs);

        let jwt_clock_skew_secs = std::env::var("CRM_JWT_CLOCK_SKEW_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.jwt_clock_skew_secs);

        let require_tenant_header = std::env::var("CRM_REQUIRE_TENANT_HEADER")
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        let service_role = std::env::var("CRM_SERVICE_ROLE")
            .ok()
            .and_then(|s| Role::from_db_str(&s).ok())
            .unwrap_or(defaults.service_role);

        Self {
            api_keys,
            jwt_secret,
            jwt_expiration_secs,
            jwt_clock_skew_secs,
            require_tenant_header,
            service_role,
            ..defaults
        }
    }

    /// Refuse insecure secrets when `CRM_ENVIRONMENT` is production; warn otherwise.
    pub fn validate_for_production(&self) -> ApiResult<()> {
        let is_production = is_production_environment();

        if self.jwt_secret.is_insecure_default() {
            if is_production {
                return Err(ApiError::invalid_input(
                    "Insecure default JWT secret in production. Set CRM_JWT_SECRET to a secure value.",
                ));
            }
            tracing::warn!(
                "Using the insecure default JWT secret. Set CRM_JWT_SECRET before deploying \
                 (minimum 32 characters)."
            );
        }

        if self.jwt_secret.len() < 32 {
            if is_production {
                return Err(ApiError::invalid_input(format!(
                    "JWT secret is too short for production use ({} chars). \
                     It must be at least 32 characters long.",
                    self.jwt_secret.len()
                )));
            } else if !self.jwt_secret.is_insecure_default() {
                tracing::warn!(
                    length = self.jwt_secret.len(),
                    "JWT secret is short. Use at least 32 characters in production."
                );
            }
        }

        Ok(())
    }

    pub fn add_api_key(&mut self, key: String) {
        self.api_keys.insert(key);
    }

    pub fn is_valid_api_key(&self, key: &str) -> bool {
        self.api_keys.contains(key)
    }
}

// ============================================================================
// JWT CLAIMS
// ============================================================================

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Profile id of the caller
    pub sub: String,

    pub iat: i64,

    pub exp: i64,

    pub tenant_id: Option<String>,

    #[serde(default)]
    pub roles: Vec<String>,
}

impl Claims {
    pub fn new(
        user_id: String,
        tenant_id: Option<TenantId>,
        expiration_secs: i64,
        clock: &dyn JwtClock,
    ) -> Self {
        let now = clock.now_epoch_secs();
        Self {
            sub: user_id,
            iat: now,
            exp: now + expiration_secs,
            tenant_id: tenant_id.map(|id| id.to_string()),
            roles: Vec::new(),
        }
    }

    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles.extend(roles);
        self
    }

    pub fn is_expired(&self, clock: &dyn JwtClock) -> bool {
        self.exp < clock.now_epoch_secs()
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
            .as_ref()
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    /// Most privileged recognised role in the token; Viewer when none is.
    pub fn role(&self) -> Role {
        Role::ALL
            .iter()
            .copied()
            .find(|role| {
                self.roles
                    .iter()
                    .any(|r| Role::from_db_str(r).ok() == Some(*role))
            })
            .unwrap_or_default()
    }
}

// ============================================================================
// AUTHENTICATION CONTEXT
// ============================================================================

/// Authentication context injected into request extensions.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// JWT `sub` or an API key identifier
    pub subject: String,

    /// Profile id of the caller, when `subject` is one
    pub user_id: Option<EntityId>,

    pub tenant_id: TenantId,

    pub role: Role,

    pub auth_method: AuthMethod,
}

impl AuthContext {
    pub fn new(
        subject: String,
        tenant_id: TenantId,
        role: Role,
        auth_method: AuthMethod,
    ) -> Self {
        let user_id = Uuid::parse_str(&subject).ok();
        Self {
            subject,
            user_id,
            tenant_id,
            role,
            auth_method,
        }
    }

    pub fn is_service(&self) -> bool {
        self.auth_method == AuthMethod::ApiKey
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ApiKey,
    Jwt,
}

// ============================================================================
// AUTHENTICATION FUNCTIONS
// ============================================================================

pub fn validate_api_key(config: &AuthConfig, api_key: &str) -> ApiResult<()> {
    if config.is_valid_api_key(api_key) {
        Ok(())
    } else {
        Err(ApiError::unauthorized("Invalid API key"))
    }
}

fn validate_claim_times(now: i64, exp: i64, leeway_secs: i64) -> ApiResult<()> {
    if exp < now - leeway_secs {
        return Err(ApiError::token_expired());
    }
    Ok(())
}

/// Validate a JWT token and extract claims.
///
/// `jsonwebtoken` checks the signature only; expiry is checked against
/// `config.clock`.
pub fn validate_jwt_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    let mut validation = Validation::new(config.jwt_algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims = HashSet::from(["exp".to_string()]);

    let token_data =
        decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidToken => {
                ApiError::invalid_token("Token is invalid")
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::invalid_token("Token signature is invalid")
            }
            _ => ApiError::invalid_token(format!("Token validation failed: {}", e)),
        })?;

    let claims = token_data.claims;
    let now = config.clock.now_epoch_secs();

    if now < 0 {
        tracing::error!(
            timestamp = now,
            "System clock returned pre-epoch time - server time is broken"
        );
        return Err(ApiError::internal_error(
            "Server time configuration error - please contact support",
        ));
    }

    validate_claim_times(now, claims.exp, config.jwt_clock_skew_secs)?;

    Ok(claims)
}

/// Generate a signed JWT for a profile.
pub fn generate_jwt_token(
    config: &AuthConfig,
    user_id: String,
    tenant_id: Option<TenantId>,
    roles: Vec<String>,
) -> ApiResult<String> {
    let claims = Claims::new(
        user_id,
        tenant_id,
        config.jwt_expiration_secs,
        &*config.clock,
    )
    .with_roles(roles);

    let encoding_key = EncodingKey::from_secret(config.jwt_secret.expose().as_bytes());
    let header = Header::new(config.jwt_algorithm);

    encode(&header, &claims, &encoding_key)
        .map_err(|e| ApiError::internal_error(format!("Failed to generate token: {}", e)))
}

/// Parse the X-Tenant-ID header as a UUID.
pub fn extract_tenant_id(header_value: &str) -> ApiResult<TenantId> {
    Uuid::parse_str(header_value.trim())
        .map_err(|_| ApiError::invalid_format("X-Tenant-ID", "valid UUID"))
}

pub fn authenticate_api_key(
    config: &AuthConfig,
    api_key: &str,
    tenant_id_header: Option<&str>,
) -> ApiResult<AuthContext> {
    validate_api_key(config, api_key)?;

    let tenant_id = if let Some(tenant_header) = tenant_id_header {
        extract_tenant_id(tenant_header)?
    } else if config.require_tenant_header {
        return Err(ApiError::missing_field("X-Tenant-ID"));
    } else {
        Uuid::nil()
    };

    let subject = format!("api_key_{}", api_key.chars().take(8).collect::<String>());

    Ok(AuthContext::new(
        subject,
        tenant_id,
        config.service_role,
        AuthMethod::ApiKey,
    ))
}

pub fn authenticate_jwt(
    config: &AuthConfig,
    token: &str,
    tenant_id_header: Option<&str>,
) -> ApiResult<AuthContext> {
    let claims = validate_jwt_token(config, token)?;

    let header_tenant = tenant_id_header.map(extract_tenant_id).transpose()?;

    // A signed tenant claim binds the token to that tenant
    let tenant_id = match (claims.tenant_id(), header_tenant) {
        (Some(claim_tenant), Some(requested)) => {
            check_tenant_access(claim_tenant, requested)?;
            claim_tenant
        }
        (Some(claim_tenant), None) => claim_tenant,
        (None, Some(requested)) => requested,
        (None, None) if config.require_tenant_header => {
            return Err(ApiError::missing_field(
                "X-Tenant-ID or JWT tenant_id claim",
            ));
        }
        (None, None) => Uuid::nil(),
    };

    let role = claims.role();
    Ok(AuthContext::new(claims.sub, tenant_id, role, AuthMethod::Jwt))
}

/// Succeeds only when `requested` is the tenant the credential is bound to.
pub fn check_tenant_access(bound_tenant: TenantId, requested: TenantId) -> ApiResult<()> {
    if bound_tenant == requested {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "Access denied to tenant {}",
            requested
        )))
    }
}

/// Authenticate with the X-API-Key header first, then Authorization: Bearer.
pub fn authenticate(
    config: &AuthConfig,
    api_key_header: Option<&str>,
    auth_header: Option<&str>,
    tenant_id_header: Option<&str>,
) -> ApiResult<AuthContext> {
    if let Some(api_key) = api_key_header {
        return authenticate_api_key(config, api_key, tenant_id_header);
    }

    if let Some(auth_value) = auth_header {
        return match auth_value.strip_prefix("Bearer ") {
            Some(token) => authenticate_jwt(config, token, tenant_id_header),
            None => Err(ApiError::invalid_token(
                "Authorization header must use Bearer scheme",
            )),
        };
    }

    Err(ApiError::unauthorized(
        "Authentication required: provide X-API-Key or Authorization header",
    ))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    struct EnvVarGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let previous = std::env::var(key).ok();
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
            Self { key, previous }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.previous.as_deref() {
                Some(value) => std::env::set_var(self.key, value),
                None => std::env::remove_var(self.key),
            }
        }
    }

    fn test_config() -> AuthConfig {
        let mut config = AuthConfig::default();
        config.add_api_key("test_key_123".to_string());
        config.jwt_secret =
            JwtSecret::new("test_secret".to_string()).expect("Test secret should be valid");
        config.require_tenant_header = false;
        config.clock = Arc::new(test_clocks::valid());
        config
    }

    #[test]
    fn test_api_key_validation() {
        let config = test_config();
        assert!(validate_api_key(&config, "test_key_123").is_ok());
        assert!(validate_api_key(&config, "invalid_key").is_err());
    }

    #[test]
    fn test_jwt_generation_and_validation() -> ApiResult<()> {
        let config = test_config();
        let user_id = Uuid::now_v7().to_string();
        let tenant_id = Some(Uuid::now_v7());

        let token = generate_jwt_token(
            &config,
            user_id.clone(),
            tenant_id,
            vec!["sales_rep".to_string()],
        )?;
        let claims = validate_jwt_token(&config, &token)?;

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.tenant_id(), tenant_id);
        assert_eq!(claims.role(), Role::SalesRep);
        assert!(!claims.is_expired(&test_clocks::valid()));
        Ok(())
    }

    #[test]
    fn test_expired_token() -> ApiResult<()> {
        let mut config = test_config();
        config.jwt_expiration_secs = -1;
        let token = generate_jwt_token(&config, "user123".to_string(), None, vec![])?;

        config.clock = Arc::new(test_clocks::future());
        let err = validate_jwt_token(&config, &token).unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenExpired);
        Ok(())
    }

    #[test]
    fn test_token_issued_in_the_future_is_accepted() -> ApiResult<()> {
        let mut config = test_config();
        config.clock = Arc::new(test_clocks::future());
        let token = generate_jwt_token(&config, "user123".to_string(), None, vec![])?;

        config.clock = Arc::new(test_clocks::expired());
        assert!(validate_jwt_token(&config, &token).is_ok());
        Ok(())
    }

    #[test]
    fn test_tampered_token_is_rejected() -> ApiResult<()> {
        let config = test_config();
        let token = generate_jwt_token(&config, "user123".to_string(), None, vec![])?;

        let mut other = test_config();
        other.jwt_secret = JwtSecret::new("another_secret".to_string())?;
        let err = validate_jwt_token(&other, &token).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidToken);
        Ok(())
    }

    #[test]
    fn test_role_picks_most_privileged() {
        let claims = Claims::new("u".to_string(), None, 60, &test_clocks::valid())
            .with_roles(vec!["viewer".to_string(), "MANAGER".to_string(), "bogus".to_string()]);
        assert_eq!(claims.role(), Role::Manager);

        let none = Claims::new("u".to_string(), None, 60, &test_clocks::valid())
            .with_roles(vec!["superuser".to_string()]);
        assert_eq!(none.role(), Role::Viewer);
    }

    #[test]
    fn test_tenant_id_extraction() -> ApiResult<()> {
        let tenant_id = Uuid::now_v7();
        assert_eq!(extract_tenant_id(&tenant_id.to_string())?, tenant_id);
        assert!(extract_tenant_id("not-a-uuid").is_err());
        Ok(())
    }

    #[test]
    fn test_authenticate_api_key_uses_service_role() -> ApiResult<()> {
        let mut config = test_config();
        config.service_role = Role::Manager;
        let tenant_id = Uuid::now_v7();

        let ctx = authenticate_api_key(&config, "test_key_123", Some(&tenant_id.to_string()))?;

        assert_eq!(ctx.tenant_id, tenant_id);
        assert_eq!(ctx.auth_method, AuthMethod::ApiKey);
        assert_eq!(ctx.role, Role::Manager);
        assert_eq!(ctx.user_id, None);
        assert!(ctx.is_service());
        Ok(())
    }

    #[test]
    fn test_authenticate_jwt() -> ApiResult<()> {
        let config = test_config();
        let profile_id = Uuid::now_v7();
        let tenant_id = Uuid::now_v7();

        let token = generate_jwt_token(
            &config,
            profile_id.to_string(),
            Some(tenant_id),
            vec!["service_tech".to_string()],
        )?;
        let ctx = authenticate_jwt(&config, &token, None)?;

        assert_eq!(ctx.user_id, Some(profile_id));
        assert_eq!(ctx.tenant_id, tenant_id);
        assert_eq!(ctx.role, Role::ServiceTech);
        assert_eq!(ctx.auth_method, AuthMethod::Jwt);
        Ok(())
    }

    #[test]
    fn test_tenant_header_must_match_claim() -> ApiResult<()> {
        let config = test_config();
        let claim_tenant = Uuid::now_v7();
        let token =
            generate_jwt_token(&config, "user123".to_string(), Some(claim_tenant), vec![])?;

        let other = Uuid::now_v7().to_string();
        let err = authenticate_jwt(&config, &token, Some(&other))
            .err()
            .ok_or_else(|| ApiError::internal_error("foreign tenant accepted"))?;
        assert_eq!(err.code, ErrorCode::Forbidden);

        let ctx = authenticate_jwt(&config, &token, Some(&claim_tenant.to_string()))?;
        assert_eq!(ctx.tenant_id, claim_tenant);
        Ok(())
    }

    #[test]
    fn test_tenant_header_fills_missing_claim() -> ApiResult<()> {
        let config = test_config();
        let header_tenant = Uuid::now_v7();
        let token = generate_jwt_token(&config, "user123".to_string(), None, vec![])?;

        let ctx = authenticate_jwt(&config, &token, Some(&header_tenant.to_string()))?;
        assert_eq!(ctx.tenant_id, header_tenant);
        Ok(())
    }

    #[test]
    fn test_check_tenant_access() {
        let tenant = Uuid::now_v7();
        assert!(check_tenant_access(tenant, tenant).is_ok());
        assert!(check_tenant_access(tenant, Uuid::now_v7()).is_err());
    }

    #[test]
    fn test_missing_tenant_rejected_when_required() -> ApiResult<()> {
        let mut config = test_config();
        config.require_tenant_header = true;
        let token = generate_jwt_token(&config, "user123".to_string(), None, vec![])?;

        assert!(authenticate_jwt(&config, &token, None).is_err());
        assert!(authenticate_api_key(&config, "test_key_123", None).is_err());
        Ok(())
    }

    #[test]
    fn test_authenticate_dispatch() -> ApiResult<()> {
        let config = test_config();
        let tenant = Uuid::now_v7().to_string();

        let ctx = authenticate(&config, Some("test_key_123"), None, Some(&tenant))?;
        assert_eq!(ctx.auth_method, AuthMethod::ApiKey);

        let token = generate_jwt_token(&config, "user123".to_string(), None, vec![])?;
        let bearer = format!("Bearer {}", token);
        let ctx = authenticate(&config, None, Some(&bearer), Some(&tenant))?;
        assert_eq!(ctx.auth_method, AuthMethod::Jwt);

        let err = authenticate(&config, None, Some("Basic abc"), None).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidToken);

        let err = authenticate(&config, None, None, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
        Ok(())
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = test_config();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("test_secret"));
        assert!(!rendered.contains("test_key_123"));
    }

    #[test]
    fn test_production_validation_allows_secure_secret() {
        let _env_lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _env_guard = EnvVarGuard::set("CRM_ENVIRONMENT", Some("production"));

        let mut config = AuthConfig::default();
        config.jwt_secret = JwtSecret::new("a".repeat(48)).expect("secret should be valid");
        assert!(config.validate_for_production().is_ok());
    }

    #[test]
    fn test_production_validation_rejects_insecure_default() {
        let _env_lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _env_guard = EnvVarGuard::set("CRM_ENVIRONMENT", Some("production"));
        let _secret_guard = EnvVarGuard::set("CRM_JWT_SECRET", None);

        let config = AuthConfig::from_env();
        assert!(config.jwt_secret.is_insecure_default());
        assert!(config.validate_for_production().is_err());
    }

    #[test]
    fn test_production_validation_rejects_short_secret() {
        let _env_lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _env_guard = EnvVarGuard::set("CRM_ENVIRONMENT", Some("production"));

        let mut config = AuthConfig::default();
        config.jwt_secret = JwtSecret::new("short".to_string()).expect("secret should be valid");
        assert!(config.validate_for_production().is_err());
    }

    #[test]
    fn test_production_validation_allows_development() {
        let _env_lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _env_guard = EnvVarGuard::set("CRM_ENVIRONMENT", Some("development"));

        assert!(AuthConfig::default().validate_for_production().is_ok());
    }

    #[test]
    fn test_from_env_reads_keys_and_service_role() {
        let _env_lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _keys = EnvVarGuard::set("CRM_API_KEYS", Some("k1, k2,,"));
        let _role = EnvVarGuard::set("CRM_SERVICE_ROLE", Some("sales_rep"));

        let config = AuthConfig::from_env();
        assert!(config.is_valid_api_key("k1"));
        assert!(config.is_valid_api_key("k2"));
        assert_eq!(config.api_keys.len(), 2);
        assert_eq!(config.service_role, Role::SalesRep);
    }

    #[test]
    fn test_pre_epoch_clock_fails_loud() -> ApiResult<()> {
        let mut config = test_config();
        let token = generate_jwt_token(&config, "user123".to_string(), None, vec![])?;

        config.clock = Arc::new(FixedClock(-1));
        let err = validate_jwt_token(&config, &token).unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
        Ok(())
    }
}
