use serde::Deserialize;
use shared::jwt::{JwtConfig, JwtError};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    /// JWT authentication configuration
    pub jwt: JwtAuthConfig,
    pub event: EventConfig,
    #[serde(default)]
    pub ticket: TicketConfig,
    #[serde(default)]
    pub checkin: CheckInConfig,
    /// First super_admin, created at startup when none exists
    #[serde(default)]
    pub admin: AdminBootstrapConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl From<&DatabaseConfig> for persistence::db::DatabaseConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connect_timeout_secs: config.connect_timeout_secs,
            idle_timeout_secs: config.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Public registrations accepted per client IP per minute (0 disables)
    #[serde(default = "default_registration_rate_limit")]
    pub registration_rate_limit_per_minute: u32,

    /// Reverse proxies whose `X-Forwarded-For` header is believed
    #[serde(default)]
    pub trusted_proxies: Vec<String>,

    /// Send Strict-Transport-Security; enable only behind TLS termination
    #[serde(default)]
    pub hsts_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtAuthConfig {
    /// RSA private key in PEM format for signing tokens
    #[serde(default)]
    pub private_key: String,

    /// RSA public key in PEM format for verifying tokens
    #[serde(default)]
    pub public_key: String,

    /// Shared HS256 secret, used only when no RSA key pair is configured
    #[serde(default)]
    pub secret: String,

    /// Access token expiration in seconds (default: 3600 = 1 hour)
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: i64,

    /// Refresh token expiration in seconds (default: 604800 = 7 days)
    #[serde(default = "default_refresh_token_expiry")]
    pub refresh_token_expiry_secs: i64,

    /// Leeway in seconds for clock skew tolerance
    #[serde(default = "default_jwt_leeway")]
    pub leeway_secs: u64,
}

impl JwtAuthConfig {
    fn has_rsa_keys(&self) -> bool {
        !self.private_key.is_empty() && !self.public_key.is_empty()
    }

    /// Builds the signer. An RSA key pair wins over the shared secret.
    pub fn build(&self) -> Result<JwtConfig, JwtError> {
        if self.has_rsa_keys() {
            JwtConfig::with_rsa_keys(
                &self.private_key,
                &self.public_key,
                self.access_token_expiry_secs,
                self.refresh_token_expiry_secs,
                self.leeway_secs,
            )
        } else {
            JwtConfig::with_secret(
                &self.secret,
                self.access_token_expiry_secs,
                self.refresh_token_expiry_secs,
                self.leeway_secs,
            )
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventConfig {
    /// Event name embedded in every ticket
    #[serde(default = "default_event_identifier")]
    pub identifier: String,

    #[serde(default = "default_max_capacity")]
    pub max_capacity: i64,

    /// Upper bound on any single store call
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

impl EventConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketConfig {
    #[serde(default = "default_qr_min_dimension")]
    pub qr_min_dimension: u32,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            qr_min_dimension: default_qr_min_dimension(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckInConfig {
    /// Scanner sessions untouched for this long are closed
    #[serde(default = "default_session_idle_timeout")]
    pub session_idle_timeout_secs: u64,
}

impl Default for CheckInConfig {
    fn default() -> Self {
        Self {
            session_idle_timeout_secs: default_session_idle_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminBootstrapConfig {
    #[serde(default)]
    pub bootstrap_email: String,

    #[serde(default)]
    pub bootstrap_password: String,

    #[serde(default = "default_bootstrap_display_name")]
    pub bootstrap_display_name: String,
}

impl Default for AdminBootstrapConfig {
    fn default() -> Self {
        Self {
            bootstrap_email: String::new(),
            bootstrap_password: String::new(),
            bootstrap_display_name: default_bootstrap_display_name(),
        }
    }
}

impl AdminBootstrapConfig {
    pub fn is_configured(&self) -> bool {
        !self.bootstrap_email.is_empty() && !self.bootstrap_password.is_empty()
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_registration_rate_limit() -> u32 {
    30
}

fn default_access_token_expiry() -> i64 {
    3600 // 1 hour
}

fn default_refresh_token_expiry() -> i64 {
    604800 // 7 days
}

fn default_jwt_leeway() -> u64 {
    30
}

fn default_event_identifier() -> String {
    domain::services::ticket_codec::DEFAULT_EVENT_IDENTIFIER.to_string()
}
fn default_max_capacity() -> i64 {
    1500
}
fn default_store_timeout_ms() -> u64 {
    5000
}
fn default_qr_min_dimension() -> u32 {
    domain::services::ticket_codec::DEFAULT_MIN_DIMENSION
}
fn default_session_idle_timeout() -> u64 {
    300
}
fn default_bootstrap_display_name() -> String {
    "Administrator".to_string()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with ER__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("ER").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Built entirely from embedded defaults and overrides so tests do not
    /// depend on config files.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30

            [database]
            url = ""
            max_connections = 20
            min_connections = 2
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []
            registration_rate_limit_per_minute = 30

            [jwt]
            secret = "test-secret-0123456789abcdef"
            access_token_expiry_secs = 3600
            refresh_token_expiry_secs = 604800
            leeway_secs = 30

            [event]
            identifier = "Test Event"
            max_capacity = 1500
            store_timeout_ms = 5000
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        // Validation is left to the caller so tests can build partial configs
        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "ER__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.event.max_capacity <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "event.max_capacity must be positive".to_string(),
            ));
        }

        if self.event.store_timeout_ms == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "event.store_timeout_ms cannot be 0".to_string(),
            ));
        }

        if !self.jwt.has_rsa_keys() && self.jwt.secret.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "jwt.private_key and jwt.public_key, or jwt.secret".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigValidationError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| {
                ConfigValidationError::InvalidValue(format!("Invalid socket address: {}", e))
            })
    }
}
