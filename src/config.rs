use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Shortest signing secret accepted for HS256 session tokens.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub role: ServiceRole,
    pub node: NodeConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    /// Maximum decoded upload size in bytes
    pub max_upload_size: u64,
}

/// Which of the network-facing roles this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRole {
    Auth,
    Storage,
    Gateway,
    /// Auth and storage routes on a single listener (development).
    Standalone,
}

impl ServiceRole {
    fn needs_signing_key(self) -> bool {
        !matches!(self, ServiceRole::Gateway)
    }
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory of the content store; one subdirectory per user.
    pub content_root: String,
}

#[derive(Clone)]
pub struct SigningKey {
    pub id: String,
    pub secret: Vec<u8>,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Key used to sign new tokens.
    pub signing_key: SigningKey,
    /// Retired keys still accepted for verification during rotation.
    pub previous_signing_keys: Vec<SigningKey>,
    pub token_ttl_secs: i64,
    pub issuer: String,
    /// Set the `Secure` attribute on the session cookie.
    pub secure_cookies: bool,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,
    pub path_prefix: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub idle_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub auth: BackendConfig,
    pub storage: BackendConfig,
    /// Default backend for requests matching no known route.
    pub static_content: BackendConfig,
}

impl BackendConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            path_prefix: String::new(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path_prefix)
    }

    /// Read `GATEWAY_{name}_*` overrides on top of `defaults`.
    fn from_env(name: &str, defaults: BackendConfig) -> Self {
        let var = |suffix: &str| std::env::var(format!("GATEWAY_{name}_{suffix}")).ok();
        let millis = |suffix: &str, fallback: Duration| {
            var(suffix)
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            path_prefix: var("PATH_PREFIX")
                .map(|p| p.trim_end_matches('/').to_string())
                .unwrap_or(defaults.path_prefix),
            connect_timeout: millis("CONNECT_TIMEOUT_MS", defaults.connect_timeout),
            read_timeout: millis("READ_TIMEOUT_MS", defaults.read_timeout),
            idle_timeout: millis("IDLE_TIMEOUT_MS", defaults.idle_timeout),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            content_root: "./storage".to_string(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            auth: BackendConfig::new("127.0.0.1", 8000),
            storage: BackendConfig::new("127.0.0.1", 8080),
            static_content: BackendConfig::new("127.0.0.1", 8080),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let role = match std::env::var("SERVICE_ROLE")
            .unwrap_or_else(|_| "standalone".to_string())
            .to_lowercase()
            .as_str()
        {
            "auth" => ServiceRole::Auth,
            "storage" => ServiceRole::Storage,
            "gateway" => ServiceRole::Gateway,
            "standalone" => ServiceRole::Standalone,
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown SERVICE_ROLE '{other}' (expected auth, storage, gateway or standalone)"
                )))
            }
        };

        let default_port = match role {
            ServiceRole::Auth => 8000,
            ServiceRole::Gateway => 7000,
            ServiceRole::Storage | ServiceRole::Standalone => 8080,
        };
        let bind_address = std::env::var("BIND_ADDRESS")
            .unwrap_or_else(|_| format!("0.0.0.0:{default_port}"));

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let content_root =
            std::env::var("CONTENT_ROOT").unwrap_or_else(|_| "./storage".to_string());

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50 * 1024 * 1024); // 50MB

        let signing_key = SigningKey {
            id: std::env::var("AUTH_SIGNING_KEY_ID").unwrap_or_else(|_| "primary".to_string()),
            secret: std::env::var("AUTH_SIGNING_KEY")
                .map(String::into_bytes)
                .unwrap_or_default(),
        };

        let previous_signing_keys = match std::env::var("AUTH_PREVIOUS_SIGNING_KEYS") {
            Ok(raw) => parse_previous_keys(&raw)?,
            Err(_) => Vec::new(),
        };

        let token_ttl_secs = std::env::var("AUTH_TOKEN_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(24 * 60 * 60);

        let issuer = std::env::var("AUTH_ISSUER").unwrap_or_else(|_| "filebox".to_string());

        let secure_cookies = std::env::var("SECURE_COOKIES")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let defaults = GatewayConfig::default();
        let gateway = GatewayConfig {
            auth: BackendConfig::from_env("AUTH", defaults.auth),
            storage: BackendConfig::from_env("STORAGE", defaults.storage),
            static_content: BackendConfig::from_env("STATIC", defaults.static_content),
        };

        let config = Config {
            role,
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig { content_root },
            auth: AuthConfig {
                signing_key,
                previous_signing_keys,
                token_ttl_secs,
                issuer,
                secure_cookies,
            },
            gateway,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    /// Request body limit for uploads: the base64 expansion of
    /// `max_upload_size` plus room for the JSON envelope.
    pub fn upload_body_limit(&self) -> usize {
        (self.max_upload_size as usize).div_ceil(3) * 4 + 4096
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.role.needs_signing_key() {
            if self.auth.signing_key.secret.len() < MIN_SIGNING_KEY_LEN {
                return Err(ConfigError::ValidationError(format!(
                    "AUTH_SIGNING_KEY must be set and at least {MIN_SIGNING_KEY_LEN} bytes long"
                )));
            }
            if self.auth.signing_key.id.is_empty() {
                return Err(ConfigError::ValidationError(
                    "AUTH_SIGNING_KEY_ID cannot be empty".to_string(),
                ));
            }
            if self
                .auth
                .previous_signing_keys
                .iter()
                .any(|k| k.id == self.auth.signing_key.id)
            {
                return Err(ConfigError::ValidationError(
                    "AUTH_PREVIOUS_SIGNING_KEYS must not reuse the current key id".to_string(),
                ));
            }
        }

        if self.auth.token_ttl_secs <= 0 {
            return Err(ConfigError::ValidationError(
                "AUTH_TOKEN_TTL_SECS must be positive".to_string(),
            ));
        }

        if !self.auth.secure_cookies {
            tracing::warn!(
                "SECURE_COOKIES is disabled. Session cookies will be sent over plain HTTP."
            );
        }

        Ok(())
    }
}

/// Parse `id:secret,id:secret` into verification-only keys.
fn parse_previous_keys(raw: &str) -> Result<Vec<SigningKey>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (id, secret) = entry.split_once(':').ok_or_else(|| {
                ConfigError::ValidationError(
                    "AUTH_PREVIOUS_SIGNING_KEYS entries must be id:secret".to_string(),
                )
            })?;
            if id.is_empty() || secret.len() < MIN_SIGNING_KEY_LEN {
                return Err(ConfigError::ValidationError(format!(
                    "previous signing key '{id}' needs an id and a secret of at least {MIN_SIGNING_KEY_LEN} bytes"
                )));
            }
            Ok(SigningKey {
                id: id.to_string(),
                secret: secret.as_bytes().to_vec(),
            })
        })
        .collect()
}
