/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8000)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `DATABASE_URL`: PostgreSQL connection string (optional; without it an
///   in-memory store is used and nothing survives a restart)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Secret key for token signing (required, 32+ characters)
/// - `JWT_EXP_SECONDS`: Session lifetime (default: 86400)
/// - `REGISTRY_BASE_URL`: Package registry (default: https://pypi.org)
/// - `REGISTRY_MAX_CONCURRENCY`: Concurrent lookups per scan (default: 4)
/// - `REGISTRY_LOOKUP_TIMEOUT_SECS`: Per-package deadline (default: 10)
/// - `BOOTSTRAP_ADMIN_EMAIL`, `BOOTSTRAP_ADMIN_PASSWORD`, `BOOTSTRAP_ADMIN_NAME`:
///   admin account created at startup if missing
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use reltrack_api::config::Config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration (None = in-memory store)
    pub database: Option<DatabaseConfig>,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Package registry configuration
    pub registry: RegistryConfig,

    /// Admin account to ensure at startup
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `["*"]` allows any
    pub cors_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    /// Token lifetime in seconds
    pub expiration_seconds: i64,
}

/// Package registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry base URL
    pub base_url: String,

    /// Maximum concurrent lookups per scan
    pub max_concurrency: usize,

    /// Per-lookup deadline in seconds
    pub lookup_timeout_seconds: u64,
}

impl RegistryConfig {
    /// Per-lookup deadline
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_seconds)
    }
}

/// Admin account created at startup when absent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub name: String,
}

fn parse_or<T>(vars: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match vars(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `JWT_SECRET` is missing or shorter than 32 characters
    /// - A numeric variable doesn't parse
    /// - Only one of the bootstrap admin email/password is set
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_vars(|key| env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_vars(vars: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = vars("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&vars, "API_PORT", 8000u16)?;
        let cors_origins = vars("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let database = match vars("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_or(&vars, "DATABASE_MAX_CONNECTIONS", 10u32)?,
            }),
            None => None,
        };

        let secret = vars("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let expiration_seconds = parse_or(&vars, "JWT_EXP_SECONDS", 86_400i64)?;
        if expiration_seconds <= 0 {
            anyhow::bail!("JWT_EXP_SECONDS must be positive");
        }

        let registry = RegistryConfig {
            base_url: vars("REGISTRY_BASE_URL").unwrap_or_else(|| "https://pypi.org".to_string()),
            max_concurrency: parse_or(&vars, "REGISTRY_MAX_CONCURRENCY", 4usize)?.max(1),
            lookup_timeout_seconds: parse_or(&vars, "REGISTRY_LOOKUP_TIMEOUT_SECS", 10u64)?.max(1),
        };

        let bootstrap_admin = match (vars("BOOTSTRAP_ADMIN_EMAIL"), vars("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                password,
                name: vars("BOOTSTRAP_ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
            }),
            (None, None) => None,
            _ => anyhow::bail!(
                "BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together"
            ),
        };

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
            },
            database,
            jwt: JwtConfig {
                secret,
                expiration_seconds,
            },
            registry,
            bootstrap_admin,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
