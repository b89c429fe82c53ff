/// Server configuration
///
/// All configuration comes from environment variables, read once at startup
/// into an immutable [`Config`] that travels through `AppState`. Nothing
/// reads the environment after startup.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `DATABASE_MAX_CONNECTIONS`: pool size, default 10
/// - `API_HOST` / `API_PORT`: bind address, default 0.0.0.0:8080
/// - `CORS_ORIGINS`: comma-separated allowed origins, default `*`
/// - `JWT_SECRET` (required): signing key, at least 32 bytes
/// - `JWT_TTL_MINUTES`: access token lifetime, default 1440 (one day)
/// - `RUST_LOG`: tracing filter
///
/// # Example
///
/// ```no_run
/// use taskboard_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    pub api: ApiConfig,

    /// Database settings
    pub database: DatabaseConfig,

    /// Token settings
    pub jwt: JwtConfig,

    /// Pagination and analytics bounds
    pub limits: LimitsConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Allowed CORS origins, `"*"` for permissive
    pub cors_origins: Vec<String>,
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub url: String,

    /// Pool size ceiling
    pub max_connections: u32,
}

/// Token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HS256 signing key, at least 32 bytes
    pub secret: String,

    /// Access token lifetime in minutes
    pub ttl_minutes: i64,
}

/// Pagination and analytics bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Page size used when the request supplies none
    pub default_page_size: i64,

    /// Hard cap on page size
    pub max_page_size: i64,

    /// Timeline window used when the request supplies none (days)
    pub timeline_default_days: i64,

    /// Largest accepted timeline window (days)
    pub timeline_max_days: i64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 200,
            timeline_default_days: 7,
            timeline_max_days: 90,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or
    /// have invalid values.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let jwt_ttl_minutes = env::var("JWT_TTL_MINUTES")
            .unwrap_or_else(|_| "1440".to_string())
            .parse::<i64>()?;

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                ttl_minutes: jwt_ttl_minutes,
            },
            limits: LimitsConfig::default(),
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
