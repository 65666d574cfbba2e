use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub jwt_secret: String,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub routing_base_url: String,
    pub routing_profile: String,
    pub routing_timeout_ms: u64,
    pub path_cache_ttl_secs: u64,
    pub live_window_secs: u64,
    pub default_search_radius: f64,
    pub max_search_radius: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 从任意键值来源读取配置，便于测试
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));

        let config = Config {
            server_host: required("SERVER_HOST")?,
            server_port: parse_or(&lookup, "SERVER_PORT", 3000)?,
            api_base_uri: lookup("API_BASE_URI").unwrap_or_else(|| "/api".into()),
            jwt_secret: required("JWT_SECRET")?,
            store_backend: parse_or(&lookup, "STORE_BACKEND", StoreBackend::Memory)?,
            database_url: lookup("DATABASE_URL"),
            redis_url: lookup("REDIS_URL"),
            rate_limit_window_secs: parse_or(&lookup, "RATE_LIMIT_WINDOW", 60)?,
            rate_limit_requests: parse_or(&lookup, "RATE_LIMIT_REQUESTS", 100)?,
            routing_base_url: lookup("ROUTING_BASE_URL")
                .unwrap_or_else(|| "https://router.project-osrm.org".into())
                .trim_end_matches('/')
                .to_string(),
            routing_profile: lookup("ROUTING_PROFILE").unwrap_or_else(|| "driving".into()),
            routing_timeout_ms: parse_or(&lookup, "ROUTING_TIMEOUT_MS", 5000)?,
            path_cache_ttl_secs: parse_or(&lookup, "PATH_CACHE_TTL_SECS", 5)?,
            live_window_secs: parse_or(&lookup, "LIVE_WINDOW_SECS", 30 * 60)?,
            default_search_radius: parse_or(&lookup, "DEFAULT_SEARCH_RADIUS", 500.0)?,
            max_search_radius: parse_or(&lookup, "MAX_SEARCH_RADIUS", 5000.0)?,
        };

        if config.store_backend == StoreBackend::Postgres && config.database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        Ok(config)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn routing_timeout(&self) -> Duration {
        Duration::from_millis(self.routing_timeout_ms)
    }

    pub fn path_cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.path_cache_ttl_secs as i64)
    }

    pub fn live_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.live_window_secs as i64)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
