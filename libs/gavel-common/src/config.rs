// Service configuration shared by the API and the worker

use std::time::Duration;

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_API_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub redis_url: String,
    pub api_addr: String,
    pub worker_concurrency: usize,
    pub result_ttl: Duration,
}

impl ServiceConfig {
    /// Read settings from the environment, falling back to local defaults
    pub fn from_env() -> Self {
        Self {
            redis_url: env_or("REDIS_URL", DEFAULT_REDIS_URL),
            api_addr: env_or("GAVEL_API_ADDR", DEFAULT_API_ADDR),
            worker_concurrency: env_parse("WORKER_CONCURRENCY").unwrap_or(2).max(1),
            result_ttl: Duration::from_secs(env_parse("RESULT_TTL_SECONDS").unwrap_or(86400)),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            api_addr: DEFAULT_API_ADDR.to_string(),
            worker_concurrency: 2,
            result_ttl: Duration::from_secs(86400),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
