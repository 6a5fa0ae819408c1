const DEFAULT_URL: &str = "redis://127.0.0.1:6379";

/// Connection settings of the live store.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL.
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
        }
    }
}

impl RedisConfig {
    /// Read `REDIS_URL`, falling back to a local instance.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_URL.to_owned()),
        }
    }
}
