use std::env;
use std::net::SocketAddr;

#[derive(Clone)]
pub struct Config {
    // Bootstrap super-admin identity
    pub admin_email: String,
    pub admin_password: String,
    pub admin_full_name: String,

    // Redis
    pub redis_url: String,

    // JWT
    pub jwt_secret: String,

    // Server
    pub bind_addr: SocketAddr,

    // TTLs (in seconds)
    pub session_ttl_secs: u64,
    pub reset_token_ttl_secs: u64,

    // Rate limiting (sliding window)
    pub rate_limit_window_ms: u64,
    pub rate_limit_auth_max: u64,
    pub rate_limit_reset_max: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("admin_email", &self.admin_email)
            .field("admin_password", &"[REDACTED]")
            .field("admin_full_name", &self.admin_full_name)
            .field("redis_url", &"[REDACTED]")
            .field("jwt_secret", &"[REDACTED]")
            .field("bind_addr", &self.bind_addr)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("reset_token_ttl_secs", &self.reset_token_ttl_secs)
            .field("rate_limit_window_ms", &self.rate_limit_window_ms)
            .field("rate_limit_auth_max", &self.rate_limit_auth_max)
            .field("rate_limit_reset_max", &self.rate_limit_reset_max)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file, but don't fail if it doesn't exist
        // (env vars may be set directly in production)
        let _ = dotenvy::dotenv();

        // JWT_SECRET is required and must be long enough for HS256
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingVar("JWT_SECRET".to_string()))?;
        if jwt_secret.len() < 32 {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                "must be at least 32 bytes".to_string(),
            ));
        }

        // Redis — required to prevent silent unauthenticated connections
        let redis_url =
            env::var("REDIS_URL").map_err(|_| ConfigError::MissingVar("REDIS_URL".to_string()))?;

        // Bootstrap super-admin credentials
        let admin_email = env::var("ADMIN_EMAIL")
            .map_err(|_| ConfigError::MissingVar("ADMIN_EMAIL".to_string()))?;
        if !admin_email.contains('@') {
            return Err(ConfigError::InvalidValue(
                "ADMIN_EMAIL".to_string(),
                "must be an email address".to_string(),
            ));
        }

        let admin_password = env::var("ADMIN_PASSWORD")
            .map_err(|_| ConfigError::MissingVar("ADMIN_PASSWORD".to_string()))?;
        if admin_password.len() < 8 {
            return Err(ConfigError::InvalidValue(
                "ADMIN_PASSWORD".to_string(),
                "must be at least 8 characters".to_string(),
            ));
        }

        let admin_full_name =
            env::var("ADMIN_FULL_NAME").unwrap_or_else(|_| "Administrator".to_string());

        // Server
        let bind_addr_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?;

        // TTLs: sessions live 15 days, reset tokens 1 hour
        let session_ttl_secs = parse_env_or_default("SESSION_TTL_SECS", 1_296_000)?;
        let reset_token_ttl_secs = parse_env_or_default("RESET_TOKEN_TTL_SECS", 3_600)?;

        // Rate limiting
        let rate_limit_window_ms = parse_env_or_default("RATE_LIMIT_WINDOW_MS", 60_000)?;
        let rate_limit_auth_max = parse_env_or_default("RATE_LIMIT_AUTH_MAX", 5)?;
        let rate_limit_reset_max = parse_env_or_default("RATE_LIMIT_RESET_MAX", 3)?;

        if rate_limit_window_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_WINDOW_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            admin_email,
            admin_password,
            admin_full_name,
            redis_url,
            jwt_secret,
            bind_addr,
            session_ttl_secs,
            reset_token_ttl_secs,
            rate_limit_window_ms,
            rate_limit_auth_max,
            rate_limit_reset_max,
        })
    }
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Use a mutex to ensure tests run serially since they modify global env vars.
    // unwrap_or_else handles poison from prior panics.
    static TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn lock_test() -> std::sync::MutexGuard<'static, ()> {
        TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn clear_test_env() {
        env::remove_var("JWT_SECRET");
        env::remove_var("REDIS_URL");
        env::remove_var("ADMIN_EMAIL");
        env::remove_var("ADMIN_PASSWORD");
        env::remove_var("ADMIN_FULL_NAME");
        env::remove_var("BIND_ADDR");
        env::remove_var("SESSION_TTL_SECS");
        env::remove_var("RESET_TOKEN_TTL_SECS");
        env::remove_var("RATE_LIMIT_WINDOW_MS");
        env::remove_var("RATE_LIMIT_AUTH_MAX");
        env::remove_var("RATE_LIMIT_RESET_MAX");
    }

    fn set_required_env() {
        env::set_var("JWT_SECRET", TEST_SECRET);
        env::set_var("REDIS_URL", "redis://127.0.0.1:6379");
        env::set_var("ADMIN_EMAIL", "admin@example.com");
        env::set_var("ADMIN_PASSWORD", "correct-horse");
    }

    #[test]
    fn test_parse_env_or_default() {
        let _guard = lock_test();

        env::set_var("TEST_U64", "12345");
        let result: Result<u64, ConfigError> = parse_env_or_default("TEST_U64", 100);
        assert_eq!(result.unwrap(), 12345);

        env::remove_var("TEST_U64");
        let result: Result<u64, ConfigError> = parse_env_or_default("TEST_U64", 100);
        assert_eq!(result.unwrap(), 100);
    }

    #[test]
    fn test_missing_jwt_secret() {
        let _guard = lock_test();
        clear_test_env();

        env::set_var("REDIS_URL", "redis://127.0.0.1:6379");
        env::set_var("ADMIN_EMAIL", "admin@example.com");
        env::set_var("ADMIN_PASSWORD", "correct-horse");

        let result = Config::from_env();
        assert!(result.is_err());

        clear_test_env();
    }

    #[test]
    fn test_short_jwt_secret() {
        let _guard = lock_test();
        clear_test_env();

        set_required_env();
        env::set_var("JWT_SECRET", "too-short");

        let result = Config::from_env();
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "JWT_SECRET"
        ));

        clear_test_env();
    }

    #[test]
    fn test_invalid_admin_email() {
        let _guard = lock_test();
        clear_test_env();

        set_required_env();
        env::set_var("ADMIN_EMAIL", "not-an-email");

        let result = Config::from_env();
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "ADMIN_EMAIL"
        ));

        clear_test_env();
    }

    #[test]
    fn test_short_admin_password() {
        let _guard = lock_test();
        clear_test_env();

        set_required_env();
        env::set_var("ADMIN_PASSWORD", "short");

        let result = Config::from_env();
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "ADMIN_PASSWORD"
        ));

        clear_test_env();
    }

    #[test]
    fn test_invalid_socket_addr() {
        let _guard = lock_test();
        clear_test_env();

        set_required_env();
        env::set_var("BIND_ADDR", "invalid_address");

        let result = Config::from_env();
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_, _)));

        clear_test_env();
    }

    #[test]
    fn test_zero_rate_limit_window() {
        let _guard = lock_test();
        clear_test_env();

        set_required_env();
        env::set_var("RATE_LIMIT_WINDOW_MS", "0");

        let result = Config::from_env();
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "RATE_LIMIT_WINDOW_MS"
        ));

        clear_test_env();
    }

    #[test]
    fn test_config_defaults() {
        let _guard = lock_test();
        clear_test_env();

        set_required_env();
        env::set_var("BIND_ADDR", "0.0.0.0:3000");

        let config = Config::from_env().unwrap();

        assert_eq!(config.admin_email, "admin@example.com");
        assert_eq!(config.admin_full_name, "Administrator");
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:3000");
        assert_eq!(config.session_ttl_secs, 1_296_000);
        assert_eq!(config.reset_token_ttl_secs, 3_600);
        assert_eq!(config.rate_limit_window_ms, 60_000);
        assert_eq!(config.rate_limit_auth_max, 5);
        assert_eq!(config.rate_limit_reset_max, 3);

        clear_test_env();
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let _guard = lock_test();
        clear_test_env();

        set_required_env();
        let config = Config::from_env().unwrap();
        let debug = format!("{:?}", config);

        assert!(!debug.contains(TEST_SECRET));
        assert!(!debug.contains("correct-horse"));
        assert!(debug.contains("[REDACTED]"));

        clear_test_env();
    }
}
