use std::env;

use crate::schema::platform::DATABASE_NAME;

#[derive(Clone, Debug)]
pub struct Config {
    pub db: DbConfig,
    pub dry_run: bool,
}

#[derive(Clone, Debug)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    /// Postgres database to connect to.
    pub pg_database: String,
    /// Namespace the collections are created in.
    pub database: String,
    pub user: String,
    pub password: String,
    pub pool_max: u32,
    pub acquire_timeout_secs: u64,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            db: DbConfig {
                host: env_or("DB_HOST", "localhost"),
                port: env_or_parse("DB_PORT", 5432),
                pg_database: env_or("DB_DATABASE", "postgres"),
                database: env_or("DB_NAME", DATABASE_NAME),
                user: env_or("DB_USER", "postgres"),
                password: env_or("DB_PASSWORD", ""),
                pool_max: env_or_parse("DB_POOL_MAX", 2),
                acquire_timeout_secs: env_or_parse("DB_ACQUIRE_TIMEOUT_SECS", 10),
            },
            dry_run: parse_flag(&env_or("INIT_DRY_RUN", "false")),
        }
    }

    pub fn database_url(&self) -> String {
        if let Ok(url) = env::var("DATABASE_URL") {
            return url;
        }
        if let Ok(url) = env::var("POSTGRES_URL") {
            return url;
        }
        if self.db.password.is_empty() {
            format!(
                "postgres://{}@{}:{}/{}",
                self.db.user, self.db.host, self.db.port, self.db.pg_database
            )
        } else {
            format!(
                "postgres://{}:{}@{}:{}/{}",
                self.db.user, self.db.password, self.db.host, self.db.port, self.db.pg_database
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" YES "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("maybe"));
    }

    #[test]
    fn test_env_or_parse_falls_back_on_garbage() {
        env::set_var("PLATFORM_INIT_TEST_PORT", "not-a-port");
        assert_eq!(env_or_parse("PLATFORM_INIT_TEST_PORT", 5432u16), 5432);
        env::set_var("PLATFORM_INIT_TEST_PORT", "6543");
        assert_eq!(env_or_parse("PLATFORM_INIT_TEST_PORT", 5432u16), 6543);
        env::remove_var("PLATFORM_INIT_TEST_PORT");
    }
}
