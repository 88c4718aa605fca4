use anyhow::Context;
use serde::Deserialize;

/// Upper bound on `JWT_TTL_MINUTES`: one year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 366;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

/// Argon2 work factor. Fixed for the lifetime of the process.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let backend = match std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".into())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => anyhow::bail!("unknown STORE_BACKEND {other:?}"),
        };

        let database_url = std::env::var("DATABASE_URL").ok();
        if backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STORE_BACKEND=postgres");
        }

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            ttl_minutes: parse_or("JWT_TTL_MINUTES", 60 * 24),
        };
        if jwt.secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }
        if !(1..=MAX_TTL_MINUTES).contains(&jwt.ttl_minutes) {
            anyhow::bail!(
                "JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}, got {}",
                jwt.ttl_minutes
            );
        }

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: parse_or("ARGON2_MEMORY_KIB", defaults.memory_kib),
            iterations: parse_or("ARGON2_ITERATIONS", defaults.iterations),
            parallelism: parse_or("ARGON2_PARALLELISM", defaults.parallelism),
        };

        Ok(Self {
            backend,
            database_url,
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10),
            jwt,
            password,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_secret_is_fatal() {
        temp_env::with_vars(
            [
                ("STORE_BACKEND", Some("memory")),
                ("JWT_SECRET", None::<&str>),
            ],
            || {
                let err = AppConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("JWT_SECRET"));
            },
        );
    }

    #[test]
    fn postgres_backend_requires_database_url() {
        temp_env::with_vars(
            [
                ("STORE_BACKEND", None::<&str>),
                ("DATABASE_URL", None),
                ("JWT_SECRET", Some("s3cret")),
            ],
            || {
                let err = AppConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("DATABASE_URL"));
            },
        );
    }

    #[test]
    fn defaults_to_a_day_long_token() {
        temp_env::with_vars(
            [
                ("STORE_BACKEND", Some("memory")),
                ("JWT_SECRET", Some("s3cret")),
                ("JWT_TTL_MINUTES", None),
                ("ARGON2_ITERATIONS", Some("3")),
            ],
            || {
                let cfg = AppConfig::from_env().expect("config");
                assert_eq!(cfg.backend, StoreBackend::Memory);
                assert_eq!(cfg.jwt.ttl_minutes, 1440);
                assert_eq!(cfg.password.iterations, 3);
                assert_eq!(cfg.password.memory_kib, argon2::Params::DEFAULT_M_COST);
            },
        );
    }

    #[test]
    fn token_lifetime_is_bounded() {
        for ttl in ["0", "-5", "1000000000000"] {
            temp_env::with_vars(
                [
                    ("STORE_BACKEND", Some("memory")),
                    ("JWT_SECRET", Some("s3cret")),
                    ("JWT_TTL_MINUTES", Some(ttl)),
                ],
                || {
                    let err = AppConfig::from_env().unwrap_err();
                    assert!(err.to_string().contains("JWT_TTL_MINUTES"), "ttl {ttl}");
                },
            );
        }

        let max = MAX_TTL_MINUTES.to_string();
        temp_env::with_vars(
            [
                ("STORE_BACKEND", Some("memory")),
                ("JWT_SECRET", Some("s3cret")),
                ("JWT_TTL_MINUTES", Some(max.as_str())),
            ],
            || {
                let cfg = AppConfig::from_env().expect("config");
                assert_eq!(cfg.jwt.ttl_minutes, MAX_TTL_MINUTES);
            },
        );
    }

    #[test]
    fn rejects_unknown_backend() {
        temp_env::with_vars(
            [
                ("STORE_BACKEND", Some("mongo")),
                ("JWT_SECRET", Some("s3cret")),
            ],
            || {
                assert!(AppConfig::from_env().is_err());
            },
        );
    }
}
