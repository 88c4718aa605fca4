use crate::auth::{JwtKeys, PasswordHasher};
use crate::config::{AppConfig, StoreBackend};
use crate::db;
use crate::users::{repo::UserStore, AccountService, MemoryUserStore, PgUserStore};
use anyhow::Context;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub accounts: AccountService,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn UserStore> = match config.backend {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL must be set when STORE_BACKEND=postgres")?;
                let pool = db::connect(url, config.max_connections).await?;
                db::migrate(&pool).await?;
                Arc::new(PgUserStore::new(pool))
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory user store; data is lost on restart");
                Arc::new(MemoryUserStore::new())
            }
        };
        Self::from_parts(Arc::new(config), store)
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        let keys = JwtKeys::new(&config.jwt);
        let hasher = PasswordHasher::new(&config.password)?;
        let accounts = AccountService::new(store, hasher, keys.clone());
        Ok(Self {
            config,
            keys,
            accounts,
        })
    }

    /// Memory-backed state with a cheap hash work factor.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{JwtConfig, PasswordConfig};

        let config = Arc::new(AppConfig {
            backend: StoreBackend::Memory,
            database_url: None,
            max_connections: 1,
            jwt: JwtConfig {
                secret: "test".into(),
                ttl_minutes: 60 * 24,
            },
            password: PasswordConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
        });
        Self::from_parts(config, Arc::new(MemoryUserStore::new())).expect("test state")
    }
}
