//! Session manager: owns the connection pool and hands out transactional sessions.
//!
//! A [`Session`] is one database transaction on one pooled connection. Callers run
//! their queries against [`Session::conn`] and end it with [`Session::finish`], which
//! commits on `Ok` and rolls back on `Err`. A session dropped without finishing is
//! rolled back by sqlx when the connection returns to the pool.

use crate::error::{AppError, ConfigError};
use crate::migration;
use crate::model::Registry;
use sqlx::any::AnyPoolOptions;
use sqlx::{Any, AnyConnection, AnyPool, Transaction};
use std::sync::RwLock;

/// SQL dialect, derived from the database URL scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        let scheme = url.split(':').next().unwrap_or_default().to_ascii_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(ConfigError::UnsupportedDatabaseUrl(redact(url))),
        }
    }
}

/// Strip credentials before a URL is logged or returned in an error.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

/// Pool sizing, fixed when the manager is initialized.
#[derive(Clone, Debug)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings {
            max_connections: 5,
            min_connections: 0,
        }
    }
}

#[derive(Clone)]
struct Engine {
    pool: AnyPool,
    dialect: Dialect,
}

/// Owner of the connection pool. Construct once, share as `Arc<SessionManager>`.
#[derive(Default)]
pub struct SessionManager {
    engine: RwLock<Option<Engine>>,
}

impl SessionManager {
    /// Uninitialized manager; every session request fails until [`initialize`](Self::initialize).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and initialize in one step.
    pub async fn connect(url: &str, settings: &PoolSettings) -> Result<Self, AppError> {
        let manager = Self::new();
        manager.initialize(url, settings).await?;
        Ok(manager)
    }

    /// Connect the pool. Allowed once per manager.
    pub async fn initialize(&self, url: &str, settings: &PoolSettings) -> Result<(), AppError> {
        if self.is_initialized() {
            return Err(ConfigError::AlreadyInitialized.into());
        }
        let dialect = Dialect::from_url(url)?;
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .connect(url)
            .await?;
        tracing::info!(url = %redact(url), ?dialect, max_connections = settings.max_connections, "database pool ready");
        let rejected = {
            let mut guard = self.engine.write().map_err(|_| AppError::NotInitialized)?;
            if guard.is_some() {
                Some(pool)
            } else {
                *guard = Some(Engine { pool, dialect });
                None
            }
        };
        if let Some(pool) = rejected {
            pool.close().await;
            return Err(ConfigError::AlreadyInitialized.into());
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.read().map(|e| e.is_some()).unwrap_or(false)
    }

    fn engine(&self) -> Result<Engine, AppError> {
        self.engine
            .read()
            .ok()
            .and_then(|e| e.clone())
            .ok_or(AppError::NotInitialized)
    }

    pub fn dialect(&self) -> Result<Dialect, AppError> {
        Ok(self.engine()?.dialect)
    }

    /// Open a session (transaction) on a pooled connection.
    pub async fn begin(&self) -> Result<Session, AppError> {
        let engine = self.engine()?;
        let tx = engine.pool.begin().await?;
        Ok(Session {
            tx,
            dialect: engine.dialect,
        })
    }

    /// Create every registered table and index that does not exist yet, in one transaction.
    pub async fn create_all(&self, registry: &Registry) -> Result<(), AppError> {
        let mut session = self.begin().await?;
        let statements = migration::create_all_statements(registry, session.dialect())?;
        let result = run_statements(&mut session, &statements).await;
        session.finish(result).await?;
        tracing::info!(models = registry.models().len(), "tables created");
        Ok(())
    }

    /// Round-trip to the database; used by readiness checks.
    pub async fn ping(&self) -> Result<(), AppError> {
        let engine = self.engine()?;
        sqlx::query("SELECT 1").fetch_optional(&engine.pool).await?;
        Ok(())
    }

    /// Close the pool. Later session requests fail with `NotInitialized`.
    pub async fn close(&self) {
        let engine = match self.engine.write() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(engine) = engine {
            engine.pool.close().await;
            tracing::info!("database pool closed");
        }
    }
}

async fn run_statements(session: &mut Session, statements: &[String]) -> Result<(), AppError> {
    for sql in statements {
        tracing::debug!(sql = %sql, "ddl");
        sqlx::query(sql).execute(session.conn()).await?;
    }
    Ok(())
}

/// One transaction on one pooled connection.
pub struct Session {
    tx: Transaction<'static, Any>,
    dialect: Dialect,
}

impl Session {
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn conn(&mut self) -> &mut AnyConnection {
        &mut *self.tx
    }

    pub async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }

    /// Commit when `result` is `Ok`, roll back when it is `Err`; returns `result`.
    pub async fn finish<T>(self, result: Result<T, AppError>) -> Result<T, AppError> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }
}
