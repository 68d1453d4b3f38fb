pub mod backend;
pub mod d1;
pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod sqlite;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

pub use backend::{Backend, Row};
pub use error::{DbError, Result};

/// Which executor to open at startup.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    Sqlite {
        path: PathBuf,
    },
    D1Worker {
        url: String,
        secret: String,
    },
    D1 {
        api_base: String,
        account_id: String,
        database: String,
        api_token: String,
    },
}

/// Typed store over whichever backend was configured.
pub struct Database {
    backend: Backend,
}

impl Database {
    pub async fn connect(config: &BackendConfig) -> Result<Self> {
        let backend = match config {
            BackendConfig::Sqlite { path } => Backend::Sqlite(sqlite::SqliteBackend::open(path)?),
            BackendConfig::D1Worker { url, secret } => {
                info!("Using D1 through worker at {}", url);
                Backend::D1(Arc::new(d1::D1Client::new(d1::D1Mode::Worker {
                    url: url.clone(),
                    secret: secret.clone(),
                })))
            }
            BackendConfig::D1 {
                api_base,
                account_id,
                database,
                api_token,
            } => {
                info!("Using D1 database {} in account {}", database, account_id);
                Backend::D1(Arc::new(d1::D1Client::new(d1::D1Mode::Direct {
                    api_base: api_base.clone(),
                    account_id: account_id.clone(),
                    database: database.clone(),
                    api_token: api_token.clone(),
                })))
            }
        };

        Self::with_backend(backend).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        Self::with_backend(Backend::Sqlite(sqlite::SqliteBackend::open_in_memory()?)).await
    }

    /// Wrap an existing backend and bring its schema up to date.
    pub async fn with_backend(backend: Backend) -> Result<Self> {
        migrations::run(&backend).await?;
        Ok(Self { backend })
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>> {
        self.backend.query(sql, params).await
    }

    pub(crate) async fn fetch_all<T: DeserializeOwned>(&self, sql: &str, params: Vec<Value>) -> Result<Vec<T>> {
        self.query(sql, params)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(Value::Object(row)).map_err(DbError::from))
            .collect()
    }

    pub(crate) async fn fetch_optional<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Option<T>> {
        match self.query(sql, params).await?.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(Value::Object(row))?)),
            None => Ok(None),
        }
    }

    /// Run a write. With a `RETURNING` clause the result is the number of rows touched.
    pub(crate) async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<usize> {
        Ok(self.query(sql, params).await?.len())
    }
}

/// Stored timestamp text: RFC 3339, UTC, microseconds. Sorts lexicographically.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now() -> String {
    timestamp(Utc::now())
}
