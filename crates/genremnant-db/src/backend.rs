use std::sync::Arc;

use serde_json::Value;

use crate::d1::D1Client;
use crate::error::{DbError, Result};
use crate::sqlite::SqliteBackend;

/// One result row, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Interchangeable query executors. Callers only see `query(sql, params)`.
#[derive(Clone)]
pub enum Backend {
    Sqlite(SqliteBackend),
    D1(Arc<D1Client>),
}

impl Backend {
    pub async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>> {
        let result = match self {
            Backend::Sqlite(db) => db.query(sql, params).await,
            Backend::D1(client) => client.query(sql, params).await,
        };
        result.map_err(DbError::classify)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Sqlite(_) => "sqlite",
            Backend::D1(client) => match client.mode() {
                crate::d1::D1Mode::Worker { .. } => "d1-worker",
                crate::d1::D1Mode::Direct { .. } => "d1",
            },
        }
    }
}

#[doc(hidden)]
pub fn to_param<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Build a positional parameter list from anything serializable.
#[macro_export]
macro_rules! params {
    () => { ::std::vec::Vec::<::serde_json::Value>::new() };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::backend::to_param(&$value)),+]
    };
}
