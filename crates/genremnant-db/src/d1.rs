//! Remote executor for a Cloudflare D1 database, either through a secured
//! worker proxy or straight against the REST query API.

use std::sync::RwLock;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::Row;
use crate::error::{DbError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Fields a database listing entry may identify itself by.
const DATABASE_MATCH_FIELDS: &[&str] = &["id", "uuid", "name", "database_name", "database_id"];
/// Fields preferred, in order, when picking the id to query a matched database with.
const DATABASE_ID_FIELDS: &[&str] = &["uuid", "id", "database_id", "databaseId", "name", "database_name"];
const ACCOUNT_ID_FIELDS: &[&str] = &["id", "account_id", "accountId"];

#[derive(Debug, Clone)]
pub enum D1Mode {
    /// `POST {url}/query` guarded by the `x-worker-secret` header.
    Worker { url: String, secret: String },
    /// Direct REST API access. `database` may be a database id or its name.
    Direct {
        api_base: String,
        account_id: String,
        database: String,
        api_token: String,
    },
}

/// Account/database pair queries are sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct D1Target {
    pub account_id: String,
    pub database_id: String,
}

pub struct D1Client {
    http: reqwest::Client,
    mode: D1Mode,
    /// Target found by discovery after the configured one was rejected.
    resolved: RwLock<Option<D1Target>>,
}

#[derive(Serialize)]
struct QueryBody<'a> {
    sql: &'a str,
    params: &'a [Value],
}

impl D1Client {
    pub fn new(mode: D1Mode) -> Self {
        Self {
            http: reqwest::Client::new(),
            mode,
            resolved: RwLock::new(None),
        }
    }

    pub fn mode(&self) -> &D1Mode {
        &self.mode
    }

    /// Target currently in use for direct mode, `None` in worker mode.
    pub fn target(&self) -> Option<D1Target> {
        match &self.mode {
            D1Mode::Worker { .. } => None,
            D1Mode::Direct {
                account_id,
                database,
                ..
            } => {
                let resolved = self.resolved.read().ok().and_then(|r| r.clone());
                Some(resolved.unwrap_or_else(|| D1Target {
                    account_id: account_id.clone(),
                    database_id: database.clone(),
                }))
            }
        }
    }

    pub async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>> {
        match &self.mode {
            D1Mode::Worker { url, secret } => self.query_worker(url, secret, sql, &params).await,
            D1Mode::Direct { .. } => self.query_direct(sql, &params).await,
        }
    }

    async fn query_worker(&self, url: &str, secret: &str, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let res = self
            .http
            .post(format!("{}/query", url.trim_end_matches('/')))
            .header("x-worker-secret", secret)
            .json(&QueryBody { sql, params })
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(DbError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = res.json().await?;
        worker_rows(json)
    }

    async fn query_direct(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let Some(target) = self.target() else {
            return Err(DbError::Config("direct query without direct configuration".into()));
        };

        let res = self.post_query(&target, sql, params).await?;
        let res = if res.status().is_success() {
            res
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            if status != StatusCode::NOT_FOUND && !body.contains("Route not found") {
                return Err(DbError::Http {
                    status: status.as_u16(),
                    body,
                });
            }

            warn!(
                "D1 query route not found for database '{}' in account {}, resolving",
                target.database_id, target.account_id
            );
            let resolved = self.discover().await?;
            info!(
                "Resolved D1 database to {} in account {}",
                resolved.database_id, resolved.account_id
            );
            if let Ok(mut slot) = self.resolved.write() {
                *slot = Some(resolved.clone());
            }

            let retry = self.post_query(&resolved, sql, params).await?;
            if !retry.status().is_success() {
                let status = retry.status();
                let body = retry.text().await.unwrap_or_default();
                return Err(DbError::Http {
                    status: status.as_u16(),
                    body,
                });
            }
            retry
        };

        let json: Value = res.json().await?;
        check_api_success(&json)?;
        Ok(normalize_rows(json))
    }

    async fn post_query(&self, target: &D1Target, sql: &str, params: &[Value]) -> Result<reqwest::Response> {
        let (api_base, api_token) = self.direct_credentials()?;
        let url = format!(
            "{}/accounts/{}/d1/databases/{}/query",
            api_base, target.account_id, target.database_id
        );
        Ok(self
            .http
            .post(url)
            .bearer_auth(api_token)
            .json(&QueryBody { sql, params })
            .send()
            .await?)
    }

    /// Find the configured database: first among the configured account's
    /// databases, then across every account the token can see.
    async fn discover(&self) -> Result<D1Target> {
        let D1Mode::Direct {
            account_id,
            database,
            ..
        } = &self.mode
        else {
            return Err(DbError::Config("discovery requires direct configuration".into()));
        };

        let list_err = match self.list_databases(account_id).await {
            Ok(entries) => {
                return find_database(&entries, database)
                    .map(|database_id| D1Target {
                        account_id: account_id.clone(),
                        database_id,
                    })
                    .ok_or_else(|| {
                        DbError::DatabaseNotFound(format!(
                            "D1 database '{}' not found in account {}. Available databases: {}",
                            database,
                            account_id,
                            preview(&entries)
                        ))
                    });
            }
            Err(e) => e,
        };

        debug!("Listing databases for account {} failed ({}), listing accounts", account_id, list_err);
        let accounts = self.list_accounts().await.map_err(|acc_err| {
            DbError::DatabaseNotFound(format!(
                "D1 database list failed: {}. Also failed to list accounts: {}",
                list_err, acc_err
            ))
        })?;

        for account in &accounts {
            let entries = match self.list_databases(account).await {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("Skipping account {}: {}", account, e);
                    continue;
                }
            };
            if let Some(database_id) = find_database(&entries, database) {
                return Ok(D1Target {
                    account_id: account.clone(),
                    database_id,
                });
            }
        }

        Err(DbError::DatabaseNotFound(format!(
            "D1 database '{}' not found in account {} or in any of the accounts visible to the token: {:?}",
            database, account_id, accounts
        )))
    }

    async fn list_databases(&self, account_id: &str) -> Result<Vec<Value>> {
        let (api_base, _) = self.direct_credentials()?;
        let json = self
            .get_json(&format!("{}/accounts/{}/d1/databases", api_base, account_id))
            .await?;
        Ok(listing_entries(json, &["databases"]))
    }

    async fn list_accounts(&self) -> Result<Vec<String>> {
        let (api_base, _) = self.direct_credentials()?;
        let json = self.get_json(&format!("{}/accounts", api_base)).await?;
        Ok(listing_entries(json, &[])
            .iter()
            .filter_map(|entry| first_string(entry, ACCOUNT_ID_FIELDS))
            .collect())
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let (_, api_token) = self.direct_credentials()?;
        let res = self.http.get(url).bearer_auth(api_token).send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(DbError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(res.json().await?)
    }

    fn direct_credentials(&self) -> Result<(&str, &str)> {
        match &self.mode {
            D1Mode::Direct {
                api_base,
                api_token,
                ..
            } => Ok((api_base.trim_end_matches('/'), api_token.as_str())),
            D1Mode::Worker { .. } => Err(DbError::Config("worker mode has no API credentials".into())),
        }
    }
}

fn worker_rows(json: Value) -> Result<Vec<Row>> {
    if json.get("success").and_then(Value::as_bool) != Some(true) {
        let message = match json.get("error") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => json.to_string(),
        };
        return Err(DbError::Api(message));
    }

    // SELECTs come back as `results`, writes as `result`
    match (json.get("results"), json.get("result")) {
        (Some(Value::Array(items)), _) => Ok(into_rows(items.clone())),
        (_, Some(Value::Array(items))) => Ok(into_rows(items.clone())),
        (_, Some(Value::Object(obj))) => Ok(vec![obj.clone()]),
        _ => Ok(Vec::new()),
    }
}

fn check_api_success(json: &Value) -> Result<()> {
    if json.get("success") != Some(&Value::Bool(false)) {
        return Ok(());
    }

    let errors = json
        .get("errors")
        .or_else(|| json.get("result").and_then(|r| r.get("errors")));
    let message = match errors {
        Some(Value::Array(errs)) => errs
            .iter()
            .map(|e| match e.get("message") {
                Some(Value::String(m)) => m.clone(),
                _ => e.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
        None => json.to_string(),
    };
    Err(DbError::Api(message))
}

/// Flatten the shapes the query API has been seen to answer with into a row
/// list: a bare array, `results`, `result.results`, an array of statement
/// results each carrying `results`, a plain `result` array, a single `result`
/// object, or any other object as one row.
pub fn normalize_rows(json: Value) -> Vec<Row> {
    match json {
        Value::Array(items) => into_rows(items),
        Value::Object(mut obj) => {
            if let Some(Value::Array(items)) = obj.get("results") {
                return into_rows(items.clone());
            }
            match obj.remove("result") {
                Some(Value::Object(mut result)) => match result.remove("results") {
                    Some(Value::Array(items)) => into_rows(items),
                    Some(other) => {
                        result.insert("results".into(), other);
                        vec![result]
                    }
                    None => vec![result],
                },
                Some(Value::Array(items)) => {
                    let batched = !items.is_empty()
                        && items
                            .iter()
                            .all(|item| item.get("results").is_some_and(Value::is_array));
                    if batched {
                        items
                            .into_iter()
                            .flat_map(|mut item| match item.get_mut("results").map(Value::take) {
                                Some(Value::Array(rows)) => into_rows(rows),
                                _ => Vec::new(),
                            })
                            .collect()
                    } else {
                        into_rows(items)
                    }
                }
                Some(other) => {
                    obj.insert("result".into(), other);
                    vec![obj]
                }
                None => vec![obj],
            }
        }
        _ => Vec::new(),
    }
}

fn into_rows(items: Vec<Value>) -> Vec<Row> {
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(row) => Some(row),
            _ => None,
        })
        .collect()
}

/// Entries of a listing response, looked up under `result.<nested>`, `result`,
/// `<nested>`, `results`, or the body itself. Objects are read as their values.
fn listing_entries(json: Value, nested: &[&str]) -> Vec<Value> {
    let mut candidates: Vec<Option<&Value>> = Vec::new();
    let result = json.get("result");
    for key in nested {
        candidates.push(result.and_then(|r| r.get(*key)));
    }
    candidates.push(result);
    for key in nested {
        candidates.push(json.get(*key));
    }
    candidates.push(json.get("results"));
    candidates.push(Some(&json));

    let picked = candidates
        .into_iter()
        .flatten()
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or(Value::Null);

    match picked {
        Value::Array(items) => items,
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        _ => Vec::new(),
    }
}

fn find_database(entries: &[Value], wanted: &str) -> Option<String> {
    entries
        .iter()
        .find(|entry| {
            DATABASE_MATCH_FIELDS
                .iter()
                .any(|field| entry.get(*field).and_then(Value::as_str) == Some(wanted))
        })
        .and_then(|entry| first_string(entry, DATABASE_ID_FIELDS))
}

fn first_string(entry: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|field| entry.get(*field).and_then(Value::as_str))
        .map(str::to_string)
}

fn preview(entries: &[Value]) -> String {
    let text = Value::Array(entries.to_vec()).to_string();
    text.chars().take(1000).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn direct(server: &MockServer, database: &str) -> D1Client {
        D1Client::new(D1Mode::Direct {
            api_base: server.uri(),
            account_id: "acc".into(),
            database: database.into(),
            api_token: "token".into(),
        })
    }

    #[test]
    fn normalizes_every_observed_shape() {
        let row = json!({ "id": 1 });
        let shapes = [
            json!([row]),
            json!({ "results": [row] }),
            json!({ "result": { "results": [row] } }),
            json!({ "success": true, "result": [{ "results": [row], "success": true, "meta": {} }] }),
            json!({ "result": [row] }),
        ];
        for shape in shapes {
            let rows = normalize_rows(shape.clone());
            assert_eq!(rows.len(), 1, "shape {}", shape);
            assert_eq!(rows[0]["id"], json!(1), "shape {}", shape);
        }

        let single = normalize_rows(json!({ "result": { "changes": 1 } }));
        assert_eq!(single[0]["changes"], json!(1));

        let wrapped = normalize_rows(json!({ "changes": 2 }));
        assert_eq!(wrapped[0]["changes"], json!(2));

        assert!(normalize_rows(json!("nope")).is_empty());
    }

    #[test]
    fn batched_statement_results_are_flattened_in_order() {
        let rows = normalize_rows(json!({
            "result": [
                { "results": [{ "n": 1 }, { "n": 2 }] },
                { "results": [{ "n": 3 }] }
            ]
        }));
        let ns: Vec<i64> = rows.iter().map(|r| r["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![1, 2, 3]);
    }

    #[test]
    fn finds_database_by_name_and_prefers_uuid() {
        let entries = vec![
            json!({ "uuid": "u-1", "name": "other" }),
            json!({ "uuid": "u-2", "name": "genremnant" }),
        ];
        assert_eq!(find_database(&entries, "genremnant"), Some("u-2".to_string()));
        assert_eq!(find_database(&entries, "u-1"), Some("u-1".to_string()));
        assert_eq!(find_database(&entries, "missing"), None);
    }

    #[test]
    fn listing_entries_accepts_nested_and_keyed_shapes() {
        let nested = listing_entries(json!({ "result": { "databases": [{ "id": "a" }] } }), &["databases"]);
        assert_eq!(nested.len(), 1);

        let keyed = listing_entries(json!({ "result": { "x": { "id": "a" }, "y": { "id": "b" } } }), &[]);
        assert_eq!(keyed.len(), 2);
    }

    #[tokio::test]
    async fn direct_query_returns_rows() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts/acc/d1/databases/db-1/query"))
            .and(header("authorization", "Bearer token"))
            .and(body_json(json!({ "sql": "SELECT 1 AS one", "params": [] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": [{ "results": [{ "one": 1 }], "success": true }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = direct(&server, "db-1");
        let rows = client.query("SELECT 1 AS one", vec![]).await.unwrap();
        assert_eq!(rows[0]["one"], json!(1));
    }

    #[tokio::test]
    async fn route_not_found_resolves_database_by_name_and_caches_it() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts/acc/d1/databases/genremnant/query"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Route not found"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/accounts/acc/d1/databases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": [{ "uuid": "abc-123", "name": "genremnant" }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/accounts/acc/d1/databases/abc-123/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": [{ "results": [{ "ok": 1 }] }]
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = direct(&server, "genremnant");
        client.query("SELECT 1", vec![]).await.unwrap();
        assert_eq!(
            client.target(),
            Some(D1Target {
                account_id: "acc".into(),
                database_id: "abc-123".into()
            })
        );

        // Second query goes straight to the resolved database
        let rows = client.query("SELECT 1", vec![]).await.unwrap();
        assert_eq!(rows[0]["ok"], json!(1));
    }

    #[tokio::test]
    async fn falls_back_to_searching_all_accounts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts/acc/d1/databases/genremnant/query"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/accounts/acc/d1/databases"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{ "id": "empty" }, { "id": "real" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/accounts/empty/d1/databases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [] })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/accounts/real/d1/databases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{ "uuid": "db-9", "name": "genremnant" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/accounts/real/d1/databases/db-9/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": [{ "results": [] }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = direct(&server, "genremnant");
        let rows = client.query("SELECT 1", vec![]).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(client.target().unwrap().account_id, "real");
    }

    #[tokio::test]
    async fn unresolvable_database_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Route not found"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/accounts/acc/d1/databases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [{ "uuid": "x", "name": "other" }] })))
            .mount(&server)
            .await;

        let err = direct(&server, "genremnant").query("SELECT 1", vec![]).await.unwrap_err();
        assert!(matches!(err, DbError::DatabaseNotFound(_)), "{err}");
    }

    #[tokio::test]
    async fn server_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let err = direct(&server, "db").query("SELECT 1", vec![]).await.unwrap_err();
        assert!(matches!(err, DbError::Http { status: 500, .. }));
    }

    #[tokio::test]
    async fn api_failure_envelope_becomes_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "errors": [{ "code": 7500, "message": "no such table: users" }]
            })))
            .mount(&server)
            .await;

        let err = direct(&server, "db").query("SELECT * FROM users", vec![]).await.unwrap_err();
        match err {
            DbError::Api(message) => assert_eq!(message, "no such table: users"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn worker_mode_sends_secret_and_reads_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(header("x-worker-secret", "s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "results": [{ "id": "a" }, { "id": "b" }]
            })))
            .mount(&server)
            .await;

        let client = D1Client::new(D1Mode::Worker {
            url: format!("{}/", server.uri()),
            secret: "s3cret".into(),
        });
        let rows = client.query("SELECT id FROM users", vec![]).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(client.target().is_none());
    }

    #[tokio::test]
    async fn worker_write_result_is_wrapped_and_failure_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({ "sql": "DELETE FROM t", "params": [] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": { "meta": { "changes": 3 } }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_json(json!({ "sql": "BAD", "params": [] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": "syntax error"
            })))
            .mount(&server)
            .await;

        let client = D1Client::new(D1Mode::Worker {
            url: server.uri(),
            secret: "s".into(),
        });
        let rows = client.query("DELETE FROM t", vec![]).await.unwrap();
        assert_eq!(rows[0]["meta"]["changes"], json!(3));

        let err = client.query("BAD", vec![]).await.unwrap_err();
        assert!(matches!(err, DbError::Api(ref m) if m == "syntax error"));
    }
}
