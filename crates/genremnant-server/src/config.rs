use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::warn;

use genremnant_db::BackendConfig;

pub const DEFAULT_CF_API_BASE: &str = "https://api.cloudflare.com/client/v4";

const DEV_SECRET: &str = "dev-secret-change-me";

/// Secrets that ship in sample env files and must never sign real tokens.
const PLACEHOLDER_SECRETS: &[&str] = &[
    DEV_SECRET,
    "change-me",
    "changeme",
    "secret",
    "your-secret-key",
    "your_jwt_secret",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub backend: BackendConfig,
    pub cors_origins: Vec<String>,
    pub admin_email: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), cfg!(debug_assertions))
    }

    /// Build from any key lookup. `allow_dev_secret` permits a missing or
    /// placeholder JWT secret.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>, allow_dev_secret: bool) -> Result<Self> {
        let get = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| get(key).with_context(|| format!("{} must be set", key));

        let host = get("GENREMNANT_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match get("GENREMNANT_PORT") {
            Some(port) => port
                .parse()
                .with_context(|| format!("GENREMNANT_PORT '{}' is not a port number", port))?,
            None => 5000,
        };

        let jwt_secret = jwt_secret(get("GENREMNANT_JWT_SECRET"), allow_dev_secret)?;

        let kind = get("GENREMNANT_DB_BACKEND").unwrap_or_else(|| "sqlite".into());
        let backend = match kind.as_str() {
            "sqlite" => BackendConfig::Sqlite {
                path: PathBuf::from(get("GENREMNANT_DB_PATH").unwrap_or_else(|| "genremnant.db".into())),
            },
            "d1-worker" => BackendConfig::D1Worker {
                url: required("CF_WORKER_URL")?,
                secret: required("WORKER_SECRET")?,
            },
            "d1" => BackendConfig::D1 {
                api_base: get("CF_API_BASE").unwrap_or_else(|| DEFAULT_CF_API_BASE.into()),
                account_id: required("CF_ACCOUNT_ID")?,
                database: required("CF_D1_DB_UUID")?,
                api_token: required("CF_API_TOKEN")?,
            },
            other => bail!("unknown GENREMNANT_DB_BACKEND '{}' (expected sqlite, d1-worker or d1)", other),
        };

        let cors_origins = get("GENREMNANT_CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://localhost:3001".into())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        let admin_email = get("GENREMNANT_ADMIN_EMAIL").map(|email| email.to_lowercase());

        Ok(Self {
            host,
            port,
            jwt_secret,
            backend,
            cors_origins,
            admin_email,
        })
    }
}

fn jwt_secret(value: Option<String>, allow_dev_secret: bool) -> Result<String> {
    match value {
        Some(secret) if PLACEHOLDER_SECRETS.contains(&secret.as_str()) => {
            if !allow_dev_secret {
                bail!("GENREMNANT_JWT_SECRET is a placeholder value; set a real secret");
            }
            warn!("GENREMNANT_JWT_SECRET is a placeholder value, do not use this build in production");
            Ok(secret)
        }
        Some(secret) => Ok(secret),
        None if allow_dev_secret => {
            warn!("GENREMNANT_JWT_SECRET not set, using development secret");
            Ok(DEV_SECRET.into())
        }
        None => bail!("GENREMNANT_JWT_SECRET must be set"),
    }
}
