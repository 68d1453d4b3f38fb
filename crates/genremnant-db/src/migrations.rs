use serde_json::Value;
use tracing::info;

use crate::backend::Backend;
use crate::error::Result;

// Single statements only: the remote executor runs one statement per request.
const V1_INITIAL_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id                          TEXT PRIMARY KEY,
        email                       TEXT NOT NULL UNIQUE,
        display_name                TEXT NOT NULL,
        password_hash               TEXT NOT NULL,
        role                        TEXT NOT NULL DEFAULT 'regular',
        status                      TEXT NOT NULL DEFAULT 'active',
        contributor_request_status  TEXT,
        rejection_feedback          TEXT,
        whatsapp                    TEXT,
        instagram                   TEXT,
        tiktok                      TEXT,
        facebook                    TEXT,
        created_at                  TEXT NOT NULL,
        updated_at                  TEXT NOT NULL,
        last_login_at               TEXT
    )",
    "CREATE TABLE IF NOT EXISTS posts (
        id                  TEXT PRIMARY KEY,
        author_id           TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        post_type           TEXT NOT NULL,
        title               TEXT NOT NULL,
        content             TEXT NOT NULL,
        summary             TEXT,
        status              TEXT NOT NULL DEFAULT 'pending',
        rejection_feedback  TEXT,
        created_at          TEXT NOT NULL,
        updated_at          TEXT NOT NULL,
        published_at        TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_posts_status_published ON posts(status, published_at)",
    "CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id)",
    "CREATE TABLE IF NOT EXISTS comments (
        id          TEXT PRIMARY KEY,
        post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        content     TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at)",
    "CREATE TABLE IF NOT EXISTS reactions (
        id             TEXT PRIMARY KEY,
        post_id        TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        user_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        reaction_type  TEXT NOT NULL,
        created_at     TEXT NOT NULL,
        updated_at     TEXT NOT NULL,
        UNIQUE(post_id, user_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_reactions_updated ON reactions(updated_at)",
    "CREATE TABLE IF NOT EXISTS friendships (
        id            TEXT PRIMARY KEY,
        requester_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        addressee_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        status        TEXT NOT NULL DEFAULT 'pending',
        created_at    TEXT NOT NULL,
        updated_at    TEXT NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_friendships_pair
        ON friendships(min(requester_id, addressee_id), max(requester_id, addressee_id))",
    "CREATE TABLE IF NOT EXISTS contributor_requests (
        id            TEXT PRIMARY KEY,
        user_id       TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        status        TEXT NOT NULL DEFAULT 'pending',
        requested_at  TEXT NOT NULL,
        reviewed_at   TEXT,
        reviewed_by   TEXT,
        feedback      TEXT
    )",
];

const MIGRATIONS: &[(i64, &str, &[&str])] = &[(1, "initial schema", V1_INITIAL_SCHEMA)];

pub async fn run(backend: &Backend) -> Result<()> {
    backend
        .query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)", vec![])
        .await?;

    let rows = backend
        .query("SELECT COALESCE(MAX(version), 0) AS version FROM schema_version", vec![])
        .await?;
    let current = rows
        .first()
        .and_then(|row| row.get("version"))
        .and_then(Value::as_i64)
        .unwrap_or(0);

    for (version, name, statements) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        info!("Running migration v{} ({}) on {}", version, name, backend.name());
        for statement in *statements {
            backend.query(statement, vec![]).await?;
        }
        backend
            .query("INSERT INTO schema_version (version) VALUES (?1)", vec![Value::from(*version)])
            .await?;
    }

    info!("Database migrations complete");
    Ok(())
}
