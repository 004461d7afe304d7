pub const SCHEMA_VERSION: &str = "1";

pub const CREATE_SCHEMA_SQL: &str = r#"
BEGIN TRANSACTION;

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', '1');

CREATE TABLE IF NOT EXISTS tracked_urls (
    url_id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL,
    url TEXT NOT NULL,
    monitoring_enabled BOOLEAN NOT NULL DEFAULT 1,
    frequency TEXT NOT NULL DEFAULT 'daily',      -- 'daily', 'weekly', 'monthly'
    last_checked_at INTEGER,                      -- Unix seconds (UTC), NULL until first check
    created_at INTEGER NOT NULL,
    UNIQUE (project_id, url)
);

-- Append-only. The latest snapshot for a url is the greatest created_at
CREATE TABLE IF NOT EXISTS snapshots (
    snapshot_id INTEGER PRIMARY KEY AUTOINCREMENT,
    url_id INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    fields TEXT NOT NULL,                         -- ExtractedFields as JSON
    created_at INTEGER NOT NULL,
    FOREIGN KEY (url_id) REFERENCES tracked_urls(url_id)
);

CREATE INDEX IF NOT EXISTS idx_snapshots_url_created ON snapshots (url_id, created_at DESC);

CREATE TABLE IF NOT EXISTS logs (
    log_id INTEGER PRIMARY KEY AUTOINCREMENT,
    public_id TEXT NOT NULL UNIQUE,
    project_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    category TEXT NOT NULL,                       -- 'On-Page', 'Technical', 'Schema', 'Other'
    source TEXT NOT NULL,                         -- 'system' or 'user'
    changes TEXT NOT NULL,                        -- JSON array of {field, old, new, category}
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_logs_project_created ON logs (project_id, created_at DESC);

CREATE TABLE IF NOT EXISTS log_urls (
    log_id INTEGER NOT NULL,
    url_id INTEGER NOT NULL,
    PRIMARY KEY (log_id, url_id),
    FOREIGN KEY (log_id) REFERENCES logs(log_id),
    FOREIGN KEY (url_id) REFERENCES tracked_urls(url_id)
);

CREATE TABLE IF NOT EXISTS alerts (
    alert_id INTEGER PRIMARY KEY AUTOINCREMENT,
    alert_type CHAR(1) NOT NULL,                  -- 'H' (hash collision)
    url_id INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (url_id) REFERENCES tracked_urls(url_id)
);

COMMIT;
"#;
