/// Key/value table holding client-side state (cart, session).
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS local_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
