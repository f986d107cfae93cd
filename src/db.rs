// ==========================================
// 联系人导入服务 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 建表与权威字段清单种子数据（幂等）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存库并建表（测试/临时运行）
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL DEFAULT 'global',
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS field_mappings (
    field_path TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    category TEXT NOT NULL,
    display_order INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_name TEXT NOT NULL,
    source_type TEXT NOT NULL DEFAULT 'csv',
    byte_size INTEGER,
    record_count INTEGER NOT NULL CHECK (record_count >= 0),
    team_id TEXT NOT NULL,
    profile_id TEXT,
    list_id TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS source_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES sources(id),
    row_number INTEGER NOT NULL,
    raw_data TEXT NOT NULL,
    processed INTEGER NOT NULL DEFAULT 0 CHECK (processed IN (0, 1)),
    error_log TEXT,
    list_id TEXT,
    created_at TEXT NOT NULL,
    processed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_source_data_pending
    ON source_data(source_id, processed);

CREATE TABLE IF NOT EXISTS companies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_data_id INTEGER NOT NULL REFERENCES source_data(id),
    team_id TEXT NOT NULL,
    name TEXT,
    domain TEXT,
    industry TEXT,
    size TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_data_id INTEGER NOT NULL REFERENCES source_data(id),
    team_id TEXT NOT NULL,
    list_id TEXT,
    company_id INTEGER REFERENCES companies(id),
    first_name TEXT,
    last_name TEXT,
    full_name TEXT,
    email TEXT,
    phone TEXT,
    job_title TEXT,
    notes TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS addresses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_data_id INTEGER NOT NULL REFERENCES source_data(id),
    contact_id INTEGER REFERENCES contacts(id),
    company_id INTEGER REFERENCES companies(id),
    street TEXT,
    city TEXT,
    state TEXT,
    postal_code TEXT,
    country TEXT,
    CHECK ((contact_id IS NULL) <> (company_id IS NULL))
);

CREATE TABLE IF NOT EXISTS email_addresses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_data_id INTEGER NOT NULL REFERENCES source_data(id),
    contact_id INTEGER REFERENCES contacts(id),
    company_id INTEGER REFERENCES companies(id),
    email TEXT NOT NULL,
    CHECK ((contact_id IS NULL) <> (company_id IS NULL))
);

CREATE TABLE IF NOT EXISTS phone_numbers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_data_id INTEGER NOT NULL REFERENCES source_data(id),
    contact_id INTEGER REFERENCES contacts(id),
    company_id INTEGER REFERENCES companies(id),
    number TEXT NOT NULL,
    CHECK ((contact_id IS NULL) <> (company_id IS NULL))
);

CREATE TABLE IF NOT EXISTS urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_data_id INTEGER NOT NULL REFERENCES source_data(id),
    contact_id INTEGER REFERENCES contacts(id),
    company_id INTEGER REFERENCES companies(id),
    url TEXT NOT NULL,
    CHECK ((contact_id IS NULL) <> (company_id IS NULL))
);
"#;

/// 默认权威字段清单: (field_path, label, category, display_order)
pub const DEFAULT_FIELD_MAPPINGS: &[(&str, &str, &str, i32)] = &[
    ("contacts.first_name", "First Name", "Contact", 1),
    ("contacts.last_name", "Last Name", "Contact", 2),
    ("contacts.full_name", "Full Name", "Contact", 3),
    ("contacts.email", "Email", "Contact", 4),
    ("contacts.phone", "Phone", "Contact", 5),
    ("contacts.job_title", "Job Title", "Contact", 6),
    ("contacts.notes", "Notes", "Contact", 7),
    ("companies.name", "Company Name", "Company", 1),
    ("companies.domain", "Company Domain", "Company", 2),
    ("companies.industry", "Industry", "Company", 3),
    ("companies.size", "Company Size", "Company", 4),
    ("addresses.street", "Street", "Address", 1),
    ("addresses.city", "City", "Address", 2),
    ("addresses.state", "State / Region", "Address", 3),
    ("addresses.postal_code", "Postal Code", "Address", 4),
    ("addresses.country", "Country", "Address", 5),
    ("email_addresses.email", "Additional Email", "Email", 1),
    ("phone_numbers.number", "Additional Phone", "Phone", 1),
    ("urls.url", "Website / URL", "URL", 1),
];

/// 建表 + 种子数据（幂等）
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    {
        let mut stmt = conn.prepare(
            "INSERT OR IGNORE INTO field_mappings (field_path, label, category, display_order)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (path, label, category, order) in DEFAULT_FIELD_MAPPINGS {
            stmt.execute(rusqlite::params![path, label, category, order])?;
        }
    }

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM field_mappings", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count as usize, DEFAULT_FIELD_MAPPINGS.len());
    }

    #[test]
    fn test_default_field_paths_are_routable() {
        for (path, _, _, _) in DEFAULT_FIELD_MAPPINGS {
            assert!(
                crate::domain::TargetField::parse(path).is_some(),
                "{} should resolve to a target field",
                path
            );
        }
    }

    #[test]
    fn test_schema_version_absent_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }
}
