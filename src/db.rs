// ==========================================
// 物料盘点导入系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 目录库表结构集中在此处初始化（幂等）
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

/// 打开内存库并建表（测试与一次性 CLI 使用）
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// 目录库表结构
///
/// 说明：
/// - sku / reference 上不建唯一约束: 并发导入的“先查后建”竞争会产生重复实体,
///   这是已知限制,由测试显式覆盖
/// - term 在 (taxonomy, slug) 上唯一
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL DEFAULT 'global',
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS entity (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    product_type TEXT,
    sku TEXT,
    parent_id INTEGER REFERENCES entity(id),
    title TEXT NOT NULL DEFAULT '',
    slug TEXT,
    content TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL,
    price TEXT NOT NULL DEFAULT '',
    regular_price TEXT NOT NULL DEFAULT '',
    manage_stock INTEGER NOT NULL DEFAULT 0,
    stock_quantity INTEGER,
    length TEXT NOT NULL DEFAULT '',
    width TEXT NOT NULL DEFAULT '',
    height TEXT NOT NULL DEFAULT '',
    attributes_json TEXT NOT NULL DEFAULT '[]',
    variation_attributes_json TEXT NOT NULL DEFAULT '{}',
    image_id INTEGER,
    gallery_json TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_entity_kind_sku ON entity(kind, sku);
CREATE INDEX IF NOT EXISTS idx_entity_parent ON entity(parent_id);

CREATE TABLE IF NOT EXISTS entity_meta (
    entity_id INTEGER NOT NULL REFERENCES entity(id) ON DELETE CASCADE,
    meta_key TEXT NOT NULL,
    meta_value TEXT NOT NULL,
    PRIMARY KEY (entity_id, meta_key)
);
CREATE INDEX IF NOT EXISTS idx_entity_meta_key ON entity_meta(meta_key, meta_value);

CREATE TABLE IF NOT EXISTS term (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    taxonomy TEXT NOT NULL,
    name TEXT NOT NULL,
    slug TEXT NOT NULL,
    parent_id INTEGER REFERENCES term(id),
    UNIQUE (taxonomy, slug)
);

CREATE TABLE IF NOT EXISTS term_meta (
    term_id INTEGER NOT NULL REFERENCES term(id) ON DELETE CASCADE,
    meta_key TEXT NOT NULL,
    meta_value TEXT NOT NULL,
    PRIMARY KEY (term_id, meta_key)
);

CREATE TABLE IF NOT EXISTS entity_term (
    entity_id INTEGER NOT NULL REFERENCES entity(id) ON DELETE CASCADE,
    taxonomy TEXT NOT NULL,
    term_id INTEGER NOT NULL REFERENCES term(id) ON DELETE CASCADE,
    PRIMARY KEY (entity_id, term_id)
);

CREATE TABLE IF NOT EXISTS attachment (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    guid TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT ''
);
"#;

/// 建表（幂等）并记录 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    if read_schema_version(conn)?.is_none() {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [CURRENT_SCHEMA_VERSION],
        )?;
    }
    Ok(())
}

/// 读取 schema_version（若表不存在或为空则返回 None）
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

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
