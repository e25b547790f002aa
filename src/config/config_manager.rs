// ==========================================
// 物料盘点导入系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)
// 规则: 解析失败的配置值回退为默认值并告警
// ==========================================

use crate::config::import_config_trait::{ConfigResult, ImportConfigReader};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（需已建表）
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供 CLI 复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 配置（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        tracing::info!(config_key = key, "配置已更新");
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 读取并解析配置值；解析失败时回退默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr + Copy,
    {
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(config_key = key, raw_value = %raw, "配置值格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    /// 读取非空配置值（空白视为未配置）
    fn get_non_blank(&self, key: &str) -> ConfigResult<Option<String>> {
        Ok(self
            .get_config_value(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        for row in rows {
            let (key, value) = row?;
            // 密钥不进入快照
            if key == config_keys::GOOGLE_API_KEY {
                continue;
            }
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_google_api_key(&self) -> ConfigResult<Option<String>> {
        self.get_non_blank(config_keys::GOOGLE_API_KEY)
    }

    async fn get_geocode_language(&self) -> ConfigResult<String> {
        self.get_config_or_default(config_keys::GEOCODE_LANGUAGE, defaults::GEOCODE_LANGUAGE)
    }

    async fn get_geocode_region(&self) -> ConfigResult<String> {
        self.get_config_or_default(config_keys::GEOCODE_REGION, defaults::GEOCODE_REGION)
    }

    async fn get_geocode_timeout_secs(&self) -> ConfigResult<u64> {
        self.get_parsed_or_default(config_keys::GEOCODE_TIMEOUT_SECS, defaults::GEOCODE_TIMEOUT_SECS)
    }

    async fn get_iris_geojson_path(&self) -> ConfigResult<Option<String>> {
        self.get_non_blank(config_keys::IRIS_GEOJSON_PATH)
    }

    async fn get_materials_header_row(&self) -> ConfigResult<u32> {
        self.get_parsed_or_default(config_keys::MATERIALS_HEADER_ROW, defaults::MATERIALS_HEADER_ROW)
    }

    async fn get_default_price(&self) -> ConfigResult<String> {
        let value = self.get_config_or_default(config_keys::DEFAULT_PRICE, defaults::DEFAULT_PRICE)?;
        if value.trim().is_empty() {
            return Ok(defaults::DEFAULT_PRICE.to_string());
        }
        Ok(value)
    }

    async fn get_provider_term_color(&self) -> ConfigResult<String> {
        self.get_config_or_default(config_keys::PROVIDER_TERM_COLOR, defaults::PROVIDER_TERM_COLOR)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 地理编码
    pub const GOOGLE_API_KEY: &str = "google_api_key";
    pub const GEOCODE_LANGUAGE: &str = "geocode_language";
    pub const GEOCODE_REGION: &str = "geocode_region";
    pub const GEOCODE_TIMEOUT_SECS: &str = "geocode_timeout_secs";
    pub const IRIS_GEOJSON_PATH: &str = "iris_geojson_path";

    // 提取
    pub const MATERIALS_HEADER_ROW: &str = "materials_header_row";

    // 对账
    pub const DEFAULT_PRICE: &str = "default_price";
    pub const PROVIDER_TERM_COLOR: &str = "provider_term_color";
}

// ==========================================
// 缺省值
// ==========================================
pub mod defaults {
    pub const GEOCODE_LANGUAGE: &str = "fr";
    pub const GEOCODE_REGION: &str = "fr";
    pub const GEOCODE_TIMEOUT_SECS: u64 = 10;
    pub const MATERIALS_HEADER_ROW: u32 = 14;
    pub const DEFAULT_PRICE: &str = "1";
    pub const PROVIDER_TERM_COLOR: &str = "blue";
}
