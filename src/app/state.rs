// ==========================================
// 物料盘点导入系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享连接与 API 实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::ImportApi;
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::SqliteCatalogStore;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "DEPOSIT_IMPORT_DB_PATH";

/// 应用状态
///
/// 配置与目录存储共享同一个 SQLite 连接
pub struct AppState {
    pub db_path: String,
    pub config_manager: Arc<ConfigManager>,
    pub store: Arc<SqliteCatalogStore>,
    pub import_api: Arc<ImportApi>,
}

impl AppState {
    /// 创建新的 AppState 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（不存在时创建并建表）
    pub async fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化 AppState,数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库 {}: {}", db_path, e))?;
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建 ConfigManager: {}", e))?,
        );
        let store = Arc::new(SqliteCatalogStore::from_connection(conn));

        let import_api = ImportApi::from_config(store.clone(), config_manager.as_ref())
            .await
            .map_err(|e| format!("无法创建 ImportApi: {}", e))?;

        tracing::info!("AppState 初始化完成");
        Ok(Self {
            db_path,
            config_manager,
            store,
            import_api: Arc::new(import_api),
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./deposit_import.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("deposit-import");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("deposit_import.db");
        }
    }

    path.to_string_lossy().to_string()
}
