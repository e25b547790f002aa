// ==========================================
// 物料盘点导入系统 - 应用层
// ==========================================
// 职责: 装配共享状态; HTTP 传输绑定（特性 server）
// ==========================================

pub mod state;

#[cfg(feature = "server")]
pub mod server;

// 重导出
pub use state::{get_default_db_path, AppState};
