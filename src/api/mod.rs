// ==========================================
// 物料盘点导入系统 - API 层
// ==========================================
// 职责: 入站请求契约,供 CLI 与 HTTP 服务调用
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult, ErrorBody};
pub use import_api::{ApiResponse, ImportApi, NO_IRIS_CODE};
