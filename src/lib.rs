// ==========================================
// 物料盘点导入系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + calamine
// 流程: 工作簿抽取校验 → 地理定位 → 目录对账
// 系统定位: 尽力提交,问题以诊断返回调用方
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 目录存储
pub mod repository;

// 引擎层 - 对账与地理定位
pub mod engine;

// 导入层 - 工作簿抽取
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 入站契约
pub mod api;

// 应用层 - 状态装配与 HTTP 服务
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    Diagnostic, DiagnosticLevel, DiagnosticLog, ImportRequest, ImportStatus, MaterialItem,
    Scalar, SiteRecord,
};

// 导入
pub use importer::{DepositExtractor, ExtractionOutcome, SheetSelection, WorkbookImporter};

// 引擎
pub use engine::{ImportReport, ReconciliationEngine, SiteGeolocator};

// 存储
pub use repository::{CatalogStore, SqliteCatalogStore};

// API
pub use api::{ApiError, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "物料盘点导入系统";
