// ==========================================
// 物料盘点导入系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供目录存储接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod catalog_store;
pub mod catalog_store_impl;
pub mod error;

pub use catalog_store::CatalogStore;
pub use catalog_store_impl::SqliteCatalogStore;
pub use error::{RepositoryError, RepositoryResult};
