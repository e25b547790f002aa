// ==========================================
// 物料盘点导入系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、诊断累加器
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod catalog;
pub mod diagnostic;
pub mod geo;
pub mod material;
pub mod request;
pub mod site;
pub mod types;

// 重导出核心类型
pub use catalog::{
    sanitize_slug, Attachment, CatalogTerm, DepositEntity, EntityId, MetaWrite, ProductAttribute,
    ProductDimensions, ProductEntity, VARIATION_ATTRIBUTE,
};
pub use diagnostic::{Diagnostic, DiagnosticLog, ImportStatus};
pub use geo::{BBox, Feature, FeatureCollection, Geometry, Position, Ring};
pub use material::{flatten_tree_references, CodeAttributes, Dimensions, MaterialItem};
pub use request::ImportRequest;
pub use site::{GeocodedAddress, SiteAddress, SiteRecord};
pub use types::{
    CellType, DiagnosticLevel, EntityKind, PostStatus, ProductKind, Scalar, Taxonomy,
};
