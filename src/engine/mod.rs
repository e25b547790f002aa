// ==========================================
// 物料盘点导入系统 - 引擎层
// ==========================================
// 职责: 对账引擎、地理编码/定位、几何工具
// 红线: 引擎不拼 SQL, 存储访问全部经 CatalogStore
// ==========================================

pub mod error;
pub mod geocoder;
pub mod geolocation;
pub mod geometry;
pub mod reconciliation;

// 重导出核心引擎
pub use error::{GeoError, GeoResult};
pub use geocoder::{extract_city, AddressCandidate, Geocoder, GoogleGeocoder};
pub use geolocation::{
    parse_locality_geometry, set_locality_geometry, IrisIndex, LocalityOutcome, SiteGeolocator,
};
pub use geometry::{multipolygon_centroid, point_in_polygon, PipOptions};
pub use reconciliation::{ImportReport, ReconciliationEngine, ReconciliationOptions};
