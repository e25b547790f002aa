// ==========================================
// 物料盘点导入系统 - 地理定位错误类型
// ==========================================
// 工具: thiserror 派生宏
// 规则: AmbiguousZone 为致命错误,直接上抛,不降级为诊断
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("地理编码未配置: {0}")]
    NotConfigured(String),

    #[error("地理编码请求失败: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("地理编码服务返回状态 {status}: {message}")]
    ProviderStatus { status: String, message: String },

    #[error("GeoJSON 数据无效: {0}")]
    InvalidGeoJson(String),

    #[error("边界文件读取失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("城市 {city} 的多个 IRIS 区域同时包含该点: {matches:?}")]
    AmbiguousZone { city: String, matches: Vec<String> },

    #[error("城市分类项写入失败: {0}")]
    Store(#[from] crate::repository::error::RepositoryError),
}

impl From<serde_json::Error> for GeoError {
    fn from(err: serde_json::Error) -> Self {
        GeoError::InvalidGeoJson(err.to_string())
    }
}

pub type GeoResult<T> = Result<T, GeoError>;
