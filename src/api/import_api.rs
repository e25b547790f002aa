// ==========================================
// 物料盘点导入系统 - 导入 API
// ==========================================
// 职责: 入站请求契约
// - upload_deposit: 导入请求 → 诊断列表 + 200/206
// - get_iris: 城市 + "lng,lat" → IRIS 代码
// - geocode: 地址 → 候选列表
// - locality_geometry: 登记城市边界几何
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ImportConfigReader;
use crate::domain::diagnostic::DiagnosticLog;
use crate::domain::geo::Position;
use crate::domain::request::ImportRequest;
use crate::engine::error::GeoError;
use crate::engine::geocoder::{AddressCandidate, Geocoder, GoogleGeocoder};
use crate::engine::geolocation::{
    parse_locality_geometry, set_locality_geometry, IrisIndex, LocalityOutcome, SiteGeolocator,
};
use crate::engine::reconciliation::{ReconciliationEngine, ReconciliationOptions};
use crate::repository::CatalogStore;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 无坐标或无匹配时返回的 IRIS 代码
pub const NO_IRIS_CODE: &str = "0";

/// API 响应（状态码 + 响应体）
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub body: T,
}

// ==========================================
// ImportApi - 导入 API
// ==========================================
pub struct ImportApi {
    store: Arc<dyn CatalogStore>,
    engine: ReconciliationEngine,
    geocoder: Option<Arc<dyn Geocoder>>,
    iris: Option<Arc<IrisIndex>>,
}

impl ImportApi {
    /// 创建新的 ImportApi 实例
    pub fn new(
        store: Arc<dyn CatalogStore>,
        options: ReconciliationOptions,
        geocoder: Option<Arc<dyn Geocoder>>,
        iris: Option<Arc<IrisIndex>>,
    ) -> Self {
        Self {
            engine: ReconciliationEngine::with_options(store.clone(), options),
            store,
            geocoder,
            iris,
        }
    }

    /// 按配置装配: 对账参数、地理编码器（未配置 Key 时关闭）、IRIS 边界
    pub async fn from_config(
        store: Arc<dyn CatalogStore>,
        config: &dyn ImportConfigReader,
    ) -> ApiResult<Self> {
        let options = ReconciliationOptions::from_config(config)
            .await
            .map_err(|e| ApiError::InternalError(format!("读取对账配置失败: {}", e)))?;

        let geocoder: Option<Arc<dyn Geocoder>> = match GoogleGeocoder::from_config(config).await {
            Ok(g) => Some(Arc::new(g)),
            Err(GeoError::NotConfigured(reason)) => {
                warn!(reason = %reason, "地理编码未启用");
                None
            }
            Err(e) => return Err(e.into()),
        };

        let iris_path = config
            .get_iris_geojson_path()
            .await
            .map_err(|e| ApiError::InternalError(format!("读取 IRIS 配置失败: {}", e)))?;
        let iris = match iris_path {
            Some(path) => {
                let index = IrisIndex::from_path(&path)?;
                info!(path = %path, features = index.len(), "IRIS 边界已加载");
                Some(Arc::new(index))
            }
            None => None,
        };

        Ok(Self::new(store, options, geocoder, iris))
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    /// 以当前地理编码器与 IRIS 边界构造定位器
    pub fn geolocator(&self) -> SiteGeolocator {
        SiteGeolocator::new(self.geocoder.clone(), self.iris.clone())
    }

    /// 上传库存点
    ///
    /// 地址尚未定位且配置了地理编码器时先定位（取首个候选）。
    ///
    /// # 返回
    /// - Ok(ApiResponse): status 200（无 error 诊断）或 206
    /// - Err(InvalidInput): 请求体无法解析
    /// - Err(GeoError): IRIS 歧义
    #[instrument(skip(self, body))]
    pub async fn upload_deposit(&self, body: &str) -> ApiResult<ApiResponse<DiagnosticLog>> {
        let mut request: ImportRequest = serde_json::from_str(body)
            .map_err(|e| ApiError::InvalidInput(format!("导入请求无法解析: {}", e)))?;
        if request.site.reference.trim().is_empty() {
            return Err(ApiError::InvalidInput("库存点引用（deposit_name）不能为空".to_string()));
        }

        let mut log = DiagnosticLog::new();
        if request.site.address.is_located() || self.geocoder.is_some() {
            self.geolocator().locate(&mut request.site, 0, &mut log).await?;
        }

        let report = self.engine.import(&request).await;
        log.merge(report.diagnostics);

        let status = log.status();
        info!(batch_id = %report.batch_id, status = status.code(), "上传库存点完成");
        Ok(ApiResponse {
            status: status.code(),
            body: log,
        })
    }

    /// 查询 IRIS 代码
    ///
    /// # 参数
    /// - coords: "lng,lat"
    ///
    /// # 返回
    /// - Ok("0"): 坐标缺失/无法解析,或没有区域包含该点
    /// - Err(GeoError): 多个区域包含该点
    pub fn get_iris(&self, city: &str, coords: &str) -> ApiResult<String> {
        let Some(point) = parse_coords(coords) else {
            return Ok(NO_IRIS_CODE.to_string());
        };
        let index = self
            .iris
            .as_ref()
            .ok_or_else(|| ApiError::GeoError("IRIS 边界未配置".to_string()))?;

        Ok(index
            .zone_code(city.trim(), point)?
            .unwrap_or_else(|| NO_IRIS_CODE.to_string()))
    }

    /// 地址地理编码
    ///
    /// # 返回
    /// - Err(InvalidInput): 地址为空
    /// - Err(NotFound): 无结果
    /// - Err(GeoError): 未配置或服务失败
    #[instrument(skip(self))]
    pub async fn geocode(&self, address: &str) -> ApiResult<Vec<AddressCandidate>> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ApiError::InvalidInput("地址为空".to_string()));
        }
        let geocoder = self
            .geocoder
            .as_ref()
            .ok_or_else(|| ApiError::GeoError("地理编码未配置".to_string()))?;

        let candidates = geocoder.geocode(address).await?;
        if candidates.is_empty() {
            return Err(ApiError::NotFound(format!("地址 \"{}\" 无地理编码结果", address)));
        }
        Ok(candidates)
    }

    /// 登记城市边界几何
    ///
    /// 请求体: {"name": ..., "code": ..., "geometry": GeoJSON 或其字符串}
    #[instrument(skip(self, body))]
    pub async fn locality_geometry(&self, body: &str) -> ApiResult<LocalityOutcome> {
        let payload: Value = serde_json::from_str(body)
            .map_err(|e| ApiError::InvalidInput(format!("请求体无法解析: {}", e)))?;

        let name = required_text(&payload, "name")?;
        let code = required_text(&payload, "code")?;
        let geometry = match payload.get("geometry") {
            None | Some(Value::Null) => {
                return Err(ApiError::InvalidInput("缺少字段 geometry".to_string()))
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(ApiError::InvalidInput("字段 geometry 为空".to_string()))
            }
            Some(value) => parse_locality_geometry(value)?,
        };

        Ok(set_locality_geometry(self.store.as_ref(), &name, &code, &geometry).await?)
    }
}

fn required_text(payload: &Value, field: &str) -> ApiResult<String> {
    let text = match payload.get(field) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    if text.is_empty() {
        return Err(ApiError::InvalidInput(format!("缺少字段 {}", field)));
    }
    Ok(text)
}

/// 解析 "lng,lat"
fn parse_coords(coords: &str) -> Option<Position> {
    let (lng, lat) = coords.split_once(',')?;
    let lng = lng.trim().parse::<f64>().ok()?;
    let lat = lat.trim().parse::<f64>().ok()?;
    Some(Position::new(lng, lat))
}
