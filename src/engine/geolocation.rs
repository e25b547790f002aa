// ==========================================
// 物料盘点导入系统 - 地理定位
// ==========================================
// 职责: 地址 -> 结构化地址 + 城市 + IRIS 代码; 城市边界几何登记
// 规则: 地理编码失败降级为错误诊断; 多个 IRIS 命中同一点为致命错误
// ==========================================

use crate::domain::catalog::{EntityId, MetaWrite};
use crate::domain::diagnostic::DiagnosticLog;
use crate::domain::geo::{Feature, FeatureCollection, Geometry, Position};
use crate::domain::site::{SiteAddress, SiteRecord};
use crate::domain::types::Taxonomy;
use crate::engine::error::{GeoError, GeoResult};
use crate::engine::geocoder::{extract_city, Geocoder};
use crate::engine::geometry::{multipolygon_centroid, point_in_polygon, PipOptions};
use crate::repository::CatalogStore;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const CONTEXT: &str = "地理定位";

/// IRIS 数据集属性名
pub const CITY_PROPERTY: &str = "NOM_COM";
pub const IRIS_PROPERTY: &str = "CODE_IRIS";

// ==========================================
// IrisIndex - IRIS 边界索引
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct IrisIndex {
    features: Vec<Feature>,
}

impl IrisIndex {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn from_geojson_str(raw: &str) -> GeoResult<Self> {
        let collection: FeatureCollection = serde_json::from_str(raw)?;
        Ok(Self::new(collection.features))
    }

    pub fn from_path(path: impl AsRef<Path>) -> GeoResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let index = Self::from_geojson_str(&raw)?;
        info!(path = %path.as_ref().display(), features = index.len(), "IRIS 边界已加载");
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// 查找包含该点的 IRIS 代码（仅比较同名城市的区域）
    ///
    /// # 参数
    /// - point: [lng, lat]
    ///
    /// # 返回
    /// - Ok(None): 无区域包含该点
    /// - Err(AmbiguousZone): 多个区域包含该点
    pub fn zone_code(&self, city: &str, point: Position) -> GeoResult<Option<String>> {
        let matches: Vec<String> = self
            .features
            .iter()
            .filter(|f| f.property_text(CITY_PROPERTY).as_deref() == Some(city))
            .filter(|f| {
                f.geometry.as_ref().is_some_and(|g| {
                    let options = PipOptions {
                        bbox: f.bbox,
                        ignore_boundary: false,
                    };
                    point_in_polygon(point, g, options)
                })
            })
            .filter_map(|f| f.property_text(IRIS_PROPERTY))
            .collect();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.into_iter().next()),
            _ => Err(GeoError::AmbiguousZone {
                city: city.to_string(),
                matches,
            }),
        }
    }
}

// ==========================================
// SiteGeolocator - 库存点定位
// ==========================================
pub struct SiteGeolocator {
    geocoder: Option<Arc<dyn Geocoder>>,
    iris: Option<Arc<IrisIndex>>,
}

impl SiteGeolocator {
    pub fn new(geocoder: Option<Arc<dyn Geocoder>>, iris: Option<Arc<IrisIndex>>) -> Self {
        Self { geocoder, iris }
    }

    /// 地理编码原始地址并填充 address / city / iris
    ///
    /// # 参数
    /// - candidate_index: 选用的候选序号（0 为首个）
    ///
    /// # 返回
    /// - Err(AmbiguousZone): 致命,调用方应中止
    /// - Ok(()): 其他失败均记入诊断,site 保持未定位
    #[instrument(skip(self, site, log), fields(reference = %site.reference))]
    pub async fn locate(
        &self,
        site: &mut SiteRecord,
        candidate_index: usize,
        log: &mut DiagnosticLog,
    ) -> GeoResult<()> {
        if site.address.is_located() {
            debug!("地址已定位,跳过地理编码");
            return self.fill_iris(site, log);
        }

        let raw = site.address.as_text().trim().to_string();
        if raw.is_empty() {
            log.warning(CONTEXT, format!("库存点 {} 地址为空,跳过地理编码", site.reference));
            return Ok(());
        }

        let Some(geocoder) = &self.geocoder else {
            log.error(CONTEXT, "地理编码未配置（google_api_key 为空）");
            return Ok(());
        };

        let candidates = match geocoder.geocode(&raw).await {
            Ok(c) => c,
            Err(e) => {
                log.error(CONTEXT, format!("地址 \"{}\" 地理编码失败: {}", raw, e));
                return Ok(());
            }
        };

        if candidates.is_empty() {
            log.error(CONTEXT, format!("地址 \"{}\" 无地理编码结果", raw));
            return Ok(());
        }

        let Some(chosen) = candidates.get(candidate_index).cloned() else {
            log.error(
                CONTEXT,
                format!("候选序号 {} 超出范围（共 {} 个候选）", candidate_index, candidates.len()),
            );
            return Ok(());
        };

        if candidates.len() > 1 {
            log.info(
                CONTEXT,
                format!("地址共 {} 个候选,选用: {}", candidates.len(), chosen.location),
            );
        }

        site.city = extract_city(&chosen.location).unwrap_or_default();
        if site.city.is_empty() {
            log.warning(CONTEXT, format!("无法从地址 \"{}\" 提取城市", chosen.location));
        }
        site.address = SiteAddress::Located(chosen);

        self.fill_iris(site, log)
    }

    fn fill_iris(&self, site: &mut SiteRecord, log: &mut DiagnosticLog) -> GeoResult<()> {
        let SiteAddress::Located(address) = &site.address else {
            return Ok(());
        };
        let Some(index) = &self.iris else {
            debug!("未配置 IRIS 边界,跳过");
            return Ok(());
        };

        match index.zone_code(&site.city, Position::new(address.lng, address.lat))? {
            Some(code) => site.iris_code = Some(code),
            None => log.warning(
                CONTEXT,
                format!("城市 {} 中没有 IRIS 区域包含该地址", site.city),
            ),
        }
        Ok(())
    }
}

// ==========================================
// 城市边界几何登记
// ==========================================

/// 城市分类项元数据键
pub mod locality_meta {
    pub const INSEE_CODE: &str = "insee_code";
    pub const CENTROID: &str = "centroid";
    pub const GEOMETRY: &str = "geometry";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalityOutcome {
    pub term_id: EntityId,
    pub term_created: bool,
    pub written: Vec<&'static str>, // 本次新写入的元数据键
}

/// 解析几何输入: Geometry / Feature / FeatureCollection（取首个面要素）,
/// 也接受内容为上述 JSON 的字符串
pub fn parse_locality_geometry(value: &Value) -> GeoResult<Geometry> {
    if let Value::String(raw) = value {
        let inner: Value = serde_json::from_str(raw)?;
        return parse_locality_geometry(&inner);
    }

    match value.get("type").and_then(Value::as_str) {
        Some("Feature") => {
            let feature: Feature = serde_json::from_value(value.clone())?;
            feature
                .geometry
                .ok_or_else(|| GeoError::InvalidGeoJson("要素缺少几何".to_string()))
        }
        Some("FeatureCollection") => {
            let collection: FeatureCollection = serde_json::from_value(value.clone())?;
            collection
                .features
                .into_iter()
                .filter_map(|f| f.geometry)
                .find(|g| !matches!(g, Geometry::Point(_)))
                .ok_or_else(|| GeoError::InvalidGeoJson("要素集中没有面几何".to_string()))
        }
        Some(_) => Ok(serde_json::from_value(value.clone())?),
        None => Err(GeoError::InvalidGeoJson("缺少 type 字段".to_string())),
    }
}

/// 确保城市分类项存在,并一次性写入 insee_code / centroid / geometry
///
/// 已有值的元数据不覆盖。centroid 存为 [lat, lng],geometry 坐标倒置为 [lat, lng]。
#[instrument(skip(store, geometry))]
pub async fn set_locality_geometry(
    store: &dyn CatalogStore,
    name: &str,
    code: &str,
    geometry: &Geometry,
) -> GeoResult<LocalityOutcome> {
    let (term, term_created) = match store.find_term_by_name(Taxonomy::City, name).await? {
        Some(term) => (term, false),
        None => (store.insert_term(Taxonomy::City, name, None, None).await?, true),
    };

    let mut written = Vec::new();

    if is_blank_meta(store, term.id, locality_meta::INSEE_CODE).await? {
        write_term_meta(store, term.id, locality_meta::INSEE_CODE, code, &mut written).await?;
    }

    if is_blank_meta(store, term.id, locality_meta::CENTROID).await? {
        let centroid = multipolygon_centroid(geometry)
            .ok_or_else(|| GeoError::InvalidGeoJson(format!("无法计算 {} 的质心", name)))?;
        let value = serde_json::to_string(&[centroid.y, centroid.x])?;
        write_term_meta(store, term.id, locality_meta::CENTROID, &value, &mut written).await?;
    }

    if is_blank_meta(store, term.id, locality_meta::GEOMETRY).await? {
        let swapped = serde_json::to_value(geometry.swapped())?;
        let coordinates = swapped.get("coordinates").cloned().unwrap_or(Value::Null);
        let value = serde_json::to_string(&coordinates)?;
        write_term_meta(store, term.id, locality_meta::GEOMETRY, &value, &mut written).await?;
    }

    info!(term_id = term.id, term_created, written = ?written, "城市几何已登记");
    Ok(LocalityOutcome {
        term_id: term.id,
        term_created,
        written,
    })
}

async fn is_blank_meta(store: &dyn CatalogStore, term: EntityId, key: &str) -> GeoResult<bool> {
    Ok(store
        .get_term_meta(term, key)
        .await?
        .map_or(true, |v| v.trim().is_empty()))
}

async fn write_term_meta(
    store: &dyn CatalogStore,
    term: EntityId,
    key: &'static str,
    value: &str,
    written: &mut Vec<&'static str>,
) -> GeoResult<()> {
    if store.set_term_meta(term, key, value).await? == MetaWrite::Written {
        written.push(key);
    } else {
        warn!(term_id = term, key, "城市元数据未变化");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::site::GeocodedAddress;
    use crate::engine::geocoder::AddressCandidate;
    use crate::repository::SqliteCatalogStore;
    use async_trait::async_trait;
    use serde_json::json;

    fn iris_collection() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature",
                 "properties": {"NOM_COM": "Lyon", "CODE_IRIS": "693810101"},
                 "geometry": {"type": "Polygon", "coordinates": [[[4.0,45.0],[5.0,45.0],[5.0,46.0],[4.0,46.0],[4.0,45.0]]]}},
                {"type": "Feature",
                 "properties": {"NOM_COM": "Lyon", "CODE_IRIS": "693810102"},
                 "geometry": {"type": "Polygon", "coordinates": [[[5.0,45.0],[6.0,45.0],[6.0,46.0],[5.0,46.0],[5.0,45.0]]]}},
                {"type": "Feature",
                 "properties": {"NOM_COM": "Villeurbanne", "CODE_IRIS": "692660101"},
                 "geometry": {"type": "Polygon", "coordinates": [[[4.0,45.0],[5.0,45.0],[5.0,46.0],[4.0,46.0],[4.0,45.0]]]}}
            ]
        })
    }

    fn index() -> IrisIndex {
        IrisIndex::from_geojson_str(&iris_collection().to_string()).unwrap()
    }

    struct FixedGeocoder(Vec<AddressCandidate>);

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn geocode(&self, _address: &str) -> GeoResult<Vec<AddressCandidate>> {
            Ok(self.0.clone())
        }
    }

    struct FailingGeocoder;

    #[async_trait]
    impl Geocoder for FailingGeocoder {
        async fn geocode(&self, _address: &str) -> GeoResult<Vec<AddressCandidate>> {
            Err(GeoError::ProviderStatus {
                status: "OVER_QUERY_LIMIT".to_string(),
                message: String::new(),
            })
        }
    }

    #[test]
    fn test_zone_code_filters_by_city() {
        let idx = index();
        let code = idx.zone_code("Lyon", Position::new(4.5, 45.5)).unwrap();
        assert_eq!(code.as_deref(), Some("693810101"));
        assert_eq!(idx.zone_code("Paris", Position::new(4.5, 45.5)).unwrap(), None);
    }

    #[test]
    fn test_zone_code_ambiguous_on_shared_edge() {
        let idx = index();
        let err = idx.zone_code("Lyon", Position::new(5.0, 45.5)).unwrap_err();
        assert!(matches!(err, GeoError::AmbiguousZone { ref matches, .. } if matches.len() == 2));
    }

    #[tokio::test]
    async fn test_locate_fills_city_and_iris() {
        let geocoder = FixedGeocoder(vec![AddressCandidate {
            location: "1 Rue A, 69001 Lyon, France".to_string(),
            lat: 45.5,
            lng: 4.5,
        }]);
        let locator = SiteGeolocator::new(Some(Arc::new(geocoder)), Some(Arc::new(index())));

        let mut site = SiteRecord::new("DEP-1");
        site.address = SiteAddress::Raw("1 rue A Lyon".to_string());
        let mut log = DiagnosticLog::new();
        locator.locate(&mut site, 0, &mut log).await.unwrap();

        assert_eq!(site.city, "Lyon");
        assert_eq!(site.iris_code.as_deref(), Some("693810101"));
        assert!(site.address.is_located());
        assert!(!log.has_blocking_error());
    }

    #[tokio::test]
    async fn test_locate_geocoder_failure_is_diagnostic() {
        let locator = SiteGeolocator::new(Some(Arc::new(FailingGeocoder)), None);
        let mut site = SiteRecord::new("DEP-1");
        site.address = SiteAddress::Raw("quelque part".to_string());
        let mut log = DiagnosticLog::new();

        locator.locate(&mut site, 0, &mut log).await.unwrap();
        assert!(log.has_blocking_error(), "地理编码失败应记录错误诊断");
        assert!(!site.address.is_located());
    }

    #[tokio::test]
    async fn test_locate_already_located_checks_iris_only() {
        let locator = SiteGeolocator::new(None, Some(Arc::new(index())));
        let mut site = SiteRecord::new("DEP-1");
        site.city = "Lyon".to_string();
        site.address = SiteAddress::Located(GeocodedAddress {
            location: "x".to_string(),
            lat: 45.5,
            lng: 5.0,
        });
        let mut log = DiagnosticLog::new();

        let err = locator.locate(&mut site, 0, &mut log).await.unwrap_err();
        assert!(matches!(err, GeoError::AmbiguousZone { .. }));
    }

    #[test]
    fn test_parse_locality_geometry_variants() {
        let multi = json!({"type": "MultiPolygon", "coordinates": [[[[0,0],[1,0],[1,1],[0,0]]]]});
        assert!(matches!(parse_locality_geometry(&multi).unwrap(), Geometry::MultiPolygon(_)));

        let feature = json!({"type": "Feature", "properties": {}, "geometry": multi.clone()});
        assert!(parse_locality_geometry(&feature).is_ok());

        let as_string = Value::String(feature.to_string());
        assert!(parse_locality_geometry(&as_string).is_ok());

        assert!(parse_locality_geometry(&json!({"coordinates": []})).is_err());
    }

    #[tokio::test]
    async fn test_set_locality_geometry_write_once() {
        let store = SqliteCatalogStore::open_in_memory().unwrap();
        let geometry = Geometry::MultiPolygon(vec![vec![vec![
            Position::new(4.0, 45.0),
            Position::new(6.0, 45.0),
            Position::new(6.0, 47.0),
            Position::new(4.0, 47.0),
            Position::new(4.0, 45.0),
        ]]]);

        let first = set_locality_geometry(&store, "Lyon", "69123", &geometry).await.unwrap();
        assert!(first.term_created);
        assert_eq!(first.written.len(), 3);

        let centroid = store.get_term_meta(first.term_id, "centroid").await.unwrap().unwrap();
        assert_eq!(centroid, "[46.0,5.0]");
        let stored = store.get_term_meta(first.term_id, "geometry").await.unwrap().unwrap();
        assert!(stored.starts_with("[[[[45.0,4.0]"), "几何坐标应倒置为 [lat, lng]: {}", stored);

        let second = set_locality_geometry(&store, "Lyon", "00000", &geometry).await.unwrap();
        assert!(!second.term_created);
        assert!(second.written.is_empty());
        let code = store.get_term_meta(first.term_id, "insee_code").await.unwrap();
        assert_eq!(code.as_deref(), Some("69123"), "已有元数据不应被覆盖");
    }
}
