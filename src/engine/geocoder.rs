// ==========================================
// 物料盘点导入系统 - 地理编码
// ==========================================
// 职责: 自由文本地址 -> 候选结果（格式化地址 + 坐标）
// 实现: GoogleGeocoder（reqwest,超时由传输层限定）
// ==========================================

use crate::config::ImportConfigReader;
use crate::engine::error::{GeoError, GeoResult};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, instrument};

pub use crate::domain::site::GeocodedAddress as AddressCandidate;

pub const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

// ==========================================
// Geocoder Trait
// ==========================================
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// 地址地理编码
    ///
    /// # 返回
    /// - Ok(vec![]): 无结果
    /// - Ok(candidates): 按服务返回顺序
    async fn geocode(&self, address: &str) -> GeoResult<Vec<AddressCandidate>>;
}

// ==========================================
// Google 响应结构
// ==========================================
#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GoogleResult>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    formatted_address: String,
    geometry: GoogleGeometry,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLatLng,
}

#[derive(Debug, Deserialize)]
struct GoogleLatLng {
    lat: f64,
    lng: f64,
}

impl GoogleResponse {
    fn into_candidates(self) -> GeoResult<Vec<AddressCandidate>> {
        match self.status.as_str() {
            "OK" => Ok(self
                .results
                .into_iter()
                .map(|r| AddressCandidate {
                    location: r.formatted_address,
                    lat: r.geometry.location.lat,
                    lng: r.geometry.location.lng,
                })
                .collect()),
            "ZERO_RESULTS" => Ok(Vec::new()),
            _ => Err(GeoError::ProviderStatus {
                status: self.status,
                message: self.error_message.unwrap_or_default(),
            }),
        }
    }
}

// ==========================================
// GoogleGeocoder
// ==========================================
pub struct GoogleGeocoder {
    client: reqwest::Client,
    api_key: String,
    language: String,
    region: String,
    base_url: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> GeoResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            language: "fr".to_string(),
            region: "fr".to_string(),
            base_url: GOOGLE_GEOCODE_URL.to_string(),
        })
    }

    /// 按配置构造；未配置 API Key 时返回 NotConfigured
    pub async fn from_config(config: &dyn ImportConfigReader) -> GeoResult<Self> {
        let api_key = config
            .get_google_api_key()
            .await
            .map_err(|e| GeoError::NotConfigured(e.to_string()))?
            .ok_or_else(|| GeoError::NotConfigured("google_api_key 为空".to_string()))?;
        let timeout = config
            .get_geocode_timeout_secs()
            .await
            .map_err(|e| GeoError::NotConfigured(e.to_string()))?;
        let language = config
            .get_geocode_language()
            .await
            .map_err(|e| GeoError::NotConfigured(e.to_string()))?;
        let region = config
            .get_geocode_region()
            .await
            .map_err(|e| GeoError::NotConfigured(e.to_string()))?;

        Ok(Self::new(api_key, Duration::from_secs(timeout))?
            .with_language(language)
            .with_region(region))
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// 替换服务地址（测试桩服务器）
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    #[instrument(skip(self), fields(language = %self.language))]
    async fn geocode(&self, address: &str) -> GeoResult<Vec<AddressCandidate>> {
        let response: GoogleResponse = self
            .client
            .get(&self.base_url)
            .query(&[
                ("address", address),
                ("language", self.language.as_str()),
                ("region", self.region.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(status = %response.status, results = response.results.len(), "地理编码响应");
        response.into_candidates()
    }
}

// ==========================================
// 城市名提取
// ==========================================

fn city_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r", [0-9]{5} (.*?), ").expect("城市正则无效"))
}

/// 从格式化地址中提取城市名（邮编之后、下一个逗号之前）
///
/// `"12 Rue X, 69001 Lyon, France"` -> `Some("Lyon")`
pub fn extract_city(formatted_address: &str) -> Option<String> {
    city_regex()
        .captures(formatted_address)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_city() {
        assert_eq!(
            extract_city("12 Rue de la République, 69001 Lyon, France").as_deref(),
            Some("Lyon")
        );
        assert_eq!(
            extract_city("1 Place, 75004 Paris 4e Arrondissement, France").as_deref(),
            Some("Paris 4e Arrondissement")
        );
        assert_eq!(extract_city("Lyon, France"), None);
    }

    #[test]
    fn test_google_response_ok() {
        let raw = r#"{
            "status": "OK",
            "results": [
                {"formatted_address": "1 Rue A, 69001 Lyon, France",
                 "geometry": {"location": {"lat": 45.76, "lng": 4.83}}}
            ]
        }"#;
        let resp: GoogleResponse = serde_json::from_str(raw).unwrap();
        let candidates = resp.into_candidates().unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].lng, 4.83);
    }

    #[test]
    fn test_google_response_zero_results() {
        let resp: GoogleResponse =
            serde_json::from_str(r#"{"status":"ZERO_RESULTS","results":[]}"#).unwrap();
        assert!(resp.into_candidates().unwrap().is_empty());
    }

    #[test]
    fn test_google_response_denied() {
        let resp: GoogleResponse = serde_json::from_str(
            r#"{"status":"REQUEST_DENIED","error_message":"bad key","results":[]}"#,
        )
        .unwrap();
        let err = resp.into_candidates().unwrap_err();
        assert!(matches!(err, GeoError::ProviderStatus { ref status, .. } if status == "REQUEST_DENIED"));
    }
}
