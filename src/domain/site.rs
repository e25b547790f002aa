// ==========================================
// 物料盘点导入系统 - 库存点领域模型
// ==========================================
// 职责: 概览页抽取结果 SiteRecord 及其地址结构
// 用途: 抽取层写入,对账层只读
// 序列化: 字段名与导入请求 JSON (siteData) 对齐
// ==========================================

use crate::domain::types::{de_lenient_opt_string, de_lenient_string, de_lenient_string_list};
use serde::{Deserialize, Serialize};

// ==========================================
// GeocodedAddress - 地理编码后的地址
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedAddress {
    pub location: String, // 格式化地址
    pub lat: f64,
    pub lng: f64,
}

// ==========================================
// SiteAddress - 库存点地址
// ==========================================
// 抽取时为原始文本,地理定位后为结构化地址
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SiteAddress {
    Located(GeocodedAddress),
    Raw(String),
}

impl Default for SiteAddress {
    fn default() -> Self {
        SiteAddress::Raw(String::new())
    }
}

impl SiteAddress {
    /// 地址文本（结构化地址取格式化地址）
    pub fn as_text(&self) -> &str {
        match self {
            SiteAddress::Located(a) => &a.location,
            SiteAddress::Raw(s) => s,
        }
    }

    pub fn is_located(&self) -> bool {
        matches!(self, SiteAddress::Located(_))
    }
}

// ==========================================
// SiteRecord - 库存点记录
// ==========================================
// 自然键: reference（与物料页库存点引用一致）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    #[serde(rename = "deposit_name", alias = "reference", deserialize_with = "de_lenient_string")]
    pub reference: String,

    #[serde(default, deserialize_with = "de_lenient_string")]
    pub building_name: String,

    #[serde(rename = "provider", default, deserialize_with = "de_lenient_string")]
    pub provider_name: String,

    #[serde(default)]
    pub address: SiteAddress,

    #[serde(default, deserialize_with = "de_lenient_string")]
    pub city: String,

    // 行政分区代码（IRIS），地理定位后填充
    #[serde(rename = "iris", alias = "insee_code", default, deserialize_with = "de_lenient_opt_string")]
    pub iris_code: Option<String>,

    // ISO 日期 YYYY-MM-DD（无法识别时保留原文）
    #[serde(default, deserialize_with = "de_lenient_opt_string")]
    pub dismantle_date: Option<String>,

    #[serde(default, deserialize_with = "de_lenient_string")]
    pub availability_details: String,

    #[serde(rename = "content", default, deserialize_with = "de_lenient_string")]
    pub description: String,

    #[serde(rename = "plus_details", default, deserialize_with = "de_lenient_string")]
    pub extra_details: String,

    #[serde(default, deserialize_with = "de_lenient_opt_string")]
    pub thumbnail: Option<String>,

    // 有序,可含空白项
    #[serde(default, deserialize_with = "de_lenient_string_list")]
    pub photos: Vec<String>,

    #[serde(rename = "slug", default, deserialize_with = "de_lenient_opt_string")]
    pub url_slug: Option<String>,

    #[serde(default, deserialize_with = "de_lenient_string")]
    pub template_version: String,
}

impl SiteRecord {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            ..Default::default()
        }
    }

    /// 非空图片引用（缩略图在前,随后为照片）
    pub fn picture_references(&self) -> Vec<&str> {
        self.thumbnail
            .iter()
            .map(String::as_str)
            .chain(self.photos.iter().map(String::as_str))
            .filter(|p| !p.trim().is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_wire_names() {
        let json = r#"{
            "deposit_name": "DEP-1",
            "building_name": "Halle Nord",
            "provider": "Bailleur",
            "address": {"location": "1 rue A, 69001 Lyon, France", "lat": 45.76, "lng": 4.83},
            "city": "Lyon",
            "iris": 693810101,
            "dismantle_date": "2024-03-01",
            "content": "desc",
            "plus_details": "",
            "thumbnail": "",
            "photos": ["DEP-1_photo1", ""],
            "slug": "halle-nord",
            "template_version": 3
        }"#;

        let site: SiteRecord = serde_json::from_str(json).unwrap();
        assert_eq!(site.reference, "DEP-1");
        assert_eq!(site.provider_name, "Bailleur");
        assert!(site.address.is_located());
        assert_eq!(site.iris_code.as_deref(), Some("693810101"));
        assert_eq!(site.thumbnail, None);
        assert_eq!(site.photos.len(), 2);
        assert_eq!(site.template_version, "3");
    }

    #[test]
    fn test_raw_address() {
        let site: SiteRecord =
            serde_json::from_str(r#"{"deposit_name": "D", "address": "en attente"}"#).unwrap();
        assert_eq!(site.address.as_text(), "en attente");
        assert!(!site.address.is_located());
    }

    #[test]
    fn test_picture_references_skip_blanks() {
        let mut site = SiteRecord::new("D");
        site.thumbnail = Some("D_thumb".to_string());
        site.photos = vec!["".to_string(), "D_p2".to_string()];
        assert_eq!(site.picture_references(), vec!["D_thumb", "D_p2"]);
    }
}
