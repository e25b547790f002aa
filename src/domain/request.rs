// ==========================================
// 物料盘点导入系统 - 导入请求
// ==========================================
// 职责: 抽取端 → 对账端的传输结构 {siteData, depositData, update_qty}
// ==========================================

use crate::domain::material::MaterialItem;
use crate::domain::site::SiteRecord;
use crate::domain::types::Scalar;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRequest {
    #[serde(rename = "siteData")]
    pub site: SiteRecord,

    #[serde(rename = "depositData", default)]
    pub materials: Vec<MaterialItem>,

    // 全局库存更新开关,对整批物料生效
    #[serde(rename = "update_qty", default, deserialize_with = "de_lenient_bool")]
    pub update_quantities: bool,
}

fn de_lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => matches!(s.trim(), "true" | "1"),
        other => other.is_truthy(),
    })
}
