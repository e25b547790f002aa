// ==========================================
// 物料盘点导入系统 - 物料领域模型
// ==========================================
// 职责: 物料页抽取结果 MaterialItem（父项 → 变体树）
// 用途: 抽取层写入,对账层只读
// 序列化: 字段名与导入请求 JSON (depositData) 对齐
// ==========================================

use crate::domain::types::{de_lenient_string, de_lenient_string_list, Scalar};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 默认计量单位
pub const DEFAULT_UNIT: &str = "u";

// ==========================================
// Dimensions - 尺寸（自由文本,对账时清洗为数字）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    #[serde(rename = "lng", default, deserialize_with = "de_lenient_string")]
    pub length: String,
    #[serde(rename = "lrg", default, deserialize_with = "de_lenient_string")]
    pub width: String,
    #[serde(rename = "htr", default, deserialize_with = "de_lenient_string")]
    pub height: String,
}

// ==========================================
// CodeAttributes - 追溯编码
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeAttributes {
    #[serde(rename = "PEMD_code", default, deserialize_with = "de_lenient_string")]
    pub code: String,
    #[serde(rename = "PEMD_Macro", default, deserialize_with = "de_lenient_string")]
    pub macro_category: String,
    #[serde(rename = "PEMD_Cat", default, deserialize_with = "de_lenient_string")]
    pub category: String,
    #[serde(rename = "PEMD_PEM", alias = "PMED_PEM", default, deserialize_with = "de_lenient_string")]
    pub pem: String,
}

// ==========================================
// MaterialItem - 物料项
// ==========================================
// 自然键: reference (= SKU)
// variations 为空 → 简单物料;非空 → 可变物料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialItem {
    #[serde(rename = "ref", deserialize_with = "de_lenient_string")]
    pub reference: String,

    #[serde(rename = "familly", alias = "family", default, deserialize_with = "de_lenient_string")]
    pub family: String,

    #[serde(default, deserialize_with = "de_lenient_string")]
    pub category: String,

    #[serde(default, deserialize_with = "de_lenient_string")]
    pub designation: String,

    #[serde(rename = "type", default, deserialize_with = "de_lenient_string")]
    pub material_type: String,

    #[serde(flatten)]
    pub dimensions: Dimensions,

    #[serde(rename = "surf", default, deserialize_with = "de_lenient_string")]
    pub surface: String,

    #[serde(rename = "qty", default = "default_quantity")]
    pub quantity: Scalar,

    #[serde(default = "default_unit", deserialize_with = "de_lenient_string")]
    pub unit: String,

    #[serde(default, deserialize_with = "de_lenient_string")]
    pub condition: String,

    #[serde(default, deserialize_with = "de_lenient_string")]
    pub description: String,

    #[serde(rename = "rqs", default, deserialize_with = "de_lenient_string")]
    pub remarks: String,

    #[serde(flatten)]
    pub codes: CodeAttributes,

    #[serde(rename = "picRefGlob", default, with = "picture_slot")]
    pub picture_global: Option<String>,

    // 有序,最多 4 项
    #[serde(rename = "picRefDetails", default, deserialize_with = "de_lenient_string_list")]
    pub picture_details: Vec<String>,

    #[serde(default)]
    pub price: Option<Scalar>,

    #[serde(default)]
    pub variations: Vec<MaterialItem>,

    #[serde(rename = "deposit", default, deserialize_with = "de_lenient_string")]
    pub deposit_reference: String,
}

fn default_quantity() -> Scalar {
    Scalar::Int(1)
}

fn default_unit() -> String {
    DEFAULT_UNIT.to_string()
}

impl Default for MaterialItem {
    fn default() -> Self {
        Self {
            reference: String::new(),
            family: String::new(),
            category: String::new(),
            designation: String::new(),
            material_type: String::new(),
            dimensions: Dimensions::default(),
            surface: String::new(),
            quantity: default_quantity(),
            unit: default_unit(),
            condition: String::new(),
            description: String::new(),
            remarks: String::new(),
            codes: CodeAttributes::default(),
            picture_global: None,
            picture_details: Vec::new(),
            price: None,
            variations: Vec::new(),
            deposit_reference: String::new(),
        }
    }
}

impl MaterialItem {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            ..Default::default()
        }
    }

    /// 是否为可变物料（含变体）
    pub fn is_variable(&self) -> bool {
        !self.variations.is_empty()
    }

    /// 先序展开引用号（父项在其变体之前）
    pub fn flatten_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        out.push(self.reference.as_str());
        for variation in &self.variations {
            variation.flatten_references(out);
        }
    }
}

/// 物料树的先序引用号列表
pub fn flatten_tree_references(items: &[MaterialItem]) -> Vec<&str> {
    let mut refs = Vec::new();
    for item in items {
        item.flatten_references(&mut refs);
    }
    refs
}

// 主图在导入 JSON 中为单元素数组
mod picture_slot {
    use super::*;

    pub fn serialize<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let list: Vec<&str> = value.iter().map(String::as_str).collect();
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let list = de_lenient_string_list(deserializer)?;
        Ok(list.into_iter().find(|p| !p.trim().is_empty()))
    }
}
