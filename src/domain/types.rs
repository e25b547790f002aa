// ==========================================
// 物料盘点导入系统 - 领域类型定义
// ==========================================
// 职责: 标量值、单元格类型、诊断级别、目录状态枚举
// 红线: 纯数据类型,不含 IO
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 标量值 (Scalar)
// ==========================================
// 单元格解析后的平面值,也是导入请求 JSON 中的松散字段类型
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// 转为文本（Null → 空串，整数值的浮点数不带小数部分）
    pub fn as_text(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => format_float(*f),
            Scalar::Text(s) => s.clone(),
        }
    }

    /// 是否为空白（Null 或仅含空白字符的文本）
    pub fn is_blank(&self) -> bool {
        match self {
            Scalar::Null => true,
            Scalar::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 弱类型真值判断（空值/false/0/空串/NaN 为假）
    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Null => false,
            Scalar::Bool(b) => *b,
            Scalar::Int(i) => *i != 0,
            Scalar::Float(f) => *f != 0.0 && !f.is_nan(),
            Scalar::Text(s) => !s.is_empty(),
        }
    }

    /// 尝试解析为整数（文本取前导整数部分,与表格习惯一致）
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            Scalar::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Scalar::Bool(_) | Scalar::Null | Scalar::Float(_) => None,
            Scalar::Text(s) => parse_leading_int(s),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// 解析文本的前导整数（"12 pcs" → 12, "abc" → None）
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|v| v * sign)
}

// ==========================================
// 单元格类型 (Cell Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    Null,
    Number,
    Boolean,
    String,
    Formula,
    Hyperlink,
    RichText,
    Error,
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CellType::Null => "null",
            CellType::Number => "number",
            CellType::Boolean => "boolean",
            CellType::String => "string",
            CellType::Formula => "formula",
            CellType::Hyperlink => "hyperlink",
            CellType::RichText => "rich_text",
            CellType::Error => "error",
        };
        write!(f, "{}", s)
    }
}

// ==========================================
// 诊断级别 (Diagnostic Level)
// ==========================================
// 仅 Error 级别会把响应从 200 降为 206
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticLevel::Info => write!(f, "INFO"),
            DiagnosticLevel::Warning => write!(f, "WARNING"),
            DiagnosticLevel::Error => write!(f, "ERROR"),
            DiagnosticLevel::Fatal => write!(f, "FATAL"),
        }
    }
}

// ==========================================
// 发布状态 (Post Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostStatus {
    AutoDraft, // 新建占位
    Draft,
    Publish,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::AutoDraft => "auto-draft",
            PostStatus::Draft => "draft",
            PostStatus::Publish => "publish",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "auto-draft" => Some(PostStatus::AutoDraft),
            "draft" => Some(PostStatus::Draft),
            "publish" => Some(PostStatus::Publish),
            _ => None,
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 目录实体类别 (Entity Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Deposit,          // 库存点
    Product,          // 物料（简单或可变）
    ProductVariation, // 物料变体
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Deposit => "deposit",
            EntityKind::Product => "product",
            EntityKind::ProductVariation => "product_variation",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "deposit" => Some(EntityKind::Deposit),
            "product" => Some(EntityKind::Product),
            "product_variation" => Some(EntityKind::ProductVariation),
            _ => None,
        }
    }
}

// ==========================================
// 物料形态 (Product Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Simple,
    Variable,
    Variation,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Simple => "simple",
            ProductKind::Variable => "variable",
            ProductKind::Variation => "variation",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "simple" => Some(ProductKind::Simple),
            "variable" => Some(ProductKind::Variable),
            "variation" => Some(ProductKind::Variation),
            _ => None,
        }
    }
}

// ==========================================
// 分类法 (Taxonomy)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Taxonomy {
    City,            // 城市
    DepositType,     // 供应方/库存点类型
    ProductCategory, // 物料族/类目（两级）
}

impl Taxonomy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Taxonomy::City => "city",
            Taxonomy::DepositType => "deposit_type",
            Taxonomy::ProductCategory => "product_cat",
        }
    }
}

impl fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 宽松反序列化 (导入请求中的字段类型不稳定)
// ==========================================

/// 任意标量 → 文本
pub fn de_lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Scalar::deserialize(deserializer)?.as_text())
}

/// 任意标量 → 可选文本（空白视为 None）
pub fn de_lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Scalar::deserialize(deserializer)?;
    if value.is_blank() {
        Ok(None)
    } else {
        Ok(Some(value.as_text()))
    }
}

/// 标量或标量数组 → 文本列表（保留空白项）
pub fn de_lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<Scalar>),
        One(Scalar),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(values) => values.iter().map(Scalar::as_text).collect(),
        OneOrMany::One(Scalar::Null) => Vec::new(),
        OneOrMany::One(value) => vec![value.as_text()],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_as_text() {
        assert_eq!(Scalar::Null.as_text(), "");
        assert_eq!(Scalar::Float(5.0).as_text(), "5");
        assert_eq!(Scalar::Float(2.5).as_text(), "2.5");
        assert_eq!(Scalar::Bool(true).as_text(), "true");
    }

    #[test]
    fn test_scalar_untagged_deserialize() {
        let values: Vec<Scalar> = serde_json::from_str(r#"[null, true, 7, 1.5, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Scalar::Null,
                Scalar::Bool(true),
                Scalar::Int(7),
                Scalar::Float(1.5),
                Scalar::Text("x".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_leading_int() {
        assert_eq!(parse_leading_int("12 pcs"), Some(12));
        assert_eq!(parse_leading_int("-5"), Some(-5));
        assert_eq!(parse_leading_int("abc"), None);
        assert_eq!(parse_leading_int(""), None);
    }

    #[test]
    fn test_diagnostic_level_order() {
        assert!(DiagnosticLevel::Error > DiagnosticLevel::Warning);
        assert!(DiagnosticLevel::Fatal > DiagnosticLevel::Error);
    }
}
