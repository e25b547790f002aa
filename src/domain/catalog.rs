// ==========================================
// 物料盘点导入系统 - 目录实体模型
// ==========================================
// 职责: 目录存储所需的最小实体契约（库存点/物料/变体/分类/附件）
// 红线: 不绑定具体存储技术
// ==========================================

use crate::domain::types::{PostStatus, ProductKind, Taxonomy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 目录实体标识（由存储分配,调用方视为不透明）
pub type EntityId = i64;

/// 变体定义属性名
pub const VARIATION_ATTRIBUTE: &str = "Variation";

// ==========================================
// CatalogTerm - 分类项
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTerm {
    pub id: EntityId,
    pub taxonomy: Taxonomy,
    pub name: String,
    pub slug: String,
    pub parent: Option<EntityId>,
}

// ==========================================
// Attachment - 附件（图片）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: EntityId,
    pub url: String,
}

// ==========================================
// DepositEntity - 库存点实体
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositEntity {
    pub id: Option<EntityId>,
    pub title: String,
    pub slug: Option<String>,
    pub content: String,
    pub status: PostStatus,
}

// ==========================================
// ProductAttribute - 物料属性
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAttribute {
    pub name: String,
    pub options: Vec<String>,
    pub visible: bool,
    pub variation: bool, // 是否为变体定义属性
}

// ==========================================
// ProductDimensions - 清洗后的尺寸
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDimensions {
    pub length: String,
    pub width: String,
    pub height: String,
}

// ==========================================
// ProductEntity - 物料/变体实体
// ==========================================
// 简单物料、可变物料与变体共用一张表,kind 区分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductEntity {
    pub id: Option<EntityId>,
    pub kind: ProductKind,
    pub sku: String,
    pub parent_id: Option<EntityId>,
    pub name: String,
    pub description: String,
    pub price: String,
    pub regular_price: String,
    pub manage_stock: bool,
    pub stock_quantity: Option<i64>,
    pub dimensions: ProductDimensions,
    pub attributes: Vec<ProductAttribute>,
    pub variation_attributes: BTreeMap<String, String>,
    pub image_id: Option<EntityId>,
    pub gallery_ids: Vec<EntityId>,
    pub status: PostStatus,
}

impl ProductEntity {
    /// 新建空白实体（尚未持久化）
    pub fn new(kind: ProductKind, sku: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            sku: sku.into(),
            parent_id: None,
            name: String::new(),
            description: String::new(),
            price: String::new(),
            regular_price: String::new(),
            manage_stock: false,
            stock_quantity: None,
            dimensions: ProductDimensions::default(),
            attributes: Vec::new(),
            variation_attributes: BTreeMap::new(),
            image_id: None,
            gallery_ids: Vec::new(),
            status: PostStatus::AutoDraft,
        }
    }
}

// ==========================================
// MetaWrite - 元数据写入结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaWrite {
    Written,
    Unchanged, // 值未变化,存储未执行写入
}

// ==========================================
// URL 安全 slug
// ==========================================

/// 生成 URL 安全 slug（小写,去重音,非字母数字折叠为 '-'）
pub fn sanitize_slug(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut pending_dash = false;

    for c in raw.chars().flat_map(char::to_lowercase) {
        let folded = fold_accent(c);
        if folded.is_ascii_alphanumeric() || folded == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(folded);
        } else {
            pending_dash = true;
        }
    }

    slug
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'œ' => 'o',
        'æ' => 'a',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_slug() {
        assert_eq!(sanitize_slug("Menuiserie Intérieure"), "menuiserie-interieure");
        assert_eq!(sanitize_slug("  Porte / Fenêtre  "), "porte-fenetre");
        assert_eq!(sanitize_slug("DEP-1_photo 2"), "dep-1_photo-2");
        assert_eq!(sanitize_slug("---"), "");
    }

    #[test]
    fn test_new_product_defaults() {
        let p = ProductEntity::new(ProductKind::Simple, "A1");
        assert_eq!(p.status, PostStatus::AutoDraft);
        assert!(p.id.is_none());
        assert!(!p.manage_stock);
    }
}
