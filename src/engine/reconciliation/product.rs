// 物料与变体对账

use super::core::ReconciliationEngine;
use crate::domain::catalog::{
    EntityId, ProductAttribute, ProductDimensions, ProductEntity, VARIATION_ATTRIBUTE,
};
use crate::domain::diagnostic::DiagnosticLog;
use crate::domain::material::MaterialItem;
use crate::domain::types::{PostStatus, ProductKind, Taxonomy};
use crate::importer::validators::{build_dimension_slug, sanitize_dimension, sanitize_quantity};
use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

const CONTEXT_SIMPLE: &str = "物料";
const CONTEXT_VARIABLE: &str = "可变物料";
const CONTEXT_LOOKUP: &str = "物料管理";

/// 物料元数据键
pub(super) mod product_meta {
    pub const REMARKS: &str = "remarques";
    pub const DEPOSIT: &str = "deposit";
    pub const MATERIAL: &str = "material";
    pub const CONDITION: &str = "condition";
    pub const UNIT: &str = "unit";
    pub const CODE: &str = "code";
    pub const MACRO_CATEGORY: &str = "macrocat";
    pub const CATEGORY: &str = "categorie";
    pub const PEM: &str = "pem";
    pub const REFERENCE: &str = "reference";
    pub const DESIGNATION: &str = "designation";
    pub const AVAILABILITY_DATE: &str = "availability_date";
    pub const INITIAL_STOCK: &str = "_initial_stock";
}

/// 换行前插入 `<br />`（保留原换行）
pub(super) fn nl2br(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                out.push_str("<br />\r");
                if chars.peek() == Some(&'\n') {
                    chars.next();
                    out.push('\n');
                }
            }
            '\n' => out.push_str("<br />\n"),
            other => out.push(other),
        }
    }
    out
}

fn sanitized_dimensions(item: &MaterialItem) -> ProductDimensions {
    ProductDimensions {
        length: sanitize_dimension(&item.dimensions.length),
        width: sanitize_dimension(&item.dimensions.width),
        height: sanitize_dimension(&item.dimensions.height),
    }
}

/// 分类元数据（缺失为空串）
fn classification_metas(item: &MaterialItem, deposit_reference: &str) -> Vec<(&'static str, String)> {
    vec![
        (product_meta::REMARKS, item.remarks.clone()),
        (product_meta::DEPOSIT, deposit_reference.to_string()),
        (product_meta::MATERIAL, item.material_type.clone()),
        (product_meta::CONDITION, item.condition.clone()),
        (product_meta::UNIT, item.unit.clone()),
        (product_meta::CODE, item.codes.code.clone()),
        (product_meta::MACRO_CATEGORY, item.codes.macro_category.clone()),
        (product_meta::CATEGORY, item.codes.category.clone()),
        (product_meta::PEM, item.codes.pem.clone()),
    ]
}

impl ReconciliationEngine {
    /// 物料批量 upsert
    ///
    /// # 参数
    /// - update_quantities: 全局库存更新开关（整批生效）
    ///
    /// # 返回
    /// 已保存的顶层物料标识（不含变体）
    #[instrument(skip(self, items, log), fields(items = items.len()))]
    pub async fn upsert_materials(
        &self,
        items: &[MaterialItem],
        update_quantities: bool,
        log: &mut DiagnosticLog,
    ) -> Vec<EntityId> {
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let saved = if item.is_variable() {
                self.upsert_variable_item(item, update_quantities, log).await
            } else {
                self.upsert_simple_item(item, update_quantities, log).await
            };
            ids.extend(saved);
        }
        ids
    }

    /// 简单物料
    #[instrument(skip(self, item, log), fields(sku = %item.reference))]
    pub async fn upsert_simple_item(
        &self,
        item: &MaterialItem,
        update_quantities: bool,
        log: &mut DiagnosticLog,
    ) -> Option<EntityId> {
        let mut product = self.lookup_product(&item.reference, ProductKind::Simple, log).await?;
        let created = product.id.is_none();

        product.status = PostStatus::AutoDraft;
        product.name = item.designation.clone();
        if item.designation.trim().is_empty() {
            log.warning(CONTEXT_SIMPLE, format!("物料 {} 没有名称", item.reference));
        }
        if update_quantities {
            product.manage_stock = true;
            product.stock_quantity = Some(sanitize_quantity(&item.quantity));
        }
        self.apply_price(&mut product, item);
        if !item.description.trim().is_empty() {
            product.description = nl2br(&item.description);
        }
        product.dimensions = sanitized_dimensions(item);

        let id = self.save_product_step(&product, CONTEXT_SIMPLE, log).await?;
        product.id = Some(id);

        let categories = self.resolve_categories(&item.family, &item.category, log).await;
        self.assign_categories(id, &categories, CONTEXT_SIMPLE, log).await;

        for (key, value) in classification_metas(item, &item.deposit_reference) {
            self.write_meta(id, key, &value, CONTEXT_SIMPLE, false, log).await;
        }
        self.write_availability_date(id, &item.deposit_reference, CONTEXT_SIMPLE, log)
            .await;

        self.apply_product_images(&mut product, item, log).await;

        product.status = PostStatus::Publish;
        self.publish_product(&product, id, CONTEXT_SIMPLE, log).await;
        info!(product_id = id, created, "简单物料已发布");
        Some(id)
    }

    /// 可变物料及其变体
    #[instrument(skip(self, item, log), fields(sku = %item.reference, variations = item.variations.len()))]
    pub async fn upsert_variable_item(
        &self,
        item: &MaterialItem,
        update_quantities: bool,
        log: &mut DiagnosticLog,
    ) -> Option<EntityId> {
        let mut parent = self.lookup_product(&item.reference, ProductKind::Variable, log).await?;

        parent.name = item.designation.clone();
        if item.designation.trim().is_empty() {
            log.warning(CONTEXT_VARIABLE, format!("物料 {} 没有名称", item.reference));
        }

        let mut options: Vec<String> = Vec::new();
        for variation in &item.variations {
            if !options.contains(&variation.reference) {
                options.push(variation.reference.clone());
            }
        }
        parent.attributes = vec![ProductAttribute {
            name: VARIATION_ATTRIBUTE.to_string(),
            options,
            visible: true,
            variation: true,
        }];
        if !item.description.trim().is_empty() {
            parent.description = nl2br(&item.description);
        }
        parent.status = PostStatus::AutoDraft;

        // 先保存以获得父标识
        let id = self.save_product_step(&parent, CONTEXT_VARIABLE, log).await?;
        parent.id = Some(id);

        self.apply_product_images(&mut parent, item, log).await;

        let categories = self.resolve_categories(&item.family, &item.category, log).await;
        self.assign_categories(id, &categories, CONTEXT_VARIABLE, log).await;

        self.write_meta(id, product_meta::REMARKS, &item.remarks, CONTEXT_VARIABLE, false, log)
            .await;
        self.write_meta(id, product_meta::DEPOSIT, &item.deposit_reference, CONTEXT_VARIABLE, false, log)
            .await;
        self.write_availability_date(id, &item.deposit_reference, CONTEXT_VARIABLE, log)
            .await;
        self.write_meta(
            id,
            product_meta::INITIAL_STOCK,
            &item.quantity.as_text(),
            CONTEXT_VARIABLE,
            false,
            log,
        )
        .await;

        self.save_product_step(&parent, CONTEXT_VARIABLE, log).await;

        for variation in &item.variations {
            self.upsert_variation(variation, item, id, update_quantities, log).await;
        }

        // 变体就绪后再次保存并最后发布
        parent.status = PostStatus::Publish;
        self.publish_product(&parent, id, CONTEXT_VARIABLE, log).await;
        info!(product_id = id, "可变物料已发布");
        Some(id)
    }

    async fn upsert_variation(
        &self,
        variation: &MaterialItem,
        parent_item: &MaterialItem,
        parent_id: EntityId,
        update_quantities: bool,
        log: &mut DiagnosticLog,
    ) -> Option<EntityId> {
        let slug = build_dimension_slug(&variation.dimensions);
        debug!(sku = %variation.reference, dimension_slug = %slug, "变体尺寸");

        let mut entity = self
            .lookup_product(&variation.reference, ProductKind::Variation, log)
            .await?;

        self.apply_price(&mut entity, variation);
        entity.parent_id = Some(parent_id);
        entity.manage_stock = true;
        if update_quantities {
            entity.stock_quantity = Some(sanitize_quantity(&variation.quantity));
        }
        entity.dimensions = sanitized_dimensions(variation);
        if !variation.description.trim().is_empty() {
            entity.description = nl2br(&variation.description);
        }
        entity.variation_attributes.clear();
        entity
            .variation_attributes
            .insert(VARIATION_ATTRIBUTE.to_lowercase(), variation.reference.clone());
        entity.status = PostStatus::AutoDraft;

        self.apply_product_images(&mut entity, variation, log).await;

        let v_id = self.save_product_step(&entity, CONTEXT_VARIABLE, log).await?;
        entity.id = Some(v_id);

        let deposit_reference = if variation.deposit_reference.trim().is_empty() {
            parent_item.deposit_reference.as_str()
        } else {
            variation.deposit_reference.as_str()
        };

        let mut metas = classification_metas(variation, deposit_reference);
        metas.push((product_meta::REFERENCE, variation.reference.clone()));
        metas.push((product_meta::DESIGNATION, variation.designation.clone()));
        metas.push((product_meta::INITIAL_STOCK, variation.quantity.as_text()));
        for (key, value) in metas {
            self.write_meta(v_id, key, &value, CONTEXT_VARIABLE, false, log).await;
        }
        self.write_availability_date(v_id, deposit_reference, CONTEXT_VARIABLE, log)
            .await;

        entity.status = PostStatus::Publish;
        self.publish_product(&entity, v_id, CONTEXT_VARIABLE, log).await;
        debug!(variation_id = v_id, parent_id, "变体已发布");
        Some(v_id)
    }

    // ===== 辅助 =====

    /// 按 SKU 查找,不存在则构造新实体; 查找失败记 error 并跳过
    async fn lookup_product(
        &self,
        sku: &str,
        kind: ProductKind,
        log: &mut DiagnosticLog,
    ) -> Option<ProductEntity> {
        match self.store.find_product_by_sku(sku).await {
            Ok(Some(mut product)) => {
                if product.kind != kind {
                    warn!(sku, from = product.kind.as_str(), to = kind.as_str(), "物料类型变更");
                    log.warning(
                        CONTEXT_LOOKUP,
                        format!(
                            "物料 {} 已存在且类型为 {},将改为 {}",
                            sku,
                            product.kind.as_str(),
                            kind.as_str()
                        ),
                    );
                    product.kind = kind;
                }
                Some(product)
            }
            Ok(None) => Some(ProductEntity::new(kind, sku)),
            Err(e) => {
                log.error(CONTEXT_LOOKUP, format!("物料 {} 无法创建/查找: {}", sku, e));
                None
            }
        }
    }

    fn apply_price(&self, product: &mut ProductEntity, item: &MaterialItem) {
        let price = item
            .price
            .as_ref()
            .filter(|p| !p.is_blank())
            .map(|p| p.as_text())
            .unwrap_or_else(|| self.options.default_price.clone());
        product.price = price.clone();
        product.regular_price = price;
    }

    async fn save_product_step(
        &self,
        product: &ProductEntity,
        context: &str,
        log: &mut DiagnosticLog,
    ) -> Option<EntityId> {
        match self.store.save_product(product).await {
            Ok(id) => Some(id),
            Err(e) => {
                log.error(context, format!("物料 {} 保存失败: {}", product.sku, e));
                None
            }
        }
    }

    /// 最终保存（发布）; 返回标识与预期不符时记 error
    async fn publish_product(
        &self,
        product: &ProductEntity,
        expected: EntityId,
        context: &str,
        log: &mut DiagnosticLog,
    ) {
        if let Some(final_id) = self.save_product_step(product, context, log).await {
            if final_id != expected {
                log.error(
                    context,
                    format!("物料 {} 最终更新返回了意外的标识 {}（期望 {}）", product.sku, final_id, expected),
                );
            }
        }
    }

    async fn assign_categories(
        &self,
        id: EntityId,
        categories: &[EntityId],
        context: &str,
        log: &mut DiagnosticLog,
    ) {
        if categories.is_empty() {
            return;
        }
        if let Err(e) = self
            .store
            .assign_terms(id, Taxonomy::ProductCategory, categories)
            .await
        {
            log.error(context, format!("分类关联失败: {}", e));
        }
    }

    /// 可用日期 = 所属库存点的拆除日期（YYYY-MM-DD）; 无法确定时不写
    pub(super) async fn availability_date(&self, deposit_reference: &str) -> Option<String> {
        if deposit_reference.trim().is_empty() {
            return None;
        }
        let deposit = self
            .store
            .find_deposit_by_reference(deposit_reference)
            .await
            .ok()
            .flatten()?;
        let raw = self
            .store
            .get_meta(deposit, super::deposit::deposit_meta::DISMANTLE_DATE)
            .await
            .ok()
            .flatten()?;
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .ok()
            .map(|d| d.format("%Y-%m-%d").to_string())
    }

    async fn write_availability_date(
        &self,
        id: EntityId,
        deposit_reference: &str,
        context: &str,
        log: &mut DiagnosticLog,
    ) {
        match self.availability_date(deposit_reference).await {
            Some(date) => {
                self.write_meta(id, product_meta::AVAILABILITY_DATE, &date, context, false, log)
                    .await
            }
            None => debug!(entity = id, deposit_reference, "无可用日期"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nl2br() {
        assert_eq!(nl2br("a\nb"), "a<br />\nb");
        assert_eq!(nl2br("a\r\nb"), "a<br />\r\nb");
        assert_eq!(nl2br("plain"), "plain");
    }
}
