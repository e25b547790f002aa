// 库存点对账

use super::core::ReconciliationEngine;
use crate::domain::catalog::{sanitize_slug, DepositEntity, EntityId};
use crate::domain::diagnostic::DiagnosticLog;
use crate::domain::site::{SiteAddress, SiteRecord};
use crate::domain::types::{PostStatus, Taxonomy};
use serde_json::Value;
use tracing::{info, instrument, warn};

const CONTEXT: &str = "库存点";

/// 库存点元数据键
pub(super) mod deposit_meta {
    pub const GALLERY: &str = "galery";
    pub const THUMBNAIL: &str = "_thumbnail_id";
    pub const LOCATION: &str = "location";
    pub const REFERENCE: &str = "reference";
    pub const DISMANTLE_DATE: &str = "dismantle_date";
    pub const AVAILABILITY_DETAILS: &str = "availability_details";
    pub const PLUS_DETAILS: &str = "plus_details";
    pub const INSEE_CODE: &str = "insee_code";
}

/// 分类项元数据: 供应方颜色
const TERM_COLOR_META: &str = "color";

fn location_value(address: &SiteAddress) -> String {
    match address {
        SiteAddress::Located(a) => serde_json::to_string(a).unwrap_or_else(|_| a.location.clone()),
        SiteAddress::Raw(s) => s.clone(),
    }
}

impl ReconciliationEngine {
    /// 库存点 upsert（按引用号）
    ///
    /// # 返回
    /// - Some(id): 实体已保存（可能伴随 error 诊断）
    /// - None: 查找或保存失败
    #[instrument(skip(self, site, log), fields(reference = %site.reference))]
    pub async fn upsert_deposit(&self, site: &SiteRecord, log: &mut DiagnosticLog) -> Option<EntityId> {
        if site.reference.trim().is_empty() {
            warn!("库存点引用为空,跳过库存点");
            log.error(CONTEXT, "库存点引用为空,未创建或更新库存点");
            return None;
        }

        // 图片
        let thumbnails = match site.thumbnail.as_deref() {
            Some(thumb) => self.resolve_pictures([thumb], CONTEXT, log).await,
            None => {
                log.info(CONTEXT, "没有需要登记的缩略图");
                Vec::new()
            }
        };
        if site.photos.iter().all(|p| p.trim().is_empty()) {
            log.info(CONTEXT, "没有需要登记的图集照片");
        }
        let photos = self
            .resolve_pictures(site.photos.iter().map(String::as_str), CONTEXT, log)
            .await;

        // 查找
        let existing = match self.store.find_deposit_by_reference(&site.reference).await {
            Ok(id) => id,
            Err(e) => {
                log.error(CONTEXT, format!("库存点 {} 查找失败: {}", site.reference, e));
                return None;
            }
        };

        let mut slug = site
            .url_slug
            .as_deref()
            .map(sanitize_slug)
            .filter(|s| !s.is_empty());
        if let (Some(id), None) = (existing, &slug) {
            slug = self
                .store
                .get_deposit(id)
                .await
                .ok()
                .flatten()
                .and_then(|d| d.slug);
        }

        let entity = DepositEntity {
            id: existing,
            title: site.building_name.clone(),
            slug,
            content: site.description.clone(),
            status: PostStatus::AutoDraft,
        };

        let id = match self.store.save_deposit(&entity).await {
            Ok(id) => id,
            Err(e) => {
                log.error(CONTEXT, format!("库存点 {} 保存失败: {}", site.reference, e));
                return None;
            }
        };
        info!(deposit_id = id, created = existing.is_none(), "库存点已保存");

        // 图集
        let primary = thumbnails.first().map(|a| a.id);
        let mut pictures = thumbnails;
        pictures.extend(photos);
        self.write_gallery(id, &pictures, log).await;

        // 元数据
        let metas = [
            (deposit_meta::LOCATION, location_value(&site.address)),
            (deposit_meta::REFERENCE, site.reference.clone()),
            (deposit_meta::DISMANTLE_DATE, site.dismantle_date.clone().unwrap_or_default()),
            (deposit_meta::AVAILABILITY_DETAILS, site.availability_details.clone()),
            (deposit_meta::PLUS_DETAILS, site.extra_details.clone()),
            (deposit_meta::INSEE_CODE, site.iris_code.clone().unwrap_or_default()),
        ];
        for (key, value) in &metas {
            self.write_meta(id, key, value, CONTEXT, true, log).await;
        }

        // 分类: 城市、供应方
        self.attach_deposit_term(id, Taxonomy::City, &site.city, "城市", log).await;
        self.attach_deposit_term(id, Taxonomy::DepositType, &site.provider_name, "供应方", log)
            .await;

        // 主图: 仅取已解析的缩略图,照片不顶替
        if let Some(primary) = primary {
            self.write_meta(id, deposit_meta::THUMBNAIL, &primary.to_string(), CONTEXT, false, log)
                .await;
        }

        // 发布
        match self.store.set_status(id, PostStatus::Publish).await {
            Ok(final_id) if final_id == id => {}
            Ok(final_id) => log.error(
                CONTEXT,
                format!("库存点最终更新返回了意外的标识 {}（期望 {}）", final_id, id),
            ),
            Err(e) => log.error(CONTEXT, format!("库存点最终更新失败: {}", e)),
        }

        Some(id)
    }

    /// 写入图集; 已有值不是数组时记 error 并以新值覆盖
    async fn write_gallery(
        &self,
        id: EntityId,
        pictures: &[crate::domain::catalog::Attachment],
        log: &mut DiagnosticLog,
    ) {
        if let Ok(Some(current)) = self.store.get_meta(id, deposit_meta::GALLERY).await {
            let is_array = matches!(serde_json::from_str::<Value>(&current), Ok(Value::Array(_)));
            if !is_array {
                warn!(deposit_id = id, "图集数据损坏");
                log.error(CONTEXT, "库存点已有图集数据不是列表,已重新写入");
            }
        }

        match serde_json::to_string(pictures) {
            Ok(json) => {
                self.write_meta(id, deposit_meta::GALLERY, &json, CONTEXT, false, log)
                    .await
            }
            Err(e) => log.error(CONTEXT, format!("库存点图片登记失败: {}", e)),
        }
    }

    /// 按名称查找或新建分类项并关联到库存点
    async fn attach_deposit_term(
        &self,
        id: EntityId,
        taxonomy: Taxonomy,
        name: &str,
        label: &str,
        log: &mut DiagnosticLog,
    ) {
        let name = name.trim();
        if name.is_empty() {
            log.warning(CONTEXT, format!("{}为空,未关联{}分类", label, label));
            return;
        }

        let term = match self.ensure_named_term(taxonomy, name).await {
            Ok((term, created)) => {
                if created {
                    log.info(CONTEXT, format!("未找到{}分类 {},已新建", label, name));
                    if taxonomy == Taxonomy::DepositType {
                        let color = &self.options.provider_term_color;
                        if let Err(e) = self.store.set_term_meta(term.id, TERM_COLOR_META, color).await {
                            log.error(CONTEXT, format!("{}分类颜色写入失败: {}", label, e));
                        }
                    }
                }
                term
            }
            Err(e) => {
                log.error(CONTEXT, format!("{}分类 {} 处理失败: {}", label, name, e));
                return;
            }
        };

        if let Err(e) = self.store.assign_terms(id, taxonomy, &[term.id]).await {
            log.error(CONTEXT, format!("{}分类关联失败: {}", label, e));
        }
    }
}
