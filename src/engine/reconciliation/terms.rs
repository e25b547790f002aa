// 分类项解析: 城市、供应方、物料族/类目

use super::core::ReconciliationEngine;
use crate::domain::catalog::{sanitize_slug, CatalogTerm, EntityId};
use crate::domain::diagnostic::DiagnosticLog;
use crate::domain::types::Taxonomy;
use crate::repository::RepositoryResult;
use tracing::info;

/// 物料族/类目名称最小长度（不含）
const MIN_CATEGORY_NAME_LEN: usize = 2;

impl ReconciliationEngine {
    /// 按名称查找分类项,不存在则新建
    ///
    /// # 返回
    /// - (term, true): 新建
    pub(super) async fn ensure_named_term(
        &self,
        taxonomy: Taxonomy,
        name: &str,
    ) -> RepositoryResult<(CatalogTerm, bool)> {
        if let Some(term) = self.store.find_term_by_name(taxonomy, name).await? {
            return Ok((term, false));
        }
        let term = self.store.insert_term(taxonomy, name, None, None).await?;
        info!(taxonomy = %taxonomy, name, term_id = term.id, "新建分类项");
        Ok((term, true))
    }

    /// 物料族 + 类目 → 分类项标识（族在前）
    ///
    /// 失败只记诊断,返回已解析的部分。
    pub(super) async fn resolve_categories(
        &self,
        family: &str,
        category: &str,
        log: &mut DiagnosticLog,
    ) -> Vec<EntityId> {
        const CONTEXT: &str = "分类";
        let mut ids = Vec::new();

        let family_term = match self.resolve_family(family).await {
            Ok(term) => term,
            Err(e) => {
                log.error(CONTEXT, format!("物料族 {} 处理失败: {}", family, e));
                None
            }
        };
        if let Some(term) = &family_term {
            ids.push(term.id);
        }

        match self.resolve_category(category, family_term.as_ref()).await {
            Ok(Some(term)) => ids.push(term.id),
            Ok(None) => {}
            Err(e) => log.error(CONTEXT, format!("类目 {} 处理失败: {}", category, e)),
        }

        ids
    }

    async fn resolve_family(&self, family: &str) -> RepositoryResult<Option<CatalogTerm>> {
        let family = family.trim();
        if family.chars().count() <= MIN_CATEGORY_NAME_LEN {
            return Ok(None);
        }

        let slug = sanitize_slug(family);
        if let Some(term) = self.store.find_term_by_slug(Taxonomy::ProductCategory, &slug).await? {
            return Ok(Some(term));
        }
        let term = self
            .store
            .insert_term(Taxonomy::ProductCategory, family, None, None)
            .await?;
        info!(family, term_id = term.id, "新建物料族");
        Ok(Some(term))
    }

    /// 类目挂在物料族下; 同 slug 类目属于其他族时改用复合 slug「族-类目」
    async fn resolve_category(
        &self,
        category: &str,
        family: Option<&CatalogTerm>,
    ) -> RepositoryResult<Option<CatalogTerm>> {
        let category = category.trim();
        if category.chars().count() <= MIN_CATEGORY_NAME_LEN {
            return Ok(None);
        }

        let slug = sanitize_slug(category);
        let existing = self
            .store
            .find_term_by_slug(Taxonomy::ProductCategory, &slug)
            .await?;
        let parent = family.map(|f| f.id);

        let composite_slug = match (&existing, family) {
            (Some(term), Some(family)) if term.parent != Some(family.id) => {
                Some(format!("{}-{}", family.slug, term.slug))
            }
            (Some(_), _) => return Ok(existing),
            (None, _) => None,
        };

        if let Some(composite) = &composite_slug {
            if let Some(term) = self
                .store
                .find_term_by_slug(Taxonomy::ProductCategory, composite)
                .await?
            {
                return Ok(Some(term));
            }
        }

        let term = self
            .store
            .insert_term(
                Taxonomy::ProductCategory,
                category,
                composite_slug.as_deref(),
                parent,
            )
            .await?;
        info!(category, term_id = term.id, parent = ?parent, slug = %term.slug, "新建类目");
        Ok(Some(term))
    }
}
