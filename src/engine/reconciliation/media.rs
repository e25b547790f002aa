// 图片引用 → 附件

use super::core::ReconciliationEngine;
use crate::domain::catalog::{sanitize_slug, Attachment, ProductEntity};
use crate::domain::diagnostic::DiagnosticLog;
use crate::domain::material::MaterialItem;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

fn extension_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\.(png|jpg|gif|jpeg)").expect("扩展名正则无效"))
}

/// 图片引用 → 附件 GUID 匹配片段（去扩展名后转 slug）
pub fn picture_fragment(reference: &str) -> String {
    let stripped = extension_regex().replace_all(reference, "");
    sanitize_slug(stripped.trim())
}

impl ReconciliationEngine {
    /// 解析单个图片引用
    ///
    /// # 返回
    /// - Ok(None): 空引用或无匹配附件
    pub(super) async fn resolve_picture(
        &self,
        reference: &str,
    ) -> crate::repository::RepositoryResult<Option<Attachment>> {
        let fragment = picture_fragment(reference);
        if fragment.is_empty() {
            return Ok(None);
        }
        self.store.find_attachment(&fragment).await
    }

    /// 解析一组图片引用; 空白项跳过,未解析项各记一条 error 诊断
    pub(super) async fn resolve_pictures<'a, I>(
        &self,
        references: I,
        context: &str,
        log: &mut DiagnosticLog,
    ) -> Vec<Attachment>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut resolved = Vec::new();
        for reference in references {
            if reference.trim().is_empty() {
                continue;
            }
            match self.resolve_picture(reference).await {
                Ok(Some(attachment)) => {
                    debug!(reference, attachment_id = attachment.id, "图片已匹配");
                    resolved.push(attachment);
                }
                Ok(None) => log.error(context, format!("图片 '{}' 无法处理", reference)),
                Err(e) => log.error(context, format!("图片 '{}' 查询失败: {}", reference, e)),
            }
        }
        resolved
    }

    /// 物料图片: 细节图进入图集,首个全局图为主图并置于图集首位
    pub(super) async fn apply_product_images(
        &self,
        product: &mut ProductEntity,
        item: &MaterialItem,
        log: &mut DiagnosticLog,
    ) {
        const CONTEXT: &str = "图片管理";

        let mut gallery: Vec<_> = self
            .resolve_pictures(item.picture_details.iter().map(String::as_str), CONTEXT, log)
            .await
            .into_iter()
            .map(|a| a.id)
            .collect();

        let global = item.picture_global.as_deref().into_iter();
        if let Some(primary) = self.resolve_pictures(global, CONTEXT, log).await.first() {
            product.image_id = Some(primary.id);
            gallery.insert(0, primary.id);
        }

        if !gallery.is_empty() {
            product.gallery_ids = gallery;
        }
    }
}
