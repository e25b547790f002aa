use crate::config::{defaults, ConfigResult, ImportConfigReader};
use crate::domain::catalog::{EntityId, MetaWrite};
use crate::domain::diagnostic::{DiagnosticLog, ImportStatus};
use crate::domain::request::ImportRequest;
use crate::repository::CatalogStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

// ==========================================
// ReconciliationOptions - 对账参数
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationOptions {
    pub default_price: String,       // 缺省价格
    pub provider_term_color: String, // 新建供应方分类项颜色
}

impl Default for ReconciliationOptions {
    fn default() -> Self {
        Self {
            default_price: defaults::DEFAULT_PRICE.to_string(),
            provider_term_color: defaults::PROVIDER_TERM_COLOR.to_string(),
        }
    }
}

impl ReconciliationOptions {
    pub async fn from_config(config: &dyn ImportConfigReader) -> ConfigResult<Self> {
        Ok(Self {
            default_price: config.get_default_price().await?,
            provider_term_color: config.get_provider_term_color().await?,
        })
    }
}

// ==========================================
// ImportReport - 一次导入的结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub batch_id: String,
    pub deposit_id: Option<EntityId>,
    pub product_ids: Vec<EntityId>,
    pub diagnostics: DiagnosticLog,
    pub status: ImportStatus,
}

// ==========================================
// ReconciliationEngine
// ==========================================
pub struct ReconciliationEngine {
    pub(super) store: Arc<dyn CatalogStore>,
    pub(super) options: ReconciliationOptions,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self::with_options(store, ReconciliationOptions::default())
    }

    pub fn with_options(store: Arc<dyn CatalogStore>, options: ReconciliationOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &ReconciliationOptions {
        &self.options
    }

    /// 执行一次完整导入: 库存点 → 物料
    ///
    /// 库存点失败不阻断物料; 诊断中存在 error 级别时状态为 Partial。
    #[instrument(skip(self, request), fields(
        batch_id = tracing::field::Empty,
        reference = %request.site.reference,
        materials = request.materials.len(),
    ))]
    pub async fn import(&self, request: &ImportRequest) -> ImportReport {
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());

        let mut log = DiagnosticLog::new();
        let deposit_id = self.upsert_deposit(&request.site, &mut log).await;
        let product_ids = self
            .upsert_materials(&request.materials, request.update_quantities, &mut log)
            .await;

        let status = log.status();
        info!(
            deposit_id = ?deposit_id,
            products = product_ids.len(),
            diagnostics = log.len(),
            status = status.code(),
            "导入完成"
        );

        ImportReport {
            batch_id,
            deposit_id,
            product_ids,
            diagnostics: log,
            status,
        }
    }

    // ===== 元数据写入辅助 =====

    /// 写入元数据; 失败记为 error 诊断
    ///
    /// # 参数
    /// - report_unchanged: 值未变化时记录 info 诊断
    pub(super) async fn write_meta(
        &self,
        entity: EntityId,
        key: &str,
        value: &str,
        context: &str,
        report_unchanged: bool,
        log: &mut DiagnosticLog,
    ) {
        match self.store.set_meta(entity, key, value).await {
            Ok(MetaWrite::Written) => {}
            Ok(MetaWrite::Unchanged) => {
                if report_unchanged {
                    log.info(context, format!("字段 {} ({}) 未写入或未变化", key, value));
                } else {
                    debug!(entity, key, "元数据未变化");
                }
            }
            Err(e) => log.error(context, format!("字段 {} 写入失败: {}", key, e)),
        }
    }
}
