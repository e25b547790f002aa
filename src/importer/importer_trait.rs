// ==========================================
// 物料盘点导入系统 - 抽取器 Trait
// ==========================================
// 职责: 定义工作簿 → (库存点, 物料树, 诊断) 的抽取接口（不包含实现）
// 实现者: WorkbookImporter
// ==========================================

use crate::domain::diagnostic::DiagnosticLog;
use crate::domain::material::MaterialItem;
use crate::domain::request::ImportRequest;
use crate::domain::site::SiteRecord;
use crate::importer::error::ImportResult;
use crate::importer::workbook::Workbook;
use serde::Serialize;

// ==========================================
// SheetSelection - 工作表选择
// ==========================================
// 未指定时: 概览页取名称含模板关键字的表,物料页取概览页之后的一张
#[derive(Debug, Clone, Default)]
pub struct SheetSelection {
    pub overview: Option<String>,
    pub materials: Option<String>,
}

impl SheetSelection {
    pub fn new(overview: Option<String>, materials: Option<String>) -> Self {
        Self { overview, materials }
    }
}

// ==========================================
// ExtractionOutcome - 抽取结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutcome {
    pub extraction_id: String,
    pub overview_sheet: String,
    pub materials_sheet: String,
    pub site: SiteRecord,
    pub materials: Vec<MaterialItem>,
    pub diagnostics: DiagnosticLog,
}

impl ExtractionOutcome {
    /// 转为导入请求
    pub fn to_request(&self, update_quantities: bool) -> ImportRequest {
        ImportRequest {
            site: self.site.clone(),
            materials: self.materials.clone(),
            update_quantities,
        }
    }
}

// ==========================================
// DepositExtractor Trait
// ==========================================
pub trait DepositExtractor: Send + Sync {
    /// 从内存工作簿抽取
    ///
    /// # 返回
    /// - Ok(ExtractionOutcome): 抽取完成（校验问题在 diagnostics 中）
    /// - Err(ReferenceMismatch | DuplicateReferences): 一致性检查失败,抽取中止
    /// - Err(SheetNotFound): 工作表不存在
    fn extract(&self, workbook: &Workbook, selection: &SheetSelection) -> ImportResult<ExtractionOutcome>;
}
