// ==========================================
// 物料盘点导入系统 - 工作簿抽取流程
// ==========================================
// 职责: 整合抽取流程,从工作簿到导入请求
// 流程: 选表 → 引用一致性检查 → 概览页抽取 → 物料页抽取 → 重复引用检查
// 红线: 只有两类一致性错误中止抽取,其余校验问题全部降级为诊断
// ==========================================

use crate::domain::diagnostic::DiagnosticLog;
use crate::importer::cell_accessor::CellAccessor;
use crate::domain::material::flatten_tree_references;
use crate::importer::consistency_checker::{
    check_no_duplicate_references, check_references_match, duplicate_values,
};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::{DepositExtractor, ExtractionOutcome, SheetSelection};
use crate::importer::layout::WorkbookLayout;
use crate::importer::materials_extractor::MaterialsExtractor;
use crate::importer::overview_extractor::OverviewExtractor;
use crate::importer::workbook::{CellAddress, Workbook};
use std::path::Path;
use tracing::{info, instrument, warn};
use uuid::Uuid;

// ==========================================
// WorkbookImporter - 工作簿抽取器
// ==========================================
pub struct WorkbookImporter {
    layout: WorkbookLayout,
    overview: OverviewExtractor,
    materials: MaterialsExtractor,
}

impl Default for WorkbookImporter {
    fn default() -> Self {
        Self::new(WorkbookLayout::default())
    }
}

impl WorkbookImporter {
    pub fn new(layout: WorkbookLayout) -> Self {
        Self {
            overview: OverviewExtractor::new(layout.overview_rules()),
            materials: MaterialsExtractor::new(layout.clone()),
            layout,
        }
    }

    pub fn layout(&self) -> &WorkbookLayout {
        &self.layout
    }

    /// 从文件抽取（多个文件时合并为一个工作簿）
    pub fn extract_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
        selection: &SheetSelection,
    ) -> ImportResult<ExtractionOutcome> {
        let workbook = Workbook::open_many(paths)?;
        self.extract(&workbook, selection)
    }

    /// 解析工作表选择
    ///
    /// # 返回
    /// - (概览页名, 物料页名)
    pub fn resolve_sheets(
        &self,
        workbook: &Workbook,
        selection: &SheetSelection,
    ) -> ImportResult<(String, String)> {
        let names = workbook.sheet_names();

        let overview = match &selection.overview {
            Some(name) => workbook
                .sheet(name)
                .map(|s| s.name.clone())
                .ok_or_else(|| ImportError::SheetNotFound(name.clone()))?,
            None => names
                .iter()
                .find(|n| n.contains(self.layout.overview_sheet_hint.as_str()))
                .or_else(|| names.first())
                .map(|n| n.to_string())
                .ok_or_else(|| ImportError::SheetNotFound("概览页".to_string()))?,
        };

        let materials = match &selection.materials {
            Some(name) => workbook
                .sheet(name)
                .map(|s| s.name.clone())
                .ok_or_else(|| ImportError::SheetNotFound(name.clone()))?,
            None => workbook
                .position(&overview)
                .and_then(|idx| workbook.sheet_at(idx + 1))
                .map(|s| s.name.clone())
                .ok_or_else(|| ImportError::SheetNotFound("物料页".to_string()))?,
        };

        Ok((overview, materials))
    }
}

impl DepositExtractor for WorkbookImporter {
    #[instrument(skip(self, workbook, selection), fields(extraction_id))]
    fn extract(&self, workbook: &Workbook, selection: &SheetSelection) -> ImportResult<ExtractionOutcome> {
        let extraction_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("extraction_id", extraction_id.as_str());

        let (overview_name, materials_name) = self.resolve_sheets(workbook, selection)?;
        info!(overview = %overview_name, materials = %materials_name, "开始抽取工作簿");

        let overview_sheet = workbook
            .sheet(&overview_name)
            .ok_or_else(|| ImportError::SheetNotFound(overview_name.clone()))?;
        let materials_sheet = workbook
            .sheet(&materials_name)
            .ok_or_else(|| ImportError::SheetNotFound(materials_name.clone()))?;

        let overview_accessor = CellAccessor::with_workbook(overview_sheet, workbook);
        let materials_accessor = CellAccessor::with_workbook(materials_sheet, workbook);

        let mut log = DiagnosticLog::new();

        // === 步骤 1: 库存点引用一致性 ===
        let overview_reference = read_cell(&overview_accessor, &self.layout.overview_reference_cell);
        let materials_reference = read_cell(&materials_accessor, &self.layout.materials_reference_cell);
        if !check_references_match(&overview_reference, &materials_reference, &mut log) {
            warn!(
                overview = %overview_reference,
                materials = %materials_reference,
                "库存点引用不一致,中止抽取"
            );
            return Err(ImportError::ReferenceMismatch {
                overview: overview_reference,
                materials: materials_reference,
                diagnostics: log.into_entries(),
            });
        }

        // === 步骤 2: 概览页 ===
        let site = self.overview.extract(&overview_accessor, &mut log);

        // === 步骤 3: 物料页 ===
        let materials = self
            .materials
            .extract(&materials_accessor, &materials_reference, &mut log);

        // === 步骤 4: 重复引用 ===
        let duplicates = check_no_duplicate_references(&materials);
        if !duplicates.is_empty() {
            let values = duplicate_values(flatten_tree_references(&materials));
            warn!(duplicates = ?values, "物料引用重复,中止抽取");
            log.extend(duplicates);
            return Err(ImportError::DuplicateReferences {
                duplicates: values,
                diagnostics: log.into_entries(),
            });
        }

        info!(
            reference = %site.reference,
            items = materials.len(),
            diagnostics = log.len(),
            "工作簿抽取完成"
        );

        Ok(ExtractionOutcome {
            extraction_id,
            overview_sheet: overview_name,
            materials_sheet: materials_name,
            site,
            materials,
            diagnostics: log,
        })
    }
}

fn read_cell(accessor: &CellAccessor<'_>, address: &str) -> String {
    CellAddress::parse(address)
        .map(|a| accessor.resolve_at(a.row, a.col).as_text().trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::workbook::{CellValue, Sheet};

    fn workbook(materials_ref: &str, rows: &[(&str, &str)]) -> Workbook {
        workbook_with_refs("DEP-1", materials_ref, rows)
    }

    fn workbook_with_refs(overview_ref: &str, materials_ref: &str, rows: &[(&str, &str)]) -> Workbook {
        let mut cover = Sheet::new("Notice");
        cover.set("A1", CellValue::text("Lisez-moi"));

        let mut overview = Sheet::new("IMPORT Gisement");
        overview.set("D9", CellValue::text(overview_ref));
        overview.set("D10", CellValue::text("Halle"));
        overview.set("D22", CellValue::text("halle"));

        let mut materials = Sheet::new("Matériaux");
        materials.set("K8", CellValue::text(materials_ref));
        for (i, (radical, fragment)) in rows.iter().enumerate() {
            let row = 15 + i as u32;
            materials.set(&format!("B{}", row), CellValue::text("1"));
            materials.set(&format!("H{}", row), CellValue::text(*radical));
            materials.set(&format!("I{}", row), CellValue::text(*fragment));
            materials.set(&format!("J{}", row), CellValue::text("Fam"));
            materials.set(&format!("K{}", row), CellValue::text("Cat"));
            materials.set(&format!("L{}", row), CellValue::text("Des"));
            materials.set(&format!("S{}", row), CellValue::Number(1.0));
            materials.set(&format!("AD{}", row), CellValue::text("picture_ref"));
        }

        Workbook::new(vec![cover, overview, materials])
    }

    #[test]
    fn test_sheet_selection_defaults() {
        let wb = workbook("DEP-1", &[]);
        let importer = WorkbookImporter::default();
        let (o, m) = importer.resolve_sheets(&wb, &SheetSelection::default()).unwrap();
        assert_eq!(o, "IMPORT Gisement");
        assert_eq!(m, "Matériaux");

        let err = importer
            .resolve_sheets(&wb, &SheetSelection::new(None, Some("Absent".into())))
            .unwrap_err();
        assert!(matches!(err, ImportError::SheetNotFound(_)));
    }

    #[test]
    fn test_extract_success() {
        let wb = workbook("DEP-1", &[("DEP-1", "A1"), ("DEP-1", "B1"), ("DEP-1", "B1.001")]);
        let outcome = WorkbookImporter::default()
            .extract(&wb, &SheetSelection::default())
            .unwrap();

        assert_eq!(outcome.site.reference, "DEP-1");
        assert_eq!(outcome.materials.len(), 2);
        assert_eq!(outcome.materials[1].variations.len(), 1);

        let request = outcome.to_request(true);
        assert!(request.update_quantities);
        assert_eq!(request.materials.len(), 2);
    }

    #[test]
    fn test_reference_mismatch_aborts_before_extraction() {
        let wb = workbook("DEP-2", &[("DEP-2", "A1")]);
        let err = WorkbookImporter::default()
            .extract(&wb, &SheetSelection::default())
            .unwrap_err();

        match err {
            ImportError::ReferenceMismatch { overview, materials, diagnostics } => {
                assert_eq!(overview, "DEP-1");
                assert_eq!(materials, "DEP-2");
                // 只有一致性诊断,说明物料页未被抽取
                assert_eq!(diagnostics.len(), 1);
            }
            other => panic!("期望 ReferenceMismatch, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_references_abort() {
        let wb = workbook("DEP-1", &[("DEP-1", "A1"), ("DEP-1", "A1")]);
        let err = WorkbookImporter::default()
            .extract(&wb, &SheetSelection::default())
            .unwrap_err();

        assert!(matches!(err, ImportError::DuplicateReferences { .. }));
        assert!(!err.diagnostics().is_empty());
    }

    #[test]
    fn test_blank_deposit_reference_aborts() {
        let wb = workbook_with_refs("", "", &[("", "A1")]);
        let err = WorkbookImporter::default()
            .extract(&wb, &SheetSelection::default())
            .unwrap_err();

        match err {
            ImportError::ReferenceMismatch { overview, materials, diagnostics } => {
                assert!(overview.is_empty());
                assert!(materials.is_empty());
                assert_eq!(diagnostics.len(), 1);
            }
            other => panic!("期望 ReferenceMismatch, 实际 {:?}", other),
        }
    }
}
