// ==========================================
// 物料盘点导入系统 - 概览页抽取器
// ==========================================
// 职责: 对概览页逐条应用字段规则,生成 SiteRecord
// 说明: 无坐标字段（城市/IRIS）跳过,由地理定位填充
// ==========================================

use crate::domain::diagnostic::DiagnosticLog;
use crate::domain::site::{SiteAddress, SiteRecord};
use crate::importer::cell_accessor::CellAccessor;
use crate::importer::field_rule::{FieldRule, FieldValue, RowScope};
use crate::importer::layout::overview_fields::*;
use tracing::debug;

pub struct OverviewExtractor {
    rules: Vec<FieldRule>,
}

impl OverviewExtractor {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    /// 抽取库存点记录
    pub fn extract(&self, accessor: &CellAccessor<'_>, log: &mut DiagnosticLog) -> SiteRecord {
        let scope = RowScope::default();
        let mut site = SiteRecord::default();

        for rule in &self.rules {
            let value = rule.evaluate(accessor, &scope, log);
            if value == FieldValue::Unmapped {
                continue;
            }
            assign(&mut site, rule.name, value);
        }

        debug!(
            sheet = %accessor.sheet_name(),
            reference = %site.reference,
            "概览页抽取完成"
        );
        site
    }
}

fn non_blank(value: FieldValue) -> Option<String> {
    let text = value.text();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn assign(site: &mut SiteRecord, name: &str, value: FieldValue) {
    match name {
        DEPOSIT_NAME => site.reference = value.text().trim().to_string(),
        BUILDING_NAME => site.building_name = value.text(),
        PROVIDER => site.provider_name = value.text(),
        ADDRESS => site.address = SiteAddress::Raw(value.text()),
        CITY => site.city = value.text(),
        IRIS => site.iris_code = non_blank(value),
        DISMANTLE_DATE => site.dismantle_date = non_blank(value),
        AVAILABILITY_DETAILS => site.availability_details = value.text(),
        CONTENT => site.description = value.text(),
        PLUS_DETAILS => site.extra_details = value.text(),
        THUMBNAIL => site.thumbnail = non_blank(value),
        PHOTOS => site.photos = value.into_texts(),
        SLUG => site.url_slug = non_blank(value),
        TEMPLATE_VERSION => site.template_version = value.text(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::layout::WorkbookLayout;
    use crate::importer::workbook::{CellValue, Sheet};

    fn overview_sheet() -> Sheet {
        let mut s = Sheet::new("IMPORT");
        s.set("D9", CellValue::text("DEP-1"));
        s.set("D10", CellValue::text("Halle Nord"));
        s.set("D11", CellValue::text("1 rue A, 69001 Lyon"));
        s.set("D12", CellValue::text("Bailleur"));
        s.set("D13", CellValue::text("01/03/2024"));
        s.set("D15", CellValue::text("Une halle"));
        s.set("D17", CellValue::text("DEP-1_thumb"));
        s.set("D18", CellValue::text("DEP-1_photo1"));
        s.set("D20", CellValue::text("-"));
        s.set("D22", CellValue::text("halle-nord"));
        s.set("D24", CellValue::Number(3.0));
        s
    }

    #[test]
    fn test_extract_overview() {
        let sheet = overview_sheet();
        let accessor = CellAccessor::new(&sheet);
        let extractor = OverviewExtractor::new(WorkbookLayout::default().overview_rules());
        let mut log = DiagnosticLog::new();

        let site = extractor.extract(&accessor, &mut log);

        assert_eq!(site.reference, "DEP-1");
        assert_eq!(site.building_name, "Halle Nord");
        assert_eq!(site.address.as_text(), "1 rue A, 69001 Lyon");
        assert_eq!(site.dismantle_date.as_deref(), Some("2024-03-01"));
        assert_eq!(site.thumbnail.as_deref(), Some("DEP-1_thumb"));
        assert_eq!(site.photos, vec!["DEP-1_photo1", "", "", ""]);
        assert_eq!(site.url_slug.as_deref(), Some("halle-nord"));
        assert_eq!(site.template_version, "3");
        assert_eq!(site.city, "");
        assert!(site.iris_code.is_none());
        assert!(log.is_empty(), "诊断应为空: {:?}", log.entries());
    }

    #[test]
    fn test_missing_slug_and_bad_date_warn() {
        let mut sheet = overview_sheet();
        sheet.set("D22", CellValue::Empty);
        sheet.set("D13", CellValue::text("bientôt"));
        let accessor = CellAccessor::new(&sheet);
        let extractor = OverviewExtractor::new(WorkbookLayout::default().overview_rules());
        let mut log = DiagnosticLog::new();

        let site = extractor.extract(&accessor, &mut log);

        assert!(site.url_slug.is_none());
        assert!(site.dismantle_date.is_none());
        assert_eq!(log.len(), 2);
        assert!(!log.has_blocking_error());
    }
}
