// ==========================================
// 物料盘点导入系统 - 物料页抽取器
// ==========================================
// 职责: 逐行扫描物料页,按引用号后缀把变体行归入父项,生成物料树
// 状态机:
// - 空闲 (current = None) / 父项打开 (current = Some)
// - 非变体行: 提交当前父项,打开新父项
// - 变体行: 追加到当前父项;无父项时记 error 并丢弃
// - 扫描结束: 提交仍打开的父项
// 过滤: 未勾选导出的行跳过;库存点引用不一致的行告警后跳过
// ==========================================

use crate::domain::diagnostic::DiagnosticLog;
use crate::domain::material::{CodeAttributes, Dimensions, MaterialItem};
use crate::importer::cell_accessor::CellAccessor;
use crate::importer::field_rule::{FieldRule, FieldValue, RowScope};
use crate::importer::layout::material_fields::*;
use crate::importer::layout::WorkbookLayout;
use crate::domain::types::Scalar;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};

fn variation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.[0-9]{3}$").expect("变体后缀正则合法"))
}

/// 物料片段是否带变体后缀（如 "B1.002"）
pub fn is_variation_reference(fragment: &str) -> bool {
    variation_regex().is_match(fragment.trim())
}

/// 导出标记是否为真（true / "true" / 1 / "1"）
pub fn is_include_flag(value: &Scalar) -> bool {
    match value {
        Scalar::Bool(b) => *b,
        Scalar::Int(i) => *i == 1,
        Scalar::Float(f) => *f == 1.0,
        Scalar::Text(s) => matches!(s.trim(), "true" | "1"),
        Scalar::Null => false,
    }
}

// ==========================================
// 行分组状态机
// ==========================================
#[derive(Debug, Default)]
struct RowGrouping {
    current: Option<MaterialItem>,
    items: Vec<MaterialItem>,
}

impl RowGrouping {
    /// 提交当前父项（引用号为空时丢弃）
    fn flush(&mut self) {
        if let Some(item) = self.current.take() {
            if !item.reference.is_empty() {
                self.items.push(item);
            }
        }
    }

    fn open_parent(&mut self, item: MaterialItem) {
        self.flush();
        self.current = Some(item);
    }

    /// 追加变体;无父项时原样退回
    fn push_variation(&mut self, variation: MaterialItem) -> Result<(), MaterialItem> {
        match self.current.as_mut() {
            Some(parent) => {
                parent.variations.push(variation);
                Ok(())
            }
            None => Err(variation),
        }
    }

    fn finish(mut self) -> Vec<MaterialItem> {
        self.flush();
        self.items
    }
}

// ==========================================
// MaterialsExtractor
// ==========================================
pub struct MaterialsExtractor {
    rules: Vec<FieldRule>,
    layout: WorkbookLayout,
}

impl MaterialsExtractor {
    pub fn new(layout: WorkbookLayout) -> Self {
        Self {
            rules: layout.material_rules(),
            layout,
        }
    }

    /// 抽取物料树
    ///
    /// # 参数
    /// - accessor: 物料页访问器
    /// - deposit_reference: 物料页库存点引用（K8）
    /// - log: 诊断累加器
    pub fn extract(
        &self,
        accessor: &CellAccessor<'_>,
        deposit_reference: &str,
        log: &mut DiagnosticLog,
    ) -> Vec<MaterialItem> {
        let (Some(include_col), Some(radical_col), Some(material_col)) = (
            self.layout.include_col(),
            self.layout.radical_col(),
            self.layout.material_col(),
        ) else {
            log.fatal("物料页布局", "模板列配置无效");
            return Vec::new();
        };

        let mut grouping = RowGrouping::default();
        let mut skipped = 0usize;

        for row in (self.layout.header_row_offset + 1)..=accessor.last_row() {
            if !is_include_flag(&accessor.resolve_at(row, include_col)) {
                skipped += 1;
                continue;
            }

            let radical = accessor.resolve_at(row, radical_col).as_text();
            let fragment = accessor.resolve_at(row, material_col).as_text();

            if radical.trim() != deposit_reference.trim() {
                log.warning(
                    "库存点引用校验",
                    format!(
                        "第 {} 行属于库存点 {},与物料页库存点 {} 不一致,已跳过",
                        row, radical, deposit_reference
                    ),
                );
                continue;
            }

            let variation = is_variation_reference(&fragment);
            let scope = RowScope {
                row: Some(row),
                reference: format!("{}{}", radical, fragment),
                variation,
                header_row: Some(self.layout.header_row),
                primary_picture_column: self.layout.primary_picture_col(),
            };

            let mut item = self.extract_row(accessor, &scope, log);
            item.deposit_reference = deposit_reference.to_string();

            if variation {
                if let Err(orphan) = grouping.push_variation(item) {
                    log.error(
                        "变体归组",
                        format!(
                            "第 {} 行变体 {} 前没有父项,已丢弃",
                            row, orphan.reference
                        ),
                    );
                }
            } else {
                grouping.open_parent(item);
            }
        }

        let items = grouping.finish();
        info!(
            sheet = %accessor.sheet_name(),
            items = items.len(),
            variations = items.iter().map(|i| i.variations.len()).sum::<usize>(),
            skipped_rows = skipped,
            "物料页抽取完成"
        );
        items
    }

    fn extract_row(
        &self,
        accessor: &CellAccessor<'_>,
        scope: &RowScope,
        log: &mut DiagnosticLog,
    ) -> MaterialItem {
        let mut item = MaterialItem::default();
        let mut dimensions = Dimensions::default();
        let mut codes = CodeAttributes::default();

        for rule in &self.rules {
            let value = rule.evaluate(accessor, scope, log);
            match rule.name {
                CODE => codes.code = value.text(),
                MACRO => codes.macro_category = value.text(),
                CAT => codes.category = value.text(),
                PEM => codes.pem = value.text(),
                REF => item.reference = value.text().trim().to_string(),
                FAMILY => item.family = value.text(),
                CATEGORY => item.category = value.text(),
                DESIGNATION => item.designation = value.text(),
                TYPE => item.material_type = value.text(),
                LENGTH => dimensions.length = value.text(),
                WIDTH => dimensions.width = value.text(),
                HEIGHT => dimensions.height = value.text(),
                SURFACE => item.surface = value.text(),
                QTY => item.quantity = value.into_scalar(),
                UNIT => item.unit = value.text(),
                CONDITION => item.condition = value.text(),
                DESCRIPTION => item.description = value.text(),
                REMARKS => item.remarks = value.text(),
                PICTURE_GLOBAL => {
                    item.picture_global = match value {
                        FieldValue::Scalar(s) if !s.is_blank() => Some(s.as_text()),
                        _ => None,
                    }
                }
                PICTURE_DETAILS => item.picture_details = value.into_texts(),
                _ => {}
            }
        }

        item.dimensions = dimensions;
        item.codes = codes;
        debug!(row = ?scope.row, reference = %item.reference, variation = scope.variation, "行抽取完成");
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::DiagnosticLevel;
    use crate::importer::workbook::{CellValue, Sheet};

    fn put_row(sheet: &mut Sheet, row: u32, include: bool, radical: &str, fragment: &str, qty: f64) {
        sheet.set(&format!("B{}", row), CellValue::Bool(include));
        sheet.set(&format!("H{}", row), CellValue::text(radical));
        sheet.set(&format!("I{}", row), CellValue::text(fragment));
        sheet.set(&format!("J{}", row), CellValue::text("Menuiserie"));
        sheet.set(&format!("K{}", row), CellValue::text("Porte"));
        sheet.set(&format!("L{}", row), CellValue::text(format!("Item {}", fragment)));
        sheet.set(&format!("S{}", row), CellValue::Number(qty));
        sheet.set(&format!("AD{}", row), CellValue::text(format!("{}{}_glob", radical, fragment)));
    }

    fn extract(sheet: &Sheet) -> (Vec<MaterialItem>, DiagnosticLog) {
        let accessor = CellAccessor::new(sheet);
        let extractor = MaterialsExtractor::new(WorkbookLayout::default());
        let mut log = DiagnosticLog::new();
        let items = extractor.extract(&accessor, "DEP-1", &mut log);
        (items, log)
    }

    #[test]
    fn test_variation_pattern() {
        assert!(is_variation_reference("B1.002"));
        assert!(is_variation_reference("ABC.002"));
        assert!(!is_variation_reference("B1.02"));
        assert!(!is_variation_reference("B1.0021"));
        assert!(!is_variation_reference("B1"));
    }

    #[test]
    fn test_include_flag_forms() {
        assert!(is_include_flag(&Scalar::Bool(true)));
        assert!(is_include_flag(&Scalar::Text("true".into())));
        assert!(is_include_flag(&Scalar::Text("1".into())));
        assert!(is_include_flag(&Scalar::Float(1.0)));
        assert!(!is_include_flag(&Scalar::Text("false".into())));
        assert!(!is_include_flag(&Scalar::Null));
    }

    #[test]
    fn test_groups_variations_under_parent() {
        let mut sheet = Sheet::new("MATERIAUX");
        put_row(&mut sheet, 15, true, "DEP-1", "A1", 5.0);
        put_row(&mut sheet, 16, true, "DEP-1", "B1", 2.0);
        put_row(&mut sheet, 17, true, "DEP-1", "B1.001", 1.0);
        put_row(&mut sheet, 18, true, "DEP-1", "B1.002", 1.0);

        let (items, log) = extract(&sheet);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].reference, "DEP-1A1");
        assert!(items[0].variations.is_empty());
        assert_eq!(items[1].reference, "DEP-1B1");
        let refs: Vec<&str> = items[1].variations.iter().map(|v| v.reference.as_str()).collect();
        assert_eq!(refs, vec!["DEP-1B1.001", "DEP-1B1.002"]);
        assert_eq!(items[0].deposit_reference, "DEP-1");
        assert_eq!(items[0].picture_global.as_deref(), Some("DEP-1A1_glob"));
        assert!(!log.has_blocking_error());
    }

    #[test]
    fn test_excluded_rows_never_appear() {
        let mut sheet = Sheet::new("MATERIAUX");
        put_row(&mut sheet, 15, true, "DEP-1", "A1", 5.0);
        put_row(&mut sheet, 16, false, "DEP-1", "SECRET", 1.0);
        put_row(&mut sheet, 17, false, "DEP-1", "A1.001", 1.0);

        let (items, _) = extract(&sheet);

        assert_eq!(items.len(), 1);
        assert!(items[0].variations.is_empty());
        assert!(!format!("{:?}", items).contains("SECRET"));
    }

    #[test]
    fn test_orphan_variation_is_error() {
        let mut sheet = Sheet::new("MATERIAUX");
        put_row(&mut sheet, 15, true, "DEP-1", "C1.001", 1.0);
        put_row(&mut sheet, 16, true, "DEP-1", "C2", 1.0);

        let (items, log) = extract(&sheet);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].reference, "DEP-1C2");
        assert_eq!(log.count(DiagnosticLevel::Error), 1);
    }

    #[test]
    fn test_cross_deposit_rows_filtered_with_warning() {
        let mut sheet = Sheet::new("MATERIAUX");
        put_row(&mut sheet, 15, true, "DEP-1", "A1", 5.0);
        put_row(&mut sheet, 16, true, "DEP-2", "Z9", 1.0);

        let (items, log) = extract(&sheet);

        assert_eq!(items.len(), 1);
        assert_eq!(log.count(DiagnosticLevel::Warning), 1);
    }

    #[test]
    fn test_invalid_quantity_defaults_to_one() {
        let mut sheet = Sheet::new("MATERIAUX");
        put_row(&mut sheet, 15, true, "DEP-1", "A1", 0.0);

        let (items, log) = extract(&sheet);

        assert_eq!(items[0].quantity, Scalar::Int(1));
        assert_eq!(items[0].unit, "u");
        assert_eq!(log.count(DiagnosticLevel::Warning), 1);
    }

    #[test]
    fn test_header_rows_ignored() {
        let mut sheet = Sheet::new("MATERIAUX");
        // 第 14 行及以上属于表头区域
        put_row(&mut sheet, 14, true, "DEP-1", "HEAD", 1.0);
        put_row(&mut sheet, 15, true, "DEP-1", "A1", 1.0);

        let (items, _) = extract(&sheet);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].reference, "DEP-1A1");
    }
}
