// ==========================================
// 物料盘点导入系统 - 单元格访问器
// ==========================================
// 职责: 读取单元格原始值、分类、解析为平面标量
// 规则:
// - 公式: 公式文本为单一坐标时跳转一次读取被引用单元格,否则取缓存结果（无则 0）
// - 超链接: 取显示文本（富文本片段拼接）
// - 富文本: 片段拼接
// - 错误: 返回错误标记
// 红线: 无副作用,不支持循环公式（只跳一次）
// ==========================================

use crate::domain::types::{CellType, Scalar};
use crate::importer::workbook::{CellAddress, CellValue, Sheet, Workbook};
use regex::Regex;
use std::sync::OnceLock;

fn linked_cell_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9_]+!)?[A-Z]+[1-9]\d*$").expect("坐标正则合法"))
}

/// 单元格分类
pub fn classify(value: &CellValue) -> CellType {
    match value {
        CellValue::Empty => CellType::Null,
        CellValue::Number(_) | CellValue::Date(_) => CellType::Number,
        CellValue::Bool(_) => CellType::Boolean,
        CellValue::Text(_) => CellType::String,
        CellValue::Formula { .. } => CellType::Formula,
        CellValue::Hyperlink { .. } => CellType::Hyperlink,
        CellValue::RichText(_) => CellType::RichText,
        CellValue::Error(_) => CellType::Error,
    }
}

// ==========================================
// CellAccessor - 单工作表访问器
// ==========================================
// 持有所在工作簿的引用,以便解析跨表的公式链接
pub struct CellAccessor<'a> {
    sheet: &'a Sheet,
    workbook: Option<&'a Workbook>,
}

impl<'a> CellAccessor<'a> {
    pub fn new(sheet: &'a Sheet) -> Self {
        Self {
            sheet,
            workbook: None,
        }
    }

    pub fn with_workbook(sheet: &'a Sheet, workbook: &'a Workbook) -> Self {
        Self {
            sheet,
            workbook: Some(workbook),
        }
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet.name
    }

    pub fn last_row(&self) -> u32 {
        self.sheet.last_row()
    }

    /// 原始单元格值
    pub fn raw(&self, row: u32, col: u32) -> &'a CellValue {
        self.sheet.get(row, col)
    }

    /// 按坐标读取并解析
    pub fn resolve_at(&self, row: u32, col: u32) -> Scalar {
        self.resolve(self.raw(row, col))
    }

    /// 解析为平面标量
    pub fn resolve(&self, value: &CellValue) -> Scalar {
        match value {
            CellValue::Formula { formula, result } => {
                if linked_cell_regex().is_match(formula) {
                    if let Some(linked) = self.linked_cell(formula) {
                        // 被引用单元格若仍是公式,只取其缓存结果
                        return match linked {
                            CellValue::Formula { result, .. } => cached_or_zero(result.as_deref()),
                            other => scalar_of(other),
                        };
                    }
                }
                cached_or_zero(result.as_deref())
            }
            other => scalar_of(other),
        }
    }

    /// 显示文本（公式取缓存结果,不做链接跳转）
    pub fn text_at(&self, row: u32, col: u32) -> String {
        match self.raw(row, col) {
            CellValue::Formula { result, .. } => result
                .as_deref()
                .map(|v| scalar_of(v).as_text())
                .unwrap_or_default(),
            other => scalar_of(other).as_text(),
        }
    }

    fn linked_cell(&self, formula: &str) -> Option<&'a CellValue> {
        let address = CellAddress::parse(formula)?;
        let sheet = match (&address.sheet, self.workbook) {
            (None, _) => self.sheet,
            (Some(name), Some(workbook)) => workbook.sheet(name)?,
            (Some(_), None) => return None,
        };
        Some(sheet.get(address.row, address.col))
    }
}

/// 非公式单元格的标量值
fn scalar_of(value: &CellValue) -> Scalar {
    match value {
        CellValue::Empty => Scalar::Null,
        CellValue::Number(n) => Scalar::Float(*n),
        CellValue::Bool(b) => Scalar::Bool(*b),
        CellValue::Text(s) => Scalar::Text(s.clone()),
        CellValue::Date(dt) => Scalar::Text(dt.format("%Y-%m-%d").to_string()),
        CellValue::Hyperlink { text, rich_text, .. } => {
            if rich_text.is_empty() {
                Scalar::Text(text.clone())
            } else {
                Scalar::Text(rich_text.concat())
            }
        }
        CellValue::RichText(runs) => Scalar::Text(runs.concat()),
        CellValue::Error(token) => Scalar::Text(token.clone()),
        CellValue::Formula { result, .. } => cached_or_zero(result.as_deref()),
    }
}

fn cached_or_zero(result: Option<&CellValue>) -> Scalar {
    match result.map(scalar_of) {
        Some(value) if value.is_truthy() => value,
        _ => Scalar::Int(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sheet() -> Sheet {
        let mut sheet = Sheet::new("IMPORT");
        sheet.set("A1", CellValue::Number(42.0));
        sheet.set("A2", CellValue::formula("A1", Some(CellValue::Number(1.0))));
        sheet.set("A3", CellValue::formula("SUM(A1:A2)", Some(CellValue::Number(43.0))));
        sheet.set("A4", CellValue::formula("SUM(B1:B2)", None));
        sheet.set("A5", CellValue::formula("A2", None));
        sheet.set(
            "A6",
            CellValue::Hyperlink {
                text: "lien".to_string(),
                rich_text: vec!["Porte ".to_string(), "bois".to_string()],
                target: "https://example.org".to_string(),
            },
        );
        sheet.set("A7", CellValue::RichText(vec!["a".into(), "b".into()]));
        sheet.set("A8", CellValue::Error("#DIV/0!".to_string()));
        sheet
    }

    #[test]
    fn test_classify() {
        let sheet = sample_sheet();
        assert_eq!(classify(sheet.get(1, 1)), CellType::Number);
        assert_eq!(classify(sheet.get(2, 1)), CellType::Formula);
        assert_eq!(classify(sheet.get(6, 1)), CellType::Hyperlink);
        assert_eq!(classify(sheet.get(7, 1)), CellType::RichText);
        assert_eq!(classify(sheet.get(8, 1)), CellType::Error);
        assert_eq!(classify(sheet.get(99, 1)), CellType::Null);
    }

    #[test]
    fn test_formula_link_one_hop() {
        let sheet = sample_sheet();
        let accessor = CellAccessor::new(&sheet);
        // A2 = A1 → 读取 A1 的值而非缓存结果
        assert_eq!(accessor.resolve_at(2, 1), Scalar::Float(42.0));
        // A5 = A2 → A2 仍是公式,只取其缓存结果,不再跳转
        assert_eq!(accessor.resolve_at(5, 1), Scalar::Float(1.0));
    }

    #[test]
    fn test_formula_cached_result_or_zero() {
        let sheet = sample_sheet();
        let accessor = CellAccessor::new(&sheet);
        assert_eq!(accessor.resolve_at(3, 1), Scalar::Float(43.0));
        assert_eq!(accessor.resolve_at(4, 1), Scalar::Int(0));
    }

    #[test]
    fn test_cross_sheet_link() {
        let mut other = Sheet::new("Feuil2");
        other.set("B2", CellValue::text("DEP-9"));
        let mut main = Sheet::new("Feuil1");
        main.set("K8", CellValue::formula("Feuil2!B2", None));
        let wb = Workbook::new(vec![main, other]);

        let sheet = wb.sheet("Feuil1").unwrap();
        let accessor = CellAccessor::with_workbook(sheet, &wb);
        assert_eq!(accessor.resolve_at(8, 11), Scalar::Text("DEP-9".to_string()));
    }

    #[test]
    fn test_hyperlink_rich_text_and_error() {
        let sheet = sample_sheet();
        let accessor = CellAccessor::new(&sheet);
        assert_eq!(accessor.resolve_at(6, 1).as_text(), "Porte bois");
        assert_eq!(accessor.resolve_at(7, 1).as_text(), "ab");
        assert_eq!(accessor.resolve_at(8, 1).as_text(), "#DIV/0!");
    }

    #[test]
    fn test_text_at_number() {
        let sheet = sample_sheet();
        let accessor = CellAccessor::new(&sheet);
        assert_eq!(accessor.text_at(1, 1), "42");
        assert_eq!(accessor.text_at(2, 1), "1");
        assert_eq!(accessor.text_at(50, 50), "");
    }
}
