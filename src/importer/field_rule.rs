// ==========================================
// 物料盘点导入系统 - 字段规则与求值
// ==========================================
// 职责: 声明式字段规则 {定位, 校验, 转换, 默认值} 及统一解释器
// 求值顺序:
// 1. 有校验器且校验失败 → 默认值（无则空串）,诊断由校验器追加
// 2. 有转换器 → 转换结果
// 3. 否则 → 单元格解析值
// 红线: 求值永不失败,所有问题通过诊断表达
// ==========================================

use crate::domain::diagnostic::DiagnosticLog;
use crate::domain::types::Scalar;
use crate::importer::cell_accessor::CellAccessor;
use crate::importer::workbook::{column_index, column_letters, CellAddress, CellValue};

/// 校验器: 返回 false 表示无效,可顺带追加诊断
pub type Validator = fn(&CellContext<'_>, &mut DiagnosticLog) -> bool;

/// 转换器: 第二个参数为规则默认值
pub type Transformer = fn(&CellContext<'_>, Option<&Scalar>) -> Scalar;

// ==========================================
// Coordinate - 坐标（绝对单元格或行内列）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coordinate {
    Cell { row: u32, col: u32 },
    Column(u32),
}

impl Coordinate {
    /// 绝对坐标（如 "D9"）,格式错误时返回 None
    pub fn cell(address: &str) -> Option<Self> {
        CellAddress::parse(address).map(|a| Coordinate::Cell {
            row: a.row,
            col: a.col,
        })
    }

    /// 列坐标（如 "AD"）
    pub fn column(letters: &str) -> Option<Self> {
        column_index(letters).map(Coordinate::Column)
    }

    fn locate(&self, row: Option<u32>) -> Option<(u32, u32)> {
        match (self, row) {
            (Coordinate::Cell { row, col }, _) => Some((*row, *col)),
            (Coordinate::Column(col), Some(row)) => Some((row, *col)),
            (Coordinate::Column(_), None) => None,
        }
    }
}

// ==========================================
// Locator - 定位方式
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// 无坐标（留给后续地理定位填充）
    Unmapped,
    Single(Coordinate),
    /// 成对坐标: 各单元格文本拼接（引用号拆成两列）
    Paired(Vec<Coordinate>),
    /// 平铺坐标: 有序列表;keep_blanks=false 时丢弃空项
    List {
        slots: Vec<Coordinate>,
        keep_blanks: bool,
    },
}

// ==========================================
// FieldValue - 求值结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Unmapped,
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl FieldValue {
    pub fn into_scalar(self) -> Scalar {
        match self {
            FieldValue::Scalar(s) => s,
            FieldValue::List(mut items) if !items.is_empty() => items.swap_remove(0),
            _ => Scalar::Null,
        }
    }

    pub fn text(self) -> String {
        self.into_scalar().as_text()
    }

    /// 列表文本（单值包装为单元素列表）
    pub fn into_texts(self) -> Vec<String> {
        match self {
            FieldValue::Unmapped => Vec::new(),
            FieldValue::Scalar(s) => vec![s.as_text()],
            FieldValue::List(items) => items.iter().map(Scalar::as_text).collect(),
        }
    }
}

// ==========================================
// RowScope - 求值作用域
// ==========================================
// 概览页: row = None;物料页: row = 当前数据行
#[derive(Debug, Clone, Default)]
pub struct RowScope {
    pub row: Option<u32>,
    pub reference: String,              // 当前行引用号（诊断用）
    pub variation: bool,                // 是否为变体行
    pub header_row: Option<u32>,        // 列标题所在行
    pub primary_picture_column: Option<u32>, // 主图列（父项必填）
}

// ==========================================
// CellContext - 校验器/转换器看到的单元格
// ==========================================
pub struct CellContext<'a> {
    pub accessor: &'a CellAccessor<'a>,
    pub row: u32,
    pub col: u32,
    pub scope: &'a RowScope,
    pub label: &'a str, // 规则名称（无列标题时使用）
}

impl<'a> CellContext<'a> {
    pub fn raw(&self) -> &'a CellValue {
        self.accessor.raw(self.row, self.col)
    }

    pub fn resolved(&self) -> Scalar {
        self.accessor.resolve_at(self.row, self.col)
    }

    /// 单元格坐标文本（如 "S15"）
    pub fn address(&self) -> String {
        format!("{}{}", column_letters(self.col), self.row)
    }

    /// 列标题（取标题行同列文本,缺省为规则名称）
    pub fn column_label(&self) -> String {
        self.scope
            .header_row
            .map(|h| self.accessor.text_at(h, self.col))
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.label.to_string())
    }

    /// 图片槽位是否可选（仅父项的主图列必填）
    pub fn is_optional_picture(&self) -> bool {
        self.scope.variation || self.scope.primary_picture_column != Some(self.col)
    }
}

// ==========================================
// FieldRule - 字段规则
// ==========================================
#[derive(Clone)]
pub struct FieldRule {
    pub name: &'static str,
    pub label: &'static str,
    pub locator: Locator,
    pub validator: Option<Validator>,
    pub transformer: Option<Transformer>,
    pub default: Option<Scalar>,
}

impl std::fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRule")
            .field("name", &self.name)
            .field("locator", &self.locator)
            .field("validator", &self.validator.is_some())
            .field("transformer", &self.transformer.is_some())
            .field("default", &self.default)
            .finish()
    }
}

impl FieldRule {
    pub fn new(name: &'static str, label: &'static str, locator: Locator) -> Self {
        Self {
            name,
            label,
            locator,
            validator: None,
            transformer: None,
            default: None,
        }
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn transform(mut self, transformer: Transformer) -> Self {
        self.transformer = Some(transformer);
        self
    }

    pub fn default_value(mut self, value: impl Into<Scalar>) -> Self {
        self.default = Some(value.into());
        self
    }

    fn fallback(&self) -> Scalar {
        self.default
            .clone()
            .unwrap_or_else(|| Scalar::Text(String::new()))
    }

    /// 对规则求值
    pub fn evaluate(
        &self,
        accessor: &CellAccessor<'_>,
        scope: &RowScope,
        log: &mut DiagnosticLog,
    ) -> FieldValue {
        match &self.locator {
            Locator::Unmapped => FieldValue::Unmapped,
            Locator::Single(coord) => match self.evaluate_slot(coord, accessor, scope, log) {
                Some(value) => FieldValue::Scalar(value),
                None => FieldValue::Scalar(self.fallback()),
            },
            Locator::Paired(coords) => {
                let mut valid = true;
                let mut text = String::new();
                for coord in coords {
                    let Some((row, col)) = coord.locate(scope.row) else {
                        continue;
                    };
                    if let Some(validator) = self.validator {
                        let ctx = self.context(accessor, scope, row, col);
                        valid &= validator(&ctx, log);
                    }
                    text.push_str(&accessor.text_at(row, col));
                }
                if valid {
                    FieldValue::Scalar(Scalar::Text(text))
                } else {
                    FieldValue::Scalar(self.fallback())
                }
            }
            Locator::List { slots, keep_blanks } => {
                let mut values = Vec::with_capacity(slots.len());
                for coord in slots {
                    match self.evaluate_slot(coord, accessor, scope, log) {
                        Some(value) if *keep_blanks || value.is_truthy() => values.push(value),
                        Some(_) => {}
                        None if *keep_blanks => values.push(self.fallback()),
                        None => {}
                    }
                }
                FieldValue::List(values)
            }
        }
    }

    // None 表示校验失败
    fn evaluate_slot(
        &self,
        coord: &Coordinate,
        accessor: &CellAccessor<'_>,
        scope: &RowScope,
        log: &mut DiagnosticLog,
    ) -> Option<Scalar> {
        let (row, col) = coord.locate(scope.row)?;
        let ctx = self.context(accessor, scope, row, col);

        if let Some(validator) = self.validator {
            if !validator(&ctx, log) {
                return None;
            }
        }

        Some(match self.transformer {
            Some(transformer) => transformer(&ctx, self.default.as_ref()),
            None => ctx.resolved(),
        })
    }

    fn context<'a>(
        &'a self,
        accessor: &'a CellAccessor<'a>,
        scope: &'a RowScope,
        row: u32,
        col: u32,
    ) -> CellContext<'a> {
        CellContext {
            accessor,
            row,
            col,
            scope,
            label: self.label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::workbook::Sheet;

    fn reject_all(_ctx: &CellContext<'_>, log: &mut DiagnosticLog) -> bool {
        log.warning("测试", "拒绝");
        false
    }

    fn shout(ctx: &CellContext<'_>, _default: Option<&Scalar>) -> Scalar {
        Scalar::Text(ctx.resolved().as_text().to_uppercase())
    }

    fn sheet() -> Sheet {
        let mut s = Sheet::new("S");
        s.set("H15", CellValue::text("DEP-1"));
        s.set("I15", CellValue::text("B1.001"));
        s.set("AE15", CellValue::text("pic_one"));
        s.set("AG15", CellValue::text("pic_three"));
        s.set("L15", CellValue::text("porte"));
        s
    }

    fn row_scope() -> RowScope {
        RowScope {
            row: Some(15),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_resolve_and_transform() {
        let s = sheet();
        let acc = CellAccessor::new(&s);
        let mut log = DiagnosticLog::new();
        let scope = row_scope();

        let plain = FieldRule::new("designation", "Désignation", Locator::Single(Coordinate::Column(12)));
        assert_eq!(plain.evaluate(&acc, &scope, &mut log).text(), "porte");

        let upper = plain.clone().transform(shout);
        assert_eq!(upper.evaluate(&acc, &scope, &mut log).text(), "PORTE");
        assert!(log.is_empty());
    }

    #[test]
    fn test_failed_validation_uses_default() {
        let s = sheet();
        let acc = CellAccessor::new(&s);
        let mut log = DiagnosticLog::new();
        let scope = row_scope();

        let rule = FieldRule::new("qty", "Quantité", Locator::Single(Coordinate::Column(19)))
            .validate(reject_all)
            .default_value(1i64);
        assert_eq!(rule.evaluate(&acc, &scope, &mut log).into_scalar(), Scalar::Int(1));

        let no_default = FieldRule::new("x", "x", Locator::Single(Coordinate::Column(19))).validate(reject_all);
        assert_eq!(no_default.evaluate(&acc, &scope, &mut log).text(), "");
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_paired_concatenates() {
        let s = sheet();
        let acc = CellAccessor::new(&s);
        let mut log = DiagnosticLog::new();
        let rule = FieldRule::new(
            "ref",
            "Référence",
            Locator::Paired(vec![Coordinate::Column(8), Coordinate::Column(9)]),
        );
        assert_eq!(rule.evaluate(&acc, &row_scope(), &mut log).text(), "DEP-1B1.001");
    }

    #[test]
    fn test_list_drop_or_keep_blanks() {
        let s = sheet();
        let acc = CellAccessor::new(&s);
        let mut log = DiagnosticLog::new();
        let slots: Vec<Coordinate> = ["AE", "AF", "AG", "AH"]
            .iter()
            .filter_map(|c| Coordinate::column(c))
            .collect();

        let dropped = FieldRule::new(
            "picRefDetails",
            "Photos",
            Locator::List { slots: slots.clone(), keep_blanks: false },
        );
        assert_eq!(
            dropped.evaluate(&acc, &row_scope(), &mut log).into_texts(),
            vec!["pic_one", "pic_three"]
        );

        let kept = FieldRule::new("photos", "Photos", Locator::List { slots, keep_blanks: true });
        assert_eq!(
            kept.evaluate(&acc, &row_scope(), &mut log).into_texts(),
            vec!["pic_one", "", "pic_three", ""]
        );
    }

    #[test]
    fn test_unmapped_and_column_without_row() {
        let s = sheet();
        let acc = CellAccessor::new(&s);
        let mut log = DiagnosticLog::new();
        let scope = RowScope::default();

        let city = FieldRule::new("city", "Commune", Locator::Unmapped);
        assert_eq!(city.evaluate(&acc, &scope, &mut log), FieldValue::Unmapped);

        // 列坐标在无行作用域时视为校验失败 → 默认值
        let col = FieldRule::new("x", "x", Locator::Single(Coordinate::Column(1))).default_value("d");
        assert_eq!(col.evaluate(&acc, &scope, &mut log).text(), "d");
    }
}
