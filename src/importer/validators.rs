// ==========================================
// 物料盘点导入系统 - 字段校验器与转换器
// ==========================================
// 职责: 模板字段的校验器/转换器,以及对账阶段复用的清洗函数
// 规则:
// - 校验失败只追加 warning 级诊断,不中断抽取
// - 清洗函数为纯函数
// ==========================================

use crate::domain::diagnostic::DiagnosticLog;
use crate::domain::material::Dimensions;
use crate::domain::types::Scalar;
use crate::importer::field_rule::CellContext;
use crate::importer::workbook::CellValue;
use regex::Regex;
use std::sync::OnceLock;

/// 图片引用名最短长度
pub const MIN_PICTURE_REF_LEN: usize = 6;

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(0[1-9]|1\d|2\d|3[01])/(0[1-9]|1[0-2])/((?:19|20)\d{2})$")
            .expect("日期正则合法")
    })
}

fn dimension_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\D*(\d+)\D*").expect("尺寸正则合法"))
}

fn row_label(ctx: &CellContext<'_>) -> String {
    if ctx.scope.reference.is_empty() {
        ctx.address()
    } else {
        format!("{} ({})", ctx.scope.reference, ctx.address())
    }
}

// ==========================================
// 校验器
// ==========================================

/// 非空: 空值/假值/"-" 无效
pub fn non_empty(ctx: &CellContext<'_>, log: &mut DiagnosticLog) -> bool {
    let value = ctx.resolved();
    if !value.is_truthy() || value.as_text().trim() == "-" {
        log.warning(
            "单元格校验",
            format!("「{}」为空: {}", ctx.column_label(), row_label(ctx)),
        );
        return false;
    }
    true
}

/// 数量: 非整数或为 0 无效
pub fn quantity(ctx: &CellContext<'_>, log: &mut DiagnosticLog) -> bool {
    let value = ctx.resolved();
    let valid = match value.as_int() {
        None => false,
        Some(_) => !is_numeric_zero(&value),
    };
    if !valid {
        log.warning(
            "数量校验",
            format!("数量无效: {} = {}", row_label(ctx), value.as_text()),
        );
    }
    valid
}

fn is_numeric_zero(value: &Scalar) -> bool {
    match value {
        Scalar::Int(i) => *i == 0,
        Scalar::Float(f) => *f == 0.0,
        Scalar::Text(s) => s.trim().parse::<f64>().map(|f| f == 0.0).unwrap_or(false),
        _ => false,
    }
}

/// 日期: 日期单元格或 dd/mm/yyyy 文本有效
pub fn date(ctx: &CellContext<'_>, log: &mut DiagnosticLog) -> bool {
    if matches!(ctx.raw(), CellValue::Date(_)) {
        return true;
    }
    let text = ctx.resolved().as_text();
    if date_regex().is_match(text.trim()) {
        return true;
    }
    log.warning(
        "日期校验",
        format!("日期无效: {} = {}", ctx.address(), text),
    );
    false
}

/// 数值合法性: NaN 无效
pub fn numeric(ctx: &CellContext<'_>, log: &mut DiagnosticLog) -> bool {
    let value = ctx.resolved();
    if let Scalar::Float(f) = value {
        if f.is_nan() {
            log.warning("数值校验", format!("数值无效: {}", ctx.address()));
            return false;
        }
    }
    true
}

/// 必填图片: 空/"-"/长度不足无效
pub fn picture(ctx: &CellContext<'_>, log: &mut DiagnosticLog) -> bool {
    let text = ctx.resolved().as_text();
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed.chars().count() < MIN_PICTURE_REF_LEN {
        log.warning(
            "图片校验",
            format!("图片引用名无效: {} = {}", row_label(ctx), trimmed),
        );
        return false;
    }
    true
}

/// 可选图片: 空/"-" 静默无效;非空但长度不足时告警
pub fn optional_picture(ctx: &CellContext<'_>, log: &mut DiagnosticLog) -> bool {
    let text = ctx.resolved().as_text();
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return false;
    }
    if trimmed.chars().count() < MIN_PICTURE_REF_LEN {
        log.warning(
            "图片校验",
            format!("图片引用名无效: {} = {}", row_label(ctx), trimmed),
        );
        return false;
    }
    true
}

/// 物料图片: 父项主图列必填,其余槽位可选
pub fn material_picture(ctx: &CellContext<'_>, log: &mut DiagnosticLog) -> bool {
    if ctx.is_optional_picture() {
        optional_picture(ctx, log)
    } else {
        picture(ctx, log)
    }
}

// ==========================================
// 转换器
// ==========================================

/// 日期 → YYYY-MM-DD（无法识别时保留原值）
pub fn iso_date(ctx: &CellContext<'_>, _default: Option<&Scalar>) -> Scalar {
    if let CellValue::Date(dt) = ctx.raw() {
        return Scalar::Text(dt.format("%Y-%m-%d").to_string());
    }
    let value = ctx.resolved();
    match normalize_date_text(&value.as_text()) {
        Some(iso) => Scalar::Text(iso),
        None => value,
    }
}

/// dd/mm/yyyy → YYYY-MM-DD
pub fn normalize_date_text(raw: &str) -> Option<String> {
    let caps = date_regex().captures(raw.trim())?;
    Some(format!("{}-{}-{}", &caps[3], &caps[2], &caps[1]))
}

/// 计量单位: 空值取默认值
pub fn unit(ctx: &CellContext<'_>, default: Option<&Scalar>) -> Scalar {
    let value = ctx.resolved();
    if value.is_truthy() {
        value
    } else {
        default.cloned().unwrap_or_default()
    }
}

// ==========================================
// 清洗函数（对账阶段使用）
// ==========================================

/// 尺寸: 取第一段连续数字,无数字返回空串
pub fn sanitize_dimension(raw: &str) -> String {
    dimension_regex()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// 数量: 非负整数,非法或负数归零
pub fn sanitize_quantity(raw: &Scalar) -> i64 {
    raw.as_int().map(|q| q.max(0)).unwrap_or(0)
}

/// 变体属性 slug: L{长}xl{宽}xh{高},空尺寸不参与
pub fn build_dimension_slug(dimensions: &Dimensions) -> String {
    [
        ("L", sanitize_dimension(&dimensions.length)),
        ("l", sanitize_dimension(&dimensions.width)),
        ("h", sanitize_dimension(&dimensions.height)),
    ]
    .iter()
    .filter(|(_, v)| !v.is_empty())
    .map(|(prefix, v)| format!("{}{}", prefix, v))
    .collect::<Vec<_>>()
    .join("x")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::cell_accessor::CellAccessor;
    use crate::importer::field_rule::RowScope;
    use crate::importer::workbook::{excel_serial_to_datetime, Sheet};

    fn with_ctx<R>(value: CellValue, scope: RowScope, f: impl FnOnce(&CellContext<'_>) -> R) -> R {
        let mut sheet = Sheet::new("S");
        sheet.set("A9", CellValue::text("Famille"));
        sheet.set_at(15, 1, value);
        let accessor = CellAccessor::new(&sheet);
        let ctx = CellContext {
            accessor: &accessor,
            row: 15,
            col: 1,
            scope: &scope,
            label: "famille",
        };
        f(&ctx)
    }

    fn scope() -> RowScope {
        RowScope {
            row: Some(15),
            reference: "DEP-1A1".to_string(),
            header_row: Some(9),
            primary_picture_column: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_non_empty() {
        let mut log = DiagnosticLog::new();
        assert!(with_ctx(CellValue::text("Bois"), scope(), |c| non_empty(c, &mut log)));
        assert!(!with_ctx(CellValue::text("-"), scope(), |c| non_empty(c, &mut log)));
        assert!(!with_ctx(CellValue::Empty, scope(), |c| non_empty(c, &mut log)));
        assert_eq!(log.len(), 2);
        assert!(log.entries()[0].message.contains("Famille"));
        assert!(log.entries()[0].message.contains("DEP-1A1"));
    }

    #[test]
    fn test_quantity() {
        let mut log = DiagnosticLog::new();
        assert!(with_ctx(CellValue::Number(5.0), scope(), |c| quantity(c, &mut log)));
        assert!(with_ctx(CellValue::text("3"), scope(), |c| quantity(c, &mut log)));
        assert!(!with_ctx(CellValue::Number(0.0), scope(), |c| quantity(c, &mut log)));
        assert!(!with_ctx(CellValue::text("abc"), scope(), |c| quantity(c, &mut log)));
        assert!(!with_ctx(CellValue::Empty, scope(), |c| quantity(c, &mut log)));
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_date_and_iso_transform() {
        let mut log = DiagnosticLog::new();
        let serial = excel_serial_to_datetime(45352.0).unwrap();
        assert!(with_ctx(CellValue::Date(serial), scope(), |c| date(c, &mut log)));
        assert!(with_ctx(CellValue::text("01/03/2024"), scope(), |c| date(c, &mut log)));
        assert!(!with_ctx(CellValue::text("2024/03/01"), scope(), |c| date(c, &mut log)));
        assert_eq!(log.len(), 1);

        let iso = with_ctx(CellValue::Date(serial), scope(), |c| iso_date(c, None));
        assert_eq!(iso.as_text(), "2024-03-01");
        let iso = with_ctx(CellValue::text("15/06/2025"), scope(), |c| iso_date(c, None));
        assert_eq!(iso.as_text(), "2025-06-15");
    }

    #[test]
    fn test_pictures() {
        let mut log = DiagnosticLog::new();
        assert!(with_ctx(CellValue::text("DEP1_photo"), scope(), |c| picture(c, &mut log)));
        assert!(!with_ctx(CellValue::text("abc"), scope(), |c| picture(c, &mut log)));
        assert_eq!(log.len(), 1);

        // 可选: 空值静默失败
        assert!(!with_ctx(CellValue::Empty, scope(), |c| optional_picture(c, &mut log)));
        assert_eq!(log.len(), 1);
        assert!(!with_ctx(CellValue::text("ab"), scope(), |c| optional_picture(c, &mut log)));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_material_picture_required_only_for_parent_primary() {
        let mut log = DiagnosticLog::new();
        // 父项主图列为空 → 告警
        assert!(!with_ctx(CellValue::Empty, scope(), |c| material_picture(c, &mut log)));
        assert_eq!(log.len(), 1);

        // 变体行主图列为空 → 静默
        let mut variation = scope();
        variation.variation = true;
        assert!(!with_ctx(CellValue::Empty, variation, |c| material_picture(c, &mut log)));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_unit_default() {
        let d = Scalar::Text("u".to_string());
        assert_eq!(with_ctx(CellValue::Empty, scope(), |c| unit(c, Some(&d))).as_text(), "u");
        assert_eq!(with_ctx(CellValue::text("m2"), scope(), |c| unit(c, Some(&d))).as_text(), "m2");
    }

    #[test]
    fn test_sanitize_dimension() {
        assert_eq!(sanitize_dimension("12cm"), "12");
        assert_eq!(sanitize_dimension(""), "");
        assert_eq!(sanitize_dimension("no digits"), "");
        assert_eq!(sanitize_dimension("env. 200 x 90"), "200");
    }

    #[test]
    fn test_sanitize_quantity() {
        assert_eq!(sanitize_quantity(&Scalar::Int(-5)), 0);
        assert_eq!(sanitize_quantity(&Scalar::Text("7".to_string())), 7);
        assert_eq!(sanitize_quantity(&Scalar::Text("abc".to_string())), 0);
        assert_eq!(sanitize_quantity(&Scalar::Float(3.0)), 3);
    }

    #[test]
    fn test_build_dimension_slug() {
        let dims = Dimensions {
            length: "200cm".to_string(),
            width: "".to_string(),
            height: "h=30".to_string(),
        };
        assert_eq!(build_dimension_slug(&dims), "L200xh30");
        assert_eq!(build_dimension_slug(&Dimensions::default()), "");
    }
}
