// ==========================================
// 物料盘点导入系统 - 跨表一致性检查
// ==========================================
// 职责:
// - 概览页库存点引用必须等于物料页库存点引用（不等则中止抽取）
// - 整棵物料树内引用号不得重复（范围: 单次导入批次）
// ==========================================

use crate::domain::diagnostic::{Diagnostic, DiagnosticLog};
use crate::domain::material::{flatten_tree_references, MaterialItem};
use std::collections::HashSet;

pub const REFERENCE_CONTEXT: &str = "库存点引用校验";
pub const DUPLICATE_CONTEXT: &str = "物料引用校验";

/// 检查两张表的库存点引用是否一致
///
/// 任一侧为空即视为不一致（空引用无法作为库存点自然键）
///
/// # 返回
/// - true: 一致,可继续抽取
/// - false: 不一致,已追加 error 诊断
pub fn check_references_match(
    overview_reference: &str,
    materials_reference: &str,
    log: &mut DiagnosticLog,
) -> bool {
    let (overview, materials) = (overview_reference.trim(), materials_reference.trim());
    if overview.is_empty() || materials.is_empty() {
        log.error(
            REFERENCE_CONTEXT,
            format!(
                "库存点引用为空（概览页: \"{}\", 物料页: \"{}\"）",
                overview, materials
            ),
        );
        return false;
    }
    if overview == materials {
        return true;
    }
    log.error(
        REFERENCE_CONTEXT,
        format!(
            "概览页库存点引用 ({}) 与物料页库存点引用 ({}) 不一致",
            overview_reference, materials_reference
        ),
    );
    false
}

/// 重复值（按首次重复出现的顺序,每个值只报一次）
pub fn duplicate_values<'a, I>(references: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut duplicates = Vec::new();

    for reference in references {
        if !seen.insert(reference) && reported.insert(reference) {
            duplicates.push(reference.to_string());
        }
    }
    duplicates
}

/// 检查整棵物料树（父项与变体先序展开）的引用重复
pub fn check_no_duplicate_references(items: &[MaterialItem]) -> Vec<Diagnostic> {
    duplicate_values(flatten_tree_references(items))
        .into_iter()
        .map(|reference| Diagnostic::error(DUPLICATE_CONTEXT, format!("引用号重复: {}", reference)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::DiagnosticLevel;

    fn item(reference: &str, variations: &[&str]) -> MaterialItem {
        let mut parent = MaterialItem::new(reference);
        parent.variations = variations.iter().map(|v| MaterialItem::new(*v)).collect();
        parent
    }

    #[test]
    fn test_reference_mismatch() {
        let mut log = DiagnosticLog::new();
        assert!(!check_references_match("DEP-1", "DEP-2", &mut log));
        assert_eq!(log.count(DiagnosticLevel::Error), 1);

        let mut log = DiagnosticLog::new();
        assert!(check_references_match("DEP-1", "DEP-1", &mut log));
        assert!(log.is_empty());
    }

    #[test]
    fn test_blank_references_never_match() {
        for (overview, materials) in [("", ""), ("  ", " "), ("DEP-1", ""), ("", "DEP-1")] {
            let mut log = DiagnosticLog::new();
            assert!(
                !check_references_match(overview, materials, &mut log),
                "({:?}, {:?}) 不应通过",
                overview,
                materials
            );
            assert_eq!(log.count(DiagnosticLevel::Error), 1);
        }
    }

    #[test]
    fn test_duplicates_reported_once_per_value() {
        let items = vec![
            item("A1", &[]),
            item("B1", &["B1.001", "A1"]),
            item("A1", &["B1.001"]),
        ];

        let diagnostics = check_no_duplicate_references(&items);

        let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["引用号重复: A1", "引用号重复: B1.001"]);
        assert!(diagnostics.iter().all(|d| d.level == DiagnosticLevel::Error));
    }

    #[test]
    fn test_tree_check_matches_flat_row_check() {
        // 先建树再检查 与 直接在原始行上检查 结果一致
        let rows = ["A1", "B1", "B1.001", "B1.002", "C1", "B1.001"];
        let items = vec![
            item("A1", &[]),
            item("B1", &["B1.001", "B1.002"]),
            item("C1", &["B1.001"]),
        ];

        let from_tree: Vec<String> = check_no_duplicate_references(&items)
            .into_iter()
            .map(|d| d.message)
            .collect();
        let from_rows: Vec<String> = duplicate_values(rows.iter().copied())
            .into_iter()
            .map(|r| format!("引用号重复: {}", r))
            .collect();

        assert_eq!(from_tree, from_rows);
    }

    #[test]
    fn test_no_duplicates() {
        let items = vec![item("A1", &[]), item("B1", &["B1.001"])];
        assert!(check_no_duplicate_references(&items).is_empty());
    }
}
