// ==========================================
// 物料盘点导入系统 - 盘点模板布局
// ==========================================
// 职责: 模板单元格坐标与字段规则表（数据驱动,解释器见 field_rule）
// 概览页: D9..D24;物料页: 库存点引用 K8,标题行 9,数据行自第 15 行起
// ==========================================

use crate::importer::field_rule::{Coordinate, FieldRule, Locator};
use crate::importer::validators;
use crate::importer::workbook::column_index;

// ===== 概览页字段名 =====
pub mod overview_fields {
    pub const DEPOSIT_NAME: &str = "deposit_name";
    pub const BUILDING_NAME: &str = "building_name";
    pub const PROVIDER: &str = "provider";
    pub const ADDRESS: &str = "address";
    pub const CITY: &str = "city";
    pub const IRIS: &str = "iris";
    pub const DISMANTLE_DATE: &str = "dismantle_date";
    pub const AVAILABILITY_DETAILS: &str = "availability_details";
    pub const CONTENT: &str = "content";
    pub const PLUS_DETAILS: &str = "plus_details";
    pub const THUMBNAIL: &str = "thumbnail";
    pub const PHOTOS: &str = "photos";
    pub const SLUG: &str = "slug";
    pub const TEMPLATE_VERSION: &str = "template_version";
}

// ===== 物料页字段名 =====
pub mod material_fields {
    pub const CODE: &str = "PEMD_code";
    pub const MACRO: &str = "PEMD_Macro";
    pub const CAT: &str = "PEMD_Cat";
    pub const PEM: &str = "PEMD_PEM";
    pub const REF: &str = "ref";
    pub const FAMILY: &str = "familly";
    pub const CATEGORY: &str = "category";
    pub const DESIGNATION: &str = "designation";
    pub const TYPE: &str = "type";
    pub const LENGTH: &str = "lng";
    pub const WIDTH: &str = "lrg";
    pub const HEIGHT: &str = "htr";
    pub const SURFACE: &str = "surf";
    pub const QTY: &str = "qty";
    pub const UNIT: &str = "unit";
    pub const CONDITION: &str = "condition";
    pub const DESCRIPTION: &str = "description";
    pub const REMARKS: &str = "rqs";
    pub const PICTURE_GLOBAL: &str = "picRefGlob";
    pub const PICTURE_DETAILS: &str = "picRefDetails";
}

// ==========================================
// WorkbookLayout - 模板布局
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookLayout {
    pub overview_sheet_hint: String,    // 概览页名称关键字
    pub overview_reference_cell: String, // 概览页库存点引用
    pub materials_reference_cell: String, // 物料页库存点引用
    pub header_row: u32,                // 物料页列标题行
    pub header_row_offset: u32,         // 数据行从 offset+1 开始
    pub include_column: String,
    pub radical_column: String, // 引用号前半（库存点引用）
    pub material_column: String, // 引用号后半（物料片段,含变体后缀）
    pub primary_picture_column: String,
}

impl Default for WorkbookLayout {
    fn default() -> Self {
        Self {
            overview_sheet_hint: "IMPORT".to_string(),
            overview_reference_cell: "D9".to_string(),
            materials_reference_cell: "K8".to_string(),
            header_row: 9,
            header_row_offset: 14,
            include_column: "B".to_string(),
            radical_column: "H".to_string(),
            material_column: "I".to_string(),
            primary_picture_column: "AD".to_string(),
        }
    }
}

fn cell(address: &str) -> Locator {
    Coordinate::cell(address).map_or(Locator::Unmapped, Locator::Single)
}

fn column(letters: &str) -> Locator {
    Coordinate::column(letters).map_or(Locator::Unmapped, Locator::Single)
}

fn columns(letters: &[&str]) -> Vec<Coordinate> {
    letters.iter().filter_map(|l| Coordinate::column(l)).collect()
}

impl WorkbookLayout {
    pub fn with_header_row_offset(mut self, offset: u32) -> Self {
        self.header_row_offset = offset;
        self
    }

    pub fn include_col(&self) -> Option<u32> {
        column_index(&self.include_column)
    }

    pub fn radical_col(&self) -> Option<u32> {
        column_index(&self.radical_column)
    }

    pub fn material_col(&self) -> Option<u32> {
        column_index(&self.material_column)
    }

    pub fn primary_picture_col(&self) -> Option<u32> {
        column_index(&self.primary_picture_column)
    }

    /// 概览页字段规则表
    pub fn overview_rules(&self) -> Vec<FieldRule> {
        use overview_fields::*;
        vec![
            FieldRule::new(DEPOSIT_NAME, "库存点名称", cell(&self.overview_reference_cell)),
            FieldRule::new(BUILDING_NAME, "建筑名称", cell("D10")),
            FieldRule::new(PROVIDER, "供应方名称", cell("D12")),
            FieldRule::new(ADDRESS, "地址", cell("D11")),
            FieldRule::new(CITY, "城市", Locator::Unmapped),
            FieldRule::new(IRIS, "IRIS 分区", Locator::Unmapped),
            FieldRule::new(DISMANTLE_DATE, "预计可用日期", cell("D13"))
                .validate(validators::date)
                .transform(validators::iso_date),
            FieldRule::new(AVAILABILITY_DETAILS, "可用性说明", cell("D14")),
            FieldRule::new(CONTENT, "描述", cell("D15")),
            FieldRule::new(PLUS_DETAILS, "亮点", cell("D16")),
            FieldRule::new(THUMBNAIL, "封面图片", cell("D17")).validate(validators::numeric),
            FieldRule::new(
                PHOTOS,
                "库存点照片",
                Locator::List {
                    slots: ["D18", "D19", "D20", "D21"]
                        .iter()
                        .filter_map(|a| Coordinate::cell(a))
                        .collect(),
                    keep_blanks: true,
                },
            )
            .validate(validators::optional_picture),
            FieldRule::new(SLUG, "URL 根路径", cell("D22")).validate(validators::non_empty),
            FieldRule::new(TEMPLATE_VERSION, "模板版本", cell("D24")),
        ]
    }

    /// 物料页行规则表
    pub fn material_rules(&self) -> Vec<FieldRule> {
        use material_fields::*;
        vec![
            FieldRule::new(CODE, "PEMD 编码", column("C")),
            FieldRule::new(MACRO, "PEMD 大类", column("D")),
            FieldRule::new(CAT, "PEMD 类目", column("E")),
            FieldRule::new(PEM, "PEM 分类", column("F")),
            FieldRule::new(
                REF,
                "引用号",
                Locator::Paired(columns(&[self.radical_column.as_str(), self.material_column.as_str()])),
            ),
            FieldRule::new(FAMILY, "物料族", column("J")).validate(validators::non_empty),
            FieldRule::new(CATEGORY, "类目", column("K")).validate(validators::non_empty),
            FieldRule::new(DESIGNATION, "名称", column("L")).validate(validators::non_empty),
            FieldRule::new(TYPE, "材质", column("M")),
            FieldRule::new(LENGTH, "长", column("N")),
            FieldRule::new(WIDTH, "宽", column("O")),
            FieldRule::new(HEIGHT, "高", column("P")),
            FieldRule::new(SURFACE, "面积", column("R")),
            FieldRule::new(QTY, "数量", column("S"))
                .validate(validators::quantity)
                .default_value(1i64),
            FieldRule::new(UNIT, "单位", column("T"))
                .transform(validators::unit)
                .default_value(crate::domain::material::DEFAULT_UNIT),
            FieldRule::new(CONDITION, "状态", column("Z")),
            FieldRule::new(DESCRIPTION, "描述", column("AA")),
            FieldRule::new(REMARKS, "备注", column("AB")),
            FieldRule::new(PICTURE_GLOBAL, "主图", column(&self.primary_picture_column))
                .validate(validators::material_picture),
            FieldRule::new(
                PICTURE_DETAILS,
                "细节图",
                Locator::List {
                    slots: columns(&["AE", "AF", "AG", "AH"]),
                    keep_blanks: false,
                },
            )
            .validate(validators::material_picture),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_columns() {
        let layout = WorkbookLayout::default();
        assert_eq!(layout.include_col(), Some(2));
        assert_eq!(layout.radical_col(), Some(8));
        assert_eq!(layout.material_col(), Some(9));
        assert_eq!(layout.primary_picture_col(), Some(30));
    }

    #[test]
    fn test_rule_tables_have_no_broken_coordinates() {
        let layout = WorkbookLayout::default();
        let unmapped: Vec<&str> = layout
            .overview_rules()
            .iter()
            .filter(|r| r.locator == Locator::Unmapped)
            .map(|r| r.name)
            .collect();
        assert_eq!(unmapped, vec![overview_fields::CITY, overview_fields::IRIS]);

        assert!(layout
            .material_rules()
            .iter()
            .all(|r| r.locator != Locator::Unmapped));
    }
}
