// ==========================================
// 物料盘点导入系统 - 导入层（抽取与校验引擎）
// ==========================================
// 职责: 工作簿 → 单元格解析 → 字段规则求值 → 库存点记录/物料树 + 诊断
// 支持: Excel (.xlsx/.xlsm/.xlsb/.xls), ODS, CSV
// ==========================================

// 模块声明
pub mod cell_accessor;
pub mod consistency_checker;
pub mod error;
pub mod field_rule;
pub mod importer_trait;
pub mod layout;
pub mod materials_extractor;
pub mod overview_extractor;
pub mod validators;
pub mod workbook;
pub mod workbook_importer;

// 重导出核心类型
pub use cell_accessor::{classify, CellAccessor};
pub use consistency_checker::{check_no_duplicate_references, check_references_match};
pub use error::{ImportError, ImportResult};
pub use field_rule::{Coordinate, FieldRule, FieldValue, Locator, RowScope};
pub use layout::WorkbookLayout;
pub use materials_extractor::MaterialsExtractor;
pub use overview_extractor::OverviewExtractor;
pub use validators::{build_dimension_slug, sanitize_dimension, sanitize_quantity};
pub use workbook::{CellAddress, CellValue, Sheet, Workbook};
pub use workbook_importer::WorkbookImporter;

// 重导出 Trait 接口
pub use importer_trait::{DepositExtractor, ExtractionOutcome, SheetSelection};
