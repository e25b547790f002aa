// ==========================================
// 物料盘点导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 校验失败不走错误通道（降级为诊断）,
//       这里只有文件级错误与两类中止抽取的一致性错误
// ==========================================

use crate::domain::diagnostic::Diagnostic;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xlsm/.xlsb/.xls/.ods/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("工作表不存在: {0}")]
    SheetNotFound(String),

    // ===== 一致性错误（中止抽取）=====
    #[error("库存点引用不一致: 概览页={overview}, 物料页={materials}")]
    ReferenceMismatch {
        overview: String,
        materials: String,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("物料引用重复: {}", .duplicates.join(", "))]
    DuplicateReferences {
        duplicates: Vec<String>,
        diagnostics: Vec<Diagnostic>,
    },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 中止类错误携带的诊断（其他错误返回空）
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            ImportError::ReferenceMismatch { diagnostics, .. }
            | ImportError::DuplicateReferences { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
