// ==========================================
// 物料盘点导入系统 - 诊断与状态累加器
// ==========================================
// 职责: 收集抽取/对账全过程的分级诊断,给出整体状态码
// 红线: 诊断只追加,不修改;累加器显式传递,不做全局共享
// ==========================================

use crate::domain::types::DiagnosticLevel;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

// ==========================================
// Diagnostic - 单条诊断
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub context: String, // 子系统标签（如 "数量校验"、"库存点图片"）
    pub message: String,
}

impl Diagnostic {
    pub fn new(level: DiagnosticLevel, context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn info(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Info, context, message)
    }

    pub fn warning(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warning, context, message)
    }

    pub fn error(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, context, message)
    }

    pub fn fatal(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Fatal, context, message)
    }

    /// 是否为阻断级（error 及以上）
    pub fn is_blocking(&self) -> bool {
        self.level >= DiagnosticLevel::Error
    }
}

// ==========================================
// ImportStatus - 整体状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Complete, // 200
    Partial,  // 206
}

impl ImportStatus {
    /// HTTP 等价状态码
    pub fn code(&self) -> u16 {
        match self {
            ImportStatus::Complete => 200,
            ImportStatus::Partial => 206,
        }
    }
}

// ==========================================
// DiagnosticLog - 状态累加器
// ==========================================
// 每条诊断同时以 tracing 事件输出,便于运维侧检索
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiagnosticLog {
    entries: Vec<Diagnostic>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条诊断
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.level {
            DiagnosticLevel::Info => {
                debug!(context = %diagnostic.context, "{}", diagnostic.message)
            }
            DiagnosticLevel::Warning => {
                info!(context = %diagnostic.context, "{}", diagnostic.message)
            }
            DiagnosticLevel::Error => {
                warn!(context = %diagnostic.context, "{}", diagnostic.message)
            }
            DiagnosticLevel::Fatal => {
                error!(context = %diagnostic.context, "{}", diagnostic.message)
            }
        }
        self.entries.push(diagnostic);
    }

    pub fn info(&mut self, context: impl Into<String>, message: impl Into<String>) {
        self.push(Diagnostic::info(context, message));
    }

    pub fn warning(&mut self, context: impl Into<String>, message: impl Into<String>) {
        self.push(Diagnostic::warning(context, message));
    }

    pub fn error(&mut self, context: impl Into<String>, message: impl Into<String>) {
        self.push(Diagnostic::error(context, message));
    }

    pub fn fatal(&mut self, context: impl Into<String>, message: impl Into<String>) {
        self.push(Diagnostic::fatal(context, message));
    }

    /// 合并另一个累加器（保持顺序）
    pub fn merge(&mut self, other: DiagnosticLog) {
        self.entries.extend(other.entries);
    }

    pub fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, diagnostics: I) {
        for d in diagnostics {
            self.push(d);
        }
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 指定级别的诊断数量
    pub fn count(&self, level: DiagnosticLevel) -> usize {
        self.entries.iter().filter(|d| d.level == level).count()
    }

    /// 是否存在阻断级诊断
    pub fn has_blocking_error(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_blocking)
    }

    /// 汇总状态: 无 error 级诊断 → Complete, 否则 Partial
    pub fn status(&self) -> ImportStatus {
        if self.has_blocking_error() {
            ImportStatus::Partial
        } else {
            ImportStatus::Complete
        }
    }
}

impl From<Vec<Diagnostic>> for DiagnosticLog {
    fn from(entries: Vec<Diagnostic>) -> Self {
        Self { entries }
    }
}
