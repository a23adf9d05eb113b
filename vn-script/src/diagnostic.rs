//! # 诊断模块
//!
//! 提供带位置信息的结构化诊断收集。
//!
//! ## 设计原则
//!
//! - 词法/解析过程中的错误**累积而不抛出**，一次遍历报告所有问题
//! - 诊断分级：Error（阻止执行）、Warn（建议修复）、Info（信息提示）
//! - 仅含警告的编译仍可执行，含错误的编译不可执行
//! - 诊断袋由单个编译（或单个 VM 实例）独占，不是进程级单例

use serde::{Deserialize, Serialize};
use text_size::TextRange;

use crate::text::SourceText;

/// 诊断级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// 信息提示
    Info,
    /// 警告（建议修复）
    Warn,
    /// 错误（必须修复）
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// 诊断条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 诊断级别
    pub severity: Severity,
    /// 诊断消息
    pub message: String,
    /// 源文本中的位置
    pub span: TextRange,
}

impl Diagnostic {
    /// 创建错误诊断
    pub fn error(message: impl Into<String>, span: TextRange) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span,
        }
    }

    /// 创建警告诊断
    pub fn warn(message: impl Into<String>, span: TextRange) -> Self {
        Self {
            severity: Severity::Warn,
            message: message.into(),
            span,
        }
    }

    /// 创建信息诊断
    pub fn info(message: impl Into<String>, span: TextRange) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
            span,
        }
    }

    /// 以 `[级别] 行:列: 消息` 的形式格式化（行列从对应源文本解出）
    pub fn format_with(&self, source: &SourceText) -> String {
        let (line, col) = source.line_col(self.span.start());
        format!("[{}] {}:{}: {}", self.severity, line, col, self.message)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}..{}: {}",
            self.severity,
            u32::from(self.span.start()),
            u32::from(self.span.end()),
            self.message
        )
    }
}

/// 诊断袋
///
/// 按插入顺序收集诊断条目。收集过程永不失败，
/// 是否可执行由 [`DiagnosticBag::has_errors`] 统一判定。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    /// 创建空袋
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加诊断
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// 添加错误诊断
    pub fn report_error(&mut self, message: impl Into<String>, span: TextRange) {
        self.push(Diagnostic::error(message, span));
    }

    /// 添加警告诊断
    pub fn report_warn(&mut self, message: impl Into<String>, span: TextRange) {
        self.push(Diagnostic::warn(message, span));
    }

    /// 合并另一个袋（保持各自内部的插入顺序）
    pub fn merge(&mut self, other: DiagnosticBag) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// 所有诊断条目
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// 条目数量
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// 错误数量
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// 警告数量
    pub fn warn_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warn)
            .count()
    }

    /// 是否有错误
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// 按最低级别过滤
    pub fn filter_by_severity(&self, min_severity: Severity) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity >= min_severity)
            .collect()
    }

    /// 取出全部条目
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
