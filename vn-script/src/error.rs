//! # Error 模块
//!
//! 定义 vn-script 中使用的错误类型。
//!
//! 词法/语法错误不走这里：它们累积在 [`DiagnosticBag`](crate::DiagnosticBag)
//! 中并整批上报。此处只有两类硬性错误：
//! 编译门（含语法错误的树拒绝降级为可执行程序）和宿主 API 误用。

use thiserror::Error;

use crate::diagnostic::DiagnosticBag;
use crate::runtime::thread::ThreadId;

/// 编译错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// 语法树带有错误级诊断，不可执行
    #[error("脚本包含 {error_count} 个语法错误，无法执行")]
    SyntaxErrors {
        error_count: usize,
        diagnostics: DiagnosticBag,
    },
}

/// VM 错误
///
/// 这些是宿主调用 VM API 时的误用，与脚本内部的解析失败无关：
/// 脚本内部引用未定义实体/函数/变量按无操作处理（见运行期诊断）。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VmError {
    /// 入口函数未定义
    #[error("入口函数 '{name}' 未定义")]
    UndefinedEntryPoint { name: String },

    /// 线程不存在
    #[error("线程 {id:?} 不存在")]
    ThreadNotFound { id: ThreadId },

    /// 无效的选择索引
    #[error("无效的选择索引 {index}，有效范围是 0..{max}")]
    InvalidChoiceIndex { index: usize, max: usize },
}

/// VM Result 类型别名
pub type VmResult<T> = Result<T, VmError>;
