//! # VN Script
//!
//! 视觉小说引擎的脚本语言核心：词法器、解析器、不可变语法树、
//! 对话内嵌标记子语言（PXml）与协作式多线程虚拟机。
//!
//! ## 架构概述
//!
//! `vn-script` 是纯逻辑核心，不依赖任何 IO 或渲染引擎。
//! 宿主通过 [`EngineHost`] 能力界面与 VM 协作：
//!
//! ```text
//! Host                               vn-script
//!   │                                    │
//!   │── tick(delta, input, &mut host) ──►│ 按槽位顺序推进全部线程
//!   │◄─ 同步回调（实体/视觉/音频/呈现）──│
//!   │◄─ 等待条件探测（idle/move）────────│
//!   │                                    │
//! ```
//!
//! ## 编译流水线
//!
//! ```text
//! 源文本 → [词法器] → Token 流 → [解析器] → 语法树 + 诊断袋
//!        → [编译门: 无错误?] → [降级] → Program → Vm
//! ```
//!
//! 词法/语法错误累积在 [`DiagnosticBag`] 中整批报告，永不抛出；
//! 运行期对未定义实体/函数/变量的引用按无操作处理并记录诊断，
//! 一条坏指令不会中止整场呈现。
//!
//! ## 使用示例
//!
//! ```ignore
//! use vn_script::{Program, Vm, InputEvent};
//!
//! let (program, warnings) = Program::from_source(script_text)?;
//! let mut vm = Vm::new(program);
//! vm.spawn("main", "main")?;
//!
//! // 宿主主循环
//! loop {
//!     let input = collect_input();   // Option<InputEvent>
//!     vm.tick(frame_delta, input, &mut host)?;
//!     if vm.is_finished() {
//!         break;
//!     }
//! }
//! ```
//!
//! ## 模块结构
//!
//! - [`text`]：源文本与位置信息
//! - [`diagnostic`]：结构化诊断收集
//! - [`value`]：脚本常量值与全函数转换
//! - [`syntax`]：词法器、解析器、语法树、访问器
//! - [`pxml`]：对话标记子语言的解析与平铺
//! - [`runtime`]：降级、线程、内建分发、VM
//! - [`error`]：编译门与宿主 API 错误

pub mod diagnostic;
pub mod error;
pub mod pxml;
pub mod runtime;
pub mod syntax;
pub mod text;
pub mod value;

// 重导出核心类型
pub use diagnostic::{Diagnostic, DiagnosticBag, Severity};
pub use error::{CompileError, VmError, VmResult};
pub use pxml::{
    Color, MarkerKind, PXmlNode, TextBuffer, TextBufferSegment, TextRun, TextSegment, VoiceAction,
    VoiceSegment, parse_pxml,
};
pub use runtime::{
    BezierCurve, Builtin, Coordinate, CoordinateOrigin, EngineHost, EntityAction, EntityPath,
    EntityQuery, InputEvent, MotionCurve, Program, ThreadId, ThreadState, Vm, WaitCondition,
};
pub use syntax::{SourceFile, parse, tokenize};
pub use text::SourceText;
pub use value::ConstantValue;
