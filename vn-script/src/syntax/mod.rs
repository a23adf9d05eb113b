//! # 语法模块
//!
//! 脚本语言的编译前端：词法器、解析器、不可变语法树与访问器。
//!
//! ## 流水线
//!
//! ```text
//! 源文本 → [词法器] → Vec<Token> → [解析器] → SourceFile + DiagnosticBag
//! ```
//!
//! 词法和解析全程容错：错误累积在诊断袋里，一次遍历全部报告，
//! 永不中途失败。树是否可降级为可执行程序由
//! [`DiagnosticBag::has_errors`](crate::DiagnosticBag::has_errors) 决定。

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod visitor;

pub use ast::{Declaration, Expression, NodeRef, SourceFile, Statement};
pub use lexer::tokenize;
pub use parser::parse;
pub use token::{Sigil, Token, TokenKind};
pub use visitor::{ExpressionVisitor, SyntaxVisitor};
