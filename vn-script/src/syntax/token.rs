//! # Token 模块
//!
//! 定义词法单元。Token 按源文本顺序产出、按值持有，
//! 不回指词法器；字面量的解析结果直接存放在 `value` 字段里。

use serde::{Deserialize, Serialize};
use text_size::TextRange;

use crate::value::ConstantValue;

/// 标识符前缀符号
///
/// 前缀决定变量类别：`$` 全局变量、`#` 标志变量，
/// 无前缀的名字是函数参数等局部名。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sigil {
    /// 无前缀（局部名）
    None,
    /// `$`（全局变量）
    Dollar,
    /// `#`（标志变量）
    Hash,
}

impl Sigil {
    /// 前缀字符（无前缀为空串）
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Dollar => "$",
            Self::Hash => "#",
        }
    }
}

/// 词法单元类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    // ── 字面量与名称 ──
    /// 数值字面量（整数、浮点或 `@` 相对数值）
    Number,
    /// 字符串字面量
    String,
    /// 标识符（可带前缀符号）
    Identifier,

    // ── 关键字 ──
    Function,
    Chapter,
    Scene,
    Dialogue,
    If,
    Else,
    While,
    Return,
    Break,
    Select,
    Case,
    Bezier,
    True,
    False,
    Null,

    // ── 运算符 ──
    Plus,
    PlusEquals,
    Minus,
    MinusEquals,
    Star,
    StarEquals,
    Slash,
    SlashEquals,
    Percent,
    Equals,
    EqualsEquals,
    Bang,
    BangEquals,
    Less,
    LessEquals,
    Greater,
    GreaterEquals,
    AmpAmp,
    PipePipe,

    // ── 分隔符 ──
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    Comma,
    Semicolon,

    /// 文件结束
    EndOfFile,
}

impl TokenKind {
    /// 文本对应的关键字类别
    pub fn keyword(text: &str) -> Option<TokenKind> {
        let kind = match text {
            "function" => Self::Function,
            "chapter" => Self::Chapter,
            "scene" => Self::Scene,
            "dialogue" => Self::Dialogue,
            "if" => Self::If,
            "else" => Self::Else,
            "while" => Self::While,
            "return" => Self::Return,
            "break" => Self::Break,
            "select" => Self::Select,
            "case" => Self::Case,
            "bezier" => Self::Bezier,
            "true" => Self::True,
            "false" => Self::False,
            "null" => Self::Null,
            _ => return None,
        };
        Some(kind)
    }

    /// 是否是语句起始关键字（错误恢复的同步点）
    pub fn starts_statement(&self) -> bool {
        matches!(
            self,
            Self::If
                | Self::While
                | Self::Return
                | Self::Break
                | Self::Select
                | Self::Dialogue
                | Self::OpenBrace
        )
    }

    /// 是否是声明起始关键字
    pub fn starts_declaration(&self) -> bool {
        matches!(self, Self::Function | Self::Chapter | Self::Scene)
    }

    /// 用于诊断消息的描述
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Number => "数值",
            Self::String => "字符串",
            Self::Identifier => "标识符",
            Self::Function => "'function'",
            Self::Chapter => "'chapter'",
            Self::Scene => "'scene'",
            Self::Dialogue => "'dialogue'",
            Self::If => "'if'",
            Self::Else => "'else'",
            Self::While => "'while'",
            Self::Return => "'return'",
            Self::Break => "'break'",
            Self::Select => "'select'",
            Self::Case => "'case'",
            Self::Bezier => "'bezier'",
            Self::True => "'true'",
            Self::False => "'false'",
            Self::Null => "'null'",
            Self::Plus => "'+'",
            Self::PlusEquals => "'+='",
            Self::Minus => "'-'",
            Self::MinusEquals => "'-='",
            Self::Star => "'*'",
            Self::StarEquals => "'*='",
            Self::Slash => "'/'",
            Self::SlashEquals => "'/='",
            Self::Percent => "'%'",
            Self::Equals => "'='",
            Self::EqualsEquals => "'=='",
            Self::Bang => "'!'",
            Self::BangEquals => "'!='",
            Self::Less => "'<'",
            Self::LessEquals => "'<='",
            Self::Greater => "'>'",
            Self::GreaterEquals => "'>='",
            Self::AmpAmp => "'&&'",
            Self::PipePipe => "'||'",
            Self::OpenParen => "'('",
            Self::CloseParen => "')'",
            Self::OpenBrace => "'{'",
            Self::CloseBrace => "'}'",
            Self::Comma => "','",
            Self::Semicolon => "';'",
            Self::EndOfFile => "文件结束",
        }
    }
}

/// 词法单元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// 类别
    pub kind: TokenKind,
    /// 源文本位置
    pub span: TextRange,
    /// 字面量值（数值/字符串/布尔/空值 token 有值；
    /// 标识符 token 存放去掉前缀后的名字）
    pub value: Option<ConstantValue>,
    /// 标识符前缀符号（仅 `Identifier` 有意义）
    pub sigil: Sigil,
}

impl Token {
    /// 创建不带值的 token
    pub fn new(kind: TokenKind, span: TextRange) -> Self {
        Self {
            kind,
            span,
            value: None,
            sigil: Sigil::None,
        }
    }

    /// 创建带字面量值的 token
    pub fn with_value(kind: TokenKind, span: TextRange, value: ConstantValue) -> Self {
        Self {
            kind,
            span,
            value: Some(value),
            sigil: Sigil::None,
        }
    }

    /// 标识符 token 的名字（去掉前缀符号）
    pub fn name(&self) -> &str {
        match &self.value {
            Some(ConstantValue::String(s)) => s,
            _ => "",
        }
    }
}
