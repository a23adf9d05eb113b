//! # 词法器模块
//!
//! 将源文本转换为 token 序列。
//!
//! ## 设计原则
//!
//! - **容错**：无法识别的字符记录诊断后跳过，词法分析永不中止
//! - **确定性**：同一 `SourceText` 两次分析产出逐 token 相同的序列
//! - 最长匹配；空白与注释丢弃，偏移单调递增
//! - 手写字符游标，无 regex 依赖

use text_size::{TextRange, TextSize};

use crate::diagnostic::DiagnosticBag;
use crate::syntax::token::{Sigil, Token, TokenKind};
use crate::text::SourceText;
use crate::value::ConstantValue;

/// 对源文本做词法分析
///
/// 返回以 `EndOfFile` 收尾的有限 token 序列和收集到的诊断。
/// 返回的 `Vec` 可反复迭代，调用方按需重放。
pub fn tokenize(source: &SourceText) -> (Vec<Token>, DiagnosticBag) {
    let mut lexer = Lexer::new(source);
    let tokens = lexer.run();
    (tokens, lexer.diagnostics)
}

/// 词法器
struct Lexer<'a> {
    text: &'a str,
    pos: usize,
    diagnostics: DiagnosticBag,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a SourceText) -> Self {
        Self {
            text: source.as_str(),
            pos: 0,
            diagnostics: DiagnosticBag::new(),
        }
    }

    fn run(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.pos;
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::EndOfFile, self.span_from(start)));
                break;
            };

            match c {
                '0'..='9' => tokens.push(self.lex_number(start, false)),
                '"' | '\'' => tokens.push(self.lex_string(start, c)),
                '@' if self.peek_second().is_some_and(|c| c.is_ascii_digit()) => {
                    self.bump();
                    tokens.push(self.lex_number(start, true));
                }
                '$' | '#' => {
                    let sigil = if c == '$' { Sigil::Dollar } else { Sigil::Hash };
                    self.bump();
                    if self.peek().is_some_and(is_identifier_start) {
                        tokens.push(self.lex_identifier(start, sigil));
                    } else {
                        self.report_unexpected(c, start);
                    }
                }
                c if is_identifier_start(c) => {
                    tokens.push(self.lex_identifier(start, Sigil::None));
                }
                _ => {
                    if let Some(token) = self.lex_operator(start) {
                        tokens.push(token);
                    }
                }
            }
        }
        tokens
    }

    // ── 游标 ──

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.text[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn advance_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&predicate) {
            self.bump();
        }
    }

    fn span_from(&self, start: usize) -> TextRange {
        TextRange::new(TextSize::new(start as u32), TextSize::new(self.pos as u32))
    }

    // ── 空白与注释 ──

    fn skip_trivia(&mut self) {
        loop {
            self.advance_while(char::is_whitespace);
            if self.text[self.pos..].starts_with("//") {
                self.advance_while(|c| c != '\n');
                continue;
            }
            if self.text[self.pos..].starts_with("/*") {
                let start = self.pos;
                self.pos += 2;
                match self.text[self.pos..].find("*/") {
                    Some(offset) => self.pos += offset + 2,
                    None => {
                        self.pos = self.text.len();
                        self.diagnostics
                            .report_error("块注释未闭合", self.span_from(start));
                    }
                }
                continue;
            }
            break;
        }
    }

    // ── 字面量 ──

    fn lex_number(&mut self, start: usize, delta: bool) -> Token {
        let digits_start = self.pos;
        self.advance_while(|c| c.is_ascii_digit());

        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.bump();
            self.advance_while(|c| c.is_ascii_digit());
        }

        let text = &self.text[digits_start..self.pos];
        let span = self.span_from(start);
        let value = if delta || is_float {
            let parsed = match text.parse::<f64>() {
                Ok(v) => v,
                Err(_) => {
                    self.diagnostics.report_error("数值字面量无效", span);
                    0.0
                }
            };
            if delta {
                ConstantValue::Delta(parsed)
            } else {
                ConstantValue::Float(parsed)
            }
        } else {
            let parsed = match text.parse::<i64>() {
                Ok(v) => v,
                Err(_) => {
                    self.diagnostics.report_error("数值字面量超出范围", span);
                    0
                }
            };
            ConstantValue::Integer(parsed)
        };
        Token::with_value(TokenKind::Number, span, value)
    }

    fn lex_string(&mut self, start: usize, quote: char) -> Token {
        self.bump(); // 开始引号
        let mut value = String::new();
        loop {
            match self.bump() {
                None => {
                    self.diagnostics
                        .report_error("字符串字面量未闭合", self.span_from(start));
                    break;
                }
                Some(c) if c == quote => break,
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some('\'') => value.push('\''),
                    Some(other) => {
                        self.diagnostics.report_error(
                            format!("无法识别的转义序列 '\\{}'", other),
                            self.span_from(start),
                        );
                        value.push(other);
                    }
                    None => {
                        self.diagnostics
                            .report_error("字符串字面量未闭合", self.span_from(start));
                        break;
                    }
                },
                Some(c) => value.push(c),
            }
        }
        Token::with_value(
            TokenKind::String,
            self.span_from(start),
            ConstantValue::String(value),
        )
    }

    fn lex_identifier(&mut self, start: usize, sigil: Sigil) -> Token {
        let name_start = self.pos;
        self.advance_while(is_identifier_continue);
        let name = &self.text[name_start..self.pos];
        let span = self.span_from(start);

        // 关键字不允许带前缀符号
        if sigil == Sigil::None {
            if let Some(kind) = TokenKind::keyword(name) {
                let value = match kind {
                    TokenKind::True => Some(ConstantValue::Bool(true)),
                    TokenKind::False => Some(ConstantValue::Bool(false)),
                    TokenKind::Null => Some(ConstantValue::Null),
                    _ => None,
                };
                return Token {
                    kind,
                    span,
                    value,
                    sigil: Sigil::None,
                };
            }
        }

        Token {
            kind: TokenKind::Identifier,
            span,
            value: Some(ConstantValue::string(name)),
            sigil,
        }
    }

    // ── 运算符与分隔符 ──

    fn lex_operator(&mut self, start: usize) -> Option<Token> {
        let c = self.bump()?;
        let kind = match c {
            '+' if self.eat('=') => TokenKind::PlusEquals,
            '+' => TokenKind::Plus,
            '-' if self.eat('=') => TokenKind::MinusEquals,
            '-' => TokenKind::Minus,
            '*' if self.eat('=') => TokenKind::StarEquals,
            '*' => TokenKind::Star,
            '/' if self.eat('=') => TokenKind::SlashEquals,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' if self.eat('=') => TokenKind::EqualsEquals,
            '=' => TokenKind::Equals,
            '!' if self.eat('=') => TokenKind::BangEquals,
            '!' => TokenKind::Bang,
            '<' if self.eat('=') => TokenKind::LessEquals,
            '<' => TokenKind::Less,
            '>' if self.eat('=') => TokenKind::GreaterEquals,
            '>' => TokenKind::Greater,
            '&' if self.eat('&') => TokenKind::AmpAmp,
            '|' if self.eat('|') => TokenKind::PipePipe,
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '{' => TokenKind::OpenBrace,
            '}' => TokenKind::CloseBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            other => {
                self.report_unexpected(other, start);
                return None;
            }
        };
        Some(Token::new(kind, self.span_from(start)))
    }

    fn report_unexpected(&mut self, c: char, start: usize) {
        self.diagnostics
            .report_error(format!("意外的字符 '{}'", c), self.span_from(start));
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
