//! # 解析器模块
//!
//! 手写递归下降解析器，二元表达式用优先级爬升。
//!
//! ## 设计原则
//!
//! - **容错**：遇到畸形结构在当前 token 处记录诊断，
//!   同步到下一个语句/声明边界后继续，一次遍历报告所有错误
//! - 优先级与结合性由静态表决定（见 `BinaryOperator::precedence`），
//!   赋值右结合且最低
//! - 函数调用只记录被调名与实参表，元数留到执行期解析
//! - 解析器永不失败：总是返回一棵树加一个诊断袋，
//!   是否可执行由诊断袋的错误门决定

use text_size::TextRange;

use crate::diagnostic::DiagnosticBag;
use crate::syntax::ast::{
    AssignmentExpr, AssignmentOperator, BezierControlPoint, BezierExpr, BinaryExpr,
    BinaryOperator, BlockStmt, BreakStmt, ChapterDecl, Declaration, DialoguePage, DialogueStmt,
    Expression, ExpressionStmt, FunctionCallExpr, FunctionDecl, IfStmt, LiteralExpr, NameExpr,
    Parameter, ReturnStmt, SceneDecl, SelectCase, SelectStmt, SourceFile, Statement, UnaryExpr,
    UnaryOperator, WhileStmt,
};
use crate::syntax::lexer::tokenize;
use crate::syntax::token::{Sigil, Token, TokenKind};
use crate::text::SourceText;
use crate::value::ConstantValue;

/// 解析源文本
///
/// 内部先做词法分析，词法诊断并入返回的诊断袋。
/// 根节点的范围恒等于整个源文本的范围。
pub fn parse(source: &SourceText) -> (SourceFile, DiagnosticBag) {
    let (tokens, mut diagnostics) = tokenize(source);
    let mut parser = Parser::new(tokens);
    let file = parser.parse_source_file(source.full_span());
    diagnostics.merge(parser.diagnostics);
    (file, diagnostics)
}

/// 解析器
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: DiagnosticBag,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: DiagnosticBag::new(),
        }
    }

    // ── token 游标 ──

    fn current(&self) -> &Token {
        // tokenize 保证以 EndOfFile 收尾
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn at_end(&self) -> bool {
        self.at(TokenKind::EndOfFile)
    }

    fn bump(&mut self) -> Token {
        let token = self.current().clone();
        if !self.at_end() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at(kind) {
            Some(self.bump())
        } else {
            let span = self.current().span;
            let found = self.current().kind.describe();
            self.diagnostics.report_error(
                format!("期望 {}，实际是 {}", kind.describe(), found),
                span,
            );
            None
        }
    }

    // ── 错误恢复 ──

    /// 同步到下一个语句边界
    ///
    /// 跳过 token 直到消费掉一个 `;`、停在 `}`、语句/声明起始
    /// 关键字或文件结束，保证总是前进。
    fn synchronize_statement(&mut self) {
        loop {
            let kind = self.current().kind;
            match kind {
                TokenKind::Semicolon => {
                    self.bump();
                    return;
                }
                TokenKind::CloseBrace | TokenKind::EndOfFile => return,
                k if k.starts_statement() || k.starts_declaration() => return,
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// 同步到下一个声明边界
    fn synchronize_declaration(&mut self) {
        // 至少前进一个 token，避免原地循环
        if !self.at_end() {
            self.bump();
        }
        while !self.at_end() && !self.current().kind.starts_declaration() {
            self.bump();
        }
    }

    // ── 声明 ──

    fn parse_source_file(&mut self, full_span: TextRange) -> SourceFile {
        let mut declarations = Vec::new();
        while !self.at_end() {
            let parsed = match self.current().kind {
                TokenKind::Function => self.parse_function(),
                TokenKind::Chapter => self.parse_keyword_declaration(TokenKind::Chapter),
                TokenKind::Scene => self.parse_keyword_declaration(TokenKind::Scene),
                other => {
                    self.diagnostics.report_error(
                        format!(
                            "期望 'function'、'chapter' 或 'scene'，实际是 {}",
                            other.describe()
                        ),
                        self.current().span,
                    );
                    None
                }
            };
            match parsed {
                Some(declaration) => declarations.push(declaration),
                None => self.synchronize_declaration(),
            }
        }
        SourceFile {
            declarations,
            span: full_span,
        }
    }

    fn parse_function(&mut self) -> Option<Declaration> {
        let keyword = self.bump();
        let (name, _, _) = self.expect_name()?;

        self.expect(TokenKind::OpenParen)?;
        let mut parameters = Vec::new();
        while !self.at(TokenKind::CloseParen) && !self.at_end() {
            let (param_name, sigil, span) = self.expect_name()?;
            parameters.push(Parameter {
                name: param_name,
                sigil,
                span,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen)?;

        let body = self.parse_block();
        Some(Declaration::Function(FunctionDecl {
            name,
            parameters,
            span: keyword.span.cover(body.span),
            body,
        }))
    }

    /// 解析 chapter/scene 声明（形参表以外与函数同形）
    fn parse_keyword_declaration(&mut self, kind: TokenKind) -> Option<Declaration> {
        let keyword = self.bump();
        let (name, _, _) = self.expect_name()?;
        let body = self.parse_block();
        let span = keyword.span.cover(body.span);
        Some(match kind {
            TokenKind::Chapter => Declaration::Chapter(ChapterDecl { name, body, span }),
            _ => Declaration::Scene(SceneDecl { name, body, span }),
        })
    }

    fn expect_name(&mut self) -> Option<(String, Sigil, TextRange)> {
        let token = self.expect(TokenKind::Identifier)?;
        Some((token.name().to_string(), token.sigil, token.span))
    }

    // ── 语句 ──

    fn parse_block(&mut self) -> BlockStmt {
        let open_span = self.current().span;
        if !self.eat(TokenKind::OpenBrace) {
            self.diagnostics
                .report_error("期望 '{'", open_span);
            return BlockStmt {
                statements: Vec::new(),
                span: open_span,
            };
        }

        let mut statements = Vec::new();
        while !self.at(TokenKind::CloseBrace) && !self.at_end() {
            match self.parse_statement() {
                Some(statement) => statements.push(statement),
                None => self.synchronize_statement(),
            }
        }

        let close_span = match self.expect(TokenKind::CloseBrace) {
            Some(token) => token.span,
            None => self.current().span,
        };
        BlockStmt {
            statements,
            span: open_span.cover(close_span),
        }
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        match self.current().kind {
            TokenKind::OpenBrace => Some(Statement::Block(self.parse_block())),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => self.parse_break(),
            TokenKind::Select => self.parse_select(),
            TokenKind::Dialogue => self.parse_dialogue(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_if(&mut self) -> Option<Statement> {
        let keyword = self.bump();
        self.expect(TokenKind::OpenParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::CloseParen)?;
        let then_branch = Box::new(self.parse_statement()?);

        let (else_branch, end_span) = if self.eat(TokenKind::Else) {
            let branch = self.parse_statement()?;
            let span = branch.span();
            (Some(Box::new(branch)), span)
        } else {
            (None, then_branch.span())
        };

        Some(Statement::If(IfStmt {
            condition,
            then_branch,
            else_branch,
            span: keyword.span.cover(end_span),
        }))
    }

    fn parse_while(&mut self) -> Option<Statement> {
        let keyword = self.bump();
        self.expect(TokenKind::OpenParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::CloseParen)?;
        let body = Box::new(self.parse_statement()?);
        let span = keyword.span.cover(body.span());
        Some(Statement::While(WhileStmt {
            condition,
            body,
            span,
        }))
    }

    fn parse_return(&mut self) -> Option<Statement> {
        let keyword = self.bump();
        let semicolon = self.expect(TokenKind::Semicolon)?;
        Some(Statement::Return(ReturnStmt {
            span: keyword.span.cover(semicolon.span),
        }))
    }

    fn parse_break(&mut self) -> Option<Statement> {
        let keyword = self.bump();
        let semicolon = self.expect(TokenKind::Semicolon)?;
        Some(Statement::Break(BreakStmt {
            span: keyword.span.cover(semicolon.span),
        }))
    }

    fn parse_select(&mut self) -> Option<Statement> {
        let keyword = self.bump();
        self.expect(TokenKind::OpenBrace)?;

        let mut cases = Vec::new();
        while self.at(TokenKind::Case) {
            let case_keyword = self.bump();
            let label_token = self.expect(TokenKind::String)?;
            let label = match label_token.value {
                Some(ConstantValue::String(s)) => s,
                _ => String::new(),
            };
            let body = self.parse_block();
            cases.push(SelectCase {
                label,
                span: case_keyword.span.cover(body.span),
                body,
            });
        }

        if cases.is_empty() {
            self.diagnostics
                .report_error("select 至少需要一个 case", keyword.span);
        }

        let close = self.expect(TokenKind::CloseBrace)?;
        Some(Statement::Select(SelectStmt {
            cases,
            span: keyword.span.cover(close.span),
        }))
    }

    fn parse_dialogue(&mut self) -> Option<Statement> {
        let keyword = self.bump();
        let (box_name, _, _) = self.expect_name()?;
        let (block_name, _, _) = self.expect_name()?;
        self.expect(TokenKind::OpenBrace)?;

        let mut pages = Vec::new();
        while self.at(TokenKind::String) {
            let token = self.bump();
            let pxml = match token.value {
                Some(ConstantValue::String(s)) => s,
                _ => String::new(),
            };
            pages.push(DialoguePage {
                pxml,
                span: token.span,
            });
        }

        let close = self.expect(TokenKind::CloseBrace)?;
        Some(Statement::Dialogue(DialogueStmt {
            box_name,
            block_name,
            pages,
            span: keyword.span.cover(close.span),
        }))
    }

    fn parse_expression_statement(&mut self) -> Option<Statement> {
        let expression = self.parse_expression()?;
        let semicolon = self.expect(TokenKind::Semicolon)?;
        Some(Statement::Expression(ExpressionStmt {
            span: expression.span().cover(semicolon.span),
            expression,
        }))
    }

    // ── 表达式 ──

    fn parse_expression(&mut self) -> Option<Expression> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Option<Expression> {
        let left = self.parse_binary(0)?;
        let Some(operator) = assignment_operator(self.current().kind) else {
            return Some(left);
        };
        self.bump();
        // 右结合
        let value = self.parse_assignment()?;

        match left {
            Expression::Name(target) => Some(Expression::Assignment(AssignmentExpr {
                span: target.span.cover(value.span()),
                target,
                operator,
                value: Box::new(value),
            })),
            other => {
                self.diagnostics
                    .report_error("赋值目标必须是变量", other.span());
                Some(value)
            }
        }
    }

    /// 优先级爬升
    fn parse_binary(&mut self, min_precedence: u8) -> Option<Expression> {
        let mut left = self.parse_unary()?;
        while let Some(operator) = binary_operator(self.current().kind) {
            let precedence = operator.precedence();
            if precedence < min_precedence {
                break;
            }
            self.bump();
            // 左结合：右侧要求更高的最小优先级
            let right = self.parse_binary(precedence + 1)?;
            left = Expression::Binary(BinaryExpr {
                span: left.span().cover(right.span()),
                left: Box::new(left),
                operator,
                right: Box::new(right),
            });
        }
        Some(left)
    }

    fn parse_unary(&mut self) -> Option<Expression> {
        let operator = match self.current().kind {
            TokenKind::Minus => UnaryOperator::Negate,
            TokenKind::Bang => UnaryOperator::Not,
            _ => return self.parse_primary(),
        };
        let token = self.bump();
        let operand = self.parse_unary()?;
        Some(Expression::Unary(UnaryExpr {
            span: token.span.cover(operand.span()),
            operator,
            operand: Box::new(operand),
        }))
    }

    fn parse_primary(&mut self) -> Option<Expression> {
        match self.current().kind {
            TokenKind::Number
            | TokenKind::String
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null => {
                let token = self.bump();
                Some(Expression::Literal(LiteralExpr {
                    value: token.value.unwrap_or(ConstantValue::Null),
                    span: token.span,
                }))
            }

            TokenKind::Identifier => {
                let token = self.bump();
                // 调用只对无前缀名字成立；带前缀的名字是变量引用
                if token.sigil == Sigil::None && self.at(TokenKind::OpenParen) {
                    self.parse_call(token)
                } else {
                    Some(Expression::Name(NameExpr {
                        name: token.name().to_string(),
                        sigil: token.sigil,
                        span: token.span,
                    }))
                }
            }

            TokenKind::OpenParen => {
                self.bump();
                let expression = self.parse_expression()?;
                self.expect(TokenKind::CloseParen)?;
                Some(expression)
            }

            TokenKind::Bezier => self.parse_bezier(),

            other => {
                self.diagnostics.report_error(
                    format!("意外的标记 {}，期望表达式", other.describe()),
                    self.current().span,
                );
                None
            }
        }
    }

    fn parse_call(&mut self, callee: Token) -> Option<Expression> {
        self.bump(); // '('
        let mut arguments = Vec::new();
        while !self.at(TokenKind::CloseParen) && !self.at_end() {
            arguments.push(self.parse_expression()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let close = self.expect(TokenKind::CloseParen)?;
        Some(Expression::FunctionCall(FunctionCallExpr {
            callee: callee.name().to_string(),
            callee_span: callee.span,
            arguments,
            span: callee.span.cover(close.span),
        }))
    }

    fn parse_bezier(&mut self) -> Option<Expression> {
        let keyword = self.bump();
        self.expect(TokenKind::OpenParen)?;

        let mut control_points = Vec::new();
        while self.at(TokenKind::OpenParen) {
            self.bump();
            let x = self.parse_expression()?;
            self.expect(TokenKind::Comma)?;
            let y = self.parse_expression()?;
            self.expect(TokenKind::CloseParen)?;
            control_points.push(BezierControlPoint {
                x,
                y,
                starting: control_points.is_empty(),
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        if control_points.len() < 2 {
            self.diagnostics
                .report_error("bezier 至少需要两个控制点", keyword.span);
        }

        let close = self.expect(TokenKind::CloseParen)?;
        Some(Expression::Bezier(BezierExpr {
            control_points,
            span: keyword.span.cover(close.span),
        }))
    }
}

fn binary_operator(kind: TokenKind) -> Option<BinaryOperator> {
    let operator = match kind {
        TokenKind::Star => BinaryOperator::Multiply,
        TokenKind::Slash => BinaryOperator::Divide,
        TokenKind::Percent => BinaryOperator::Remainder,
        TokenKind::Plus => BinaryOperator::Add,
        TokenKind::Minus => BinaryOperator::Subtract,
        TokenKind::Less => BinaryOperator::Less,
        TokenKind::LessEquals => BinaryOperator::LessOrEqual,
        TokenKind::Greater => BinaryOperator::Greater,
        TokenKind::GreaterEquals => BinaryOperator::GreaterOrEqual,
        TokenKind::EqualsEquals => BinaryOperator::Equals,
        TokenKind::BangEquals => BinaryOperator::NotEquals,
        TokenKind::AmpAmp => BinaryOperator::And,
        TokenKind::PipePipe => BinaryOperator::Or,
        _ => return None,
    };
    Some(operator)
}

fn assignment_operator(kind: TokenKind) -> Option<AssignmentOperator> {
    let operator = match kind {
        TokenKind::Equals => AssignmentOperator::Assign,
        TokenKind::PlusEquals => AssignmentOperator::AddAssign,
        TokenKind::MinusEquals => AssignmentOperator::SubtractAssign,
        TokenKind::StarEquals => AssignmentOperator::MultiplyAssign,
        TokenKind::SlashEquals => AssignmentOperator::DivideAssign,
        _ => return None,
    };
    Some(operator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::ast::NodeRef;

    fn parse_text(text: &str) -> (SourceFile, DiagnosticBag) {
        parse(&SourceText::new(text))
    }

    fn single_function_body(file: &SourceFile) -> &BlockStmt {
        match &file.declarations[0] {
            Declaration::Function(decl) => &decl.body,
            other => panic!("期望函数声明，实际是 {:?}", other),
        }
    }

    #[test]
    fn test_parse_single_function() {
        let (file, diagnostics) = parse_text("function main() { x = 1 + 2 * 3; }");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(file.declarations.len(), 1);

        let body = single_function_body(&file);
        assert_eq!(body.statements.len(), 1);

        // 标准优先级：RHS 是 1 + (2 * 3)
        let Statement::Expression(stmt) = &body.statements[0] else {
            panic!("期望表达式语句");
        };
        let Expression::Assignment(assign) = &stmt.expression else {
            panic!("期望赋值表达式");
        };
        assert_eq!(assign.target.name, "x");

        let Expression::Binary(add) = assign.value.as_ref() else {
            panic!("期望二元表达式");
        };
        assert_eq!(add.operator, BinaryOperator::Add);
        let Expression::Binary(mul) = add.right.as_ref() else {
            panic!("期望乘法在右侧");
        };
        assert_eq!(mul.operator, BinaryOperator::Multiply);
    }

    #[test]
    fn test_root_span_covers_whole_source() {
        let text = "function main() { return; }  ";
        let source = SourceText::new(text);
        let (file, _) = parse(&source);
        assert_eq!(file.span, source.full_span());
    }

    /// 递归校验每个子节点范围都包含在父节点范围内
    fn assert_span_containment(node: NodeRef<'_>) {
        let parent_span = node.span();
        for index in 0..node.child_count() {
            let child = node.child_at(index).unwrap();
            assert!(
                parent_span.contains_range(child.span()),
                "子节点范围 {:?} 超出父节点 {:?}",
                child.span(),
                parent_span
            );
            assert_span_containment(child);
        }
    }

    #[test]
    fn test_span_containment() {
        let text = r#"
function demo($count) {
    if ($count > 3) {
        $count = $count - 1;
    } else {
        Fade("bg", 300, 0, true);
    }
    while ($count < 10) { $count += 1; }
}
chapter main {
    dialogue box00 text00 { "你好<halt/>" }
    select {
        case "继续" { Wait(100); }
        case "离开" { return; }
    }
}
"#;
        let source = SourceText::new(text);
        let (file, diagnostics) = parse(&source);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert!(file.span.contains_range(file.declarations[0].span()));
        for index in 0..file.child_count() {
            assert_span_containment(file.child_at(index).unwrap());
        }
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let (file, diagnostics) = parse_text("function f() { $a = $b = 1; }");
        assert!(diagnostics.is_empty());

        let body = single_function_body(&file);
        let Statement::Expression(stmt) = &body.statements[0] else {
            panic!();
        };
        let Expression::Assignment(outer) = &stmt.expression else {
            panic!("期望赋值表达式");
        };
        assert_eq!(outer.target.name, "a");
        assert!(matches!(outer.value.as_ref(), Expression::Assignment(_)));
    }

    #[test]
    fn test_call_records_arguments_without_arity_check() {
        let (file, diagnostics) = parse_text(r#"function f() { Move("鸟*", 500, @40, 0); }"#);
        assert!(diagnostics.is_empty());

        let body = single_function_body(&file);
        let Statement::Expression(stmt) = &body.statements[0] else {
            panic!();
        };
        let Expression::FunctionCall(call) = &stmt.expression else {
            panic!("期望调用表达式");
        };
        assert_eq!(call.callee, "Move");
        assert_eq!(call.arguments.len(), 4);
        assert!(matches!(
            &call.arguments[2],
            Expression::Literal(LiteralExpr {
                value: ConstantValue::Delta(d),
                ..
            }) if *d == 40.0
        ));
    }

    #[test]
    fn test_bezier_control_points() {
        let (file, diagnostics) =
            parse_text("function f() { Move(\"a\", 500, 0, 0, bezier((0, 0), (50, @30), (100, 0))); }");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);

        let body = single_function_body(&file);
        let Statement::Expression(stmt) = &body.statements[0] else {
            panic!();
        };
        let Expression::FunctionCall(call) = &stmt.expression else {
            panic!();
        };
        let Expression::Bezier(bezier) = &call.arguments[4] else {
            panic!("期望贝塞尔表达式");
        };
        assert_eq!(bezier.control_points.len(), 3);
        assert!(bezier.control_points[0].starting);
        assert!(!bezier.control_points[1].starting);
        assert!(!bezier.control_points[2].starting);
    }

    #[test]
    fn test_error_recovery_reports_all_errors() {
        // 两处错误：缺少分号（在 if 处发现）、非法表达式起始
        let text = r#"
function f() {
    $a = 1
    if ($b) { $c = ; }
    $d = 3;
}
function g() { return; }
"#;
        let (file, diagnostics) = parse_text(text);
        assert!(diagnostics.error_count() >= 2, "{:?}", diagnostics);
        // 恢复后仍然解析出两个声明
        assert_eq!(file.declarations.len(), 2);
        assert_eq!(file.declarations[1].name(), "g");
    }

    #[test]
    fn test_unreachable_branch_errors_do_not_block_other_declarations() {
        let text = r#"
function broken() { $a = ; }
function fine() { $b = 1; }
"#;
        let (file, diagnostics) = parse_text(text);
        assert!(diagnostics.has_errors());
        assert_eq!(file.declarations.len(), 2);
        // 第二个函数完好
        let Declaration::Function(decl) = &file.declarations[1] else {
            panic!();
        };
        assert_eq!(decl.body.statements.len(), 1);
    }

    #[test]
    fn test_dialogue_block_pages() {
        let text = r#"
chapter main {
    dialogue box00 text001 {
        "第一页<br/>继续"
        "<voice name=\"红\" src=\"v001\"/>第二页<halt/>"
    }
}
"#;
        let (file, diagnostics) = parse_text(text);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);

        let Declaration::Chapter(chapter) = &file.declarations[0] else {
            panic!();
        };
        let Statement::Dialogue(dialogue) = &chapter.body.statements[0] else {
            panic!("期望对话块");
        };
        assert_eq!(dialogue.box_name, "box00");
        assert_eq!(dialogue.block_name, "text001");
        assert_eq!(dialogue.pages.len(), 2);
        assert!(dialogue.pages[0].pxml.contains("<br/>"));
    }

    #[test]
    fn test_select_cases() {
        let text = r#"
scene choice {
    select {
        case "进入" { $entered = true; }
        case "返回" { return; }
    }
}
"#;
        let (file, diagnostics) = parse_text(text);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);

        let Declaration::Scene(scene) = &file.declarations[0] else {
            panic!();
        };
        let Statement::Select(select) = &scene.body.statements[0] else {
            panic!();
        };
        assert_eq!(select.cases.len(), 2);
        assert_eq!(select.cases[0].label, "进入");
    }

    #[test]
    fn test_empty_select_is_an_error() {
        let (_, diagnostics) = parse_text("scene s { select { } }");
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn test_invalid_assignment_target() {
        let (_, diagnostics) = parse_text("function f() { 1 = 2; }");
        assert!(diagnostics.has_errors());
        assert!(
            diagnostics
                .iter()
                .any(|d| d.message.contains("赋值目标"))
        );
    }

    #[test]
    fn test_unary_binds_tighter_than_binary() {
        let (file, diagnostics) = parse_text("function f() { $a = -1 + 2; }");
        assert!(diagnostics.is_empty());

        let body = single_function_body(&file);
        let Statement::Expression(stmt) = &body.statements[0] else {
            panic!();
        };
        let Expression::Assignment(assign) = &stmt.expression else {
            panic!();
        };
        // (-1) + 2 而不是 -(1 + 2)
        let Expression::Binary(add) = assign.value.as_ref() else {
            panic!();
        };
        assert!(matches!(add.left.as_ref(), Expression::Unary(_)));
    }

    #[test]
    fn test_logical_operator_precedence() {
        let (file, diagnostics) = parse_text("function f() { $r = $a == 1 || $b == 2 && $c == 3; }");
        assert!(diagnostics.is_empty());

        let body = single_function_body(&file);
        let Statement::Expression(stmt) = &body.statements[0] else {
            panic!();
        };
        let Expression::Assignment(assign) = &stmt.expression else {
            panic!();
        };
        // || 最低：($a == 1) || (($b == 2) && ($c == 3))
        let Expression::Binary(or) = assign.value.as_ref() else {
            panic!();
        };
        assert_eq!(or.operator, BinaryOperator::Or);
        let Expression::Binary(and) = or.right.as_ref() else {
            panic!();
        };
        assert_eq!(and.operator, BinaryOperator::And);
    }
}
