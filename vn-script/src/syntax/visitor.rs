//! # 访问器模块
//!
//! 语法树的双派发遍历。
//!
//! ## 设计说明
//!
//! 节点类别封闭，`accept` 用一次穷尽匹配把具体节点派发给
//! 访问器的对应方法，新的遍历行为只需实现一个访问器，
//! 不必改动节点类型。提供两种调用形态：
//!
//! - [`SyntaxVisitor`]：无返回值遍历（副作用式，如打印、校验），
//!   每个方法默认递归子节点，按需覆写
//! - [`ExpressionVisitor`]：带返回值的表达式遍历（计算式，
//!   如常量折叠、求值），方法必须全部实现

use crate::syntax::ast::{
    AssignmentExpr, BezierExpr, BinaryExpr, BlockStmt, BreakStmt, ChapterDecl, Declaration,
    DialogueStmt, Expression, ExpressionStmt, FunctionCallExpr, FunctionDecl, IfStmt, LiteralExpr,
    NameExpr, ReturnStmt, SceneDecl, SelectStmt, SourceFile, Statement, UnaryExpr, WhileStmt,
};

impl Expression {
    /// 双派发：把具体表达式节点送入访问器
    pub fn accept<V: SyntaxVisitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            Self::Literal(e) => visitor.visit_literal(e),
            Self::Name(e) => visitor.visit_name(e),
            Self::Unary(e) => visitor.visit_unary(e),
            Self::Binary(e) => visitor.visit_binary(e),
            Self::Assignment(e) => visitor.visit_assignment(e),
            Self::FunctionCall(e) => visitor.visit_function_call(e),
            Self::Bezier(e) => visitor.visit_bezier(e),
        }
    }

    /// 双派发（带返回值形态）
    pub fn accept_with<R, V: ExpressionVisitor<R> + ?Sized>(&self, visitor: &mut V) -> R {
        match self {
            Self::Literal(e) => visitor.visit_literal(e),
            Self::Name(e) => visitor.visit_name(e),
            Self::Unary(e) => visitor.visit_unary(e),
            Self::Binary(e) => visitor.visit_binary(e),
            Self::Assignment(e) => visitor.visit_assignment(e),
            Self::FunctionCall(e) => visitor.visit_function_call(e),
            Self::Bezier(e) => visitor.visit_bezier(e),
        }
    }
}

impl Statement {
    /// 双派发：把具体语句节点送入访问器
    pub fn accept<V: SyntaxVisitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            Self::Block(s) => visitor.visit_block(s),
            Self::Expression(s) => visitor.visit_expression_statement(s),
            Self::If(s) => visitor.visit_if(s),
            Self::While(s) => visitor.visit_while(s),
            Self::Return(s) => visitor.visit_return(s),
            Self::Break(s) => visitor.visit_break(s),
            Self::Select(s) => visitor.visit_select(s),
            Self::Dialogue(s) => visitor.visit_dialogue(s),
        }
    }
}

impl Declaration {
    /// 双派发：把具体声明节点送入访问器
    pub fn accept<V: SyntaxVisitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            Self::Function(d) => visitor.visit_function(d),
            Self::Chapter(d) => visitor.visit_chapter(d),
            Self::Scene(d) => visitor.visit_scene(d),
        }
    }
}

/// 无返回值语法访问器
///
/// 默认实现递归遍历子节点。
pub trait SyntaxVisitor {
    fn visit_source_file(&mut self, file: &SourceFile) {
        for declaration in &file.declarations {
            declaration.accept(self);
        }
    }

    // ── 声明 ──

    fn visit_function(&mut self, decl: &FunctionDecl) {
        self.visit_block(&decl.body);
    }

    fn visit_chapter(&mut self, decl: &ChapterDecl) {
        self.visit_block(&decl.body);
    }

    fn visit_scene(&mut self, decl: &SceneDecl) {
        self.visit_block(&decl.body);
    }

    // ── 语句 ──

    fn visit_block(&mut self, stmt: &BlockStmt) {
        for statement in &stmt.statements {
            statement.accept(self);
        }
    }

    fn visit_expression_statement(&mut self, stmt: &ExpressionStmt) {
        stmt.expression.accept(self);
    }

    fn visit_if(&mut self, stmt: &IfStmt) {
        stmt.condition.accept(self);
        stmt.then_branch.accept(self);
        if let Some(else_branch) = &stmt.else_branch {
            else_branch.accept(self);
        }
    }

    fn visit_while(&mut self, stmt: &WhileStmt) {
        stmt.condition.accept(self);
        stmt.body.accept(self);
    }

    fn visit_return(&mut self, stmt: &ReturnStmt) {
        let _ = stmt;
    }

    fn visit_break(&mut self, stmt: &BreakStmt) {
        let _ = stmt;
    }

    fn visit_select(&mut self, stmt: &SelectStmt) {
        for case in &stmt.cases {
            self.visit_block(&case.body);
        }
    }

    fn visit_dialogue(&mut self, stmt: &DialogueStmt) {
        let _ = stmt;
    }

    // ── 表达式 ──

    fn visit_literal(&mut self, expr: &LiteralExpr) {
        let _ = expr;
    }

    fn visit_name(&mut self, expr: &NameExpr) {
        let _ = expr;
    }

    fn visit_unary(&mut self, expr: &UnaryExpr) {
        expr.operand.accept(self);
    }

    fn visit_binary(&mut self, expr: &BinaryExpr) {
        expr.left.accept(self);
        expr.right.accept(self);
    }

    fn visit_assignment(&mut self, expr: &AssignmentExpr) {
        expr.value.accept(self);
    }

    fn visit_function_call(&mut self, expr: &FunctionCallExpr) {
        for argument in &expr.arguments {
            argument.accept(self);
        }
    }

    fn visit_bezier(&mut self, expr: &BezierExpr) {
        for point in &expr.control_points {
            point.x.accept(self);
            point.y.accept(self);
        }
    }
}

/// 带返回值的表达式访问器
///
/// 用于计算式遍历（求值、常量折叠）。没有默认实现：
/// 返回类型由实现者决定，必须穷尽所有表达式类别。
pub trait ExpressionVisitor<R> {
    fn visit_literal(&mut self, expr: &LiteralExpr) -> R;
    fn visit_name(&mut self, expr: &NameExpr) -> R;
    fn visit_unary(&mut self, expr: &UnaryExpr) -> R;
    fn visit_binary(&mut self, expr: &BinaryExpr) -> R;
    fn visit_assignment(&mut self, expr: &AssignmentExpr) -> R;
    fn visit_function_call(&mut self, expr: &FunctionCallExpr) -> R;
    fn visit_bezier(&mut self, expr: &BezierExpr) -> R;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::ast::{BinaryOperator, UnaryOperator};
    use crate::value::ConstantValue;
    use text_size::{TextRange, TextSize};

    fn span0() -> TextRange {
        TextRange::empty(TextSize::new(0))
    }

    fn int(value: i64) -> Expression {
        Expression::Literal(LiteralExpr {
            value: ConstantValue::Integer(value),
            span: span0(),
        })
    }

    fn binary(left: Expression, operator: BinaryOperator, right: Expression) -> Expression {
        Expression::Binary(BinaryExpr {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            span: span0(),
        })
    }

    /// 统计名称引用的副作用式访问器
    #[derive(Default)]
    struct NameCounter {
        count: usize,
    }

    impl SyntaxVisitor for NameCounter {
        fn visit_name(&mut self, _expr: &NameExpr) {
            self.count += 1;
        }
    }

    #[test]
    fn test_void_visitor_walks_children_by_default() {
        use crate::syntax::token::Sigil;

        let expr = binary(
            Expression::Name(NameExpr {
                name: "a".to_string(),
                sigil: Sigil::Dollar,
                span: span0(),
            }),
            BinaryOperator::Add,
            binary(
                Expression::Name(NameExpr {
                    name: "b".to_string(),
                    sigil: Sigil::None,
                    span: span0(),
                }),
                BinaryOperator::Multiply,
                int(2),
            ),
        );

        let mut counter = NameCounter::default();
        expr.accept(&mut counter);
        assert_eq!(counter.count, 2);
    }

    /// 纯常量折叠访问器（带返回值形态的示例实现）
    struct ConstantFolder;

    impl ExpressionVisitor<ConstantValue> for ConstantFolder {
        fn visit_literal(&mut self, expr: &LiteralExpr) -> ConstantValue {
            expr.value.clone()
        }

        fn visit_name(&mut self, _expr: &NameExpr) -> ConstantValue {
            ConstantValue::Null
        }

        fn visit_unary(&mut self, expr: &UnaryExpr) -> ConstantValue {
            let operand = expr.operand.accept_with(self);
            match expr.operator {
                UnaryOperator::Negate => operand.negate(),
                UnaryOperator::Not => operand.logical_not(),
            }
        }

        fn visit_binary(&mut self, expr: &BinaryExpr) -> ConstantValue {
            let left = expr.left.accept_with(self);
            let right = expr.right.accept_with(self);
            match expr.operator {
                BinaryOperator::Add => left.add(&right),
                BinaryOperator::Subtract => left.subtract(&right),
                BinaryOperator::Multiply => left.multiply(&right),
                BinaryOperator::Divide => left.divide(&right),
                _ => ConstantValue::Null,
            }
        }

        fn visit_assignment(&mut self, expr: &AssignmentExpr) -> ConstantValue {
            expr.value.accept_with(self)
        }

        fn visit_function_call(&mut self, _expr: &FunctionCallExpr) -> ConstantValue {
            ConstantValue::Null
        }

        fn visit_bezier(&mut self, _expr: &BezierExpr) -> ConstantValue {
            ConstantValue::Null
        }
    }

    #[test]
    fn test_value_visitor_folds_constants() {
        // 1 + 2 * 3
        let expr = binary(
            int(1),
            BinaryOperator::Add,
            binary(int(2), BinaryOperator::Multiply, int(3)),
        );

        let folded = expr.accept_with(&mut ConstantFolder);
        assert_eq!(folded, ConstantValue::Integer(7));
    }
}
