//! # AST 模块
//!
//! 定义脚本的不可变语法树。
//!
//! ## 设计说明
//!
//! - 树形结构：每个节点恰好有一个父节点，子节点被独占持有（`Box`/`Vec`），
//!   无环、无共享
//! - 每个节点携带 `TextRange`，且**完全包含**其所有后代的范围
//! - 节点类别是封闭的和类型；遍历通过 [`accept`](Expression::accept)
//!   双派发进入访问器（见 `visitor` 模块），另提供按位置索引的
//!   通用子节点槽（[`child_at`](Expression::child_at)）

use serde::{Deserialize, Serialize};
use text_size::TextRange;

use crate::syntax::token::Sigil;
use crate::value::ConstantValue;

// ============================================================================
// 表达式
// ============================================================================

/// 一元运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// 取负 `-`
    Negate,
    /// 逻辑非 `!`
    Not,
}

/// 二元运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Multiply,
    Divide,
    Remainder,
    Add,
    Subtract,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equals,
    NotEquals,
    And,
    Or,
}

impl BinaryOperator {
    /// 优先级（越大绑定越紧）
    ///
    /// 乘除 > 加减 > 关系 > 相等 > 逻辑与 > 逻辑或；赋值在
    /// 解析器中单独处理，最低且右结合。
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Multiply | Self::Divide | Self::Remainder => 60,
            Self::Add | Self::Subtract => 50,
            Self::Less | Self::LessOrEqual | Self::Greater | Self::GreaterOrEqual => 40,
            Self::Equals | Self::NotEquals => 30,
            Self::And => 20,
            Self::Or => 10,
        }
    }
}

/// 赋值运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentOperator {
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
}

/// 表达式节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// 字面量
    Literal(LiteralExpr),
    /// 名称引用
    Name(NameExpr),
    /// 一元运算
    Unary(UnaryExpr),
    /// 二元运算
    Binary(BinaryExpr),
    /// 赋值
    Assignment(AssignmentExpr),
    /// 函数调用
    FunctionCall(FunctionCallExpr),
    /// 贝塞尔曲线
    Bezier(BezierExpr),
}

/// 字面量表达式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralExpr {
    pub value: ConstantValue,
    pub span: TextRange,
}

/// 名称表达式
///
/// 前缀符号决定名称解析到哪个变量类别（见 `Sigil`）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameExpr {
    pub name: String,
    pub sigil: Sigil,
    pub span: TextRange,
}

/// 一元运算表达式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpr {
    pub operator: UnaryOperator,
    pub operand: Box<Expression>,
    pub span: TextRange,
}

/// 二元运算表达式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpr {
    pub left: Box<Expression>,
    pub operator: BinaryOperator,
    pub right: Box<Expression>,
    pub span: TextRange,
}

/// 赋值表达式（右结合，优先级最低）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentExpr {
    pub target: NameExpr,
    pub operator: AssignmentOperator,
    pub value: Box<Expression>,
    pub span: TextRange,
}

/// 函数调用表达式
///
/// 解析期只记录被调名和有序实参表；
/// 函数是用户定义还是内建、元数是否匹配，都在执行期解析。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallExpr {
    pub callee: String,
    pub callee_span: TextRange,
    pub arguments: Vec<Expression>,
    pub span: TextRange,
}

/// 贝塞尔曲线表达式
///
/// 有序控制点表，第一个是起点，其余是中间点。
/// 解析器不求值，曲线作为动画内建的实参被消费。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BezierExpr {
    pub control_points: Vec<BezierControlPoint>,
    pub span: TextRange,
}

/// 贝塞尔控制点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BezierControlPoint {
    pub x: Expression,
    pub y: Expression,
    /// 是否为起点
    pub starting: bool,
}

impl Expression {
    /// 节点的源文本范围
    pub fn span(&self) -> TextRange {
        match self {
            Self::Literal(e) => e.span,
            Self::Name(e) => e.span,
            Self::Unary(e) => e.span,
            Self::Binary(e) => e.span,
            Self::Assignment(e) => e.span,
            Self::FunctionCall(e) => e.span,
            Self::Bezier(e) => e.span,
        }
    }

    /// 子节点数量（按位置槽）
    pub fn child_count(&self) -> usize {
        match self {
            Self::Literal(_) | Self::Name(_) => 0,
            Self::Unary(_) => 1,
            Self::Binary(_) => 2,
            Self::Assignment(_) => 1,
            Self::FunctionCall(e) => e.arguments.len(),
            Self::Bezier(e) => e.control_points.len() * 2,
        }
    }

    /// 按位置索引访问子节点；越界返回 `None`
    ///
    /// 贝塞尔控制点的 x/y 依次平铺（点 i 的 x 在槽 2i、y 在槽 2i+1）。
    pub fn child_at(&self, index: usize) -> Option<NodeRef<'_>> {
        let expr: &Expression = match self {
            Self::Literal(_) | Self::Name(_) => return None,
            Self::Unary(e) => {
                if index == 0 {
                    &e.operand
                } else {
                    return None;
                }
            }
            Self::Binary(e) => match index {
                0 => &e.left,
                1 => &e.right,
                _ => return None,
            },
            Self::Assignment(e) => {
                if index == 0 {
                    &e.value
                } else {
                    return None;
                }
            }
            Self::FunctionCall(e) => e.arguments.get(index)?,
            Self::Bezier(e) => {
                let point = e.control_points.get(index / 2)?;
                if index % 2 == 0 { &point.x } else { &point.y }
            }
        };
        Some(NodeRef::Expression(expr))
    }
}

// ============================================================================
// 语句
// ============================================================================

/// 语句节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// 语句块
    Block(BlockStmt),
    /// 表达式语句
    Expression(ExpressionStmt),
    /// 条件分支
    If(IfStmt),
    /// 循环
    While(WhileStmt),
    /// 返回（本语言的函数无返回值）
    Return(ReturnStmt),
    /// 跳出循环
    Break(BreakStmt),
    /// 选择分支
    Select(SelectStmt),
    /// 对话块
    Dialogue(DialogueStmt),
}

/// 语句块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockStmt {
    pub statements: Vec<Statement>,
    pub span: TextRange,
}

/// 表达式语句
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionStmt {
    pub expression: Expression,
    pub span: TextRange,
}

/// 条件分支语句
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    pub condition: Expression,
    pub then_branch: Box<Statement>,
    pub else_branch: Option<Box<Statement>>,
    pub span: TextRange,
}

/// 循环语句
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStmt {
    pub condition: Expression,
    pub body: Box<Statement>,
    pub span: TextRange,
}

/// 返回语句
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStmt {
    pub span: TextRange,
}

/// 跳出循环语句
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakStmt {
    pub span: TextRange,
}

/// 选择分支语句
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectStmt {
    pub cases: Vec<SelectCase>,
    pub span: TextRange,
}

/// 选择分支的一个选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectCase {
    /// 呈现给用户的选项文本
    pub label: String,
    pub body: BlockStmt,
    pub span: TextRange,
}

/// 对话块语句
///
/// 每一页是一个 PXml 字符串，由对话内建逐页呈现。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueStmt {
    /// 对话框实体名
    pub box_name: String,
    /// 对话块标识（文本实体名）
    pub block_name: String,
    pub pages: Vec<DialoguePage>,
    pub span: TextRange,
}

/// 对话块中的一页
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialoguePage {
    /// PXml 标记文本
    pub pxml: String,
    pub span: TextRange,
}

impl Statement {
    /// 节点的源文本范围
    pub fn span(&self) -> TextRange {
        match self {
            Self::Block(s) => s.span,
            Self::Expression(s) => s.span,
            Self::If(s) => s.span,
            Self::While(s) => s.span,
            Self::Return(s) => s.span,
            Self::Break(s) => s.span,
            Self::Select(s) => s.span,
            Self::Dialogue(s) => s.span,
        }
    }

    /// 子节点数量（按位置槽）
    pub fn child_count(&self) -> usize {
        match self {
            Self::Block(s) => s.statements.len(),
            Self::Expression(_) => 1,
            Self::If(s) => {
                if s.else_branch.is_some() {
                    3
                } else {
                    2
                }
            }
            Self::While(_) => 2,
            Self::Return(_) | Self::Break(_) | Self::Dialogue(_) => 0,
            Self::Select(s) => s.cases.len(),
        }
    }

    /// 按位置索引访问子节点；越界返回 `None`
    pub fn child_at(&self, index: usize) -> Option<NodeRef<'_>> {
        match self {
            Self::Block(s) => s.statements.get(index).map(NodeRef::Statement),
            Self::Expression(s) => (index == 0).then_some(NodeRef::Expression(&s.expression)),
            Self::If(s) => match index {
                0 => Some(NodeRef::Expression(&s.condition)),
                1 => Some(NodeRef::Statement(&s.then_branch)),
                2 => s.else_branch.as_deref().map(NodeRef::Statement),
                _ => None,
            },
            Self::While(s) => match index {
                0 => Some(NodeRef::Expression(&s.condition)),
                1 => Some(NodeRef::Statement(&s.body)),
                _ => None,
            },
            Self::Return(_) | Self::Break(_) | Self::Dialogue(_) => None,
            Self::Select(s) => s.cases.get(index).map(|c| NodeRef::Block(&c.body)),
        }
    }
}

// ============================================================================
// 声明
// ============================================================================

/// 声明节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Declaration {
    /// 函数
    Function(FunctionDecl),
    /// 章节
    Chapter(ChapterDecl),
    /// 场景
    Scene(SceneDecl),
}

/// 函数形参
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub sigil: Sigil,
    pub span: TextRange,
}

/// 函数声明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub body: BlockStmt,
    pub span: TextRange,
}

/// 章节声明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterDecl {
    pub name: String,
    pub body: BlockStmt,
    pub span: TextRange,
}

/// 场景声明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDecl {
    pub name: String,
    pub body: BlockStmt,
    pub span: TextRange,
}

impl Declaration {
    /// 声明名
    pub fn name(&self) -> &str {
        match self {
            Self::Function(d) => &d.name,
            Self::Chapter(d) => &d.name,
            Self::Scene(d) => &d.name,
        }
    }

    /// 声明体
    pub fn body(&self) -> &BlockStmt {
        match self {
            Self::Function(d) => &d.body,
            Self::Chapter(d) => &d.body,
            Self::Scene(d) => &d.body,
        }
    }

    /// 节点的源文本范围
    pub fn span(&self) -> TextRange {
        match self {
            Self::Function(d) => d.span,
            Self::Chapter(d) => d.span,
            Self::Scene(d) => d.span,
        }
    }

    /// 子节点数量（声明体计 1 个槽）
    pub fn child_count(&self) -> usize {
        1
    }

    /// 按位置索引访问子节点；越界返回 `None`
    pub fn child_at(&self, index: usize) -> Option<NodeRef<'_>> {
        (index == 0).then_some(NodeRef::Block(self.body()))
    }
}

// ============================================================================
// 根节点与通用子节点引用
// ============================================================================

/// 源文件（语法树根）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub declarations: Vec<Declaration>,
    /// 覆盖整个源文本的范围
    pub span: TextRange,
}

impl SourceFile {
    /// 子节点数量
    pub fn child_count(&self) -> usize {
        self.declarations.len()
    }

    /// 按位置索引访问子节点
    pub fn child_at(&self, index: usize) -> Option<NodeRef<'_>> {
        self.declarations.get(index).map(NodeRef::Declaration)
    }

    /// 按名字查找声明
    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name() == name)
    }
}

/// 通用子节点引用
///
/// 供槽式遍历（范围校验、通用改写）使用；
/// 类型化访问仍然走各节点的具名字段。
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Expression(&'a Expression),
    Statement(&'a Statement),
    Block(&'a BlockStmt),
    Declaration(&'a Declaration),
}

impl NodeRef<'_> {
    /// 节点的源文本范围
    pub fn span(&self) -> TextRange {
        match self {
            Self::Expression(e) => e.span(),
            Self::Statement(s) => s.span(),
            Self::Block(b) => b.span,
            Self::Declaration(d) => d.span(),
        }
    }

    /// 子节点数量
    pub fn child_count(&self) -> usize {
        match self {
            Self::Expression(e) => e.child_count(),
            Self::Statement(s) => s.child_count(),
            Self::Block(b) => b.statements.len(),
            Self::Declaration(d) => d.child_count(),
        }
    }

    /// 按位置索引访问子节点
    pub fn child_at(&self, index: usize) -> Option<NodeRef<'_>> {
        match self {
            Self::Expression(e) => e.child_at(index),
            Self::Statement(s) => s.child_at(index),
            Self::Block(b) => b.statements.get(index).map(NodeRef::Statement),
            Self::Declaration(d) => d.child_at(index),
        }
    }
}
