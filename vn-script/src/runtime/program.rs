//! # 程序降级模块
//!
//! 把声明体降级为带显式跳转目标的线性指令表。
//!
//! ## 设计说明
//!
//! - 控制流（if/while/break/select）展开为 `Jump`/`Branch` 指令，
//!   执行器只需要一个指令指针，挂起/恢复天然落在指令边界
//! - 这**不是**持久化字节码：每次加载都从源文本重建语法树再降级，
//!   不落盘任何二进制格式
//! - 降级在编译门之后才可用：诊断袋里有错误的语法树拒绝降级

use std::collections::HashMap;

use crate::diagnostic::DiagnosticBag;
use crate::error::CompileError;
use crate::syntax::ast::{
    BlockStmt, Declaration, Expression, SourceFile, Statement,
};
use crate::syntax::parse;
use crate::text::SourceText;

/// 声明类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Function,
    Chapter,
    Scene,
}

/// 降级后的指令
#[derive(Debug, Clone)]
pub(crate) enum Op {
    /// 求值表达式语句（赋值、内建调用、用户函数调用）
    Eval(Expression),
    /// 无条件跳转
    Jump(usize),
    /// 条件为假时跳转
    Branch { condition: Expression, target: usize },
    /// 弹出当前调用栈帧
    Return,
    /// 呈现一页对话并等待用户输入
    Dialogue {
        box_name: String,
        block_name: String,
        pxml: String,
    },
    /// 呈现选择分支并挂起，恢复时跳到选中的分支
    Select { arms: Vec<SelectArm> },
}

/// 选择分支的一个入口
#[derive(Debug, Clone)]
pub(crate) struct SelectArm {
    pub label: String,
    pub target: usize,
}

/// 降级后的声明
#[derive(Debug, Clone)]
pub(crate) struct LoweredDeclaration {
    pub name: String,
    pub kind: DeclarationKind,
    /// 形参键（带前缀符号的完整名，按声明顺序）
    pub parameters: Vec<String>,
    pub ops: Vec<Op>,
}

/// 可执行程序
///
/// 一次编译的全部降级声明，按名字索引。VM 启动后不再改变。
#[derive(Debug, Clone)]
pub struct Program {
    declarations: Vec<LoweredDeclaration>,
    index: HashMap<String, usize>,
}

impl Program {
    /// 从语法树编译
    ///
    /// 降级期的新诊断（循环外 break、重复定义）追加进 `diagnostics`；
    /// 结束后袋里有任何错误则整体拒绝。
    pub fn compile(
        file: &SourceFile,
        diagnostics: &mut DiagnosticBag,
    ) -> Result<Program, CompileError> {
        let mut declarations = Vec::new();
        let mut index = HashMap::new();

        for declaration in &file.declarations {
            let lowered = lower_declaration(declaration, diagnostics);
            let slot = declarations.len();
            if index.insert(lowered.name.clone(), slot).is_some() {
                diagnostics.report_warn(
                    format!("重复定义 '{}'，后者生效", lowered.name),
                    declaration.span(),
                );
            }
            declarations.push(lowered);
        }

        if diagnostics.has_errors() {
            return Err(CompileError::SyntaxErrors {
                error_count: diagnostics.error_count(),
                diagnostics: diagnostics.clone(),
            });
        }

        Ok(Program {
            declarations,
            index,
        })
    }

    /// 便捷入口：解析源文本并编译
    ///
    /// 成功时返回程序和（只含警告的）诊断袋。
    pub fn from_source(text: &str) -> Result<(Program, DiagnosticBag), CompileError> {
        let source = SourceText::new(text);
        let (file, mut diagnostics) = parse(&source);
        let program = Self::compile(&file, &mut diagnostics)?;
        Ok((program, diagnostics))
    }

    /// 按名字查找声明索引
    pub fn entry_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// 声明数量
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// 是否没有任何声明
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// 全部声明名
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.declarations.iter().map(|d| d.name.as_str())
    }

    pub(crate) fn declaration(&self, index: usize) -> &LoweredDeclaration {
        &self.declarations[index]
    }
}

fn lower_declaration(
    declaration: &Declaration,
    diagnostics: &mut DiagnosticBag,
) -> LoweredDeclaration {
    let (kind, parameters) = match declaration {
        Declaration::Function(decl) => {
            let parameters = decl
                .parameters
                .iter()
                .map(|p| format!("{}{}", p.sigil.as_str(), p.name))
                .collect();
            (DeclarationKind::Function, parameters)
        }
        Declaration::Chapter(_) => (DeclarationKind::Chapter, Vec::new()),
        Declaration::Scene(_) => (DeclarationKind::Scene, Vec::new()),
    };

    let mut lowerer = Lowerer {
        ops: Vec::new(),
        break_targets: Vec::new(),
        diagnostics,
    };
    lowerer.lower_block(declaration.body());

    LoweredDeclaration {
        name: declaration.name().to_string(),
        kind,
        parameters,
        ops: lowerer.ops,
    }
}

/// 声明体降级器
struct Lowerer<'a> {
    ops: Vec<Op>,
    /// 每层循环待修补的 break 跳转位置
    break_targets: Vec<Vec<usize>>,
    diagnostics: &'a mut DiagnosticBag,
}

impl Lowerer<'_> {
    fn lower_block(&mut self, block: &BlockStmt) {
        for statement in &block.statements {
            self.lower_statement(statement);
        }
    }

    fn lower_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Block(block) => self.lower_block(block),

            Statement::Expression(stmt) => {
                self.ops.push(Op::Eval(stmt.expression.clone()));
            }

            Statement::If(stmt) => {
                let branch = self.emit_placeholder_branch(stmt.condition.clone());
                self.lower_statement(&stmt.then_branch);
                match &stmt.else_branch {
                    Some(else_branch) => {
                        let skip_else = self.emit_placeholder_jump();
                        self.patch(branch, self.ops.len());
                        self.lower_statement(else_branch);
                        self.patch(skip_else, self.ops.len());
                    }
                    None => {
                        self.patch(branch, self.ops.len());
                    }
                }
            }

            Statement::While(stmt) => {
                let loop_start = self.ops.len();
                let exit_branch = self.emit_placeholder_branch(stmt.condition.clone());
                self.break_targets.push(Vec::new());
                self.lower_statement(&stmt.body);
                self.ops.push(Op::Jump(loop_start));

                let end = self.ops.len();
                self.patch(exit_branch, end);
                // break_targets 在上面刚压入，这里必然能弹出
                if let Some(breaks) = self.break_targets.pop() {
                    for position in breaks {
                        self.patch(position, end);
                    }
                }
            }

            Statement::Return(_) => {
                self.ops.push(Op::Return);
            }

            Statement::Break(stmt) => match self.break_targets.last_mut() {
                Some(breaks) => {
                    let position = self.ops.len();
                    self.ops.push(Op::Jump(usize::MAX));
                    breaks.push(position);
                }
                None => {
                    self.diagnostics
                        .report_warn("break 出现在循环外，按无操作处理", stmt.span);
                }
            },

            Statement::Select(stmt) => {
                let select = self.ops.len();
                self.ops.push(Op::Select { arms: Vec::new() });

                let mut arms = Vec::new();
                let mut end_jumps = Vec::new();
                for case in &stmt.cases {
                    arms.push(SelectArm {
                        label: case.label.clone(),
                        target: self.ops.len(),
                    });
                    self.lower_block(&case.body);
                    end_jumps.push(self.emit_placeholder_jump());
                }

                let end = self.ops.len();
                for position in end_jumps {
                    self.patch(position, end);
                }
                self.ops[select] = Op::Select { arms };
            }

            Statement::Dialogue(stmt) => {
                for page in &stmt.pages {
                    self.ops.push(Op::Dialogue {
                        box_name: stmt.box_name.clone(),
                        block_name: stmt.block_name.clone(),
                        pxml: page.pxml.clone(),
                    });
                }
            }
        }
    }

    fn emit_placeholder_jump(&mut self) -> usize {
        let position = self.ops.len();
        self.ops.push(Op::Jump(usize::MAX));
        position
    }

    fn emit_placeholder_branch(&mut self, condition: Expression) -> usize {
        let position = self.ops.len();
        self.ops.push(Op::Branch {
            condition,
            target: usize::MAX,
        });
        position
    }

    fn patch(&mut self, position: usize, target: usize) {
        match &mut self.ops[position] {
            Op::Jump(t) => *t = target,
            Op::Branch { target: t, .. } => *t = target,
            // 占位指令只会是 Jump/Branch
            _ => unreachable!("修补了非跳转指令"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(text: &str) -> (Program, DiagnosticBag) {
        Program::from_source(text).expect("编译应当成功")
    }

    fn ops_of<'a>(program: &'a Program, name: &str) -> &'a [Op] {
        let index = program.entry_index(name).expect("声明存在");
        &program.declaration(index).ops
    }

    #[test]
    fn test_compile_gate_rejects_errors() {
        let result = Program::from_source("function broken() { $a = ; }");
        let Err(CompileError::SyntaxErrors { error_count, .. }) = result else {
            panic!("期望编译失败");
        };
        assert!(error_count >= 1);
    }

    #[test]
    fn test_warnings_do_not_block_compilation() {
        // 循环外 break 只是警告
        let (program, diagnostics) = compile("function f() { break; $a = 1; }");
        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.warn_count(), 1);
        assert_eq!(ops_of(&program, "f").len(), 1); // break 被降级为无操作
    }

    #[test]
    fn test_if_else_lowering() {
        let (program, _) = compile("function f() { if ($a) { $b = 1; } else { $b = 2; } $c = 3; }");
        let ops = ops_of(&program, "f");
        // Branch, Eval, Jump, Eval, Eval
        assert_eq!(ops.len(), 5);
        let Op::Branch { target, .. } = &ops[0] else {
            panic!("期望条件跳转");
        };
        assert_eq!(*target, 3); // 条件为假跳到 else 分支
        let Op::Jump(end) = &ops[2] else {
            panic!("期望跳过 else 的跳转");
        };
        assert_eq!(*end, 4);
    }

    #[test]
    fn test_while_with_break_lowering() {
        let (program, diagnostics) =
            compile("function f() { while ($a) { break; $b = 1; } $c = 2; }");
        assert!(diagnostics.is_empty());
        let ops = ops_of(&program, "f");
        // 0: Branch(退出→4)  1: Jump(break→4)  2: Eval  3: Jump(回0)  4: Eval
        assert_eq!(ops.len(), 5);
        let Op::Branch { target, .. } = &ops[0] else {
            panic!();
        };
        assert_eq!(*target, 4);
        let Op::Jump(break_target) = &ops[1] else {
            panic!();
        };
        assert_eq!(*break_target, 4);
        let Op::Jump(loop_back) = &ops[3] else {
            panic!();
        };
        assert_eq!(*loop_back, 0);
    }

    #[test]
    fn test_select_lowering() {
        let (program, _) = compile(
            r#"scene s { select { case "甲" { $a = 1; } case "乙" { $a = 2; } } $done = true; }"#,
        );
        let ops = ops_of(&program, "s");
        // 0: Select  1: Eval  2: Jump(5)  3: Eval  4: Jump(5)  5: Eval
        let Op::Select { arms } = &ops[0] else {
            panic!("期望 Select 指令");
        };
        assert_eq!(arms.len(), 2);
        assert_eq!(arms[0].label, "甲");
        assert_eq!(arms[0].target, 1);
        assert_eq!(arms[1].target, 3);
        let Op::Jump(end) = &ops[2] else {
            panic!();
        };
        assert_eq!(*end, 5);
    }

    #[test]
    fn test_dialogue_pages_become_ops() {
        let (program, _) =
            compile(r#"chapter c { dialogue box00 text00 { "一" "二" "三" } }"#);
        let ops = ops_of(&program, "c");
        assert_eq!(ops.len(), 3);
        assert!(ops.iter().all(|op| matches!(op, Op::Dialogue { .. })));
    }

    #[test]
    fn test_parameters_keep_sigils() {
        let (program, _) = compile("function f($a, b) { return; }");
        let index = program.entry_index("f").unwrap();
        let declaration = program.declaration(index);
        assert_eq!(declaration.parameters, vec!["$a", "b"]);
        assert_eq!(declaration.kind, DeclarationKind::Function);
    }

    #[test]
    fn test_duplicate_declaration_warns_and_last_wins() {
        let (program, diagnostics) =
            compile("function f() { $a = 1; } function f() { $a = 2; $b = 3; }");
        assert_eq!(diagnostics.warn_count(), 1);
        let index = program.entry_index("f").unwrap();
        assert_eq!(program.declaration(index).ops.len(), 2);
    }
}
