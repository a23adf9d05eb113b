//! # 求值模块
//!
//! 表达式求值器，[`ExpressionVisitor`] 的带返回值实现。
//!
//! ## 设计原则
//!
//! - 求值**不可中途挂起**：等待请求、线程表操作作为 [`Effect`]
//!   记入上下文，由 VM 在指令边界统一应用
//! - **无操作策略**：未定义的变量/函数求值为 Null 并记录警告诊断，
//!   所属线程继续执行，不中止整场呈现
//! - 名称解析：形参（带前缀的完整键）优先；`$`/`#` 前缀落到
//!   VM 全局表；无前缀名只在局部槽里找

use std::collections::HashMap;
use std::time::Duration;

use crate::diagnostic::DiagnosticBag;
use crate::runtime::builtins::{self, BezierCurve, Builtin, CurvePoint, EngineHost};
use crate::runtime::entity::{EntityAction, EntityPath, EntityQuery};
use crate::runtime::program::Program;
use crate::runtime::thread::WaitCondition;
use crate::syntax::ast::{
    AssignmentExpr, AssignmentOperator, BezierExpr, BinaryExpr, BinaryOperator, Expression,
    FunctionCallExpr, LiteralExpr, NameExpr, UnaryExpr, UnaryOperator,
};
use crate::syntax::visitor::ExpressionVisitor;
use crate::value::ConstantValue;

/// 求值期间积累的延迟操作
///
/// 这些操作要改动线程表或挂起当前线程，必须等当前指令完成后
/// 由 VM 应用（挂起点只在指令边界）。
#[derive(Debug)]
pub(crate) enum Effect {
    /// 挂起当前线程
    Wait {
        condition: WaitCondition,
        deadline: Option<Duration>,
    },
    /// 调用用户定义函数（压栈新帧）
    CallFunction {
        index: usize,
        arguments: Vec<ConstantValue>,
    },
    /// 派生新脚本线程（入口在分发时已解析）
    SpawnThread { path: EntityPath, entry: usize },
    /// 对命中查询的线程实体执行动作
    ThreadRequest {
        query: EntityQuery,
        action: EntityAction,
    },
    /// 摘除命中查询的线程实体（锁定的跳过）
    RemoveThreads { query: EntityQuery },
}

/// 求值上下文
///
/// 对 VM 状态的分借视图，加上求值产生的效果队列。
pub(crate) struct EvalCtx<'a> {
    pub program: &'a Program,
    pub globals: &'a mut HashMap<String, ConstantValue>,
    pub locals: &'a mut HashMap<String, ConstantValue>,
    pub host: &'a mut dyn EngineHost,
    pub diagnostics: &'a mut DiagnosticBag,
    pub clock: Duration,
    pub effects: Vec<Effect>,
}

impl EvalCtx<'_> {
    /// 求值一个表达式
    pub fn evaluate(&mut self, expression: &Expression) -> ConstantValue {
        expression.accept_with(self)
    }

    /// 名称的存储键：前缀符号 + 名字
    fn key(name: &NameExpr) -> String {
        format!("{}{}", name.sigil.as_str(), name.name)
    }

    /// 读取名称；未定义时求值为 Null 并记录诊断
    fn lookup(&mut self, name: &NameExpr) -> ConstantValue {
        let key = Self::key(name);
        // 形参可以遮蔽同名全局变量
        if let Some(value) = self.locals.get(&key) {
            return value.clone();
        }
        if name.sigil != crate::syntax::token::Sigil::None {
            if let Some(value) = self.globals.get(&key) {
                return value.clone();
            }
        }
        self.diagnostics
            .report_warn(format!("未定义的变量 '{}'", key), name.span);
        ConstantValue::Null
    }

    /// 写入名称：已有局部槽优先，否则按前缀决定归属
    fn store(&mut self, target: &NameExpr, value: ConstantValue) {
        let key = Self::key(target);
        if self.locals.contains_key(&key) || target.sigil == crate::syntax::token::Sigil::None {
            self.locals.insert(key, value);
        } else {
            self.globals.insert(key, value);
        }
    }

    /// 把贝塞尔表达式求值为曲线
    fn lower_curve(&mut self, expr: &BezierExpr) -> BezierCurve {
        let points = expr
            .control_points
            .iter()
            .map(|point| {
                let x = self.evaluate(&point.x).as_number() as f32;
                let y = self.evaluate(&point.y).as_number() as f32;
                CurvePoint {
                    x,
                    y,
                    starting: point.starting,
                }
            })
            .collect();
        BezierCurve { points }
    }
}

impl ExpressionVisitor<ConstantValue> for EvalCtx<'_> {
    fn visit_literal(&mut self, expr: &LiteralExpr) -> ConstantValue {
        expr.value.clone()
    }

    fn visit_name(&mut self, expr: &NameExpr) -> ConstantValue {
        self.lookup(expr)
    }

    fn visit_unary(&mut self, expr: &UnaryExpr) -> ConstantValue {
        let operand = self.evaluate(&expr.operand);
        match expr.operator {
            UnaryOperator::Negate => operand.negate(),
            UnaryOperator::Not => operand.logical_not(),
        }
    }

    fn visit_binary(&mut self, expr: &BinaryExpr) -> ConstantValue {
        // 逻辑运算短路求值
        match expr.operator {
            BinaryOperator::And => {
                let left = self.evaluate(&expr.left);
                if !left.as_bool() {
                    return ConstantValue::Bool(false);
                }
                return ConstantValue::Bool(self.evaluate(&expr.right).as_bool());
            }
            BinaryOperator::Or => {
                let left = self.evaluate(&expr.left);
                if left.as_bool() {
                    return ConstantValue::Bool(true);
                }
                return ConstantValue::Bool(self.evaluate(&expr.right).as_bool());
            }
            _ => {}
        }

        let left = self.evaluate(&expr.left);
        let right = self.evaluate(&expr.right);
        match expr.operator {
            BinaryOperator::Multiply => left.multiply(&right),
            BinaryOperator::Divide => left.divide(&right),
            BinaryOperator::Remainder => left.remainder(&right),
            BinaryOperator::Add => left.add(&right),
            BinaryOperator::Subtract => left.subtract(&right),
            BinaryOperator::Less => compare(&left, &right, |o| o.is_lt()),
            BinaryOperator::LessOrEqual => compare(&left, &right, |o| o.is_le()),
            BinaryOperator::Greater => compare(&left, &right, |o| o.is_gt()),
            BinaryOperator::GreaterOrEqual => compare(&left, &right, |o| o.is_ge()),
            BinaryOperator::Equals => ConstantValue::Bool(left.equals(&right)),
            BinaryOperator::NotEquals => ConstantValue::Bool(!left.equals(&right)),
            // And/Or 已在上面短路处理
            BinaryOperator::And | BinaryOperator::Or => unreachable!(),
        }
    }

    fn visit_assignment(&mut self, expr: &AssignmentExpr) -> ConstantValue {
        let value = match expr.operator {
            AssignmentOperator::Assign => self.evaluate(&expr.value),
            compound => {
                let current = self.lookup(&expr.target);
                let operand = self.evaluate(&expr.value);
                match compound {
                    AssignmentOperator::AddAssign => current.add(&operand),
                    AssignmentOperator::SubtractAssign => current.subtract(&operand),
                    AssignmentOperator::MultiplyAssign => current.multiply(&operand),
                    AssignmentOperator::DivideAssign => current.divide(&operand),
                    AssignmentOperator::Assign => unreachable!(),
                }
            }
        };
        self.store(&expr.target, value.clone());
        value
    }

    fn visit_function_call(&mut self, expr: &FunctionCallExpr) -> ConstantValue {
        // 贝塞尔曲线实参从语法上取出，其余求值为常量
        let mut args = Vec::with_capacity(expr.arguments.len());
        let mut curves = Vec::with_capacity(expr.arguments.len());
        for argument in &expr.arguments {
            if let Expression::Bezier(bezier) = argument {
                curves.push(Some(self.lower_curve(bezier)));
                args.push(ConstantValue::Null);
            } else {
                curves.push(None);
                args.push(self.evaluate(argument));
            }
        }

        // 用户定义的函数优先于内建
        if let Some(index) = self.program.entry_index(&expr.callee) {
            // 用户函数无返回值：压栈请求记入效果队列，调用在指令边界生效
            self.effects.push(Effect::CallFunction {
                index,
                arguments: args,
            });
            return ConstantValue::Null;
        }

        if let Some(builtin) = Builtin::resolve(&expr.callee) {
            return builtins::dispatch(builtin, expr, &args, &curves, self);
        }

        // 未定义的函数：无操作 + 可观测性诊断
        self.diagnostics.report_warn(
            format!("未定义的函数 '{}'", expr.callee),
            expr.callee_span,
        );
        ConstantValue::Null
    }

    fn visit_bezier(&mut self, expr: &BezierExpr) -> ConstantValue {
        self.diagnostics.report_warn(
            "贝塞尔曲线只能作为动画内建的实参使用",
            expr.span,
        );
        ConstantValue::Null
    }
}

fn compare(
    left: &ConstantValue,
    right: &ConstantValue,
    check: fn(std::cmp::Ordering) -> bool,
) -> ConstantValue {
    match left.compare(right) {
        Some(ordering) => ConstantValue::Bool(check(ordering)),
        None => ConstantValue::Bool(false),
    }
}
