//! # 常量值模块
//!
//! 定义脚本运行时的值类型和类型间转换。
//!
//! ## 设计原则
//!
//! - 转换和算术是**全函数**：任意一对操作数都有定义好的结果，永不 panic
//! - 不支持的组合产生 [`ConstantValue::Null`]，而不是错误
//! - 值语义：到处按值克隆，没有引用计数堆

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 脚本常量值
///
/// `Delta` 是相对数值（脚本里写作 `@100`），在坐标解析时
/// 相对当前值定位；参与普通算术时按其数值处理。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    /// 整数
    Integer(i64),
    /// 浮点数
    Float(f64),
    /// 字符串
    String(String),
    /// 布尔值
    Bool(bool),
    /// 相对数值（`@` 前缀）
    Delta(f64),
    /// 空值
    Null,
}

impl ConstantValue {
    /// 创建字符串值
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// 值类型名（用于诊断消息）
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "整数",
            Self::Float(_) => "浮点数",
            Self::String(_) => "字符串",
            Self::Bool(_) => "布尔值",
            Self::Delta(_) => "相对数值",
            Self::Null => "空值",
        }
    }

    /// 是否为空值
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// 数值视图
    ///
    /// 数字字符串按十进制解析，解析失败取 0.0；布尔值取 1.0 / 0.0。
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Integer(n) => *n as f64,
            Self::Float(f) | Self::Delta(f) => *f,
            Self::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Self::String(s) => s.trim().parse().unwrap_or(0.0),
            Self::Null => 0.0,
        }
    }

    /// 整数视图（数值视图截断）
    pub fn as_integer(&self) -> i64 {
        self.as_number() as i64
    }

    /// 布尔视图
    ///
    /// 非零数字为真；非空字符串为真；空值为假。
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Integer(n) => *n != 0,
            Self::Float(f) | Self::Delta(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Null => false,
        }
    }

    /// 字符串视图
    pub fn convert_to_string(&self) -> String {
        self.to_string()
    }

    /// 加法：任一操作数是字符串时退化为拼接
    pub fn add(&self, other: &ConstantValue) -> ConstantValue {
        match (self, other) {
            (Self::String(_), _) | (_, Self::String(_)) => {
                Self::String(format!("{}{}", self, other))
            }
            _ => self.numeric_op(other, |a, b| a + b, i64::wrapping_add),
        }
    }

    /// 减法
    pub fn subtract(&self, other: &ConstantValue) -> ConstantValue {
        self.numeric_op(other, |a, b| a - b, i64::wrapping_sub)
    }

    /// 乘法
    pub fn multiply(&self, other: &ConstantValue) -> ConstantValue {
        self.numeric_op(other, |a, b| a * b, i64::wrapping_mul)
    }

    /// 除法：除数为零时结果为 Null
    pub fn divide(&self, other: &ConstantValue) -> ConstantValue {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => {
                if *b == 0 {
                    Self::Null
                } else {
                    Self::Integer(a.wrapping_div(*b))
                }
            }
            _ => {
                let divisor = other.as_number();
                if divisor == 0.0 {
                    Self::Null
                } else {
                    Self::Float(self.as_number() / divisor)
                }
            }
        }
    }

    /// 取余：除数为零时结果为 Null
    pub fn remainder(&self, other: &ConstantValue) -> ConstantValue {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => {
                if *b == 0 {
                    Self::Null
                } else {
                    Self::Integer(a.wrapping_rem(*b))
                }
            }
            _ => {
                let divisor = other.as_number();
                if divisor == 0.0 {
                    Self::Null
                } else {
                    Self::Float(self.as_number() % divisor)
                }
            }
        }
    }

    /// 数值二元运算：两个整数保持整数（回绕避免溢出），否则提升为浮点
    fn numeric_op(
        &self,
        other: &ConstantValue,
        float_op: fn(f64, f64) -> f64,
        int_op: fn(i64, i64) -> i64,
    ) -> ConstantValue {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Self::Integer(int_op(*a, *b)),
            _ => Self::Float(float_op(self.as_number(), other.as_number())),
        }
    }

    /// 取负
    pub fn negate(&self) -> ConstantValue {
        match self {
            Self::Integer(n) => Self::Integer(n.wrapping_neg()),
            Self::Float(f) => Self::Float(-f),
            Self::Delta(f) => Self::Delta(-f),
            other => Self::Float(-other.as_number()),
        }
    }

    /// 逻辑非
    pub fn logical_not(&self) -> ConstantValue {
        Self::Bool(!self.as_bool())
    }

    /// 相等判断
    ///
    /// 同类数值按数值比较（整数与浮点数可以相等）；
    /// 字符串、布尔按各自语义；其余跨类型组合不相等。
    pub fn equals(&self, other: &ConstantValue) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Null, Self::Null) => true,
            (Self::String(_), _)
            | (_, Self::String(_))
            | (Self::Bool(_), _)
            | (_, Self::Bool(_))
            | (Self::Null, _)
            | (_, Self::Null) => false,
            // 数值类（整数/浮点/相对数值）按数值视图比较
            _ => (self.as_number() - other.as_number()).abs() < f64::EPSILON,
        }
    }

    /// 大小比较
    ///
    /// 字符串间按字典序，其余按数值视图。
    pub fn compare(&self, other: &ConstantValue) -> Option<Ordering> {
        match (self, other) {
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            _ => self.as_number().partial_cmp(&other.as_number()),
        }
    }
}

impl std::fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(s) => write!(f, "{}", s),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Delta(v) => write!(f, "@{}", v),
            Self::Null => write!(f, "null"),
        }
    }
}
