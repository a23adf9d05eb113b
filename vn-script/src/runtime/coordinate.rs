//! # 坐标解析模块
//!
//! 脚本坐标值到绝对像素值的换算。
//!
//! ## 设计说明
//!
//! 坐标带一个原点标记：绝对零点、相对当前值、锚定近边（左/上）、
//! 锚定远边（右/下）或居中。换算是
//! (声明值, 当前值, 对象尺寸, 视口尺寸, 锚点分数) 的纯函数，
//! 对五种原点都是全函数——原点枚举封闭，不存在"未支持原点"的
//! 运行期分支。

use serde::{Deserialize, Serialize};

use crate::value::ConstantValue;

/// 坐标原点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CoordinateOrigin {
    /// 绝对零点：声明值即绝对值
    Zero,
    /// 相对当前值：声明值是增量
    CurrentValue,
    /// 锚定近边（x 轴为左、y 轴为上）
    NearEdge,
    /// 锚定远边（x 轴为右、y 轴为下）
    FarEdge,
    /// 居中
    Center,
}

/// 脚本坐标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub value: f32,
    pub origin: CoordinateOrigin,
    /// 锚点分数（对象尺寸的占比，仅边锚定时有意义）
    pub anchor: f32,
}

impl Coordinate {
    /// 绝对坐标
    pub fn absolute(value: f32) -> Self {
        Self {
            value,
            origin: CoordinateOrigin::Zero,
            anchor: 0.0,
        }
    }

    /// 相对当前值的增量坐标
    pub fn delta(value: f32) -> Self {
        Self {
            value,
            origin: CoordinateOrigin::CurrentValue,
            anchor: 0.0,
        }
    }

    /// 从脚本常量值解析
    ///
    /// 数字 → 绝对；`@` 相对数值 → 相对当前值；
    /// `"left"`/`"top"` → 近边锚定 0；`"right"`/`"bottom"` → 远边锚定 1；
    /// `"center"`/`"middle"` → 居中。其余值无法构成坐标。
    pub fn from_value(value: &ConstantValue) -> Option<Coordinate> {
        match value {
            ConstantValue::Integer(n) => Some(Self::absolute(*n as f32)),
            ConstantValue::Float(f) => Some(Self::absolute(*f as f32)),
            ConstantValue::Delta(d) => Some(Self::delta(*d as f32)),
            ConstantValue::String(s) => match s.to_ascii_lowercase().as_str() {
                "left" | "top" => Some(Self {
                    value: 0.0,
                    origin: CoordinateOrigin::NearEdge,
                    anchor: 0.0,
                }),
                "right" | "bottom" => Some(Self {
                    value: 0.0,
                    origin: CoordinateOrigin::FarEdge,
                    anchor: 1.0,
                }),
                "center" | "middle" => Some(Self {
                    value: 0.0,
                    origin: CoordinateOrigin::Center,
                    anchor: 0.5,
                }),
                _ => None,
            },
            _ => None,
        }
    }

    /// 换算为绝对像素值
    pub fn resolve(&self, current_value: f32, object_dimension: f32, viewport_dimension: f32) -> f32 {
        match self.origin {
            CoordinateOrigin::Zero => self.value,
            CoordinateOrigin::CurrentValue => self.value + current_value,
            CoordinateOrigin::NearEdge => self.value - object_dimension * self.anchor,
            CoordinateOrigin::FarEdge => viewport_dimension - object_dimension * self.anchor,
            CoordinateOrigin::Center => (viewport_dimension - object_dimension) / 2.0,
        }
    }
}
