//! # 内建函数模块
//!
//! 定义脚本可调用的内建函数表和宿主能力界面。
//!
//! ## 设计说明
//!
//! - [`Builtin`] 是封闭枚举：名字到（最小元数, 抽象调用）的固定映射，
//!   VM 启动时即定型，之后不变
//! - 解释器对渲染/音频/窗口一无所知，只认识调用名、实参常量
//!   和返回值契约；其余一切经由 [`EngineHost`] 协作方
//! - `EngineHost` 的方法全部带无操作默认实现，测试宿主只需实现
//!   自己关心的观察点
//! - 实参不足、实体不存在、动作无法识别都按**无操作**处理并记录
//!   运行期诊断，不中止所属线程

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pxml::{Color, TextBuffer};
use crate::runtime::coordinate::Coordinate;
use crate::runtime::entity::{EntityAction, EntityPath, EntityQuery};
use crate::runtime::eval::{Effect, EvalCtx};
use crate::runtime::thread::WaitCondition;
use crate::syntax::ast::FunctionCallExpr;
use crate::value::ConstantValue;

/// 贝塞尔曲线控制点（求值后）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f32,
    pub y: f32,
    /// 是否为起点
    pub starting: bool,
}

/// 贝塞尔曲线（求值后，交给宿主的动画系统）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BezierCurve {
    pub points: Vec<CurvePoint>,
}

/// 运动曲线
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum MotionCurve {
    /// 线性
    #[default]
    Linear,
    /// 贝塞尔曲线
    Bezier(BezierCurve),
}

/// 宿主能力界面
///
/// 实体目录 + 动作面 + 等待条件求值器 + 呈现/查询。
/// VM 在内建分发时同步调用，跨 tick 不缓存任何结果。
pub trait EngineHost {
    // ── 实体目录 ──

    /// 创建实体
    fn create_entity(&mut self, path: &EntityPath) {
        let _ = path;
    }

    /// 移除查询命中的实体（锁定实体由宿主跳过）
    fn remove_entities(&mut self, query: &EntityQuery) {
        let _ = query;
    }

    /// 为实体设置别名路径
    fn set_alias(&mut self, path: &EntityPath, alias: &EntityPath) {
        let _ = (path, alias);
    }

    /// 按实体类别分发离散动作；无法识别的组合忽略
    fn request(&mut self, query: &EntityQuery, action: EntityAction) {
        let _ = (query, action);
    }

    // ── 等待条件探测（tick 驱动器每帧调用）──

    /// 查询命中的实体是否全部空闲
    fn entity_idle(&mut self, query: &EntityQuery) -> bool {
        let _ = query;
        true
    }

    /// 查询命中的实体移动/动画是否完成
    fn move_completed(&mut self, query: &EntityQuery) -> bool {
        let _ = query;
        true
    }

    // ── 视觉 / 音频 ──

    fn add_texture(
        &mut self,
        path: &EntityPath,
        priority: i32,
        x: Coordinate,
        y: Coordinate,
        source: &str,
    ) {
        let _ = (path, priority, x, y, source);
    }

    fn add_color_rect(
        &mut self,
        path: &EntityPath,
        priority: i32,
        x: Coordinate,
        y: Coordinate,
        width: u32,
        height: u32,
        color: Color,
    ) {
        let _ = (path, priority, x, y, width, height, color);
    }

    fn load_audio(&mut self, path: &EntityPath, source: &str) {
        let _ = (path, source);
    }

    fn move_entity(
        &mut self,
        query: &EntityQuery,
        duration: Duration,
        x: Coordinate,
        y: Coordinate,
        curve: &MotionCurve,
    ) {
        let _ = (query, duration, x, y, curve);
    }

    fn zoom_entity(&mut self, query: &EntityQuery, duration: Duration, scale_x: f32, scale_y: f32) {
        let _ = (query, duration, scale_x, scale_y);
    }

    fn fade_entity(&mut self, query: &EntityQuery, duration: Duration, opacity: f32) {
        let _ = (query, duration, opacity);
    }

    fn set_volume(&mut self, query: &EntityQuery, duration: Duration, volume: u32) {
        let _ = (query, duration, volume);
    }

    fn set_loop(&mut self, query: &EntityQuery, looping: bool) {
        let _ = (query, looping);
    }

    // ── 呈现 ──

    /// 呈现一页已平铺的对话
    fn display_dialogue(&mut self, box_name: &str, block_name: &str, text: &TextBuffer) {
        let _ = (box_name, block_name, text);
    }

    /// 呈现选择分支的选项文本
    fn offer_choices(&mut self, choices: &[String]) {
        let _ = choices;
    }

    // ── 查询 ──

    fn texture_width(&mut self, source: &str) -> Option<u32> {
        let _ = source;
        None
    }

    fn texture_height(&mut self, source: &str) -> Option<u32> {
        let _ = source;
        None
    }

    /// `[0, max)` 内的随机整数
    fn random(&mut self, max: i64) -> i64 {
        let _ = max;
        0
    }
}

/// 内建函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Builtin {
    CreateTexture,
    CreateColor,
    CreateSound,
    CreateProcess,
    Request,
    Delete,
    SetAlias,
    Move,
    Zoom,
    Fade,
    SetVolume,
    SetLoop,
    Wait,
    WaitKey,
    WaitAction,
    WaitMove,
    WaitFrame,
    ImageWidth,
    ImageHeight,
    Random,
    Time,
}

impl Builtin {
    /// 全部内建（可枚举的固定映射表）
    pub const ALL: &'static [Builtin] = &[
        Self::CreateTexture,
        Self::CreateColor,
        Self::CreateSound,
        Self::CreateProcess,
        Self::Request,
        Self::Delete,
        Self::SetAlias,
        Self::Move,
        Self::Zoom,
        Self::Fade,
        Self::SetVolume,
        Self::SetLoop,
        Self::Wait,
        Self::WaitKey,
        Self::WaitAction,
        Self::WaitMove,
        Self::WaitFrame,
        Self::ImageWidth,
        Self::ImageHeight,
        Self::Random,
        Self::Time,
    ];

    /// 脚本里的函数名
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateTexture => "CreateTexture",
            Self::CreateColor => "CreateColor",
            Self::CreateSound => "CreateSound",
            Self::CreateProcess => "CreateProcess",
            Self::Request => "Request",
            Self::Delete => "Delete",
            Self::SetAlias => "SetAlias",
            Self::Move => "Move",
            Self::Zoom => "Zoom",
            Self::Fade => "Fade",
            Self::SetVolume => "SetVolume",
            Self::SetLoop => "SetLoop",
            Self::Wait => "Wait",
            Self::WaitKey => "WaitKey",
            Self::WaitAction => "WaitAction",
            Self::WaitMove => "WaitMove",
            Self::WaitFrame => "WaitFrame",
            Self::ImageWidth => "ImageWidth",
            Self::ImageHeight => "ImageHeight",
            Self::Random => "Random",
            Self::Time => "Time",
        }
    }

    /// 按名字解析（不区分大小写）
    pub fn resolve(name: &str) -> Option<Builtin> {
        Self::ALL
            .iter()
            .copied()
            .find(|builtin| builtin.name().eq_ignore_ascii_case(name))
    }

    /// 最小元数（不足按无操作处理）
    pub fn min_arity(&self) -> usize {
        match self {
            Self::CreateTexture => 5,
            Self::CreateColor => 7,
            Self::CreateSound => 2,
            Self::CreateProcess => 2,
            Self::Request => 2,
            Self::Delete => 1,
            Self::SetAlias => 2,
            Self::Move => 4,
            Self::Zoom => 4,
            Self::Fade => 3,
            Self::SetVolume => 3,
            Self::SetLoop => 2,
            Self::Wait => 1,
            Self::WaitKey | Self::WaitFrame | Self::Time => 0,
            Self::WaitAction => 1,
            Self::WaitMove => 1,
            Self::ImageWidth | Self::ImageHeight | Self::Random => 1,
        }
    }

    /// 是否有返回值（无返回值的调用在表达式位置求值为 Null）
    pub fn returns_value(&self) -> bool {
        matches!(
            self,
            Self::ImageWidth | Self::ImageHeight | Self::Random | Self::Time
        )
    }
}

/// 分发一次内建调用
///
/// 实参已求值为常量；`curves` 与实参平行，记录语法上是贝塞尔
/// 曲线的实参位置。等待请求和线程表操作通过 `ctx.effects`
/// 延迟到指令边界由 VM 应用。
pub(crate) fn dispatch(
    builtin: Builtin,
    call: &FunctionCallExpr,
    args: &[ConstantValue],
    curves: &[Option<BezierCurve>],
    ctx: &mut EvalCtx<'_>,
) -> ConstantValue {
    if args.len() < builtin.min_arity() {
        ctx.diagnostics.report_warn(
            format!(
                "内建函数 '{}' 需要至少 {} 个参数，实际 {} 个，忽略本次调用",
                builtin.name(),
                builtin.min_arity(),
                args.len()
            ),
            call.span,
        );
        return ConstantValue::Null;
    }

    let string_arg = |index: usize| -> String { args[index].convert_to_string() };
    let query_arg = |index: usize| -> EntityQuery { EntityQuery::new(string_arg(index)) };
    let path_arg = |index: usize| -> EntityPath { EntityPath::new(string_arg(index)) };
    let duration_arg = |index: usize| -> Duration {
        Duration::from_millis(args[index].as_number().max(0.0) as u64)
    };

    // 坐标参数：解析失败按绝对 0 处理并记录诊断
    fn coord_arg(
        args: &[ConstantValue],
        index: usize,
        call: &FunctionCallExpr,
        ctx: &mut EvalCtx<'_>,
    ) -> Coordinate {
        match Coordinate::from_value(&args[index]) {
            Some(coordinate) => coordinate,
            None => {
                ctx.diagnostics.report_warn(
                    format!("无法解析的坐标值 '{}'", args[index]),
                    call.span,
                );
                Coordinate::absolute(0.0)
            }
        }
    }

    match builtin {
        Builtin::CreateTexture => {
            let x = coord_arg(args, 2, call, ctx);
            let y = coord_arg(args, 3, call, ctx);
            let path = path_arg(0);
            ctx.host.create_entity(&path);
            ctx.host
                .add_texture(&path, args[1].as_integer() as i32, x, y, &string_arg(4));
            ConstantValue::Null
        }

        Builtin::CreateColor => {
            let x = coord_arg(args, 2, call, ctx);
            let y = coord_arg(args, 3, call, ctx);
            let color = Color::parse(&string_arg(6)).unwrap_or(Color::BLACK);
            let path = path_arg(0);
            ctx.host.create_entity(&path);
            ctx.host.add_color_rect(
                &path,
                args[1].as_integer() as i32,
                x,
                y,
                args[4].as_integer().max(0) as u32,
                args[5].as_integer().max(0) as u32,
                color,
            );
            ConstantValue::Null
        }

        Builtin::CreateSound => {
            let path = path_arg(0);
            ctx.host.create_entity(&path);
            ctx.host.load_audio(&path, &string_arg(1));
            ConstantValue::Null
        }

        Builtin::CreateProcess => {
            let entry = string_arg(1);
            match ctx.program.entry_index(&entry) {
                Some(index) => ctx.effects.push(Effect::SpawnThread {
                    path: path_arg(0),
                    entry: index,
                }),
                None => {
                    ctx.diagnostics.report_warn(
                        format!("未定义的线程入口 '{}'", entry),
                        call.span,
                    );
                }
            }
            ConstantValue::Null
        }

        Builtin::Request => {
            let query = query_arg(0);
            let action_name = string_arg(1);
            match EntityAction::from_name(&action_name) {
                Some(action) => {
                    // 线程实体由 VM 处理，其余转发宿主动作面
                    ctx.effects.push(Effect::ThreadRequest {
                        query: query.clone(),
                        action,
                    });
                    ctx.host.request(&query, action);
                }
                None => {
                    ctx.diagnostics.report_warn(
                        format!("无法识别的实体动作 '{}'", action_name),
                        call.span,
                    );
                }
            }
            ConstantValue::Null
        }

        Builtin::Delete => {
            let query = query_arg(0);
            ctx.effects.push(Effect::RemoveThreads {
                query: query.clone(),
            });
            ctx.host.remove_entities(&query);
            ConstantValue::Null
        }

        Builtin::SetAlias => {
            ctx.host.set_alias(&path_arg(0), &path_arg(1));
            ConstantValue::Null
        }

        Builtin::Move => {
            let duration = duration_arg(1);
            let x = coord_arg(args, 2, call, ctx);
            let y = coord_arg(args, 3, call, ctx);
            // 第 5 个参数若是贝塞尔曲线则作为运动曲线
            let curve = curves
                .get(4)
                .and_then(|c| c.clone())
                .map_or(MotionCurve::Linear, MotionCurve::Bezier);
            ctx.host.move_entity(&query_arg(0), duration, x, y, &curve);
            wait_if_requested(args, 5, duration, ctx);
            ConstantValue::Null
        }

        Builtin::Zoom => {
            let duration = duration_arg(1);
            ctx.host.zoom_entity(
                &query_arg(0),
                duration,
                args[2].as_number() as f32,
                args[3].as_number() as f32,
            );
            wait_if_requested(args, 4, duration, ctx);
            ConstantValue::Null
        }

        Builtin::Fade => {
            let duration = duration_arg(1);
            ctx.host
                .fade_entity(&query_arg(0), duration, args[2].as_number() as f32);
            wait_if_requested(args, 3, duration, ctx);
            ConstantValue::Null
        }

        Builtin::SetVolume => {
            ctx.host.set_volume(
                &query_arg(0),
                duration_arg(1),
                args[2].as_integer().max(0) as u32,
            );
            ConstantValue::Null
        }

        Builtin::SetLoop => {
            ctx.host.set_loop(&query_arg(0), args[1].as_bool());
            ConstantValue::Null
        }

        Builtin::Wait => {
            let duration = duration_arg(0);
            if !duration.is_zero() {
                ctx.effects.push(Effect::Wait {
                    condition: WaitCondition::None,
                    deadline: Some(ctx.clock + duration),
                });
            }
            ConstantValue::Null
        }

        Builtin::WaitKey => {
            let deadline = args
                .first()
                .map(|timeout| ctx.clock + Duration::from_millis(timeout.as_number().max(0.0) as u64));
            ctx.effects.push(Effect::Wait {
                condition: WaitCondition::UserInput,
                deadline,
            });
            ConstantValue::Null
        }

        Builtin::WaitAction => {
            let deadline = args
                .get(1)
                .map(|timeout| ctx.clock + Duration::from_millis(timeout.as_number().max(0.0) as u64));
            ctx.effects.push(Effect::Wait {
                condition: WaitCondition::EntityIdle(query_arg(0)),
                deadline,
            });
            ConstantValue::Null
        }

        Builtin::WaitMove => {
            ctx.effects.push(Effect::Wait {
                condition: WaitCondition::MoveCompleted(query_arg(0)),
                deadline: None,
            });
            ConstantValue::Null
        }

        Builtin::WaitFrame => {
            // 单帧让出：无条件、无截止时刻，下个 tick 恢复
            ctx.effects.push(Effect::Wait {
                condition: WaitCondition::None,
                deadline: None,
            });
            ConstantValue::Null
        }

        Builtin::ImageWidth => match ctx.host.texture_width(&string_arg(0)) {
            Some(width) => ConstantValue::Integer(width as i64),
            None => ConstantValue::Null,
        },

        Builtin::ImageHeight => match ctx.host.texture_height(&string_arg(0)) {
            Some(height) => ConstantValue::Integer(height as i64),
            None => ConstantValue::Null,
        },

        Builtin::Random => {
            let max = args[0].as_integer();
            ConstantValue::Integer(ctx.host.random(max))
        }

        Builtin::Time => ConstantValue::Integer(ctx.clock.as_millis() as i64),
    }
}

/// 动画内建的尾随 wait 参数：为真且时长非零时，按时长挂起当前线程
fn wait_if_requested(
    args: &[ConstantValue],
    index: usize,
    duration: Duration,
    ctx: &mut EvalCtx<'_>,
) {
    let wait = args.get(index).is_some_and(|v| v.as_bool());
    if wait && !duration.is_zero() {
        ctx.effects.push(Effect::Wait {
            condition: WaitCondition::None,
            deadline: Some(ctx.clock + duration),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_case_insensitive() {
        assert_eq!(Builtin::resolve("Move"), Some(Builtin::Move));
        assert_eq!(Builtin::resolve("move"), Some(Builtin::Move));
        assert_eq!(Builtin::resolve("WAITKEY"), Some(Builtin::WaitKey));
        assert_eq!(Builtin::resolve("NoSuchBuiltin"), None);
    }

    #[test]
    fn test_table_is_complete() {
        // 固定映射表对每个成员自洽
        for builtin in Builtin::ALL {
            assert_eq!(Builtin::resolve(builtin.name()), Some(*builtin));
        }
    }

    #[test]
    fn test_return_value_contract() {
        assert!(Builtin::ImageWidth.returns_value());
        assert!(Builtin::Random.returns_value());
        assert!(!Builtin::Move.returns_value());
        assert!(!Builtin::Wait.returns_value());
    }
}
