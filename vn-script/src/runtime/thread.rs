//! # 脚本线程模块
//!
//! 定义协作式脚本线程的状态机。
//!
//! ## 状态转换
//!
//! ```text
//! Running   --(内建等待请求)-->  Suspended{condition, deadline}
//! Suspended --(条件满足/超时)-->  Running
//! Suspended --(显式 Resume)--->  Running
//! Running   --(调用栈空/Stop)-->  Terminated
//! Terminated --(显式 Start)--->  Running（调用栈从入口重建，槽位复用）
//! ```
//!
//! 线程由 VM 的槽位表独占持有；宿主只持有 [`ThreadId`]，
//! 不直接引用线程，避免线程终止/重建时的悬垂引用。
//! 挂起只发生在指令边界，表达式求值不可中途挂起。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::runtime::entity::{EntityPath, EntityQuery};
use crate::value::ConstantValue;

/// 线程标识
///
/// VM 线程表的不透明槽位句柄。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub(crate) u32);

/// 等待条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WaitCondition {
    /// 无条件：有截止时刻则等到期，否则单帧让出（下个 tick 恢复）
    None,
    /// 显式暂停：只能被外部 Resume/Start 解除
    Paused,
    /// 等待用户输入
    UserInput,
    /// 等待选择分支输入
    ChoiceSelected {
        /// 选项数量，用于校验输入合法性
        choice_count: usize,
    },
    /// 等待查询命中的实体全部空闲
    EntityIdle(EntityQuery),
    /// 等待查询命中的实体移动/动画完成
    MoveCompleted(EntityQuery),
}

/// 线程状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ThreadState {
    /// 运行中
    Running,
    /// 挂起
    Suspended {
        condition: WaitCondition,
        /// 绝对截止时刻（相对 VM 时钟）
        deadline: Option<Duration>,
    },
    /// 已终止（吸收态，仅显式重启可离开）
    Terminated,
}

impl ThreadState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended { .. })
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// 调用栈帧
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    /// 所执行声明在程序中的索引
    pub function: usize,
    /// 指令指针
    pub pc: usize,
    /// 局部变量槽（形参）
    pub locals: HashMap<String, ConstantValue>,
}

impl Frame {
    pub fn new(function: usize) -> Self {
        Self {
            function,
            pc: 0,
            locals: HashMap::new(),
        }
    }
}

/// 脚本线程
///
/// 每个并发运行的脚本实体一个；持有自己的调用栈和挂起状态。
#[derive(Debug)]
pub struct VmThread {
    pub(crate) id: ThreadId,
    /// 实体目录中的路径（供 Request/Delete 通配匹配）
    pub(crate) path: EntityPath,
    /// 入口声明索引（重启时重建调用栈用）
    pub(crate) entry: usize,
    pub(crate) frames: Vec<Frame>,
    pub(crate) state: ThreadState,
    /// 已被 Delete 摘除：不再参与查询匹配，槽位保留
    pub(crate) removed: bool,
    /// 是否被锁定（破坏性动作跳过锁定线程）
    pub(crate) locked: bool,
    /// 选择分支恢复时选中的 case 索引
    pub(crate) pending_choice: Option<usize>,
}

impl VmThread {
    pub(crate) fn new(id: ThreadId, path: EntityPath, entry: usize) -> Self {
        Self {
            id,
            path,
            entry,
            frames: vec![Frame::new(entry)],
            state: ThreadState::Running,
            removed: false,
            locked: false,
            pending_choice: None,
        }
    }

    /// 线程标识
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// 实体路径
    pub fn path(&self) -> &EntityPath {
        &self.path
    }

    /// 当前状态
    pub fn state(&self) -> &ThreadState {
        &self.state
    }

    /// 挂起
    pub(crate) fn suspend(&mut self, condition: WaitCondition, deadline: Option<Duration>) {
        self.state = ThreadState::Suspended {
            condition,
            deadline,
        };
    }

    /// 无条件恢复执行
    pub(crate) fn resume(&mut self) {
        if self.state.is_suspended() {
            self.state = ThreadState::Running;
        }
    }

    /// 终止（不展开调用栈——表达式求值不可中途挂起，无需回退）
    pub(crate) fn stop(&mut self) {
        self.frames.clear();
        self.state = ThreadState::Terminated;
    }

    /// 重启：调用栈从入口重建，线程身份与槽位复用
    pub(crate) fn restart(&mut self) {
        self.frames = vec![Frame::new(self.entry)];
        self.state = ThreadState::Running;
        self.pending_choice = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_thread() -> VmThread {
        VmThread::new(ThreadId(0), EntityPath::new("thread/main"), 0)
    }

    #[test]
    fn test_new_thread_is_running() {
        let thread = test_thread();
        assert!(thread.state().is_running());
        assert_eq!(thread.frames.len(), 1);
        assert_eq!(thread.frames[0].pc, 0);
    }

    #[test]
    fn test_suspend_and_resume() {
        let mut thread = test_thread();
        thread.suspend(WaitCondition::UserInput, None);
        assert!(thread.state().is_suspended());

        thread.resume();
        assert!(thread.state().is_running());
    }

    #[test]
    fn test_resume_does_not_revive_terminated() {
        let mut thread = test_thread();
        thread.stop();
        assert!(thread.state().is_terminated());

        // Terminated 是吸收态，resume 无效
        thread.resume();
        assert!(thread.state().is_terminated());
    }

    #[test]
    fn test_restart_rebuilds_stack_and_keeps_identity() {
        let mut thread = test_thread();
        let id = thread.id();
        thread.frames[0].pc = 7;
        thread.stop();

        thread.restart();
        assert!(thread.state().is_running());
        assert_eq!(thread.frames.len(), 1);
        assert_eq!(thread.frames[0].pc, 0);
        assert_eq!(thread.id(), id);
    }
}
