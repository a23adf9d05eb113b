//! # VM 模块
//!
//! 协作式多线程虚拟机与 tick 驱动。
//!
//! ## 执行模型
//!
//! ```text
//! tick(delta, input, host)
//!   1. 推进 VM 时钟
//!   2. 按槽位顺序遍历全部线程（固定顺序，重放可复现）：
//!      - 挂起线程：重估等待条件（截止时刻 / 输入 / 宿主探测），
//!        满足则恢复
//!      - 运行线程：逐指令执行，直到挂起、终止或预算耗尽
//!   3. 任何线程不阻塞 tick 循环；等待请求立即把控制权还给驱动器
//! ```
//!
//! 线程表和全局变量由 VM 在单个驱动线程上独占持有和变更，
//! 不存在并发修改（协作式模型免去加锁）。
//! 定时等待对照 VM 内部时钟（宿主提供的增量之和），不查墙钟。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::diagnostic::DiagnosticBag;
use crate::error::{VmError, VmResult};
use crate::pxml::TextBuffer;
use crate::runtime::builtins::EngineHost;
use crate::runtime::entity::{EntityAction, EntityPath};
use crate::runtime::eval::{Effect, EvalCtx};
use crate::runtime::program::{Op, Program};
use crate::runtime::thread::{Frame, ThreadId, ThreadState, VmThread, WaitCondition};
use crate::value::ConstantValue;
use text_size::{TextRange, TextSize};

/// 单个线程在一个 tick 内的指令预算
///
/// 不含等待的死循环脚本不能拖死 tick 循环：预算耗尽时强制
/// 单帧让出并记录诊断。
const OP_BUDGET: usize = 100_000;

/// 宿主传入的输入事件
///
/// 本 tick 的输入快照对所有等待输入的线程可见，
/// 消除消费顺序带来的不确定性。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    /// 用户点击/确认
    Advance,
    /// 用户选择了选项（从 0 开始的索引）
    Choice(usize),
}

/// 挂起线程的恢复判定结果
enum Resumption {
    Stay,
    Resume,
    ResumeWithChoice(usize),
}

/// 虚拟机
///
/// 持有线程槽位表、脚本全局变量、VM 时钟和运行期诊断。
/// 宿主只通过 [`ThreadId`] 引用线程。
pub struct Vm {
    program: Program,
    threads: Vec<VmThread>,
    globals: HashMap<String, ConstantValue>,
    clock: Duration,
    diagnostics: DiagnosticBag,
}

impl Vm {
    /// 创建 VM 实例
    pub fn new(program: Program) -> Self {
        Self {
            program,
            threads: Vec::new(),
            globals: HashMap::new(),
            clock: Duration::ZERO,
            diagnostics: DiagnosticBag::new(),
        }
    }

    /// 已加载的程序
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// VM 时钟（宿主提供的增量之和）
    pub fn clock(&self) -> Duration {
        self.clock
    }

    /// 读取全局变量（键带前缀符号，如 `"$flag"`）
    pub fn global(&self, key: &str) -> Option<&ConstantValue> {
        self.globals.get(key)
    }

    /// 写入全局变量
    pub fn set_global(&mut self, key: impl Into<String>, value: ConstantValue) {
        self.globals.insert(key.into(), value);
    }

    /// 运行期诊断（未定义引用等无操作事件的可观测记录）
    pub fn diagnostics(&self) -> &DiagnosticBag {
        &self.diagnostics
    }

    /// 取走运行期诊断
    pub fn take_diagnostics(&mut self) -> DiagnosticBag {
        std::mem::take(&mut self.diagnostics)
    }

    /// 派生脚本线程
    ///
    /// 入口必须是程序里的声明名，否则返回
    /// [`VmError::UndefinedEntryPoint`]。
    pub fn spawn(&mut self, path: impl Into<String>, entry: &str) -> VmResult<ThreadId> {
        let entry_index =
            self.program
                .entry_index(entry)
                .ok_or_else(|| VmError::UndefinedEntryPoint {
                    name: entry.to_string(),
                })?;
        let id = ThreadId(self.threads.len() as u32);
        self.threads
            .push(VmThread::new(id, EntityPath::new(path.into()), entry_index));
        Ok(id)
    }

    /// 按标识访问线程
    pub fn thread(&self, id: ThreadId) -> VmResult<&VmThread> {
        self.threads
            .get(id.0 as usize)
            .ok_or(VmError::ThreadNotFound { id })
    }

    /// 线程当前状态
    pub fn thread_state(&self, id: ThreadId) -> VmResult<&ThreadState> {
        Ok(self.thread(id)?.state())
    }

    /// 显式重启线程（调用栈从入口重建，槽位与身份复用）
    pub fn start(&mut self, id: ThreadId) -> VmResult<()> {
        self.thread_mut(id)?.restart();
        Ok(())
    }

    /// 显式恢复挂起的线程（无条件解除等待）
    pub fn resume(&mut self, id: ThreadId) -> VmResult<()> {
        self.thread_mut(id)?.resume();
        Ok(())
    }

    /// 显式暂停线程（只能被 resume/start 解除）
    pub fn pause(&mut self, id: ThreadId) -> VmResult<()> {
        let thread = self.thread_mut(id)?;
        if !thread.state.is_terminated() {
            thread.suspend(WaitCondition::Paused, None);
        }
        Ok(())
    }

    /// 显式停止线程
    pub fn stop(&mut self, id: ThreadId) -> VmResult<()> {
        self.thread_mut(id)?.stop();
        Ok(())
    }

    /// 是否全部线程都已终止
    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(|t| t.state.is_terminated())
    }

    fn thread_mut(&mut self, id: ThreadId) -> VmResult<&mut VmThread> {
        self.threads
            .get_mut(id.0 as usize)
            .ok_or(VmError::ThreadNotFound { id })
    }

    /// 核心驱动函数：推进一个 tick
    ///
    /// 所有线程按槽位顺序各推进一次。本 tick 派生的新线程
    /// 从下一个 tick 开始执行（遍历范围在进入时固定）。
    pub fn tick(
        &mut self,
        delta: Duration,
        input: Option<InputEvent>,
        host: &mut dyn EngineHost,
    ) -> VmResult<()> {
        self.clock += delta;

        let count = self.threads.len();
        for index in 0..count {
            let thread = &self.threads[index];
            if thread.removed || thread.state.is_terminated() {
                continue;
            }

            if let ThreadState::Suspended {
                condition,
                deadline,
            } = thread.state.clone()
            {
                match self.evaluate_wait(&condition, deadline, input, host)? {
                    Resumption::Stay => continue,
                    Resumption::Resume => self.threads[index].resume(),
                    Resumption::ResumeWithChoice(choice) => {
                        self.threads[index].pending_choice = Some(choice);
                        self.threads[index].resume();
                    }
                }
            }

            if self.threads[index].state.is_running() {
                self.run_thread(index, host);
            }
        }
        Ok(())
    }

    /// 重估一个挂起线程的等待条件
    fn evaluate_wait(
        &self,
        condition: &WaitCondition,
        deadline: Option<Duration>,
        input: Option<InputEvent>,
        host: &mut dyn EngineHost,
    ) -> VmResult<Resumption> {
        let deadline_hit = deadline.is_some_and(|d| self.clock >= d);
        let resumption = match condition {
            // 无截止时刻即单帧让出：下个 tick 恢复
            WaitCondition::None => {
                if deadline.is_none() || deadline_hit {
                    Resumption::Resume
                } else {
                    Resumption::Stay
                }
            }

            WaitCondition::Paused => Resumption::Stay,

            WaitCondition::UserInput => {
                if input.is_some() || deadline_hit {
                    Resumption::Resume
                } else {
                    Resumption::Stay
                }
            }

            WaitCondition::ChoiceSelected { choice_count } => match input {
                Some(InputEvent::Choice(index)) => {
                    if index >= *choice_count {
                        return Err(VmError::InvalidChoiceIndex {
                            index,
                            max: *choice_count,
                        });
                    }
                    Resumption::ResumeWithChoice(index)
                }
                // 普通确认视为选中第一个选项
                Some(InputEvent::Advance) => Resumption::ResumeWithChoice(0),
                None => Resumption::Stay,
            },

            WaitCondition::EntityIdle(query) => {
                if deadline_hit || host.entity_idle(query) {
                    Resumption::Resume
                } else {
                    Resumption::Stay
                }
            }

            WaitCondition::MoveCompleted(query) => {
                if deadline_hit || host.move_completed(query) {
                    Resumption::Resume
                } else {
                    Resumption::Stay
                }
            }
        };
        Ok(resumption)
    }

    /// 执行一个运行中的线程，直到挂起、终止或预算耗尽
    fn run_thread(&mut self, index: usize, host: &mut dyn EngineHost) {
        let mut budget = OP_BUDGET;
        loop {
            if budget == 0 {
                let message = format!(
                    "线程 '{}' 在单个 tick 内超出指令预算，强制让出",
                    self.threads[index].path
                );
                self.diagnostics.report_warn(message, empty_span());
                self.threads[index].suspend(WaitCondition::None, None);
                return;
            }
            budget -= 1;

            // 字段分借：program 共享借用（指令本身借自其中），其余可变
            let Vm {
                ref program,
                ref mut threads,
                ref mut globals,
                ref clock,
                ref mut diagnostics,
            } = *self;
            let thread = &mut threads[index];
            if !thread.state.is_running() {
                return;
            }
            let Some(frame) = thread.frames.last_mut() else {
                thread.state = ThreadState::Terminated;
                return;
            };

            let declaration = program.declaration(frame.function);
            if frame.pc >= declaration.ops.len() {
                // 函数体走完：隐式返回
                thread.frames.pop();
                if thread.frames.is_empty() {
                    thread.state = ThreadState::Terminated;
                    return;
                }
                continue;
            }

            let pc = frame.pc;
            frame.pc += 1;
            let op = &declaration.ops[pc];

            let mut effects = Vec::new();
            match op {
                Op::Jump(target) => {
                    frame.pc = *target;
                }

                Op::Branch { condition, target } => {
                    let mut ctx = EvalCtx {
                        program,
                        globals,
                        locals: &mut frame.locals,
                        host: &mut *host,
                        diagnostics,
                        clock: *clock,
                        effects: Vec::new(),
                    };
                    let value = ctx.evaluate(condition);
                    effects = ctx.effects;
                    if !value.as_bool() {
                        frame.pc = *target;
                    }
                }

                Op::Eval(expression) => {
                    let mut ctx = EvalCtx {
                        program,
                        globals,
                        locals: &mut frame.locals,
                        host: &mut *host,
                        diagnostics,
                        clock: *clock,
                        effects: Vec::new(),
                    };
                    ctx.evaluate(expression);
                    effects = ctx.effects;
                }

                Op::Return => {
                    thread.frames.pop();
                    if thread.frames.is_empty() {
                        thread.state = ThreadState::Terminated;
                        return;
                    }
                }

                Op::Dialogue {
                    box_name,
                    block_name,
                    pxml,
                } => {
                    let buffer = TextBuffer::from_pxml(pxml);
                    host.display_dialogue(box_name, block_name, &buffer);
                    // pc 已前进：恢复后从下一页/下一条指令继续
                    thread.suspend(WaitCondition::UserInput, None);
                }

                Op::Select { arms } => match thread.pending_choice.take() {
                    Some(choice) => {
                        // 输入校验保证 choice < arms.len()
                        if let Some(arm) = arms.get(choice) {
                            frame.pc = arm.target;
                        }
                    }
                    None => {
                        let labels: Vec<String> =
                            arms.iter().map(|arm| arm.label.clone()).collect();
                        host.offer_choices(&labels);
                        // 停在 Select 指令上，恢复时据选择跳转
                        frame.pc = pc;
                        thread.suspend(
                            WaitCondition::ChoiceSelected {
                                choice_count: labels.len(),
                            },
                            None,
                        );
                    }
                },
            }

            // 指令边界：应用求值积累的效果
            if !effects.is_empty() {
                self.apply_effects(index, effects, host);
            }

            if !self.threads[index].state.is_running() {
                return;
            }
        }
    }

    /// 在指令边界应用效果（等待、调用、线程表操作）
    fn apply_effects(&mut self, index: usize, effects: Vec<Effect>, host: &mut dyn EngineHost) {
        for effect in effects {
            match effect {
                Effect::Wait {
                    condition,
                    deadline,
                } => {
                    self.threads[index].suspend(condition, deadline);
                }

                Effect::CallFunction {
                    index: function,
                    arguments,
                } => {
                    let declaration = self.program.declaration(function);
                    let mut frame = Frame::new(function);
                    for (slot, parameter) in declaration.parameters.iter().enumerate() {
                        let value = arguments.get(slot).cloned().unwrap_or(ConstantValue::Null);
                        frame.locals.insert(parameter.clone(), value);
                    }
                    self.threads[index].frames.push(frame);
                }

                Effect::SpawnThread { path, entry } => {
                    host.create_entity(&path);
                    let id = ThreadId(self.threads.len() as u32);
                    self.threads.push(VmThread::new(id, path, entry));
                }

                Effect::ThreadRequest { query, action } => {
                    for thread in &mut self.threads {
                        if thread.removed || !query.matches(thread.path.as_str()) {
                            continue;
                        }
                        match action {
                            EntityAction::Start => thread.restart(),
                            EntityAction::Resume => thread.resume(),
                            EntityAction::Pause => {
                                if !thread.state.is_terminated() {
                                    thread.suspend(WaitCondition::Paused, None);
                                }
                            }
                            EntityAction::Stop => thread.stop(),
                            EntityAction::Lock => thread.locked = true,
                            EntityAction::Unlock => thread.locked = false,
                            EntityAction::Destroy | EntityAction::DestroyWhenIdle => {
                                if !thread.locked {
                                    thread.stop();
                                    thread.removed = true;
                                }
                            }
                            // 其余动作与线程实体无关
                            _ => {}
                        }
                    }
                }

                Effect::RemoveThreads { query } => {
                    for thread in &mut self.threads {
                        if thread.removed || !query.matches(thread.path.as_str()) {
                            continue;
                        }
                        // 锁定线程对破坏性动作免疫
                        if !thread.locked {
                            thread.stop();
                            thread.removed = true;
                        }
                    }
                }
            }
        }
    }
}

/// 运行期诊断没有对应的源文本位置
fn empty_span() -> TextRange {
    TextRange::empty(TextSize::new(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::entity::EntityQuery;

    /// 记录调用的测试宿主
    #[derive(Default)]
    struct MockHost {
        created: Vec<String>,
        removed_queries: Vec<String>,
        dialogue_pages: Vec<String>,
        offered_choices: Vec<Vec<String>>,
        idle: bool,
        moves_done: bool,
    }

    impl EngineHost for MockHost {
        fn create_entity(&mut self, path: &EntityPath) {
            self.created.push(path.as_str().to_string());
        }

        fn remove_entities(&mut self, query: &EntityQuery) {
            self.removed_queries.push(query.as_str().to_string());
        }

        fn entity_idle(&mut self, _query: &EntityQuery) -> bool {
            self.idle
        }

        fn move_completed(&mut self, _query: &EntityQuery) -> bool {
            self.moves_done
        }

        fn display_dialogue(&mut self, _box_name: &str, _block_name: &str, text: &TextBuffer) {
            self.dialogue_pages.push(text.plain_text());
        }

        fn offer_choices(&mut self, choices: &[String]) {
            self.offered_choices.push(choices.to_vec());
        }

        fn texture_width(&mut self, _source: &str) -> Option<u32> {
            Some(640)
        }
    }

    fn vm_with(text: &str) -> Vm {
        let (program, diagnostics) = Program::from_source(text).expect("脚本应当编译通过");
        assert!(!diagnostics.has_errors());
        Vm::new(program)
    }

    fn tick(vm: &mut Vm, host: &mut MockHost) {
        vm.tick(Duration::from_millis(16), None, host).unwrap();
    }

    fn tick_with(vm: &mut Vm, host: &mut MockHost, input: InputEvent) {
        vm.tick(Duration::from_millis(16), Some(input), host)
            .unwrap();
    }

    #[test]
    fn test_end_to_end_arithmetic() {
        let mut vm = vm_with("function main() { $x = 1 + 2 * 3; }");
        let mut host = MockHost::default();
        let id = vm.spawn("main", "main").unwrap();

        tick(&mut vm, &mut host);

        assert_eq!(vm.global("$x"), Some(&ConstantValue::Integer(7)));
        assert!(vm.thread_state(id).unwrap().is_terminated());
    }

    #[test]
    fn test_spawn_unknown_entry_fails() {
        let mut vm = vm_with("function main() { return; }");
        let result = vm.spawn("main", "nope");
        assert!(matches!(
            result,
            Err(VmError::UndefinedEntryPoint { name }) if name == "nope"
        ));
    }

    #[test]
    fn test_wait_key_suspends_and_resumes_after_call_site() {
        let mut vm = vm_with("function main() { $x = 1; WaitKey(); $x = 2; }");
        let mut host = MockHost::default();
        let id = vm.spawn("main", "main").unwrap();

        tick(&mut vm, &mut host);
        assert_eq!(vm.global("$x"), Some(&ConstantValue::Integer(1)));
        assert!(matches!(
            vm.thread_state(id).unwrap(),
            ThreadState::Suspended {
                condition: WaitCondition::UserInput,
                ..
            }
        ));

        // 无输入的 tick 不解除等待
        tick(&mut vm, &mut host);
        assert!(vm.thread_state(id).unwrap().is_suspended());

        // 输入到达：从等待调用之后继续，而不是从函数头重来
        tick_with(&mut vm, &mut host, InputEvent::Advance);
        assert_eq!(vm.global("$x"), Some(&ConstantValue::Integer(2)));
        assert!(vm.thread_state(id).unwrap().is_terminated());
    }

    #[test]
    fn test_wait_key_timeout() {
        let mut vm = vm_with("function main() { WaitKey(100); $done = true; }");
        let mut host = MockHost::default();
        vm.spawn("main", "main").unwrap();

        tick(&mut vm, &mut host); // clock = 16ms，挂起，截止 = 116ms
        assert_eq!(vm.global("$done"), None);

        vm.tick(Duration::from_millis(200), None, &mut host).unwrap();
        assert_eq!(vm.global("$done"), Some(&ConstantValue::Bool(true)));
    }

    #[test]
    fn test_delay_uses_vm_clock() {
        let mut vm = vm_with("function main() { Wait(1000); $done = true; }");
        let mut host = MockHost::default();
        vm.spawn("main", "main").unwrap();

        vm.tick(Duration::from_millis(100), None, &mut host).unwrap();
        assert_eq!(vm.global("$done"), None);

        vm.tick(Duration::from_millis(500), None, &mut host).unwrap();
        assert_eq!(vm.global("$done"), None);

        vm.tick(Duration::from_millis(500), None, &mut host).unwrap();
        assert_eq!(vm.global("$done"), Some(&ConstantValue::Bool(true)));
    }

    #[test]
    fn test_wait_frame_yields_single_tick() {
        let mut vm = vm_with("function main() { WaitFrame(); $done = true; }");
        let mut host = MockHost::default();
        let id = vm.spawn("main", "main").unwrap();

        tick(&mut vm, &mut host);
        assert!(vm.thread_state(id).unwrap().is_suspended());

        tick(&mut vm, &mut host);
        assert_eq!(vm.global("$done"), Some(&ConstantValue::Bool(true)));
    }

    #[test]
    fn test_wait_action_resumes_on_idle_probe() {
        let mut vm = vm_with(r#"function main() { WaitAction("鸟*"); $done = true; }"#);
        let mut host = MockHost::default();
        host.idle = false;
        vm.spawn("main", "main").unwrap();

        tick(&mut vm, &mut host);
        tick(&mut vm, &mut host);
        assert_eq!(vm.global("$done"), None);

        host.idle = true;
        tick(&mut vm, &mut host);
        assert_eq!(vm.global("$done"), Some(&ConstantValue::Bool(true)));
    }

    #[test]
    fn test_unresolvable_function_is_noop_with_diagnostic() {
        let mut vm = vm_with("function main() { NoSuchBuiltin(); $x = 5; }");
        let mut host = MockHost::default();
        let id = vm.spawn("main", "main").unwrap();

        tick(&mut vm, &mut host);

        // 周围语句照常执行
        assert_eq!(vm.global("$x"), Some(&ConstantValue::Integer(5)));
        assert!(vm.thread_state(id).unwrap().is_terminated());
        // 调用点被记录为诊断而不是中止错误
        assert!(
            vm.diagnostics()
                .iter()
                .any(|d| d.message.contains("NoSuchBuiltin"))
        );
    }

    #[test]
    fn test_undefined_variable_reads_null() {
        let mut vm = vm_with("function main() { $x = $nothing + 1; }");
        let mut host = MockHost::default();
        vm.spawn("main", "main").unwrap();

        tick(&mut vm, &mut host);
        // Null 的数值视图为 0
        assert_eq!(vm.global("$x"), Some(&ConstantValue::Float(1.0)));
        assert!(vm.diagnostics().iter().any(|d| d.message.contains("$nothing")));
    }

    #[test]
    fn test_user_function_call_binds_parameters() {
        let text = r#"
function helper($amount) { $total = $total + $amount; }
function main() { $total = 0; helper(5); helper(7); }
"#;
        let mut vm = vm_with(text);
        let mut host = MockHost::default();
        vm.spawn("main", "main").unwrap();

        tick(&mut vm, &mut host);
        assert_eq!(vm.global("$total"), Some(&ConstantValue::Integer(12)));
    }

    #[test]
    fn test_while_loop_and_break() {
        let text = r#"
function main() {
    $n = 0;
    while (true) {
        $n += 1;
        if ($n >= 5) { break; }
    }
}
"#;
        let mut vm = vm_with(text);
        let mut host = MockHost::default();
        vm.spawn("main", "main").unwrap();

        tick(&mut vm, &mut host);
        assert_eq!(vm.global("$n"), Some(&ConstantValue::Integer(5)));
    }

    #[test]
    fn test_dialogue_pages_present_in_order() {
        let text = r#"
chapter main {
    dialogue box00 text00 {
        "第一页"
        "第二页<halt/>尾声"
    }
    $done = true;
}
"#;
        let mut vm = vm_with(text);
        let mut host = MockHost::default();
        let id = vm.spawn("main", "main").unwrap();

        tick(&mut vm, &mut host);
        assert_eq!(host.dialogue_pages, vec!["第一页"]);
        assert!(vm.thread_state(id).unwrap().is_suspended());

        tick_with(&mut vm, &mut host, InputEvent::Advance);
        assert_eq!(host.dialogue_pages.len(), 2);
        assert_eq!(host.dialogue_pages[1], "第二页尾声");

        tick_with(&mut vm, &mut host, InputEvent::Advance);
        assert_eq!(vm.global("$done"), Some(&ConstantValue::Bool(true)));
        assert!(vm.thread_state(id).unwrap().is_terminated());
    }

    #[test]
    fn test_select_resumes_into_chosen_case() {
        let text = r#"
scene s {
    select {
        case "甲" { $r = 1; }
        case "乙" { $r = 2; }
    }
}
"#;
        let mut vm = vm_with(text);
        let mut host = MockHost::default();
        let id = vm.spawn("s", "s").unwrap();

        tick(&mut vm, &mut host);
        assert_eq!(host.offered_choices, vec![vec!["甲", "乙"]]);
        assert!(matches!(
            vm.thread_state(id).unwrap(),
            ThreadState::Suspended {
                condition: WaitCondition::ChoiceSelected { choice_count: 2 },
                ..
            }
        ));

        tick_with(&mut vm, &mut host, InputEvent::Choice(1));
        assert_eq!(vm.global("$r"), Some(&ConstantValue::Integer(2)));
        assert!(vm.thread_state(id).unwrap().is_terminated());
    }

    #[test]
    fn test_select_rejects_out_of_range_choice() {
        let text = r#"scene s { select { case "唯一" { return; } } }"#;
        let mut vm = vm_with(text);
        let mut host = MockHost::default();
        vm.spawn("s", "s").unwrap();

        tick(&mut vm, &mut host);
        let result = vm.tick(
            Duration::from_millis(16),
            Some(InputEvent::Choice(5)),
            &mut host,
        );
        assert!(matches!(
            result,
            Err(VmError::InvalidChoiceIndex { index: 5, max: 1 })
        ));
    }

    #[test]
    fn test_create_process_spawns_thread_next_tick() {
        let text = r#"
function work() { $worked = true; }
function main() { CreateProcess("worker/a", "work"); }
"#;
        let mut vm = vm_with(text);
        let mut host = MockHost::default();
        vm.spawn("main", "main").unwrap();

        tick(&mut vm, &mut host);
        // 新线程本 tick 只派生，不执行
        assert_eq!(vm.global("$worked"), None);
        assert_eq!(host.created, vec!["worker/a"]);

        tick(&mut vm, &mut host);
        assert_eq!(vm.global("$worked"), Some(&ConstantValue::Bool(true)));
    }

    #[test]
    fn test_wildcard_delete_skips_locked_threads() {
        let text = r#"
function idle() { WaitKey(); }
function main() { Request("a2", "Lock"); Delete("a*"); }
"#;
        let mut vm = vm_with(text);
        let mut host = MockHost::default();
        let a1 = vm.spawn("a1", "idle").unwrap();
        let a2 = vm.spawn("a2", "idle").unwrap();
        let b1 = vm.spawn("b1", "idle").unwrap();
        vm.spawn("ctl", "main").unwrap();

        tick(&mut vm, &mut host);

        // a1 命中通配且未锁定：被摘除
        assert!(vm.thread_state(a1).unwrap().is_terminated());
        // a2 命中但已锁定：幸免
        assert!(vm.thread_state(a2).unwrap().is_suspended());
        // b1 不命中
        assert!(vm.thread_state(b1).unwrap().is_suspended());
        // 查询同时转发给了宿主实体目录
        assert_eq!(host.removed_queries, vec!["a*"]);
    }

    #[test]
    fn test_alias_sigil_stripped_before_thread_matching() {
        let text = r#"
function idle() { WaitKey(); }
function main() { Request("@a1", "Stop"); }
"#;
        let mut vm = vm_with(text);
        let mut host = MockHost::default();
        let a1 = vm.spawn("a1", "idle").unwrap();
        vm.spawn("ctl", "main").unwrap();

        tick(&mut vm, &mut host);
        assert!(vm.thread_state(a1).unwrap().is_terminated());
    }

    #[test]
    fn test_request_start_restarts_with_same_identity() {
        let text = r#"
function once() { $runs += 1; }
function main() { Request("worker", "Start"); }
"#;
        let mut vm = vm_with(text);
        let mut host = MockHost::default();
        let worker = vm.spawn("worker", "once").unwrap();
        vm.set_global("$runs", ConstantValue::Integer(0));

        tick(&mut vm, &mut host);
        assert_eq!(vm.global("$runs"), Some(&ConstantValue::Integer(1)));
        assert!(vm.thread_state(worker).unwrap().is_terminated());

        // 另一个线程对它发出 Start：槽位复用、重新执行
        vm.spawn("ctl", "main").unwrap();
        tick(&mut vm, &mut host);
        tick(&mut vm, &mut host);
        assert_eq!(vm.global("$runs"), Some(&ConstantValue::Integer(2)));
        assert!(vm.thread_state(worker).unwrap().is_terminated());
    }

    #[test]
    fn test_pause_only_lifts_on_explicit_resume() {
        let mut vm = vm_with("function main() { WaitFrame(); $done = true; }");
        let mut host = MockHost::default();
        let id = vm.spawn("main", "main").unwrap();

        tick(&mut vm, &mut host);
        vm.pause(id).unwrap();

        for _ in 0..5 {
            tick_with(&mut vm, &mut host, InputEvent::Advance);
        }
        assert_eq!(vm.global("$done"), None);

        vm.resume(id).unwrap();
        tick(&mut vm, &mut host);
        assert_eq!(vm.global("$done"), Some(&ConstantValue::Bool(true)));
    }

    #[test]
    fn test_builtin_query_returns_value() {
        let mut vm = vm_with(r#"function main() { $w = ImageWidth("bg.png"); }"#);
        let mut host = MockHost::default();
        vm.spawn("main", "main").unwrap();

        tick(&mut vm, &mut host);
        assert_eq!(vm.global("$w"), Some(&ConstantValue::Integer(640)));
    }

    #[test]
    fn test_deterministic_slot_order() {
        // 两个线程写同一个全局变量：槽位顺序决定结果，重放可复现
        let text = r#"
function first() { $winner = "first"; }
function second() { $winner = "second"; }
"#;
        let mut vm = vm_with(text);
        let mut host = MockHost::default();
        vm.spawn("t1", "first").unwrap();
        vm.spawn("t2", "second").unwrap();

        tick(&mut vm, &mut host);
        assert_eq!(vm.global("$winner"), Some(&ConstantValue::string("second")));
    }

    #[test]
    fn test_op_budget_forces_yield() {
        let mut vm = vm_with("function main() { $n = 0; while (true) { $n += 1; } }");
        let mut host = MockHost::default();
        let id = vm.spawn("main", "main").unwrap();

        tick(&mut vm, &mut host);
        // 死循环不拖死 tick：强制让出并记录诊断
        assert!(vm.thread_state(id).unwrap().is_suspended());
        assert!(vm.diagnostics().iter().any(|d| d.message.contains("预算")));
    }

    #[test]
    fn test_is_finished() {
        let mut vm = vm_with("function main() { return; }");
        let mut host = MockHost::default();
        vm.spawn("main", "main").unwrap();
        assert!(!vm.is_finished());

        tick(&mut vm, &mut host);
        assert!(vm.is_finished());
    }
}
