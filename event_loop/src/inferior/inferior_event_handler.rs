// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Translates "the target has something to say" into continuation execution.
//!
//! | Kind            | Effect                                                        |
//! | :-------------- | :------------------------------------------------------------ |
//! | `RegEvent`      | Fetch one event from the target                               |
//! | `ExecContinue`  | Run intermediate continuations                                |
//! | `ExecComplete`  | Stop async reporting, then run intermediate → inferior → breakpoint commands |
//! | `Error`         | Discard everything queued, re-enable console input            |
//!
//! # Errors while fetching or running breakpoint commands
//!
//! Queued breakpoint actions are rolled back first; a failed `ExecContinue` or
//! `ExecComplete` also discards every queued continuation. Then, once, at the outermost
//! call: if the current console is blocked by a foreground command, the error
//! propagates, so that [`start_event_loop()`] re-enables input and restores the prompt.
//! Otherwise the user already has a prompt and is typing something unrelated: the error
//! is printed on the console, followed by a fresh prompt, and swallowed.
//!
//! [`start_event_loop()`]: crate::EventLoop::start_event_loop

use super::{ContinuationQueues, Target, ThreadId, run_continuations};
use crate::{AsyncEventHandlerId, DEBUG_EVENT_LOOP, EventLoop, EventLoopResult, PromptState};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferiorEventKind {
    /// The target has an event ready to be fetched.
    RegEvent,
    /// An intermediate step of an execution command finished.
    ExecContinue,
    /// An execution command finished; the inferior stopped.
    ExecComplete,
    /// The target failed while the inferior was running.
    Error,
}

#[allow(missing_debug_implementations)]
#[derive(Default)]
pub struct InferiorState {
    target: Option<Rc<dyn Target>>,
    target_event_handler: Option<AsyncEventHandlerId>,
    continuations: ContinuationQueues,
    /// Nesting of [`EventLoop::inferior_event_handler()`] calls.
    dispatch_depth: usize,
}

impl EventLoop {
    /// Attaches `target`, replacing any previous one. Returns the async event handler
    /// the target marks (see [`mark_inferior_event()`]) to have
    /// [`InferiorEventKind::RegEvent`] handled.
    ///
    /// [`mark_inferior_event()`]: Self::mark_inferior_event
    pub fn attach_target(&mut self, target: Rc<dyn Target>) -> AsyncEventHandlerId {
        self.detach_target();
        let id = self.create_async_event_handler(|event_loop| {
            event_loop.inferior_event_handler(InferiorEventKind::RegEvent)
        });
        self.inferior.target = Some(target);
        self.inferior.target_event_handler = Some(id);
        id
    }

    pub fn detach_target(&mut self) -> Option<Rc<dyn Target>> {
        if let Some(id) = self.inferior.target_event_handler.take() {
            self.delete_async_event_handler(id);
        }
        self.inferior.target.take()
    }

    #[must_use]
    pub fn target(&self) -> Option<Rc<dyn Target>> { self.inferior.target.clone() }

    /// Returns `false` if no target is attached.
    pub fn mark_inferior_event(&mut self) -> bool {
        match self.inferior.target_event_handler {
            Some(id) => self.mark_async_event_handler(id),
            None => false,
        }
    }

    pub fn add_intermediate_continuation(
        &mut self,
        thread: ThreadId,
        continuation: impl FnOnce(&mut EventLoop) -> EventLoopResult<()> + 'static,
    ) {
        self.inferior
            .continuations
            .add_intermediate(thread, Box::new(continuation));
    }

    pub fn add_continuation(
        &mut self,
        continuation: impl FnOnce(&mut EventLoop) -> EventLoopResult<()> + 'static,
    ) {
        self.inferior.continuations.add_inferior(Box::new(continuation));
    }

    /// Queues the command list of a breakpoint that was hit.
    pub fn add_breakpoint_commands(
        &mut self,
        commands: impl FnOnce(&mut EventLoop) -> EventLoopResult<()> + 'static,
    ) {
        self.inferior
            .continuations
            .add_breakpoint_command(Box::new(commands));
    }

    pub fn discard_all_continuations(&mut self) { self.inferior.continuations.discard_all(); }

    pub fn clear_breakpoint_actions(&mut self) {
        self.inferior.continuations.clear_breakpoint_actions();
    }

    #[must_use]
    pub fn continuations(&self) -> &ContinuationQueues { &self.inferior.continuations }

    /// Handles `kind`. Target callbacks may call back in here (eg: a fetch that
    /// reports `ExecComplete`); only the outermost call applies the foreground rule.
    ///
    /// # Errors
    ///
    /// See the [module docs](self) for which errors propagate.
    pub fn inferior_event_handler(&mut self, kind: InferiorEventKind) -> EventLoopResult<()> {
        DEBUG_EVENT_LOOP.then(|| {
            tracing::debug!(message = "inferior event", ?kind);
        });
        self.inferior.dispatch_depth += 1;
        let result = self.handle_inferior_event(kind);
        self.inferior.dispatch_depth -= 1;
        match result {
            Err(report) if self.inferior.dispatch_depth == 0 => {
                self.report_inferior_error(report)
            }
            other => other,
        }
    }

    fn handle_inferior_event(&mut self, kind: InferiorEventKind) -> EventLoopResult<()> {
        match kind {
            InferiorEventKind::RegEvent => {
                let Some(target) = self.target() else {
                    return Ok(());
                };
                let result = target.fetch_inferior_event(self);
                if result.is_err() {
                    self.clear_breakpoint_actions();
                }
                result
            }
            InferiorEventKind::ExecContinue | InferiorEventKind::ExecComplete => {
                let result = if kind == InferiorEventKind::ExecContinue {
                    let queue = self.inferior.continuations.take_intermediate();
                    run_continuations(self, queue)
                } else {
                    self.run_exec_complete()
                };
                if result.is_err() {
                    self.discard_all_continuations();
                    self.clear_breakpoint_actions();
                }
                result
            }
            InferiorEventKind::Error => {
                tracing::warn!(message = "target reported an error, discarding continuations");
                self.discard_all_continuations();
                self.clear_breakpoint_actions();
                if let Some(target) = self.target()
                    && target.can_async()
                {
                    target.set_async(self, false)?;
                }
                match self.current_ui() {
                    Some(id) => self.enable_console_input(id),
                    None => Ok(()),
                }
            }
        }
    }

    fn run_exec_complete(&mut self) -> EventLoopResult<()> {
        if let Some(target) = self.target()
            && target.has_execution()
            && target.can_async()
        {
            target.set_async(self, false)?;
        }
        let queue = self.inferior.continuations.take_intermediate();
        run_continuations(self, queue)?;
        let queue = self.inferior.continuations.take_inferior();
        run_continuations(self, queue)?;
        let queue = self.inferior.continuations.take_breakpoint_commands();
        run_continuations(self, queue)
    }

    /// A blocked console means a foreground command is waiting on the inferior: give
    /// its input back and let the error reach [`start_event_loop()`]. Otherwise print
    /// the error and show a fresh prompt.
    ///
    /// [`start_event_loop()`]: EventLoop::start_event_loop
    fn report_inferior_error(&mut self, report: miette::Report) -> EventLoopResult<()> {
        let Some(id) = self.current_ui() else {
            tracing::error!(message = "inferior event failed", error = ?report);
            return Ok(());
        };
        let blocked = self
            .ui(id)
            .is_some_and(|ui| ui.prompt_state() == PromptState::Blocked);
        if blocked {
            self.enable_console_input(id)?;
            return Err(report);
        }
        tracing::warn!(message = "inferior event failed while console was idle", error = ?report);
        self.write_to_console(id, &format!("{report:?}\n"))?;
        self.ui_mut(id)?.set_prompt_state(PromptState::Needed);
        self.display_prompt(id, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CapturedOutput, SocketPair, Ui};
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};

    type Log = Rc<RefCell<Vec<&'static str>>>;

    #[derive(Default)]
    struct FakeTarget {
        fail_fetch: bool,
        async_enabled: Cell<bool>,
        fetches: Cell<usize>,
    }

    impl Target for FakeTarget {
        fn fetch_inferior_event(&self, event_loop: &mut EventLoop) -> EventLoopResult<()> {
            self.fetches.set(self.fetches.get() + 1);
            if self.fail_fetch {
                return Err(miette::miette!("remote connection closed"));
            }
            event_loop.inferior_event_handler(InferiorEventKind::ExecComplete)
        }

        fn has_execution(&self) -> bool { true }

        fn can_async(&self) -> bool { true }

        fn set_async(&self, _: &mut EventLoop, enable: bool) -> EventLoopResult<()> {
            self.async_enabled.set(enable);
            Ok(())
        }
    }

    fn push(
        log: &Log,
        entry: &'static str,
    ) -> impl FnOnce(&mut EventLoop) -> EventLoopResult<()> + 'static {
        let log = Rc::clone(log);
        move |_| {
            log.borrow_mut().push(entry);
            Ok(())
        }
    }

    #[test]
    fn test_exec_complete_runs_queues_in_order() {
        let mut event_loop = EventLoop::new();
        let target = Rc::new(FakeTarget::default());
        target.async_enabled.set(true);
        event_loop.attach_target(target.clone());

        let log: Log = Rc::default();
        event_loop.add_breakpoint_commands(push(&log, "breakpoint commands"));
        event_loop.add_continuation(push(&log, "inferior"));
        event_loop.add_intermediate_continuation(ThreadId(2), push(&log, "thread 2"));
        event_loop.add_intermediate_continuation(ThreadId(1), push(&log, "thread 1"));

        assert!(event_loop.mark_inferior_event());
        assert!(event_loop.check_async_event_handlers().unwrap());

        assert_eq!(target.fetches.get(), 1);
        assert!(!target.async_enabled.get());
        assert_eq!(*log.borrow(), vec![
            "thread 1",
            "thread 2",
            "inferior",
            "breakpoint commands"
        ]);
        assert_eq!(event_loop.continuations().pending_counts(), (0, 0, 0));
    }

    #[test]
    fn test_exec_continue_runs_only_intermediate() {
        let mut event_loop = EventLoop::new();
        let log: Log = Rc::default();
        event_loop.add_intermediate_continuation(ThreadId(1), push(&log, "step"));
        event_loop.add_continuation(push(&log, "finish"));

        event_loop
            .inferior_event_handler(InferiorEventKind::ExecContinue)
            .unwrap();
        assert_eq!(*log.borrow(), vec!["step"]);
        assert_eq!(event_loop.continuations().pending_counts(), (0, 1, 0));
    }

    #[test]
    fn test_error_discards_and_reenables_input() {
        let pair = SocketPair::new().unwrap();
        let mut event_loop = EventLoop::new();
        let id = event_loop
            .add_ui(Ui::new(
                pair.reader.try_clone().unwrap(),
                CapturedOutput::new(),
                |_, _, _| Ok(()),
            ))
            .unwrap();
        event_loop.disable_console_input(id).unwrap();

        let log: Log = Rc::default();
        event_loop.add_continuation(push(&log, "never"));
        event_loop.add_breakpoint_commands(push(&log, "never either"));
        event_loop.inferior_event_handler(InferiorEventKind::Error).unwrap();

        assert!(log.borrow().is_empty());
        assert_eq!(event_loop.continuations().pending_counts(), (0, 0, 0));
        let console = event_loop.ui(id).unwrap();
        assert_eq!(console.prompt_state(), PromptState::Needed);
        assert!(event_loop.notifier().contains(console.input_fd()));
    }

    #[test]
    fn test_fetch_error_propagates_only_for_foreground_command() {
        let pair = SocketPair::new().unwrap();
        let output = CapturedOutput::new();
        let mut event_loop = EventLoop::new();
        let id = event_loop
            .add_ui(Ui::new(
                pair.reader.try_clone().unwrap(),
                output.clone(),
                |_, _, _| Ok(()),
            ))
            .unwrap();
        event_loop.attach_target(Rc::new(FakeTarget {
            fail_fetch: true,
            ..FakeTarget::default()
        }));
        let log: Log = Rc::default();

        // Idle console: reported and swallowed.
        event_loop.add_breakpoint_commands(push(&log, "rolled back"));
        event_loop
            .inferior_event_handler(InferiorEventKind::RegEvent)
            .unwrap();
        assert!(output.contents().contains("remote connection closed"));
        assert!(output.contents().ends_with("(evl) "));
        assert_eq!(event_loop.ui(id).unwrap().prompt_state(), PromptState::Prompted);
        assert_eq!(event_loop.continuations().pending_counts(), (0, 0, 0));

        // Foreground command: propagates, and input comes back.
        event_loop.disable_console_input(id).unwrap();
        event_loop.add_breakpoint_commands(push(&log, "rolled back"));
        let result = event_loop.inferior_event_handler(InferiorEventKind::RegEvent);
        assert!(result.is_err());
        assert_eq!(event_loop.continuations().pending_counts(), (0, 0, 0));
        assert_eq!(event_loop.ui(id).unwrap().prompt_state(), PromptState::Needed);
        assert!(log.borrow().is_empty());
    }

    fn failing(message: &'static str) -> impl FnOnce(&mut EventLoop) -> EventLoopResult<()> {
        move |_| Err(miette::miette!("{}", message))
    }

    #[test]
    fn test_failing_breakpoint_command_during_fetch_propagates_once() {
        let pair = SocketPair::new().unwrap();
        let output = CapturedOutput::new();
        let mut event_loop = EventLoop::new();
        let id = event_loop
            .add_ui(Ui::new(
                pair.reader.try_clone().unwrap(),
                output.clone(),
                |_, _, _| Ok(()),
            ))
            .unwrap();
        event_loop.attach_target(Rc::new(FakeTarget::default()));
        event_loop.disable_console_input(id).unwrap();

        event_loop.add_breakpoint_commands(failing("breakpoint command failed"));
        assert!(event_loop.mark_inferior_event());
        let result = event_loop.do_one_event();

        let report = result.unwrap_err();
        assert!(format!("{report:?}").contains("breakpoint command failed"));
        assert_eq!(output.contents(), "");
        let console = event_loop.ui(id).unwrap();
        assert_eq!(console.prompt_state(), PromptState::Needed);
        assert!(event_loop.notifier().contains(console.input_fd()));
        assert_eq!(event_loop.continuations().pending_counts(), (0, 0, 0));
    }

    #[test]
    fn test_failing_breakpoint_command_ends_with_a_prompt() {
        let pair = SocketPair::new().unwrap();
        let output = CapturedOutput::new();
        let mut event_loop = EventLoop::new();
        let id = event_loop
            .add_ui(
                Ui::new(
                    pair.reader.try_clone().unwrap(),
                    output.clone(),
                    |_, _, _| Ok(()),
                )
                .with_prompt("(gdb) "),
            )
            .unwrap();
        event_loop.attach_target(Rc::new(FakeTarget::default()));
        event_loop.disable_console_input(id).unwrap();
        event_loop.add_breakpoint_commands(failing("breakpoint command failed"));
        event_loop.mark_inferior_event();

        let observed = Rc::new(Cell::new(None));
        {
            let observed = Rc::clone(&observed);
            event_loop.create_timer(std::time::Duration::from_millis(20), move |event_loop| {
                observed.set(event_loop.ui(id).map(Ui::prompt_state));
                drop(event_loop.remove_ui(id));
                drop(event_loop.detach_target());
                Ok(())
            });
        }
        event_loop.start_event_loop();

        assert_eq!(observed.get(), Some(PromptState::Prompted));
        let contents = output.contents();
        assert_eq!(contents.matches("breakpoint command failed").count(), 1);
        assert!(contents.ends_with("(gdb) "));
    }

    #[test]
    fn test_failed_continuation_rolls_back_breakpoint_commands() {
        let mut event_loop = EventLoop::new();
        let log: Log = Rc::default();

        event_loop.add_continuation(failing("finish failed"));
        event_loop.add_breakpoint_commands(push(&log, "stale"));
        event_loop
            .inferior_event_handler(InferiorEventKind::ExecComplete)
            .unwrap();
        assert_eq!(event_loop.continuations().pending_counts(), (0, 0, 0));

        event_loop.add_intermediate_continuation(ThreadId(1), failing("step failed"));
        event_loop.add_continuation(push(&log, "stale"));
        event_loop
            .inferior_event_handler(InferiorEventKind::ExecComplete)
            .unwrap();
        assert_eq!(event_loop.continuations().pending_counts(), (0, 0, 0));

        // The next stop runs nothing queued for the failed one.
        event_loop
            .inferior_event_handler(InferiorEventKind::ExecComplete)
            .unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_detach_target_deletes_its_handler() {
        let mut event_loop = EventLoop::new();
        event_loop.attach_target(Rc::new(FakeTarget::default()));
        assert!(event_loop.detach_target().is_some());
        assert!(!event_loop.mark_inferior_event());
        assert!(event_loop.target().is_none());
    }
}
