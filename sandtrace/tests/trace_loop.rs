/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Drives the trace loop with a scripted sequence of wait statuses.

use core::fmt;
use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::VecDeque;

use quickcheck_macros::quickcheck;
use sandtrace::Error;
use sandtrace::ExitStatus;
use sandtrace::Logger;
use sandtrace::Phase;
use sandtrace::Pid;
use sandtrace::SyscallTable;
use sandtrace::TraceConfig;
use sandtrace::TraceLoop;
use sandtrace::Tracee;
use sandtrace_ptrace::ArgRegs;
use sandtrace_ptrace::Errno;
use sandtrace_ptrace::Options;
use sandtrace_ptrace::Signal;
use sandtrace_ptrace::SyscallRegs;
use sandtrace_ptrace::WaitResult;

const ROOT: Pid = Pid::from_raw(100);
const CHILD: Pid = Pid::from_raw(101);

fn exited(code: i32) -> i32 {
    code << 8
}

fn signaled(sig: Signal) -> i32 {
    sig as i32
}

fn stopped(sig: Signal, event: i32) -> i32 {
    (event << 16) | ((sig as i32) << 8) | 0x7f
}

fn seccomp() -> i32 {
    stopped(Signal::SIGTRAP, libc::PTRACE_EVENT_SECCOMP)
}

fn trap() -> i32 {
    stopped(Signal::SIGTRAP, 0)
}

#[derive(Clone, Copy, Debug)]
struct FakeRegs {
    nr: u64,
    args: ArgRegs,
}

impl SyscallRegs for FakeRegs {
    fn syscall_number(&self) -> u64 {
        self.nr
    }

    fn args(&self) -> ArgRegs {
        self.args
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Op {
    SetOptions(Pid, Options),
    Resume(Pid),
}

/// Replays wait statuses and records every request the loop makes.
#[derive(Default)]
struct FakeTracee {
    script: VecDeque<Result<Option<WaitResult>, Errno>>,
    regs: HashMap<Pid, VecDeque<FakeRegs>>,
    memory: HashMap<u64, String>,
    ops: Vec<Op>,
    waits: usize,
}

impl FakeTracee {
    fn new() -> Self {
        Self::default()
    }

    fn status(mut self, pid: Pid, status: i32) -> Self {
        self.script.push_back(Ok(Some(WaitResult { pid, status })));
        self
    }

    fn wait_error(mut self, err: Errno) -> Self {
        self.script.push_back(Err(err));
        self
    }

    fn syscall(mut self, pid: Pid, nr: u64, args: ArgRegs) -> Self {
        self.regs
            .entry(pid)
            .or_default()
            .push_back(FakeRegs { nr, args });
        self.status(pid, seccomp())
    }

    fn string(mut self, addr: u64, s: &str) -> Self {
        self.memory.insert(addr, s.to_owned());
        self
    }

    fn resumed(&self) -> Vec<Pid> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Resume(pid) => Some(*pid),
                _ => None,
            })
            .collect()
    }
}

impl Tracee for FakeTracee {
    type Regs = FakeRegs;

    fn set_options(&mut self, pid: Pid, options: Options) -> Result<(), Error> {
        self.ops.push(Op::SetOptions(pid, options));
        Ok(())
    }

    fn resume(&mut self, pid: Pid) -> Result<(), Error> {
        self.ops.push(Op::Resume(pid));
        Ok(())
    }

    fn wait_any(&mut self) -> Result<Option<WaitResult>, Errno> {
        self.waits += 1;
        assert!(self.waits < 1000, "the loop did not stop waiting");
        self.script.pop_front().unwrap_or(Ok(None))
    }

    fn regs(&mut self, pid: Pid) -> Result<FakeRegs, Error> {
        self.regs
            .get_mut(&pid)
            .and_then(|queue| queue.pop_front())
            .ok_or(Error::Trace(sandtrace_ptrace::Error::Died(pid)))
    }

    fn read_string(&mut self, _pid: Pid, addr: u64, config: &TraceConfig) -> Result<String, Errno> {
        let s = self.memory.get(&addr).ok_or(Errno::EFAULT)?;
        if s.len() >= config.max_string_len {
            return Err(Errno::ENAMETOOLONG);
        }
        Ok(s.clone())
    }

    fn cmdline(&mut self, pid: Pid) -> String {
        format!("fake-{}", pid)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Level {
    Info,
    Error,
}

#[derive(Default)]
struct CapturingLogger {
    lines: RefCell<Vec<(Level, String)>>,
}

impl CapturingLogger {
    fn lines(&self, level: Level) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, line)| line.clone())
            .collect()
    }

    fn contains(&self, level: Level, needle: &str) -> bool {
        self.lines(level).iter().any(|line| line.contains(needle))
    }
}

impl Logger for CapturingLogger {
    fn info(&self, args: fmt::Arguments) {
        self.lines.borrow_mut().push((Level::Info, args.to_string()));
    }

    fn error(&self, args: fmt::Arguments) {
        self.lines.borrow_mut().push((Level::Error, args.to_string()));
    }
}

fn attached(
    tracee: FakeTracee,
    logger: &CapturingLogger,
) -> TraceLoop<FakeTracee, SyscallTable, &CapturingLogger> {
    let mut tracer = TraceLoop::new(tracee, SyscallTable, logger, TraceConfig::default());
    tracer.attach(ROOT).unwrap();
    tracer
}

#[test]
fn exec_then_exit() {
    let logger = CapturingLogger::default();
    let tracee = FakeTracee::new()
        .status(ROOT, trap())
        .status(ROOT, exited(0));
    let mut tracer = TraceLoop::new(tracee, SyscallTable, &logger, TraceConfig::default());

    assert_eq!(tracer.state().phase(), Phase::Launching);

    tracer.attach(ROOT).unwrap();
    assert_eq!(tracer.state().phase(), Phase::Attached);
    assert_eq!(tracer.state().registry.len(), 1);
    assert!(tracer.state().registry.contains(ROOT));
    assert_eq!(tracer.state().current, Some(ROOT));

    assert!(!tracer.step());
    assert!(tracer.state().registry.is_empty());
    assert_eq!(tracer.state().phase(), Phase::Terminated);
    assert_eq!(tracer.state().events, 2);
    assert_eq!(tracer.state().root_status, Some(ExitStatus::SUCCESS));

    assert_eq!(
        tracer.tracee().ops,
        [
            Op::SetOptions(ROOT, TraceConfig::default_options()),
            Op::Resume(ROOT)
        ]
    );

    // Nothing happens once tracing is over.
    assert!(!tracer.step());
    assert_eq!(tracer.tracee().waits, 2);
}

#[test]
fn options_are_set_before_every_resume() {
    let logger = CapturingLogger::default();
    let mut tracer = attached(
        FakeTracee::new()
            .status(ROOT, trap())
            .status(ROOT, stopped(Signal::SIGCHLD, 0))
            .status(ROOT, stopped(Signal::SIGSTOP, 0))
            .status(ROOT, exited(0)),
        &logger,
    );

    tracer.run();

    let options = TraceConfig::default_options();
    assert!(options.contains(Options::PTRACE_O_TRACESECCOMP));
    assert!(options.contains(Options::PTRACE_O_TRACEFORK));
    assert!(options.contains(Options::PTRACE_O_TRACEVFORK));
    assert!(options.contains(Options::PTRACE_O_TRACECLONE));

    assert_eq!(
        tracer.tracee().ops,
        [
            Op::SetOptions(ROOT, options),
            Op::Resume(ROOT),
            Op::SetOptions(ROOT, options),
            Op::Resume(ROOT),
            Op::SetOptions(ROOT, options),
            Op::Resume(ROOT),
        ]
    );
}

#[cfg(target_arch = "x86_64")]
#[test]
fn path_syscall_is_rendered() {
    let logger = CapturingLogger::default();
    let mut tracer = attached(
        FakeTracee::new()
            .status(ROOT, trap())
            .syscall(ROOT, 21, [0x1000, 4, 0, 0, 0, 0])
            .string(0x1000, "/etc/passwd")
            .status(ROOT, exited(0)),
        &logger,
    );

    assert!(tracer.step());
    assert_eq!(tracer.state().current, Some(ROOT));
    assert_eq!(tracer.state().phase(), Phase::Running);

    assert_eq!(
        logger.lines(Level::Info)[1..],
        [
            r#"[pid 100] access("/etc/passwd", 4)"#,
            "[pid 100] access(0x1000, 4)",
        ]
    );

    assert!(!tracer.step());
    assert_eq!(tracer.tracee().resumed(), [ROOT, ROOT]);
    assert!(logger.lines(Level::Error).is_empty());
}

#[cfg(target_arch = "x86_64")]
#[test]
fn openat_path_and_flags() {
    let logger = CapturingLogger::default();
    let mut tracer = attached(
        FakeTracee::new()
            .status(ROOT, trap())
            .syscall(ROOT, 257, [-100i64 as u64, 0x2000, 0o2000000, 0, 0, 0])
            .string(0x2000, "/lib/x86_64-linux-gnu/libc.so.6")
            .status(ROOT, exited(0)),
        &logger,
    );

    tracer.run();

    assert!(logger.contains(
        Level::Info,
        r#"[pid 100] openat("/lib/x86_64-linux-gnu/libc.so.6", 524288)"#
    ));
    assert!(logger.contains(Level::Info, "[pid 100] openat(-100, 0x2000, 524288, 0)"));
}

#[cfg(target_arch = "x86_64")]
#[test]
fn non_path_syscall_gets_basic_line_only() {
    let logger = CapturingLogger::default();
    let mut tracer = attached(
        FakeTracee::new()
            .status(ROOT, trap())
            .syscall(ROOT, 62, [42, 9, 0, 0, 0, 0])
            .status(ROOT, exited(0)),
        &logger,
    );

    tracer.run();

    let info = logger.lines(Level::Info);
    assert!(info.contains(&"[pid 100] kill(42, 9)".to_owned()));
    assert!(!info.iter().any(|line| line.contains('"')));
}

#[test]
fn fork_grows_and_shrinks_registry() {
    let logger = CapturingLogger::default();
    let mut tracer = attached(
        FakeTracee::new()
            .status(ROOT, trap())
            .status(ROOT, stopped(Signal::SIGTRAP, libc::PTRACE_EVENT_FORK))
            .status(CHILD, stopped(Signal::SIGSTOP, 0))
            .status(CHILD, exited(0))
            .status(ROOT, stopped(Signal::SIGCHLD, 0))
            .status(ROOT, exited(0)),
        &logger,
    );

    // Fork event: the child has not been seen yet.
    assert!(tracer.step());
    assert_eq!(tracer.state().registry.len(), 1);
    assert!(logger.contains(Level::Info, "process 100 stopped at fork event (fake-100)"));

    // The child's first stop registers it.
    assert!(tracer.step());
    assert_eq!(tracer.state().registry.len(), 2);
    assert!(tracer.state().registry.contains(CHILD));
    assert_eq!(tracer.state().current, Some(CHILD));

    // The child's exit only removes the child.
    assert!(tracer.step());
    assert_eq!(tracer.state().registry.len(), 1);
    assert!(!tracer.state().registry.contains(CHILD));
    assert_eq!(tracer.state().current, None);
    assert!(!tracer.state().done);

    assert!(tracer.step());
    assert!(!tracer.step());

    assert_eq!(tracer.state().root_status, Some(ExitStatus::SUCCESS));
    // The exited child is never resumed again.
    assert_eq!(tracer.tracee().resumed(), [ROOT, ROOT, CHILD, ROOT]);
}

#[test]
fn child_seen_before_clone_event() {
    let logger = CapturingLogger::default();
    let mut tracer = attached(
        FakeTracee::new()
            .status(ROOT, trap())
            .status(CHILD, stopped(Signal::SIGSTOP, 0))
            .status(ROOT, stopped(Signal::SIGTRAP, libc::PTRACE_EVENT_CLONE))
            .status(CHILD, exited(0))
            .status(ROOT, exited(0)),
        &logger,
    );

    assert!(tracer.step());
    assert!(tracer.state().registry.contains(CHILD));
    assert!(tracer.step());
    assert_eq!(tracer.state().registry.len(), 2);

    assert_eq!(tracer.run(), Some(ExitStatus::SUCCESS));
    assert!(tracer.state().registry.is_empty());
}

#[test]
fn root_exit_drains_descendants() {
    let logger = CapturingLogger::default();
    let mut tracer = attached(
        FakeTracee::new()
            .status(ROOT, trap())
            .status(CHILD, stopped(Signal::SIGSTOP, 0))
            .status(ROOT, exited(3))
            .status(CHILD, exited(0)),
        &logger,
    );

    assert!(tracer.step());
    assert!(tracer.step());
    assert_eq!(tracer.state().phase(), Phase::Draining);
    assert_eq!(tracer.state().root_status, Some(ExitStatus::Exited(3)));

    assert!(!tracer.step());
    // The child's exit code does not replace the root's.
    assert_eq!(tracer.state().root_status, Some(ExitStatus::Exited(3)));
}

#[test]
fn every_live_stop_resumes_the_same_pid() {
    let stops = [
        seccomp(),
        stopped(Signal::SIGTRAP, libc::PTRACE_EVENT_EXIT),
        stopped(Signal::SIGTRAP, libc::PTRACE_EVENT_CLONE),
        stopped(Signal::SIGTRAP, libc::PTRACE_EVENT_FORK),
        stopped(Signal::SIGTRAP, libc::PTRACE_EVENT_VFORK),
        stopped(Signal::SIGTRAP, libc::PTRACE_EVENT_VFORK_DONE),
        stopped(Signal::SIGTRAP, libc::PTRACE_EVENT_EXEC),
        stopped(Signal::SIGTRAP, libc::PTRACE_EVENT_STOP),
        trap(),
        stopped(Signal::SIGCHLD, 0),
        stopped(Signal::SIGSTOP, 0),
        stopped(Signal::SIGUSR1, 0),
    ];

    for status in stops {
        let logger = CapturingLogger::default();
        let mut tracer = attached(
            FakeTracee::new()
                .status(ROOT, trap())
                .status(CHILD, status)
                .status(CHILD, exited(0))
                .status(ROOT, exited(0)),
            &logger,
        );

        assert!(tracer.step());
        assert_eq!(tracer.state().current, Some(CHILD), "status {:#x}", status);
        assert!(tracer.state().registry.contains(CHILD));

        // The next iteration resumes it and then sees it exit.
        assert!(tracer.step());
        assert_eq!(tracer.tracee().resumed().last(), Some(&CHILD));
        assert!(!tracer.state().registry.contains(CHILD));
    }
}

#[test]
fn signaled_process_is_removed() {
    let logger = CapturingLogger::default();
    let mut tracer = attached(
        FakeTracee::new()
            .status(ROOT, trap())
            .status(ROOT, signaled(Signal::SIGKILL)),
        &logger,
    );

    assert_eq!(
        tracer.run(),
        Some(ExitStatus::Signaled(Signal::SIGKILL, false))
    );
    assert!(tracer.state().registry.is_empty());
    assert!(logger.contains(Level::Error, "process 100 killed by SIGKILL"));
    assert_eq!(tracer.tracee().resumed(), [ROOT]);
}

#[test]
fn signaled_unknown_pid_is_tolerated() {
    let logger = CapturingLogger::default();
    let mut tracer = attached(
        FakeTracee::new()
            .status(ROOT, trap())
            .status(Pid::from_raw(555), signaled(Signal::SIGTERM))
            .status(ROOT, exited(0)),
        &logger,
    );

    assert!(tracer.step());
    assert_eq!(tracer.state().registry.len(), 1);
    assert!(!tracer.step());
}

#[test]
fn wait_failure_with_live_processes_keeps_waiting() {
    let logger = CapturingLogger::default();
    let mut tracer = attached(
        FakeTracee::new()
            .status(ROOT, trap())
            .wait_error(Errno::EINVAL)
            .status(ROOT, exited(0)),
        &logger,
    );

    assert!(tracer.step());
    assert!(!tracer.state().done);
    assert_eq!(tracer.state().current, None);
    assert!(logger.contains(Level::Error, "wait failed with 1 processes still traced"));

    assert!(!tracer.step());
    // Nothing was resumed after the failed wait.
    assert_eq!(tracer.tracee().resumed(), [ROOT]);
}

#[test]
fn no_children_with_live_registry_is_not_the_end() {
    let logger = CapturingLogger::default();
    let mut tracer = attached(
        FakeTracee::new()
            .status(ROOT, trap())
            .status(ROOT, stopped(Signal::SIGTRAP, libc::PTRACE_EVENT_EXEC)),
        &logger,
    );

    for _ in 0..10 {
        assert!(tracer.step());
    }
    assert_eq!(tracer.state().phase(), Phase::Running);
}

#[test]
fn register_failure_skips_event() {
    let logger = CapturingLogger::default();
    let mut tracer = attached(
        FakeTracee::new()
            .status(ROOT, trap())
            .status(ROOT, seccomp())
            .status(ROOT, exited(0)),
        &logger,
    );

    assert!(tracer.step());
    assert_eq!(tracer.state().current, Some(ROOT));
    assert!(logger.contains(Level::Error, "cannot read registers of 100"));
    assert!(!tracer.step());
}

#[test]
fn unknown_syscall_skips_event() {
    let logger = CapturingLogger::default();
    let mut tracer = attached(
        FakeTracee::new()
            .status(ROOT, trap())
            .syscall(ROOT, 100_000, [0; 6])
            .status(ROOT, exited(0)),
        &logger,
    );

    assert!(tracer.step());
    assert!(logger.contains(Level::Error, "unknown syscall number 100000 in process 100"));
    assert_eq!(tracer.state().current, Some(ROOT));
    assert!(!tracer.step());
    assert_eq!(tracer.tracee().resumed(), [ROOT, ROOT]);
}

#[cfg(target_arch = "x86_64")]
#[test]
fn unreadable_path_skips_event() {
    let logger = CapturingLogger::default();
    let mut tracer = attached(
        FakeTracee::new()
            .status(ROOT, trap())
            .syscall(ROOT, 21, [0xdead, 0, 0, 0, 0, 0])
            .status(ROOT, exited(0)),
        &logger,
    );

    assert!(tracer.step());
    assert!(logger.contains(Level::Error, "cannot read access path of 100"));
    assert!(!logger.contains(Level::Info, "access("));
    assert_eq!(tracer.state().current, Some(ROOT));
}

#[cfg(target_arch = "x86_64")]
#[test]
fn overlong_path_skips_event() {
    let logger = CapturingLogger::default();
    let config = TraceConfig {
        max_string_len: 8,
        ..Default::default()
    };
    let mut tracer = TraceLoop::new(
        FakeTracee::new()
            .status(ROOT, trap())
            .syscall(ROOT, 21, [0x1000, 0, 0, 0, 0, 0])
            .string(0x1000, "/a/rather/long/path")
            .status(ROOT, exited(0)),
        SyscallTable,
        &logger,
        config,
    );
    tracer.attach(ROOT).unwrap();

    assert_eq!(tracer.run(), Some(ExitStatus::SUCCESS));
    assert!(logger.contains(Level::Error, "cannot read access path of 100"));
    assert!(!logger.contains(Level::Info, "access("));
}

#[test]
fn unrecognized_stop_is_logged() {
    let logger = CapturingLogger::default();
    let mut tracer = attached(
        FakeTracee::new()
            .status(ROOT, trap())
            .status(ROOT, stopped(Signal::SIGUSR1, 0))
            .status(ROOT, exited(0)),
        &logger,
    );

    assert!(tracer.step());
    assert!(logger.contains(Level::Error, "process 100 unrecognized stop"));
    assert!(logger.contains(Level::Error, "(fake-100)"));
}

#[test]
fn attach_without_a_stop_fails() {
    let logger = CapturingLogger::default();
    let mut tracer = TraceLoop::new(
        FakeTracee::new(),
        SyscallTable,
        &logger,
        TraceConfig::default(),
    );

    assert!(tracer.attach(ROOT).is_err());
}

#[test]
fn root_dying_before_first_stop_ends_tracing() {
    let logger = CapturingLogger::default();
    let mut tracer = TraceLoop::new(
        FakeTracee::new().status(ROOT, exited(127)),
        SyscallTable,
        &logger,
        TraceConfig::default(),
    );

    tracer.attach(ROOT).unwrap();
    assert!(tracer.state().done);
    assert!(!tracer.step());
    assert_eq!(tracer.run(), Some(ExitStatus::Exited(127)));
    assert!(tracer.tracee().ops.is_empty());
}

/// No sequence of live stops ends tracing while the root is alive, and the
/// root's exit always does.
#[quickcheck]
fn live_root_never_terminates(stops: Vec<u8>) -> bool {
    let logger = CapturingLogger::default();
    let mut tracee = FakeTracee::new().status(ROOT, trap());

    for stop in &stops {
        let status = match stop % 4 {
            0 => trap(),
            1 => stopped(Signal::SIGCHLD, 0),
            2 => stopped(Signal::SIGTRAP, libc::PTRACE_EVENT_FORK),
            _ => stopped(Signal::SIGTRAP, libc::PTRACE_EVENT_EXEC),
        };
        tracee = tracee.status(ROOT, status);
    }
    tracee = tracee.status(ROOT, exited(0));

    let mut tracer = attached(tracee, &logger);

    for _ in &stops {
        if !tracer.step() || tracer.state().current != Some(ROOT) {
            return false;
        }
    }

    !tracer.step() && tracer.state().registry.is_empty()
}
