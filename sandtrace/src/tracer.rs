/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The trace loop. A single thread alternates between resuming the process
//! that stopped last and waiting for the next process to stop, until no traced
//! process is left.

use sandtrace_ptrace::Errno;
use sandtrace_ptrace::ExitStatus;
use sandtrace_ptrace::Pid;
use sandtrace_ptrace::StopEvent;
use sandtrace_ptrace::SyscallRegs;
use sandtrace_ptrace::WaitResult;

use crate::config::TraceConfig;
use crate::error::Error;
use crate::logger::Logger;
use crate::registry::ProcessRegistry;
use crate::render::basic_line;
use crate::render::path_line;
use crate::resolver::SyscallResolver;
use crate::tracee::Tracee;

/// Where the loop is in its life cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    /// The root has not been attached yet.
    Launching,
    /// The root's first stop has been seen and nothing else yet.
    Attached,
    /// The root is alive.
    Running,
    /// The root is gone but some of its descendants are not.
    Draining,
    /// Every traced process is gone.
    Terminated,
}

/// Everything the loop carries from one iteration to the next.
#[derive(Clone, Debug, Default)]
pub struct LoopState {
    /// Processes that are alive and traced.
    pub registry: ProcessRegistry,
    /// Set once the registry has become empty.
    pub done: bool,
    /// The stopped process to resume at the top of the next iteration.
    pub current: Option<Pid>,
    /// The process that was launched.
    pub root: Option<Pid>,
    /// How the root ended, once it has.
    pub root_status: Option<ExitStatus>,
    /// Number of statuses returned by wait-any so far.
    pub events: u64,
}

impl LoopState {
    pub fn phase(&self) -> Phase {
        if self.done {
            Phase::Terminated
        } else if self.root.is_none() {
            Phase::Launching
        } else if self.root_status.is_some() {
            Phase::Draining
        } else if self.events <= 1 {
            Phase::Attached
        } else {
            Phase::Running
        }
    }
}

/// Drives a tree of traced processes to completion, reporting each trapped
/// syscall to the logger.
pub struct TraceLoop<T, R, L> {
    tracee: T,
    resolver: R,
    logger: L,
    config: TraceConfig,
    state: LoopState,
}

impl<T, R, L> TraceLoop<T, R, L>
where
    T: Tracee,
    R: SyscallResolver,
    L: Logger,
{
    pub fn new(tracee: T, resolver: R, logger: L, config: TraceConfig) -> Self {
        Self {
            tracee,
            resolver,
            logger,
            config,
            state: LoopState::default(),
        }
    }

    /// The state between two iterations.
    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn tracee(&self) -> &T {
        &self.tracee
    }

    /// Takes ownership of the freshly launched `root` and waits for its first
    /// stop. Failing to see that stop is fatal.
    pub fn attach(&mut self, root: Pid) -> Result<(), Error> {
        self.state.root = Some(root);
        self.state.registry.discover(root);

        let wait = self
            .tracee
            .wait_any()?
            .ok_or(Error::Errno(Errno::ECHILD))?;

        self.state.events += 1;
        self.state.registry.discover(wait.pid);

        if wait.event().is_terminal() {
            self.classify(wait);
        } else {
            self.logger.info(format_args!("tracing root process {}", wait.pid));
            self.state.current = Some(wait.pid);
        }

        Ok(())
    }

    /// Runs one iteration: resumes the current process, if any, then waits
    /// for and handles the next status. Returns false once tracing is over.
    pub fn step(&mut self) -> bool {
        if self.state.done {
            return false;
        }

        if let Some(pid) = self.state.current.take() {
            self.resume(pid);
        }

        match self.tracee.wait_any() {
            Ok(Some(wait)) => {
                self.state.events += 1;
                if self.state.registry.discover(wait.pid) {
                    tracing::debug!("discovered traced process {}", wait.pid);
                }
                self.classify(wait);
            }
            Ok(None) => self.wait_failed(Errno::ECHILD),
            Err(err) => self.wait_failed(err),
        }

        !self.state.done
    }

    /// Runs until every traced process is gone and returns how the root ended.
    pub fn run(&mut self) -> Option<ExitStatus> {
        while self.step() {}
        self.state.root_status
    }

    // Resuming with signal 0 discards whatever signal the stop was about to
    // deliver. A process stopped for a synchronous SIGSEGV or SIGBUS re-runs
    // the faulting instruction and stops again, so such a target never makes
    // progress and the loop spins on it.
    fn resume(&mut self, pid: Pid) {
        if let Err(err) = self.tracee.set_options(pid, self.config.options) {
            self.logger
                .error(format_args!("cannot set options on {}: {}", pid, err));
        }
        if let Err(err) = self.tracee.resume(pid) {
            self.logger
                .error(format_args!("cannot resume {}: {}", pid, err));
        }
    }

    fn wait_failed(&mut self, err: Errno) {
        if self.state.registry.is_empty() {
            self.state.done = true;
        } else {
            self.logger.error(format_args!(
                "wait failed with {} processes still traced: {}",
                self.state.registry.len(),
                err
            ));
        }
    }

    fn finished(&mut self, pid: Pid, status: i32) {
        self.state.registry.remove(pid);

        if Some(pid) == self.state.root {
            self.state.root_status = ExitStatus::from_raw(status);
        }

        if self.state.registry.is_empty() {
            self.state.done = true;
        }
    }

    fn classify(&mut self, wait: WaitResult) {
        let pid = wait.pid;

        match wait.event() {
            StopEvent::Exited(code) => {
                self.logger
                    .info(format_args!("process {} exited with {}", pid, code));
                self.finished(pid, wait.status);
            }
            event @ StopEvent::Signaled(..) => {
                self.logger
                    .error(format_args!("process {} {}", pid, event));
                self.finished(pid, wait.status);
            }
            StopEvent::Seccomp => {
                self.state.current = Some(pid);
                self.seccomp(pid);
            }
            event @ (StopEvent::ExitTrap
            | StopEvent::Clone
            | StopEvent::Fork
            | StopEvent::Vfork
            | StopEvent::VforkDone
            | StopEvent::Exec
            | StopEvent::Stop) => {
                self.state.current = Some(pid);
                let cmdline = self.tracee.cmdline(pid);
                self.logger.info(format_args!(
                    "process {} stopped at {} event ({})",
                    pid, event, cmdline
                ));
            }
            event @ (StopEvent::Trap | StopEvent::ChildSignal | StopEvent::StopSignal) => {
                self.state.current = Some(pid);
                let cmdline = self.tracee.cmdline(pid);
                self.logger.info(format_args!(
                    "process {} stopped by {} ({})",
                    pid, event, cmdline
                ));
            }
            event @ StopEvent::Unrecognized { .. } => {
                self.state.current = Some(pid);
                let cmdline = self.tracee.cmdline(pid);
                self.logger
                    .error(format_args!("process {} {} ({})", pid, event, cmdline));
            }
        }
    }

    /// Reports the syscall `pid` is stopped in. Any failure only skips the
    /// report.
    fn seccomp(&mut self, pid: Pid) {
        let regs = match self.tracee.regs(pid) {
            Ok(regs) => regs,
            Err(err) => {
                self.logger
                    .error(format_args!("cannot read registers of {}: {}", pid, err));
                return;
            }
        };

        let desc = match self.resolver.resolve(regs.syscall_number()) {
            Ok(desc) => desc,
            Err(err) => {
                self.logger.error(format_args!("{} in process {}", err, pid));
                return;
            }
        };

        if let Some(addr) = desc.path_arg().and_then(|i| regs.arg(i)) {
            match self.tracee.read_string(pid, addr, &self.config) {
                Ok(path) => {
                    let secondary = desc.secondary_arg().and_then(|j| regs.arg(j));
                    self.logger
                        .info(format_args!("{}", path_line(pid, &desc, &path, secondary)));
                }
                Err(err) => {
                    self.logger.error(format_args!(
                        "cannot read {} path of {}: {}",
                        desc.name, pid, err
                    ));
                    return;
                }
            }
        }

        self.logger
            .info(format_args!("{}", basic_line(pid, &desc, &regs.args())));
    }
}
