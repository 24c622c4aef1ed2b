/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use core::fmt;

use nix::sys::signal::Signal;

/// Why a tracee changed state, decoded from a raw `wait` status.
///
/// For a stopped tracee the bits above the low byte of the status hold
/// `signal | (ptrace_event << 8)`. Documentation is from `ptrace(2)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StopEvent {
    /// Stop triggered by a `seccomp(2)` rule returning `SECCOMP_RET_TRACE`.
    Seccomp,

    /// Stop before exit. The tracee is still alive and must be resumed to
    /// finish exiting.
    ExitTrap,

    /// Stop before return from `clone(2)`.
    Clone,

    /// Stop before return from `fork(2)`.
    Fork,

    /// Stop before return from `vfork(2)`.
    Vfork,

    /// Stop after a `vfork(2)` child unblocked its parent by exiting or
    /// execing.
    VforkDone,

    /// Stop before return from `execve(2)`.
    Exec,

    /// Group-stop or `PTRACE_INTERRUPT` stop.
    Stop,

    /// A plain `SIGTRAP` stop, such as the one delivered after a traced
    /// `execve(2)` without `PTRACE_O_TRACEEXEC`.
    Trap,

    /// `SIGCHLD` is about to be delivered.
    ChildSignal,

    /// `SIGSTOP` is about to be delivered. New children start in this state.
    StopSignal,

    /// The tracee exited normally with the given code.
    Exited(i32),

    /// The tracee was killed by a signal, possibly dumping core.
    Signaled(i32, bool),

    /// Anything else, kept raw for diagnostics.
    Unrecognized {
        /// The raw wait status.
        status: i32,
        /// The stop signal encoded in the status.
        signal: i32,
    },
}

const fn trap_event(event: i32) -> i32 {
    libc::SIGTRAP | (event << 8)
}

const SECCOMP: i32 = trap_event(libc::PTRACE_EVENT_SECCOMP);
const EXIT: i32 = trap_event(libc::PTRACE_EVENT_EXIT);
const CLONE: i32 = trap_event(libc::PTRACE_EVENT_CLONE);
const FORK: i32 = trap_event(libc::PTRACE_EVENT_FORK);
const VFORK: i32 = trap_event(libc::PTRACE_EVENT_VFORK);
const VFORK_DONE: i32 = trap_event(libc::PTRACE_EVENT_VFORK_DONE);
const EXEC: i32 = trap_event(libc::PTRACE_EVENT_EXEC);
const STOP: i32 = trap_event(libc::PTRACE_EVENT_STOP);

impl StopEvent {
    /// Classifies a raw `wait` status. This is a pure function of the status.
    pub fn from_raw(status: i32) -> Self {
        if libc::WIFEXITED(status) {
            return Self::Exited(libc::WEXITSTATUS(status));
        }

        if libc::WIFSIGNALED(status) {
            return Self::Signaled(libc::WTERMSIG(status), libc::WCOREDUMP(status));
        }

        match status >> 8 {
            SECCOMP => Self::Seccomp,
            EXIT => Self::ExitTrap,
            CLONE => Self::Clone,
            FORK => Self::Fork,
            VFORK => Self::Vfork,
            VFORK_DONE => Self::VforkDone,
            EXEC => Self::Exec,
            STOP => Self::Stop,
            libc::SIGTRAP => Self::Trap,
            libc::SIGCHLD => Self::ChildSignal,
            libc::SIGSTOP => Self::StopSignal,
            _ => Self::Unrecognized {
                status,
                signal: libc::WSTOPSIG(status),
            },
        }
    }

    /// Returns true if the tracee no longer exists after this event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited(_) | Self::Signaled(_, _))
    }
}

impl fmt::Display for StopEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Seccomp => f.write_str("seccomp"),
            Self::ExitTrap => f.write_str("exit"),
            Self::Clone => f.write_str("clone"),
            Self::Fork => f.write_str("fork"),
            Self::Vfork => f.write_str("vfork"),
            Self::VforkDone => f.write_str("vfork done"),
            Self::Exec => f.write_str("exec"),
            Self::Stop => f.write_str("stop"),
            Self::Trap => f.write_str("SIGTRAP"),
            Self::ChildSignal => f.write_str("SIGCHLD"),
            Self::StopSignal => f.write_str("SIGSTOP"),
            Self::Exited(code) => write!(f, "exited with {}", code),
            Self::Signaled(sig, core) => {
                match Signal::try_from(*sig) {
                    Ok(sig) => write!(f, "killed by {}", sig)?,
                    Err(_) => write!(f, "killed by signal {}", sig)?,
                }
                if *core {
                    f.write_str(" (core dumped)")?;
                }
                Ok(())
            }
            Self::Unrecognized { status, signal } => {
                write!(f, "unrecognized stop (status {:#x}, signal {})", status, signal)
            }
        }
    }
}
