/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use core::fmt;

use nix::sys::signal::SigHandler;
use nix::sys::signal::SigSet;
use nix::sys::signal::SigmaskHow;
use nix::sys::signal::Signal;
use nix::sys::signal::{self};

/// Describes the result of a process after it has exited.
///
/// This is similar to `std::process::ExitStatus`, but is easier to match
/// against and can be propagated with [`ExitStatus::raise_or_exit`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub enum ExitStatus {
    /// Program exited with an exit code.
    Exited(i32),
    /// Program killed by signal, with or without a coredump.
    Signaled(Signal, bool),
}

impl ExitStatus {
    /// A successful exit status.
    pub const SUCCESS: Self = ExitStatus::Exited(0);

    /// Constructs an `ExitStatus` from a raw wait status. Returns `None` if the
    /// status does not describe a terminated process.
    pub fn from_raw(status: i32) -> Option<Self> {
        if libc::WIFEXITED(status) {
            Some(ExitStatus::Exited(libc::WEXITSTATUS(status)))
        } else if libc::WIFSIGNALED(status) {
            Signal::try_from(libc::WTERMSIG(status))
                .ok()
                .map(|sig| ExitStatus::Signaled(sig, libc::WCOREDUMP(status)))
        } else {
            None
        }
    }

    /// Propagate the exit status such that the current process exits in the same
    /// way that the child process exited.
    pub fn raise_or_exit(self) -> ! {
        match self {
            ExitStatus::Signaled(signal, core_dump) => {
                if core_dump {
                    // Prevent the current process from producing a core dump as
                    // well when the signal is propagated.
                    let limit = libc::rlimit {
                        rlim_cur: 0,
                        rlim_max: 0,
                    };
                    unsafe { libc::setrlimit(libc::RLIMIT_CORE, &limit) };
                }

                let _ = unsafe { signal::signal(signal, SigHandler::SigDfl) };
                let _ = signal::raise(signal);

                let mut mask = SigSet::empty();
                mask.add(signal);
                let _ = signal::sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&mask), None);

                // In case the signal is not fatal.
                std::process::exit(signal as i32 + 128);
            }
            ExitStatus::Exited(code) => std::process::exit(code),
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exit code {}", code),
            ExitStatus::Signaled(sig, false) => write!(f, "signal {}", sig),
            ExitStatus::Signaled(sig, true) => write!(f, "signal {} (core dumped)", sig),
        }
    }
}
