/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg(target_os = "linux")]

//! A safe, synchronous ptrace API for a tracer that supervises a whole tree
//! of tracees from a single thread.
//!
//! All ptrace requests for a tracee must come from the thread that attached
//! to it; requests from any other thread fail with `ESRCH`, which this API
//! reports as [`Error::Died`].

mod event;
mod exit_status;
mod memory;
mod pid;
mod regs;
mod waitid;

use core::mem::MaybeUninit;

use nix::sys::ptrace;
// Re-exports so that nothing else needs to depend on `nix`.
pub use nix::sys::ptrace::Options;
pub use nix::sys::signal::Signal;
use nix::sys::wait::WaitPidFlag;
pub use syscalls::Errno;
use syscalls::Sysno;
use thiserror::Error;

pub use crate::event::StopEvent;
pub use crate::exit_status::ExitStatus;
pub use crate::pid::Pid;
pub use crate::regs::*;
use crate::waitid::IdType;
use crate::waitid::waitid;

/// An error that occurred during tracing.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    /// A low-level errno.
    #[error(transparent)]
    Errno(#[from] Errno),

    /// The tracee died while we believed it to be stopped.
    #[error("tracee {0} is gone")]
    Died(Pid),
}

impl From<nix::errno::Errno> for Error {
    fn from(err: nix::errno::Errno) -> Self {
        Self::Errno(Errno::new(err as i32))
    }
}

/// The state change of one tracee, as reported by [`wait_any`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WaitResult {
    /// The tracee that changed state.
    pub pid: Pid,
    /// The raw `wait(2)` status. Classify it with [`StopEvent::from_raw`].
    pub status: i32,
}

impl WaitResult {
    /// Classifies the raw status.
    pub fn event(&self) -> StopEvent {
        StopEvent::from_raw(self.status)
    }
}

/// Waits for any child or traced descendant to change state, blocking until
/// the next event. This is equivalent to `waitpid(-1, __WALL)`.
///
/// Returns `Ok(None)` when there are no children left to wait for, which makes
/// it easy to tell "nothing left" apart from a real failure.
pub fn wait_any() -> Result<Option<WaitResult>, Errno> {
    let flags = WaitPidFlag::WEXITED | WaitPidFlag::WSTOPPED | WaitPidFlag::__WALL;

    match waitid(IdType::All, flags) {
        Ok(Some((pid, status))) => Ok(Some(WaitResult { pid, status })),
        // Not possible without WNOHANG.
        Ok(None) => Err(Errno::EAGAIN),
        Err(Errno::ECHILD) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Marks the calling process as a tracee of its parent. Meant to be called in
/// a freshly forked child right before `execve`, which then stops the child
/// with a `SIGTRAP` once the new image is loaded.
pub fn traceme() -> Result<(), Errno> {
    ptrace::traceme().map_err(|err| Errno::new(err as i32))
}

/// A process that is in a stopped state and allows ptrace operations to be
/// performed.
#[derive(Debug, Hash, Eq, PartialEq)]
pub struct Stopped(Pid);

impl Stopped {
    /// Maps an errno from a ptrace request.
    ///
    /// According to ptrace(2), any ptrace operation may return ESRCH
    /// ("No such process") when the tracee died unexpectedly, when it is not
    /// traced by the calling thread, or when it is not stopped. The last two
    /// are programmer errors, so ESRCH is taken to mean the tracee is gone.
    fn map_err(&self, err: Errno) -> Error {
        if err == Errno::ESRCH {
            Error::Died(self.0)
        } else {
            Error::Errno(err)
        }
    }

    fn map_nix_err(&self, err: nix::Error) -> Error {
        self.map_err(Errno::new(err as i32))
    }

    /// Creates a new stopped state for a pid that [`wait_any`] just reported
    /// as stopped.
    ///
    /// Nothing checks that the pid really is in a ptrace-stop; a wrong guess
    /// shows up as [`Error::Died`] on the first request.
    pub fn new_unchecked(pid: Pid) -> Self {
        Stopped(pid)
    }

    /// Returns the process ID of the tracee.
    pub fn pid(&self) -> Pid {
        self.0
    }

    /// Sets the ptracer options.
    pub fn setoptions(&self, options: Options) -> Result<(), Error> {
        ptrace::setoptions(self.0.into(), options).map_err(|err| self.map_nix_err(err))
    }

    /// Gets a set of registers. `which` is `libc::NT_PRSTATUS` for the general
    /// purpose registers.
    fn getregset<T>(&self, which: i32) -> Result<T, Error> {
        let mut regs = MaybeUninit::<T>::uninit();

        let mut iov = libc::iovec {
            iov_base: regs.as_mut_ptr() as *mut libc::c_void,
            iov_len: core::mem::size_of_val(&regs),
        };

        unsafe {
            syscalls::syscall!(
                Sysno::ptrace,
                libc::PTRACE_GETREGSET,
                self.0.as_raw(),
                which,
                &mut iov as *mut _
            )
        }
        .map_err(|err| self.map_err(err))?;

        // PTRACE_GETREGSET shrinks the length to what it actually wrote.
        if iov.iov_len != core::mem::size_of_val(&regs) {
            return Err(Error::Errno(Errno::EIO));
        }

        Ok(unsafe { regs.assume_init() })
    }

    /// Gets the current state of the general purpose registers.
    pub fn getregs(&self) -> Result<Regs, Error> {
        self.getregset(libc::NT_PRSTATUS)
    }

    /// Resumes the tracee, optionally delivering `sig`.
    pub fn resume<T: Into<Option<Signal>>>(self, sig: T) -> Result<(), Error> {
        ptrace::cont(self.0.into(), sig).map_err(|err| self.map_nix_err(err))
    }
}
