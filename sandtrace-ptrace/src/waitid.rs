/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! `waitid` based on the `SYS_waitid` syscall, reporting the same compact
//! status integer that `waitpid` would. Flags *must* be explicitly provided;
//! see `waitid(2)` for the valid combinations.

use std::mem::MaybeUninit;

use nix::sys::wait::WaitPidFlag;

use super::Errno;
use super::Pid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdType {
    #[allow(unused)]
    Pid(Pid),
    All,
}

/// Returns the raw siginfo from a waitid call.
fn waitid_si(waitid_type: IdType, flags: WaitPidFlag) -> Result<libc::siginfo_t, Errno> {
    let mut siginfo = MaybeUninit::<libc::siginfo_t>::zeroed();
    let siginfo_ptr: *mut libc::siginfo_t = siginfo.as_mut_ptr();

    let (id_type, id) = match waitid_type {
        IdType::Pid(pid) => (libc::P_PID, pid.as_raw()),
        IdType::All => (libc::P_ALL, -1),
    };

    Errno::result(unsafe { libc::waitid(id_type, id as libc::id_t, siginfo_ptr, flags.bits()) })?;

    Ok(unsafe { siginfo.assume_init() })
}

// Converts a siginfo to the compact status code documented in `wait(2)`.
fn siginfo_to_status(si: &libc::siginfo_t) -> Result<i32, Errno> {
    let si_status = unsafe { si.si_status() };

    Ok(match si.si_code {
        libc::CLD_EXITED => si_status << 8,
        libc::CLD_KILLED => si_status & 0x7f,
        libc::CLD_DUMPED => (si_status | 0x80) & 0xff,
        // For ptrace stops si_status carries `signal | (event << 8)`.
        libc::CLD_TRAPPED => (si_status << 8) | 0x7f,
        libc::CLD_STOPPED => (si_status << 8) | 0x7f,
        libc::CLD_CONTINUED => 0xffff,
        other => {
            tracing::warn!("unexpected si_code {} from waitid", other);
            return Err(Errno::EINVAL);
        }
    })
}

/// Blocks until a child matching `waitid_type` changes state and returns its
/// pid and raw status, or `None` if `WNOHANG` was given and nothing changed.
/// `EINTR` is retried.
pub fn waitid(waitid_type: IdType, flags: WaitPidFlag) -> Result<Option<(Pid, i32)>, Errno> {
    loop {
        let siginfo = match waitid_si(waitid_type, flags) {
            Err(Errno::EINTR) => continue,
            result => result?,
        };

        let pid = unsafe { siginfo.si_pid() };
        if pid == 0 {
            // Still alive.
            return Ok(None);
        }

        return siginfo_to_status(&siginfo).map(|status| Some((Pid::from_raw(pid), status)));
    }
}
