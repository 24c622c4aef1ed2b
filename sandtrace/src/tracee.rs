/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The operating system side of tracing, behind a trait so that the trace loop
//! can be driven by a script in tests.

use std::fs;

use sandtrace_ptrace::Errno;
use sandtrace_ptrace::Options;
use sandtrace_ptrace::Pid;
use sandtrace_ptrace::Regs;
use sandtrace_ptrace::Stopped;
use sandtrace_ptrace::SyscallRegs;
use sandtrace_ptrace::WaitResult;

use crate::config::TraceConfig;
use crate::decoder::read_string_arg;
use crate::error::Error;

/// Control over a tree of traced processes.
///
/// Every method except [`Tracee::wait_any`] requires `pid` to be in a
/// ptrace-stop.
pub trait Tracee {
    /// The register snapshot type.
    type Regs: SyscallRegs;

    /// Sets the ptrace options of `pid`.
    fn set_options(&mut self, pid: Pid, options: Options) -> Result<(), Error>;

    /// Resumes `pid` without delivering a signal.
    fn resume(&mut self, pid: Pid) -> Result<(), Error>;

    /// Blocks until any traced process changes state. `Ok(None)` means there is
    /// nothing left to wait for.
    fn wait_any(&mut self) -> Result<Option<WaitResult>, Errno>;

    /// Captures the registers of `pid`.
    fn regs(&mut self, pid: Pid) -> Result<Self::Regs, Error>;

    /// Reads the string argument at `addr` out of `pid`'s memory.
    fn read_string(&mut self, pid: Pid, addr: u64, config: &TraceConfig) -> Result<String, Errno>;

    /// Describes `pid` for diagnostics. Never fails.
    fn cmdline(&mut self, pid: Pid) -> String;
}

/// The real thing, backed by ptrace. Must only be used from the thread that
/// spawned the traced processes.
#[derive(Debug, Default)]
pub struct PtraceTracee {
    _private: (),
}

impl PtraceTracee {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tracee for PtraceTracee {
    type Regs = Regs;

    fn set_options(&mut self, pid: Pid, options: Options) -> Result<(), Error> {
        Ok(Stopped::new_unchecked(pid).setoptions(options)?)
    }

    fn resume(&mut self, pid: Pid) -> Result<(), Error> {
        Ok(Stopped::new_unchecked(pid).resume(None)?)
    }

    fn wait_any(&mut self) -> Result<Option<WaitResult>, Errno> {
        sandtrace_ptrace::wait_any()
    }

    fn regs(&mut self, pid: Pid) -> Result<Regs, Error> {
        Ok(Stopped::new_unchecked(pid).getregs()?)
    }

    fn read_string(&mut self, pid: Pid, addr: u64, config: &TraceConfig) -> Result<String, Errno> {
        read_string_arg(&Stopped::new_unchecked(pid), addr, config)
    }

    fn cmdline(&mut self, pid: Pid) -> String {
        cmdline(pid)
    }
}

/// Returns the command line of `pid` with arguments separated by spaces, or
/// `<unknown>` if it cannot be read.
pub fn cmdline(pid: Pid) -> String {
    match fs::read(format!("/proc/{}/cmdline", pid)) {
        Ok(bytes) if !bytes.is_empty() => {
            let bytes = bytes.strip_suffix(b"\0").unwrap_or(&bytes);
            String::from_utf8_lossy(bytes).replace('\0', " ")
        }
        Ok(_) => "<unknown>".to_owned(),
        Err(err) => {
            tracing::debug!("cannot read command line of {}: {}", pid, err);
            "<unknown>".to_owned()
        }
    }
}
