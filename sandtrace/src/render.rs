/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! One-line descriptions of trapped syscalls, in the style of strace.

use std::fmt::Write;

use sandtrace_ptrace::ArgRegs;
use sandtrace_ptrace::Pid;

use crate::resolver::ArgKind;
use crate::resolver::SyscallDescriptor;

/// Describes a syscall with its decoded path, e.g.
/// `[pid 42] access("/etc/hosts", 4)`.
pub fn path_line(
    pid: Pid,
    desc: &SyscallDescriptor,
    path: &str,
    secondary: Option<u64>,
) -> String {
    let mut line = format!("[pid {}] {}({:?}", pid, desc.name, path);
    if let Some(value) = secondary {
        let _ = write!(line, ", {}", value as i64);
    }
    line.push(')');
    line
}

/// Describes a syscall from its raw argument registers, e.g.
/// `[pid 42] openat(-100, 0x7ffd5c2e1a40, 0, 0)`. Addresses are shown in hex
/// and integers in signed decimal. Only the arguments the syscall takes are
/// shown.
pub fn basic_line(pid: Pid, desc: &SyscallDescriptor, args: &ArgRegs) -> String {
    let mut line = format!("[pid {}] {}(", pid, desc.name);

    for (i, (kind, value)) in desc.args.iter().zip(args.iter()).enumerate() {
        if i > 0 {
            line.push_str(", ");
        }
        let _ = match kind {
            ArgKind::String | ArgKind::Pointer => write!(line, "{:#x}", value),
            ArgKind::Integer => write!(line, "{}", *value as i64),
        };
    }

    line.push(')');
    line
}
