/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Starting the target under ptrace with the profile waiting on its stdin.

use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::fd::OwnedFd;
use std::os::unix::process::CommandExt;
use std::process::Command;
use std::process::Stdio;

use nix::fcntl::FcntlArg;
use nix::fcntl::OFlag;
use nix::fcntl::fcntl;
use nix::unistd::pipe2;
use sandtrace_ptrace::Pid;

use crate::error::Errno;
use crate::error::Error;

/// Creates a pipe whose capacity is at least `len` bytes. Both ends are
/// close-on-exec.
fn sized_pipe(len: usize) -> Result<(OwnedFd, OwnedFd), Error> {
    let (reader, writer) = pipe2(OFlag::O_CLOEXEC)?;

    let capacity = fcntl(writer.as_raw_fd(), FcntlArg::F_GETPIPE_SZ)?;
    if len > capacity as usize {
        let wanted = libc::c_int::try_from(len).map_err(|_| Errno::EFBIG)?;
        let granted = fcntl(writer.as_raw_fd(), FcntlArg::F_SETPIPE_SZ(wanted))?;
        tracing::debug!("grew profile pipe from {} to {} bytes", capacity, granted);
    }

    Ok((reader, writer))
}

/// Spawns `program` with `args` so that it stops with a `SIGTRAP` right after
/// its `execve`, before running any of its own code. The environment is
/// inherited and `input` is all the target will ever read from stdin.
///
/// The input is written out in full, and the write end closed, before the
/// target exists. The target is therefore never blocked on the tracer while
/// the tracer is blocked on the target.
pub fn spawn_traced<S, I, A>(program: S, args: I, input: &[u8]) -> Result<Pid, Error>
where
    S: AsRef<OsStr>,
    I: IntoIterator<Item = A>,
    A: AsRef<OsStr>,
{
    let (reader, writer) = sized_pipe(input.len())?;

    {
        let mut writer = File::from(writer);
        writer.write_all(input)?;
        // Dropping the writer closes it so that the target sees EOF.
    }

    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::from(reader));

    // Only async-signal-safe work may happen between fork and exec.
    unsafe {
        command.pre_exec(|| {
            sandtrace_ptrace::traceme().map_err(|err| io::Error::from_raw_os_error(err.into_raw()))
        });
    }

    let child = command.spawn()?;
    let pid = Pid::from_raw(child.id() as libc::pid_t);

    tracing::debug!("spawned traced process {}", pid);

    Ok(pid)
}
