/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Error handling.

use thiserror::Error;

pub use sandtrace_ptrace::Errno;

/// A general error.
#[derive(Error, Debug)]
pub enum Error {
    /// A low-level errno.
    #[error(transparent)]
    Errno(#[from] Errno),

    /// A ptrace request failed.
    #[error(transparent)]
    Trace(#[from] sandtrace_ptrace::Error),

    /// The profile could not be decoded or encoded.
    #[error("invalid profile: {0}")]
    Profile(#[from] serde_json::Error),

    /// An I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The syscall number has no entry in the resolver's table.
    #[error("unknown syscall number {0}")]
    UnknownSyscall(u64),
}

impl From<nix::errno::Errno> for Error {
    fn from(err: nix::errno::Errno) -> Self {
        Self::Errno(Errno::new(err as i32))
    }
}
