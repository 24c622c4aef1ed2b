/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use sandtrace_ptrace::Options;

/// Default upper bound, in bytes including the terminator, of a string read
/// out of a tracee. Matches `PATH_MAX`.
pub const DEFAULT_MAX_STRING_LEN: usize = 4096;

/// Default number of bytes fetched from a tracee per read.
pub const DEFAULT_CHUNK_SIZE: usize = 256;

/// Tunables for the trace loop.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TraceConfig {
    /// Largest string argument, terminator included, that is decoded.
    pub max_string_len: usize,

    /// Size of a single read from tracee memory. Reads are additionally split
    /// at page boundaries.
    pub chunk_size: usize,

    /// Options set on a tracee every time it is resumed.
    pub options: Options,
}

impl TraceConfig {
    /// The options every tracee needs: seccomp traps plus auto-attaching to
    /// new children.
    pub fn default_options() -> Options {
        Options::PTRACE_O_TRACESECCOMP
            | Options::PTRACE_O_TRACEFORK
            | Options::PTRACE_O_TRACEVFORK
            | Options::PTRACE_O_TRACECLONE
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_string_len: DEFAULT_MAX_STRING_LEN,
            chunk_size: DEFAULT_CHUNK_SIZE,
            options: Self::default_options(),
        }
    }
}
