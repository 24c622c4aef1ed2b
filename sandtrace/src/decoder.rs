/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Reading syscall arguments that live in tracee memory. Integer and pointer
//! arguments come straight from the registers and need nothing from here.

use sandtrace_memory::Addr;
use sandtrace_memory::MemoryAccess;

use crate::config::TraceConfig;
use crate::error::Errno;

/// Reads the NUL terminated string at `addr` out of `memory`, in chunks of
/// `config.chunk_size` bytes and never more than `config.max_string_len` bytes
/// in total. Invalid UTF-8 is replaced rather than rejected.
///
/// Fails with `EFAULT` for a null or unmapped address, `ENAMETOOLONG` when no
/// terminator is found within the bound and `ESRCH` when the process is gone.
pub fn read_string_arg<M>(memory: &M, addr: u64, config: &TraceConfig) -> Result<String, Errno>
where
    M: MemoryAccess + ?Sized,
{
    let addr = usize::try_from(addr)
        .ok()
        .and_then(Addr::from_raw)
        .ok_or(Errno::EFAULT)?;

    let mut buf = vec![0u8; config.chunk_size.max(1)];
    let s = memory.read_cstring_bounded(addr, &mut buf, config.max_string_len)?;

    Ok(s.to_string_lossy().into_owned())
}
