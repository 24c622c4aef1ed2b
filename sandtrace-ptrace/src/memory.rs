/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::io;

use sandtrace_memory::Addr;
use sandtrace_memory::MemoryAccess;
use syscalls::Errno;

use super::Stopped;

impl MemoryAccess for Stopped {
    /// Reads from the tracee's address space with `process_vm_readv`. Returns
    /// the number of bytes read.
    ///
    /// Partial transfers happen at the granularity of the remote iovec, so a
    /// read that spans an unmapped page may come back short or empty. Page
    /// faults are reported as an EOF (`Ok(0)`).
    fn read(&self, addr: Addr, buf: &mut [u8]) -> Result<usize, Errno> {
        if buf.is_empty() {
            return Ok(0);
        }

        let remote = libc::iovec {
            iov_base: addr.as_raw() as *mut libc::c_void,
            iov_len: buf.len(),
        };
        let mut local = [io::IoSliceMut::new(buf)];

        Errno::result(unsafe {
            libc::process_vm_readv(
                self.0.as_raw(),
                local.as_mut_ptr() as *const libc::iovec,
                local.len() as libc::c_ulong,
                &remote as *const libc::iovec,
                1,
                0,
            )
        })
        .map(|x| x as usize)
        .or_else(|err| {
            if err == Errno::EFAULT {
                // Treat page faults as an EOF.
                Ok(0)
            } else {
                Err(err)
            }
        })
    }
}
