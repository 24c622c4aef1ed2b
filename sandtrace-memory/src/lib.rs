/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

#![deny(missing_docs)]

//! Reading memory out of an address space that may belong to another
//! process. Reads are bounded: a remote string without a NUL terminator
//! produces an error instead of an unbounded scan.

mod addr;
mod local;

use std::ffi::CString;

pub use addr::Addr;
pub use local::LocalMemory;
pub use syscalls::Errno;

/// Trait for accessing potentially remote memory.
pub trait MemoryAccess {
    /// Performs a read starting at the given address. The number of bytes read
    /// is returned. The buffer is not guaranteed to be completely filled, and
    /// `Ok(0)` means the address is not mapped (an "EOF").
    fn read(&self, addr: Addr, buf: &mut [u8]) -> Result<usize, Errno>;

    /// Reads memory in chunks of at most `buf.len()` bytes, never crossing a
    /// page boundary within a single chunk, until `pred` reports how many bytes
    /// of the last chunk it consumed. At most `limit` bytes are read in total.
    ///
    /// Fails with `EFAULT` if unmapped memory is reached first and with
    /// `ENAMETOOLONG` if `limit` is reached first.
    fn read_while<F>(
        &self,
        mut addr: Addr,
        buf: &mut [u8],
        limit: usize,
        mut pred: F,
    ) -> Result<usize, Errno>
    where
        F: FnMut(&[u8]) -> Option<usize>,
    {
        if buf.is_empty() {
            return Err(Errno::EINVAL);
        }

        let mut count = 0;

        while count < limit {
            let len = buf.len().min(addr.bytes_to_page_end()).min(limit - count);

            let read = self.read(addr, &mut buf[..len])?;
            if read == 0 {
                // We hit an "EOF" (an EFAULT) and the predicate never matched.
                return Err(Errno::EFAULT);
            }

            if let Some(used) = pred(&buf[..read]) {
                return Ok(count + used);
            }

            count += read;
            addr = match addr.checked_add(read) {
                Some(next) => next,
                None => return Err(Errno::EFAULT),
            };
        }

        tracing::trace!("gave up on remote read at {} after {} bytes", addr, count);

        Err(Errno::ENAMETOOLONG)
    }

    /// Reads a NUL terminated string using the provided buffer to read it in
    /// chunks. Change the size of the buffer to adjust how many bytes are read
    /// at one time. No more than `max_len` bytes (terminator included) are
    /// ever read.
    fn read_cstring_bounded(
        &self,
        addr: Addr,
        buf: &mut [u8],
        max_len: usize,
    ) -> Result<CString, Errno> {
        let mut accumulator = Vec::new();

        self.read_while(addr, buf, max_len, |slice| {
            if let Some(nul) = slice.iter().position(|&b| b == 0) {
                accumulator.extend(&slice[..nul]);
                Some(nul)
            } else {
                accumulator.extend(slice);
                None
            }
        })?;

        // The accumulator never contains a NUL byte.
        CString::new(accumulator).map_err(|_| Errno::EINVAL)
    }
}
