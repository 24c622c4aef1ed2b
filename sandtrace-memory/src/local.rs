/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use super::Addr;
use super::Errno;
use super::MemoryAccess;

/// A window onto memory in the current address space. Addresses outside the
/// window read as unmapped, which makes this a stand-in for a remote process
/// in tests.
#[derive(Debug, Clone, Copy)]
pub struct LocalMemory<'a> {
    bytes: &'a [u8],
}

impl<'a> LocalMemory<'a> {
    /// Creates a view of `bytes`.
    ///
    /// # Example
    /// ```
    /// # use sandtrace_memory::LocalMemory;
    /// let memory = LocalMemory::new(b"hello\0");
    /// ```
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Address of the first byte of the window.
    pub fn base(&self) -> Addr {
        Addr::from(self.bytes)
    }
}

impl MemoryAccess for LocalMemory<'_> {
    fn read(&self, addr: Addr, buf: &mut [u8]) -> Result<usize, Errno> {
        let offset = match addr.as_raw().checked_sub(self.base().as_raw()) {
            Some(offset) if offset < self.bytes.len() => offset,
            _ => return Ok(0),
        };

        let available = &self.bytes[offset..];
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        Ok(count)
    }
}
