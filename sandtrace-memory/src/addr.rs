/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use core::fmt;
use core::num::NonZeroUsize;
use core::ptr::NonNull;

/// Size of a page on every architecture we trace.
const PAGE_SIZE: usize = 0x1000;

/// An address in some address space. We don't know where the memory lives; it
/// can be either in the current process or another process, so this is never
/// dereferenced directly.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Addr(NonZeroUsize);

impl Addr {
    /// Constructs an address from a raw register value. Returns `None` for the
    /// null address.
    pub fn from_raw(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(Self)
    }

    /// Creates an address from a pointer in the current address space.
    pub fn from_ptr<T>(ptr: *const T) -> Option<Self> {
        Self::from_raw(ptr as usize)
    }

    /// Returns the raw integer value of the address.
    pub fn as_raw(self) -> usize {
        self.0.get()
    }

    /// Returns the address `count` bytes past this one, or `None` if that
    /// would wrap around the end of the address space.
    pub fn checked_add(self, count: usize) -> Option<Self> {
        self.as_raw().checked_add(count).and_then(Self::from_raw)
    }

    /// Number of bytes between this address and the start of the next page.
    /// Always in `1..=PAGE_SIZE`.
    pub fn bytes_to_page_end(self) -> usize {
        // Wraps to zero on the last page of the address space.
        next_page(self.as_raw()).wrapping_sub(self.as_raw())
    }
}

impl<T: ?Sized> From<&T> for Addr {
    fn from(inner: &T) -> Self {
        Self(NonNull::from(inner).addr())
    }
}

impl fmt::Debug for Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.as_raw())
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.as_raw())
    }
}

/// Finds the boundary for the next page. Note that this is different than simply
/// aligning an address on a page boundary.
fn next_page(addr: usize) -> usize {
    addr.wrapping_add(PAGE_SIZE) & !(PAGE_SIZE - 1)
}
