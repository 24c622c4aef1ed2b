/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::collections::BTreeSet;

use sandtrace_ptrace::Pid;

/// The set of processes that are alive and traced.
///
/// A pid is a member from the first time the tracer sees it until the tracer
/// sees it exit. Tracing is over exactly when this set is empty.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProcessRegistry {
    inner: BTreeSet<Pid>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `pid` as seen. Returns true if it was not already known.
    pub fn discover(&mut self, pid: Pid) -> bool {
        self.inner.insert(pid)
    }

    /// Forgets `pid` after its exit. Removing a pid that is not a member is not
    /// an error. Returns true if it was a member.
    pub fn remove(&mut self, pid: Pid) -> bool {
        self.inner.remove(&pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.inner.contains(&pid)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
