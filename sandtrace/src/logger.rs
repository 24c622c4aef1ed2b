/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use core::fmt;

/// Where the trace loop reports what it sees. Logging never fails.
pub trait Logger {
    /// Reports a traced event.
    fn info(&self, args: fmt::Arguments);

    /// Reports a problem with a single event. Tracing carries on.
    fn error(&self, args: fmt::Arguments);
}

impl<L: Logger + ?Sized> Logger for &L {
    fn info(&self, args: fmt::Arguments) {
        (**self).info(args)
    }

    fn error(&self, args: fmt::Arguments) {
        (**self).error(args)
    }
}

/// Forwards to the global `tracing` subscriber.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, args: fmt::Arguments) {
        tracing::info!(target: "sandtrace", "{}", args);
    }

    fn error(&self, args: fmt::Arguments) {
        tracing::error!(target: "sandtrace", "{}", args);
    }
}
