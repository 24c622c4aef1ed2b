/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

#![cfg(target_os = "linux")]
#![deny(rustdoc::broken_intra_doc_links)]

//! The supervisor half of a process sandbox.
//!
//! The target program is started under ptrace with a sandbox profile waiting
//! on its stdin. The target installs its own seccomp filter from that profile;
//! every syscall the filter traps stops the target, and the tracer decodes the
//! syscall and logs it before letting the target continue. Children of the
//! target are traced as well, and tracing ends once the whole process tree is
//! gone.

pub mod cli;
pub mod config;
pub mod decoder;
mod error;
pub mod launch;
pub mod logger;
pub mod profile;
pub mod registry;
pub mod render;
pub mod resolver;
pub mod tracee;
pub mod tracer;

pub use error::*;

pub use config::TraceConfig;
pub use logger::Logger;
pub use logger::TracingLogger;
pub use profile::Profile;
pub use registry::ProcessRegistry;
pub use resolver::ArgKind;
pub use resolver::SyscallDescriptor;
pub use resolver::SyscallResolver;
pub use resolver::SyscallTable;
pub use tracee::PtraceTracee;
pub use tracee::Tracee;
pub use tracer::LoopState;
pub use tracer::Phase;
pub use tracer::TraceLoop;

pub use sandtrace_ptrace::ExitStatus;
pub use sandtrace_ptrace::Pid;
