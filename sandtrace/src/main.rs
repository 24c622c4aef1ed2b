/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::io;

use anyhow::Context;
use clap::Parser;
use sandtrace::ExitStatus;
use sandtrace::Profile;
use sandtrace::PtraceTracee;
use sandtrace::SyscallTable;
use sandtrace::TraceLoop;
use sandtrace::TracingLogger;
use sandtrace::cli::Args;
use sandtrace::launch;

/// Everything up to and including the end of the process tree. Returns how
/// the root process ended.
fn trace(args: &Args) -> anyhow::Result<ExitStatus> {
    let profile =
        Profile::from_reader(io::stdin().lock()).context("unable to decode profile data")?;
    let wire = profile
        .to_wire()
        .context("unable to marshal profile data")?;

    tracing::info!(
        "running command {:?} with arguments {:?}",
        args.program(),
        args.program_args()
    );
    tracing::info!("{}", String::from_utf8_lossy(&wire));

    let root = launch::spawn_traced(args.program(), args.program_args(), &wire)
        .with_context(|| format!("unable to start {:?}", args.program()))?;

    let mut tracer = TraceLoop::new(
        PtraceTracee::new(),
        SyscallTable,
        TracingLogger,
        args.config(),
    );
    tracer
        .attach(root)
        .with_context(|| format!("unable to attach to process {}", root))?;

    // An unobserved root exit counts as success.
    let status = tracer.run().unwrap_or(ExitStatus::SUCCESS);
    tracing::info!("traced program ended with {}", status);

    Ok(status)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let log_guard = args.init_tracing()?;

    let status = match trace(&args) {
        Ok(status) => status,
        Err(err) => {
            tracing::error!("{:#}", err);
            drop(log_guard); // Flush logs before exiting.
            std::process::exit(1);
        }
    };

    drop(log_guard); // Flush logs before exiting.
    status.raise_or_exit()
}
