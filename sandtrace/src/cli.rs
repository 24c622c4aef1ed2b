/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Command line interface and logging setup for the `sandtrace` binary.

use std::io;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

use crate::config::DEFAULT_CHUNK_SIZE;
use crate::config::DEFAULT_MAX_STRING_LEN;
use crate::config::TraceConfig;

/// Runs PROGRAM under ptrace, hands it the sandbox profile read from stdin
/// and logs every syscall its seccomp filter traps.
//
// NOTE: Everything from PROGRAM onwards belongs to the target, including
// arguments that look like our own options.
#[derive(Debug, Clone, Parser)]
#[clap(name = "sandtrace", version)]
pub struct Args {
    /// Direct logging to a file. This can also be set with the RUST_LOG_FILE
    /// environment variable, but the CLI flag takes precedence.
    #[clap(long = "log-file", value_name = "PATH", env = "RUST_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Longest string argument, in bytes including the terminator, that is
    /// read out of a traced process.
    #[clap(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_STRING_LEN)]
    pub max_string_len: usize,

    /// Number of bytes read from a traced process at a time.
    #[clap(long, value_name = "BYTES", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// The program to trace followed by its arguments.
    #[clap(
        value_name = "PROGRAM",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

impl Args {
    /// Path of the program to trace.
    pub fn program(&self) -> &str {
        // clap guarantees at least one value.
        self.command.first().map(String::as_str).unwrap_or_default()
    }

    /// Arguments to the program to trace.
    pub fn program_args(&self) -> &[String] {
        self.command.get(1..).unwrap_or_default()
    }

    pub fn config(&self) -> TraceConfig {
        TraceConfig {
            max_string_len: self.max_string_len,
            chunk_size: self.chunk_size,
            ..Default::default()
        }
    }

    /// Installs the global `tracing` subscriber, writing to the log file if one
    /// was given and to stderr otherwise. The returned guard must be held until
    /// exit so buffered log lines are flushed.
    pub fn init_tracing(&self) -> anyhow::Result<Option<WorkerGuard>> {
        fn set_subscriber_with_writer<T>(writer: T) -> anyhow::Result<()>
        where
            T: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
        {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"));
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Unable to set global default subscriber")
        }

        let Some(path) = self.log_file.as_deref().and_then(unused_log_path) else {
            if self.log_file.is_some() {
                eprintln!(" [sandtrace] WARNING: could not open log file, falling back to stderr");
            }
            set_subscriber_with_writer(io::stderr)?;
            return Ok(None);
        };

        let (parent, filename) = match (path.parent(), path.file_name()) {
            (Some(parent), Some(filename)) => (parent, filename),
            _ => anyhow::bail!("invalid log file path {:?}", path),
        };

        let file_writer = tracing_appender::rolling::never(parent, filename);
        let (file_writer, guard) = tracing_appender::non_blocking(file_writer);

        eprintln!(" [sandtrace] Logging to file at {:?}", path);
        set_subscriber_with_writer(file_writer)?;
        Ok(Some(guard))
    }
}

/// Picks a log file path that does not exist yet, appending a timestamp to the
/// file name if `path` is taken.
fn unused_log_path(path: &Path) -> Option<PathBuf> {
    let parent = path.parent()?;
    let orig_filename = path.file_name()?;
    let mut filename = orig_filename.to_os_string();

    for _ in 0..100 {
        if !parent.join(&filename).exists() {
            return Some(parent.join(filename));
        }
        filename = orig_filename.to_os_string();
        filename.push(format!("{}", Local::now().format(".%Y%m%d.%H%M%S.%f")));
    }

    None
}
