/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Mapping raw syscall numbers to names and argument signatures.

use syscalls::Sysno;

use crate::error::Error;

/// How a syscall argument register is interpreted.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ArgKind {
    /// Address of a NUL terminated string in the tracee.
    String,
    /// An address that is shown but never dereferenced.
    Pointer,
    /// A plain integer.
    Integer,
}

/// What a syscall is called and how its arguments are typed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SyscallDescriptor {
    /// The architecture specific syscall number.
    pub number: u64,
    /// The syscall name, as in `syscalls(2)`.
    pub name: &'static str,
    /// One entry per argument register the syscall uses, in order.
    pub args: &'static [ArgKind],
}

impl SyscallDescriptor {
    /// Index of the first string argument, if any.
    pub fn path_arg(&self) -> Option<usize> {
        self.args.iter().position(|kind| *kind == ArgKind::String)
    }

    /// Index of the first integer argument after the path, such as the mode of
    /// `access(2)` or the flags of `openat(2)`.
    pub fn secondary_arg(&self) -> Option<usize> {
        let path = self.path_arg()?;
        self.args[path + 1..]
            .iter()
            .position(|kind| *kind == ArgKind::Integer)
            .map(|i| path + 1 + i)
    }
}

/// Looks up syscall numbers.
pub trait SyscallResolver {
    /// Describes syscall `number`, or fails with [`Error::UnknownSyscall`].
    fn resolve(&self, number: u64) -> Result<SyscallDescriptor, Error>;
}

/// The default resolver: names come from the `syscalls` crate's table for the
/// host architecture and argument kinds from a table of common syscalls.
/// Syscalls without a known signature are given six integer arguments.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyscallTable;

const S: ArgKind = ArgKind::String;
const P: ArgKind = ArgKind::Pointer;
const I: ArgKind = ArgKind::Integer;

const UNKNOWN_SIGNATURE: &[ArgKind] = &[I, I, I, I, I, I];

#[cfg(target_arch = "x86_64")]
fn arch_signature(sysno: Sysno) -> Option<&'static [ArgKind]> {
    // Syscalls that only exist on x86_64 and a few other legacy ABIs.
    let args: &'static [ArgKind] = match sysno {
        Sysno::open => &[S, I, I],
        Sysno::stat | Sysno::lstat => &[S, P],
        Sysno::access => &[S, I],
        Sysno::unlink | Sysno::rmdir => &[S],
        Sysno::mkdir | Sysno::chmod | Sysno::creat => &[S, I],
        Sysno::readlink => &[S, P, I],
        Sysno::rename | Sysno::link | Sysno::symlink => &[S, S],
        Sysno::chown | Sysno::lchown => &[S, I, I],
        Sysno::fork | Sysno::vfork => &[],
        Sysno::newfstatat => &[I, S, P, I],
        _ => return None,
    };
    Some(args)
}

#[cfg(not(target_arch = "x86_64"))]
fn arch_signature(_sysno: Sysno) -> Option<&'static [ArgKind]> {
    None
}

fn signature(sysno: Sysno) -> &'static [ArgKind] {
    if let Some(args) = arch_signature(sysno) {
        return args;
    }

    match sysno {
        Sysno::read | Sysno::write => &[I, P, I],
        Sysno::close => &[I],
        Sysno::fstat => &[I, P],
        Sysno::mmap => &[P, I, I, I, I, I],
        Sysno::mprotect => &[P, I, I],
        Sysno::munmap => &[P, I],
        Sysno::brk => &[P],
        Sysno::ioctl => &[I, I, P],
        Sysno::socket => &[I, I, I],
        Sysno::connect | Sysno::bind => &[I, P, I],
        Sysno::execve => &[S, P, P],
        Sysno::execveat => &[I, S, P, P, I],
        Sysno::kill => &[I, I],
        Sysno::ptrace => &[I, I, P, P],
        Sysno::truncate => &[S, I],
        Sysno::chdir | Sysno::chroot | Sysno::acct => &[S],
        Sysno::statfs => &[S, P],
        Sysno::openat => &[I, S, I, I],
        Sysno::mkdirat | Sysno::fchmodat => &[I, S, I],
        Sysno::unlinkat => &[I, S, I],
        Sysno::renameat => &[I, S, I, S],
        Sysno::renameat2 => &[I, S, I, S, I],
        Sysno::linkat => &[I, S, I, S, I],
        Sysno::symlinkat => &[S, I, S],
        Sysno::readlinkat => &[I, S, P, I],
        Sysno::fchownat => &[I, S, I, I, I],
        Sysno::faccessat => &[I, S, I],
        Sysno::faccessat2 => &[I, S, I, I],
        Sysno::mount => &[S, S, S, I, P],
        Sysno::umount2 => &[S, I],
        Sysno::exit | Sysno::exit_group => &[I],
        _ => UNKNOWN_SIGNATURE,
    }
}

impl SyscallResolver for SyscallTable {
    fn resolve(&self, number: u64) -> Result<SyscallDescriptor, Error> {
        let sysno = usize::try_from(number)
            .ok()
            .and_then(Sysno::new)
            .ok_or(Error::UnknownSyscall(number))?;

        Ok(SyscallDescriptor {
            number,
            name: sysno.name(),
            args: signature(sysno),
        })
    }
}
