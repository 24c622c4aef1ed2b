/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

pub use libc::user_regs_struct as Regs;

#[cfg(not(target_arch = "x86_64"))]
compile_error!("syscall register conventions are only implemented for x86_64");

/// A single register.
pub type Reg = u64;

/// The arguments to a syscall, in calling convention order.
pub type ArgRegs = [Reg; 6];

/// Architecture-independent access to the syscall number and arguments held
/// in a register snapshot taken at a syscall stop.
pub trait SyscallRegs {
    /// Returns the syscall number. This must remain valid at a seccomp stop,
    /// where the return value register has already been clobbered.
    fn syscall_number(&self) -> Reg;

    /// Returns the six syscall argument registers.
    fn args(&self) -> ArgRegs;

    /// Returns argument `n`, or `None` if there is no such argument register.
    fn arg(&self, n: usize) -> Option<Reg> {
        self.args().get(n).copied()
    }
}

#[cfg(target_arch = "x86_64")]
impl SyscallRegs for libc::user_regs_struct {
    fn syscall_number(&self) -> Reg {
        // rax already holds -ENOSYS at syscall entry.
        self.orig_rax
    }

    fn args(&self) -> ArgRegs {
        [self.rdi, self.rsi, self.rdx, self.r10, self.r8, self.r9]
    }
}
