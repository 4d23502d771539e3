//! Emulator error types.

use std::fmt;

use thiserror::Error;

/// Which kind of memory access failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAccessKind {
    Read,
    Write,
    Fetch,
}

impl fmt::Display for MemoryAccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemoryAccessKind::Read => "read",
            MemoryAccessKind::Write => "write",
            MemoryAccessKind::Fetch => "fetch",
        };
        write!(f, "{}", name)
    }
}

/// Fatal emulator conditions. Each execution-time variant carries the
/// faulting pc and a snapshot of the registers at that point.
///
/// The memory layer creates its variants with placeholder pc/regs; the
/// engine backfills them via [`VmError::with_context`] once it has them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error("program of {size} bytes exceeds guest memory capacity of {capacity} bytes")]
    ProgramTooLarge { size: usize, capacity: usize },

    #[error("invalid {kind} of {width} bytes at address 0x{address:08x} (pc=0x{pc:08x})")]
    InvalidMemoryAccess {
        address: u32,
        width: u32,
        kind: MemoryAccessKind,
        pc: u32,
        regs: [u32; 32],
    },

    #[error("misaligned {kind} at address 0x{address:08x}, requires {required}-byte alignment (pc=0x{pc:08x})")]
    MisalignedAccess {
        address: u32,
        required: u32,
        kind: MemoryAccessKind,
        pc: u32,
        regs: [u32; 32],
    },

    #[error("unimplemented opcode 0x{opcode:02x} in instruction 0x{instruction:08x} (pc=0x{pc:08x})")]
    UnimplementedOpcode {
        opcode: u32,
        instruction: u32,
        pc: u32,
        regs: [u32; 32],
    },

    #[error("unimplemented magic syscall {number} (pc=0x{pc:08x})")]
    UnimplementedMagicSyscall {
        number: u32,
        pc: u32,
        regs: [u32; 32],
    },

    #[error("ebreak (pc=0x{pc:08x})")]
    Ebreak { pc: u32, regs: [u32; 32] },

    #[error("wfi (pc=0x{pc:08x})")]
    Wfi { pc: u32, regs: [u32; 32] },

    #[error("instruction budget of {budget} exhausted (pc=0x{pc:08x})")]
    BudgetExhausted {
        budget: u64,
        pc: u32,
        regs: [u32; 32],
    },
}

impl VmError {
    /// The program counter at the point of failure (0 for setup errors).
    pub fn pc(&self) -> u32 {
        match self {
            VmError::ProgramTooLarge { .. } => 0,
            VmError::InvalidMemoryAccess { pc, .. }
            | VmError::MisalignedAccess { pc, .. }
            | VmError::UnimplementedOpcode { pc, .. }
            | VmError::UnimplementedMagicSyscall { pc, .. }
            | VmError::Ebreak { pc, .. }
            | VmError::Wfi { pc, .. }
            | VmError::BudgetExhausted { pc, .. } => *pc,
        }
    }

    /// The register snapshot at the point of failure, if the error
    /// occurred during execution.
    pub fn regs(&self) -> Option<&[u32; 32]> {
        match self {
            VmError::ProgramTooLarge { .. } => None,
            VmError::InvalidMemoryAccess { regs, .. }
            | VmError::MisalignedAccess { regs, .. }
            | VmError::UnimplementedOpcode { regs, .. }
            | VmError::UnimplementedMagicSyscall { regs, .. }
            | VmError::Ebreak { regs, .. }
            | VmError::Wfi { regs, .. }
            | VmError::BudgetExhausted { regs, .. } => Some(regs),
        }
    }

    /// Fill in the pc and register snapshot on an error created below the
    /// engine (the memory layer uses placeholders for both).
    pub(crate) fn with_context(mut self, at_pc: u32, snapshot: [u32; 32]) -> Self {
        match &mut self {
            VmError::ProgramTooLarge { .. } => {}
            VmError::InvalidMemoryAccess { pc, regs, .. }
            | VmError::MisalignedAccess { pc, regs, .. }
            | VmError::UnimplementedOpcode { pc, regs, .. }
            | VmError::UnimplementedMagicSyscall { pc, regs, .. }
            | VmError::Ebreak { pc, regs, .. }
            | VmError::Wfi { pc, regs, .. }
            | VmError::BudgetExhausted { pc, regs, .. } => {
                *pc = at_pc;
                *regs = snapshot;
            }
        }
        self
    }
}
