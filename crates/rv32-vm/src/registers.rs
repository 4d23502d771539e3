//! The 32-entry general-purpose register file.

use rv32_asm::Gpr;

/// 32 unsigned 32-bit registers with x0 hardwired to zero.
///
/// Writes to x0 are silently discarded; construction sanitizes slot 0 so
/// the invariant holds even for a caller-supplied initial array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    regs: [u32; 32],
}

impl RegisterFile {
    /// Create a register file from an optional initial state.
    /// `None` means all zeros.
    pub fn new(initial: Option<[u32; 32]>) -> Self {
        let mut regs = initial.unwrap_or([0; 32]);
        regs[0] = 0;
        Self { regs }
    }

    #[inline(always)]
    pub fn get(&self, reg: Gpr) -> u32 {
        self.regs[reg.num() as usize]
    }

    /// Write a register. Writes to x0 are dropped.
    #[inline(always)]
    pub fn set(&mut self, reg: Gpr, value: u32) {
        if reg.num() != 0 {
            self.regs[reg.num() as usize] = value;
        }
    }

    /// Copy out the current state, for error context and final results.
    #[inline]
    pub fn snapshot(&self) -> [u32; 32] {
        self.regs
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new(None)
    }
}
