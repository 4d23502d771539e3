//! RV32IM instruction encoding, text assembly, and disassembly.
//!
//! Three layers, lowest first:
//!
//! - [`encode`]: one function per instruction, returning the 32-bit word.
//! - [`asm`]: a line-oriented assembler over the encoders, with labels.
//! - [`disasm`]: the reverse direction, used for execution traces.

pub mod asm;
pub mod disasm;
pub mod encode;
pub mod regs;

pub use asm::{assemble_code, assemble_instruction, AsmError};
pub use disasm::{disassemble_code, disassemble_instruction};
pub use regs::Gpr;
