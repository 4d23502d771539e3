//! User-mode RV32IM emulator.
//!
//! Loads a flat binary or ELF-derived image into a simulated flat address
//! space and executes it instruction-by-instruction against 32
//! general-purpose registers, bridging a small set of system calls to the
//! host via ECALL and the HTIF tohost/fromhost mailbox.
//!
//! The simplest entry point runs a program on a default-configured VM:
//!
//! ```
//! use rv32_asm::{encode, Gpr};
//!
//! let mut program = Vec::new();
//! for word in [
//!     encode::addi(Gpr::A0, Gpr::ZERO, 1), // exit(0): is-test flag, code 0
//!     encode::addi(Gpr::A7, Gpr::ZERO, 93),
//!     encode::ecall(),
//! ] {
//!     program.extend_from_slice(&word.to_le_bytes());
//! }
//! let exit = rv32_vm::run(None, &program).unwrap();
//! assert_eq!(exit.code, 0);
//! ```
//!
//! The [`Vm`] builder configures memory capacity, alignment checking, the
//! console sink, the clock, the syscall bridge, and an instruction budget.

pub mod clock;
pub mod decoder;
mod dispatch;
mod engine;
pub mod error;
mod exec;
pub mod helpers;
pub mod htif;
pub mod memory;
pub mod registers;
pub mod syscall;

pub use clock::{Clock, FixedClock, MonotonicClock};
pub use engine::{run, Exit, Vm};
pub use error::{MemoryAccessKind, VmError};
pub use memory::{GuestMemory, DEFAULT_CAPACITY};
pub use registers::RegisterFile;
pub use syscall::{HostSyscalls, NoSyscalls, SyscallHandler};
