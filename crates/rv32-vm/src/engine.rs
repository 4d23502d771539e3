//! The execution engine: fetch, dispatch, retire.

use std::io::{self, Write};

use rv32_asm::disassemble_instruction;
use tracing::{debug, trace};

use crate::clock::{Clock, MonotonicClock};
use crate::dispatch::dispatch;
use crate::error::VmError;
use crate::exec::Effect;
use crate::memory::{GuestMemory, DEFAULT_CAPACITY};
use crate::registers::RegisterFile;
use crate::syscall::{HostSyscalls, SyscallHandler};

/// Terminal state of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exit {
    /// Guest-supplied exit code (0 = success by convention).
    pub code: u32,
    /// Final register file.
    pub regs: [u32; 32],
    /// PC of the instruction that requested termination.
    pub pc: u32,
    /// Total retired instructions.
    pub retired: u64,
}

/// A configured RV32IM virtual machine.
///
/// One instance owns its registers, memory, retired-instruction counter,
/// clock, console sink, and syscall bridge exclusively: nothing is
/// process-global, so independent instances never interfere. Guest memory
/// is allocated fresh at the start of every [`Vm::run`] and dropped when
/// it returns; the hot loop itself never allocates.
pub struct Vm {
    pub(crate) regs: RegisterFile,
    pub(crate) pc: u32,
    pub(crate) memory: GuestMemory,
    pub(crate) retired: u64,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) bridge: Box<dyn SyscallHandler>,
    pub(crate) console: Box<dyn Write>,
    capacity: usize,
    check_alignment: bool,
    budget: Option<u64>,
}

impl Vm {
    pub fn new() -> Self {
        Self {
            regs: RegisterFile::default(),
            pc: 0,
            memory: GuestMemory::new(0),
            retired: 0,
            clock: Box::new(MonotonicClock::new()),
            bridge: Box::new(HostSyscalls::new()),
            console: Box::new(io::stdout()),
            capacity: DEFAULT_CAPACITY,
            check_alignment: false,
            budget: None,
        }
    }

    /// Guest memory capacity in bytes (default 16 MiB).
    pub fn with_memory_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Fault 2/4-byte data accesses that are not naturally aligned.
    /// Off by default; control-transfer targets are always checked.
    pub fn with_alignment_checking(mut self, enabled: bool) -> Self {
        self.check_alignment = enabled;
        self
    }

    /// Replace the console sink (default: host stdout).
    pub fn with_console(mut self, console: Box<dyn Write>) -> Self {
        self.console = console;
        self
    }

    /// Replace the clock behind the mcycle CSR (default: host monotonic).
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the syscall bridge (default: [`HostSyscalls`]).
    pub fn with_syscalls(mut self, bridge: Box<dyn SyscallHandler>) -> Self {
        self.bridge = bridge;
        self
    }

    /// Stop with `BudgetExhausted` after this many retired instructions.
    /// The external-timeout hook for embedders; unlimited by default.
    pub fn with_max_instructions(mut self, limit: u64) -> Self {
        self.budget = Some(limit);
        self
    }

    /// Execute `program` from offset 0 to completion.
    ///
    /// `registers = None` means all-zero initial state. Returns the guest's
    /// exit and final machine state, or the fatal condition that stopped
    /// the run.
    pub fn run(&mut self, registers: Option<[u32; 32]>, program: &[u8]) -> Result<Exit, VmError> {
        self.memory = GuestMemory::new(self.capacity).with_alignment_checking(self.check_alignment);
        self.memory.load_image(program)?;
        self.regs = RegisterFile::new(registers);
        self.pc = 0;
        self.retired = 0;

        loop {
            if let Some(budget) = self.budget {
                if self.retired >= budget {
                    return Err(VmError::BudgetExhausted {
                        budget,
                        pc: self.pc,
                        regs: self.regs.snapshot(),
                    });
                }
            }
            match self.step() {
                Ok(Effect::Advance) => self.pc = self.pc.wrapping_add(4),
                Ok(Effect::Jump(target)) => self.pc = target,
                Ok(Effect::Halt(code)) => {
                    debug!(code, retired = self.retired, "guest exited");
                    return Ok(Exit {
                        code,
                        regs: self.regs.snapshot(),
                        pc: self.pc,
                        retired: self.retired,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One cycle: count, fetch, dispatch. Errors from the memory layer and
    /// the handlers carry placeholder context and are backfilled here, at
    /// the one place that knows the faulting pc.
    fn step(&mut self) -> Result<Effect, VmError> {
        // Retired exactly once per fetch, including fetches that halt.
        self.retired += 1;
        let word = self
            .memory
            .fetch(self.pc)
            .map_err(|e| e.with_context(self.pc, self.regs.snapshot()))?;
        if tracing::enabled!(tracing::Level::TRACE) {
            trace!(
                "0x{:08x}: {:08x}  {}",
                self.pc,
                word,
                disassemble_instruction(word)
            );
        }
        dispatch(self, word).map_err(|e| e.with_context(self.pc, self.regs.snapshot()))
    }

    /// Retired-instruction count of the last (or current) run.
    pub fn retired_instructions(&self) -> u64 {
        self.retired
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `program` on a default-configured VM: 16 MiB of guest memory, host
/// stdout console, host syscalls, no alignment checking, no budget.
pub fn run(registers: Option<[u32; 32]>, program: &[u8]) -> Result<Exit, VmError> {
    Vm::new().run(registers, program)
}
