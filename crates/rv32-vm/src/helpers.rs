//! Test-support helpers: assemble, run, and assert on the outcome.
//!
//! Test programs conventionally end in either an `ecall` exit (asserted
//! with [`expect_exit_code`]) or an `ebreak`, whose error carries the
//! final register snapshot (asserted with [`expect_a0`] /
//! [`expect_register`]).

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use rv32_asm::{assemble_code, disassemble_instruction, Gpr};

use crate::clock::FixedClock;
use crate::engine::{Exit, Vm};
use crate::error::VmError;

/// Console sink that the test keeps a handle to after the VM consumes the
/// boxed writer.
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Outcome of one test run: the VM result, everything the guest wrote to
/// the console, and the program bytes (for error diagnostics).
pub struct TestRun {
    pub result: Result<Exit, VmError>,
    pub console: Vec<u8>,
    pub code: Vec<u8>,
}

/// Instruction bound for test VMs. Orders of magnitude above any test
/// program; a run that reaches it is looping, and `BudgetExhausted` beats
/// a hung suite.
const TEST_INSTRUCTION_LIMIT: u64 = 1_000_000;

/// Run raw program bytes on a 1 MiB test VM with a fixed clock, a
/// captured console, and a runaway-loop bound.
pub fn run_code(code: &[u8]) -> TestRun {
    let sink = SharedSink::default();
    let mut vm = Vm::new()
        .with_memory_capacity(1024 * 1024)
        .with_clock(Box::new(FixedClock(0)))
        .with_max_instructions(TEST_INSTRUCTION_LIMIT)
        .with_console(Box::new(sink.clone()));
    let result = vm.run(None, code);
    let console = sink.0.lock().unwrap().clone();
    TestRun {
        result,
        console,
        code: code.to_vec(),
    }
}

/// Assemble and run a test program.
pub fn run_asm(asm: &str) -> TestRun {
    let code = assemble_code(asm, None).expect("failed to assemble test program");
    run_code(&code)
}

/// Expect the program to stop at `ebreak` with the given value in a0.
pub fn expect_a0(asm: &str, expected: u32) {
    expect_register(asm, Gpr::A0, expected);
}

/// Expect the program to stop at `ebreak` with the given register value.
pub fn expect_register(asm: &str, reg: Gpr, expected: u32) {
    let run = run_asm(asm);
    match &run.result {
        Err(VmError::Ebreak { regs, .. }) => {
            let actual = regs[reg.num() as usize];
            assert_eq!(
                actual, expected,
                "{} = 0x{:08x}, expected 0x{:08x}\n{}",
                reg, actual, expected,
                disassembly(&run.code, None)
            );
        }
        Err(e) => panic!("expected ebreak, got error:\n{}", format_error(e, &run.code)),
        Ok(exit) => panic!("expected ebreak, guest exited with code {}", exit.code),
    }
}

/// Expect the program to terminate normally with the given exit code.
pub fn expect_exit_code(asm: &str, expected: u32) {
    let run = run_asm(asm);
    match &run.result {
        Ok(exit) => assert_eq!(
            exit.code, expected,
            "exit code {}, expected {}\n{}",
            exit.code, expected,
            disassembly(&run.code, None)
        ),
        Err(e) => panic!(
            "expected exit code {}, got error:\n{}",
            expected,
            format_error(e, &run.code)
        ),
    }
}

/// Expect a normal exit and exactly these console bytes.
pub fn expect_console(asm: &str, expected: &[u8]) {
    let run = run_asm(asm);
    if let Err(e) = &run.result {
        panic!("run failed:\n{}", format_error(e, &run.code));
    }
    assert_eq!(
        run.console, expected,
        "console {:?}, expected {:?}",
        String::from_utf8_lossy(&run.console),
        String::from_utf8_lossy(expected)
    );
}

/// Expect the run to stop with a fatal error, returning it for matching.
pub fn expect_error(asm: &str) -> VmError {
    let run = run_asm(asm);
    match run.result {
        Err(e) => e,
        Ok(exit) => panic!(
            "expected an error, guest exited with code {}\n{}",
            exit.code,
            disassembly(&run.code, None)
        ),
    }
}

/// Render an error with the program disassembly, faulting pc marked.
pub fn format_error(error: &VmError, code: &[u8]) -> String {
    let mut out = String::new();
    out.push_str(&format!("Error: {}\n", error));
    out.push_str(&format!("PC: 0x{:08x}\n\n", error.pc()));
    out.push_str(&disassembly(code, Some(error.pc())));
    if let Some(regs) = error.regs() {
        out.push_str("\nRegisters:\n");
        for (i, value) in regs.iter().enumerate() {
            if *value != 0 {
                out.push_str(&format!(
                    "  {} = 0x{:08x} ({})\n",
                    Gpr::new(i as u8),
                    value,
                    *value as i32
                ));
            }
        }
    }
    out
}

fn disassembly(code: &[u8], highlight_pc: Option<u32>) -> String {
    let mut out = String::from("Disassembly:\n");
    for at in (0..code.len()).step_by(4) {
        if at + 4 > code.len() {
            break;
        }
        let word = u32::from_le_bytes([code[at], code[at + 1], code[at + 2], code[at + 3]]);
        let marker = if highlight_pc == Some(at as u32) {
            ">>> "
        } else {
            "    "
        };
        out.push_str(&format!(
            "{}0x{:08x}: {}\n",
            marker,
            at,
            disassemble_instruction(word)
        ));
    }
    out
}
