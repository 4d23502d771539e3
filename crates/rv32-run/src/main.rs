//! Command-line runner: load an ELF32 or flat RV32IM image, execute it,
//! report the exit code and throughput.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use rv32_asm::Gpr;
use rv32_vm::Vm;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod elf;

#[derive(Parser)]
#[command(name = "rv32-run", version, about = "Run an RV32IM ELF or flat binary image")]
struct Args {
    /// Guest image: a 32-bit little-endian RISC-V ELF, or a flat
    /// pre-linked binary with --raw.
    image: PathBuf,

    /// Treat the image as a flat binary instead of an ELF.
    #[arg(long)]
    raw: bool,

    /// Guest memory capacity in MiB.
    #[arg(long, default_value_t = 16)]
    memory: usize,

    /// Stop with an error after this many instructions (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    max_instructions: u64,

    /// Log every executed instruction to stderr.
    #[arg(long)]
    trace: bool,

    /// Dump the final register file after the run.
    #[arg(long)]
    dump_regs: bool,

    /// Fault 2/4-byte data accesses that are not naturally aligned.
    #[arg(long)]
    check_alignment: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.trace {
        EnvFilter::new("trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("rv32-run: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<u8, Box<dyn std::error::Error>> {
    let file = fs::read(&args.image)?;
    let image = if args.raw {
        file
    } else {
        elf::load_image(&file)?
    };
    debug!(bytes = image.len(), "loaded guest image");

    let mut vm = Vm::new()
        .with_memory_capacity(args.memory * 1024 * 1024)
        .with_alignment_checking(args.check_alignment);
    if args.max_instructions > 0 {
        vm = vm.with_max_instructions(args.max_instructions);
    }

    let started = Instant::now();
    let exit = vm.run(None, &image)?;
    let elapsed = started.elapsed();

    let nanos = elapsed.as_nanos().max(1);
    eprintln!("exit code {}", exit.code);
    eprintln!(
        "{} instructions in {} ns ({:.0} inst/sec)",
        exit.retired,
        nanos,
        exit.retired as f64 * 1e9 / nanos as f64
    );
    if args.dump_regs {
        dump_registers(&exit.regs, exit.pc);
    }

    // The guest exit code becomes the process exit status; codes beyond
    // the host's 8-bit range saturate.
    Ok(exit.code.min(255) as u8)
}

fn dump_registers(regs: &[u32; 32], pc: u32) {
    eprintln!("pc = 0x{:08x}", pc);
    for (i, value) in regs.iter().enumerate() {
        eprintln!(
            "{:>4} (x{:<2}) = 0x{:08x} ({})",
            Gpr::new(i as u8).to_string(),
            i,
            value,
            *value as i32
        );
    }
}
