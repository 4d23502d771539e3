//! Load/store tests: widths, extension, masking, and fault behavior.

use rv32_vm::helpers::{expect_a0, expect_error, run_asm};
use rv32_vm::{MemoryAccessKind, VmError};

#[test]
fn test_word_roundtrip() {
    expect_a0(
        "lui a1, 0xDEADB
         addi a1, a1, -273    # a1 = 0xDEADAEEF
         addi a2, zero, 1024
         sw a1, 0(a2)
         lw a0, 0(a2)
         ebreak",
        0xDEADAEEF,
    );
}

#[test]
fn test_byte_store_truncates() {
    expect_a0(
        "addi a1, zero, 0x5A
         addi a2, zero, 1024
         sw zero, 0(a2)
         sb a1, 1(a2)
         lw a0, 0(a2)
         ebreak",
        0x5A00,
    );
}

#[test]
fn test_signed_byte_load() {
    expect_a0(
        "addi a1, zero, -1
         addi a2, zero, 1024
         sb a1, 0(a2)
         lb a0, 0(a2)
         ebreak",
        0xFFFF_FFFF,
    );
    expect_a0(
        "addi a1, zero, -1
         addi a2, zero, 1024
         sb a1, 0(a2)
         lbu a0, 0(a2)
         ebreak",
        0xFF,
    );
}

#[test]
fn test_signed_half_load() {
    expect_a0(
        "lui a1, 0x8
         addi a2, zero, 1024
         sh a1, 0(a2)          # stores 0x8000
         lh a0, 0(a2)
         ebreak",
        0xFFFF_8000,
    );
    expect_a0(
        "lui a1, 0x8
         addi a2, zero, 1024
         sh a1, 0(a2)
         lhu a0, 0(a2)
         ebreak",
        0x8000,
    );
}

#[test]
fn test_negative_offset_addressing() {
    expect_a0(
        "addi a1, zero, 321
         addi a2, zero, 1024
         sw a1, 0(a2)
         addi a2, a2, 16
         lw a0, -16(a2)
         ebreak",
        321,
    );
}

#[test]
fn test_high_address_alias() {
    // A store through 0x80000400 lands at 0x400.
    expect_a0(
        "lui a2, 0x80000
         addi a2, a2, 1024
         addi a1, zero, 99
         sw a1, 0(a2)
         addi a3, zero, 1024
         lw a0, 0(a3)
         ebreak",
        99,
    );
}

#[test]
fn test_load_out_of_bounds() {
    // The test VM has 1 MiB of guest memory; one past the end faults.
    let err = expect_error(
        "lui a2, 0x100
         lw a0, 0(a2)
         ebreak",
    );
    match err {
        VmError::InvalidMemoryAccess {
            address,
            width,
            kind,
            pc,
            ..
        } => {
            assert_eq!(address, 0x10_0000);
            assert_eq!(width, 4);
            assert_eq!(kind, MemoryAccessKind::Read);
            assert_eq!(pc, 4);
        }
        other => panic!("expected InvalidMemoryAccess, got {:?}", other),
    }
}

#[test]
fn test_faulting_load_leaves_registers() {
    // Registers are unchanged from before the faulting instruction.
    let run = run_asm(
        "addi a0, zero, 11
         addi a1, zero, 22
         lui a2, 0x100
         lw a3, 0(a2)
         ebreak",
    );
    match run.result {
        Err(VmError::InvalidMemoryAccess { regs, .. }) => {
            assert_eq!(regs[10], 11);
            assert_eq!(regs[11], 22);
            assert_eq!(regs[12], 0x10_0000);
            assert_eq!(regs[13], 0);
        }
        other => panic!("expected InvalidMemoryAccess, got {:?}", other),
    }
}

#[test]
fn test_store_out_of_bounds() {
    let err = expect_error(
        "lui a2, 0x100
         sw a2, 0(a2)
         ebreak",
    );
    assert!(matches!(
        err,
        VmError::InvalidMemoryAccess {
            kind: MemoryAccessKind::Write,
            ..
        }
    ));
}

#[test]
fn test_fetch_past_end_of_program() {
    // Running off the end of the image into zeroed memory decodes opcode
    // 0 and stops as an unimplemented opcode, not undefined behavior.
    let err = expect_error("addi a0, zero, 1");
    assert!(matches!(
        err,
        VmError::UnimplementedOpcode {
            opcode: 0,
            pc: 4,
            ..
        }
    ));
}

#[test]
fn test_misaligned_data_ok_by_default() {
    expect_a0(
        "addi a1, zero, 77
         addi a2, zero, 1025
         sw a1, 0(a2)
         lw a0, 0(a2)
         ebreak",
        77,
    );
}
