//! Branch, jump, and alignment tests.

use rv32_vm::helpers::{expect_a0, expect_error, expect_register};
use rv32_vm::{MemoryAccessKind, VmError};
use rv32_asm::Gpr;

#[test]
fn test_branch_taken_and_not_taken() {
    expect_a0(
        "addi a1, zero, 5
         addi a2, zero, 5
         beq a1, a2, taken
         addi a0, zero, 1
         ebreak
         taken:
         addi a0, zero, 2
         ebreak",
        2,
    );
    expect_a0(
        "addi a1, zero, 5
         addi a2, zero, 6
         beq a1, a2, taken
         addi a0, zero, 1
         ebreak
         taken:
         addi a0, zero, 2
         ebreak",
        1,
    );
}

#[test]
fn test_signed_vs_unsigned_branches() {
    // -1 < 1 signed, but 0xFFFFFFFF > 1 unsigned.
    expect_a0(
        "addi a1, zero, -1
         addi a2, zero, 1
         blt a1, a2, signed_lt
         addi a0, zero, 0
         ebreak
         signed_lt:
         bltu a1, a2, unsigned_lt
         addi a0, zero, 10
         ebreak
         unsigned_lt:
         addi a0, zero, 20
         ebreak",
        10,
    );
}

#[test]
fn test_bge_bgeu() {
    expect_a0(
        "addi a1, zero, 3
         addi a2, zero, 3
         bge a1, a2, ok
         addi a0, zero, 0
         ebreak
         ok:
         bgeu a1, a2, ok2
         addi a0, zero, 0
         ebreak
         ok2:
         addi a0, zero, 1
         ebreak",
        1,
    );
}

#[test]
fn test_bne_loop() {
    // Count to 5 with a backwards branch.
    expect_a0(
        "addi a0, zero, 0
         addi a1, zero, 5
         loop:
         addi a0, a0, 1
         bne a0, a1, loop
         ebreak",
        5,
    );
}

#[test]
fn test_jal_links_return_address() {
    expect_register(
        "jal ra, target
         ebreak
         target:
         ebreak",
        Gpr::RA,
        4,
    );
}

#[test]
fn test_jal_jalr_round_trip() {
    expect_a0(
        "addi a0, zero, 0
         jal ra, sub
         addi a0, a0, 100
         ebreak
         sub:
         addi a0, a0, 11
         jalr zero, 0(ra)",
        111,
    );
}

#[test]
fn test_jalr_clears_bit_zero() {
    // Base has bit 0 set; jalr must land on the even address.
    expect_a0(
        "addi t0, zero, 13      # target address 12, plus a stray bit 0
         jalr ra, 0(t0)
         ebreak
         addi a0, zero, 5
         ebreak",
        5,
    );
}

#[test]
fn test_branch_to_misaligned_target_faults() {
    let err = expect_error(
        "addi a1, zero, 1
         beq zero, zero, 6
         ebreak",
    );
    match err {
        VmError::MisalignedAccess {
            address,
            required,
            kind,
            pc,
            ..
        } => {
            assert_eq!(address, 10);
            assert_eq!(required, 4);
            assert_eq!(kind, MemoryAccessKind::Fetch);
            assert_eq!(pc, 4);
        }
        other => panic!("expected MisalignedAccess, got {:?}", other),
    }
}

#[test]
fn test_jal_to_misaligned_target_faults() {
    let err = expect_error("jal ra, 2");
    assert!(matches!(
        err,
        VmError::MisalignedAccess { address: 2, .. }
    ));
}

#[test]
fn test_jalr_to_misaligned_target_faults() {
    let err = expect_error(
        "addi t0, zero, 10
         jalr ra, 0(t0)",
    );
    assert!(matches!(
        err,
        VmError::MisalignedAccess { address: 10, .. }
    ));
}

#[test]
fn test_branch_never_writes_rd() {
    expect_register(
        "addi t0, zero, 7
         beq zero, zero, over
         over:
         ebreak",
        Gpr::T0,
        7,
    );
}
