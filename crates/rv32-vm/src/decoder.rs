//! Instruction field extraction.
//!
//! Pure functions over a raw 32-bit instruction word. Any bit pattern
//! decodes; whether the fields name a real instruction is decided at
//! dispatch time.

use rv32_asm::Gpr;

// Opcode values (low 7 bits) for the implemented categories.
pub const OPCODE_LOAD: u32 = 0x03;
pub const OPCODE_MISC_MEM: u32 = 0x0F;
pub const OPCODE_OP_IMM: u32 = 0x13;
pub const OPCODE_AUIPC: u32 = 0x17;
pub const OPCODE_STORE: u32 = 0x23;
pub const OPCODE_OP: u32 = 0x33;
pub const OPCODE_LUI: u32 = 0x37;
pub const OPCODE_BRANCH: u32 = 0x63;
pub const OPCODE_JALR: u32 = 0x67;
pub const OPCODE_JAL: u32 = 0x6F;
pub const OPCODE_SYSTEM: u32 = 0x73;

#[inline(always)]
pub fn opcode(inst: u32) -> u32 {
    inst & 0x7F
}

#[inline(always)]
pub fn rd(inst: u32) -> Gpr {
    Gpr::new(((inst >> 7) & 0x1F) as u8)
}

#[inline(always)]
pub fn rs1(inst: u32) -> Gpr {
    Gpr::new(((inst >> 15) & 0x1F) as u8)
}

#[inline(always)]
pub fn rs2(inst: u32) -> Gpr {
    Gpr::new(((inst >> 20) & 0x1F) as u8)
}

#[inline(always)]
pub fn funct3(inst: u32) -> u32 {
    (inst >> 12) & 0x7
}

#[inline(always)]
pub fn funct7(inst: u32) -> u32 {
    (inst >> 25) & 0x7F
}

/// I-immediate: bits[31:20], arithmetic shift sign-extends.
#[inline(always)]
pub fn imm_i(inst: u32) -> i32 {
    (inst as i32) >> 20
}

/// S-immediate: bits[31:25] ++ bits[11:7], sign-extended.
#[inline(always)]
pub fn imm_s(inst: u32) -> i32 {
    (((inst & 0xFE00_0000) as i32) >> 20) | (((inst >> 7) & 0x1F) as i32)
}

/// B-immediate: bit 31, bit 7, bits[30:25], bits[11:8], LSB zero,
/// sign-extended from bit 12.
#[inline(always)]
pub fn imm_b(inst: u32) -> i32 {
    (((inst & 0x8000_0000) as i32) >> 19)
        | (((inst >> 7) & 0x1) << 11) as i32
        | (((inst >> 25) & 0x3F) << 5) as i32
        | (((inst >> 8) & 0xF) << 1) as i32
}

/// U-immediate: bits[31:12] in place, low 12 bits zero.
#[inline(always)]
pub fn imm_u(inst: u32) -> u32 {
    inst & 0xFFFF_F000
}

/// J-immediate: bit 31, bits[19:12], bit 20, bits[30:21], LSB zero,
/// sign-extended from bit 20.
#[inline(always)]
pub fn imm_j(inst: u32) -> i32 {
    (((inst & 0x8000_0000) as i32) >> 11)
        | (inst & 0x000F_F000) as i32
        | (((inst >> 20) & 0x1) << 11) as i32
        | (((inst >> 21) & 0x3FF) << 1) as i32
}

/// Shift amount for slli/srli/srai: the low 5 bits of the I-imm field.
#[inline(always)]
pub fn shamt(inst: u32) -> u32 {
    (inst >> 20) & 0x1F
}

/// CSR index for system instructions: bits[31:20], unsigned.
#[inline(always)]
pub fn csr(inst: u32) -> u32 {
    (inst >> 20) & 0xFFF
}
