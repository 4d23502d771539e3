//! RISC-V 32-bit instruction encoding.
//!
//! One function per instruction, each returning the encoded 32-bit word.
//! Covers the RV32IM subset plus the handful of system instructions the
//! emulator executes (ecall, ebreak, wfi, fence, csrrs/csrrw).

use crate::regs::Gpr;

/// Encode an R-type instruction.
///
/// Format: `funct7 rs2 rs1 funct3 rd opcode`
fn encode_r(opcode: u8, rd: Gpr, rs1: Gpr, rs2: Gpr, funct3: u8, funct7: u8) -> u32 {
    (opcode as u32)
        | ((rd.num() as u32) << 7)
        | ((funct3 as u32) << 12)
        | ((rs1.num() as u32) << 15)
        | ((rs2.num() as u32) << 20)
        | ((funct7 as u32) << 25)
}

/// Encode an I-type instruction with a 12-bit immediate.
fn encode_i(opcode: u8, rd: Gpr, rs1: Gpr, imm: i32, funct3: u8) -> u32 {
    (opcode as u32)
        | ((rd.num() as u32) << 7)
        | ((funct3 as u32) << 12)
        | ((rs1.num() as u32) << 15)
        | (((imm as u32) & 0xfff) << 20)
}

/// Encode an I-type shift: 5-bit shift amount plus a funct7 discriminator.
fn encode_i_shift(opcode: u8, rd: Gpr, rs1: Gpr, shamt: u32, funct3: u8, funct7: u8) -> u32 {
    (opcode as u32)
        | ((rd.num() as u32) << 7)
        | ((funct3 as u32) << 12)
        | ((rs1.num() as u32) << 15)
        | ((shamt & 0x1f) << 20)
        | ((funct7 as u32) << 25)
}

/// Encode an S-type instruction.
///
/// Format: `imm[11:5] rs2 rs1 funct3 imm[4:0] opcode`
fn encode_s(opcode: u8, rs1: Gpr, rs2: Gpr, imm: i32, funct3: u8) -> u32 {
    let imm = (imm as u32) & 0xfff;
    (opcode as u32)
        | ((imm & 0x1f) << 7)
        | ((funct3 as u32) << 12)
        | ((rs1.num() as u32) << 15)
        | ((rs2.num() as u32) << 20)
        | (((imm >> 5) & 0x7f) << 25)
}

/// Encode a B-type instruction.
///
/// Immediate layout: `imm[12] imm[10:5] rs2 rs1 funct3 imm[4:1] imm[11] opcode`
fn encode_b(opcode: u8, rs1: Gpr, rs2: Gpr, imm: i32, funct3: u8) -> u32 {
    let imm = imm as u32;
    (opcode as u32)
        | (((imm >> 11) & 0x1) << 7)
        | (((imm >> 1) & 0xf) << 8)
        | ((funct3 as u32) << 12)
        | ((rs1.num() as u32) << 15)
        | ((rs2.num() as u32) << 20)
        | (((imm >> 5) & 0x3f) << 25)
        | (((imm >> 12) & 0x1) << 31)
}

/// Encode a U-type instruction. `imm` is the 20-bit upper immediate,
/// placed in bits [31:12] (so `lui(rd, 0x80000)` loads 0x8000_0000).
fn encode_u(opcode: u8, rd: Gpr, imm: u32) -> u32 {
    (opcode as u32) | ((rd.num() as u32) << 7) | ((imm & 0xfffff) << 12)
}

/// Encode a J-type instruction.
///
/// Immediate layout: `imm[20] imm[10:1] imm[11] imm[19:12] rd opcode`
fn encode_j(opcode: u8, rd: Gpr, imm: i32) -> u32 {
    let imm = imm as u32;
    (opcode as u32)
        | ((rd.num() as u32) << 7)
        | (((imm >> 12) & 0xff) << 12)
        | (((imm >> 11) & 0x1) << 20)
        | (((imm >> 1) & 0x3ff) << 21)
        | (((imm >> 20) & 0x1) << 31)
}

// Register-register arithmetic and logic

/// ADD: rd = rs1 + rs2
pub fn add(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x0, 0x00)
}

/// SUB: rd = rs1 - rs2
pub fn sub(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x0, 0x20)
}

/// SLL: rd = rs1 << (rs2 & 0x1f)
pub fn sll(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x1, 0x00)
}

/// SLT: rd = (rs1 < rs2) ? 1 : 0 (signed)
pub fn slt(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x2, 0x00)
}

/// SLTU: rd = (rs1 < rs2) ? 1 : 0 (unsigned)
pub fn sltu(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x3, 0x00)
}

/// XOR: rd = rs1 ^ rs2
pub fn xor(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x4, 0x00)
}

/// SRL: rd = rs1 >> (rs2 & 0x1f) (logical)
pub fn srl(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x5, 0x00)
}

/// SRA: rd = rs1 >> (rs2 & 0x1f) (arithmetic)
pub fn sra(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x5, 0x20)
}

/// OR: rd = rs1 | rs2
pub fn or(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x6, 0x00)
}

/// AND: rd = rs1 & rs2
pub fn and(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x7, 0x00)
}

// M extension

/// MUL: rd = low 32 bits of rs1 * rs2
pub fn mul(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x0, 0x01)
}

/// MULH: rd = high 32 bits of rs1 * rs2 (signed x signed)
pub fn mulh(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x1, 0x01)
}

/// MULHSU: rd = high 32 bits of rs1 * rs2 (signed x unsigned)
pub fn mulhsu(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x2, 0x01)
}

/// MULHU: rd = high 32 bits of rs1 * rs2 (unsigned x unsigned)
pub fn mulhu(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x3, 0x01)
}

/// DIV: rd = rs1 / rs2 (signed)
pub fn div(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x4, 0x01)
}

/// DIVU: rd = rs1 / rs2 (unsigned)
pub fn divu(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x5, 0x01)
}

/// REM: rd = rs1 % rs2 (signed)
pub fn rem(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x6, 0x01)
}

/// REMU: rd = rs1 % rs2 (unsigned)
pub fn remu(rd: Gpr, rs1: Gpr, rs2: Gpr) -> u32 {
    encode_r(0x33, rd, rs1, rs2, 0x7, 0x01)
}

// Immediate arithmetic and logic

/// ADDI: rd = rs1 + imm
pub fn addi(rd: Gpr, rs1: Gpr, imm: i32) -> u32 {
    encode_i(0x13, rd, rs1, imm, 0x0)
}

/// SLTI: rd = (rs1 < imm) ? 1 : 0 (signed)
pub fn slti(rd: Gpr, rs1: Gpr, imm: i32) -> u32 {
    encode_i(0x13, rd, rs1, imm, 0x2)
}

/// SLTIU: rd = (rs1 < imm) ? 1 : 0 (unsigned comparison of sign-extended imm)
pub fn sltiu(rd: Gpr, rs1: Gpr, imm: i32) -> u32 {
    encode_i(0x13, rd, rs1, imm, 0x3)
}

/// XORI: rd = rs1 ^ imm
pub fn xori(rd: Gpr, rs1: Gpr, imm: i32) -> u32 {
    encode_i(0x13, rd, rs1, imm, 0x4)
}

/// ORI: rd = rs1 | imm
pub fn ori(rd: Gpr, rs1: Gpr, imm: i32) -> u32 {
    encode_i(0x13, rd, rs1, imm, 0x6)
}

/// ANDI: rd = rs1 & imm
pub fn andi(rd: Gpr, rs1: Gpr, imm: i32) -> u32 {
    encode_i(0x13, rd, rs1, imm, 0x7)
}

/// SLLI: rd = rs1 << shamt
pub fn slli(rd: Gpr, rs1: Gpr, shamt: u32) -> u32 {
    encode_i_shift(0x13, rd, rs1, shamt, 0x1, 0x00)
}

/// SRLI: rd = rs1 >> shamt (logical)
pub fn srli(rd: Gpr, rs1: Gpr, shamt: u32) -> u32 {
    encode_i_shift(0x13, rd, rs1, shamt, 0x5, 0x00)
}

/// SRAI: rd = rs1 >> shamt (arithmetic)
pub fn srai(rd: Gpr, rs1: Gpr, shamt: u32) -> u32 {
    encode_i_shift(0x13, rd, rs1, shamt, 0x5, 0x20)
}

// Loads and stores

/// LB: rd = sign_extend(mem8[rs1 + imm])
pub fn lb(rd: Gpr, rs1: Gpr, imm: i32) -> u32 {
    encode_i(0x03, rd, rs1, imm, 0x0)
}

/// LH: rd = sign_extend(mem16[rs1 + imm])
pub fn lh(rd: Gpr, rs1: Gpr, imm: i32) -> u32 {
    encode_i(0x03, rd, rs1, imm, 0x1)
}

/// LW: rd = mem32[rs1 + imm]
pub fn lw(rd: Gpr, rs1: Gpr, imm: i32) -> u32 {
    encode_i(0x03, rd, rs1, imm, 0x2)
}

/// LBU: rd = zero_extend(mem8[rs1 + imm])
pub fn lbu(rd: Gpr, rs1: Gpr, imm: i32) -> u32 {
    encode_i(0x03, rd, rs1, imm, 0x4)
}

/// LHU: rd = zero_extend(mem16[rs1 + imm])
pub fn lhu(rd: Gpr, rs1: Gpr, imm: i32) -> u32 {
    encode_i(0x03, rd, rs1, imm, 0x5)
}

/// SB: mem8[rs1 + imm] = rs2
pub fn sb(rs1: Gpr, rs2: Gpr, imm: i32) -> u32 {
    encode_s(0x23, rs1, rs2, imm, 0x0)
}

/// SH: mem16[rs1 + imm] = rs2
pub fn sh(rs1: Gpr, rs2: Gpr, imm: i32) -> u32 {
    encode_s(0x23, rs1, rs2, imm, 0x1)
}

/// SW: mem32[rs1 + imm] = rs2
pub fn sw(rs1: Gpr, rs2: Gpr, imm: i32) -> u32 {
    encode_s(0x23, rs1, rs2, imm, 0x2)
}

// Upper immediates

/// LUI: rd = imm << 12 (imm is the 20-bit upper immediate)
pub fn lui(rd: Gpr, imm: u32) -> u32 {
    encode_u(0x37, rd, imm)
}

/// AUIPC: rd = pc + (imm << 12)
pub fn auipc(rd: Gpr, imm: u32) -> u32 {
    encode_u(0x17, rd, imm)
}

// Control transfer

/// JAL: rd = pc + 4; pc += imm
pub fn jal(rd: Gpr, imm: i32) -> u32 {
    encode_j(0x6f, rd, imm)
}

/// JALR: rd = pc + 4; pc = (rs1 + imm) & !1
pub fn jalr(rd: Gpr, rs1: Gpr, imm: i32) -> u32 {
    encode_i(0x67, rd, rs1, imm, 0x0)
}

/// BEQ: if rs1 == rs2, pc += imm
pub fn beq(rs1: Gpr, rs2: Gpr, imm: i32) -> u32 {
    encode_b(0x63, rs1, rs2, imm, 0x0)
}

/// BNE: if rs1 != rs2, pc += imm
pub fn bne(rs1: Gpr, rs2: Gpr, imm: i32) -> u32 {
    encode_b(0x63, rs1, rs2, imm, 0x1)
}

/// BLT: if rs1 < rs2 (signed), pc += imm
pub fn blt(rs1: Gpr, rs2: Gpr, imm: i32) -> u32 {
    encode_b(0x63, rs1, rs2, imm, 0x4)
}

/// BGE: if rs1 >= rs2 (signed), pc += imm
pub fn bge(rs1: Gpr, rs2: Gpr, imm: i32) -> u32 {
    encode_b(0x63, rs1, rs2, imm, 0x5)
}

/// BLTU: if rs1 < rs2 (unsigned), pc += imm
pub fn bltu(rs1: Gpr, rs2: Gpr, imm: i32) -> u32 {
    encode_b(0x63, rs1, rs2, imm, 0x6)
}

/// BGEU: if rs1 >= rs2 (unsigned), pc += imm
pub fn bgeu(rs1: Gpr, rs2: Gpr, imm: i32) -> u32 {
    encode_b(0x63, rs1, rs2, imm, 0x7)
}

// System

/// ECALL: environment call
pub fn ecall() -> u32 {
    0x0000_0073
}

/// EBREAK: environment break. Encoded with funct7 = 1, which is how the
/// emulator discriminates it from ECALL (funct7 = 0) and WFI (funct7 = 8).
pub fn ebreak() -> u32 {
    0x0200_0073
}

/// WFI: wait for interrupt
pub fn wfi() -> u32 {
    0x1050_0073
}

/// FENCE: memory ordering fence (iorw, iorw)
pub fn fence() -> u32 {
    0x0ff0_000f
}

/// CSRRS: rd = csr; csr |= rs1 (the emulator models the read only)
pub fn csrrs(rd: Gpr, csr: u32, rs1: Gpr) -> u32 {
    0x73 | ((rd.num() as u32) << 7)
        | (0x2 << 12)
        | ((rs1.num() as u32) << 15)
        | ((csr & 0xfff) << 20)
}

/// CSRRW: rd = csr; csr = rs1 (a no-op in the emulator's CSR model)
pub fn csrrw(rd: Gpr, csr: u32, rs1: Gpr) -> u32 {
    0x73 | ((rd.num() as u32) << 7)
        | (0x1 << 12)
        | ((rs1.num() as u32) << 15)
        | ((csr & 0xfff) << 20)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add() {
        // add a0, a1, a2
        assert_eq!(add(Gpr::A0, Gpr::A1, Gpr::A2), 0x00c58533);
    }

    #[test]
    fn test_sub() {
        // sub a0, a1, a2
        assert_eq!(sub(Gpr::A0, Gpr::A1, Gpr::A2), 0x40c58533);
    }

    #[test]
    fn test_mul() {
        // mul a0, a1, a2
        assert_eq!(mul(Gpr::A0, Gpr::A1, Gpr::A2), 0x02c58533);
    }

    #[test]
    fn test_m_extension_funct3() {
        // All M instructions share funct7=1 and differ in funct3
        assert_eq!(mulh(Gpr::A0, Gpr::A1, Gpr::A2), 0x02c59533);
        assert_eq!(mulhsu(Gpr::A0, Gpr::A1, Gpr::A2), 0x02c5a533);
        assert_eq!(mulhu(Gpr::A0, Gpr::A1, Gpr::A2), 0x02c5b533);
        assert_eq!(div(Gpr::A0, Gpr::A1, Gpr::A2), 0x02c5c533);
        assert_eq!(divu(Gpr::A0, Gpr::A1, Gpr::A2), 0x02c5d533);
        assert_eq!(rem(Gpr::A0, Gpr::A1, Gpr::A2), 0x02c5e533);
        assert_eq!(remu(Gpr::A0, Gpr::A1, Gpr::A2), 0x02c5f533);
    }

    #[test]
    fn test_addi() {
        // addi a0, a1, 5
        assert_eq!(addi(Gpr::A0, Gpr::A1, 5), 0x00558513);
    }

    #[test]
    fn test_addi_negative() {
        // addi a0, a1, -5
        assert_eq!(addi(Gpr::A0, Gpr::A1, -5), 0xffb58513);
    }

    #[test]
    fn test_shifts() {
        // srai a0, a1, 3
        assert_eq!(srai(Gpr::A0, Gpr::A1, 3), 0x4035d513);
        // srli a0, a1, 3
        assert_eq!(srli(Gpr::A0, Gpr::A1, 3), 0x0035d513);
        // slli a0, a1, 3
        assert_eq!(slli(Gpr::A0, Gpr::A1, 3), 0x00359513);
    }

    #[test]
    fn test_lui() {
        // lui a0, 0x12345
        assert_eq!(lui(Gpr::A0, 0x12345), 0x12345537);
    }

    #[test]
    fn test_auipc() {
        // auipc a0, 0x12345
        assert_eq!(auipc(Gpr::A0, 0x12345), 0x12345517);
    }

    #[test]
    fn test_loads() {
        // lw a0, 4(a1)
        assert_eq!(lw(Gpr::A0, Gpr::A1, 4), 0x0045a503);
        // lbu a0, 4(a1)
        assert_eq!(lbu(Gpr::A0, Gpr::A1, 4), 0x0045c503);
    }

    #[test]
    fn test_stores() {
        // sw a0, 4(a1)
        assert_eq!(sw(Gpr::A1, Gpr::A0, 4), 0x00a5a223);
        // sb a1, 5(a0)
        assert_eq!(sb(Gpr::A0, Gpr::A1, 5), 0x00b502a3);
    }

    #[test]
    fn test_branches() {
        // beq a0, a1, 8
        assert_eq!(beq(Gpr::A0, Gpr::A1, 8), 0x00b50463);
        // bltu a0, a1, 8
        assert_eq!(bltu(Gpr::A0, Gpr::A1, 8), 0x00b56463);
    }

    #[test]
    fn test_branch_negative_offset() {
        // bne a0, a1, -4: imm[12]=1 imm[11]=1 imm[10:5]=0x3f imm[4:1]=0xe
        let inst = bne(Gpr::A0, Gpr::A1, -4);
        assert_eq!(inst & 0x7f, 0x63);
        assert_eq!((inst >> 31) & 1, 1);
        assert_eq!((inst >> 7) & 1, 1);
        assert_eq!((inst >> 25) & 0x3f, 0x3f);
        assert_eq!((inst >> 8) & 0xf, 0xe);
    }

    #[test]
    fn test_jal() {
        // jal ra, 8
        assert_eq!(jal(Gpr::RA, 8), 0x008000ef);
    }

    #[test]
    fn test_jalr() {
        // jalr zero, 0(ra) - a plain return
        assert_eq!(jalr(Gpr::ZERO, Gpr::RA, 0), 0x00008067);
    }

    #[test]
    fn test_system() {
        assert_eq!(ecall(), 0x00000073);
        assert_eq!(ebreak(), 0x02000073);
        assert_eq!(wfi(), 0x10500073);
        assert_eq!(fence(), 0x0ff0000f);
    }

    #[test]
    fn test_csrrs() {
        // csrr a0, mcycle
        assert_eq!(csrrs(Gpr::A0, 0xb00, Gpr::ZERO), 0xb0002573);
    }
}
