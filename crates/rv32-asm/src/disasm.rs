//! RISC-V 32-bit instruction disassembly.
//!
//! Covers the RV32IM subset the emulator executes. Anything else renders
//! as `unknown` with the raw word so traces stay readable.

/// Disassemble a single RISC-V 32-bit instruction.
///
/// Returns a human-readable string like "add a0, a1, a2" or "jal ra, 16".
pub fn disassemble_instruction(inst: u32) -> String {
    let opcode = inst & 0x7f;
    let rd = ((inst >> 7) & 0x1f) as u8;
    let funct3 = (inst >> 12) & 0x7;
    let rs1 = ((inst >> 15) & 0x1f) as u8;
    let rs2 = ((inst >> 20) & 0x1f) as u8;
    let funct7 = (inst >> 25) & 0x7f;

    let imm_i = (inst as i32) >> 20;
    let imm_u = inst >> 12;
    let imm_s = (((inst & 0xfe00_0000) | ((inst & 0xf80) << 13)) as i32) >> 20;
    let imm_b = (((inst & 0x8000_0000)
        | ((inst & 0x80) << 23)
        | ((inst & 0x7e00_0000) >> 1)
        | ((inst & 0xf00) << 12)) as i32)
        >> 19;
    let imm_j = ((((inst << 11) & 0x7f80_0000)
        | ((inst << 2) & 0x0040_0000)
        | ((inst >> 9) & 0x003f_f000)
        | (inst & 0x8000_0000)) as i32)
        >> 11;
    let shamt = (inst >> 20) & 0x1f;
    let csr = (inst >> 20) & 0xfff;

    match opcode {
        0x33 => {
            let name = match (funct7, funct3) {
                (0x00, 0x0) => "add",
                (0x20, 0x0) => "sub",
                (0x00, 0x1) => "sll",
                (0x00, 0x2) => "slt",
                (0x00, 0x3) => "sltu",
                (0x00, 0x4) => "xor",
                (0x00, 0x5) => "srl",
                (0x20, 0x5) => "sra",
                (0x00, 0x6) => "or",
                (0x00, 0x7) => "and",
                (0x01, 0x0) => "mul",
                (0x01, 0x1) => "mulh",
                (0x01, 0x2) => "mulhsu",
                (0x01, 0x3) => "mulhu",
                (0x01, 0x4) => "div",
                (0x01, 0x5) => "divu",
                (0x01, 0x6) => "rem",
                (0x01, 0x7) => "remu",
                _ => return format!("unknown_r_type 0x{:08x}", inst),
            };
            format!("{} {}, {}, {}", name, gpr_name(rd), gpr_name(rs1), gpr_name(rs2))
        }
        0x13 => match funct3 {
            0x1 => format!("slli {}, {}, {}", gpr_name(rd), gpr_name(rs1), shamt),
            0x5 if funct7 & 0x20 != 0 => {
                format!("srai {}, {}, {}", gpr_name(rd), gpr_name(rs1), shamt)
            }
            0x5 => format!("srli {}, {}, {}", gpr_name(rd), gpr_name(rs1), shamt),
            _ => {
                let name = match funct3 {
                    0x0 => "addi",
                    0x2 => "slti",
                    0x3 => "sltiu",
                    0x4 => "xori",
                    0x6 => "ori",
                    0x7 => "andi",
                    _ => unreachable!(),
                };
                format!("{} {}, {}, {}", name, gpr_name(rd), gpr_name(rs1), imm_i)
            }
        },
        0x03 => {
            let name = match funct3 {
                0x0 => "lb",
                0x1 => "lh",
                0x2 => "lw",
                0x4 => "lbu",
                0x5 => "lhu",
                _ => return format!("unknown_load 0x{:08x}", inst),
            };
            format!("{} {}, {}({})", name, gpr_name(rd), imm_i, gpr_name(rs1))
        }
        0x23 => {
            let name = match funct3 {
                0x0 => "sb",
                0x1 => "sh",
                0x2 => "sw",
                _ => return format!("unknown_store 0x{:08x}", inst),
            };
            format!("{} {}, {}({})", name, gpr_name(rs2), imm_s, gpr_name(rs1))
        }
        0x37 => format!("lui {}, 0x{:05x}", gpr_name(rd), imm_u),
        0x17 => format!("auipc {}, 0x{:05x}", gpr_name(rd), imm_u),
        0x6f => format!("jal {}, {}", gpr_name(rd), imm_j),
        0x67 => match funct3 {
            0x0 => format!("jalr {}, {}({})", gpr_name(rd), imm_i, gpr_name(rs1)),
            _ => format!("unknown_jalr 0x{:08x}", inst),
        },
        0x63 => {
            let name = match funct3 {
                0x0 => "beq",
                0x1 => "bne",
                0x4 => "blt",
                0x5 => "bge",
                0x6 => "bltu",
                0x7 => "bgeu",
                _ => return format!("unknown_branch 0x{:08x}", inst),
            };
            format!("{} {}, {}, {}", name, gpr_name(rs1), gpr_name(rs2), imm_b)
        }
        0x0f => "fence".to_string(),
        0x73 => match funct3 {
            0x0 => match inst {
                0x0000_0073 => "ecall".to_string(),
                0x0200_0073 => "ebreak".to_string(),
                0x1050_0073 => "wfi".to_string(),
                _ => format!("unknown_system 0x{:08x}", inst),
            },
            0x1 => format!("csrrw {}, 0x{:03x}, {}", gpr_name(rd), csr, gpr_name(rs1)),
            0x2 => format!("csrrs {}, 0x{:03x}, {}", gpr_name(rd), csr, gpr_name(rs1)),
            0x3 => format!("csrrc {}, 0x{:03x}, {}", gpr_name(rd), csr, gpr_name(rs1)),
            _ => format!("unknown_csr 0x{:08x}", inst),
        },
        _ => format!("unknown 0x{:08x} (opcode=0x{:02x})", inst, opcode),
    }
}

/// Disassemble a code buffer containing RISC-V instructions.
///
/// Returns a formatted string with one instruction per line, showing
/// the offset and the disassembled instruction.
pub fn disassemble_code(code: &[u8]) -> String {
    let mut result = String::new();
    let mut offset = 0;

    while offset + 4 <= code.len() {
        let inst = u32::from_le_bytes([
            code[offset],
            code[offset + 1],
            code[offset + 2],
            code[offset + 3],
        ]);
        result.push_str(&format!("0x{:04x}: {}\n", offset, disassemble_instruction(inst)));
        offset += 4;
    }

    if offset < code.len() {
        result.push_str(&format!("0x{:04x}: <incomplete instruction>\n", offset));
    }

    result
}

/// Get the ABI name of a general-purpose register.
pub(crate) fn gpr_name(num: u8) -> &'static str {
    match num {
        0 => "zero",
        1 => "ra",
        2 => "sp",
        3 => "gp",
        4 => "tp",
        5 => "t0",
        6 => "t1",
        7 => "t2",
        8 => "s0",
        9 => "s1",
        10 => "a0",
        11 => "a1",
        12 => "a2",
        13 => "a3",
        14 => "a4",
        15 => "a5",
        16 => "a6",
        17 => "a7",
        18 => "s2",
        19 => "s3",
        20 => "s4",
        21 => "s5",
        22 => "s6",
        23 => "s7",
        24 => "s8",
        25 => "s9",
        26 => "s10",
        27 => "s11",
        28 => "t3",
        29 => "t4",
        30 => "t5",
        31 => "t6",
        _ => "?",
    }
}
