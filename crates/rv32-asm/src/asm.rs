//! RISC-V 32-bit text assembler.
//!
//! Line-oriented: one instruction per line, `name:` labels, `#` or `//`
//! comments. Labels can sit on their own line or prefix an instruction,
//! and branch/jump targets may be label names or numeric byte offsets.

use std::collections::BTreeMap;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, map_opt, map_res, opt, recognize},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use thiserror::Error;

use crate::{encode::*, regs::Gpr};

/// Assembly failure, carrying the 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmError {
    #[error("line {line}: cannot parse instruction '{text}'")]
    Parse { line: usize, text: String },
    #[error("line {line}: unknown label '{name}'")]
    UnknownLabel { line: usize, name: String },
}

/// Branch/jump target: a label name or a pc-relative byte offset.
#[derive(Debug, Clone)]
enum Target {
    Label(String),
    Offset(i32),
}

fn parse_register(input: &str) -> IResult<&str, Gpr> {
    map_opt(
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        Gpr::from_name,
    )(input)
}

/// Parse an integer immediate: decimal or 0x hex, optionally negated.
fn parse_immediate(input: &str) -> IResult<&str, i32> {
    alt((
        map_res(
            preceded(tag("0x"), take_while1(|c: char| c.is_ascii_hexdigit())),
            |s: &str| u32::from_str_radix(s, 16).map(|v| v as i32),
        ),
        map_res(
            preceded(tag("-0x"), take_while1(|c: char| c.is_ascii_hexdigit())),
            |s: &str| u32::from_str_radix(s, 16).map(|v| (v as i32).wrapping_neg()),
        ),
        map_res(
            recognize(pair(
                opt(char('-')),
                take_while1(|c: char| c.is_ascii_digit()),
            )),
            |s: &str| s.parse::<i32>(),
        ),
    ))(input)
}

fn parse_label_name(input: &str) -> IResult<&str, String> {
    map(
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        |s: &str| s.to_string(),
    )(input)
}

/// Parse a branch/jump target: digits or a leading '-' mean an offset,
/// anything else is taken as a label name.
fn parse_target(input: &str) -> IResult<&str, Target> {
    if input
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_digit() || c == '-')
    {
        map(parse_immediate, Target::Offset)(input)
    } else {
        map(parse_label_name, Target::Label)(input)
    }
}

/// Operand separator: optional comma amid optional whitespace.
fn comma(input: &str) -> IResult<&str, ()> {
    map(tuple((multispace0, opt(char(',')), multispace0)), |_| ())(input)
}

/// `imm(reg)` memory operand.
fn parse_mem_operand(input: &str) -> IResult<&str, (i32, Gpr)> {
    pair(
        parse_immediate,
        preceded(
            multispace0,
            delimited(
                char('('),
                delimited(multispace0, parse_register, multispace0),
                char(')'),
            ),
        ),
    )(input)
}

fn parse_mnemonic(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '.')(input)
}

fn three_regs(input: &str) -> IResult<&str, (Gpr, Gpr, Gpr)> {
    tuple((
        terminated(parse_register, comma),
        terminated(parse_register, comma),
        parse_register,
    ))(input)
}

fn two_regs_imm(input: &str) -> IResult<&str, (Gpr, Gpr, i32)> {
    tuple((
        terminated(parse_register, comma),
        terminated(parse_register, comma),
        parse_immediate,
    ))(input)
}

fn reg_mem(input: &str) -> IResult<&str, (Gpr, (i32, Gpr))> {
    tuple((terminated(parse_register, comma), parse_mem_operand))(input)
}

fn two_regs_target(input: &str) -> IResult<&str, (Gpr, Gpr, Target)> {
    tuple((
        terminated(parse_register, comma),
        terminated(parse_register, comma),
        parse_target,
    ))(input)
}

fn reg_target(input: &str) -> IResult<&str, (Gpr, Target)> {
    tuple((terminated(parse_register, comma), parse_target))(input)
}

fn reg_imm(input: &str) -> IResult<&str, (Gpr, i32)> {
    tuple((terminated(parse_register, comma), parse_immediate))(input)
}

fn reg_imm_reg(input: &str) -> IResult<&str, (Gpr, i32, Gpr)> {
    tuple((
        terminated(parse_register, comma),
        terminated(parse_immediate, comma),
        parse_register,
    ))(input)
}

/// Unwrap a nom result, requiring the operand text to be fully consumed.
fn finish<T>(result: IResult<&str, T>, line: usize, text: &str) -> Result<T, AsmError> {
    match result {
        Ok((rest, value)) if rest.trim().is_empty() => Ok(value),
        _ => Err(AsmError::Parse {
            line,
            text: text.to_string(),
        }),
    }
}

fn resolve(
    target: Target,
    pc: u32,
    labels: &BTreeMap<String, u32>,
    line: usize,
) -> Result<i32, AsmError> {
    match target {
        Target::Offset(offset) => Ok(offset),
        Target::Label(name) => labels
            .get(&name)
            .map(|addr| (*addr as i32).wrapping_sub(pc as i32))
            .ok_or(AsmError::UnknownLabel { line, name }),
    }
}

/// Encode one instruction line at address `pc`.
fn encode_line(
    text: &str,
    pc: u32,
    labels: &BTreeMap<String, u32>,
    line: usize,
) -> Result<u32, AsmError> {
    let parse_failed = || AsmError::Parse {
        line,
        text: text.to_string(),
    };

    let (rest, mnemonic) = parse_mnemonic(text).map_err(|_| parse_failed())?;
    let rest = rest.trim_start();

    let word = match mnemonic {
        "add" | "sub" | "sll" | "slt" | "sltu" | "xor" | "srl" | "sra" | "or" | "and" | "mul"
        | "mulh" | "mulhsu" | "mulhu" | "div" | "divu" | "rem" | "remu" => {
            let (rd, rs1, rs2) = finish(three_regs(rest), line, text)?;
            match mnemonic {
                "add" => add(rd, rs1, rs2),
                "sub" => sub(rd, rs1, rs2),
                "sll" => sll(rd, rs1, rs2),
                "slt" => slt(rd, rs1, rs2),
                "sltu" => sltu(rd, rs1, rs2),
                "xor" => xor(rd, rs1, rs2),
                "srl" => srl(rd, rs1, rs2),
                "sra" => sra(rd, rs1, rs2),
                "or" => or(rd, rs1, rs2),
                "and" => and(rd, rs1, rs2),
                "mul" => mul(rd, rs1, rs2),
                "mulh" => mulh(rd, rs1, rs2),
                "mulhsu" => mulhsu(rd, rs1, rs2),
                "mulhu" => mulhu(rd, rs1, rs2),
                "div" => div(rd, rs1, rs2),
                "divu" => divu(rd, rs1, rs2),
                "rem" => rem(rd, rs1, rs2),
                "remu" => remu(rd, rs1, rs2),
                _ => unreachable!(),
            }
        }
        "addi" | "slti" | "sltiu" | "xori" | "ori" | "andi" => {
            let (rd, rs1, imm) = finish(two_regs_imm(rest), line, text)?;
            match mnemonic {
                "addi" => addi(rd, rs1, imm),
                "slti" => slti(rd, rs1, imm),
                "sltiu" => sltiu(rd, rs1, imm),
                "xori" => xori(rd, rs1, imm),
                "ori" => ori(rd, rs1, imm),
                "andi" => andi(rd, rs1, imm),
                _ => unreachable!(),
            }
        }
        "slli" | "srli" | "srai" => {
            let (rd, rs1, imm) = finish(two_regs_imm(rest), line, text)?;
            match mnemonic {
                "slli" => slli(rd, rs1, imm as u32),
                "srli" => srli(rd, rs1, imm as u32),
                "srai" => srai(rd, rs1, imm as u32),
                _ => unreachable!(),
            }
        }
        "lb" | "lh" | "lw" | "lbu" | "lhu" => {
            let (rd, (imm, rs1)) = finish(reg_mem(rest), line, text)?;
            match mnemonic {
                "lb" => lb(rd, rs1, imm),
                "lh" => lh(rd, rs1, imm),
                "lw" => lw(rd, rs1, imm),
                "lbu" => lbu(rd, rs1, imm),
                "lhu" => lhu(rd, rs1, imm),
                _ => unreachable!(),
            }
        }
        "sb" | "sh" | "sw" => {
            let (rs2, (imm, rs1)) = finish(reg_mem(rest), line, text)?;
            match mnemonic {
                "sb" => sb(rs1, rs2, imm),
                "sh" => sh(rs1, rs2, imm),
                "sw" => sw(rs1, rs2, imm),
                _ => unreachable!(),
            }
        }
        "beq" | "bne" | "blt" | "bge" | "bltu" | "bgeu" => {
            let (rs1, rs2, target) = finish(two_regs_target(rest), line, text)?;
            let imm = resolve(target, pc, labels, line)?;
            match mnemonic {
                "beq" => beq(rs1, rs2, imm),
                "bne" => bne(rs1, rs2, imm),
                "blt" => blt(rs1, rs2, imm),
                "bge" => bge(rs1, rs2, imm),
                "bltu" => bltu(rs1, rs2, imm),
                "bgeu" => bgeu(rs1, rs2, imm),
                _ => unreachable!(),
            }
        }
        "jal" => {
            let (rd, target) = finish(reg_target(rest), line, text)?;
            jal(rd, resolve(target, pc, labels, line)?)
        }
        "jalr" => {
            let (rd, (imm, rs1)) = finish(reg_mem(rest), line, text)?;
            jalr(rd, rs1, imm)
        }
        "lui" | "auipc" => {
            let (rd, imm) = finish(reg_imm(rest), line, text)?;
            match mnemonic {
                "lui" => lui(rd, imm as u32),
                "auipc" => auipc(rd, imm as u32),
                _ => unreachable!(),
            }
        }
        "csrrs" | "csrrw" => {
            let (rd, csr, rs1) = finish(reg_imm_reg(rest), line, text)?;
            match mnemonic {
                "csrrs" => csrrs(rd, csr as u32, rs1),
                "csrrw" => csrrw(rd, csr as u32, rs1),
                _ => unreachable!(),
            }
        }
        "ecall" | "ebreak" | "wfi" | "fence" => {
            if !rest.is_empty() {
                return Err(parse_failed());
            }
            match mnemonic {
                "ecall" => ecall(),
                "ebreak" => ebreak(),
                "wfi" => wfi(),
                "fence" => fence(),
                _ => unreachable!(),
            }
        }
        _ => return Err(parse_failed()),
    };

    Ok(word)
}

fn strip_comment(line: &str) -> &str {
    let hash = line.find('#');
    let slashes = line.find("//");
    let end = match (hash, slashes) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => line.len(),
    };
    &line[..end]
}

/// Split `label: rest` into its parts. Lines without ':' are all rest.
fn split_label(line: &str) -> (Option<&str>, &str) {
    match line.find(':') {
        Some(i) => (Some(line[..i].trim()), line[i + 1..].trim()),
        None => (None, line),
    }
}

/// Assemble a single instruction from assembly text.
pub fn assemble_instruction(asm: &str) -> Result<u32, AsmError> {
    encode_line(asm.trim(), 0, &BTreeMap::new(), 1)
}

/// Assemble multi-line assembly code starting at address 0.
///
/// `labels` optionally seeds the label map with external (absolute)
/// addresses; definitions inside `asm` take precedence. Returns the
/// encoded program as little-endian bytes.
pub fn assemble_code(asm: &str, labels: Option<&BTreeMap<String, u32>>) -> Result<Vec<u8>, AsmError> {
    let mut label_map: BTreeMap<String, u32> = labels.cloned().unwrap_or_default();

    // First pass: label addresses
    let mut addr = 0u32;
    for raw in asm.lines() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let (label, rest) = split_label(line);
        if let Some(name) = label {
            if !name.is_empty() {
                label_map.insert(name.to_string(), addr);
            }
        }
        if !rest.is_empty() {
            addr += 4;
        }
    }

    // Second pass: encode
    let mut code = Vec::new();
    let mut addr = 0u32;
    for (idx, raw) in asm.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let (_, rest) = split_label(line);
        if rest.is_empty() {
            continue;
        }
        let word = encode_line(rest, addr, &label_map, idx + 1)?;
        code.extend_from_slice(&word.to_le_bytes());
        addr += 4;
    }

    Ok(code)
}
