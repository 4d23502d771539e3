//! Per-opcode execution semantics.
//!
//! Each handler is a function of `(&mut Vm, instruction)` returning the
//! instruction's control effect. The semantics live here exactly once;
//! [`crate::dispatch`] only selects which handler runs.

use std::io::Write;

use rv32_asm::Gpr;
use tracing::{debug, warn};

use crate::decoder;
use crate::engine::Vm;
use crate::error::{MemoryAccessKind, VmError};
use crate::htif::{self, HtifPacket};
use crate::memory::GuestMemory;
use crate::syscall::{SYS_EXIT, SYS_WRITE};

/// A handler's control-flow outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Effect {
    /// Normal end: PC advances by 4.
    Advance,
    /// Jump end: PC is set directly.
    Jump(u32),
    /// Guest-requested termination with an exit code.
    Halt(u32),
}

/// Error for an encoding no handler implements. Placeholder context, like
/// the memory layer's errors; the engine backfills pc/regs.
fn unimplemented(inst: u32) -> VmError {
    VmError::UnimplementedOpcode {
        opcode: decoder::opcode(inst),
        instruction: inst,
        pc: 0,
        regs: [0; 32],
    }
}

/// Control-transfer targets must be 4-byte aligned before they are used
/// for a fetch.
fn jump_to(target: u32) -> Result<Effect, VmError> {
    if target & 3 != 0 {
        return Err(VmError::MisalignedAccess {
            address: target,
            required: 4,
            kind: MemoryAccessKind::Fetch,
            pc: 0,
            regs: [0; 32],
        });
    }
    Ok(Effect::Jump(target))
}

pub(crate) fn op_load(vm: &mut Vm, inst: u32) -> Result<Effect, VmError> {
    let rd = decoder::rd(inst);
    if rd.num() == 0 {
        // Hard no-op: the address is never computed, so a load into x0
        // cannot fault.
        return Ok(Effect::Advance);
    }
    let addr = vm
        .regs
        .get(decoder::rs1(inst))
        .wrapping_add(decoder::imm_i(inst) as u32);
    let value = match decoder::funct3(inst) {
        0 => vm.memory.read_u8(addr)? as i8 as i32 as u32,
        1 => vm.memory.read_u16(addr)? as i16 as i32 as u32,
        2 => vm.memory.read_u32(addr)?,
        4 => vm.memory.read_u8(addr)? as u32,
        5 => vm.memory.read_u16(addr)? as u32,
        _ => return Err(unimplemented(inst)),
    };
    vm.regs.set(rd, value);
    Ok(Effect::Advance)
}

pub(crate) fn op_store(vm: &mut Vm, inst: u32) -> Result<Effect, VmError> {
    let funct3 = decoder::funct3(inst);
    let value = vm.regs.get(decoder::rs2(inst));
    let addr = vm
        .regs
        .get(decoder::rs1(inst))
        .wrapping_add(decoder::imm_s(inst) as u32);

    // The UART port is matched on the raw address, before masking; only a
    // byte store emits anything, and the buffer is never touched.
    if addr == htif::UART_OUT {
        if funct3 == 0 {
            let _ = vm.console.write_all(&[value as u8]);
            let _ = vm.console.flush();
        }
        return Ok(Effect::Advance);
    }

    // tohost is matched after masking, so images linked high still hit it.
    if GuestMemory::mask_address(addr) == htif::TOHOST {
        return store_tohost(vm, value);
    }

    match funct3 {
        0 => vm.memory.write_u8(addr, value as u8)?,
        1 => vm.memory.write_u16(addr, value as u16)?,
        2 => vm.memory.write_u32(addr, value)?,
        _ => return Err(unimplemented(inst)),
    }
    Ok(Effect::Advance)
}

/// HTIF mailbox handling for a value stored to `tohost`: an odd value is
/// an exit packet, an even one points at a magic syscall descriptor.
fn store_tohost(vm: &mut Vm, value: u32) -> Result<Effect, VmError> {
    match HtifPacket::classify(value) {
        HtifPacket::Exit { code } => {
            debug!(code, "htif exit packet");
            Ok(Effect::Halt(code))
        }
        HtifPacket::Descriptor { addr } => {
            let number = vm.memory.read_u32(addr)?;
            if number != htif::MAGIC_SYS_WRITE {
                return Err(VmError::UnimplementedMagicSyscall {
                    number,
                    pc: 0,
                    regs: [0; 32],
                });
            }
            let ptr = vm.memory.read_u32(addr.wrapping_add(htif::MAGIC_PTR_OFFSET))?;
            let len = vm.memory.read_u32(addr.wrapping_add(htif::MAGIC_LEN_OFFSET))?;
            let bytes = vm.memory.slice(ptr, len)?;
            let _ = vm.console.write_all(bytes);
            let _ = vm.console.flush();
            debug!(len, "htif magic write");
            vm.memory.write_u32(htif::FROMHOST, 1)?;
            Ok(Effect::Advance)
        }
    }
}

pub(crate) fn op_op_imm(vm: &mut Vm, inst: u32) -> Result<Effect, VmError> {
    let rd = decoder::rd(inst);
    if rd.num() == 0 {
        return Ok(Effect::Advance);
    }
    let v1 = vm.regs.get(decoder::rs1(inst));
    let imm = decoder::imm_i(inst);
    let value = match decoder::funct3(inst) {
        0 => v1.wrapping_add(imm as u32),
        1 => v1 << decoder::shamt(inst),
        2 => ((v1 as i32) < imm) as u32,
        3 => (v1 < imm as u32) as u32,
        4 => v1 ^ imm as u32,
        5 => {
            // Instruction bit 30 discriminates srli/srai; the shift
            // amount is always the masked 5-bit field.
            if inst & (1 << 30) != 0 {
                ((v1 as i32) >> decoder::shamt(inst)) as u32
            } else {
                v1 >> decoder::shamt(inst)
            }
        }
        6 => v1 | imm as u32,
        7 => v1 & imm as u32,
        _ => unreachable!("funct3 is 3 bits"),
    };
    vm.regs.set(rd, value);
    Ok(Effect::Advance)
}

pub(crate) fn op_op(vm: &mut Vm, inst: u32) -> Result<Effect, VmError> {
    let rd = decoder::rd(inst);
    if rd.num() == 0 {
        return Ok(Effect::Advance);
    }
    let v1 = vm.regs.get(decoder::rs1(inst));
    let v2 = vm.regs.get(decoder::rs2(inst));
    let value = if decoder::funct7(inst) == 1 {
        m_extension(decoder::funct3(inst), v1, v2)
    } else {
        match decoder::funct3(inst) {
            0 => {
                if inst & (1 << 30) != 0 {
                    v1.wrapping_sub(v2)
                } else {
                    v1.wrapping_add(v2)
                }
            }
            1 => v1 << (v2 & 0x1F),
            2 => ((v1 as i32) < (v2 as i32)) as u32,
            3 => (v1 < v2) as u32,
            4 => v1 ^ v2,
            5 => {
                if inst & (1 << 30) != 0 {
                    ((v1 as i32) >> (v2 & 0x1F)) as u32
                } else {
                    v1 >> (v2 & 0x1F)
                }
            }
            6 => v1 | v2,
            7 => v1 & v2,
            _ => unreachable!("funct3 is 3 bits"),
        }
    };
    vm.regs.set(rd, value);
    Ok(Effect::Advance)
}

/// mul/mulh/mulhsu/mulhu/div/divu/rem/remu, with the architected
/// division special cases: division by zero yields all-ones for div/divu
/// and the dividend for rem/remu; INT32_MIN / -1 yields the dividend for
/// div and 0 for rem.
fn m_extension(funct3: u32, v1: u32, v2: u32) -> u32 {
    match funct3 {
        0 => v1.wrapping_mul(v2),
        1 => (((v1 as i32 as i64) * (v2 as i32 as i64)) >> 32) as u32,
        2 => (((v1 as i32 as i64) * (v2 as u64 as i64)) >> 32) as u32,
        3 => (((v1 as u64) * (v2 as u64)) >> 32) as u32,
        4 => {
            let (a, b) = (v1 as i32, v2 as i32);
            if b == 0 {
                u32::MAX
            } else if a == i32::MIN && b == -1 {
                v1
            } else {
                (a / b) as u32
            }
        }
        5 => {
            if v2 == 0 {
                u32::MAX
            } else {
                v1 / v2
            }
        }
        6 => {
            let (a, b) = (v1 as i32, v2 as i32);
            if b == 0 {
                v1
            } else if a == i32::MIN && b == -1 {
                0
            } else {
                (a % b) as u32
            }
        }
        7 => {
            if v2 == 0 {
                v1
            } else {
                v1 % v2
            }
        }
        _ => unreachable!("funct3 is 3 bits"),
    }
}

pub(crate) fn op_lui(vm: &mut Vm, inst: u32) -> Result<Effect, VmError> {
    vm.regs.set(decoder::rd(inst), decoder::imm_u(inst));
    Ok(Effect::Advance)
}

pub(crate) fn op_auipc(vm: &mut Vm, inst: u32) -> Result<Effect, VmError> {
    vm.regs
        .set(decoder::rd(inst), vm.pc.wrapping_add(decoder::imm_u(inst)));
    Ok(Effect::Advance)
}

pub(crate) fn op_branch(vm: &mut Vm, inst: u32) -> Result<Effect, VmError> {
    let v1 = vm.regs.get(decoder::rs1(inst));
    let v2 = vm.regs.get(decoder::rs2(inst));
    let taken = match decoder::funct3(inst) {
        0 => v1 == v2,
        1 => v1 != v2,
        4 => (v1 as i32) < (v2 as i32),
        5 => (v1 as i32) >= (v2 as i32),
        6 => v1 < v2,
        7 => v1 >= v2,
        _ => return Err(unimplemented(inst)),
    };
    if taken {
        jump_to(vm.pc.wrapping_add(decoder::imm_b(inst) as u32))
    } else {
        Ok(Effect::Advance)
    }
}

pub(crate) fn op_jal(vm: &mut Vm, inst: u32) -> Result<Effect, VmError> {
    vm.regs.set(decoder::rd(inst), vm.pc.wrapping_add(4));
    jump_to(vm.pc.wrapping_add(decoder::imm_j(inst) as u32))
}

pub(crate) fn op_jalr(vm: &mut Vm, inst: u32) -> Result<Effect, VmError> {
    let base = vm.regs.get(decoder::rs1(inst));
    vm.regs.set(decoder::rd(inst), vm.pc.wrapping_add(4));
    jump_to(base.wrapping_add(decoder::imm_i(inst) as u32) & !1)
}

/// fence: no memory reordering to constrain in a single-threaded model.
pub(crate) fn op_misc_mem(_vm: &mut Vm, _inst: u32) -> Result<Effect, VmError> {
    Ok(Effect::Advance)
}

pub(crate) fn op_system(vm: &mut Vm, inst: u32) -> Result<Effect, VmError> {
    let funct3 = decoder::funct3(inst);
    if funct3 == 0 {
        return match decoder::funct7(inst) {
            0 => ecall(vm),
            1 => Err(VmError::Ebreak {
                pc: 0,
                regs: [0; 32],
            }),
            8 => Err(VmError::Wfi {
                pc: 0,
                regs: [0; 32],
            }),
            _ => Ok(Effect::Advance),
        };
    }

    // CSR surface: only csrrs reads a value, and only from the minimal
    // read-only set; every CSR write is a no-op.
    if funct3 == 2 {
        let rd = decoder::rd(inst);
        if rd.num() != 0 {
            let value = match decoder::csr(inst) {
                // mhartid, mstatus, mtvec
                0xF14 | 0x300 | 0x305 => 0,
                // mcycle / mcycleh: host-measured
                0xB00 => vm.clock.now() as u32,
                0xB80 => (vm.clock.now() >> 32) as u32,
                // minstret / minstreth: retired-instruction counter
                0xB02 => vm.retired as u32,
                0xB82 => (vm.retired >> 32) as u32,
                csr => {
                    warn!(csr, "read of unmodeled CSR");
                    0
                }
            };
            vm.regs.set(rd, value);
        }
    }
    Ok(Effect::Advance)
}

/// ECALL: a7 selects the function, a0 carries the argument.
fn ecall(vm: &mut Vm) -> Result<Effect, VmError> {
    let a0 = vm.regs.get(Gpr::A0);
    let a7 = vm.regs.get(Gpr::A7);
    match a7 {
        SYS_EXIT => {
            let is_test = a0 & 1 != 0;
            let code = a0 >> 1;
            if is_test && code != 0 {
                warn!(code, "*** FAILED *** guest test reported failure");
            }
            debug!(code, "ecall exit");
            Ok(Effect::Halt(code))
        }
        SYS_WRITE => {
            // Single-character write of a0.
            let _ = vm.console.write_all(&[a0 as u8]);
            let _ = vm.console.flush();
            Ok(Effect::Advance)
        }
        // read: acknowledged but deliberately not serviced.
        63 => Ok(Effect::Advance),
        _ => {
            let args = [
                a0,
                vm.regs.get(Gpr::A1),
                vm.regs.get(Gpr::A2),
                vm.regs.get(Gpr::A3),
                vm.regs.get(Gpr::A4),
                vm.regs.get(Gpr::A5),
                vm.regs.get(Gpr::A6),
            ];
            let result = vm
                .bridge
                .syscall(a7, args, &mut vm.memory, vm.console.as_mut());
            vm.regs.set(Gpr::A0, result);
            Ok(Effect::Advance)
        }
    }
}
