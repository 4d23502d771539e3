//! Opcode dispatch.
//!
//! The semantics live once, in [`crate::exec`]; this module only selects
//! the handler for an instruction's 7-bit opcode. Two mechanisms with
//! identical behavior are available: a `match` (default) and, under the
//! `table-dispatch` feature, a 128-entry function-pointer table indexed
//! by the opcode.

use crate::decoder::{self, *};
use crate::engine::Vm;
use crate::error::VmError;
use crate::exec::{self, Effect};

#[allow(dead_code)]
type Handler = fn(&mut Vm, u32) -> Result<Effect, VmError>;

fn op_unimplemented(_vm: &mut Vm, inst: u32) -> Result<Effect, VmError> {
    Err(VmError::UnimplementedOpcode {
        opcode: decoder::opcode(inst),
        instruction: inst,
        pc: 0,
        regs: [0; 32],
    })
}

#[cfg(not(feature = "table-dispatch"))]
pub(crate) fn dispatch(vm: &mut Vm, inst: u32) -> Result<Effect, VmError> {
    match decoder::opcode(inst) {
        OPCODE_LOAD => exec::op_load(vm, inst),
        OPCODE_MISC_MEM => exec::op_misc_mem(vm, inst),
        OPCODE_OP_IMM => exec::op_op_imm(vm, inst),
        OPCODE_AUIPC => exec::op_auipc(vm, inst),
        OPCODE_STORE => exec::op_store(vm, inst),
        OPCODE_OP => exec::op_op(vm, inst),
        OPCODE_LUI => exec::op_lui(vm, inst),
        OPCODE_BRANCH => exec::op_branch(vm, inst),
        OPCODE_JALR => exec::op_jalr(vm, inst),
        OPCODE_JAL => exec::op_jal(vm, inst),
        OPCODE_SYSTEM => exec::op_system(vm, inst),
        _ => op_unimplemented(vm, inst),
    }
}

#[cfg(feature = "table-dispatch")]
static HANDLERS: [Handler; 128] = {
    let mut table: [Handler; 128] = [op_unimplemented; 128];
    table[OPCODE_LOAD as usize] = exec::op_load;
    table[OPCODE_MISC_MEM as usize] = exec::op_misc_mem;
    table[OPCODE_OP_IMM as usize] = exec::op_op_imm;
    table[OPCODE_AUIPC as usize] = exec::op_auipc;
    table[OPCODE_STORE as usize] = exec::op_store;
    table[OPCODE_OP as usize] = exec::op_op;
    table[OPCODE_LUI as usize] = exec::op_lui;
    table[OPCODE_BRANCH as usize] = exec::op_branch;
    table[OPCODE_JALR as usize] = exec::op_jalr;
    table[OPCODE_JAL as usize] = exec::op_jal;
    table[OPCODE_SYSTEM as usize] = exec::op_system;
    table
};

#[cfg(feature = "table-dispatch")]
pub(crate) fn dispatch(vm: &mut Vm, inst: u32) -> Result<Effect, VmError> {
    HANDLERS[decoder::opcode(inst) as usize](vm, inst)
}
