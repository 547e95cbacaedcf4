//! Operand legalization helpers for instruction selection.
//!
//! These consult the encodability predicates and fall back to materializing
//! values in a fresh register with `movw`/`movt` (or `mvn` when the inverted
//! value is a rotated immediate). Materializing instructions are appended to
//! the given block.

use crate::arm32::cond::Condition;
use crate::arm32::function::{MachineFunction, NodeId, OperandId, VarId};
use crate::arm32::inst::{ThreeAddrGprOp, UnaryGprOp};
use crate::arm32::operand::{AddrMode, FlexImm, MemOperand};
use crate::core::error::BuildResult;
use crate::core::types::Type;

impl<'arena> MachineFunction<'arena> {
    /// Load `value` into a new i32 variable at the end of `node`.
    pub fn materialize_constant(&mut self, node: NodeId, value: u32) -> BuildResult<VarId> {
        let var = self.make_variable(Type::I32);
        if let Some((imm, rotate)) = FlexImm::can_hold_imm(!value) {
            let inverted = self.create_flex_imm(Type::I32, imm, rotate)?;
            let mvn = self.create_unary_gpr(UnaryGprOp::Mvn, var, inverted, Condition::Al)?;
            self.append(node, mvn)?;
            return Ok(var);
        }

        let low = self.const_int32(Type::I32, (value & 0xFFFF) as i32);
        let movw = self.create_unary_gpr(UnaryGprOp::Movw, var, low, Condition::Al)?;
        self.append(node, movw)?;
        let high = value >> 16;
        if high != 0 {
            let high = self.const_int32(Type::I32, high as i32);
            let movt = self.create_movt(var, high, Condition::Al)?;
            self.append(node, movt)?;
        }
        log::trace!("materialized {value:#x} into {var:?}");
        Ok(var)
    }

    /// A flexible operand for `value`: a rotated immediate when one exists,
    /// otherwise a register holding the value.
    pub fn flex_for_constant(&mut self, node: NodeId, ty: Type, value: u32) -> BuildResult<OperandId> {
        if let Some(imm) = self.try_flex_imm(ty, value) {
            return Ok(imm);
        }
        let var = self.materialize_constant(node, value)?;
        self.create_flex_reg(ty, var, None, None)
    }

    /// A memory operand for `[base, #offset]`. When the offset does not fit
    /// the access's immediate field, integer accesses use a register index
    /// and VFP/NEON accesses go through `[tmp]` with `tmp = base ± offset`.
    pub fn mem_for_offset(
        &mut self,
        node: NodeId,
        ty: Type,
        base: VarId,
        offset: i32,
        sign_ext: bool,
    ) -> BuildResult<OperandId> {
        let mode = if offset < 0 {
            AddrMode::NegOffset
        } else {
            AddrMode::Offset
        };
        if MemOperand::can_hold_offset(ty, sign_ext, offset) {
            let offset = self.const_int32(Type::I32, offset);
            return self.create_mem_imm(ty, base, offset, mode);
        }
        if ty.is_scalar_float() || ty.is_vector() {
            let op = if offset < 0 {
                ThreeAddrGprOp::Sub
            } else {
                ThreeAddrGprOp::Add
            };
            let amount = self.flex_for_constant(node, Type::I32, offset.unsigned_abs())?;
            let addr = self.make_variable(Type::I32);
            let add = self.create_three_addr_gpr(op, addr, base, amount, false, Condition::Al)?;
            self.append(node, add)?;
            let zero = self.const_int32(Type::I32, 0);
            return self.create_mem_imm(ty, addr, zero, AddrMode::Offset);
        }
        let index = self.materialize_constant(node, offset.unsigned_abs())?;
        self.create_mem_reg(ty, base, index, None, mode)
    }
}
