// This module implements the ARM32 operand model. Operand is a closed enum over variables,
// integer/floating/relocatable constants, memory operands and the two flavours of the flexible
// second operand, so consumers match on the variant instead of downcasting. MemOperand covers
// the six A32 addressing modes (offset, pre-index, post-index, each positive or negative) whose
// values are the P/U/W bits of the load/store encodings, with either an immediate offset or an
// optionally shifted index register. MemOperand::can_hold_offset mirrors the immediate field
// widths of ldr/ldrb (12 bits), ldrh/ldrsb/ldrsh/ldrd (8 bits) and vldr (8-bit word count).
// FlexImm is an 8-bit value rotated right by an even amount; FlexImm::can_hold_imm searches
// the sixteen rotations for an encoding. FlexReg is a register shifted by an immediate or by a
// second register. The MachineFunction factories validate every construction contract and
// return a ConstructionError instead of building an operand that cannot be encoded.

//! ARM32 operands: variables, constants, memory and flexible operands.

use std::fmt;

use crate::arm32::function::{MachineFunction, OperandId, VarId};
use crate::core::error::{BuildResult, ConstructionError};
use crate::core::register_file::AsmReg;
use crate::core::types::Type;

/// Discriminant of an [`Operand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    Variable,
    ConstInteger32,
    ConstInteger64,
    ConstFloat,
    ConstDouble,
    ConstRelocatable,
    Mem,
    FlexImm,
    FlexReg,
}

/// Storage flavour of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Ordinary virtual register.
    Regular,
    /// i64 value carried in two i32 variables.
    Split64 { lo: VarId, hi: VarId },
    /// Stack-only value. `base_reg` is set when the slot is out of reach of
    /// the frame register.
    Stack { base_reg: Option<AsmReg> },
}

/// A value that lives in a register or a stack slot.
#[derive(Debug, Clone)]
pub struct Variable<'arena> {
    ty: Type,
    index: u32,
    name: Option<&'arena str>,
    reg: Option<AsmReg>,
    stack_offset: Option<i32>,
    kind: VariableKind,
}

impl<'arena> Variable<'arena> {
    pub(crate) fn new(ty: Type, index: u32, name: Option<&'arena str>, kind: VariableKind) -> Self {
        Self {
            ty,
            index,
            name,
            reg: None,
            stack_offset: None,
            kind,
        }
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn name(&self) -> Option<&'arena str> {
        self.name
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    pub fn reg(&self) -> Option<AsmReg> {
        self.reg
    }

    pub fn has_reg(&self) -> bool {
        self.reg.is_some()
    }

    pub fn set_reg(&mut self, reg: AsmReg) {
        self.reg = Some(reg);
    }

    pub fn clear_reg(&mut self) {
        self.reg = None;
    }

    /// Offset from the frame register, once the frame is laid out.
    pub fn stack_offset(&self) -> Option<i32> {
        self.stack_offset
    }

    pub fn set_stack_offset(&mut self, offset: i32) {
        self.stack_offset = Some(offset);
    }

    pub fn halves(&self) -> Option<(VarId, VarId)> {
        match self.kind {
            VariableKind::Split64 { lo, hi } => Some((lo, hi)),
            _ => None,
        }
    }

    pub fn is_stack_variable(&self) -> bool {
        matches!(self.kind, VariableKind::Stack { .. })
    }

    pub fn stack_base_reg(&self) -> Option<AsmReg> {
        match self.kind {
            VariableKind::Stack { base_reg } => base_reg,
            _ => None,
        }
    }

    /// Only meaningful for stack variables; ignored otherwise.
    pub fn set_stack_base_reg(&mut self, reg: Option<AsmReg>) {
        if let VariableKind::Stack { base_reg } = &mut self.kind {
            *base_reg = reg;
        }
    }
}

/// Symbol plus addend, resolved by a relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantRelocatable<'arena> {
    name: &'arena str,
    offset: i32,
}

impl<'arena> ConstantRelocatable<'arena> {
    pub fn new(name: &'arena str, offset: i32) -> Self {
        Self { name, offset }
    }

    pub fn name(&self) -> &'arena str {
        self.name
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }
}

impl fmt::Display for ConstantRelocatable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            0 => write!(f, "{}", self.name),
            off if off > 0 => write!(f, "{}+{}", self.name, off),
            off => write!(f, "{}{}", self.name, off),
        }
    }
}

/// Barrel shifter operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShiftKind {
    Lsl,
    Lsr,
    Asr,
    Ror,
    Rrx,
}

impl ShiftKind {
    pub fn mnemonic(self) -> &'static str {
        match self {
            ShiftKind::Lsl => "lsl",
            ShiftKind::Lsr => "lsr",
            ShiftKind::Asr => "asr",
            ShiftKind::Ror => "ror",
            ShiftKind::Rrx => "rrx",
        }
    }

    /// Largest immediate shift amount. LSR/ASR #32 are encoded as #0.
    pub fn max_amount(self) -> u32 {
        match self {
            ShiftKind::Lsl | ShiftKind::Ror => 31,
            ShiftKind::Lsr | ShiftKind::Asr => 32,
            ShiftKind::Rrx => 0,
        }
    }

    fn check_amount(self, amount: u32) -> BuildResult<()> {
        if amount > self.max_amount() {
            return Err(ConstructionError::ShiftAmountOutOfRange { kind: self, amount });
        }
        Ok(())
    }
}

impl fmt::Display for ShiftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Load/store addressing mode. The value is the P/U/W bit pattern of the
/// A32 load/store encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AddrMode {
    /// `[rn, #off]`
    Offset = (8 | 4) << 21,
    /// `[rn, #off]!`
    PreIndex = (8 | 4 | 1) << 21,
    /// `[rn], #off`
    PostIndex = 4 << 21,
    /// `[rn, #-off]`
    NegOffset = 8 << 21,
    /// `[rn, #-off]!`
    NegPreIndex = (8 | 1) << 21,
    /// `[rn], #-off`
    NegPostIndex = 0,
}

const P_BIT: u32 = 8 << 21;
const U_BIT: u32 = 4 << 21;
const W_BIT: u32 = 1 << 21;

impl AddrMode {
    pub const ALL: [AddrMode; 6] = [
        AddrMode::Offset,
        AddrMode::PreIndex,
        AddrMode::PostIndex,
        AddrMode::NegOffset,
        AddrMode::NegPreIndex,
        AddrMode::NegPostIndex,
    ];

    pub fn bits(self) -> u32 {
        self as u32
    }

    /// Positive modes have the U bit set.
    pub fn is_negative(self) -> bool {
        self.bits() & U_BIT == 0
    }

    pub fn is_post_index(self) -> bool {
        self.bits() & P_BIT == 0
    }

    pub fn is_pre_index(self) -> bool {
        self.bits() & (P_BIT | W_BIT) == P_BIT | W_BIT
    }

    /// Same indexing, opposite sign.
    pub fn negated(self) -> AddrMode {
        match self {
            AddrMode::Offset => AddrMode::NegOffset,
            AddrMode::PreIndex => AddrMode::NegPreIndex,
            AddrMode::PostIndex => AddrMode::NegPostIndex,
            AddrMode::NegOffset => AddrMode::Offset,
            AddrMode::NegPreIndex => AddrMode::PreIndex,
            AddrMode::NegPostIndex => AddrMode::PostIndex,
        }
    }
}

/// Memory operand in one of the A32 addressing modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemOperand {
    ty: Type,
    base: VarId,
    offset: Option<OperandId>,
    index: Option<VarId>,
    shift: Option<ShiftKind>,
    shift_amount: u16,
    mode: AddrMode,
}

impl MemOperand {
    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn base(&self) -> VarId {
        self.base
    }

    /// Immediate offset; always an i32 constant operand.
    pub fn offset(&self) -> Option<OperandId> {
        self.offset
    }

    pub fn index(&self) -> Option<VarId> {
        self.index
    }

    pub fn shift(&self) -> Option<ShiftKind> {
        self.shift
    }

    pub fn shift_amount(&self) -> u16 {
        self.shift_amount
    }

    pub fn addr_mode(&self) -> AddrMode {
        self.mode
    }

    pub fn is_reg_reg(&self) -> bool {
        self.index.is_some()
    }

    pub fn is_neg_addr_mode(&self) -> bool {
        self.mode.is_negative()
    }

    /// Whether a load/store of `ty` can encode `offset` in the immediate
    /// field. Sign-extending loads of narrow types use the 8-bit field.
    /// Offsets are sign-magnitude, and VFP offsets count words.
    pub fn can_hold_offset(ty: Type, sign_ext: bool, offset: i32) -> bool {
        let bits = ty.offset_bits(sign_ext);
        if bits == 0 {
            return offset == 0;
        }
        if ty.is_scalar_float() && offset % 4 != 0 {
            return false;
        }
        offset.unsigned_abs() < (1u32 << bits)
    }
}

/// Rotated 8-bit immediate: `imm ror (2 * rotate)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlexImm {
    ty: Type,
    imm: u32,
    rotate: u32,
}

impl FlexImm {
    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn imm(&self) -> u32 {
        self.imm
    }

    pub fn rotate_amt(&self) -> u32 {
        self.rotate
    }

    /// The 32-bit value denoted by the encoding.
    pub fn value(&self) -> u32 {
        self.imm.rotate_right(2 * self.rotate)
    }

    /// Find `(imm8, rotate)` with `imm8.rotate_right(2 * rotate) == value`.
    pub fn can_hold_imm(value: u32) -> Option<(u32, u32)> {
        (0..16u32).find_map(|rotate| {
            let imm = value.rotate_left(2 * rotate);
            (imm <= 0xFF).then_some((imm, rotate))
        })
    }
}

/// Register operand transformed by the barrel shifter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlexReg {
    ty: Type,
    reg: VarId,
    shift: Option<ShiftKind>,
    shift_amount: Option<OperandId>,
}

impl FlexReg {
    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn reg(&self) -> VarId {
        self.reg
    }

    pub fn shift(&self) -> Option<ShiftKind> {
        self.shift
    }

    /// An i32 constant or a general register.
    pub fn shift_amount(&self) -> Option<OperandId> {
        self.shift_amount
    }
}

/// Operand of an ARM32 instruction.
#[derive(Debug, PartialEq)]
pub enum Operand<'arena> {
    Variable(Variable<'arena>),
    ConstInteger32 { ty: Type, value: i32 },
    ConstInteger64 { value: i64 },
    ConstFloat(f32),
    ConstDouble(f64),
    Relocatable(ConstantRelocatable<'arena>),
    Mem(MemOperand),
    FlexImm(FlexImm),
    FlexReg(FlexReg),
}

impl PartialEq for Variable<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<'arena> Operand<'arena> {
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Variable(_) => OperandKind::Variable,
            Operand::ConstInteger32 { .. } => OperandKind::ConstInteger32,
            Operand::ConstInteger64 { .. } => OperandKind::ConstInteger64,
            Operand::ConstFloat(_) => OperandKind::ConstFloat,
            Operand::ConstDouble(_) => OperandKind::ConstDouble,
            Operand::Relocatable(_) => OperandKind::ConstRelocatable,
            Operand::Mem(_) => OperandKind::Mem,
            Operand::FlexImm(_) => OperandKind::FlexImm,
            Operand::FlexReg(_) => OperandKind::FlexReg,
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Operand::Variable(v) => v.ty(),
            Operand::ConstInteger32 { ty, .. } => *ty,
            Operand::ConstInteger64 { .. } => Type::I64,
            Operand::ConstFloat(_) => Type::F32,
            Operand::ConstDouble(_) => Type::F64,
            Operand::Relocatable(_) => Type::I32,
            Operand::Mem(m) => m.ty(),
            Operand::FlexImm(f) => f.ty(),
            Operand::FlexReg(f) => f.ty(),
        }
    }

    pub fn is_flex(&self) -> bool {
        matches!(self, Operand::FlexImm(_) | Operand::FlexReg(_))
    }

    pub fn as_mem(&self) -> Option<&MemOperand> {
        match self {
            Operand::Mem(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_flex_imm(&self) -> Option<&FlexImm> {
        match self {
            Operand::FlexImm(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_flex_reg(&self) -> Option<&FlexReg> {
        match self {
            Operand::FlexReg(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_relocatable(&self) -> Option<&ConstantRelocatable<'arena>> {
        match self {
            Operand::Relocatable(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_int32(&self) -> Option<i32> {
        match self {
            Operand::ConstInteger32 { value, .. } => Some(*value),
            _ => None,
        }
    }
}

impl<'arena> MachineFunction<'arena> {
    /// Fail unless `var` can live in a single core register.
    pub(crate) fn check_gpr(&self, var: VarId) -> BuildResult<()> {
        let ty = self.variable(var).ty();
        if !ty.is_gpr_type() {
            return Err(ConstructionError::NotGprOperand { var, ty });
        }
        Ok(())
    }

    /// Fail unless `var` lives in the VFP/NEON register file.
    pub(crate) fn check_fp(&self, var: VarId) -> BuildResult<()> {
        let ty = self.variable(var).ty();
        if !(ty.is_scalar_float() || ty.is_vector()) {
            return Err(ConstructionError::NotFpOperand { var, ty });
        }
        Ok(())
    }

    /// Build a memory operand. Exactly one of `offset` (an i32 constant) and
    /// `index` must be given; `shift` only applies to the index register.
    /// VFP and NEON accesses only take an immediate offset.
    pub fn create_mem(
        &mut self,
        ty: Type,
        base: VarId,
        offset: Option<OperandId>,
        index: Option<VarId>,
        shift: Option<(ShiftKind, u16)>,
        mode: AddrMode,
    ) -> BuildResult<OperandId> {
        self.check_gpr(base)?;
        match (offset, index) {
            (Some(_), Some(_)) => return Err(ConstructionError::MemOffsetAndIndex),
            (None, None) => return Err(ConstructionError::MemMissingAddress),
            (Some(offset), None) => {
                if shift.is_some() {
                    return Err(ConstructionError::MemShiftWithoutIndex);
                }
                let value = match self.operand(offset) {
                    Operand::ConstInteger32 {
                        ty: Type::I32,
                        value,
                    } => *value,
                    _ => return Err(ConstructionError::MemOffsetNotInteger { operand: offset }),
                };
                if !MemOperand::can_hold_offset(ty, false, value) {
                    return Err(ConstructionError::MemOffsetOutOfRange { ty, offset: value });
                }
                if (value < 0) != mode.is_negative() && value != 0 {
                    return Err(ConstructionError::MemOffsetSignMismatch { offset: value });
                }
            }
            (None, Some(index)) => {
                if ty.is_scalar_float() || ty.is_vector() {
                    return Err(ConstructionError::MemIndexNotAllowed { ty });
                }
                self.check_gpr(index)?;
                if let Some((kind, amount)) = shift {
                    kind.check_amount(u32::from(amount))?;
                }
            }
        }

        let (shift, shift_amount) = match shift {
            Some((kind, amount)) => (Some(kind), amount),
            None => (None, 0),
        };
        Ok(self.add_operand(Operand::Mem(MemOperand {
            ty,
            base,
            offset,
            index,
            shift,
            shift_amount,
            mode,
        })))
    }

    /// `[base, #offset]` style memory operand.
    pub fn create_mem_imm(
        &mut self,
        ty: Type,
        base: VarId,
        offset: OperandId,
        mode: AddrMode,
    ) -> BuildResult<OperandId> {
        self.create_mem(ty, base, Some(offset), None, None, mode)
    }

    /// `[base, ±index{, shift #amount}]` style memory operand.
    pub fn create_mem_reg(
        &mut self,
        ty: Type,
        base: VarId,
        index: VarId,
        shift: Option<(ShiftKind, u16)>,
        mode: AddrMode,
    ) -> BuildResult<OperandId> {
        self.create_mem(ty, base, None, Some(index), shift, mode)
    }

    /// Rotated immediate operand from an explicit encoding.
    pub fn create_flex_imm(&mut self, ty: Type, imm: u32, rotate: u32) -> BuildResult<OperandId> {
        if imm > 0xFF || rotate > 15 {
            return Err(ConstructionError::FlexImmOutOfRange { value: imm, rotate });
        }
        Ok(self.add_operand(Operand::FlexImm(FlexImm { ty, imm, rotate })))
    }

    /// Rotated immediate operand for `value`, if it has an encoding.
    pub fn try_flex_imm(&mut self, ty: Type, value: u32) -> Option<OperandId> {
        let (imm, rotate) = FlexImm::can_hold_imm(value)?;
        Some(self.add_operand(Operand::FlexImm(FlexImm { ty, imm, rotate })))
    }

    /// Shifted register operand. A shift amount is an i32 constant or a
    /// general register; RRX takes none.
    pub fn create_flex_reg(
        &mut self,
        ty: Type,
        reg: VarId,
        shift: Option<ShiftKind>,
        shift_amount: Option<OperandId>,
    ) -> BuildResult<OperandId> {
        self.check_gpr(reg)?;
        match (shift, shift_amount) {
            (None, None) | (Some(ShiftKind::Rrx), None) => {}
            (None, Some(amount)) => {
                return Err(ConstructionError::ShiftAmountInvalid { operand: amount })
            }
            (Some(kind), None) => return Err(ConstructionError::ShiftAmountMissing { kind }),
            (Some(kind), Some(amount)) => match self.operand(amount) {
                Operand::ConstInteger32 { value, .. } => {
                    let value = u32::try_from(*value).map_err(|_| {
                        ConstructionError::ShiftAmountOutOfRange {
                            kind,
                            amount: *value as u32,
                        }
                    })?;
                    kind.check_amount(value)?;
                }
                Operand::Variable(v) if v.ty().is_gpr_type() && kind != ShiftKind::Rrx => {}
                _ => return Err(ConstructionError::ShiftAmountInvalid { operand: amount }),
            },
        }
        Ok(self.add_operand(Operand::FlexReg(FlexReg {
            ty,
            reg,
            shift,
            shift_amount,
        })))
    }
}
