// This module implements the ARM32 instruction model. An instruction is one record with an
// optional destination, an ordered source list, a predicate slot and a deleted flag; what it
// means is decided by InstKind. The regular instruction shapes (unary, two-, three- and
// four-address, load, compare-like) are single InstKind variants parameterized by a small
// descriptor enum per shape, so every opcode of a shape shares one construction check and one
// emission routine keyed by the descriptor's mnemonic. The irregular instructions (wide
// multiply, multi-register move, conversions, FP compare and status transfer, barrier, trap,
// stack adjustment, call, return, push/pop, store, exclusive load/store) get their own variants.
// Predicable instructions hold Some(Condition), defaulting to AL; unpredicated ones hold None and
// reject set_predicate. All factories live on MachineFunction, validate their operands and
// return the InstId of a detached instruction, which the caller links into a block with
// MachineFunction::append.

//! Instruction shapes, descriptors and factories.

use crate::arm32::branch::BranchTargets;
use crate::arm32::cond::Condition;
use crate::arm32::function::{InstId, MachineFunction, OperandId, VarId};
use crate::arm32::operand::{AddrMode, Operand};
use crate::core::error::{BuildResult, ConstructionError};
use crate::core::types::Type;

/// Unary instructions on core registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryGprOp {
    Movw,
    Clz,
    Mvn,
    Rbit,
    Rev,
    Sxt,
    Uxt,
}

impl UnaryGprOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            UnaryGprOp::Movw => "movw",
            UnaryGprOp::Clz => "clz",
            UnaryGprOp::Mvn => "mvn",
            UnaryGprOp::Rbit => "rbit",
            UnaryGprOp::Rev => "rev",
            UnaryGprOp::Sxt => "sxt",
            UnaryGprOp::Uxt => "uxt",
        }
    }

    /// Whether the mnemonic takes the `b`/`h` suffix of the source width.
    pub fn needs_width_suffix(self) -> bool {
        matches!(self, UnaryGprOp::Sxt | UnaryGprOp::Uxt)
    }
}

/// Unary VFP/NEON instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryFpOp {
    Vsqrt,
    Vabs,
}

impl UnaryFpOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            UnaryFpOp::Vsqrt => "vsqrt",
            UnaryFpOp::Vabs => "vabs",
        }
    }
}

/// Instructions that read their destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TwoAddrGprOp {
    Movt,
}

impl TwoAddrGprOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            TwoAddrGprOp::Movt => "movt",
        }
    }
}

/// Data-processing instructions `rd := rn op flex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreeAddrGprOp {
    Adc,
    Add,
    And,
    Asr,
    Bic,
    Eor,
    Lsl,
    Lsr,
    Mul,
    Orr,
    Rsb,
    Sbc,
    Sdiv,
    Sub,
    Udiv,
}

impl ThreeAddrGprOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            ThreeAddrGprOp::Adc => "adc",
            ThreeAddrGprOp::Add => "add",
            ThreeAddrGprOp::And => "and",
            ThreeAddrGprOp::Asr => "asr",
            ThreeAddrGprOp::Bic => "bic",
            ThreeAddrGprOp::Eor => "eor",
            ThreeAddrGprOp::Lsl => "lsl",
            ThreeAddrGprOp::Lsr => "lsr",
            ThreeAddrGprOp::Mul => "mul",
            ThreeAddrGprOp::Orr => "orr",
            ThreeAddrGprOp::Rsb => "rsb",
            ThreeAddrGprOp::Sbc => "sbc",
            ThreeAddrGprOp::Sdiv => "sdiv",
            ThreeAddrGprOp::Sub => "sub",
            ThreeAddrGprOp::Udiv => "udiv",
        }
    }

    /// Multiplies and divides have no flexible second operand.
    pub fn requires_register_operands(self) -> bool {
        matches!(
            self,
            ThreeAddrGprOp::Mul | ThreeAddrGprOp::Sdiv | ThreeAddrGprOp::Udiv
        )
    }
}

/// VFP/NEON arithmetic; never predicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreeAddrFpOp {
    Vadd,
    Vdiv,
    Vmul,
    Vsub,
}

impl ThreeAddrFpOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            ThreeAddrFpOp::Vadd => "vadd",
            ThreeAddrFpOp::Vdiv => "vdiv",
            ThreeAddrFpOp::Vmul => "vmul",
            ThreeAddrFpOp::Vsub => "vsub",
        }
    }
}

/// Multiply-accumulate: `rd := ra ± rn * rm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FourAddrGprOp {
    Mla,
    Mls,
}

impl FourAddrGprOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            FourAddrGprOp::Mla => "mla",
            FourAddrGprOp::Mls => "mls",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Ldr,
    Ldrex,
}

impl LoadOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            LoadOp::Ldr => "ldr",
            LoadOp::Ldrex => "ldrex",
        }
    }
}

/// Flag-setting instructions without a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpLikeOp {
    Cmp,
    Tst,
}

impl CmpLikeOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CmpLikeOp::Cmp => "cmp",
            CmpLikeOp::Tst => "tst",
        }
    }
}

/// Direction of a `vcvt`. Integer results and operands live in
/// single-precision registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VcvtVariant {
    S2si,
    S2ui,
    Si2s,
    Ui2s,
    D2si,
    D2ui,
    Si2d,
    Ui2d,
    S2d,
    D2s,
}

impl VcvtVariant {
    pub fn suffix(self) -> &'static str {
        match self {
            VcvtVariant::S2si => ".s32.f32",
            VcvtVariant::S2ui => ".u32.f32",
            VcvtVariant::Si2s => ".f32.s32",
            VcvtVariant::Ui2s => ".f32.u32",
            VcvtVariant::D2si => ".s32.f64",
            VcvtVariant::D2ui => ".u32.f64",
            VcvtVariant::Si2d => ".f64.s32",
            VcvtVariant::Ui2d => ".f64.u32",
            VcvtVariant::S2d => ".f64.f32",
            VcvtVariant::D2s => ".f32.f64",
        }
    }

    /// Register types of (destination, source).
    pub fn operand_types(self) -> (Type, Type) {
        match self {
            VcvtVariant::S2si | VcvtVariant::S2ui => (Type::F32, Type::F32),
            VcvtVariant::Si2s | VcvtVariant::Ui2s => (Type::F32, Type::F32),
            VcvtVariant::D2si | VcvtVariant::D2ui | VcvtVariant::D2s => (Type::F32, Type::F64),
            VcvtVariant::Si2d | VcvtVariant::Ui2d | VcvtVariant::S2d => (Type::F64, Type::F32),
        }
    }
}

/// What an instruction is.
#[derive(Debug, Clone, PartialEq)]
pub enum InstKind<'arena> {
    UnaryGpr(UnaryGprOp),
    UnaryFp(UnaryFpOp),
    TwoAddrGpr(TwoAddrGprOp),
    ThreeAddrGpr { op: ThreeAddrGprOp, set_flags: bool },
    ThreeAddrFp(ThreeAddrFpOp),
    FourAddrGpr(FourAddrGprOp),
    Load(LoadOp),
    CmpLike(CmpLikeOp),
    Label { number: u32 },
    Br(BranchTargets),
    Umull { dest_hi: VarId },
    Mov { dest_hi: Option<VarId> },
    Vcvt(VcvtVariant),
    Vcmp,
    Vmrs,
    Dmb,
    Trap,
    AdjustStack { amount: u32 },
    Call,
    Ret,
    Push,
    Pop { dests: &'arena [VarId] },
    Store,
    Strex,
}

impl InstKind<'_> {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            InstKind::UnaryGpr(op) => op.mnemonic(),
            InstKind::UnaryFp(op) => op.mnemonic(),
            InstKind::TwoAddrGpr(op) => op.mnemonic(),
            InstKind::ThreeAddrGpr { op, .. } => op.mnemonic(),
            InstKind::ThreeAddrFp(op) => op.mnemonic(),
            InstKind::FourAddrGpr(op) => op.mnemonic(),
            InstKind::Load(op) => op.mnemonic(),
            InstKind::CmpLike(op) => op.mnemonic(),
            InstKind::Label { .. } => "label",
            InstKind::Br(_) => "br",
            InstKind::Umull { .. } => "umull",
            InstKind::Mov { .. } => "mov",
            InstKind::Vcvt(_) => "vcvt",
            InstKind::Vcmp => "vcmp",
            InstKind::Vmrs => "vmrs",
            InstKind::Dmb => "dmb",
            InstKind::Trap => "trap",
            InstKind::AdjustStack { .. } => "adjuststack",
            InstKind::Call => "call",
            InstKind::Ret => "ret",
            InstKind::Push => "push",
            InstKind::Pop { .. } => "pop",
            InstKind::Store => "str",
            InstKind::Strex => "strex",
        }
    }
}

/// A machine instruction.
#[derive(Debug)]
pub struct Inst<'arena> {
    kind: InstKind<'arena>,
    dest: Option<VarId>,
    srcs: Vec<OperandId>,
    predicate: Option<Condition>,
    deleted: bool,
}

impl<'arena> Inst<'arena> {
    pub(crate) fn new(
        kind: InstKind<'arena>,
        dest: Option<VarId>,
        srcs: Vec<OperandId>,
        predicate: Option<Condition>,
    ) -> Self {
        Self {
            kind,
            dest,
            srcs,
            predicate,
            deleted: false,
        }
    }

    pub fn kind(&self) -> &InstKind<'arena> {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut InstKind<'arena> {
        &mut self.kind
    }

    /// Destination; the low half for wide multiplies and split moves.
    pub fn dest(&self) -> Option<VarId> {
        self.dest
    }

    /// High destination of `umull` and of a multi-destination `mov`.
    pub fn dest_hi(&self) -> Option<VarId> {
        match self.kind {
            InstKind::Umull { dest_hi } => Some(dest_hi),
            InstKind::Mov { dest_hi } => dest_hi,
            _ => None,
        }
    }

    /// Registers written by `pop`.
    pub fn pop_dests(&self) -> &'arena [VarId] {
        match self.kind {
            InstKind::Pop { dests } => dests,
            _ => &[],
        }
    }

    pub fn srcs(&self) -> &[OperandId] {
        &self.srcs
    }

    pub fn src(&self, index: usize) -> Option<OperandId> {
        self.srcs.get(index).copied()
    }

    /// `None` for unpredicated instructions.
    pub fn predicate(&self) -> Option<Condition> {
        self.predicate
    }

    /// Condition suffix to print; empty for AL and unpredicated instructions.
    pub fn cond_suffix(&self) -> &'static str {
        self.predicate.map_or("", Condition::suffix)
    }

    pub(crate) fn set_predicate_unchecked(&mut self, cond: Condition) {
        self.predicate = Some(cond);
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn set_deleted(&mut self) {
        self.deleted = true;
    }

    pub fn is_label(&self) -> bool {
        matches!(self.kind, InstKind::Label { .. })
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.kind, InstKind::Br(_))
    }

    pub fn as_branch(&self) -> Option<&BranchTargets> {
        match &self.kind {
            InstKind::Br(targets) => Some(targets),
            _ => None,
        }
    }

    /// Number of native instructions this expands to.
    pub fn emit_inst_count(&self) -> u32 {
        match &self.kind {
            InstKind::Label { .. } => 0,
            InstKind::Br(targets) => targets.populated_count(),
            _ => 1,
        }
    }

    pub fn is_multi_dest(&self) -> bool {
        matches!(self.kind, InstKind::Mov { dest_hi: Some(_) })
    }

    pub fn is_multi_source(&self) -> bool {
        matches!(self.kind, InstKind::Mov { .. }) && self.srcs.len() == 2
    }
}

impl<'arena> MachineFunction<'arena> {
    /// The variable behind `operand`, or an error naming the slot.
    pub(crate) fn expect_var(&self, operand: OperandId, what: &'static str) -> BuildResult<VarId> {
        self.as_var(operand)
            .ok_or(ConstructionError::InvalidOperand { operand, what })
    }

    /// A core register or a flexible second operand.
    fn check_flex_src(&self, operand: OperandId, what: &'static str) -> BuildResult<()> {
        match self.operand(operand) {
            Operand::FlexImm(_) | Operand::FlexReg(_) => Ok(()),
            Operand::Variable(_) => self.check_gpr(VarId::from_operand(operand)),
            _ => Err(ConstructionError::InvalidOperand { operand, what }),
        }
    }

    fn check_distinct(regs: &[VarId]) -> BuildResult<()> {
        for (i, a) in regs.iter().enumerate() {
            if regs[i + 1..].contains(a) {
                return Err(ConstructionError::AliasingOperands);
            }
        }
        Ok(())
    }

    /// `ldrex`/`strex` only address `[rn]`.
    fn check_exclusive_mem(&self, mem: OperandId) -> BuildResult<()> {
        let what = "exclusive access address";
        let Operand::Mem(m) = self.operand(mem) else {
            return Err(ConstructionError::InvalidOperand { operand: mem, what });
        };
        let zero_offset = m
            .offset()
            .and_then(|off| self.operand(off).as_int32())
            .is_some_and(|value| value == 0);
        if !zero_offset || m.addr_mode() != AddrMode::Offset {
            return Err(ConstructionError::InvalidOperand { operand: mem, what });
        }
        Ok(())
    }

    /// Replace the predicate of a predicable instruction.
    pub fn set_predicate(&mut self, inst: InstId, cond: Condition) -> BuildResult<()> {
        let target = self.inst_mut(inst);
        if target.predicate.is_none() {
            return Err(ConstructionError::NotPredicable { inst });
        }
        target.predicate = Some(cond);
        Ok(())
    }

    pub fn create_unary_gpr(
        &mut self,
        op: UnaryGprOp,
        dest: VarId,
        src: OperandId,
        cond: Condition,
    ) -> BuildResult<InstId> {
        self.check_gpr(dest)?;
        match op {
            UnaryGprOp::Movw => match self.operand(src) {
                Operand::Relocatable(_) => {}
                Operand::ConstInteger32 { value, .. } if (0..=0xFFFF).contains(value) => {}
                _ => {
                    return Err(ConstructionError::InvalidOperand {
                        operand: src,
                        what: "movw immediate",
                    })
                }
            },
            UnaryGprOp::Mvn => self.check_flex_src(src, "mvn source")?,
            _ => {
                let var = self.expect_var(src, op.mnemonic())?;
                self.check_gpr(var)?;
            }
        }
        Ok(self.add_inst(Inst::new(
            InstKind::UnaryGpr(op),
            Some(dest),
            vec![src],
            Some(cond),
        )))
    }

    pub fn create_unary_fp(
        &mut self,
        op: UnaryFpOp,
        dest: VarId,
        src: VarId,
        cond: Condition,
    ) -> BuildResult<InstId> {
        self.check_fp(dest)?;
        self.check_fp(src)?;
        Ok(self.add_inst(Inst::new(
            InstKind::UnaryFp(op),
            Some(dest),
            vec![src.into()],
            Some(cond),
        )))
    }

    /// `movt dest, #imm16`. The destination is also the first source.
    pub fn create_movt(&mut self, dest: VarId, src: OperandId, cond: Condition) -> BuildResult<InstId> {
        self.check_gpr(dest)?;
        match self.operand(src) {
            Operand::Relocatable(_) => {}
            Operand::ConstInteger32 { value, .. } if (0..=0xFFFF).contains(value) => {}
            _ => {
                return Err(ConstructionError::InvalidOperand {
                    operand: src,
                    what: "movt immediate",
                })
            }
        }
        Ok(self.add_inst(Inst::new(
            InstKind::TwoAddrGpr(TwoAddrGprOp::Movt),
            Some(dest),
            vec![dest.into(), src],
            Some(cond),
        )))
    }

    pub fn create_three_addr_gpr(
        &mut self,
        op: ThreeAddrGprOp,
        dest: VarId,
        src0: VarId,
        src1: OperandId,
        set_flags: bool,
        cond: Condition,
    ) -> BuildResult<InstId> {
        self.check_gpr(dest)?;
        self.check_gpr(src0)?;
        if op.requires_register_operands() {
            let var = self.expect_var(src1, op.mnemonic())?;
            self.check_gpr(var)?;
        } else {
            self.check_flex_src(src1, op.mnemonic())?;
        }
        Ok(self.add_inst(Inst::new(
            InstKind::ThreeAddrGpr { op, set_flags },
            Some(dest),
            vec![src0.into(), src1],
            Some(cond),
        )))
    }

    pub fn create_three_addr_fp(
        &mut self,
        op: ThreeAddrFpOp,
        dest: VarId,
        src0: VarId,
        src1: VarId,
    ) -> BuildResult<InstId> {
        self.check_fp(dest)?;
        self.check_fp(src0)?;
        self.check_fp(src1)?;
        Ok(self.add_inst(Inst::new(
            InstKind::ThreeAddrFp(op),
            Some(dest),
            vec![src0.into(), src1.into()],
            None,
        )))
    }

    /// `op dest, src0, src1, src2` in assembly operand order.
    pub fn create_four_addr_gpr(
        &mut self,
        op: FourAddrGprOp,
        dest: VarId,
        src0: VarId,
        src1: VarId,
        src2: VarId,
        cond: Condition,
    ) -> BuildResult<InstId> {
        for var in [dest, src0, src1, src2] {
            self.check_gpr(var)?;
        }
        Ok(self.add_inst(Inst::new(
            InstKind::FourAddrGpr(op),
            Some(dest),
            vec![src0.into(), src1.into(), src2.into()],
            Some(cond),
        )))
    }

    /// `ldr` takes a memory operand, or a relocatable or flexible immediate
    /// for the literal-pool pseudo form. `ldrex` only takes `[rn]`.
    pub fn create_load(
        &mut self,
        op: LoadOp,
        dest: VarId,
        src: OperandId,
        cond: Condition,
    ) -> BuildResult<InstId> {
        match op {
            LoadOp::Ldr => match self.operand(src) {
                Operand::Mem(_) | Operand::Relocatable(_) | Operand::FlexImm(_) => {}
                _ => {
                    return Err(ConstructionError::InvalidOperand {
                        operand: src,
                        what: "load address",
                    })
                }
            },
            LoadOp::Ldrex => {
                self.check_gpr(dest)?;
                self.check_exclusive_mem(src)?;
            }
        }
        Ok(self.add_inst(Inst::new(
            InstKind::Load(op),
            Some(dest),
            vec![src],
            Some(cond),
        )))
    }

    pub fn create_cmp_like(
        &mut self,
        op: CmpLikeOp,
        src0: VarId,
        src1: OperandId,
        cond: Condition,
    ) -> BuildResult<InstId> {
        self.check_gpr(src0)?;
        self.check_flex_src(src1, op.mnemonic())?;
        Ok(self.add_inst(Inst::new(
            InstKind::CmpLike(op),
            None,
            vec![src0.into(), src1],
            Some(cond),
        )))
    }

    /// `umull lo, hi, src0, src1`. All four registers must be distinct.
    pub fn create_umull(
        &mut self,
        dest_lo: VarId,
        dest_hi: VarId,
        src0: VarId,
        src1: VarId,
        cond: Condition,
    ) -> BuildResult<InstId> {
        for var in [dest_lo, dest_hi, src0, src1] {
            self.check_gpr(var)?;
        }
        Self::check_distinct(&[dest_lo, dest_hi, src0, src1])?;
        Ok(self.add_inst(Inst::new(
            InstKind::Umull { dest_hi },
            Some(dest_lo),
            vec![src0.into(), src1.into()],
            Some(cond),
        )))
    }

    /// Register, memory or immediate move. A split 64-bit destination or
    /// source turns it into a two-register `vmov`.
    pub fn create_mov(&mut self, dest: VarId, src: OperandId, cond: Condition) -> BuildResult<InstId> {
        let dest_halves = self.variable(dest).halves();
        let src_halves = self
            .as_var(src)
            .and_then(|var| self.variable(var).halves());

        let (dest, dest_hi, srcs) = match (dest_halves, src_halves) {
            (Some(_), Some(_)) => return Err(ConstructionError::MovMultiDestAndSource),
            (Some((lo, hi)), None) => {
                let src_var = self.expect_var(src, "split move source")?;
                if self.variable(src_var).ty() != Type::F64 {
                    return Err(ConstructionError::NotFpOperand {
                        var: src_var,
                        ty: self.variable(src_var).ty(),
                    });
                }
                (lo, Some(hi), vec![src])
            }
            (None, Some((lo, hi))) => {
                if self.variable(dest).ty() != Type::F64 {
                    return Err(ConstructionError::NotFpOperand {
                        var: dest,
                        ty: self.variable(dest).ty(),
                    });
                }
                (dest, None, vec![lo.into(), hi.into()])
            }
            (None, None) => (dest, None, vec![src]),
        };
        Ok(self.add_inst(Inst::new(
            InstKind::Mov { dest_hi },
            Some(dest),
            srcs,
            Some(cond),
        )))
    }

    /// Store `value` to `mem`.
    pub fn create_store(&mut self, value: VarId, mem: OperandId, cond: Condition) -> BuildResult<InstId> {
        if self.operand(mem).as_mem().is_none() {
            return Err(ConstructionError::InvalidOperand {
                operand: mem,
                what: "store address",
            });
        }
        Ok(self.add_inst(Inst::new(
            InstKind::Store,
            None,
            vec![value.into(), mem],
            Some(cond),
        )))
    }

    /// `strex status, value, [rn]`.
    pub fn create_strex(
        &mut self,
        status: VarId,
        value: VarId,
        mem: OperandId,
        cond: Condition,
    ) -> BuildResult<InstId> {
        self.check_gpr(status)?;
        self.check_gpr(value)?;
        self.check_exclusive_mem(mem)?;
        if status == value {
            return Err(ConstructionError::AliasingOperands);
        }
        Ok(self.add_inst(Inst::new(
            InstKind::Strex,
            Some(status),
            vec![value.into(), mem],
            Some(cond),
        )))
    }

    pub fn create_vcvt(
        &mut self,
        dest: VarId,
        src: VarId,
        variant: VcvtVariant,
        cond: Condition,
    ) -> BuildResult<InstId> {
        let (dest_ty, src_ty) = variant.operand_types();
        let actual_dest = self.variable(dest).ty();
        if actual_dest != dest_ty {
            return Err(ConstructionError::NotFpOperand {
                var: dest,
                ty: actual_dest,
            });
        }
        let actual_src = self.variable(src).ty();
        if actual_src != src_ty {
            return Err(ConstructionError::NotFpOperand {
                var: src,
                ty: actual_src,
            });
        }
        Ok(self.add_inst(Inst::new(
            InstKind::Vcvt(variant),
            Some(dest),
            vec![src.into()],
            Some(cond),
        )))
    }

    /// `vcmp src0, src1`; `src1` may also be the constant zero.
    pub fn create_vcmp(&mut self, src0: VarId, src1: OperandId, cond: Condition) -> BuildResult<InstId> {
        self.check_fp(src0)?;
        let ty = self.variable(src0).ty();
        match self.operand(src1) {
            Operand::Variable(v) if v.ty() == ty => {}
            Operand::ConstFloat(value) if ty == Type::F32 && *value == 0.0 => {}
            Operand::ConstDouble(value) if ty == Type::F64 && *value == 0.0 => {}
            _ => {
                return Err(ConstructionError::InvalidOperand {
                    operand: src1,
                    what: "vcmp operand",
                })
            }
        }
        Ok(self.add_inst(Inst::new(
            InstKind::Vcmp,
            None,
            vec![src0.into(), src1],
            Some(cond),
        )))
    }

    /// Copy the FP status flags to APSR.
    pub fn create_vmrs(&mut self, cond: Condition) -> InstId {
        self.add_inst(Inst::new(InstKind::Vmrs, None, Vec::new(), Some(cond)))
    }

    pub fn create_dmb(&mut self) -> InstId {
        self.add_inst(Inst::new(InstKind::Dmb, None, Vec::new(), None))
    }

    /// Permanently undefined instruction.
    pub fn create_trap(&mut self) -> InstId {
        self.add_inst(Inst::new(InstKind::Trap, None, Vec::new(), None))
    }

    /// `sp := sp - amount`. `src` is an i32 constant or flexible immediate
    /// denoting exactly `amount`, or a core register holding it.
    pub fn create_adjust_stack(&mut self, sp: VarId, amount: u32, src: OperandId) -> BuildResult<InstId> {
        self.check_gpr(sp)?;
        let matches = match self.operand(src) {
            Operand::ConstInteger32 { value, .. } => u32::try_from(*value).ok() == Some(amount),
            Operand::FlexImm(imm) => imm.value() == amount,
            Operand::Variable(v) => v.ty().is_gpr_type(),
            _ => false,
        };
        if !matches {
            return Err(ConstructionError::StackAmountMismatch {
                amount,
                operand: src,
            });
        }
        Ok(self.add_inst(Inst::new(
            InstKind::AdjustStack { amount },
            Some(sp),
            vec![src],
            None,
        )))
    }

    /// Call a symbol, an absolute address or a register.
    pub fn create_call(&mut self, dest: Option<VarId>, target: OperandId) -> BuildResult<InstId> {
        match self.operand(target) {
            Operand::Relocatable(_) | Operand::ConstInteger32 { .. } => {}
            Operand::Variable(_) => self.check_gpr(VarId::from_operand(target))?,
            _ => {
                return Err(ConstructionError::InvalidOperand {
                    operand: target,
                    what: "call target",
                })
            }
        }
        Ok(self.add_inst(Inst::new(InstKind::Call, dest, vec![target], None)))
    }

    /// `bx lr`. The returned value is only kept alive, not used.
    pub fn create_ret(&mut self, lr: VarId, value: Option<OperandId>) -> BuildResult<InstId> {
        self.check_gpr(lr)?;
        let mut srcs = vec![lr.into()];
        srcs.extend(value);
        Ok(self.add_inst(Inst::new(InstKind::Ret, None, srcs, None)))
    }

    pub fn create_push(&mut self, regs: &[VarId]) -> BuildResult<InstId> {
        if regs.is_empty() {
            return Err(ConstructionError::EmptyRegisterList);
        }
        for &reg in regs {
            self.check_gpr(reg)?;
        }
        let srcs = regs.iter().map(|&reg| reg.into()).collect();
        Ok(self.add_inst(Inst::new(InstKind::Push, None, srcs, None)))
    }

    pub fn create_pop(&mut self, regs: &[VarId]) -> BuildResult<InstId> {
        if regs.is_empty() {
            return Err(ConstructionError::EmptyRegisterList);
        }
        for &reg in regs {
            self.check_gpr(reg)?;
        }
        let dests: &'arena [VarId] = self.arena().alloc_slice_copy(regs);
        Ok(self.add_inst(Inst::new(InstKind::Pop { dests }, None, Vec::new(), None)))
    }

    /// A single-register move from a variable to the same variable or to
    /// the same physical register.
    pub fn is_redundant_assign(&self, inst: InstId) -> bool {
        let inst = self.inst(inst);
        if !matches!(inst.kind(), InstKind::Mov { .. })
            || inst.is_multi_dest()
            || inst.is_multi_source()
        {
            return false;
        }
        let (Some(dest), Some(src)) = (inst.dest(), inst.src(0).and_then(|s| self.as_var(s))) else {
            return false;
        };
        if dest == src {
            return true;
        }
        match (self.variable(dest).reg(), self.variable(src).reg()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// A move whose source is a variable.
    pub fn is_var_assign(&self, inst: InstId) -> bool {
        let inst = self.inst(inst);
        matches!(inst.kind(), InstKind::Mov { .. })
            && inst.src(0).and_then(|s| self.as_var(s)).is_some()
    }
}
