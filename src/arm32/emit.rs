// This module implements textual emission of ARM32 machine functions. TextEmitter walks the blocks
// in layout order and turns every live instruction into one or more lines of GNU assembler
// syntax; inst_lines exposes the per-native-instruction lines so the fixup emitter can reuse the
// same formatting. Operand printing resolves variables to their assigned register, or to a
// frame-relative memory reference for stack variables (through the auxiliary base register when
// frame legalization set one), and reports variables that have neither. Each instruction shape
// has a single formatting routine keyed by its descriptor's mnemonic, the predicate suffix, the
// flag-setting suffix and the width string. Moves pick mov, vmov, a load or a store from the
// operand classes. The emitter keeps the running stack adjustment of the function so callers can
// check frame bookkeeping. The dump routines print a debug listing that names variables by %name
// instead of by register.

//! Assembly text emission and debug dumps.

use std::fmt::Write as _;

use crate::arm32::function::{InstId, MachineFunction, NodeId, OperandId, VarId};
use crate::arm32::inst::{Inst, InstKind, LoadOp, UnaryGprOp};
use crate::arm32::operand::{FlexReg, MemOperand, Operand, ShiftKind};
use crate::arm32::registers::{self, reg_name};
use crate::core::error::{EmitError, EmitResult};
use crate::core::register_file::{AsmReg, RegBitSet};
use crate::core::session::CompilationSession;
use crate::core::types::Type;

/// Emission settings.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Address register-less variables from `fp` (`Some(true)`) or `sp`
    /// (`Some(false)`) instead of following the function's setting.
    pub use_frame_pointer: Option<bool>,
    /// Record emitted instruction counts in the session statistics.
    pub record_stats: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            use_frame_pointer: None,
            record_stats: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Asm,
    Dump,
}

/// Formats operands of one function.
struct Printer<'f, 'arena> {
    func: &'f MachineFunction<'arena>,
    frame_reg: AsmReg,
    style: Style,
}

impl<'f, 'arena> Printer<'f, 'arena> {
    fn var(&self, var: VarId) -> EmitResult<String> {
        let variable = self.func.variable(var);
        if self.style == Style::Dump {
            return Ok(match variable.name() {
                Some(name) => format!("%{name}"),
                None => format!("%__{}", variable.index()),
            });
        }
        if let Some(reg) = variable.reg() {
            return Ok(reg_name(reg));
        }
        if let Some(offset) = variable.stack_offset() {
            let base = variable.stack_base_reg().unwrap_or(self.frame_reg);
            return Ok(format!("[{}, #{}]", reg_name(base), offset));
        }
        Err(EmitError::UnallocatedVariable { var })
    }

    fn imm(&self, value: impl std::fmt::Display) -> String {
        match self.style {
            Style::Asm => format!("#{value}"),
            Style::Dump => value.to_string(),
        }
    }

    fn operand(&self, id: OperandId) -> EmitResult<String> {
        Ok(match self.func.operand(id) {
            Operand::Variable(_) => self.var(VarId::from_operand(id))?,
            Operand::ConstInteger32 { value, .. } => self.imm(value),
            Operand::ConstInteger64 { value } => self.imm(value),
            Operand::ConstFloat(value) => self.imm(format!("{value:?}")),
            Operand::ConstDouble(value) => self.imm(format!("{value:?}")),
            Operand::Relocatable(reloc) => reloc.to_string(),
            Operand::Mem(mem) => self.mem(mem)?,
            Operand::FlexImm(imm) => self.imm(imm.value()),
            Operand::FlexReg(flex) => self.flex_reg(flex)?,
        })
    }

    fn shift(&self, kind: ShiftKind, amount: String) -> String {
        if kind == ShiftKind::Rrx {
            kind.to_string()
        } else {
            format!("{kind} {amount}")
        }
    }

    fn flex_reg(&self, flex: &FlexReg) -> EmitResult<String> {
        let mut text = self.var(flex.reg())?;
        if let Some(kind) = flex.shift() {
            let amount = match flex.shift_amount() {
                Some(amount) => self.operand(amount)?,
                None => String::new(),
            };
            write!(text, ", {}", self.shift(kind, amount))?;
        }
        Ok(text)
    }

    fn mem(&self, mem: &MemOperand) -> EmitResult<String> {
        let mode = mem.addr_mode();
        let mut text = format!("[{}", self.var(mem.base())?);
        if mode.is_post_index() {
            text.push(']');
        }
        if let Some(index) = mem.index() {
            let sign = if mode.is_negative() { "-" } else { "" };
            write!(text, ", {sign}{}", self.var(index)?)?;
            if let Some(kind) = mem.shift() {
                let amount = self.imm(mem.shift_amount());
                write!(text, ", {}", self.shift(kind, amount))?;
            }
        } else if let Some(offset) = mem.offset() {
            let value = self.func.operand(offset).as_int32().unwrap_or(0);
            if value != 0 {
                write!(text, ", {}", self.imm(value))?;
            }
        }
        if !mode.is_post_index() {
            text.push(']');
            if mode.is_pre_index() {
                text.push('!');
            }
        }
        Ok(text)
    }
}

fn is_vfp_type(ty: Type) -> bool {
    ty.is_scalar_float() || ty.is_vector()
}

/// `ldr`/`vldr`/`vld1` (or the store counterparts) for an access of `ty`.
fn access_mnemonic(base: &str, vfp: &str, vector: &str, ty: Type, cond: &str) -> String {
    if ty.is_scalar_float() {
        format!("{vfp}{cond}")
    } else if ty.is_vector() {
        format!("{vector}{cond}.64")
    } else {
        format!("{base}{}{cond}", ty.width_str())
    }
}

/// Assembly text emitter for one function.
pub struct TextEmitter<'f, 'arena> {
    printer: Printer<'f, 'arena>,
    out: String,
    stack_adjustment: u32,
    native_insts: usize,
}

impl<'f, 'arena> TextEmitter<'f, 'arena> {
    pub fn new(func: &'f MachineFunction<'arena>, options: &EmitOptions) -> Self {
        let frame_reg = match options.use_frame_pointer {
            Some(true) => registers::FP,
            Some(false) => registers::SP,
            None => func.frame_register(),
        };
        Self {
            printer: Printer {
                func,
                frame_reg,
                style: Style::Asm,
            },
            out: String::new(),
            stack_adjustment: 0,
            native_insts: 0,
        }
    }

    fn func(&self) -> &'f MachineFunction<'arena> {
        self.printer.func
    }

    /// Bytes currently allocated below the incoming stack pointer by
    /// emitted stack adjustments.
    pub fn stack_adjustment(&self) -> u32 {
        self.stack_adjustment
    }

    /// Native instructions emitted so far.
    pub fn native_inst_count(&self) -> usize {
        self.native_insts
    }

    pub(crate) fn record_inst(&mut self, inst: &Inst<'_>) {
        if let InstKind::AdjustStack { amount } = inst.kind() {
            self.stack_adjustment += amount;
        }
        self.native_insts += inst.emit_inst_count() as usize;
    }

    /// Emit a block label followed by its live instructions.
    pub fn emit_node(&mut self, node: NodeId) -> EmitResult<()> {
        let func = self.func();
        writeln!(self.out, "{}:", func.node_asm_name(node))?;
        for &id in func.node(node).insts() {
            if func.inst(id).is_deleted() {
                continue;
            }
            self.emit_inst(id)?;
        }
        Ok(())
    }

    pub fn emit_inst(&mut self, id: InstId) -> EmitResult<()> {
        let lines = self.inst_lines(id)?;
        for line in &lines {
            writeln!(self.out, "{line}")?;
        }
        self.record_inst(self.func().inst(id));
        Ok(())
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn label_text(&self, number: u32) -> String {
        format!(".L{}$local$__{}", self.func().name(), number)
    }

    /// Text of each native instruction `id` expands to. Labels yield their
    /// definition line.
    pub fn inst_lines(&self, id: InstId) -> EmitResult<Vec<String>> {
        let func = self.func();
        let p = &self.printer;
        let inst = func.inst(id);
        let cond = inst.cond_suffix();
        let dest = || -> EmitResult<String> {
            match inst.dest() {
                Some(dest) => p.var(dest),
                None => Ok(String::new()),
            }
        };
        let src = |index: usize| -> EmitResult<String> {
            match inst.src(index) {
                Some(src) => p.operand(src),
                None => Ok(String::new()),
            }
        };
        let src_ty = |index: usize| inst.src(index).map_or(Type::Void, |s| func.operand(s).ty());
        let dest_ty = inst.dest().map_or(Type::Void, |d| func.variable(d).ty());

        let line = match inst.kind() {
            InstKind::UnaryGpr(op) => {
                let width = if op.needs_width_suffix() {
                    src_ty(0).width_str()
                } else {
                    ""
                };
                let operand = match (op, inst.src(0).map(|s| func.operand(s))) {
                    (UnaryGprOp::Movw, Some(Operand::Relocatable(reloc))) => {
                        format!("#:lower16:{reloc}")
                    }
                    _ => src(0)?,
                };
                format!("\t{}{width}{cond}\t{}, {operand}", op.mnemonic(), dest()?)
            }
            InstKind::UnaryFp(op) => {
                format!(
                    "\t{}{cond}{}\t{}, {}",
                    op.mnemonic(),
                    dest_ty.vec_width_str(),
                    dest()?,
                    src(0)?
                )
            }
            InstKind::TwoAddrGpr(op) => {
                let operand = match inst.src(1).map(|s| func.operand(s)) {
                    Some(Operand::Relocatable(reloc)) => format!("#:upper16:{reloc}"),
                    _ => src(1)?,
                };
                format!("\t{}{cond}\t{}, {operand}", op.mnemonic(), dest()?)
            }
            InstKind::ThreeAddrGpr { op, set_flags } => {
                let s = if *set_flags { "s" } else { "" };
                format!(
                    "\t{}{s}{cond}\t{}, {}, {}",
                    op.mnemonic(),
                    dest()?,
                    src(0)?,
                    src(1)?
                )
            }
            InstKind::ThreeAddrFp(op) => format!(
                "\t{}{}\t{}, {}, {}",
                op.mnemonic(),
                dest_ty.vec_width_str(),
                dest()?,
                src(0)?,
                src(1)?
            ),
            InstKind::FourAddrGpr(op) => format!(
                "\t{}{cond}\t{}, {}, {}, {}",
                op.mnemonic(),
                dest()?,
                src(0)?,
                src(1)?,
                src(2)?
            ),
            InstKind::Load(op) => {
                let ty = src_ty(0);
                let mnemonic = match op {
                    LoadOp::Ldr => access_mnemonic("ldr", "vldr", "vld1", ty, cond),
                    LoadOp::Ldrex => format!("ldrex{}{cond}", ty.width_str()),
                };
                format!("\t{mnemonic}\t{}, {}", dest()?, self.load_source(inst)?)
            }
            InstKind::CmpLike(op) => {
                format!("\t{}{cond}\t{}, {}", op.mnemonic(), src(0)?, src(1)?)
            }
            InstKind::Label { number } => format!("{}:", self.label_text(*number)),
            InstKind::Br(targets) => {
                let first = if let Some(label) = targets.label() {
                    match func.inst(label).kind() {
                        InstKind::Label { number } => self.label_text(*number),
                        other => unreachable!("branch target {label:?} is a {}", other.mnemonic()),
                    }
                } else if let Some(target) = targets.target_true() {
                    func.node_asm_name(target)
                } else if let Some(target) = targets.target_false() {
                    func.node_asm_name(target)
                } else {
                    return Ok(Vec::new());
                };
                let mut lines = vec![format!("\tb{cond}\t{first}")];
                if let (Some(_), Some(target)) = (targets.target_true(), targets.target_false()) {
                    lines.push(format!("\tb\t{}", func.node_asm_name(target)));
                }
                return Ok(lines);
            }
            InstKind::Umull { dest_hi } => format!(
                "\tumull{cond}\t{}, {}, {}, {}",
                dest()?,
                p.var(*dest_hi)?,
                src(0)?,
                src(1)?
            ),
            InstKind::Mov { dest_hi } => self.mov_line(inst, *dest_hi)?,
            InstKind::Vcvt(variant) => {
                format!("\tvcvt{cond}{}\t{}, {}", variant.suffix(), dest()?, src(0)?)
            }
            InstKind::Vcmp => {
                let rhs = match inst.src(1).map(|s| func.operand(s)) {
                    Some(Operand::ConstFloat(_) | Operand::ConstDouble(_)) => "#0.0".to_string(),
                    _ => src(1)?,
                };
                format!("\tvcmp{cond}{}\t{}, {rhs}", src_ty(0).vec_width_str(), src(0)?)
            }
            InstKind::Vmrs => format!("\tvmrs{cond}\tAPSR_nzcv, FPSCR"),
            InstKind::Dmb => "\tdmb\tsy".to_string(),
            InstKind::Trap => "\t.long 0xe7fedef0".to_string(),
            InstKind::AdjustStack { .. } => format!("\tsub\tsp, sp, {}", src(0)?),
            InstKind::Call => match inst.src(0).map(|s| func.operand(s)) {
                Some(Operand::Relocatable(reloc)) => format!("\tbl\t{reloc}"),
                Some(Operand::ConstInteger32 { value, .. }) => format!("\tbl\t{:#x}", *value as u32),
                _ => format!("\tblx\t{}", src(0)?),
            },
            InstKind::Ret => "\tbx\tlr".to_string(),
            InstKind::Push => {
                let regs: Vec<VarId> = inst
                    .srcs()
                    .iter()
                    .filter_map(|&s| func.as_var(s))
                    .collect();
                format!("\tpush\t{}", self.reg_list(&regs)?)
            }
            InstKind::Pop { dests } => format!("\tpop\t{}", self.reg_list(dests)?),
            InstKind::Store => {
                let mnemonic = access_mnemonic("str", "vstr", "vst1", src_ty(1), cond);
                format!("\t{mnemonic}\t{}, {}", src(0)?, src(1)?)
            }
            InstKind::Strex => format!(
                "\tstrex{}{cond}\t{}, {}, {}",
                src_ty(1).width_str(),
                dest()?,
                src(0)?,
                src(1)?
            ),
        };
        Ok(vec![line])
    }

    /// Source of a load; literal-pool forms print as `=value`.
    fn load_source(&self, inst: &Inst<'_>) -> EmitResult<String> {
        let Some(src) = inst.src(0) else {
            return Ok(String::new());
        };
        Ok(match self.func().operand(src) {
            Operand::Relocatable(reloc) => format!("={reloc}"),
            Operand::FlexImm(imm) => format!("={}", imm.value()),
            _ => self.printer.operand(src)?,
        })
    }

    fn mov_line(&self, inst: &Inst<'_>, dest_hi: Option<VarId>) -> EmitResult<String> {
        let func = self.func();
        let p = &self.printer;
        let cond = inst.cond_suffix();
        let Some(dest) = inst.dest() else {
            return Ok(String::new());
        };
        let Some(src) = inst.src(0) else {
            return Ok(String::new());
        };

        if let Some(hi) = dest_hi {
            return Ok(format!(
                "\tvmov{cond}\t{}, {}, {}",
                p.var(dest)?,
                p.var(hi)?,
                p.operand(src)?
            ));
        }
        if inst.is_multi_source() {
            let hi = inst.src(1).map_or(Ok(String::new()), |hi| p.operand(hi))?;
            return Ok(format!(
                "\tvmov{cond}\t{}, {}, {hi}",
                p.var(dest)?,
                p.operand(src)?
            ));
        }

        let dest_var = func.variable(dest);
        let src_op = func.operand(src);
        if let Operand::Mem(mem) = src_op {
            let mnemonic = access_mnemonic("ldr", "vldr", "vld1", mem.ty(), cond);
            return Ok(format!("\t{mnemonic}\t{}, {}", p.var(dest)?, p.mem(mem)?));
        }
        if let Operand::Variable(v) = src_op {
            if !v.has_reg() && v.stack_offset().is_some() {
                let mnemonic = access_mnemonic("ldr", "vldr", "vld1", dest_var.ty(), cond);
                return Ok(format!("\t{mnemonic}\t{}, {}", p.var(dest)?, p.operand(src)?));
            }
        }
        if !dest_var.has_reg() && dest_var.stack_offset().is_some() {
            let mnemonic = access_mnemonic("str", "vstr", "vst1", dest_var.ty(), cond);
            return Ok(format!("\t{mnemonic}\t{}, {}", p.operand(src)?, p.var(dest)?));
        }

        let dest_vfp = is_vfp_type(dest_var.ty());
        let src_vfp = is_vfp_type(src_op.ty());
        let mnemonic = match (dest_vfp, src_vfp) {
            (true, true) => format!("vmov{cond}{}", dest_var.ty().vec_width_str()),
            (true, false) | (false, true) => format!("vmov{cond}"),
            (false, false) => format!("mov{cond}"),
        };
        Ok(format!("\t{mnemonic}\t{}, {}", p.var(dest)?, p.operand(src)?))
    }

    /// `{r4, r5, lr}` in ascending register order.
    fn reg_list(&self, regs: &[VarId]) -> EmitResult<String> {
        let mut set = RegBitSet::new();
        for &var in regs {
            let reg = self
                .func()
                .variable(var)
                .reg()
                .ok_or(EmitError::UnallocatedVariable { var })?;
            if !set.insert(reg) {
                return Err(EmitError::DuplicateRegister { reg: reg_name(reg) });
            }
        }
        let names: Vec<String> = set.iter().map(reg_name).collect();
        Ok(format!("{{{}}}", names.join(", ")))
    }
}

/// Emit a whole function as assembly text.
pub fn emit_function(
    session: &CompilationSession<'_>,
    func: &MachineFunction<'_>,
    options: &EmitOptions,
) -> EmitResult<String> {
    let mut emitter = TextEmitter::new(func, options);
    for node in func.nodes() {
        emitter.emit_node(node)?;
    }
    if options.record_stats {
        session.record_function_emitted(func.name(), emitter.native_inst_count());
    }
    log::debug!(
        "emitted {} native instructions for {}",
        emitter.native_inst_count(),
        func.name()
    );
    Ok(emitter.finish())
}

/// Debug listing of one instruction.
pub fn dump_inst(func: &MachineFunction<'_>, id: InstId) -> EmitResult<String> {
    let p = Printer {
        func,
        frame_reg: func.frame_register(),
        style: Style::Dump,
    };
    let inst = func.inst(id);
    let cond = inst.cond_suffix();
    let srcs = |from: usize| -> EmitResult<String> {
        let parts = inst.srcs()[from.min(inst.srcs().len())..]
            .iter()
            .map(|&s| p.operand(s))
            .collect::<EmitResult<Vec<_>>>()?;
        Ok(parts.join(", "))
    };
    let ty = inst
        .dest()
        .map(|d| func.variable(d).ty())
        .or_else(|| inst.src(0).map(|s| func.operand(s).ty()));
    let ty_suffix = ty.map_or(String::new(), |ty| format!(".{ty}"));

    let mut text = String::new();
    match inst.kind() {
        InstKind::Label { number } => {
            write!(text, ".L{}$local$__{}:", func.name(), number)?;
        }
        InstKind::Br(targets) => {
            write!(text, "br{cond}")?;
            if let Some(label) = targets.label() {
                if let InstKind::Label { number } = func.inst(label).kind() {
                    write!(text, " .L{}$local$__{}", func.name(), number)?;
                }
            }
            let blocks: Vec<String> = [targets.target_true(), targets.target_false()]
                .into_iter()
                .flatten()
                .map(|node| format!("label %{}", func.node(node).name()))
                .collect();
            if !blocks.is_empty() {
                write!(text, " {}", blocks.join(", "))?;
            }
        }
        InstKind::Load(op) => {
            let dest = inst.dest().map_or(Ok(String::new()), |d| p.var(d))?;
            write!(text, "{}{cond}{ty_suffix} {dest}, {}", op.mnemonic(), srcs(0)?)?;
        }
        InstKind::Pop { dests } => {
            let regs = dests
                .iter()
                .map(|&d| p.var(d))
                .collect::<EmitResult<Vec<_>>>()?;
            write!(text, "pop {}", regs.join(", "))?;
        }
        kind => {
            if let Some(dest) = inst.dest() {
                write!(text, "{}", p.var(dest)?)?;
                if let Some(hi) = inst.dest_hi() {
                    write!(text, ", {}", p.var(hi)?)?;
                }
                text.push_str(" = ");
            }
            let flags = match kind {
                InstKind::ThreeAddrGpr { set_flags: true, .. } => ".s",
                _ => "",
            };
            write!(text, "{}{cond}{ty_suffix}{flags} {}", kind.mnemonic(), srcs(0)?)?;
        }
    }
    Ok(text.trim_end().to_string())
}

/// Debug listing of a whole function; deleted instructions are skipped.
pub fn dump_function(func: &MachineFunction<'_>) -> EmitResult<String> {
    let mut out = String::new();
    for node in func.nodes() {
        writeln!(out, "{}:", func.node(node).name())?;
        for &id in func.node(node).insts() {
            if func.inst(id).is_deleted() {
                continue;
            }
            writeln!(out, "  {}", dump_inst(func, id)?)?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm32::cond::Condition;
    use crate::arm32::inst::{
        CmpLikeOp, FourAddrGprOp, ThreeAddrFpOp, ThreeAddrGprOp, UnaryFpOp, VcvtVariant,
    };
    use crate::arm32::operand::AddrMode;
    use crate::arm32::registers::{dreg, sreg, IP, LR, R0, R1, R2, R3, R4, R5, SP};
    use crate::core::test_utils::test::with_test_context;

    fn line(func: &MachineFunction<'_>, id: InstId) -> String {
        let emitter = TextEmitter::new(func, &EmitOptions::default());
        emitter.inst_lines(id).unwrap().join("\n")
    }

    #[test]
    fn test_memory_operand_forms() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "f");
            let base = func.make_reg_variable(Type::I32, R1);
            let index = func.make_reg_variable(Type::I32, R2);
            let dest = func.make_reg_variable(Type::I32, R0);
            let eight = func.const_int32(Type::I32, 8);
            let minus = func.const_int32(Type::I32, -4);
            let zero = func.const_int32(Type::I32, 0);

            let cases = [
                (func.create_mem_imm(Type::I32, base, eight, AddrMode::Offset), "[r1, #8]"),
                (func.create_mem_imm(Type::I32, base, eight, AddrMode::PreIndex), "[r1, #8]!"),
                (func.create_mem_imm(Type::I32, base, eight, AddrMode::PostIndex), "[r1], #8"),
                (func.create_mem_imm(Type::I32, base, minus, AddrMode::NegOffset), "[r1, #-4]"),
                (func.create_mem_imm(Type::I32, base, zero, AddrMode::Offset), "[r1]"),
                (
                    func.create_mem_reg(Type::I32, base, index, Some((ShiftKind::Lsl, 2)), AddrMode::Offset),
                    "[r1, r2, lsl #2]",
                ),
                (
                    func.create_mem_reg(Type::I32, base, index, None, AddrMode::NegPreIndex),
                    "[r1, -r2]!",
                ),
            ];
            for (mem, expected) in cases {
                let load = func
                    .create_load(LoadOp::Ldr, dest, mem.unwrap(), Condition::Al)
                    .unwrap();
                assert_eq!(line(&func, load), format!("\tldr\tr0, {expected}"));
            }
        });
    }

    #[test]
    fn test_flexible_operands() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "f");
            let r0 = func.make_reg_variable(Type::I32, R0);
            let r1 = func.make_reg_variable(Type::I32, R1);
            let r2 = func.make_reg_variable(Type::I32, R2);
            let imm = func.create_flex_imm(Type::I32, 0xFF, 4).unwrap();
            let three = func.const_int32(Type::I32, 3);
            let by_imm = func
                .create_flex_reg(Type::I32, r1, Some(ShiftKind::Lsl), Some(three))
                .unwrap();
            let by_reg = func
                .create_flex_reg(Type::I32, r1, Some(ShiftKind::Asr), Some(r2.into()))
                .unwrap();

            let add = func
                .create_three_addr_gpr(ThreeAddrGprOp::Add, r0, r1, imm, false, Condition::Al)
                .unwrap();
            let subs = func
                .create_three_addr_gpr(ThreeAddrGprOp::Sub, r0, r0, by_imm, true, Condition::Ne)
                .unwrap();
            let orr = func
                .create_three_addr_gpr(ThreeAddrGprOp::Orr, r0, r0, by_reg, false, Condition::Al)
                .unwrap();
            assert_eq!(line(&func, add), "\tadd\tr0, r1, #4278190080");
            assert_eq!(line(&func, subs), "\tsubsne\tr0, r0, r1, lsl #3");
            assert_eq!(line(&func, orr), "\torr\tr0, r0, r1, asr r2");
        });
    }

    #[test]
    fn test_unary_width_comes_from_source() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "f");
            let dest = func.make_reg_variable(Type::I32, R0);
            let byte = func.make_reg_variable(Type::I8, R1);
            let half = func.make_reg_variable(Type::I16, R2);
            let sxtb = func
                .create_unary_gpr(UnaryGprOp::Sxt, dest, byte.into(), Condition::Al)
                .unwrap();
            let uxth = func
                .create_unary_gpr(UnaryGprOp::Uxt, dest, half.into(), Condition::Gt)
                .unwrap();
            assert_eq!(line(&func, sxtb), "\tsxtb\tr0, r1");
            assert_eq!(line(&func, uxth), "\tuxthgt\tr0, r2");
        });
    }

    #[test]
    fn test_unary_width_only_on_extends() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "f");
            let dest = func.make_reg_variable(Type::I32, R0);
            let half = func.make_reg_variable(Type::I16, R1);
            let byte = func.make_reg_variable(Type::I8, R2);
            let mvn = func
                .create_unary_gpr(UnaryGprOp::Mvn, dest, half.into(), Condition::Al)
                .unwrap();
            let clz = func
                .create_unary_gpr(UnaryGprOp::Clz, dest, half.into(), Condition::Ne)
                .unwrap();
            let rev = func
                .create_unary_gpr(UnaryGprOp::Rev, dest, byte.into(), Condition::Al)
                .unwrap();
            assert_eq!(line(&func, mvn), "\tmvn\tr0, r1");
            assert_eq!(line(&func, clz), "\tclzne\tr0, r1");
            assert_eq!(line(&func, rev), "\trev\tr0, r2");
            assert!(UnaryGprOp::Sxt.needs_width_suffix());
            assert!(!UnaryGprOp::Movw.needs_width_suffix());
        });
    }

    #[test]
    fn test_movw_movt_relocatable() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "f");
            let dest = func.make_reg_variable(Type::I32, R3);
            let sym = func.const_relocatable("table", 0);
            let movw = func
                .create_unary_gpr(UnaryGprOp::Movw, dest, sym, Condition::Al)
                .unwrap();
            let movt = func.create_movt(dest, sym, Condition::Al).unwrap();
            assert_eq!(line(&func, movw), "\tmovw\tr3, #:lower16:table");
            assert_eq!(line(&func, movt), "\tmovt\tr3, #:upper16:table");
        });
    }

    #[test]
    fn test_fp_shapes() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "f");
            let d0 = func.make_reg_variable(Type::F64, dreg(0));
            let d1 = func.make_reg_variable(Type::F64, dreg(1));
            let s2 = func.make_reg_variable(Type::F32, sreg(2));
            let vadd = func
                .create_three_addr_fp(ThreeAddrFpOp::Vadd, d0, d0, d1)
                .unwrap();
            let vsqrt = func
                .create_unary_fp(UnaryFpOp::Vsqrt, d0, d1, Condition::Mi)
                .unwrap();
            let vcvt = func
                .create_vcvt(s2, d1, VcvtVariant::D2si, Condition::Al)
                .unwrap();
            let zero = func.const_double(0.0);
            let vcmp = func.create_vcmp(d0, zero, Condition::Al).unwrap();
            let vmrs = func.create_vmrs(Condition::Al);
            assert_eq!(line(&func, vadd), "\tvadd.f64\td0, d0, d1");
            assert_eq!(line(&func, vsqrt), "\tvsqrtmi.f64\td0, d1");
            assert_eq!(line(&func, vcvt), "\tvcvt.s32.f64\ts2, d1");
            assert_eq!(line(&func, vcmp), "\tvcmp.f64\td0, #0.0");
            assert_eq!(line(&func, vmrs), "\tvmrs\tAPSR_nzcv, FPSCR");
        });
    }

    #[test]
    fn test_mov_variants() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "f");
            let r0 = func.make_reg_variable(Type::I32, R0);
            let r1 = func.make_reg_variable(Type::I32, R1);
            let s0 = func.make_reg_variable(Type::F32, sreg(0));
            let s1 = func.make_reg_variable(Type::F32, sreg(1));
            let d2 = func.make_reg_variable(Type::F64, dreg(2));
            let slot = func.make_stack_variable(Type::I32, 12);
            let wide = func.make_variable64_on32();
            let (lo, hi) = func.variable(wide).halves().unwrap();
            func.variable_mut(lo).set_reg(R4);
            func.variable_mut(hi).set_reg(R5);
            let eight = func.const_int32(Type::I32, 8);
            let mem = func.create_mem_imm(Type::F32, r1, eight, AddrMode::Offset).unwrap();

            let cases = [
                (func.create_mov(r0, r1.into(), Condition::Al), "\tmov\tr0, r1"),
                (func.create_mov(s0, s1.into(), Condition::Eq), "\tvmoveq.f32\ts0, s1"),
                (func.create_mov(s0, r0.into(), Condition::Al), "\tvmov\ts0, r0"),
                (func.create_mov(s0, mem, Condition::Al), "\tvldr\ts0, [r1, #8]"),
                (func.create_mov(slot, r0.into(), Condition::Al), "\tstr\tr0, [sp, #12]"),
                (func.create_mov(wide, d2.into(), Condition::Al), "\tvmov\tr4, r5, d2"),
                (func.create_mov(d2, wide.into(), Condition::Al), "\tvmov\td2, r4, r5"),
            ];
            for (mov, expected) in cases {
                assert_eq!(line(&func, mov.unwrap()), expected);
            }
        });
    }

    #[test]
    fn test_stack_variable_base_register() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "f");
            func.set_uses_frame_pointer(true);
            let r0 = func.make_reg_variable(Type::I32, R0);
            let near = func.make_stack_variable(Type::I32, 16);
            let far = func.make_stack_variable(Type::I32, 8192);
            let frame = func.frame_register();
            func.legalize_stack_slot(far, frame, IP).unwrap();

            let to_near = func.create_mov(r0, near.into(), Condition::Al).unwrap();
            let to_far = func.create_mov(r0, far.into(), Condition::Al).unwrap();
            assert_eq!(line(&func, to_near), "\tldr\tr0, [fp, #16]");
            assert_eq!(line(&func, to_far), "\tldr\tr0, [ip, #8192]");

            let sp_relative = EmitOptions {
                use_frame_pointer: Some(false),
                ..EmitOptions::default()
            };
            let emitter = TextEmitter::new(&func, &sp_relative);
            assert_eq!(emitter.inst_lines(to_near).unwrap(), vec!["\tldr\tr0, [sp, #16]"]);
        });
    }

    #[test]
    fn test_unallocated_variable_is_an_error() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "f");
            let a = func.make_variable(Type::I32);
            let b = func.make_reg_variable(Type::I32, R1);
            let mov = func.create_mov(b, a.into(), Condition::Al).unwrap();
            let emitter = TextEmitter::new(&func, &EmitOptions::default());
            assert_eq!(
                emitter.inst_lines(mov),
                Err(EmitError::UnallocatedVariable { var: a })
            );
        });
    }

    #[test]
    fn test_push_pop_sorted_and_unique() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "f");
            let lr = func.make_reg_variable(Type::I32, LR);
            let r5 = func.make_reg_variable(Type::I32, R5);
            let r4 = func.make_reg_variable(Type::I32, R4);
            let r4_again = func.make_reg_variable(Type::I32, R4);
            let push = func.create_push(&[lr, r5, r4]).unwrap();
            let pop = func.create_pop(&[r4, lr, r5]).unwrap();
            let dup = func.create_push(&[r4, r4_again]).unwrap();
            assert_eq!(line(&func, push), "\tpush\t{r4, r5, lr}");
            assert_eq!(line(&func, pop), "\tpop\t{r4, r5, lr}");
            let emitter = TextEmitter::new(&func, &EmitOptions::default());
            assert_eq!(
                emitter.inst_lines(dup),
                Err(EmitError::DuplicateRegister {
                    reg: "r4".to_string()
                })
            );
        });
    }

    #[test]
    fn test_irregular_fixed_forms() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "f");
            let sp = func.make_reg_variable(Type::I32, SP);
            let lr = func.make_reg_variable(Type::I32, LR);
            let r0 = func.make_reg_variable(Type::I32, R0);
            let r1 = func.make_reg_variable(Type::I32, R1);
            let r2 = func.make_reg_variable(Type::I32, R2);
            let r3 = func.make_reg_variable(Type::I32, R3);
            let amount = func.const_int32(Type::I32, 16);
            let callee = func.const_relocatable("memcpy", 0);

            let dmb = func.create_dmb();
            let trap = func.create_trap();
            let adjust = func.create_adjust_stack(sp, 16, amount).unwrap();
            let call = func.create_call(Some(r0), callee).unwrap();
            let call_reg = func.create_call(None, r3.into()).unwrap();
            let ret = func.create_ret(lr, Some(r0.into())).unwrap();
            let umull = func.create_umull(r0, r1, r2, r3, Condition::Cc).unwrap();
            let mla = func
                .create_four_addr_gpr(FourAddrGprOp::Mla, r0, r1, r2, r3, Condition::Al)
                .unwrap();
            let tst = func
                .create_cmp_like(CmpLikeOp::Tst, r0, r1.into(), Condition::Al)
                .unwrap();

            assert_eq!(line(&func, dmb), "\tdmb\tsy");
            assert_eq!(line(&func, trap), "\t.long 0xe7fedef0");
            assert_eq!(line(&func, adjust), "\tsub\tsp, sp, #16");
            assert_eq!(line(&func, call), "\tbl\tmemcpy");
            assert_eq!(line(&func, call_reg), "\tblx\tr3");
            assert_eq!(line(&func, ret), "\tbx\tlr");
            assert_eq!(line(&func, umull), "\tumullcc\tr0, r1, r2, r3");
            assert_eq!(line(&func, mla), "\tmla\tr0, r1, r2, r3");
            assert_eq!(line(&func, tst), "\ttst\tr0, r1");
        });
    }

    #[test]
    fn test_emit_function_tracks_stack_and_branches() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "main");
            let entry = func.make_node("entry");
            let then = func.make_node("then");
            let exit = func.make_node("exit");
            let sp = func.make_reg_variable(Type::I32, SP);
            let r0 = func.make_reg_variable(Type::I32, R0);
            let lr = func.make_reg_variable(Type::I32, LR);
            let eight = func.const_int32(Type::I32, 8);
            let zero = func.try_flex_imm(Type::I32, 0).unwrap();

            let adjust = func.create_adjust_stack(sp, 8, eight).unwrap();
            let cmp = func
                .create_cmp_like(CmpLikeOp::Cmp, r0, zero, Condition::Al)
                .unwrap();
            let br = func.create_br_cond(exit, then, Condition::Eq).unwrap();
            for id in [adjust, cmp, br] {
                func.append(entry, id).unwrap();
            }
            let label = func.create_label();
            let to_label = func.create_br_label(label, Condition::Ne).unwrap();
            func.append(then, to_label).unwrap();
            func.append(then, label).unwrap();
            let ret = func.create_ret(lr, None).unwrap();
            func.append(exit, ret).unwrap();

            let text = emit_function(&session, &func, &EmitOptions::default()).unwrap();
            let expected = "\
.Lmain$entry:
\tsub\tsp, sp, #8
\tcmp\tr0, #0
\tbeq\t.Lmain$exit
\tb\t.Lmain$then
.Lmain$then:
\tbne\t.Lmain$local$__0
.Lmain$local$__0:
.Lmain$exit:
\tbx\tlr
";
            assert_eq!(text, expected);

            let mut emitter = TextEmitter::new(&func, &EmitOptions::default());
            emitter.emit_node(entry).unwrap();
            assert_eq!(emitter.stack_adjustment(), 8);
            assert_eq!(emitter.native_inst_count(), 4);
            assert_eq!(session.stats().functions_emitted, 1);
        });
    }

    #[test]
    fn test_dump_uses_variable_names() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "f");
            let entry = func.make_node("entry");
            let a = func.make_named_variable(Type::I32, "a");
            let b = func.make_named_variable(Type::I32, "b");
            let add = func
                .create_three_addr_gpr(ThreeAddrGprOp::Add, a, a, b.into(), true, Condition::Al)
                .unwrap();
            let cmp = func
                .create_cmp_like(CmpLikeOp::Cmp, a, b.into(), Condition::Al)
                .unwrap();
            func.append(entry, add).unwrap();
            func.append(entry, cmp).unwrap();
            assert_eq!(dump_inst(&func, add).unwrap(), "%a = add.i32.s %a, %b");
            assert_eq!(dump_inst(&func, cmp).unwrap(), "cmp.i32 %a, %b");
            assert_eq!(
                dump_function(&func).unwrap(),
                "entry:\n  %a = add.i32.s %a, %b\n  cmp.i32 %a, %b\n"
            );
        });
    }
}
