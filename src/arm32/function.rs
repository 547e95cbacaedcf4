// This module implements MachineFunction, the per-compilation-unit arena of the ARM32 backend.
// Operands, instructions and blocks are stored in plain tables and referenced through small
// copyable handles (OperandId, VarId, InstId, NodeId), so identity is a comparable value and
// every object lives exactly as long as the function that owns it. Variables are operands too:
// a VarId is an OperandId that is statically known to name a Variable, which lets instructions
// keep a single ordered source list. Symbol names, block names and register lists are copied
// into the session's bumpalo arena and shared for the 'arena lifetime. Blocks keep their
// instruction lists in execution order and the block table order is the layout order used by
// branch optimization and emission. The module also provides the variable and constant
// factories, the 64-on-32 split variables used by multi-part moves, and stack-slot
// legalization, which decides whether a stack variable needs an auxiliary base register.

//! Per-function arena of operands, instructions and blocks.

use bumpalo::Bump;

use crate::arm32::inst::Inst;
use crate::arm32::operand::{ConstantRelocatable, MemOperand, Operand, Variable, VariableKind};
use crate::arm32::registers;
use crate::core::error::{BuildResult, ConstructionError};
use crate::core::register_file::AsmReg;
use crate::core::session::CompilationSession;
use crate::core::types::Type;

/// Handle of an operand in a [`MachineFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperandId(u32);

/// Handle of an operand that is known to be a [`Variable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

/// Handle of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(u32);

/// Handle of a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl OperandId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Callers must have checked that `operand` is a variable.
    pub(crate) fn from_operand(operand: OperandId) -> Self {
        VarId(operand.0)
    }
}

impl InstId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<VarId> for OperandId {
    fn from(var: VarId) -> Self {
        OperandId(var.0)
    }
}

/// A basic block: a name and its instructions in execution order.
#[derive(Debug)]
pub struct CfgNode<'arena> {
    name: &'arena str,
    insts: Vec<InstId>,
}

impl<'arena> CfgNode<'arena> {
    pub fn name(&self) -> &'arena str {
        self.name
    }

    pub fn insts(&self) -> &[InstId] {
        &self.insts
    }
}

/// Operand, instruction and block tables of one function.
pub struct MachineFunction<'arena> {
    arena: &'arena Bump,
    name: &'arena str,
    operands: Vec<Operand<'arena>>,
    insts: Vec<Inst<'arena>>,
    nodes: Vec<CfgNode<'arena>>,
    num_variables: u32,
    next_label_number: u32,
    uses_frame_pointer: bool,
}

impl<'arena> MachineFunction<'arena> {
    /// Create an empty function whose names live in the session arena.
    pub fn new(session: &CompilationSession<'arena>, name: &str) -> Self {
        session.record_function_created();
        Self {
            arena: session.arena(),
            name: session.intern_str(name),
            operands: Vec::new(),
            insts: Vec::new(),
            nodes: Vec::new(),
            num_variables: 0,
            next_label_number: 0,
            uses_frame_pointer: false,
        }
    }

    pub fn name(&self) -> &'arena str {
        self.name
    }

    pub(crate) fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Whether register-less variables are addressed from `fp` instead of `sp`.
    pub fn uses_frame_pointer(&self) -> bool {
        self.uses_frame_pointer
    }

    pub fn set_uses_frame_pointer(&mut self, uses_fp: bool) {
        self.uses_frame_pointer = uses_fp;
    }

    /// The register stack offsets are relative to.
    pub fn frame_register(&self) -> AsmReg {
        if self.uses_frame_pointer {
            registers::FP
        } else {
            registers::SP
        }
    }

    // ------------------------------------------------------------------
    // Operands
    // ------------------------------------------------------------------

    pub fn operand(&self, id: OperandId) -> &Operand<'arena> {
        &self.operands[id.index()]
    }

    pub(crate) fn add_operand(&mut self, operand: Operand<'arena>) -> OperandId {
        let id = OperandId(self.operands.len() as u32);
        self.operands.push(operand);
        id
    }

    pub fn num_operands(&self) -> usize {
        self.operands.len()
    }

    /// Returns the variable behind an operand, if it is one.
    pub fn as_var(&self, id: OperandId) -> Option<VarId> {
        match self.operand(id) {
            Operand::Variable(_) => Some(VarId::from_operand(id)),
            _ => None,
        }
    }

    pub fn variable(&self, var: VarId) -> &Variable<'arena> {
        match &self.operands[var.index()] {
            Operand::Variable(v) => v,
            other => unreachable!("{var:?} names a {:?} operand", other.kind()),
        }
    }

    pub fn variable_mut(&mut self, var: VarId) -> &mut Variable<'arena> {
        match &mut self.operands[var.index()] {
            Operand::Variable(v) => v,
            other => unreachable!("{var:?} names a {:?} operand", other.kind()),
        }
    }

    fn add_variable(&mut self, ty: Type, name: Option<&str>, kind: VariableKind) -> VarId {
        let arena = self.arena;
        let name: Option<&'arena str> = name.map(|n| &*arena.alloc_str(n));
        let variable = Variable::new(ty, self.num_variables, name, kind);
        self.num_variables += 1;
        let id = self.add_operand(Operand::Variable(variable));
        log::trace!("new variable {id:?}: {ty}");
        VarId(id.0)
    }

    /// Create a variable to be assigned a register later.
    pub fn make_variable(&mut self, ty: Type) -> VarId {
        self.add_variable(ty, None, VariableKind::Regular)
    }

    pub fn make_named_variable(&mut self, ty: Type, name: &str) -> VarId {
        self.add_variable(ty, Some(name), VariableKind::Regular)
    }

    /// Create a variable pre-assigned to a physical register.
    pub fn make_reg_variable(&mut self, ty: Type, reg: AsmReg) -> VarId {
        let var = self.make_variable(ty);
        self.variable_mut(var).set_reg(reg);
        var
    }

    /// Create an i64 variable backed by two i32 halves. Moves into or out of
    /// it become multi-register moves.
    pub fn make_variable64_on32(&mut self) -> VarId {
        let lo = self.make_variable(Type::I32);
        let hi = self.make_variable(Type::I32);
        self.add_variable(Type::I64, None, VariableKind::Split64 { lo, hi })
    }

    /// Create a variable that lives only in a stack slot at `offset` from the
    /// frame register.
    pub fn make_stack_variable(&mut self, ty: Type, offset: i32) -> VarId {
        let var = self.add_variable(ty, None, VariableKind::Stack { base_reg: None });
        self.variable_mut(var).set_stack_offset(offset);
        var
    }

    pub fn num_variables(&self) -> u32 {
        self.num_variables
    }

    /// Decide the base register of a stack variable. The offset is kept
    /// relative to `frame_reg` when it fits the immediate field of a
    /// zero-extending access of the variable's type; otherwise `scratch`
    /// becomes the auxiliary base. Returns whether an auxiliary base is needed.
    pub fn legalize_stack_slot(
        &mut self,
        var: VarId,
        frame_reg: AsmReg,
        scratch: AsmReg,
    ) -> BuildResult<bool> {
        if scratch == frame_reg {
            return Err(ConstructionError::BaseRegisterIsFrameRegister);
        }
        let variable = self.variable(var);
        let ty = variable.ty();
        let offset = variable
            .stack_offset()
            .ok_or(ConstructionError::NoStackSlot { var })?;
        if !variable.is_stack_variable() {
            return Err(ConstructionError::NoStackSlot { var });
        }

        let needs_base = !MemOperand::can_hold_offset(ty, false, offset);
        let base = if needs_base { Some(scratch) } else { None };
        self.variable_mut(var).set_stack_base_reg(base);
        if needs_base {
            log::debug!("stack slot {var:?} at offset {offset} needs an auxiliary base");
        }
        Ok(needs_base)
    }

    // ------------------------------------------------------------------
    // Constants
    // ------------------------------------------------------------------

    /// 32-bit (or narrower) integer constant.
    pub fn const_int32(&mut self, ty: Type, value: i32) -> OperandId {
        self.add_operand(Operand::ConstInteger32 { ty, value })
    }

    pub fn const_int64(&mut self, value: i64) -> OperandId {
        self.add_operand(Operand::ConstInteger64 { value })
    }

    pub fn const_float(&mut self, value: f32) -> OperandId {
        self.add_operand(Operand::ConstFloat(value))
    }

    pub fn const_double(&mut self, value: f64) -> OperandId {
        self.add_operand(Operand::ConstDouble(value))
    }

    /// Symbolic address resolved by a relocation.
    pub fn const_relocatable(&mut self, name: &str, offset: i32) -> OperandId {
        let name = self.arena.alloc_str(name);
        self.add_operand(Operand::Relocatable(ConstantRelocatable::new(name, offset)))
    }

    // ------------------------------------------------------------------
    // Blocks and instructions
    // ------------------------------------------------------------------

    /// Append a block; blocks are laid out in creation order.
    pub fn make_node(&mut self, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let name = self.arena.alloc_str(name);
        self.nodes.push(CfgNode {
            name,
            insts: Vec::new(),
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &CfgNode<'arena> {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Block following `node` in layout order.
    pub fn next_node(&self, node: NodeId) -> Option<NodeId> {
        let next = node.index() + 1;
        (next < self.nodes.len()).then_some(NodeId(next as u32))
    }

    /// Assembly label of a block.
    pub fn node_asm_name(&self, node: NodeId) -> String {
        format!(".L{}${}", self.name, self.node(node).name)
    }

    pub(crate) fn add_inst(&mut self, inst: Inst<'arena>) -> InstId {
        let id = InstId(self.insts.len() as u32);
        log::trace!("new instruction {id:?}: {}", inst.kind().mnemonic());
        self.insts.push(inst);
        id
    }

    /// Append an instruction to the end of a block.
    pub fn append(&mut self, node: NodeId, inst: InstId) -> BuildResult<()> {
        let block = self
            .nodes
            .get_mut(node.index())
            .ok_or(ConstructionError::UnknownNode { node })?;
        block.insts.push(inst);
        Ok(())
    }

    pub fn inst(&self, id: InstId) -> &Inst<'arena> {
        &self.insts[id.index()]
    }

    pub fn inst_mut(&mut self, id: InstId) -> &mut Inst<'arena> {
        &mut self.insts[id.index()]
    }

    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    pub(crate) fn inst_id(&self, index: usize) -> InstId {
        debug_assert!(index < self.insts.len());
        InstId(index as u32)
    }

    pub(crate) fn next_label_number(&mut self) -> u32 {
        let number = self.next_label_number;
        self.next_label_number += 1;
        number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_utils::test::with_test_context;

    #[test]
    fn test_variables_are_operands() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "f");
            let a = func.make_variable(Type::I32);
            let c = func.const_int32(Type::I32, 7);
            assert_eq!(func.as_var(a.into()), Some(a));
            assert_eq!(func.as_var(c), None);
            assert_eq!(func.num_variables(), 1);
        });
    }

    #[test]
    fn test_split_variable_halves() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "f");
            let wide = func.make_variable64_on32();
            let (lo, hi) = func.variable(wide).halves().unwrap();
            assert_eq!(func.variable(lo).ty(), Type::I32);
            assert_eq!(func.variable(hi).ty(), Type::I32);
            assert_eq!(func.variable(wide).ty(), Type::I64);
        });
    }

    #[test]
    fn test_node_layout() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "main");
            let entry = func.make_node("entry");
            let exit = func.make_node("exit");
            assert_eq!(func.next_node(entry), Some(exit));
            assert_eq!(func.next_node(exit), None);
            assert_eq!(func.node_asm_name(exit), ".Lmain$exit");
        });
    }

    #[test]
    fn test_stack_slot_legalization() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "f");
            let near = func.make_stack_variable(Type::I32, 4092);
            let far = func.make_stack_variable(Type::I32, 4096);
            let frame = func.frame_register();

            assert!(!func.legalize_stack_slot(near, frame, registers::IP).unwrap());
            assert_eq!(func.variable(near).stack_base_reg(), None);

            assert!(func.legalize_stack_slot(far, frame, registers::IP).unwrap());
            assert_eq!(func.variable(far).stack_base_reg(), Some(registers::IP));
        });
    }

    #[test]
    fn test_stack_slot_legalization_rejects_frame_register() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "f");
            let var = func.make_stack_variable(Type::I16, 512);
            assert_eq!(
                func.legalize_stack_slot(var, registers::SP, registers::SP),
                Err(ConstructionError::BaseRegisterIsFrameRegister)
            );
        });
    }

    #[test]
    fn test_narrow_stack_slot_uses_narrow_range() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let mut func = MachineFunction::new(&session, "f");
            let half = func.make_stack_variable(Type::I16, 256);
            assert!(func
                .legalize_stack_slot(half, registers::SP, registers::IP)
                .unwrap());
        });
    }
}
