// This module implements integrated-assembler emission for ARM32 machine functions. Instead of
// producing bytes, every native instruction reserves four bytes in the output buffer and leaves a
// fixup describing what belongs there: the instruction text for ordinary instructions, a block
// or local-label target for branches, and an ELF relocation for references to symbols (movw/movt
// absolute address halves and bl calls, using the R_ARM_* constants from the object crate).
// Block starts and local labels are bound to the current buffer offset, and every branch fixup
// is checked against those bindings when the assembler is finished. Branches call start_next_inst before every native instruction after their first so
// the assembler can keep per-instruction bookkeeping (such as text fixup boundaries) exact. The
// Assembler trait is the seam for alternative back ends; FixupAssembler is the in-memory
// implementation used by tests and by callers that post-process fixups.

//! Fixup-based integrated-assembler emission.

use hashbrown::HashMap;
use object::elf;

use crate::arm32::cond::Condition;
use crate::arm32::emit::{EmitOptions, TextEmitter};
use crate::arm32::function::{MachineFunction, NodeId};
use crate::arm32::inst::{InstKind, UnaryGprOp};
use crate::arm32::operand::Operand;
use crate::core::error::{EmitError, EmitResult};
use crate::core::session::CompilationSession;

/// Size of one A32 instruction.
pub const INST_SIZE: u32 = 4;

/// What a fixup stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixupKind {
    /// Instruction text to be assembled at this offset.
    Text(String),
    /// Branch to the start of a block.
    BlockTarget { node: NodeId, cond: Condition },
    /// Branch to a local label of the same function.
    LocalLabel { number: u32, cond: Condition },
    /// ELF relocation against a symbol.
    Reloc {
        r_type: u32,
        symbol: String,
        addend: i32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixup {
    pub offset: u32,
    pub kind: FixupKind,
}

/// Sink for fixup-based emission.
pub trait Assembler {
    /// Current buffer offset.
    fn offset(&self) -> u32;

    /// Advance the buffer by `bytes`.
    fn reserve(&mut self, bytes: u32);

    /// Record a fixup at the current offset.
    fn add_fixup(&mut self, kind: FixupKind);

    /// Bind the start of block `node` to the current offset.
    fn bind_block(&mut self, node: NodeId);

    /// Bind local label `number` to the current offset.
    fn bind_local_label(&mut self, number: u32);

    /// Mark the start of another native instruction within the current one.
    fn start_next_inst(&mut self);
}

/// In-memory [`Assembler`] that collects fixups.
#[derive(Debug, Default)]
pub struct FixupAssembler {
    size: u32,
    fixups: Vec<Fixup>,
    labels: HashMap<u32, u32>,
    blocks: HashMap<NodeId, u32>,
    inst_boundaries: Vec<u32>,
}

impl FixupAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixups(&self) -> &[Fixup] {
        &self.fixups
    }

    pub fn label_offset(&self, number: u32) -> Option<u32> {
        self.labels.get(&number).copied()
    }

    pub fn block_offset(&self, node: NodeId) -> Option<u32> {
        self.blocks.get(&node).copied()
    }

    /// Offsets recorded by [`Assembler::start_next_inst`].
    pub fn inst_boundaries(&self) -> &[u32] {
        &self.inst_boundaries
    }

    /// Check that every block and local label branched to was bound and
    /// return the fixups with the code size.
    pub fn finish(self) -> EmitResult<(u32, Vec<Fixup>)> {
        for fixup in &self.fixups {
            match fixup.kind {
                FixupKind::LocalLabel { number, .. } if !self.labels.contains_key(&number) => {
                    return Err(EmitError::UnboundLabel { number });
                }
                FixupKind::BlockTarget { node, .. } if !self.blocks.contains_key(&node) => {
                    return Err(EmitError::UnboundBlock { node });
                }
                _ => {}
            }
        }
        Ok((self.size, self.fixups))
    }
}

impl Assembler for FixupAssembler {
    fn offset(&self) -> u32 {
        self.size
    }

    fn reserve(&mut self, bytes: u32) {
        self.size += bytes;
    }

    fn add_fixup(&mut self, kind: FixupKind) {
        self.fixups.push(Fixup {
            offset: self.size,
            kind,
        });
    }

    fn bind_block(&mut self, node: NodeId) {
        self.blocks.insert(node, self.size);
    }

    fn bind_local_label(&mut self, number: u32) {
        self.labels.insert(number, self.size);
    }

    fn start_next_inst(&mut self) {
        self.inst_boundaries.push(self.size);
    }
}

/// Relocation needed by an instruction that references a symbol.
fn reloc_for(func: &MachineFunction<'_>, kind: &InstKind<'_>, src: Option<&Operand<'_>>) -> Option<FixupKind> {
    let Some(Operand::Relocatable(reloc)) = src else {
        return None;
    };
    let r_type = match kind {
        InstKind::UnaryGpr(UnaryGprOp::Movw) => elf::R_ARM_MOVW_ABS_NC,
        InstKind::TwoAddrGpr(_) => elf::R_ARM_MOVT_ABS,
        InstKind::Call => elf::R_ARM_CALL,
        _ => return None,
    };
    log::trace!("{}: relocation {r_type} against {}", func.name(), reloc.name());
    Some(FixupKind::Reloc {
        r_type,
        symbol: reloc.name().to_string(),
        addend: reloc.offset(),
    })
}

/// Emit a function through `asm`, one fixup per native instruction.
pub fn emit_ias<A: Assembler>(
    session: &CompilationSession<'_>,
    func: &MachineFunction<'_>,
    options: &EmitOptions,
    asm: &mut A,
) -> EmitResult<()> {
    let mut emitter = TextEmitter::new(func, options);
    for node in func.nodes() {
        asm.bind_block(node);
        for &id in func.node(node).insts() {
            let inst = func.inst(id);
            if inst.is_deleted() {
                continue;
            }
            let cond = inst.predicate().unwrap_or_default();
            match inst.kind() {
                InstKind::Label { number } => asm.bind_local_label(*number),
                InstKind::Br(targets) => {
                    let mut kinds = Vec::with_capacity(2);
                    if let Some(label) = targets.label() {
                        if let InstKind::Label { number } = func.inst(label).kind() {
                            kinds.push(FixupKind::LocalLabel {
                                number: *number,
                                cond,
                            });
                        }
                    }
                    if let Some(node) = targets.target_true() {
                        kinds.push(FixupKind::BlockTarget { node, cond });
                    }
                    if let Some(node) = targets.target_false() {
                        // The second branch of a two-way pair is unconditional.
                        let cond = if kinds.is_empty() { cond } else { Condition::Al };
                        kinds.push(FixupKind::BlockTarget { node, cond });
                    }
                    for (i, kind) in kinds.into_iter().enumerate() {
                        if i > 0 {
                            asm.start_next_inst();
                        }
                        asm.add_fixup(kind);
                        asm.reserve(INST_SIZE);
                    }
                }
                kind => {
                    let src = match kind {
                        InstKind::TwoAddrGpr(_) => inst.src(1),
                        _ => inst.src(0),
                    };
                    let reloc = reloc_for(func, kind, src.map(|s| func.operand(s)));
                    for (i, line) in emitter.inst_lines(id)?.into_iter().enumerate() {
                        if i > 0 {
                            asm.start_next_inst();
                        }
                        if let Some(reloc) = reloc.clone().filter(|_| i == 0) {
                            asm.add_fixup(reloc);
                        }
                        asm.add_fixup(FixupKind::Text(line));
                        asm.reserve(INST_SIZE);
                    }
                }
            }
            emitter.record_inst(inst);
        }
    }
    if options.record_stats {
        session.record_function_emitted(func.name(), emitter.native_inst_count());
    }
    log::debug!(
        "emitted {} bytes of fixups for {}",
        asm.offset(),
        func.name()
    );
    Ok(())
}
