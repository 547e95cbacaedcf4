// This module implements the control-flow instructions of the ARM32 backend: local labels and
// branches. A branch either targets one or two blocks (targetTrue taken when the condition holds,
// targetFalse otherwise or unconditionally) or a local label inside the current block. Branch
// optimization runs once the block layout is final: a branch to the block that follows it in
// layout order is dropped, a two-way branch whose false edge falls through loses that edge, and a
// two-way branch whose true edge falls through has its condition inverted and its edges swapped.
// Edge repointing rewrites block targets in place when the CFG is restructured (for example when
// a split edge block is inserted). The function-level passes walk every block and report whether
// anything changed, logging each rewrite at debug level.

//! Labels, branches and branch rewriting.

use crate::arm32::cond::Condition;
use crate::arm32::function::{InstId, MachineFunction, NodeId};
use crate::arm32::inst::{Inst, InstKind};
use crate::core::error::{BuildResult, ConstructionError};

/// Targets of a branch. Either a label or at least one block is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BranchTargets {
    target_true: Option<NodeId>,
    target_false: Option<NodeId>,
    label: Option<InstId>,
}

impl BranchTargets {
    /// Taken when the condition holds.
    pub fn target_true(&self) -> Option<NodeId> {
        self.target_true
    }

    /// Taken otherwise; the only target of an unconditional branch.
    pub fn target_false(&self) -> Option<NodeId> {
        self.target_false
    }

    pub fn label(&self) -> Option<InstId> {
        self.label
    }

    pub fn is_to_label(&self) -> bool {
        self.label.is_some()
    }

    /// Each populated target becomes one native `b`.
    pub fn populated_count(&self) -> u32 {
        [
            self.label.is_some(),
            self.target_true.is_some(),
            self.target_false.is_some(),
        ]
        .into_iter()
        .filter(|&set| set)
        .count() as u32
    }

    fn repoint(&mut self, old: NodeId, new: NodeId) -> bool {
        let mut changed = false;
        if self.target_false == Some(old) {
            self.target_false = Some(new);
            changed = true;
        }
        if self.target_true == Some(old) {
            self.target_true = Some(new);
            changed = true;
        }
        changed
    }
}

impl<'arena> MachineFunction<'arena> {
    /// Create a local label with the next number of this function.
    pub fn create_label(&mut self) -> InstId {
        let number = self.next_label_number();
        self.add_inst(Inst::new(InstKind::Label { number }, None, Vec::new(), None))
    }

    /// Assembly name of a label instruction.
    pub fn label_name(&self, label: InstId) -> BuildResult<String> {
        match self.inst(label).kind() {
            InstKind::Label { number } => Ok(format!(".L{}$local$__{}", self.name(), number)),
            _ => Err(ConstructionError::NotALabel { inst: label }),
        }
    }

    fn add_branch(&mut self, targets: BranchTargets, cond: Condition) -> InstId {
        self.add_inst(Inst::new(InstKind::Br(targets), None, Vec::new(), Some(cond)))
    }

    /// Two-way conditional branch.
    pub fn create_br_cond(
        &mut self,
        target_true: NodeId,
        target_false: NodeId,
        cond: Condition,
    ) -> BuildResult<InstId> {
        if cond == Condition::Al {
            return Err(ConstructionError::InvalidCondition { cond });
        }
        Ok(self.add_branch(
            BranchTargets {
                target_true: Some(target_true),
                target_false: Some(target_false),
                label: None,
            },
            cond,
        ))
    }

    /// Unconditional branch.
    pub fn create_br(&mut self, target: NodeId) -> InstId {
        self.add_branch(
            BranchTargets {
                target_false: Some(target),
                ..BranchTargets::default()
            },
            Condition::Al,
        )
    }

    /// Conditional branch that falls through to the next block when not taken.
    pub fn create_br_fallthrough(&mut self, target: NodeId, cond: Condition) -> BuildResult<InstId> {
        if cond == Condition::Al {
            return Err(ConstructionError::InvalidCondition { cond });
        }
        Ok(self.add_branch(
            BranchTargets {
                target_true: Some(target),
                ..BranchTargets::default()
            },
            cond,
        ))
    }

    /// Branch to a local label.
    pub fn create_br_label(&mut self, label: InstId, cond: Condition) -> BuildResult<InstId> {
        if !self.inst(label).is_label() {
            return Err(ConstructionError::NotALabel { inst: label });
        }
        Ok(self.add_branch(
            BranchTargets {
                label: Some(label),
                ..BranchTargets::default()
            },
            cond,
        ))
    }

    fn branch_targets_mut(&mut self, inst: InstId) -> BuildResult<&mut BranchTargets> {
        match self.inst_mut(inst).kind_mut() {
            InstKind::Br(targets) => Ok(targets),
            _ => Err(ConstructionError::NotABranch { inst }),
        }
    }

    /// Simplify a branch given the block laid out after it. Returns whether
    /// the branch changed.
    pub fn optimize_branch(&mut self, inst: InstId, next: Option<NodeId>) -> BuildResult<bool> {
        let targets = *self.branch_targets_mut(inst)?;
        let Some(next) = next else {
            return Ok(false);
        };
        if targets.is_to_label() || targets.target_false.is_none() {
            return Ok(false);
        }

        let cond = self.inst(inst).predicate().unwrap_or_default();
        if targets.target_false == Some(next) {
            if cond == Condition::Al {
                self.inst_mut(inst).set_deleted();
                log::debug!("deleted branch {inst:?} to fallthrough block {next:?}");
            } else {
                self.branch_targets_mut(inst)?.target_false = None;
                log::debug!("dropped fallthrough edge of branch {inst:?}");
            }
            return Ok(true);
        }
        if targets.target_true == Some(next) {
            let Some(inverted) = cond.opposite() else {
                return Ok(false);
            };
            let branch = self.branch_targets_mut(inst)?;
            branch.target_true = targets.target_false;
            branch.target_false = None;
            self.inst_mut(inst).set_predicate_unchecked(inverted);
            log::debug!("inverted branch {inst:?} to b{inverted}");
            return Ok(true);
        }
        Ok(false)
    }

    /// Replace `old` by `new` in the block targets of one branch.
    pub fn repoint_branch_edges(&mut self, inst: InstId, old: NodeId, new: NodeId) -> BuildResult<bool> {
        Ok(self.branch_targets_mut(inst)?.repoint(old, new))
    }

    /// Optimize the last live instruction of every block against its layout
    /// successor. Returns the number of branches changed.
    pub fn do_branch_opt(&mut self) -> usize {
        let mut changed = 0;
        let nodes: Vec<NodeId> = self.nodes().collect();
        for node in nodes {
            let last = self
                .node(node)
                .insts()
                .iter()
                .rev()
                .copied()
                .find(|&id| !self.inst(id).is_deleted());
            let Some(last) = last.filter(|&id| self.inst(id).is_branch()) else {
                continue;
            };
            let next = self.next_node(node);
            if matches!(self.optimize_branch(last, next), Ok(true)) {
                changed += 1;
            }
        }
        log::debug!("branch optimization of {} changed {changed} branches", self.name());
        changed
    }

    /// Replace `old` by `new` in every live branch of the function.
    pub fn repoint_edges(&mut self, old: NodeId, new: NodeId) -> bool {
        let mut changed = false;
        for index in 0..self.num_insts() {
            let inst = self.inst_id(index);
            if self.inst(inst).is_deleted() {
                continue;
            }
            if let InstKind::Br(targets) = self.inst_mut(inst).kind_mut() {
                changed |= targets.repoint(old, new);
            }
        }
        if changed {
            log::debug!("repointed edges {old:?} -> {new:?}");
        }
        changed
    }
}
