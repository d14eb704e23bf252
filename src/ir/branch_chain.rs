//! The short-circuit branch-chain discipline (spec §4.7): logical `&&`/
//! `||`/`!`, ternary, and every control-flow condition lower through this
//! rather than materialising an `i32` `{0,1}` at each step. No teacher
//! module needs this — Beanstalk's `control_flow_linearizer.rs` always
//! knows both branch targets up front and lowers straight to structured
//! terminators — so this follows spec §4.7's algorithm directly, expressed
//! in the same index-arena style as the rest of [`crate::ir`].

use super::nodes::{BlockId, InsId, IrFn, Op};

/// One not-yet-patched successor slot of a `Br`/`CondBr` instruction.
/// `want_true` is meaningless for `Br` (it has only one successor).
#[derive(Clone, Copy, Debug)]
pub struct BranchSlot {
    pub ins: InsId,
    pub want_true: bool,
}

pub type BranchChain = Vec<BranchSlot>;

/// The pseudo-value a condition-context expression evaluates to: two not-
/// yet-patched chains, one per outcome. Rewritten to real block targets by
/// [`patch_branch_chain`] once the surrounding construct knows where each
/// outcome goes.
#[derive(Clone, Debug, Default)]
pub struct CondValue {
    pub true_chain: BranchChain,
    pub false_chain: BranchChain,
}

impl CondValue {
    pub fn single(ins: InsId) -> Self {
        CondValue {
            true_chain: vec![BranchSlot { ins, want_true: true }],
            false_chain: vec![BranchSlot { ins, want_true: false }],
        }
    }

    /// `!` just swaps which outcome each chain answers for.
    pub fn negate(self) -> Self {
        CondValue { true_chain: self.false_chain, false_chain: self.true_chain }
    }
}

/// Rewrites every recorded slot in `chain` to branch to `target`.
pub fn patch_branch_chain(f: &mut IrFn, chain: &BranchChain, target: BlockId) {
    for slot in chain {
        match &mut f.instructions[slot.ins.0 as usize].op {
            Op::CondBr { true_, false_, .. } => {
                if slot.want_true {
                    *true_ = target;
                } else {
                    *false_ = target;
                }
            }
            Op::Br(t) => *t = target,
            other => unreachable!("branch chains only ever record Br/CondBr slots, found {other:?}"),
        }
    }
}
