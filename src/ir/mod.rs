//! The SSA IR (spec §3, §4.7): functions owning basic blocks owning
//! instructions, lowered from the typed AST. `nodes` is the data model,
//! `branch_chain` is the short-circuit lowering discipline, `lower` is the
//! AST-to-IR translation itself, and `dump` is the human-readable printer
//! the CLI's `--dump-ir` flag drives (spec §4.8's "debug printer" external
//! collaborator — this crate only owns enough of it to keep block/
//! instruction numbering consistent across a print).

pub mod branch_chain;
pub mod dump;
pub mod lower;
pub mod nodes;
#[cfg(test)]
mod tests;

pub use lower::lower_translation_unit;
pub use nodes::{BlockId, CmpOp, InsId, IrBB, IrFn, Op, Program};
