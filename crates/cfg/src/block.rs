//! Basic blocks and terminators.

use crate::{BlockId, ExprId};
use smallvec::SmallVec;
use std::fmt;

/// A statement in a basic block.
#[derive(Clone, Debug)]
pub enum Stmt {
    /// An expression evaluated for its effects.
    Expr(ExprId),
    /// A return statement. The enclosing block's terminator jumps to the
    /// routine's exit block.
    Return(Option<ExprId>),
}

/// A basic block in a routine CFG.
#[derive(Clone, Debug, Default)]
pub struct Block {
    /// The statements in this block.
    pub stmts: Vec<Stmt>,
    /// The terminator. The exit block has none.
    pub terminator: Option<Terminator>,
    /// Predecessor blocks.
    pub predecessors: SmallVec<[BlockId; 4]>,
}

impl Block {
    /// Creates a new empty basic block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if this block has a terminator.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }

    /// Returns the successor blocks of this block.
    #[must_use]
    pub fn successors(&self) -> SmallVec<[BlockId; 2]> {
        match &self.terminator {
            Some(term) => term.successors(),
            None => SmallVec::new(),
        }
    }
}

/// A block terminator.
#[derive(Clone, Debug)]
pub enum Terminator {
    /// Unconditional jump to another block.
    Jump(BlockId),
    /// Conditional branch.
    Branch {
        /// The condition expression, evaluated as the block's last action.
        condition: ExprId,
        /// The block taken if the condition holds.
        then_block: BlockId,
        /// The block taken otherwise.
        else_block: BlockId,
    },
}

impl Terminator {
    /// Returns the successor blocks of this terminator.
    #[must_use]
    pub fn successors(&self) -> SmallVec<[BlockId; 2]> {
        match self {
            Self::Jump(target) => smallvec::smallvec![*target],
            Self::Branch { then_block, else_block, .. } => {
                smallvec::smallvec![*then_block, *else_block]
            }
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jump(target) => write!(f, "jump bb{target}"),
            Self::Branch { condition, then_block, else_block } => {
                write!(f, "branch e{condition}, bb{then_block}, bb{else_block}")
            }
        }
    }
}
