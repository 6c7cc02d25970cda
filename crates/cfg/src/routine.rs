//! Routines.

use crate::{Block, BlockId, Expr, ExprId, ExprKind, FlowContext};
use nacre_data_structures::index::IndexVec;
use smallvec::SmallVec;

/// A routine (function or method) body in control-flow-graph form.
#[derive(Clone, Debug)]
pub struct Routine {
    /// The routine name.
    pub name: String,
    /// All expression nodes of the routine body.
    pub exprs: IndexVec<ExprId, Expr>,
    /// All basic blocks.
    pub blocks: IndexVec<BlockId, Block>,
    /// The entry block.
    pub entry: BlockId,
    /// The distinguished exit block. Every completed path jumps here.
    pub exit: BlockId,
    /// The variable table.
    pub flow: FlowContext,
}

impl Routine {
    /// Creates a new routine with empty entry and exit blocks.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let mut blocks = IndexVec::new();
        let entry = blocks.push(Block::new());
        let exit = blocks.push(Block::new());
        Self {
            name: name.into(),
            exprs: IndexVec::new(),
            blocks,
            entry,
            exit,
            flow: FlowContext::new(),
        }
    }

    /// Returns the expression node for the given ID.
    #[must_use]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id]
    }

    /// Returns the kind of the expression node for the given ID.
    #[must_use]
    pub fn expr_kind(&self, id: ExprId) -> &ExprKind {
        &self.exprs[id].kind
    }

    /// Returns the basic block for the given ID.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    /// Returns a mutable reference to the basic block.
    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id]
    }

    /// Allocates a new expression node.
    pub fn alloc_expr(&mut self, kind: ExprKind) -> ExprId {
        self.exprs.push(Expr::new(kind))
    }

    /// Allocates a new basic block.
    pub fn alloc_block(&mut self) -> BlockId {
        self.blocks.push(Block::new())
    }

    /// Returns the successors of a block.
    #[must_use]
    pub fn successors(&self, id: BlockId) -> SmallVec<[BlockId; 2]> {
        self.blocks[id].successors()
    }
}
