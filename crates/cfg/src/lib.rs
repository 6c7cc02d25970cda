//! Routine control-flow model for the nacre compiler.
//!
//! A routine (function or method) is represented as an arena of expression
//! trees hung off basic blocks. Assignments in the source language have value
//! semantics, so lowering wraps the right-hand side of most assignments in an
//! explicit [`ExprKind::Copy`] node; flow analyses downstream prove many of
//! those copies unnecessary.

use nacre_data_structures::newtype_index;

mod expr;
pub use expr::{AccessMode, BinOp, CallArg, Expr, ExprKind, Lit, UnOp, VarName, VarRef};

mod block;
pub use block::{Block, Stmt, Terminator};

mod context;
pub use context::{FlowContext, Local};

mod routine;
pub use routine::Routine;

mod builder;
pub use builder::RoutineBuilder;

mod display;

newtype_index! {
    /// A unique identifier for an expression node in a routine body.
    ///
    /// Arena indices are stable for the lifetime of the routine and double as
    /// the identity token of the node, usable as a hash-map key.
    pub struct ExprId;
}

newtype_index! {
    /// A unique identifier for a local variable of a routine.
    ///
    /// The enumeration of locals is dense, zero-based, and fixed by the
    /// [`FlowContext`] before any analysis runs.
    pub struct VarId;
}

newtype_index! {
    /// A unique identifier for a basic block in a routine CFG.
    pub struct BlockId;
}
