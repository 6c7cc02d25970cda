//! Routine builder.

use crate::{
    AccessMode, BinOp, BlockId, CallArg, ExprId, ExprKind, Lit, Routine, Stmt, Terminator, UnOp,
    VarName, VarRef,
};

/// A builder for constructing routines.
///
/// The builder keeps the flow context consistent with the expression tree it
/// produces: locals are declared on first use, assignment targets carry write
/// access modes, and reference bindings flag both operands in the context.
#[derive(Debug)]
pub struct RoutineBuilder {
    /// The routine being built.
    routine: Routine,
    /// The current block.
    current: BlockId,
}

impl RoutineBuilder {
    /// Creates a new builder positioned at the routine's entry block.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let routine = Routine::new(name);
        let current = routine.entry;
        Self { routine, current }
    }

    /// Returns the current block.
    #[must_use]
    pub const fn current_block(&self) -> BlockId {
        self.current
    }

    /// Returns the exit block.
    #[must_use]
    pub const fn exit_block(&self) -> BlockId {
        self.routine.exit
    }

    /// Switches to a different block.
    pub fn switch_to_block(&mut self, block: BlockId) {
        self.current = block;
    }

    /// Creates a new basic block.
    pub fn create_block(&mut self) -> BlockId {
        self.routine.alloc_block()
    }

    /// Registers an auto-global name on the flow context.
    pub fn auto_global(&mut self, name: impl Into<String>) {
        self.routine.flow.declare_auto_global(name);
    }

    /// Declares a local and flags it as aliasable through reference binding.
    pub fn mark_reference(&mut self, name: &str) {
        let var = self.routine.flow.declare(name);
        self.routine.flow.mark_reference(var);
    }

    /// Creates an integer literal.
    pub fn lit_int(&mut self, value: i64) -> ExprId {
        self.routine.alloc_expr(ExprKind::Lit(Lit::Int(value)))
    }

    /// Creates a boolean literal.
    pub fn lit_bool(&mut self, value: bool) -> ExprId {
        self.routine.alloc_expr(ExprKind::Lit(Lit::Bool(value)))
    }

    /// Creates a null literal.
    pub fn lit_null(&mut self) -> ExprId {
        self.routine.alloc_expr(ExprKind::Lit(Lit::Null))
    }

    fn var(&mut self, name: &str, access: AccessMode) -> ExprId {
        if !self.routine.flow.is_auto_global(name) {
            self.routine.flow.declare(name);
        }
        self.routine.alloc_expr(ExprKind::Var(VarRef {
            name: VarName::Direct(name.to_owned()),
            access,
        }))
    }

    /// Creates a read of a variable.
    pub fn read(&mut self, name: &str) -> ExprId {
        self.var(name, AccessMode::Read)
    }

    /// Creates a read through a runtime-computed variable name.
    pub fn read_dynamic(&mut self, name: ExprId) -> ExprId {
        self.routine
            .alloc_expr(ExprKind::Var(VarRef { name: VarName::Dynamic(name), access: AccessMode::Read }))
    }

    /// Wraps an expression in a value-semantics copy.
    pub fn copied(&mut self, value: ExprId) -> ExprId {
        self.routine.alloc_expr(ExprKind::Copy(value))
    }

    /// Creates a binary operation.
    pub fn binary(&mut self, lhs: ExprId, op: BinOp, rhs: ExprId) -> ExprId {
        self.routine.alloc_expr(ExprKind::Binary(lhs, op, rhs))
    }

    /// Creates a unary operation.
    pub fn unary(&mut self, op: UnOp, operand: ExprId) -> ExprId {
        self.routine.alloc_expr(ExprKind::Unary(op, operand))
    }

    /// Creates a read of an element: `name[index]`.
    pub fn index_read(&mut self, name: &str, index: ExprId) -> ExprId {
        let base = self.var(name, AccessMode::Read);
        self.routine.alloc_expr(ExprKind::Index { base, index })
    }

    /// Creates a by-value call argument.
    #[must_use]
    pub const fn arg(value: ExprId) -> CallArg {
        CallArg { value, by_ref: false }
    }

    /// Creates a by-reference call argument referencing a variable.
    pub fn ref_arg(&mut self, name: &str) -> CallArg {
        let value = self.var(name, AccessMode::BindRef);
        CallArg { value, by_ref: true }
    }

    /// Creates a call expression.
    pub fn call(&mut self, callee: impl Into<String>, args: Vec<CallArg>) -> ExprId {
        self.routine.alloc_expr(ExprKind::Call { callee: callee.into(), args })
    }

    /// Creates an assignment expression `name = value` without pushing a
    /// statement. Used for assignments in expression position.
    pub fn assign_expr(&mut self, name: &str, value: ExprId) -> ExprId {
        let target = self.var(name, AccessMode::Write);
        self.routine.alloc_expr(ExprKind::Assign { target, value })
    }

    /// Pushes an expression statement onto the current block.
    pub fn stmt(&mut self, expr: ExprId) {
        self.routine.blocks[self.current].stmts.push(Stmt::Expr(expr));
    }

    /// Pushes an assignment statement `name = value`.
    ///
    /// Returns the assignment expression.
    pub fn assign(&mut self, name: &str, value: ExprId) -> ExprId {
        let assign = self.assign_expr(name, value);
        self.stmt(assign);
        assign
    }

    /// Pushes an assignment through a runtime-computed variable name.
    pub fn assign_dynamic(&mut self, name: ExprId, value: ExprId) -> ExprId {
        let target = self
            .routine
            .alloc_expr(ExprKind::Var(VarRef { name: VarName::Dynamic(name), access: AccessMode::Write }));
        let assign = self.routine.alloc_expr(ExprKind::Assign { target, value });
        self.stmt(assign);
        assign
    }

    /// Pushes a compound assignment statement `name op= value`.
    pub fn compound_assign(&mut self, name: &str, op: BinOp, value: ExprId) -> ExprId {
        let target = self.var(name, AccessMode::ReadWrite);
        let assign = self.routine.alloc_expr(ExprKind::CompoundAssign { target, op, value });
        self.stmt(assign);
        assign
    }

    /// Pushes an element assignment statement `name[index] = value`.
    pub fn assign_index(&mut self, name: &str, index: ExprId, value: ExprId) -> ExprId {
        let base = self.var(name, AccessMode::ReadWrite);
        let target = self.routine.alloc_expr(ExprKind::Index { base, index });
        let assign = self.routine.alloc_expr(ExprKind::Assign { target, value });
        self.stmt(assign);
        assign
    }

    /// Pushes a reference binding statement `target =& value`.
    ///
    /// Both variables are flagged as reference-bound in the flow context.
    pub fn ref_assign(&mut self, target: &str, value: &str) -> ExprId {
        self.mark_reference(target);
        self.mark_reference(value);
        let target = self.var(target, AccessMode::BindRef);
        let value = self.var(value, AccessMode::BindRef);
        let assign = self.routine.alloc_expr(ExprKind::RefAssign { target, value });
        self.stmt(assign);
        assign
    }

    /// Pushes a return statement and terminates the current block into the
    /// exit block.
    pub fn ret(&mut self, value: Option<ExprId>) {
        self.routine.blocks[self.current].stmts.push(Stmt::Return(value));
        self.terminate(Terminator::Jump(self.routine.exit));
    }

    /// Sets a jump terminator on the current block.
    pub fn jump(&mut self, target: BlockId) {
        self.terminate(Terminator::Jump(target));
    }

    /// Sets a branch terminator on the current block.
    pub fn branch(&mut self, condition: ExprId, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::Branch { condition, then_block, else_block });
    }

    fn terminate(&mut self, terminator: Terminator) {
        for succ in terminator.successors() {
            self.routine.blocks[succ].predecessors.push(self.current);
        }
        self.routine.blocks[self.current].terminator = Some(terminator);
    }

    /// Returns a reference to the routine under construction.
    #[must_use]
    pub const fn routine(&self) -> &Routine {
        &self.routine
    }

    /// Finishes construction and returns the routine.
    ///
    /// If the current block is unterminated it is jump-terminated into the
    /// exit block.
    #[must_use]
    pub fn finish(mut self) -> Routine {
        if self.current != self.routine.exit && !self.routine.blocks[self.current].is_terminated() {
            self.jump(self.routine.exit);
        }
        self.routine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VarName;

    #[test]
    fn builds_straight_line_routine() {
        let mut b = RoutineBuilder::new("f");
        let one = b.lit_int(1);
        b.assign("a", one);
        let a = b.read("a");
        let copy = b.copied(a);
        b.assign("b", copy);
        let ret = b.read("b");
        let ret_copy = b.copied(ret);
        b.ret(Some(ret_copy));
        let routine = b.finish();

        assert_eq!(routine.flow.var_count(), 2);
        assert_eq!(routine.block(routine.entry).stmts.len(), 3);
        assert!(matches!(
            routine.block(routine.entry).terminator,
            Some(Terminator::Jump(target)) if target == routine.exit
        ));
        assert_eq!(routine.block(routine.exit).predecessors.as_slice(), [routine.entry]);
    }

    #[test]
    fn assignment_targets_carry_write_access() {
        let mut b = RoutineBuilder::new("f");
        let zero = b.lit_int(0);
        let assign = b.assign("x", zero);
        let routine = b.finish();

        let ExprKind::Assign { target, .. } = routine.expr_kind(assign) else {
            panic!("expected assignment");
        };
        let ExprKind::Var(var) = routine.expr_kind(*target) else {
            panic!("expected variable target");
        };
        assert_eq!(var.access, AccessMode::Write);
        assert!(var.access.might_change());
        assert!(matches!(&var.name, VarName::Direct(name) if name == "x"));
    }

    #[test]
    fn ref_assign_marks_both_operands() {
        let mut b = RoutineBuilder::new("f");
        b.ref_assign("p", "q");
        let routine = b.finish();

        let p = routine.flow.resolve("p").unwrap();
        let q = routine.flow.resolve("q").unwrap();
        assert!(routine.flow.is_reference(p));
        assert!(routine.flow.is_reference(q));
    }

    #[test]
    fn branch_records_predecessors() {
        let mut b = RoutineBuilder::new("f");
        let then_block = b.create_block();
        let else_block = b.create_block();
        let cond = b.lit_bool(true);
        b.branch(cond, then_block, else_block);

        b.switch_to_block(then_block);
        b.ret(None);
        b.switch_to_block(else_block);
        b.ret(None);
        let routine = b.finish();

        let entry = routine.entry;
        assert_eq!(routine.block(then_block).predecessors.as_slice(), [entry]);
        assert_eq!(routine.block(else_block).predecessors.as_slice(), [entry]);
        assert_eq!(routine.block(routine.exit).predecessors.len(), 2);
    }
}
