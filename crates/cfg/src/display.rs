//! Text rendering of routines for debug output.

use crate::{ExprId, ExprKind, Lit, Routine, Stmt, VarName};
use std::fmt;

impl fmt::Display for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "routine {} {{", self.name)?;
        for (id, block) in self.blocks.iter_enumerated() {
            let marker = if id == self.exit { " (exit)" } else { "" };
            writeln!(f, "bb{id}{marker}:")?;
            for stmt in &block.stmts {
                match stmt {
                    Stmt::Expr(expr) => {
                        write!(f, "    ")?;
                        write_expr(f, self, *expr)?;
                        writeln!(f)?;
                    }
                    Stmt::Return(value) => {
                        write!(f, "    return")?;
                        if let Some(value) = value {
                            write!(f, " ")?;
                            write_expr(f, self, *value)?;
                        }
                        writeln!(f)?;
                    }
                }
            }
            if let Some(term) = &block.terminator {
                writeln!(f, "    {term}")?;
            }
        }
        write!(f, "}}")
    }
}

fn write_expr(f: &mut fmt::Formatter<'_>, routine: &Routine, id: ExprId) -> fmt::Result {
    match routine.expr_kind(id) {
        ExprKind::Lit(Lit::Int(v)) => write!(f, "{v}"),
        ExprKind::Lit(Lit::Bool(v)) => write!(f, "{v}"),
        ExprKind::Lit(Lit::Null) => write!(f, "null"),
        ExprKind::Var(var) => match &var.name {
            VarName::Direct(name) => write!(f, "{name}"),
            VarName::Dynamic(inner) => {
                write!(f, "$$(")?;
                write_expr(f, routine, *inner)?;
                write!(f, ")")
            }
        },
        ExprKind::Copy(inner) => {
            write!(f, "copy(")?;
            write_expr(f, routine, *inner)?;
            write!(f, ")")
        }
        ExprKind::Assign { target, value } => {
            write_expr(f, routine, *target)?;
            write!(f, " = ")?;
            write_expr(f, routine, *value)
        }
        ExprKind::CompoundAssign { target, op, value } => {
            write_expr(f, routine, *target)?;
            write!(f, " {}= ", op.as_str())?;
            write_expr(f, routine, *value)
        }
        ExprKind::RefAssign { target, value } => {
            write_expr(f, routine, *target)?;
            write!(f, " =& ")?;
            write_expr(f, routine, *value)
        }
        ExprKind::Binary(lhs, op, rhs) => {
            write!(f, "(")?;
            write_expr(f, routine, *lhs)?;
            write!(f, " {} ", op.as_str())?;
            write_expr(f, routine, *rhs)?;
            write!(f, ")")
        }
        ExprKind::Unary(op, operand) => {
            write!(f, "{}", op.as_str())?;
            write_expr(f, routine, *operand)
        }
        ExprKind::Index { base, index } => {
            write_expr(f, routine, *base)?;
            write!(f, "[")?;
            write_expr(f, routine, *index)?;
            write!(f, "]")
        }
        ExprKind::Call { callee, args } => {
            write!(f, "{callee}(")?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                if arg.by_ref {
                    write!(f, "&")?;
                }
                write_expr(f, routine, arg.value)?;
            }
            write!(f, ")")
        }
    }
}
