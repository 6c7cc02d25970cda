//! Expression trees for routine bodies.

use crate::ExprId;

/// An expression node in a routine body.
#[derive(Clone, Debug)]
pub struct Expr {
    /// The expression kind.
    pub kind: ExprKind,
}

impl Expr {
    /// Creates a new expression node.
    #[must_use]
    pub const fn new(kind: ExprKind) -> Self {
        Self { kind }
    }
}

/// Expression kinds.
#[derive(Clone, Debug)]
pub enum ExprKind {
    /// A literal constant: `1`, `true`, `null`.
    Lit(Lit),

    /// A variable reference: `x`, `$$name`.
    Var(VarRef),

    /// A value-semantics copy of the operand.
    ///
    /// Lowering inserts this wrapper around the right-hand side of
    /// assignments so that the target receives its own value rather than an
    /// alias of the source.
    Copy(ExprId),

    /// An assignment: `target = value`.
    Assign {
        /// The assignment target.
        target: ExprId,
        /// The assigned value.
        value: ExprId,
    },

    /// A read-modify-write assignment: `target op= value`.
    CompoundAssign {
        /// The assignment target.
        target: ExprId,
        /// The combining operator.
        op: BinOp,
        /// The right-hand operand.
        value: ExprId,
    },

    /// A reference binding: `target =& value`.
    ///
    /// Both operands share the same storage afterwards.
    RefAssign {
        /// The binding target.
        target: ExprId,
        /// The bound-to operand.
        value: ExprId,
    },

    /// A binary operation: `a + b`.
    Binary(ExprId, BinOp, ExprId),

    /// A unary operation: `-a`, `!a`.
    Unary(UnOp, ExprId),

    /// An element access: `base[index]`.
    Index {
        /// The indexed expression.
        base: ExprId,
        /// The element key.
        index: ExprId,
    },

    /// A call to a routine by name: `f(a, &b)`.
    Call {
        /// The callee name.
        callee: String,
        /// The arguments.
        args: Vec<CallArg>,
    },
}

/// A variable reference together with the way it accesses the variable.
#[derive(Clone, Debug)]
pub struct VarRef {
    /// The referenced name.
    pub name: VarName,
    /// How the reference accesses the variable.
    pub access: AccessMode,
}

/// A variable name, either statically known or computed at runtime.
#[derive(Clone, Debug)]
pub enum VarName {
    /// A statically known name: `x`.
    Direct(String),
    /// A name computed at runtime from the operand expression: `$$expr`.
    Dynamic(ExprId),
}

impl VarName {
    /// Returns the statically known name, if there is one.
    #[must_use]
    pub fn as_direct(&self) -> Option<&str> {
        match self {
            Self::Direct(name) => Some(name),
            Self::Dynamic(_) => None,
        }
    }
}

/// How a variable reference accesses the variable it names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    /// Plain read.
    Read,
    /// The variable is written through the reference (assignment target).
    Write,
    /// Read-modify-write: compound assignment targets and the base of a
    /// written element access.
    ReadWrite,
    /// The reference is bound by reference: ref-assignment operands and
    /// by-reference call arguments.
    BindRef,
}

impl AccessMode {
    /// Whether this access might change the variable it names.
    #[must_use]
    pub const fn might_change(self) -> bool {
        !matches!(self, Self::Read)
    }
}

/// An argument of a [`ExprKind::Call`].
#[derive(Clone, Debug)]
pub struct CallArg {
    /// The argument value.
    pub value: ExprId,
    /// Whether the argument is passed by reference.
    pub by_ref: bool,
}

/// A literal constant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Lit {
    /// An integer literal.
    Int(i64),
    /// A boolean literal.
    Bool(bool),
    /// The null literal.
    Null,
}

/// A binary operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
}

impl BinOp {
    /// Returns the operator's source form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
        }
    }
}

/// A unary operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    /// `-`
    Neg,
    /// `!`
    Not,
}

impl UnOp {
    /// Returns the operator's source form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "!",
        }
    }
}
