//! Kernel IR consumed by the CUDA backend.
//!
//! The tree is produced upstream (or by [`crate::syntax`] from `.tir`
//! text) and is read-only here. Expressions carry their result type;
//! every node carries the span it was read from.
//!
//! ```text
//! Module ─ Kernel* ─ Stmt ─┬─ Let / Attr / Allocate / For / IfThenElse / Seq
//!                          ├─ Store(buffer, index, Expr)
//!                          └─ Evaluate(Expr)   (barriers, builtin calls)
//! ```

pub mod builtin;
pub mod dtype;
pub mod scope;
#[cfg(test)]
mod tests;

use std::fmt;

use crate::span::Span;

pub use builtin::{Arity, Builtin};
pub use dtype::{DataType, TypeCode};
pub use scope::{FragmentFamily, FragmentRole, FragmentShape, Layout, StorageScope};

// ─── Variables ────────────────────────────────────────────────────

/// Stable identity of a variable. Buffers are keyed by the id of their
/// buffer variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

pub type BufferId = VarId;

#[derive(Clone, Debug, PartialEq)]
pub struct Var {
    pub id: VarId,
    pub name: String,
    pub dtype: DataType,
}

impl Var {
    pub fn new(id: u32, name: impl Into<String>, dtype: DataType) -> Self {
        Self {
            id: VarId(id),
            name: name.into(),
            dtype,
        }
    }
}

/// Hands out variables with unique ids.
#[derive(Debug, Default)]
pub struct VarAllocator {
    next: u32,
}

impl VarAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn var(&mut self, name: impl Into<String>, dtype: DataType) -> Var {
        let v = Var::new(self.next, name, dtype);
        self.next += 1;
        v
    }
}

// ─── Expressions ──────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Min,
    Max,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    /// Operator token as printed. Alphabetic tokens are printed as calls.
    pub fn token(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Min => "min",
            BinaryOp::Max => "max",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }

    pub fn from_token(tok: &str) -> Option<Self> {
        use BinaryOp::*;
        [
            Add, Sub, Mul, Div, Mod, Min, Max, Eq, Ne, Lt, Le, Gt, Ge, And, Or, BitAnd, BitOr,
            BitXor, Shl, Shr,
        ]
        .into_iter()
        .find(|op| op.token() == tok)
    }

    /// Comparisons and logical connectives produce booleans.
    pub fn is_predicate(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::And
                | BinaryOp::Or
        )
    }
}

/// Target of a call expression.
#[derive(Clone, Debug, PartialEq)]
pub enum CallOp {
    Builtin(Builtin),
    /// Pure extern function, e.g. `expf`.
    Extern(String),
    /// `call_extern` form: the first argument is the symbol as a string
    /// literal and is not part of the vectorized argument list.
    CallExtern,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    IntImm(i64),
    FloatImm(f64),
    StringImm(String),
    Var(Var),
    Cast(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Not(Box<Expr>),
    Select {
        cond: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
    },
    Load {
        buffer: Var,
        index: Box<Expr>,
    },
    Ramp {
        base: Box<Expr>,
        stride: Box<Expr>,
        lanes: u16,
    },
    Broadcast {
        value: Box<Expr>,
        lanes: u16,
    },
    Shuffle {
        vectors: Vec<Expr>,
        indices: Vec<Expr>,
    },
    Call {
        op: CallOp,
        args: Vec<Expr>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub dtype: DataType,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, dtype: DataType) -> Self {
        Self {
            kind,
            dtype,
            span: Span::dummy(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn int(value: i64) -> Self {
        Self::new(ExprKind::IntImm(value), DataType::int32())
    }

    pub fn const_int(value: i64, dtype: DataType) -> Self {
        Self::new(ExprKind::IntImm(value), dtype)
    }

    pub fn float(value: f64, dtype: DataType) -> Self {
        Self::new(ExprKind::FloatImm(value), dtype)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ExprKind::StringImm(value.into()), DataType::handle())
    }

    pub fn var(v: &Var) -> Self {
        Self::new(ExprKind::Var(v.clone()), v.dtype)
    }

    pub fn cast(dtype: DataType, value: Expr) -> Self {
        Self::new(ExprKind::Cast(Box::new(value)), dtype)
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        let dtype = if op.is_predicate() {
            DataType::bool().with_lanes(lhs.dtype.lanes)
        } else {
            lhs.dtype
        };
        Self::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            dtype,
        )
    }

    pub fn not(value: Expr) -> Self {
        let dtype = value.dtype;
        Self::new(ExprKind::Not(Box::new(value)), dtype)
    }

    pub fn select(cond: Expr, then_value: Expr, else_value: Expr) -> Self {
        let dtype = then_value.dtype;
        Self::new(
            ExprKind::Select {
                cond: Box::new(cond),
                then_value: Box::new(then_value),
                else_value: Box::new(else_value),
            },
            dtype,
        )
    }

    pub fn load(dtype: DataType, buffer: &Var, index: Expr) -> Self {
        Self::new(
            ExprKind::Load {
                buffer: buffer.clone(),
                index: Box::new(index),
            },
            dtype,
        )
    }

    pub fn ramp(base: Expr, stride: Expr, lanes: u16) -> Self {
        let dtype = base.dtype.with_lanes(lanes);
        Self::new(
            ExprKind::Ramp {
                base: Box::new(base),
                stride: Box::new(stride),
                lanes,
            },
            dtype,
        )
    }

    pub fn broadcast(value: Expr, lanes: u16) -> Self {
        let dtype = value.dtype.with_lanes(lanes);
        Self::new(
            ExprKind::Broadcast {
                value: Box::new(value),
                lanes,
            },
            dtype,
        )
    }

    pub fn shuffle(vectors: Vec<Expr>, indices: Vec<Expr>) -> Self {
        let elem = vectors
            .first()
            .map(|v| v.dtype.element_of())
            .unwrap_or(DataType::int32());
        let dtype = elem.with_lanes(indices.len().max(1) as u16);
        Self::new(ExprKind::Shuffle { vectors, indices }, dtype)
    }

    pub fn call(dtype: DataType, op: CallOp, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call { op, args }, dtype)
    }

    pub fn builtin(b: Builtin, args: Vec<Expr>) -> Self {
        Self::call(DataType::handle(), CallOp::Builtin(b), args)
    }

    pub fn as_int(&self) -> Option<i64> {
        match &self.kind {
            ExprKind::IntImm(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::StringImm(s) => Some(s),
            _ => None,
        }
    }
}

// ─── Statements ───────────────────────────────────────────────────

/// Attribute statement keys understood by the backend.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrKey {
    /// Bind `node` to a hardware thread index (`threadIdx.x`, `blockIdx.y`, ...).
    ThreadExtent(String),
    /// Value is the buffer's storage scope as a string literal.
    StorageScope,
    /// Value is the fragment shape `"M, N, K"`.
    FragmentShape,
    /// Value is the fragment layout `"row_major"` / `"col_major"`.
    FragmentLayout,
    /// Marks a buffer as accessed through volatile pointers.
    VolatileScope,
    /// Any other key: no effect on printing.
    Pragma(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForKind {
    Serial,
    Unrolled,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    Let {
        var: Var,
        value: Expr,
        body: Box<Stmt>,
    },
    Attr {
        key: AttrKey,
        node: Var,
        value: Expr,
        body: Box<Stmt>,
    },
    Store {
        buffer: Var,
        index: Expr,
        value: Expr,
    },
    Allocate {
        buffer: Var,
        dtype: DataType,
        extents: Vec<Expr>,
        condition: Expr,
        body: Box<Stmt>,
    },
    For {
        var: Var,
        min: Expr,
        extent: Expr,
        kind: ForKind,
        body: Box<Stmt>,
    },
    IfThenElse {
        cond: Expr,
        then_case: Box<Stmt>,
        else_case: Option<Box<Stmt>>,
    },
    Seq(Vec<Stmt>),
    Evaluate(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            span: Span::dummy(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn seq(stmts: Vec<Stmt>) -> Self {
        Self::new(StmtKind::Seq(stmts))
    }

    pub fn evaluate(value: Expr) -> Self {
        Self::new(StmtKind::Evaluate(value))
    }

    pub fn store(buffer: &Var, index: Expr, value: Expr) -> Self {
        Self::new(StmtKind::Store {
            buffer: buffer.clone(),
            index,
            value,
        })
    }

    pub fn attr(key: AttrKey, node: &Var, value: Expr, body: Stmt) -> Self {
        Self::new(StmtKind::Attr {
            key,
            node: node.clone(),
            value,
            body: Box::new(body),
        })
    }

    /// Allocation with a single constant extent and a true condition.
    pub fn allocate(buffer: &Var, dtype: DataType, extent: i64, body: Stmt) -> Self {
        Self::new(StmtKind::Allocate {
            buffer: buffer.clone(),
            dtype,
            extents: vec![Expr::int(extent)],
            condition: Expr::const_int(1, DataType::bool()),
            body: Box::new(body),
        })
    }

    pub fn for_loop(var: &Var, extent: Expr, kind: ForKind, body: Stmt) -> Self {
        Self::new(StmtKind::For {
            var: var.clone(),
            min: Expr::int(0),
            extent,
            kind,
            body: Box::new(body),
        })
    }

    pub fn let_stmt(var: &Var, value: Expr, body: Stmt) -> Self {
        Self::new(StmtKind::Let {
            var: var.clone(),
            value,
            body: Box::new(body),
        })
    }

    pub fn if_then_else(cond: Expr, then_case: Stmt, else_case: Option<Stmt>) -> Self {
        Self::new(StmtKind::IfThenElse {
            cond,
            then_case: Box::new(then_case),
            else_case: else_case.map(Box::new),
        })
    }
}

// ─── Kernels ──────────────────────────────────────────────────────

/// A kernel parameter. Handle parameters may name their element type.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub var: Var,
    pub elem: Option<DataType>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Kernel {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Stmt,
    pub span: Span,
}

/// One translation unit: kernels printed in order into a single source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Module {
    pub kernels: Vec<Kernel>,
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}
