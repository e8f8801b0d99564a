//! Expression nodes of the lambda IR.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a node inside an [`ExprArena`](crate::arena::ExprArena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExprId(pub u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Constant values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Str(String),
    Nil,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Str(s) => write!(f, "{:?}", s),
            Literal::Nil => write!(f, "nil"),
        }
    }
}

/// Primitive binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Lt,
    Gt,
    And,
    Or,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 10] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Mod,
        BinaryOp::Eq,
        BinaryOp::Lt,
        BinaryOp::Gt,
        BinaryOp::And,
        BinaryOp::Or,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Eq => "eq",
            BinaryOp::Lt => "lt",
            BinaryOp::Gt => "gt",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }

    /// Stable byte used by the canonical encoding
    pub fn tag(self) -> u8 {
        match self {
            BinaryOp::Add => 0,
            BinaryOp::Sub => 1,
            BinaryOp::Mul => 2,
            BinaryOp::Div => 3,
            BinaryOp::Mod => 4,
            BinaryOp::Eq => 5,
            BinaryOp::Lt => 6,
            BinaryOp::Gt => 7,
            BinaryOp::And => 8,
            BinaryOp::Or => 9,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    /// Evaluate on two literals.
    ///
    /// Returns `None` when the operands have the wrong kinds or the
    /// operation is undefined (overflow, division by zero), in which case
    /// the expression is left unfolded.
    pub fn eval(self, lhs: &Literal, rhs: &Literal) -> Option<Literal> {
        use Literal::*;
        match (self, lhs, rhs) {
            (BinaryOp::Add, Int(a), Int(b)) => a.checked_add(*b).map(Int),
            (BinaryOp::Sub, Int(a), Int(b)) => a.checked_sub(*b).map(Int),
            (BinaryOp::Mul, Int(a), Int(b)) => a.checked_mul(*b).map(Int),
            (BinaryOp::Div, Int(a), Int(b)) => a.checked_div(*b).map(Int),
            (BinaryOp::Mod, Int(a), Int(b)) => a.checked_rem(*b).map(Int),
            (BinaryOp::Lt, Int(a), Int(b)) => Some(Bool(a < b)),
            (BinaryOp::Gt, Int(a), Int(b)) => Some(Bool(a > b)),
            (BinaryOp::Eq, a, b) => Some(Bool(a == b)),
            (BinaryOp::And, Bool(a), Bool(b)) => Some(Bool(*a && *b)),
            (BinaryOp::Or, Bool(a), Bool(b)) => Some(Bool(*a || *b)),
            _ => None,
        }
    }
}

/// A single IR node. Children are arena indices.
///
/// Variables are de Bruijn indices: `Var(0)` refers to the nearest
/// enclosing `Lam`. Anything that is not bound is a named `Prim`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    Var(u32),
    Const(Literal),
    /// Opaque named primitive, never reduced
    Prim(String),
    /// The identity function
    Id,
    Lam(ExprId),
    App(ExprId, ExprId),
    /// `Map(f, xs)`
    Map(ExprId, ExprId),
    /// `Filter(p, xs)`
    Filter(ExprId, ExprId),
    /// `Reduce(f, init, xs)`
    Reduce(ExprId, ExprId, ExprId),
    /// `Compose(f, g)` applies `g` first
    Compose(ExprId, ExprId),
    /// Fused filter-then-map: `Focus(xs, p, f, drop)`
    Focus(ExprId, ExprId, ExprId, ExprId),
    BinOp(BinaryOp, ExprId, ExprId),
    /// Boolean negation
    Not(ExprId),
    /// `If(cond, then, else)`
    If(ExprId, ExprId, ExprId),
}

impl Expr {
    /// Children in field order
    pub fn children(&self) -> Vec<ExprId> {
        match self {
            Expr::Var(_) | Expr::Const(_) | Expr::Prim(_) | Expr::Id => Vec::new(),
            Expr::Lam(b) | Expr::Not(b) => vec![*b],
            Expr::App(a, b)
            | Expr::Map(a, b)
            | Expr::Filter(a, b)
            | Expr::Compose(a, b)
            | Expr::BinOp(_, a, b) => vec![*a, *b],
            Expr::Reduce(a, b, c) | Expr::If(a, b, c) => vec![*a, *b, *c],
            Expr::Focus(a, b, c, d) => vec![*a, *b, *c, *d],
        }
    }

    /// Rebuild this node with every child passed through `f`.
    pub fn map_children(&self, mut f: impl FnMut(ExprId) -> ExprId) -> Expr {
        match self {
            Expr::Var(_) | Expr::Const(_) | Expr::Prim(_) | Expr::Id => self.clone(),
            Expr::Lam(b) => Expr::Lam(f(*b)),
            Expr::Not(b) => Expr::Not(f(*b)),
            Expr::App(a, b) => {
                let a = f(*a);
                Expr::App(a, f(*b))
            }
            Expr::Map(a, b) => {
                let a = f(*a);
                Expr::Map(a, f(*b))
            }
            Expr::Filter(a, b) => {
                let a = f(*a);
                Expr::Filter(a, f(*b))
            }
            Expr::Compose(a, b) => {
                let a = f(*a);
                Expr::Compose(a, f(*b))
            }
            Expr::BinOp(op, a, b) => {
                let a = f(*a);
                Expr::BinOp(*op, a, f(*b))
            }
            Expr::Reduce(a, b, c) => {
                let a = f(*a);
                let b = f(*b);
                Expr::Reduce(a, b, f(*c))
            }
            Expr::If(a, b, c) => {
                let a = f(*a);
                let b = f(*b);
                Expr::If(a, b, f(*c))
            }
            Expr::Focus(a, b, c, d) => {
                let a = f(*a);
                let b = f(*b);
                let c = f(*c);
                Expr::Focus(a, b, c, f(*d))
            }
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Expr::Var(_) | Expr::Const(_) | Expr::Prim(_) | Expr::Id)
    }
}
