//! Bounded normal-order reduction.
//!
//! Reduces beta redexes `App(Lam(b), a)` together with the combinator steps
//! `App(Id, x) -> x` and `App(Compose(f, g), x) -> App(f, App(g, x))`, and
//! selects the branch of an `If` or negates a `Not` once the condition is a
//! boolean constant. `Lam(Var(0))` is canonicalized to `Id`. Other constructs
//! are inert and only have their children normalized.

use crate::arena::ExprArena;
use crate::expr::{Expr, ExprId, Literal};
use std::collections::HashMap;
use tracing::debug;

/// Result of a normalization run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalized {
    pub result: ExprId,
    /// Reduction steps consumed
    pub steps_used: usize,
    /// True when the budget ran out before a normal form was reached
    pub exhausted: bool,
}

/// Normalize `root` using at most `max_steps` reductions.
///
/// With a sufficient budget the result has no remaining redex. When the
/// budget runs out the partially reduced term is returned with
/// `exhausted` set.
pub fn normalize(arena: &mut ExprArena, root: ExprId, max_steps: usize) -> Normalized {
    let mut normalizer = Normalizer {
        arena,
        max_steps,
        steps: 0,
        exhausted: false,
        memo: HashMap::new(),
    };
    let result = normalizer.normal_form(root);
    if normalizer.exhausted {
        debug!(steps = normalizer.steps, "normalization budget exhausted");
    }
    Normalized {
        result,
        steps_used: normalizer.steps,
        exhausted: normalizer.exhausted,
    }
}

struct Normalizer<'a> {
    arena: &'a mut ExprArena,
    max_steps: usize,
    steps: usize,
    exhausted: bool,
    memo: HashMap<ExprId, ExprId>,
}

impl Normalizer<'_> {
    fn take_step(&mut self) -> bool {
        if self.steps >= self.max_steps {
            self.exhausted = true;
            return false;
        }
        self.steps += 1;
        true
    }

    fn normal_form(&mut self, id: ExprId) -> ExprId {
        if let Some(&done) = self.memo.get(&id) {
            return done;
        }
        let head = self.weak_head(id);
        let node = self.arena.get(head).clone();
        let result = match node {
            Expr::Lam(body) => {
                let body = self.normal_form(body);
                if self.arena.get(body) == &Expr::Var(0) {
                    self.arena.id()
                } else {
                    self.arena.lam(body)
                }
            }
            other => {
                let rebuilt = other.map_children(|child| self.normal_form(child));
                self.arena.alloc(rebuilt)
            }
        };
        if !self.exhausted {
            self.memo.insert(id, result);
        }
        result
    }

    /// Reduce the head position until it is no longer a redex.
    fn weak_head(&mut self, id: ExprId) -> ExprId {
        let mut current = id;
        loop {
            let node = self.arena.get(current).clone();
            current = match node {
                Expr::App(f, arg) => {
                    let f = self.weak_head(f);
                    match self.contract(f, arg) {
                        Some(next) => next,
                        None => return self.arena.app(f, arg),
                    }
                }
                Expr::If(cond, then, otherwise) => {
                    let cond = self.weak_head(cond);
                    match self.constant_bool(cond) {
                        Some(true) if self.take_step() => then,
                        Some(false) if self.take_step() => otherwise,
                        _ => return self.arena.if_then_else(cond, then, otherwise),
                    }
                }
                Expr::Not(x) => {
                    let x = self.weak_head(x);
                    match self.constant_bool(x) {
                        Some(b) if self.take_step() => self.arena.boolean(!b),
                        _ => return self.arena.not(x),
                    }
                }
                _ => return current,
            };
        }
    }

    fn constant_bool(&self, id: ExprId) -> Option<bool> {
        match self.arena.get(id) {
            Expr::Const(Literal::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    fn contract(&mut self, f: ExprId, arg: ExprId) -> Option<ExprId> {
        let reduced = match *self.arena.get(f) {
            Expr::Lam(body) => {
                if !self.take_step() {
                    return None;
                }
                beta(self.arena, body, arg)
            }
            Expr::Id => {
                if !self.take_step() {
                    return None;
                }
                arg
            }
            Expr::Compose(outer, inner) => {
                if !self.take_step() {
                    return None;
                }
                let applied = self.arena.app(inner, arg);
                self.arena.app(outer, applied)
            }
            _ => return None,
        };
        Some(reduced)
    }
}

/// Substitute `arg` for variable 0 in `body`, removing one binder.
pub fn beta(arena: &mut ExprArena, body: ExprId, arg: ExprId) -> ExprId {
    let mut memo = HashMap::new();
    substitute(arena, body, arg, 0, &mut memo)
}

fn substitute(
    arena: &mut ExprArena,
    id: ExprId,
    arg: ExprId,
    depth: u32,
    memo: &mut HashMap<(ExprId, u32), ExprId>,
) -> ExprId {
    if let Some(&done) = memo.get(&(id, depth)) {
        return done;
    }
    let node = arena.get(id).clone();
    let result = match node {
        Expr::Var(k) if k == depth => shift(arena, arg, depth as i64, 0),
        Expr::Var(k) if k > depth => arena.var(k - 1),
        Expr::Var(_) => id,
        Expr::Lam(body) => {
            let body = substitute(arena, body, arg, depth + 1, memo);
            arena.lam(body)
        }
        other if other.is_leaf() => id,
        other => {
            let rebuilt = other.map_children(|child| substitute(arena, child, arg, depth, memo));
            arena.alloc(rebuilt)
        }
    };
    memo.insert((id, depth), result);
    result
}

/// Shift free variables at or above `cutoff` by `delta`.
pub fn shift(arena: &mut ExprArena, id: ExprId, delta: i64, cutoff: u32) -> ExprId {
    if delta == 0 {
        return id;
    }
    let mut memo = HashMap::new();
    shift_inner(arena, id, delta, cutoff, &mut memo)
}

fn shift_inner(
    arena: &mut ExprArena,
    id: ExprId,
    delta: i64,
    cutoff: u32,
    memo: &mut HashMap<(ExprId, u32), ExprId>,
) -> ExprId {
    if let Some(&done) = memo.get(&(id, cutoff)) {
        return done;
    }
    let node = arena.get(id).clone();
    let result = match node {
        Expr::Var(k) if k >= cutoff => {
            let shifted = (k as i64 + delta).max(0) as u32;
            arena.var(shifted)
        }
        Expr::Lam(body) => {
            let body = shift_inner(arena, body, delta, cutoff + 1, memo);
            arena.lam(body)
        }
        other if other.is_leaf() => id,
        other => {
            let rebuilt = other.map_children(|child| shift_inner(arena, child, delta, cutoff, memo));
            arena.alloc(rebuilt)
        }
    };
    memo.insert((id, cutoff), result);
    result
}
