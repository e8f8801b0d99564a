//! Static cost model.
//!
//! Leaves, `Lam`, `App`, `BinOp` and `Compose` weigh 1. Collection traversals
//! (`Map`, `Filter`, `Reduce`) weigh 3 and a fused `Focus` weighs 4, so a
//! single fused pass is cheaper than the two traversals it replaces.

use crate::arena::ExprArena;
use crate::expr::{Expr, ExprId};
use std::collections::HashMap;

pub const TRAVERSAL_WEIGHT: u64 = 3;
pub const FOCUS_WEIGHT: u64 = 4;

/// Weight of a single node, excluding its children
pub fn node_weight(expr: &Expr) -> u64 {
    match expr {
        Expr::Map(..) | Expr::Filter(..) | Expr::Reduce(..) => TRAVERSAL_WEIGHT,
        Expr::Focus(..) => FOCUS_WEIGHT,
        _ => 1,
    }
}

/// Total cost of the tree rooted at `root`. Shared subterms are counted once
/// per occurrence.
pub fn cost(arena: &ExprArena, root: ExprId) -> u64 {
    let mut costs: HashMap<ExprId, u64> = HashMap::new();
    for id in arena.reachable(root) {
        let node = arena.get(id);
        let total = node
            .children()
            .iter()
            .map(|c| costs.get(c).copied().unwrap_or(0))
            .fold(node_weight(node), u64::saturating_add);
        costs.insert(id, total);
    }
    costs.get(&root).copied().unwrap_or(0)
}
