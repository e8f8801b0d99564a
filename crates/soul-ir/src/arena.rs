//! Hash-consing arena that owns every expression node.

use crate::expr::{BinaryOp, Expr, ExprId, Literal};
use crate::validation::validate_nodes;
use serde::{Deserialize, Serialize};
use soul_core::{Error, Result};
use std::collections::HashMap;

/// Append-only node store.
///
/// Structurally identical nodes are interned to the same [`ExprId`], so id
/// equality is structural equality. Every child index is strictly smaller
/// than its parent's index, which makes the arena acyclic.
#[derive(Debug, Clone, Default)]
pub struct ExprArena {
    nodes: Vec<Expr>,
    interned: HashMap<Expr, ExprId>,
}

/// Serialized form of a single rooted expression
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    nodes: Vec<Expr>,
    root: ExprId,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node behind `id`.
    ///
    /// # Panics
    /// If `id` was not allocated by this arena.
    pub fn get(&self, id: ExprId) -> &Expr {
        &self.nodes[id.index()]
    }

    pub fn try_get(&self, id: ExprId) -> Option<&Expr> {
        self.nodes.get(id.index())
    }

    /// Intern a node, returning the existing id when an identical node exists.
    pub fn alloc(&mut self, expr: Expr) -> ExprId {
        if let Some(&id) = self.interned.get(&expr) {
            return id;
        }
        let id = ExprId(self.nodes.len() as u32);
        debug_assert!(expr.children().iter().all(|c| c.0 < id.0));
        self.nodes.push(expr.clone());
        self.interned.insert(expr, id);
        id
    }

    pub fn var(&mut self, index: u32) -> ExprId {
        self.alloc(Expr::Var(index))
    }

    pub fn int(&mut self, n: i64) -> ExprId {
        self.alloc(Expr::Const(Literal::Int(n)))
    }

    pub fn boolean(&mut self, b: bool) -> ExprId {
        self.alloc(Expr::Const(Literal::Bool(b)))
    }

    pub fn string(&mut self, s: &str) -> ExprId {
        self.alloc(Expr::Const(Literal::Str(s.to_string())))
    }

    pub fn nil(&mut self) -> ExprId {
        self.alloc(Expr::Const(Literal::Nil))
    }

    pub fn prim(&mut self, name: &str) -> ExprId {
        self.alloc(Expr::Prim(name.to_string()))
    }

    pub fn id(&mut self) -> ExprId {
        self.alloc(Expr::Id)
    }

    pub fn lam(&mut self, body: ExprId) -> ExprId {
        self.alloc(Expr::Lam(body))
    }

    pub fn app(&mut self, f: ExprId, arg: ExprId) -> ExprId {
        self.alloc(Expr::App(f, arg))
    }

    pub fn map(&mut self, f: ExprId, xs: ExprId) -> ExprId {
        self.alloc(Expr::Map(f, xs))
    }

    pub fn filter(&mut self, p: ExprId, xs: ExprId) -> ExprId {
        self.alloc(Expr::Filter(p, xs))
    }

    pub fn reduce(&mut self, f: ExprId, init: ExprId, xs: ExprId) -> ExprId {
        self.alloc(Expr::Reduce(f, init, xs))
    }

    pub fn compose(&mut self, f: ExprId, g: ExprId) -> ExprId {
        self.alloc(Expr::Compose(f, g))
    }

    pub fn focus(&mut self, xs: ExprId, p: ExprId, f: ExprId, drop: ExprId) -> ExprId {
        self.alloc(Expr::Focus(xs, p, f, drop))
    }

    pub fn binop(&mut self, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.alloc(Expr::BinOp(op, lhs, rhs))
    }

    pub fn not(&mut self, x: ExprId) -> ExprId {
        self.alloc(Expr::Not(x))
    }

    pub fn if_then_else(&mut self, cond: ExprId, then: ExprId, otherwise: ExprId) -> ExprId {
        self.alloc(Expr::If(cond, then, otherwise))
    }

    /// Number of nodes in the tree rooted at `root`, counting shared subterms
    /// once per occurrence. Saturates at `usize::MAX`.
    pub fn tree_size(&self, root: ExprId) -> usize {
        let mut sizes: HashMap<ExprId, usize> = HashMap::new();
        for id in self.reachable(root) {
            let size = self
                .get(id)
                .children()
                .iter()
                .map(|c| sizes.get(c).copied().unwrap_or(0))
                .fold(1, usize::saturating_add);
            sizes.insert(id, size);
        }
        sizes.get(&root).copied().unwrap_or(0)
    }

    /// Ids reachable from `root`, children before parents.
    pub fn reachable(&self, root: ExprId) -> Vec<ExprId> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![root];
        let mut found = Vec::new();
        while let Some(id) = stack.pop() {
            if seen[id.index()] {
                continue;
            }
            seen[id.index()] = true;
            found.push(id);
            stack.extend(self.get(id).children());
        }
        // Children always have smaller indices than their parents
        found.sort();
        found
    }

    /// Copy `root` from another arena into this one.
    pub fn import(&mut self, other: &ExprArena, root: ExprId) -> ExprId {
        let mut mapping: HashMap<ExprId, ExprId> = HashMap::new();
        for id in other.reachable(root) {
            let node = other.get(id).map_children(|c| mapping[&c]);
            let new_id = self.alloc(node);
            mapping.insert(id, new_id);
        }
        mapping[&root]
    }

    /// Compact copy containing only the nodes reachable from `root`.
    pub fn extract(&self, root: ExprId) -> (ExprArena, ExprId) {
        let mut arena = ExprArena::new();
        let root = arena.import(self, root);
        (arena, root)
    }

    /// Serialize the expression rooted at `root` to bytes.
    pub fn to_bytes(&self, root: ExprId) -> Result<Vec<u8>> {
        let (compact, root) = self.extract(root);
        let snapshot = Snapshot {
            nodes: compact.nodes,
            root,
        };
        Ok(bincode::serialize(&snapshot)?)
    }

    /// Deserialize and validate an expression produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<(ExprArena, ExprId)> {
        let snapshot: Snapshot = bincode::deserialize(bytes)?;
        validate_nodes(&snapshot.nodes, snapshot.root)?;

        let mut arena = ExprArena::new();
        for node in snapshot.nodes {
            let before = arena.len();
            arena.alloc(node);
            if arena.len() == before {
                return Err(Error::Validation("snapshot contains duplicate nodes".to_string()));
            }
        }
        Ok((arena, snapshot.root))
    }
}
