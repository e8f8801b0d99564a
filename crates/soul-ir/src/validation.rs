//! Structural validation for IR expressions.

use crate::arena::ExprArena;
use crate::expr::{Expr, ExprId};
use soul_core::{Error, Result};

/// Validate a raw node list: every child must precede its parent and the
/// root must be in range.
pub fn validate_nodes(nodes: &[Expr], root: ExprId) -> Result<()> {
    if nodes.is_empty() {
        return Err(Error::Validation("expression has no nodes".to_string()));
    }

    if root.index() >= nodes.len() {
        return Err(Error::Validation(format!(
            "root {} is out of range for {} nodes",
            root,
            nodes.len()
        )));
    }

    for (idx, node) in nodes.iter().enumerate() {
        for child in node.children() {
            if child.index() >= idx {
                return Err(Error::Validation(format!(
                    "node {} references child {} that does not precede it",
                    idx, child
                )));
            }
        }
    }

    Ok(())
}

/// Validate that `root` belongs to `arena`.
pub fn validate_arena(arena: &ExprArena, root: ExprId) -> Result<()> {
    if arena.try_get(root).is_none() {
        return Err(Error::Validation(format!(
            "root {} is out of range for {} nodes",
            root,
            arena.len()
        )));
    }
    Ok(())
}

/// Validate that the expression has no free de Bruijn variables.
pub fn validate_closed(arena: &ExprArena, root: ExprId) -> Result<()> {
    validate_arena(arena, root)?;
    let mut stack = vec![(root, 0u32)];
    while let Some((id, depth)) = stack.pop() {
        match arena.get(id) {
            Expr::Var(k) if *k >= depth => {
                return Err(Error::Validation(format!(
                    "free variable #{} at binder depth {}",
                    k - depth,
                    depth
                )));
            }
            Expr::Lam(body) => stack.push((*body, depth + 1)),
            node => stack.extend(node.children().into_iter().map(|c| (c, depth))),
        }
    }
    Ok(())
}
