//! Cost-reducing rewrite engine.

use crate::arena::ExprArena;
use crate::cost::cost;
use crate::expr::{Expr, ExprId};
use serde::{Deserialize, Serialize};
use soul_core::{RewriteConfig, SoulId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::trace;

/// Builds the replacement for a matching node, or `None` when the node does
/// not match the rule's pattern.
pub type ReplacementBuilder = fn(&mut ExprArena, ExprId) -> Option<ExprId>;

/// One algebraic rule
#[derive(Clone, Copy)]
pub struct RewriteRule {
    pub name: &'static str,
    pub pattern: &'static str,
    pub replacement: &'static str,
    /// Expected cost change of one application
    pub cost_delta_hint: i64,
    pub build: ReplacementBuilder,
}

impl fmt::Debug for RewriteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteRule")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .field("replacement", &self.replacement)
            .field("cost_delta_hint", &self.cost_delta_hint)
            .finish()
    }
}

static CANONICAL_RULES: [RewriteRule; 4] = [
    RewriteRule {
        name: "const_fold",
        pattern: "BinOp(op, Const a, Const b)",
        replacement: "Const(eval(op, a, b))",
        cost_delta_hint: -2,
        build: const_fold,
    },
    RewriteRule {
        name: "identity_elim",
        pattern: "Map(Id, xs)",
        replacement: "xs",
        cost_delta_hint: -4,
        build: identity_elim,
    },
    RewriteRule {
        name: "map_fusion",
        pattern: "Map(f, Map(g, xs))",
        replacement: "Map(Compose(f, g), xs)",
        cost_delta_hint: -2,
        build: map_fusion,
    },
    RewriteRule {
        name: "filter_map_to_focus",
        pattern: "Map(f, Filter(p, xs))",
        replacement: "Focus(xs, p, f, Id)",
        cost_delta_hint: -1,
        build: filter_map_to_focus,
    },
];

/// The fixed rule table, in priority order.
pub fn canonical_rules() -> &'static [RewriteRule] {
    &CANONICAL_RULES
}

fn const_fold(arena: &mut ExprArena, id: ExprId) -> Option<ExprId> {
    let Expr::BinOp(op, lhs, rhs) = *arena.get(id) else {
        return None;
    };
    let (Expr::Const(a), Expr::Const(b)) = (arena.get(lhs), arena.get(rhs)) else {
        return None;
    };
    let folded = op.eval(a, b)?;
    Some(arena.alloc(Expr::Const(folded)))
}

fn identity_elim(arena: &mut ExprArena, id: ExprId) -> Option<ExprId> {
    match *arena.get(id) {
        Expr::Map(f, xs) if *arena.get(f) == Expr::Id => Some(xs),
        _ => None,
    }
}

fn map_fusion(arena: &mut ExprArena, id: ExprId) -> Option<ExprId> {
    let Expr::Map(f, inner) = *arena.get(id) else {
        return None;
    };
    let Expr::Map(g, xs) = *arena.get(inner) else {
        return None;
    };
    let composed = arena.compose(f, g);
    Some(arena.map(composed, xs))
}

fn filter_map_to_focus(arena: &mut ExprArena, id: ExprId) -> Option<ExprId> {
    let Expr::Map(f, inner) = *arena.get(id) else {
        return None;
    };
    let Expr::Filter(p, xs) = *arena.get(inner) else {
        return None;
    };
    let drop = arena.id();
    Some(arena.focus(xs, p, f, drop))
}

/// Outcome of saturating a term with the rule table
#[derive(Debug, Clone)]
pub struct Rewritten {
    pub result: ExprId,
    pub passes: usize,
    /// False when the pass cap stopped rewriting before a fixpoint
    pub fixpoint: bool,
    pub rules_applied: BTreeMap<String, usize>,
}

/// Applies an ordered rule table bottom-up until nothing changes.
#[derive(Debug, Clone)]
pub struct RewriteEngine {
    rules: Vec<RewriteRule>,
    max_passes: usize,
}

impl RewriteEngine {
    pub fn new(config: &RewriteConfig) -> Self {
        Self::with_rules(canonical_rules().to_vec(), config)
    }

    pub fn with_rules(rules: Vec<RewriteRule>, config: &RewriteConfig) -> Self {
        Self {
            rules,
            max_passes: config.max_passes,
        }
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Run passes until a fixpoint or the pass cap.
    pub fn saturate(&self, arena: &mut ExprArena, root: ExprId) -> Rewritten {
        let mut current = root;
        let mut rules_applied = BTreeMap::new();
        let mut passes = 0;
        let mut fixpoint = false;

        while passes < self.max_passes {
            passes += 1;
            let mut memo = HashMap::new();
            let next = self.pass(arena, current, &mut memo, &mut rules_applied);
            if next == current {
                fixpoint = true;
                break;
            }
            current = next;
        }

        trace!(passes, fixpoint, "rewrite saturation finished");
        Rewritten {
            result: current,
            passes,
            fixpoint,
            rules_applied,
        }
    }

    /// One bottom-up pass. A node is replaced by the first rule whose
    /// replacement is strictly cheaper.
    fn pass(
        &self,
        arena: &mut ExprArena,
        id: ExprId,
        memo: &mut HashMap<ExprId, ExprId>,
        rules_applied: &mut BTreeMap<String, usize>,
    ) -> ExprId {
        if let Some(&done) = memo.get(&id) {
            return done;
        }

        let node = arena.get(id).clone();
        let rebuilt = if node.is_leaf() {
            id
        } else {
            let node = node.map_children(|child| self.pass(arena, child, memo, rules_applied));
            arena.alloc(node)
        };

        let mut result = rebuilt;
        let before = cost(arena, rebuilt);
        for rule in &self.rules {
            if let Some(candidate) = (rule.build)(arena, rebuilt) {
                if cost(arena, candidate) < before {
                    *rules_applied.entry(rule.name.to_string()).or_insert(0) += 1;
                    result = candidate;
                    break;
                }
            }
        }

        memo.insert(id, result);
        result
    }
}

/// Result of [`optimize`](crate::soul::optimize)
#[derive(Debug, Clone)]
pub struct Optimized {
    pub result: ExprId,
    pub initial_cost: u64,
    pub final_cost: u64,
    /// `initial_cost / final_cost`
    pub speedup: f64,
    pub passes: usize,
    pub fixpoint: bool,
    pub rules_applied: BTreeMap<String, usize>,
}

pub(crate) fn speedup(initial_cost: u64, final_cost: u64) -> f64 {
    if final_cost == 0 {
        return 1.0;
    }
    initial_cost as f64 / final_cost as f64
}

/// Summary of one optimization, rendered as report lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub initial_cost: u64,
    pub final_cost: u64,
    pub speedup: f64,
    pub passes: usize,
    pub rules_applied: BTreeMap<String, usize>,
    pub semantic_hash: SoulId,
}

impl OptimizationReport {
    pub fn new(optimized: &Optimized, semantic_hash: SoulId) -> Self {
        Self {
            initial_cost: optimized.initial_cost,
            final_cost: optimized.final_cost,
            speedup: optimized.speedup,
            passes: optimized.passes,
            rules_applied: optimized.rules_applied.clone(),
            semantic_hash,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("Semantic hash: {}", self.semantic_hash),
            format!("Initial cost: {}", self.initial_cost),
            format!("Final cost: {}", self.final_cost),
            format!("Speedup: {:.2}x", self.speedup),
            format!("Iterations: {}", self.passes),
            format!("Rules applied: {}", self.rules_summary()),
        ]
    }

    /// `rule (count)` pairs in name order, or `none`
    pub fn rules_summary(&self) -> String {
        if self.rules_applied.is_empty() {
            return "none".to_string();
        }
        self.rules_applied
            .iter()
            .map(|(rule, count)| format!("{} ({})", rule, count))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for OptimizationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
