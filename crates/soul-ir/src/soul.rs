//! Semantic identity ("soul") of an expression.
//!
//! The soul is the SHA-256 of the canonical encoding of the expression
//! after alternating normalization and rewriting to a joint fixpoint.

use crate::arena::ExprArena;
use crate::canonical::{encode, encode_shared};
use crate::cost::cost;
use crate::expr::ExprId;
use crate::normalize::normalize;
use crate::rewrite::{speedup, OptimizationReport, Optimized, RewriteEngine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use soul_core::{RewriteConfig, SoulConfig, SoulId};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Domain separator mixed into every soul digest
const SOUL_DOMAIN: &[u8] = b"SOUL:v1";

/// A computed soul
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Soul {
    pub id: SoulId,
    /// Set when a budget or the tree size limit stopped canonicalization;
    /// the identity is then only valid for these limits and must not be
    /// treated as canonical
    pub provisional: bool,
}

/// Canonical form of an expression and everything learned computing it
#[derive(Debug, Clone)]
pub struct Canonical {
    pub soul: Soul,
    pub root: ExprId,
    /// Tree encoding of `root`, or the shared encoding when the tree exceeds
    /// `SoulConfig::max_tree_size`
    pub bytes: Vec<u8>,
    /// Cost of the input term
    pub initial_cost: u64,
    /// Cost of the canonical term
    pub final_cost: u64,
    pub speedup: f64,
    pub rounds: usize,
    /// Rewrite passes across all rounds
    pub passes: usize,
    pub steps_used: usize,
    pub rules_applied: BTreeMap<String, usize>,
}

impl Canonical {
    /// Report comparing the input term with its canonical form.
    pub fn report(&self) -> OptimizationReport {
        OptimizationReport {
            initial_cost: self.initial_cost,
            final_cost: self.final_cost,
            speedup: self.speedup,
            passes: self.passes,
            rules_applied: self.rules_applied.clone(),
            semantic_hash: self.soul.id.clone(),
        }
    }
}

/// Runs the canonicalization pipeline with fixed budgets.
#[derive(Debug, Clone)]
pub struct SoulHasher {
    config: SoulConfig,
    engine: RewriteEngine,
}

impl Default for SoulHasher {
    fn default() -> Self {
        Self::new(SoulConfig::default())
    }
}

impl SoulHasher {
    pub fn new(config: SoulConfig) -> Self {
        let engine = RewriteEngine::new(&RewriteConfig {
            max_passes: config.max_passes,
        });
        Self { config, engine }
    }

    pub fn config(&self) -> &SoulConfig {
        &self.config
    }

    /// Normalize and rewrite until neither changes the term, then encode and hash.
    pub fn canonicalize(&self, arena: &mut ExprArena, root: ExprId) -> Canonical {
        let initial_cost = cost(arena, root);
        let mut current = root;
        let mut exhausted = false;
        let mut converged = false;
        let mut rounds = 0;
        let mut steps_used = 0;
        let mut passes = 0;
        let mut rules_applied: BTreeMap<String, usize> = BTreeMap::new();

        while rounds < self.config.max_rounds {
            rounds += 1;
            let normalized = normalize(arena, current, self.config.normalize_budget);
            steps_used += normalized.steps_used;
            exhausted |= normalized.exhausted;

            let rewritten = self.engine.saturate(arena, normalized.result);
            passes += rewritten.passes;
            for (rule, count) in rewritten.rules_applied {
                *rules_applied.entry(rule).or_insert(0) += count;
            }

            if normalized.result == current && rewritten.result == current {
                converged = true;
                break;
            }
            current = rewritten.result;
            if exhausted {
                break;
            }
        }

        if !converged && !exhausted {
            warn!(rounds, "canonicalization stopped at the round cap");
        }

        let size = arena.tree_size(current);
        let oversized = size > self.config.max_tree_size;
        let bytes = if oversized {
            warn!(size, limit = self.config.max_tree_size, "canonical form exceeds the tree size limit");
            encode_shared(arena, current)
        } else {
            encode(arena, current)
        };
        let soul = Soul {
            id: digest(&bytes),
            provisional: exhausted || !converged || oversized,
        };
        let final_cost = cost(arena, current);
        debug!(soul = %soul.id, provisional = soul.provisional, rounds, "computed soul");

        Canonical {
            soul,
            root: current,
            bytes,
            initial_cost,
            final_cost,
            speedup: speedup(initial_cost, final_cost),
            rounds,
            passes,
            steps_used,
            rules_applied,
        }
    }

    pub fn soul(&self, arena: &mut ExprArena, root: ExprId) -> Soul {
        self.canonicalize(arena, root).soul
    }

    /// Rewrite `root` to its canonical form when that is final and no more
    /// expensive; otherwise return `root` unchanged.
    ///
    /// Either way the result has the same soul as `root` and its cost never
    /// exceeds the cost of `root`.
    pub fn optimize(&self, arena: &mut ExprArena, root: ExprId) -> Optimized {
        let canonical = self.canonicalize(arena, root);
        if canonical.soul.provisional || canonical.final_cost > canonical.initial_cost {
            debug!(
                provisional = canonical.soul.provisional,
                canonical_cost = canonical.final_cost,
                "keeping input term"
            );
            return Optimized {
                result: root,
                initial_cost: canonical.initial_cost,
                final_cost: canonical.initial_cost,
                speedup: 1.0,
                passes: canonical.passes,
                fixpoint: false,
                rules_applied: BTreeMap::new(),
            };
        }

        debug!(
            initial_cost = canonical.initial_cost,
            final_cost = canonical.final_cost,
            passes = canonical.passes,
            "optimized term"
        );
        Optimized {
            result: canonical.root,
            initial_cost: canonical.initial_cost,
            final_cost: canonical.final_cost,
            speedup: canonical.speedup,
            passes: canonical.passes,
            fixpoint: true,
            rules_applied: canonical.rules_applied,
        }
    }
}

/// Optimize `root` with the canonicalization pipeline configured by `config`.
pub fn optimize(arena: &mut ExprArena, root: ExprId, config: &SoulConfig) -> Optimized {
    SoulHasher::new(config.clone()).optimize(arena, root)
}

/// Soul of `root` under the default budgets.
pub fn soul(arena: &mut ExprArena, root: ExprId) -> Soul {
    SoulHasher::default().soul(arena, root)
}

/// Hash canonical bytes into a soul identifier.
pub fn digest(canonical: &[u8]) -> SoulId {
    let mut hasher = Sha256::new();
    hasher.update(SOUL_DOMAIN);
    hasher.update((canonical.len() as u64).to_le_bytes());
    hasher.update(canonical);
    SoulId::from_digest(&hasher.finalize())
}
