//! Intermediate Representation (IR) for genes and its canonicalization pipeline.
//!
//! Expressions live in an interning arena and use de Bruijn indices for bound
//! variables. The pipeline is:
//! - `normalize`: bounded normal-order beta-reduction
//! - `rewrite`: cost-reducing algebraic rules saturated to a fixpoint
//! - `optimize`: both of the above alternated, never raising cost
//! - `canonical`: fixed tag encoding of the result
//! - `soul`: SHA-256 of the canonical bytes, formatted as `λ<8 hex>`

pub mod expr;
pub mod arena;
pub mod syntax;
pub mod normalize;
pub mod cost;
pub mod rewrite;
pub mod canonical;
pub mod soul;
pub mod validation;

pub use expr::{BinaryOp, Expr, ExprId, Literal};
pub use arena::ExprArena;
pub use syntax::{parse, print};
pub use normalize::{normalize, Normalized};
pub use cost::cost;
pub use rewrite::{canonical_rules, Optimized, OptimizationReport, RewriteEngine, RewriteRule};
pub use soul::{optimize, soul, Canonical, Soul, SoulHasher};
pub use validation::{validate_arena, validate_closed};
