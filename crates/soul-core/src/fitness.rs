//! Multi-objective scoring used for champion selection.

use crate::config::{Direction, Objective};
use crate::types::SoulId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Raw objective measurements for one gene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub soul: SoulId,
    pub source: String,
    /// Latest value per metric type; absent objectives contribute nothing
    pub values: BTreeMap<String, f64>,
}

impl Candidate {
    pub fn new(soul: SoulId, source: impl Into<String>) -> Self {
        Self {
            soul,
            source: source.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, metric_type: &str, value: f64) -> Self {
        self.values.insert(metric_type.to_string(), value);
        self
    }
}

/// A candidate after normalization and weighting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub soul: SoulId,
    pub source: String,
    pub score: f64,
    /// Normalized value in [0, 1] per objective, higher is better
    pub objectives: BTreeMap<String, f64>,
}

/// Score every candidate: `Σ weight_i * normalize(metric_i)`.
///
/// Normalization is min-max over the candidate set, inverted for
/// `Minimize` objectives. When every candidate reports the same value the
/// objective normalizes to 1.0; a missing value normalizes to 0.0.
pub fn score_candidates(candidates: &[Candidate], objectives: &[Objective]) -> Vec<ScoredCandidate> {
    let bounds: Vec<Option<(f64, f64)>> = objectives
        .iter()
        .map(|objective| {
            candidates
                .iter()
                .filter_map(|c| c.values.get(&objective.metric_type).copied())
                .filter(|v| v.is_finite())
                .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                    None => Some((v, v)),
                    Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                })
        })
        .collect();

    candidates
        .iter()
        .map(|candidate| {
            let mut normalized = BTreeMap::new();
            let mut score = 0.0;
            for (objective, bound) in objectives.iter().zip(&bounds) {
                let value = candidate
                    .values
                    .get(&objective.metric_type)
                    .copied()
                    .filter(|v| v.is_finite());
                let n = match (value, bound) {
                    (Some(v), Some((lo, hi))) => normalize(v, *lo, *hi, objective.direction),
                    _ => 0.0,
                };
                score += objective.weight * n;
                normalized.insert(objective.metric_type.clone(), n);
            }
            ScoredCandidate {
                soul: candidate.soul.clone(),
                source: candidate.source.clone(),
                score,
                objectives: normalized,
            }
        })
        .collect()
}

fn normalize(value: f64, lo: f64, hi: f64, direction: Direction) -> f64 {
    if hi - lo <= f64::EPSILON {
        return 1.0;
    }
    let n = (value - lo) / (hi - lo);
    match direction {
        Direction::Maximize => n,
        Direction::Minimize => 1.0 - n,
    }
}

/// Order by descending score, then ascending soul, then ascending source.
fn rank(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.soul.cmp(&b.soul))
        .then_with(|| a.source.cmp(&b.source))
}

/// Pick the argmax; ties go to the lexicographically smallest soul.
pub fn select_champion(candidates: &[Candidate], objectives: &[Objective]) -> Option<ScoredCandidate> {
    let mut scored = score_candidates(candidates, objectives);
    scored.sort_by(rank);
    scored.into_iter().next()
}
