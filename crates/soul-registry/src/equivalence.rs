//! Undirected confidence-weighted graph over souls.

use crate::model::Equivalence;
use soul_core::SoulId;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct EquivalenceGraph {
    adjacency: BTreeMap<SoulId, Vec<(SoulId, f64)>>,
}

impl EquivalenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a Equivalence>) -> Self {
        let mut graph = Self::new();
        for edge in edges {
            graph.add_edge(&edge.soul1, &edge.soul2, edge.confidence);
        }
        graph
    }

    pub fn add_edge(&mut self, a: &SoulId, b: &SoulId, confidence: f64) {
        self.adjacency
            .entry(a.clone())
            .or_default()
            .push((b.clone(), confidence));
        self.adjacency
            .entry(b.clone())
            .or_default()
            .push((a.clone(), confidence));
    }

    /// Connected component of `start` using only edges with
    /// `confidence >= min_confidence`. Always contains `start`.
    pub fn class(&self, start: &SoulId, min_confidence: f64) -> BTreeSet<SoulId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        seen.insert(start.clone());
        queue.push_back(start.clone());

        while let Some(soul) = queue.pop_front() {
            let Some(neighbors) = self.adjacency.get(&soul) else {
                continue;
            };
            for (next, confidence) in neighbors {
                if *confidence >= min_confidence && seen.insert(next.clone()) {
                    queue.push_back(next.clone());
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soul(n: u32) -> SoulId {
        SoulId::parse(&format!("λ{:08x}", n)).unwrap()
    }

    #[test]
    fn test_isolated_soul() {
        let graph = EquivalenceGraph::new();
        let class = graph.class(&soul(1), 0.5);
        assert_eq!(class.len(), 1);
        assert!(class.contains(&soul(1)));
    }

    #[test]
    fn test_transitive_class() {
        let mut graph = EquivalenceGraph::new();
        graph.add_edge(&soul(1), &soul(2), 0.9);
        graph.add_edge(&soul(2), &soul(3), 0.8);
        graph.add_edge(&soul(4), &soul(5), 0.9);

        let class = graph.class(&soul(3), 0.5);
        assert_eq!(class, [soul(1), soul(2), soul(3)].into_iter().collect());
    }

    #[test]
    fn test_threshold_cuts_weak_edges() {
        let mut graph = EquivalenceGraph::new();
        graph.add_edge(&soul(1), &soul(2), 0.9);
        graph.add_edge(&soul(2), &soul(3), 0.3);

        assert_eq!(graph.class(&soul(1), 0.5).len(), 2);
        assert_eq!(graph.class(&soul(1), 0.3).len(), 3);
    }

    #[test]
    fn test_any_strong_edge_qualifies() {
        let mut graph = EquivalenceGraph::new();
        graph.add_edge(&soul(1), &soul(2), 0.2);
        graph.add_edge(&soul(1), &soul(2), 0.95);
        assert_eq!(graph.class(&soul(2), 0.9).len(), 2);
    }

    #[test]
    fn test_cycles_terminate() {
        let mut graph = EquivalenceGraph::new();
        graph.add_edge(&soul(1), &soul(2), 1.0);
        graph.add_edge(&soul(2), &soul(3), 1.0);
        graph.add_edge(&soul(3), &soul(1), 1.0);
        assert_eq!(graph.class(&soul(1), 1.0).len(), 3);
    }
}
