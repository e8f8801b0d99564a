//! Row types of the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use soul_core::{AttestationId, Cid, Error, Result, SoulId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// What a CAS object holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Raw expression snapshot as submitted
    Source,
    Gene,
    /// Canonical expression bytes
    Ir,
    /// Attestation statement
    Proof,
    /// Organism manifest
    Organism,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Source => "source",
            ObjectKind::Gene => "gene",
            ObjectKind::Ir => "ir",
            ObjectKind::Proof => "proof",
            ObjectKind::Organism => "organism",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "source" => Ok(ObjectKind::Source),
            "gene" => Ok(ObjectKind::Gene),
            "ir" => Ok(ObjectKind::Ir),
            "proof" => Ok(ObjectKind::Proof),
            "organism" => Ok(ObjectKind::Organism),
            other => Err(Error::Parse(format!("unknown object kind {:?}", other))),
        }
    }
}

/// CAS entry metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub cid: Cid,
    pub kind: ObjectKind,
    pub source: Option<String>,
    pub size: usize,
    pub created_at: DateTime<Utc>,
}

/// A registered implementation of some semantics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    pub soul: SoulId,
    pub source: String,
    /// CAS object holding the canonical expression bytes
    pub cid: Cid,
    /// Canonical expression in surface syntax
    pub ir: String,
    pub complexity: f64,
    pub purity: f64,
    pub size: usize,
    pub created_at: DateTime<Utc>,
}

/// Gene fields supplied by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct NewGene {
    pub soul: SoulId,
    pub source: String,
    pub cid: Cid,
    pub ir: String,
    pub complexity: f64,
    pub purity: f64,
    pub size: usize,
}

/// Discovered behavioral equivalence, stored with `soul1 < soul2`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equivalence {
    pub id: i64,
    pub soul1: SoulId,
    pub soul2: SoulId,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// Current best gene of an equivalence group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Champion {
    /// Group key: smallest soul of the group
    pub canonical: SoulId,
    pub soul: SoulId,
    pub source: String,
    pub score: f64,
    /// Normalized value per objective
    pub objectives: BTreeMap<String, f64>,
    pub created_at: DateTime<Utc>,
}

/// Named bundle of genes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organism {
    pub name: String,
    pub soulset: BTreeSet<SoulId>,
    /// CAS object holding the JSON manifest
    pub manifest: Cid,
    pub targets: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Manifest written to the CAS when an organism is forged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganismManifest {
    pub name: String,
    pub targets: Vec<String>,
    /// Soul to the CAS ids of its canonical expressions
    pub genes: BTreeMap<SoulId, Vec<Cid>>,
}

/// Statement stored as a proof object when an organism is attested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationStatement {
    pub organism: String,
    pub manifest: Cid,
    pub soulset: BTreeSet<SoulId>,
    pub issued_at: DateTime<Utc>,
}

/// Signed claim that an organism build is identified by a CID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    pub id: AttestationId,
    pub organism: String,
    pub cid: Cid,
    pub signature: String,
    pub created_at: DateTime<Utc>,
}

/// One measurement for a soul
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: i64,
    pub soul: SoulId,
    pub metric_type: String,
    pub value: f64,
    pub measured_at: DateTime<Utc>,
}

/// Row counts across the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStatus {
    pub objects: usize,
    pub stored_bytes: u64,
    pub genes: usize,
    pub unique_souls: usize,
    pub equivalences: usize,
    pub champions: usize,
    pub organisms: usize,
    pub attestations: usize,
    pub metrics: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_kind_roundtrip() {
        for kind in [
            ObjectKind::Source,
            ObjectKind::Gene,
            ObjectKind::Ir,
            ObjectKind::Proof,
            ObjectKind::Organism,
        ] {
            assert_eq!(kind.as_str().parse::<ObjectKind>().unwrap(), kind);
        }
        assert!("blob".parse::<ObjectKind>().is_err());
    }

    #[test]
    fn test_manifest_serialization_is_ordered() {
        let mut genes = BTreeMap::new();
        genes.insert(SoulId::parse("λffffffff").unwrap(), vec![Cid::of(b"b")]);
        genes.insert(SoulId::parse("λ00000000").unwrap(), vec![Cid::of(b"a")]);
        let manifest = OrganismManifest {
            name: "calc".to_string(),
            targets: vec!["wasm".to_string()],
            genes,
        };

        let json = serde_json::to_string(&manifest).unwrap();
        let first = json.find("λ00000000").unwrap();
        let second = json.find("λffffffff").unwrap();
        assert!(first < second);
    }
}
