//! Gene registry: referential integrity, equivalence groups and champions.

use crate::cas::ContentStore;
use crate::database::{db_error, from_millis, now_millis, Database};
use crate::equivalence::EquivalenceGraph;
use crate::model::{
    Attestation, AttestationStatement, Champion, Equivalence, Gene, Metric, NewGene, ObjectKind,
    Organism, OrganismManifest, RegistryStatus,
};
use dashmap::DashMap;
use soul_core::{
    select_champion, AttestationId, Candidate, Cid, EngineConfig, Error, RegistryConfig, Result,
    SoulConfig, SoulId,
};
use soul_ir::canonical::decode;
use soul_ir::{print, validate_closed, Expr, ExprArena, ExprId, OptimizationReport, SoulHasher};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

/// Gene attributes that stand in for missing metrics of the same name
const ATTRIBUTE_METRICS: [&str; 3] = ["size", "complexity", "purity"];

/// Outcome of [`Registry::register_expression`]
#[derive(Debug, Clone)]
pub struct Registration {
    pub gene: Gene,
    /// CAS object holding the submitted expression snapshot
    pub source_cid: Cid,
    pub report: OptimizationReport,
}

#[derive(Clone)]
pub struct Registry {
    db: Database,
    cas: ContentStore,
    config: RegistryConfig,
    hasher: SoulHasher,
    group_locks: Arc<DashMap<SoulId, Arc<Mutex<()>>>>,
    /// Held exclusively while an edge is added and its merged group re-scored,
    /// shared by every other recomputation.
    merge_lock: Arc<RwLock<()>>,
}

impl Registry {
    pub fn new(db: Database, config: RegistryConfig, soul_config: SoulConfig) -> Self {
        Self {
            cas: ContentStore::new(db.clone()),
            db,
            config,
            hasher: SoulHasher::new(soul_config),
            group_locks: Arc::new(DashMap::new()),
            merge_lock: Arc::new(RwLock::new(())),
        }
    }

    /// Open the configured database, run migrations and build a registry.
    pub async fn open(config: &EngineConfig) -> Result<Self> {
        let db = Database::new(&config.registry.database_path).await?;
        db.migrate().await?;
        info!(path = %config.registry.database_path, "registry opened");
        Ok(Self::new(db, config.registry.clone(), config.soul.clone()))
    }

    pub fn cas(&self) -> &ContentStore {
        &self.cas
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ----- genes -----

    /// Insert a gene row. The referenced object must already be in the CAS.
    ///
    /// A gene is never mutated: inserting an existing `(soul, source)` pair
    /// returns the stored row unchanged.
    #[instrument(skip(self, gene), fields(soul = %gene.soul, source = %gene.source))]
    pub async fn insert_gene(&self, gene: NewGene) -> Result<Gene> {
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        if !object_exists(&mut *tx, &gene.cid).await? {
            return Err(Error::UnknownObject(gene.cid.to_string()));
        }

        let existing: Option<String> =
            sqlx::query_scalar("SELECT cid FROM genes WHERE soul = ?1 AND cid != ?2 LIMIT 1")
                .bind(gene.soul.as_str())
                .bind(gene.cid.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error("Failed to check soul collision"))?;
        if let Some(existing) = existing {
            warn!(existing = %existing, cid = %gene.cid, "soul collision");
            return Err(Error::SoulCollision {
                soul: gene.soul.to_string(),
                existing,
                cid: gene.cid.to_string(),
            });
        }

        let result = sqlx::query(
            r#"
            INSERT INTO genes (soul, source, cid, ir, complexity, purity, size, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(soul, source) DO NOTHING
            "#,
        )
        .bind(gene.soul.as_str())
        .bind(&gene.source)
        .bind(gene.cid.as_str())
        .bind(&gene.ir)
        .bind(gene.complexity)
        .bind(gene.purity)
        .bind(gene.size as i64)
        .bind(now_millis())
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to store gene"))?;

        tx.commit().await.map_err(db_error("Failed to commit gene"))?;

        let stored = self
            .gene(&gene.soul, &gene.source)
            .await?
            .ok_or_else(|| Error::NotFound(format!("gene {} from {}", gene.soul, gene.source)))?;

        if result.rows_affected() > 0 {
            info!("registered gene");
            self.recompute_champion(&gene.soul).await?;
        } else {
            debug!("gene already registered");
        }
        Ok(stored)
    }

    pub async fn gene(&self, soul: &SoulId, source: &str) -> Result<Option<Gene>> {
        let row = sqlx::query("SELECT * FROM genes WHERE soul = ?1 AND source = ?2")
            .bind(soul.as_str())
            .bind(source)
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_error("Failed to get gene"))?;

        row.as_ref().map(gene_from_row).transpose()
    }

    /// Every gene sharing `soul`, oldest first.
    pub async fn genes_by_soul(&self, soul: &SoulId) -> Result<Vec<Gene>> {
        let rows = sqlx::query("SELECT * FROM genes WHERE soul = ?1 ORDER BY id")
            .bind(soul.as_str())
            .fetch_all(self.db.pool())
            .await
            .map_err(db_error("Failed to get genes"))?;

        rows.iter().map(gene_from_row).collect()
    }

    /// Canonicalize an expression and register it as a gene from `source`.
    ///
    /// Purity is 1.0 for expressions without host primitives; otherwise the
    /// caller's value is used (0.0 when none is supplied).
    #[instrument(skip(self, arena, purity))]
    pub async fn register_expression(
        &self,
        arena: &mut ExprArena,
        root: ExprId,
        source: &str,
        purity: Option<f64>,
    ) -> Result<Registration> {
        validate_closed(arena, root)?;
        let snapshot = arena.to_bytes(root)?;

        let canonical = self.hasher.canonicalize(arena, root);
        if canonical.soul.provisional {
            warn!(soul = %canonical.soul.id, "refusing provisional soul");
            return Err(Error::ProvisionalSoul(canonical.soul.id.to_string()));
        }

        let source_cid = self
            .cas
            .put(&snapshot, ObjectKind::Source, Some(source))
            .await?;
        let cid = self
            .cas
            .put(&canonical.bytes, ObjectKind::Ir, Some(source))
            .await?;

        let uses_prims = arena
            .reachable(canonical.root)
            .into_iter()
            .any(|id| matches!(arena.get(id), Expr::Prim(_)));
        let purity = if uses_prims { purity.unwrap_or(0.0) } else { 1.0 };

        let gene = self
            .insert_gene(NewGene {
                soul: canonical.soul.id.clone(),
                source: source.to_string(),
                cid,
                ir: print(arena, canonical.root),
                complexity: canonical.final_cost as f64,
                purity,
                size: canonical.bytes.len(),
            })
            .await?;

        Ok(Registration {
            gene,
            source_cid,
            report: canonical.report(),
        })
    }

    /// Decode the canonical expression stored under `cid`.
    pub async fn load_expression(&self, cid: &Cid) -> Result<(ExprArena, ExprId)> {
        let bytes = self.cas.get(cid).await?;
        let mut arena = ExprArena::new();
        let root = decode(&mut arena, &bytes)?;
        Ok((arena, root))
    }

    // ----- equivalences -----

    /// Append an equivalence edge between two registered souls.
    #[instrument(skip(self))]
    pub async fn record_equivalence(
        &self,
        soul1: &SoulId,
        soul2: &SoulId,
        confidence: f64,
    ) -> Result<Equivalence> {
        if !(confidence > 0.0 && confidence <= 1.0) {
            return Err(Error::InvalidConfidence(confidence));
        }
        if soul1 == soul2 {
            return Err(Error::SelfLoop(soul1.to_string()));
        }
        let (a, b) = if soul1 < soul2 { (soul1, soul2) } else { (soul2, soul1) };

        // No recomputation may pick its group key until the merged group is scored
        let _merging = self.merge_lock.write().await;

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        for soul in [a, b] {
            if !soul_exists(&mut *tx, soul).await? {
                return Err(Error::UnknownSoul(soul.to_string()));
            }
        }

        let created_at = now_millis();
        let result = sqlx::query(
            "INSERT INTO equivalences (soul1, soul2, confidence, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(a.as_str())
        .bind(b.as_str())
        .bind(confidence)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to store equivalence"))?;

        tx.commit().await.map_err(db_error("Failed to commit equivalence"))?;
        info!("recorded equivalence");

        // The edge may merge two groups
        self.recompute_locked(a).await?;

        Ok(Equivalence {
            id: result.last_insert_rowid(),
            soul1: a.clone(),
            soul2: b.clone(),
            confidence,
            created_at: from_millis(created_at),
        })
    }

    /// Edges touching `soul`, in insertion order.
    pub async fn equivalences_for(&self, soul: &SoulId) -> Result<Vec<Equivalence>> {
        let rows = sqlx::query("SELECT * FROM equivalences WHERE soul1 = ?1 OR soul2 = ?1 ORDER BY id")
            .bind(soul.as_str())
            .fetch_all(self.db.pool())
            .await
            .map_err(db_error("Failed to get equivalences"))?;

        rows.iter().map(equivalence_from_row).collect()
    }

    /// Souls reachable from `soul` over edges with `confidence >= min_confidence`.
    pub async fn equivalence_class(
        &self,
        soul: &SoulId,
        min_confidence: f64,
    ) -> Result<BTreeSet<SoulId>> {
        if !soul_exists(self.db.pool(), soul).await? {
            return Err(Error::UnknownSoul(soul.to_string()));
        }

        let rows = sqlx::query("SELECT * FROM equivalences WHERE confidence >= ?1")
            .bind(min_confidence)
            .fetch_all(self.db.pool())
            .await
            .map_err(db_error("Failed to load equivalence graph"))?;
        let edges = rows
            .iter()
            .map(equivalence_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(EquivalenceGraph::from_edges(&edges).class(soul, min_confidence))
    }

    /// Key of the champion group containing `soul`.
    pub async fn group_key(&self, soul: &SoulId) -> Result<SoulId> {
        let class = self.equivalence_class(soul, self.config.min_confidence).await?;
        Ok(class.into_iter().next().unwrap_or_else(|| soul.clone()))
    }

    // ----- metrics and champions -----

    #[instrument(skip(self))]
    pub async fn record_metric(&self, soul: &SoulId, metric_type: &str, value: f64) -> Result<Metric> {
        if !value.is_finite() {
            return Err(Error::Validation(format!(
                "metric {} must be finite, got {}",
                metric_type, value
            )));
        }

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        if !soul_exists(&mut *tx, soul).await? {
            return Err(Error::UnknownSoul(soul.to_string()));
        }

        let measured_at = now_millis();
        let result = sqlx::query(
            "INSERT INTO metrics (soul, metric_type, value, measured_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(soul.as_str())
        .bind(metric_type)
        .bind(value)
        .bind(measured_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to store metric"))?;

        tx.commit().await.map_err(db_error("Failed to commit metric"))?;
        debug!("recorded metric");

        self.recompute_champion(soul).await?;

        Ok(Metric {
            id: result.last_insert_rowid(),
            soul: soul.clone(),
            metric_type: metric_type.to_string(),
            value,
            measured_at: from_millis(measured_at),
        })
    }

    /// Every metric recorded for `soul`, oldest first.
    pub async fn metrics_for(&self, soul: &SoulId) -> Result<Vec<Metric>> {
        let rows = sqlx::query("SELECT * FROM metrics WHERE soul = ?1 ORDER BY id")
            .bind(soul.as_str())
            .fetch_all(self.db.pool())
            .await
            .map_err(db_error("Failed to get metrics"))?;

        rows.iter()
            .map(|row| {
                Ok(Metric {
                    id: row.get("id"),
                    soul: SoulId::parse(row.get("soul"))?,
                    metric_type: row.get("metric_type"),
                    value: row.get("value"),
                    measured_at: from_millis(row.get("measured_at")),
                })
            })
            .collect()
    }

    /// Latest value per metric type.
    async fn latest_metrics(&self, soul: &SoulId) -> Result<BTreeMap<String, f64>> {
        Ok(self
            .metrics_for(soul)
            .await?
            .into_iter()
            .map(|m| (m.metric_type, m.value))
            .collect())
    }

    /// Write a champion row, replacing the previous one for its group.
    pub async fn insert_champion(&self, champion: &Champion) -> Result<()> {
        let objectives = serde_json::to_string(&champion.objectives)?;
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        for soul in [&champion.canonical, &champion.soul] {
            if !soul_exists(&mut *tx, soul).await? {
                return Err(Error::UnknownSoul(soul.to_string()));
            }
        }

        upsert_champion(&mut *tx, champion, &objectives).await?;
        tx.commit().await.map_err(db_error("Failed to commit champion"))?;
        Ok(())
    }

    /// Re-score every gene in the group of `soul` and store the winner.
    ///
    /// At most one recomputation per group runs at a time, and none runs
    /// while an equivalence edge is being recorded.
    #[instrument(skip(self))]
    pub async fn recompute_champion(&self, soul: &SoulId) -> Result<Option<Champion>> {
        let _shared = self.merge_lock.read().await;
        self.recompute_locked(soul).await
    }

    /// Recompute under the group lock. The caller holds `merge_lock`.
    async fn recompute_locked(&self, soul: &SoulId) -> Result<Option<Champion>> {
        let key = self.group_key(soul).await?;
        let lock = self
            .group_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let guard = lock.lock().await;
        let result = self.score_group(soul, key.clone()).await;
        drop(guard);
        drop(lock);

        // Only the map holds the lock once no other task is waiting on it
        self.group_locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn score_group(&self, soul: &SoulId, key: SoulId) -> Result<Option<Champion>> {
        let class = self.equivalence_class(soul, self.config.min_confidence).await?;
        let canonical = class.iter().next().cloned().unwrap_or(key);

        let mut candidates = Vec::new();
        for member in &class {
            let metrics = self.latest_metrics(member).await?;
            for gene in self.genes_by_soul(member).await? {
                candidates.push(candidate_for(&gene, &metrics));
            }
        }

        let Some(best) = select_champion(&candidates, &self.config.objectives) else {
            return Ok(None);
        };

        let champion = Champion {
            canonical: canonical.clone(),
            soul: best.soul,
            source: best.source,
            score: best.score,
            objectives: best.objectives,
            created_at: from_millis(now_millis()),
        };
        let objectives = serde_json::to_string(&champion.objectives)?;

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        // Rows keyed by other members are left over from groups that merged
        for member in class.iter().filter(|m| **m != canonical) {
            sqlx::query("DELETE FROM champions WHERE canonical = ?1")
                .bind(member.as_str())
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to remove stale champion"))?;
        }
        upsert_champion(&mut *tx, &champion, &objectives).await?;
        tx.commit().await.map_err(db_error("Failed to commit champion"))?;

        debug!(
            group = %champion.canonical,
            champion = %champion.soul,
            score = champion.score,
            candidates = candidates.len(),
            "champion recomputed"
        );
        Ok(Some(champion))
    }

    /// Current champion of the group containing `soul`.
    pub async fn champion_for(&self, soul: &SoulId) -> Result<Option<Champion>> {
        let key = self.group_key(soul).await?;
        let row = sqlx::query("SELECT * FROM champions WHERE canonical = ?1")
            .bind(key.as_str())
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_error("Failed to get champion"))?;

        row.as_ref().map(champion_from_row).transpose()
    }

    // ----- organisms and attestations -----

    /// Bundle registered souls under `name` and store the manifest in the CAS.
    #[instrument(skip(self, souls, targets), fields(souls = souls.len()))]
    pub async fn forge_organism(
        &self,
        name: &str,
        souls: &[SoulId],
        targets: &[String],
    ) -> Result<Organism> {
        if name.trim().is_empty() {
            return Err(Error::Validation("organism name must not be empty".to_string()));
        }

        let soulset: BTreeSet<SoulId> = souls.iter().cloned().collect();
        let mut genes = BTreeMap::new();
        for soul in &soulset {
            let cids: Vec<Cid> = self
                .genes_by_soul(soul)
                .await?
                .into_iter()
                .map(|g| g.cid)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            if cids.is_empty() {
                return Err(Error::UnknownSoul(soul.to_string()));
            }
            genes.insert(soul.clone(), cids);
        }

        let manifest = OrganismManifest {
            name: name.to_string(),
            targets: targets.to_vec(),
            genes,
        };
        let manifest_bytes = serde_json::to_vec(&manifest)?;
        let manifest_cid = self
            .cas
            .put(&manifest_bytes, ObjectKind::Organism, Some(name))
            .await?;

        let created_at = now_millis();
        sqlx::query(
            r#"
            INSERT INTO organisms (name, soulset, manifest, targets, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(name) DO UPDATE SET
                soulset = ?2,
                manifest = ?3,
                targets = ?4,
                created_at = ?5
            "#,
        )
        .bind(name)
        .bind(serde_json::to_string(&soulset)?)
        .bind(manifest_cid.as_str())
        .bind(serde_json::to_string(targets)?)
        .bind(created_at)
        .execute(self.db.pool())
        .await
        .map_err(db_error("Failed to store organism"))?;

        info!(manifest = %manifest_cid, "forged organism");
        Ok(Organism {
            name: name.to_string(),
            soulset,
            manifest: manifest_cid,
            targets: targets.to_vec(),
            created_at: from_millis(created_at),
        })
    }

    pub async fn organism(&self, name: &str) -> Result<Option<Organism>> {
        let row = sqlx::query("SELECT * FROM organisms WHERE name = ?1")
            .bind(name)
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_error("Failed to get organism"))?;

        match row {
            Some(row) => {
                let soulset: String = row.get("soulset");
                let targets: String = row.get("targets");
                Ok(Some(Organism {
                    name: row.get("name"),
                    soulset: serde_json::from_str(&soulset)?,
                    manifest: Cid::parse(row.get("manifest"))?,
                    targets: serde_json::from_str(&targets)?,
                    created_at: from_millis(row.get("created_at")),
                }))
            }
            None => Ok(None),
        }
    }

    /// Record a signed claim about an organism.
    pub async fn insert_attestation(
        &self,
        organism: &str,
        cid: &Cid,
        signature: &str,
    ) -> Result<Attestation> {
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let known = sqlx::query("SELECT 1 FROM organisms WHERE name = ?1")
            .bind(organism)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("Failed to look up organism"))?;
        if known.is_none() {
            return Err(Error::UnknownOrganism(organism.to_string()));
        }
        if !object_exists(&mut *tx, cid).await? {
            return Err(Error::UnknownObject(cid.to_string()));
        }

        let id = AttestationId::new();
        let created_at = now_millis();
        sqlx::query(
            "INSERT INTO attestations (id, organism, cid, signature, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(id.to_string())
        .bind(organism)
        .bind(cid.as_str())
        .bind(signature)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to store attestation"))?;

        tx.commit().await.map_err(db_error("Failed to commit attestation"))?;

        Ok(Attestation {
            id,
            organism: organism.to_string(),
            cid: cid.clone(),
            signature: signature.to_string(),
            created_at: from_millis(created_at),
        })
    }

    /// Store a statement over the organism's manifest as a proof object and
    /// attest to it with `signature`.
    #[instrument(skip(self, signature))]
    pub async fn attest_organism(&self, name: &str, signature: &str) -> Result<Attestation> {
        let organism = self
            .organism(name)
            .await?
            .ok_or_else(|| Error::UnknownOrganism(name.to_string()))?;

        let statement = AttestationStatement {
            organism: organism.name.clone(),
            manifest: organism.manifest.clone(),
            soulset: organism.soulset.clone(),
            issued_at: from_millis(now_millis()),
        };
        let bytes = serde_json::to_vec(&statement)?;
        let proof = self.cas.put(&bytes, ObjectKind::Proof, Some(name)).await?;

        let attestation = self.insert_attestation(name, &proof, signature).await?;
        info!(proof = %proof, id = %attestation.id, "attested organism");
        Ok(attestation)
    }

    pub async fn attestations_for(&self, organism: &str) -> Result<Vec<Attestation>> {
        let rows = sqlx::query("SELECT * FROM attestations WHERE organism = ?1 ORDER BY created_at")
            .bind(organism)
            .fetch_all(self.db.pool())
            .await
            .map_err(db_error("Failed to get attestations"))?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let id = uuid::Uuid::parse_str(&id)
                    .map_err(|e| Error::Database(format!("Invalid attestation ID: {}", e)))?;
                Ok(Attestation {
                    id: AttestationId(id),
                    organism: row.get("organism"),
                    cid: Cid::parse(row.get("cid"))?,
                    signature: row.get("signature"),
                    created_at: from_millis(row.get("created_at")),
                })
            })
            .collect()
    }

    // ----- status -----

    pub async fn status(&self) -> Result<RegistryStatus> {
        let row = sqlx::query("SELECT COUNT(DISTINCT soul) AS souls FROM genes")
            .fetch_one(self.db.pool())
            .await
            .map_err(db_error("Failed to count souls"))?;
        let unique_souls: i64 = row.get("souls");

        Ok(RegistryStatus {
            objects: self.db.count("objects").await?,
            stored_bytes: self.cas.stored_bytes().await?,
            genes: self.db.count("genes").await?,
            unique_souls: unique_souls as usize,
            equivalences: self.db.count("equivalences").await?,
            champions: self.db.count("champions").await?,
            organisms: self.db.count("organisms").await?,
            attestations: self.db.count("attestations").await?,
            metrics: self.db.count("metrics").await?,
        })
    }
}

fn candidate_for(gene: &Gene, metrics: &BTreeMap<String, f64>) -> Candidate {
    let mut candidate = Candidate::new(gene.soul.clone(), gene.source.clone());
    candidate.values = metrics.clone();
    for attribute in ATTRIBUTE_METRICS {
        if candidate.values.contains_key(attribute) {
            continue;
        }
        let value = match attribute {
            "size" => gene.size as f64,
            "complexity" => gene.complexity,
            _ => gene.purity,
        };
        candidate.values.insert(attribute.to_string(), value);
    }
    candidate
}

async fn soul_exists<'e, E>(executor: E, soul: &SoulId) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT 1 FROM genes WHERE soul = ?1 LIMIT 1")
        .bind(soul.as_str())
        .fetch_optional(executor)
        .await
        .map_err(db_error("Failed to look up soul"))?;
    Ok(row.is_some())
}

async fn object_exists<'e, E>(executor: E, cid: &Cid) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT 1 FROM objects WHERE cid = ?1")
        .bind(cid.as_str())
        .fetch_optional(executor)
        .await
        .map_err(db_error("Failed to look up object"))?;
    Ok(row.is_some())
}

async fn upsert_champion<'e, E>(executor: E, champion: &Champion, objectives: &str) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO champions (canonical, soul, source, score, objectives, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(canonical) DO UPDATE SET
            soul = ?2,
            source = ?3,
            score = ?4,
            objectives = ?5,
            created_at = ?6
        "#,
    )
    .bind(champion.canonical.as_str())
    .bind(champion.soul.as_str())
    .bind(&champion.source)
    .bind(champion.score)
    .bind(objectives)
    .bind(champion.created_at.timestamp_millis())
    .execute(executor)
    .await
    .map_err(db_error("Failed to store champion"))?;
    Ok(())
}

fn gene_from_row(row: &SqliteRow) -> Result<Gene> {
    let size: i64 = row.get("size");
    Ok(Gene {
        soul: SoulId::parse(row.get("soul"))?,
        source: row.get("source"),
        cid: Cid::parse(row.get("cid"))?,
        ir: row.get("ir"),
        complexity: row.get("complexity"),
        purity: row.get("purity"),
        size: size as usize,
        created_at: from_millis(row.get("created_at")),
    })
}

fn equivalence_from_row(row: &SqliteRow) -> Result<Equivalence> {
    Ok(Equivalence {
        id: row.get("id"),
        soul1: SoulId::parse(row.get("soul1"))?,
        soul2: SoulId::parse(row.get("soul2"))?,
        confidence: row.get("confidence"),
        created_at: from_millis(row.get("created_at")),
    })
}

fn champion_from_row(row: &SqliteRow) -> Result<Champion> {
    let objectives: String = row.get("objectives");
    Ok(Champion {
        canonical: SoulId::parse(row.get("canonical"))?,
        soul: SoulId::parse(row.get("soul"))?,
        source: row.get("source"),
        score: row.get("score"),
        objectives: serde_json::from_str(&objectives)?,
        created_at: from_millis(row.get("created_at")),
    })
}
