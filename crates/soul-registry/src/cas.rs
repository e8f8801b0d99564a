//! Content-addressed object store.

use crate::database::{db_error, from_millis, now_millis, Database};
use crate::model::{Object, ObjectKind};
use soul_core::{Cid, Error, Result};
use sqlx::Row;
use tracing::{debug, error, instrument};

/// Stores immutable byte blobs under the SHA-256 of their content.
#[derive(Clone)]
pub struct ContentStore {
    db: Database,
}

impl ContentStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store `bytes` and return their CID.
    ///
    /// Idempotent: identical bytes always map to the same CID and only the
    /// first write is kept, including when writers race.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn put(&self, bytes: &[u8], kind: ObjectKind, source: Option<&str>) -> Result<Cid> {
        let cid = Cid::of(bytes);

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO objects (cid, kind, source, size, data, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(cid.as_str())
        .bind(kind.as_str())
        .bind(source)
        .bind(bytes.len() as i64)
        .bind(bytes)
        .bind(now_millis())
        .execute(self.db.pool())
        .await
        .map_err(db_error("Failed to store object"))?;

        if result.rows_affected() == 0 {
            debug!(%cid, "object already present");
        } else {
            debug!(%cid, %kind, "stored object");
        }
        Ok(cid)
    }

    /// Fetch the bytes behind `cid`, verifying them against the identifier.
    pub async fn get(&self, cid: &Cid) -> Result<Vec<u8>> {
        let row = sqlx::query("SELECT data FROM objects WHERE cid = ?1")
            .bind(cid.as_str())
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_error("Failed to get object"))?;

        let row = row.ok_or_else(|| Error::NotFound(format!("object {}", cid)))?;
        let data: Vec<u8> = row.get("data");

        if let Err(e) = cid.verify(&data) {
            error!(%cid, "stored object does not match its content id");
            return Err(e);
        }
        Ok(data)
    }

    pub async fn contains(&self, cid: &Cid) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM objects WHERE cid = ?1")
            .bind(cid.as_str())
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_error("Failed to look up object"))?;
        Ok(row.is_some())
    }

    /// Metadata of a stored object, without its bytes.
    pub async fn object(&self, cid: &Cid) -> Result<Option<Object>> {
        let row = sqlx::query("SELECT cid, kind, source, size, created_at FROM objects WHERE cid = ?1")
            .bind(cid.as_str())
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_error("Failed to get object metadata"))?;

        match row {
            Some(row) => {
                let kind: String = row.get("kind");
                let size: i64 = row.get("size");
                Ok(Some(Object {
                    cid: Cid::parse(row.get("cid"))?,
                    kind: kind.parse()?,
                    source: row.get("source"),
                    size: size as usize,
                    created_at: from_millis(row.get("created_at")),
                }))
            }
            None => Ok(None),
        }
    }

    /// Total size of every stored object.
    pub async fn stored_bytes(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COALESCE(SUM(size), 0) AS total FROM objects")
            .fetch_one(self.db.pool())
            .await
            .map_err(db_error("Failed to sum object sizes"))?;
        let total: i64 = row.get("total");
        Ok(total as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MEMORY_PATH;

    async fn create_test_store() -> (Database, ContentStore) {
        let db = Database::new(MEMORY_PATH).await.unwrap();
        db.migrate().await.unwrap();
        (db.clone(), ContentStore::new(db))
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (_, store) = create_test_store().await;
        let cid = store.put(b"hello", ObjectKind::Source, Some("test")).await.unwrap();
        assert_eq!(cid, Cid::of(b"hello"));
        assert_eq!(store.get(&cid).await.unwrap(), b"hello".to_vec());
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let (db, store) = create_test_store().await;
        let a = store.put(b"same", ObjectKind::Ir, None).await.unwrap();
        let b = store.put(b"same", ObjectKind::Ir, None).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(db.count("objects").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (_, store) = create_test_store().await;
        let err = store.get(&Cid::of(b"absent")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_detects_corruption() {
        let (db, store) = create_test_store().await;
        let cid = store.put(b"original", ObjectKind::Source, None).await.unwrap();

        sqlx::query("UPDATE objects SET data = ?1 WHERE cid = ?2")
            .bind(b"tampered".as_slice())
            .bind(cid.as_str())
            .execute(db.pool())
            .await
            .unwrap();

        let err = store.get(&cid).await.unwrap_err();
        assert!(matches!(err, Error::Integrity { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_object_metadata() {
        let (_, store) = create_test_store().await;
        let cid = store.put(b"meta", ObjectKind::Proof, Some("signer")).await.unwrap();

        let object = store.object(&cid).await.unwrap().unwrap();
        assert_eq!(object.kind, ObjectKind::Proof);
        assert_eq!(object.source.as_deref(), Some("signer"));
        assert_eq!(object.size, 4);
        assert!(store.contains(&cid).await.unwrap());
        assert_eq!(store.stored_bytes().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_puts_of_same_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cas.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        db.migrate().await.unwrap();
        let store = ContentStore::new(db.clone());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.put(b"raced", ObjectKind::Gene, None).await
            }));
        }

        let mut cids = Vec::new();
        for handle in handles {
            cids.push(handle.await.unwrap().unwrap());
        }
        assert!(cids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(db.count("objects").await.unwrap(), 1);
    }
}
