use proptest::prelude::*;
use soul_core::Cid;
use soul_registry::database::MEMORY_PATH;
use soul_registry::{ContentStore, Database, ObjectKind};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn create_store() -> (Database, ContentStore) {
    let db = Database::new(MEMORY_PATH).await.unwrap();
    db.migrate().await.unwrap();
    (db.clone(), ContentStore::new(db))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn get_returns_what_was_put(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        runtime().block_on(async {
            let (_, store) = create_store().await;
            let cid = store.put(&bytes, ObjectKind::Source, None).await.unwrap();
            assert_eq!(cid, Cid::of(&bytes));
            assert_eq!(store.get(&cid).await.unwrap(), bytes);
        });
    }

    #[test]
    fn equal_content_has_one_object(
        bytes in proptest::collection::vec(any::<u8>(), 1..256),
        other in proptest::collection::vec(any::<u8>(), 1..256),
    ) {
        runtime().block_on(async {
            let (db, store) = create_store().await;
            let first = store.put(&bytes, ObjectKind::Gene, Some("a")).await.unwrap();
            let second = store.put(&bytes, ObjectKind::Gene, Some("b")).await.unwrap();
            assert_eq!(first, second);

            let third = store.put(&other, ObjectKind::Gene, None).await.unwrap();
            let expected = if other == bytes { 1 } else { 2 };
            assert_eq!(third == first, other == bytes);
            assert_eq!(db.count("objects").await.unwrap(), expected);
        });
    }
}

#[tokio::test]
async fn identical_bytes_from_two_sources_share_an_object() {
    let (db, store) = create_store().await;
    let bytes = br#"{"op":"map","f":"inc"}"#;

    let a = store.put(bytes, ObjectKind::Source, Some("a.js")).await.unwrap();
    let b = store.put(bytes, ObjectKind::Source, Some("b.py")).await.unwrap();

    assert_eq!(a, b);
    assert!(a.as_str().starts_with("sha256:"));
    assert_eq!(db.count("objects").await.unwrap(), 1);

    // First writer's metadata is kept
    let object = store.object(&a).await.unwrap().unwrap();
    assert_eq!(object.source.as_deref(), Some("a.js"));
}
