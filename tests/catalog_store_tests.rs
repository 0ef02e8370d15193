use anyhow::Result;
use inventory_desk::domain::{EquipmentFields, ItemCode, SearchCriteria};
use inventory_desk::storage::{CatalogSchema, CatalogStore, InMemoryCatalog, SqliteCatalog};
use std::time::Duration;
use tempfile::tempdir;

fn fields(category: &str, description: &str, make: &str) -> EquipmentFields {
    EquipmentFields {
        category: category.to_string(),
        category_description: description.to_string(),
        make: make.to_string(),
        price: "10".to_string(),
        ..Default::default()
    }
}

fn codes(records: &[inventory_desk::domain::EquipmentRecord]) -> Vec<i64> {
    records.iter().map(|r| r.code.value()).collect()
}

/// Behaviour every catalog store must share
async fn exercise_store(store: &dyn CatalogStore) -> Result<()> {
    assert!(store.fetch_all().await?.is_empty());

    let drill = store.insert(&fields("Tools", "Cordless drill", "Makita")).await?;
    let hat = store.insert(&fields("Safety", "Hard hat", "3M")).await?;
    let saw = store.insert(&fields("Tools", "Circular saw", "DeWalt")).await?;
    assert_eq!((drill, hat, saw), (ItemCode(1), ItemCode(2), ItemCode(3)));

    // Description or make, case-insensitive
    let found = store.search(&SearchCriteria::new(Some("DRILL"), None)).await?;
    assert_eq!(codes(&found), vec![1]);
    let found = store.search(&SearchCriteria::new(Some("3m"), None)).await?;
    assert_eq!(codes(&found), vec![2]);

    // Category narrows the term
    let found = store
        .search(&SearchCriteria::new(Some("a"), Some("Tools")))
        .await?;
    assert_eq!(codes(&found), vec![1, 3]);
    let found = store.search(&SearchCriteria::new(None, Some("Safety"))).await?;
    assert_eq!(codes(&found), vec![2]);

    let picked = store.fetch_by_codes(&[saw, ItemCode(99), drill]).await?;
    assert_eq!(codes(&picked), vec![1, 3]);

    assert!(store.update(hat, &fields("Safety", "Hi-vis vest", "3M")).await?);
    let updated = store.fetch_by_code(hat).await?.expect("record 2 exists");
    assert_eq!(updated.fields.category_description, "Hi-vis vest");
    assert_eq!(updated.code, hat);

    assert!(!store.update(ItemCode(42), &fields("Tools", "Ghost", "")).await?);
    assert!(store.fetch_by_code(ItemCode(42)).await?.is_none());
    assert_eq!(store.fetch_all().await?.len(), 3);

    // Case folding goes beyond ASCII
    let ladder = store.insert(&fields("Access", "ÉCHELLE télescopique", "Hailo")).await?;
    let found = store.search(&SearchCriteria::new(Some("échelle"), None)).await?;
    assert_eq!(codes(&found), vec![ladder.value()]);

    // Terms are not trimmed: " drill" is not part of "Drill press"
    store.insert(&fields("Tools", "Drill press", "Axminster")).await?;
    let found = store.search(&SearchCriteria::new(Some(" drill"), None)).await?;
    assert_eq!(codes(&found), vec![1]);
    let found = store.search(&SearchCriteria::new(Some("drill"), None)).await?;
    assert_eq!(codes(&found), vec![1, 5]);

    Ok(())
}

#[tokio::test]
async fn in_memory_store_contract() -> Result<()> {
    exercise_store(&InMemoryCatalog::new()).await
}

#[tokio::test]
async fn sqlite_store_contract() -> Result<()> {
    let dir = tempdir()?;
    let store = SqliteCatalog::open(
        dir.path().join("inventory.db"),
        CatalogSchema::equipment(),
        Duration::from_secs(5),
    )?;
    exercise_store(&store).await
}

#[tokio::test]
async fn sqlite_store_reopens_existing_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("inventory.db");

    let first = SqliteCatalog::open(&path, CatalogSchema::equipment(), Duration::from_secs(5))?;
    first.insert(&fields("Tools", "Spirit level", "Stabila")).await?;
    drop(first);

    let second = SqliteCatalog::open(&path, CatalogSchema::equipment(), Duration::from_secs(5))?;
    let all = second.fetch_all().await?;
    assert_eq!(codes(&all), vec![1]);
    assert_eq!(second.insert(&fields("Tools", "Tape", "")).await?, ItemCode(2));
    Ok(())
}

#[tokio::test]
async fn concurrent_inserts_get_distinct_codes() -> Result<()> {
    let dir = tempdir()?;
    let store = std::sync::Arc::new(SqliteCatalog::open(
        dir.path().join("inventory.db"),
        CatalogSchema::equipment(),
        Duration::from_secs(10),
    )?);

    let mut tasks = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store
                .insert(&fields("Tools", &format!("Item {i}"), ""))
                .await
        }));
    }

    let mut assigned = Vec::new();
    for task in tasks {
        assigned.push(task.await??.value());
    }
    assigned.sort_unstable();
    assert_eq!(assigned, (1..=8).collect::<Vec<_>>());
    Ok(())
}
