use super::schema::{fields_from_values, CatalogSchema};
use super::CatalogStore;
use crate::domain::{EquipmentFields, EquipmentRecord, ItemCode, SearchCriteria};
use crate::error::{CatalogError, Result};
use crate::observability;
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinError;
use tracing::{debug, error, info};

/// SQLite-backed catalog. Every operation opens its own connection on the
/// blocking pool and drops it before returning.
pub struct SqliteCatalog {
    path: PathBuf,
    schema: Arc<CatalogSchema>,
    timeout: Duration,
}

impl SqliteCatalog {
    /// Open the catalog at `path`, creating the parent directory and table if needed
    pub fn open<P: AsRef<Path>>(path: P, schema: CatalogSchema, timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let catalog = Self {
            path,
            schema: Arc::new(schema),
            timeout,
        };
        catalog.migrate()?;
        Ok(catalog)
    }

    pub fn schema(&self) -> &CatalogSchema {
        &self.schema
    }

    /// Apply the table migration for the configured schema
    pub fn migrate(&self) -> Result<()> {
        let conn = connect(&self.path, self.timeout)?;
        conn.execute_batch(self.schema.migration)?;
        info!(
            "Catalog schema '{}' ready at {}",
            self.schema.kind,
            self.path.display()
        );
        Ok(())
    }

    /// Run a read on the blocking pool. The caller stops waiting after the
    /// timeout; an abandoned read has no effect.
    async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &CatalogSchema) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        let schema = self.schema.clone();
        let timeout = self.timeout;
        let task = tokio::task::spawn_blocking(move || {
            let mut conn = connect(&path, timeout)?;
            f(&mut conn, &schema)
        });

        let result = match tokio::time::timeout(timeout, task).await {
            Ok(joined) => flatten(op, joined),
            Err(_) => Err(CatalogError::connectivity(format!(
                "{op} timed out after {}ms",
                timeout.as_millis()
            ))),
        };
        record_failure(op, result)
    }

    /// Run a write on the blocking pool and wait for it to finish. The
    /// deadline is enforced inside the task by `commit_before`, so a write
    /// reported as failed has not been committed.
    async fn run_write<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &CatalogSchema, Instant) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        let schema = self.schema.clone();
        let timeout = self.timeout;
        let deadline = Instant::now() + timeout;
        let task = tokio::task::spawn_blocking(move || {
            let mut conn = connect(&path, timeout)?;
            f(&mut conn, &schema, deadline)
        });

        record_failure(op, flatten(op, task.await))
    }
}

fn flatten<T>(op: &str, joined: std::result::Result<Result<T>, JoinError>) -> Result<T> {
    joined.unwrap_or_else(|join_err| {
        Err(CatalogError::connectivity(format!(
            "{op} task failed: {join_err}"
        )))
    })
}

fn record_failure<T>(op: &'static str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        error!(op, "Catalog operation failed: {}", e);
        observability::store_error(op);
    }
    result
}

/// Commit `tx` unless `deadline` has passed; dropping it rolls back.
fn commit_before(tx: Transaction<'_>, deadline: Instant, op: &str) -> Result<()> {
    if Instant::now() >= deadline {
        return Err(CatalogError::connectivity(format!(
            "{op} timed out before commit; rolled back"
        )));
    }
    tx.commit()?;
    Ok(())
}

fn connect(path: &Path, timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path).map_err(|e| {
        CatalogError::connectivity(format!("cannot open catalog at {}: {e}", path.display()))
    })?;
    conn.busy_timeout(timeout)?;
    Ok(conn)
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<EquipmentRecord> {
    let code: i64 = row.get(0)?;
    let mut values: [String; 10] = Default::default();
    for (i, value) in values.iter_mut().enumerate() {
        *value = row.get(i + 1)?;
    }
    Ok(EquipmentRecord::new(ItemCode(code), fields_from_values(values)))
}

fn query_records(conn: &Connection, sql: &str, params: Vec<Value>) -> Result<Vec<EquipmentRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(params), read_record)?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

fn select_prefix(schema: &CatalogSchema) -> String {
    format!(
        "SELECT {} FROM {} WHERE {}",
        schema.select_list(),
        schema.table,
        schema.base_predicate()
    )
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn fetch_all(&self) -> Result<Vec<EquipmentRecord>> {
        self.run("fetch_all", |conn, schema| {
            let sql = format!("{} ORDER BY {}", select_prefix(schema), schema.code);
            let records = query_records(conn, &sql, Vec::new())?;
            debug!("Fetched {} catalog records", records.len());
            Ok(records)
        })
        .await
    }

    async fn fetch_by_code(&self, code: ItemCode) -> Result<Option<EquipmentRecord>> {
        self.run("fetch_by_code", move |conn, schema| {
            let sql = format!("{} AND {} = ?", select_prefix(schema), schema.code);
            let records = query_records(conn, &sql, vec![Value::Integer(code.value())])?;
            Ok(records.into_iter().next())
        })
        .await
    }

    async fn fetch_by_codes(&self, codes: &[ItemCode]) -> Result<Vec<EquipmentRecord>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let mut codes = codes.to_vec();
        codes.sort();
        codes.dedup();

        self.run("fetch_by_codes", move |conn, schema| {
            let placeholders = vec!["?"; codes.len()].join(", ");
            let sql = format!(
                "{} AND {} IN ({}) ORDER BY {}",
                select_prefix(schema),
                schema.code,
                placeholders,
                schema.code
            );
            let params = codes.iter().map(|c| Value::Integer(c.value())).collect();
            query_records(conn, &sql, params)
        })
        .await
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<EquipmentRecord>> {
        let criteria = criteria.clone();

        self.run("search", move |conn, schema| {
            let mut sql = select_prefix(schema);
            let mut params = Vec::new();
            if let Some(category) = criteria.category() {
                sql.push_str(&format!(" AND {} = ?", schema.category));
                params.push(Value::Text(category.to_string()));
            }
            sql.push_str(&format!(" ORDER BY {}", schema.code));

            // SQLite's lower() folds ASCII only, so the term is matched here
            let records: Vec<EquipmentRecord> = query_records(conn, &sql, params)?
                .into_iter()
                .filter(|r| criteria.matches(r))
                .collect();
            debug!("Search matched {} catalog records", records.len());
            Ok(records)
        })
        .await
    }

    async fn insert(&self, fields: &EquipmentFields) -> Result<ItemCode> {
        let fields = fields.clone();

        self.run_write("insert", move |conn, schema, deadline| {
            // IMMEDIATE takes the write lock before reading MAX, so concurrent
            // writers serialize instead of computing the same next code.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let max: Option<i64> = tx.query_row(
                &format!("SELECT MAX({}) FROM {}", schema.code, schema.table),
                [],
                |row| row.get(0),
            )?;
            let code = ItemCode::next_after(max.map(ItemCode))?;

            let mut columns = vec![schema.code];
            let mut values = vec![Value::Integer(code.value())];
            for (column, value) in schema.writable(&fields) {
                columns.push(column);
                values.push(Value::Text(value.to_string()));
            }
            for &(column, value) in schema.insert_defaults {
                columns.push(column);
                values.push(Value::Text(value.to_string()));
            }

            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                schema.table,
                columns.join(", "),
                vec!["?"; columns.len()].join(", ")
            );
            tx.execute(&sql, params_from_iter(values))?;
            commit_before(tx, deadline, "insert")?;

            info!("Inserted catalog item {}", code);
            Ok(code)
        })
        .await
    }

    async fn update(&self, code: ItemCode, fields: &EquipmentFields) -> Result<bool> {
        let fields = fields.clone();

        self.run_write("update", move |conn, schema, deadline| {
            let writable = schema.writable(&fields);
            let assignments: Vec<String> =
                writable.iter().map(|(c, _)| format!("{c} = ?")).collect();
            let mut values: Vec<Value> = writable
                .iter()
                .map(|(_, v)| Value::Text(v.to_string()))
                .collect();
            values.push(Value::Integer(code.value()));

            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ? AND {}",
                schema.table,
                assignments.join(", "),
                schema.code,
                schema.base_predicate()
            );
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let changed = tx.execute(&sql, params_from_iter(values))?;
            commit_before(tx, deadline, "update")?;

            if changed > 0 {
                info!("Updated catalog item {}", code);
            } else {
                debug!("Update matched no catalog item {}", code);
            }
            Ok(changed > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fields(description: &str, make: &str, category: &str) -> EquipmentFields {
        EquipmentFields {
            category: category.to_string(),
            category_description: description.to_string(),
            make: make.to_string(),
            price: "10.00".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn search_treats_like_wildcards_literally() {
        let dir = tempdir().unwrap();
        let catalog = SqliteCatalog::open(
            dir.path().join("catalog.db"),
            CatalogSchema::equipment(),
            Duration::from_secs(5),
        )
        .unwrap();
        catalog.insert(&fields("100% cotton sling", "Acme", "Lifting")).await.unwrap();
        catalog.insert(&fields("Chain block", "Yale", "Lifting")).await.unwrap();

        let hits = catalog
            .search(&SearchCriteria::new(Some("0%"), None))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].fields.category_description, "100% cotton sling");
    }

    #[tokio::test]
    async fn missing_database_directory_is_a_connectivity_fault() {
        let dir = tempdir().unwrap();
        let catalog = SqliteCatalog::open(
            dir.path().join("nested").join("catalog.db"),
            CatalogSchema::equipment(),
            Duration::from_secs(5),
        )
        .unwrap();
        std::fs::remove_dir_all(dir.path().join("nested")).unwrap();

        let err = catalog.fetch_all().await.unwrap_err();
        assert!(err.is_connectivity());
    }

    #[tokio::test]
    async fn stock_schema_hides_inactive_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stock.db");
        let catalog =
            SqliteCatalog::open(&path, CatalogSchema::stock(), Duration::from_secs(5)).unwrap();

        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "INSERT INTO products (ID, product, quantity, category, active) VALUES
                (1, 'Hammer', 4, 'Tools', 1),
                (2, 'Old drill', 0, 'Tools', 0);",
        )
        .unwrap();
        drop(conn);

        let all = catalog.fetch_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].fields.category_description, "Hammer");
        assert_eq!(all[0].fields.make, "");
        assert_eq!(all[0].fields.quantity, "4");

        // Inactive rows still reserve their code
        let code = catalog.insert(&fields("Saw", "ignored", "Tools")).await.unwrap();
        assert_eq!(code, ItemCode(3));
        assert!(!catalog.update(ItemCode(2), &fields("Drill", "", "Tools")).await.unwrap());
    }

    #[tokio::test]
    async fn stock_schema_writes_quantity() {
        let dir = tempdir().unwrap();
        let catalog = SqliteCatalog::open(
            dir.path().join("stock.db"),
            CatalogSchema::stock(),
            Duration::from_secs(5),
        )
        .unwrap();

        let mut saw = fields("Saw", "", "Tools");
        saw.quantity = "7".to_string();
        let code = catalog.insert(&saw).await.unwrap();
        saw.quantity = "5".to_string();
        assert!(catalog.update(code, &saw).await.unwrap());

        let stored = catalog.fetch_by_code(code).await.unwrap().unwrap();
        assert_eq!(stored.fields.quantity, "5");
    }

    #[tokio::test]
    async fn search_folds_non_ascii_case() {
        let dir = tempdir().unwrap();
        let catalog = SqliteCatalog::open(
            dir.path().join("catalog.db"),
            CatalogSchema::equipment(),
            Duration::from_secs(5),
        )
        .unwrap();
        catalog.insert(&fields("ÉCHELLE télescopique", "Hailo", "Access")).await.unwrap();
        catalog.insert(&fields("Step stool", "Hailo", "Access")).await.unwrap();

        let hits = catalog
            .search(&SearchCriteria::new(Some("échelle"), Some("Access")))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].code, ItemCode(1));
    }

    #[tokio::test]
    async fn insert_after_largest_code_fails_cleanly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        let catalog =
            SqliteCatalog::open(&path, CatalogSchema::equipment(), Duration::from_secs(5)).unwrap();

        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "INSERT INTO equipment_inventory (Item_Code, Category, Category_Description)
             VALUES (?, 'Tools', 'Last')",
            [i64::MAX],
        )
        .unwrap();
        drop(conn);

        let err = catalog.insert(&fields("Overflow", "", "Tools")).await.unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        assert_eq!(catalog.fetch_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_write_is_never_committed() {
        for hold_ms in [80u64, 90, 95, 100, 105, 300] {
            let dir = tempdir().unwrap();
            let path = dir.path().join("catalog.db");
            let catalog = SqliteCatalog::open(
                &path,
                CatalogSchema::equipment(),
                Duration::from_millis(100),
            )
            .unwrap();

            // Another writer holds the database lock for `hold_ms`
            let (locked_tx, locked_rx) = std::sync::mpsc::channel();
            let holder_path = path.clone();
            let holder = std::thread::spawn(move || {
                let mut conn = Connection::open(holder_path).unwrap();
                let tx = conn
                    .transaction_with_behavior(TransactionBehavior::Immediate)
                    .unwrap();
                locked_tx.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(hold_ms));
                tx.commit().unwrap();
            });
            locked_rx.recv().unwrap();

            let inserted = catalog.insert(&fields("Sling", "Acme", "Lifting")).await;
            holder.join().unwrap();

            let rows = catalog.fetch_all().await.unwrap().len();
            assert_eq!(inserted.is_ok(), rows == 1, "lock held {hold_ms}ms");
            if hold_ms >= 300 {
                assert!(inserted.is_err());
            }
        }
    }
}
