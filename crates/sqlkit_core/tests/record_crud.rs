mod common;

use common::{empty_db_file, open_with_logger};
use sqlkit_core::{
    Database, DatabaseError, DbResult, Params, Record, RecordRepository, SqliteRecordRepository,
    Value,
};

const SCHEMA: &str = "CREATE TABLE products (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    stock INTEGER,
    active INTEGER,
    discontinued_at TEXT
)";

fn products_db() -> (tempfile::TempDir, Database) {
    let (dir, path) = empty_db_file();
    let db = Database::new(&path);
    db.execute(SCHEMA, &Params::new()).unwrap();
    (dir, db)
}

fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(column, value)| (column.to_string(), value.clone()))
        .collect()
}

#[test]
fn create_then_find_roundtrip() {
    let (_dir, db) = products_db();
    let repo = SqliteRecordRepository::new(&db, "products");

    let data = record(&[
        ("name", Value::from("lamp")),
        ("stock", Value::from(12)),
        ("active", Value::from(true)),
        ("discontinued_at", Value::Null),
    ]);
    let id = repo.create(&data).unwrap();
    assert_eq!(id, 1);

    let row = repo.find(id).unwrap().unwrap();
    assert_eq!(row["id"], Value::Integer(id));
    assert_eq!(row["name"], Value::from("lamp"));
    assert_eq!(row["stock"], Value::Integer(12));
    assert_eq!(row["active"].as_bool(), Some(true));
    assert!(row["discontinued_at"].is_null());

    let by_stock = db
        .fetch_all(
            "SELECT id FROM products WHERE stock = ?1",
            &Params::positional([12]),
        )
        .unwrap();
    assert_eq!(by_stock.len(), 1);
}

#[test]
fn empty_writes_fail_before_reaching_the_engine() {
    let (_dir, path) = empty_db_file();
    let (db, logger) = open_with_logger(&path);
    let repo = SqliteRecordRepository::new(&db, "products");

    let create_err = repo.create(&Record::new()).unwrap_err();
    assert!(matches!(
        create_err,
        DatabaseError::EmptyData { ref table, .. } if table == "products"
    ));

    let update_err = repo.update(1, &Record::new()).unwrap_err();
    assert!(matches!(update_err, DatabaseError::EmptyData { .. }));

    let errors = logger.with_level("error");
    assert_eq!(errors.len(), 2);
    for (record, operation) in errors.iter().zip(["insert into", "update"]) {
        assert_eq!(record.message, "repo_write");
        assert_eq!(record.get("status"), Some("error"));
        assert_eq!(record.get("table"), Some("products"));
        assert_eq!(record.get("operation"), Some(operation));
    }
    assert_eq!(logger.records().len(), 2);
    assert!(!db.is_connected());
}

#[test]
fn find_missing_returns_none_and_find_or_fail_errors() {
    let (_dir, db) = products_db();
    let repo = SqliteRecordRepository::new(&db, "products");

    assert_eq!(repo.find(404).unwrap(), None);

    let err = repo.find_or_fail(404).unwrap_err();
    match &err {
        DatabaseError::NotFound { table, column, id } => {
            assert_eq!(table, "products");
            assert_eq!(column, "id");
            assert_eq!(id, "404");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("products"));
}

#[test]
fn find_or_fail_logs_the_missing_key() {
    let (_dir, path) = empty_db_file();
    let (db, logger) = open_with_logger(&path);
    db.execute(SCHEMA, &Params::new()).unwrap();
    logger.clear();
    let repo = SqliteRecordRepository::new(&db, "products");

    repo.find_or_fail(404).unwrap_err();

    let errors = logger.with_level("error");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "not_found");
    assert_eq!(errors[0].get("table"), Some("products"));
    assert_eq!(errors[0].get("column"), Some("id"));
    assert_eq!(errors[0].get("id"), Some("404"));
}

#[test]
fn find_or_fail_returns_existing_row() {
    let (_dir, db) = products_db();
    let repo = SqliteRecordRepository::new(&db, "products");
    let id = repo
        .create(&record(&[("name", Value::from("desk"))]))
        .unwrap();

    let row = repo.find_or_fail(id).unwrap();
    assert_eq!(row["name"], Value::from("desk"));
}

#[test]
fn all_returns_every_row() {
    let (_dir, db) = products_db();
    let repo = SqliteRecordRepository::new(&db, "products");
    assert!(repo.all().unwrap().is_empty());

    for name in ["a", "b", "c"] {
        repo.create(&record(&[("name", Value::from(name))])).unwrap();
    }

    let rows = repo.all().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(repo.count().unwrap(), 3);
}

#[test]
fn update_changes_only_the_keyed_row() {
    let (_dir, db) = products_db();
    let repo = SqliteRecordRepository::new(&db, "products");
    let first = repo
        .create(&record(&[("name", Value::from("a")), ("stock", Value::from(1))]))
        .unwrap();
    let second = repo
        .create(&record(&[("name", Value::from("b")), ("stock", Value::from(2))]))
        .unwrap();

    let changed = repo
        .update(first, &record(&[("stock", Value::from(99))]))
        .unwrap();
    assert_eq!(changed, 1);

    assert_eq!(repo.find(first).unwrap().unwrap()["stock"], Value::Integer(99));
    assert_eq!(repo.find(second).unwrap().unwrap()["stock"], Value::Integer(2));

    let missing = repo
        .update(404, &record(&[("stock", Value::from(1))]))
        .unwrap();
    assert_eq!(missing, 0);
}

#[test]
fn update_is_not_confused_by_columns_named_like_bindings() {
    let (_dir, path) = empty_db_file();
    let db = Database::new(&path);
    db.execute(
        "CREATE TABLE odd (id INTEGER PRIMARY KEY, pk TEXT, v0 TEXT, id_filter TEXT)",
        &Params::new(),
    )
    .unwrap();
    let repo = SqliteRecordRepository::new(&db, "odd");
    let first = repo.create(&record(&[("pk", Value::from("one"))])).unwrap();
    let second = repo.create(&record(&[("pk", Value::from("two"))])).unwrap();

    let changed = repo
        .update(
            first,
            &record(&[
                ("pk", Value::from(second)),
                ("v0", Value::from("x")),
                ("id_filter", Value::from("y")),
            ]),
        )
        .unwrap();
    assert_eq!(changed, 1);

    let untouched = repo.find(second).unwrap().unwrap();
    assert_eq!(untouched["pk"], Value::from("two"));
    assert!(untouched["v0"].is_null());

    let updated = repo.find(first).unwrap().unwrap();
    assert_eq!(updated["v0"], Value::from("x"));
}

#[test]
fn delete_returns_affected_rows_and_zero_for_missing() {
    let (_dir, db) = products_db();
    let repo = SqliteRecordRepository::new(&db, "products");
    let id = repo
        .create(&record(&[("name", Value::from("gone"))]))
        .unwrap();

    assert_eq!(repo.delete(id).unwrap(), 1);
    assert_eq!(repo.delete(id).unwrap(), 0);
    assert!(!repo.exists(id).unwrap());
    assert_eq!(repo.find(id).unwrap(), None);
}

#[test]
fn custom_primary_key_and_quoted_identifiers() {
    let (_dir, path) = empty_db_file();
    let db = Database::new(&path);
    db.execute(
        r#"CREATE TABLE "order items" ("item code" TEXT PRIMARY KEY, "qty""s" INTEGER)"#,
        &Params::new(),
    )
    .unwrap();
    let repo = SqliteRecordRepository::with_primary_key(&db, "order items", "item code");
    assert_eq!(repo.primary_key(), "item code");

    repo.create(&record(&[
        ("item code", Value::from("A-1")),
        ("qty\"s", Value::from(3)),
    ]))
    .unwrap();

    let row = repo.find("A-1").unwrap().unwrap();
    assert_eq!(row["qty\"s"], Value::Integer(3));
    assert!(repo.exists("A-1").unwrap());
    assert_eq!(
        repo.update("A-1", &record(&[("qty\"s", Value::from(4))]))
            .unwrap(),
        1
    );
    assert_eq!(repo.delete("A-1").unwrap(), 1);
}

#[test]
fn hostile_table_name_stays_a_single_identifier() {
    let (_dir, db) = products_db();
    let repo = SqliteRecordRepository::new(&db, "products\"; DROP TABLE products; --");

    let err = repo.all().unwrap_err();
    assert!(err.to_string().contains("no such table"));
    assert!(db.table_exists("products").unwrap());
}

#[test]
fn repository_writes_join_an_outer_transaction() {
    let (_dir, db) = products_db();

    let err = db
        .run_in_transaction(|db| -> DbResult<()> {
            let repo = SqliteRecordRepository::new(db, "products");
            repo.create(&record(&[("name", Value::from("a"))]))?;
            repo.create(&record(&[("stock", Value::from(1))]))?;
            Ok(())
        })
        .unwrap_err();
    assert!(err.to_string().contains("NOT NULL"));

    let repo = SqliteRecordRepository::new(&db, "products");
    assert_eq!(repo.count().unwrap(), 0);
}
