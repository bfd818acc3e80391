//! End-to-end TableQuery tests against the in-memory backend.

use sqlbind::mem::{MemConnection, MemDatabase, TableSpec};
use sqlbind::{
    ColumnProperty, ConnectionPool, DefaultSqlGenerator, Dialect, Error, Filter, OrderBy, Range,
    Result, RowId, RowIdChangeEvent, RowIdChangeNotifier, RowItem, SimplePool, SqlGenerator,
    TableQuery, Value,
};
use std::sync::{Arc, Mutex};

type MemPool = SimplePool<MemConnection, Box<dyn Fn() -> Result<MemConnection> + Send + Sync>>;

fn pool_for(db: &Arc<Mutex<MemDatabase>>) -> Arc<MemPool> {
    let db = Arc::clone(db);
    Arc::new(SimplePool::new(Box::new(move || {
        Ok(MemConnection::new(Arc::clone(&db)))
    })))
}

fn generator() -> Box<dyn SqlGenerator + Send> {
    Box::new(DefaultSqlGenerator::with_dialect(Dialect::Sqlite))
}

/// `people(id PK auto, name, version)` with three rows, version 1 each.
fn people_db() -> Arc<Mutex<MemDatabase>> {
    let mut db = MemDatabase::new();
    db.create_table(
        TableSpec::new("people")
            .auto_increment("id")
            .column("name")
            .column("version")
            .primary_key(&["id"]),
    );
    for (id, name) in [(2, "Grace"), (3, "Lin"), (1, "Ada")] {
        db.insert_row(
            "people",
            vec![
                Value::BigInt(id),
                Value::Text(name.into()),
                Value::BigInt(1),
            ],
        )
        .unwrap();
    }
    Arc::new(Mutex::new(db))
}

fn load_person<P: ConnectionPool>(query: &mut TableQuery<P>, id: i64) -> RowItem {
    let rows = query.results(0, 0).unwrap();
    let row = rows
        .iter()
        .find(|r| r.get_by_name("id") == Some(&Value::BigInt(id)))
        .expect("row should exist");
    let mut item = RowItem::from_row(RowId::new(vec![Value::BigInt(id)]), row, &["id".to_string()]);
    item.property_mut("id").unwrap().set_read_only(true);
    item
}

fn new_person(name: &str) -> RowItem {
    RowItem::new(
        RowId::temporary(),
        vec![
            ColumnProperty::new("id", Value::Null)
                .primary_key(true)
                .read_only(true),
            ColumnProperty::new("name", Value::Text(name.into())),
            ColumnProperty::new("version", Value::BigInt(1)),
        ],
    )
}

#[test]
fn missing_table_is_a_config_error() {
    let db = people_db();
    let result = TableQuery::new("nonexistent", pool_for(&db), generator());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn table_without_primary_key_is_a_config_error() {
    let db = Arc::new(Mutex::new(MemDatabase::new()));
    db.lock()
        .unwrap()
        .create_table(TableSpec::new("log").column("msg"));
    let result = TableQuery::new("log", pool_for(&db), generator());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn lower_case_name_resolves_against_case_folding_database() {
    let db = Arc::new(Mutex::new(MemDatabase::new()));
    db.lock().unwrap().create_table(
        TableSpec::new("PEOPLE")
            .auto_increment("ID")
            .column("NAME")
            .primary_key(&["ID"]),
    );
    let query = TableQuery::new("people", pool_for(&db), generator()).unwrap();
    // the upper-cased spelling is adopted
    assert_eq!(query.table_name(), "PEOPLE");
    assert_eq!(query.primary_key_columns(), &["ID".to_string()]);
}

#[test]
fn count_honors_filters_and_releases_the_connection() {
    let db = people_db();
    let pool = pool_for(&db);
    let mut query = TableQuery::new("people", Arc::clone(&pool), generator()).unwrap();
    assert_eq!(query.count().unwrap(), 3);

    query.set_filters(vec![Filter::eq("name", "Ada")]);
    assert_eq!(query.count().unwrap(), 1);

    // the implicit transaction closed and returned its connection
    assert!(!query.is_in_transaction());
    assert_eq!(pool.stats().active_connections, 0);
}

#[test]
fn default_ordering_is_primary_key_ascending_and_stable() {
    let db = people_db();
    let mut query = TableQuery::new("people", pool_for(&db), generator()).unwrap();
    let ids = |rows: &[sqlbind::Row]| -> Vec<i64> {
        rows.iter()
            .map(|r| r.get_by_name("id").and_then(Value::as_i64).unwrap())
            .collect()
    };
    let first = query.results(0, 0).unwrap();
    let second = query.results(0, 0).unwrap();
    assert_eq!(ids(&first), vec![1, 2, 3]);
    assert_eq!(ids(&first), ids(&second));
}

#[test]
fn explicit_order_by_overrides_the_default() {
    let db = people_db();
    let mut query = TableQuery::new("people", pool_for(&db), generator()).unwrap();
    query.set_order_by(vec![OrderBy::desc("name")]);
    let names: Vec<Value> = query
        .results(0, 2)
        .unwrap()
        .iter()
        .map(|r| r.get_by_name("name").cloned().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![Value::Text("Lin".into()), Value::Text("Grace".into())]
    );
}

#[test]
fn paging_is_applied_server_side() {
    let db = people_db();
    let mut query = TableQuery::new("people", pool_for(&db), generator()).unwrap();
    assert!(query.respects_paging_limits());
    let rows = query.results(1, 1).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_by_name("id"), Some(&Value::BigInt(2)));
}

#[test]
fn begin_twice_without_commit_fails() {
    let db = people_db();
    let mut query = TableQuery::new("people", pool_for(&db), generator()).unwrap();
    query.begin_transaction().unwrap();
    let err = query.begin_transaction().unwrap_err();
    assert!(matches!(err, Error::Transaction(_)));
    query.rollback().unwrap();
}

#[test]
fn commit_and_rollback_release_the_connection_exactly_once() {
    let db = people_db();
    let pool = pool_for(&db);
    let mut query = TableQuery::new("people", Arc::clone(&pool), generator()).unwrap();

    query.begin_transaction().unwrap();
    assert_eq!(pool.stats().active_connections, 1);
    query.commit().unwrap();
    assert_eq!(pool.stats().active_connections, 0);

    query.begin_transaction().unwrap();
    query.rollback().unwrap();
    assert_eq!(pool.stats().active_connections, 0);
    // nothing further to release
    assert!(matches!(query.commit(), Err(Error::Transaction(_))));
}

#[test]
fn insert_delivers_row_id_change_event_on_commit_only() {
    let db = people_db();
    let mut query = TableQuery::new("people", pool_for(&db), generator()).unwrap();
    let events: Arc<Mutex<Vec<RowIdChangeEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    query.add_row_id_change_listener(Box::new(move |event| {
        sink.lock().unwrap().push(event.clone());
    }));

    let mut row = new_person("Mei");
    let temporary_id = row.id().clone();
    assert!(temporary_id.is_temporary());

    query.begin_transaction().unwrap();
    assert_eq!(query.store_row(&mut row).unwrap(), 1);
    // buffered until the transaction commits
    assert!(events.lock().unwrap().is_empty());

    query.commit().unwrap();
    let delivered = events.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].old_id(), &temporary_id);
    assert_eq!(delivered[0].new_id(), &RowId::new(vec![Value::BigInt(4)]));
    drop(delivered);

    // a later commit cycle must not re-deliver
    query.begin_transaction().unwrap();
    query.commit().unwrap();
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn rollback_discards_buffered_events_and_the_insert() {
    let db = people_db();
    let mut query = TableQuery::new("people", pool_for(&db), generator()).unwrap();
    let events: Arc<Mutex<Vec<RowIdChangeEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    query.add_row_id_change_listener(Box::new(move |event| {
        sink.lock().unwrap().push(event.clone());
    }));

    let mut row = new_person("Mei");
    query.begin_transaction().unwrap();
    query.store_row(&mut row).unwrap();
    query.rollback().unwrap();

    assert!(events.lock().unwrap().is_empty());
    assert_eq!(db.lock().unwrap().row_count("people"), Some(3));

    // the cleared buffer stays cleared across the next commit
    query.begin_transaction().unwrap();
    query.commit().unwrap();
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn removed_listener_is_not_called() {
    let db = people_db();
    let mut query = TableQuery::new("people", pool_for(&db), generator()).unwrap();
    let events: Arc<Mutex<Vec<RowIdChangeEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let id = query.add_row_id_change_listener(Box::new(move |event| {
        sink.lock().unwrap().push(event.clone());
    }));
    query.remove_row_id_change_listener(id);

    let mut row = new_person("Mei");
    query.begin_transaction().unwrap();
    query.store_row(&mut row).unwrap();
    query.commit().unwrap();
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn store_row_updates_an_existing_row() {
    let db = people_db();
    let mut query = TableQuery::new("people", pool_for(&db), generator()).unwrap();
    let mut row = load_person(&mut query, 1);
    row.property_mut("name")
        .unwrap()
        .set_value(Value::Text("Ada Lovelace".into()))
        .unwrap();

    query.begin_transaction().unwrap();
    assert_eq!(query.store_row(&mut row).unwrap(), 1);
    query.commit().unwrap();

    let reloaded = load_person(&mut query, 1);
    assert_eq!(
        reloaded.property("name").unwrap().value(),
        &Value::Text("Ada Lovelace".into())
    );
}

#[test]
fn concurrent_update_with_version_column_is_an_optimistic_lock_failure() {
    let db = people_db();
    let mut writer_a = TableQuery::new("people", pool_for(&db), generator()).unwrap();
    writer_a.set_version_column("version");
    let mut writer_b = TableQuery::new("people", pool_for(&db), generator()).unwrap();
    writer_b.set_version_column("version");

    // both writers load id=1 at version 1
    let mut row_a = load_person(&mut writer_a, 1);
    let mut row_b = load_person(&mut writer_b, 1);

    row_a
        .property_mut("name")
        .unwrap()
        .set_value(Value::Text("X".into()))
        .unwrap();
    writer_a.begin_transaction().unwrap();
    writer_a.store_row(&mut row_a).unwrap();
    writer_a.commit().unwrap();

    // the generator advanced the version column
    let current = load_person(&mut writer_a, 1);
    assert_eq!(current.property("version").unwrap().value(), &Value::BigInt(2));

    // writer B still holds version 1 and must fail
    row_b
        .property_mut("name")
        .unwrap()
        .set_value(Value::Text("Y".into()))
        .unwrap();
    writer_b.begin_transaction().unwrap();
    let err = writer_b.store_row(&mut row_b).unwrap_err();
    assert!(err.is_optimistic_lock());
    writer_b.rollback().unwrap();

    // writer A's data is intact
    let final_row = load_person(&mut writer_a, 1);
    assert_eq!(
        final_row.property("name").unwrap().value(),
        &Value::Text("X".into())
    );
    assert_eq!(final_row.property("version").unwrap().value(), &Value::BigInt(2));
}

#[test]
fn stale_delete_with_version_column_is_an_optimistic_lock_failure() {
    let db = people_db();
    let mut query = TableQuery::new("people", pool_for(&db), generator()).unwrap();
    query.set_version_column("version");
    let stale = {
        let mut row = load_person(&mut query, 1);
        row.property_mut("version")
            .unwrap()
            .reset_value(Value::BigInt(99));
        row
    };
    query.begin_transaction().unwrap();
    let err = query.remove_row(&stale).unwrap_err();
    assert!(err.is_optimistic_lock());
    query.rollback().unwrap();
}

#[test]
fn remove_of_missing_row_without_version_column_returns_false() {
    let db = people_db();
    let mut query = TableQuery::new("people", pool_for(&db), generator()).unwrap();
    let ghost = RowItem::new(
        RowId::new(vec![Value::BigInt(99)]),
        vec![ColumnProperty::new("id", Value::BigInt(99)).primary_key(true)],
    );
    query.begin_transaction().unwrap();
    assert!(!query.remove_row(&ghost).unwrap());
    let existing = load_person(&mut query, 2);
    assert!(query.remove_row(&existing).unwrap());
    query.commit().unwrap();
    assert_eq!(db.lock().unwrap().row_count("people"), Some(2));
}

#[test]
fn store_row_immediately_returns_the_final_row_id() {
    let db = people_db();
    let mut query = TableQuery::new("people", pool_for(&db), generator()).unwrap();
    let mut row = new_person("Mei");
    let id = query.store_row_immediately(&mut row).unwrap();
    assert_eq!(id, RowId::new(vec![Value::BigInt(4)]));
    assert!(!query.is_in_transaction());
    assert_eq!(db.lock().unwrap().row_count("people"), Some(4));
}

#[test]
fn contains_row_with_key_checks_filters_too() {
    let db = people_db();
    let mut query = TableQuery::new("people", pool_for(&db), generator()).unwrap();
    assert!(query.contains_row_with_key(&[Value::BigInt(1)]).unwrap());
    assert!(!query.contains_row_with_key(&[Value::BigInt(99)]).unwrap());

    query.set_filters(vec![Filter::eq("name", "Ada")]);
    assert!(query.contains_row_with_key(&[Value::BigInt(1)]).unwrap());
    assert!(!query.contains_row_with_key(&[Value::BigInt(2)]).unwrap());

    // wrong arity is rejected outright
    assert!(query
        .contains_row_with_key(&[Value::BigInt(1), Value::BigInt(2)])
        .is_err());
}

#[test]
fn generator_range_matches_results_paging() {
    // results(offset, n) and a manual select over the same range agree
    let db = people_db();
    let mut query = TableQuery::new("people", pool_for(&db), generator()).unwrap();
    let rows = query.results(0, 2).unwrap();
    let generator = DefaultSqlGenerator::with_dialect(Dialect::Sqlite);
    let stmt = generator.select_query(
        "people",
        &[],
        &[OrderBy::asc("id")],
        Range::new(0, 2),
        None,
    );
    let mut conn = MemConnection::new(Arc::clone(&db));
    use sqlbind::Connection as _;
    let manual = conn.query(stmt.sql(), stmt.params()).unwrap();
    assert_eq!(rows.len(), manual.len());
}
