mod common;

use common::{empty_row, foo_table, full_row, temp_database};
use schemadb::{DbError, Query, Value};
use uuid::Uuid;

#[tokio::test]
async fn test_list_and_delete_all() {
    let (_dir, db) = temp_database().await;
    let table = foo_table(&db).await;

    let mut ids: Vec<Value> = Vec::new();
    for _ in 0..10 {
        let id = Uuid::new_v4();
        table.insert(&empty_row(id)).await.unwrap();
        ids.push(id.into());
    }

    let mut listed = table.list(None).await.unwrap();
    listed.sort();
    ids.sort();
    assert_eq!(listed, ids);

    for id in &listed {
        table.delete(id).await.unwrap();
    }
    assert!(table.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_where() {
    let (_dir, db) = temp_database().await;
    let table = foo_table(&db).await;

    for n in 0..20 {
        let row = empty_row(Uuid::new_v4()).with("int", n);
        table.insert(&row).await.unwrap();
    }

    let mut filter = db.query();
    filter
        .column(&table, "int")
        .unwrap()
        .text(" < ")
        .value(&table, "int", 10)
        .unwrap();
    assert_eq!(table.list(Some(&filter)).await.unwrap().len(), 10);

    let mut none = db.query();
    none.column(&table, "int")
        .unwrap()
        .text(" > ")
        .value(&table, "int", 100)
        .unwrap();
    assert!(table.list(Some(&none)).await.unwrap().is_empty());

    assert_eq!(table.list(Some(&Query::new())).await.unwrap().len(), 20);
}

#[tokio::test]
async fn test_list_where_on_encoded_field() {
    let (_dir, db) = temp_database().await;
    let table = foo_table(&db).await;

    let wanted = Uuid::new_v4();
    table.insert(&full_row(wanted)).await.unwrap();
    table.insert(&empty_row(Uuid::new_v4())).await.unwrap();

    let datetime: chrono::DateTime<chrono::Utc> = "2019-01-01T01:01:01Z".parse().unwrap();
    let mut filter = db.query();
    filter
        .column(&table, "datetime")
        .unwrap()
        .text(" = ")
        .value(&table, "datetime", datetime)
        .unwrap();
    assert_eq!(
        table.list(Some(&filter)).await.unwrap(),
        vec![Value::Uuid(wanted)]
    );
}

#[tokio::test]
async fn test_values_are_never_interpolated() {
    let (_dir, db) = temp_database().await;
    let table = foo_table(&db).await;

    let hostile = "x'); DROP TABLE foo; --";
    let id = Uuid::new_v4();
    table
        .insert(&empty_row(id).with("str", hostile))
        .await
        .unwrap();

    let mut filter = db.query();
    filter
        .column(&table, "str")
        .unwrap()
        .text(" = ")
        .value(&table, "str", hostile)
        .unwrap();
    assert_eq!(filter.params().len(), 1);
    assert!(!filter.sql().contains("DROP"));

    assert_eq!(
        table.list(Some(&filter)).await.unwrap(),
        vec![Value::Uuid(id)]
    );
    let stored = table.select(&Value::Uuid(id)).await.unwrap();
    assert_eq!(stored.get("str"), Some(&Value::from(hostile)));
}

#[tokio::test]
async fn test_query_rejects_unknown_fields_and_bad_values() {
    let (_dir, db) = temp_database().await;
    let table = foo_table(&db).await;

    let mut query = db.query();
    let err = query.column(&table, "nope").unwrap_err();
    assert!(matches!(err, DbError::InvalidField { .. }));

    let err = query.value(&table, "nope", 1).unwrap_err();
    assert!(matches!(err, DbError::InvalidField { .. }));

    let err = query.value(&table, "int", "not a number").unwrap_err();
    assert!(matches!(err, DbError::InvalidValue { .. }));

    assert!(query.params().is_empty());
}
