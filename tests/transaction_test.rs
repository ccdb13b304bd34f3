mod common;

use common::{empty_row, foo_table, temp_database};
use futures_util::FutureExt;
use schemadb::{DbError, ResourceError, TableResource, Value};
use std::panic::AssertUnwindSafe;
use tokio::sync::Notify;
use uuid::Uuid;

#[tokio::test]
async fn test_rollback_on_error() {
    let (_dir, db) = temp_database().await;
    let table = foo_table(&db).await;
    let (db, table) = (&db, &table);

    let result = db
        .transaction(|| async move {
            table.insert(&empty_row(Uuid::new_v4())).await?;
            assert_eq!(table.list(None).await?.len(), 1);
            Err::<(), _>(DbError::invalid_input("force rollback"))
        })
        .await;

    assert!(matches!(result, Err(DbError::InvalidInput { .. })));
    assert!(table.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_commit_on_success() {
    let (_dir, db) = temp_database().await;
    let table = foo_table(&db).await;
    let (db, table) = (&db, &table);

    let ids = db
        .transaction(|| async move {
            let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
            for id in &ids {
                table.insert(&empty_row(*id)).await?;
            }
            Ok::<_, DbError>(ids)
        })
        .await
        .unwrap();

    assert_eq!(db.transaction_depth(), 0);
    let mut listed = table.list(None).await.unwrap();
    listed.sort();
    let mut expected: Vec<Value> = ids.into_iter().map(Value::Uuid).collect();
    expected.sort();
    assert_eq!(listed, expected);
}

#[tokio::test]
async fn test_caller_error_type_is_preserved() {
    let (_dir, db) = temp_database().await;
    let resource = TableResource::new(foo_table(&db).await);
    let (db, resource) = (&db, &resource);

    let id = Value::Uuid(Uuid::new_v4());
    let result = db
        .transaction(|| async move {
            resource.delete(&id).await?;
            Ok::<_, ResourceError>(())
        })
        .await;
    assert!(matches!(result, Err(ResourceError::NotFound(_))));
}

#[tokio::test]
async fn test_nesting_depth() {
    let (_dir, db) = temp_database().await;
    let db = &db;
    assert_eq!(db.transaction_depth(), 0);

    db.transaction(|| async move {
        assert_eq!(db.transaction_depth(), 1);
        db.transaction(|| async move {
            assert_eq!(db.transaction_depth(), 2);
            Ok::<_, DbError>(())
        })
        .await?;
        assert_eq!(db.transaction_depth(), 1);
        Ok::<_, DbError>(())
    })
    .await
    .unwrap();

    assert_eq!(db.transaction_depth(), 0);
}

#[tokio::test]
async fn test_inner_success_does_not_commit() {
    let (_dir, db) = temp_database().await;
    let table = foo_table(&db).await;
    let (db, table) = (&db, &table);

    let result = db
        .transaction(|| async move {
            db.transaction(|| async move {
                table.insert(&empty_row(Uuid::new_v4())).await?;
                Ok::<_, DbError>(())
            })
            .await?;
            Err::<(), _>(DbError::invalid_input("outer fails"))
        })
        .await;

    assert!(result.is_err());
    assert!(table.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_swallowed_inner_failure_aborts_outer() {
    let (_dir, db) = temp_database().await;
    let table = foo_table(&db).await;
    let (db, table) = (&db, &table);

    let result = db
        .transaction(|| async move {
            table.insert(&empty_row(Uuid::new_v4())).await?;

            let inner = db
                .transaction(|| async move { Err::<(), _>(DbError::invalid_input("inner fails")) })
                .await;
            assert!(matches!(inner, Err(DbError::InvalidInput { .. })));

            let err = table.insert(&empty_row(Uuid::new_v4())).await.unwrap_err();
            assert!(matches!(err, DbError::TransactionAborted { .. }), "{err}");
            Ok::<_, DbError>(())
        })
        .await;

    assert!(matches!(result, Err(DbError::TransactionAborted { .. })));
    assert_eq!(db.transaction_depth(), 0);
    assert!(table.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_statement_failure_inside_scope_rolls_back() {
    let (_dir, db) = temp_database().await;
    let table = foo_table(&db).await;
    let (db, table) = (&db, &table);

    let id = Uuid::new_v4();
    let result = db
        .transaction(|| async move {
            table.insert(&empty_row(Uuid::new_v4())).await?;
            table.insert(&empty_row(id)).await?;
            table.insert(&empty_row(id)).await?;
            Ok::<_, DbError>(())
        })
        .await;

    assert!(matches!(result, Err(DbError::AlreadyExists { .. })));
    assert!(table.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_panic_rolls_back() {
    let (_dir, db) = temp_database().await;
    let table = foo_table(&db).await;
    let (db, table) = (&db, &table);

    let result = AssertUnwindSafe(db.transaction(|| async move {
        table.insert(&empty_row(Uuid::new_v4())).await?;
        if table.list(None).await?.len() == 1 {
            panic!("boom");
        }
        Ok::<_, DbError>(())
    }))
    .catch_unwind()
    .await;

    assert!(result.is_err());
    assert_eq!(db.transaction_depth(), 0);
    assert!(table.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancellation_rolls_back() {
    let (_dir, db) = temp_database().await;
    let table = foo_table(&db).await;
    let inserted = Notify::new();

    {
        let (db, table, inserted) = (&db, &table, &inserted);
        tokio::select! {
            _ = db.transaction(|| async move {
                table.insert(&empty_row(Uuid::new_v4())).await?;
                inserted.notify_one();
                std::future::pending::<()>().await;
                Ok::<_, DbError>(())
            }) => unreachable!("the transaction never finishes"),
            _ = inserted.notified() => {}
        }
    }

    assert!(table.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_scopes_do_not_leak_into_other_tasks() {
    let (_dir, db) = temp_database().await;
    let db_ref = &db;

    db.transaction(|| async move {
        let other = db_ref.clone();
        let depth = tokio::spawn(async move { other.transaction_depth() })
            .await
            .unwrap();
        assert_eq!(depth, 0);
        assert_eq!(db_ref.transaction_depth(), 1);
        Ok::<_, DbError>(())
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_scopes_are_per_database() {
    let (_dir_a, a) = temp_database().await;
    let (_dir_b, b) = temp_database().await;
    let table_b = foo_table(&b).await;
    let (a, b, table_b) = (&a, &b, &table_b);

    let result = a
        .transaction(|| async move {
            assert_eq!(b.transaction_depth(), 0);
            // autocommit on b: survives a's rollback
            table_b.insert(&empty_row(Uuid::new_v4())).await?;
            Err::<(), _>(DbError::invalid_input("roll back a"))
        })
        .await;

    assert!(result.is_err());
    assert_eq!(table_b.list(None).await.unwrap().len(), 1);
}
