use clap::Parser;
use schemadb::commands::{self, CommandError};
use schemadb::{Config, DbError, ResourceError};
use serde_json::{json, Value as JsonValue};
use std::path::Path;
use tempfile::TempDir;

const PEOPLE: &str = r#"{
    "table": "people",
    "primary_key": "id",
    "fields": [
        {"name": "id", "type": "integer"},
        {"name": "name", "type": "string"},
        {"name": "age", "type": "integer", "nullable": true},
        {"name": "tags", "type": "set", "items": {"type": "string"}, "nullable": true}
    ]
}"#;

fn setup() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("people.json"), PEOPLE).unwrap();
    dir
}

fn config(dir: &Path, args: &[&str]) -> Config {
    let database = format!("sqlite:{}", dir.join("people.db").display());
    let definition = dir.join("people.json").display().to_string();
    let mut argv = vec!["schemadb", "-d", database.as_str(), "-t", definition.as_str()];
    argv.extend_from_slice(args);
    Config::try_parse_from(argv).unwrap()
}

async fn run(dir: &Path, args: &[&str]) -> Result<String, CommandError> {
    let config = config(dir, args);
    let resource = commands::open(&config).await?;
    let output = commands::execute(&resource, &config.command).await;
    resource.table().database().close().await;
    output
}

#[tokio::test]
async fn test_record_lifecycle() {
    let dir = setup();
    let dir = dir.path();

    assert_eq!(run(dir, &["create"]).await.unwrap(), "created table people");

    let ann = r#"{"id": 1, "name": "ann", "age": 30, "tags": ["b", "a"]}"#;
    assert_eq!(run(dir, &["put", ann]).await.unwrap(), "created 1");
    let ann = r#"{"id": 1, "name": "ann", "age": 31}"#;
    assert_eq!(run(dir, &["put", ann]).await.unwrap(), "updated 1");

    let got: JsonValue = serde_json::from_str(&run(dir, &["get", "1"]).await.unwrap()).unwrap();
    assert_eq!(
        got,
        json!({"id": 1, "name": "ann", "age": 31, "tags": null})
    );

    let bob = r#"{"id": 2, "name": "bob"}"#;
    assert_eq!(run(dir, &["put", bob]).await.unwrap(), "created 2");

    let listed = run(dir, &["list"]).await.unwrap();
    let mut keys: Vec<&str> = listed.lines().collect();
    keys.sort();
    assert_eq!(keys, vec!["1", "2"]);

    let filtered = run(dir, &["list", "--field", "name", "--equals", "bob"])
        .await
        .unwrap();
    assert_eq!(filtered, "2");

    let patched: JsonValue =
        serde_json::from_str(&run(dir, &["patch", "2", r#"{"age": 40}"#]).await.unwrap())
            .unwrap();
    assert_eq!(patched["name"], json!("bob"));
    assert_eq!(patched["age"], json!(40));

    assert_eq!(run(dir, &["delete", "1"]).await.unwrap(), "deleted 1");
    let err = run(dir, &["get", "1"]).await.unwrap_err();
    assert!(matches!(
        err,
        CommandError::Resource(ResourceError::NotFound(_))
    ));

    assert_eq!(run(dir, &["drop"]).await.unwrap(), "dropped table people");
}

#[tokio::test]
async fn test_bad_input_is_rejected() {
    let dir = setup();
    let dir = dir.path();
    run(dir, &["create"]).await.unwrap();

    let err = run(dir, &["put", r#"{"id": 3}"#]).await.unwrap_err();
    assert!(
        matches!(err, CommandError::Resource(ResourceError::BadRequest(_))),
        "{err}"
    );

    let err = run(dir, &["put", "not json"]).await.unwrap_err();
    assert!(matches!(
        err,
        CommandError::Database(DbError::InvalidInput { .. })
    ));

    let err = run(dir, &["put", r#"{"name": "nobody"}"#]).await.unwrap_err();
    assert!(matches!(
        err,
        CommandError::Resource(ResourceError::BadRequest(_))
    ));

    assert!(run(dir, &["get", "abc"]).await.is_err());
    assert!(run(dir, &["list", "--field", "nope", "--equals", "1"])
        .await
        .is_err());
    assert!(run(dir, &["list"]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_definition_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["list"]);
    let err = commands::open(&config).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));
}
