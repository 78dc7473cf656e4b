#[path = "common/mod.rs"]
mod common;

use common::*;
use reviewetl::{build_insert_sql, DbConfig, LoadError, MemorySink, ReviewSink, REVIEW_COLUMNS};

#[test]
fn insert_sql_numbers_placeholders_row_major() {
    let one = build_insert_sql(1);
    assert!(one.starts_with("INSERT INTO review_data (user_id, parent_asin, asin, rating,"));
    assert!(one.ends_with("VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"));

    let two = build_insert_sql(2);
    assert!(two.ends_with("($12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)"));
    assert_eq!(two.matches('$').count(), 2 * REVIEW_COLUMNS.len());
    assert_eq!(REVIEW_COLUMNS.last(), Some(&"filename"));
}

#[test]
fn missing_connection_settings_are_configuration_errors() {
    let cfg = DbConfig { host: Some("localhost".into()), port: Some("5432".into()), ..Default::default() };
    match cfg.connect_options() {
        Err(LoadError::Configuration(msg)) => {
            assert!(msg.contains("DB_USER") && msg.contains("DB_PASSWORD") && msg.contains("DBNAME"));
            assert!(!msg.contains("DB_HOST"));
        }
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }

    let bad_port = DbConfig {
        host: Some("localhost".into()),
        port: Some("fifty".into()),
        user: Some("u".into()),
        password: Some("p".into()),
        dbname: Some("reviews".into()),
    };
    let err = bad_port.connect_options().unwrap_err();
    assert!(matches!(err, LoadError::Configuration(_)));
    assert!(err.is_fatal());

    let ok = DbConfig { port: Some(" 5433 ".into()), ..bad_port };
    assert!(ok.connect_options().is_ok());
}

#[test]
fn memory_sink_writes_are_all_or_nothing() {
    let sink = MemorySink::new();
    let rows = vec![stored_row("a", "Books.jsonl"), stored_row("b", "Books.jsonl")];

    sink.reject_writes("Books.jsonl");
    let err = sink.write_category("Books.jsonl", &rows).unwrap_err();
    assert!(!err.is_fatal());
    assert!(sink.rows().is_empty());
    assert!(sink.completed_categories().unwrap().is_empty());

    sink.write_category("Books.jsonl", &rows).unwrap();
    assert_eq!(sink.rows_for("Books.jsonl").len(), 2);
    assert_eq!(sink.known_users().unwrap(), vec!["a".to_string(), "b".to_string()]);

    sink.write_category("Empty.jsonl", &[]).unwrap();
    assert_eq!(
        sink.completed_categories().unwrap(),
        vec!["Books.jsonl".to_string(), "Empty.jsonl".to_string()]
    );
    assert_eq!(sink.write_calls(), 3);
}
