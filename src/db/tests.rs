use super::{
    count_ingredients, delete_ingredient, find_ingredient_ids, get_ingredient, get_meta,
    insert_ingredient, list_ingredients, open_connection, set_favorite, set_last_used, set_meta,
    update_descriptor_fields, CURRENT_SCHEMA_VERSION,
};
use crate::domain::ingredient::{ConversionFact, Ingredient};
use crate::domain::unit::Unit;
use rusqlite::params;
use time::macros::datetime;
use uuid::Uuid;

fn unique_db_path() -> String {
    std::env::temp_dir()
        .join(format!("pantry-db-{}.sqlite", Uuid::now_v7()))
        .display()
        .to_string()
}

fn cleanup_db_files(path: &str) {
    for suffix in ["", "-wal", "-shm"] {
        let candidate = format!("{path}{suffix}");
        let _ = std::fs::remove_file(candidate);
    }
}

fn table_exists(conn: &rusqlite::Connection, table_name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
            params![table_name],
            |row| row.get(0),
        )
        .expect("table existence query should be readable");
    exists == 1
}

fn sample(id: &str, name: &str, custom: bool) -> Ingredient {
    Ingredient {
        id: id.to_string(),
        default_id: (!custom).then(|| format!("dflt-{}", name.to_lowercase())),
        name: name.to_string(),
        category: Some("Baking".to_string()),
        brand: None,
        is_custom: custom,
        is_favorite: false,
        last_used_at: None,
        created_at: datetime!(2026-01-02 03:04:05 UTC),
        facts: vec![
            ConversionFact::new(1.0, Unit::Cup, 120.0, Unit::Gram).expect("valid fact"),
            ConversionFact::new(1.0, Unit::count("egg", "eggs"), 50.0, Unit::Gram)
                .expect("valid fact"),
        ],
    }
}

#[test]
fn configures_connection_pragmas() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("journal_mode pragma should be readable");
    assert_eq!(journal_mode.to_uppercase(), "WAL");

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .expect("foreign_keys pragma should be readable");
    assert_eq!(foreign_keys, 1);

    let busy_timeout: i64 = conn
        .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .expect("busy_timeout pragma should be readable");
    assert_eq!(busy_timeout, 5000);

    cleanup_db_files(&path);
}

#[test]
fn initializes_tables_and_reapplies_migrations_idempotently() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");
    for table in ["schema_migrations", "meta", "ingredient", "conversion_fact"] {
        assert!(table_exists(&conn, table), "expected table '{table}' to exist");
    }
    drop(conn);

    let conn = open_connection(&path).expect("second open should be idempotent");
    let applied_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
        .expect("schema_migrations count should be queryable");
    assert_eq!(applied_count, CURRENT_SCHEMA_VERSION);
    assert_eq!(
        get_meta(&conn, "schema_version").expect("meta read"),
        Some(CURRENT_SCHEMA_VERSION.to_string())
    );

    cleanup_db_files(&path);
}

#[test]
fn ingredients_round_trip_with_ordered_facts() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");
    insert_ingredient(&conn, &sample("b-2", "sugar", false)).expect("insert");
    insert_ingredient(&conn, &sample("a-1", "Sugar", true)).expect("insert");
    insert_ingredient(&conn, &sample("c-3", "Almond flour", false)).expect("insert");

    let listed = list_ingredients(&conn).expect("list");
    let ids: Vec<&str> = listed.iter().map(|row| row.id.as_str()).collect();
    assert_eq!(ids, vec!["c-3", "a-1", "b-2"]);
    assert_eq!(listed[1], sample("a-1", "Sugar", true));

    let fetched = get_ingredient(&conn, "b-2")
        .expect("get")
        .expect("row should exist");
    assert_eq!(fetched.facts[1].from_unit(), &Unit::count("egg", "eggs"));
    assert!(get_ingredient(&conn, "missing").expect("get").is_none());

    cleanup_db_files(&path);
}

#[test]
fn descriptor_updates_leave_user_fields_alone() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");
    insert_ingredient(&conn, &sample("x", "Apricots, dried", false)).expect("insert");
    assert!(set_favorite(&conn, "x", true).expect("favorite"));
    let used = datetime!(2026-03-01 12:00:00 UTC);
    assert!(set_last_used(&conn, "x", &used).expect("mark used"));

    let mut renamed = sample("x", "Dried apricots", false);
    renamed.is_favorite = false;
    renamed.is_custom = true;
    renamed.facts = vec![ConversionFact::new(1.0, Unit::Cup, 130.0, Unit::Gram).expect("fact")];
    assert!(update_descriptor_fields(&conn, &renamed).expect("update"));

    let stored = get_ingredient(&conn, "x").expect("get").expect("row");
    assert_eq!(stored.name, "Dried apricots");
    assert!(stored.is_favorite);
    assert!(!stored.is_custom);
    assert_eq!(stored.last_used_at, Some(used));
    assert_eq!(stored.facts.len(), 1);
    assert_eq!(stored.facts[0].to_amount(), 130.0);

    assert!(!update_descriptor_fields(&conn, &sample("nope", "Nope", false)).expect("update"));
    cleanup_db_files(&path);
}

#[test]
fn deleting_an_ingredient_cascades_to_facts() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");
    insert_ingredient(&conn, &sample("x", "Butter", false)).expect("insert");
    assert_eq!(count_ingredients(&conn).expect("count").facts, 2);

    assert!(delete_ingredient(&conn, "x").expect("delete"));
    assert!(!delete_ingredient(&conn, "x").expect("second delete"));
    let counts = count_ingredients(&conn).expect("count");
    assert_eq!(counts.total, 0);
    assert_eq!(counts.facts, 0);

    cleanup_db_files(&path);
}

#[test]
fn non_positive_amounts_are_rejected_by_the_schema() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");
    insert_ingredient(&conn, &sample("x", "Butter", false)).expect("insert");
    let result = conn.execute(
        "INSERT INTO conversion_fact VALUES ('x', 9, 0, '\"cup\"', 1, '\"gram\"')",
        [],
    );
    assert!(result.is_err());
    cleanup_db_files(&path);
}

#[test]
fn lookup_matches_id_prefix_or_name() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");
    insert_ingredient(&conn, &sample("0190-aaaa", "Honey", false)).expect("insert");
    insert_ingredient(&conn, &sample("0190-bbbb", "Molasses", false)).expect("insert");

    assert_eq!(
        find_ingredient_ids(&conn, "0190-a", "0190-a").expect("find"),
        vec!["0190-aaaa".to_string()]
    );
    assert_eq!(
        find_ingredient_ids(&conn, "  HONEY ", "  HONEY ").expect("find"),
        vec!["0190-aaaa".to_string()]
    );
    assert_eq!(find_ingredient_ids(&conn, "0190", "0190").expect("find").len(), 2);

    set_meta(&conn, "dataset_version", "4").expect("meta write");
    assert_eq!(
        get_meta(&conn, "dataset_version").expect("meta read"),
        Some("4".to_string())
    );
    cleanup_db_files(&path);
}
