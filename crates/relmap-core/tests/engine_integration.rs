//! End-to-end tests for the `Relmap` facade over the in-memory backend.
//!
//! These drive the public query surface the way a caller would: connect,
//! inspect the schema, look rows up, and synthesize types and hierarchies.

use std::thread;

use relmap_client::{MemoryColumn, MemoryDatabase, MemoryTable};
use relmap_common::config::{CodegenConfig, ConnectionConfig};
use relmap_common::error::RelmapError;
use relmap_common::types::Value;
use relmap_core::{FieldSpec, FsSink, Relmap};

const LIBRARY: &str = r#"
name = "library"
version = "8.0.36"

[[tables]]
name = "authors"
columns = [
    { name = "id", type = "int", primary_key = true },
    { name = "full_name", type = "varchar(64)", nullable = false },
]
rows = [
    { id = 1, full_name = "Ursula K. Le Guin" },
    { id = 2, full_name = "Stanislaw Lem" },
]

[[tables]]
name = "books"
index_length = 16384
columns = [
    { name = "id", type = "int", primary_key = true },
    { name = "title", type = "varchar(128)", nullable = false },
    { name = "author_id", type = "int" },
    { name = "published", type = "year" },
]
foreign_keys = [{ column = "author_id", references = "authors" }]
rows = [
    { id = 10, title = "The Dispossessed", author_id = 1, published = 1974 },
    { id = 11, title = "Solaris", author_id = 2, published = 1961 },
    { id = 12, title = "The Lathe of Heaven", author_id = 1, published = 1971 },
    { id = 13, title = "Anonymous Pamphlet" },
]

[[tables]]
name = "loans"
columns = [
    { name = "id", type = "int", primary_key = true },
    { name = "book_id", type = "int", nullable = false },
    { name = "returned", type = "tinyint(1)" },
]
foreign_keys = [{ column = "book_id", references = "books" }]
rows = [{ id = 100, book_id = 11, returned = false }]

[[tables]]
name = "settings"
columns = [
    { name = "key_name", type = "varchar(32)" },
    { name = "setting_value", type = "text" },
]
rows = [{ key_name = "theme", setting_value = "dark" }]
"#;

/// Connects a fresh engine to the library fixture.
fn library() -> (MemoryDatabase, Relmap) {
    let db = MemoryDatabase::from_fixture_str(LIBRARY).expect("fixture should load");
    let mut relmap = Relmap::new();
    let config = ConnectionConfig::new().user("reader").database("library");
    relmap
        .connect(&db.connector(), &config)
        .expect("connect should succeed");
    (db, relmap)
}

/// Builds `a -> b -> c -> a`.
fn cycle() -> MemoryDatabase {
    let db = MemoryDatabase::new("cycle");
    for (name, target) in [("a", "b"), ("b", "c"), ("c", "a")] {
        let column = format!("{}_id", target);
        db.create_table(
            MemoryTable::new(name)
                .with_column(MemoryColumn::new("id", "int").primary_key())
                .with_column(MemoryColumn::new(column.as_str(), "int"))
                .with_foreign_key(column.as_str(), target, "id"),
        )
        .unwrap();
    }
    db
}

#[test]
fn test_database_information() {
    let (_db, mut relmap) = library();
    assert_eq!(relmap.db_name().unwrap(), "library");
    assert_eq!(relmap.db_engine().unwrap(), "Name: library, Version: 8.0.36");
    assert_eq!(
        relmap.db_tables().unwrap(),
        vec!["authors", "books", "loans", "settings"]
    );
    assert_eq!(relmap.db_table_size("books").unwrap(), 0.031);
    assert_eq!(relmap.db_size().unwrap(), 0.078);
}

#[test]
fn test_table_structure_ordinals_are_dense() {
    let (_db, mut relmap) = library();
    for table in relmap.db_tables().unwrap() {
        let structure = relmap.db_table_structure(&table).unwrap();
        let ordinals: Vec<usize> = structure.iter().map(|(i, _, _)| *i).collect();
        assert_eq!(ordinals, (0..structure.len()).collect::<Vec<_>>());
    }

    let books = relmap.db_table_structure("books").unwrap();
    assert_eq!(books[2], (2, "author_id".to_string(), "int".to_string()));

    assert!(matches!(
        relmap.db_table_structure("missing"),
        Err(RelmapError::UnknownTable { .. })
    ));
}

#[test]
fn test_find_objects_by_without_pairs_returns_all_rows() {
    let (_db, mut relmap) = library();
    assert_eq!(relmap.find_objects_by("books", &[]).unwrap().len(), 4);

    let by_author = relmap
        .find_objects_by("books", &[("author_id", Value::from(1))])
        .unwrap();
    let titles: Vec<_> = by_author
        .iter()
        .map(|r| r.get("title").cloned().unwrap())
        .collect();
    assert_eq!(
        titles,
        vec![
            Value::from("The Dispossessed"),
            Value::from("The Lathe of Heaven")
        ]
    );
}

#[test]
fn test_find_object_round_trips_an_instance() {
    let (_db, mut relmap) = library();
    let book = relmap.create_object("books", 11).unwrap().unwrap();
    let row = relmap.find_instance(&book).unwrap().unwrap();
    assert_eq!(row, book.to_typed_row());

    let orphan = relmap.create_object("books", 13).unwrap().unwrap();
    assert_eq!(orphan.get("authorId"), Some(&Value::Null));
    assert!(relmap.find_instance(&orphan).unwrap().is_some());
}

#[test]
fn test_find_class_matches_generated_type() {
    let (_db, mut relmap) = library();
    let ty = relmap.create_class("authors", "catalog").unwrap();
    let found = relmap.find_type(&ty).unwrap();
    assert_eq!(found.table.name, "authors");
    assert_eq!(found.rows.len(), 2);

    let err = relmap
        .find_class(&[FieldSpec::named("id"), FieldSpec::named("isbn")])
        .unwrap_err();
    assert!(matches!(err, RelmapError::NoMatchingTable { .. }));
    assert_eq!(err.to_string(), "no table matches fields [id, isbn]");
}

#[test]
fn test_find_classes_by_subset() {
    let (_db, mut relmap) = library();
    let tables: Vec<_> = relmap
        .find_classes_by(&["id"])
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(tables, vec!["authors", "books", "loans"]);
}

#[test]
fn test_user_profile_example() {
    let db = MemoryDatabase::new("people");
    db.create_table(
        MemoryTable::new("user_profile")
            .with_column(MemoryColumn::new("id", "int").primary_key())
            .with_column(MemoryColumn::new("first_name", "varchar(32)"))
            .with_column(MemoryColumn::new("last_name", "varchar(32)")),
    )
    .unwrap();

    let mut relmap = Relmap::new();
    relmap.attach(Box::new(db.connect()));
    assert!(relmap.create_object("user_profile", 5).unwrap().is_none());

    db.insert(
        "user_profile",
        vec![Value::from(5), Value::from("Ada"), Value::from("Lovelace")],
    )
    .unwrap();
    let user = relmap.create_object("user_profile", 5).unwrap().unwrap();
    assert_eq!(user.get("id"), Some(&Value::from(5)));
    assert_eq!(user.get("firstName"), Some(&Value::from("Ada")));
    assert_eq!(user.get("lastName"), Some(&Value::from("Lovelace")));
    assert_eq!(
        user.generated_type().field_names(),
        vec!["id", "first_name", "last_name"]
    );
}

#[test]
fn test_create_objects_in_identifier_order() {
    let (_db, mut relmap) = library();
    let books = relmap.create_objects("books", 11, 13).unwrap();
    let ids: Vec<_> = books.iter().map(|b| b.values()[0].clone()).collect();
    assert_eq!(ids, vec![Value::from(11), Value::from(12), Value::from(13)]);
    assert!(books
        .iter()
        .all(|b| b.generated_type().qualified_name() == "objects::Books"));

    assert!(matches!(
        relmap.create_objects("settings", 1, 2),
        Err(RelmapError::MissingIdColumn { .. })
    ));
}

#[test]
fn test_create_class_twice_leaves_one_definition() {
    let (_db, mut relmap) = library();
    let first = relmap.create_class("books", "catalog").unwrap();
    let second = relmap.create_class("books", "catalog").unwrap();
    assert_eq!(first, second);
    assert_eq!(relmap.registry().types("catalog").len(), 1);
    assert_eq!(
        relmap.sink().files("catalog"),
        vec!["books.rs", "mod.rs"]
    );
}

#[test]
fn test_hierarchy_over_cycle_visits_each_table_once() {
    let db = cycle();
    let mut relmap = Relmap::new();
    relmap.attach(Box::new(db.connect()));

    let hierarchy = relmap.create_hierarchy("a", "ring").unwrap();
    assert_eq!(hierarchy.tables(), vec!["a", "b", "c"]);
    assert_eq!(relmap.registry().types("ring").len(), 3);
}

#[test]
fn test_hierarchy_follows_both_directions() {
    let (_db, mut relmap) = library();
    let hierarchy = relmap.create_hierarchy("loans", "lending").unwrap();
    assert_eq!(hierarchy.tables(), vec!["loans", "books", "authors"]);
    assert!(!relmap.registry().contains("lending", "Settings"));

    let index = relmap.sink().source("lending", "mod.rs").unwrap();
    assert!(index.contains("pub use authors::Authors;"));
    assert!(index.contains("pub use books::Books;"));
    assert!(index.contains("pub use loans::Loans;"));
}

#[test]
fn test_hierarchy_written_to_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let db = MemoryDatabase::from_fixture_str(LIBRARY).unwrap();
    let mut relmap = Relmap::with_sink(FsSink::new(dir.path()));
    relmap.attach(Box::new(db.connect()));

    relmap.create_hierarchy("authors", "lib").unwrap();
    let ns = dir.path().join("lib");
    for file in ["mod.rs", "authors.rs", "books.rs", "loans.rs"] {
        assert!(ns.join(file).is_file(), "{} missing", file);
    }

    let loans = std::fs::read_to_string(ns.join("loans.rs")).unwrap();
    assert!(loans.contains("pub book_id: i32,"));
    assert!(loans.contains("pub returned: Option<bool>,"));

    relmap.create_hierarchy("settings", "lib").unwrap();
    assert!(!ns.join("books.rs").exists());
    assert!(ns.join("settings.rs").is_file());
}

#[test]
fn test_from_config_without_sources() {
    let dir = tempfile::tempdir().unwrap();
    let config = CodegenConfig {
        output_dir: dir.path().join("out"),
        emit_sources: false,
    };
    let db = cycle();
    let mut relmap = Relmap::from_config(&config);
    relmap.attach(Box::new(db.connect()));
    relmap.create_hierarchy("b", "ring").unwrap();
    assert!(!dir.path().join("out").exists());
    assert_eq!(relmap.registry().types("ring").len(), 3);
}

#[test]
fn test_shared_engine_serializes_callers() {
    let (_db, relmap) = library();
    let shared = relmap.into_shared();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let shared = shared.clone();
            thread::spawn(move || {
                let mut relmap = shared.lock();
                relmap.create_class("books", "shared").unwrap();
                relmap.create_objects("books", 10, 10 + i).unwrap().len()
            })
        })
        .collect();

    let counts: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(counts, vec![1, 2, 3, 4]);
    assert_eq!(shared.lock().registry().types("shared").len(), 1);
}
