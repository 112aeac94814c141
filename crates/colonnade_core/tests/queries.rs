//! Query planning and pagination through the database API.

use colonnade_core::{
    Collection, Config, CoreError, Index, IndexConfiguration, MissingCursorPolicy, Predicate,
    ScanPlan,
};
use colonnade_storage::RecordStore;
use colonnade_testkit::prelude::*;
use serde_json::json;

fn larsson_db() -> TestDatabase {
    let db = TestDatabase::books();
    for rating in 1..=9 {
        let isbn = format!("L{rating}");
        let rating = rating.to_string();
        db.create_document("book", book(&isbn, Some("thriller"), Some("Larsson"), Some(&rating)))
            .unwrap();
    }
    db.create_document("book", book("M5", Some("scifi"), Some("Lem"), Some("5")))
        .unwrap();
    db
}

fn thrillers(count: usize) -> TestDatabase {
    let db = TestDatabase::books();
    for i in 1..=count {
        db.create_document("book", book(&i.to_string(), Some("thriller"), None, None))
            .unwrap();
    }
    db
}

#[test]
fn author_and_rating_range_is_bounded_scan() {
    let db = larsson_db();
    let predicate = Predicate::and([
        Predicate::eq("author.name", "Larsson"),
        Predicate::range("rating", "3", "7"),
    ]);

    let (plan, index) = db.plan("book", &predicate, None).unwrap();
    assert_eq!(
        plan,
        ScanPlan::BoundedScan {
            sort_key: "book#author.name#rating".into(),
            lo: "Larsson#3".into(),
            hi: "Larsson#7".into(),
        }
    );
    assert_eq!(index.unwrap().name(), "book__author.name__rating");

    let found = db.query_all("book", &predicate, None, 2).unwrap();
    assert_eq!(ids(&found), ["L3", "L4", "L5", "L6", "L7"]);
}

#[test]
fn strict_prefix_equality_is_prefix_scan() {
    let db = larsson_db();
    let predicate = Predicate::eq("author.name", "Lem");
    let (plan, _) = db.plan("book", &predicate, None).unwrap();
    assert_eq!(
        plan,
        ScanPlan::PrefixScan {
            sort_key: "book#author.name#rating".into(),
            prefix: "Lem#".into(),
        }
    );
    assert_eq!(ids(&db.query_all("book", &predicate, None, 0).unwrap()), ["M5"]);
}

#[test]
fn covering_equality_is_exact_match() {
    let db = larsson_db();
    let (plan, _) = db
        .plan("book", &Predicate::eq("category.name", "scifi"), None)
        .unwrap();
    assert_eq!(
        plan,
        ScanPlan::ExactMatch {
            sort_key: "book#category.name".into(),
            value: "scifi".into(),
        }
    );
}

#[test]
fn range_on_uncovered_prefix_is_open_above() {
    let db = larsson_db();
    let (plan, _) = db
        .plan("book", &Predicate::range("author.name", "Larsson", "Larsson"), None)
        .unwrap();
    assert_eq!(
        plan,
        ScanPlan::BoundedScan {
            sort_key: "book#author.name#rating".into(),
            lo: "Larsson".into(),
            hi: "Larsson#\u{10FFFF}".into(),
        }
    );
    let found = db
        .query_all("book", &Predicate::range("author.name", "Larsson", "Larsson"), None, 0)
        .unwrap();
    assert_eq!(found.len(), 9);
}

#[test]
fn open_upper_bound_excludes_longer_values() {
    let db = TestDatabase::books();
    db.create_document("book", book("1", None, Some("M Smith"), Some("5")))
        .unwrap();
    db.create_document("book", book("2", None, Some("Larsson"), Some("3")))
        .unwrap();
    db.create_document("book", book("3", None, Some("Adams"), Some("4")))
        .unwrap();
    db.create_document("book", book("4", None, Some("M"), Some("1")))
        .unwrap();

    let predicate = Predicate::range("author.name", "B", "M");
    let (plan, _) = db.plan("book", &predicate, None).unwrap();
    assert!(matches!(plan, ScanPlan::BoundedScan { ref hi, .. } if hi == "M#\u{10FFFF}"));

    for page_size in [1, 2, 10] {
        let found = db.query_all("book", &predicate, None, page_size).unwrap();
        assert_eq!(ids(&found), ["2", "4"], "page size {page_size}");
    }

    // the first page scans "M Smith" and drops it
    let first = db.query("book", &predicate, None, None, 2).unwrap();
    assert_eq!(ids(&first.documents), ["2"]);
    assert_eq!(first.next_start_from.as_deref(), Some("1"));
    let rest = db
        .query("book", &predicate, None, first.next_start_from.as_deref(), 2)
        .unwrap();
    assert_eq!(ids(&rest.documents), ["4"]);
    assert_eq!(rest.next_start_from, None);
}

#[test]
fn any_match_is_full_scan() {
    let db = larsson_db();
    let (plan, index) = db.plan("book", &Predicate::any_match(), None).unwrap();
    assert_eq!(
        plan,
        ScanPlan::FullScan {
            sort_key: "book".into()
        }
    );
    assert!(index.is_none());
    assert_eq!(db.query_all("book", &Predicate::any_match(), None, 4).unwrap().len(), 10);
}

#[test]
fn planning_errors() {
    let db = larsson_db();

    let err = db
        .plan("book", &Predicate::eq("title", "Solaris"), None)
        .unwrap_err();
    assert!(matches!(err, CoreError::NoMatchingIndex { .. }));

    let misplaced = Predicate::and([
        Predicate::range("rating", "3", "7"),
        Predicate::eq("author.name", "Larsson"),
    ]);
    assert!(matches!(
        db.plan("book", &misplaced, None).unwrap_err(),
        CoreError::InvalidPredicate { .. }
    ));

    let separator = Predicate::eq("category.name", "sci#fi");
    assert!(matches!(
        db.plan("book", &separator, None).unwrap_err(),
        CoreError::InvalidPredicate { .. }
    ));

    assert!(db
        .plan("book", &Predicate::eq("category.name", "x"), Some("book__nope"))
        .unwrap_err()
        .is_validation());
    assert!(db
        .plan("film", &Predicate::any_match(), None)
        .unwrap_err()
        .is_not_found());
}

#[test]
fn cursor_is_set_only_on_full_pages_with_more() {
    let db = thrillers(5);
    let predicate = Predicate::eq("category.name", "thriller");

    let first = db.query("book", &predicate, None, None, 2).unwrap();
    assert_eq!(ids(&first.documents), ["1", "2"]);
    assert_eq!(first.next_start_from.as_deref(), Some("2"));

    let second = db.query("book", &predicate, None, Some("2"), 2).unwrap();
    assert_eq!(ids(&second.documents), ["3", "4"]);

    let last = db.query("book", &predicate, None, Some("4"), 2).unwrap();
    assert_eq!(ids(&last.documents), ["5"]);
    assert!(last.next_start_from.is_none());

    let db = thrillers(4);
    let second = db.query("book", &predicate, None, Some("2"), 2).unwrap();
    assert_eq!(second.documents.len(), 2);
    assert!(second.next_start_from.is_none());
}

#[test]
fn cursor_survives_missing_index_record() {
    let db = thrillers(5);
    db.store.delete("book#2", "book#category.name").unwrap();

    let page = db
        .query("book", &Predicate::eq("category.name", "thriller"), None, Some("2"), 10)
        .unwrap();
    assert_eq!(ids(&page.documents), ["3", "4", "5"]);
}

#[test]
fn missing_cursor_fails_or_restarts() {
    let predicate = Predicate::eq("category.name", "thriller");

    let db = thrillers(3);
    db.delete_document("book", "2").unwrap();
    let err = db.query("book", &predicate, None, Some("2"), 10).unwrap_err();
    assert!(matches!(err, CoreError::CursorNotFound { .. }));

    let db = TestDatabase::books_with_config(
        Config::new().missing_cursor(MissingCursorPolicy::Restart),
    );
    for i in 1..=3 {
        db.create_document("book", book(&i.to_string(), Some("thriller"), None, None))
            .unwrap();
    }
    db.delete_document("book", "2").unwrap();
    let page = db.query("book", &predicate, None, Some("2"), 10).unwrap();
    assert_eq!(ids(&page.documents), ["1", "3"]);
}

#[test]
fn write_optimized_index_reads_base_records() {
    let db = TestDatabase::books();
    db.create_index(
        Index::new("book", ["genre"])
            .unwrap()
            .configuration(IndexConfiguration::OptimizeWrite),
    )
    .unwrap();
    db.create_document("book", json!({"isbn": "1", "genre": "noir", "title": "Roseanna"}))
        .unwrap();
    db.create_document("book", json!({"isbn": "2", "genre": "noir"}))
        .unwrap();

    // an index record whose base record vanished is skipped
    db.store.delete("book#2", "book").unwrap();

    let found = db
        .query_all("book", &Predicate::eq("genre", "noir"), None, 0)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["title"], "Roseanna");
}

#[test]
fn ordered_index_scans_by_ordering_value() {
    let db = TestDatabase::memory();
    db.create_collection(Collection::new("film", "id")).unwrap();
    db.create_index(Index::new("film", ["genre"]).unwrap().ordering_key("year").unwrap())
        .unwrap();
    for (id, year) in [("a", "1979"), ("b", "1968"), ("c", "1972")] {
        db.create_document("film", json!({"id": id, "genre": "scifi", "year": year}))
            .unwrap();
    }

    let predicate = Predicate::eq("genre", "scifi");
    let (plan, _) = db.plan("film", &predicate, None).unwrap();
    assert_eq!(
        plan,
        ScanPlan::PrefixScan {
            sort_key: "film#genre".into(),
            prefix: "scifi#".into(),
        }
    );

    let found = db.query_all("film", &predicate, None, 2).unwrap();
    let order: Vec<_> = found.iter().map(|f| f["id"].as_str().unwrap()).collect();
    assert_eq!(order, ["b", "c", "a"]);
}
