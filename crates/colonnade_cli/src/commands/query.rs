//! Query command implementation.

use super::fixture;
use colonnade_core::encoding::field_value;
use colonnade_core::{Database, Index, Predicate};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

/// Options of the query command.
#[derive(Debug, Default)]
pub struct QueryOptions {
    /// Index to scan instead of selecting one.
    pub index: Option<String>,
    /// Page size, 0 for the default.
    pub limit: usize,
    /// Id to resume after.
    pub start_from: Option<String>,
    /// Follow cursors to the end.
    pub all: bool,
    /// Compare against a filtered full scan.
    pub verify: bool,
}

/// Query output.
#[derive(Debug, Serialize)]
pub struct QueryResult {
    /// Documents in scan order.
    pub documents: Vec<Value>,
    /// Cursor of the next page.
    pub next_start_from: Option<String>,
}

/// Runs the query command.
pub fn run(
    path: &Path,
    collection: &str,
    predicate: &str,
    options: &QueryOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let predicate = fixture::parse_predicate(predicate)?;
    let loaded = fixture::load(path)?;
    let result = execute(&loaded.db, collection, &predicate, options)?;

    if options.verify {
        let mismatches = verify(&loaded.db, collection, &predicate, options, &result)?;
        if !mismatches.is_empty() {
            return Err(format!("verification failed: {}", mismatches.join("; ")).into());
        }
        eprintln!("verified {} document(s) against a full scan", result.documents.len());
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn execute(
    db: &Database,
    collection: &str,
    predicate: &Predicate,
    options: &QueryOptions,
) -> Result<QueryResult, Box<dyn std::error::Error>> {
    let index = options.index.as_deref();
    if options.all {
        if options.start_from.is_some() {
            return Err("--start-from cannot be combined with --all".into());
        }
        let documents = db.query_all(collection, predicate, index, options.limit)?;
        return Ok(QueryResult {
            documents,
            next_start_from: None,
        });
    }
    let page = db.query(
        collection,
        predicate,
        index,
        options.start_from.as_deref(),
        options.limit,
    )?;
    Ok(QueryResult {
        documents: page.documents,
        next_start_from: page.next_start_from,
    })
}

/// Compares the ids returned by the index scan with those of a filtered
/// full scan. A single page is compared as a subset.
fn verify(
    db: &Database,
    collection: &str,
    predicate: &Predicate,
    options: &QueryOptions,
    result: &QueryResult,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let id_key = db.collection(collection)?.id_key;
    let (_, index) = db.plan(collection, predicate, options.index.as_deref())?;
    let everything = db.query_all(collection, &Predicate::any_match(), None, 0)?;

    let expected: BTreeSet<String> = everything
        .iter()
        .filter(|d| predicate.matches(d) && covered(index.as_ref(), d))
        .filter_map(|d| id_of(d, &id_key))
        .collect();
    let returned: BTreeSet<String> = result
        .documents
        .iter()
        .filter_map(|d| id_of(d, &id_key))
        .collect();

    let mut mismatches: Vec<String> = returned
        .difference(&expected)
        .map(|id| format!("{id} returned but does not match"))
        .collect();
    if options.all {
        mismatches.extend(
            expected
                .difference(&returned)
                .map(|id| format!("{id} matches but was not returned")),
        );
    }
    Ok(mismatches)
}

/// Sparse indexes only hold documents carrying every condition field.
fn covered(index: Option<&Index>, document: &Value) -> bool {
    index.map_or(true, |i| {
        i.conditions
            .iter()
            .all(|c| field_value(document, c).is_some())
    })
}

fn id_of(document: &Value, id_key: &str) -> Option<String> {
    field_value(document, id_key).map(|v| v.canonical())
}
