//! Plan command implementation.

use super::fixture;
use colonnade_core::{Index, ScanPlan};
use serde::Serialize;
use std::path::Path;

/// A compiled plan with the index it scans.
#[derive(Debug, Serialize)]
pub struct PlanResult {
    /// Collection queried.
    pub collection: String,
    /// Name of the scanned index, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// The plan.
    pub plan: ScanPlan,
}

impl PlanResult {
    fn new(collection: &str, plan: ScanPlan, index: Option<&Index>) -> Self {
        Self {
            collection: collection.to_owned(),
            index: index.map(Index::name),
            plan,
        }
    }
}

/// Runs the plan command.
pub fn run(
    path: &Path,
    collection: &str,
    predicate: &str,
    index: Option<&str>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let predicate = fixture::parse_predicate(predicate)?;
    let loaded = fixture::load(path)?;
    let (plan, chosen) = loaded.db.plan(collection, &predicate, index)?;
    let result = PlanResult::new(collection, plan, chosen.as_ref());

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("Collection: {}", result.collection);
            println!("Index:      {}", result.index.as_deref().unwrap_or("-"));
            println!("Plan:       {}", result.plan);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_shape() {
        let index = Index::new("book", ["genre"]).unwrap();
        let plan = ScanPlan::ExactMatch {
            sort_key: "book#genre".into(),
            value: "scifi".into(),
        };
        let result = PlanResult::new("book", plan, Some(&index));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "collection": "book",
                "index": "book__genre",
                "plan": {"kind": "exact_match", "sort_key": "book#genre", "value": "scifi"}
            })
        );
    }

    #[test]
    fn full_scan_has_no_index() {
        let plan = ScanPlan::FullScan {
            sort_key: "book".into(),
        };
        let value = serde_json::to_value(PlanResult::new("book", plan, None)).unwrap();
        assert!(value.get("index").is_none());
    }
}
