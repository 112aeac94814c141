//! Records command implementation.

use super::fixture;
use colonnade_storage::Record;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

/// One physical record as printed.
#[derive(Debug, Serialize)]
pub struct RecordView {
    /// Partition key.
    pub partition_key: String,
    /// Sort key.
    pub sort_key: String,
    /// Sort value.
    pub sort_value: String,
    /// Decoded document copy, if the record carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl RecordView {
    fn new(record: &Record) -> Self {
        Self {
            partition_key: record.partition_key.clone(),
            sort_key: record.sort_key.clone(),
            sort_value: record.sort_value.clone(),
            payload: record
                .payload
                .as_deref()
                .and_then(|p| serde_json::from_slice(p).ok()),
        }
    }
}

/// Runs the records command.
pub fn run(path: &Path, sort_key: Option<&str>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = fixture::load(path)?;
    let views = collect(&loaded.store.records(), sort_key);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        _ => {
            print_text_output(&views);
        }
    }
    Ok(())
}

/// Projection order: grouped by sort key, then by sort value.
fn collect(records: &[Record], sort_key: Option<&str>) -> Vec<RecordView> {
    let mut selected: Vec<&Record> = records
        .iter()
        .filter(|r| sort_key.map_or(true, |k| r.sort_key == k))
        .collect();
    selected.sort_by(|a, b| {
        (&a.sort_key, &a.sort_value, &a.partition_key).cmp(&(&b.sort_key, &b.sort_value, &b.partition_key))
    });
    selected.into_iter().map(RecordView::new).collect()
}

fn print_text_output(views: &[RecordView]) {
    println!("{:<32} {:<32} {:<32} PAYLOAD", "PARTITION KEY", "SORT KEY", "SORT VALUE");
    for view in views {
        let payload = view
            .payload
            .as_ref()
            .map_or_else(|| "-".to_owned(), Value::to_string);
        println!(
            "{:<32} {:<32} {:<32} {}",
            view.partition_key, view.sort_key, view.sort_value, payload
        );
    }
    println!("{} record(s)", views.len());
}
