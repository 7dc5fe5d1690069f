//! Tabular input bound to the root scope.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::{Map, Value as Json};
use tracing::info;

use crate::kernel::values::Value;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

// Either an explicit table or a list of records keyed by column name.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDataset {
    Table {
        #[serde(default)]
        columns: Vec<String>,
        rows: Vec<Vec<Json>>,
    },
    Records(Vec<Map<String, Json>>),
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Read a dataset from a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> Result<Dataset> {
        let src = std::fs::read_to_string(path)
            .with_context(|| format!("reading dataset {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let data = match ext.as_str() {
            "yaml" | "yml" => Dataset::from_raw(serde_yaml::from_str(&src)?),
            "json" | "" => Dataset::from_json_str(&src)?,
            other => bail!("dataset format unsupported: {other}"),
        };
        info!(
            path = %path.display(),
            rows = data.rows.len(),
            columns = data.columns.len(),
            "dataset loaded"
        );
        Ok(data)
    }

    pub fn from_json_str(src: &str) -> Result<Dataset> {
        Ok(Dataset::from_raw(serde_json::from_str(src)?))
    }

    fn from_raw(raw: RawDataset) -> Dataset {
        match raw {
            RawDataset::Table { columns, rows } => Dataset {
                columns,
                rows: rows
                    .iter()
                    .map(|r| r.iter().map(Value::from_json).collect())
                    .collect(),
            },
            RawDataset::Records(records) => {
                // columns in first-seen order across all records
                let mut columns: Vec<String> = Vec::new();
                for rec in &records {
                    for key in rec.keys() {
                        if !columns.contains(key) {
                            columns.push(key.clone());
                        }
                    }
                }
                let rows = records
                    .iter()
                    .map(|rec| {
                        columns
                            .iter()
                            .map(|c| rec.get(c).map(Value::from_json).unwrap_or(Value::Unit))
                            .collect()
                    })
                    .collect();
                Dataset { columns, rows }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn table_form() -> Result<()> {
        let data = Dataset::from_json_str(r#"{"columns":["city","pop"],"rows":[["Oslo",709],["Bergen",286]]}"#)?;
        assert_eq!(data.columns, vec!["city", "pop"]);
        assert_eq!(data.rows[1], vec![Value::from("Bergen"), Value::Num(286.0)]);
        Ok(())
    }

    #[test]
    fn records_keep_first_seen_column_order() -> Result<()> {
        let data = Dataset::from_json_str(r#"[{"name":"a","score":3},{"score":5,"extra":true}]"#)?;
        assert_eq!(data.columns, vec!["name", "score", "extra"]);
        assert_eq!(data.rows[0][2], Value::Unit);
        assert_eq!(data.rows[1][0], Value::Unit);
        assert_eq!(data.rows[1][1], Value::Num(5.0));
        Ok(())
    }

    #[test]
    fn loads_yaml_and_rejects_unknown_formats() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let yaml = dir.path().join("sales.yaml");
        fs::write(&yaml, "columns: [month, total]\nrows:\n  - [jan, 10]\n  - [feb, 12]\n")?;
        let data = Dataset::load(&yaml)?;
        assert_eq!(data.rows.len(), 2);
        assert_eq!(data.rows[0][0], Value::from("jan"));

        let csv = dir.path().join("sales.csv");
        fs::write(&csv, "month,total\n")?;
        let err = Dataset::load(&csv).unwrap_err();
        assert!(err.to_string().contains("unsupported"));
        Ok(())
    }
}
