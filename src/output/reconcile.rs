//! Expected-versus-scraped product totals
//!
//! Compares the per-collection totals written by the count pipeline with the
//! number of records the catalog pipeline collected.

use crate::{Result, SweepError};
use serde_json::Value;
use std::fs;
use std::path::Path;

const TOTAL_KEY: &str = "Total products";

/// Outcome of a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Collection pages in the count file
    pub pages: usize,
    /// Sum of their product totals
    pub expected: u64,
    /// Records in the catalog file
    pub scraped: usize,
}

impl ReconcileReport {
    /// Expected products the catalog run did not collect; negative when it collected more
    pub fn missing(&self) -> i64 {
        self.expected as i64 - self.scraped as i64
    }
}

fn read_array(path: &Path) -> Result<Vec<Value>> {
    let text = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&text)? {
        Value::Array(items) => Ok(items),
        _ => Err(SweepError::Output(format!(
            "{} does not contain a JSON array",
            path.display()
        ))),
    }
}

/// Reads one `Total products` value, accepting integers and numeric strings
fn total_of(entry: &Value) -> Option<u64> {
    match entry.get(TOTAL_KEY)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Sums expected totals and counts scraped records
///
/// # Arguments
///
/// * `count_path` - Output of the count pipeline
/// * `catalog_path` - Output of the catalog pipeline
///
/// # Errors
///
/// Fails when either file is unreadable, is not a JSON array, or holds a
/// count entry without a usable `Total products` value.
pub fn reconcile(count_path: &Path, catalog_path: &Path) -> Result<ReconcileReport> {
    let counts = read_array(count_path)?;
    let scraped = read_array(catalog_path)?.len();

    let mut expected = 0u64;
    for (index, entry) in counts.iter().enumerate() {
        let total = total_of(entry).ok_or_else(|| {
            SweepError::Output(format!(
                "entry {} of {} has no numeric '{}'",
                index,
                count_path.display(),
                TOTAL_KEY
            ))
        })?;
        expected = expected.saturating_add(total);
    }

    Ok(ReconcileReport {
        pages: counts.len(),
        expected,
        scraped,
    })
}

/// Prints a reconciliation report to stdout
pub fn print_reconcile(report: &ReconcileReport) {
    println!("=== Reconciliation ===\n");
    println!("  Collection pages: {}", report.pages);
    println!("  Total products: {}", report.expected);
    println!("  Total scraped products: {}", report.scraped);
    match report.missing() {
        0 => println!("  All expected products were scraped"),
        n if n > 0 => println!("  Missing: {}", n),
        n => println!("  Extra: {}", -n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sums_ints_and_numeric_strings() {
        let dir = tempdir().unwrap();
        let counts = dir.path().join("total-products.json");
        let catalog = dir.path().join("product-links.json");
        fs::write(
            &counts,
            r#"[{"page": "a", "Total products": 12}, {"page": "b", "Total products": " 30 "}]"#,
        )
        .unwrap();
        fs::write(&catalog, r#"[{"link": "x"}, {"link": "y"}, {"link": "z"}]"#).unwrap();

        let report = reconcile(&counts, &catalog).unwrap();
        assert_eq!(
            report,
            ReconcileReport {
                pages: 2,
                expected: 42,
                scraped: 3
            }
        );
        assert_eq!(report.missing(), 39);
    }

    #[test]
    fn test_rejects_non_numeric_total() {
        let dir = tempdir().unwrap();
        let counts = dir.path().join("counts.json");
        let catalog = dir.path().join("catalog.json");
        fs::write(&counts, r#"[{"page": "a", "Total products": "many"}]"#).unwrap();
        fs::write(&catalog, "[]").unwrap();

        assert!(matches!(
            reconcile(&counts, &catalog),
            Err(SweepError::Output(_))
        ));
    }

    #[test]
    fn test_rejects_non_array_file() {
        let dir = tempdir().unwrap();
        let counts = dir.path().join("counts.json");
        let catalog = dir.path().join("catalog.json");
        fs::write(&counts, "[]").unwrap();
        fs::write(&catalog, r#"{"link": "x"}"#).unwrap();

        assert!(reconcile(&counts, &catalog).is_err());
    }

    #[test]
    fn test_extra_records_give_negative_missing() {
        let report = ReconcileReport {
            pages: 1,
            expected: 2,
            scraped: 5,
        };
        assert_eq!(report.missing(), -3);
    }
}
