//! JSON dataset persistence
//!
//! Datasets are written once, at the end of a run. The array goes to a
//! temporary file beside the destination and is renamed into place, so a
//! reader never observes a half-written file.

use crate::extract::{ProductLink, Record};
use crate::{Result, SweepError};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Writes `records` as a pretty-printed JSON array
///
/// Non-ASCII text is kept as UTF-8. Nothing is written for an empty slice.
///
/// # Returns
///
/// * `Ok(true)` - The file was written
/// * `Ok(false)` - There were no records, nothing was written
/// * `Err(SweepError)` - Serialization or file system failure
pub fn write_records<R: Record>(path: &Path, records: &[R]) -> Result<bool> {
    if records.is_empty() {
        tracing::warn!("No records collected, not writing {}", path.display());
        return Ok(false);
    }

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(directory)?;

    let file = NamedTempFile::new_in(directory)?;
    {
        let mut writer = BufWriter::new(file.as_file());
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    file.persist(path)
        .map_err(|e| SweepError::Output(format!("failed to persist {}: {}", path.display(), e)))?;

    tracing::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(true)
}

/// Reads the product links consumed by the details pass
///
/// Each entry needs a `link` key; any other keys are ignored.
pub fn load_links(path: &Path) -> Result<Vec<ProductLink>> {
    let text = fs::read_to_string(path)?;
    let links: Vec<ProductLink> = serde_json::from_str(&text)?;
    tracing::info!("Loaded {} product links from {}", links.len(), path.display());
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{CountRecord, DetailRecord};
    use tempfile::tempdir;

    #[test]
    fn test_write_pretty_utf8_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("details.json");
        let records = vec![DetailRecord {
            link: "https://hikoco.co.nz/products/one".to_string(),
            name: "어성초 Heartleaf Toner".to_string(),
            price: None,
            ingredients: None,
        }];

        assert!(write_records(&path, &records).unwrap());

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n  {\n"));
        assert!(text.contains("어성초"));
        assert!(text.contains("\"price\": null"));
    }

    #[test]
    fn test_count_record_key_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("total-products.json");
        let records = vec![CountRecord {
            page: "https://hikoco.co.nz/collections/abib".to_string(),
            total_products: 42,
        }];

        write_records(&path, &records).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"Total products\": 42"));
    }

    #[test]
    fn test_empty_dataset_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.json");
        assert!(!write_records::<DetailRecord>(&path, &[]).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_overwrites_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("links.json");
        fs::write(&path, "stale").unwrap();

        let records = vec![DetailRecord {
            link: "https://hikoco.co.nz/products/two".to_string(),
            name: "Two".to_string(),
            price: Some("$10.00".to_string()),
            ingredients: None,
        }];
        write_records(&path, &records).unwrap();

        let back: Vec<DetailRecord> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn test_load_links_ignores_extra_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("product-links.json");
        fs::write(
            &path,
            r#"[{"link": "https://hikoco.co.nz/products/one", "name": "One"}, {"link": "https://hikoco.co.nz/products/two"}]"#,
        )
        .unwrap();

        let links = load_links(&path).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].link, "https://hikoco.co.nz/products/two");
    }

    #[test]
    fn test_load_links_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_links(&dir.path().join("absent.json")),
            Err(SweepError::Io(_))
        ));
    }
}
