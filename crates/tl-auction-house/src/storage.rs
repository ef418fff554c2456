//! JSON output files.
//!
//! Documents are serialized in full before anything touches the disk, then
//! written to a sibling temporary file and renamed over the target, so a
//! failed run never leaves a truncated output behind.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{FetchError, FetchResult};

/// Where one routine writes its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputTarget {
    /// File name without extension, e.g. `item_prices_data`.
    pub stem: &'static str,
    /// Sub-directory of `data/` used for dated snapshots.
    pub snapshot_dir: &'static str,
}

impl OutputTarget {
    /// Path of the output file inside `output_dir`.
    ///
    /// Without a timestamp this is `<output_dir>/<stem>.json`. With one it is
    /// `<output_dir>/data/<snapshot_dir>/<stem>_2024-11-24T17_52_03.878Z.json`
    /// (colons are not allowed in file names everywhere).
    pub fn path(&self, output_dir: &Path, timestamp: Option<DateTime<Utc>>) -> PathBuf {
        match timestamp {
            None => output_dir.join(format!("{}.json", self.stem)),
            Some(at) => output_dir
                .join("data")
                .join(self.snapshot_dir)
                .join(format!(
                    "{}_{}.json",
                    self.stem,
                    at.format("%Y-%m-%dT%H_%M_%S%.3fZ")
                )),
        }
    }
}

/// Serialize `document` as 2-space indented JSON and write it to `path`.
pub fn write_json_pretty<T: Serialize>(path: &Path, document: &T) -> FetchResult<()> {
    let text = serde_json::to_string_pretty(document)
        .map_err(|e| FetchError::Decode(format!("serialization failed: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = temp_sibling(path);
    if let Err(e) = std::fs::write(&tmp, text.as_bytes()) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }

    tracing::debug!("wrote {} bytes to {}", text.len(), path.display());
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    const PRICES: OutputTarget = OutputTarget {
        stem: "item_prices_data",
        snapshot_dir: "item_prices",
    };

    #[test]
    fn test_fixed_path() {
        let path = PRICES.path(Path::new("/out"), None);
        assert_eq!(path, PathBuf::from("/out/item_prices_data.json"));
    }

    #[test]
    fn test_timestamped_path() {
        let at = Utc.with_ymd_and_hms(2024, 11, 24, 17, 52, 3).unwrap()
            + chrono::Duration::milliseconds(878);
        let path = PRICES.path(Path::new("/out"), Some(at));
        assert_eq!(
            path,
            PathBuf::from("/out/data/item_prices/item_prices_data_2024-11-24T17_52_03.878Z.json")
        );
    }

    #[test]
    fn test_write_pretty_two_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");
        write_json_pretty(&path, &json!({ "a": [1], "name": "épée" })).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"a\": [\n    1\n  ],\n  \"name\": \"épée\"\n}");
    }

    #[test]
    fn test_write_overwrites_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_json_pretty(&path, &json!({ "run": 1 })).unwrap();
        write_json_pretty(&path, &json!({ "run": 2 })).unwrap();

        let loaded: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, json!({ "run": 2 }));
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_write_into_file_parent_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let result = write_json_pretty(&blocker.join("doc.json"), &json!({}));
        assert!(matches!(result, Err(FetchError::Io(_))));
    }
}
