//! Placement payload discovery and loading.
//!
//! Stands in for the placements endpoint: a payload is either a single JSON
//! file holding the record array or a directory of such exports whose arrays
//! are concatenated.

use std::path::{Path, PathBuf};

use placement_core::error::{PlacementError, Result};
use placement_core::models::PlacementMetricItem;
use serde_json::Value;
use tracing::{debug, warn};

use crate::normalizer::normalize_placements;

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.json` files recursively under `dir`, sorted by path.
pub fn find_json_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Payload directory does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext == "json")
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load the raw placement payload at `path`.
///
/// A file is parsed as-is (any JSON shape; the normalizer decides what is
/// usable). For a directory, the top-level arrays of every `.json` file are
/// concatenated in path order; unreadable, malformed or non-array files are
/// skipped with a warning.
pub fn load_payload(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(PlacementError::PayloadPathNotFound(path.to_path_buf()));
    }

    if path.is_file() {
        return read_json_file(path);
    }

    let files = find_json_files(path);
    if files.is_empty() {
        return Err(PlacementError::NoPayloadFiles(path.to_path_buf()));
    }

    let mut records: Vec<Value> = Vec::new();
    for file in &files {
        match read_json_file(file) {
            Ok(Value::Array(items)) => records.extend(items),
            Ok(_) => warn!("Skipping {}: top-level value is not an array", file.display()),
            Err(e) => warn!("Skipping {}: {}", file.display(), e),
        }
    }

    debug!(
        "Loaded {} raw records from {} files",
        records.len(),
        files.len()
    );
    Ok(Value::Array(records))
}

/// Load and normalize the placements at `path`.
pub fn load_placements(path: &Path) -> Result<Vec<PlacementMetricItem>> {
    let payload = load_payload(path)?;
    Ok(normalize_placements(&payload))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn read_json_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|source| PlacementError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_find_json_files_recursive_and_sorted() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "b.json", "[]");
        write(tmp.path(), "a.json", "[]");
        write(tmp.path(), "nested/c.json", "[]");
        write(tmp.path(), "notes.txt", "ignored");

        let files = find_json_files(tmp.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names[0].ends_with("a.json"));
        assert!(names[1].ends_with("b.json"));
        assert!(names[2].contains("nested"));
    }

    #[test]
    fn test_find_json_files_nonexistent_path() {
        assert!(find_json_files(Path::new("/definitely/not/here")).is_empty());
    }

    #[test]
    fn test_load_payload_single_file() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "placements.json",
            r#"[{"app_id": 1, "state": "Texas"}]"#,
        );
        let payload = load_payload(&path).unwrap();
        assert_eq!(payload.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_load_payload_single_file_non_array_passes_through() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "placements.json", r#"{"error": "oops"}"#);
        let payload = load_payload(&path).unwrap();
        assert!(payload.is_object());
        assert!(load_placements(&path).unwrap().is_empty());
    }

    #[test]
    fn test_load_payload_directory_concatenates_and_skips_bad_files() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "jan.json", r#"[{"app_id": 1}, {"app_id": 2}]"#);
        write(tmp.path(), "feb.json", r#"[{"app_id": 3}]"#);
        write(tmp.path(), "broken.json", "{not json");
        write(tmp.path(), "meta.json", r#"{"exported": true}"#);

        let payload = load_payload(tmp.path()).unwrap();
        assert_eq!(payload.as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn test_load_payload_missing_path() {
        let err = load_payload(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, PlacementError::PayloadPathNotFound(_)));
    }

    #[test]
    fn test_load_payload_empty_directory() {
        let tmp = TempDir::new().unwrap();
        let err = load_payload(tmp.path()).unwrap_err();
        assert!(matches!(err, PlacementError::NoPayloadFiles(_)));
    }

    #[test]
    fn test_load_payload_malformed_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "placements.json", "[{");
        assert!(matches!(
            load_payload(&path),
            Err(PlacementError::JsonParse(_))
        ));
    }

    #[test]
    fn test_load_placements_normalizes() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "placements.json",
            r#"[{"app_id": 1, "state": "TX", "placementDate": "2024-01-10"}, "junk"]"#,
        );
        let items = load_placements(&path).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].state, "Texas");
    }
}
