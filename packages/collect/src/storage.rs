//! On-disk layout of a collection directory.
//!
//! ```text
//! <raw_dir>/
//!   organizations/<date>_organizations_complete.json
//!   metadata/<date>_organizations_metadata.json
//!   metadata/collection_state.json
//!   collection_reports/<date>_collection_summary.json
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CollectError;

pub const ORGANIZATIONS_DIR: &str = "organizations";
pub const METADATA_DIR: &str = "metadata";
pub const REPORTS_DIR: &str = "collection_reports";

pub const STATE_FILE: &str = "collection_state.json";

/// Suffix shared by every canonical dataset file.
pub const DATASET_SUFFIX: &str = "_organizations_complete.json";

/// File role of the canonical dataset in `files_saved`.
pub const ROLE_MAIN_DATA: &str = "main_data";

/// File role of the metadata-only file in `files_saved`.
pub const ROLE_METADATA: &str = "metadata";

/// Creates the collection subdirectories under `root`.
///
/// # Errors
///
/// Returns [`CollectError::Persistence`] if a directory cannot be created.
pub fn ensure_directories(root: &Path) -> Result<(), CollectError> {
    for dir in [ORGANIZATIONS_DIR, METADATA_DIR, REPORTS_DIR] {
        let path = root.join(dir);
        std::fs::create_dir_all(&path).map_err(|source| CollectError::Persistence {
            path: path.clone(),
            source,
        })?;
        log::debug!("Directory ensured: {}", path.display());
    }
    Ok(())
}

/// `<YYYY-MM-DD>_<base>.json` for today's date.
#[must_use]
pub fn dated_file_name(base: &str) -> String {
    format!("{}_{base}.json", chrono::Utc::now().format("%Y-%m-%d"))
}

#[must_use]
pub fn state_path(root: &Path) -> PathBuf {
    root.join(METADATA_DIR).join(STATE_FILE)
}

/// Serializes `value` as pretty JSON to `path`, returning the byte size.
///
/// Writes to a `.tmp` sibling first and renames it into place so readers
/// never observe a partially written file.
///
/// # Errors
///
/// Returns [`CollectError`] if serialization or any filesystem step fails.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<u64, CollectError> {
    let contents = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    let persistence = |source| CollectError::Persistence {
        path: path.to_path_buf(),
        source,
    };

    std::fs::write(&tmp_path, &contents).map_err(persistence)?;
    std::fs::rename(&tmp_path, path).map_err(persistence)?;

    Ok(contents.len() as u64)
}

/// Reads and deserializes a JSON file.
///
/// # Errors
///
/// Returns [`CollectError`] if the file cannot be read or parsed.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CollectError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CollectError::Persistence {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&contents)?)
}

/// The lexicographically last canonical dataset file in `root`, which is
/// the most recent one given the date-prefixed naming.
#[must_use]
pub fn latest_dataset_file(root: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(root.join(ORGANIZATIONS_DIR)).ok()?;
    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(DATASET_SUFFIX))
        })
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dated_names_follow_pattern() {
        let name = dated_file_name("organizations_complete");
        assert!(name.ends_with(DATASET_SUFFIX));
        assert_eq!(name.len(), "YYYY-MM-DD".len() + DATASET_SUFFIX.len());
    }

    #[test]
    fn latest_dataset_is_last_by_name() {
        let root = std::env::temp_dir().join("uk_solicitors_collect_latest_dataset");
        let _ = std::fs::remove_dir_all(&root);
        ensure_directories(&root).unwrap();

        let orgs = root.join(ORGANIZATIONS_DIR);
        for name in [
            "2024-01-05_organizations_complete.json",
            "2024-03-01_organizations_complete.json",
            "2024-12-31_notes.json",
        ] {
            std::fs::write(orgs.join(name), "{}").unwrap();
        }

        assert_eq!(
            latest_dataset_file(&root),
            Some(orgs.join("2024-03-01_organizations_complete.json"))
        );

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn write_json_replaces_atomically() {
        let root = std::env::temp_dir().join("uk_solicitors_collect_write_json");
        std::fs::create_dir_all(&root).unwrap();
        let path = root.join("value.json");

        write_json(&path, &serde_json::json!({"a": 1})).unwrap();
        let bytes = write_json(&path, &serde_json::json!({"a": 2})).unwrap();

        let back: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(back["a"], 2);
        assert_eq!(bytes, std::fs::metadata(&path).unwrap().len());
        assert!(!path.with_extension("json.tmp").exists());

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn read_failures_name_the_file() {
        let path = std::env::temp_dir()
            .join("uk_solicitors_collect_read_missing")
            .join("absent.json");

        let err = read_json::<serde_json::Value>(&path).unwrap_err();

        assert!(matches!(err, CollectError::Persistence { .. }));
        assert!(
            err.to_string()
                .starts_with(&format!("Failed to access {}: ", path.display()))
        );
    }
}
