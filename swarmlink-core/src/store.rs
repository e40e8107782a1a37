//! Local record tree.
//!
//! # Storage layout
//!
//! ```text
//! <root>/
//!   data/
//!     messages/<messageId>.json
//!     collaborations/<collaborationId>.json
//!     swarms/<swarmId>.json
//!     … one directory per category, one flat JSON object per record
//! ```
//!
//! # API pattern
//!
//! Every function takes an explicit `root: &Path`; tests use `TempDir`
//! fixtures rather than the process working directory.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::classify::is_excluded;
use crate::error::{io_err, CoreError};
use crate::types::{Category, Collaboration, Record, RecordId, Swarm, SwarmId};

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `<root>/data` — pure, no I/O.
pub fn data_dir_at(root: &Path) -> PathBuf {
    root.join("data")
}

/// `<root>/data/<category_dir>` — pure, no I/O.
pub fn category_dir_at(root: &Path, category: Category) -> PathBuf {
    data_dir_at(root).join(category.dir_name())
}

/// `<root>/data/<category_dir>/<id>.json` — pure, no I/O.
pub fn record_path_at(root: &Path, category: Category, id: &RecordId) -> PathBuf {
    category_dir_at(root, category).join(format!("{}.json", id.0))
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read and validate the record file at `path`.
///
/// Returns `CoreError::Parse` (with path context) on malformed JSON and
/// `CoreError::MissingIdentifier` when the category's id field is absent.
pub fn read_record(category: Category, path: &Path) -> Result<Record, CoreError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let value: Value = serde_json::from_str(&contents).map_err(|e| CoreError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    Record::from_value(category, value)
}

/// Load one record by identifier. Returns `Ok(None)` if the file is absent.
pub fn load_record_at(
    root: &Path,
    category: Category,
    id: &RecordId,
) -> Result<Option<Record>, CoreError> {
    let path = record_path_at(root, category, id);
    if !path.exists() {
        return Ok(None);
    }
    read_record(category, &path).map(Some)
}

/// Load a swarm record by identifier. Returns `Ok(None)` if absent.
pub fn load_swarm_at(root: &Path, id: &SwarmId) -> Result<Option<Swarm>, CoreError> {
    match load_record_at(root, Category::Swarm, &RecordId(id.0.clone()))? {
        Some(record) => Ok(Some(record.view()?)),
        None => Ok(None),
    }
}

/// Load a collaboration record by identifier. Returns `Ok(None)` if absent.
pub fn load_collaboration_at(root: &Path, id: &str) -> Result<Option<Collaboration>, CoreError> {
    match load_record_at(root, Category::Collaboration, &RecordId(id.to_owned()))? {
        Some(record) => Ok(Some(record.view()?)),
        None => Ok(None),
    }
}

/// List the record file paths for a category, sorted deterministically.
///
/// Skips excluded files (temp files, aggregate exports). Returns an empty
/// list when the category directory does not exist yet.
pub fn list_record_paths_at(root: &Path, category: Category) -> Result<Vec<PathBuf>, CoreError> {
    let dir = category_dir_at(root, category);
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)
        .map_err(|e| io_err(&dir, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .filter(|p| !is_excluded(p))
        .collect();
    paths.sort();
    Ok(paths)
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Atomically write a record's field map to its canonical path.
///
/// Writes to `<path>.tmp` then renames, so the watcher never observes a
/// half-written record file.
pub fn save_record_at(
    root: &Path,
    category: Category,
    id: &RecordId,
    fields: &Map<String, Value>,
) -> Result<PathBuf, CoreError> {
    let path = record_path_at(root, category, id);
    let dir = category_dir_at(root, category);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let json = serde_json::to_string_pretty(&Value::Object(fields.clone()))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_json(root: &Path, category: Category, name: &str, value: &Value) {
        let dir = category_dir_at(root, category);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), serde_json::to_string(value).unwrap()).unwrap();
    }

    #[test]
    fn load_missing_record_is_none() {
        let tmp = TempDir::new().unwrap();
        let loaded =
            load_record_at(tmp.path(), Category::Message, &RecordId::from("m9")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn read_record_rejects_malformed_json_with_path_context() {
        let tmp = TempDir::new().unwrap();
        let dir = category_dir_at(tmp.path(), Category::Message);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("m1.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = read_record(Category::Message, &path).unwrap_err();
        assert!(err.to_string().contains("m1.json"));
    }

    #[test]
    fn typed_swarm_and_collaboration_lookups() {
        let tmp = TempDir::new().unwrap();
        write_json(
            tmp.path(),
            Category::Swarm,
            "B.json",
            &json!({"swarmId": "B", "telegramChatId": "chatB"}),
        );
        write_json(
            tmp.path(),
            Category::Collaboration,
            "c1.json",
            &json!({"collaborationId": "c1", "clientSwarmId": "B", "providerSwarmId": "A"}),
        );

        let swarm = load_swarm_at(tmp.path(), &SwarmId::from("B"))
            .unwrap()
            .expect("swarm exists");
        assert_eq!(swarm.telegram_chat_id.as_deref(), Some("chatB"));

        let collab = load_collaboration_at(tmp.path(), "c1")
            .unwrap()
            .expect("collaboration exists");
        assert_eq!(collab.client_swarm_id, SwarmId::from("B"));

        assert!(load_swarm_at(tmp.path(), &SwarmId::from("Z")).unwrap().is_none());
    }

    #[test]
    fn list_record_paths_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        write_json(tmp.path(), Category::News, "n2.json", &json!({"newsId": "n2"}));
        write_json(tmp.path(), Category::News, "n1.json", &json!({"newsId": "n1"}));
        let dir = category_dir_at(tmp.path(), Category::News);
        std::fs::write(dir.join("all.json"), "[]").unwrap();
        std::fs::write(dir.join("n3.json.tmp"), "{}").unwrap();
        std::fs::write(dir.join("notes.txt"), "").unwrap();

        let paths = list_record_paths_at(tmp.path(), Category::News).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["n1.json", "n2.json"]);
    }

    #[test]
    fn hidden_root_directories_do_not_hide_records() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join(".swarms");
        write_json(&root, Category::Message, "m1.json", &json!({"messageId": "m1"}));

        let paths = list_record_paths_at(&root, Category::Message).unwrap();
        assert_eq!(paths.len(), 1);
    }

    #[test]
    fn save_record_is_atomic_and_loadable() {
        let tmp = TempDir::new().unwrap();
        let record = Record::from_value(
            Category::Mission,
            json!({"missionId": "mi1", "leadSwarmId": "A", "title": "launch"}),
        )
        .unwrap();

        let path =
            save_record_at(tmp.path(), Category::Mission, &record.id, &record.fields).unwrap();
        assert!(path.ends_with("data/missions/mi1.json"));
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = load_record_at(tmp.path(), Category::Mission, &record.id)
            .unwrap()
            .expect("record exists");
        assert_eq!(loaded.fields, record.fields);
    }
}
