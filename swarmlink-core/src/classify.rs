//! Path classification: map a changed path to its record category.
//!
//! Pure functions over path segments. The dispatcher drops unclassifiable
//! paths before they reach the stability detector, so everything here must
//! stay cheap and infallible.

use std::path::{Component, Path};

use crate::types::Category;

/// Aggregate export files written next to the per-record files by the bulk
/// fetch tooling. They are derived data and must never re-enter the pipeline.
const AGGREGATE_EXPORTS: [&str; 3] = ["all.json", "simplified.json", "by_id.json"];

/// True for file names the watcher must ignore: hidden files, editor temp
/// files, and aggregate exports.
///
/// Judged on the file name alone. Ancestors are deliberately not inspected:
/// a data root under a hidden directory (`~/.local/share/...`) is a legal
/// configuration, and paths outside the category directories are rejected
/// by [`classify_at`] instead.
pub fn is_excluded(path: &Path) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };
    if file_name.starts_with('.')
        || file_name.ends_with('~')
        || AGGREGATE_EXPORTS.contains(&file_name)
    {
        return true;
    }
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("tmp") | Some("swp")
    )
}

/// Classify `path` against the category table, relative to the data
/// directory at `<root>/data`. Returns `None` for excluded paths, non-JSON
/// files, and paths outside recognized category directories.
pub fn classify_at(root: &Path, path: &Path) -> Option<Category> {
    if is_excluded(path) {
        return None;
    }
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return None;
    }

    let data = root.join("data");
    let relative = path.strip_prefix(&data).ok()?;
    let mut components = relative.components();
    let Component::Normal(dir) = components.next()? else {
        return None;
    };
    // Exactly <category_dir>/<file>.json — nested trees are not record files.
    match components.next() {
        Some(Component::Normal(_)) if components.next().is_none() => {}
        _ => return None,
    }
    Category::from_dir_name(dir.to_str()?)
}
