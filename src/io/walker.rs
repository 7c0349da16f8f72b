//! Source file discovery.

use crate::analyzers::SourceUnit;
use crate::core::types::Language;
use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const SKIP_DIRS: &[&str] = &["node_modules", ".git", "dist", "build", "coverage"];

/// Collect every analyzable file under `root`. A single file path yields
/// itself when its extension is supported.
pub fn find_source_files(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return match language_of(root) {
            Some(_) => vec![root.to_path_buf()],
            None => Vec::new(),
        };
    }

    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| !SKIP_DIRS.contains(&name))
                .unwrap_or(true)
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| language_of(path).is_some())
        .collect()
}

pub fn language_of(path: &Path) -> Option<Language> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(Language::from_extension)
}

/// Load every discovered file as a source unit; unreadable files are
/// logged and skipped
pub fn load_units(root: &Path) -> Result<Vec<SourceUnit>> {
    let mut units = Vec::new();
    for path in find_source_files(root) {
        match SourceUnit::from_path(&path) {
            Ok(unit) => units.push(unit),
            Err(e) => log::warn!("skipping {}: {}", path.display(), e),
        }
    }
    Ok(units)
}
