use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

pub const DEFAULT_CACHE_SUBDIR: &str = ".serena/cache";
pub const DEFAULT_ARTIFACT_NAME: &str = "document_symbols.pkl";

/// Newest file named `file_name` anywhere under `<project_root>/<cache_subdir>`.
///
/// Files whose modification time cannot be read rank as oldest. A missing
/// cache directory yields `None`.
pub fn find_artifact(project_root: &Path, cache_subdir: &str, file_name: &str) -> Option<PathBuf> {
    let cache_dir = project_root.join(cache_subdir);
    if !cache_dir.is_dir() {
        log::debug!("No cache directory at {}", cache_dir.display());
        return None;
    }

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for result in WalkDir::new(&cache_dir).sort_by_file_name() {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Failed to read entry: {e}");
                continue;
            }
        };
        if entry.file_name() != file_name || !entry.path().is_file() {
            continue;
        }
        let mtime = entry
            .path()
            .metadata()
            .and_then(|meta| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        log::debug!("Candidate artifact {}", entry.path().display());
        if newest.as_ref().map_or(true, |(best, _)| mtime > *best) {
            newest = Some((mtime, entry.into_path()));
        }
    }

    newest.map(|(_, path)| path)
}
