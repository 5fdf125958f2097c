use crate::config::OutlineConfig;
use crate::paths::relative_to_root;
use std::path::Path;
use symcache_pickle::RawNode;

/// One per-file entry of the cache, keyed by its root-relative path
#[derive(Debug, Clone)]
pub struct FileEntry<'g> {
    pub path: String,
    pub value: RawNode<'g>,
}

/// Locate the per-file mapping inside a loaded cache and list its entries
/// in artifact order.
///
/// A top-level mapping holding the envelope key with a mapping value is
/// unwrapped once. Anything that is not a mapping yields no entries.
pub fn resolve_files<'g>(
    root: RawNode<'g>,
    project_root: &Path,
    config: &OutlineConfig,
) -> Vec<FileEntry<'g>> {
    let mapping = match root.get_key(&config.envelope_key) {
        Some(inner) if root.is_mapping() && inner.is_mapping() => inner,
        _ => root,
    };

    let Some(entries) = mapping.entries() else {
        log::debug!("cache root is not a mapping ({:?}); no files", mapping.shape());
        return Vec::new();
    };

    let mut files = Vec::new();
    for (key, value) in entries {
        if key.as_str() == Some(config.version_key.as_str()) {
            continue;
        }
        let raw_key = key.display();
        let path = relative_to_root(&raw_key, project_root);
        if path != raw_key {
            log::debug!("cache key {raw_key} -> {path}");
        }
        files.push(FileEntry { path, value });
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use symcache_pickle::{load, LoaderConfig};

    fn paths(bytes: &[u8]) -> Vec<String> {
        let graph = load(bytes, &LoaderConfig::default()).unwrap();
        resolve_files(graph.root(), Path::new("/proj"), &OutlineConfig::default())
            .into_iter()
            .map(|entry| entry.path)
            .collect()
    }

    #[test]
    fn unwraps_envelope_and_skips_version_key() {
        // {"__cache_version": 1, "obj": {"/proj/a.py": [], "/elsewhere/b.py": []}}
        let bytes = b"\x80\x02}q\x00(X\x0f\x00\x00\x00__cache_versionq\x01K\x01X\x03\x00\x00\x00objq\x02}q\x03(X\n\x00\x00\x00/proj/a.pyq\x04]q\x05X\x0f\x00\x00\x00/elsewhere/b.pyq\x06]q\x07uu.";
        assert_eq!(paths(bytes), vec!["a.py", "/elsewhere/b.py"]);
    }

    #[test]
    fn plain_mapping_is_used_directly() {
        // {"__cache_version": 1, "src\\a.py": []}
        let bytes = b"\x80\x02}q\x00(X\x0f\x00\x00\x00__cache_versionq\x01K\x01X\x08\x00\x00\x00src\\a.pyq\x02]q\x03u.";
        assert_eq!(paths(bytes), vec!["src/a.py"]);
    }

    #[test]
    fn envelope_with_non_mapping_value_is_not_unwrapped() {
        // {"obj": [1]}
        let bytes = b"\x80\x02}q\x00X\x03\x00\x00\x00objq\x01]q\x02K\x01as.";
        assert_eq!(paths(bytes), vec!["obj"]);
    }

    #[test]
    fn non_mapping_roots_have_no_files() {
        assert!(paths(b"\x80\x02]q\x00K\x01a.").is_empty());
        assert!(paths(b"N.").is_empty());
    }
}
