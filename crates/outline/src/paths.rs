use std::path::Path;

/// Path of a cache key relative to the project root, with `/` separators.
///
/// The computation is purely lexical, so keys recorded on another machine
/// or platform never touch the local filesystem. Keys outside the root fall
/// back to the raw key with separators normalized.
pub fn relative_to_root(key: &str, root: &Path) -> String {
    let raw = key.replace('\\', "/");
    let root = root.to_string_lossy().replace('\\', "/");

    if !is_absolute(&raw) {
        return match collapse(&raw) {
            Some(segments) if segments.first() != Some(&"..") => join(&segments),
            _ => raw,
        };
    }

    let (Some(key_segments), Some(root_segments)) = (collapse(&raw), collapse(&root)) else {
        return raw;
    };
    if !is_absolute(&root) || !key_segments.starts_with(&root_segments) {
        return raw;
    }
    join(&key_segments[root_segments.len()..])
}

/// POSIX absolute, UNC, or drive-qualified (`C:/...`)
fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    path.starts_with('/')
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

/// Split into segments, dropping `.` and empty parts and folding `..`.
///
/// Returns `None` when `..` climbs above an absolute path's root.
fn collapse(path: &str) -> Option<Vec<&str>> {
    let absolute = is_absolute(path);
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." && !(absolute && segments.len() == 1 && last.ends_with(':')) => {
                    segments.pop();
                }
                _ if absolute => return None,
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }
    Some(segments)
}

fn join(segments: &[&str]) -> String {
    if segments.is_empty() {
        ".".to_string()
    } else {
        segments.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(key: &str, root: &str) -> String {
        relative_to_root(key, Path::new(root))
    }

    #[test]
    fn strips_root_prefix() {
        assert_eq!(rel("/proj/a.py", "/proj"), "a.py");
        assert_eq!(rel("/proj/src/./util/../b.py", "/proj/"), "src/b.py");
        assert_eq!(rel("/proj", "/proj"), ".");
    }

    #[test]
    fn relative_keys_stay_relative() {
        assert_eq!(rel("src/a.py", "/proj"), "src/a.py");
        assert_eq!(rel("src\\win\\a.py", "/proj"), "src/win/a.py");
        assert_eq!(rel("../elsewhere.py", "/proj"), "../elsewhere.py");
    }

    #[test]
    fn keys_outside_root_fall_back_to_raw_key() {
        assert_eq!(rel("/other/a.py", "/proj"), "/other/a.py");
        assert_eq!(rel("/projector/a.py", "/proj"), "/projector/a.py");
        assert_eq!(rel("C:\\work\\a.py", "/proj"), "C:/work/a.py");
    }

    #[test]
    fn windows_roots_are_compared_lexically() {
        assert_eq!(rel("C:\\work\\src\\a.py", "C:\\work"), "src/a.py");
        assert_eq!(rel("D:\\work\\a.py", "C:\\work"), "D:/work/a.py");
    }
}
