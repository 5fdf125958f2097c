use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Zero-based line/character position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CanonicalPosition {
    pub line: u64,
    pub character: u64,
}

impl CanonicalPosition {
    #[must_use]
    pub const fn new(line: u64, character: u64) -> Self {
        Self { line, character }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CanonicalRange {
    pub start: Option<CanonicalPosition>,
    pub end: Option<CanonicalPosition>,
}

impl CanonicalRange {
    #[must_use]
    pub const fn new(start: CanonicalPosition, end: CanonicalPosition) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }
}

/// Symbol kind: an integer code when one could be recovered, otherwise the
/// original value as found in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum SymbolKind {
    Code(i64),
    Raw(serde_json::Value),
}

/// One normalized code symbol and its nested outline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalSymbol {
    pub name: String,
    pub kind: Option<SymbolKind>,
    pub detail: String,
    pub range: Option<CanonicalRange>,
    pub selection_range: Option<CanonicalRange>,
    pub children: Vec<CanonicalSymbol>,
}

impl CanonicalSymbol {
    /// Symbol with every optional field absent
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            detail: String::new(),
            range: None,
            selection_range: None,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: i64) -> Self {
        self.kind = Some(SymbolKind::Code(kind));
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    #[must_use]
    pub fn with_range(mut self, range: CanonicalRange) -> Self {
        self.range = Some(range);
        self
    }

    #[must_use]
    pub fn with_selection_range(mut self, range: CanonicalRange) -> Self {
        self.selection_range = Some(range);
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<CanonicalSymbol>) -> Self {
        self.children = children;
        self
    }
}

/// Entry of the directory tree built from the decoded file paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PathTreeNode {
    File {
        name: String,
        path: String,
    },
    Directory {
        name: String,
        path: String,
        children: Vec<PathTreeNode>,
    },
}

impl PathTreeNode {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Directory { name, .. } => name,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::File { path, .. } | Self::Directory { path, .. } => path,
        }
    }

    #[must_use]
    pub const fn is_directory(&self) -> bool {
        matches!(self, Self::Directory { .. })
    }
}

/// The emitted document: file tree, per-file outlines and an optional
/// load error
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecodeResult {
    pub files: Vec<PathTreeNode>,
    pub symbols: BTreeMap<String, Vec<CanonicalSymbol>>,
    pub file_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DecodeResult {
    /// Document for a project without a cache artifact
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Document for an artifact that could not be loaded
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn symbol_serializes_with_camel_case_and_nulls() {
        let symbol = CanonicalSymbol::named("foo").with_kind(12);
        assert_eq!(
            serde_json::to_value(&symbol).unwrap(),
            json!({
                "name": "foo",
                "kind": 12,
                "detail": "",
                "range": null,
                "selectionRange": null,
                "children": []
            })
        );
    }

    #[test]
    fn raw_kind_passes_through() {
        let mut symbol = CanonicalSymbol::named("x");
        symbol.kind = Some(SymbolKind::Raw(json!("Method")));
        assert_eq!(serde_json::to_value(&symbol).unwrap()["kind"], json!("Method"));
    }

    #[test]
    fn tree_nodes_are_tagged_by_type() {
        let node = PathTreeNode::Directory {
            name: "src".into(),
            path: "src".into(),
            children: vec![PathTreeNode::File {
                name: "a.py".into(),
                path: "src/a.py".into(),
            }],
        };
        assert_eq!(
            serde_json::to_value(&node).unwrap(),
            json!({
                "type": "directory",
                "name": "src",
                "path": "src",
                "children": [{"type": "file", "name": "a.py", "path": "src/a.py"}]
            })
        );
    }

    #[test]
    fn error_field_only_when_failed() {
        assert_eq!(
            serde_json::to_value(DecodeResult::empty()).unwrap(),
            json!({"files": [], "symbols": {}, "fileCount": 0})
        );
        let failed = DecodeResult::failed("Ran out of input");
        assert!(failed.is_failure());
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"files": [], "symbols": {}, "fileCount": 0, "error": "Ran out of input"})
        );
    }
}
