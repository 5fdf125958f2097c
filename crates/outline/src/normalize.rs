use crate::access::{coerce_int, has_field, lenient_text, resolve_field, resolve_value};
use crate::config::OutlineConfig;
use crate::types::{CanonicalPosition, CanonicalRange, CanonicalSymbol, SymbolKind};
use serde_json::Value as Json;
use symcache_pickle::{RawNode, Shape, SlotId};

/// Fields that mark a sequence element as the symbol container
const CONTAINER_FIELDS: [&str; 2] = ["root_symbols", "symbols"];

const NAME: [&str; 3] = ["name", "symbol_name", "identifier"];
const KIND: [&str; 2] = ["kind", "symbol_kind"];
const DETAIL: [&str; 2] = ["detail", "signature"];
const CHILDREN: [&str; 2] = ["children", "child_symbols"];
const RANGE: [&str; 1] = ["range"];
const SELECTION_RANGE: [&str; 2] = ["selection_range", "selectionRange"];

const LINE: [&str; 3] = ["line", "lineno", "row"];
const CHARACTER: [&str; 3] = ["character", "col", "column"];

/// Converts raw per-file cache values into canonical symbol outlines.
///
/// Every step is total: missing or oddly shaped fields fall back to their
/// defaults instead of failing the file.
///
/// One normalizer serves a whole artifact: its symbol budget
/// (`max_symbols`) is shared by every file it normalizes.
pub struct Normalizer<'c> {
    config: &'c OutlineConfig,
    /// Children dropped for exceeding `max_depth` in the current file
    truncated: usize,
    /// Symbols dropped in the current file once the budget ran out
    over_budget: usize,
    /// Symbols left before the budget runs out
    remaining: usize,
}

impl<'c> Normalizer<'c> {
    pub fn new(config: &'c OutlineConfig) -> Self {
        Self {
            config,
            truncated: 0,
            over_budget: 0,
            remaining: config.max_symbols,
        }
    }

    /// Normalize the cache value stored for one file.
    pub fn normalize_file(&mut self, path: &str, value: RawNode<'_>) -> Vec<CanonicalSymbol> {
        self.truncated = 0;
        self.over_budget = 0;
        let symbols = match select_container(value) {
            Some(container) => {
                let collection = resolve_field(container, self.config.collection_aliases.as_slice())
                    .unwrap_or(container);
                self.symbol_list(collection)
            }
            None => Vec::new(),
        };
        if self.truncated > 0 {
            log::warn!(
                "{path}: dropped {} symbol(s) nested deeper than {}",
                self.truncated,
                self.config.max_depth
            );
        }
        if self.over_budget > 0 {
            log::warn!(
                "{path}: dropped {} symbol(s) past the limit of {} per artifact",
                self.over_budget,
                self.config.max_symbols
            );
        }
        symbols
    }

    /// Claim one symbol from the budget
    fn admit(&mut self) -> bool {
        if self.remaining == 0 {
            self.over_budget += 1;
            return false;
        }
        self.remaining -= 1;
        true
    }

    /// A sequence is normalized element by element; any other non-null
    /// value is a single symbol.
    fn symbol_list(&mut self, value: RawNode<'_>) -> Vec<CanonicalSymbol> {
        let mut ancestors = Vec::new();
        let candidates: Vec<RawNode<'_>> = match value.sequence() {
            Some(items) => items.filter(|item| !item.is_null()).collect(),
            None if value.is_null() => Vec::new(),
            None => vec![value],
        };
        let mut out = Vec::with_capacity(candidates.len());
        for item in candidates {
            if self.admit() {
                out.push(self.symbol(item, &mut ancestors, 0));
            }
        }
        out
    }

    fn symbol(
        &mut self,
        node: RawNode<'_>,
        ancestors: &mut Vec<SlotId>,
        depth: usize,
    ) -> CanonicalSymbol {
        let name = resolve_value(node, &NAME)
            .map(lenient_text)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.config.unknown_symbol_name.clone());

        let kind = resolve_value(node, &KIND).and_then(|kind| match coerce_int(kind) {
            Some(code) => Some(SymbolKind::Code(code)),
            None => match kind.to_json() {
                Json::Null => None,
                raw => Some(SymbolKind::Raw(raw)),
            },
        });

        let detail = resolve_value(node, &DETAIL)
            .map(lenient_text)
            .unwrap_or_default();

        let range = resolve_field(node, &RANGE).and_then(normalize_range);
        let selection_range = resolve_field(node, &SELECTION_RANGE).and_then(normalize_range);

        let children = match resolve_value(node, &CHILDREN) {
            Some(children) => {
                if let Some(id) = node.slot_id() {
                    ancestors.push(id);
                }
                let out = self.children(children, ancestors, depth + 1);
                if node.slot_id().is_some() {
                    ancestors.pop();
                }
                out
            }
            None => Vec::new(),
        };

        CanonicalSymbol {
            name,
            kind,
            detail,
            range,
            selection_range,
            children,
        }
    }

    fn children(
        &mut self,
        value: RawNode<'_>,
        ancestors: &mut Vec<SlotId>,
        depth: usize,
    ) -> Vec<CanonicalSymbol> {
        let candidates: Vec<RawNode<'_>> = match value.sequence() {
            Some(items) => items.filter(|item| !item.is_null()).collect(),
            None if matches!(value.shape(), Shape::Mapping | Shape::Object) => vec![value],
            None => Vec::new(),
        };
        if candidates.is_empty() {
            return Vec::new();
        }
        if depth >= self.config.max_depth {
            self.truncated += candidates.len();
            return Vec::new();
        }

        let mut out = Vec::with_capacity(candidates.len());
        for child in candidates {
            if child.slot_id().is_some_and(|id| ancestors.contains(&id)) {
                log::debug!("skipping cyclic child symbol at depth {depth}");
                continue;
            }
            if self.admit() {
                out.push(self.symbol(child, ancestors, depth));
            }
        }
        out
    }
}

/// Pick the symbol container out of a per-file value.
///
/// For a sequence (e.g. a `(hash, symbols)` tuple): the first element
/// exposing a collection field, else the first non-text element, else the
/// last element. Anything else is its own container.
fn select_container(value: RawNode<'_>) -> Option<RawNode<'_>> {
    if value.is_null() {
        return None;
    }
    let Some(items) = value.sequence() else {
        return Some(value);
    };
    let items: Vec<RawNode<'_>> = items.collect();
    items
        .iter()
        .find(|item| has_field(**item, &CONTAINER_FIELDS))
        .or_else(|| items.iter().find(|item| !item.is_text_like()))
        .or_else(|| items.last())
        .copied()
}

/// Accepts a mapping, an object with `line`/`character`, or an object with
/// `lineno`/`col_offset`. Missing components are 0.
pub fn normalize_position(node: RawNode<'_>) -> Option<CanonicalPosition> {
    match node.shape() {
        Shape::Mapping => Some(CanonicalPosition::new(
            component(node, &LINE),
            component(node, &CHARACTER),
        )),
        Shape::Object if has_field(node, &["line", "character"]) => Some(CanonicalPosition::new(
            component(node, &["line"]),
            component(node, &["character"]),
        )),
        Shape::Object if has_field(node, &["lineno"]) => Some(CanonicalPosition::new(
            component(node, &["lineno"]),
            component(node, &["col_offset"]),
        )),
        _ => None,
    }
}

/// First non-null alias coerced to a non-negative integer, else 0
fn component(node: RawNode<'_>, aliases: &[&str]) -> u64 {
    aliases
        .iter()
        .find_map(|alias| resolve_value(node, &[alias]))
        .and_then(coerce_int)
        .map_or(0, |value| u64::try_from(value).unwrap_or(0))
}

/// A mapping, or an object exposing both `start` and `end`
pub fn normalize_range(node: RawNode<'_>) -> Option<CanonicalRange> {
    let is_range = match node.shape() {
        Shape::Mapping => true,
        Shape::Object => has_field(node, &["start"]) && has_field(node, &["end"]),
        _ => false,
    };
    is_range.then(|| CanonicalRange {
        start: resolve_field(node, &["start"]).and_then(normalize_position),
        end: resolve_field(node, &["end"]).and_then(normalize_position),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use symcache_pickle::{load, LoaderConfig, ObjectGraph};

    fn graph(bytes: &[u8]) -> ObjectGraph {
        load(bytes, &LoaderConfig::default()).unwrap()
    }

    fn normalize(bytes: &[u8], config: &OutlineConfig) -> Vec<CanonicalSymbol> {
        let g = graph(bytes);
        Normalizer::new(config).normalize_file("a.py", g.root())
    }

    // [{"name": "foo", "kind": 12}, {"name": "bar", "children": [{"name": "baz"}]}, {"name": "qux", "children": []}]
    const FOO_BAR: &[u8] = b"\x80\x02]q\x00(}q\x01(X\x04\x00\x00\x00nameq\x02X\x03\x00\x00\x00fooq\x03X\x04\x00\x00\x00kindq\x04K\x0cu}q\x05(h\x02X\x03\x00\x00\x00barq\x06X\x08\x00\x00\x00childrenq\x07]q\x08}q\th\x02X\x03\x00\x00\x00bazq\nsau}q\x0b(h\x02X\x03\x00\x00\x00quxq\x0ch\x07]q\rue.";

    #[test]
    fn normalizes_nested_mappings_in_order() {
        let symbols = normalize(FOO_BAR, &OutlineConfig::default());
        assert_eq!(
            symbols,
            vec![
                CanonicalSymbol::named("foo").with_kind(12),
                CanonicalSymbol::named("bar").with_children(vec![CanonicalSymbol::named("baz")]),
                CanonicalSymbol::named("qux"),
            ]
        );
    }

    #[test]
    fn depth_limit_drops_deep_children() {
        let config = OutlineConfig {
            max_depth: 1,
            ..Default::default()
        };
        let symbols = normalize(FOO_BAR, &config);
        assert_eq!(symbols[1], CanonicalSymbol::named("bar"));
    }

    #[test]
    fn placeholder_objects_get_sentinel_name() {
        // [pkg.Thing()]
        let symbols = normalize(b"\x80\x02]q\x00cpkg\nThing\nq\x01)\x81q\x02a.", &OutlineConfig::default());
        assert_eq!(symbols, vec![CanonicalSymbol::named("未知符号")]);
    }

    #[test]
    fn positions_accept_every_spelling() {
        // {"line": 3, "character": 7}, {"lineno": 3, "col": 7}, {"row": 3, "column": 7}
        for bytes in [
            &b"\x80\x02}q\x00(X\x04\x00\x00\x00lineq\x01K\x03X\t\x00\x00\x00characterq\x02K\x07u."[..],
            &b"\x80\x02}q\x00(X\x06\x00\x00\x00linenoq\x01K\x03X\x03\x00\x00\x00colq\x02K\x07u."[..],
            &b"\x80\x02}q\x00(X\x03\x00\x00\x00rowq\x01K\x03X\x06\x00\x00\x00columnq\x02K\x07u."[..],
        ] {
            let g = graph(bytes);
            assert_eq!(normalize_position(g.root()), Some(CanonicalPosition::new(3, 7)));
        }

        // ast-style object: Pos() with state {"lineno": 3, "col_offset": 7}
        let g = graph(b"\x80\x02castlike\nPos\nq\x00)\x81q\x01}q\x02(X\x06\x00\x00\x00linenoq\x03K\x03X\n\x00\x00\x00col_offsetq\x04K\x07ub.");
        assert_eq!(normalize_position(g.root()), Some(CanonicalPosition::new(3, 7)));

        // {} and -1 / None components
        let g = graph(b"\x80\x02}q\x00.");
        assert_eq!(normalize_position(g.root()), Some(CanonicalPosition::new(0, 0)));
        let g = graph(b"\x80\x02}q\x00(X\x04\x00\x00\x00lineq\x01J\xff\xff\xff\xffX\t\x00\x00\x00characterq\x02Nu.");
        assert_eq!(normalize_position(g.root()), Some(CanonicalPosition::new(0, 0)));

        assert_eq!(normalize_position(graph(b"K\x03.").root()), None);
        assert_eq!(normalize_position(graph(b"N.").root()), None);
    }

    #[test]
    fn ranges_need_mapping_or_start_and_end() {
        // {"start": {"line": 1, "character": 2}}
        let g = graph(b"\x80\x02}q\x00X\x05\x00\x00\x00startq\x01}q\x02(X\x04\x00\x00\x00lineq\x03K\x01X\t\x00\x00\x00characterq\x04K\x02us.");
        assert_eq!(
            normalize_range(g.root()),
            Some(CanonicalRange {
                start: Some(CanonicalPosition::new(1, 2)),
                end: None,
            })
        );
        // Object carrying only `start`
        let g = graph(b"\x80\x02cpkg\nR\nq\x00)\x81q\x01}q\x02X\x05\x00\x00\x00startq\x03Nsb.");
        assert_eq!(normalize_range(g.root()), None);
        assert_eq!(normalize_range(graph(b"]q\x00.").root()), None);
    }

    #[test]
    fn container_selection_prefers_collection_fields() {
        // ("hash", {"symbols": [{"name": "a"}]})
        let bytes = b"\x80\x02X\x04\x00\x00\x00hashq\x00}q\x01X\x07\x00\x00\x00symbolsq\x02]q\x03}q\x04X\x04\x00\x00\x00nameq\x05X\x01\x00\x00\x00aq\x06sas\x86q\x07.";
        assert_eq!(
            normalize(bytes, &OutlineConfig::default()),
            vec![CanonicalSymbol::named("a")]
        );

        // ("hash", "other"): no non-text element, the last element is used
        let bytes = b"\x80\x02X\x04\x00\x00\x00hashq\x00X\x05\x00\x00\x00otherq\x01\x86q\x02.";
        assert_eq!(
            normalize(bytes, &OutlineConfig::default()),
            vec![CanonicalSymbol::named("未知符号")]
        );

        // ()
        assert!(normalize(b"\x80\x02).", &OutlineConfig::default()).is_empty());
    }

    #[test]
    fn cyclic_children_are_skipped() {
        // a = {"name": "a", "children": []}; a["children"].append(a)
        let bytes = b"\x80\x02}q\x00(X\x04\x00\x00\x00nameq\x01X\x01\x00\x00\x00aq\x02X\x08\x00\x00\x00childrenq\x03]q\x04h\x00au.";
        assert_eq!(
            normalize(bytes, &OutlineConfig::default()),
            vec![CanonicalSymbol::named("a")]
        );
    }
}
