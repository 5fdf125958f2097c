//! Lenient text and JSON renderings of graph values.
//!
//! Both renderers are total and bounded: cycles and over-deep nesting are
//! cut short, and a shared output budget stops a walk over memo-shared
//! sub-graphs once [`crate::LoaderConfig::max_render_len`] is spent.

use crate::config::LoaderConfig;
use crate::graph::{RawNode, Scalar, Shape, Slot, SlotId};
use serde_json::{Map, Number, Value as Json};
use std::fmt::Write as _;

const ELLIPSIS: &str = "...";

impl<'g> RawNode<'g> {
    /// Text form of the value, following Python's `str()` conventions:
    /// strings render bare, containers render their elements' `repr()`.
    #[must_use]
    pub fn display(&self) -> String {
        text_of(*self, &mut Walk::new(self.graph().config()))
    }

    /// JSON rendering used when a raw value has to be passed through as-is.
    ///
    /// Objects render as their recovered attributes (or `null` when nothing
    /// was recovered); byte strings render as lossy UTF-8; integers outside
    /// the `i64` range render as decimal strings.
    #[must_use]
    pub fn to_json(&self) -> Json {
        json_of(*self, &mut Walk::new(self.graph().config()))
    }
}

/// State of one rendering pass
struct Walk {
    /// Containers on the path from the root to the current node
    path: Vec<SlotId>,
    depth_left: usize,
    /// Output units left: every node costs one, text costs its length
    budget: usize,
}

impl Walk {
    fn new(config: &LoaderConfig) -> Self {
        Self {
            path: Vec::new(),
            depth_left: config.max_depth,
            budget: config.max_render_len,
        }
    }

    const fn exhausted(&self) -> bool {
        self.budget == 0
    }

    fn spend(&mut self, cost: usize) {
        self.budget = self.budget.saturating_sub(cost);
    }

    /// Prefix of `text` that fits the budget, charging for it. The flag is
    /// set when the text was cut.
    fn clip<'t>(&mut self, text: &'t str) -> (&'t str, bool) {
        let end = text
            .char_indices()
            .nth(self.budget)
            .map_or(text.len(), |(at, _)| at);
        self.spend(end.max(1));
        (&text[..end], end < text.len())
    }

    /// Enter a container; `false` when it is on the current path or too deep
    fn enter(&mut self, id: SlotId) -> bool {
        if self.depth_left == 0 || self.path.contains(&id) {
            return false;
        }
        self.path.push(id);
        self.depth_left -= 1;
        true
    }

    fn leave(&mut self) {
        self.path.pop();
        self.depth_left += 1;
    }
}

/// `str()` of a node: bare text for strings, `repr()` otherwise
fn text_of(node: RawNode<'_>, walk: &mut Walk) -> String {
    if let Some(Scalar::Str(s)) = node.scalar() {
        let (text, cut) = walk.clip(s);
        return if cut {
            format!("{text}{ELLIPSIS}")
        } else {
            text.to_string()
        };
    }
    let mut out = String::new();
    write_repr(node, &mut out, walk);
    out
}

fn write_repr(node: RawNode<'_>, out: &mut String, walk: &mut Walk) {
    if walk.exhausted() {
        out.push_str(ELLIPSIS);
        return;
    }
    match node.shape() {
        Shape::Null => {
            walk.spend(1);
            out.push_str("None");
        }
        Shape::Scalar => {
            let start = out.len();
            match node.scalar() {
                Some(Scalar::Bool(true)) => out.push_str("True"),
                Some(Scalar::Bool(false)) => out.push_str("False"),
                Some(Scalar::Int(i)) => {
                    let _ = write!(out, "{i}");
                }
                Some(Scalar::BigInt(s)) => out.push_str(s),
                Some(Scalar::Float(f)) => out.push_str(&float_repr(f)),
                Some(Scalar::Str(s)) => {
                    let (text, cut) = walk.clip(s);
                    out.push_str(&str_repr(text));
                    if cut {
                        out.push_str(ELLIPSIS);
                    }
                    return;
                }
                Some(Scalar::Bytes(b)) => {
                    let keep = b.len().min(walk.budget);
                    walk.spend(keep.max(1));
                    out.push_str(&bytes_repr(&b[..keep]));
                    if keep < b.len() {
                        out.push_str(ELLIPSIS);
                    }
                    return;
                }
                None => {}
            }
            walk.spend((out.len() - start).max(1));
        }
        Shape::Sequence | Shape::Mapping | Shape::Object => {
            let Some(id) = node.slot_id() else {
                return;
            };
            if !walk.enter(id) {
                out.push_str(ELLIPSIS);
                return;
            }
            walk.spend(1);
            write_container(node, id, out, walk);
            walk.leave();
        }
    }
}

fn write_container(node: RawNode<'_>, id: SlotId, out: &mut String, walk: &mut Walk) {
    let (open, close) = match node.graph().slot(id) {
        Some(Slot::List(_)) => ("[", "]"),
        Some(Slot::Tuple(_)) => ("(", ")"),
        Some(Slot::Set(items)) if items.is_empty() => {
            out.push_str("set()");
            return;
        }
        Some(Slot::Set(_)) => ("{", "}"),
        Some(Slot::FrozenSet(items)) if items.is_empty() => {
            out.push_str("frozenset()");
            return;
        }
        Some(Slot::FrozenSet(_)) => ("frozenset({", "})"),
        Some(Slot::Dict(_)) => ("{", "}"),
        Some(Slot::Object(obj)) => {
            let _ = write!(out, "<{} object>", obj.type_ref);
            return;
        }
        Some(Slot::Global(type_ref)) => {
            let _ = write!(out, "<class '{type_ref}'>");
            return;
        }
        None => return,
    };
    out.push_str(open);
    if let Some(entries) = node.entries() {
        for (i, (key, value)) in entries.enumerate() {
            if i > 0 {
                out.push_str(", ");
                if walk.exhausted() {
                    out.push_str(ELLIPSIS);
                    break;
                }
            }
            write_repr(key, out, walk);
            out.push_str(": ");
            write_repr(value, out, walk);
        }
    } else if let Some(items) = node.sequence() {
        let mut count = 0;
        for (i, item) in items.enumerate() {
            if i > 0 {
                out.push_str(", ");
                if walk.exhausted() {
                    out.push_str(ELLIPSIS);
                    break;
                }
            }
            write_repr(item, out, walk);
            count += 1;
        }
        if count == 1 && open == "(" {
            out.push(',');
        }
    }
    out.push_str(close);
}

fn json_of(node: RawNode<'_>, walk: &mut Walk) -> Json {
    if walk.exhausted() {
        return Json::Null;
    }
    match node.shape() {
        Shape::Null => {
            walk.spend(1);
            Json::Null
        }
        Shape::Scalar => match node.scalar() {
            Some(Scalar::Str(s)) => json_text(s, walk),
            Some(Scalar::Bytes(b)) => json_text(&String::from_utf8_lossy(b), walk),
            Some(Scalar::BigInt(s)) => json_text(s, walk),
            scalar => {
                walk.spend(1);
                match scalar {
                    Some(Scalar::Bool(b)) => Json::Bool(b),
                    Some(Scalar::Int(i)) => Json::from(i),
                    Some(Scalar::Float(f)) => Number::from_f64(f).map_or(Json::Null, Json::Number),
                    _ => Json::Null,
                }
            }
        },
        Shape::Sequence | Shape::Mapping | Shape::Object => {
            let Some(id) = node.slot_id() else {
                return Json::Null;
            };
            if !walk.enter(id) {
                return Json::Null;
            }
            walk.spend(1);
            let json = json_of_container(node, walk);
            walk.leave();
            json
        }
    }
}

fn json_text(text: &str, walk: &mut Walk) -> Json {
    let (kept, cut) = walk.clip(text);
    if cut {
        Json::String(format!("{kept}{ELLIPSIS}"))
    } else {
        Json::String(kept.to_string())
    }
}

fn json_of_container(node: RawNode<'_>, walk: &mut Walk) -> Json {
    if let Some(entries) = node.entries() {
        let mut map = Map::new();
        for (key, value) in entries {
            if walk.exhausted() {
                break;
            }
            let key = text_of(key, walk);
            map.insert(key, json_of(value, walk));
        }
        return Json::Object(map);
    }
    if let Some(items) = node.sequence() {
        let mut array = Vec::new();
        for item in items {
            if walk.exhausted() {
                break;
            }
            array.push(json_of(item, walk));
        }
        return Json::Array(array);
    }
    if let Some(obj) = node.object() {
        let mut map = Map::new();
        for (key, value) in node.attributes() {
            if walk.exhausted() {
                break;
            }
            walk.spend(key.len());
            map.insert(key, json_of(value, walk));
        }
        for (key, value) in &obj.entries {
            if walk.exhausted() {
                break;
            }
            let key = text_of(node.graph().node(key), walk);
            map.insert(key, json_of(node.graph().node(value), walk));
        }
        if !map.is_empty() {
            return Json::Object(map);
        }
        if !obj.items.is_empty() {
            let mut array = Vec::new();
            for item in &obj.items {
                if walk.exhausted() {
                    break;
                }
                array.push(json_of(node.graph().node(item), walk));
            }
            return Json::Array(array);
        }
        return Json::Null;
    }
    match node.type_ref() {
        Some(type_ref) => Json::String(type_ref.to_string()),
        None => Json::Null,
    }
}

/// Python `repr()` of a float
fn float_repr(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

/// Python `repr()` of a str
fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Python `repr()` of a bytes object
fn bytes_repr(b: &[u8]) -> String {
    let quote = if b.contains(&b'\'') && !b.contains(&b'"') {
        b'"'
    } else {
        b'\''
    };
    let mut out = String::with_capacity(b.len() + 3);
    out.push('b');
    out.push(quote as char);
    for &byte in b {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c as char);
            }
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\x{byte:02x}");
            }
        }
    }
    out.push(quote as char);
    out
}
