//! Alias-tolerant field access over raw graph nodes.

use symcache_pickle::{RawNode, Scalar, Shape};

/// First alias present on `node`.
///
/// All aliases are tried as mapping keys before any is tried as an object
/// attribute. A field that is present but null still counts as present.
pub fn resolve_field<'g, S: AsRef<str>>(node: RawNode<'g>, aliases: &[S]) -> Option<RawNode<'g>> {
    aliases
        .iter()
        .find_map(|alias| node.get_key(alias.as_ref()))
        .or_else(|| {
            aliases
                .iter()
                .find_map(|alias| node.get_attr(alias.as_ref()))
        })
}

/// Like [`resolve_field`], but a null value counts as absent.
pub fn resolve_value<'g, S: AsRef<str>>(node: RawNode<'g>, aliases: &[S]) -> Option<RawNode<'g>> {
    resolve_field(node, aliases).filter(|value| !value.is_null())
}

/// True when any alias is present on `node` as a key or attribute
pub fn has_field<S: AsRef<str>>(node: RawNode<'_>, aliases: &[S]) -> bool {
    resolve_field(node, aliases).is_some()
}

/// Integer coercion: ints, bools, finite floats (truncated), decimal text,
/// and enum-like objects whose only constructor argument is an int.
pub fn coerce_int(node: RawNode<'_>) -> Option<i64> {
    match node.shape() {
        Shape::Scalar => match node.scalar()? {
            Scalar::Int(i) => Some(i),
            Scalar::Bool(b) => Some(i64::from(b)),
            Scalar::Float(f) if f.is_finite() => {
                let t = f.trunc();
                (t >= i64::MIN as f64 && t < i64::MAX as f64).then_some(t as i64)
            }
            Scalar::Str(s) => parse_decimal(s),
            Scalar::Bytes(b) => std::str::from_utf8(b).ok().and_then(parse_decimal),
            _ => None,
        },
        Shape::Object => {
            let obj = node.object()?;
            let mut args = node.args();
            match (args.next(), args.next()) {
                (Some(arg), None) if obj.states.is_empty() => coerce_int(arg),
                _ => None,
            }
        }
        _ => None,
    }
}

fn parse_decimal(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.contains('_') {
        // Python accepts single underscores between digits.
        if text.contains("__") || text.ends_with('_') || text.starts_with('_') {
            return None;
        }
        return text.replace('_', "").parse().ok();
    }
    text.parse().ok()
}

/// Text form of a value; never fails.
pub fn lenient_text(node: RawNode<'_>) -> String {
    node.display()
}

#[cfg(test)]
mod tests {
    use super::*;
    use symcache_pickle::{load, LoaderConfig, ObjectGraph};

    fn graph(bytes: &[u8]) -> ObjectGraph {
        load(bytes, &LoaderConfig::default()).unwrap()
    }

    // {"name": None, "symbol_name": "x", "kind": "7"} at protocol 2
    const NULL_NAME: &[u8] = b"\x80\x02}q\x00(X\x04\x00\x00\x00nameq\x01NX\x0b\x00\x00\x00symbol_nameq\x02X\x01\x00\x00\x00xq\x03X\x04\x00\x00\x00kindq\x04X\x01\x00\x00\x007q\x05u.";

    #[test]
    fn first_present_alias_wins_even_when_null() {
        let g = graph(NULL_NAME);
        let root = g.root();
        let name = resolve_field(root, &["name", "symbol_name"]).unwrap();
        assert!(name.is_null());
        assert!(resolve_value(root, &["name", "symbol_name"]).is_none());
        assert_eq!(
            resolve_field(root, &["symbol_name", "name"]).and_then(|n| n.as_str()),
            Some("x")
        );
        assert!(has_field(root, &["kind"]));
        assert!(!has_field(root, &["children"]));
    }

    #[test]
    fn coerces_decimal_text_and_numbers() {
        let g = graph(NULL_NAME);
        let kind = resolve_field(g.root(), &["kind"]).unwrap();
        assert_eq!(coerce_int(kind), Some(7));

        assert_eq!(coerce_int(graph(b"K\x05.").root()), Some(5));
        assert_eq!(coerce_int(graph(b"\x88.").root()), Some(1));
        assert_eq!(coerce_int(graph(b"F3.9\n.").root()), Some(3));
        assert_eq!(coerce_int(graph(b"N.").root()), None);
        assert_eq!(coerce_int(graph(b"X\x03\x00\x00\x001_0.").root()), Some(10));
        assert_eq!(coerce_int(graph(b"X\x03\x00\x00\x007.0.").root()), None);
    }

    #[test]
    fn coerces_enum_like_objects() {
        // SymbolKind(5) from an unresolvable module
        let g = graph(b"\x80\x02cpkg\nSymbolKind\nq\x00K\x05\x85q\x01Rq\x02.");
        assert_eq!(coerce_int(g.root()), Some(5));
        let g = graph(b"\x80\x02cpkg\nThing\nq\x00)Rq\x01.");
        assert_eq!(coerce_int(g.root()), None);
    }

    #[test]
    fn lenient_text_renders_any_value() {
        assert_eq!(lenient_text(graph(b"K\x05.").root()), "5");
        assert_eq!(lenient_text(graph(b"X\x01\x00\x00\x00a.").root()), "a");
        assert_eq!(
            lenient_text(graph(b"\x80\x02cpkg\nThing\nq\x00)Rq\x01.").root()),
            "<pkg.Thing object>"
        );
    }
}
