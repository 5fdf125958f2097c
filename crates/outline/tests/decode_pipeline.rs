use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::Path;
use symcache_outline::{
    CanonicalPosition, CanonicalRange, CanonicalSymbol, DecodeResult, Decoder, OutlineConfig,
};

const P0: &[u8] = include_bytes!("fixtures/symbols_p0.pkl");
const P2: &[u8] = include_bytes!("fixtures/symbols_p2.pkl");
const P4: &[u8] = include_bytes!("fixtures/symbols_p4.pkl");
const P5: &[u8] = include_bytes!("fixtures/symbols_p5.pkl");

fn decode(bytes: &[u8]) -> DecodeResult {
    Decoder::default().decode(bytes, Path::new("/proj"))
}

fn decode_json(bytes: &[u8]) -> Value {
    serde_json::to_value(decode(bytes)).unwrap()
}

fn pos(line: u64, character: u64) -> Value {
    json!({"line": line, "character": character})
}

fn range(start: Value, end: Value) -> Value {
    json!({"start": start, "end": end})
}

fn fixture_document() -> Value {
    json!({
        "files": [
            {
                "type": "directory",
                "name": "src",
                "path": "src",
                "children": [
                    {
                        "type": "directory",
                        "name": "util",
                        "path": "src/util",
                        "children": [
                            {"type": "file", "name": "empty.py", "path": "src/util/empty.py"}
                        ]
                    },
                    {"type": "file", "name": "greeter.py", "path": "src/greeter.py"}
                ]
            },
            {"type": "file", "name": "README.py", "path": "README.py"}
        ],
        "symbols": {
            "README.py": [
                {
                    "name": "legacy",
                    "kind": 7,
                    "detail": "",
                    "range": null,
                    "selectionRange": null,
                    "children": [
                        {
                            "name": "inner",
                            "kind": 3,
                            "detail": "",
                            "range": null,
                            "selectionRange": null,
                            "children": []
                        }
                    ]
                }
            ],
            "src/greeter.py": [
                {
                    "name": "Greeter",
                    "kind": 5,
                    "detail": "class Greeter",
                    "range": range(pos(0, 0), pos(9, 0)),
                    "selectionRange": range(pos(0, 6), pos(0, 13)),
                    "children": [
                        {
                            "name": "greet",
                            "kind": 6,
                            "detail": "",
                            "range": range(pos(2, 4), pos(4, 0)),
                            "selectionRange": range(pos(3, 8), pos(3, 13)),
                            "children": []
                        }
                    ]
                },
                {
                    "name": "main",
                    "kind": 12,
                    "detail": "def main() -> None",
                    "range": range(pos(11, 0), pos(12, 8)),
                    "selectionRange": null,
                    "children": []
                }
            ],
            "src/util/empty.py": []
        },
        "fileCount": 3
    })
}

#[test]
fn fixtures_decode_identically_at_every_protocol() {
    let expected = fixture_document();
    for bytes in [P0, P2, P4, P5] {
        assert_eq!(decode_json(bytes), expected);
    }
}

#[test]
fn wrapped_symbol_list_scenario() {
    // {"/proj/a.py": ("h", vanished.Wrapper(root_symbols=[foo, bar]))}
    let bytes = b"\x80\x04\x95\x87\x00\x00\x00\x00\x00\x00\x00}\x94\x8c\n/proj/a.py\x94\x8c\x01h\x94\x8c\x08vanished\x94\x8c\x07Wrapper\x94\x93\x94)\x81\x94}\x94\x8c\x0croot_symbols\x94]\x94(}\x94(\x8c\x04name\x94\x8c\x03foo\x94\x8c\x04kind\x94K\x0cu}\x94(h\x0b\x8c\x03bar\x94\x8c\x08children\x94]\x94}\x94h\x0b\x8c\x03baz\x94sauesb\x86\x94s.";
    let result = decode(bytes);
    assert_eq!(
        result.symbols["a.py"],
        vec![
            CanonicalSymbol::named("foo").with_kind(12),
            CanonicalSymbol::named("bar").with_children(vec![CanonicalSymbol::named("baz")]),
        ]
    );
    assert_eq!(
        serde_json::to_value(&result.files).unwrap(),
        json!([{"name": "a.py", "path": "a.py", "type": "file"}])
    );
    assert_eq!(result.file_count, 1);
    assert!(result.error.is_none());
}

#[test]
fn unresolvable_symbol_types_keep_their_slot() {
    // {"/proj/x.py": [vanished.Gone()], "/proj/lib/y.py": [], "/other/z.py": None}
    let bytes = b"\x80\x03}q\x00(X\n\x00\x00\x00/proj/x.pyq\x01]q\x02cvanished\nGone\nq\x03)\x81q\x04aX\x0e\x00\x00\x00/proj/lib/y.pyq\x05]q\x06X\x0b\x00\x00\x00/other/z.pyq\x07Nu.";
    let result = decode(bytes);
    assert_eq!(result.file_count, 3);
    assert_eq!(result.symbols.len(), 3);
    assert_eq!(result.symbols["x.py"], vec![CanonicalSymbol::named("未知符号")]);
    assert!(result.symbols["lib/y.py"].is_empty());
    assert!(result.symbols["/other/z.py"].is_empty());

    let top: Vec<&str> = result.files.iter().map(|node| node.name()).collect();
    assert_eq!(top, vec!["lib", "other", "x.py"]);
}

#[test]
fn undecodable_artifact_yields_error_document() {
    let document = decode_json(b"\x80\x02}q\x00(");
    let error = document["error"].as_str().unwrap();
    assert!(!error.is_empty());
    assert_eq!(
        document,
        json!({"files": [], "symbols": {}, "fileCount": 0, "error": error})
    );

    let truncated = decode(&P4[..P4.len() - 10]);
    assert!(truncated.is_failure());
    assert_eq!(truncated.file_count, 0);
}

#[test]
fn version_marker_only_yields_empty_document() {
    // {"__cache_version": (1, 2)}
    let document = decode_json(b"\x80\x02}q\x00X\x0f\x00\x00\x00__cache_versionq\x01K\x01K\x02\x86q\x02s.");
    assert_eq!(document, json!({"files": [], "symbols": {}, "fileCount": 0}));
}

#[test]
fn custom_placeholder_name_is_used() {
    let config = OutlineConfig {
        unknown_symbol_name: "<unknown>".to_string(),
        ..Default::default()
    };
    let decoder = Decoder::new(config).unwrap();
    let bytes = b"\x80\x03}q\x00(X\n\x00\x00\x00/proj/x.pyq\x01]q\x02cvanished\nGone\nq\x03)\x81q\x04aX\x0e\x00\x00\x00/proj/lib/y.pyq\x05]q\x06X\x0b\x00\x00\x00/other/z.pyq\x07Nu.";
    let result = decoder.decode(bytes, Path::new("/proj"));
    assert_eq!(result.symbols["x.py"][0].name, "<unknown>");
}

#[test]
fn decode_file_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("document_symbols.pkl");
    std::fs::write(&artifact, P2).unwrap();
    let result = Decoder::default().decode_file(&artifact, Path::new("/proj"));
    assert_eq!(serde_json::to_value(result).unwrap(), fixture_document());
}

#[test]
fn greeter_symbols_keep_ranges_and_details() {
    let result = decode(P4);
    let at = CanonicalPosition::new;
    assert_eq!(
        result.symbols["src/greeter.py"],
        vec![
            CanonicalSymbol::named("Greeter")
                .with_kind(5)
                .with_detail("class Greeter")
                .with_range(CanonicalRange::new(at(0, 0), at(9, 0)))
                .with_selection_range(CanonicalRange::new(at(0, 6), at(0, 13)))
                .with_children(vec![CanonicalSymbol::named("greet")
                    .with_kind(6)
                    .with_range(CanonicalRange::new(at(2, 4), at(4, 0)))
                    .with_selection_range(CanonicalRange::new(at(3, 8), at(3, 13)))]),
            CanonicalSymbol::named("main")
                .with_kind(12)
                .with_detail("def main() -> None")
                .with_range(CanonicalRange::new(at(11, 0), at(12, 8))),
        ]
    );
}

fn push_text(bytes: &mut Vec<u8>, text: &str) {
    bytes.push(b'X');
    bytes.extend_from_slice(&(text.len() as u32).to_le_bytes());
    bytes.extend_from_slice(text.as_bytes());
}

/// `{"/proj/a.py": [{"name": t40}]}` where `t0 = []`, `t(n+1) = (t(n), t(n))`
fn shared_name_artifact() -> Vec<u8> {
    let mut bytes = b"\x80\x02}".to_vec();
    push_text(&mut bytes, "/proj/a.py");
    bytes.extend_from_slice(b"]}");
    push_text(&mut bytes, "name");
    bytes.extend_from_slice(b"]q\x000");
    for i in 0..40u8 {
        bytes.extend_from_slice(&[b'h', i, b'h', i, 0x86, b'q', i + 1]);
        if i < 39 {
            bytes.push(b'0');
        }
    }
    bytes.extend_from_slice(b"sas.");
    bytes
}

/// `{"/proj/a.py": [c40]}` where `c0 = {"name": "leaf"}` and
/// `c(n+1) = {"name": "node", "children": [c(n), c(n)]}`
fn shared_children_artifact() -> Vec<u8> {
    let mut bytes = b"\x80\x02}".to_vec();
    push_text(&mut bytes, "/proj/a.py");
    bytes.extend_from_slice(b"}q\x00");
    push_text(&mut bytes, "name");
    push_text(&mut bytes, "leaf");
    bytes.extend_from_slice(b"s0");
    for i in 0..40u8 {
        bytes.extend_from_slice(&[b'}', b'q', i + 1, b'(']);
        push_text(&mut bytes, "name");
        push_text(&mut bytes, "node");
        push_text(&mut bytes, "children");
        bytes.extend_from_slice(&[b']', b'(', b'h', i, b'h', i, b'e', b'u', b'0']);
    }
    bytes.extend_from_slice(&[b']', b'h', 40, b'a', b's', b'.']);
    bytes
}

fn count_symbols(symbols: &[CanonicalSymbol]) -> usize {
    symbols
        .iter()
        .map(|symbol| 1 + count_symbols(&symbol.children))
        .sum()
}

#[test]
fn shared_name_subgraph_renders_within_budget() {
    let result = decode(&shared_name_artifact());
    assert!(result.error.is_none());
    let name = &result.symbols["a.py"][0].name;
    assert!(name.starts_with("(((("));
    assert!(name.contains("..."));
    assert!(name.len() < 200_000, "name is {} bytes", name.len());
}

#[test]
fn shared_children_stop_at_symbol_budget() {
    let config = OutlineConfig {
        max_symbols: 1_000,
        ..Default::default()
    };
    let result = Decoder::new(config)
        .unwrap()
        .decode(&shared_children_artifact(), Path::new("/proj"));
    let symbols = &result.symbols["a.py"];
    assert_eq!(count_symbols(symbols), 1_000);
    assert_eq!(symbols[0].name, "node");
    assert_eq!(result.file_count, 1);
}

#[test]
fn small_shared_children_decode_in_full() {
    let config = OutlineConfig {
        max_symbols: 1_000,
        ..Default::default()
    };
    let bytes = shared_children_artifact();
    let graph = symcache_pickle::load(&bytes, &config.loader_config()).unwrap();
    let decoder = Decoder::new(config).unwrap();
    let result = decoder.decode_graph(&graph, Path::new("/proj"));
    let leaf = {
        let mut node = &result.symbols["a.py"][0];
        while let Some(child) = node.children.first() {
            node = child;
        }
        node.clone()
    };
    assert_eq!(leaf, CanonicalSymbol::named("leaf"));
}
