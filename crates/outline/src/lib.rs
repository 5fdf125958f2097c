//! # Symcache Outline
//!
//! Turns a language server's pickled document-symbol cache into a stable
//! outline document: a sorted directory tree plus, per file, a list of
//! canonical symbols.
//!
//! The cache layout is not fixed. Producers rename fields, wrap payloads in
//! envelopes and store symbols either as dicts or as objects whose classes
//! are unavailable here. Every lookup is therefore alias-tolerant and every
//! normalization step falls back to a default instead of failing.
//!
//! ## Architecture
//!
//! ```text
//! artifact bytes
//!     │
//!     ├──> symcache_pickle::load → ObjectGraph
//!     │
//!     ├──> Container Resolver
//!     │    ├─> unwrap `obj` envelope, skip `__cache_version`
//!     │    └─> key → root-relative path
//!     │
//!     ├──> Symbol Normalizer (per file)
//!     │    ├─> pick the symbol collection
//!     │    └─> name / kind / detail / ranges / children
//!     │
//!     └──> Path Tree Builder → DecodeResult
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::path::Path;
//! use symcache_outline::{Decoder, OutlineConfig};
//!
//! let decoder = Decoder::new(OutlineConfig::default()).unwrap();
//! // pickle.dumps({"/proj/a.py": [{"name": "foo", "kind": 12}]}, protocol=2)
//! let bytes = b"\x80\x02}q\x00X\n\x00\x00\x00/proj/a.pyq\x01]q\x02}q\x03(X\x04\x00\x00\x00nameq\x04X\x03\x00\x00\x00fooq\x05X\x04\x00\x00\x00kindq\x06K\x0cuas.";
//! let result = decoder.decode(bytes, Path::new("/proj"));
//! assert_eq!(result.file_count, 1);
//! assert_eq!(result.symbols["a.py"][0].name, "foo");
//! ```

mod access;
mod config;
mod container;
mod decoder;
mod error;
mod normalize;
mod paths;
mod tree;
mod types;

pub use access::{coerce_int, lenient_text, resolve_field};
pub use config::{OutlineConfig, UNKNOWN_SYMBOL_NAME};
pub use container::{resolve_files, FileEntry};
pub use decoder::Decoder;
pub use error::{OutlineError, Result};
pub use normalize::{normalize_position, normalize_range, Normalizer};
pub use paths::relative_to_root;
pub use tree::build_tree;
pub use types::{
    CanonicalPosition, CanonicalRange, CanonicalSymbol, DecodeResult, PathTreeNode, SymbolKind,
};
