//! # Symcache Pickle
//!
//! Sandboxed loader for Python pickle streams (protocols 0–5).
//!
//! The loader never imports or calls anything the stream names. A small
//! allowlist of data-only standard types (sets, dicts, byte strings, paths)
//! is rebuilt natively; every other type becomes an [`Opaque`] placeholder
//! that keeps its constructor arguments and BUILD state, so the field set of
//! foreign objects stays readable.
//!
//! ## Architecture
//!
//! ```text
//! bytes
//!   │
//!   ├──> Cursor (bounds-checked operand reads)
//!   │
//!   ├──> Machine (stack, marks, memo)
//!   │    └─> resolve: allowlisted constructor | Opaque placeholder
//!   │
//!   └──> ObjectGraph (arena of slots + root value)
//!        └─> RawNode views: shape, get_key, get_attr, display, to_json
//! ```
//!
//! ## Example
//!
//! ```rust
//! use symcache_pickle::{load, LoaderConfig, Shape};
//!
//! // pickle.dumps([1, 2], protocol=2)
//! let bytes = b"\x80\x02]q\x00(K\x01K\x02e.";
//! let graph = load(bytes, &LoaderConfig::default()).unwrap();
//! let root = graph.root();
//! assert_eq!(root.shape(), Shape::Sequence);
//! assert_eq!(root.display(), "[1, 2]");
//! ```

mod config;
mod cursor;
mod error;
mod graph;
mod literal;
mod machine;
mod opcode;
mod render;
mod resolve;

pub use config::LoaderConfig;
pub use error::{LoadError, Result};
pub use graph::{ObjectGraph, Opaque, RawNode, Scalar, Shape, Slot, SlotId, TypeRef, Value};

use machine::Machine;
use std::io::Read;

/// Load a complete pickle stream held in memory.
///
/// Bytes after the STOP opcode are ignored.
pub fn load(bytes: &[u8], config: &LoaderConfig) -> Result<ObjectGraph> {
    if bytes.is_empty() {
        return Err(LoadError::Empty);
    }
    let loaded = Machine::new(bytes).run()?;
    log::debug!(
        "loaded pickle: protocol {}, {} slots",
        loaded.protocol,
        loaded.slots.len()
    );
    Ok(ObjectGraph {
        slots: loaded.slots,
        root: loaded.root,
        config: *config,
        protocol: loaded.protocol,
    })
}

/// Read a stream to the end, then [`load`] it.
pub fn load_reader<R: Read>(mut reader: R, config: &LoaderConfig) -> Result<ObjectGraph> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    load(&bytes, config)
}
