use crate::config::OutlineConfig;
use crate::container::resolve_files;
use crate::error::{OutlineError, Result};
use crate::normalize::Normalizer;
use crate::tree::build_tree;
use crate::types::DecodeResult;
use std::collections::BTreeMap;
use std::path::Path;
use symcache_pickle::ObjectGraph;

/// Full pipeline: load, resolve the per-file mapping, normalize every file
/// and build the file tree.
///
/// Decoding is total. A stream that cannot be loaded produces a
/// [`DecodeResult`] carrying only the error message.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: OutlineConfig,
}

impl Decoder {
    /// Create a decoder, validating the configuration
    pub fn new(config: OutlineConfig) -> Result<Self> {
        config.validate().map_err(OutlineError::invalid_config)?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &OutlineConfig {
        &self.config
    }

    /// Decode an in-memory artifact.
    pub fn decode(&self, bytes: &[u8], project_root: &Path) -> DecodeResult {
        match symcache_pickle::load(bytes, &self.config.loader_config()) {
            Ok(graph) => self.decode_graph(&graph, project_root),
            Err(err) => {
                log::warn!("failed to load symbol cache: {err}");
                DecodeResult::failed(err.to_string())
            }
        }
    }

    /// Read and decode an artifact file. Read failures are reported in the
    /// result like load failures.
    pub fn decode_file(&self, artifact: &Path, project_root: &Path) -> DecodeResult {
        match read_artifact(artifact) {
            Ok(bytes) => self.decode(&bytes, project_root),
            Err(err) => {
                log::warn!("failed to read {}: {err}", artifact.display());
                DecodeResult::failed(err.to_string())
            }
        }
    }

    /// Normalize an already loaded graph.
    pub fn decode_graph(&self, graph: &ObjectGraph, project_root: &Path) -> DecodeResult {
        let entries = resolve_files(graph.root(), project_root, &self.config);
        let mut normalizer = Normalizer::new(&self.config);

        let mut symbols = BTreeMap::new();
        for entry in entries {
            let outline = normalizer.normalize_file(&entry.path, entry.value);
            log::debug!("{}: {} top-level symbol(s)", entry.path, outline.len());
            symbols.insert(entry.path, outline);
        }

        let files = build_tree(symbols.keys());
        log::info!(
            "decoded {} file(s) from protocol {} cache",
            symbols.len(),
            graph.protocol()
        );
        DecodeResult {
            files,
            file_count: symbols.len(),
            symbols,
            error: None,
        }
    }
}

fn read_artifact(artifact: &Path) -> Result<Vec<u8>> {
    Ok(std::fs::read(artifact)?)
}
