use crate::error::{OutlineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use symcache_pickle::LoaderConfig;

/// Sentinel used for symbols whose name cannot be recovered
pub const UNKNOWN_SYMBOL_NAME: &str = "未知符号";

/// Configuration for decoding a symbol cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineConfig {
    /// Name given to symbols with no recoverable name
    pub unknown_symbol_name: String,

    /// Top-level key whose mapping value holds the per-file entries
    pub envelope_key: String,

    /// Top-level key skipped as cache metadata
    pub version_key: String,

    /// Field names that hold a file's list of symbols, in priority order
    pub collection_aliases: Vec<String>,

    /// Maximum symbol nesting and raw-value rendering depth. Deeper
    /// children are dropped with a warning.
    pub max_depth: usize,

    /// Maximum number of symbols normalized per artifact. Symbols past it
    /// are dropped with a warning.
    pub max_symbols: usize,

    /// Output budget for rendering one raw name, detail or kind value
    pub max_render_len: usize,
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            unknown_symbol_name: UNKNOWN_SYMBOL_NAME.to_string(),
            envelope_key: "obj".to_string(),
            version_key: "__cache_version".to_string(),
            collection_aliases: ["root_symbols", "symbols", "items", "data"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_depth: 256,
            max_symbols: 500_000,
            max_render_len: 16 * 1024,
        }
    }
}

impl OutlineConfig {
    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate().map_err(OutlineError::invalid_config)?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Limits handed to the pickle loader
    #[must_use]
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            max_depth: self.max_depth,
            max_render_len: self.max_render_len,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.unknown_symbol_name.is_empty() {
            return Err("unknown_symbol_name must not be empty".to_string());
        }
        if self.envelope_key.is_empty() {
            return Err("envelope_key must not be empty".to_string());
        }
        if self.version_key.is_empty() {
            return Err("version_key must not be empty".to_string());
        }
        if self.collection_aliases.is_empty() {
            return Err("collection_aliases must name at least one field".to_string());
        }
        if self.collection_aliases.iter().any(String::is_empty) {
            return Err("collection_aliases must not contain empty names".to_string());
        }
        if self.max_depth == 0 {
            return Err("max_depth must be > 0".to_string());
        }
        if self.max_symbols == 0 {
            return Err("max_symbols must be > 0".to_string());
        }
        self.loader_config().validate()
    }
}
