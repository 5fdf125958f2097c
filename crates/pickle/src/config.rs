/// Limits applied while loading and traversing an object graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Maximum nesting followed by recursive renderers ([`crate::RawNode::display`],
    /// [`crate::RawNode::to_json`]) before they cut the value short
    pub max_depth: usize,
    /// Output budget of one rendering: every node costs one unit and text
    /// costs its length. Renderings cut at the budget end with `...`.
    pub max_render_len: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            max_render_len: 16 * 1024,
        }
    }
}

impl LoaderConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_depth == 0 {
            return Err("max_depth must be > 0".to_string());
        }
        if self.max_render_len == 0 {
            return Err("max_render_len must be > 0".to_string());
        }
        Ok(())
    }
}
