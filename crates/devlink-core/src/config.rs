// ── Engine configuration ──

/// Tunables for the dispatch engine.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Upper bound on explicit targets in one subscribe call. Guards
    /// the backend against unbounded fan-out from a single caller.
    pub max_fanout_targets: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_fanout_targets: 128,
        }
    }
}
