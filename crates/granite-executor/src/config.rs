/// Tunables of the join operators.
///
/// Passed explicitly to the operator; there is no process-wide
/// configuration. The defaults model a 256 KiB L2 cache and derive the
/// partitioning parameters from input sizes.
#[derive(Debug, Clone)]
pub struct JoinConfig {
    /// Assumed per-core L2 cache size driving partition and cluster sizing
    pub l2_cache_bytes: usize,
    /// Fixed radix bit count for the hash join (default: derived from the
    /// build side row count)
    pub radix_bits: Option<u32>,
    /// Fixed cluster count for the sort-merge join (default: derived from
    /// the larger side's row count)
    pub cluster_count: Option<usize>,
}

impl Default for JoinConfig {
    fn default() -> Self {
        JoinConfig { l2_cache_bytes: 262_144, radix_bits: None, cluster_count: None }
    }
}
