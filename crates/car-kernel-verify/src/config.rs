//! Verifier configuration.

use car_kernel_bundle::BundleLimits;

/// Configuration for a verifier.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Bounds on ZIP extraction.
    pub limits: BundleLimits,
    /// Attachment count above which content hashing fans out across workers.
    pub parallel_hash_threshold: usize,
    /// Worker threads for the native pool. `None` uses one per core.
    pub worker_threads: Option<usize>,
    /// Treat provenance gaps and attachment mismatches as failures.
    pub strict_provenance: bool,
    /// Maximum length of any input string copied into the report.
    pub sanitize_max_len: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            limits: BundleLimits::default(),
            parallel_hash_threshold: 8,
            worker_threads: None,
            strict_provenance: false,
            sanitize_max_len: 256,
        }
    }
}
