//! The `Verifier` capability contract and its two implementations.
//!
//! [`NativeVerifier`] runs the pipeline inside a caller-owned rayon pool and
//! fans out content hashing for large bundles. [`SandboxedVerifier`] is for
//! memory-isolated hosts: single-threaded, no filesystem, no network, input
//! and output as in-memory values only.

use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::config::VerifierConfig;
use crate::error::{Result, VerifyError};
use crate::pipeline::{verify_bytes, verify_json, Hashing};
use crate::report::Report;

/// What a verifier implementation can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Short name of the platform target.
    pub target: &'static str,
    /// Whether attachment hashing may run on several workers.
    pub parallel_hashing: bool,
    /// Whether ZIP bundles are accepted.
    pub zip_bundles: bool,
    /// Number of hashing workers, 1 when sequential.
    pub workers: usize,
}

/// The three verification entry points, implemented once per platform.
pub trait Verifier: Send + Sync {
    /// One-time setup. Idempotent.
    fn init_verifier(&mut self) -> Result<()>;

    /// Verify a JSON document or a ZIP bundle.
    fn verify_car_bytes(&self, bytes: &[u8]) -> Report;

    /// Verify a JSON document given as text.
    fn verify_car_json(&self, json: &str) -> Report;

    fn capabilities(&self) -> Capabilities;
}

/// Verifier for native targets.
pub struct NativeVerifier {
    config: VerifierConfig,
    pool: Option<Arc<ThreadPool>>,
}

impl NativeVerifier {
    /// Create a verifier that builds its own pool on `init_verifier`.
    pub fn new(config: VerifierConfig) -> Self {
        Self { config, pool: None }
    }

    /// Create a verifier that hashes on a pool the caller already owns.
    pub fn with_pool(config: VerifierConfig, pool: Arc<ThreadPool>) -> Self {
        Self {
            config,
            pool: Some(pool),
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    fn run(&self, verify: impl FnOnce(Hashing) -> Report + Send) -> Report {
        match &self.pool {
            Some(pool) => pool.install(|| verify(Hashing::Parallel)),
            None => verify(Hashing::Sequential),
        }
    }
}

impl Verifier for NativeVerifier {
    fn init_verifier(&mut self) -> Result<()> {
        if self.pool.is_some() {
            return Ok(());
        }
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("car-verify-{i}"));
        if let Some(threads) = self.config.worker_threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| VerifyError::Init(e.to_string()))?;
        debug!(workers = pool.current_num_threads(), "verifier pool started");
        self.pool = Some(Arc::new(pool));
        Ok(())
    }

    fn verify_car_bytes(&self, bytes: &[u8]) -> Report {
        self.run(|hashing| verify_bytes(bytes, &self.config, hashing))
    }

    fn verify_car_json(&self, json: &str) -> Report {
        self.run(|hashing| verify_json(json, &self.config, hashing))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            target: "native",
            parallel_hashing: self.pool.is_some(),
            zip_bundles: true,
            workers: self
                .pool
                .as_ref()
                .map_or(1, |pool| pool.current_num_threads()),
        }
    }
}

/// Verifier for memory-isolated hosts.
///
/// Performs no blocking waits. Cancellation is the host's concern.
#[derive(Debug, Clone, Default)]
pub struct SandboxedVerifier {
    config: VerifierConfig,
    initialized: bool,
}

impl SandboxedVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Verify and return the report as a JSON string, for hosts that only
    /// exchange text.
    pub fn verify_to_json(&self, bytes: &[u8]) -> String {
        let report = self.verify_car_bytes(bytes);
        report.to_json().unwrap_or_else(|e| {
            format!(
                "{{\"status\":\"failed\",\"issues\":[{{\"code\":\"ParseError\",\"severity\":\"error\",\"message\":{}}}]}}",
                serde_json::Value::String(e.to_string())
            )
        })
    }
}

impl Verifier for SandboxedVerifier {
    fn init_verifier(&mut self) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn verify_car_bytes(&self, bytes: &[u8]) -> Report {
        verify_bytes(bytes, &self.config, Hashing::Sequential)
    }

    fn verify_car_json(&self, json: &str) -> Report {
        verify_json(json, &self.config, Hashing::Sequential)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            target: "sandboxed",
            parallel_hashing: false,
            zip_bundles: true,
            workers: 1,
        }
    }
}
