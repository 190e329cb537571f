//! The Emitter: records checkpoints for live runs and turns them into receipts.
//!
//! Each open run owns one chain writer behind its own mutex, so checkpoints of
//! the same run are linked strictly in the order the lock grants them while
//! different runs never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use car_kernel_bundle::{write_bundle, Attachment, BundleCache};
use car_kernel_core::{
    ChainBuilder, Checkpoint, CheckpointPayload, Keypair, Receipt, ReceiptAssembler, RunMetadata,
    Signer,
};

use crate::error::{KernelError, Result};

/// Configuration for the Emitter.
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Emit receipts with the `unsigned:` sentinel even when a key is present.
    pub unsigned: bool,
    /// Value written to `schema_version`. `None` omits the field.
    pub schema_version: Option<String>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            unsigned: false,
            schema_version: Some(car_kernel_core::receipt::RECEIPT_SCHEMA_VERSION.to_string()),
        }
    }
}

/// The chain of one open run.
struct ChainWriter {
    run_id: String,
    chain: ChainBuilder,
    /// Set once the run is finalized. Writers still queued on the lock bail out.
    closed: bool,
}

/// Receipt emitter for one signing identity.
pub struct Emitter {
    signer: Signer,
    config: EmitterConfig,
    runs: RwLock<HashMap<String, Arc<Mutex<ChainWriter>>>>,
    cache: Option<Arc<dyn BundleCache>>,
}

impl Emitter {
    /// Create an emitter. Without a keypair every receipt is unsigned.
    pub fn new(keypair: Option<Keypair>, config: EmitterConfig) -> Self {
        let signer = match keypair {
            Some(keypair) if !config.unsigned => Signer::Ed25519(keypair),
            _ => Signer::Unsigned,
        };
        Self {
            signer,
            config,
            runs: RwLock::new(HashMap::new()),
            cache: None,
        }
    }

    /// Hold finalized bundles in `cache` until they are picked up.
    pub fn with_cache(mut self, cache: Arc<dyn BundleCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Base64 public key written into receipts; empty when unsigned.
    pub fn public_key_base64(&self) -> String {
        self.signer.public_key_base64()
    }

    pub fn is_unsigned(&self) -> bool {
        self.signer.is_unsigned()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Run Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Open a run.
    pub async fn start_run(&self, run_id: &str) -> Result<()> {
        let mut runs = self.runs.write().await;
        if runs.contains_key(run_id) {
            return Err(KernelError::RunExists(run_id.to_string()));
        }
        let writer = ChainWriter {
            run_id: run_id.to_string(),
            chain: ChainBuilder::new(self.signer.clone()),
            closed: false,
        };
        runs.insert(run_id.to_string(), Arc::new(Mutex::new(writer)));
        debug!(run_id, "run started");
        Ok(())
    }

    /// Append a checkpoint to an open run and return it with its link filled in.
    pub async fn record_checkpoint(
        &self,
        run_id: &str,
        payload: CheckpointPayload,
    ) -> Result<Checkpoint> {
        if payload.run_id != run_id {
            return Err(KernelError::InvalidOperation(format!(
                "checkpoint {} belongs to run {}, not {run_id}",
                payload.id, payload.run_id
            )));
        }

        let writer = self.writer(run_id).await?;
        let mut writer = writer.lock().await;
        if writer.closed {
            return Err(KernelError::RunNotFound(run_id.to_string()));
        }
        let checkpoint = writer.chain.push(payload)?.clone();
        debug!(
            run_id,
            checkpoint = %checkpoint.id(),
            position = writer.chain.len(),
            "checkpoint recorded"
        );
        Ok(checkpoint)
    }

    /// Ids of the runs currently open.
    pub async fn active_runs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.runs.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// An assembler for `run_id`, stamped with the current time and the
    /// configured schema version.
    pub fn assembler(&self, run_id: &str, run: RunMetadata) -> ReceiptAssembler {
        ReceiptAssembler::new(run_id, now_rfc3339(), run)
            .schema_version(self.config.schema_version.clone())
    }

    /// Close a run and assemble its receipt.
    ///
    /// The run is removed even when assembly fails, since its chain cannot be
    /// extended afterwards.
    pub async fn finalize(&self, run_id: &str, assembler: ReceiptAssembler) -> Result<Receipt> {
        let writer = self
            .runs
            .write()
            .await
            .remove(run_id)
            .ok_or_else(|| KernelError::RunNotFound(run_id.to_string()))?;

        let mut writer = writer.lock().await;
        writer.closed = true;
        let chain = std::mem::replace(&mut writer.chain, ChainBuilder::new(Signer::Unsigned));
        let proof = chain.finish()?;
        let receipt = assembler.assemble(proof, &self.signer)?;

        info!(
            run_id = %writer.run_id,
            id = %receipt.id,
            checkpoints = receipt.checkpoints.len(),
            "run finalized"
        );
        Ok(receipt)
    }

    /// Finalize a run and pack the receipt with its attachments.
    ///
    /// With a cache configured the bundle is also stored under the receipt id.
    pub async fn finalize_bundle(
        &self,
        run_id: &str,
        assembler: ReceiptAssembler,
        attachments: &[Attachment],
        now_ms: i64,
    ) -> Result<(Receipt, Bytes)> {
        let receipt = self.finalize(run_id, assembler).await?;
        let json = receipt.to_json_pretty()?;
        let bundle = Bytes::from(write_bundle(json.as_bytes(), attachments)?);

        if let Some(cache) = &self.cache {
            cache.put(&receipt.id.to_string(), bundle.clone(), now_ms).await?;
            debug!(id = %receipt.id, size = bundle.len(), "bundle cached");
        }
        Ok((receipt, bundle))
    }

    /// Remove and return a cached bundle.
    pub async fn take_bundle(&self, receipt_id: &str, now_ms: i64) -> Result<Option<Bytes>> {
        let cache = self.cache.as_ref().ok_or(KernelError::NoCache)?;
        Ok(cache.take(receipt_id, now_ms).await?)
    }

    async fn writer(&self, run_id: &str) -> Result<Arc<Mutex<ChainWriter>>> {
        self.runs
            .read()
            .await
            .get(run_id)
            .cloned()
            .ok_or_else(|| KernelError::RunNotFound(run_id.to_string()))
    }
}

/// Current time as an RFC 3339 UTC timestamp.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
