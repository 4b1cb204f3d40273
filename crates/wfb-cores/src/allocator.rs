use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use wfb_model::CoreId;

use crate::error::{CoreRegistryError, CoreResult};
use crate::registry::CoreRegistry;

/// Retry policy for [`CoreAllocator::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Pause between two attempts while every core is taken.
    pub backoff: Duration,
    /// Give up after this long. `None` waits forever: under sustained
    /// contention a caller may starve.
    pub timeout: Option<Duration>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(1),
            timeout: None,
        }
    }
}

/// Acquire/release protocol on top of a [`CoreRegistry`].
///
/// Mutual exclusion only; waiters are not served in any particular order.
#[derive(Debug, Clone)]
pub struct CoreAllocator {
    registry: Arc<CoreRegistry>,
    cfg: AllocatorConfig,
}

impl CoreAllocator {
    pub fn new(registry: CoreRegistry) -> Self {
        Self::with_config(registry, AllocatorConfig::default())
    }

    pub fn with_config(registry: CoreRegistry, cfg: AllocatorConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            cfg,
        }
    }

    pub fn registry(&self) -> &CoreRegistry {
        &self.registry
    }

    /// Claim a free core, retrying every `backoff` while none is available.
    pub async fn acquire(&self) -> CoreResult<CoreId> {
        self.acquire_until(&CancellationToken::new()).await
    }

    /// Like [`CoreAllocator::acquire`], but gives up with
    /// [`CoreRegistryError::Cancelled`] once `cancel` fires.
    ///
    /// A claim already blocked on the registry lock cannot be interrupted; it
    /// is awaited and whatever it claimed goes straight back to the pool, so
    /// a cancelled caller never leaves a core behind. Dropping the future
    /// instead of cancelling gives no such guarantee.
    #[instrument(level = "debug", skip(self, cancel), fields(total = self.registry.total()))]
    pub async fn acquire_until(&self, cancel: &CancellationToken) -> CoreResult<CoreId> {
        let started = Instant::now();
        let mut attempts: u64 = 0;

        loop {
            attempts += 1;
            let claimed = self.claim_once().await?;

            if let Some(core) = claimed {
                if cancel.is_cancelled() {
                    self.release(core).await?;
                    debug!(target: "wfb.cores", core, "cancelled during claim; core returned");
                    return Err(CoreRegistryError::Cancelled);
                }
                info!(target: "wfb.cores", core, attempts, waited_ms = started.elapsed().as_millis() as u64, "core acquired");
                return Ok(core);
            }

            if cancel.is_cancelled() {
                return Err(CoreRegistryError::Cancelled);
            }
            if let Some(timeout) = self.cfg.timeout
                && started.elapsed() + self.cfg.backoff > timeout
            {
                return Err(CoreRegistryError::Timeout(timeout));
            }
            debug!(target: "wfb.cores", attempts, backoff_ms = self.cfg.backoff.as_millis() as u64, "all cores claimed; retrying");
            tokio::select! {
                _ = tokio::time::sleep(self.cfg.backoff) => {}
                _ = cancel.cancelled() => return Err(CoreRegistryError::Cancelled),
            }
        }
    }

    async fn claim_once(&self) -> CoreResult<Option<CoreId>> {
        let registry = Arc::clone(&self.registry);
        // flock blocks the calling thread; keep it off the async workers.
        tokio::task::spawn_blocking(move || registry.try_claim())
            .await
            .map_err(|e| CoreRegistryError::Join(e.to_string()))?
    }

    /// Return `core` to the pool. Releasing twice is harmless.
    pub async fn release(&self, core: CoreId) -> CoreResult<()> {
        let registry = Arc::clone(&self.registry);
        let removed = tokio::task::spawn_blocking(move || registry.release(core))
            .await
            .map_err(|e| CoreRegistryError::Join(e.to_string()))??;
        if removed {
            info!(target: "wfb.cores", core, "core released");
        }
        Ok(())
    }
}
