use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{ExecError, ExecResult};

/// Two-state flag gating the read and write passes.
///
/// Starts signaled so the first read pass may run before anything was
/// written. Reads proceed only while set, writes only while cleared.
#[derive(Debug, Clone)]
pub struct AlternationSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl AlternationSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(true);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self) {
        self.tx.send_replace(true);
    }

    pub fn clear(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn wait_set(&self) -> ExecResult<()> {
        self.wait_for(true).await
    }

    pub async fn wait_clear(&self) -> ExecResult<()> {
        self.wait_for(false).await
    }

    async fn wait_for(&self, state: bool) -> ExecResult<()> {
        let mut rx = self.tx.subscribe();
        rx.wait_for(|v| *v == state)
            .await
            .map(drop)
            .map_err(|_| ExecError::SignalClosed)
    }
}

impl Default for AlternationSignal {
    fn default() -> Self {
        Self::new()
    }
}
