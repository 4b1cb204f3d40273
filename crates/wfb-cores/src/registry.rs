use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use wfb_model::{CoreId, CorePinning};

use crate::error::{CoreRegistryError, CoreResult};
use crate::lock::RegistryLock;

/// File-backed set of claimed core ids.
///
/// Every operation opens the lock file afresh, so one `CoreRegistry` may be
/// shared between threads and still contend correctly with other processes.
#[derive(Debug, Clone)]
pub struct CoreRegistry {
    lock_path: PathBuf,
    registry_path: PathBuf,
    total: u32,
}

impl CoreRegistry {
    /// Prepare the registry for a host with `total` hardware threads,
    /// creating missing parent directories and both files.
    pub fn open(pinning: &CorePinning, total: u32) -> CoreResult<Self> {
        if total == 0 {
            return Err(CoreRegistryError::NoCores);
        }
        for path in [&pinning.lock, &pinning.registry] {
            ensure_file(path)?;
        }
        Ok(Self {
            lock_path: pinning.lock.clone(),
            registry_path: pinning.registry.clone(),
            total,
        })
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }

    /// Snapshot of the claimed set.
    pub fn claimed(&self) -> CoreResult<BTreeSet<CoreId>> {
        let _guard = RegistryLock::acquire(&self.lock_path)?;
        self.load()
    }

    /// Claim the lowest free core, or `None` when every core is taken.
    ///
    /// Read, selection and write all happen under one lock.
    pub fn try_claim(&self) -> CoreResult<Option<CoreId>> {
        let _guard = RegistryLock::acquire(&self.lock_path)?;
        let mut claimed = self.load()?;

        let Some(core) = (0..self.total).find(|id| !claimed.contains(id)) else {
            return Ok(None);
        };
        claimed.insert(core);
        self.store(&claimed)?;

        debug!(target: "wfb.cores", core, claimed = claimed.len(), "core claimed");
        Ok(Some(core))
    }

    /// Remove `core` from the claimed set. Returns whether it was present;
    /// releasing an unclaimed core is a no-op.
    pub fn release(&self, core: CoreId) -> CoreResult<bool> {
        if core >= self.total {
            return Err(CoreRegistryError::OutOfRange(core));
        }
        let _guard = RegistryLock::acquire(&self.lock_path)?;
        let mut claimed = self.load()?;

        let removed = claimed.remove(&core);
        if removed {
            self.store(&claimed)?;
            debug!(target: "wfb.cores", core, claimed = claimed.len(), "core released");
        } else {
            debug!(target: "wfb.cores", core, "core was not claimed; nothing to release");
        }
        Ok(removed)
    }

    fn load(&self) -> CoreResult<BTreeSet<CoreId>> {
        let bytes = match fs::read(&self.registry_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(CoreRegistryError::io(&self.registry_path, e)),
        };
        Ok(parse_claimed(&String::from_utf8_lossy(&bytes), self.total))
    }

    fn store(&self, claimed: &BTreeSet<CoreId>) -> CoreResult<()> {
        let mut text = String::with_capacity(claimed.len() * 4);
        for core in claimed {
            text.push_str(&core.to_string());
            text.push('\n');
        }
        let mut file = fs::File::create(&self.registry_path)
            .map_err(|e| CoreRegistryError::io(&self.registry_path, e))?;
        file.write_all(text.as_bytes())
            .map_err(|e| CoreRegistryError::io(&self.registry_path, e))
    }
}

/// Parse the registry text, skipping anything that is not a core id of
/// this host. Duplicates collapse into the set.
pub fn parse_claimed(text: &str, total: u32) -> BTreeSet<CoreId> {
    let mut claimed = BTreeSet::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<CoreId>() {
            Ok(core) if core < total => {
                claimed.insert(core);
            }
            Ok(core) => {
                warn!(target: "wfb.cores", core, total, "ignoring out-of-range registry entry")
            }
            Err(_) => warn!(target: "wfb.cores", line, "ignoring malformed registry entry"),
        }
    }
    claimed
}

fn ensure_file(path: &Path) -> CoreResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| CoreRegistryError::io(parent, e))?;
    }
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(drop)
        .map_err(|e| CoreRegistryError::io(path, e))
}
