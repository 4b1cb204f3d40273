use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use tracing::trace;

use crate::error::{CoreRegistryError, CoreResult};

/// Exclusive advisory lock on the registry lock file.
///
/// Held for the read-modify-write of the registry only; unlocked on drop.
/// `flock` locks belong to the open file description, so two guards opened
/// separately exclude each other even inside a single process.
#[derive(Debug)]
pub(crate) struct RegistryLock {
    file: File,
}

impl RegistryLock {
    pub(crate) fn acquire(path: &Path) -> CoreResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| CoreRegistryError::io(path, e))?;

        flock_exclusive(&file).map_err(|source| CoreRegistryError::Lock {
            path: path.to_path_buf(),
            source,
        })?;
        trace!(target: "wfb.cores", path = %path.display(), "registry locked");
        Ok(Self { file })
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock anyway; unlock eagerly.
        let _ = unlock(&self.file);
    }
}

#[cfg(unix)]
fn flock_exclusive(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    loop {
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(unix)]
fn unlock(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
    if rc != 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(not(unix))]
fn flock_exclusive(_file: &File) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "advisory file locks require a Unix host",
    ))
}

#[cfg(not(unix))]
fn unlock(_file: &File) -> io::Result<()> {
    Ok(())
}
