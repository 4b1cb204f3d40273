//! CPU affinity pinning for spawned workers.
//!
//! ## Overview
//!
//! Workers launched while the task holds a core are restricted to that single hardware thread.
//! - On **Linux** the mask is applied inside a `pre_exec` hook, i.e. in the child after `fork()` and right before `execve()`,
//!   so the worker never runs a single instruction on another core and every process it forks inherits the mask.
//! - On **other platforms** there is no portable affinity syscall.
//!   The request is logged and ignored so a benchmark still runs unpinned instead of failing.
//!
//! All workers of one task share the same core on purpose: the goal is to emulate oversubscription, not parallel speedup.
use tokio::process::Command;
#[cfg(not(target_os = "linux"))]
use tracing::warn;

use wfb_model::CoreId;

/// Restrict the command's process to `core`, when one is given.
pub fn attach_affinity(cmd: &mut Command, core: Option<CoreId>) {
    let Some(core) = core else {
        return;
    };

    #[cfg(target_os = "linux")]
    {
        linux_impl::attach_affinity(cmd, core);
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = cmd;
        warn!(
            target: "wfb.exec.affinity",
            core,
            "core pinning requested on a non-Linux OS; worker will run unpinned"
        );
    }
}

#[cfg(target_os = "linux")]
mod linux_impl {
    use std::io;

    use tokio::process::Command;

    use wfb_model::CoreId;

    pub fn attach_affinity(cmd: &mut Command, core: CoreId) {
        let core = core as usize;

        unsafe {
            cmd.pre_exec(move || pin_current(core));
        }
    }

    /// Only async-signal-safe calls: this runs between fork and exec.
    fn pin_current(core: usize) -> io::Result<()> {
        if core >= libc::CPU_SETSIZE as usize {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        let rc = unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_SET(core, &mut set);
            libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
        };
        if rc != 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}
