use std::ffi::OsStr;
use std::path::Path;

use sysinfo::{Signal, System};
use tokio::process::Command;
use tracing::debug;

use wfb_model::ToolCommand;

use crate::error::{ExecError, ExecResult};

/// Build the command for `tool`, appending per-invocation `extra` arguments.
///
/// The child becomes the leader of a fresh process group so the whole tree it
/// forks can be signalled at once.
pub(crate) fn cmd_program(tool: &ToolCommand, extra: &[String], cwd: &Path) -> ExecResult<Command> {
    if tool.program.trim().is_empty() {
        return Err(ExecError::MissingProgram);
    }
    let mut cmd = Command::new(&tool.program);
    cmd.args(tool.args.iter().map(|s| s.as_str()));
    cmd.args(extra.iter().map(|s| s.as_str()));
    cmd.current_dir(cwd);
    cmd.kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    Ok(cmd)
}

/// Send `signal` to the process group `pgid`.
///
/// A group that no longer exists is not an error. Returns whether the signal
/// was delivered.
#[cfg(unix)]
pub fn signal_group(pgid: u32, signal: libc::c_int) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return false;
    };
    if pgid <= 1 {
        return false;
    }
    let rc = unsafe { libc::killpg(pgid, signal) };
    if rc == 0 {
        return true;
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() != Some(libc::ESRCH) {
        debug!(target: "wfb.exec", pgid, signal, error = %err, "killpg failed");
    }
    false
}

#[cfg(not(unix))]
pub fn signal_group(_pgid: u32, _signal: i32) -> bool {
    false
}

/// Terminate every process on the host whose name is `name` (or `name-*`,
/// as forked workers of tools like stress-ng rename themselves).
///
/// Best effort: processes that vanish or refuse the signal are skipped.
/// Returns the number of processes signalled.
pub fn sweep_processes(name: &str) -> usize {
    let system = System::new_all();
    let me = sysinfo::get_current_pid().ok();

    let mut signalled = 0;
    for process in system.processes().values() {
        let pname = AsRef::<OsStr>::as_ref(process.name()).to_string_lossy();
        if Some(process.pid()) == me || !name_matches(&pname, name) {
            continue;
        }
        let sent = process
            .kill_with(Signal::Term)
            .unwrap_or_else(|| process.kill());
        if sent {
            debug!(target: "wfb.exec", pid = process.pid().as_u32(), name, "terminated lingering process");
            signalled += 1;
        }
    }
    signalled
}

pub(crate) fn name_matches(process: &str, name: &str) -> bool {
    !name.is_empty()
        && (process == name
            || process
                .strip_prefix(name)
                .is_some_and(|rest| rest.starts_with('-')))
}
