//! Platform-specific termination of SteamCMD process trees.
//!
//! SteamCMD is known to respawn itself under a new pid while performing
//! a self-update, so a pid-targeted kill alone can miss the replacement
//! process. Every kill path therefore pairs the direct signal with a
//! delayed fallback: an image-name kill on Windows, a SIGKILL escalation
//! on POSIX. All functions return once the signals are issued; the
//! escalations run on spawned tasks.

use std::time::Duration;
use tracing::debug;

/// Delay before the image-name fallback once a pid-targeted kill was issued.
#[cfg(windows)]
const IMAGE_FALLBACK_DELAY: Duration = Duration::from_millis(200);

/// Delay before the image-name fallback when no pid was registered yet.
/// Covers the race where cancel lands before the process has spawned.
pub(crate) const NO_PID_FALLBACK_DELAY: Duration = Duration::from_millis(100);

/// Grace period between SIGINT and SIGKILL on POSIX.
#[cfg(unix)]
const SIGKILL_DELAY: Duration = Duration::from_secs(1);

/// Kill the registered process for a task, plus any replacement it may
/// have spawned in the meantime.
pub(crate) fn kill_task_process(pid: u32) {
    debug!(pid, "terminating task process");

    #[cfg(windows)]
    {
        kill_tree_windows(pid);
        schedule_image_kill(IMAGE_FALLBACK_DELAY);
    }

    #[cfg(unix)]
    interrupt_then_kill(pid);
}

/// Schedule a delayed kill by executable image name.
pub(crate) fn schedule_image_kill(delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        kill_by_image_name();
    });
}

#[cfg(unix)]
fn interrupt_then_kill(pid: u32) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    #[allow(clippy::cast_possible_wrap)]
    let nix_pid = Pid::from_raw(pid as i32);

    if let Err(e) = signal::kill(nix_pid, Signal::SIGINT) {
        // ESRCH means the process is already gone; nothing to escalate.
        debug!(pid, error = %e, "SIGINT failed");
        if e == nix::errno::Errno::ESRCH {
            return;
        }
    }

    tokio::spawn(async move {
        tokio::time::sleep(SIGKILL_DELAY).await;
        match signal::kill(nix_pid, None) {
            // Still alive after the grace period - escalate.
            Ok(()) => {
                let _ = signal::kill(nix_pid, Signal::SIGKILL);
            }
            Err(_) => {
                // Exited (or not ours to signal) - done either way.
            }
        }
    });
}

#[cfg(windows)]
fn kill_tree_windows(pid: u32) {
    // /T takes the whole tree, /F is forceful.
    let result = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .spawn();
    if let Err(e) = result {
        debug!(pid, error = %e, "taskkill spawn failed");
    }
}

fn kill_by_image_name() {
    #[cfg(windows)]
    let result = std::process::Command::new("taskkill")
        .args(["/IM", "steamcmd.exe", "/F"])
        .spawn();

    // Exact-name match: the respawned self-updated binary is `steamcmd`.
    #[cfg(unix)]
    let result = std::process::Command::new("pkill")
        .args(["-KILL", "-x", "steamcmd"])
        .spawn();

    match result {
        Ok(mut child) => {
            // Reap in the background; the kill utility exits quickly.
            let _ = tokio::task::spawn_blocking(move || child.wait());
        }
        Err(e) => debug!(error = %e, "image-name kill failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[cfg(unix)]
    async fn test_kill_task_process_terminates_child() {
        use std::process::Stdio;

        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .spawn()
            .expect("failed to spawn sleep");
        let pid = child.id().expect("no pid");

        kill_task_process(pid);

        let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .expect("child did not exit")
            .expect("wait failed");
        assert!(!status.success());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_kill_task_process_tolerates_missing_pid() {
        // A pid that is extremely unlikely to exist; must not panic.
        kill_task_process(999_999);
    }
}
