//! Interrupt forwarding to a launched process tree.
//!
//! The launcher starts children in their own process group, so a terminal
//! Ctrl-C does not reach them; it is forwarded here instead.

use tracing::{debug, warn};

/// Ask the process group led by `pid` to terminate.
#[cfg(unix)]
pub fn terminate_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        warn!("PID {} out of range, not signalling", pid);
        return;
    };

    debug!("Sending SIGTERM to process group {}", pid);
    match killpg(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => {}
        // Already gone.
        Err(nix::errno::Errno::ESRCH) => debug!("Process group {} already exited", pid),
        Err(e) => warn!("Failed to send SIGTERM to process group {}: {}", pid, e),
    }
}

/// Kill the process tree rooted at `pid`.
///
/// For the shell strategies `pid` is the command interpreter and `/T` takes
/// the server down with it.
#[cfg(windows)]
pub fn terminate_group(pid: u32) {
    use std::process::Command;

    debug!("Terminating process tree {} with taskkill", pid);
    match Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F", "/T"])
        .output()
    {
        Ok(output) if output.status.success() => debug!("Process tree {} terminated", pid),
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not found") {
                debug!("Process {} already exited", pid);
            } else {
                warn!("taskkill failed for {}: {}", pid, stderr.trim());
            }
        }
        Err(e) => warn!("Failed to run taskkill: {}", e),
    }
}

#[cfg(not(any(unix, windows)))]
pub fn terminate_group(pid: u32) {
    warn!("Interrupt forwarding not supported here, leaving {} running", pid);
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::CommandExt;
    use std::process::Command;

    #[test]
    fn test_terminates_group() {
        let mut child = Command::new("/bin/sh")
            .args(["-c", "sleep 30"])
            .process_group(0)
            .spawn()
            .unwrap();

        terminate_group(child.id());
        let status = child.wait().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_missing_group_is_not_an_error() {
        let mut child = Command::new("/bin/sh")
            .args(["-c", "exit 0"])
            .process_group(0)
            .spawn()
            .unwrap();
        child.wait().unwrap();

        terminate_group(child.id());
    }
}
