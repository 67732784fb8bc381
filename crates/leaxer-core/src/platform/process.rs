//! Running short-lived vendor commands.
//!
//! Detection probes shell out to tools like `nvidia-smi` that occasionally
//! hang (driver resets, stuck kernel modules). Every invocation here is
//! bounded: the child is killed once the timeout elapses.

use crate::error::{LeaxerError, Result};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Captured output of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Run `program` with `args`, waiting at most `timeout` for it to exit.
///
/// Output is drained on helper threads so a chatty tool cannot block on a full
/// pipe while we poll for its exit.
pub fn run_command(program: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    let rendered = render(program, args);
    debug!("Running `{}`", rendered);

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| LeaxerError::Spawn {
            program: program.to_string(),
            source: e,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match wait_with_deadline(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            warn!("`{}` did not exit within {:?}, killing it", rendered, timeout);
            let _ = child.kill();
            let _ = child.wait();
            return Err(LeaxerError::ProbeTimeout {
                command: rendered,
                timeout,
            });
        }
        Err(e) => {
            let _ = child.kill();
            return Err(LeaxerError::io_with_path(e, program));
        }
    };

    Ok(CommandOutput {
        status,
        stdout: join(stdout),
        stderr: join(stderr),
    })
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            return Ok(None);
        }
        thread::sleep(crate::config::ProbeConfig::POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<thread::JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

fn render(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_spawn_error() {
        let result = run_command(
            "leaxer-definitely-not-a-real-program",
            &["--version"],
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(LeaxerError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout_and_status() {
        let output = run_command("sh", &["-c", "echo probe-ok; exit 3"], Duration::from_secs(5))
            .unwrap();
        assert!(!output.success());
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stdout.trim(), "probe-ok");
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_command_times_out() {
        let start = Instant::now();
        let result = run_command("sleep", &["5"], Duration::from_millis(200));
        assert!(matches!(result, Err(LeaxerError::ProbeTimeout { .. })));
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
