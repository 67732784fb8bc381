//! Integration tests for launching real child processes.
#![cfg(unix)]

use leaxer_core::{LaunchOptions, LaunchRequest, LaunchStrategy, ProcessLauncher};
use std::fs;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

fn sh(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string()]
}

fn read_all(handle: &mut leaxer_core::LaunchHandle) -> String {
    let mut output = String::new();
    handle
        .take_output()
        .expect("output stream")
        .read_to_string(&mut output)
        .unwrap();
    output
}

#[test]
fn test_missing_library_is_logged_and_launch_proceeds() {
    let lib_dir = TempDir::new().unwrap();
    fs::write(lib_dir.path().join("libggml-cpu.so"), b"").unwrap();

    let logs = SharedBuf::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let mut handle = tracing::subscriber::with_default(subscriber, || {
        ProcessLauncher::new()
            .spawn_executable(
                "/bin/sh",
                &sh("echo out; echo err 1>&2"),
                &LaunchOptions::new()
                    .with_lib_dir(lib_dir.path())
                    .with_critical_library("libggml.so"),
            )
            .unwrap()
    });

    assert_eq!(handle.strategy(), LaunchStrategy::DirectSpawn);
    assert!(handle.pid().is_some());
    assert!(handle.shell_pid().is_none());
    assert_eq!(
        handle.missing_library(),
        Some(lib_dir.path().join("libggml.so").as_path())
    );

    let output = read_all(&mut handle);
    assert!(handle.wait().unwrap().success());
    assert!(output.contains("out\n"));
    assert!(output.contains("err\n"));

    let logs = logs.contents();
    assert!(logs.contains("ERROR"));
    assert!(logs.contains("libggml.so"));
    assert!(logs.contains("libggml-cpu.so"));
}

#[test]
fn test_child_sees_library_environment() {
    let lib_dir = TempDir::new().unwrap();
    fs::write(lib_dir.path().join("libggml.so"), b"").unwrap();
    let lib = lib_dir.path().to_string_lossy().into_owned();

    let request = LaunchRequest::new(
        "/bin/sh",
        sh("echo \"dir=$GGML_BACKEND_DIR\"; echo \"path=$LD_LIBRARY_PATH\"; echo \"extra=$LEAXER_TEST_FLAG\"; pwd"),
    )
    .with_options(
        LaunchOptions::new()
            .with_lib_dir(lib_dir.path())
            .with_env("LEAXER_TEST_FLAG", "on")
            .with_critical_library("libggml.so"),
    );

    let mut handle = ProcessLauncher::new().spawn(&request).unwrap();
    assert!(handle.missing_library().is_none());

    let output = read_all(&mut handle);
    handle.wait().unwrap();

    assert!(output.contains(&format!("dir={}\n", lib)));
    assert!(output.contains(&format!("path={}", lib)));
    assert!(output.contains("extra=on\n"));
    let cwd = fs::canonicalize(lib_dir.path()).unwrap();
    assert!(output.contains(&cwd.to_string_lossy().into_owned()));
}

#[test]
fn test_exit_code_and_kill() {
    let lib_dir = TempDir::new().unwrap();
    let options = LaunchOptions::new()
        .with_lib_dir(lib_dir.path())
        .with_new_process_group(true);

    let mut failing = ProcessLauncher::new()
        .spawn_executable("/bin/sh", &sh("exit 7"), &options)
        .unwrap();
    assert_eq!(failing.wait().unwrap().code(), Some(7));
    // Already exited.
    failing.kill().unwrap();

    let mut sleeper = ProcessLauncher::new()
        .spawn_executable("/bin/sh", &sh("sleep 30"), &options)
        .unwrap();
    sleeper.kill().unwrap();
    let status = sleeper.wait().unwrap();
    assert!(!status.success());
}

#[test]
fn test_windows_strategy_is_ignored_on_unix() {
    let lib_dir = TempDir::new().unwrap();
    let launcher = ProcessLauncher::new().with_windows_strategy(LaunchStrategy::LauncherScript);

    let mut handle = launcher
        .spawn_executable(
            "/bin/sh",
            &sh("echo direct"),
            &LaunchOptions::new().with_lib_dir(lib_dir.path()),
        )
        .unwrap();

    assert_eq!(handle.strategy(), LaunchStrategy::DirectSpawn);
    assert!(handle.script_path().is_none());
    assert_eq!(read_all(&mut handle), "direct\n");
    handle.wait().unwrap();
}
