//! Single-instance enforcement
//!
//! The PID guard refuses to start next to a live process, clears stale
//! files, and the binary exits non-zero when a daemon is already running.

use std::fs;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use jobflow::daemon::{read_pid, DaemonError, PidFile};

#[test]
fn live_pid_blocks_a_second_instance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".pipeline.pid");

    let first = PidFile::acquire(&path).unwrap();
    match PidFile::acquire(&path) {
        Err(DaemonError::AlreadyRunning(pid)) => assert_eq!(pid, first.pid() as i32),
        other => panic!("expected AlreadyRunning, got {:?}", other),
    }

    drop(first);
    assert!(!path.exists());
    let _again = PidFile::acquire(&path).unwrap();
}

#[cfg(unix)]
#[test]
fn stale_pid_file_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".pipeline.pid");
    fs::write(&path, "999999999\n").unwrap();

    let guard = PidFile::acquire(&path).unwrap();
    assert_eq!(
        read_pid(&path).unwrap(),
        Some(std::process::id() as i32)
    );
    drop(guard);
    assert!(!path.exists());
}

#[test]
fn daemon_command_exits_non_zero_when_already_running() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("jobflow.toml");
    fs::write(
        &config_path,
        "data_dir = \"data\"\n\n[daemon]\npid_file = \"daemon.pid\"\nlog_file = \"daemon.log\"\n",
    )
    .unwrap();

    // This test process stands in for the running daemon
    let pid_path = dir.path().join("data").join("daemon.pid");
    fs::create_dir_all(pid_path.parent().unwrap()).unwrap();
    fs::write(&pid_path, format!("{}\n", std::process::id())).unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_jobflow"))
        .arg("--config")
        .arg(&config_path)
        .arg("daemon")
        .env_remove("DATABASE_URL")
        .env_remove("LLM_PROVIDER")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(60);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            child.kill().unwrap();
            panic!("daemon did not exit while another instance was running");
        }
        std::thread::sleep(Duration::from_millis(100));
    };

    let output = child.wait_with_output().unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!status.success());
    assert!(stderr.contains("already running"), "stderr: {}", stderr);
    assert_eq!(
        read_pid(&pid_path).unwrap(),
        Some(std::process::id() as i32)
    );
}
