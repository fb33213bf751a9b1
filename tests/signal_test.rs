use std::io::{BufRead, BufReader};
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

/// Start `pidguard hold` and wait until it reports that the PID file and its
/// handlers are in place.
fn spawn_holder(scratch: &Path, pid_path: &Path, extra: &[&str]) -> Child {
    let mut child = Command::new(env!("CARGO_BIN_EXE_pidguard"))
        .env_remove("PIDFILE")
        .env_remove("PIDDIR")
        .env("PIDGUARD_CONFIG", scratch.join("absent.toml"))
        .arg("--pid-file")
        .arg(pid_path)
        .arg("hold")
        .args(extra)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let stdout = child.stdout.take().unwrap();
    let mut line = String::new();
    BufReader::new(stdout).read_line(&mut line).unwrap();
    assert!(line.starts_with("Holding"), "unexpected output: {line:?}");
    child
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::process::ExitStatus {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("holder did not exit within {timeout:?}");
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn send(child: &Child, signal: Signal) {
    kill(Pid::from_raw(child.id() as i32), signal).unwrap();
}

#[test]
fn test_sigterm_releases_and_terminates() {
    let temp = tempfile::tempdir().unwrap();
    let pid_path = temp.path().join("held.pid");
    let mut child = spawn_holder(temp.path(), &pid_path, &[]);

    assert_eq!(
        std::fs::read_to_string(&pid_path).unwrap(),
        child.id().to_string()
    );

    send(&child, Signal::SIGTERM);
    let status = wait_with_timeout(&mut child, Duration::from_secs(10));

    assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
    assert!(!pid_path.exists());
}

#[test]
fn test_sigint_releases_and_terminates() {
    let temp = tempfile::tempdir().unwrap();
    let pid_path = temp.path().join("held.pid");
    let mut child = spawn_holder(temp.path(), &pid_path, &[]);

    send(&child, Signal::SIGINT);
    let status = wait_with_timeout(&mut child, Duration::from_secs(10));

    assert_eq!(status.signal(), Some(Signal::SIGINT as i32));
    assert!(!pid_path.exists());
}

#[test]
fn test_configured_signal_replaces_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let pid_path = temp.path().join("held.pid");
    let mut child = spawn_holder(temp.path(), &pid_path, &["--signal", "HUP"]);

    send(&child, Signal::SIGHUP);
    let status = wait_with_timeout(&mut child, Duration::from_secs(10));

    assert_eq!(status.signal(), Some(Signal::SIGHUP as i32));
    assert!(!pid_path.exists());
}

#[test]
fn test_unconfigured_signal_keeps_default_disposition() {
    let temp = tempfile::tempdir().unwrap();
    let pid_path = temp.path().join("held.pid");
    let mut child = spawn_holder(temp.path(), &pid_path, &["--signal", "HUP"]);

    send(&child, Signal::SIGTERM);
    let status = wait_with_timeout(&mut child, Duration::from_secs(10));

    assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
    // Killed outright: nothing removed the file.
    assert!(pid_path.exists());
}

#[test]
fn test_foreign_pid_file_survives_signal() {
    let temp = tempfile::tempdir().unwrap();
    let pid_path = temp.path().join("held.pid");
    let mut child = spawn_holder(temp.path(), &pid_path, &[]);

    std::fs::write(&pid_path, "1").unwrap();
    send(&child, Signal::SIGTERM);
    let status = wait_with_timeout(&mut child, Duration::from_secs(10));

    // Release fails with an ownership mismatch; the process still dies by signal.
    assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
    assert_eq!(std::fs::read_to_string(&pid_path).unwrap(), "1");
}

#[test]
fn test_stop_command_signals_holder() {
    let temp = tempfile::tempdir().unwrap();
    let pid_path = temp.path().join("held.pid");
    let mut child = spawn_holder(temp.path(), &pid_path, &[]);

    let output = Command::new(env!("CARGO_BIN_EXE_pidguard"))
        .env_remove("PIDFILE")
        .env_remove("PIDDIR")
        .env("PIDGUARD_CONFIG", temp.path().join("absent.toml"))
        .arg("--pid-file")
        .arg(&pid_path)
        .arg("stop")
        .output()
        .unwrap();
    assert!(output.status.success());

    let status = wait_with_timeout(&mut child, Duration::from_secs(10));
    assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
    assert!(!pid_path.exists());
}
