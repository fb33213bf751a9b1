use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Whether a process with `pid` exists. Used for status reporting only; the
/// guard itself never decides ownership from liveness.
#[cfg(target_os = "linux")]
pub fn is_process_running(pid: u32) -> Result<bool, Errno> {
    if pid == 0 || pid > i32::MAX as u32 {
        return Ok(false);
    }
    Ok(std::path::Path::new(&format!("/proc/{pid}")).exists())
}

#[cfg(not(target_os = "linux"))]
pub fn is_process_running(pid: u32) -> Result<bool, Errno> {
    if pid == 0 || pid > i32::MAX as u32 {
        return Ok(false);
    }
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(Errno::EPERM) => Ok(true),
        Err(err) => Err(err),
    }
}

/// Deliver `signal` to `pid`, as an operator would with `kill`.
pub fn send_signal(pid: u32, signal: nix::sys::signal::Signal) -> Result<(), Errno> {
    if pid == 0 || pid > i32::MAX as u32 {
        return Err(Errno::ESRCH);
    }
    kill(Pid::from_raw(pid as i32), signal)
}
