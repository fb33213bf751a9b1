use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use nix::unistd::{AccessFlags, access};
use tracing::{debug, info, warn};

use crate::config::{PathResolver, Paths};
use crate::pidfile::error::PidFileError;
use crate::pidfile::hooks;
use crate::pidfile::options::PidFileOptions;

/// Longest a release waits for a concurrent release of the same guard.
pub const RELEASE_WAIT: Duration = Duration::from_secs(2);
const RELEASE_POLL: Duration = Duration::from_millis(5);

/// Lifecycle of a [`PidFileGuard`].
///
/// `Unacquired -> Acquired -> Released`, each step taken once. `Releasing` is
/// held only while a release is in flight so that a signal-triggered release
/// and the exit hook cannot both delete the file.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Unacquired = 0,
    Acquired = 1,
    Releasing = 2,
    Released = 3,
}

impl GuardState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => GuardState::Unacquired,
            1 => GuardState::Acquired,
            2 => GuardState::Releasing,
            _ => GuardState::Released,
        }
    }
}

/// Writes the current PID to a file and removes it again on release.
///
/// This is a courtesy check, not a lock: another process that ignores the
/// file, or runs with `overwrite_existing`, is not stopped. No `flock` or
/// `fcntl` lock is taken.
///
/// Signal handlers and the exit hook are process-wide, so only one guard per
/// process may use them at a time (see [`PidFileOptions::installs_hooks`]).
/// Clones share state.
#[derive(Debug, Clone)]
pub struct PidFileGuard {
    inner: Arc<GuardInner>,
}

#[derive(Debug)]
struct GuardInner {
    path: PathBuf,
    owned_pid: AtomicU32,
    state: AtomicU8,
    options: Mutex<PidFileOptions>,
}

impl PidFileGuard {
    /// Guard for the process-wide path (`PIDFILE`, else `PIDDIR`/`<program>.pid`).
    pub fn new() -> Result<Self, PidFileError> {
        Ok(Self::at(Paths::pid_file()?))
    }

    pub fn from_resolver(resolver: &PathResolver) -> Result<Self, PidFileError> {
        Ok(Self::at(resolver.resolve()?))
    }

    /// Guard for an already resolved path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(GuardInner {
                path: path.into(),
                owned_pid: AtomicU32::new(0),
                state: AtomicU8::new(GuardState::Unacquired as u8),
                options: Mutex::new(PidFileOptions::unmanaged()),
            }),
        }
    }

    /// Resolve, acquire and wire up signals and the exit hook in one call.
    pub fn managed(options: &PidFileOptions) -> Result<Self, PidFileError> {
        let guard = Self::new()?;
        guard.acquire(options)?;
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn state(&self) -> GuardState {
        self.inner.state()
    }

    /// PID written by the last successful acquire.
    pub fn owned_pid(&self) -> Option<u32> {
        match self.inner.owned_pid.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    /// Options stored by the last successful acquire; used by signal and
    /// exit-triggered release.
    pub fn options(&self) -> PidFileOptions {
        self.inner.stored_options()
    }

    pub(crate) fn same_guard(&self, other: &PidFileGuard) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Write the current PID to the file.
    pub fn acquire(&self, options: &PidFileOptions) -> Result<(), PidFileError> {
        let state = self.state();
        if state != GuardState::Unacquired {
            return Err(self.inner.invalid_state(state, "acquire"));
        }
        if options.installs_hooks() {
            hooks::ensure_available(self)?;
        }

        let path = self.path();
        let pid = process::id();

        let existed = path.exists();
        let mut overwritten = None;
        if existed {
            let contents = fs::read_to_string(path);
            if !options.overwrite_existing {
                let existing = match contents {
                    Ok(contents) => contents.trim().to_string(),
                    Err(err) => format!("<unreadable: {err}>"),
                };
                return Err(PidFileError::AlreadyLocked {
                    path: path.to_path_buf(),
                    pid,
                    existing,
                });
            }
            overwritten = contents.ok();
        }

        if !is_accessible(path, AccessFlags::W_OK) && !parent_writable(path) {
            return Err(PidFileError::PermissionDenied {
                path: path.to_path_buf(),
                pid,
                operation: "write",
            });
        }

        self.inner.write_pid(pid)?;
        *self
            .inner
            .options
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = options.clone();
        self.inner.owned_pid.store(pid, Ordering::SeqCst);
        self.inner
            .state
            .store(GuardState::Acquired as u8, Ordering::SeqCst);
        info!(pid = pid, path = %path.display(), "PID file created");

        if options.installs_hooks() {
            if let Err(err) = hooks::install(self, options) {
                self.inner.roll_back(existed, overwritten.as_deref(), &err);
                self.inner.owned_pid.store(0, Ordering::SeqCst);
                self.inner
                    .state
                    .store(GuardState::Unacquired as u8, Ordering::SeqCst);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Remove the PID file if ownership rules allow.
    ///
    /// Releasing an already released guard is a no-op; a release racing
    /// another one returns after the other finishes. A failed release
    /// leaves the guard `Acquired` so it can be retried.
    pub fn release(&self, options: &PidFileOptions) -> Result<(), PidFileError> {
        if self.inner.release(options)? {
            hooks::uninstall(self);
        }
        Ok(())
    }

    /// Release with the options stored by acquire.
    pub fn release_stored(&self) -> Result<(), PidFileError> {
        let options = self.options();
        self.release(&options)
    }

    /// Read the PID recorded in the file.
    pub fn read(&self) -> Result<u32, PidFileError> {
        read_pid(self.path())
    }
}

impl GuardInner {
    fn state(&self) -> GuardState {
        GuardState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn stored_options(&self) -> PidFileOptions {
        self.options
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn invalid_state(&self, state: GuardState, operation: &'static str) -> PidFileError {
        PidFileError::InvalidState {
            path: self.path.clone(),
            state,
            operation,
        }
    }

    fn io_error(&self, operation: &'static str, source: io::Error) -> PidFileError {
        if source.kind() == io::ErrorKind::PermissionDenied {
            PidFileError::PermissionDenied {
                path: self.path.clone(),
                pid: process::id(),
                operation,
            }
        } else {
            PidFileError::Io {
                path: self.path.clone(),
                source,
            }
        }
    }

    fn write_pid(&self, pid: u32) -> Result<(), PidFileError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|source| self.io_error("write", source))?;
        file.write_all(pid.to_string().as_bytes())
            .map_err(|source| self.io_error("write", source))?;
        file.sync_all()
            .map_err(|source| self.io_error("write", source))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(err) = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o644)) {
                warn!(error = %err, path = %self.path.display(), "Failed to set PID file permissions");
            }
        }
        Ok(())
    }

    /// Undo a write whose hook setup failed. A file we overwrote gets its
    /// previous content back.
    fn roll_back(&self, existed: bool, overwritten: Option<&str>, cause: &PidFileError) {
        let result = match overwritten {
            Some(previous) => {
                warn!(error = %cause, path = %self.path.display(), "Hook setup failed; restoring overwritten PID file");
                fs::write(&self.path, previous)
            }
            None if existed => {
                warn!(
                    error = %cause,
                    path = %self.path.display(),
                    "Hook setup failed; removing PID file whose previous content was unreadable"
                );
                fs::remove_file(&self.path)
            }
            None => {
                warn!(error = %cause, path = %self.path.display(), "Hook setup failed; removing PID file");
                fs::remove_file(&self.path)
            }
        };
        if let Err(err) = result {
            warn!(error = %err, path = %self.path.display(), "Failed to roll back PID file after hook setup failure");
        }
    }

    /// Returns `true` when this call moved the guard to `Released`.
    ///
    /// A call that finds another release in flight waits up to
    /// [`RELEASE_WAIT`] for it to finish, so the caller does not go on to
    /// exit while the file is still being removed. If the other release
    /// failed, this call makes its own attempt.
    fn release(&self, options: &PidFileOptions) -> Result<bool, PidFileError> {
        let deadline = Instant::now() + RELEASE_WAIT;
        while let Err(current) = self.state.compare_exchange(
            GuardState::Acquired as u8,
            GuardState::Releasing as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            match GuardState::from_u8(current) {
                GuardState::Released => {
                    debug!(path = %self.path.display(), "PID file already released");
                    return Ok(false);
                }
                GuardState::Releasing if Instant::now() < deadline => thread::sleep(RELEASE_POLL),
                GuardState::Releasing => {
                    warn!(path = %self.path.display(), "Gave up waiting for concurrent PID file release");
                    return Ok(false);
                }
                state => return Err(self.invalid_state(state, "release")),
            }
        }

        match self.unlink(options) {
            Ok(()) => {
                self.state
                    .store(GuardState::Released as u8, Ordering::SeqCst);
                Ok(true)
            }
            Err(err) => {
                self.state
                    .store(GuardState::Acquired as u8, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    fn unlink(&self, options: &PidFileOptions) -> Result<(), PidFileError> {
        let path = &self.path;
        let pid = process::id();

        if !path.exists() {
            if options.overcome_adversity {
                warn!(pid = pid, path = %path.display(), "PID file already gone; nothing to remove");
                return Ok(());
            }
            return Err(PidFileError::NotFound {
                path: path.clone(),
                pid,
            });
        }

        if !is_accessible(path, AccessFlags::R_OK) {
            if options.overcome_adversity {
                warn!(pid = pid, path = %path.display(), "PID file unreadable; leaving it in place");
                return Ok(());
            }
            return Err(PidFileError::PermissionDenied {
                path: path.clone(),
                pid,
                operation: "read",
            });
        }

        // Not covered by overcome_adversity: an unwritable file we could read
        // points at a broken environment rather than ownership drift.
        if !is_accessible(path, AccessFlags::W_OK) {
            return Err(PidFileError::PermissionDenied {
                path: path.clone(),
                pid,
                operation: "unlink",
            });
        }

        let contents = fs::read_to_string(path).map_err(|source| self.io_error("read", source))?;
        let recorded = contents.trim();
        if recorded.parse::<u32>().ok() != Some(pid) {
            if !options.unlink_others {
                return Err(PidFileError::OwnershipMismatch {
                    path: path.clone(),
                    pid,
                    recorded: recorded.to_string(),
                });
            }
            warn!(
                pid = pid,
                recorded = recorded,
                path = %path.display(),
                "Removing PID file recorded by another process"
            );
        }

        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound && options.overcome_adversity => {
                warn!(path = %path.display(), "PID file vanished before removal");
                return Ok(());
            }
            Err(err) => return Err(self.io_error("unlink", err)),
        }
        info!(pid = pid, path = %path.display(), "PID file removed");
        Ok(())
    }
}

impl Drop for GuardInner {
    fn drop(&mut self) {
        if self.state() == GuardState::Acquired {
            let options = self.stored_options();
            if let Err(err) = self.release(&options) {
                warn!(error = %err, "Failed to clean up PID file on drop");
            }
        }
    }
}

/// Read and parse the PID recorded at `path`.
pub fn read_pid(path: &Path) -> Result<u32, PidFileError> {
    let contents = fs::read_to_string(path).map_err(|source| PidFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    contents
        .trim()
        .parse()
        .map_err(|_| PidFileError::Parse {
            path: path.to_path_buf(),
            content: contents.trim().to_string(),
        })
}

fn is_accessible(path: &Path, flags: AccessFlags) -> bool {
    access(path, flags).is_ok()
}

fn parent_writable(path: &Path) -> bool {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    is_accessible(parent, AccessFlags::W_OK)
}
