//! Process-wide wiring for the active guard.
//!
//! Signal dispositions and `atexit` callbacks belong to the process, not to a
//! guard instance, so at most one guard may own them. The guard is installed
//! here after a successful acquire and removed on a successful release.

use std::sync::{Mutex, MutexGuard, Once, PoisonError};

use nix::sys::signal::Signal;
use tracing::{debug, error, info, warn};

use crate::pidfile::error::PidFileError;
use crate::pidfile::guard::PidFileGuard;
use crate::pidfile::options::PidFileOptions;
use crate::pidfile::signals::{self, SignalRouter};

static ACTIVE: Mutex<Option<PidFileGuard>> = Mutex::new(None);
static ROUTER: Mutex<Option<SignalRouter>> = Mutex::new(None);
static EXIT_HOOK: Once = Once::new();

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Guard currently owning the process-wide hooks, if any.
pub fn active() -> Option<PidFileGuard> {
    lock(&ACTIVE).clone()
}

pub(crate) fn ensure_available(guard: &PidFileGuard) -> Result<(), PidFileError> {
    match lock(&ACTIVE).as_ref() {
        Some(current) if !current.same_guard(guard) => Err(PidFileError::HooksInUse {
            path: guard.path().to_path_buf(),
            active: current.path().to_path_buf(),
        }),
        _ => Ok(()),
    }
}

pub(crate) fn install(guard: &PidFileGuard, options: &PidFileOptions) -> Result<(), PidFileError> {
    ensure_available(guard)?;
    // Not under the ACTIVE lock: the router thread takes it to dispatch.
    watch_signals(&options.signals)?;
    if options.exit_hook {
        register_exit_hook();
    }

    let mut active = lock(&ACTIVE);
    if let Some(current) = active.as_ref() {
        if !current.same_guard(guard) {
            return Err(PidFileError::HooksInUse {
                path: guard.path().to_path_buf(),
                active: current.path().to_path_buf(),
            });
        }
    }
    *active = Some(guard.clone());
    info!(path = %guard.path().display(), "PID file hooks installed");
    Ok(())
}

/// Drop `guard` from the active slot. Its signals stay routed and fall back
/// to their default action. Other guards are left alone.
pub(crate) fn uninstall(guard: &PidFileGuard) {
    let mut active = lock(&ACTIVE);
    if matches!(active.as_ref(), Some(current) if current.same_guard(guard)) {
        *active = None;
    }
}

fn watch_signals(signals: &[Signal]) -> Result<(), PidFileError> {
    let Some(&first) = signals.first() else {
        return Ok(());
    };
    let mut slot = lock(&ROUTER);
    let router = match slot.take() {
        Some(router) => router,
        None => SignalRouter::start(handle_signal)
            .map_err(|source| PidFileError::SignalSetup { signal: first, source })?,
    };
    let result = router.watch(signals);
    *slot = Some(router);
    result
}

fn handle_signal(signal: Signal) {
    let armed = active().filter(|guard| guard.options().signals.contains(&signal));
    let Some(guard) = armed else {
        debug!(signal = %signal, "No PID file guard armed for signal; applying default action");
        signals::apply_default_action(signal);
        return;
    };

    info!(signal = %signal, path = %guard.path().display(), "Received signal; releasing PID file");
    if let Err(err) = guard.release_stored() {
        error!(
            signal = %signal,
            error = %err,
            label = err.error_label(),
            "Failed to release PID file on signal"
        );
    }
    signals::terminate(signal)
}

fn register_exit_hook() {
    EXIT_HOOK.call_once(|| {
        // SAFETY: `release_at_exit` is a plain `extern "C" fn` that never unwinds.
        let rc = unsafe { libc::atexit(release_at_exit) };
        if rc != 0 {
            warn!("Failed to register exit hook; PID file will not be removed on normal exit");
        }
    });
}

extern "C" fn release_at_exit() {
    let Some(guard) = active() else {
        return;
    };
    if let Err(err) = guard.release_stored() {
        error!(
            error = %err,
            label = err.error_label(),
            "Failed to release PID file at exit"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The only test in this binary that touches the active slot; it installs
    // the exit hook but no signal handlers.
    #[test]
    fn test_install_and_uninstall_active_guard() {
        let temp = tempfile::tempdir().unwrap();
        let first = PidFileGuard::at(temp.path().join("first.pid"));
        let second = PidFileGuard::at(temp.path().join("second.pid"));
        let options = PidFileOptions {
            signals: Vec::new(),
            ..PidFileOptions::default()
        };

        first.acquire(&options).unwrap();
        assert!(active().unwrap().same_guard(&first));

        let err = second.acquire(&options).unwrap_err();
        assert_eq!(err.error_label(), "hooks_in_use");
        assert!(!second.path().exists());

        first.release_stored().unwrap();
        assert!(active().is_none());

        second.acquire(&options).unwrap();
        assert!(active().unwrap().same_guard(&second));
        second.release_stored().unwrap();
        assert!(active().is_none());
    }
}
