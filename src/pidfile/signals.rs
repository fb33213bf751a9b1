use std::collections::HashSet;
use std::io;
use std::process;
use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::thread;

use nix::sys::signal::{self as nix_signal, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::pidfile::error::PidFileError;

type Handler = Arc<dyn Fn(Signal) + Send + Sync>;

/// Background thread routing every delivery of the watched signals to one
/// handler, outside signal context.
///
/// Streams are never dropped. tokio keeps its OS handler installed for the
/// life of the process, so once a signal is watched every later delivery
/// arrives here and the handler decides what to do with it, including
/// falling back to [`apply_default_action`].
#[derive(Debug)]
pub struct SignalRouter {
    requests: mpsc::UnboundedSender<WatchRequest>,
}

struct WatchRequest {
    signals: Vec<Signal>,
    ready: std_mpsc::Sender<Result<(), PidFileError>>,
}

impl SignalRouter {
    /// Start the `pidguard-signals` thread with its own current-thread runtime.
    pub fn start<F>(handler: F) -> io::Result<Self>
    where
        F: Fn(Signal) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let (requests, incoming) = mpsc::unbounded_channel();
        let (started_tx, started_rx) = std_mpsc::channel();

        thread::Builder::new()
            .name("pidguard-signals".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        let _ = started_tx.send(Err(err));
                        return;
                    }
                };
                let _ = started_tx.send(Ok(()));
                runtime.block_on(route(incoming, handler));
            })?;

        started_rx
            .recv()
            .map_err(|_| io::Error::other("signal router exited during startup"))??;
        Ok(Self { requests })
    }

    /// Route `signals` to the handler. Signals already watched are left as
    /// they are. Returns once every handler is registered, or with the first
    /// registration error.
    pub fn watch(&self, signals: &[Signal]) -> Result<(), PidFileError> {
        let Some(&first) = signals.first() else {
            return Ok(());
        };
        let (ready, ready_rx) = std_mpsc::channel();
        self.requests
            .send(WatchRequest {
                signals: signals.to_vec(),
                ready,
            })
            .map_err(|_| router_gone(first))?;
        ready_rx.recv().map_err(|_| router_gone(first))?
    }
}

fn router_gone(signal: Signal) -> PidFileError {
    PidFileError::SignalSetup {
        signal,
        source: io::Error::other("signal router is not running"),
    }
}

async fn route(mut incoming: mpsc::UnboundedReceiver<WatchRequest>, handler: Handler) {
    let mut watched = HashSet::new();
    while let Some(request) = incoming.recv().await {
        let result = watch_all(&request.signals, &mut watched, &handler);
        let _ = request.ready.send(result);
    }
}

fn watch_all(
    signals: &[Signal],
    watched: &mut HashSet<Signal>,
    handler: &Handler,
) -> Result<(), PidFileError> {
    for &sig in signals {
        if watched.contains(&sig) {
            continue;
        }
        let mut stream = signal(SignalKind::from_raw(sig as i32)).map_err(|source| {
            error!(signal = %sig, error = %source, "Failed to register signal handler");
            PidFileError::SignalSetup {
                signal: sig,
                source,
            }
        })?;
        watched.insert(sig);

        let handler = Arc::clone(handler);
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                debug!(signal = %sig, "Signal received");
                handler(sig);
            }
        });
    }
    info!(signals = ?signal_names(signals), "Signal handlers registered");
    Ok(())
}

/// Terminate the process the way `signal` would have without a handler, so
/// the parent observes a signal-induced exit.
pub fn terminate(signal: Signal) -> ! {
    // SAFETY: SIG_DFL installs no handler code of ours.
    if let Err(err) = unsafe { nix_signal::signal(signal, SigHandler::SigDfl) } {
        warn!(signal = %signal, error = %err, "Failed to restore default signal disposition");
    }
    if let Err(err) = nix_signal::raise(signal) {
        error!(signal = %signal, error = %err, "Failed to re-raise signal");
    }
    // Only reached when the signal is blocked or ignored by default.
    process::exit(128 + signal as i32)
}

/// Apply the default action of `signal` as if no handler were installed,
/// then put the current handler back.
///
/// Returns only when the default action lets the process continue (ignore,
/// or stop followed by `SIGCONT`).
pub fn apply_default_action(signal: Signal) {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    // SAFETY: SIG_DFL installs no handler code of ours; the previous action
    // is reinstated below.
    let previous = match unsafe { nix_signal::sigaction(signal, &default) } {
        Ok(previous) => previous,
        Err(err) => {
            warn!(signal = %signal, error = %err, "Failed to switch to default signal disposition");
            return;
        }
    };
    if let Err(err) = nix_signal::raise(signal) {
        error!(signal = %signal, error = %err, "Failed to re-raise signal");
    }
    // SAFETY: reinstates the action that was installed before this call.
    if let Err(err) = unsafe { nix_signal::sigaction(signal, &previous) } {
        warn!(signal = %signal, error = %err, "Failed to reinstate signal handler");
    }
}

fn signal_names(signals: &[Signal]) -> Vec<&'static str> {
    signals.iter().map(|sig| sig.as_str()).collect()
}
