use nix::sys::signal::Signal;

/// Signals intercepted when nothing else is configured.
pub const DEFAULT_SIGNALS: [Signal; 2] = [Signal::SIGINT, Signal::SIGTERM];

/// Policy for acquiring and releasing a PID file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidFileOptions {
    /// Replace an existing PID file instead of refusing to start.
    pub overwrite_existing: bool,
    /// On release, treat a missing or unreadable file as already released.
    pub overcome_adversity: bool,
    /// On release, delete the file even when it records another PID.
    pub unlink_others: bool,
    /// Signals that release the file and terminate the process. Empty disables
    /// signal wiring.
    pub signals: Vec<Signal>,
    /// Release on normal process exit.
    pub exit_hook: bool,
}

impl Default for PidFileOptions {
    fn default() -> Self {
        Self {
            overwrite_existing: false,
            overcome_adversity: false,
            unlink_others: false,
            signals: DEFAULT_SIGNALS.to_vec(),
            exit_hook: true,
        }
    }
}

impl PidFileOptions {
    /// Options that leave process-wide state alone: no signal handlers and no
    /// exit hook. Release is then entirely up to the caller.
    pub fn unmanaged() -> Self {
        Self {
            signals: Vec::new(),
            exit_hook: false,
            ..Self::default()
        }
    }

    pub fn installs_hooks(&self) -> bool {
        !self.signals.is_empty() || self.exit_hook
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalNameError {
    #[error("Unknown signal: {0}")]
    Unknown(String),

    #[error("Signal {0} cannot be intercepted")]
    Uncatchable(String),
}

/// Parses `INT`, `SIGINT`, `int` or `2` into a signal that can be handled.
pub fn parse_signal(name: &str) -> Result<Signal, SignalNameError> {
    let trimmed = name.trim();
    let signal = match trimmed.parse::<i32>() {
        Ok(number) => Signal::try_from(number)
            .map_err(|_| SignalNameError::Unknown(trimmed.to_string()))?,
        Err(_) => {
            let upper = trimmed.to_ascii_uppercase();
            let full = if upper.starts_with("SIG") {
                upper
            } else {
                format!("SIG{upper}")
            };
            full.parse::<Signal>()
                .map_err(|_| SignalNameError::Unknown(trimmed.to_string()))?
        }
    };

    // KILL and STOP cannot be caught; the rest cannot be handled safely.
    if matches!(
        signal,
        Signal::SIGKILL | Signal::SIGSTOP | Signal::SIGILL | Signal::SIGFPE | Signal::SIGSEGV
    ) {
        return Err(SignalNameError::Uncatchable(signal.as_str().to_string()));
    }
    Ok(signal)
}

pub fn parse_signals<S: AsRef<str>>(names: &[S]) -> Result<Vec<Signal>, SignalNameError> {
    let mut signals = Vec::with_capacity(names.len());
    for name in names {
        let signal = parse_signal(name.as_ref())?;
        if !signals.contains(&signal) {
            signals.push(signal);
        }
    }
    Ok(signals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_policy() {
        let options = PidFileOptions::default();
        assert!(!options.overwrite_existing);
        assert!(!options.overcome_adversity);
        assert!(!options.unlink_others);
        assert!(options.exit_hook);
        assert_eq!(options.signals, vec![Signal::SIGINT, Signal::SIGTERM]);
        assert!(options.installs_hooks());
    }

    #[test]
    fn test_unmanaged_installs_nothing() {
        let options = PidFileOptions::unmanaged();
        assert!(options.signals.is_empty());
        assert!(!options.exit_hook);
        assert!(!options.installs_hooks());
    }

    #[test]
    fn test_parse_signal_accepts_common_spellings() {
        assert_eq!(parse_signal("INT").unwrap(), Signal::SIGINT);
        assert_eq!(parse_signal("sigterm").unwrap(), Signal::SIGTERM);
        assert_eq!(parse_signal(" quit ").unwrap(), Signal::SIGQUIT);
        assert_eq!(parse_signal("1").unwrap(), Signal::SIGHUP);
    }

    #[test]
    fn test_parse_signal_rejects_unknown_and_uncatchable() {
        assert_eq!(
            parse_signal("NOPE").unwrap_err(),
            SignalNameError::Unknown("NOPE".to_string())
        );
        assert_eq!(
            parse_signal("KILL").unwrap_err(),
            SignalNameError::Uncatchable("SIGKILL".to_string())
        );
        assert!(matches!(
            parse_signal("stop"),
            Err(SignalNameError::Uncatchable(_))
        ));
    }

    #[test]
    fn test_parse_signals_deduplicates() {
        let signals = parse_signals(&["INT", "SIGINT", "TERM"]).unwrap();
        assert_eq!(signals, vec![Signal::SIGINT, Signal::SIGTERM]);
    }
}
