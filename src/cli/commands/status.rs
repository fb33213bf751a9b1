use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cli::Context;
use crate::pidfile::process::is_process_running;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HolderState {
    /// No PID file.
    Absent,
    /// The recorded process is alive.
    Running,
    /// The recorded process is gone but the file remains.
    Stale,
    /// The file exists but does not hold a PID.
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub path: PathBuf,
    pub state: HolderState,
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl StatusReport {
    pub fn probe(path: &Path) -> anyhow::Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Self {
                    path: path.to_path_buf(),
                    state: HolderState::Absent,
                    pid: None,
                    content: None,
                });
            }
            Err(err) => return Err(err.into()),
        };

        let trimmed = contents.trim();
        let Ok(pid) = trimmed.parse::<u32>() else {
            return Ok(Self {
                path: path.to_path_buf(),
                state: HolderState::Invalid,
                pid: None,
                content: Some(trimmed.to_string()),
            });
        };

        let state = if is_process_running(pid)? {
            HolderState::Running
        } else {
            HolderState::Stale
        };
        Ok(Self {
            path: path.to_path_buf(),
            state,
            pid: Some(pid),
            content: None,
        })
    }
}

pub async fn handle_status(ctx: &Context, json: bool) -> anyhow::Result<()> {
    let path = ctx.resolver().resolve()?;
    let report = StatusReport::probe(&path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("PID file: {}", report.path.display());
        match report.state {
            HolderState::Absent => println!("State: absent"),
            HolderState::Running => println!("State: running"),
            HolderState::Stale => println!("State: stale"),
            HolderState::Invalid => println!("State: invalid"),
        }
        if let Some(pid) = report.pid {
            println!("PID: {}", pid);
        }
        if let Some(content) = &report.content {
            println!("Content: {:?}", content);
        }
    }

    if report.state != HolderState::Running {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process;

    #[test]
    fn test_probe_absent() {
        let temp = tempfile::tempdir().unwrap();
        let report = StatusReport::probe(&temp.path().join("none.pid")).unwrap();
        assert_eq!(report.state, HolderState::Absent);
        assert_eq!(report.pid, None);
    }

    #[test]
    fn test_probe_running() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("app.pid");
        fs::write(&path, process::id().to_string()).unwrap();

        let report = StatusReport::probe(&path).unwrap();
        assert_eq!(report.state, HolderState::Running);
        assert_eq!(report.pid, Some(process::id()));
    }

    #[test]
    fn test_probe_stale() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("app.pid");
        fs::write(&path, "4294967295").unwrap();

        let report = StatusReport::probe(&path).unwrap();
        assert_eq!(report.state, HolderState::Stale);
    }

    #[test]
    fn test_probe_invalid() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("app.pid");
        fs::write(&path, "garbage\n").unwrap();

        let report = StatusReport::probe(&path).unwrap();
        assert_eq!(report.state, HolderState::Invalid);
        assert_eq!(report.content.as_deref(), Some("garbage"));
    }

    #[test]
    fn test_report_serializes_snake_case_state() {
        let report = StatusReport {
            path: PathBuf::from("/var/run/app.pid"),
            state: HolderState::Stale,
            pid: Some(7),
            content: None,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["state"], "stale");
        assert_eq!(value["pid"], 7);
        assert!(value.get("content").is_none());
    }
}
