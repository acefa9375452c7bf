//! Shell-command inspector: lsof/ps on unix, netstat/tasklist/taskkill on windows
//!
//! Every subprocess is bounded by a timeout and killed on drop, so a hung
//! command cannot stall a scheduler tick indefinitely.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use super::{InspectorError, ProcessInfo, ProcessInspector};

/// Inspector backed by platform shell commands
#[derive(Debug, Clone)]
pub struct ShellInspector {
    timeout: Duration,
}

impl ShellInspector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run a command to completion, returning (exit code, stdout, stderr).
    async fn run(&self, program: &str, args: &[&str]) -> Result<(Option<i32>, String, String), InspectorError> {
        let command = format!("{program} {}", args.join(" "));
        debug!(command = %command, "Running inspector command");

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(program).args(args).kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| InspectorError::Timeout {
            command: command.clone(),
            timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
        })?
        .map_err(|source| InspectorError::Spawn { command, source })?;

        Ok((
            output.status.code(),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }
}

impl Default for ShellInspector {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::config::defaults::INSPECTOR_TIMEOUT_MS))
    }
}

#[cfg(unix)]
#[async_trait]
impl ProcessInspector for ShellInspector {
    async fn find_process_by_port(&self, port: u16) -> Result<Option<ProcessInfo>, InspectorError> {
        let filter = format!("-iTCP:{port}");
        let (code, stdout, stderr) = self
            .run("lsof", &["-nP", &filter, "-sTCP:LISTEN", "-t"])
            .await?;

        // lsof exits 1 with empty output when nothing matches
        let Some(pid) = parse_lsof_pids(&stdout).into_iter().next() else {
            if code.is_some_and(|c| c > 1) {
                return Err(InspectorError::CommandFailed {
                    command: format!("lsof {filter}"),
                    code,
                    stderr,
                });
            }
            return Ok(None);
        };

        let pid_arg = pid.to_string();
        let (_, name_out, _) = self.run("ps", &["-p", &pid_arg, "-o", "comm="]).await?;
        let name = name_out.trim();
        Ok(Some(ProcessInfo {
            pid,
            name: if name.is_empty() { "unknown".to_string() } else { name.to_string() },
        }))
    }

    async fn kill_process(&self, pid: u32) -> Result<bool, InspectorError> {
        let Ok(raw) = libc::pid_t::try_from(pid) else {
            return Ok(false);
        };
        if raw <= 0 {
            return Ok(false);
        }
        // SAFETY: kill(2) has no memory-safety preconditions.
        #[allow(unsafe_code)]
        let rc = unsafe { libc::kill(raw, libc::SIGTERM) };
        if rc == 0 {
            return Ok(true);
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(false)
        } else {
            Err(InspectorError::Spawn {
                command: format!("kill -TERM {pid}"),
                source: err,
            })
        }
    }
}

#[cfg(windows)]
#[async_trait]
impl ProcessInspector for ShellInspector {
    async fn find_process_by_port(&self, port: u16) -> Result<Option<ProcessInfo>, InspectorError> {
        let (code, stdout, stderr) = self.run("netstat", &["-ano", "-p", "TCP"]).await?;
        if code != Some(0) {
            return Err(InspectorError::CommandFailed {
                command: "netstat -ano -p TCP".to_string(),
                code,
                stderr,
            });
        }
        let Some(pid) = parse_netstat_listener(&stdout, port) else {
            return Ok(None);
        };

        let filter = format!("PID eq {pid}");
        let (_, list_out, _) = self
            .run("tasklist", &["/FI", &filter, "/FO", "CSV", "/NH"])
            .await?;
        Ok(Some(ProcessInfo {
            pid,
            name: parse_tasklist_name(&list_out).unwrap_or_else(|| "unknown".to_string()),
        }))
    }

    async fn kill_process(&self, pid: u32) -> Result<bool, InspectorError> {
        let pid_arg = pid.to_string();
        let (code, _, _) = self.run("taskkill", &["/PID", &pid_arg, "/F"]).await?;
        Ok(code == Some(0))
    }
}

#[cfg(not(any(unix, windows)))]
#[async_trait]
impl ProcessInspector for ShellInspector {
    async fn find_process_by_port(&self, _port: u16) -> Result<Option<ProcessInfo>, InspectorError> {
        Err(InspectorError::Unsupported)
    }

    async fn kill_process(&self, _pid: u32) -> Result<bool, InspectorError> {
        Err(InspectorError::Unsupported)
    }
}

// ============================================================================
// Output Parsing
// ============================================================================

/// PIDs printed one per line by `lsof -t`.
pub fn parse_lsof_pids(output: &str) -> Vec<u32> {
    output
        .lines()
        .filter_map(|l| l.trim().parse().ok())
        .collect()
}

fn netstat_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*TCP\s+\S+:(\d+)\s+\S+\s+LISTENING\s+(\d+)\s*$")
            .expect("netstat listener regex is valid")
    })
}

/// PID of the process LISTENING on `port` in `netstat -ano` output.
pub fn parse_netstat_listener(output: &str, port: u16) -> Option<u32> {
    output.lines().find_map(|line| {
        let caps = netstat_regex().captures(line)?;
        let local_port: u16 = caps[1].parse().ok()?;
        (local_port == port).then(|| caps[2].parse().ok()).flatten()
    })
}

/// Image name from the first row of `tasklist /FO CSV /NH`.
pub fn parse_tasklist_name(output: &str) -> Option<String> {
    let line = output.lines().find(|l| l.starts_with('"'))?;
    let name = line.split("\",\"").next()?.trim_matches('"');
    (!name.is_empty()).then(|| name.to_string())
}
