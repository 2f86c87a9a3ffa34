//! External tool invocation with transparent privilege elevation.
//!
//! Every sampler and mitigation path funnels through here: commands run with
//! a bounded timeout, stdout and stderr are captured together, and a failure
//! that looks permission-shaped is retried once through `sudo` when one is
//! available. Output printed before a timeout kill is retained — scanners
//! that never exit on their own (hcitool lescan, bluetoothctl scan) still
//! yield their pre-kill results. Command failure is never a panic; it is
//! reported through the returned [`ToolOutput`] flags or a [`DetectorError`].

use std::env;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{DetectorError, Result};

/// How long to keep draining pipes after a timeout kill. Orphaned
/// grandchildren can hold the write end open indefinitely.
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Output/error fragments that mark a failure as permission-shaped and worth
/// one elevated retry.
pub const PERMISSION_INDICATORS: [&str; 6] = [
    "Permission denied",
    "Operation not permitted",
    "Device or resource busy",
    "interface not in monitor mode",
    "no such device",
    "rtl_power: failed to open rtl",
];

/// One external command in a cascade: the program, its arguments and any
/// command-specific failure indicators that should also trigger elevation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub extra_indicators: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            extra_indicators: Vec::new(),
        }
    }

    pub fn with_indicators(mut self, indicators: &[&str]) -> Self {
        self.extra_indicators = indicators.iter().map(|i| i.to_string()).collect();
        self
    }

    /// Human-readable command line, used in logs and error messages.
    pub fn describe(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Result of one completed (or timed-out) invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Final command line that produced this output, elevation prefix included.
    pub descriptor: String,
    /// Combined stdout + stderr.
    pub combined: String,
    pub success: bool,
    /// The per-call timeout elapsed and the child was killed. Some callers
    /// (BLE scanning) treat this as a benign empty result.
    pub timed_out: bool,
    pub elevated: bool,
}

impl ToolOutput {
    /// Usable output: either a clean exit or a benign timeout.
    pub fn usable(&self) -> bool {
        self.success || self.timed_out
    }
}

/// True when the current process already runs with root privileges, in which
/// case the elevation retry is pointless and skipped.
pub fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// PATH probe for an external tool, the `exec.LookPath` equivalent.
pub fn tool_available(name: &str) -> bool {
    if name.contains('/') {
        return is_executable(Path::new(name));
    }
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| is_executable(&dir.join(name)))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn matches_indicator(text: &str, extra: &[String]) -> bool {
    PERMISSION_INDICATORS.iter().any(|i| text.contains(i))
        || extra.iter().any(|i| text.contains(i.as_str()))
}

/// Accumulates a pipe into a shared buffer so whatever arrived before a kill
/// survives even if the reader task is later aborted mid-wait.
fn spawn_reader<R>(reader: Option<R>) -> (Arc<Mutex<Vec<u8>>>, Option<JoinHandle<()>>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let buf = Arc::new(Mutex::new(Vec::new()));
    let task = reader.map(|mut reader| {
        let buf = Arc::clone(&buf);
        tokio::spawn(async move {
            let mut chunk = [0u8; 4096];
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => buf
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .extend_from_slice(&chunk[..n]),
                }
            }
        })
    });
    (buf, task)
}

fn take_buffer(buf: &Arc<Mutex<Vec<u8>>>) -> String {
    let bytes = buf.lock().unwrap_or_else(|e| e.into_inner());
    String::from_utf8_lossy(&bytes).into_owned()
}

async fn run_once(program: &str, args: &[String], limit: Duration) -> Result<ToolOutput> {
    let descriptor = if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|err| {
        DetectorError::tool_failed(program, format!("failed to spawn: {err}"))
    })?;

    let (stdout_buf, stdout_task) = spawn_reader(child.stdout.take());
    let (stderr_buf, stderr_task) = spawn_reader(child.stderr.take());

    let (success, timed_out) = match timeout(limit, child.wait()).await {
        Ok(Ok(status)) => {
            for task in [stdout_task, stderr_task].into_iter().flatten() {
                let _ = task.await;
            }
            (status.success(), false)
        }
        Ok(Err(err)) => {
            return Err(DetectorError::tool_failed(
                program,
                format!("failed to wait: {err}"),
            ));
        }
        Err(_) => {
            debug!("{} timed out after {:?}, killing", descriptor, limit);
            let _ = child.kill().await;
            for task in [stdout_task, stderr_task].into_iter().flatten() {
                let mut task = task;
                if timeout(PIPE_DRAIN_GRACE, &mut task).await.is_err() {
                    task.abort();
                }
            }
            (false, true)
        }
    };

    let mut combined = take_buffer(&stdout_buf);
    combined.push_str(&take_buffer(&stderr_buf));

    Ok(ToolOutput {
        descriptor,
        combined,
        success,
        timed_out,
        elevated: false,
    })
}

/// Runs a command, and on a permission-shaped failure re-runs the identical
/// command through `sudo`, returning the elevated attempt's result instead.
/// Returns `Ok` for every invocation that completed or timed out; `Err` only
/// when the process could not be spawned or reaped at all.
pub async fn run_with_elevation_fallback(
    cmd: &ToolCommand,
    limit: Duration,
) -> Result<ToolOutput> {
    let output = run_once(&cmd.program, &cmd.args, limit).await?;
    if output.success || output.timed_out {
        return Ok(output);
    }

    if !matches_indicator(&output.combined, &cmd.extra_indicators) {
        return Ok(output);
    }
    if running_as_root() || !tool_available("sudo") {
        return Ok(output);
    }

    warn!(
        "permission error detected, retrying with sudo: {}",
        cmd.describe()
    );
    let mut elevated_args = Vec::with_capacity(cmd.args.len() + 1);
    elevated_args.push(cmd.program.clone());
    elevated_args.extend(cmd.args.iter().cloned());

    let mut elevated = run_once("sudo", &elevated_args, limit).await?;
    elevated.elevated = true;
    Ok(elevated)
}

/// Cascade driver: tries each command in order and returns the first clean
/// success. Commands whose program is not installed are skipped. When every
/// strategy fails, the error names the whole cascade.
pub async fn run_first_success(
    cascade: &[ToolCommand],
    limit: Duration,
) -> Result<ToolOutput> {
    let mut last_failure: Option<String> = None;
    let mut any_attempted = false;

    for cmd in cascade {
        if !tool_available(&cmd.program) {
            debug!("{} not installed, skipping", cmd.program);
            continue;
        }
        any_attempted = true;
        match run_with_elevation_fallback(cmd, limit).await {
            Ok(output) if output.success => return Ok(output),
            Ok(output) => {
                debug!("{} failed, trying next tool", cmd.describe());
                let detail = if output.timed_out {
                    "timed out".to_string()
                } else {
                    output.combined.trim().to_string()
                };
                last_failure = Some(format!("{}: {}", cmd.describe(), detail));
            }
            Err(err) => {
                last_failure = Some(err.to_string());
            }
        }
    }

    if !any_attempted {
        let tools = cascade
            .iter()
            .map(|c| c.program.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(DetectorError::tool_failed(
            tools,
            "none of the cascade tools are installed",
        ));
    }

    Err(DetectorError::tool_failed(
        "scan cascade",
        last_failure.unwrap_or_else(|| "all tools failed".to_string()),
    ))
}
