//! Runs helper scripts under the JavaScript runtime.
//!
//! Scripts are passed with `--eval` and receive their request as JSON in an
//! environment variable. Their reply is the last stdout line that starts with
//! [`REPLY_MARKER`], so anything user code prints is ignored.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;
use wait_timeout::ChildExt;

/// Environment variable carrying the JSON request to a helper script.
pub const REQUEST_ENV: &str = "COLLECTION_SCHEMA_REQUEST";

/// Prefix of the reply line a helper script writes to stdout.
pub const REPLY_MARKER: &str = "@@collection-schema@@";

/// Captured result of one helper-script run.
#[derive(Debug)]
pub struct ScriptOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ScriptOutput {
    /// Payload of the last reply line, if any.
    pub fn reply(&self) -> Option<&str> {
        extract_reply(&self.stdout)
    }

    /// Trimmed stderr tail, for diagnostics.
    pub fn stderr_tail(&self) -> String {
        let trimmed = self.stderr.trim();
        let start = trimmed
            .char_indices()
            .rev()
            .nth(511)
            .map_or(0, |(idx, _)| idx);
        trimmed[start..].to_string()
    }
}

/// Why a helper script produced no output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptFailure {
    /// The runtime binary does not exist.
    NotInstalled(PathBuf),
    /// The script ran past its deadline and was killed.
    Timeout(Duration),
    /// Spawning or waiting failed.
    Io(String),
}

impl std::fmt::Display for ScriptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInstalled(bin) => write!(f, "`{}` is not installed", bin.display()),
            Self::Timeout(after) => write!(f, "timed out after {} ms", after.as_millis()),
            Self::Io(msg) => f.write_str(msg),
        }
    }
}

/// A helper script plus everything needed to run it once.
#[derive(Debug, Clone)]
pub struct ScriptRun<'a> {
    pub node_binary: &'a Path,
    pub script: &'a str,
    pub request: &'a serde_json::Value,
    pub cwd: &'a Path,
    pub timeout: Duration,
}

/// Returns the payload of the last marker line in `stdout`.
pub fn extract_reply(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .rev()
        .find_map(|line| line.trim_end().strip_prefix(REPLY_MARKER))
}

/// Runs a script to completion or until its timeout.
pub fn run_script(run: &ScriptRun<'_>) -> Result<ScriptOutput, ScriptFailure> {
    let mut command = Command::new(run.node_binary);
    command
        .arg("--input-type=module")
        .arg("--eval")
        .arg(run.script)
        .env(REQUEST_ENV, run.request.to_string())
        .current_dir(run.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let started = Instant::now();
    let mut child = command.spawn().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ScriptFailure::NotInstalled(run.node_binary.to_path_buf())
        } else {
            ScriptFailure::Io(format!("spawn failed: {e}"))
        }
    })?;

    // Drain both pipes in the background so a chatty child cannot fill a pipe
    // buffer and block before it exits.
    let stdout_thread = child.stdout.take().map(spawn_drain);
    let stderr_thread = child.stderr.take().map(spawn_drain);

    let status = match wait_with_timeout(&mut child, run.timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            debug!(
                timeout_ms = run.timeout.as_millis() as u64,
                "Helper script timed out, killing process"
            );
            let _ = child.kill();
            let _ = child.wait();
            return Err(ScriptFailure::Timeout(run.timeout));
        }
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ScriptFailure::Io(format!("wait failed: {e}")));
        }
    };

    let stdout = join_drain(stdout_thread);
    let stderr = join_drain(stderr_thread);
    let elapsed = started.elapsed();
    debug!(
        exit_code = ?status.code(),
        elapsed_ms = elapsed.as_millis() as u64,
        stdout_len = stdout.len(),
        "Helper script finished"
    );

    Ok(ScriptOutput {
        status,
        stdout,
        stderr,
        elapsed,
    })
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    child.wait_timeout(timeout)
}

fn spawn_drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            debug!(error = %e, "Failed to drain helper script pipe");
        }
        buf
    })
}

fn join_drain(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|t| t.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_reply_takes_last_marker_line() {
        let stdout = format!(
            "user log line\n{REPLY_MARKER}{{\"ok\":false}}\nmore noise\n{REPLY_MARKER}{{\"ok\":true}}\n"
        );
        assert_eq!(extract_reply(&stdout), Some("{\"ok\":true}"));
    }

    #[test]
    fn test_extract_reply_none_without_marker() {
        assert_eq!(extract_reply("hello\nworld\n"), None);
    }

    #[test]
    fn test_missing_binary_is_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        let request = serde_json::json!({});
        let missing = dir.path().join("definitely-not-node");
        let run = ScriptRun {
            node_binary: &missing,
            script: "",
            request: &request,
            cwd: dir.path(),
            timeout: Duration::from_secs(1),
        };
        let err = run_script(&run).unwrap_err();
        assert_eq!(err, ScriptFailure::NotInstalled(missing.clone()));
        assert!(err.to_string().contains("is not installed"));
    }
}
