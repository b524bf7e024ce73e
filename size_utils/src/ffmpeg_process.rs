//! FFmpeg process wrapper
//!
//! Piping stderr without reading it deadlocks once ffmpeg fills the pipe
//! buffer (~64KB of log lines), so stderr is drained on its own thread for the
//! whole life of the child.
//!
//! Sample encodes must not hang the optimizer: `wait_timeout` polls the
//! child and kills it once the deadline passes.
//!
//! ```ignore
//! use size_utils::ffmpeg_process::FfmpegProcess;
//! use std::process::Command;
//! use std::time::Duration;
//!
//! let mut cmd = Command::new("ffmpeg");
//! cmd.args(["-y", "-i", "input.mp4", "-t", "2", "sample.mp4"]);
//!
//! let process = FfmpegProcess::spawn(&mut cmd)?;
//! let stderr = process.wait_success(Duration::from_secs(60))?;
//! ```

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::errors::SampleError;

/// Interval between `try_wait` polls.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

// ═══════════════════════════════════════════════════════════════
// FfmpegProcess
// ═══════════════════════════════════════════════════════════════

pub struct FfmpegProcess {
    child: Child,
    stderr_thread: Option<JoinHandle<String>>,
}

impl FfmpegProcess {
    /// Spawns `cmd` with stdout discarded and stderr drained in the background.
    pub fn spawn(cmd: &mut Command) -> Result<Self, SampleError> {
        info!(command = ?cmd, "Executing FFmpeg command");

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| SampleError::Spawn(format!("{:?}: {}", cmd.get_program(), e)))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SampleError::Other("Failed to capture FFmpeg stderr".to_string()))?;

        let stderr_thread = thread::spawn(move || {
            let mut buf = String::new();
            let reader = BufReader::new(stderr);
            for line in reader.lines().map_while(|line| line.ok()) {
                buf.push_str(&line);
                buf.push('\n');
            }
            buf
        });

        Ok(Self {
            child,
            stderr_thread: Some(stderr_thread),
        })
    }

    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>, SampleError> {
        Ok(self.child.try_wait()?)
    }

    pub fn kill(&mut self) -> Result<(), SampleError> {
        Ok(self.child.kill()?)
    }

    /// Waits up to `timeout`; on expiry the child is killed and reaped.
    pub fn wait_timeout(mut self, timeout: Duration) -> Result<(ExitStatus, String), SampleError> {
        let deadline = Instant::now() + timeout;
        let status = loop {
            if let Some(status) = self.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                warn!(timeout_ms = timeout.as_millis() as u64, "FFmpeg timed out, killing");
                // the child may exit between the poll and the kill
                let _ = self.kill();
                let _ = self.child.wait();
                self.join_stderr();
                return Err(SampleError::Timeout(timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stderr = self.join_stderr();
        if status.success() {
            debug!(exit_code = status.code(), "FFmpeg process completed successfully");
        } else {
            warn!(
                exit_code = status.code(),
                stderr_output = %stderr,
                "FFmpeg process failed"
            );
        }
        Ok((status, stderr))
    }

    /// `wait_timeout`, mapping a non-zero exit to `SampleError::Failed`.
    pub fn wait_success(self, timeout: Duration) -> Result<String, SampleError> {
        let (status, stderr) = self.wait_timeout(timeout)?;
        if status.success() {
            Ok(stderr)
        } else {
            Err(SampleError::Failed {
                exit_code: status.code(),
                stderr: format_ffmpeg_error(&stderr),
            })
        }
    }

    fn join_stderr(&mut self) -> String {
        self.stderr_thread
            .take()
            .map(|t| t.join().unwrap_or_default())
            .unwrap_or_default()
    }
}

// ═══════════════════════════════════════════════════════════════
// Error text
// ═══════════════════════════════════════════════════════════════

/// Picks the most useful line of ffmpeg's stderr: the last line mentioning
/// an error, else the last line that is not progress output.
pub fn format_ffmpeg_error(stderr: &str) -> String {
    if let Some(error_line) = stderr
        .lines()
        .rev()
        .find(|line| line.contains("Error") || line.contains("error"))
    {
        return error_line.trim().to_string();
    }

    stderr
        .lines()
        .rev()
        .find(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty()
                && !trimmed.starts_with("frame=")
                && !trimmed.starts_with("fps=")
                && !trimmed.starts_with("size=")
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "Unknown FFmpeg error".to_string())
}
