//! SteamCMD invocation with streamed output, retry, and cancellation.
//!
//! The exit-code policy: `0` is success; `8` is SteamCMD's transient
//! self-update exit, recovered by a bounded retry; anything else is
//! fatal. A user-initiated cancel takes precedence over all of that:
//! whatever code the killed process reports, the run resolves canceled.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use steamtask_core::{LogSource, ProgressEvent, TaskCode, TaskError, TaskResult};

use crate::args::steamcmd_executable;
use crate::context::TaskContext;
use crate::progress::parse_and_emit;

/// Exit code SteamCMD returns after updating itself mid-run.
const SELF_UPDATE_EXIT: i32 = 8;

/// Default retry budget for the self-update exit.
pub const DEFAULT_RETRIES: u32 = 1;

/// Longest captured-output tail carried into a fatal error message.
const ERROR_TAIL_CHARS: usize = 4096;

/// How a resolved invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The tool exited 0.
    Completed,
    /// The task was canceled; supersedes whatever the process reported.
    Canceled,
}

/// Captured result of a resolved run.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: RunStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Whether this run was terminated on user request.
    pub fn is_canceled(&self) -> bool {
        self.status == RunStatus::Canceled
    }
}

/// Outcome of a single attempt, before the retry policy is applied.
enum Attempt {
    Resolved(ToolOutput),
    Fatal {
        code: i32,
        stdout: String,
        stderr: String,
    },
}

/// Runs SteamCMD under a shared [`TaskContext`].
pub struct ToolRunner {
    ctx: Arc<TaskContext>,
}

impl ToolRunner {
    /// Create a runner over the given orchestrator context.
    pub fn new(ctx: Arc<TaskContext>) -> Self {
        Self { ctx }
    }

    /// Run SteamCMD installed under `base` with `args`.
    ///
    /// The working directory is `base` itself; SteamCMD resolves its own
    /// depot cache relative to it. With a `task_id` the process is
    /// registered for cancellation before any output is read, every
    /// output chunk is broadcast as a log event and fed to the progress
    /// parser, and exactly one terminal `done` event is emitted no
    /// matter how many internal retries occur.
    ///
    /// `retries` bounds recoveries from the transient self-update exit
    /// (code 8); callers normally pass [`DEFAULT_RETRIES`].
    pub async fn run(
        &self,
        base: &Path,
        args: &[String],
        task_id: Option<&str>,
        mut retries: u32,
    ) -> TaskResult<ToolOutput> {
        let exe = steamcmd_executable(base);
        loop {
            match self.run_once(&exe, base, args, task_id).await? {
                Attempt::Resolved(output) => return Ok(output),
                Attempt::Fatal {
                    code,
                    stdout,
                    stderr,
                } => {
                    if code == SELF_UPDATE_EXIT && retries > 0 {
                        retries -= 1;
                        debug!(retries, "steamcmd self-update exit, retrying");
                        self.ctx.bus().emit_log(
                            LogSource::Steamcmd,
                            "SteamCMD exited 8 (likely self-update). Retrying...\n",
                        );
                        if let Some(id) = task_id {
                            self.ctx.bus().emit_progress(ProgressEvent::message(
                                id,
                                "SteamCMD updated; retrying...",
                            ));
                        }
                        continue;
                    }

                    warn!(code, "steamcmd exited with fatal status");
                    if let Some(id) = task_id {
                        self.ctx
                            .bus()
                            .emit_progress(ProgressEvent::done(id, TaskCode::Exit(code)));
                    }
                    let context = if stderr.trim().is_empty() { &stdout } else { &stderr };
                    return Err(TaskError::ToolExit {
                        code,
                        output: output_tail(context),
                    });
                }
            }
        }
    }

    /// One spawn-stream-wait cycle. Emits the terminal `done` event on
    /// the success and canceled paths; fatal exits are handed back to
    /// [`Self::run`] so the retry policy can decide first.
    async fn run_once(
        &self,
        exe: &Path,
        base: &Path,
        args: &[String],
        task_id: Option<&str>,
    ) -> TaskResult<Attempt> {
        debug!(exe = %exe.display(), ?args, "spawning steamcmd");
        let mut child = Command::new(exe)
            .args(args)
            .current_dir(base)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if let Some(id) = task_id {
                    self.ctx
                        .bus()
                        .emit_progress(ProgressEvent::error(id, e.to_string()));
                }
                TaskError::Spawn {
                    exe: exe.to_path_buf(),
                    source: e,
                }
            })?;

        // Register before the first byte of output is read, so a cancel
        // arriving mid-stream finds the pid.
        if let Some(id) = task_id {
            if let Some(pid) = child.id() {
                self.ctx.registry().register(id, pid, None);
            }
        }

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let bus = self.ctx.bus();

        let stdout_task = async {
            let mut acc = String::new();
            let Some(mut pipe) = stdout_pipe else {
                return acc;
            };
            let mut buf = [0u8; 4096];
            loop {
                match pipe.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                        acc.push_str(&text);
                        bus.emit_log(LogSource::Steamcmd, text.replace('\r', "\n"));
                        if let Some(id) = task_id {
                            parse_and_emit(bus, id, &text);
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "stdout reader exiting on read error");
                        break;
                    }
                }
            }
            acc
        };

        let stderr_task = async {
            let mut acc = String::new();
            let Some(mut pipe) = stderr_pipe else {
                return acc;
            };
            let mut buf = [0u8; 4096];
            loop {
                match pipe.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let text = String::from_utf8_lossy(&buf[..n]).replace('\r', "\n");
                        acc.push_str(&text);
                        bus.emit_log(LogSource::Steamcmd, text.clone());
                        if let Some(id) = task_id {
                            bus.emit_progress(ProgressEvent::message(id, text.trim()));
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "stderr reader exiting on read error");
                        break;
                    }
                }
            }
            acc
        };

        let (stdout_acc, stderr_acc) = tokio::join!(stdout_task, stderr_task);
        let status = child.wait().await?;

        if let Some(id) = task_id {
            self.ctx.registry().deregister(id);

            // Cancellation precedence: whatever the killed process
            // reported, the run resolves canceled - never a failure,
            // never a retry.
            if self.ctx.registry().consume_canceled(id) {
                bus.emit_progress(ProgressEvent::done(id, TaskCode::Canceled));
                return Ok(Attempt::Resolved(ToolOutput {
                    status: RunStatus::Canceled,
                    stdout: stdout_acc,
                    stderr: stderr_acc,
                }));
            }
        }

        // A status without a code (killed by signal outside our own
        // cancellation path) falls through to the fatal branch.
        let code = status.code().unwrap_or(-1);
        if code == 0 {
            if let Some(id) = task_id {
                bus.emit_progress(ProgressEvent::done(id, TaskCode::Exit(0)));
            }
            return Ok(Attempt::Resolved(ToolOutput {
                status: RunStatus::Completed,
                stdout: stdout_acc,
                stderr: stderr_acc,
            }));
        }

        Ok(Attempt::Fatal {
            code,
            stdout: stdout_acc,
            stderr: stderr_acc,
        })
    }
}

/// Tail of captured output, bounded so error messages stay readable.
fn output_tail(text: &str) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= ERROR_TAIL_CHARS {
        return trimmed.to_string();
    }
    trimmed
        .chars()
        .skip(count - ERROR_TAIL_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_tail_short_input_unchanged() {
        assert_eq!(output_tail("  boom  "), "boom");
    }

    #[test]
    fn test_output_tail_bounds_long_input() {
        let long = "x".repeat(ERROR_TAIL_CHARS * 2);
        assert_eq!(output_tail(&long).chars().count(), ERROR_TAIL_CHARS);
    }

    #[test]
    fn test_tool_output_canceled_accessor() {
        let out = ToolOutput {
            status: RunStatus::Canceled,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(out.is_canceled());
    }
}
