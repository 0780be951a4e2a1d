// src/exec/command.rs

//! Shell command runner used by command-backed pipeline steps.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// Upper bound on the stdout kept per command; older output is dropped.
pub const MAX_CAPTURED_STDOUT: usize = 64 * 1024;

/// Exit status and captured stdout of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub success: bool,
    /// Last [`MAX_CAPTURED_STDOUT`] bytes of stdout, decoded lossily.
    pub stdout: String,
    /// Set when earlier stdout was dropped to respect the cap.
    pub stdout_truncated: bool,
}

/// Run `cmd` through the platform shell in `cwd`.
///
/// stdout is captured and returned (only its tail when it grows past
/// [`MAX_CAPTURED_STDOUT`]); stderr is drained line by line into the debug
/// log so the pipe never fills up. Output that is not valid UTF-8 is decoded
/// lossily and never fails the command.
pub async fn run_shell(label: &str, cmd: &str, cwd: &Path) -> Result<CommandOutput> {
    info!(step = %label, cmd = %cmd, cwd = %cwd.display(), "starting command");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning process for step '{label}'"))?;

    let stderr_pump = child.stderr.take().map(|stderr| {
        let label = label.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(step = %label, "stderr: {}", line);
            }
        })
    });

    let mut stdout = String::new();
    let mut stdout_truncated = false;
    if let Some(out) = child.stdout.take() {
        let mut reader = BufReader::new(out);
        let mut line = Vec::new();
        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .await
                .with_context(|| format!("reading stdout of step '{label}'"))?;
            if read == 0 {
                break;
            }
            let text = String::from_utf8_lossy(&line);
            debug!(step = %label, "stdout: {}", text.trim_end_matches(['\r', '\n']));
            stdout_truncated |= push_tail(&mut stdout, &text, MAX_CAPTURED_STDOUT);
        }
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of step '{label}'"))?;

    if let Some(handle) = stderr_pump {
        let _ = handle.await;
    }

    let exit_code = status.code().unwrap_or(-1);
    info!(step = %label, exit_code, success = status.success(), "command exited");

    Ok(CommandOutput {
        exit_code,
        success: status.success(),
        stdout,
        stdout_truncated,
    })
}

/// Append `text` to `buf`, then drop leading bytes until `buf` fits in `cap`.
/// Returns whether anything was dropped.
fn push_tail(buf: &mut String, text: &str, cap: usize) -> bool {
    buf.push_str(text);
    if buf.len() <= cap {
        return false;
    }
    let mut cut = buf.len() - cap;
    while !buf.is_char_boundary(cut) {
        cut += 1;
    }
    buf.drain(..cut);
    true
}
