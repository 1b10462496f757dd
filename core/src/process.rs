//! Deadline-bound execution of the external tools used by the SSH and TLS probes.
//!
//! Every child is spawned with `kill_on_drop`, so a run that overshoots its deadline is
//! killed when its future is dropped.

use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;

use anyhow::Context;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Runs `command` with stdout redirected into `sink`, optionally feeding `stdin` first.
pub async fn run_into_file(
    mut command: Command,
    sink: &NamedTempFile,
    stdin: Option<&[u8]>,
    deadline: Duration,
) -> anyhow::Result<ExitStatus> {
    let stdout = sink.reopen().context("reopening temporary file")?;
    command
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::null())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .kill_on_drop(true);

    let program = program_name(&command);
    let run = async {
        let mut child = command
            .spawn()
            .with_context(|| format!("spawning {program}"))?;
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            // The tool may exit before reading; a broken pipe is not a failure here.
            let _ = pipe.write_all(input).await;
        }
        child.wait().await.context("waiting for child process")
    };

    timeout(deadline, run)
        .await
        .with_context(|| format!("{program} exceeded {deadline:?}"))?
}

/// Runs `command` and captures its stdout.
pub async fn capture_stdout(mut command: Command, deadline: Duration) -> anyhow::Result<Output> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let program = program_name(&command);
    timeout(deadline, command.output())
        .await
        .with_context(|| format!("{program} exceeded {deadline:?}"))?
        .with_context(|| format!("running {program}"))
}

/// Splits raw tool output into lines, skipping any line that is not valid UTF-8.
pub fn utf8_lines(output: &[u8]) -> impl Iterator<Item = &str> {
    output
        .split(|&b| b == b'\n')
        .filter_map(|line| std::str::from_utf8(line).ok())
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
}

fn program_name(command: &Command) -> String {
    command
        .as_std()
        .get_program()
        .to_string_lossy()
        .into_owned()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
