use std::path::Path;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::core::error::{InstallerError, InstallerResult};
use crate::core::events::EventSink;

/// Exit status plus everything the tool printed on stdout and stderr.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub log: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs one external tool to completion.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `program` with `args` in `cwd`, forwarding each output line to
    /// `events` as a `patch` event. Resolves once the process has exited.
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        cwd: &Path,
        events: &EventSink,
    ) -> InstallerResult<ToolOutput>;
}

/// Spawns real processes through `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessToolRunner;

#[async_trait]
impl ToolRunner for ProcessToolRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        cwd: &Path,
        events: &EventSink,
    ) -> InstallerResult<ToolOutput> {
        debug!("Spawning {:?} with {} args", program, args.len());

        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| InstallerError::io(program, e))?;

        let log = Mutex::new(String::new());
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (out, err, status) = tokio::join!(
            forward_lines(stdout, &log, events),
            forward_lines(stderr, &log, events),
            child.wait()
        );
        out.map_err(|e| InstallerError::io(program, e))?;
        err.map_err(|e| InstallerError::io(program, e))?;
        let status = status.map_err(|e| InstallerError::io(program, e))?;

        Ok(ToolOutput {
            exit_code: status.code(),
            log: log.into_inner().unwrap_or_else(PoisonError::into_inner),
        })
    }
}

/// Tool output is not guaranteed to be UTF-8, so lines are decoded lossily.
async fn forward_lines<R: AsyncRead + Unpin>(
    stream: Option<R>,
    log: &Mutex<String>,
    events: &EventSink,
) -> std::io::Result<()> {
    let Some(stream) = stream else {
        return Ok(());
    };

    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);

        log.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(&format!("{}\n", line));
        events.patch(line);
    }
}
