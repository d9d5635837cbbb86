//! Control socket: server (during `gjpush push`) and client (`gjpush pause|resume|cancel`).
//! Protocol: one line per command: "pause", "resume" or "cancel".

use anyhow::{Context, Result};
use gjpush_core::control::Resumable;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Pause,
    Resume,
    Cancel,
}

impl ControlCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "pause" => Some(ControlCommand::Pause),
            "resume" => Some(ControlCommand::Resume),
            "cancel" => Some(ControlCommand::Cancel),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ControlCommand::Pause => "pause",
            ControlCommand::Resume => "resume",
            ControlCommand::Cancel => "cancel",
        }
    }

    pub fn apply(self, ctrl: &Resumable) {
        match self {
            ControlCommand::Pause => ctrl.pause(),
            ControlCommand::Resume => ctrl.resume(),
            ControlCommand::Cancel => ctrl.cancel(),
        }
    }
}

/// Binds `path` and spawns a task applying each command line to `ctrl`.
/// The task stops and removes the socket once `ctrl` is cancelled.
/// Malformed lines are logged and ignored.
///
/// Fails if another push is already listening on `path`; a stale socket
/// file left by a crashed run is replaced.
pub fn spawn_control_listener(
    ctrl: Resumable,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path: PathBuf = path.as_ref().to_path_buf();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    if path.exists() {
        if std::os::unix::net::UnixStream::connect(&path).is_ok() {
            anyhow::bail!(
                "another gjpush push is running (control socket {})",
                path.display()
            );
        }
        std::fs::remove_file(&path)
            .with_context(|| format!("removing stale control socket {}", path.display()))?;
    }
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("binding control socket {}", path.display()))?;

    let handle = tokio::spawn(async move {
        let done = ctrl.done();
        tokio::pin!(done);
        loop {
            tokio::select! {
                _ = &mut done => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let ctrl = ctrl.clone();
                        tokio::spawn(async move {
                            let mut lines = BufReader::new(stream).lines();
                            while let Ok(Some(line)) = lines.next_line().await {
                                match ControlCommand::parse(&line) {
                                    Some(cmd) => {
                                        tracing::info!(command = cmd.as_str(), "control command");
                                        cmd.apply(&ctrl);
                                    }
                                    None => tracing::debug!(line = %line, "ignoring control line"),
                                }
                            }
                        });
                    }
                    Err(e) => tracing::debug!("control socket accept: {}", e),
                },
            }
        }
        let _ = std::fs::remove_file(&path);
    });
    Ok(handle)
}

/// Sends one command line to the control socket of a running push.
pub async fn send_command(socket_path: &Path, cmd: ControlCommand) -> Result<()> {
    if !socket_path.exists() {
        anyhow::bail!(
            "no gjpush push is running (control socket {} not found)",
            socket_path.display()
        );
    }
    let mut stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connecting to {}", socket_path.display()))?;
    stream
        .write_all(format!("{}\n", cmd.as_str()).as_bytes())
        .await?;
    stream.shutdown().await?;
    Ok(())
}
