//! `gjpush resume` – resume a paused push.

use anyhow::Result;

use crate::cli::control_socket::{self, ControlCommand};

pub async fn run_resume() -> Result<()> {
    let path = gjpush_core::control::default_control_socket_path()?;
    control_socket::send_command(&path, ControlCommand::Resume).await?;
    println!("Resumed push");
    Ok(())
}
