//! `gjpush pause` – pause the running push. Transfers stop at the next 32 KiB block.

use anyhow::Result;

use crate::cli::control_socket::{self, ControlCommand};

pub async fn run_pause() -> Result<()> {
    let path = gjpush_core::control::default_control_socket_path()?;
    control_socket::send_command(&path, ControlCommand::Pause).await?;
    println!("Paused push (run `gjpush resume` to continue)");
    Ok(())
}
