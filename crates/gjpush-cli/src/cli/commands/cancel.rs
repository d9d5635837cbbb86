//! `gjpush cancel` – stop the running push. The server keeps the partial
//! upload, so the next `gjpush push` of the same file resumes it.

use anyhow::Result;

use crate::cli::control_socket::{self, ControlCommand};

pub async fn run_cancel() -> Result<()> {
    let path = gjpush_core::control::default_control_socket_path()?;
    control_socket::send_command(&path, ControlCommand::Cancel).await?;
    println!("Cancelled push");
    Ok(())
}
