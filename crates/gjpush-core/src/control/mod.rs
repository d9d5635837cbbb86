//! Transfer control: hierarchical pause/resume/cancel tokens and IPC paths.
//!
//! A `Resumable` is handed to every piece of work that should honor a pause or
//! cancel request. Work checks it cooperatively (`wait` / `wait_blocking`) at
//! its own checkpoints; nothing is preempted. A control client (e.g.
//! `gjpush pause` via socket) drives the root node of a running push.

mod chain;
mod resumable;

pub use chain::{run_chain, Task};
pub use resumable::{Outcome, Resumable};

use std::path::PathBuf;

/// Default path for the control socket of a running `gjpush push`.
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("gjpush")?.get_state_home();
    Ok(dir.join("gjpush").join("control.sock"))
}

#[cfg(test)]
mod tests;
