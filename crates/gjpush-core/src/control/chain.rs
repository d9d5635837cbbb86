//! Run units of work one after another under a controller.

use super::{Outcome, Resumable};
use crate::error::TransferError;

/// One unit of work in a chain.
pub type Task<'a> = Box<dyn FnOnce() -> Result<(), TransferError> + Send + 'a>;

/// Runs `tasks` in order, waiting on `ctrl` before each one.
///
/// Stops with `Cancelled` as soon as the wait yields `Cancel`, or with the
/// first task error. Blocks the calling thread while the controller is paused.
pub fn run_chain(ctrl: &Resumable, tasks: Vec<Task<'_>>) -> Result<(), TransferError> {
    let total = tasks.len();
    for (index, task) in tasks.into_iter().enumerate() {
        if ctrl.wait_blocking() == Outcome::Cancel {
            tracing::debug!(node = ctrl.id(), step = index, total, "chain cancelled");
            return Err(TransferError::Cancelled);
        }
        task()?;
    }
    Ok(())
}
