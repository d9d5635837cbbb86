//! CLI command handlers. Each command is in its own file.

mod cancel;
mod checksum;
mod pause;
mod push;
mod resume;
mod status;

pub use cancel::run_cancel;
pub use checksum::run_checksum;
pub use pause::run_pause;
pub use push::{run_push, PushRequest};
pub use resume::run_resume;
pub use status::run_status;
