pub mod config;
pub mod logging;

pub mod api;
pub mod checksum;
pub mod control;
pub mod copy;
pub mod error;
pub mod sampler;
pub mod upload;

pub use error::TransferError;
