pub mod aggregate;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod report;
pub mod server;
pub mod storage;
pub mod window;

pub use error::{ReleaseNotesError, Result};

#[cfg(test)]
pub mod test_helpers;
