//! Error types and result alias for the host application model.
use std::{io::Error as IoError, result::Result as StdResult};

use thiserror::Error;

/// Convenient result type used throughout this crate.
pub type Result<T> = StdResult<T, Error>;

/// Error variants produced by this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// An application already exists in this process.
    #[error("an application instance already exists")]
    AlreadyExists,
    /// The main loop has been torn down and no longer accepts work.
    #[error("main loop is closed")]
    LoopClosed,
    /// The loop runtime could not be built.
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}
