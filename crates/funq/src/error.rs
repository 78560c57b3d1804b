use std::{io::Error as IoError, result::Result as StdResult};

use thiserror::Error;

/// The main error type for funq operations
#[derive(Error, Debug)]
pub enum Error {
    /// A coordinator has already been constructed in this process
    #[error("funq is already installed in this process")]
    AlreadyInstalled,

    /// Activation was attempted before the host application existed
    #[error("no application instance to attach to")]
    NoApplication,

    /// The command channel could not listen on its port
    #[error("failed to listen on port {port}: {source}")]
    Bind {
        /// Requested port.
        port: u16,
        /// Underlying socket error.
        #[source]
        source: IoError,
    },

    /// The host dispatch table refused the event hook
    #[error("event hook registration refused")]
    HookRegistration,

    /// The connection is gone and no longer accepts output
    #[error("connection closed")]
    ConnectionClosed,

    /// Errors surfaced by the host application
    #[error("host error: {0}")]
    Host(#[from] funq_host::Error),

    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = StdResult<T, Error>;
