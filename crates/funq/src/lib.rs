//! In-process test hook for GUI applications.
//!
//! Loaded into a running application, the hook makes it drivable by a remote
//! test tool. It runs in one of two modes:
//! - player: a TCP command channel on the loopback interface. Every accepted
//!   connection gets its own [`Player`], which consumes commands until the
//!   driver disconnects.
//! - pick: every event the host dispatches is shown to a [`Picker`], which
//!   works out which element the user is pointing at. Events are observed and
//!   never consumed.
//!
//! Activation
//! - [`activate`] is the opt-in entry point. With `check_activation` set it does
//!   nothing unless `FUNQ_ACTIVATION=1`. `FUNQ_MODE_PICK=1` selects pick mode
//!   and `FUNQ_PORT` overrides the port (default [`DEFAULT_PORT`]).
//! - [`activate_hook`] installs the hook unconditionally in the given mode.
//!
//! Lifecycle
//! - One coordinator per process. Activating twice is a contract violation
//!   and panics; [`try_activate`] reports it as [`Error::AlreadyInstalled`].
//! - Activation may run on any thread. Initialization is posted to the host's
//!   main loop and runs there on a later turn.
//! - The coordinator is released when the host is about to quit.
//!
//! Errors
//! - A port that cannot be bound, or an event hook the host refuses, is logged
//!   and leaves the application running without that capability.
#![warn(missing_docs)]

use std::sync::Arc;

use funq_host::Application;
use tracing::{debug, info};

mod acceptor;
pub mod config;
mod connection;
mod contracts;
mod coordinator;
mod error;
mod registry;

pub use acceptor::{Acceptor, LISTEN_ADDR};
pub use config::{Config, DEFAULT_PORT, Mode};
pub use connection::{ConnectionHandle, ConnectionId, LifecycleEvent, LifecycleTx, Stage};
pub use contracts::{
    Collaborators, DefaultFormatter, PickFormatter, Picker, PickerFactory, Player, PlayerFactory,
};
pub use coordinator::{Funq, is_active};
pub use error::{Error, Result};

/// Install the hook if the environment asks for it.
///
/// With `check_activation` set, nothing happens unless `FUNQ_ACTIVATION=1`.
/// Returns the coordinator when one was installed.
pub fn activate(check_activation: bool, collaborators: Collaborators) -> Option<Arc<Funq>> {
    activate_with(&Config::from_env(check_activation), collaborators)
}

/// Install the hook according to already-resolved settings.
pub fn activate_with(config: &Config, collaborators: Collaborators) -> Option<Arc<Funq>> {
    if !config.should_activate() {
        debug!("funq_activation_not_requested");
        return None;
    }
    Some(install_or_panic(config.mode(), config.port, collaborators))
}

/// Install the hook in `mode`, taking the port from `FUNQ_PORT`.
///
/// # Panics
/// If no application exists or the hook is already installed.
pub fn activate_hook(mode: Mode, collaborators: Collaborators) -> Arc<Funq> {
    install_or_panic(mode, config::port_from_env(), collaborators)
}

/// Install the hook in `mode` on `port`, reporting contract violations as
/// errors.
pub fn try_activate(mode: Mode, port: u16, collaborators: Collaborators) -> Result<Arc<Funq>> {
    let app = Application::instance().ok_or(Error::NoApplication)?;

    #[cfg(windows)]
    funq_host::set_native_dialogs(false);

    let funq = Funq::install(&app, mode, port, collaborators)?;
    app.on_about_to_quit(coordinator::release_instance);
    info!(%mode, port, "funq_activated");
    Ok(funq)
}

/// Install the hook, treating contract violations as fatal.
fn install_or_panic(mode: Mode, port: u16, collaborators: Collaborators) -> Arc<Funq> {
    match try_activate(mode, port, collaborators) {
        Ok(funq) => funq,
        Err(e) => panic!("funq activation failed: {e}"),
    }
}
