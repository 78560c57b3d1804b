//! Host application model that an in-process test hook attaches to.
//!
//! The pieces mirror what a GUI toolkit exposes to code living inside its
//! process:
//! - [`Application`]: the one main loop per process. Work can be posted to it
//!   from any thread through an [`AppHandle`]; posted tasks run in FIFO order on
//!   the main thread and may spawn local (non-`Send`) tasks.
//! - [`dispatch`]: the process-wide callback table consulted by
//!   [`send_event`] before an event reaches its receiver.
//! - [`Object`] and [`Event`]: the receiver/event vocabulary passed through
//!   the dispatch table.
//! - An about-to-quit notification, see [`AppHandle::on_about_to_quit`].
#![warn(missing_docs)]

use std::sync::atomic::{AtomicBool, Ordering};

mod app;
pub mod dispatch;
mod error;
mod object;

pub use app::{AppHandle, Application};
pub use dispatch::{Callback, CallbackArg, CallbackKind, send_event};
pub use error::{Error, Result};
pub use object::{Event, EventKind, Modifiers, Object, Point};

/// Whether dialogs are rendered with the platform's native widgets.
static NATIVE_DIALOGS: AtomicBool = AtomicBool::new(true);

/// Enable or disable native dialog rendering for the whole process.
pub fn set_native_dialogs(enabled: bool) {
    NATIVE_DIALOGS.store(enabled, Ordering::SeqCst);
}

/// Return whether native dialog rendering is enabled.
pub fn native_dialogs() -> bool {
    NATIVE_DIALOGS.load(Ordering::SeqCst)
}
