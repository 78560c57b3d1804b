//! Process-wide event dispatch table.
//!
//! Callbacks are free functions over an opaque argument vector. For
//! [`CallbackKind::EventNotify`] the vector is `[Receiver, Event]`. Every
//! event passed to [`send_event`] is offered to the registered callbacks, in
//! registration order, before the receiver sees it. A callback returning true
//! consumes the event.

use std::ptr;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{Event, Object};

/// Dispatch hooks a callback can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CallbackKind {
    /// Invoked for every event before it is delivered.
    EventNotify,
}

/// One entry of a callback's argument vector.
#[derive(Clone, Copy)]
pub enum CallbackArg<'a> {
    /// The object the event is addressed to.
    Receiver(&'a dyn Object),
    /// The event itself.
    Event(&'a Event),
}

/// Signature of a dispatch callback. Returns true to consume the event.
pub type Callback = fn(&[CallbackArg<'_>]) -> bool;

/// Registered callbacks, in registration order.
static TABLE: Lazy<Mutex<Vec<(CallbackKind, Callback)>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Install `callback` for `kind`. Returns false if it is already installed.
pub fn register_callback(kind: CallbackKind, callback: Callback) -> bool {
    let mut table = TABLE.lock();
    if table
        .iter()
        .any(|(k, cb)| *k == kind && ptr::fn_addr_eq(*cb, callback))
    {
        return false;
    }
    table.push((kind, callback));
    debug!(?kind, "dispatch_callback_registered");
    true
}

/// Remove `callback` from `kind`. Returns false if it was not installed.
pub fn unregister_callback(kind: CallbackKind, callback: Callback) -> bool {
    let mut table = TABLE.lock();
    let Some(idx) = table
        .iter()
        .position(|(k, cb)| *k == kind && ptr::fn_addr_eq(*cb, callback))
    else {
        return false;
    };
    table.remove(idx);
    debug!(?kind, "dispatch_callback_unregistered");
    true
}

/// Number of callbacks currently installed for `kind`.
pub fn callback_count(kind: CallbackKind) -> usize {
    TABLE.lock().iter().filter(|(k, _)| *k == kind).count()
}

/// Snapshot the callbacks for `kind` so they run without the table lock.
fn callbacks(kind: CallbackKind) -> Vec<Callback> {
    TABLE
        .lock()
        .iter()
        .filter(|(k, _)| *k == kind)
        .map(|(_, cb)| *cb)
        .collect()
}

/// Deliver `event` to `receiver` synchronously.
///
/// Event-notify callbacks see the event first; if none consumes it, the
/// receiver's own handler runs. Returns whether the event was handled.
pub fn send_event(receiver: &dyn Object, event: &Event) -> bool {
    let hooks = callbacks(CallbackKind::EventNotify);
    if !hooks.is_empty() {
        let args = [CallbackArg::Receiver(receiver), CallbackArg::Event(event)];
        for hook in hooks {
            if hook(&args) {
                trace!(kind = %event.kind(), receiver = receiver.object_name(), "event_consumed_by_hook");
                return true;
            }
        }
    }
    receiver.event(event)
}
