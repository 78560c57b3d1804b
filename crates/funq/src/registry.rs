//! Event hook registration with the host dispatch table.
//!
//! The host table takes free functions, so a single trampoline is installed
//! and routes every intercepted `(receiver, event)` pair to the one live
//! coordinator. The registry keeps its own armed flag so at most one
//! registration exists regardless of how the host table treats duplicates.

use std::sync::atomic::{AtomicBool, Ordering};

use funq_host::{
    CallbackArg, CallbackKind,
    dispatch::{register_callback, unregister_callback},
};
use tracing::{debug, trace};

use crate::coordinator;

/// Whether the trampoline is currently installed.
static ARMED: AtomicBool = AtomicBool::new(false);

/// Install the trampoline. Returns false if already installed or refused.
pub(crate) fn register() -> bool {
    if ARMED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        debug!("event_hook_already_registered");
        return false;
    }
    let ok = register_callback(CallbackKind::EventNotify, trampoline);
    if !ok {
        ARMED.store(false, Ordering::SeqCst);
    }
    ok
}

/// Remove the trampoline. Returns false if it was not installed.
pub(crate) fn unregister() -> bool {
    if ARMED
        .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return false;
    }
    unregister_callback(CallbackKind::EventNotify, trampoline)
}

/// Whether the trampoline is installed.
#[cfg(test)]
pub(crate) fn is_registered() -> bool {
    ARMED.load(Ordering::SeqCst)
}

/// Dispatch-table entry point: unpack `[receiver, event]` and hand it to the
/// coordinator. Never consumes the event.
fn trampoline(args: &[CallbackArg<'_>]) -> bool {
    let [CallbackArg::Receiver(receiver), CallbackArg::Event(event), ..] = args else {
        trace!(len = args.len(), "event_hook_unexpected_args");
        return false;
    };
    match coordinator::current() {
        Some(funq) => funq.event_filter(*receiver, event),
        None => false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use funq_host::{Event, EventKind, Object, dispatch::callback_count, send_event};
    use parking_lot::Mutex;

    use super::*;

    /// Held by unit tests that touch the dispatch table or the armed flag.
    pub(crate) static SERIAL: Mutex<()> = Mutex::new(());

    struct Leaf;

    impl Object for Leaf {
        fn object_name(&self) -> &str {
            "leaf"
        }

        fn class_name(&self) -> &str {
            "Leaf"
        }

        fn event(&self, _event: &Event) -> bool {
            true
        }
    }

    #[test]
    fn single_registration() {
        let _serial = SERIAL.lock();
        assert!(!is_registered());
        assert!(!unregister());

        assert!(register());
        assert!(is_registered());
        assert!(!register(), "second registration is refused");
        assert_eq!(callback_count(CallbackKind::EventNotify), 1);

        // With no coordinator the trampoline observes nothing and the event
        // still reaches its receiver.
        assert!(send_event(&Leaf, &Event::new(EventKind::KeyPress)));
        assert!(!trampoline(&[]));

        assert!(unregister());
        assert!(!is_registered());
        assert_eq!(callback_count(CallbackKind::EventNotify), 0);
    }
}
