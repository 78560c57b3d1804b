//! The process-wide hook coordinator.
//!
//! Exactly one coordinator may be constructed per process. Construction can
//! happen on any thread; initialization is always posted to the host's main
//! loop and runs there on a later turn. Release happens on the main loop when
//! the host is about to quit. After release the slot stays spent, so a second
//! construction is still refused.

use std::{
    cell::Cell,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use funq_host::{AppHandle, Event, Object};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::{
    Collaborators, DefaultFormatter, Error, Mode, Picker, Result,
    acceptor::{Acceptor, LISTEN_ADDR},
    registry,
};

/// Process-wide coordinator slot.
#[derive(Default)]
struct Slot {
    /// Set by the first construction and never cleared.
    constructed: bool,
    /// The live coordinator, until released.
    instance: Option<Arc<Funq>>,
}

/// The one slot for this process.
static SLOT: Lazy<Mutex<Slot>> = Lazy::new(|| Mutex::new(Slot::default()));

/// The live coordinator, if any.
pub(crate) fn current() -> Option<Arc<Funq>> {
    SLOT.lock().instance.clone()
}

/// Whether a coordinator is live in this process.
pub fn is_active() -> bool {
    SLOT.lock().instance.is_some()
}

/// Release the live coordinator, if any. Runs on the main loop.
pub(crate) fn release_instance() {
    let taken = SLOT.lock().instance.take();
    if let Some(funq) = taken {
        funq.release();
    }
}

thread_local! {
    /// Set while this thread is running the picker.
    static IN_PICKER: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside the picker until dropped.
struct PickerScope;

impl PickerScope {
    /// Enter the picker on this thread; `None` if already inside it.
    fn enter() -> Option<Self> {
        if IN_PICKER.replace(true) {
            None
        } else {
            Some(Self)
        }
    }
}

impl Drop for PickerScope {
    fn drop(&mut self) {
        IN_PICKER.set(false);
    }
}

/// Initialization progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Deferred initialization is queued on the main loop.
    Scheduled,
    /// Initialization ran.
    Running,
    /// Released on shutdown.
    Released,
}

/// The hook coordinator: owns the mode and whichever collaborator it implies.
pub struct Funq {
    /// The host application the hook is bound to.
    app: AppHandle,
    /// Fixed at construction.
    mode: Mode,
    /// Command channel port, used in player mode.
    port: u16,
    /// Player and picker constructors.
    collaborators: Collaborators,
    /// Initialization progress.
    phase: Mutex<Phase>,
    /// Command channel, in player mode once listening.
    acceptor: Mutex<Option<Acceptor>>,
    /// Picker, in pick mode once initialized.
    picker: Mutex<Option<Box<dyn Picker>>>,
    /// This coordinator installed the event hook.
    hooked: AtomicBool,
}

impl Funq {
    /// Construct the process's coordinator and schedule its initialization on
    /// the main loop behind `app`.
    pub(crate) fn install(
        app: &AppHandle,
        mode: Mode,
        port: u16,
        collaborators: Collaborators,
    ) -> Result<Arc<Self>> {
        let funq = {
            let mut slot = SLOT.lock();
            if slot.constructed {
                return Err(Error::AlreadyInstalled);
            }
            let funq = Arc::new(Self::new(app, mode, port, collaborators));
            slot.constructed = true;
            slot.instance = Some(funq.clone());
            funq
        };

        // Posted even when already on the main thread: the host loop may not
        // be taking work yet.
        let deferred = funq.clone();
        if let Err(e) = app.post(move || deferred.init()) {
            SLOT.lock().instance = None;
            return Err(e.into());
        }
        debug!(
            %mode,
            port,
            from_main_thread = app.is_main_thread(),
            "funq_init_scheduled"
        );
        Ok(funq)
    }

    /// A coordinator with initialization still pending.
    fn new(app: &AppHandle, mode: Mode, port: u16, collaborators: Collaborators) -> Self {
        Self {
            app: app.clone(),
            mode,
            port,
            collaborators,
            phase: Mutex::new(Phase::Scheduled),
            acceptor: Mutex::new(None),
            picker: Mutex::new(None),
            hooked: AtomicBool::new(false),
        }
    }

    /// Mode selected at construction.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Configured command channel port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bound command channel address, once listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.acceptor.lock().as_ref().map(Acceptor::local_addr)
    }

    /// Whether deferred initialization has run.
    pub fn is_initialized(&self) -> bool {
        *self.phase.lock() != Phase::Scheduled
    }

    /// Whether the pick event hook is installed.
    pub fn is_hook_registered(&self) -> bool {
        self.hooked.load(Ordering::SeqCst)
    }

    /// Deferred initialization; runs once, on the main loop.
    fn init(&self) {
        debug_assert!(self.app.is_main_thread(), "funq init off the main loop");
        {
            let mut phase = self.phase.lock();
            if *phase != Phase::Scheduled {
                debug!(?phase, "funq_init_skipped");
                return;
            }
            *phase = Phase::Running;
        }
        match self.mode {
            Mode::Player => self.start_player(),
            Mode::Pick => self.start_pick(),
        }
    }

    /// Open the command channel. Failure leaves the process uninstrumented.
    fn start_player(&self) {
        match Acceptor::listen(
            LISTEN_ADDR,
            self.port,
            self.collaborators.players.clone(),
            self.collaborators.lifecycle.clone(),
        ) {
            Ok(acceptor) => {
                info!(port = acceptor.local_addr().port(), "funq_listening");
                *self.acceptor.lock() = Some(acceptor);
            }
            Err(e) => warn!(port = self.port, error = %e, "funq_listen_failed"),
        }
    }

    /// Create the picker and hook the dispatch table. Failure leaves the
    /// process uninstrumented.
    fn start_pick(&self) {
        let picker = self
            .collaborators
            .pickers
            .create(Box::new(DefaultFormatter));
        *self.picker.lock() = Some(picker);
        if registry::register() {
            self.hooked.store(true, Ordering::SeqCst);
            info!("funq_pick_active");
        } else {
            warn!(error = %Error::HookRegistration, "funq_pick_unavailable");
        }
    }

    /// Observe one event on its way to `receiver`. Never consumes it.
    ///
    /// Events raised by the picker itself while it handles an event are not
    /// offered back to it. Events dispatched concurrently from other threads
    /// wait their turn.
    pub(crate) fn event_filter(&self, receiver: &dyn Object, event: &Event) -> bool {
        let Some(_scope) = PickerScope::enter() else {
            trace!(kind = %event.kind(), "nested_event_not_forwarded");
            return false;
        };
        if let Some(picker) = self.picker.lock().as_mut() {
            picker.handle_event(receiver, event);
        }
        false
    }

    /// Tear down whatever the mode started.
    fn release(&self) {
        *self.phase.lock() = Phase::Released;
        let acceptor = self.acceptor.lock().take();
        drop(acceptor);
        if self.hooked.swap(false, Ordering::SeqCst) && registry::unregister() {
            debug!("event_hook_unregistered");
        }
        let picker = self.picker.lock().take();
        drop(picker);
        info!(mode = %self.mode, "funq_released");
    }
}
