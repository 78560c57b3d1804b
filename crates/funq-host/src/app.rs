//! The main loop: a current-thread tokio runtime driving a `LocalSet`, fed by a
//! cross-thread task queue.

use std::{
    convert::Infallible,
    future::{Future, pending},
    mem,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, ThreadId},
};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tokio::{
    runtime::{Builder, Runtime},
    select,
    sync::{
        Mutex as AsyncMutex, Notify,
        mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    },
    task::{LocalSet, yield_now},
};
use tracing::{debug, trace};

use crate::{Error, Result};

/// A unit of work posted to the main loop.
type Task = Box<dyn FnOnce() + Send + 'static>;

/// The process-wide application slot.
static CURRENT: Lazy<Mutex<Option<AppHandle>>> = Lazy::new(|| Mutex::new(None));

/// State shared between the application and all of its handles.
struct Shared {
    /// Queue feeding the main loop.
    tx: UnboundedSender<Task>,
    /// Thread the application was created on.
    main_thread: ThreadId,
    /// One-shot subscribers run when the application quits.
    about_to_quit: Mutex<Vec<Task>>,
    /// Set once quit has been requested.
    quitting: AtomicBool,
    /// Wakes `exec` once the quit sequence has run.
    quit: Notify,
}

/// Cloneable, thread-safe handle to the running application.
#[derive(Clone)]
pub struct AppHandle {
    /// Shared loop state.
    inner: Arc<Shared>,
}

impl AppHandle {
    /// Queue `task` to run on the main loop.
    ///
    /// Tasks run in posting order, on the main thread, inside the loop's local
    /// task set.
    pub fn post<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner
            .tx
            .send(Box::new(task))
            .map_err(|_| Error::LoopClosed)
    }

    /// True when called from the main loop's thread.
    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.inner.main_thread
    }

    /// Run `callback` on the main thread when the application quits.
    pub fn on_about_to_quit<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.about_to_quit.lock().push(Box::new(callback));
    }

    /// Request application shutdown.
    ///
    /// The about-to-quit subscribers run on the main loop, in subscription
    /// order, before [`Application::exec`] returns. Repeated calls are no-ops.
    pub fn quit(&self) -> Result<()> {
        if self.inner.quitting.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let shared = self.inner.clone();
        self.post(move || {
            let subscribers = mem::take(&mut *shared.about_to_quit.lock());
            debug!(count = subscribers.len(), "application_about_to_quit");
            for callback in subscribers {
                callback();
            }
            shared.quit.notify_one();
        })
    }

    /// True once [`AppHandle::quit`] has been called.
    pub fn is_quitting(&self) -> bool {
        self.inner.quitting.load(Ordering::SeqCst)
    }
}

/// The process-wide application and its main loop.
///
/// At most one exists per process. The application is tied to the thread that
/// created it; use [`AppHandle`] to reach it from elsewhere.
pub struct Application {
    /// Local task set; dropped before the runtime.
    local: LocalSet,
    /// Current-thread runtime driving the loop.
    runtime: Runtime,
    /// Receiving side of the post queue.
    tasks: AsyncMutex<UnboundedReceiver<Task>>,
    /// Handle registered in the process-wide slot.
    handle: AppHandle,
}

impl Application {
    /// Create the application for this process.
    pub fn new() -> Result<Self> {
        let mut current = CURRENT.lock();
        if current.is_some() {
            return Err(Error::AlreadyExists);
        }
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let (tx, rx) = unbounded_channel();
        let handle = AppHandle {
            inner: Arc::new(Shared {
                tx,
                main_thread: thread::current().id(),
                about_to_quit: Mutex::new(Vec::new()),
                quitting: AtomicBool::new(false),
                quit: Notify::new(),
            }),
        };
        *current = Some(handle.clone());
        debug!("application_created");
        Ok(Self {
            local: LocalSet::new(),
            runtime,
            tasks: AsyncMutex::new(rx),
            handle,
        })
    }

    /// Return a handle to the live application, if any.
    pub fn instance() -> Option<AppHandle> {
        CURRENT.lock().clone()
    }

    /// Return a handle to this application.
    pub fn handle(&self) -> AppHandle {
        self.handle.clone()
    }

    /// Drive the main loop until `fut` resolves, running posted tasks and
    /// local tasks meanwhile.
    ///
    /// Must not be called re-entrantly from inside the loop.
    pub fn run_until<F: Future>(&self, fut: F) -> F::Output {
        self.local.block_on(&self.runtime, async {
            select! {
                biased;
                out = fut => out,
                never = self.pump() => match never {},
            }
        })
    }

    /// Run the loop until the application quits.
    pub fn exec(&self) {
        debug!("application_exec");
        let shared = self.handle.inner.clone();
        self.run_until(async move { shared.quit.notified().await });
        debug!("application_exec_finished");
    }

    /// Give the loop one turn: run everything currently queued.
    pub fn process_events(&self) {
        self.run_until(yield_now());
    }

    /// Run posted tasks forever.
    async fn pump(&self) -> Infallible {
        let mut tasks = self.tasks.lock().await;
        while let Some(task) = tasks.recv().await {
            trace!("main_loop_task");
            task();
        }
        pending().await
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        *CURRENT.lock() = None;
        debug!("application_destroyed");
    }
}
