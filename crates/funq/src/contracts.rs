//! Contracts for the collaborators the coordinator drives.
//!
//! Command vocabulary and pick overlays live outside this crate. The
//! coordinator only needs to construct them and hand them their inputs.

use std::sync::Arc;

use funq_host::{Event, Object};

use crate::connection::{ConnectionHandle, LifecycleTx};

/// Command processor bound to one live connection.
///
/// Created when a connection is accepted and dropped only after the
/// connection's socket has been released. Runs on the main loop.
pub trait Player {
    /// Bytes read from the connection, unparsed and in arrival order.
    fn on_data(&mut self, data: &[u8]);

    /// The connection is closing. Called exactly once.
    fn on_disconnected(&mut self) {}
}

/// Builds a [`Player`] for each accepted connection.
pub trait PlayerFactory: Send + Sync {
    /// Create the processor for `connection`.
    fn create(&self, connection: ConnectionHandle) -> Box<dyn Player>;
}

impl<F> PlayerFactory for F
where
    F: Fn(ConnectionHandle) -> Box<dyn Player> + Send + Sync,
{
    fn create(&self, connection: ConnectionHandle) -> Box<dyn Player> {
        self(connection)
    }
}

/// Renders a picked receiver into text for the pick tool.
pub trait PickFormatter: Send {
    /// Describe `receiver` as targeted by `event`.
    fn format(&self, receiver: &dyn Object, event: &Event) -> String;
}

/// Formatter rendering `path [Class] Kind`, plus the position when known.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFormatter;

impl PickFormatter for DefaultFormatter {
    fn format(&self, receiver: &dyn Object, event: &Event) -> String {
        let mut out = format!(
            "{} [{}] {}",
            receiver.path(),
            receiver.class_name(),
            event.kind()
        );
        if let Some(p) = event.pos() {
            out.push_str(&format!(" @{},{}", p.x, p.y));
        }
        out
    }
}

/// Consumes observed events to drive interactive element selection.
pub trait Picker: Send {
    /// Observe one event on its way to `receiver`.
    fn handle_event(&mut self, receiver: &dyn Object, event: &Event);
}

/// Builds the [`Picker`] when pick mode starts.
pub trait PickerFactory: Send + Sync {
    /// Create the picker using `formatter` for its output.
    fn create(&self, formatter: Box<dyn PickFormatter>) -> Box<dyn Picker>;
}

impl<F> PickerFactory for F
where
    F: Fn(Box<dyn PickFormatter>) -> Box<dyn Picker> + Send + Sync,
{
    fn create(&self, formatter: Box<dyn PickFormatter>) -> Box<dyn Picker> {
        self(formatter)
    }
}

/// Everything the coordinator needs from the outside world.
#[derive(Clone)]
pub struct Collaborators {
    /// Player constructor, used in player mode.
    pub(crate) players: Arc<dyn PlayerFactory>,
    /// Picker constructor, used in pick mode.
    pub(crate) pickers: Arc<dyn PickerFactory>,
    /// Optional observer of connection teardown stages.
    pub(crate) lifecycle: Option<LifecycleTx>,
}

impl Collaborators {
    /// Bundle the player and picker constructors.
    pub fn new<P, K>(players: P, pickers: K) -> Self
    where
        P: PlayerFactory + 'static,
        K: PickerFactory + 'static,
    {
        Self {
            players: Arc::new(players),
            pickers: Arc::new(pickers),
            lifecycle: None,
        }
    }

    /// Report connection lifecycle stages on `tx`.
    pub fn with_lifecycle(mut self, tx: LifecycleTx) -> Self {
        self.lifecycle = Some(tx);
        self
    }
}
