//! Shared fixtures for the coordinator integration tests.
#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use funq::{
    Collaborators, ConnectionHandle, ConnectionId, LifecycleEvent, PickFormatter, Picker, Player,
    Stage,
};
use funq_host::{Event, EventKind, Object};
use parking_lot::Mutex;
use tokio::{sync::mpsc::UnboundedReceiver, time::timeout};

/// Upper bound for anything the tests wait on.
pub const WAIT: Duration = Duration::from_secs(5);

/// Shared record of what the collaborators saw.
#[derive(Clone, Default)]
pub struct Journal {
    /// Players created so far.
    pub players_created: Arc<AtomicUsize>,
    /// Connection ids whose player has been dropped, in drop order.
    pub players_dropped: Arc<Mutex<Vec<ConnectionId>>>,
    /// Events seen by the picker, as (receiver name, kind).
    pub picked: Arc<Mutex<Vec<(String, EventKind)>>>,
    /// Picker output rendered through its formatter.
    pub rendered: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn created(&self) -> usize {
        self.players_created.load(Ordering::SeqCst)
    }
}

/// Echo player: writes every chunk back.
pub struct EchoPlayer {
    conn: ConnectionHandle,
    journal: Journal,
}

impl Player for EchoPlayer {
    fn on_data(&mut self, data: &[u8]) {
        let _ = self.conn.send(data.to_vec());
    }
}

impl Drop for EchoPlayer {
    fn drop(&mut self) {
        self.journal.players_dropped.lock().push(self.conn.id());
    }
}

/// Picker that records what it observes.
pub struct RecordingPicker {
    formatter: Box<dyn PickFormatter>,
    journal: Journal,
}

impl Picker for RecordingPicker {
    fn handle_event(&mut self, receiver: &dyn Object, event: &Event) {
        self.journal
            .picked
            .lock()
            .push((receiver.object_name().to_string(), event.kind()));
        self.journal
            .rendered
            .lock()
            .push(self.formatter.format(receiver, event));
    }
}

/// Collaborators that log into `journal`.
pub fn collaborators(journal: &Journal) -> Collaborators {
    let for_players = journal.clone();
    let for_pickers = journal.clone();
    Collaborators::new(
        move |conn: ConnectionHandle| {
            for_players.players_created.fetch_add(1, Ordering::SeqCst);
            Box::new(EchoPlayer {
                conn,
                journal: for_players.clone(),
            }) as Box<dyn Player>
        },
        move |formatter: Box<dyn PickFormatter>| {
            Box::new(RecordingPicker {
                formatter,
                journal: for_pickers.clone(),
            }) as Box<dyn Picker>
        },
    )
}

/// A receiver that counts deliveries and reports a fixed "handled" result.
pub struct Widget {
    pub name: &'static str,
    pub handles: bool,
    pub delivered: AtomicUsize,
}

impl Widget {
    pub fn new(name: &'static str, handles: bool) -> Self {
        Self {
            name,
            handles,
            delivered: AtomicUsize::new(0),
        }
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

impl Object for Widget {
    fn object_name(&self) -> &str {
        self.name
    }

    fn class_name(&self) -> &str {
        "Widget"
    }

    fn path(&self) -> String {
        format!("window/{}", self.name)
    }

    fn event(&self, _event: &Event) -> bool {
        self.delivered.fetch_add(1, Ordering::SeqCst);
        self.handles
    }
}

/// Wait for the next lifecycle event.
pub async fn next_event(rx: &mut UnboundedReceiver<LifecycleEvent>) -> LifecycleEvent {
    timeout(WAIT, rx.recv())
        .await
        .expect("lifecycle event in time")
        .expect("lifecycle channel open")
}

/// Collect lifecycle stages for `id` until its player is released. Events for
/// other connections are returned separately.
pub async fn stages_until_released(
    rx: &mut UnboundedReceiver<LifecycleEvent>,
    id: ConnectionId,
) -> (Vec<Stage>, Vec<LifecycleEvent>) {
    let mut mine = Vec::new();
    let mut others = Vec::new();
    loop {
        let ev = next_event(rx).await;
        if ev.id != id {
            others.push(ev);
            continue;
        }
        mine.push(ev.stage);
        if ev.stage == Stage::ProcessorReleased {
            return (mine, others);
        }
    }
}
