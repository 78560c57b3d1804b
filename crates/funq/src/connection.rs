//! One accepted connection and the player bound to it.
//!
//! Teardown is two-phase and tracked explicitly. Once the connection starts
//! closing, queued output is flushed and the socket is shut down and dropped.
//! Only after that is the player released. The stages are logged and, when a
//! lifecycle channel is configured, reported as [`LifecycleEvent`]s.

use std::{fmt, io, net::SocketAddr, sync::Arc};

use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::TcpStream,
    select,
    sync::{
        mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
        watch,
    },
};
use tracing::{debug, trace, warn};

use crate::{Error, Player, PlayerFactory, Result};

/// Read buffer size for a connection.
const READ_CHUNK: usize = 16 * 1024;

/// Identifies an accepted connection; assigned in accept order from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl ConnectionId {
    /// The id of the `n`th accepted connection.
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    /// Numeric value of the id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle stage of a connection/player pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Accepted; the player has been created.
    Opened,
    /// Disconnect observed; the player has been told.
    Closing,
    /// The socket has been shut down and dropped.
    SocketReleased,
    /// The player has been dropped.
    ProcessorReleased,
}

/// A stage transition for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleEvent {
    /// Connection the transition belongs to.
    pub id: ConnectionId,
    /// Stage just entered.
    pub stage: Stage,
}

/// Sender side of a lifecycle observer channel.
pub type LifecycleTx = UnboundedSender<LifecycleEvent>;

/// Output queued by a player.
enum Outgoing {
    /// Bytes to write.
    Data(Vec<u8>),
    /// Close the connection after writing what is queued.
    Close,
}

/// The player's view of its connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    /// Connection id.
    id: ConnectionId,
    /// Remote address.
    peer: SocketAddr,
    /// Output queue drained by the connection task.
    out: UnboundedSender<Outgoing>,
}

impl ConnectionHandle {
    /// Connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote address of the driver.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Queue `data` for writing.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.out
            .send(Outgoing::Data(data.into()))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Ask for the connection to be closed once queued output is written.
    pub fn close(&self) {
        if self.out.send(Outgoing::Close).is_err() {
            trace!(id = %self.id, "close_on_closed_connection");
        }
    }
}

/// Why the open phase ended.
#[derive(Debug)]
enum CloseReason {
    /// The peer closed its side.
    PeerClosed,
    /// Reading or writing failed.
    Failed(io::Error),
    /// The player asked to close.
    Local,
    /// The acceptor is shutting down.
    Shutdown,
}

/// A socket and its player, with explicit teardown state.
struct Pairing {
    /// Connection id.
    id: ConnectionId,
    /// The socket; `None` once released.
    socket: Option<TcpStream>,
    /// The player; `None` once released.
    player: Option<Box<dyn Player>>,
    /// Current stage.
    stage: Stage,
    /// Optional observer.
    lifecycle: Option<LifecycleTx>,
}

impl Pairing {
    /// Record a stage transition.
    fn enter(&mut self, stage: Stage) {
        debug_assert!(stage >= self.stage, "teardown stages only move forward");
        self.stage = stage;
        debug!(id = %self.id, ?stage, "connection_stage");
        if let Some(tx) = &self.lifecycle {
            let _ = tx.send(LifecycleEvent { id: self.id, stage });
        }
    }

    /// Tell the player the connection is closing.
    fn begin_close(&mut self) {
        if let Some(player) = self.player.as_mut() {
            player.on_disconnected();
        }
        self.enter(Stage::Closing);
    }

    /// Flush what the player queued, then shut down and drop the socket.
    async fn release_socket(&mut self, out: &mut UnboundedReceiver<Outgoing>, flush: bool) {
        if let Some(mut socket) = self.socket.take() {
            if flush {
                while let Ok(Outgoing::Data(data)) = out.try_recv() {
                    if let Err(e) = socket.write_all(&data).await {
                        trace!(id = %self.id, error = %e, "flush_failed");
                        break;
                    }
                }
            }
            if let Err(e) = socket.shutdown().await {
                trace!(id = %self.id, error = %e, "socket_shutdown_failed");
            }
            drop(socket);
        }
        out.close();
        self.enter(Stage::SocketReleased);
    }

    /// Drop the player. Only valid once the socket is gone.
    fn release_player(&mut self) {
        if self.socket.is_some() {
            warn!(id = %self.id, "player_release_before_socket");
            return;
        }
        self.player = None;
        self.enter(Stage::ProcessorReleased);
    }
}

/// Serve one accepted connection until it closes, then tear it down.
pub(crate) async fn serve(
    id: ConnectionId,
    socket: TcpStream,
    peer: SocketAddr,
    players: Arc<dyn PlayerFactory>,
    lifecycle: Option<LifecycleTx>,
    mut shutdown: watch::Receiver<bool>,
) {
    let (out_tx, mut out_rx) = unbounded_channel();
    let handle = ConnectionHandle {
        id,
        peer,
        out: out_tx,
    };
    let mut pairing = Pairing {
        id,
        socket: Some(socket),
        player: Some(players.create(handle)),
        stage: Stage::Opened,
        lifecycle,
    };
    pairing.enter(Stage::Opened);

    let reason = pump(&mut pairing, &mut out_rx, &mut shutdown).await;
    debug!(%id, %peer, ?reason, "connection_closing");

    pairing.begin_close();
    // A peer that closed only its write side still reads what the player
    // queued in response.
    let flush = !matches!(reason, CloseReason::Failed(_));
    pairing.release_socket(&mut out_rx, flush).await;
    pairing.release_player();
}

/// Move bytes between the socket and the player until the connection ends.
async fn pump(
    pairing: &mut Pairing,
    out: &mut UnboundedReceiver<Outgoing>,
    shutdown: &mut watch::Receiver<bool>,
) -> CloseReason {
    let Pairing { socket, player, .. } = pairing;
    let (Some(socket), Some(player)) = (socket.as_mut(), player.as_mut()) else {
        return CloseReason::Local;
    };
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        // Queued output goes out before more input is read, so a reply is
        // never overtaken by the peer's end of stream.
        select! {
            biased;
            Some(msg) = out.recv() => match msg {
                Outgoing::Data(data) => {
                    if let Err(e) = socket.write_all(&data).await {
                        return CloseReason::Failed(e);
                    }
                }
                Outgoing::Close => return CloseReason::Local,
            },
            read = socket.read(&mut buf) => match read {
                Ok(0) => return CloseReason::PeerClosed,
                Ok(n) => {
                    trace!(bytes = n, "connection_read");
                    player.on_data(&buf[..n]);
                }
                Err(e) => return CloseReason::Failed(e),
            },
            _ = shutdown.changed() => return CloseReason::Shutdown,
        }
    }
}
