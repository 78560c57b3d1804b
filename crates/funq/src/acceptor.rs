//! TCP command channel acceptor.
//!
//! The acceptor binds a listener and hands every accepted connection to a
//! fresh [`Player`](crate::Player) on its own local task. It keeps no
//! per-connection state after handoff. There is no connection limit.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
    time::Duration,
};

use tokio::{net::TcpListener, select, sync::watch, task, time::sleep};
use tracing::{debug, info, warn};

use crate::{
    Error, PlayerFactory, Result,
    connection::{self, ConnectionId, LifecycleTx},
};

/// Address the command channel listens on.
pub const LISTEN_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Back-off after a failed accept, so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// A listening command channel.
///
/// Dropping the acceptor stops accepting and closes every open connection.
pub struct Acceptor {
    /// Bound address.
    local_addr: SocketAddr,
    /// Signals the accept loop and all connections to stop.
    shutdown: watch::Sender<bool>,
}

impl Acceptor {
    /// Bind `addr:port` and start accepting on the current local task set.
    ///
    /// Must be called from inside the main loop.
    pub fn listen(
        addr: IpAddr,
        port: u16,
        players: Arc<dyn PlayerFactory>,
        lifecycle: Option<LifecycleTx>,
    ) -> Result<Self> {
        let std_listener =
            StdTcpListener::bind((addr, port)).map_err(|source| Error::Bind { port, source })?;
        std_listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(std_listener)?;
        let local_addr = listener.local_addr()?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        task::spawn_local(accept_loop(listener, players, lifecycle, shutdown_rx));
        info!(%local_addr, "acceptor_listening");
        Ok(Self {
            local_addr,
            shutdown,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for Acceptor {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
        debug!(local_addr = %self.local_addr, "acceptor_closed");
    }
}

/// Accept connections in arrival order until shutdown.
async fn accept_loop(
    listener: TcpListener,
    players: Arc<dyn PlayerFactory>,
    lifecycle: Option<LifecycleTx>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut next_id = 0;
    loop {
        select! {
            res = listener.accept() => match res {
                Ok((socket, peer)) => {
                    next_id += 1;
                    let id = ConnectionId(next_id);
                    debug!(%id, %peer, "connection_accepted");
                    task::spawn_local(connection::serve(
                        id,
                        socket,
                        peer,
                        players.clone(),
                        lifecycle.clone(),
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "accept_failed");
                    sleep(ACCEPT_BACKOFF).await;
                }
            },
            _ = shutdown.changed() => break,
        }
    }
    debug!("accept_loop_stopped");
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt as _, AsyncWriteExt as _},
        net::TcpStream,
        sync::mpsc::{UnboundedReceiver, unbounded_channel},
        task::LocalSet,
        time::timeout,
    };

    use super::*;
    use crate::{
        ConnectionHandle, Player,
        connection::{LifecycleEvent, Stage},
    };

    const WAIT: Duration = Duration::from_secs(5);

    /// Echoes every chunk back and closes on "bye".
    struct Echo {
        conn: ConnectionHandle,
    }

    impl Player for Echo {
        fn on_data(&mut self, data: &[u8]) {
            if data == b"bye" {
                self.conn.close();
                return;
            }
            let _ = self.conn.send(data.to_vec());
        }
    }

    fn echo_factory() -> Arc<dyn PlayerFactory> {
        Arc::new(|conn: ConnectionHandle| Box::new(Echo { conn }) as Box<dyn Player>)
    }

    async fn next_event(rx: &mut UnboundedReceiver<LifecycleEvent>) -> LifecycleEvent {
        timeout(WAIT, rx.recv())
            .await
            .expect("lifecycle event in time")
            .expect("lifecycle channel open")
    }

    #[tokio::test(flavor = "current_thread")]
    async fn bind_failure_is_reported() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let taken = StdTcpListener::bind((LISTEN_ADDR, 0)).unwrap();
                let port = taken.local_addr().unwrap().port();
                let err = Acceptor::listen(LISTEN_ADDR, port, echo_factory(), None)
                    .err()
                    .expect("port already in use");
                assert!(matches!(err, Error::Bind { port: p, .. } if p == port));
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn echoes_and_tears_down_in_order() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let (tx, mut rx) = unbounded_channel();
                let acceptor = Acceptor::listen(LISTEN_ADDR, 0, echo_factory(), Some(tx)).unwrap();
                let mut client = TcpStream::connect(acceptor.local_addr()).await.unwrap();
                assert_eq!(next_event(&mut rx).await.stage, Stage::Opened);

                client.write_all(b"ping").await.unwrap();
                let mut buf = [0u8; 4];
                timeout(WAIT, client.read_exact(&mut buf))
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(&buf, b"ping");

                drop(client);
                let stages = [
                    next_event(&mut rx).await.stage,
                    next_event(&mut rx).await.stage,
                    next_event(&mut rx).await.stage,
                ];
                assert_eq!(
                    stages,
                    [Stage::Closing, Stage::SocketReleased, Stage::ProcessorReleased]
                );
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn reply_survives_peer_half_close() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let acceptor = Acceptor::listen(LISTEN_ADDR, 0, echo_factory(), None).unwrap();
                for round in 0..100 {
                    let mut client = TcpStream::connect(acceptor.local_addr()).await.unwrap();
                    client.write_all(b"ping").await.unwrap();
                    client.shutdown().await.unwrap();
                    let mut reply = Vec::new();
                    timeout(WAIT, client.read_to_end(&mut reply))
                        .await
                        .unwrap()
                        .unwrap();
                    assert_eq!(reply, b"ping", "round {round}");
                }
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn player_requested_close_reaches_peer() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let acceptor = Acceptor::listen(LISTEN_ADDR, 0, echo_factory(), None).unwrap();
                let mut client = TcpStream::connect(acceptor.local_addr()).await.unwrap();
                client.write_all(b"bye").await.unwrap();
                let mut rest = Vec::new();
                let n = timeout(WAIT, client.read_to_end(&mut rest))
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(n, 0, "server closed without sending anything");
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn drop_closes_open_connections() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let (tx, mut rx) = unbounded_channel();
                let acceptor = Acceptor::listen(LISTEN_ADDR, 0, echo_factory(), Some(tx)).unwrap();
                let addr = acceptor.local_addr();
                let mut client = TcpStream::connect(addr).await.unwrap();
                assert_eq!(next_event(&mut rx).await.stage, Stage::Opened);

                drop(acceptor);
                let mut stages = Vec::new();
                while stages.last() != Some(&Stage::ProcessorReleased) {
                    stages.push(next_event(&mut rx).await.stage);
                }
                assert_eq!(
                    stages,
                    vec![Stage::Closing, Stage::SocketReleased, Stage::ProcessorReleased]
                );

                let mut rest = Vec::new();
                let n = timeout(WAIT, client.read_to_end(&mut rest))
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(n, 0);
            })
            .await;
    }
}
