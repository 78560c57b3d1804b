mod support;

use funq::{ConnectionId, Error, Mode, Stage, is_active, try_activate};
use funq_host::Application;
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::TcpStream,
    sync::mpsc::unbounded_channel,
    time::timeout,
};

use support::{Journal, WAIT, collaborators, next_event, stages_until_released};

async fn roundtrip(client: &mut TcpStream, msg: &[u8]) -> Vec<u8> {
    client.write_all(msg).await.unwrap();
    let mut buf = vec![0u8; msg.len()];
    timeout(WAIT, client.read_exact(&mut buf))
        .await
        .expect("echo in time")
        .expect("echo read");
    buf
}

#[test]
fn player_mode_lifecycle() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let app = Application::new().expect("application");
    let journal = Journal::default();
    let (tx, mut rx) = unbounded_channel();

    let funq = try_activate(Mode::Player, 0, collaborators(&journal).with_lifecycle(tx))
        .expect("first activation");
    assert_eq!(funq.mode(), Mode::Player);
    assert!(is_active());

    // Initialization is deferred to the loop.
    assert!(!funq.is_initialized());
    assert!(funq.local_addr().is_none());
    app.process_events();
    assert!(funq.is_initialized());
    let addr = funq.local_addr().expect("listening");
    assert!(addr.ip().is_loopback());

    app.run_until(async {
        // K simultaneous connections give K players; ids follow accept order.
        let mut clients = Vec::new();
        for i in 1..=3u64 {
            let client = TcpStream::connect(addr).await.expect("connect");
            let ev = next_event(&mut rx).await;
            assert_eq!(ev.id.get(), i);
            assert_eq!(ev.stage, Stage::Opened);
            clients.push(client);
        }
        assert_eq!(journal.created(), 3);

        for (i, client) in clients.iter_mut().enumerate() {
            let msg = format!("hello {i}");
            assert_eq!(roundtrip(client, msg.as_bytes()).await, msg.as_bytes());
        }

        // Closing connection 2 releases player 2 only, after its socket.
        let second = clients.remove(1);
        drop(second);
        let target = ConnectionId::new(2);
        let (stages, others) = stages_until_released(&mut rx, target).await;
        assert!(others.is_empty(), "no other connection changed state");
        assert_eq!(
            stages,
            vec![Stage::Closing, Stage::SocketReleased, Stage::ProcessorReleased]
        );
        assert_eq!(*journal.players_dropped.lock(), vec![target]);

        // The survivors keep working.
        for client in &mut clients {
            assert_eq!(roundtrip(client, b"still here").await, b"still here");
        }
    });

    // Shutdown releases the coordinator and stops listening.
    app.handle().quit().expect("quit");
    app.exec();
    assert!(!is_active());
    assert!(funq.local_addr().is_none());

    // The slot stays spent.
    assert!(matches!(
        try_activate(Mode::Player, 0, collaborators(&journal)),
        Err(Error::AlreadyInstalled)
    ));
}
