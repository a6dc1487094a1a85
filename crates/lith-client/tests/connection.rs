use std::time::Duration;

use lith_client::{spawn_connection, ClientConfig, ConnectionCommand, ConnectionNotification};
use lith_proto::constants::LINE_DATA_PATH;
use lith_proto::testing::{frame, HDataBuilder};
use lith_proto::Pointer;
use lith_store::StoreEvent;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct FakeRelay {
    lines: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeRelay {
    async fn next_line(&mut self) -> String {
        let mut line = String::new();
        timeout(WAIT, self.lines.read_line(&mut line))
            .await
            .expect("relay read timed out")
            .unwrap();
        line
    }

    async fn send(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }
}

async fn connect() -> (
    FakeRelay,
    mpsc::Sender<ConnectionCommand>,
    mpsc::UnboundedReceiver<ConnectionNotification>,
) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let config = ClientConfig {
        passphrase: "pw".into(),
        encrypted: false,
        ..ClientConfig::default()
    };
    let (cmd_tx, notif_rx) = spawn_connection(client, &config).await.unwrap();

    let (read, writer) = tokio::io::split(server);
    let mut relay = FakeRelay {
        lines: BufReader::new(read),
        writer,
    };
    assert_eq!(relay.next_line().await, "init password=pw,compression=off\n");
    loop {
        if relay.next_line().await == "nicklist\n" {
            break;
        }
    }
    (relay, cmd_tx, notif_rx)
}

async fn wait_for(
    rx: &mut mpsc::UnboundedReceiver<ConnectionNotification>,
    mut pred: impl FnMut(&ConnectionNotification) -> bool,
) -> ConnectionNotification {
    loop {
        let notification = timeout(WAIT, rx.recv())
            .await
            .expect("notification timed out")
            .expect("notification channel closed");
        if pred(&notification) {
            return notification;
        }
    }
}

fn buffers() -> Vec<u8> {
    frame(
        &HDataBuilder::new("buffer", "number:int,name:str,title:str")
            .row(&[0x10], |w| {
                w.int(1).str("core.weechat").str("");
            })
            .row(&[0x20], |w| {
                w.int(2).str("irc.libera.#rust").str("Rust!");
            })
            .message(""),
    )
}

fn lines() -> Vec<u8> {
    let mut builder = HDataBuilder::new(LINE_DATA_PATH, "date:tim,prefix:str,message:str");
    for (ptr, secs, text) in [
        (0x3, 1_700_000_300, "see https://example.com/a/b/c?x=1"),
        (0x2, 1_700_000_200, "second"),
        (0x1, 1_700_000_100, "first"),
    ] {
        builder = builder.row(&[0x20, 0xa, 0xb, ptr], |w| {
            w.time(secs).str("alice").str(text);
        });
    }
    frame(&builder.message(""))
}

#[tokio::test]
async fn test_handshake_and_sync() {
    let (mut relay, cmd_tx, mut notif_rx) = connect().await;
    assert!(matches!(
        notif_rx.recv().await,
        Some(ConnectionNotification::Connected)
    ));

    relay.send(&buffers()).await;
    relay.send(&lines()).await;

    wait_for(&mut notif_rx, |n| {
        matches!(
            n,
            ConnectionNotification::Changed(StoreEvent::MessageAdded { message, .. })
                if *message == Pointer(0x1)
        )
    })
    .await;

    let (tx, rx) = oneshot::channel();
    cmd_tx.send(ConnectionCommand::Conversations(tx)).await.unwrap();
    let conversations = rx.await.unwrap();
    assert_eq!(conversations.len(), 2);
    assert_eq!(conversations[1].title, "Rust!");

    let (reply, rx) = oneshot::channel();
    cmd_tx
        .send(ConnectionCommand::Messages {
            conversation: Pointer(0x20),
            reply,
        })
        .await
        .unwrap();
    let messages = rx.await.unwrap();
    let bodies: Vec<&str> = messages.iter().map(|m| m.body()).collect();
    assert_eq!(
        bodies,
        vec!["first", "second", "see https://example.com/a/b/c?x=1"]
    );
    assert!(messages[2].segments()[1].is_link());

    cmd_tx.send(ConnectionCommand::Shutdown).await.unwrap();
    assert_eq!(relay.next_line().await, "quit\n");
    let disconnected = wait_for(&mut notif_rx, |n| {
        matches!(n, ConnectionNotification::Disconnected { .. })
    })
    .await;
    assert!(matches!(
        disconnected,
        ConnectionNotification::Disconnected { reason: None }
    ));
}

#[tokio::test]
async fn test_input_and_history() {
    let (mut relay, cmd_tx, mut notif_rx) = connect().await;
    relay.send(&buffers()).await;
    relay.send(&lines()).await;
    wait_for(&mut notif_rx, |n| {
        matches!(
            n,
            ConnectionNotification::Changed(StoreEvent::MessageAdded { message, .. })
                if *message == Pointer(0x1)
        )
    })
    .await;

    cmd_tx
        .send(ConnectionCommand::Input {
            conversation: Pointer(0x20),
            text: "hello, world".into(),
        })
        .await
        .unwrap();
    assert_eq!(relay.next_line().await, "input 0x20 hello, world\n");

    cmd_tx
        .send(ConnectionCommand::FetchMoreLines(Pointer(0x20)))
        .await
        .unwrap();
    assert_eq!(
        relay.next_line().await,
        "hdata buffer:0x20/lines/last_line(-28)/data\n"
    );

    // Still outstanding: nothing is sent for the second request.
    cmd_tx
        .send(ConnectionCommand::FetchMoreLines(Pointer(0x20)))
        .await
        .unwrap();
    cmd_tx
        .send(ConnectionCommand::Input {
            conversation: Pointer(0x20),
            text: "marker".into(),
        })
        .await
        .unwrap();
    assert_eq!(relay.next_line().await, "input 0x20 marker\n");
}

#[tokio::test]
async fn test_arbitrary_chunking() {
    let (mut relay, cmd_tx, mut notif_rx) = connect().await;

    let mut stream = buffers();
    stream.extend(lines());
    let mut rng = StdRng::seed_from_u64(42);
    let mut offset = 0;
    while offset < stream.len() {
        let step = rng.gen_range(1..=17).min(stream.len() - offset);
        relay.send(&stream[offset..offset + step]).await;
        offset += step;
    }

    wait_for(&mut notif_rx, |n| {
        matches!(
            n,
            ConnectionNotification::Changed(StoreEvent::MessageAdded { message, .. })
                if *message == Pointer(0x1)
        )
    })
    .await;

    let (reply, rx) = oneshot::channel();
    cmd_tx
        .send(ConnectionCommand::Messages {
            conversation: Pointer(0x20),
            reply,
        })
        .await
        .unwrap();
    assert_eq!(rx.await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_skipped_and_fatal_frames() {
    let (mut relay, _cmd_tx, mut notif_rx) = connect().await;

    // Compressed frames are refused but the session carries on.
    relay.send(&[0, 0, 0, 7, 1, 0x78, 0x9c]).await;
    wait_for(&mut notif_rx, |n| {
        matches!(n, ConnectionNotification::FrameSkipped(_))
    })
    .await;

    relay
        .send(&frame(
            &HDataBuilder::new("buffer/lines/line", "")
                .row(&[1, 2, 3], |_| {})
                .message(""),
        ))
        .await;
    let disconnected = wait_for(&mut notif_rx, |n| {
        matches!(n, ConnectionNotification::Disconnected { .. })
    })
    .await;
    match disconnected {
        ConnectionNotification::Disconnected { reason: Some(reason) } => {
            assert!(reason.contains("Malformed hdata path"), "{reason}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_relay_hangup() {
    let (relay, _cmd_tx, mut notif_rx) = connect().await;
    drop(relay);
    let disconnected = wait_for(&mut notif_rx, |n| {
        matches!(n, ConnectionNotification::Disconnected { .. })
    })
    .await;
    assert!(matches!(
        disconnected,
        ConnectionNotification::Disconnected { reason: Some(_) }
    ));
}

#[tokio::test]
async fn test_requests_served_during_event_burst() {
    let (mut relay, cmd_tx, mut notif_rx) = connect().await;
    relay.send(&buffers()).await;

    let mut builder = HDataBuilder::new(LINE_DATA_PATH, "date:tim,prefix:str,message:str");
    for n in 0..400u64 {
        builder = builder.row(&[0x20, 0xa, 0xb, 0x1000 + n], |w| {
            w.time(1_700_000_000 + n as i64).str("bob").str("line");
        });
    }
    relay.send(&frame(&builder.message(""))).await;

    let first = wait_for(&mut notif_rx, |n| {
        matches!(
            n,
            ConnectionNotification::Changed(StoreEvent::MessageAdded { .. })
        )
    })
    .await;
    let ConnectionNotification::Changed(StoreEvent::MessageAdded { message, .. }) = first else {
        unreachable!();
    };

    // The other events stay queued while the reply is awaited.
    let (reply, rx) = oneshot::channel();
    cmd_tx
        .send(ConnectionCommand::Message { message, reply })
        .await
        .unwrap();
    let found = timeout(WAIT, rx)
        .await
        .expect("reply timed out")
        .unwrap();
    assert_eq!(found.map(|m| m.pointer), Some(message));
}
