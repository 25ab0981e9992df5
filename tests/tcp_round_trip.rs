//! Producer and consumer talking to a real server over loopback TCP.
//!
//! Run with:
//!   cargo test --test tcp_round_trip

mod common;

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use vitalcast::network::wire::to_line;
use vitalcast::network::{ClientMessage, FrameMessage, PeerRole, ServerMessage, VitalsServer};

use common::{context, uniform};

async fn hello(stream: &mut TcpStream, role: PeerRole) {
    let line = to_line(&ClientMessage::Hello { role }).unwrap();
    stream.write_all(line.as_bytes()).await.unwrap();
}

#[tokio::test]
async fn frames_in_vitals_out() {
    let server = VitalsServer::new(context()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serving = tokio::spawn(server.clone().serve(listener));

    let mut consumer = TcpStream::connect(addr).await.unwrap();
    hello(&mut consumer, PeerRole::Consumer).await;
    for _ in 0..200 {
        if server.context().hub.consumer_count().await == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(server.context().hub.consumer_count().await, 1);

    let mut producer = TcpStream::connect(addr).await.unwrap();
    hello(&mut producer, PeerRole::Producer).await;
    let image = uniform([240, 10, 11]);
    for sequence in 0..3 {
        let line = to_line(&ClientMessage::Frame(FrameMessage::new("ward-3", sequence, &image))).unwrap();
        producer.write_all(line.as_bytes()).await.unwrap();
    }
    // A malformed line is skipped without closing the session.
    producer.write_all(b"{\"kind\":\"frame\"}\n").await.unwrap();
    producer.shutdown().await.unwrap();
    drop(producer);

    let mut lines = BufReader::new(consumer).lines();
    let mut sequences = Vec::new();
    loop {
        let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
            .await
            .expect("consumer timed out")
            .unwrap()
            .expect("server closed the consumer early");
        match serde_json::from_str::<ServerMessage>(&line).unwrap() {
            ServerMessage::Vitals(vitals) => {
                assert_eq!(vitals.source_id, "ward-3");
                assert!((vitals.flushing_score.unwrap() - 0.9).abs() < 1e-9);
                assert_eq!(vitals.risk_score, 0.36);
                assert_eq!(vitals.annotated_frame, None);
                sequences.push(vitals.sequence);
            }
            ServerMessage::SourceClosed { source_id } => {
                assert_eq!(source_id, "ward-3");
                break;
            }
        }
    }
    assert_eq!(sequences, vec![0, 1, 2]);

    server.shutdown().await;
    serving.await.unwrap().unwrap();
}

#[tokio::test]
async fn frame_before_hello_is_refused() {
    let server = VitalsServer::new(context()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serving = tokio::spawn(server.clone().serve(listener));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let line = to_line(&ClientMessage::Frame(FrameMessage::new("bed-1", 0, b"x"))).unwrap();
    stream.write_all(line.as_bytes()).await.unwrap();

    // The server hangs up without registering anything.
    let mut lines = BufReader::new(stream).lines();
    let next = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
        .await
        .expect("server kept the connection open");
    assert!(matches!(next, Ok(None) | Err(_)));
    assert!(server.context().hub.registrations().await.is_empty());

    server.shutdown().await;
    serving.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_does_not_wait_for_a_silent_connection() {
    let server = VitalsServer::new(context()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serving = tokio::spawn(server.clone().serve(listener));

    // Connected, but never says hello; the idle timeout is a minute away.
    let silent = TcpStream::connect(addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    server.shutdown().await;
    tokio::time::timeout(Duration::from_secs(2), serving)
        .await
        .expect("server waited for the hello")
        .unwrap()
        .unwrap();
    drop(silent);
}
