//! Several producers, several consumers, one hub.
//!
//! Run with:
//!   cargo test --test broadcast_fanout

mod common;

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use vitalcast::hub::{ChannelSink, HubMessage};
use vitalcast::session::{CloseReason, SourceSession};

use common::{context, frame, uniform};

async fn drain(rx: &mut mpsc::Receiver<HubMessage>, closed_sources: usize) -> Vec<(String, u64)> {
    let mut received = Vec::new();
    let mut closed = 0;
    while closed < closed_sources {
        match rx.recv().await.unwrap() {
            HubMessage::Vitals(result) => received.push((result.source_id.clone(), result.sequence)),
            HubMessage::SourceClosed { .. } => closed += 1,
        }
    }
    received
}

#[tokio::test]
async fn two_producers_three_consumers() {
    let context = context();
    let mut consumers = Vec::new();
    for _ in 0..3 {
        let (sink, rx) = ChannelSink::pair(32);
        context.hub.register_consumer(Uuid::new_v4(), sink).await.unwrap();
        consumers.push(rx);
    }

    let mut producers = Vec::new();
    for source_id in ["bed-a", "bed-b"] {
        let (tx, mut rx) = mpsc::channel(4);
        let mut session = SourceSession::new(Uuid::new_v4(), &context).unwrap();
        producers.push((
            tx,
            tokio::spawn(async move { session.run(&mut rx, None).await }),
            source_id,
        ));
    }

    // Interleave one frame from each producer.
    for (tx, _, source_id) in &producers {
        tx.send(frame(source_id, 1, uniform([190, 100, 90]))).await.unwrap();
    }
    for (tx, handle, _) in producers {
        drop(tx);
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.close_reason, CloseReason::ProducerDisconnected);
        assert_eq!(report.frames_processed, 1);
    }

    for rx in consumers.iter_mut() {
        let mut received = drain(rx, 2).await;
        received.sort();
        assert_eq!(
            received,
            vec![("bed-a".to_string(), 1), ("bed-b".to_string(), 1)]
        );
    }
}

#[tokio::test]
async fn per_source_order_is_preserved() {
    let context = context();
    let (sink, mut consumer) = ChannelSink::pair(128);
    context.hub.register_consumer(Uuid::new_v4(), sink).await.unwrap();

    let payload = uniform([160, 120, 100]);
    let mut handles = Vec::new();
    for source_id in ["bed-x", "bed-y", "bed-z"] {
        let (tx, mut rx) = mpsc::channel(32);
        for sequence in 0..20 {
            tx.send(frame(source_id, sequence, payload.clone())).await.unwrap();
        }
        drop(tx);
        let mut session = SourceSession::new(Uuid::new_v4(), &context).unwrap();
        handles.push(tokio::spawn(async move { session.run(&mut rx, None).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut per_source: HashMap<String, Vec<u64>> = HashMap::new();
    for (source_id, sequence) in drain(&mut consumer, 3).await {
        per_source.entry(source_id).or_default().push(sequence);
    }
    assert_eq!(per_source.len(), 3);
    for sequences in per_source.values() {
        assert_eq!(*sequences, (0..20).collect::<Vec<u64>>());
    }
}

#[tokio::test]
async fn consumer_leaving_does_not_disturb_the_rest() {
    let context = context();
    let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    let mut consumers = Vec::new();
    for id in &ids {
        let (sink, rx) = ChannelSink::pair(64);
        context.hub.register_consumer(*id, sink).await.unwrap();
        consumers.push(rx);
    }

    let (tx, mut rx) = mpsc::channel(16);
    let mut session = SourceSession::new(Uuid::new_v4(), &context).unwrap();
    let handle = tokio::spawn(async move { session.run(&mut rx, None).await });

    let payload = uniform([160, 120, 100]);
    for sequence in 0..5 {
        tx.send(frame("bed-q", sequence, payload.clone())).await.unwrap();
    }
    // Drop the middle consumer's receiving end; its sink starts failing.
    let gone = consumers.remove(1);
    drop(gone);
    for sequence in 5..10 {
        tx.send(frame("bed-q", sequence, payload.clone())).await.unwrap();
    }
    drop(tx);
    handle.await.unwrap().unwrap();

    for rx in consumers.iter_mut() {
        let sequences: Vec<u64> = drain(rx, 1).await.into_iter().map(|(_, s)| s).collect();
        assert_eq!(sequences, (0..10).collect::<Vec<u64>>());
    }
    // The failed consumer's writer notices on its next send.
    for _ in 0..200 {
        if !context.hub.is_registered(ids[1]).await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(!context.hub.is_registered(ids[1]).await);
    assert_eq!(context.hub.consumer_count().await, 2);
}
