use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use peerdrop_data_channel::memory::pair;
use peerdrop_data_channel::{
    ChannelEvent, DataChannel, TcpDataChannel, TcpDataListener, room_token,
};
use peerdrop_protocol::{TransferMessage, TransferMetadata, decode_frame, encode_frame};
use peerdrop_transfer::{
    ReceiverSession, SendEvent, TransferConfig, TransferEvent, TransferSender,
};

fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

async fn collect_until_done(rx: &mut mpsc::UnboundedReceiver<TransferEvent>) -> Vec<TransferEvent> {
    let mut out = Vec::new();
    while let Some(event) = rx.recv().await {
        let done = matches!(
            event,
            TransferEvent::Completed { .. }
                | TransferEvent::Failed { .. }
                | TransferEvent::Abandoned { .. }
        );
        out.push(event);
        if done {
            break;
        }
    }
    out
}

fn progress_of(events: &[TransferEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            TransferEvent::Progress { received_bytes, .. } => Some(*received_bytes),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn forty_thousand_bytes_over_memory_pair() {
    let ((a, a_rx), (b, b_rx)) = pair();
    let config = TransferConfig::default();
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let session = ReceiverSession::new(b, b_rx, &config, ui_tx);
    let cancel = CancellationToken::new();
    let receiver_task = tokio::spawn(session.run(cancel.clone()));

    let data = sample(40_000);
    let mut sender = TransferSender::new(a.clone(), a_rx, config).unwrap();
    let id = sender
        .send_bytes("photo.jpg", data.clone(), "image/jpeg")
        .await
        .unwrap();
    // announce + 3 chunks + finish
    assert_eq!(a.sent_frames(), 5);

    let events = collect_until_done(&mut ui_rx).await;
    let TransferEvent::Announced { metadata, .. } = &events[0] else {
        panic!("expected announce first, got {:?}", events[0]);
    };
    assert_eq!(metadata.total_size_bytes, 40_000);
    assert_eq!(metadata.file_name, "photo.jpg");

    let progress = progress_of(&events);
    assert_eq!(progress.last(), Some(&40_000));
    assert_eq!(progress.iter().filter(|&&p| p == 40_000).count(), 1);

    let Some(TransferEvent::Completed { transfer_id, artifact }) = events.last() else {
        panic!("expected completion, got {events:?}");
    };
    assert_eq!(transfer_id, &id);
    assert_eq!(artifact.byte_len(), 40_000);
    assert_eq!(artifact.bytes(), data.as_slice());
    assert_eq!(artifact.mime_type(), "image/jpeg");

    cancel.cancel();
    let registry = receiver_task.await.unwrap();
    assert_eq!(registry.in_flight(), 0);
}

#[tokio::test]
async fn consecutive_files_on_one_connection() {
    let ((a, a_rx), (b, b_rx)) = pair();
    let config = TransferConfig {
        chunk_size: 1000,
        ..TransferConfig::default()
    };
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let session = ReceiverSession::new(b, b_rx, &config, ui_tx);
    let receiver_task = tokio::spawn(session.run(CancellationToken::new()));

    let mut sender = TransferSender::new(a, a_rx, config).unwrap();
    for (name, len) in [("one.bin", 2500), ("empty.bin", 0), ("two.bin", 1000)] {
        sender
            .send_bytes(name, sample(len), "application/octet-stream")
            .await
            .unwrap();
        let events = collect_until_done(&mut ui_rx).await;
        let Some(TransferEvent::Completed { artifact, .. }) = events.last() else {
            panic!("{name}: expected completion, got {events:?}");
        };
        assert_eq!(artifact.file_name(), name);
        assert_eq!(artifact.bytes(), sample(len).as_slice());
    }

    sender.close().await;
    receiver_task.await.unwrap();
}

#[tokio::test]
async fn unannounced_chunk_produces_no_artifact() {
    let ((a, _a_rx), (b, b_rx)) = pair();
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let session = ReceiverSession::new(b, b_rx, &TransferConfig::default(), ui_tx);
    let receiver_task = tokio::spawn(session.run(CancellationToken::new()));

    a.send(encode_frame(&TransferMessage::chunk("nobody".into(), 0, vec![1, 2, 3])).unwrap())
        .unwrap();
    a.close();

    let registry = receiver_task.await.unwrap();
    assert_eq!(registry.in_flight(), 0);

    let mut events = Vec::new();
    while let Ok(event) = ui_rx.try_recv() {
        events.push(event);
    }
    assert!(matches!(
        events.as_slice(),
        [TransferEvent::Anomaly { transfer_id: Some(id), .. }] if id.as_str() == "nobody"
    ));
}

#[tokio::test]
async fn early_finish_fails_transfer() {
    let ((a, _a_rx), (b, b_rx)) = pair();
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let session = ReceiverSession::new(b, b_rx, &TransferConfig::default(), ui_tx);
    let _receiver_task = tokio::spawn(session.run(CancellationToken::new()));

    let meta = TransferMetadata {
        transfer_id: "t1".into(),
        file_name: "short.bin".into(),
        total_size_bytes: 100,
        mime_type: "application/octet-stream".into(),
    };
    for msg in [
        TransferMessage::announce(meta),
        TransferMessage::chunk("t1".into(), 0, vec![0; 40]),
        TransferMessage::finish("t1".into()),
    ] {
        a.send(encode_frame(&msg).unwrap()).unwrap();
    }

    let events = collect_until_done(&mut ui_rx).await;
    assert!(matches!(events.last(), Some(TransferEvent::Failed { .. })));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, TransferEvent::Completed { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn close_mid_stream_abandons_and_aborts() {
    let ((a, a_rx), (b, b_rx)) = pair();
    let handle = a.clone();
    let config = TransferConfig {
        chunk_size: 100,
        ..TransferConfig::default()
    };
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let session = ReceiverSession::new(b, b_rx, &config, ui_tx);
    let receiver_task = tokio::spawn(session.run(CancellationToken::new()));

    // Congested from the start: the sender stalls right after the ack.
    handle.set_buffered_amount(u64::MAX);
    let (send_tx, mut send_rx) = mpsc::unbounded_channel();
    let mut sender = TransferSender::new(a, a_rx, config)
        .unwrap()
        .with_events(send_tx);
    let sender_task = tokio::spawn(async move {
        sender
            .send_bytes("big.bin", sample(1000), "application/octet-stream")
            .await
    });

    assert!(matches!(
        ui_rx.recv().await,
        Some(TransferEvent::Announced { .. })
    ));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(handle.sent_frames(), 1);
    handle.close();

    let result = sender_task.await.unwrap();
    assert!(result.is_err());
    let mut failed = false;
    while let Ok(event) = send_rx.try_recv() {
        failed |= matches!(event, SendEvent::Failed { .. });
    }
    assert!(failed);

    let registry = receiver_task.await.unwrap();
    assert_eq!(registry.buffered_bytes(), 0);
    assert_eq!(registry.in_flight(), 0);

    let events = collect_until_done(&mut ui_rx).await;
    assert!(matches!(events.last(), Some(TransferEvent::Abandoned { .. })));
}

#[tokio::test]
async fn tcp_round_trip_with_room_token() {
    let token = room_token("living-room");
    let listener = TcpDataListener::bind("127.0.0.1:0", token.clone())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let config = TransferConfig::default();

    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let receiver_config = config.clone();
    let receiver_task = tokio::spawn(async move {
        let (channel, events) = listener.accept().await.unwrap();
        ReceiverSession::new(channel, events, &receiver_config, ui_tx)
            .run(CancellationToken::new())
            .await
    });

    let (channel, events) = TcpDataChannel::connect(addr, &token).await.unwrap();
    let mut sender = TransferSender::new(channel, events, config).unwrap();
    let data = sample(100_000);
    sender
        .send_bytes("archive.zip", data.clone(), "application/zip")
        .await
        .unwrap();

    let events = collect_until_done(&mut ui_rx).await;
    let Some(TransferEvent::Completed { artifact, .. }) = events.last() else {
        panic!("expected completion, got {events:?}");
    };
    assert_eq!(artifact.bytes(), data.as_slice());
    assert_eq!(artifact.checksum(), peerdrop_transfer::checksum_bytes(&data));

    sender.close().await;
    let registry = tokio::time::timeout(Duration::from_secs(5), receiver_task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(registry.in_flight(), 0);
}

#[tokio::test]
async fn wrong_room_is_rejected() {
    let listener = TcpDataListener::bind("127.0.0.1:0", room_token("kitchen"))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let accept = tokio::spawn(async move { listener.accept().await.map(|_| ()) });

    let result = TcpDataChannel::connect(addr, &room_token("garage")).await;
    assert!(result.is_err());
    assert!(accept.await.unwrap().is_err());
}

#[tokio::test]
async fn memory_channel_close_is_observed_by_both_sides() {
    let ((a, mut a_rx), (b, mut b_rx)) = pair();
    b.close();
    assert_eq!(a_rx.recv().await, Some(ChannelEvent::Closed));
    assert_eq!(b_rx.recv().await, Some(ChannelEvent::Closed));
    assert!(!a.is_open());
    assert!(decode_frame(Vec::new()).is_err());
}
