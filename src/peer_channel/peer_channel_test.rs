use std::sync::atomic::AtomicUsize;

use bytes::BytesMut;

use super::*;
use crate::data_channel::data_channel_test::MockTransport;
use crate::data_channel::ChannelState;
use crate::error::Error;
use crate::message::ping::PingMessage;

struct PeerPair {
    a: PeerChannel,
    b: PeerChannel,
    transport_a: Arc<MockTransport>,
    transport_b: Arc<MockTransport>,
}

async fn create_peer_pair() -> PeerPair {
    let transport_a = MockTransport::new();
    let transport_b = MockTransport::new();
    let a = PeerChannel::new(DataChannel::new(transport_a.clone())).await;
    let b = PeerChannel::new(DataChannel::new(transport_b.clone())).await;

    PeerPair {
        a,
        b,
        transport_a,
        transport_b,
    }
}

/// Moves everything `from` has sent into `to`'s receive path.
async fn pump(from: &Arc<MockTransport>, to: &PeerChannel) {
    for chunk in from.take_chunks().await {
        to.data_channel().handle_chunk(chunk).await;
    }
}

/// Frames `message` as the next wire transmission for a fresh channel.
fn single_chunk(message: &Message) -> Bytes {
    let frame = message.marshal().unwrap();
    let mut chunk = BytesMut::with_capacity(frame.len() + 1);
    chunk.extend_from_slice(&[0]);
    chunk.extend_from_slice(&frame);
    chunk.freeze()
}

#[tokio::test]
async fn test_ping_pong_round_trip() {
    let pair = create_peer_pair().await;

    // B answers every ping with a pong carrying the same nonce
    {
        let b = pair.b.clone();
        pair.b
            .on(
                MessageType::Ping,
                Box::new(move |message| {
                    let b = b.clone();
                    Box::pin(async move {
                        if let Message::Ping(ping) = &*message {
                            b.pong(ping.nonce).await;
                        }
                        Ok(())
                    })
                }),
            )
            .await;
    }

    let pong_nonces: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let pong_nonces = Arc::clone(&pong_nonces);
        pair.a
            .on(
                MessageType::Pong,
                Box::new(move |message| {
                    let pong_nonces = Arc::clone(&pong_nonces);
                    Box::pin(async move {
                        if let Message::Pong(pong) = &*message {
                            pong_nonces.lock().await.push(pong.nonce);
                        }
                        Ok(())
                    })
                }),
            )
            .await;
    }

    assert!(pair.a.ping(7).await);
    pump(&pair.transport_a, &pair.b).await;
    pump(&pair.transport_b, &pair.a).await;

    assert_eq!(&pong_nonces.lock().await[..], &[7]);
    assert_eq!(pair.a.data_channel().messages_received(), 1);
    assert_eq!(pair.b.data_channel().messages_received(), 1);
}

#[tokio::test]
async fn test_malformed_message_answered_with_reject() {
    let pair = create_peer_pair().await;

    // corrupt a payload byte so the checksum fails but type peeks fine
    let frame = Message::Ping(PingMessage { nonce: 1 }).marshal().unwrap();
    let mut corrupted = BytesMut::from(&frame[..]);
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xff;

    let mut chunk = BytesMut::new();
    chunk.extend_from_slice(&[0]);
    chunk.extend_from_slice(&corrupted);
    pair.b.data_channel().handle_chunk(chunk.freeze()).await;

    // the channel stays open and a REJECT went out
    assert_eq!(pair.b.data_channel().ready_state(), ChannelState::Open);
    let outbound = pair.transport_b.take_chunks().await;
    assert_eq!(outbound.len(), 1);

    let reject = Message::unmarshal(&outbound[0].slice(1..)).unwrap();
    match reject {
        Message::Reject(reject) => {
            assert_eq!(reject.message_type, MessageType::Ping as u8);
            assert_eq!(reject.code, RejectCode::Malformed);
        }
        other => panic!("expected a reject message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_reject_closes_without_answering() {
    let pair = create_peer_pair().await;

    let close_types: Arc<Mutex<Vec<CloseType>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let close_types = Arc::clone(&close_types);
        pair.b
            .on_close(Box::new(move |ty| {
                let close_types = Arc::clone(&close_types);
                Box::pin(async move {
                    close_types.lock().await.push(ty);
                })
            }))
            .await;
    }

    let frame = Message::Reject(RejectMessage {
        message_type: MessageType::Block as u8,
        code: RejectCode::Invalid,
        reason: "unknown block".to_owned(),
        extra_data: Bytes::new(),
    })
    .marshal()
    .unwrap();
    let mut corrupted = BytesMut::from(&frame[..]);
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xff;

    let mut chunk = BytesMut::new();
    chunk.extend_from_slice(&[0]);
    chunk.extend_from_slice(&corrupted);
    pair.b.data_channel().handle_chunk(chunk.freeze()).await;

    // reject-loop safety: the channel closes and nothing is sent back
    assert_eq!(pair.b.data_channel().ready_state(), ChannelState::Closed);
    assert!(pair.transport_b.take_chunks().await.is_empty());
    assert_eq!(
        &close_types.lock().await[..],
        &[CloseType::FailedToParseMessageType]
    );
}

#[tokio::test]
async fn test_well_formed_reject_is_dispatched_normally() {
    let pair = create_peer_pair().await;

    let rejects = Arc::new(AtomicUsize::new(0));
    {
        let rejects = Arc::clone(&rejects);
        pair.b
            .on(
                MessageType::Reject,
                Box::new(move |_| {
                    let rejects = Arc::clone(&rejects);
                    Box::pin(async move {
                        rejects.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                }),
            )
            .await;
    }

    let reject = Message::Reject(RejectMessage {
        message_type: MessageType::Block as u8,
        code: RejectCode::Invalid,
        reason: "unknown block".to_owned(),
        extra_data: Bytes::new(),
    });
    pair.b.data_channel().handle_chunk(single_chunk(&reject)).await;

    assert_eq!(rejects.load(Ordering::SeqCst), 1);
    assert_eq!(pair.b.data_channel().ready_state(), ChannelState::Open);
}

#[tokio::test]
async fn test_handler_error_does_not_close_channel() {
    let pair = create_peer_pair().await;

    pair.b
        .on(
            MessageType::Ping,
            Box::new(|_| Box::pin(async { Err(Error::Other("handler failed".to_owned())) })),
        )
        .await;

    assert!(pair.a.ping(3).await);
    pump(&pair.transport_a, &pair.b).await;

    assert_eq!(pair.b.data_channel().ready_state(), ChannelState::Open);
    assert_eq!(pair.b.data_channel().messages_received(), 1);
}

#[tokio::test]
async fn test_message_log_fired_after_dispatch() {
    let pair = create_peer_pair().await;

    let logs: Arc<Mutex<Vec<(MessageType, usize)>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let logs = Arc::clone(&logs);
        pair.b
            .on_message_log(Box::new(move |entry: MessageLog| {
                let logs = Arc::clone(&logs);
                Box::pin(async move {
                    logs.lock()
                        .await
                        .push((entry.message.message_type(), entry.byte_length));
                })
            }))
            .await;
    }

    let frame = Message::Ping(PingMessage { nonce: 5 }).marshal().unwrap();
    let frame_len = frame.len();
    assert!(pair.a.ping(5).await);
    pump(&pair.transport_a, &pair.b).await;

    assert_eq!(&logs.lock().await[..], &[(MessageType::Ping, frame_len)]);
}

#[tokio::test]
async fn test_expectation_confirmed_by_matching_receive() {
    let pair = create_peer_pair().await;
    let timeouts = Arc::new(AtomicUsize::new(0));

    {
        let timeouts = Arc::clone(&timeouts);
        pair.b
            .expect_message(
                &[MessageType::Ping],
                Box::new(move || {
                    let timeouts = Arc::clone(&timeouts);
                    Box::pin(async move {
                        timeouts.fetch_add(1, Ordering::SeqCst);
                    })
                }),
                Some(Duration::from_millis(150)),
                None,
            )
            .await;
    }

    assert!(pair.b.is_expecting_message(MessageType::Ping).await);
    assert!(pair.a.ping(1).await);
    pump(&pair.transport_a, &pair.b).await;

    assert!(!pair.b.is_expecting_message(MessageType::Ping).await);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(timeouts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unparsable_type_closes_with_reason() {
    let pair = create_peer_pair().await;

    let close_types: Arc<Mutex<Vec<CloseType>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let close_types = Arc::clone(&close_types);
        pair.b
            .on_close(Box::new(move |ty| {
                let close_types = Arc::clone(&close_types);
                Box::pin(async move {
                    close_types.lock().await.push(ty);
                })
            }))
            .await;
    }

    // unknown type byte; length and checksum are otherwise consistent so
    // the chunk layer assembles the frame and hands it up
    let frame = Message::Ping(PingMessage { nonce: 1 }).marshal().unwrap();
    let mut corrupted = BytesMut::from(&frame[..]);
    corrupted[4] = 0xfe;

    let mut chunk = BytesMut::new();
    chunk.extend_from_slice(&[0]);
    chunk.extend_from_slice(&corrupted);
    pair.b.data_channel().handle_chunk(chunk.freeze()).await;

    assert_eq!(pair.b.data_channel().ready_state(), ChannelState::Closed);
    assert!(pair.transport_b.take_chunks().await.is_empty());
    assert_eq!(
        &close_types.lock().await[..],
        &[CloseType::FailedToParseMessageType]
    );
}

#[tokio::test]
async fn test_explicit_close_surfaces_reason() {
    let pair = create_peer_pair().await;

    let close_types: Arc<Mutex<Vec<CloseType>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let close_types = Arc::clone(&close_types);
        pair.a
            .on_close(Box::new(move |ty| {
                let close_types = Arc::clone(&close_types);
                Box::pin(async move {
                    close_types.lock().await.push(ty);
                })
            }))
            .await;
    }

    pair.a.close(CloseType::Regular).await;

    assert_eq!(&close_types.lock().await[..], &[CloseType::Regular]);
    assert!(!CloseType::Regular.is_failing());
    assert!(CloseType::FailedToParseMessageType.is_failing());
}

#[tokio::test]
async fn test_chunk_layer_violation_surfaces_network_error() {
    let pair = create_peer_pair().await;

    let close_types: Arc<Mutex<Vec<CloseType>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let close_types = Arc::clone(&close_types);
        pair.b
            .on_close(Box::new(move |ty| {
                let close_types = Arc::clone(&close_types);
                Box::pin(async move {
                    close_types.lock().await.push(ty);
                })
            }))
            .await;
    }

    // wrong tag on a fresh channel is a chunk-layer protocol violation
    let frame = Message::Ping(PingMessage { nonce: 1 }).marshal().unwrap();
    let mut chunk = BytesMut::new();
    chunk.extend_from_slice(&[7]);
    chunk.extend_from_slice(&frame);
    pair.b.data_channel().handle_chunk(chunk.freeze()).await;

    assert_eq!(pair.b.data_channel().ready_state(), ChannelState::Closed);
    assert_eq!(&close_types.lock().await[..], &[CloseType::NetworkError]);
}

#[tokio::test]
async fn test_send_api_produces_parsable_frames() {
    let pair = create_peer_pair().await;

    assert!(pair.a.get_head().await);
    assert!(pair.a.mempool().await);
    assert!(pair.a.get_chain_proof().await);
    assert!(
        pair.a
            .subscribe(Subscription::MinFee(500))
            .await
    );

    let chunks = pair.transport_a.take_chunks().await;
    assert_eq!(chunks.len(), 4);

    let types: Vec<MessageType> = chunks
        .iter()
        .map(|chunk| {
            Message::unmarshal(&chunk.slice(1..))
                .unwrap()
                .message_type()
        })
        .collect();
    assert_eq!(
        types,
        vec![
            MessageType::GetHead,
            MessageType::Mempool,
            MessageType::GetChainProof,
            MessageType::Subscribe
        ]
    );
}

#[tokio::test]
async fn test_send_after_close_returns_false() {
    let pair = create_peer_pair().await;

    pair.a.close(CloseType::Regular).await;
    assert!(!pair.a.ping(1).await);
}
