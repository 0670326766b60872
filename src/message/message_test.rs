use bytes::{Bytes, BytesMut};

use super::accounts::*;
use super::addr::*;
use super::block::*;
use super::inventory::*;
use super::ping::*;
use super::proof::*;
use super::reject::*;
use super::signal::*;
use super::subscribe::*;
use super::transaction::*;
use super::version::*;
use super::*;
use crate::primitives::*;

fn test_peer_address() -> PeerAddress {
    PeerAddress {
        protocol: Protocol::Wss,
        services: 0x0000_0005,
        timestamp: 1_600_000_000,
        public_key: PublicKey([0x11; 32]),
        distance: 1,
        host: "node.example.org".to_owned(),
        port: 8443,
    }
}

fn assert_round_trip(message: Message) {
    let raw = message.marshal().expect("marshal failed");
    assert_eq!(peek_type(&raw).expect("peek_type failed"), message.message_type());
    assert_eq!(peek_length(&raw).expect("peek_length failed") as usize, raw.len());

    let recovered = Message::unmarshal(&raw).expect("unmarshal failed");
    assert_eq!(recovered, message);
}

#[test]
fn test_version_round_trip() {
    assert_round_trip(Message::Version(VersionMessage {
        version: 2,
        peer_address: test_peer_address(),
        genesis_hash: Blake2bHash([0xaa; 32]),
        head_hash: Blake2bHash([0xbb; 32]),
        challenge_nonce: [0xcc; 32],
    }));
}

#[test]
fn test_verack_round_trip() {
    assert_round_trip(Message::VerAck(VerAckMessage {
        public_key: PublicKey([0x42; 32]),
        signature: Signature([0x99; 64]),
    }));
}

#[test]
fn test_inventory_round_trips() {
    let vectors = vec![
        InvVector {
            typ: InvVectorType::Block,
            hash: Blake2bHash([0x01; 32]),
        },
        InvVector {
            typ: InvVectorType::Transaction,
            hash: Blake2bHash([0x02; 32]),
        },
    ];

    assert_round_trip(Message::Inv(InventoryMessage {
        vectors: vectors.clone(),
    }));
    assert_round_trip(Message::GetData(InventoryMessage {
        vectors: vectors.clone(),
    }));
    assert_round_trip(Message::GetHeader(InventoryMessage {
        vectors: vectors.clone(),
    }));
    assert_round_trip(Message::NotFound(InventoryMessage { vectors }));
}

#[test]
fn test_inventory_type_distinguishes_payloads() {
    let vectors = vec![InvVector {
        typ: InvVectorType::Block,
        hash: Blake2bHash([0x07; 32]),
    }];
    let inv = Message::Inv(InventoryMessage {
        vectors: vectors.clone(),
    })
    .marshal()
    .unwrap();
    let get_data = Message::GetData(InventoryMessage { vectors }).marshal().unwrap();

    assert_ne!(inv, get_data);
    assert_eq!(peek_type(&inv).unwrap(), MessageType::Inv);
    assert_eq!(peek_type(&get_data).unwrap(), MessageType::GetData);
}

#[test]
fn test_get_blocks_round_trip() {
    assert_round_trip(Message::GetBlocks(GetBlocksMessage {
        locators: vec![Blake2bHash([0x0a; 32]), Blake2bHash([0x0b; 32])],
        max_inv_size: 500,
        direction: GetBlocksDirection::Backward,
    }));
}

#[test]
fn test_block_header_head_round_trips() {
    assert_round_trip(Message::Block(BlockMessage {
        block: Block(Bytes::from_static(b"opaque block bytes")),
    }));
    assert_round_trip(Message::Header(HeaderMessage {
        header: BlockHeader(Bytes::from_static(b"opaque header bytes")),
    }));
    assert_round_trip(Message::GetHead);
    assert_round_trip(Message::Head(HeadMessage {
        header: BlockHeader(Bytes::from_static(b"head header")),
    }));
}

#[test]
fn test_tx_round_trip() {
    assert_round_trip(Message::Tx(TxMessage {
        transaction: Transaction(Bytes::from_static(b"tx bytes")),
        accounts_proof: None,
    }));
    assert_round_trip(Message::Tx(TxMessage {
        transaction: Transaction(Bytes::from_static(b"tx bytes")),
        accounts_proof: Some(AccountsProof(Bytes::from_static(b"proof bytes"))),
    }));
    assert_round_trip(Message::Mempool);
}

#[test]
fn test_reject_round_trip() {
    assert_round_trip(Message::Reject(RejectMessage {
        message_type: MessageType::Block as u8,
        code: RejectCode::Malformed,
        reason: "bad checksum".to_owned(),
        extra_data: Bytes::from_static(&[0xde, 0xad]),
    }));
}

#[test]
fn test_subscribe_round_trips() {
    assert_round_trip(Message::Subscribe(SubscribeMessage {
        subscription: Subscription::None,
    }));
    assert_round_trip(Message::Subscribe(SubscribeMessage {
        subscription: Subscription::Any,
    }));
    assert_round_trip(Message::Subscribe(SubscribeMessage {
        subscription: Subscription::Addresses(vec![Address([0x33; 20]), Address([0x44; 20])]),
    }));
    assert_round_trip(Message::Subscribe(SubscribeMessage {
        subscription: Subscription::MinFee(1_000),
    }));
}

#[test]
fn test_addr_round_trips() {
    assert_round_trip(Message::Addr(AddrMessage {
        addresses: vec![test_peer_address()],
    }));
    assert_round_trip(Message::GetAddr(GetAddrMessage {
        protocol_mask: 0x05,
        service_mask: 0xffff_ffff,
        max_results: 100,
    }));
}

#[test]
fn test_ping_pong_round_trips() {
    assert_round_trip(Message::Ping(PingMessage { nonce: 7 }));
    assert_round_trip(Message::Pong(PongMessage { nonce: 7 }));
}

#[test]
fn test_signal_round_trips() {
    assert_round_trip(Message::Signal(SignalMessage {
        sender_id: PeerId([0x01; 16]),
        recipient_id: PeerId([0x02; 16]),
        nonce: 99,
        ttl: 6,
        flags: 0,
        payload: Bytes::from_static(b"sdp offer"),
        sender_public_key: Some(PublicKey([0x03; 32])),
        signature: Some(Signature([0x04; 64])),
    }));
    // unroutable notifications carry no payload and thus no signature
    assert_round_trip(Message::Signal(SignalMessage {
        sender_id: PeerId([0x01; 16]),
        recipient_id: PeerId([0x02; 16]),
        nonce: 100,
        ttl: 5,
        flags: SIGNAL_FLAG_UNROUTABLE,
        payload: Bytes::new(),
        sender_public_key: None,
        signature: None,
    }));
}

#[test]
fn test_signal_with_payload_requires_signature() {
    let message = Message::Signal(SignalMessage {
        sender_id: PeerId([0x01; 16]),
        recipient_id: PeerId([0x02; 16]),
        nonce: 1,
        ttl: 6,
        flags: 0,
        payload: Bytes::from_static(b"sdp offer"),
        sender_public_key: None,
        signature: None,
    });
    assert_eq!(message.marshal(), Err(Error::ErrSignalUnsigned));
}

#[test]
fn test_proof_round_trips() {
    assert_round_trip(Message::GetChainProof);
    assert_round_trip(Message::ChainProof(ChainProofMessage {
        proof: ChainProof(Bytes::from_static(b"chain proof")),
    }));
    assert_round_trip(Message::GetAccountsProof(GetAccountsProofMessage {
        block_hash: Blake2bHash([0x05; 32]),
        addresses: vec![Address([0x06; 20])],
    }));
    assert_round_trip(Message::AccountsProof(AccountsProofMessage {
        block_hash: Blake2bHash([0x05; 32]),
        proof: None,
    }));
    assert_round_trip(Message::AccountsProof(AccountsProofMessage {
        block_hash: Blake2bHash([0x05; 32]),
        proof: Some(AccountsProof(Bytes::from_static(b"accounts proof"))),
    }));
    assert_round_trip(Message::GetAccountsTreeChunk(GetAccountsTreeChunkMessage {
        block_hash: Blake2bHash([0x07; 32]),
        start_prefix: "00ff".to_owned(),
    }));
    assert_round_trip(Message::AccountsTreeChunk(AccountsTreeChunkMessage {
        block_hash: Blake2bHash([0x07; 32]),
        chunk: Some(AccountsTreeChunk(Bytes::from_static(b"tree chunk"))),
    }));
    assert_round_trip(Message::GetTransactionsProof(GetTransactionsProofMessage {
        block_hash: Blake2bHash([0x08; 32]),
        addresses: vec![Address([0x09; 20])],
    }));
    assert_round_trip(Message::TransactionsProof(TransactionsProofMessage {
        block_hash: Blake2bHash([0x08; 32]),
        proof: Some(TransactionsProof(Bytes::from_static(b"tx proof"))),
    }));
    assert_round_trip(Message::GetTransactionReceipts(
        GetTransactionReceiptsMessage {
            address: Address([0x0a; 20]),
            offset: 40,
        },
    ));
    assert_round_trip(Message::TransactionReceipts(TransactionReceiptsMessage {
        receipts: vec![TransactionReceipt {
            transaction_hash: Blake2bHash([0x0b; 32]),
            block_hash: Blake2bHash([0x0c; 32]),
            block_height: 123_456,
        }],
    }));
    assert_round_trip(Message::GetBlockProof(GetBlockProofMessage {
        block_hash_to_prove: Blake2bHash([0x0d; 32]),
        known_block_hash: Blake2bHash([0x0e; 32]),
    }));
    assert_round_trip(Message::BlockProof(BlockProofMessage {
        proof: Some(BlockProof(Bytes::from_static(b"block proof"))),
    }));
    assert_round_trip(Message::BlockProof(BlockProofMessage { proof: None }));
}

#[test]
fn test_unmarshal_magic_mismatch() {
    let mut raw = BytesMut::from(&Message::Ping(PingMessage { nonce: 1 }).marshal().unwrap()[..]);
    raw[0] ^= 0xff;
    let raw = raw.freeze();

    assert!(matches!(
        Message::unmarshal(&raw),
        Err(Error::ErrInvalidMagic(_))
    ));
    assert!(matches!(peek_type(&raw), Err(Error::ErrInvalidMagic(_))));
    assert!(matches!(peek_length(&raw), Err(Error::ErrInvalidMagic(_))));
}

#[test]
fn test_unmarshal_unknown_type() {
    let mut raw = BytesMut::from(&Message::Ping(PingMessage { nonce: 1 }).marshal().unwrap()[..]);
    raw[4] = 0xfe;
    let raw = raw.freeze();

    assert_eq!(Message::unmarshal(&raw), Err(Error::ErrUnknownMessageType(0xfe)));
    assert_eq!(peek_type(&raw), Err(Error::ErrUnknownMessageType(0xfe)));
}

#[test]
fn test_unmarshal_checksum_mismatch() {
    let mut raw = BytesMut::from(&Message::Ping(PingMessage { nonce: 1 }).marshal().unwrap()[..]);
    let last = raw.len() - 1;
    raw[last] ^= 0x01;
    let raw = raw.freeze();

    assert_eq!(Message::unmarshal(&raw), Err(Error::ErrChecksumMismatch));
}

#[test]
fn test_unmarshal_length_mismatch() {
    let raw = Message::Ping(PingMessage { nonce: 1 }).marshal().unwrap();
    let mut truncated = BytesMut::from(&raw[..]);
    truncated.truncate(raw.len() - 1);
    let truncated = truncated.freeze();

    assert!(matches!(
        Message::unmarshal(&truncated),
        Err(Error::ErrLengthMismatch { .. })
    ));
}

#[test]
fn test_unmarshal_trailing_bytes() {
    // declared length and checksum cover one extra byte the ping codec
    // does not consume
    let ping = Message::Ping(PingMessage { nonce: 1 }).marshal().unwrap();
    let mut payload = BytesMut::from(&ping[MESSAGE_HEADER_SIZE..]);
    payload.extend_from_slice(&[0x00]);

    let header = MessageHeader {
        typ: MessageType::Ping,
        length: (MESSAGE_HEADER_SIZE + payload.len()) as u32,
        checksum: {
            use sha2::{Digest, Sha256};
            let digest = Sha256::digest(&payload);
            let mut checksum = [0u8; 4];
            checksum.copy_from_slice(&digest[..4]);
            checksum
        },
    };
    let mut raw = BytesMut::new();
    header.marshal_to(&mut raw);
    raw.extend_from_slice(&payload);
    let raw = raw.freeze();

    assert_eq!(Message::unmarshal(&raw), Err(Error::ErrTrailingBytes(1)));
}

#[test]
fn test_peek_on_short_buffer() {
    let raw = Message::Ping(PingMessage { nonce: 1 }).marshal().unwrap();

    assert!(matches!(
        peek_length(&raw[..8]),
        Err(Error::ErrHeaderTooSmall { .. })
    ));
    assert!(matches!(
        peek_type(&raw[..4]),
        Err(Error::ErrHeaderTooSmall { .. })
    ));
    // the length field is readable before the full header has arrived
    assert_eq!(peek_length(&raw[..9]).unwrap() as usize, raw.len());
    assert_eq!(peek_type(&raw[..5]).unwrap(), MessageType::Ping);
}

#[test]
fn test_vector_bound_enforced() {
    let vectors = vec![
        InvVector {
            typ: InvVectorType::Block,
            hash: Blake2bHash([0x00; 32]),
        };
        VECTORS_MAX_COUNT + 1
    ];

    assert!(matches!(
        Message::Inv(InventoryMessage { vectors }).marshal(),
        Err(Error::ErrVectorTooLong { .. })
    ));
}

#[test]
fn test_message_type_wire_values_are_stable() {
    assert_eq!(MessageType::Version as u8, 0);
    assert_eq!(MessageType::Inv as u8, 1);
    assert_eq!(MessageType::Reject as u8, 10);
    assert_eq!(MessageType::Addr as u8, 20);
    assert_eq!(MessageType::Ping as u8, 22);
    assert_eq!(MessageType::Signal as u8, 30);
    assert_eq!(MessageType::GetChainProof as u8, 40);
    assert_eq!(MessageType::Head as u8, 54);
    assert_eq!(MessageType::VerAck as u8, 90);
}
