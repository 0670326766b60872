#[cfg(test)]
mod message_test;

pub mod accounts;
pub mod addr;
pub mod block;
pub mod inventory;
pub mod message_header;
pub mod message_type;
pub mod ping;
pub mod proof;
pub mod reject;
pub mod signal;
pub mod subscribe;
pub mod transaction;
pub mod version;

use bytes::{Buf, Bytes, BytesMut};
use sha2::{Digest, Sha256};

use accounts::*;
use addr::*;
use block::*;
use inventory::*;
use message_type::MessageType;
use ping::*;
use proof::*;
use reject::*;
use signal::*;
use subscribe::*;
use transaction::*;
use version::*;

use crate::error::{Error, Result};

/// Fixed sentinel identifying the protocol family. First field of every
/// frame; a mismatch fails parsing before anything else is looked at.
pub const MAGIC: u32 = 0x4204_2042;

pub use message_header::{peek_length, peek_type, MessageHeader, MESSAGE_HEADER_SIZE};

/// A parsed protocol message.
///
/// The frame type byte uniquely determines the variant; INV, GET_DATA,
/// GET_HEADER and NOT_FOUND share one payload layout and are told apart by
/// the type alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Version(VersionMessage),
    VerAck(VerAckMessage),
    Inv(InventoryMessage),
    GetData(InventoryMessage),
    GetHeader(InventoryMessage),
    NotFound(InventoryMessage),
    GetBlocks(GetBlocksMessage),
    Block(BlockMessage),
    Header(HeaderMessage),
    Tx(TxMessage),
    Mempool,
    Reject(RejectMessage),
    Subscribe(SubscribeMessage),
    Addr(AddrMessage),
    GetAddr(GetAddrMessage),
    Ping(PingMessage),
    Pong(PongMessage),
    Signal(SignalMessage),
    GetChainProof,
    ChainProof(ChainProofMessage),
    GetAccountsProof(GetAccountsProofMessage),
    AccountsProof(AccountsProofMessage),
    GetAccountsTreeChunk(GetAccountsTreeChunkMessage),
    AccountsTreeChunk(AccountsTreeChunkMessage),
    GetTransactionsProof(GetTransactionsProofMessage),
    TransactionsProof(TransactionsProofMessage),
    GetTransactionReceipts(GetTransactionReceiptsMessage),
    TransactionReceipts(TransactionReceiptsMessage),
    GetBlockProof(GetBlockProofMessage),
    BlockProof(BlockProofMessage),
    GetHead,
    Head(HeadMessage),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Version(_) => MessageType::Version,
            Message::VerAck(_) => MessageType::VerAck,
            Message::Inv(_) => MessageType::Inv,
            Message::GetData(_) => MessageType::GetData,
            Message::GetHeader(_) => MessageType::GetHeader,
            Message::NotFound(_) => MessageType::NotFound,
            Message::GetBlocks(_) => MessageType::GetBlocks,
            Message::Block(_) => MessageType::Block,
            Message::Header(_) => MessageType::Header,
            Message::Tx(_) => MessageType::Tx,
            Message::Mempool => MessageType::Mempool,
            Message::Reject(_) => MessageType::Reject,
            Message::Subscribe(_) => MessageType::Subscribe,
            Message::Addr(_) => MessageType::Addr,
            Message::GetAddr(_) => MessageType::GetAddr,
            Message::Ping(_) => MessageType::Ping,
            Message::Pong(_) => MessageType::Pong,
            Message::Signal(_) => MessageType::Signal,
            Message::GetChainProof => MessageType::GetChainProof,
            Message::ChainProof(_) => MessageType::ChainProof,
            Message::GetAccountsProof(_) => MessageType::GetAccountsProof,
            Message::AccountsProof(_) => MessageType::AccountsProof,
            Message::GetAccountsTreeChunk(_) => MessageType::GetAccountsTreeChunk,
            Message::AccountsTreeChunk(_) => MessageType::AccountsTreeChunk,
            Message::GetTransactionsProof(_) => MessageType::GetTransactionsProof,
            Message::TransactionsProof(_) => MessageType::TransactionsProof,
            Message::GetTransactionReceipts(_) => MessageType::GetTransactionReceipts,
            Message::TransactionReceipts(_) => MessageType::TransactionReceipts,
            Message::GetBlockProof(_) => MessageType::GetBlockProof,
            Message::BlockProof(_) => MessageType::BlockProof,
            Message::GetHead => MessageType::GetHead,
            Message::Head(_) => MessageType::Head,
        }
    }

    /// Serializes the message into a complete frame: header, checksum and
    /// payload.
    pub fn marshal(&self) -> Result<Bytes> {
        let mut payload = BytesMut::new();
        self.marshal_payload(&mut payload)?;

        let header = MessageHeader {
            typ: self.message_type(),
            length: (MESSAGE_HEADER_SIZE + payload.len()) as u32,
            checksum: message_checksum(&payload),
        };

        let mut raw = BytesMut::with_capacity(MESSAGE_HEADER_SIZE + payload.len());
        header.marshal_to(&mut raw);
        raw.extend_from_slice(&payload);
        Ok(raw.freeze())
    }

    /// Parses a complete frame.
    ///
    /// Validates, in order: header size, magic, known type, that the length
    /// field equals the buffer length, the payload checksum, the payload
    /// layout, and that the payload was consumed exactly.
    pub fn unmarshal(raw: &Bytes) -> Result<Self> {
        let reader = &mut raw.clone();
        let header = MessageHeader::unmarshal(reader)?;

        if header.length as usize != raw.len() {
            return Err(Error::ErrLengthMismatch {
                declared: header.length as usize,
                actual: raw.len(),
            });
        }

        let payload = raw.slice(MESSAGE_HEADER_SIZE..);
        if message_checksum(&payload) != header.checksum {
            return Err(Error::ErrChecksumMismatch);
        }

        let reader = &mut payload.clone();
        let message = match header.typ {
            MessageType::Version => Message::Version(VersionMessage::unmarshal(reader)?),
            MessageType::VerAck => Message::VerAck(VerAckMessage::unmarshal(reader)?),
            MessageType::Inv => Message::Inv(InventoryMessage::unmarshal(reader)?),
            MessageType::GetData => Message::GetData(InventoryMessage::unmarshal(reader)?),
            MessageType::GetHeader => Message::GetHeader(InventoryMessage::unmarshal(reader)?),
            MessageType::NotFound => Message::NotFound(InventoryMessage::unmarshal(reader)?),
            MessageType::GetBlocks => Message::GetBlocks(GetBlocksMessage::unmarshal(reader)?),
            MessageType::Block => Message::Block(BlockMessage::unmarshal(reader)?),
            MessageType::Header => Message::Header(HeaderMessage::unmarshal(reader)?),
            MessageType::Tx => Message::Tx(TxMessage::unmarshal(reader)?),
            MessageType::Mempool => Message::Mempool,
            MessageType::Reject => Message::Reject(RejectMessage::unmarshal(reader)?),
            MessageType::Subscribe => Message::Subscribe(SubscribeMessage::unmarshal(reader)?),
            MessageType::Addr => Message::Addr(AddrMessage::unmarshal(reader)?),
            MessageType::GetAddr => Message::GetAddr(GetAddrMessage::unmarshal(reader)?),
            MessageType::Ping => Message::Ping(PingMessage::unmarshal(reader)?),
            MessageType::Pong => Message::Pong(PongMessage::unmarshal(reader)?),
            MessageType::Signal => Message::Signal(SignalMessage::unmarshal(reader)?),
            MessageType::GetChainProof => Message::GetChainProof,
            MessageType::ChainProof => Message::ChainProof(ChainProofMessage::unmarshal(reader)?),
            MessageType::GetAccountsProof => {
                Message::GetAccountsProof(GetAccountsProofMessage::unmarshal(reader)?)
            }
            MessageType::AccountsProof => {
                Message::AccountsProof(AccountsProofMessage::unmarshal(reader)?)
            }
            MessageType::GetAccountsTreeChunk => {
                Message::GetAccountsTreeChunk(GetAccountsTreeChunkMessage::unmarshal(reader)?)
            }
            MessageType::AccountsTreeChunk => {
                Message::AccountsTreeChunk(AccountsTreeChunkMessage::unmarshal(reader)?)
            }
            MessageType::GetTransactionsProof => {
                Message::GetTransactionsProof(GetTransactionsProofMessage::unmarshal(reader)?)
            }
            MessageType::TransactionsProof => {
                Message::TransactionsProof(TransactionsProofMessage::unmarshal(reader)?)
            }
            MessageType::GetTransactionReceipts => {
                Message::GetTransactionReceipts(GetTransactionReceiptsMessage::unmarshal(reader)?)
            }
            MessageType::TransactionReceipts => {
                Message::TransactionReceipts(TransactionReceiptsMessage::unmarshal(reader)?)
            }
            MessageType::GetBlockProof => {
                Message::GetBlockProof(GetBlockProofMessage::unmarshal(reader)?)
            }
            MessageType::BlockProof => Message::BlockProof(BlockProofMessage::unmarshal(reader)?),
            MessageType::GetHead => Message::GetHead,
            MessageType::Head => Message::Head(HeadMessage::unmarshal(reader)?),
        };

        if reader.has_remaining() {
            return Err(Error::ErrTrailingBytes(reader.remaining()));
        }

        Ok(message)
    }

    fn marshal_payload(&self, writer: &mut BytesMut) -> Result<()> {
        match self {
            Message::Version(m) => m.marshal_to(writer),
            Message::VerAck(m) => m.marshal_to(writer),
            Message::Inv(m) => m.marshal_to(writer),
            Message::GetData(m) => m.marshal_to(writer),
            Message::GetHeader(m) => m.marshal_to(writer),
            Message::NotFound(m) => m.marshal_to(writer),
            Message::GetBlocks(m) => m.marshal_to(writer),
            Message::Block(m) => m.marshal_to(writer),
            Message::Header(m) => m.marshal_to(writer),
            Message::Tx(m) => m.marshal_to(writer),
            Message::Mempool => Ok(()),
            Message::Reject(m) => m.marshal_to(writer),
            Message::Subscribe(m) => m.marshal_to(writer),
            Message::Addr(m) => m.marshal_to(writer),
            Message::GetAddr(m) => m.marshal_to(writer),
            Message::Ping(m) => m.marshal_to(writer),
            Message::Pong(m) => m.marshal_to(writer),
            Message::Signal(m) => m.marshal_to(writer),
            Message::GetChainProof => Ok(()),
            Message::ChainProof(m) => m.marshal_to(writer),
            Message::GetAccountsProof(m) => m.marshal_to(writer),
            Message::AccountsProof(m) => m.marshal_to(writer),
            Message::GetAccountsTreeChunk(m) => m.marshal_to(writer),
            Message::AccountsTreeChunk(m) => m.marshal_to(writer),
            Message::GetTransactionsProof(m) => m.marshal_to(writer),
            Message::TransactionsProof(m) => m.marshal_to(writer),
            Message::GetTransactionReceipts(m) => m.marshal_to(writer),
            Message::TransactionReceipts(m) => m.marshal_to(writer),
            Message::GetBlockProof(m) => m.marshal_to(writer),
            Message::BlockProof(m) => m.marshal_to(writer),
            Message::GetHead => Ok(()),
            Message::Head(m) => m.marshal_to(writer),
        }
    }
}

/// First 4 bytes of a SHA-256 over the payload bytes.
fn message_checksum(payload: &[u8]) -> [u8; 4] {
    let digest = Sha256::digest(payload);
    let mut checksum = [0u8; 4];
    checksum.copy_from_slice(&digest[..4]);
    checksum
}
