//! Wire-level value types owned by the crypto, consensus and address-book
//! layers.
//!
//! The messaging core moves these values around without interpreting them.
//! Fixed-width digests, keys and signatures are carried verbatim; consensus
//! structures (blocks, headers, proofs) travel as opaque length-prefixed
//! byte strings whose internal encoding belongs to their owning module.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Returns `ErrUnexpectedEndOfBuffer` unless `buf` still holds `expected` bytes.
pub(crate) fn check_remaining<B: Buf>(buf: &B, expected: usize) -> Result<()> {
    if buf.remaining() < expected {
        return Err(Error::ErrUnexpectedEndOfBuffer {
            expected,
            actual: buf.remaining(),
        });
    }
    Ok(())
}

/// Reads a `u32`-length-prefixed byte string.
pub(crate) fn get_var_bytes<B: Buf>(buf: &mut B) -> Result<Bytes> {
    check_remaining(buf, 4)?;
    let len = buf.get_u32() as usize;
    check_remaining(buf, len)?;
    Ok(buf.copy_to_bytes(len))
}

pub(crate) fn put_var_bytes(writer: &mut BytesMut, bytes: &Bytes) {
    writer.put_u32(bytes.len() as u32);
    writer.put_slice(bytes);
}

/// Reads a `u8`-length-prefixed UTF-8 string.
pub(crate) fn get_var_string<B: Buf>(buf: &mut B) -> Result<String> {
    check_remaining(buf, 1)?;
    let len = buf.get_u8() as usize;
    check_remaining(buf, len)?;
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec()).map_err(|_| Error::ErrInvalidString)
}

pub(crate) fn put_var_string(writer: &mut BytesMut, s: &str) {
    writer.put_u8(s.len() as u8);
    writer.put_slice(s.as_bytes());
}

pub(crate) fn get_fixed<B: Buf, const N: usize>(buf: &mut B) -> Result<[u8; N]> {
    check_remaining(buf, N)?;
    let mut raw = [0u8; N];
    buf.copy_to_slice(&mut raw);
    Ok(raw)
}

/// Blake2b-256 digest of a block, transaction or other consensus value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Blake2bHash(pub [u8; 32]);

impl Blake2bHash {
    pub const SIZE: usize = 32;

    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Blake2bHash(get_fixed(buf)?))
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        writer.put_slice(&self.0);
    }
}

impl fmt::Display for Blake2bHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Ed25519 public key of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    pub const SIZE: usize = 32;

    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(PublicKey(get_fixed(buf)?))
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        writer.put_slice(&self.0);
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Ed25519 signature. Verification is delegated to the crypto layer; the
/// codec only preserves the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub const SIZE: usize = 64;

    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Signature(get_fixed(buf)?))
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        writer.put_slice(&self.0);
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Account address (truncated digest of a public key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const SIZE: usize = 20;

    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Address(get_fixed(buf)?))
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        writer.put_slice(&self.0);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Short peer identifier used for signalling (truncated public key digest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PeerId(pub [u8; 16]);

impl PeerId {
    pub const SIZE: usize = 16;

    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(PeerId(get_fixed(buf)?))
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        writer.put_slice(&self.0);
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Transport protocol of an advertised peer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Protocol {
    Dumb = 0,
    Ws = 1,
    Rtc = 2,
    Wss = 4,
}

impl TryFrom<u8> for Protocol {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Protocol::Dumb),
            1 => Ok(Protocol::Ws),
            2 => Ok(Protocol::Rtc),
            4 => Ok(Protocol::Wss),
            other => Err(Error::ErrInvalidEnumValue(other as u32)),
        }
    }
}

/// Advertised network location of a peer, as exchanged in VERSION and ADDR.
///
/// Reachability, scoring and signature checks over these entries are the
/// address book's business; the codec carries the fields verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    pub protocol: Protocol,
    pub services: u32,
    /// Seconds since the epoch at which the owner last signed this entry.
    pub timestamp: u64,
    pub public_key: PublicKey,
    /// Hop count from the advertising peer; 0 for the peer itself.
    pub distance: u8,
    /// Hostname for WS/WSS peers, empty for RTC/dumb peers.
    pub host: String,
    pub port: u16,
}

impl PeerAddress {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        check_remaining(buf, 1)?;
        let protocol = Protocol::try_from(buf.get_u8())?;
        check_remaining(buf, 4 + 8)?;
        let services = buf.get_u32();
        let timestamp = buf.get_u64();
        let public_key = PublicKey::unmarshal(buf)?;
        check_remaining(buf, 1)?;
        let distance = buf.get_u8();
        let host = get_var_string(buf)?;
        check_remaining(buf, 2)?;
        let port = buf.get_u16();

        Ok(PeerAddress {
            protocol,
            services,
            timestamp,
            public_key,
            distance,
            host,
            port,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        writer.put_u8(self.protocol as u8);
        writer.put_u32(self.services);
        writer.put_u64(self.timestamp);
        self.public_key.marshal_to(writer);
        writer.put_u8(self.distance);
        put_var_string(writer, &self.host);
        writer.put_u16(self.port);
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.protocol {
            Protocol::Ws => write!(f, "ws://{}:{}", self.host, self.port),
            Protocol::Wss => write!(f, "wss://{}:{}", self.host, self.port),
            Protocol::Rtc => write!(f, "rtc://{}", self.public_key),
            Protocol::Dumb => write!(f, "dumb://{}", self.public_key),
        }
    }
}

/// Full block, opaque to the messaging core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block(pub Bytes);

impl Block {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Block(get_var_bytes(buf)?))
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        put_var_bytes(writer, &self.0);
    }
}

/// Block header, opaque to the messaging core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader(pub Bytes);

impl BlockHeader {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(BlockHeader(get_var_bytes(buf)?))
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        put_var_bytes(writer, &self.0);
    }
}

/// Signed transaction, opaque to the messaging core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction(pub Bytes);

impl Transaction {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Transaction(get_var_bytes(buf)?))
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        put_var_bytes(writer, &self.0);
    }
}

/// Interlink-based proof of the chain's head, opaque to the messaging core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainProof(pub Bytes);

impl ChainProof {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(ChainProof(get_var_bytes(buf)?))
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        put_var_bytes(writer, &self.0);
    }
}

/// Merkle proof over the accounts tree, opaque to the messaging core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountsProof(pub Bytes);

impl AccountsProof {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(AccountsProof(get_var_bytes(buf)?))
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        put_var_bytes(writer, &self.0);
    }
}

/// Contiguous slice of the accounts tree, opaque to the messaging core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountsTreeChunk(pub Bytes);

impl AccountsTreeChunk {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(AccountsTreeChunk(get_var_bytes(buf)?))
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        put_var_bytes(writer, &self.0);
    }
}

/// Merkle proof of transactions within a block, opaque to the messaging core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionsProof(pub Bytes);

impl TransactionsProof {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(TransactionsProof(get_var_bytes(buf)?))
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        put_var_bytes(writer, &self.0);
    }
}

/// Interlink proof connecting a block to a known block, opaque to the
/// messaging core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockProof(pub Bytes);

impl BlockProof {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(BlockProof(get_var_bytes(buf)?))
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        put_var_bytes(writer, &self.0);
    }
}
