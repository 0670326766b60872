use bytes::{Buf, BufMut, BytesMut};

use crate::error::Result;
use crate::primitives::{check_remaining, get_fixed, Blake2bHash, PeerAddress, PublicKey, Signature};

/// First message on a fresh connection, sent by both sides.
///
/// Carries the sender's protocol version, its advertised address, the
/// genesis block it considers canonical and its current head, plus a
/// challenge nonce the peer must sign in its VERACK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMessage {
    pub version: u32,
    pub peer_address: PeerAddress,
    pub genesis_hash: Blake2bHash,
    pub head_hash: Blake2bHash,
    pub challenge_nonce: [u8; 32],
}

impl VersionMessage {
    pub const CHALLENGE_SIZE: usize = 32;

    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        check_remaining(buf, 4)?;
        let version = buf.get_u32();
        let peer_address = PeerAddress::unmarshal(buf)?;
        let genesis_hash = Blake2bHash::unmarshal(buf)?;
        let head_hash = Blake2bHash::unmarshal(buf)?;
        let challenge_nonce = get_fixed(buf)?;

        Ok(VersionMessage {
            version,
            peer_address,
            genesis_hash,
            head_hash,
            challenge_nonce,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        writer.put_u32(self.version);
        self.peer_address.marshal_to(writer);
        self.genesis_hash.marshal_to(writer);
        self.head_hash.marshal_to(writer);
        writer.put_slice(&self.challenge_nonce);
        Ok(())
    }
}

/// Handshake completion: proves ownership of the advertised public key by
/// signing the challenge nonce from the peer's VERSION. Signature
/// verification is delegated to the connection layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerAckMessage {
    pub public_key: PublicKey,
    pub signature: Signature,
}

impl VerAckMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        let public_key = PublicKey::unmarshal(buf)?;
        let signature = Signature::unmarshal(buf)?;

        Ok(VerAckMessage {
            public_key,
            signature,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        self.public_key.marshal_to(writer);
        self.signature.marshal_to(writer);
        Ok(())
    }
}
