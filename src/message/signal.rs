use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::primitives::{check_remaining, PeerId, PublicKey, Signature};

/// Flag bit: the sender could not route the original signal and is
/// returning it to the source.
pub const SIGNAL_FLAG_UNROUTABLE: u8 = 0x01;

/// Relayed WebRTC signalling envelope.
///
/// Signals hop across the WebSocket backbone to reach browser peers; each
/// hop decrements `ttl` and drops the signal at zero. A non-empty payload
/// is signed by the original sender so relays cannot forge offers; the
/// signature is carried here and verified by the signalling layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalMessage {
    pub sender_id: PeerId,
    pub recipient_id: PeerId,
    pub nonce: u32,
    pub ttl: u8,
    pub flags: u8,
    pub payload: Bytes,
    pub sender_public_key: Option<PublicKey>,
    pub signature: Option<Signature>,
}

impl SignalMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        let sender_id = PeerId::unmarshal(buf)?;
        let recipient_id = PeerId::unmarshal(buf)?;

        check_remaining(buf, 4 + 1 + 1 + 2)?;
        let nonce = buf.get_u32();
        let ttl = buf.get_u8();
        let flags = buf.get_u8();
        let payload_len = buf.get_u16() as usize;
        check_remaining(buf, payload_len)?;
        let payload = buf.copy_to_bytes(payload_len);

        let (sender_public_key, signature) = if payload.is_empty() {
            (None, None)
        } else {
            (
                Some(PublicKey::unmarshal(buf)?),
                Some(Signature::unmarshal(buf)?),
            )
        };

        Ok(SignalMessage {
            sender_id,
            recipient_id,
            nonce,
            ttl,
            flags,
            payload,
            sender_public_key,
            signature,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        self.sender_id.marshal_to(writer);
        self.recipient_id.marshal_to(writer);
        writer.put_u32(self.nonce);
        writer.put_u8(self.ttl);
        writer.put_u8(self.flags);
        writer.put_u16(self.payload.len() as u16);
        writer.put_slice(&self.payload);

        if !self.payload.is_empty() {
            match (&self.sender_public_key, &self.signature) {
                (Some(public_key), Some(signature)) => {
                    public_key.marshal_to(writer);
                    signature.marshal_to(writer);
                }
                _ => return Err(Error::ErrSignalUnsigned),
            }
        }
        Ok(())
    }

    /// Whether this signal is a routability failure notification.
    pub fn is_unroutable(&self) -> bool {
        self.flags & SIGNAL_FLAG_UNROUTABLE != 0
    }
}
