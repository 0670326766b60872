use bytes::{Buf, BufMut, BytesMut};

use crate::error::Result;
use crate::primitives::check_remaining;

/// Liveness probe. The peer echoes the nonce back in a PONG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingMessage {
    pub nonce: u32,
}

impl PingMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        check_remaining(buf, 4)?;
        Ok(PingMessage {
            nonce: buf.get_u32(),
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        writer.put_u32(self.nonce);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PongMessage {
    pub nonce: u32,
}

impl PongMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        check_remaining(buf, 4)?;
        Ok(PongMessage {
            nonce: buf.get_u32(),
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        writer.put_u32(self.nonce);
        Ok(())
    }
}
