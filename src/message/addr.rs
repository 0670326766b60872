use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::primitives::{check_remaining, PeerAddress};

pub const ADDRESSES_MAX_COUNT: usize = 1000;

/// Gossip payload: peer addresses known to the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrMessage {
    pub addresses: Vec<PeerAddress>,
}

impl AddrMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        check_remaining(buf, 2)?;
        let count = buf.get_u16() as usize;
        if count > ADDRESSES_MAX_COUNT {
            return Err(Error::ErrVectorTooLong {
                count,
                max: ADDRESSES_MAX_COUNT,
            });
        }

        let mut addresses = Vec::with_capacity(count);
        for _ in 0..count {
            addresses.push(PeerAddress::unmarshal(buf)?);
        }

        Ok(AddrMessage { addresses })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        if self.addresses.len() > ADDRESSES_MAX_COUNT {
            return Err(Error::ErrVectorTooLong {
                count: self.addresses.len(),
                max: ADDRESSES_MAX_COUNT,
            });
        }

        writer.put_u16(self.addresses.len() as u16);
        for address in &self.addresses {
            address.marshal_to(writer);
        }
        Ok(())
    }
}

/// Asks the peer for addresses matching the given protocol and service
/// masks. `max_results` caps the reply size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetAddrMessage {
    pub protocol_mask: u8,
    pub service_mask: u32,
    pub max_results: u16,
}

impl GetAddrMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        check_remaining(buf, 1 + 4 + 2)?;
        let protocol_mask = buf.get_u8();
        let service_mask = buf.get_u32();
        let max_results = buf.get_u16();

        Ok(GetAddrMessage {
            protocol_mask,
            service_mask,
            max_results,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        writer.put_u8(self.protocol_mask);
        writer.put_u32(self.service_mask);
        writer.put_u16(self.max_results);
        Ok(())
    }
}
