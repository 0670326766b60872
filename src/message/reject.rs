use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::primitives::{check_remaining, get_var_string, put_var_string};

/// Why a message was refused. Codes follow the Bitcoin REJECT convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RejectCode {
    Malformed = 0x01,
    Invalid = 0x10,
    Obsolete = 0x11,
    Double = 0x12,
}

impl TryFrom<u8> for RejectCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(RejectCode::Malformed),
            0x10 => Ok(RejectCode::Invalid),
            0x11 => Ok(RejectCode::Obsolete),
            0x12 => Ok(RejectCode::Double),
            other => Err(Error::ErrInvalidEnumValue(other as u32)),
        }
    }
}

/// Reports why a previously received message was refused.
///
/// `message_type` is carried as a raw byte: a peer may reject a type this
/// node does not know. A REJECT must never be answered with another REJECT;
/// that rule lives in the peer channel's receive path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectMessage {
    pub message_type: u8,
    pub code: RejectCode,
    pub reason: String,
    pub extra_data: Bytes,
}

/// `reason` is a u8-length string on the wire.
pub const REASON_MAX_LENGTH: usize = 255;

impl RejectMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        check_remaining(buf, 2)?;
        let message_type = buf.get_u8();
        let code = RejectCode::try_from(buf.get_u8())?;
        let reason = get_var_string(buf)?;

        check_remaining(buf, 2)?;
        let extra_len = buf.get_u16() as usize;
        check_remaining(buf, extra_len)?;
        let extra_data = buf.copy_to_bytes(extra_len);

        Ok(RejectMessage {
            message_type,
            code,
            reason,
            extra_data,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        if self.reason.len() > REASON_MAX_LENGTH {
            return Err(Error::ErrVectorTooLong {
                count: self.reason.len(),
                max: REASON_MAX_LENGTH,
            });
        }

        writer.put_u8(self.message_type);
        writer.put_u8(self.code as u8);
        put_var_string(writer, &self.reason);
        writer.put_u16(self.extra_data.len() as u16);
        writer.put_slice(&self.extra_data);
        Ok(())
    }
}
