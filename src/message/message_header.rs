use bytes::{Buf, BufMut, BytesMut};

use super::message_type::MessageType;
use super::MAGIC;
use crate::error::{Error, Result};

/// Frame header prefixing every serialized message.
///
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             Magic                             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     Type      |                    Length                     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     ...       |                   Checksum                    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     ...       |                    Payload                    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///
/// `length` is the total frame size in bytes, header and checksum included.
/// `checksum` is the first 4 bytes of a SHA-256 over the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub typ: MessageType,
    pub length: u32,
    pub checksum: [u8; 4],
}

pub const MESSAGE_HEADER_SIZE: usize = 13;

const TYPE_OFFSET: usize = 4;
const LENGTH_OFFSET: usize = 5;

impl MessageHeader {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < MESSAGE_HEADER_SIZE {
            return Err(Error::ErrHeaderTooSmall {
                expected: MESSAGE_HEADER_SIZE,
                actual: buf.remaining(),
            });
        }

        let magic = buf.get_u32();
        if magic != MAGIC {
            return Err(Error::ErrInvalidMagic(magic));
        }

        let typ = MessageType::try_from(buf.get_u8())?;
        let length = buf.get_u32();

        let mut checksum = [0u8; 4];
        buf.copy_to_slice(&mut checksum);

        Ok(MessageHeader {
            typ,
            length,
            checksum,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        writer.put_u32(MAGIC);
        writer.put_u8(self.typ as u8);
        writer.put_u32(self.length);
        writer.put_slice(&self.checksum);
    }
}

/// Reads the `length` field of a frame without consuming the buffer.
///
/// Only the bytes up to and including the length field need to be present;
/// fails if the magic does not match.
pub fn peek_length(buf: &[u8]) -> Result<u32> {
    let needed = LENGTH_OFFSET + 4;
    if buf.len() < needed {
        return Err(Error::ErrHeaderTooSmall {
            expected: needed,
            actual: buf.len(),
        });
    }
    peek_magic(buf)?;

    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[LENGTH_OFFSET..LENGTH_OFFSET + 4]);
    Ok(u32::from_be_bytes(raw))
}

/// Reads the `type` field of a frame without consuming the buffer.
///
/// Fails if the magic does not match or the type byte is unknown.
pub fn peek_type(buf: &[u8]) -> Result<MessageType> {
    if buf.len() < TYPE_OFFSET + 1 {
        return Err(Error::ErrHeaderTooSmall {
            expected: TYPE_OFFSET + 1,
            actual: buf.len(),
        });
    }
    peek_magic(buf)?;

    MessageType::try_from(buf[TYPE_OFFSET])
}

fn peek_magic(buf: &[u8]) -> Result<()> {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[..4]);
    let magic = u32::from_be_bytes(raw);
    if magic != MAGIC {
        return Err(Error::ErrInvalidMagic(magic));
    }
    Ok(())
}
