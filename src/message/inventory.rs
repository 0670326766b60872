use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::primitives::{check_remaining, Blake2bHash};

/// Maximum number of inventory vectors per INV/GET_DATA/GET_HEADER/NOT_FOUND.
pub const VECTORS_MAX_COUNT: usize = 1000;

/// Maximum number of block locators per GET_BLOCKS.
pub const LOCATORS_MAX_COUNT: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum InvVectorType {
    Error = 0,
    Transaction = 1,
    Block = 2,
}

impl TryFrom<u32> for InvVectorType {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(InvVectorType::Error),
            1 => Ok(InvVectorType::Transaction),
            2 => Ok(InvVectorType::Block),
            other => Err(Error::ErrInvalidEnumValue(other)),
        }
    }
}

/// Reference to a block or transaction by hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvVector {
    pub typ: InvVectorType,
    pub hash: Blake2bHash,
}

impl InvVector {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        check_remaining(buf, 4)?;
        let typ = InvVectorType::try_from(buf.get_u32())?;
        let hash = Blake2bHash::unmarshal(buf)?;

        Ok(InvVector { typ, hash })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        writer.put_u32(self.typ as u32);
        self.hash.marshal_to(writer);
    }
}

/// Shared payload of INV, GET_DATA, GET_HEADER and NOT_FOUND: a bounded
/// list of inventory vectors. The frame type alone distinguishes the four.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryMessage {
    pub vectors: Vec<InvVector>,
}

impl InventoryMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        check_remaining(buf, 2)?;
        let count = buf.get_u16() as usize;
        if count > VECTORS_MAX_COUNT {
            return Err(Error::ErrVectorTooLong {
                count,
                max: VECTORS_MAX_COUNT,
            });
        }

        let mut vectors = Vec::with_capacity(count);
        for _ in 0..count {
            vectors.push(InvVector::unmarshal(buf)?);
        }

        Ok(InventoryMessage { vectors })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        if self.vectors.len() > VECTORS_MAX_COUNT {
            return Err(Error::ErrVectorTooLong {
                count: self.vectors.len(),
                max: VECTORS_MAX_COUNT,
            });
        }

        writer.put_u16(self.vectors.len() as u16);
        for vector in &self.vectors {
            vector.marshal_to(writer);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GetBlocksDirection {
    Forward = 1,
    Backward = 2,
}

impl TryFrom<u8> for GetBlocksDirection {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(GetBlocksDirection::Forward),
            2 => Ok(GetBlocksDirection::Backward),
            other => Err(Error::ErrInvalidEnumValue(other as u32)),
        }
    }
}

/// Asks the peer for inventory starting from the first locator hash it
/// recognizes, walking `direction` along its main chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetBlocksMessage {
    pub locators: Vec<Blake2bHash>,
    pub max_inv_size: u16,
    pub direction: GetBlocksDirection,
}

impl GetBlocksMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        check_remaining(buf, 2)?;
        let count = buf.get_u16() as usize;
        if count > LOCATORS_MAX_COUNT {
            return Err(Error::ErrVectorTooLong {
                count,
                max: LOCATORS_MAX_COUNT,
            });
        }

        let mut locators = Vec::with_capacity(count);
        for _ in 0..count {
            locators.push(Blake2bHash::unmarshal(buf)?);
        }

        check_remaining(buf, 2 + 1)?;
        let max_inv_size = buf.get_u16();
        let direction = GetBlocksDirection::try_from(buf.get_u8())?;

        Ok(GetBlocksMessage {
            locators,
            max_inv_size,
            direction,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        if self.locators.len() > LOCATORS_MAX_COUNT {
            return Err(Error::ErrVectorTooLong {
                count: self.locators.len(),
                max: LOCATORS_MAX_COUNT,
            });
        }

        writer.put_u16(self.locators.len() as u16);
        for locator in &self.locators {
            locator.marshal_to(writer);
        }
        writer.put_u16(self.max_inv_size);
        writer.put_u8(self.direction as u8);
        Ok(())
    }
}
