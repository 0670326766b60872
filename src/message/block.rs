use bytes::{Buf, BytesMut};

use crate::error::Result;
use crate::primitives::{Block, BlockHeader};

/// Full block, in response to GET_DATA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMessage {
    pub block: Block,
}

impl BlockMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(BlockMessage {
            block: Block::unmarshal(buf)?,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        self.block.marshal_to(writer);
        Ok(())
    }
}

/// Block header only, in response to GET_HEADER.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMessage {
    pub header: BlockHeader,
}

impl HeaderMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(HeaderMessage {
            header: BlockHeader::unmarshal(buf)?,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        self.header.marshal_to(writer);
        Ok(())
    }
}

/// Current chain head, in response to GET_HEAD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadMessage {
    pub header: BlockHeader,
}

impl HeadMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(HeadMessage {
            header: BlockHeader::unmarshal(buf)?,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        self.header.marshal_to(writer);
        Ok(())
    }
}
