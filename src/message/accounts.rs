use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::primitives::{
    check_remaining, get_var_string, put_var_string, AccountsProof, AccountsTreeChunk, Address,
    Blake2bHash,
};

pub const ADDRESSES_MAX_COUNT: usize = 256;

/// Requests a Merkle proof for a set of accounts at a given block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAccountsProofMessage {
    pub block_hash: Blake2bHash,
    pub addresses: Vec<Address>,
}

impl GetAccountsProofMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        let block_hash = Blake2bHash::unmarshal(buf)?;
        let addresses = unmarshal_addresses(buf)?;

        Ok(GetAccountsProofMessage {
            block_hash,
            addresses,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        self.block_hash.marshal_to(writer);
        marshal_addresses(&self.addresses, writer)
    }
}

/// Accounts proof response. `proof` is absent when the block is unknown or
/// pruned on the responding peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountsProofMessage {
    pub block_hash: Blake2bHash,
    pub proof: Option<AccountsProof>,
}

impl AccountsProofMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        let block_hash = Blake2bHash::unmarshal(buf)?;

        check_remaining(buf, 1)?;
        let proof = if buf.get_u8() != 0 {
            Some(AccountsProof::unmarshal(buf)?)
        } else {
            None
        };

        Ok(AccountsProofMessage { block_hash, proof })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        self.block_hash.marshal_to(writer);
        match &self.proof {
            Some(proof) => {
                writer.put_u8(1);
                proof.marshal_to(writer);
            }
            None => writer.put_u8(0),
        }
        Ok(())
    }
}

/// Requests the accounts-tree slice starting at `start_prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAccountsTreeChunkMessage {
    pub block_hash: Blake2bHash,
    pub start_prefix: String,
}

impl GetAccountsTreeChunkMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        let block_hash = Blake2bHash::unmarshal(buf)?;
        let start_prefix = get_var_string(buf)?;

        Ok(GetAccountsTreeChunkMessage {
            block_hash,
            start_prefix,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        self.block_hash.marshal_to(writer);
        put_var_string(writer, &self.start_prefix);
        Ok(())
    }
}

/// Accounts-tree chunk response. `chunk` is absent when the block is
/// unknown on the responding peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountsTreeChunkMessage {
    pub block_hash: Blake2bHash,
    pub chunk: Option<AccountsTreeChunk>,
}

impl AccountsTreeChunkMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        let block_hash = Blake2bHash::unmarshal(buf)?;

        check_remaining(buf, 1)?;
        let chunk = if buf.get_u8() != 0 {
            Some(AccountsTreeChunk::unmarshal(buf)?)
        } else {
            None
        };

        Ok(AccountsTreeChunkMessage { block_hash, chunk })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        self.block_hash.marshal_to(writer);
        match &self.chunk {
            Some(chunk) => {
                writer.put_u8(1);
                chunk.marshal_to(writer);
            }
            None => writer.put_u8(0),
        }
        Ok(())
    }
}

pub(crate) fn unmarshal_addresses<B: Buf>(buf: &mut B) -> Result<Vec<Address>> {
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
        addresses.push(Address::unmarshal(buf)?);
    }
    Ok(addresses)
}

pub(crate) fn marshal_addresses(addresses: &[Address], writer: &mut BytesMut) -> Result<()> {
    if addresses.len() > ADDRESSES_MAX_COUNT {
        return Err(Error::ErrVectorTooLong {
            count: addresses.len(),
            max: ADDRESSES_MAX_COUNT,
        });
    }

    writer.put_u16(addresses.len() as u16);
    for address in addresses {
        address.marshal_to(writer);
    }
    Ok(())
}
