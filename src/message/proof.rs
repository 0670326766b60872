use bytes::{Buf, BufMut, BytesMut};

use super::accounts::{marshal_addresses, unmarshal_addresses};
use crate::error::{Error, Result};
use crate::primitives::{
    check_remaining, Address, Blake2bHash, BlockProof, ChainProof, TransactionsProof,
};

pub const RECEIPTS_MAX_COUNT: usize = 1000;

/// Chain proof response (GET_CHAIN_PROOF carries no payload).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainProofMessage {
    pub proof: ChainProof,
}

impl ChainProofMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(ChainProofMessage {
            proof: ChainProof::unmarshal(buf)?,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        self.proof.marshal_to(writer);
        Ok(())
    }
}

/// Requests an interlink proof that `block_hash_to_prove` is an ancestor of
/// `known_block_hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetBlockProofMessage {
    pub block_hash_to_prove: Blake2bHash,
    pub known_block_hash: Blake2bHash,
}

impl GetBlockProofMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(GetBlockProofMessage {
            block_hash_to_prove: Blake2bHash::unmarshal(buf)?,
            known_block_hash: Blake2bHash::unmarshal(buf)?,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        self.block_hash_to_prove.marshal_to(writer);
        self.known_block_hash.marshal_to(writer);
        Ok(())
    }
}

/// Block proof response. `proof` is absent when no connecting path exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockProofMessage {
    pub proof: Option<BlockProof>,
}

impl BlockProofMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        check_remaining(buf, 1)?;
        let proof = if buf.get_u8() != 0 {
            Some(BlockProof::unmarshal(buf)?)
        } else {
            None
        };

        Ok(BlockProofMessage { proof })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
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

/// Requests a Merkle proof for the transactions touching `addresses` in the
/// given block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetTransactionsProofMessage {
    pub block_hash: Blake2bHash,
    pub addresses: Vec<Address>,
}

impl GetTransactionsProofMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        let block_hash = Blake2bHash::unmarshal(buf)?;
        let addresses = unmarshal_addresses(buf)?;

        Ok(GetTransactionsProofMessage {
            block_hash,
            addresses,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        self.block_hash.marshal_to(writer);
        marshal_addresses(&self.addresses, writer)
    }
}

/// Transactions proof response. `proof` is absent when the block is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionsProofMessage {
    pub block_hash: Blake2bHash,
    pub proof: Option<TransactionsProof>,
}

impl TransactionsProofMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        let block_hash = Blake2bHash::unmarshal(buf)?;

        check_remaining(buf, 1)?;
        let proof = if buf.get_u8() != 0 {
            Some(TransactionsProof::unmarshal(buf)?)
        } else {
            None
        };

        Ok(TransactionsProofMessage { block_hash, proof })
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

/// Requests the transaction receipts for an address, paged by `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetTransactionReceiptsMessage {
    pub address: Address,
    pub offset: u32,
}

impl GetTransactionReceiptsMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        let address = Address::unmarshal(buf)?;
        check_remaining(buf, 4)?;
        let offset = buf.get_u32();

        Ok(GetTransactionReceiptsMessage { address, offset })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        self.address.marshal_to(writer);
        writer.put_u32(self.offset);
        Ok(())
    }
}

/// Pointer from a transaction to the block that contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: Blake2bHash,
    pub block_hash: Blake2bHash,
    pub block_height: u32,
}

impl TransactionReceipt {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        let transaction_hash = Blake2bHash::unmarshal(buf)?;
        let block_hash = Blake2bHash::unmarshal(buf)?;
        check_remaining(buf, 4)?;
        let block_height = buf.get_u32();

        Ok(TransactionReceipt {
            transaction_hash,
            block_hash,
            block_height,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        self.transaction_hash.marshal_to(writer);
        self.block_hash.marshal_to(writer);
        writer.put_u32(self.block_height);
    }
}

/// Transaction receipts response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceiptsMessage {
    pub receipts: Vec<TransactionReceipt>,
}

impl TransactionReceiptsMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        check_remaining(buf, 2)?;
        let count = buf.get_u16() as usize;
        if count > RECEIPTS_MAX_COUNT {
            return Err(Error::ErrVectorTooLong {
                count,
                max: RECEIPTS_MAX_COUNT,
            });
        }

        let mut receipts = Vec::with_capacity(count);
        for _ in 0..count {
            receipts.push(TransactionReceipt::unmarshal(buf)?);
        }

        Ok(TransactionReceiptsMessage { receipts })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        if self.receipts.len() > RECEIPTS_MAX_COUNT {
            return Err(Error::ErrVectorTooLong {
                count: self.receipts.len(),
                max: RECEIPTS_MAX_COUNT,
            });
        }

        writer.put_u16(self.receipts.len() as u16);
        for receipt in &self.receipts {
            receipt.marshal_to(writer);
        }
        Ok(())
    }
}
