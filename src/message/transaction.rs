use bytes::{Buf, BufMut, BytesMut};

use crate::error::Result;
use crate::primitives::{check_remaining, AccountsProof, Transaction};

/// Transaction relay. Light peers attach an accounts proof for the sender
/// account so nano clients can validate without chain state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxMessage {
    pub transaction: Transaction,
    pub accounts_proof: Option<AccountsProof>,
}

impl TxMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        let transaction = Transaction::unmarshal(buf)?;

        check_remaining(buf, 1)?;
        let accounts_proof = if buf.get_u8() != 0 {
            Some(AccountsProof::unmarshal(buf)?)
        } else {
            None
        };

        Ok(TxMessage {
            transaction,
            accounts_proof,
        })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        self.transaction.marshal_to(writer);
        match &self.accounts_proof {
            Some(proof) => {
                writer.put_u8(1);
                proof.marshal_to(writer);
            }
            None => writer.put_u8(0),
        }
        Ok(())
    }
}
