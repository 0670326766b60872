use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::primitives::{check_remaining, Address};

pub const ADDRESSES_MAX_COUNT: usize = 256;

const TYPE_NONE: u8 = 0;
const TYPE_ANY: u8 = 1;
const TYPE_ADDRESSES: u8 = 2;
const TYPE_MIN_FEE: u8 = 3;

/// What subset of announcements (blocks, transactions) the sender wants to
/// be forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    /// Receive nothing.
    None,
    /// Receive everything.
    Any,
    /// Only transactions touching one of these addresses.
    Addresses(Vec<Address>),
    /// Only transactions paying at least this fee per byte.
    MinFee(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeMessage {
    pub subscription: Subscription,
}

impl SubscribeMessage {
    pub(crate) fn unmarshal<B: Buf>(buf: &mut B) -> Result<Self> {
        check_remaining(buf, 1)?;
        let subscription = match buf.get_u8() {
            TYPE_NONE => Subscription::None,
            TYPE_ANY => Subscription::Any,
            TYPE_ADDRESSES => {
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
                Subscription::Addresses(addresses)
            }
            TYPE_MIN_FEE => {
                check_remaining(buf, 8)?;
                Subscription::MinFee(buf.get_u64())
            }
            other => return Err(Error::ErrInvalidEnumValue(other as u32)),
        };

        Ok(SubscribeMessage { subscription })
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        match &self.subscription {
            Subscription::None => writer.put_u8(TYPE_NONE),
            Subscription::Any => writer.put_u8(TYPE_ANY),
            Subscription::Addresses(addresses) => {
                if addresses.len() > ADDRESSES_MAX_COUNT {
                    return Err(Error::ErrVectorTooLong {
                        count: addresses.len(),
                        max: ADDRESSES_MAX_COUNT,
                    });
                }
                writer.put_u8(TYPE_ADDRESSES);
                writer.put_u16(addresses.len() as u16);
                for address in addresses {
                    address.marshal_to(writer);
                }
            }
            Subscription::MinFee(min_fee_per_byte) => {
                writer.put_u8(TYPE_MIN_FEE);
                writer.put_u64(*min_fee_per_byte);
            }
        }
        Ok(())
    }
}
