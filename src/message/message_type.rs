use std::fmt;

use crate::error::Error;

/// Wire constant identifying the payload layout of a message.
///
/// The numeric values are part of the wire format and must never be
/// reassigned. Gaps are types retired before the current protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Version = 0,
    Inv = 1,
    GetData = 2,
    GetHeader = 3,
    NotFound = 4,
    GetBlocks = 5,
    Block = 6,
    Header = 7,
    Tx = 8,
    Mempool = 9,
    Reject = 10,
    Subscribe = 11,

    Addr = 20,
    GetAddr = 21,
    Ping = 22,
    Pong = 23,

    Signal = 30,

    GetChainProof = 40,
    ChainProof = 41,
    GetAccountsProof = 42,
    AccountsProof = 43,
    GetAccountsTreeChunk = 44,
    AccountsTreeChunk = 45,
    GetTransactionsProof = 47,
    TransactionsProof = 48,
    GetTransactionReceipts = 49,
    TransactionReceipts = 50,
    GetBlockProof = 51,
    BlockProof = 52,
    GetHead = 53,
    Head = 54,

    VerAck = 90,
}

impl TryFrom<u8> for MessageType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        match value {
            0 => Ok(MessageType::Version),
            1 => Ok(MessageType::Inv),
            2 => Ok(MessageType::GetData),
            3 => Ok(MessageType::GetHeader),
            4 => Ok(MessageType::NotFound),
            5 => Ok(MessageType::GetBlocks),
            6 => Ok(MessageType::Block),
            7 => Ok(MessageType::Header),
            8 => Ok(MessageType::Tx),
            9 => Ok(MessageType::Mempool),
            10 => Ok(MessageType::Reject),
            11 => Ok(MessageType::Subscribe),
            20 => Ok(MessageType::Addr),
            21 => Ok(MessageType::GetAddr),
            22 => Ok(MessageType::Ping),
            23 => Ok(MessageType::Pong),
            30 => Ok(MessageType::Signal),
            40 => Ok(MessageType::GetChainProof),
            41 => Ok(MessageType::ChainProof),
            42 => Ok(MessageType::GetAccountsProof),
            43 => Ok(MessageType::AccountsProof),
            44 => Ok(MessageType::GetAccountsTreeChunk),
            45 => Ok(MessageType::AccountsTreeChunk),
            47 => Ok(MessageType::GetTransactionsProof),
            48 => Ok(MessageType::TransactionsProof),
            49 => Ok(MessageType::GetTransactionReceipts),
            50 => Ok(MessageType::TransactionReceipts),
            51 => Ok(MessageType::GetBlockProof),
            52 => Ok(MessageType::BlockProof),
            53 => Ok(MessageType::GetHead),
            54 => Ok(MessageType::Head),
            90 => Ok(MessageType::VerAck),
            other => Err(Error::ErrUnknownMessageType(other)),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(typ: MessageType) -> u8 {
        typ as u8
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageType::Version => "version",
            MessageType::Inv => "inv",
            MessageType::GetData => "get-data",
            MessageType::GetHeader => "get-header",
            MessageType::NotFound => "not-found",
            MessageType::GetBlocks => "get-blocks",
            MessageType::Block => "block",
            MessageType::Header => "header",
            MessageType::Tx => "tx",
            MessageType::Mempool => "mempool",
            MessageType::Reject => "reject",
            MessageType::Subscribe => "subscribe",
            MessageType::Addr => "addr",
            MessageType::GetAddr => "get-addr",
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
            MessageType::Signal => "signal",
            MessageType::GetChainProof => "get-chain-proof",
            MessageType::ChainProof => "chain-proof",
            MessageType::GetAccountsProof => "get-accounts-proof",
            MessageType::AccountsProof => "accounts-proof",
            MessageType::GetAccountsTreeChunk => "get-accounts-tree-chunk",
            MessageType::AccountsTreeChunk => "accounts-tree-chunk",
            MessageType::GetTransactionsProof => "get-transactions-proof",
            MessageType::TransactionsProof => "transactions-proof",
            MessageType::GetTransactionReceipts => "get-transaction-receipts",
            MessageType::TransactionReceipts => "transaction-receipts",
            MessageType::GetBlockProof => "get-block-proof",
            MessageType::BlockProof => "block-proof",
            MessageType::GetHead => "get-head",
            MessageType::Head => "head",
            MessageType::VerAck => "verack",
        };
        write!(f, "{s}")
    }
}
