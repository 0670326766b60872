#[cfg(test)]
mod peer_channel_test;

pub mod close_type;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::data_channel::expectation::ExpectTimeoutHdlrFn;
use crate::data_channel::{DataChannel, OnErrorHdlrFn};
use crate::error::Result;
use crate::message::accounts::{
    AccountsProofMessage, AccountsTreeChunkMessage, GetAccountsProofMessage,
    GetAccountsTreeChunkMessage,
};
use crate::message::addr::{AddrMessage, GetAddrMessage};
use crate::message::block::{BlockMessage, HeadMessage, HeaderMessage};
use crate::message::inventory::{
    GetBlocksDirection, GetBlocksMessage, InvVector, InventoryMessage,
};
use crate::message::message_type::MessageType;
use crate::message::ping::{PingMessage, PongMessage};
use crate::message::proof::{
    BlockProofMessage, ChainProofMessage, GetBlockProofMessage, GetTransactionReceiptsMessage,
    GetTransactionsProofMessage, TransactionReceipt, TransactionReceiptsMessage,
    TransactionsProofMessage,
};
use crate::message::reject::{RejectCode, RejectMessage, REASON_MAX_LENGTH};
use crate::message::signal::SignalMessage;
use crate::message::subscribe::{SubscribeMessage, Subscription};
use crate::message::transaction::TxMessage;
use crate::message::version::{VerAckMessage, VersionMessage};
use crate::message::{self, Message};
use crate::primitives::{
    AccountsProof, AccountsTreeChunk, Address, Blake2bHash, Block, BlockHeader, BlockProof,
    ChainProof, PeerAddress, Transaction, TransactionsProof,
};

pub use close_type::CloseType;

pub type OnPeerMessageHdlrFn = Box<
    dyn (FnMut(Arc<Message>) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnMessageLogHdlrFn = Box<
    dyn (FnMut(MessageLog) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync,
>;

pub type OnPeerCloseHdlrFn = Box<
    dyn (FnMut(CloseType) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync,
>;

/// Fired after every successfully dispatched message, for traffic
/// accounting and debugging.
#[derive(Debug, Clone)]
pub struct MessageLog {
    pub message: Arc<Message>,
    /// Time spent between receipt of the full frame and dispatch completion.
    pub elapsed: Duration,
    pub byte_length: usize,
}

/// Typed facade over a [`DataChannel`]: one send method and one
/// subscription point per message variant.
///
/// The receive path parses every reassembled frame and applies the
/// malformed-message policy: a frame whose type cannot be determined closes
/// the channel, and a parse failure on a known type is answered with a
/// REJECT. A malformed REJECT closes the channel instead, so two buggy
/// peers cannot bounce rejects at each other forever.
#[derive(Clone)]
pub struct PeerChannel {
    channel: DataChannel,
    handlers: Arc<Mutex<HashMap<MessageType, Vec<OnPeerMessageHdlrFn>>>>,
    on_message_log_handler: Arc<Mutex<Option<OnMessageLogHdlrFn>>>,
    on_close_handler: Arc<Mutex<Option<OnPeerCloseHdlrFn>>>,
    on_error_handler: Arc<Mutex<Option<OnErrorHdlrFn>>>,
    close_type: Arc<AtomicU8>,
}

impl PeerChannel {
    /// Wraps a data channel, taking over its message, error and close
    /// events. One peer channel per connected peer, for the lifetime of the
    /// underlying channel.
    pub async fn new(channel: DataChannel) -> Self {
        let peer_channel = PeerChannel {
            channel: channel.clone(),
            handlers: Arc::new(Mutex::new(HashMap::new())),
            on_message_log_handler: Arc::new(Mutex::new(None)),
            on_close_handler: Arc::new(Mutex::new(None)),
            on_error_handler: Arc::new(Mutex::new(None)),
            close_type: Arc::new(AtomicU8::new(CloseType::ClosedByRemote as u8)),
        };

        {
            let channel = peer_channel.channel.clone();
            let handlers = Arc::clone(&peer_channel.handlers);
            let log_handler = Arc::clone(&peer_channel.on_message_log_handler);
            let close_type = Arc::clone(&peer_channel.close_type);
            peer_channel
                .channel
                .on_message(Box::new(move |bytes: Bytes| {
                    let channel = channel.clone();
                    let handlers = Arc::clone(&handlers);
                    let log_handler = Arc::clone(&log_handler);
                    let close_type = Arc::clone(&close_type);
                    Box::pin(async move {
                        PeerChannel::handle_message(channel, handlers, log_handler, close_type, bytes)
                            .await;
                    })
                }))
                .await;
        }

        {
            let close_type = Arc::clone(&peer_channel.close_type);
            let on_error_handler = Arc::clone(&peer_channel.on_error_handler);
            peer_channel
                .channel
                .on_error(Box::new(move |err| {
                    let close_type = Arc::clone(&close_type);
                    let on_error_handler = Arc::clone(&on_error_handler);
                    Box::pin(async move {
                        close_type.store(CloseType::NetworkError as u8, Ordering::SeqCst);
                        let mut handler = on_error_handler.lock().await;
                        if let Some(f) = &mut *handler {
                            f(err).await;
                        }
                    })
                }))
                .await;
        }

        {
            let close_type = Arc::clone(&peer_channel.close_type);
            let on_close_handler = Arc::clone(&peer_channel.on_close_handler);
            peer_channel
                .channel
                .on_close(Box::new(move || {
                    let close_type = Arc::clone(&close_type);
                    let on_close_handler = Arc::clone(&on_close_handler);
                    Box::pin(async move {
                        let ty = CloseType::from(close_type.load(Ordering::SeqCst));
                        let mut handler = on_close_handler.lock().await;
                        if let Some(f) = &mut *handler {
                            f(ty).await;
                        }
                    })
                }))
                .await;
        }

        peer_channel
    }

    async fn handle_message(
        channel: DataChannel,
        handlers: Arc<Mutex<HashMap<MessageType, Vec<OnPeerMessageHdlrFn>>>>,
        log_handler: Arc<Mutex<Option<OnMessageLogHdlrFn>>>,
        close_type: Arc<AtomicU8>,
        bytes: Bytes,
    ) {
        let received_at = Instant::now();

        let typ = match message::peek_type(&bytes) {
            Ok(typ) => typ,
            Err(err) => {
                log::warn!("failed to peek message type, closing channel: {err}");
                close_type.store(CloseType::FailedToParseMessageType as u8, Ordering::SeqCst);
                let _ = channel.close().await;
                return;
            }
        };

        let parsed = match Message::unmarshal(&bytes) {
            Ok(message) => message,
            Err(err) => {
                channel.confirm_expected_message(typ, false).await;

                if typ == MessageType::Reject {
                    // a malformed REJECT must never be answered with
                    // another REJECT
                    log::warn!("failed to parse reject message, closing channel: {err}");
                    close_type.store(CloseType::FailedToParseMessageType as u8, Ordering::SeqCst);
                    let _ = channel.close().await;
                    return;
                }

                log::warn!("rejecting malformed {typ} message: {err}");
                let mut reason = err.to_string();
                reason.truncate(REASON_MAX_LENGTH);
                let reject = Message::Reject(RejectMessage {
                    message_type: typ.into(),
                    code: RejectCode::Malformed,
                    reason,
                    extra_data: Bytes::new(),
                });
                match reject.marshal() {
                    Ok(raw) => {
                        if let Err(err) = channel.send(&raw).await {
                            log::debug!("failed to send reject: {err}");
                        }
                    }
                    Err(err) => log::error!("failed to serialize reject: {err}"),
                }
                return;
            }
        };

        channel.confirm_expected_message(typ, true).await;

        let parsed = Arc::new(parsed);
        {
            let mut handlers = handlers.lock().await;
            if let Some(list) = handlers.get_mut(&typ) {
                for f in list.iter_mut() {
                    if let Err(err) = f(Arc::clone(&parsed)).await {
                        log::error!("{typ} handler failed: {err}");
                    }
                }
            }
        }

        {
            let mut handler = log_handler.lock().await;
            if let Some(f) = &mut *handler {
                f(MessageLog {
                    message: Arc::clone(&parsed),
                    elapsed: received_at.elapsed(),
                    byte_length: bytes.len(),
                })
                .await;
            }
        }
    }

    /// The framing channel underneath this facade.
    pub fn data_channel(&self) -> &DataChannel {
        &self.channel
    }

    /// Registers a handler for all received messages of the given type.
    /// Handler failures are logged and never close the channel.
    pub async fn on(&self, typ: MessageType, f: OnPeerMessageHdlrFn) {
        let mut handlers = self.handlers.lock().await;
        handlers.entry(typ).or_default().push(f);
    }

    /// on_message_log sets the handler fired after every dispatched message.
    pub async fn on_message_log(&self, f: OnMessageLogHdlrFn) {
        let mut handler = self.on_message_log_handler.lock().await;
        *handler = Some(f);
    }

    /// on_close sets the handler invoked exactly once with the close reason.
    pub async fn on_close(&self, f: OnPeerCloseHdlrFn) {
        let mut handler = self.on_close_handler.lock().await;
        *handler = Some(f);
    }

    /// on_error sets the handler invoked on channel-level protocol
    /// violations, right before the channel closes.
    pub async fn on_error(&self, f: OnErrorHdlrFn) {
        let mut handler = self.on_error_handler.lock().await;
        *handler = Some(f);
    }

    /// Closes the channel with the given reason code.
    pub async fn close(&self, ty: CloseType) {
        self.close_type.store(ty as u8, Ordering::SeqCst);
        let _ = self.channel.close().await;
    }

    /// Registers the intent to receive one of `types`; see
    /// [`DataChannel::expect_message`].
    pub async fn expect_message(
        &self,
        types: &[MessageType],
        timeout_callback: ExpectTimeoutHdlrFn,
        msg_timeout: Option<Duration>,
        chunk_timeout: Option<Duration>,
    ) {
        self.channel
            .expect_message(types, timeout_callback, msg_timeout, chunk_timeout)
            .await;
    }

    pub async fn is_expecting_message(&self, typ: MessageType) -> bool {
        self.channel.is_expecting_message(typ).await
    }

    async fn send_message(&self, message: Message) -> bool {
        let raw = match message.marshal() {
            Ok(raw) => raw,
            Err(err) => {
                log::error!(
                    "failed to serialize {} message: {err}",
                    message.message_type()
                );
                return false;
            }
        };

        match self.channel.send(&raw).await {
            Ok(()) => true,
            Err(err) => {
                log::debug!("failed to send {} message: {err}", message.message_type());
                false
            }
        }
    }

    pub async fn version(&self, msg: VersionMessage) -> bool {
        self.send_message(Message::Version(msg)).await
    }

    pub async fn verack(&self, msg: VerAckMessage) -> bool {
        self.send_message(Message::VerAck(msg)).await
    }

    pub async fn inv(&self, vectors: Vec<InvVector>) -> bool {
        self.send_message(Message::Inv(InventoryMessage { vectors }))
            .await
    }

    pub async fn get_data(&self, vectors: Vec<InvVector>) -> bool {
        self.send_message(Message::GetData(InventoryMessage { vectors }))
            .await
    }

    pub async fn get_header(&self, vectors: Vec<InvVector>) -> bool {
        self.send_message(Message::GetHeader(InventoryMessage { vectors }))
            .await
    }

    pub async fn not_found(&self, vectors: Vec<InvVector>) -> bool {
        self.send_message(Message::NotFound(InventoryMessage { vectors }))
            .await
    }

    pub async fn get_blocks(
        &self,
        locators: Vec<Blake2bHash>,
        max_inv_size: u16,
        direction: GetBlocksDirection,
    ) -> bool {
        self.send_message(Message::GetBlocks(GetBlocksMessage {
            locators,
            max_inv_size,
            direction,
        }))
        .await
    }

    pub async fn block(&self, block: Block) -> bool {
        self.send_message(Message::Block(BlockMessage { block }))
            .await
    }

    /// Sends an already-serialized block without re-encoding it.
    pub async fn raw_block(&self, raw: Bytes) -> bool {
        self.send_message(Message::Block(BlockMessage {
            block: Block(raw),
        }))
        .await
    }

    pub async fn header(&self, header: BlockHeader) -> bool {
        self.send_message(Message::Header(HeaderMessage { header }))
            .await
    }

    pub async fn tx(&self, transaction: Transaction, accounts_proof: Option<AccountsProof>) -> bool {
        self.send_message(Message::Tx(TxMessage {
            transaction,
            accounts_proof,
        }))
        .await
    }

    pub async fn mempool(&self) -> bool {
        self.send_message(Message::Mempool).await
    }

    pub async fn reject(&self, message_type: MessageType, code: RejectCode, reason: &str) -> bool {
        let mut reason = reason.to_owned();
        reason.truncate(REASON_MAX_LENGTH);
        self.send_message(Message::Reject(RejectMessage {
            message_type: message_type.into(),
            code,
            reason,
            extra_data: Bytes::new(),
        }))
        .await
    }

    pub async fn subscribe(&self, subscription: Subscription) -> bool {
        self.send_message(Message::Subscribe(SubscribeMessage { subscription }))
            .await
    }

    pub async fn addr(&self, addresses: Vec<PeerAddress>) -> bool {
        self.send_message(Message::Addr(AddrMessage { addresses }))
            .await
    }

    pub async fn get_addr(&self, protocol_mask: u8, service_mask: u32, max_results: u16) -> bool {
        self.send_message(Message::GetAddr(GetAddrMessage {
            protocol_mask,
            service_mask,
            max_results,
        }))
        .await
    }

    pub async fn ping(&self, nonce: u32) -> bool {
        self.send_message(Message::Ping(PingMessage { nonce })).await
    }

    pub async fn pong(&self, nonce: u32) -> bool {
        self.send_message(Message::Pong(PongMessage { nonce })).await
    }

    pub async fn signal(&self, msg: SignalMessage) -> bool {
        self.send_message(Message::Signal(msg)).await
    }

    pub async fn get_chain_proof(&self) -> bool {
        self.send_message(Message::GetChainProof).await
    }

    pub async fn chain_proof(&self, proof: ChainProof) -> bool {
        self.send_message(Message::ChainProof(ChainProofMessage { proof }))
            .await
    }

    pub async fn get_accounts_proof(
        &self,
        block_hash: Blake2bHash,
        addresses: Vec<Address>,
    ) -> bool {
        self.send_message(Message::GetAccountsProof(GetAccountsProofMessage {
            block_hash,
            addresses,
        }))
        .await
    }

    pub async fn accounts_proof(
        &self,
        block_hash: Blake2bHash,
        proof: Option<AccountsProof>,
    ) -> bool {
        self.send_message(Message::AccountsProof(AccountsProofMessage {
            block_hash,
            proof,
        }))
        .await
    }

    pub async fn get_accounts_tree_chunk(
        &self,
        block_hash: Blake2bHash,
        start_prefix: &str,
    ) -> bool {
        self.send_message(Message::GetAccountsTreeChunk(GetAccountsTreeChunkMessage {
            block_hash,
            start_prefix: start_prefix.to_owned(),
        }))
        .await
    }

    pub async fn accounts_tree_chunk(
        &self,
        block_hash: Blake2bHash,
        chunk: Option<AccountsTreeChunk>,
    ) -> bool {
        self.send_message(Message::AccountsTreeChunk(AccountsTreeChunkMessage {
            block_hash,
            chunk,
        }))
        .await
    }

    pub async fn get_transactions_proof(
        &self,
        block_hash: Blake2bHash,
        addresses: Vec<Address>,
    ) -> bool {
        self.send_message(Message::GetTransactionsProof(GetTransactionsProofMessage {
            block_hash,
            addresses,
        }))
        .await
    }

    pub async fn transactions_proof(
        &self,
        block_hash: Blake2bHash,
        proof: Option<TransactionsProof>,
    ) -> bool {
        self.send_message(Message::TransactionsProof(TransactionsProofMessage {
            block_hash,
            proof,
        }))
        .await
    }

    pub async fn get_transaction_receipts(&self, address: Address, offset: u32) -> bool {
        self.send_message(Message::GetTransactionReceipts(
            GetTransactionReceiptsMessage { address, offset },
        ))
        .await
    }

    pub async fn transaction_receipts(&self, receipts: Vec<TransactionReceipt>) -> bool {
        self.send_message(Message::TransactionReceipts(TransactionReceiptsMessage {
            receipts,
        }))
        .await
    }

    pub async fn get_block_proof(
        &self,
        block_hash_to_prove: Blake2bHash,
        known_block_hash: Blake2bHash,
    ) -> bool {
        self.send_message(Message::GetBlockProof(GetBlockProofMessage {
            block_hash_to_prove,
            known_block_hash,
        }))
        .await
    }

    pub async fn block_proof(&self, proof: Option<BlockProof>) -> bool {
        self.send_message(Message::BlockProof(BlockProofMessage { proof }))
            .await
    }

    pub async fn get_head(&self) -> bool {
        self.send_message(Message::GetHead).await
    }

    pub async fn head(&self, header: BlockHeader) -> bool {
        self.send_message(Message::Head(HeadMessage { header })).await
    }
}

impl fmt::Debug for PeerChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerChannel")
            .field("channel", &self.channel)
            .finish()
    }
}
