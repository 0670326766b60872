
pub mod expectation;
pub(crate) mod timer;
pub mod transport;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use portable_atomic::AtomicUsize;
use tokio::sync::Mutex;

use expectation::{expectation_id, ExpectTimeoutHdlrFn, ExpectedMessage};
use timer::{TimeoutFollowUp, TimeoutObserver, Timers};

use crate::error::{Error, Result};
use crate::message;
use crate::message::message_type::MessageType;

pub use transport::ChunkTransport;

/// Maximum size of one wire chunk, tag byte included.
pub const CHUNK_SIZE_MAX: usize = 1 << 14;

/// Maximum size of one whole message. Anything larger is refused before a
/// reassembly buffer is allocated.
pub const MESSAGE_SIZE_MAX: usize = 10 * 1024 * 1024;

/// Maximum time between successive chunks of an expected message.
pub const CHUNK_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum time between registering an expectation and the full message
/// arriving: the worst case of a full-size message trickling in at one
/// chunk per `CHUNK_TIMEOUT`.
pub const MESSAGE_TIMEOUT: Duration =
    Duration::from_secs((MESSAGE_SIZE_MAX / CHUNK_SIZE_MAX) as u64 * 5);

/// Modulus of the per-message tag counter. The historical value is
/// `u8::MAX`, not 256: tags run 0..=254 and the wrap is asymmetric. This is
/// load-bearing for wire compatibility and must not be "fixed".
pub(crate) const TAG_MODULUS: u8 = u8::MAX;

/// Message bytes carried by one chunk (one byte goes to the tag).
const CHUNK_PAYLOAD_MAX: usize = CHUNK_SIZE_MAX - 1;

/// Lifecycle of a channel (and of the transport underneath it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    Open = 0,
    Closing = 1,
    Closed = 2,
}

impl From<u8> for ChannelState {
    fn from(value: u8) -> Self {
        match value {
            0 => ChannelState::Open,
            1 => ChannelState::Closing,
            _ => ChannelState::Closed,
        }
    }
}

pub type OnMessageHdlrFn = Box<
    dyn (FnMut(Bytes) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync,
>;

pub type OnChunkHdlrFn = Box<
    dyn (FnMut(Bytes) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync,
>;

pub type OnCloseHdlrFn =
    Box<dyn (FnMut() -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync>;

pub type OnErrorHdlrFn = Box<
    dyn (FnMut(Error) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync,
>;

/// In-flight inbound message. There is at most one at any time.
struct ReassemblyBuffer {
    buf: BytesMut,
    /// Total frame size announced by the message header.
    declared: usize,
    /// Peeked frame type; `None` when the type byte is unknown to the codec
    /// (the message still assembles; rejection is the peer channel's job).
    msg_type: Option<MessageType>,
    tag: u8,
}

struct DataChannelInternal {
    sending_tag: u8,
    /// Tag of the last message whose first chunk was accepted; `None` until
    /// the first message. The next message must carry the successor tag.
    receiving_tag: Option<u8>,
    buffer: Option<ReassemblyBuffer>,
    expectations: HashMap<String, ExpectedMessage>,
    expected_by_type: HashMap<MessageType, String>,
    timers: Timers<DataChannelInternal>,
    last_chunk_received_at: Option<SystemTime>,
}

enum ChunkOutcome {
    /// A whole message finished assembling.
    Message(Bytes),
    /// A partial chunk was appended; carries the buffer so far.
    Chunk(Bytes),
    /// Protocol violation; the channel must error and close.
    Fatal(Error),
}

/// Chunked reliable delivery of whole messages over a lossy, ordered,
/// message-preserving transport.
///
/// Outbound messages are split into tagged chunks of at most
/// [`CHUNK_SIZE_MAX`] bytes; inbound chunks are reassembled under a strict
/// no-interleaving regime where any deviation closes the channel. Callers
/// register message expectations to get timeout callbacks for the
/// request/response flows layered on top.
#[derive(Clone)]
pub struct DataChannel {
    state: Arc<AtomicU8>,
    internal: Arc<Mutex<DataChannelInternal>>,
    transport: Arc<dyn ChunkTransport + Send + Sync>,

    on_message_handler: Arc<Mutex<Option<OnMessageHdlrFn>>>,
    on_chunk_handler: Arc<Mutex<Option<OnChunkHdlrFn>>>,
    on_close_handler: Arc<Mutex<Option<OnCloseHdlrFn>>>,
    on_error_handler: Arc<Mutex<Option<OnErrorHdlrFn>>>,

    // stats
    messages_sent: Arc<AtomicUsize>,
    messages_received: Arc<AtomicUsize>,
    bytes_sent: Arc<AtomicUsize>,
    bytes_received: Arc<AtomicUsize>,
}

impl DataChannel {
    /// Wraps an already-open transport. The channel starts out Open.
    pub fn new(transport: Arc<dyn ChunkTransport + Send + Sync>) -> Self {
        let internal = Arc::new_cyclic(|weak| {
            Mutex::new(DataChannelInternal {
                sending_tag: 0,
                receiving_tag: None,
                buffer: None,
                expectations: HashMap::new(),
                expected_by_type: HashMap::new(),
                timers: Timers::new(weak.clone()),
                last_chunk_received_at: None,
            })
        });

        DataChannel {
            state: Arc::new(AtomicU8::new(ChannelState::Open as u8)),
            internal,
            transport,
            on_message_handler: Arc::new(Mutex::new(None)),
            on_chunk_handler: Arc::new(Mutex::new(None)),
            on_close_handler: Arc::new(Mutex::new(None)),
            on_error_handler: Arc::new(Mutex::new(None)),
            messages_sent: Arc::new(AtomicUsize::default()),
            messages_received: Arc::new(AtomicUsize::default()),
            bytes_sent: Arc::new(AtomicUsize::default()),
            bytes_received: Arc::new(AtomicUsize::default()),
        }
    }

    pub fn ready_state(&self) -> ChannelState {
        ChannelState::from(self.state.load(Ordering::SeqCst))
    }

    /// on_message sets the handler invoked with the bytes of each fully
    /// reassembled message, in receipt order.
    pub async fn on_message(&self, f: OnMessageHdlrFn) {
        let mut handler = self.on_message_handler.lock().await;
        *handler = Some(f);
    }

    /// on_chunk sets the handler invoked with the partial reassembly buffer
    /// after every non-final chunk.
    pub async fn on_chunk(&self, f: OnChunkHdlrFn) {
        let mut handler = self.on_chunk_handler.lock().await;
        *handler = Some(f);
    }

    /// on_close sets the handler invoked exactly once when the channel
    /// closes. All handlers are detached afterwards.
    pub async fn on_close(&self, f: OnCloseHdlrFn) {
        let mut handler = self.on_close_handler.lock().await;
        *handler = Some(f);
    }

    /// on_error sets the handler invoked on protocol violations, right
    /// before the channel closes.
    pub async fn on_error(&self, f: OnErrorHdlrFn) {
        let mut handler = self.on_error_handler.lock().await;
        *handler = Some(f);
    }

    /// Splits `msg` into tagged chunks and hands them to the transport.
    ///
    /// Chunks of one message are emitted back to back under the channel
    /// lock, so concurrent sends cannot interleave on the wire.
    pub async fn send(&self, msg: &Bytes) -> Result<()> {
        if msg.len() > MESSAGE_SIZE_MAX {
            log::error!(
                "attempted to send a message of {} bytes (max {})",
                msg.len(),
                MESSAGE_SIZE_MAX
            );
            return Err(Error::ErrMessageTooLarge {
                size: msg.len(),
                max: MESSAGE_SIZE_MAX,
            });
        }
        if self.ready_state() != ChannelState::Open {
            return Err(Error::ErrChannelNotOpen);
        }

        let mut internal = self.internal.lock().await;

        let tag = internal.sending_tag;
        internal.sending_tag = (tag + 1) % TAG_MODULUS;

        let mut offset = 0;
        while offset < msg.len() {
            let take = std::cmp::min(CHUNK_PAYLOAD_MAX, msg.len() - offset);
            let mut chunk = BytesMut::with_capacity(take + 1);
            chunk.extend_from_slice(&[tag]);
            chunk.extend_from_slice(&msg[offset..offset + take]);
            self.transport.send_chunk(chunk.freeze()).await?;
            offset += take;
        }

        self.messages_sent.fetch_add(1, Ordering::SeqCst);
        self.bytes_sent.fetch_add(msg.len(), Ordering::SeqCst);
        Ok(())
    }

    /// Feeds one received wire chunk into the reassembly state machine.
    /// Transport adapters call this from their binary message callback.
    pub async fn handle_chunk(&self, chunk: Bytes) {
        if self.ready_state() != ChannelState::Open {
            log::trace!("discarding chunk received while channel is not open");
            return;
        }
        if chunk.is_empty() {
            log::debug!("discarding empty chunk");
            return;
        }

        self.bytes_received.fetch_add(chunk.len(), Ordering::SeqCst);

        let outcome = {
            let mut internal = self.internal.lock().await;
            internal.process_chunk(&chunk)
        };

        match outcome {
            ChunkOutcome::Message(bytes) => {
                self.messages_received.fetch_add(1, Ordering::SeqCst);
                // the handler slot is emptied for the duration of the call:
                // handlers may close the channel, and close() takes these
                // same locks to detach listeners
                let handler = self.on_message_handler.lock().await.take();
                if let Some(mut f) = handler {
                    f(bytes).await;
                    self.restore_handler(&self.on_message_handler, f).await;
                }
            }
            ChunkOutcome::Chunk(partial) => {
                let handler = self.on_chunk_handler.lock().await.take();
                if let Some(mut f) = handler {
                    f(partial).await;
                    self.restore_handler(&self.on_chunk_handler, f).await;
                }
            }
            ChunkOutcome::Fatal(err) => {
                log::error!("closing channel: {err}");
                let handler = self.on_error_handler.lock().await.take();
                if let Some(mut f) = handler {
                    f(err.clone()).await;
                    self.restore_handler(&self.on_error_handler, f).await;
                }
                let _ = self.close().await;
            }
        }
    }

    /// Puts a handler back into its slot after an invocation, unless the
    /// channel closed or a new handler was registered in the meantime.
    async fn restore_handler<F>(&self, slot: &Arc<Mutex<Option<F>>>, f: F) {
        if self.ready_state() != ChannelState::Open {
            return;
        }
        let mut slot = slot.lock().await;
        if slot.is_none() {
            *slot = Some(f);
        }
    }

    /// Registers the intent to receive one of `types`, arming the message
    /// timer (and, once chunks start arriving, the chunk timer). A new
    /// expectation sharing a type with an existing one displaces it for
    /// that type.
    ///
    /// `msg_timeout` and `chunk_timeout` default to [`MESSAGE_TIMEOUT`] and
    /// [`CHUNK_TIMEOUT`].
    pub async fn expect_message(
        &self,
        types: &[MessageType],
        timeout_callback: ExpectTimeoutHdlrFn,
        msg_timeout: Option<Duration>,
        chunk_timeout: Option<Duration>,
    ) {
        let mut internal = self.internal.lock().await;
        internal.expect(
            types,
            timeout_callback,
            msg_timeout.unwrap_or(MESSAGE_TIMEOUT),
            chunk_timeout.unwrap_or(CHUNK_TIMEOUT),
        );
    }

    /// Resolves the expectation registered under `typ`, cancelling both of
    /// its timers. With `success = false` the expectation's timeout
    /// callback is invoked. No-op when nothing is expected under `typ`.
    pub async fn confirm_expected_message(&self, typ: MessageType, success: bool) {
        let callback = {
            let mut internal = self.internal.lock().await;
            internal.confirm(typ, success)
        };
        if let Some(mut callback) = callback {
            callback().await;
        }
    }

    pub async fn is_expecting_message(&self, typ: MessageType) -> bool {
        let internal = self.internal.lock().await;
        internal.expected_by_type.contains_key(&typ)
    }

    /// Closes the channel and the transport underneath it. Idempotent: the
    /// close event fires exactly once and no events fire afterwards.
    pub async fn close(&self) -> Result<()> {
        if self
            .state
            .compare_exchange(
                ChannelState::Open as u8,
                ChannelState::Closing as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return Ok(());
        }

        if let Err(err) = self.transport.close().await {
            log::warn!("transport close failed: {err}");
        }

        {
            let mut internal = self.internal.lock().await;
            internal.timers.clear_all();
            internal.expectations.clear();
            internal.expected_by_type.clear();
            internal.buffer = None;
        }

        self.state
            .store(ChannelState::Closed as u8, Ordering::SeqCst);

        let on_close = self.on_close_handler.lock().await.take();
        if let Some(mut f) = on_close {
            f().await;
        }

        // detach the remaining listeners; nothing fires after close
        *self.on_message_handler.lock().await = None;
        *self.on_chunk_handler.lock().await = None;
        *self.on_error_handler.lock().await = None;

        Ok(())
    }

    /// Wall-clock time at which the last chunk was accepted.
    pub async fn last_chunk_received_at(&self) -> Option<SystemTime> {
        let internal = self.internal.lock().await;
        internal.last_chunk_received_at
    }

    /// MessagesSent returns the number of messages sent
    pub fn messages_sent(&self) -> usize {
        self.messages_sent.load(Ordering::SeqCst)
    }

    /// MessagesReceived returns the number of messages received
    pub fn messages_received(&self) -> usize {
        self.messages_received.load(Ordering::SeqCst)
    }

    /// BytesSent returns the number of bytes sent
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent.load(Ordering::SeqCst)
    }

    /// BytesReceived returns the number of bytes received
    pub fn bytes_received(&self) -> usize {
        self.bytes_received.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for DataChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataChannel")
            .field("state", &self.ready_state())
            .field("messages_sent", &self.messages_sent())
            .field("messages_received", &self.messages_received())
            .finish()
    }
}

impl DataChannelInternal {
    fn process_chunk(&mut self, chunk: &Bytes) -> ChunkOutcome {
        if chunk.len() > CHUNK_SIZE_MAX {
            return ChunkOutcome::Fatal(Error::ErrChunkTooLarge {
                size: chunk.len(),
                max: CHUNK_SIZE_MAX,
            });
        }

        let tag = chunk[0];
        let data = chunk.slice(1..);

        match self.buffer.take() {
            None => {
                let expected = self
                    .receiving_tag
                    .map(|t| (t + 1) % TAG_MODULUS)
                    .unwrap_or(0);
                if tag != expected {
                    return ChunkOutcome::Fatal(Error::ErrWrongMessageTag {
                        expected,
                        actual: tag,
                    });
                }

                let declared = match message::peek_length(&data) {
                    Ok(length) => length as usize,
                    Err(err) => return ChunkOutcome::Fatal(err),
                };
                if declared > MESSAGE_SIZE_MAX {
                    return ChunkOutcome::Fatal(Error::ErrMessageTooLarge {
                        size: declared,
                        max: MESSAGE_SIZE_MAX,
                    });
                }
                if data.len() > declared {
                    return ChunkOutcome::Fatal(Error::ErrChunkExceedsRemaining {
                        remaining: declared,
                        actual: data.len(),
                    });
                }

                self.receiving_tag = Some(tag);
                self.last_chunk_received_at = Some(SystemTime::now());

                if data.len() == declared {
                    return ChunkOutcome::Message(data);
                }

                let msg_type = message::peek_type(&data).ok();
                let mut buf = BytesMut::with_capacity(declared);
                buf.extend_from_slice(&data);
                let partial = Bytes::copy_from_slice(&buf);
                self.buffer = Some(ReassemblyBuffer {
                    buf,
                    declared,
                    msg_type,
                    tag,
                });
                self.reset_chunk_timer(msg_type);
                ChunkOutcome::Chunk(partial)
            }
            Some(mut assembling) => {
                if tag != assembling.tag {
                    return ChunkOutcome::Fatal(Error::ErrWrongMessageTag {
                        expected: assembling.tag,
                        actual: tag,
                    });
                }

                let remaining = assembling.declared - assembling.buf.len();
                if data.len() > remaining {
                    return ChunkOutcome::Fatal(Error::ErrChunkExceedsRemaining {
                        remaining,
                        actual: data.len(),
                    });
                }

                assembling.buf.extend_from_slice(&data);
                self.last_chunk_received_at = Some(SystemTime::now());

                if assembling.buf.len() == assembling.declared {
                    return ChunkOutcome::Message(assembling.buf.freeze());
                }

                let partial = Bytes::copy_from_slice(&assembling.buf);
                let msg_type = assembling.msg_type;
                self.buffer = Some(assembling);
                self.reset_chunk_timer(msg_type);
                ChunkOutcome::Chunk(partial)
            }
        }
    }

    /// Re-arms the chunk timer of the expectation matching the in-flight
    /// message type, if any. The message timer is never extended.
    fn reset_chunk_timer(&mut self, msg_type: Option<MessageType>) {
        let Some(typ) = msg_type else {
            return;
        };
        let Some(id) = self.expected_by_type.get(&typ).cloned() else {
            return;
        };
        let Some(chunk_timeout) = self
            .expectations
            .get(&id)
            .map(|expectation| expectation.chunk_timeout)
        else {
            return;
        };
        self.timers
            .set_timeout(&format!("chunk-{id}"), chunk_timeout);
    }

    fn expect(
        &mut self,
        types: &[MessageType],
        timeout_callback: ExpectTimeoutHdlrFn,
        msg_timeout: Duration,
        chunk_timeout: Duration,
    ) {
        if types.is_empty() {
            log::warn!("ignoring expectation with an empty type set");
            return;
        }

        let id = expectation_id(types);

        // re-index every requested type; expectations left without any
        // index entry are retired with their timers
        let mut displaced: Vec<String> = Vec::new();
        for typ in types {
            if let Some(old) = self.expected_by_type.insert(*typ, id.clone()) {
                if old != id && !displaced.contains(&old) {
                    displaced.push(old);
                }
            }
        }
        for old in displaced {
            if !self.expected_by_type.values().any(|value| *value == old) {
                self.expectations.remove(&old);
                self.timers.clear_timeout(&format!("msg-{old}"));
                self.timers.clear_timeout(&format!("chunk-{old}"));
            }
        }

        // a chunk timer may survive from a previous arming of this same id
        self.timers.clear_timeout(&format!("chunk-{id}"));

        self.expectations.insert(
            id.clone(),
            ExpectedMessage {
                id: id.clone(),
                types: types.to_vec(),
                timeout_callback: Some(timeout_callback),
                msg_timeout,
                chunk_timeout,
            },
        );
        self.timers.set_timeout(&format!("msg-{id}"), msg_timeout);
    }

    fn confirm(&mut self, typ: MessageType, success: bool) -> Option<ExpectTimeoutHdlrFn> {
        let id = self.expected_by_type.get(&typ).cloned()?;
        let mut expectation = self.remove_expectation(&id)?;
        if success {
            None
        } else {
            expectation.timeout_callback.take()
        }
    }

    /// Drops the expectation `id` together with its index entries and both
    /// of its timers.
    fn remove_expectation(&mut self, id: &str) -> Option<ExpectedMessage> {
        let expectation = self.expectations.remove(id)?;
        self.expected_by_type.retain(|_, value| value.as_str() != id);
        self.timers.clear_timeout(&format!("msg-{id}"));
        self.timers.clear_timeout(&format!("chunk-{id}"));
        Some(expectation)
    }
}

#[async_trait]
impl TimeoutObserver for DataChannelInternal {
    async fn on_timeout(&mut self, key: &str, token: u64) -> Option<TimeoutFollowUp> {
        if !self.timers.take_if_current(key, token) {
            return None;
        }

        let id = key
            .strip_prefix("msg-")
            .or_else(|| key.strip_prefix("chunk-"))?
            .to_owned();

        let mut expectation = self.remove_expectation(&id)?;
        // free the channel for fresh messages
        self.buffer = None;

        log::error!("expected message timed out ({key})");

        let mut callback = expectation.timeout_callback.take()?;
        let follow_up: TimeoutFollowUp = Box::pin(async move { callback().await });
        Some(follow_up)
    }
}
