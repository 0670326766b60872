use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::message::message_type::MessageType;

/// Callback invoked when an expectation expires or is confirmed as failed.
pub type ExpectTimeoutHdlrFn =
    Box<dyn (FnMut() -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync>;

/// A registered intent to receive one of a set of message types.
///
/// The same expectation is indexed under every type in `types`; confirming
/// any one of them retires all of them. Two timers guard it: `msg-<id>`,
/// armed once when the expectation is registered, and `chunk-<id>`, re-armed
/// on every partial chunk of an expected type.
pub(crate) struct ExpectedMessage {
    pub(crate) id: String,
    pub(crate) types: Vec<MessageType>,
    pub(crate) timeout_callback: Option<ExpectTimeoutHdlrFn>,
    pub(crate) msg_timeout: Duration,
    pub(crate) chunk_timeout: Duration,
}

/// Expectation id: the sorted, deduplicated type values joined with '-'.
/// Equal type sets collapse onto the same id regardless of order.
pub(crate) fn expectation_id(types: &[MessageType]) -> String {
    let mut values: Vec<u8> = types.iter().map(|typ| u8::from(*typ)).collect();
    values.sort_unstable();
    values.dedup();
    values
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join("-")
}
