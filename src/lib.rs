//! Peer-to-peer messaging core for the zbyte network.
//!
//! This crate is the framing and multiplexing layer that sits between an
//! already-open datagram-style transport (WebSocket or WebRTC data channel)
//! and the consensus/services layers of a node. It is built from three
//! pieces, leaves first:
//!
//! * [`message`]: the wire codec, a length-prefixed, checksummed, tagged
//!   binary format with one payload layout per message type.
//! * [`data_channel`]: chunked reliable delivery of whole messages over a
//!   lossy, ordered, message-preserving transport, plus per-expectation
//!   timers.
//! * [`peer_channel`]: the typed facade over a data channel: one send
//!   method and one subscription point per message variant, and the
//!   malformed-message policy (reject-or-close) applied to everything a
//!   remote peer delivers.
//!
//! Cryptography, blockchain state and peer discovery are collaborators of
//! this crate, not part of it; they appear only as opaque value types in
//! [`primitives`].

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod data_channel;
pub mod error;
pub mod message;
pub mod peer_channel;
pub mod primitives;

pub use data_channel::DataChannel;
pub use error::Error;
pub use message::Message;
pub use peer_channel::PeerChannel;
