use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("buffer is too small for a message header (expected: {expected}, actual: {actual})")]
    ErrHeaderTooSmall { expected: usize, actual: usize },
    #[error("magic mismatch: 0x{0:08x}")]
    ErrInvalidMagic(u32),
    #[error("unknown message type {0}")]
    ErrUnknownMessageType(u8),
    #[error("message length field does not match buffer (declared: {declared}, actual: {actual})")]
    ErrLengthMismatch { declared: usize, actual: usize },
    #[error("message checksum mismatch")]
    ErrChecksumMismatch,
    #[error("unexpected end of buffer (expected: {expected}, actual: {actual})")]
    ErrUnexpectedEndOfBuffer { expected: usize, actual: usize },
    #[error("payload not fully consumed ({0} trailing bytes)")]
    ErrTrailingBytes(usize),
    #[error("vector count {count} exceeds maximum {max}")]
    ErrVectorTooLong { count: usize, max: usize },
    #[error("invalid utf-8 in length-prefixed string")]
    ErrInvalidString,
    #[error("invalid enum value {0}")]
    ErrInvalidEnumValue(u32),
    #[error("signal payload requires sender public key and signature")]
    ErrSignalUnsigned,

    #[error("excessive message size (size: {size}, max: {max})")]
    ErrMessageTooLarge { size: usize, max: usize },
    #[error("chunk size exceeds maximum (size: {size}, max: {max})")]
    ErrChunkTooLarge { size: usize, max: usize },
    #[error("wrong message tag (expected: {expected}, actual: {actual})")]
    ErrWrongMessageTag { expected: u8, actual: u8 },
    #[error("chunk exceeds remaining message size (remaining: {remaining}, actual: {actual})")]
    ErrChunkExceedsRemaining { remaining: usize, actual: usize },
    #[error("channel is not open")]
    ErrChannelNotOpen,
    #[error("transport refused chunk")]
    ErrTransportSendFailed,

    #[error("{0}")]
    Other(String),
}

impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        match error {
            e @ Error::ErrChannelNotOpen => {
                io::Error::new(io::ErrorKind::ConnectionAborted, e.to_string())
            }
            e @ Error::ErrTransportSendFailed => {
                io::Error::new(io::ErrorKind::BrokenPipe, e.to_string())
            }
            e => io::Error::new(io::ErrorKind::Other, e.to_string()),
        }
    }
}
