// encoding/error.rs - Codec Errors

use crate::acl_message::AclRepresentation;
use super::bitefficient::tokens::MessageId;
use thiserror::Error;

/// Errors raised while encoding or decoding an ACL message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Unsupported coding scheme {0:?}: dynamic code tables are not implemented")]
    UnsupportedScheme(MessageId),

    #[error("Unknown message identifier 0x{found:02X} at offset {offset}")]
    UnknownMessageId { offset: usize, found: u8 },

    #[error("Unexpected end of input at offset {offset}: expected {expected}")]
    UnexpectedEnd { offset: usize, expected: &'static str },

    #[error("Unexpected token 0x{found:02X} at offset {offset}: expected {expected}")]
    UnexpectedToken {
        offset: usize,
        found: u8,
        expected: &'static str,
    },

    #[error("Indexed token 0x{found:02X} at offset {offset} requires a dynamic code table")]
    IndexedToken { offset: usize, found: u8 },

    #[error("Invalid UTF-8 in {field} at offset {offset}")]
    InvalidUtf8 { offset: usize, field: &'static str },

    #[error("Malformed number at offset {offset}: {reason}")]
    MalformedNumber { offset: usize, reason: String },

    #[error("Malformed date-time at offset {offset}: {reason}")]
    MalformedDate { offset: usize, reason: String },

    #[error("Expression nesting deeper than {max} levels at offset {offset}")]
    NestingTooDeep { offset: usize, max: usize },

    #[error("{count} trailing bytes after end of message at offset {offset}")]
    TrailingBytes { offset: usize, count: usize },

    #[error("Cannot encode {value:?} as a word: {reason}")]
    InvalidWord { value: String, reason: &'static str },

    #[error("Cannot encode {value:?} as a number")]
    InvalidNumber { value: String },

    #[error("Cannot encode reply-by time: a field exceeds its digit width")]
    InvalidDate,

    #[error("Value of {len} bytes exceeds the len32 string form")]
    ValueTooLong { len: usize },

    #[error("No codec registered for representation {}", .0.value())]
    UnsupportedRepresentation(AclRepresentation),
}

impl CodecError {
    /// Byte offset of a decode failure, when the error has one
    pub fn offset(&self) -> Option<usize> {
        match self {
            CodecError::UnknownMessageId { offset, .. }
            | CodecError::UnexpectedEnd { offset, .. }
            | CodecError::UnexpectedToken { offset, .. }
            | CodecError::IndexedToken { offset, .. }
            | CodecError::InvalidUtf8 { offset, .. }
            | CodecError::MalformedNumber { offset, .. }
            | CodecError::MalformedDate { offset, .. }
            | CodecError::NestingTooDeep { offset, .. }
            | CodecError::TrailingBytes { offset, .. } => Some(*offset),
            CodecError::UnsupportedScheme(_) => Some(0),
            _ => None,
        }
    }

    /// Short label used as a metrics dimension
    pub fn kind(&self) -> &'static str {
        match self {
            CodecError::UnsupportedScheme(_) => "unsupported_scheme",
            CodecError::UnknownMessageId { .. } => "unknown_message_id",
            CodecError::UnexpectedEnd { .. } => "unexpected_end",
            CodecError::UnexpectedToken { .. } => "unexpected_token",
            CodecError::IndexedToken { .. } => "indexed_token",
            CodecError::InvalidUtf8 { .. } => "invalid_utf8",
            CodecError::MalformedNumber { .. } => "malformed_number",
            CodecError::MalformedDate { .. } => "malformed_date",
            CodecError::NestingTooDeep { .. } => "nesting_too_deep",
            CodecError::TrailingBytes { .. } => "trailing_bytes",
            CodecError::InvalidWord { .. } => "invalid_word",
            CodecError::InvalidNumber { .. } => "invalid_number",
            CodecError::InvalidDate => "invalid_date",
            CodecError::ValueTooLong { .. } => "value_too_long",
            CodecError::UnsupportedRepresentation(_) => "unsupported_representation",
        }
    }
}
