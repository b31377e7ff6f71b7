// encoding/bitefficient/mod.rs - FIPA Bit-Efficient Representation
//
//! FIPA bit-efficient ACL message representation (SC00069) without dynamic
//! code tables.
//!
//! A message is a message-id byte, a message-type byte, a sequence of
//! parameters each introduced by a one-byte code, and an end-of-message
//! byte. Messages announcing dynamic code tables (`0xFB`, `0xFC`) and
//! indexed tokens are rejected rather than guessed at.

mod decoder;
mod encoder;
pub mod tokens;

pub use decoder::MAX_NESTING;

use bytes::Bytes;
use tracing::debug;

use super::{AclCodec, CodecError};
use crate::acl_message::{AclMessage, AclRepresentation};
use crate::observability;

/// Stateless bit-efficient codec
#[derive(Debug, Clone, Copy, Default)]
pub struct BitEfficientCodec;

impl BitEfficientCodec {
    pub fn new() -> Self {
        Self
    }
}

impl AclCodec for BitEfficientCodec {
    fn representation(&self) -> AclRepresentation {
        AclRepresentation::BitEfficient
    }

    fn name(&self) -> &str {
        "bit-efficient"
    }

    fn encode(&self, message: &AclMessage) -> Result<Bytes, CodecError> {
        match encoder::encode_message(message) {
            Ok(bytes) => {
                debug!(
                    performative = %message.performative,
                    size = bytes.len(),
                    "Encoded bit-efficient message"
                );
                observability::record_message_encoded(bytes.len());
                Ok(bytes)
            }
            Err(e) => {
                observability::record_codec_error(&e);
                Err(e)
            }
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<AclMessage, CodecError> {
        match decoder::decode_message(bytes) {
            Ok(message) => {
                debug!(
                    performative = %message.performative,
                    size = bytes.len(),
                    "Decoded bit-efficient message"
                );
                observability::record_message_decoded();
                Ok(message)
            }
            Err(e) => {
                debug!(error = %e, "Bit-efficient decode failed");
                observability::record_codec_error(&e);
                Err(e)
            }
        }
    }
}
