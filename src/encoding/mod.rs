// encoding/mod.rs - ACL Message Representations
//
//! Wire codecs for ACL messages
//!
//! A codec turns an [`AclMessage`] into the bytes of one FIPA ACL
//! representation and back. Codecs are registered in a [`CodecRegistry`]
//! keyed by [`AclRepresentation`]; the registry is what the platform uses to
//! pick the codec named in a message envelope.
//!
//! Only the bit-efficient representation ships with this crate.

pub mod bitefficient;
mod error;

pub use bitefficient::BitEfficientCodec;
pub use error::CodecError;

use crate::acl_message::{AclMessage, AclRepresentation};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;

/// Codec trait for one ACL message representation
pub trait AclCodec: Send + Sync {
    /// Representation handled by this codec
    fn representation(&self) -> AclRepresentation;

    /// Human-readable codec name
    fn name(&self) -> &str;

    /// Encode a message to bytes
    fn encode(&self, message: &AclMessage) -> Result<Bytes, CodecError>;

    /// Decode bytes to a message
    fn decode(&self, bytes: &[u8]) -> Result<AclMessage, CodecError>;
}

/// Registry of available codecs
#[derive(Default, Clone)]
pub struct CodecRegistry {
    codecs: HashMap<AclRepresentation, Arc<dyn AclCodec>>,
}

impl CodecRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Registry holding every codec this crate provides
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(BitEfficientCodec::new()));
        registry
    }

    /// Register a codec, replacing any previous one for its representation
    pub fn register(&mut self, codec: Arc<dyn AclCodec>) {
        self.codecs.insert(codec.representation(), codec);
    }

    pub fn get(&self, representation: AclRepresentation) -> Option<Arc<dyn AclCodec>> {
        self.codecs.get(&representation).cloned()
    }

    pub fn contains(&self, representation: AclRepresentation) -> bool {
        self.codecs.contains_key(&representation)
    }

    /// List all registered representations
    pub fn list(&self) -> Vec<AclRepresentation> {
        self.codecs.keys().copied().collect()
    }

    /// Encode with the codec named by the message's own representation
    pub fn encode(&self, message: &AclMessage) -> Result<Bytes, CodecError> {
        self.get(message.acl_representation)
            .ok_or(CodecError::UnsupportedRepresentation(message.acl_representation))?
            .encode(message)
    }

    pub fn decode(
        &self,
        representation: AclRepresentation,
        bytes: &[u8],
    ) -> Result<AclMessage, CodecError> {
        self.get(representation)
            .ok_or(CodecError::UnsupportedRepresentation(representation))?
            .decode(bytes)
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("representations", &self.list())
            .finish()
    }
}
