// lib.rs - FIPA ACL Engine
//
// FIPA ACL bit-efficient codec and the Query, Propose, Request and
// Contract-Net interaction protocols.

#![doc = include_str!("../README.md")]

pub mod acl_message;
pub mod config;
pub mod encoding;
pub mod observability;
pub mod platform;
pub mod protocol;

// Re-export commonly used types
pub use acl_message::{
    AclMessage, AclRepresentation, AgentAddress, ConversationId, FipaProtocol, PayloadEncoding,
    Performative, ReplyBy,
};

pub use encoding::{AclCodec, BitEfficientCodec, CodecError, CodecRegistry};

pub use platform::{AclAgent, AclHost, HostError, LocalPlatform, MessageFilter};

pub use protocol::{
    ContractNetProtocol, Conversation, InteractionProtocol, ProposeProtocol, ProtocolError,
    ProtocolState, QueryProtocol, RequestProtocol, Role,
};

pub use config::{ConfigError, EngineConfig};

pub use observability::{init_metrics, init_tracing, MetricsConfig, MetricsHandle, TracingConfig, TracingFormat};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::acl_message::{AclMessage, AgentAddress, FipaProtocol, Performative};
    pub use crate::config::{AgentSettings, EngineConfig, ProtocolSettings};
    pub use crate::encoding::{AclCodec, BitEfficientCodec, CodecRegistry};
    pub use crate::platform::{AclHost, LocalPlatform};
    pub use crate::protocol::{
        ContractNetProtocol, Conversation, InteractionProtocol, ProposeProtocol, ProtocolError,
        QueryProtocol, QueryReply, RequestProtocol, Role,
    };
}
