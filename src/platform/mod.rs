// platform/mod.rs - Agent Host Contract
//
//! What a protocol needs from the agent that owns it
//!
//! Protocols never touch a transport directly. They send through an
//! [`AclHost`] and discover replies by scanning the host's mailbox with a
//! predicate, usually built from a [`MessageFilter`]. Scanning never blocks:
//! a poll that finds nothing returns `None` and the owning agent tries again
//! on a later step.
//!
//! [`LocalPlatform`] is an in-process host where every message really goes
//! through a registered wire codec.

mod local;

pub use local::{AclAgent, LocalPlatform, TransportMessage};

use thiserror::Error;

use crate::acl_message::{AclMessage, AgentAddress, ConversationId, FipaProtocol, Performative};
use crate::encoding::CodecError;

/// Host-side delivery failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Unknown receiver: {0}")]
    UnknownReceiver(AgentAddress),

    #[error("Message has no receivers")]
    NoReceivers,
}

/// Services an owning agent provides to its protocols
pub trait AclHost: Send + Sync {
    /// Address of the owning agent
    fn current_address(&self) -> AgentAddress;

    /// Hand a stamped message to the transport
    fn send(&self, message: AclMessage, to: &[AgentAddress]) -> Result<(), HostError>;

    /// Remove and return the oldest mailbox message accepted by `predicate`
    fn next_matching(&self, predicate: &dyn Fn(&AclMessage) -> bool) -> Option<AclMessage>;

    /// Like [`AclHost::next_matching`] but leaves the message in the mailbox
    fn peek_matching(&self, predicate: &dyn Fn(&AclMessage) -> bool) -> Option<AclMessage>;
}

/// Mailbox predicate over performative, protocol, conversation and sender.
///
/// Empty criteria match anything.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    performatives: Vec<Performative>,
    protocol: Option<String>,
    conversation_id: Option<ConversationId>,
    senders: Vec<AgentAddress>,
}

impl MessageFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn performative(mut self, performative: Performative) -> Self {
        self.performatives.push(performative);
        self
    }

    pub fn performatives(mut self, performatives: &[Performative]) -> Self {
        self.performatives.extend_from_slice(performatives);
        self
    }

    pub fn protocol(mut self, protocol: FipaProtocol) -> Self {
        self.protocol = Some(protocol.fipa_name().to_string());
        self
    }

    pub fn conversation(mut self, conversation_id: ConversationId) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    pub fn sender(mut self, sender: AgentAddress) -> Self {
        self.senders.push(sender);
        self
    }

    pub fn senders(mut self, senders: &[AgentAddress]) -> Self {
        self.senders.extend_from_slice(senders);
        self
    }

    pub fn matches(&self, message: &AclMessage) -> bool {
        (self.performatives.is_empty() || self.performatives.contains(&message.performative))
            && self
                .protocol
                .as_deref()
                .is_none_or(|p| message.protocol.as_deref() == Some(p))
            && self
                .conversation_id
                .as_ref()
                .is_none_or(|id| message.conversation_id.as_ref() == Some(id))
            && (self.senders.is_empty()
                || message
                    .sender
                    .as_ref()
                    .is_some_and(|s| self.senders.contains(s)))
    }
}
