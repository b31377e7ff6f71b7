// protocol/state_machine.rs - Shared Protocol Engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use super::contract_net::ContractNetState;
use super::propose::ProposeState;
use super::query::QueryState;
use super::request::RequestState;
use crate::acl_message::{AclMessage, AgentAddress, ConversationId, FipaProtocol, Performative};
use crate::config::ProtocolSettings;
use crate::observability;
use crate::platform::{AclHost, MessageFilter};

/// Protocol error types
///
/// Every rejected operation records one of these in the conversation's
/// error log and also returns it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("{operation} is not allowed for role {actual:?}")]
    WrongRole { operation: &'static str, actual: Role },

    #[error("{operation} is not allowed in state {state}")]
    WrongState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("{operation} cannot be sent as {performative}")]
    WrongPerformative {
        operation: &'static str,
        performative: Performative,
    },

    #[error("{operation} rejected: {reason}")]
    InvalidReply {
        operation: &'static str,
        reason: String,
    },

    #[error("{operation} timed out after {elapsed_ms} ms (limit {timeout_ms} ms)")]
    TimeoutExceeded {
        operation: &'static str,
        elapsed_ms: u64,
        timeout_ms: u64,
    },

    #[error("Conversation already initiated as {0:?}")]
    AlreadyInitiated(Role),

    #[error("{count} participants exceed the maximum of {max}")]
    TooManyParticipants { count: usize, max: usize },

    #[error("{operation} needs a counterpart address")]
    NoParticipant { operation: &'static str },

    #[error("{operation} received unexpected {performative} in state {state}")]
    UnexpectedPerformative {
        operation: &'static str,
        performative: Performative,
        state: &'static str,
    },

    #[error("{operation} failed to send: {reason}")]
    SendFailed {
        operation: &'static str,
        reason: String,
    },
}

impl ProtocolError {
    /// Short label used as a metrics dimension
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolError::WrongRole { .. } => "wrong_role",
            ProtocolError::WrongState { .. } => "wrong_state",
            ProtocolError::WrongPerformative { .. } => "wrong_performative",
            ProtocolError::InvalidReply { .. } => "invalid_reply",
            ProtocolError::TimeoutExceeded { .. } => "timeout",
            ProtocolError::AlreadyInitiated(_) => "already_initiated",
            ProtocolError::TooManyParticipants { .. } => "too_many_participants",
            ProtocolError::NoParticipant { .. } => "no_participant",
            ProtocolError::UnexpectedPerformative { .. } => "unexpected_performative",
            ProtocolError::SendFailed { .. } => "send_failed",
        }
    }
}

/// Role in a protocol conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    /// Initiated the protocol
    Initiator,
    /// Responding to initiator
    Participant,
    /// Not initiated yet
    #[default]
    Unset,
}

/// Predicates every protocol state answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateFlags {
    pub started: bool,
    pub finished: bool,
    pub cancelled: bool,
    pub erroneous: bool,
}

/// State of any conversation, tagged by protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolState {
    Query(QueryState),
    Propose(ProposeState),
    Request(RequestState),
    ContractNet(ContractNetState),
}

impl ProtocolState {
    pub fn flags(self) -> StateFlags {
        match self {
            ProtocolState::Query(s) => s.flags(),
            ProtocolState::Propose(s) => s.flags(),
            ProtocolState::Request(s) => s.flags(),
            ProtocolState::ContractNet(s) => s.flags(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolState::Query(s) => s.as_str(),
            ProtocolState::Propose(s) => s.as_str(),
            ProtocolState::Request(s) => s.as_str(),
            ProtocolState::ContractNet(s) => s.as_str(),
        }
    }

    pub fn is_started(self) -> bool {
        self.flags().started
    }

    pub fn is_finished(self) -> bool {
        self.flags().finished
    }

    pub fn is_cancelled(self) -> bool {
        self.flags().cancelled
    }

    pub fn is_erroneous(self) -> bool {
        self.flags().erroneous
    }
}

impl std::fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability shared by every interaction protocol
pub trait InteractionProtocol {
    fn engine(&self) -> &ProtocolEngine;

    fn state(&self) -> ProtocolState;

    fn kind(&self) -> FipaProtocol {
        self.engine().protocol()
    }

    fn role(&self) -> Role {
        self.engine().role()
    }

    fn conversation_id(&self) -> Option<&ConversationId> {
        self.engine().conversation_id()
    }

    fn errors(&self) -> &[ProtocolError] {
        self.engine().errors()
    }

    fn is_finished(&self) -> bool {
        self.state().is_finished()
    }
}

/// Engine state shared by every protocol: role, counterparts, conversation
/// id, timeout clock and error log
pub struct ProtocolEngine {
    host: Arc<dyn AclHost>,
    protocol: FipaProtocol,
    role: Role,
    initiator: Option<AgentAddress>,
    participants: Vec<AgentAddress>,
    maximum_participants: usize,
    conversation_id: Option<ConversationId>,
    started_at: DateTime<Utc>,
    timeout: Duration,
    errors: Vec<ProtocolError>,
}

impl std::fmt::Debug for ProtocolEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("address", &self.host.current_address())
            .field("protocol", &self.protocol)
            .field("role", &self.role)
            .field("initiator", &self.initiator)
            .field("participants", &self.participants)
            .field("conversation_id", &self.conversation_id)
            .field("errors", &self.errors.len())
            .finish()
    }
}

impl ProtocolEngine {
    /// Engine for a two-party protocol
    pub fn new(protocol: FipaProtocol, host: Arc<dyn AclHost>, settings: &ProtocolSettings) -> Self {
        Self {
            host,
            protocol,
            role: Role::Unset,
            initiator: None,
            participants: Vec::new(),
            maximum_participants: 1,
            conversation_id: None,
            started_at: Utc::now(),
            timeout: settings.timeout(),
            errors: Vec::new(),
        }
    }

    pub fn with_maximum_participants(mut self, maximum: usize) -> Self {
        self.maximum_participants = maximum;
        self
    }

    /// Fix both parties; the role follows from the host's own address
    pub fn initiate(
        &mut self,
        initiator: AgentAddress,
        participant: AgentAddress,
    ) -> Result<(), ProtocolError> {
        self.initiate_with(initiator, &[participant])
    }

    pub fn initiate_with(
        &mut self,
        initiator: AgentAddress,
        participants: &[AgentAddress],
    ) -> Result<(), ProtocolError> {
        if self.role != Role::Unset {
            return Err(self.fail(ProtocolError::AlreadyInitiated(self.role)));
        }
        if participants.is_empty() {
            return Err(self.fail(ProtocolError::NoParticipant {
                operation: "initiate",
            }));
        }
        if participants.len() > self.maximum_participants {
            return Err(self.fail(ProtocolError::TooManyParticipants {
                count: participants.len(),
                max: self.maximum_participants,
            }));
        }

        self.role = if self.host.current_address() == initiator {
            self.conversation_id = Some(ConversationId::generate());
            Role::Initiator
        } else {
            Role::Participant
        };
        self.initiator = Some(initiator);
        self.participants = participants.to_vec();
        self.reset_started_time();

        debug!(
            protocol = %self.protocol,
            role = ?self.role,
            participants = self.participants.len(),
            "Conversation initiated"
        );
        Ok(())
    }

    /// Act as participant of whichever conversation reaches us first
    pub fn initiate_as_participant(&mut self) -> Result<(), ProtocolError> {
        if self.role != Role::Unset {
            return Err(self.fail(ProtocolError::AlreadyInitiated(self.role)));
        }
        self.role = Role::Participant;
        self.participants = vec![self.host.current_address()];
        self.reset_started_time();
        debug!(protocol = %self.protocol, "Waiting as participant");
        Ok(())
    }

    pub fn protocol(&self) -> FipaProtocol {
        self.protocol
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_initiator(&self) -> bool {
        self.role == Role::Initiator
    }

    pub fn is_participant(&self) -> bool {
        self.role == Role::Participant
    }

    pub fn address(&self) -> AgentAddress {
        self.host.current_address()
    }

    pub fn initiator(&self) -> Option<&AgentAddress> {
        self.initiator.as_ref()
    }

    pub fn participants(&self) -> &[AgentAddress] {
        &self.participants
    }

    pub fn maximum_participants(&self) -> usize {
        self.maximum_participants
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn errors(&self) -> &[ProtocolError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<ProtocolError> {
        std::mem::take(&mut self.errors)
    }

    pub fn reset_started_time(&mut self) {
        self.started_at = Utc::now();
    }

    pub fn has_reached_timeout(&self) -> bool {
        self.elapsed() > self.timeout
    }

    fn elapsed(&self) -> Duration {
        (Utc::now() - self.started_at).to_std().unwrap_or_default()
    }

    /// Append to the error log without interrupting the caller
    pub fn add_error(&mut self, error: ProtocolError) {
        warn!(protocol = %self.protocol, role = ?self.role, error = %error, "Protocol error");
        observability::record_protocol_error(self.protocol.fipa_name(), error.kind());
        self.errors.push(error);
    }

    pub(crate) fn fail(&mut self, error: ProtocolError) -> ProtocolError {
        self.add_error(error.clone());
        error
    }

    pub(crate) fn require_role(&mut self, operation: &'static str, role: Role) -> Result<(), ProtocolError> {
        if self.role == role {
            Ok(())
        } else {
            Err(self.fail(ProtocolError::WrongRole {
                operation,
                actual: self.role,
            }))
        }
    }

    /// Either side, as long as the conversation was initiated
    pub(crate) fn require_initiated(&mut self, operation: &'static str) -> Result<(), ProtocolError> {
        if self.role == Role::Unset {
            Err(self.fail(ProtocolError::WrongRole {
                operation,
                actual: self.role,
            }))
        } else {
            Ok(())
        }
    }

    pub(crate) fn require_state(
        &mut self,
        operation: &'static str,
        state: ProtocolState,
        allowed: bool,
    ) -> Result<(), ProtocolError> {
        if allowed {
            Ok(())
        } else {
            Err(self.fail(ProtocolError::WrongState {
                operation,
                state: state.as_str(),
            }))
        }
    }

    /// Addresses replies go to: the participants for the initiator, the
    /// initiator for a participant
    pub fn counterparts(&self) -> Vec<AgentAddress> {
        match self.role {
            Role::Initiator => self.participants.clone(),
            Role::Participant => self.initiator.iter().cloned().collect(),
            Role::Unset => Vec::new(),
        }
    }

    /// Stamp protocol and conversation id, then send to the counterparts
    pub(crate) fn send(
        &mut self,
        operation: &'static str,
        content: Vec<u8>,
        performative: Performative,
    ) -> Result<(), ProtocolError> {
        let to = self.counterparts();
        self.send_to(operation, content, performative, &to)
    }

    pub(crate) fn send_to(
        &mut self,
        operation: &'static str,
        content: Vec<u8>,
        performative: Performative,
        to: &[AgentAddress],
    ) -> Result<(), ProtocolError> {
        if to.is_empty() {
            return Err(self.fail(ProtocolError::NoParticipant { operation }));
        }

        let mut message = AclMessage {
            performative,
            content,
            receivers: to.to_vec(),
            ..Default::default()
        }
        .with_protocol(self.protocol);
        message.conversation_id = self.conversation_id.clone();

        if let Err(e) = self.host.send(message, to) {
            return Err(self.fail(ProtocolError::SendFailed {
                operation,
                reason: e.to_string(),
            }));
        }
        trace!(protocol = %self.protocol, %performative, receivers = to.len(), "Sent");
        self.reset_started_time();
        Ok(())
    }

    /// Records a timeout and returns true when the clock has run out
    pub(crate) fn check_timeout(&mut self, operation: &'static str) -> bool {
        if !self.has_reached_timeout() {
            return false;
        }
        observability::record_protocol_timeout(self.protocol.fipa_name());
        let error = ProtocolError::TimeoutExceeded {
            operation,
            elapsed_ms: self.elapsed().as_millis() as u64,
            timeout_ms: self.timeout.as_millis() as u64,
        };
        self.add_error(error);
        true
    }

    /// Filter for messages belonging to this conversation
    pub fn conversation_filter(&self) -> MessageFilter {
        let mut filter = MessageFilter::new().protocol(self.protocol);
        if let Some(id) = &self.conversation_id {
            filter = filter.conversation(id.clone());
        }
        filter.senders(&self.counterparts())
    }

    /// Poll for the next conversation message with one of `performatives`
    pub(crate) fn poll(
        &mut self,
        operation: &'static str,
        performatives: &[Performative],
    ) -> Option<AclMessage> {
        self.poll_with(operation, &|m| performatives.contains(&m.performative))
    }

    /// Poll for the next conversation message accepted by `accept`
    pub(crate) fn poll_with(
        &mut self,
        operation: &'static str,
        accept: &dyn Fn(&AclMessage) -> bool,
    ) -> Option<AclMessage> {
        if self.check_timeout(operation) {
            return None;
        }

        let filter = self.conversation_filter();
        let message = self.host.next_matching(&|m| filter.matches(m) && accept(m))?;

        if self.conversation_id.is_none() {
            self.conversation_id = message.conversation_id.clone();
        }
        if self.role == Role::Participant && self.initiator.is_none() {
            self.initiator = message.sender.clone();
        }
        self.reset_started_time();
        trace!(protocol = %self.protocol, operation, performative = %message.performative, "Received");
        Some(message)
    }

    /// Log a state change and count conversations that just finished
    pub(crate) fn transition(&self, from: ProtocolState, to: ProtocolState) {
        debug!(protocol = %self.protocol, role = ?self.role, %from, %to, "State transition");
        if to.is_finished() && !from.is_finished() {
            info!(
                protocol = %self.protocol,
                role = ?self.role,
                conversation_id = self.conversation_id.as_ref().map(|id| id.as_str()),
                state = %to,
                "Conversation finished"
            );
            observability::record_conversation_finished(self.protocol.fipa_name(), to.as_str());
        }
    }
}
