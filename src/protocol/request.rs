// protocol/request.rs - FIPA Request Protocol

use std::sync::Arc;

use super::state_machine::*;
use crate::acl_message::{AclMessage, AgentAddress, FipaProtocol, Performative};
use crate::config::ProtocolSettings;
use crate::platform::AclHost;

/// FIPA Request Protocol States
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    /// Initial state
    NotStarted,
    /// Request sent (initiator) or received (participant)
    WaitingParticipantDecision,
    ParticipantRefused,
    ParticipantAgreed,
    ParticipantFailure,
    /// Action performed and a result was returned
    DoneWithResult,
    /// Action performed, nothing to return
    DoneWithoutResult,
    Canceled,
    /// A message arrived that the protocol does not allow here
    BrokenProtocol,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::NotStarted => "not_started",
            RequestState::WaitingParticipantDecision => "waiting_participant_decision",
            RequestState::ParticipantRefused => "participant_refused",
            RequestState::ParticipantAgreed => "participant_agreed",
            RequestState::ParticipantFailure => "participant_failure",
            RequestState::DoneWithResult => "done_with_result",
            RequestState::DoneWithoutResult => "done_without_result",
            RequestState::Canceled => "canceled",
            RequestState::BrokenProtocol => "broken_protocol",
        }
    }

    pub fn flags(self) -> StateFlags {
        use RequestState::*;
        StateFlags {
            started: self != NotStarted,
            finished: matches!(
                self,
                ParticipantRefused
                    | ParticipantFailure
                    | DoneWithResult
                    | DoneWithoutResult
                    | Canceled
                    | BrokenProtocol
            ),
            cancelled: self == Canceled,
            erroneous: self == BrokenProtocol,
        }
    }
}

/// FIPA Request Protocol Implementation
#[derive(Debug)]
pub struct RequestProtocol {
    engine: ProtocolEngine,
    state: RequestState,
    request: Option<AclMessage>,
    answer: Option<AclMessage>,
    result: Option<AclMessage>,
}

impl RequestProtocol {
    pub fn new(host: Arc<dyn AclHost>, settings: &ProtocolSettings) -> Self {
        Self {
            engine: ProtocolEngine::new(FipaProtocol::Request, host, settings),
            state: RequestState::NotStarted,
            request: None,
            answer: None,
            result: None,
        }
    }

    pub fn initiate(
        &mut self,
        initiator: AgentAddress,
        participant: AgentAddress,
    ) -> Result<(), ProtocolError> {
        self.engine.initiate(initiator, participant)
    }

    pub fn initiate_as_participant(&mut self) -> Result<(), ProtocolError> {
        self.engine.initiate_as_participant()
    }

    pub fn current_state(&self) -> RequestState {
        self.state
    }

    pub fn engine_mut(&mut self) -> &mut ProtocolEngine {
        &mut self.engine
    }

    pub fn request_message(&self) -> Option<&AclMessage> {
        self.request.as_ref()
    }

    /// Decision seen by the initiator
    pub fn answer(&self) -> Option<&AclMessage> {
        self.answer.as_ref()
    }

    /// Final `inform` or `failure` seen by the initiator
    pub fn result(&self) -> Option<&AclMessage> {
        self.result.as_ref()
    }

    fn set_state(&mut self, state: RequestState) {
        self.engine
            .transition(ProtocolState::Request(self.state), ProtocolState::Request(state));
        self.state = state;
    }

    fn require_state(&mut self, operation: &'static str, ok: bool) -> Result<(), ProtocolError> {
        self.engine
            .require_state(operation, ProtocolState::Request(self.state), ok)
    }

    fn in_progress(&self) -> bool {
        self.state.flags().started && !self.state.flags().finished
    }

    fn broken(&mut self, operation: &'static str, message: &AclMessage) {
        let error = ProtocolError::UnexpectedPerformative {
            operation,
            performative: message.performative,
            state: self.state.as_str(),
        };
        self.engine.add_error(error);
        self.set_state(RequestState::BrokenProtocol);
    }

    pub fn request(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "request";
        self.engine.require_role(OP, Role::Initiator)?;
        self.require_state(OP, self.state == RequestState::NotStarted)?;

        let content = content.into();
        self.engine.send(OP, content.clone(), Performative::Request)?;
        self.request = Some(AclMessage {
            performative: Performative::Request,
            content,
            ..Default::default()
        });
        self.set_state(RequestState::WaitingParticipantDecision);
        Ok(())
    }

    /// Poll for the request; once received it is returned on every call
    pub fn get_request(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_request";
        self.engine.require_role(OP, Role::Participant).ok()?;
        if self.state != RequestState::NotStarted {
            return self.request.clone();
        }

        let message = self.engine.poll(OP, &[Performative::Request])?;
        self.request = Some(message.clone());
        self.set_state(RequestState::WaitingParticipantDecision);
        Some(message)
    }

    pub fn agree(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "agree";
        self.engine.require_role(OP, Role::Participant)?;
        self.require_state(OP, self.state == RequestState::WaitingParticipantDecision)?;
        self.engine.send(OP, content.into(), Performative::Agree)?;
        self.set_state(RequestState::ParticipantAgreed);
        Ok(())
    }

    pub fn refuse(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "refuse";
        self.engine.require_role(OP, Role::Participant)?;
        self.require_state(OP, self.state == RequestState::WaitingParticipantDecision)?;
        self.engine.send(OP, content.into(), Performative::Refuse)?;
        self.set_state(RequestState::ParticipantRefused);
        Ok(())
    }

    /// Poll for the participant's decision.
    ///
    /// Anything other than `agree`, `refuse` or `not-understood` on this
    /// conversation breaks the protocol. Once received, the answer is
    /// returned on every call.
    pub fn get_answer(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_answer";
        self.engine.require_role(OP, Role::Initiator).ok()?;
        if let Some(answer) = &self.answer {
            return Some(answer.clone());
        }
        self.require_state(OP, self.state == RequestState::WaitingParticipantDecision)
            .ok()?;

        let message = self.engine.poll_with(OP, &|_| true)?;
        match message.performative {
            Performative::Agree => self.set_state(RequestState::ParticipantAgreed),
            Performative::Refuse => self.set_state(RequestState::ParticipantRefused),
            Performative::NotUnderstood => self.set_state(RequestState::DoneWithoutResult),
            _ => self.broken(OP, &message),
        }
        self.answer = Some(message.clone());
        Some(message)
    }

    /// Report completion with no result (empty `inform`)
    pub fn inform_done(&mut self) -> Result<(), ProtocolError> {
        self.finish("inform_done", Vec::new(), RequestState::DoneWithoutResult)
    }

    /// Report completion with a result
    pub fn inform_result(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        let content = content.into();
        let next = if content.is_empty() {
            RequestState::DoneWithoutResult
        } else {
            RequestState::DoneWithResult
        };
        self.finish("inform_result", content, next)
    }

    fn finish(
        &mut self,
        operation: &'static str,
        content: Vec<u8>,
        next: RequestState,
    ) -> Result<(), ProtocolError> {
        self.engine.require_role(operation, Role::Participant)?;
        self.require_state(operation, self.state == RequestState::ParticipantAgreed)?;
        self.engine.send(operation, content, Performative::Inform)?;
        self.set_state(next);
        Ok(())
    }

    pub fn failure(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "failure";
        self.engine.require_role(OP, Role::Participant)?;
        self.require_state(OP, self.state == RequestState::ParticipantAgreed)?;
        self.engine.send(OP, content.into(), Performative::Failure)?;
        self.set_state(RequestState::ParticipantFailure);
        Ok(())
    }

    /// Poll for the outcome after an agreement; repeats return the stored outcome
    pub fn get_result(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_result";
        self.engine.require_role(OP, Role::Initiator).ok()?;
        if let Some(result) = &self.result {
            return Some(result.clone());
        }
        self.require_state(OP, self.state == RequestState::ParticipantAgreed)
            .ok()?;

        let message = self.engine.poll_with(OP, &|_| true)?;
        match message.performative {
            Performative::Inform if message.content.is_empty() => {
                self.set_state(RequestState::DoneWithoutResult)
            }
            Performative::Inform => self.set_state(RequestState::DoneWithResult),
            Performative::Failure => self.set_state(RequestState::ParticipantFailure),
            Performative::NotUnderstood => self.set_state(RequestState::DoneWithoutResult),
            _ => self.broken(OP, &message),
        }
        self.result = Some(message.clone());
        Some(message)
    }

    pub fn cancel(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "cancel";
        self.engine.require_role(OP, Role::Initiator)?;
        self.require_state(OP, self.in_progress())?;
        self.engine.send(OP, content.into(), Performative::Cancel)?;
        self.set_state(RequestState::Canceled);
        Ok(())
    }

    pub fn get_cancel(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_cancel";
        self.engine.require_role(OP, Role::Participant).ok()?;
        self.require_state(OP, self.in_progress()).ok()?;

        let message = self.engine.poll(OP, &[Performative::Cancel])?;
        self.set_state(RequestState::Canceled);
        Some(message)
    }

    pub fn not_understood(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "not_understood";
        self.engine.require_initiated(OP)?;
        self.require_state(OP, self.in_progress())?;
        self.engine.send(OP, content.into(), Performative::NotUnderstood)?;
        self.set_state(RequestState::DoneWithoutResult);
        Ok(())
    }

    pub fn get_not_understood(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_not_understood";
        self.engine.require_initiated(OP).ok()?;
        self.require_state(OP, self.in_progress()).ok()?;

        let message = self.engine.poll(OP, &[Performative::NotUnderstood])?;
        self.set_state(RequestState::DoneWithoutResult);
        Some(message)
    }
}

impl InteractionProtocol for RequestProtocol {
    fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    fn state(&self) -> ProtocolState {
        ProtocolState::Request(self.state)
    }
}
