// protocol/propose.rs - FIPA Propose Protocol

use std::sync::Arc;

use super::state_machine::*;
use crate::acl_message::{AclMessage, AgentAddress, FipaProtocol, Performative};
use crate::config::ProtocolSettings;
use crate::platform::AclHost;

/// FIPA Propose Protocol States
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProposeState {
    NotStarted,
    /// Initiator sent a proposal
    WaitingAnswer,
    /// Participant holds a proposal to accept or reject
    WaitingPropose,
    /// Cancel sent (initiator) or observed (participant)
    Canceling,
    Done,
    Canceled,
}

impl ProposeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposeState::NotStarted => "not_started",
            ProposeState::WaitingAnswer => "waiting_answer",
            ProposeState::WaitingPropose => "waiting_propose",
            ProposeState::Canceling => "canceling",
            ProposeState::Done => "done",
            ProposeState::Canceled => "canceled",
        }
    }

    pub fn flags(self) -> StateFlags {
        StateFlags {
            started: self != ProposeState::NotStarted,
            finished: matches!(self, ProposeState::Done | ProposeState::Canceled),
            cancelled: matches!(self, ProposeState::Canceling | ProposeState::Canceled),
            erroneous: false,
        }
    }
}

/// FIPA Propose Protocol Implementation
#[derive(Debug)]
pub struct ProposeProtocol {
    engine: ProtocolEngine,
    state: ProposeState,
    proposal: Option<AclMessage>,
    answer: Option<AclMessage>,
    result: Option<AclMessage>,
}

impl ProposeProtocol {
    pub fn new(host: Arc<dyn AclHost>, settings: &ProtocolSettings) -> Self {
        Self {
            engine: ProtocolEngine::new(FipaProtocol::Propose, host, settings),
            state: ProposeState::NotStarted,
            proposal: None,
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

    pub fn current_state(&self) -> ProposeState {
        self.state
    }

    pub fn engine_mut(&mut self) -> &mut ProtocolEngine {
        &mut self.engine
    }

    pub fn proposal(&self) -> Option<&AclMessage> {
        self.proposal.as_ref()
    }

    /// Participant's answer as seen by the initiator
    pub fn answer(&self) -> Option<&AclMessage> {
        self.answer.as_ref()
    }

    /// Reaction to a cancel as seen by the initiator
    pub fn result(&self) -> Option<&AclMessage> {
        self.result.as_ref()
    }

    fn set_state(&mut self, state: ProposeState) {
        self.engine
            .transition(ProtocolState::Propose(self.state), ProtocolState::Propose(state));
        self.state = state;
    }

    fn require_state(&mut self, operation: &'static str, ok: bool) -> Result<(), ProtocolError> {
        self.engine
            .require_state(operation, ProtocolState::Propose(self.state), ok)
    }

    fn in_progress(&self) -> bool {
        self.state.flags().started && !self.state.flags().finished
    }

    pub fn propose(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "propose";
        self.engine.require_role(OP, Role::Initiator)?;
        self.require_state(OP, self.state == ProposeState::NotStarted)?;

        let content = content.into();
        self.engine.send(OP, content.clone(), Performative::Propose)?;
        self.proposal = Some(AclMessage {
            performative: Performative::Propose,
            content,
            ..Default::default()
        });
        self.set_state(ProposeState::WaitingAnswer);
        Ok(())
    }

    /// Poll for the proposal; once received it is returned on every call
    pub fn get_propose(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_propose";
        self.engine.require_role(OP, Role::Participant).ok()?;
        if self.state != ProposeState::NotStarted {
            return self.proposal.clone();
        }

        let message = self.engine.poll(OP, &[Performative::Propose])?;
        self.proposal = Some(message.clone());
        self.set_state(ProposeState::WaitingPropose);
        Some(message)
    }

    pub fn accept(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        self.send_answer("accept", content.into(), Performative::AcceptProposal)
    }

    pub fn reject(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        self.send_answer("reject", content.into(), Performative::RejectProposal)
    }

    fn send_answer(
        &mut self,
        operation: &'static str,
        content: Vec<u8>,
        performative: Performative,
    ) -> Result<(), ProtocolError> {
        self.engine.require_role(operation, Role::Participant)?;
        self.require_state(operation, self.state == ProposeState::WaitingPropose)?;
        self.engine.send(operation, content, performative)?;
        self.set_state(ProposeState::Done);
        Ok(())
    }

    /// Poll for `accept-proposal`, `reject-proposal` or `not-understood`;
    /// once received it is returned on every call
    pub fn get_answer(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_answer";
        self.engine.require_role(OP, Role::Initiator).ok()?;
        if let Some(answer) = &self.answer {
            return Some(answer.clone());
        }
        self.require_state(OP, self.state == ProposeState::WaitingAnswer)
            .ok()?;

        let message = self.engine.poll(
            OP,
            &[
                Performative::AcceptProposal,
                Performative::RejectProposal,
                Performative::NotUnderstood,
            ],
        )?;
        self.set_state(ProposeState::Done);
        self.answer = Some(message.clone());
        Some(message)
    }

    /// Withdraw the proposal
    pub fn cancel(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "cancel";
        self.engine.require_role(OP, Role::Initiator)?;
        let ok = self.in_progress() && self.state != ProposeState::Canceling;
        self.require_state(OP, ok)?;
        self.engine.send(OP, content.into(), Performative::Cancel)?;
        self.set_state(ProposeState::Canceling);
        Ok(())
    }

    /// Poll for a `cancel` from the initiator
    pub fn get_cancel(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_cancel";
        self.engine.require_role(OP, Role::Participant).ok()?;
        let ok = self.in_progress() && self.state != ProposeState::Canceling;
        self.require_state(OP, ok).ok()?;

        let message = self.engine.poll(OP, &[Performative::Cancel])?;
        self.set_state(ProposeState::Canceling);
        Some(message)
    }

    /// Acknowledge a cancellation
    pub fn inform_done(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "inform_done";
        self.engine.require_role(OP, Role::Participant)?;
        self.require_state(OP, self.state == ProposeState::Canceling)?;
        self.engine.send(OP, content.into(), Performative::Inform)?;
        self.set_state(ProposeState::Canceled);
        Ok(())
    }

    /// Report that a cancellation could not be honoured
    pub fn failure(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "failure";
        self.engine.require_role(OP, Role::Participant)?;
        self.require_state(OP, self.state == ProposeState::Canceling)?;
        self.engine.send(OP, content.into(), Performative::Failure)?;
        self.set_state(ProposeState::Done);
        Ok(())
    }

    /// Poll for the participant's reaction to a cancel; repeats return it again
    pub fn get_result(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_result";
        self.engine.require_role(OP, Role::Initiator).ok()?;
        if let Some(result) = &self.result {
            return Some(result.clone());
        }
        self.require_state(OP, self.state == ProposeState::Canceling)
            .ok()?;

        let message = self
            .engine
            .poll(OP, &[Performative::Inform, Performative::Failure])?;
        match message.performative {
            Performative::Inform => self.set_state(ProposeState::Canceled),
            _ => self.set_state(ProposeState::Done),
        }
        self.result = Some(message.clone());
        Some(message)
    }

    pub fn not_understood(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "not_understood";
        self.engine.require_initiated(OP)?;
        self.require_state(OP, self.in_progress())?;
        self.engine.send(OP, content.into(), Performative::NotUnderstood)?;
        self.set_state(ProposeState::Done);
        Ok(())
    }

    pub fn get_not_understood(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_not_understood";
        self.engine.require_initiated(OP).ok()?;
        self.require_state(OP, self.in_progress()).ok()?;

        let message = self.engine.poll(OP, &[Performative::NotUnderstood])?;
        self.set_state(ProposeState::Done);
        Some(message)
    }
}

impl InteractionProtocol for ProposeProtocol {
    fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    fn state(&self) -> ProtocolState {
        ProtocolState::Propose(self.state)
    }
}
