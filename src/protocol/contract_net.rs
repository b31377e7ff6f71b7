// protocol/contract_net.rs - FIPA Contract Net Protocol

use std::sync::Arc;

use super::state_machine::*;
use crate::acl_message::{AclMessage, AgentAddress, FipaProtocol, Performative};
use crate::config::ProtocolSettings;
use crate::platform::AclHost;

/// FIPA Contract Net Protocol States
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractNetState {
    NotStarted,
    /// Initiator: CFP out, collecting bids
    WaitingProposals,
    /// Initiator: bidding closed, deciding on each proposal
    EvaluatingProposals,
    /// Initiator: waiting for accepted bidders to report
    WaitingResults,
    /// Participant: CFP received
    SendingProposal,
    /// Participant: proposal sent
    WaitingAnswer,
    /// Participant: proposal accepted, task to perform
    SendingResult,
    Done,
    Canceled,
}

impl ContractNetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractNetState::NotStarted => "not_started",
            ContractNetState::WaitingProposals => "waiting_proposals",
            ContractNetState::EvaluatingProposals => "evaluating_proposals",
            ContractNetState::WaitingResults => "waiting_results",
            ContractNetState::SendingProposal => "sending_proposal",
            ContractNetState::WaitingAnswer => "waiting_answer",
            ContractNetState::SendingResult => "sending_result",
            ContractNetState::Done => "done",
            ContractNetState::Canceled => "canceled",
        }
    }

    pub fn flags(self) -> StateFlags {
        StateFlags {
            started: self != ContractNetState::NotStarted,
            finished: matches!(self, ContractNetState::Done | ContractNetState::Canceled),
            cancelled: self == ContractNetState::Canceled,
            erroneous: false,
        }
    }
}

/// Where a single bidder stands in the auction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BidStatus {
    /// No answer to the CFP yet
    Pending,
    Proposed,
    Refused,
    NotUnderstood,
    Accepted,
    Rejected,
    /// Accepted and reported success
    Informed,
    /// Accepted and reported failure
    Failed,
    /// Silent when bidding closed; sent a reject in advance
    Expired,
}

/// Initiator-side record for one participant
#[derive(Debug, Clone)]
pub struct Bid {
    pub bidder: AgentAddress,
    pub status: BidStatus,
    pub proposal: Option<AclMessage>,
    pub result: Option<AclMessage>,
}

impl Bid {
    fn pending(bidder: AgentAddress) -> Self {
        Self {
            bidder,
            status: BidStatus::Pending,
            proposal: None,
            result: None,
        }
    }
}

/// FIPA Contract Net Protocol Implementation
#[derive(Debug)]
pub struct ContractNetProtocol {
    engine: ProtocolEngine,
    state: ContractNetState,
    /// CFP as sent (initiator) or received (participant)
    cfp: Option<AclMessage>,
    bids: Vec<Bid>,
}

impl ContractNetProtocol {
    pub fn new(host: Arc<dyn AclHost>, settings: &ProtocolSettings) -> Self {
        let engine = ProtocolEngine::new(FipaProtocol::ContractNet, host, settings)
            .with_maximum_participants(settings.contract_net_max_participants);
        Self {
            engine,
            state: ContractNetState::NotStarted,
            cfp: None,
            bids: Vec::new(),
        }
    }

    pub fn initiate_with(
        &mut self,
        initiator: AgentAddress,
        participants: &[AgentAddress],
    ) -> Result<(), ProtocolError> {
        self.engine.initiate_with(initiator, participants)
    }

    pub fn initiate_as_participant(&mut self) -> Result<(), ProtocolError> {
        self.engine.initiate_as_participant()
    }

    pub fn current_state(&self) -> ContractNetState {
        self.state
    }

    pub fn engine_mut(&mut self) -> &mut ProtocolEngine {
        &mut self.engine
    }

    pub fn cfp_message(&self) -> Option<&AclMessage> {
        self.cfp.as_ref()
    }

    pub fn bids(&self) -> &[Bid] {
        &self.bids
    }

    pub fn bid(&self, bidder: &AgentAddress) -> Option<&Bid> {
        self.bids.iter().find(|b| &b.bidder == bidder)
    }

    /// Bidders that proposed and have not been decided on yet
    pub fn open_proposals(&self) -> impl Iterator<Item = &Bid> {
        self.bids.iter().filter(|b| b.status == BidStatus::Proposed)
    }

    fn set_state(&mut self, state: ContractNetState) {
        self.engine.transition(
            ProtocolState::ContractNet(self.state),
            ProtocolState::ContractNet(state),
        );
        self.state = state;
    }

    fn require_state(&mut self, operation: &'static str, ok: bool) -> Result<(), ProtocolError> {
        self.engine
            .require_state(operation, ProtocolState::ContractNet(self.state), ok)
    }

    fn in_progress(&self) -> bool {
        self.state.flags().started && !self.state.flags().finished
    }

    fn addresses_with(&self, status: BidStatus) -> Vec<AgentAddress> {
        self.bids
            .iter()
            .filter(|b| b.status == status)
            .map(|b| b.bidder.clone())
            .collect()
    }

    fn bid_mut(&mut self, bidder: &AgentAddress) -> Option<&mut Bid> {
        self.bids.iter_mut().find(|b| &b.bidder == bidder)
    }

    /// Move on from evaluation once nothing is left to decide
    fn after_evaluation(&mut self) {
        if self.open_proposals().next().is_some() {
            return;
        }
        if self.bids.iter().any(|b| b.status == BidStatus::Accepted) {
            self.set_state(ContractNetState::WaitingResults);
        } else {
            self.set_state(ContractNetState::Done);
        }
    }

    // Initiator operations

    /// Send the call for proposals to every participant
    pub fn cfp(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "cfp";
        self.engine.require_role(OP, Role::Initiator)?;
        self.require_state(OP, self.state == ContractNetState::NotStarted)?;

        let content = content.into();
        self.engine.send(OP, content.clone(), Performative::Cfp)?;
        self.cfp = Some(AclMessage {
            performative: Performative::Cfp,
            content,
            ..Default::default()
        });
        self.bids = self
            .engine
            .participants()
            .iter()
            .cloned()
            .map(Bid::pending)
            .collect();
        self.set_state(ContractNetState::WaitingProposals);
        Ok(())
    }

    /// Collect every bid that has arrived so far.
    ///
    /// Bidding closes by itself once every participant has answered.
    pub fn get_proposals(&mut self) -> Vec<AclMessage> {
        const OP: &str = "get_proposals";
        let mut received = Vec::new();
        if self.engine.require_role(OP, Role::Initiator).is_err()
            || self
                .require_state(OP, self.state == ContractNetState::WaitingProposals)
                .is_err()
        {
            return received;
        }

        loop {
            let pending = self.addresses_with(BidStatus::Pending);
            if pending.is_empty() {
                break;
            }
            let Some(message) = self.engine.poll_with(OP, &|m| {
                matches!(
                    m.performative,
                    Performative::Propose | Performative::Refuse | Performative::NotUnderstood
                ) && m.sender.as_ref().is_some_and(|s| pending.contains(s))
            }) else {
                break;
            };

            if let Some(bid) = message.sender.as_ref().and_then(|s| self.bids.iter_mut().find(|b| &b.bidder == s)) {
                bid.status = match message.performative {
                    Performative::Propose => BidStatus::Proposed,
                    Performative::Refuse => BidStatus::Refused,
                    _ => BidStatus::NotUnderstood,
                };
                if bid.status == BidStatus::Proposed {
                    bid.proposal = Some(message.clone());
                }
            }
            received.push(message);
        }

        if self.bids.iter().all(|b| b.status != BidStatus::Pending) {
            self.close_evaluation_entry();
        }
        received
    }

    /// Stop waiting for late bidders.
    ///
    /// Every bidder that has not answered yet gets a `reject-proposal`, so a
    /// proposal sent after this point still ends its conversation.
    pub fn close_bidding(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "close_bidding";
        self.engine.require_role(OP, Role::Initiator)?;
        self.require_state(OP, self.state == ContractNetState::WaitingProposals)?;

        let late = self.addresses_with(BidStatus::Pending);
        if !late.is_empty() {
            self.engine
                .send_to(OP, content.into(), Performative::RejectProposal, &late)?;
            for bid in self.bids.iter_mut().filter(|b| b.status == BidStatus::Pending) {
                bid.status = BidStatus::Expired;
            }
        }
        self.close_evaluation_entry();
        Ok(())
    }

    fn close_evaluation_entry(&mut self) {
        if self.open_proposals().next().is_some() {
            self.set_state(ContractNetState::EvaluatingProposals);
        } else {
            self.set_state(ContractNetState::Done);
        }
    }

    pub fn accept_proposal(
        &mut self,
        bidder: &AgentAddress,
        content: impl Into<Vec<u8>>,
    ) -> Result<(), ProtocolError> {
        self.decide(
            "accept_proposal",
            bidder,
            content.into(),
            Performative::AcceptProposal,
            BidStatus::Accepted,
        )
    }

    pub fn reject_proposal(
        &mut self,
        bidder: &AgentAddress,
        content: impl Into<Vec<u8>>,
    ) -> Result<(), ProtocolError> {
        self.decide(
            "reject_proposal",
            bidder,
            content.into(),
            Performative::RejectProposal,
            BidStatus::Rejected,
        )
    }

    fn decide(
        &mut self,
        operation: &'static str,
        bidder: &AgentAddress,
        content: Vec<u8>,
        performative: Performative,
        status: BidStatus,
    ) -> Result<(), ProtocolError> {
        self.engine.require_role(operation, Role::Initiator)?;
        self.require_state(operation, self.state == ContractNetState::EvaluatingProposals)?;

        let proposed = self
            .bid(bidder)
            .is_some_and(|b| b.status == BidStatus::Proposed);
        if !proposed {
            return Err(self.engine.fail(ProtocolError::InvalidReply {
                operation,
                reason: format!("{bidder} has no open proposal"),
            }));
        }

        self.engine
            .send_to(operation, content, performative, std::slice::from_ref(bidder))?;
        if let Some(bid) = self.bid_mut(bidder) {
            bid.status = status;
        }
        self.after_evaluation();
        Ok(())
    }

    /// Collect reports from accepted bidders
    pub fn get_results(&mut self) -> Vec<AclMessage> {
        const OP: &str = "get_results";
        let mut received = Vec::new();
        if self.engine.require_role(OP, Role::Initiator).is_err()
            || self
                .require_state(OP, self.state == ContractNetState::WaitingResults)
                .is_err()
        {
            return received;
        }

        loop {
            let accepted = self.addresses_with(BidStatus::Accepted);
            if accepted.is_empty() {
                break;
            }
            let Some(message) = self.engine.poll_with(OP, &|m| {
                matches!(m.performative, Performative::Inform | Performative::Failure)
                    && m.sender.as_ref().is_some_and(|s| accepted.contains(s))
            }) else {
                break;
            };

            if let Some(bid) = message.sender.as_ref().and_then(|s| self.bids.iter_mut().find(|b| &b.bidder == s)) {
                bid.status = if message.performative == Performative::Inform {
                    BidStatus::Informed
                } else {
                    BidStatus::Failed
                };
                bid.result = Some(message.clone());
            }
            received.push(message);
        }

        if self.addresses_with(BidStatus::Accepted).is_empty() {
            self.set_state(ContractNetState::Done);
        }
        received
    }

    pub fn cancel(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "cancel";
        self.engine.require_role(OP, Role::Initiator)?;
        self.require_state(OP, self.in_progress())?;
        self.engine.send(OP, content.into(), Performative::Cancel)?;
        self.set_state(ContractNetState::Canceled);
        Ok(())
    }

    // Participant operations

    /// Poll for the CFP; once received it is returned on every call
    pub fn get_cfp(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_cfp";
        self.engine.require_role(OP, Role::Participant).ok()?;
        if self.state != ContractNetState::NotStarted {
            return self.cfp.clone();
        }

        let message = self.engine.poll(OP, &[Performative::Cfp])?;
        self.cfp = Some(message.clone());
        self.set_state(ContractNetState::SendingProposal);
        Some(message)
    }

    pub fn propose(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "propose";
        self.engine.require_role(OP, Role::Participant)?;
        self.require_state(OP, self.state == ContractNetState::SendingProposal)?;
        self.engine.send(OP, content.into(), Performative::Propose)?;
        self.set_state(ContractNetState::WaitingAnswer);
        Ok(())
    }

    pub fn refuse(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "refuse";
        self.engine.require_role(OP, Role::Participant)?;
        self.require_state(OP, self.state == ContractNetState::SendingProposal)?;
        self.engine.send(OP, content.into(), Performative::Refuse)?;
        self.set_state(ContractNetState::Done);
        Ok(())
    }

    pub fn get_answer(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_answer";
        self.engine.require_role(OP, Role::Participant).ok()?;
        self.require_state(OP, self.state == ContractNetState::WaitingAnswer)
            .ok()?;

        let message = self.engine.poll(
            OP,
            &[Performative::AcceptProposal, Performative::RejectProposal],
        )?;
        if message.performative == Performative::AcceptProposal {
            self.set_state(ContractNetState::SendingResult);
        } else {
            self.set_state(ContractNetState::Done);
        }
        Some(message)
    }

    pub fn inform(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        self.report("inform", content.into(), Performative::Inform)
    }

    pub fn failure(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        self.report("failure", content.into(), Performative::Failure)
    }

    fn report(
        &mut self,
        operation: &'static str,
        content: Vec<u8>,
        performative: Performative,
    ) -> Result<(), ProtocolError> {
        self.engine.require_role(operation, Role::Participant)?;
        self.require_state(operation, self.state == ContractNetState::SendingResult)?;
        self.engine.send(operation, content, performative)?;
        self.set_state(ContractNetState::Done);
        Ok(())
    }

    pub fn get_cancel(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_cancel";
        self.engine.require_role(OP, Role::Participant).ok()?;
        self.require_state(OP, self.in_progress()).ok()?;

        let message = self.engine.poll(OP, &[Performative::Cancel])?;
        self.set_state(ContractNetState::Canceled);
        Some(message)
    }

    // Either role

    pub fn not_understood(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "not_understood";
        self.engine.require_initiated(OP)?;
        self.require_state(OP, self.in_progress())?;
        self.engine.send(OP, content.into(), Performative::NotUnderstood)?;
        self.set_state(ContractNetState::Done);
        Ok(())
    }

    pub fn get_not_understood(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_not_understood";
        self.engine.require_initiated(OP).ok()?;
        self.require_state(OP, self.in_progress()).ok()?;

        let message = self.engine.poll(OP, &[Performative::NotUnderstood])?;
        self.set_state(ContractNetState::Done);
        Some(message)
    }
}

impl InteractionProtocol for ContractNetProtocol {
    fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    fn state(&self) -> ProtocolState {
        ProtocolState::ContractNet(self.state)
    }
}
