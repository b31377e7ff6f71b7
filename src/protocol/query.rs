// protocol/query.rs - FIPA Query Protocol

use std::sync::Arc;

use super::state_machine::*;
use crate::acl_message::{AclMessage, AgentAddress, FipaProtocol, Performative};
use crate::config::ProtocolSettings;
use crate::platform::AclHost;

/// FIPA Query Protocol States
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryState {
    NotStarted,
    /// Initiator sent the query
    WaitingAnswer,
    /// Participant received the query
    SendingAnswer,
    /// Participant agreed and owes a result
    SendingResult,
    /// Initiator got an agreement
    WaitingResult,
    Done,
}

impl QueryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryState::NotStarted => "not_started",
            QueryState::WaitingAnswer => "waiting_answer",
            QueryState::SendingAnswer => "sending_answer",
            QueryState::SendingResult => "sending_result",
            QueryState::WaitingResult => "waiting_result",
            QueryState::Done => "done",
        }
    }

    pub fn flags(self) -> StateFlags {
        StateFlags {
            started: self != QueryState::NotStarted,
            finished: self == QueryState::Done,
            cancelled: false,
            erroneous: false,
        }
    }
}

/// Answer to a query: a truth value for `query-if`, a referent for `query-ref`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryReply {
    Truth(bool),
    Referent(Vec<u8>),
}

impl QueryReply {
    fn into_content(self) -> Vec<u8> {
        match self {
            QueryReply::Truth(true) => b"true".to_vec(),
            QueryReply::Truth(false) => b"false".to_vec(),
            QueryReply::Referent(bytes) => bytes,
        }
    }
}

impl From<bool> for QueryReply {
    fn from(value: bool) -> Self {
        QueryReply::Truth(value)
    }
}

impl From<Vec<u8>> for QueryReply {
    fn from(value: Vec<u8>) -> Self {
        QueryReply::Referent(value)
    }
}

impl From<&str> for QueryReply {
    fn from(value: &str) -> Self {
        QueryReply::Referent(value.as_bytes().to_vec())
    }
}

impl From<String> for QueryReply {
    fn from(value: String) -> Self {
        QueryReply::Referent(value.into_bytes())
    }
}

/// FIPA Query Protocol Implementation
#[derive(Debug)]
pub struct QueryProtocol {
    engine: ProtocolEngine,
    state: QueryState,
    query: Option<AclMessage>,
    answer: Option<AclMessage>,
    result: Option<AclMessage>,
}

impl QueryProtocol {
    pub fn new(host: Arc<dyn AclHost>, settings: &ProtocolSettings) -> Self {
        Self {
            engine: ProtocolEngine::new(FipaProtocol::Query, host, settings),
            state: QueryState::NotStarted,
            query: None,
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

    pub fn current_state(&self) -> QueryState {
        self.state
    }

    pub fn engine_mut(&mut self) -> &mut ProtocolEngine {
        &mut self.engine
    }

    /// Query sent (initiator) or received (participant)
    pub fn query_message(&self) -> Option<&AclMessage> {
        self.query.as_ref()
    }

    /// `agree`, `refuse` or `not-understood` received by the initiator
    pub fn answer(&self) -> Option<&AclMessage> {
        self.answer.as_ref()
    }

    /// `inform` or `failure` received by the initiator
    pub fn result(&self) -> Option<&AclMessage> {
        self.result.as_ref()
    }

    fn set_state(&mut self, state: QueryState) {
        self.engine
            .transition(ProtocolState::Query(self.state), ProtocolState::Query(state));
        self.state = state;
    }

    fn require_state(&mut self, operation: &'static str, allowed: &[QueryState]) -> Result<(), ProtocolError> {
        let ok = allowed.contains(&self.state);
        self.engine
            .require_state(operation, ProtocolState::Query(self.state), ok)
    }

    fn in_progress(&self) -> bool {
        self.state.flags().started && !self.state.flags().finished
    }

    /// Send a `query-if` or `query-ref`
    pub fn query(
        &mut self,
        content: impl Into<Vec<u8>>,
        performative: Performative,
    ) -> Result<(), ProtocolError> {
        const OP: &str = "query";
        self.engine.require_role(OP, Role::Initiator)?;
        self.require_state(OP, &[QueryState::NotStarted])?;
        if !matches!(performative, Performative::QueryIf | Performative::QueryRef) {
            return Err(self.engine.fail(ProtocolError::WrongPerformative {
                operation: OP,
                performative,
            }));
        }

        let content = content.into();
        self.engine.send(OP, content.clone(), performative)?;
        self.query = Some(AclMessage {
            performative,
            content,
            ..Default::default()
        });
        self.set_state(QueryState::WaitingAnswer);
        Ok(())
    }

    /// Poll for the query; once received it is returned on every call
    pub fn get_query(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_query";
        self.engine.require_role(OP, Role::Participant).ok()?;
        if self.state != QueryState::NotStarted {
            return self.query.clone();
        }

        let message = self
            .engine
            .poll(OP, &[Performative::QueryIf, Performative::QueryRef])?;
        self.query = Some(message.clone());
        self.set_state(QueryState::SendingAnswer);
        Some(message)
    }

    pub fn agree(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "agree";
        self.engine.require_role(OP, Role::Participant)?;
        self.require_state(OP, &[QueryState::SendingAnswer])?;
        self.engine.send(OP, content.into(), Performative::Agree)?;
        self.set_state(QueryState::SendingResult);
        Ok(())
    }

    pub fn refuse(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "refuse";
        self.engine.require_role(OP, Role::Participant)?;
        self.require_state(OP, &[QueryState::SendingAnswer])?;
        self.engine.send(OP, content.into(), Performative::Refuse)?;
        self.set_state(QueryState::Done);
        Ok(())
    }

    /// Poll for `agree`, `refuse` or `not-understood`; once received it is
    /// returned on every call
    pub fn get_answer(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_answer";
        self.engine.require_role(OP, Role::Initiator).ok()?;
        if let Some(answer) = &self.answer {
            return Some(answer.clone());
        }
        self.require_state(OP, &[QueryState::WaitingAnswer]).ok()?;

        let message = self.engine.poll(
            OP,
            &[
                Performative::Agree,
                Performative::Refuse,
                Performative::NotUnderstood,
            ],
        )?;
        match message.performative {
            Performative::Agree => self.set_state(QueryState::WaitingResult),
            _ => self.set_state(QueryState::Done),
        }
        self.answer = Some(message.clone());
        Some(message)
    }

    /// Send the result; the reply kind must match the query kind
    pub fn inform(&mut self, reply: impl Into<QueryReply>) -> Result<(), ProtocolError> {
        const OP: &str = "inform";
        self.engine.require_role(OP, Role::Participant)?;
        self.require_state(OP, &[QueryState::SendingResult])?;

        let reply = reply.into();
        let asked = self.query.as_ref().map(|q| q.performative);
        match (asked, &reply) {
            (Some(Performative::QueryIf), QueryReply::Truth(_))
            | (Some(Performative::QueryRef), QueryReply::Referent(_)) => {}
            (Some(Performative::QueryIf), QueryReply::Referent(_)) => {
                return Err(self.engine.fail(ProtocolError::InvalidReply {
                    operation: OP,
                    reason: "query-if must be answered with a truth value".to_string(),
                }));
            }
            _ => {
                return Err(self.engine.fail(ProtocolError::InvalidReply {
                    operation: OP,
                    reason: "query-ref must be answered with a referent".to_string(),
                }));
            }
        }

        self.engine.send(OP, reply.into_content(), Performative::Inform)?;
        self.set_state(QueryState::Done);
        Ok(())
    }

    pub fn failure(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "failure";
        self.engine.require_role(OP, Role::Participant)?;
        self.require_state(OP, &[QueryState::SendingResult])?;
        self.engine.send(OP, content.into(), Performative::Failure)?;
        self.set_state(QueryState::Done);
        Ok(())
    }

    /// Poll for `inform` or `failure`; once received it is returned on every call
    pub fn get_result(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_result";
        self.engine.require_role(OP, Role::Initiator).ok()?;
        if let Some(result) = &self.result {
            return Some(result.clone());
        }
        self.require_state(OP, &[QueryState::WaitingResult]).ok()?;

        let message = self
            .engine
            .poll(OP, &[Performative::Inform, Performative::Failure])?;
        self.set_state(QueryState::Done);
        self.result = Some(message.clone());
        Some(message)
    }

    pub fn not_understood(&mut self, content: impl Into<Vec<u8>>) -> Result<(), ProtocolError> {
        const OP: &str = "not_understood";
        self.engine.require_initiated(OP)?;
        let ok = self.in_progress();
        self.engine
            .require_state(OP, ProtocolState::Query(self.state), ok)?;
        self.engine.send(OP, content.into(), Performative::NotUnderstood)?;
        self.set_state(QueryState::Done);
        Ok(())
    }

    pub fn get_not_understood(&mut self) -> Option<AclMessage> {
        const OP: &str = "get_not_understood";
        self.engine.require_initiated(OP).ok()?;
        let ok = self.in_progress();
        self.engine
            .require_state(OP, ProtocolState::Query(self.state), ok)
            .ok()?;

        let message = self.engine.poll(OP, &[Performative::NotUnderstood])?;
        self.set_state(QueryState::Done);
        Some(message)
    }
}

impl InteractionProtocol for QueryProtocol {
    fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    fn state(&self) -> ProtocolState {
        ProtocolState::Query(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentSettings;
    use crate::platform::LocalPlatform;

    fn pair() -> (QueryProtocol, QueryProtocol) {
        let platform = Arc::new(LocalPlatform::new());
        let settings = ProtocolSettings::default();
        let mut initiator = QueryProtocol::new(
            Arc::new(platform.agent("asker", &AgentSettings::default())),
            &settings,
        );
        let mut participant = QueryProtocol::new(
            Arc::new(platform.agent("oracle", &AgentSettings::default())),
            &settings,
        );
        initiator.initiate("asker".into(), "oracle".into()).unwrap();
        participant.initiate("asker".into(), "oracle".into()).unwrap();
        (initiator, participant)
    }

    #[test]
    fn test_query_if_flow() {
        let (mut initiator, mut participant) = pair();

        initiator.query("(= x 5)", Performative::QueryIf).unwrap();
        assert_eq!(initiator.current_state(), QueryState::WaitingAnswer);

        let query = participant.get_query().unwrap();
        assert_eq!(query.performative, Performative::QueryIf);
        assert_eq!(query.content_str(), Some("(= x 5)"));
        assert_eq!(participant.current_state(), QueryState::SendingAnswer);

        participant.agree("").unwrap();
        assert_eq!(participant.current_state(), QueryState::SendingResult);
        participant.inform(true).unwrap();
        assert_eq!(participant.current_state(), QueryState::Done);

        assert_eq!(initiator.get_answer().unwrap().performative, Performative::Agree);
        assert_eq!(initiator.current_state(), QueryState::WaitingResult);
        let result = initiator.get_result().unwrap();
        assert_eq!(result.performative, Performative::Inform);
        assert_eq!(result.content_str(), Some("true"));
        assert_eq!(initiator.current_state(), QueryState::Done);

        assert!(initiator.errors().is_empty());
        assert!(participant.errors().is_empty());
        assert_eq!(initiator.conversation_id(), participant.conversation_id());
    }

    #[test]
    fn test_query_ref_referent() {
        let (mut initiator, mut participant) = pair();
        initiator.query("(iota ?x (price apple ?x))", Performative::QueryRef).unwrap();
        participant.get_query().unwrap();
        participant.agree("").unwrap();

        let err = participant.inform(false).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidReply { .. }));
        assert_eq!(participant.current_state(), QueryState::SendingResult);

        participant.inform("12").unwrap();
        initiator.get_answer().unwrap();
        assert_eq!(initiator.get_result().unwrap().content_str(), Some("12"));
    }

    #[test]
    fn test_refuse_ends_both_sides() {
        let (mut initiator, mut participant) = pair();
        initiator.query("q", Performative::QueryIf).unwrap();
        participant.get_query().unwrap();
        participant.refuse("busy").unwrap();
        assert_eq!(participant.current_state(), QueryState::Done);

        let answer = initiator.get_answer().unwrap();
        assert_eq!(answer.performative, Performative::Refuse);
        assert_eq!(initiator.current_state(), QueryState::Done);
    }

    #[test]
    fn test_query_needs_query_performative() {
        let (mut initiator, _) = pair();
        let err = initiator.query("q", Performative::Request).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::WrongPerformative {
                operation: "query",
                performative: Performative::Request
            }
        );
        assert_eq!(initiator.current_state(), QueryState::NotStarted);
        assert_eq!(initiator.errors().len(), 1);
    }

    #[test]
    fn test_get_query_returns_stored_query() {
        let (mut initiator, mut participant) = pair();
        assert!(participant.get_query().is_none());
        initiator.query("q", Performative::QueryIf).unwrap();
        let first = participant.get_query().unwrap();
        let again = participant.get_query().unwrap();
        assert_eq!(first, again);
        assert_eq!(participant.current_state(), QueryState::SendingAnswer);
    }

    #[test]
    fn test_answer_and_result_survive_completion() {
        let (mut initiator, mut participant) = pair();
        initiator.query("(= x 5)", Performative::QueryIf).unwrap();
        participant.get_query().unwrap();
        participant.agree("").unwrap();
        participant.inform(false).unwrap();

        let answer = initiator.get_answer().unwrap();
        let result = initiator.get_result().unwrap();
        assert_eq!(initiator.current_state(), QueryState::Done);

        assert_eq!(initiator.get_answer(), Some(answer));
        assert_eq!(initiator.get_result(), Some(result.clone()));
        assert_eq!(initiator.result(), Some(&result));
        assert_eq!(result.content_str(), Some("false"));
        assert!(initiator.errors().is_empty());
    }

    #[test]
    fn test_result_after_refusal_is_gated() {
        let (mut initiator, mut participant) = pair();
        initiator.query("q", Performative::QueryIf).unwrap();
        participant.get_query().unwrap();
        participant.refuse("").unwrap();
        initiator.get_answer().unwrap();

        assert!(initiator.get_result().is_none());
        assert_eq!(
            initiator.errors(),
            &[ProtocolError::WrongState {
                operation: "get_result",
                state: "done"
            }]
        );
    }

    #[test]
    fn test_role_gating() {
        let (mut initiator, mut participant) = pair();
        assert!(matches!(
            participant.query("q", Performative::QueryIf),
            Err(ProtocolError::WrongRole { operation: "query", .. })
        ));
        assert!(initiator.agree("").is_err());
        assert!(initiator.get_query().is_none());
        assert_eq!(initiator.current_state(), QueryState::NotStarted);
        assert_eq!(initiator.errors().len(), 2);
        assert_eq!(participant.errors().len(), 1);
    }

    #[test]
    fn test_not_understood_from_participant() {
        let (mut initiator, mut participant) = pair();
        assert!(participant.not_understood("?").is_err());

        initiator.query("garbled", Performative::QueryRef).unwrap();
        participant.get_query().unwrap();
        participant.not_understood("cannot parse").unwrap();
        assert_eq!(participant.current_state(), QueryState::Done);

        let answer = initiator.get_answer().unwrap();
        assert_eq!(answer.performative, Performative::NotUnderstood);
        assert_eq!(initiator.current_state(), QueryState::Done);
    }

    #[test]
    fn test_not_understood_from_initiator() {
        let (mut initiator, mut participant) = pair();
        initiator.query("q", Performative::QueryIf).unwrap();
        participant.get_query().unwrap();
        participant.agree("").unwrap();
        initiator.get_answer().unwrap();

        initiator.not_understood("what agreement?").unwrap();
        assert_eq!(initiator.current_state(), QueryState::Done);
        assert!(participant.get_not_understood().is_some());
        assert_eq!(participant.current_state(), QueryState::Done);
    }
}
