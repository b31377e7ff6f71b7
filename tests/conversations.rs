//! End-to-end conversations between agents on a local platform.
//!
//! Every message in these tests is encoded to bit-efficient bytes on send
//! and decoded again when the receiving protocol polls its mailbox.

use std::sync::Arc;
use std::time::Duration;

use fipa_acl_engine::acl_message::{AgentAddress, FipaProtocol, Performative};
use fipa_acl_engine::config::{AgentSettings, ProtocolSettings};
use fipa_acl_engine::platform::{AclHost, LocalPlatform};
use fipa_acl_engine::protocol::*;

struct Fixture {
    platform: Arc<LocalPlatform>,
    settings: ProtocolSettings,
}

impl Fixture {
    fn new() -> Self {
        Self::with_settings(ProtocolSettings::default())
    }

    fn with_settings(settings: ProtocolSettings) -> Self {
        Self {
            platform: Arc::new(LocalPlatform::new()),
            settings,
        }
    }

    fn host(&self, name: &str) -> Arc<dyn AclHost> {
        Arc::new(self.platform.agent(name, &AgentSettings::default()))
    }

    fn query_pair(&self) -> (QueryProtocol, QueryProtocol) {
        let mut initiator = QueryProtocol::new(self.host("asker"), &self.settings);
        initiator.initiate("asker".into(), "oracle".into()).unwrap();
        let mut participant = QueryProtocol::new(self.host("oracle"), &self.settings);
        participant.initiate_as_participant().unwrap();
        (initiator, participant)
    }

    fn propose_pair(&self) -> (ProposeProtocol, ProposeProtocol) {
        let mut initiator = ProposeProtocol::new(self.host("seller"), &self.settings);
        initiator.initiate("seller".into(), "buyer".into()).unwrap();
        let mut participant = ProposeProtocol::new(self.host("buyer"), &self.settings);
        participant.initiate_as_participant().unwrap();
        (initiator, participant)
    }

    fn request_pair(&self) -> (RequestProtocol, RequestProtocol) {
        let mut initiator = RequestProtocol::new(self.host("client"), &self.settings);
        initiator.initiate("client".into(), "server".into()).unwrap();
        let mut participant = RequestProtocol::new(self.host("server"), &self.settings);
        participant.initiate_as_participant().unwrap();
        (initiator, participant)
    }
}

#[test]
fn query_if_answered_with_truth() {
    let fixture = Fixture::new();
    let (mut asker, mut oracle) = fixture.query_pair();

    asker.query("(= x 5)", Performative::QueryIf).unwrap();
    assert_eq!(asker.current_state(), QueryState::WaitingAnswer);

    let query = oracle.get_query().unwrap();
    assert_eq!(query.performative, Performative::QueryIf);
    assert_eq!(query.content_str(), Some("(= x 5)"));
    assert_eq!(query.fipa_protocol(), FipaProtocol::Query);
    assert_eq!(oracle.current_state(), QueryState::SendingAnswer);

    oracle.agree("").unwrap();
    assert_eq!(oracle.current_state(), QueryState::SendingResult);
    oracle.inform(true).unwrap();
    assert_eq!(oracle.current_state(), QueryState::Done);

    assert_eq!(asker.get_answer().unwrap().performative, Performative::Agree);
    assert_eq!(asker.current_state(), QueryState::WaitingResult);
    let result = asker.get_result().unwrap();
    assert_eq!(result.content_str(), Some("true"));
    assert_eq!(asker.current_state(), QueryState::Done);

    assert_eq!(asker.conversation_id(), oracle.conversation_id());
    assert!(asker.errors().is_empty());
    assert!(oracle.errors().is_empty());
}

#[test]
fn proposal_rejected_with_reason() {
    let fixture = Fixture::new();
    let (mut seller, mut buyer) = fixture.propose_pair();

    seller.propose("(sell lamp 40)").unwrap();
    assert_eq!(seller.current_state(), ProposeState::WaitingAnswer);

    buyer.get_propose().unwrap();
    buyer.reject("too expensive").unwrap();
    assert_eq!(buyer.current_state(), ProposeState::Done);

    let answer = seller.get_answer().unwrap();
    assert_eq!(answer.performative, Performative::RejectProposal);
    assert_eq!(answer.content_str(), Some("too expensive"));
    assert_eq!(seller.current_state(), ProposeState::Done);
}

#[test]
fn cancel_before_proposing_is_rejected() {
    let fixture = Fixture::new();
    let (mut seller, _buyer) = fixture.propose_pair();

    let err = seller.cancel("").unwrap_err();
    assert_eq!(
        err,
        ProtocolError::WrongState {
            operation: "cancel",
            state: "not_started"
        }
    );
    assert_eq!(seller.errors(), &[err]);
    assert_eq!(seller.current_state(), ProposeState::NotStarted);
}

#[test]
fn cancelled_proposal_acknowledged() {
    let fixture = Fixture::new();
    let (mut seller, mut buyer) = fixture.propose_pair();

    seller.propose("offer").unwrap();
    buyer.get_propose().unwrap();
    seller.cancel("withdrawn").unwrap();
    assert_eq!(seller.current_state(), ProposeState::Canceling);

    buyer.get_cancel().unwrap();
    buyer.inform_done("").unwrap();
    assert_eq!(buyer.current_state(), ProposeState::Canceled);

    assert_eq!(seller.get_result().unwrap().performative, Performative::Inform);
    assert_eq!(seller.current_state(), ProposeState::Canceled);
    assert!(seller.state().is_cancelled());
}

#[test]
fn request_with_result() {
    let fixture = Fixture::new();
    let (mut client, mut server) = fixture.request_pair();

    client.request("(action server (compress report.csv))").unwrap();
    server.get_request().unwrap();
    server.agree("").unwrap();
    server.inform_result("report.csv.gz").unwrap();

    client.get_answer().unwrap();
    let result = client.get_result().unwrap();
    assert_eq!(result.content_str(), Some("report.csv.gz"));
    assert_eq!(client.current_state(), RequestState::DoneWithResult);
    assert_eq!(server.current_state(), RequestState::DoneWithResult);
}

#[test]
fn contract_net_awards_cheapest_bid() {
    let fixture = Fixture::new();
    let names = ["c1", "c2", "c3", "c4"];
    let addresses: Vec<AgentAddress> = names.iter().map(|n| AgentAddress::from(*n)).collect();

    let mut manager = ContractNetProtocol::new(fixture.host("manager"), &fixture.settings);
    manager.initiate_with("manager".into(), &addresses).unwrap();
    let mut bidders: Vec<_> = names
        .iter()
        .map(|name| {
            let mut bidder = ContractNetProtocol::new(fixture.host(name), &fixture.settings);
            bidder.initiate_as_participant().unwrap();
            bidder
        })
        .collect();

    manager.cfp("(haul 12t)").unwrap();
    let prices = [Some(70u32), Some(55), None, Some(90)];
    for (bidder, price) in bidders.iter_mut().zip(prices) {
        assert_eq!(bidder.get_cfp().unwrap().content_str(), Some("(haul 12t)"));
        match price {
            Some(price) => bidder.propose(price.to_string()).unwrap(),
            None => bidder.refuse("").unwrap(),
        }
    }

    assert_eq!(manager.get_proposals().len(), 4);
    assert_eq!(manager.current_state(), ContractNetState::EvaluatingProposals);

    let cheapest = manager
        .open_proposals()
        .min_by_key(|bid| {
            bid.proposal
                .as_ref()
                .and_then(|p| p.content_str())
                .and_then(|c| c.parse::<u32>().ok())
                .unwrap_or(u32::MAX)
        })
        .map(|bid| bid.bidder.clone())
        .unwrap();
    assert_eq!(cheapest.as_str(), "c2");

    let others: Vec<_> = manager
        .open_proposals()
        .map(|bid| bid.bidder.clone())
        .filter(|bidder| *bidder != cheapest)
        .collect();
    manager.accept_proposal(&cheapest, "").unwrap();
    for other in &others {
        manager.reject_proposal(other, "").unwrap();
    }
    assert_eq!(manager.current_state(), ContractNetState::WaitingResults);

    for bidder in bidders.iter_mut().filter(|b| !b.is_finished()) {
        bidder.get_answer().unwrap();
    }
    assert_eq!(bidders[1].current_state(), ContractNetState::SendingResult);
    bidders[1].failure("(truck broke down)").unwrap();

    assert_eq!(manager.get_results().len(), 1);
    assert_eq!(manager.current_state(), ContractNetState::Done);
    assert_eq!(manager.bid(&cheapest).unwrap().status, BidStatus::Failed);
    assert!(bidders.iter().all(|b| b.is_finished()));
}

#[test]
fn request_failure_is_finished_but_not_erroneous() {
    let fixture = Fixture::new();
    let (mut client, mut server) = fixture.request_pair();

    client.request("(action server (print report))").unwrap();
    server.get_request().unwrap();
    server.agree("").unwrap();
    server.failure("(out-of paper)").unwrap();

    client.get_answer().unwrap();
    let result = client.get_result().unwrap();
    assert_eq!(result.performative, Performative::Failure);

    for side in [&client, &server] {
        assert_eq!(side.current_state(), RequestState::ParticipantFailure);
        assert!(side.is_finished());
        assert!(!side.state().is_erroneous());
        assert!(!side.state().is_cancelled());
    }
}

#[test]
fn getters_repeat_what_was_received() {
    let fixture = Fixture::new();
    let (mut asker, mut oracle) = fixture.query_pair();

    asker.query("(= x 5)", Performative::QueryIf).unwrap();
    oracle.get_query().unwrap();
    oracle.agree("").unwrap();
    oracle.inform(true).unwrap();

    let answer = asker.get_answer().unwrap();
    let result = asker.get_result().unwrap();
    assert_eq!(asker.current_state(), QueryState::Done);

    assert_eq!(asker.get_answer(), Some(answer));
    assert_eq!(asker.get_result(), Some(result));
    assert_eq!(oracle.get_query().unwrap().content_str(), Some("(= x 5)"));
    assert!(asker.errors().is_empty());
    assert!(oracle.errors().is_empty());

    let (mut client, mut server) = fixture.request_pair();
    client.request("r").unwrap();
    server.get_request().unwrap();
    server.agree("").unwrap();
    server.inform_result("ok").unwrap();
    client.get_answer().unwrap();
    client.get_result().unwrap();
    assert_eq!(client.get_result().unwrap().content_str(), Some("ok"));
    assert!(client.errors().is_empty());
}

#[test]
fn late_bidder_is_rejected_after_close() {
    let fixture = Fixture::new();
    let addresses: Vec<AgentAddress> = vec!["a".into(), "b".into()];
    let mut manager = ContractNetProtocol::new(fixture.host("manager"), &fixture.settings);
    manager.initiate_with("manager".into(), &addresses).unwrap();
    let mut a = ContractNetProtocol::new(fixture.host("a"), &fixture.settings);
    a.initiate_as_participant().unwrap();
    let mut b = ContractNetProtocol::new(fixture.host("b"), &fixture.settings);
    b.initiate_as_participant().unwrap();

    manager.cfp("(paint fence)").unwrap();
    a.get_cfp().unwrap();
    a.propose("20").unwrap();
    assert_eq!(manager.get_proposals().len(), 1);
    manager.close_bidding("too late").unwrap();

    b.get_cfp().unwrap();
    b.propose("15").unwrap();

    manager.accept_proposal(&"a".into(), "").unwrap();
    a.get_answer().unwrap();
    a.inform("painted").unwrap();
    assert_eq!(manager.get_results().len(), 1);
    assert_eq!(manager.current_state(), ContractNetState::Done);

    let answer = b.get_answer().unwrap();
    assert_eq!(answer.performative, Performative::RejectProposal);
    assert_eq!(b.current_state(), ContractNetState::Done);
    assert_eq!(manager.bid(&"b".into()).unwrap().status, BidStatus::Expired);
}

#[test]
fn not_understood_reaching_an_accepted_proposal_is_ignored() {
    let fixture = Fixture::new();
    let (mut seller, mut buyer) = fixture.propose_pair();

    seller.propose("(sell lamp 40)").unwrap();
    buyer.get_propose().unwrap();
    buyer.accept("").unwrap();
    seller.not_understood("(which lamp)").unwrap();
    assert_eq!(seller.current_state(), ProposeState::Done);

    assert!(buyer.get_not_understood().is_none());
    assert_eq!(buyer.current_state(), ProposeState::Done);
    assert!(matches!(
        buyer.errors(),
        [ProtocolError::WrongState {
            operation: "get_not_understood",
            ..
        }]
    ));
}

#[test]
fn wrong_role_leaves_state_and_records_one_error() {
    let fixture = Fixture::new();

    let (_asker, mut oracle) = fixture.query_pair();
    assert!(oracle.query("q", Performative::QueryIf).is_err());
    assert!(oracle.get_answer().is_none());
    assert_eq!(oracle.current_state(), QueryState::NotStarted);
    assert_eq!(oracle.errors().len(), 2);

    let (mut seller, _buyer) = fixture.propose_pair();
    assert!(seller.accept("").is_err());
    assert!(seller.get_propose().is_none());
    assert_eq!(seller.current_state(), ProposeState::NotStarted);
    assert_eq!(seller.errors().len(), 2);

    let (mut client, _server) = fixture.request_pair();
    assert!(matches!(
        client.agree(""),
        Err(ProtocolError::WrongRole {
            operation: "agree",
            actual: Role::Initiator
        })
    ));
    assert_eq!(client.current_state(), RequestState::NotStarted);
    assert_eq!(client.errors().len(), 1);
}

#[test]
fn wrong_state_leaves_state_and_records_one_error() {
    let fixture = Fixture::new();
    let (mut asker, mut oracle) = fixture.query_pair();

    asker.query("q", Performative::QueryRef).unwrap();
    assert!(asker.query("again", Performative::QueryRef).is_err());
    assert_eq!(asker.current_state(), QueryState::WaitingAnswer);
    assert_eq!(asker.errors().len(), 1);

    oracle.get_query().unwrap();
    assert!(oracle.inform("early").is_err());
    assert_eq!(oracle.current_state(), QueryState::SendingAnswer);
    assert_eq!(oracle.errors().len(), 1);
}

#[test]
fn mismatched_query_reply_is_rejected() {
    let fixture = Fixture::new();
    let (mut asker, mut oracle) = fixture.query_pair();

    asker.query("(iota ?x (p ?x))", Performative::QueryRef).unwrap();
    oracle.get_query().unwrap();
    oracle.agree("").unwrap();
    assert!(matches!(
        oracle.inform(false),
        Err(ProtocolError::InvalidReply { operation: "inform", .. })
    ));
    assert_eq!(oracle.current_state(), QueryState::SendingResult);
    oracle.inform("42").unwrap();
}

#[test]
fn finished_conversations_stay_finished() {
    let fixture = Fixture::new();

    let (mut asker, mut oracle) = fixture.query_pair();
    asker.query("q", Performative::QueryIf).unwrap();
    oracle.get_query().unwrap();
    oracle.refuse("no").unwrap();
    asker.get_answer().unwrap();
    assert!(asker.is_finished() && oracle.is_finished());

    let before = (asker.state(), oracle.state());
    assert!(asker.query("q", Performative::QueryIf).is_err());
    assert_eq!(
        asker.get_answer().map(|m| m.performative),
        Some(Performative::Refuse)
    );
    assert!(asker.get_result().is_none());
    assert!(asker.not_understood("").is_err());
    assert!(oracle.agree("").is_err());
    assert!(oracle.refuse("").is_err());
    assert!(oracle.inform(true).is_err());
    assert!(oracle.failure("").is_err());
    assert!(oracle.get_not_understood().is_none());
    assert_eq!((asker.state(), oracle.state()), before);

    let (mut client, mut server) = fixture.request_pair();
    client.request("r").unwrap();
    server.get_request().unwrap();
    server.refuse("").unwrap();
    client.get_answer().unwrap();
    assert_eq!(client.current_state(), RequestState::ParticipantRefused);

    assert!(client.request("r").is_err());
    assert!(client.cancel("").is_err());
    assert!(client.get_result().is_none());
    assert!(server.agree("").is_err());
    assert!(server.inform_done().is_err());
    assert!(server.get_cancel().is_none());
    assert_eq!(client.current_state(), RequestState::ParticipantRefused);
    assert_eq!(server.current_state(), RequestState::ParticipantRefused);
}

#[test]
fn poll_after_timeout_records_error_without_transition() {
    let fixture = Fixture::with_settings(ProtocolSettings {
        timeout_ms: 20,
        ..Default::default()
    });
    let (mut client, mut server) = fixture.request_pair();

    client.request("slow").unwrap();
    server.get_request().unwrap();
    std::thread::sleep(Duration::from_millis(60));
    server.agree("").unwrap();

    assert!(client.get_answer().is_none());
    assert_eq!(client.current_state(), RequestState::WaitingParticipantDecision);
    assert!(matches!(
        client.errors(),
        [ProtocolError::TimeoutExceeded {
            operation: "get_answer",
            timeout_ms: 20,
            ..
        }]
    ));

    // the caller chooses to keep waiting
    client.engine_mut().set_timeout(Duration::from_secs(30));
    client.engine_mut().reset_started_time();
    assert_eq!(client.get_answer().unwrap().performative, Performative::Agree);
    assert_eq!(client.current_state(), RequestState::ParticipantAgreed);
}

#[test]
fn conversations_do_not_cross() {
    let fixture = Fixture::new();
    let mut first = RequestProtocol::new(fixture.host("client"), &fixture.settings);
    first.initiate("client".into(), "server".into()).unwrap();
    let mut second = RequestProtocol::new(fixture.host("client"), &fixture.settings);
    second.initiate("client".into(), "server".into()).unwrap();

    let mut server_a = RequestProtocol::new(fixture.host("server"), &fixture.settings);
    server_a.initiate_as_participant().unwrap();
    let mut server_b = RequestProtocol::new(fixture.host("server"), &fixture.settings);
    server_b.initiate_as_participant().unwrap();

    first.request("one").unwrap();
    second.request("two").unwrap();

    assert_eq!(server_a.get_request().unwrap().content_str(), Some("one"));
    assert_eq!(server_b.get_request().unwrap().content_str(), Some("two"));

    server_b.agree("").unwrap();
    assert!(first.get_answer().is_none());
    assert!(second.get_answer().is_some());
    assert_eq!(first.current_state(), RequestState::WaitingParticipantDecision);
    assert_eq!(second.current_state(), RequestState::ParticipantAgreed);
}

#[test]
fn conversation_factory_drives_any_kind() {
    let fixture = Fixture::new();
    let mut conversation =
        Conversation::new(FipaProtocol::Request, fixture.host("client"), &fixture.settings)
            .unwrap();
    conversation
        .engine_mut()
        .initiate("client".into(), "server".into())
        .unwrap();
    assert_eq!(conversation.role(), Role::Initiator);

    if let Conversation::Request(request) = &mut conversation {
        request.request("ping").unwrap();
    }
    assert_eq!(
        conversation.state(),
        ProtocolState::Request(RequestState::WaitingParticipantDecision)
    );
    assert!(conversation.conversation_id().is_some());
}
