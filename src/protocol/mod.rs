// protocol/mod.rs - FIPA Protocol Implementations

//! FIPA interaction protocol state machines.
//!
//! - `QueryProtocol` - query-if / query-ref with agree, refuse and result
//! - `ProposeProtocol` - propose, accept or reject, with a cancel branch
//! - `RequestProtocol` - request an action and wait for its outcome
//! - `ContractNetProtocol` - task allocation through bidding
//!
//! Every protocol keeps its own state enum on top of a shared
//! [`ProtocolEngine`]. Operations are gated on role and state; a rejected
//! operation records a [`ProtocolError`] in the conversation's error log
//! and leaves the state untouched.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use fipa_acl_engine::config::{AgentSettings, ProtocolSettings};
//! use fipa_acl_engine::platform::LocalPlatform;
//! use fipa_acl_engine::protocol::{InteractionProtocol, RequestProtocol, RequestState};
//!
//! let platform = Arc::new(LocalPlatform::new());
//! let settings = ProtocolSettings::default();
//! let client = Arc::new(platform.agent("client", &AgentSettings::default()));
//! let server = Arc::new(platform.agent("server", &AgentSettings::default()));
//!
//! let mut request = RequestProtocol::new(client, &settings);
//! request.initiate("client".into(), "server".into()).unwrap();
//! let mut serve = RequestProtocol::new(server, &settings);
//! serve.initiate_as_participant().unwrap();
//!
//! request.request("(open valve-3)").unwrap();
//! serve.get_request().unwrap();
//! serve.agree("").unwrap();
//! serve.inform_done().unwrap();
//!
//! request.get_answer().unwrap();
//! request.get_result().unwrap();
//! assert_eq!(request.current_state(), RequestState::DoneWithoutResult);
//! assert!(request.is_finished());
//! ```

mod contract_net;
mod propose;
mod query;
mod request;
mod state_machine;

use std::sync::Arc;

pub use contract_net::{Bid, BidStatus, ContractNetProtocol, ContractNetState};
pub use propose::{ProposeProtocol, ProposeState};
pub use query::{QueryProtocol, QueryReply, QueryState};
pub use request::{RequestProtocol, RequestState};
pub use state_machine::{
    InteractionProtocol, ProtocolEngine, ProtocolError, ProtocolState, Role, StateFlags,
};

use crate::acl_message::FipaProtocol;
use crate::config::ProtocolSettings;
use crate::platform::AclHost;

/// A conversation of any supported protocol kind
#[derive(Debug)]
pub enum Conversation {
    Query(QueryProtocol),
    Propose(ProposeProtocol),
    Request(RequestProtocol),
    ContractNet(ContractNetProtocol),
}

impl Conversation {
    /// Fresh, uninitiated conversation; `None` for `FipaProtocol::None`
    pub fn new(
        kind: FipaProtocol,
        host: Arc<dyn AclHost>,
        settings: &ProtocolSettings,
    ) -> Option<Self> {
        let conversation = match kind {
            FipaProtocol::Query => Conversation::Query(QueryProtocol::new(host, settings)),
            FipaProtocol::Propose => Conversation::Propose(ProposeProtocol::new(host, settings)),
            FipaProtocol::Request => Conversation::Request(RequestProtocol::new(host, settings)),
            FipaProtocol::ContractNet => {
                Conversation::ContractNet(ContractNetProtocol::new(host, settings))
            }
            FipaProtocol::None => return None,
        };
        Some(conversation)
    }

    pub fn engine_mut(&mut self) -> &mut ProtocolEngine {
        match self {
            Conversation::Query(p) => p.engine_mut(),
            Conversation::Propose(p) => p.engine_mut(),
            Conversation::Request(p) => p.engine_mut(),
            Conversation::ContractNet(p) => p.engine_mut(),
        }
    }
}

impl InteractionProtocol for Conversation {
    fn engine(&self) -> &ProtocolEngine {
        match self {
            Conversation::Query(p) => p.engine(),
            Conversation::Propose(p) => p.engine(),
            Conversation::Request(p) => p.engine(),
            Conversation::ContractNet(p) => p.engine(),
        }
    }

    fn state(&self) -> ProtocolState {
        match self {
            Conversation::Query(p) => p.state(),
            Conversation::Propose(p) => p.state(),
            Conversation::Request(p) => p.state(),
            Conversation::ContractNet(p) => p.state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentSettings;
    use crate::platform::LocalPlatform;

    #[test]
    fn test_factory_covers_every_kind() {
        let platform = Arc::new(LocalPlatform::new());
        let host: Arc<dyn AclHost> = Arc::new(platform.agent("a", &AgentSettings::default()));
        let settings = ProtocolSettings::default();

        for kind in [
            FipaProtocol::Query,
            FipaProtocol::Propose,
            FipaProtocol::Request,
            FipaProtocol::ContractNet,
        ] {
            let conversation = Conversation::new(kind, Arc::clone(&host), &settings).unwrap();
            assert_eq!(conversation.kind(), kind);
            assert_eq!(conversation.role(), Role::Unset);
            assert!(!conversation.state().is_started());
            assert!(conversation.errors().is_empty());
        }
        assert!(Conversation::new(FipaProtocol::None, host, &settings).is_none());
    }

    #[test]
    fn test_contract_net_takes_configured_limit() {
        let platform = Arc::new(LocalPlatform::new());
        let host: Arc<dyn AclHost> = Arc::new(platform.agent("a", &AgentSettings::default()));
        let settings = ProtocolSettings {
            contract_net_max_participants: 5,
            ..Default::default()
        };
        let mut conversation = Conversation::new(FipaProtocol::ContractNet, host, &settings).unwrap();
        assert_eq!(conversation.engine().maximum_participants(), 5);
        assert_eq!(conversation.engine_mut().maximum_participants(), 5);
    }
}
