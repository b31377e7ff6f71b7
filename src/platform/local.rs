// platform/local.rs - In-Process Agent Platform

use bytes::Bytes;
use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::{AclHost, HostError};
use crate::acl_message::{AclMessage, AclRepresentation, AgentAddress, PayloadEncoding};
use crate::config::AgentSettings;
use crate::encoding::CodecRegistry;
use crate::observability;

/// Encoded message waiting in a mailbox
#[derive(Debug, Clone)]
pub struct TransportMessage {
    pub representation: AclRepresentation,
    pub payload: Bytes,
}

/// Mailboxes for every registered agent, keyed by address
#[derive(Debug)]
pub struct LocalPlatform {
    mailboxes: DashMap<AgentAddress, Mutex<VecDeque<TransportMessage>>>,
    codecs: CodecRegistry,
}

impl Default for LocalPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalPlatform {
    /// Platform using the built-in codecs
    pub fn new() -> Self {
        Self::with_codecs(CodecRegistry::with_defaults())
    }

    pub fn with_codecs(codecs: CodecRegistry) -> Self {
        Self {
            mailboxes: DashMap::new(),
            codecs,
        }
    }

    /// Create a mailbox; returns false when the address already had one
    pub fn register(&self, address: AgentAddress) -> bool {
        match self.mailboxes.entry(address) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                debug!(address = %slot.key(), "Registering mailbox");
                slot.insert(Mutex::new(VecDeque::new()));
                true
            }
        }
    }

    pub fn deregister(&self, address: &AgentAddress) -> bool {
        self.mailboxes.remove(address).is_some()
    }

    pub fn is_registered(&self, address: &AgentAddress) -> bool {
        self.mailboxes.contains_key(address)
    }

    /// Number of undelivered transport messages for an address
    pub fn pending(&self, address: &AgentAddress) -> usize {
        self.mailboxes
            .get(address)
            .map(|mailbox| mailbox.lock().len())
            .unwrap_or(0)
    }

    /// Register `address` and return a host handle for it
    pub fn agent(self: &Arc<Self>, address: impl Into<AgentAddress>, settings: &AgentSettings) -> AclAgent {
        let address = address.into();
        self.register(address.clone());
        AclAgent {
            address,
            representation: settings.acl_representation,
            payload_encoding: settings.payload_encoding,
            platform: Arc::clone(self),
        }
    }

    /// Encode once and append to every receiver's mailbox.
    ///
    /// Nothing is delivered unless every receiver is registered.
    pub fn deliver(&self, message: &AclMessage, to: &[AgentAddress]) -> Result<(), HostError> {
        if to.is_empty() {
            return Err(HostError::NoReceivers);
        }
        if let Some(unknown) = to.iter().find(|a| !self.mailboxes.contains_key(*a)) {
            return Err(HostError::UnknownReceiver(unknown.clone()));
        }

        let transport = TransportMessage {
            representation: message.acl_representation,
            payload: self.codecs.encode(message)?,
        };
        for address in to {
            if let Some(mailbox) = self.mailboxes.get(address) {
                mailbox.lock().push_back(transport.clone());
                trace!(%address, performative = %message.performative, "Delivered");
            }
        }
        Ok(())
    }

    /// Scan a mailbox front to back, decoding as it goes.
    ///
    /// Messages that fail to decode are dropped on the spot.
    pub fn scan(
        &self,
        address: &AgentAddress,
        predicate: &dyn Fn(&AclMessage) -> bool,
        remove: bool,
    ) -> Option<AclMessage> {
        let mailbox = self.mailboxes.get(address)?;
        let mut queue = mailbox.lock();

        let mut index = 0;
        while index < queue.len() {
            let transport = &queue[index];
            match self.codecs.decode(transport.representation, &transport.payload) {
                Ok(message) if predicate(&message) => {
                    if remove {
                        queue.remove(index);
                    }
                    return Some(message);
                }
                Ok(_) => index += 1,
                Err(e) => {
                    warn!(%address, error = %e, "Dropping undecodable transport message");
                    observability::record_transport_dropped(address.as_str());
                    queue.remove(index);
                }
            }
        }
        None
    }

    /// Append raw bytes to a mailbox, bypassing the encoder
    pub fn inject(&self, address: &AgentAddress, transport: TransportMessage) -> Result<(), HostError> {
        let mailbox = self
            .mailboxes
            .get(address)
            .ok_or_else(|| HostError::UnknownReceiver(address.clone()))?;
        mailbox.lock().push_back(transport);
        Ok(())
    }
}

/// Handle through which one agent uses a [`LocalPlatform`]
#[derive(Debug, Clone)]
pub struct AclAgent {
    address: AgentAddress,
    representation: AclRepresentation,
    payload_encoding: PayloadEncoding,
    platform: Arc<LocalPlatform>,
}

impl AclAgent {
    pub fn address(&self) -> &AgentAddress {
        &self.address
    }

    pub fn platform(&self) -> &Arc<LocalPlatform> {
        &self.platform
    }

    pub fn pending(&self) -> usize {
        self.platform.pending(&self.address)
    }
}

impl AclHost for AclAgent {
    fn current_address(&self) -> AgentAddress {
        self.address.clone()
    }

    fn send(&self, mut message: AclMessage, to: &[AgentAddress]) -> Result<(), HostError> {
        message.sender = Some(self.address.clone());
        message.acl_representation = self.representation;
        message.payload_encoding = self.payload_encoding;
        if message.encoding.is_none() {
            message.encoding = Some(self.payload_encoding.value().to_string());
        }
        if message.receivers.is_empty() {
            message.receivers = to.to_vec();
        }
        self.platform.deliver(&message, to)
    }

    fn next_matching(&self, predicate: &dyn Fn(&AclMessage) -> bool) -> Option<AclMessage> {
        self.platform.scan(&self.address, predicate, true)
    }

    fn peek_matching(&self, predicate: &dyn Fn(&AclMessage) -> bool) -> Option<AclMessage> {
        self.platform.scan(&self.address, predicate, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl_message::Performative;

    fn pair() -> (AclAgent, AclAgent) {
        let platform = Arc::new(LocalPlatform::new());
        let settings = AgentSettings::default();
        (platform.agent("alice", &settings), platform.agent("bob", &settings))
    }

    #[test]
    fn test_send_stamps_envelope() {
        let (alice, bob) = pair();
        alice
            .send(AclMessage::new("hi", Performative::Inform), &["bob".into()])
            .unwrap();

        let msg = bob.next_matching(&|_| true).unwrap();
        assert_eq!(msg.sender, Some("alice".into()));
        assert_eq!(msg.receivers, vec![AgentAddress::from("bob")]);
        assert_eq!(msg.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(msg.content_str(), Some("hi"));
        assert_eq!(bob.pending(), 0);
    }

    #[test]
    fn test_peek_keeps_message() {
        let (alice, bob) = pair();
        alice
            .send(AclMessage::new("a", Performative::Inform), &["bob".into()])
            .unwrap();
        assert!(bob.peek_matching(&|_| true).is_some());
        assert_eq!(bob.pending(), 1);
        assert!(bob.next_matching(&|m| m.performative == Performative::Agree).is_none());
        assert_eq!(bob.pending(), 1);
    }

    #[test]
    fn test_scan_skips_non_matching_in_order() {
        let (alice, bob) = pair();
        for (content, perf) in [("1", Performative::Inform), ("2", Performative::Agree), ("3", Performative::Agree)] {
            alice
                .send(AclMessage::new(content, perf), &["bob".into()])
                .unwrap();
        }
        let first_agree = bob.next_matching(&|m| m.performative == Performative::Agree).unwrap();
        assert_eq!(first_agree.content_str(), Some("2"));
        assert_eq!(bob.pending(), 2);
    }

    #[test]
    fn test_unknown_receiver_delivers_nothing() {
        let (alice, bob) = pair();
        let err = alice
            .send(AclMessage::new("x", Performative::Inform), &["bob".into(), "carol".into()])
            .unwrap_err();
        assert_eq!(err, HostError::UnknownReceiver("carol".into()));
        assert_eq!(bob.pending(), 0);
        assert_eq!(
            alice.send(AclMessage::new("x", Performative::Inform), &[]),
            Err(HostError::NoReceivers)
        );
    }

    #[test]
    fn test_undecodable_messages_are_dropped() {
        let (alice, bob) = pair();
        bob.platform()
            .inject(
                bob.address(),
                TransportMessage {
                    representation: AclRepresentation::BitEfficient,
                    payload: Bytes::from_static(&[0xFB, 0x08, 0x01]),
                },
            )
            .unwrap();
        alice
            .send(AclMessage::new("ok", Performative::Inform), &["bob".into()])
            .unwrap();

        let msg = bob.next_matching(&|_| true).unwrap();
        assert_eq!(msg.content_str(), Some("ok"));
        assert_eq!(bob.pending(), 0);
    }

    #[test]
    fn test_register_is_idempotent() {
        let platform = LocalPlatform::new();
        assert!(platform.register("x".into()));
        assert!(!platform.register("x".into()));
        assert!(platform.deregister(&"x".into()));
        assert!(!platform.is_registered(&"x".into()));
    }

    #[test]
    fn test_concurrent_register_creates_one_mailbox() {
        let platform = LocalPlatform::new();
        let created = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| platform.register("shared".into())))
                .collect();
            workers
                .into_iter()
                .map(|worker| worker.join().unwrap())
                .filter(|fresh| *fresh)
                .count()
        });
        assert_eq!(created, 1);
    }
}
