//! Byte-level checks of the bit-efficient representation.

use bytes::Bytes;
use proptest::prelude::*;

use fipa_acl_engine::acl_message::{AclMessage, AclRepresentation, AgentAddress, Performative};
use fipa_acl_engine::config::AgentSettings;
use fipa_acl_engine::encoding::bitefficient::tokens::{self, MessageId};
use fipa_acl_engine::encoding::{AclCodec, BitEfficientCodec, CodecError, CodecRegistry};
use fipa_acl_engine::platform::{AclHost, LocalPlatform, TransportMessage};

#[test]
fn cfp_with_300_byte_content_uses_len16_string() {
    let msg = AclMessage {
        performative: Performative::Cfp,
        content: vec![b'z'; 300],
        ..Default::default()
    };
    let bytes = BitEfficientCodec::new().encode(&msg).unwrap();

    assert_eq!(bytes[0], MessageId::BitEfficient.code());
    assert_eq!(bytes[1], tokens::message_type_code(Performative::Cfp).unwrap());
    // content parameter, len16 form, big-endian 300
    assert_eq!(&bytes[2..6], &[0x04, 0x17, 0x01, 0x2C]);
    assert_eq!(bytes.len(), 6 + 300 + 1);
    assert_eq!(bytes[bytes.len() - 1], tokens::END_OF_COLLECTION);
}

#[test]
fn unpredefined_performative_is_sent_as_word() {
    let msg = AclMessage {
        performative: Performative::None,
        ..Default::default()
    };
    let bytes = BitEfficientCodec::new().encode(&msg).unwrap();
    assert_eq!(&bytes[..], &[0xFA, 0x00, 0x10, b'n', b'o', b'n', b'e', 0x00, 0x01]);
}

#[test]
fn word_encoded_performative_is_resolved_by_name() {
    let bytes = [0xFA, 0x00, 0x10, b'c', b'f', b'p', 0x00, 0x01];
    let msg = BitEfficientCodec::new().decode(&bytes).unwrap();
    assert_eq!(msg.performative, Performative::Cfp);
}

#[test]
fn code_table_schemes_are_rejected() {
    let codec = BitEfficientCodec::new();
    for first in [0xFB, 0xFC] {
        let err = codec.decode(&[first, 0x09, 0x01]).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedScheme(_)), "{err}");
    }
}

#[test]
fn registry_refuses_unknown_representation() {
    let registry = CodecRegistry::with_defaults();
    let msg = AclMessage {
        acl_representation: AclRepresentation::Xml,
        ..Default::default()
    };
    assert!(matches!(
        registry.encode(&msg),
        Err(CodecError::UnsupportedRepresentation(AclRepresentation::Xml))
    ));
    assert!(registry.contains(AclRepresentation::BitEfficient));
}

#[test]
fn hand_built_bytes_reach_a_mailbox() {
    let platform = std::sync::Arc::new(LocalPlatform::new());
    let bob = platform.agent("bob", &AgentSettings::default());

    // agree, sender "al"
    let payload = Bytes::from_static(&[
        0xFA, 0x02, 0x02, 0x60, 0x70, b'a', b'l', 0x00, 0x40, 0x01,
    ]);
    platform
        .inject(
            bob.address(),
            TransportMessage {
                representation: AclRepresentation::BitEfficient,
                payload,
            },
        )
        .unwrap();

    let msg = bob.next_matching(&|_| true).unwrap();
    assert_eq!(msg.performative, Performative::Agree);
    assert_eq!(msg.sender, Some(AgentAddress::from("al")));
}

fn word() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9@.-]{0,20}"
}

proptest! {
    #[test]
    fn prop_messages_survive_the_platform(
        performative in proptest::sample::select(Performative::ALL.to_vec()),
        content in proptest::collection::vec(any::<u8>(), 0..400),
        language in proptest::option::of(word()),
        receivers in proptest::collection::vec(word(), 0..3),
    ) {
        let platform = std::sync::Arc::new(LocalPlatform::new());
        let alice = platform.agent("alice", &AgentSettings::default());
        let bob = platform.agent("bob", &AgentSettings::default());

        let mut msg = AclMessage::new(content.clone(), performative);
        msg.language = language.clone();
        msg.receivers = receivers.iter().map(|r| AgentAddress::from(r.as_str())).collect();
        let expected_receivers = if msg.receivers.is_empty() {
            vec![AgentAddress::from("bob")]
        } else {
            msg.receivers.clone()
        };
        alice.send(msg.clone(), &["bob".into()]).unwrap();

        let received = bob.next_matching(&|_| true).unwrap();
        prop_assert_eq!(received.performative, performative);
        prop_assert_eq!(received.content, content);
        prop_assert_eq!(received.language, language);
        prop_assert_eq!(received.receivers, expected_receivers);
        prop_assert_eq!(received.conversation_id, msg.conversation_id);
        prop_assert_eq!(received.sender, Some(AgentAddress::from("alice")));
    }
}
