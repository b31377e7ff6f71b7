// acl_message.rs
// Core FIPA ACL message structures

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque agent address supplied by the hosting platform
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
    derive_more::Into,
)]
pub struct AgentAddress(String);

impl AgentAddress {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentAddress {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Conversation identifier shared by every message of one protocol run
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display, derive_more::From,
)]
pub struct ConversationId(String);

impl ConversationId {
    /// Create a fresh, globally unique conversation id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// FIPA performative types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Performative {
    /// Unset or unknown speech act
    #[default]
    None,
    AcceptProposal,
    Agree,
    Cancel,
    Cfp,
    Confirm,
    Disconfirm,
    Failure,
    Inform,
    InformIf,
    InformRef,
    NotUnderstood,
    Propagate,
    Propose,
    Proxy,
    QueryIf,
    QueryRef,
    Refuse,
    RejectProposal,
    Request,
    RequestWhen,
    RequestWhenever,
    Subscribe,
}

impl Performative {
    /// Every performative, `None` included
    pub const ALL: [Performative; 23] = [
        Performative::None,
        Performative::AcceptProposal,
        Performative::Agree,
        Performative::Cancel,
        Performative::Cfp,
        Performative::Confirm,
        Performative::Disconfirm,
        Performative::Failure,
        Performative::Inform,
        Performative::InformIf,
        Performative::InformRef,
        Performative::NotUnderstood,
        Performative::Propagate,
        Performative::Propose,
        Performative::Proxy,
        Performative::QueryIf,
        Performative::QueryRef,
        Performative::Refuse,
        Performative::RejectProposal,
        Performative::Request,
        Performative::RequestWhen,
        Performative::RequestWhenever,
        Performative::Subscribe,
    ];

    /// Name used by the FIPA ACL specification
    pub fn fipa_name(&self) -> &'static str {
        match self {
            Performative::None => "none",
            Performative::AcceptProposal => "accept-proposal",
            Performative::Agree => "agree",
            Performative::Cancel => "cancel",
            Performative::Cfp => "cfp",
            Performative::Confirm => "confirm",
            Performative::Disconfirm => "disconfirm",
            Performative::Failure => "failure",
            Performative::Inform => "inform",
            Performative::InformIf => "inform-if",
            Performative::InformRef => "inform-ref",
            Performative::NotUnderstood => "not-understood",
            Performative::Propagate => "propagate",
            Performative::Propose => "propose",
            Performative::Proxy => "proxy",
            Performative::QueryIf => "query-if",
            Performative::QueryRef => "query-ref",
            Performative::Refuse => "refuse",
            Performative::RejectProposal => "reject-proposal",
            Performative::Request => "request",
            Performative::RequestWhen => "request-when",
            Performative::RequestWhenever => "request-whenever",
            Performative::Subscribe => "subscribe",
        }
    }

    /// Case-insensitive lookup; unknown names map to `None`
    pub fn from_fipa_name(name: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.fipa_name().eq_ignore_ascii_case(name))
            .unwrap_or_default()
    }
}

impl From<Option<Performative>> for Performative {
    fn from(value: Option<Performative>) -> Self {
        value.unwrap_or_default()
    }
}

impl std::fmt::Display for Performative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.fipa_name())
    }
}

/// FIPA interaction protocols known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FipaProtocol {
    #[default]
    None,
    Request,
    ContractNet,
    Propose,
    Query,
}

impl FipaProtocol {
    pub fn fipa_name(&self) -> &'static str {
        match self {
            FipaProtocol::None => "none",
            FipaProtocol::Request => "fipa-request",
            FipaProtocol::ContractNet => "fipa-contract-net",
            FipaProtocol::Propose => "fipa-propose",
            FipaProtocol::Query => "fipa-query",
        }
    }

    pub fn from_fipa_name(name: &str) -> Self {
        [
            FipaProtocol::Request,
            FipaProtocol::ContractNet,
            FipaProtocol::Propose,
            FipaProtocol::Query,
        ]
        .into_iter()
        .find(|p| p.fipa_name().eq_ignore_ascii_case(name))
        .unwrap_or_default()
    }
}

impl std::fmt::Display for FipaProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.fipa_name())
    }
}

/// ACL message representations (wire codecs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AclRepresentation {
    #[default]
    BitEfficient,
    String,
    Json,
    Bson,
    Xml,
}

impl AclRepresentation {
    pub fn value(&self) -> &'static str {
        match self {
            AclRepresentation::BitEfficient => "fipa.acl.rep.bitefficient.std",
            AclRepresentation::String => "fipa.acl.rep.string.std",
            AclRepresentation::Json => "set.acl.rep.json.std",
            AclRepresentation::Bson => "set.acl.rep.bson.std",
            AclRepresentation::Xml => "fipa.acl.rep.xml.std",
        }
    }
}

/// Character encoding of the message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadEncoding {
    #[default]
    Utf8,
}

impl PayloadEncoding {
    pub fn value(&self) -> &'static str {
        match self {
            PayloadEncoding::Utf8 => "UTF-8",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        value
            .eq_ignore_ascii_case(PayloadEncoding::Utf8.value())
            .then_some(PayloadEncoding::Utf8)
    }
}

/// How a reply-by time relates to the moment it is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRelation {
    Absolute,
    /// Relative offset in the future
    Later,
    /// Relative offset in the past
    Earlier,
}

/// Calendar fields of a FIPA date-time token.
///
/// Relative times reuse the same fields as an offset, so zero months or
/// days are legal here even though they are not valid calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FipaDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
}

impl FipaDateTime {
    /// Number of decimal digits in the wire form `YYYYMMDDhhmmssmmm`
    pub const DIGITS: usize = 17;

    pub fn from_utc(time: DateTime<Utc>) -> Self {
        Self {
            year: time.year().clamp(0, 9999) as u16,
            month: time.month() as u8,
            day: time.day() as u8,
            hour: time.hour() as u8,
            minute: time.minute() as u8,
            second: time.second() as u8,
            millisecond: (time.timestamp_subsec_millis().min(999)) as u16,
        }
    }

    /// Interpret the fields as an absolute UTC instant
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        let date = NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)?;
        let time = date.and_hms_milli_opt(
            self.hour as u32,
            self.minute as u32,
            self.second as u32,
            self.millisecond as u32,
        )?;
        Some(Utc.from_utc_datetime(&time))
    }

    /// Render as the 17-digit wire string, or `None` if a field overflows its width
    pub fn to_digits(&self) -> Option<String> {
        if self.year > 9999
            || self.month > 99
            || self.day > 99
            || self.hour > 99
            || self.minute > 99
            || self.second > 99
            || self.millisecond > 999
        {
            return None;
        }
        Some(format!(
            "{:04}{:02}{:02}{:02}{:02}{:02}{:03}",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.millisecond
        ))
    }

    pub fn from_digits(digits: &str) -> Option<Self> {
        if digits.len() != Self::DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let field = |range: std::ops::Range<usize>| digits[range].parse::<u16>().ok();
        Some(Self {
            year: field(0..4)?,
            month: field(4..6)? as u8,
            day: field(6..8)? as u8,
            hour: field(8..10)? as u8,
            minute: field(10..12)? as u8,
            second: field(12..14)? as u8,
            millisecond: field(14..17)?,
        })
    }
}

/// Reply-by deadline as carried by the bit-efficient date-time token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplyBy {
    pub relation: TimeRelation,
    pub time: FipaDateTime,
    /// Optional trailing type designator (for example `b'Z'`)
    pub type_designator: Option<u8>,
}

impl ReplyBy {
    pub fn absolute(time: DateTime<Utc>) -> Self {
        Self {
            relation: TimeRelation::Absolute,
            time: FipaDateTime::from_utc(time),
            type_designator: None,
        }
    }

    pub fn with_type_designator(mut self, designator: u8) -> Self {
        self.type_designator = Some(designator);
        self
    }
}

/// Complete ACL message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AclMessage {
    pub performative: Performative,
    pub sender: Option<AgentAddress>,
    pub receivers: Vec<AgentAddress>,
    /// Opaque application payload; empty means absent
    pub content: Vec<u8>,
    pub reply_with: Option<String>,
    pub in_reply_to: Option<String>,
    pub reply_by: Option<ReplyBy>,
    pub reply_to: Vec<AgentAddress>,
    pub language: Option<String>,
    pub encoding: Option<String>,
    pub ontology: Option<String>,
    pub protocol: Option<String>,
    pub conversation_id: Option<ConversationId>,
    /// FIPA user-defined parameters, sent in key order
    pub user_parameters: BTreeMap<String, String>,

    /// Codec that produced (or should produce) this message; not on the wire
    #[serde(default)]
    pub acl_representation: AclRepresentation,
    /// Character encoding of the payload; not on the wire
    #[serde(default)]
    pub payload_encoding: PayloadEncoding,
}

impl AclMessage {
    /// Create a message with a freshly generated conversation id
    pub fn new(content: impl Into<Vec<u8>>, performative: impl Into<Performative>) -> Self {
        Self {
            performative: performative.into(),
            content: content.into(),
            conversation_id: Some(ConversationId::generate()),
            ..Default::default()
        }
    }

    /// Content as UTF-8 text, if it is valid UTF-8
    pub fn content_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }

    /// Protocol parameter resolved to a known FIPA protocol
    pub fn fipa_protocol(&self) -> FipaProtocol {
        self.protocol
            .as_deref()
            .map(FipaProtocol::from_fipa_name)
            .unwrap_or_default()
    }

    pub fn with_sender(mut self, sender: impl Into<AgentAddress>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn with_receiver(mut self, receiver: impl Into<AgentAddress>) -> Self {
        self.receivers.push(receiver.into());
        self
    }

    pub fn with_reply_to(mut self, address: impl Into<AgentAddress>) -> Self {
        self.reply_to.push(address.into());
        self
    }

    pub fn with_reply_with(mut self, value: impl Into<String>) -> Self {
        self.reply_with = Some(value.into());
        self
    }

    pub fn with_in_reply_to(mut self, value: impl Into<String>) -> Self {
        self.in_reply_to = Some(value.into());
        self
    }

    pub fn with_reply_by(mut self, reply_by: ReplyBy) -> Self {
        self.reply_by = Some(reply_by);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_ontology(mut self, ontology: impl Into<String>) -> Self {
        self.ontology = Some(ontology.into());
        self
    }

    pub fn with_protocol(mut self, protocol: FipaProtocol) -> Self {
        self.protocol = Some(protocol.fipa_name().to_string());
        self
    }

    pub fn with_conversation(mut self, conversation_id: ConversationId) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    pub fn with_user_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_parameters.insert(name.into(), value.into());
        self
    }

    /// Compare every field carried by the wire format
    pub fn same_wire_fields(&self, other: &AclMessage) -> bool {
        self.performative == other.performative
            && self.sender == other.sender
            && self.receivers == other.receivers
            && self.content == other.content
            && self.reply_with == other.reply_with
            && self.in_reply_to == other.in_reply_to
            && self.reply_by == other.reply_by
            && self.reply_to == other.reply_to
            && self.language == other.language
            && self.encoding == other.encoding
            && self.ontology == other.ontology
            && self.protocol == other.protocol
            && self.conversation_id == other.conversation_id
            && self.user_parameters == other.user_parameters
    }
}

impl PartialEq for AclMessage {
    fn eq(&self, other: &Self) -> bool {
        self.conversation_id == other.conversation_id
            && self.performative == other.performative
            && self.content == other.content
    }
}

impl Eq for AclMessage {}
