// encoding/bitefficient/tokens.rs - Bit-Efficient Token Tables
//
//! Fixed one-byte codes of the FIPA bit-efficient ACL representation.
//!
//! Every table is a closed enumeration with a `code()` accessor and a
//! tolerant `from_code()` reverse lookup that returns `None` for bytes the
//! table does not define. The tables are plain constants, so they can be
//! read from any thread without synchronisation.
//!
//! A few codes repeat inside one table (every `*_END` terminator of FIPA
//! SC00069 is `0x00`).
//! `from_code()` on such a byte yields the first variant declared in `ALL`.

use crate::acl_message::Performative;

/// Message-type byte announcing a user-defined (word encoded) performative
pub const USER_DEFINED_MESSAGE_TYPE: u8 = 0x00;

/// Parameter byte announcing a user-defined parameter
pub const USER_DEFINED_PARAMETER: u8 = 0x00;

/// Terminates a message (and any other collection)
pub const END_OF_COLLECTION: u8 = 0x01;

/// Coding scheme announced by the first byte of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// No dynamic code tables
    BitEfficient,
    /// Dynamic code tables in use
    BitEfficientCodeTable,
    /// Dynamic code tables in use, but the sender does not update them
    BitEfficientNoCodeTable,
}

impl MessageId {
    pub const ALL: [MessageId; 3] = [
        MessageId::BitEfficient,
        MessageId::BitEfficientCodeTable,
        MessageId::BitEfficientNoCodeTable,
    ];

    pub const fn code(self) -> u8 {
        match self {
            MessageId::BitEfficient => 0xFA,
            MessageId::BitEfficientCodeTable => 0xFB,
            MessageId::BitEfficientNoCodeTable => 0xFC,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }
}

/// Predefined message-type codes, one per FIPA performative
const PREDEFINED_MSG_TYPES: [(Performative, u8); 22] = [
    (Performative::AcceptProposal, 0x01),
    (Performative::Agree, 0x02),
    (Performative::Cancel, 0x03),
    (Performative::Cfp, 0x04),
    (Performative::Confirm, 0x05),
    (Performative::Disconfirm, 0x06),
    (Performative::Failure, 0x07),
    (Performative::Inform, 0x08),
    (Performative::InformIf, 0x09),
    (Performative::InformRef, 0x0A),
    (Performative::NotUnderstood, 0x0B),
    (Performative::Propagate, 0x0C),
    (Performative::Propose, 0x0D),
    (Performative::Proxy, 0x0E),
    (Performative::QueryIf, 0x0F),
    (Performative::QueryRef, 0x10),
    (Performative::Refuse, 0x11),
    (Performative::RejectProposal, 0x12),
    (Performative::Request, 0x13),
    (Performative::RequestWhen, 0x14),
    (Performative::RequestWhenever, 0x15),
    (Performative::Subscribe, 0x16),
];

/// Predefined message-type code of a performative
pub fn message_type_code(performative: Performative) -> Option<u8> {
    PREDEFINED_MSG_TYPES
        .iter()
        .find(|(p, _)| *p == performative)
        .map(|(_, code)| *code)
}

/// Performative behind a predefined message-type code
pub fn performative_from_code(code: u8) -> Option<Performative> {
    PREDEFINED_MSG_TYPES
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(p, _)| *p)
}

/// Predefined message parameter codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredefinedMsgParam {
    Sender,
    Receiver,
    Content,
    ReplyWith,
    ReplyBy,
    InReplyTo,
    ReplyTo,
    Language,
    Encoding,
    Ontology,
    Protocol,
    ConversationId,
}

impl PredefinedMsgParam {
    pub const ALL: [PredefinedMsgParam; 12] = [
        PredefinedMsgParam::Sender,
        PredefinedMsgParam::Receiver,
        PredefinedMsgParam::Content,
        PredefinedMsgParam::ReplyWith,
        PredefinedMsgParam::ReplyBy,
        PredefinedMsgParam::InReplyTo,
        PredefinedMsgParam::ReplyTo,
        PredefinedMsgParam::Language,
        PredefinedMsgParam::Encoding,
        PredefinedMsgParam::Ontology,
        PredefinedMsgParam::Protocol,
        PredefinedMsgParam::ConversationId,
    ];

    pub const fn code(self) -> u8 {
        match self {
            PredefinedMsgParam::Sender => 0x02,
            PredefinedMsgParam::Receiver => 0x03,
            PredefinedMsgParam::Content => 0x04,
            PredefinedMsgParam::ReplyWith => 0x05,
            PredefinedMsgParam::ReplyBy => 0x06,
            PredefinedMsgParam::InReplyTo => 0x07,
            PredefinedMsgParam::ReplyTo => 0x08,
            PredefinedMsgParam::Language => 0x09,
            PredefinedMsgParam::Encoding => 0x0A,
            PredefinedMsgParam::Ontology => 0x0B,
            PredefinedMsgParam::Protocol => 0x0C,
            PredefinedMsgParam::ConversationId => 0x0D,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    pub fn fipa_name(self) -> &'static str {
        match self {
            PredefinedMsgParam::Sender => "sender",
            PredefinedMsgParam::Receiver => "receiver",
            PredefinedMsgParam::Content => "content",
            PredefinedMsgParam::ReplyWith => "reply-with",
            PredefinedMsgParam::ReplyBy => "reply-by",
            PredefinedMsgParam::InReplyTo => "in-reply-to",
            PredefinedMsgParam::ReplyTo => "reply-to",
            PredefinedMsgParam::Language => "language",
            PredefinedMsgParam::Encoding => "encoding",
            PredefinedMsgParam::Ontology => "ontology",
            PredefinedMsgParam::Protocol => "protocol",
            PredefinedMsgParam::ConversationId => "conversation-id",
        }
    }
}

/// Scalar value tokens outside of expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinToken {
    WordBegin,
    IndexWordBegin,
    NumberBegin,
    HexNumberBegin,
}

impl BinToken {
    pub const ALL: [BinToken; 4] = [
        BinToken::WordBegin,
        BinToken::IndexWordBegin,
        BinToken::NumberBegin,
        BinToken::HexNumberBegin,
    ];

    pub const fn code(self) -> u8 {
        match self {
            BinToken::WordBegin => 0x10,
            BinToken::IndexWordBegin => 0x11,
            BinToken::NumberBegin => 0x12,
            BinToken::HexNumberBegin => 0x13,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }
}

/// Tokens opening an element of a nested expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprStart {
    LevelDown,
    WordBegin,
    WordEnd,
    IndexWordCodeBegin,
    NumberBegin,
    HexaNumberBegin,
    StringBegin,
    StringEnd,
    IndexStringBegin,
    Len8StringBegin,
    Len16StringBegin,
    Len32StringBegin,
    IndexByteStringBegin,
}

impl ExprStart {
    pub const ALL: [ExprStart; 13] = [
        ExprStart::LevelDown,
        ExprStart::WordBegin,
        ExprStart::WordEnd,
        ExprStart::IndexWordCodeBegin,
        ExprStart::NumberBegin,
        ExprStart::HexaNumberBegin,
        ExprStart::StringBegin,
        ExprStart::StringEnd,
        ExprStart::IndexStringBegin,
        ExprStart::Len8StringBegin,
        ExprStart::Len16StringBegin,
        ExprStart::Len32StringBegin,
        ExprStart::IndexByteStringBegin,
    ];

    /// Variants sharing a code with an earlier variant
    pub const ALIASES: [ExprStart; 1] = [ExprStart::StringEnd];

    pub const fn code(self) -> u8 {
        match self {
            ExprStart::LevelDown => 0x60,
            ExprStart::WordBegin => 0x70,
            ExprStart::WordEnd => 0x00,
            ExprStart::IndexWordCodeBegin => 0x71,
            ExprStart::NumberBegin => 0x72,
            ExprStart::HexaNumberBegin => 0x73,
            ExprStart::StringBegin => 0x74,
            ExprStart::StringEnd => 0x00,
            ExprStart::IndexStringBegin => 0x75,
            ExprStart::Len8StringBegin => 0x76,
            ExprStart::Len16StringBegin => 0x77,
            ExprStart::Len32StringBegin => 0x78,
            ExprStart::IndexByteStringBegin => 0x79,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }
}

/// Tokens closing an element of a nested expression (and the level with it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprEnd {
    LevelUp,
    WordBegin,
    WordEnd,
    IndexWordCodeBegin,
    NumberBegin,
    HexaNumberBegin,
    StringBegin,
    StringEnd,
    IndexStringBegin,
    Len8StringBegin,
    Len16StringBegin,
    Len32StringBegin,
    IndexByteStringBegin,
}

impl ExprEnd {
    pub const ALL: [ExprEnd; 13] = [
        ExprEnd::LevelUp,
        ExprEnd::WordBegin,
        ExprEnd::WordEnd,
        ExprEnd::IndexWordCodeBegin,
        ExprEnd::NumberBegin,
        ExprEnd::HexaNumberBegin,
        ExprEnd::StringBegin,
        ExprEnd::StringEnd,
        ExprEnd::IndexStringBegin,
        ExprEnd::Len8StringBegin,
        ExprEnd::Len16StringBegin,
        ExprEnd::Len32StringBegin,
        ExprEnd::IndexByteStringBegin,
    ];

    /// Variants sharing a code with an earlier variant.
    ///
    /// `IndexByteStringBegin` is published as `0x56`, the same byte as
    /// `Len8StringBegin`; decoding `0x56` always reads a len8 string.
    pub const ALIASES: [ExprEnd; 2] = [ExprEnd::StringEnd, ExprEnd::IndexByteStringBegin];

    pub const fn code(self) -> u8 {
        match self {
            ExprEnd::LevelUp => 0x40,
            ExprEnd::WordBegin => 0x50,
            ExprEnd::WordEnd => 0x00,
            ExprEnd::IndexWordCodeBegin => 0x51,
            ExprEnd::NumberBegin => 0x52,
            ExprEnd::HexaNumberBegin => 0x53,
            ExprEnd::StringBegin => 0x54,
            ExprEnd::StringEnd => 0x00,
            ExprEnd::IndexStringBegin => 0x55,
            ExprEnd::Len8StringBegin => 0x56,
            ExprEnd::Len16StringBegin => 0x57,
            ExprEnd::Len32StringBegin => 0x58,
            ExprEnd::IndexByteStringBegin => 0x56,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }
}

/// String-length-class delimiters of `BinString`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinString {
    StringBegin,
    StringEnd,
    IndexStringBegin,
    Len8ByteSeqBegin,
    Len16ByteSeqBegin,
    IndexByteLengthEncodedBegin,
    Len32ByteSeqBegin,
}

impl BinString {
    pub const ALL: [BinString; 7] = [
        BinString::StringBegin,
        BinString::StringEnd,
        BinString::IndexStringBegin,
        BinString::Len8ByteSeqBegin,
        BinString::Len16ByteSeqBegin,
        BinString::IndexByteLengthEncodedBegin,
        BinString::Len32ByteSeqBegin,
    ];

    pub const fn code(self) -> u8 {
        match self {
            BinString::StringBegin => 0x14,
            BinString::StringEnd => 0x00,
            BinString::IndexStringBegin => 0x15,
            BinString::Len8ByteSeqBegin => 0x16,
            BinString::Len16ByteSeqBegin => 0x17,
            BinString::IndexByteLengthEncodedBegin => 0x18,
            BinString::Len32ByteSeqBegin => 0x19,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }
}

/// Nibble codes for decimal numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberToken {
    /// Fills the last nibble of odd-length numbers and terminates the stream
    Padding,
    Zero,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Plus,
    Exponent,
    Minus,
    Dot,
}

impl NumberToken {
    pub const ALL: [NumberToken; 15] = [
        NumberToken::Padding,
        NumberToken::Zero,
        NumberToken::One,
        NumberToken::Two,
        NumberToken::Three,
        NumberToken::Four,
        NumberToken::Five,
        NumberToken::Six,
        NumberToken::Seven,
        NumberToken::Eight,
        NumberToken::Nine,
        NumberToken::Plus,
        NumberToken::Exponent,
        NumberToken::Minus,
        NumberToken::Dot,
    ];

    pub const fn code(self) -> u8 {
        match self {
            NumberToken::Padding => 0x00,
            NumberToken::Zero => 0x01,
            NumberToken::One => 0x02,
            NumberToken::Two => 0x03,
            NumberToken::Three => 0x04,
            NumberToken::Four => 0x05,
            NumberToken::Five => 0x06,
            NumberToken::Six => 0x07,
            NumberToken::Seven => 0x08,
            NumberToken::Eight => 0x09,
            NumberToken::Nine => 0x0A,
            NumberToken::Plus => 0x0B,
            NumberToken::Exponent => 0x0C,
            NumberToken::Minus => 0x0D,
            NumberToken::Dot => 0x0E,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Character written for this token; `Padding` has none
    pub const fn symbol(self) -> Option<char> {
        match self {
            NumberToken::Padding => None,
            NumberToken::Zero => Some('0'),
            NumberToken::One => Some('1'),
            NumberToken::Two => Some('2'),
            NumberToken::Three => Some('3'),
            NumberToken::Four => Some('4'),
            NumberToken::Five => Some('5'),
            NumberToken::Six => Some('6'),
            NumberToken::Seven => Some('7'),
            NumberToken::Eight => Some('8'),
            NumberToken::Nine => Some('9'),
            NumberToken::Plus => Some('+'),
            NumberToken::Exponent => Some('E'),
            NumberToken::Minus => Some('-'),
            NumberToken::Dot => Some('.'),
        }
    }

    /// Case-insensitive lookup of a number character
    pub fn from_symbol(symbol: char) -> Option<Self> {
        let symbol = symbol.to_ascii_uppercase();
        Self::ALL.into_iter().find(|t| t.symbol() == Some(symbol))
    }
}

/// Date-time markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinDateTimeToken {
    AbsTime,
    RelTimePos,
    RelTimeNeg,
    AbsTimeTypeDesignator,
    RelTimePosTypeDesignator,
    RelTimeNegTypeDesignator,
}

impl BinDateTimeToken {
    pub const ALL: [BinDateTimeToken; 6] = [
        BinDateTimeToken::AbsTime,
        BinDateTimeToken::RelTimePos,
        BinDateTimeToken::RelTimeNeg,
        BinDateTimeToken::AbsTimeTypeDesignator,
        BinDateTimeToken::RelTimePosTypeDesignator,
        BinDateTimeToken::RelTimeNegTypeDesignator,
    ];

    pub const fn code(self) -> u8 {
        match self {
            BinDateTimeToken::AbsTime => 0x20,
            BinDateTimeToken::RelTimePos => 0x21,
            BinDateTimeToken::RelTimeNeg => 0x22,
            BinDateTimeToken::AbsTimeTypeDesignator => 0x24,
            BinDateTimeToken::RelTimePosTypeDesignator => 0x25,
            BinDateTimeToken::RelTimeNegTypeDesignator => 0x26,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    pub const fn has_type_designator(self) -> bool {
        matches!(
            self,
            BinDateTimeToken::AbsTimeTypeDesignator
                | BinDateTimeToken::RelTimePosTypeDesignator
                | BinDateTimeToken::RelTimeNegTypeDesignator
        )
    }
}
