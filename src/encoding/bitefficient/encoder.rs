// encoding/bitefficient/encoder.rs - Bit-Efficient Encoder

use bytes::{BufMut, Bytes, BytesMut};

use super::tokens::*;
use crate::acl_message::{AclMessage, AgentAddress, ReplyBy, TimeRelation};
use crate::encoding::CodecError;

/// Longest string written inline between begin/end markers
const INLINE_STRING_MAX: usize = u8::MAX as usize;

/// Which family of string tokens to emit
#[derive(Clone, Copy)]
enum StringForm {
    /// `BinString` parameter value (0x14..0x19)
    Value,
    /// Element of an expression (0x74..0x78)
    Expression,
}

/// Append-only writer for one bit-efficient message
pub(crate) struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(128),
        }
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    fn put_token(&mut self, code: u8) {
        self.buf.put_u8(code);
    }

    /// Write `begin word 0x00`; words may not be empty or contain NUL
    fn put_word(&mut self, begin: u8, word: &str) -> Result<(), CodecError> {
        if word.is_empty() {
            return Err(CodecError::InvalidWord {
                value: word.to_string(),
                reason: "empty",
            });
        }
        if word.as_bytes().contains(&0) {
            return Err(CodecError::InvalidWord {
                value: word.to_string(),
                reason: "contains a NUL byte",
            });
        }
        self.put_token(begin);
        self.buf.put_slice(word.as_bytes());
        self.put_token(ExprStart::WordEnd.code());
        Ok(())
    }

    /// Write a string using the shortest applicable length class
    fn put_string(&mut self, form: StringForm, value: &[u8]) -> Result<(), CodecError> {
        let (inline, len8, len16, len32) = match form {
            StringForm::Value => (
                BinString::StringBegin.code(),
                BinString::Len8ByteSeqBegin.code(),
                BinString::Len16ByteSeqBegin.code(),
                BinString::Len32ByteSeqBegin.code(),
            ),
            StringForm::Expression => (
                ExprStart::StringBegin.code(),
                ExprStart::Len8StringBegin.code(),
                ExprStart::Len16StringBegin.code(),
                ExprStart::Len32StringBegin.code(),
            ),
        };

        let len = value.len();
        if len <= INLINE_STRING_MAX && !value.contains(&0) {
            self.put_token(inline);
            self.buf.put_slice(value);
            self.put_token(BinString::StringEnd.code());
        } else if len <= u8::MAX as usize {
            self.put_token(len8);
            self.buf.put_u8(len as u8);
            self.buf.put_slice(value);
        } else if len <= u16::MAX as usize {
            self.put_token(len16);
            self.buf.put_u16(len as u16);
            self.buf.put_slice(value);
        } else if len <= u32::MAX as usize {
            self.put_token(len32);
            self.buf.put_u32(len as u32);
            self.buf.put_slice(value);
        } else {
            return Err(CodecError::ValueTooLong { len });
        }
        Ok(())
    }

    /// Pack number characters two nibbles per byte.
    ///
    /// The stream always ends with a padding nibble: in the low half of the
    /// last byte for odd lengths, as an extra `0x00` byte for even lengths.
    fn put_digits(&mut self, digits: &str) -> Result<(), CodecError> {
        let mut nibbles = digits
            .chars()
            .map(|c| NumberToken::from_symbol(c).map(NumberToken::code))
            .collect::<Option<Vec<u8>>>()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CodecError::InvalidNumber {
                value: digits.to_string(),
            })?;

        nibbles.push(NumberToken::Padding.code());
        if nibbles.len() % 2 == 1 {
            nibbles.push(NumberToken::Padding.code());
        }
        for pair in nibbles.chunks_exact(2) {
            self.buf.put_u8((pair[0] << 4) | pair[1]);
        }
        Ok(())
    }

    /// Agent addresses as a nested expression of words
    fn put_addresses(&mut self, addresses: &[AgentAddress]) -> Result<(), CodecError> {
        self.put_token(ExprStart::LevelDown.code());
        for address in addresses {
            self.put_word(ExprStart::WordBegin.code(), address.as_str())?;
        }
        self.put_token(ExprEnd::LevelUp.code());
        Ok(())
    }

    fn put_reply_by(&mut self, reply_by: &ReplyBy) -> Result<(), CodecError> {
        let token = match (reply_by.relation, reply_by.type_designator.is_some()) {
            (TimeRelation::Absolute, false) => BinDateTimeToken::AbsTime,
            (TimeRelation::Later, false) => BinDateTimeToken::RelTimePos,
            (TimeRelation::Earlier, false) => BinDateTimeToken::RelTimeNeg,
            (TimeRelation::Absolute, true) => BinDateTimeToken::AbsTimeTypeDesignator,
            (TimeRelation::Later, true) => BinDateTimeToken::RelTimePosTypeDesignator,
            (TimeRelation::Earlier, true) => BinDateTimeToken::RelTimeNegTypeDesignator,
        };
        let digits = reply_by.time.to_digits().ok_or(CodecError::InvalidDate)?;

        self.put_token(token.code());
        self.put_digits(&digits)?;
        if let Some(designator) = reply_by.type_designator {
            self.buf.put_u8(designator);
        }
        Ok(())
    }

    /// User-defined parameter values: numbers when they look like one
    fn put_user_value(&mut self, value: &str) -> Result<(), CodecError> {
        if looks_numeric(value) {
            self.put_token(ExprStart::NumberBegin.code());
            self.put_digits(value)
        } else {
            self.put_string(StringForm::Expression, value.as_bytes())
        }
    }

    fn put_string_param(&mut self, param: PredefinedMsgParam, value: &[u8]) -> Result<(), CodecError> {
        self.put_token(param.code());
        self.put_string(StringForm::Value, value)
    }

    fn put_optional_string(
        &mut self,
        param: PredefinedMsgParam,
        value: Option<&str>,
    ) -> Result<(), CodecError> {
        match value {
            Some(value) => self.put_string_param(param, value.as_bytes()),
            None => Ok(()),
        }
    }
}

/// Only characters the number table can carry, with at least one digit
fn looks_numeric(value: &str) -> bool {
    value.bytes().any(|b| b.is_ascii_digit())
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'E'))
}

/// Encode a message into its bit-efficient byte form
pub(crate) fn encode_message(message: &AclMessage) -> Result<Bytes, CodecError> {
    let mut enc = Encoder::new();

    enc.put_token(MessageId::BitEfficient.code());

    match message_type_code(message.performative) {
        Some(code) => enc.put_token(code),
        None => {
            enc.put_token(USER_DEFINED_MESSAGE_TYPE);
            enc.put_word(BinToken::WordBegin.code(), message.performative.fipa_name())?;
        }
    }

    if let Some(sender) = &message.sender {
        enc.put_token(PredefinedMsgParam::Sender.code());
        enc.put_addresses(std::slice::from_ref(sender))?;
    }
    if !message.receivers.is_empty() {
        enc.put_token(PredefinedMsgParam::Receiver.code());
        enc.put_addresses(&message.receivers)?;
    }
    if !message.content.is_empty() {
        enc.put_string_param(PredefinedMsgParam::Content, &message.content)?;
    }
    enc.put_optional_string(PredefinedMsgParam::ReplyWith, message.reply_with.as_deref())?;
    enc.put_optional_string(PredefinedMsgParam::InReplyTo, message.in_reply_to.as_deref())?;
    if let Some(reply_by) = &message.reply_by {
        enc.put_token(PredefinedMsgParam::ReplyBy.code());
        enc.put_reply_by(reply_by)?;
    }
    if !message.reply_to.is_empty() {
        enc.put_token(PredefinedMsgParam::ReplyTo.code());
        enc.put_addresses(&message.reply_to)?;
    }
    enc.put_optional_string(PredefinedMsgParam::Language, message.language.as_deref())?;
    enc.put_optional_string(PredefinedMsgParam::Encoding, message.encoding.as_deref())?;
    enc.put_optional_string(PredefinedMsgParam::Ontology, message.ontology.as_deref())?;
    enc.put_optional_string(PredefinedMsgParam::Protocol, message.protocol.as_deref())?;
    enc.put_optional_string(
        PredefinedMsgParam::ConversationId,
        message.conversation_id.as_ref().map(|id| id.as_str()),
    )?;

    for (name, value) in &message.user_parameters {
        enc.put_token(USER_DEFINED_PARAMETER);
        enc.put_word(BinToken::WordBegin.code(), name)?;
        enc.put_user_value(value)?;
    }

    enc.put_token(END_OF_COLLECTION);
    Ok(enc.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl_message::{FipaDateTime, Performative};

    fn digits(value: &str) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.put_digits(value).unwrap();
        enc.finish().to_vec()
    }

    #[test]
    fn test_minimal_message_layout() {
        let msg = AclMessage {
            performative: Performative::Inform,
            ..Default::default()
        };
        let bytes = encode_message(&msg).unwrap();
        assert_eq!(bytes.as_ref(), &[0xFA, 0x08, 0x01]);
    }

    #[test]
    fn test_sender_is_a_nested_word() {
        let msg = AclMessage {
            performative: Performative::Agree,
            sender: Some("ab".into()),
            ..Default::default()
        };
        let bytes = encode_message(&msg).unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[0xFA, 0x02, 0x02, 0x60, 0x70, b'a', b'b', 0x00, 0x40, 0x01]
        );
    }

    #[test]
    fn test_receivers_share_one_expression() {
        let msg = AclMessage {
            performative: Performative::Cfp,
            receivers: vec!["a".into(), "b".into()],
            ..Default::default()
        };
        let bytes = encode_message(&msg).unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[0xFA, 0x04, 0x03, 0x60, 0x70, b'a', 0x00, 0x70, b'b', 0x00, 0x40, 0x01]
        );
    }

    #[test]
    fn test_unpredefined_performative_is_word_encoded() {
        let msg = AclMessage::default();
        let bytes = encode_message(&msg).unwrap();
        assert_eq!(&bytes[..3], &[0xFA, 0x00, 0x10]);
        assert_eq!(&bytes[3..7], b"none");
        assert_eq!(&bytes[7..], &[0x00, 0x01]);
    }

    #[test]
    fn test_string_length_classes() {
        let mut enc = Encoder::new();
        enc.put_string(StringForm::Value, b"hi").unwrap();
        assert_eq!(enc.finish().as_ref(), &[0x14, b'h', b'i', 0x00]);

        let mut enc = Encoder::new();
        enc.put_string(StringForm::Value, b"a\0b").unwrap();
        assert_eq!(enc.finish().as_ref(), &[0x16, 3, b'a', 0, b'b']);

        let mut enc = Encoder::new();
        enc.put_string(StringForm::Value, &[b'x'; 300]).unwrap();
        let bytes = enc.finish();
        assert_eq!(&bytes[..3], &[0x17, 0x01, 0x2C]);
        assert_eq!(bytes.len(), 303);

        let mut enc = Encoder::new();
        enc.put_string(StringForm::Value, &vec![b'y'; 70_000]).unwrap();
        let bytes = enc.finish();
        assert_eq!(&bytes[..5], &[0x19, 0x00, 0x01, 0x11, 0x70]);

        let mut enc = Encoder::new();
        enc.put_string(StringForm::Expression, &[b'z'; 256]).unwrap();
        assert_eq!(&enc.finish()[..3], &[0x77, 0x01, 0x00]);
    }

    #[test]
    fn test_digit_packing() {
        // odd length: padding fills the low nibble
        assert_eq!(digits("5"), vec![0x60]);
        assert_eq!(digits("123"), vec![0x23, 0x40]);
        // even length: an extra padding byte terminates
        assert_eq!(digits("12"), vec![0x23, 0x00]);
        assert_eq!(digits("-1.5E3"), vec![0xD2, 0xE6, 0xC4, 0x00]);
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let mut enc = Encoder::new();
        assert!(matches!(
            enc.put_digits("12a"),
            Err(CodecError::InvalidNumber { .. })
        ));
        assert!(matches!(enc.put_digits(""), Err(CodecError::InvalidNumber { .. })));
    }

    #[test]
    fn test_reply_by_layout() {
        let reply_by = ReplyBy {
            relation: TimeRelation::Later,
            time: FipaDateTime::from_digits("00000000000130000").unwrap(),
            type_designator: Some(b'Z'),
        };
        let mut enc = Encoder::new();
        enc.put_reply_by(&reply_by).unwrap();
        let bytes = enc.finish();
        assert_eq!(bytes[0], 0x25);
        // 17 digits + padding nibble = 9 bytes, then the designator
        assert_eq!(bytes.len(), 1 + 9 + 1);
        assert_eq!(bytes[10], b'Z');
    }

    #[test]
    fn test_words_reject_nul_and_empty() {
        let msg = AclMessage {
            performative: Performative::Inform,
            sender: Some("bad\0name".into()),
            ..Default::default()
        };
        assert!(matches!(
            encode_message(&msg),
            Err(CodecError::InvalidWord { .. })
        ));

        let msg = AclMessage {
            performative: Performative::Inform,
            receivers: vec!["".into()],
            ..Default::default()
        };
        assert!(matches!(
            encode_message(&msg),
            Err(CodecError::InvalidWord { reason: "empty", .. })
        ));
    }

    #[test]
    fn test_user_parameter_values() {
        let msg = AclMessage {
            performative: Performative::Inform,
            user_parameters: [("X-count".to_string(), "42".to_string())].into(),
            ..Default::default()
        };
        let bytes = encode_message(&msg).unwrap();
        let tail: &[u8] = &[0x00, 0x10, b'X', b'-', b'c', b'o', b'u', b'n', b't', 0x00, 0x72, 0x53, 0x00, 0x01];
        assert!(bytes.ends_with(tail));
        assert!(!looks_numeric("E"));
        assert!(looks_numeric("+1.0E5"));
        assert!(!looks_numeric("1,5"));
    }
}
