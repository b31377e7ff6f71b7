// encoding/bitefficient/decoder.rs - Bit-Efficient Decoder

use tracing::{trace, warn};

use super::tokens::*;
use crate::acl_message::{
    AclMessage, AclRepresentation, AgentAddress, ConversationId, FipaDateTime, PayloadEncoding,
    Performative, ReplyBy, TimeRelation,
};
use crate::encoding::CodecError;

/// Deepest level-down nesting accepted while skipping unknown values
pub const MAX_NESTING: usize = 64;

/// Forward-only reader that remembers where each failure happened
pub(crate) struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    fn peek(&self, expected: &'static str) -> Result<u8, CodecError> {
        self.input
            .get(self.pos)
            .copied()
            .ok_or(CodecError::UnexpectedEnd {
                offset: self.pos,
                expected,
            })
    }

    fn read_u8(&mut self, expected: &'static str) -> Result<u8, CodecError> {
        let byte = self.peek(expected)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, len: usize, expected: &'static str) -> Result<&'a [u8], CodecError> {
        if self.remaining() < len {
            return Err(CodecError::UnexpectedEnd {
                offset: self.input.len(),
                expected,
            });
        }
        let slice = &self.input[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_be(&mut self, width: usize) -> Result<usize, CodecError> {
        let bytes = self.read_exact(width, "string length")?;
        Ok(bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize))
    }

    /// Bytes up to (not including) the next NUL, which is consumed
    fn read_terminated(&mut self, expected: &'static str) -> Result<&'a [u8], CodecError> {
        let rest = &self.input[self.pos..];
        match rest.iter().position(|b| *b == 0) {
            Some(end) => {
                self.pos += end + 1;
                Ok(&rest[..end])
            }
            None => Err(CodecError::UnexpectedEnd {
                offset: self.input.len(),
                expected,
            }),
        }
    }

    fn read_text(&mut self, field: &'static str) -> Result<String, CodecError> {
        let start = self.pos;
        let bytes = self.read_terminated("word end 0x00")?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8 {
            offset: start,
            field,
        })
    }

    /// Word body after a word-begin token
    fn read_word(&mut self, field: &'static str) -> Result<String, CodecError> {
        let offset = self.pos;
        let token = self.read_u8("word begin 0x10")?;
        match BinToken::from_code(token) {
            Some(BinToken::WordBegin) => self.read_text(field),
            Some(BinToken::IndexWordBegin) => Err(CodecError::IndexedToken {
                offset,
                found: token,
            }),
            _ => Err(CodecError::UnexpectedToken {
                offset,
                found: token,
                expected: "word begin 0x10",
            }),
        }
    }

    /// Parameter value in one of the `BinString` forms
    fn read_string(&mut self) -> Result<Vec<u8>, CodecError> {
        let offset = self.pos;
        let token = self.read_u8("string begin")?;
        let bytes = match BinString::from_code(token) {
            Some(BinString::StringBegin) => self.read_terminated("string end 0x00")?,
            Some(BinString::Len8ByteSeqBegin) => {
                let len = self.read_be(1)?;
                self.read_exact(len, "len8 string body")?
            }
            Some(BinString::Len16ByteSeqBegin) => {
                let len = self.read_be(2)?;
                self.read_exact(len, "len16 string body")?
            }
            Some(BinString::Len32ByteSeqBegin) => {
                let len = self.read_be(4)?;
                self.read_exact(len, "len32 string body")?
            }
            Some(BinString::IndexStringBegin | BinString::IndexByteLengthEncodedBegin) => {
                return Err(CodecError::IndexedToken {
                    offset,
                    found: token,
                });
            }
            _ => {
                return Err(CodecError::UnexpectedToken {
                    offset,
                    found: token,
                    expected: "string begin 0x14/0x16/0x17/0x19",
                });
            }
        };
        Ok(bytes.to_vec())
    }

    fn read_string_text(&mut self, field: &'static str) -> Result<String, CodecError> {
        let offset = self.pos;
        let bytes = self.read_string()?;
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8 { offset, field })
    }

    /// Nibble-packed number characters up to the padding nibble
    fn read_digits(&mut self) -> Result<String, CodecError> {
        let mut digits = String::new();
        loop {
            let offset = self.pos;
            let byte = self.read_u8("number digits")?;
            for nibble in [byte >> 4, byte & 0x0F] {
                match NumberToken::from_code(nibble) {
                    Some(NumberToken::Padding) => return Ok(digits),
                    Some(token) => {
                        if let Some(symbol) = token.symbol() {
                            digits.push(symbol);
                        }
                    }
                    None => {
                        return Err(CodecError::MalformedNumber {
                            offset,
                            reason: format!("nibble 0x{nibble:X} is not a number token"),
                        });
                    }
                }
            }
        }
    }

    /// `0x60 (0x70 word)* 0x40`, where `0x50 word` also ends the level
    fn read_addresses(&mut self) -> Result<Vec<AgentAddress>, CodecError> {
        let offset = self.pos;
        let token = self.read_u8("level down 0x60")?;
        if token != ExprStart::LevelDown.code() {
            return Err(CodecError::UnexpectedToken {
                offset,
                found: token,
                expected: "level down 0x60",
            });
        }

        let mut addresses = Vec::new();
        loop {
            let offset = self.pos;
            let token = self.read_u8("address word or level up")?;
            if token == ExprStart::WordBegin.code() {
                addresses.push(AgentAddress::new(self.read_text("address")?));
            } else if token == ExprEnd::WordBegin.code() {
                addresses.push(AgentAddress::new(self.read_text("address")?));
                return Ok(addresses);
            } else if token == ExprEnd::LevelUp.code() {
                return Ok(addresses);
            } else if token == ExprStart::IndexWordCodeBegin.code()
                || token == ExprEnd::IndexWordCodeBegin.code()
            {
                return Err(CodecError::IndexedToken { offset, found: token });
            } else {
                return Err(CodecError::UnexpectedToken {
                    offset,
                    found: token,
                    expected: "address word 0x70 or level up 0x40",
                });
            }
        }
    }

    fn read_reply_by(&mut self) -> Result<ReplyBy, CodecError> {
        let offset = self.pos;
        let code = self.read_u8("date-time token")?;
        let token = BinDateTimeToken::from_code(code).ok_or(CodecError::UnexpectedToken {
            offset,
            found: code,
            expected: "date-time token 0x20..0x26",
        })?;
        let relation = match token {
            BinDateTimeToken::AbsTime | BinDateTimeToken::AbsTimeTypeDesignator => {
                TimeRelation::Absolute
            }
            BinDateTimeToken::RelTimePos | BinDateTimeToken::RelTimePosTypeDesignator => {
                TimeRelation::Later
            }
            BinDateTimeToken::RelTimeNeg | BinDateTimeToken::RelTimeNegTypeDesignator => {
                TimeRelation::Earlier
            }
        };

        let digits_at = self.pos;
        let digits = self.read_digits()?;
        let time = FipaDateTime::from_digits(&digits).ok_or_else(|| CodecError::MalformedDate {
            offset: digits_at,
            reason: format!(
                "expected {} decimal digits, found {:?}",
                FipaDateTime::DIGITS,
                digits
            ),
        })?;

        let type_designator = if token.has_type_designator() {
            Some(self.read_u8("date-time type designator")?)
        } else {
            None
        };

        Ok(ReplyBy {
            relation,
            time,
            type_designator,
        })
    }

    /// User-defined parameter value: number or string expression
    fn read_user_value(&mut self) -> Result<String, CodecError> {
        let offset = self.pos;
        let token = self.read_u8("user parameter value")?;
        let bytes = match ExprStart::from_code(token) {
            Some(ExprStart::NumberBegin) => return self.read_digits(),
            Some(ExprStart::WordBegin) => return self.read_text("user parameter"),
            Some(ExprStart::StringBegin) => self.read_terminated("string end 0x00")?,
            Some(ExprStart::Len8StringBegin) => {
                let len = self.read_be(1)?;
                self.read_exact(len, "len8 string body")?
            }
            Some(ExprStart::Len16StringBegin) => {
                let len = self.read_be(2)?;
                self.read_exact(len, "len16 string body")?
            }
            Some(ExprStart::Len32StringBegin) => {
                let len = self.read_be(4)?;
                self.read_exact(len, "len32 string body")?
            }
            Some(
                ExprStart::IndexWordCodeBegin
                | ExprStart::IndexStringBegin
                | ExprStart::IndexByteStringBegin,
            ) => {
                return Err(CodecError::IndexedToken { offset, found: token });
            }
            _ => {
                return Err(CodecError::UnexpectedToken {
                    offset,
                    found: token,
                    expected: "number 0x72 or string expression 0x74/0x76/0x77/0x78",
                });
            }
        };
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8 {
            offset,
            field: "user parameter",
        })
    }

    /// Consume one value of any known shape without interpreting it
    fn skip_value(&mut self, depth: usize) -> Result<(), CodecError> {
        let offset = self.pos;
        let token = self.read_u8("parameter value")?;
        match token {
            0x10 | 0x70 | 0x50 | 0x14 | 0x74 | 0x54 => {
                self.read_terminated("value end 0x00")?;
            }
            0x12 | 0x13 | 0x72 | 0x73 | 0x52 | 0x53 => {
                self.read_digits()?;
            }
            0x16 | 0x76 | 0x56 => {
                let len = self.read_be(1)?;
                self.read_exact(len, "len8 value body")?;
            }
            0x17 | 0x77 | 0x57 => {
                let len = self.read_be(2)?;
                self.read_exact(len, "len16 value body")?;
            }
            0x19 | 0x78 | 0x58 => {
                let len = self.read_be(4)?;
                self.read_exact(len, "len32 value body")?;
            }
            0x20..=0x22 | 0x24..=0x26 => {
                self.pos = offset;
                self.read_reply_by()?;
            }
            0x60 => {
                if depth >= MAX_NESTING {
                    return Err(CodecError::NestingTooDeep {
                        offset,
                        max: MAX_NESTING,
                    });
                }
                while self.peek("level up 0x40")? != ExprEnd::LevelUp.code() {
                    let closes = self.peek("expression element")? == ExprEnd::WordBegin.code();
                    self.skip_value(depth + 1)?;
                    if closes {
                        return Ok(());
                    }
                }
                self.pos += 1;
            }
            0x11 | 0x15 | 0x18 | 0x71 | 0x75 | 0x79 | 0x51 | 0x55 => {
                return Err(CodecError::IndexedToken { offset, found: token });
            }
            _ => {
                return Err(CodecError::UnexpectedToken {
                    offset,
                    found: token,
                    expected: "a value token",
                });
            }
        }
        Ok(())
    }
}

/// Decode one complete bit-efficient message
pub(crate) fn decode_message(input: &[u8]) -> Result<AclMessage, CodecError> {
    let mut dec = Decoder::new(input);

    let id = dec.read_u8("message identifier")?;
    match MessageId::from_code(id) {
        Some(MessageId::BitEfficient) => {}
        Some(scheme) => return Err(CodecError::UnsupportedScheme(scheme)),
        None => return Err(CodecError::UnknownMessageId { offset: 0, found: id }),
    }

    let mut message = AclMessage {
        acl_representation: AclRepresentation::BitEfficient,
        ..Default::default()
    };

    let type_at = dec.position();
    let type_code = dec.read_u8("message type")?;
    message.performative = if type_code == USER_DEFINED_MESSAGE_TYPE {
        Performative::from_fipa_name(&dec.read_word("message type")?)
    } else {
        performative_from_code(type_code).ok_or(CodecError::UnexpectedToken {
            offset: type_at,
            found: type_code,
            expected: "predefined message type 0x01..0x16 or 0x00",
        })?
    };

    loop {
        let offset = dec.position();
        let code = dec.read_u8("parameter or end of message 0x01")?;
        if code == END_OF_COLLECTION {
            break;
        }
        if code == USER_DEFINED_PARAMETER {
            let name = dec.read_word("user parameter name")?;
            let value = dec.read_user_value()?;
            message.user_parameters.insert(name, value);
            continue;
        }

        let Some(param) = PredefinedMsgParam::from_code(code) else {
            warn!(offset, code, "Skipping unknown message parameter");
            dec.skip_value(0)?;
            continue;
        };
        trace!(offset, param = param.fipa_name(), "Decoding parameter");

        match param {
            PredefinedMsgParam::Sender => {
                let addresses = dec.read_addresses()?;
                if addresses.len() > 1 {
                    warn!(count = addresses.len(), "Sender carries several addresses, keeping the first");
                }
                message.sender = addresses.into_iter().next();
            }
            PredefinedMsgParam::Receiver => message.receivers = dec.read_addresses()?,
            PredefinedMsgParam::Content => message.content = dec.read_string()?,
            PredefinedMsgParam::ReplyWith => {
                message.reply_with = Some(dec.read_string_text("reply-with")?)
            }
            PredefinedMsgParam::ReplyBy => message.reply_by = Some(dec.read_reply_by()?),
            PredefinedMsgParam::InReplyTo => {
                message.in_reply_to = Some(dec.read_string_text("in-reply-to")?)
            }
            PredefinedMsgParam::ReplyTo => message.reply_to = dec.read_addresses()?,
            PredefinedMsgParam::Language => {
                message.language = Some(dec.read_string_text("language")?)
            }
            PredefinedMsgParam::Encoding => {
                let encoding = dec.read_string_text("encoding")?;
                if let Some(payload) = PayloadEncoding::from_value(&encoding) {
                    message.payload_encoding = payload;
                }
                message.encoding = Some(encoding);
            }
            PredefinedMsgParam::Ontology => {
                message.ontology = Some(dec.read_string_text("ontology")?)
            }
            PredefinedMsgParam::Protocol => {
                message.protocol = Some(dec.read_string_text("protocol")?)
            }
            PredefinedMsgParam::ConversationId => {
                message.conversation_id =
                    Some(ConversationId::from(dec.read_string_text("conversation-id")?))
            }
        }
    }

    if dec.remaining() > 0 {
        return Err(CodecError::TrailingBytes {
            offset: dec.position(),
            count: dec.remaining(),
        });
    }

    Ok(message)
}
