//! Wire types from RFC1035 §4: the message header, the question section
//! entry, and the small closed vocabularies (opcode, response code, RR
//! type/class) used throughout the codec. Resource records and the message
//! itself live in `records.rs`/`message.rs`, since both need cross-field
//! state (compression tables, header-driven counts) that the field-by-field
//! derive below can't express.
use std::io::Cursor;

use dns_derive::{DnsEnum, DnsStruct};

use crate::error::{DNSError, DNSResult};
use crate::name::DomainName;
use crate::network_order::ToFromNetworkOrder;

/// QR bit: whether a message is a query or a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DnsEnum)]
pub enum PacketType {
    Query = 0,
    Response = 1,
}

/// A four-bit field; mDNS only ever uses `Query` (RFC6762 §18.3 reserves
/// the others, receivers MUST silently ignore messages using them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, DnsEnum)]
pub enum OpCode {
    Query = 0,
    IQuery = 1,
    Status = 2,
}

/// A four-bit field; mDNS responses MUST use `NoError` (RFC6762 §18.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, DnsEnum)]
pub enum ResponseCode {
    NoError = 0,
    FormatError = 1,
    ServerFailure = 2,
    NameError = 3,
    NotImplemented = 4,
    Refused = 5,
}

/// The 16-bit flags word sitting right after the message ID. Hand-written
/// because its sub-fields are packed bit ranges rather than sequential
/// wire elements, which the field-by-field `DnsStruct` derive can't express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub qr: PacketType,
    pub opcode: OpCode,
    pub authoritative: bool,
    pub truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub rcode: ResponseCode,
}

impl Default for Flags {
    fn default() -> Self {
        Flags {
            qr: PacketType::Query,
            opcode: OpCode::Query,
            authoritative: false,
            truncated: false,
            recursion_desired: false,
            recursion_available: false,
            rcode: ResponseCode::NoError,
        }
    }
}

impl<'a> ToFromNetworkOrder<'a> for Flags {
    fn to_network_bytes(&self, buffer: &mut Vec<u8>) -> std::io::Result<usize> {
        let mut word: u16 = 0;
        word |= (self.qr as u16) << 15;
        word |= (self.opcode as u16) << 11;
        word |= (self.authoritative as u16) << 10;
        word |= (self.truncated as u16) << 9;
        word |= (self.recursion_desired as u16) << 8;
        word |= (self.recursion_available as u16) << 7;
        // bits 4-6 are the reserved Z field, always 0
        word |= self.rcode as u16;

        word.to_network_bytes(buffer)
    }

    fn from_network_bytes(&mut self, buffer: &mut Cursor<&'a [u8]>) -> DNSResult<()> {
        let mut word = 0u16;
        word.from_network_bytes(buffer)?;

        self.qr = PacketType::try_from((word >> 15) & 0x1).map_err(DNSError::from)?;
        self.opcode = OpCode::try_from((word >> 11) & 0xF).map_err(DNSError::from)?;
        self.authoritative = (word >> 10) & 0x1 == 1;
        self.truncated = (word >> 9) & 0x1 == 1;
        self.recursion_desired = (word >> 8) & 0x1 == 1;
        self.recursion_available = (word >> 7) & 0x1 == 1;
        self.rcode = ResponseCode::try_from(word & 0xF).map_err(DNSError::from)?;

        Ok(())
    }
}

/// The 12-byte fixed message header (RFC1035 §4.1.1). Field order matches
/// the wire layout exactly, so the sequential `DnsStruct` derive is a
/// direct fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, DnsStruct)]
pub struct Header {
    pub id: u16,
    pub flags: Flags,
    pub qd_count: u16,
    pub an_count: u16,
    pub ns_count: u16,
    pub ar_count: u16,
}

/// The RR type vocabulary this implementation understands, plus a catch-all
/// for anything else observed on the wire (RFC6762 messages routinely carry
/// RR types outside this list, which must be decoded enough to skip over
/// and re-encoded byte for byte, never dropped or corrupted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QType {
    A,
    Ptr,
    Txt,
    Aaaa,
    Srv,
    Nsec,
    Any,
    Unknown(u16),
}

impl QType {
    pub fn code(&self) -> u16 {
        match self {
            QType::A => 1,
            QType::Ptr => 12,
            QType::Txt => 16,
            QType::Aaaa => 28,
            QType::Srv => 33,
            QType::Nsec => 47,
            QType::Any => 255,
            QType::Unknown(code) => *code,
        }
    }
}

impl Default for QType {
    fn default() -> Self {
        QType::Unknown(0)
    }
}

impl From<u16> for QType {
    fn from(value: u16) -> Self {
        match value {
            1 => QType::A,
            12 => QType::Ptr,
            16 => QType::Txt,
            28 => QType::Aaaa,
            33 => QType::Srv,
            47 => QType::Nsec,
            255 => QType::Any,
            other => QType::Unknown(other),
        }
    }
}

impl<'a> ToFromNetworkOrder<'a> for QType {
    fn to_network_bytes(&self, buffer: &mut Vec<u8>) -> std::io::Result<usize> {
        self.code().to_network_bytes(buffer)
    }

    fn from_network_bytes(&mut self, buffer: &mut Cursor<&'a [u8]>) -> DNSResult<()> {
        let mut code = 0u16;
        code.from_network_bytes(buffer)?;
        *self = QType::from(code);
        Ok(())
    }
}

/// RR CLASS is a 16-bit field, but per RFC6762 §18.12/§18.13 its top bit is
/// overloaded: on a question it is the "unicast response requested" (QU)
/// flag, on an answer it is the cache-flush bit. Modeled as a bare newtype
/// rather than a closed enum so both readings stay available to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ClassField(pub u16);

impl ClassField {
    pub const IN: u16 = 1;
    pub const ANY: u16 = 255;
    const FLAG_BIT: u16 = 0x8000;

    pub fn new(class: u16) -> Self {
        ClassField(class & !Self::FLAG_BIT)
    }

    pub fn with_flag(class: u16) -> Self {
        ClassField(class | Self::FLAG_BIT)
    }

    /// The class code with the top bit masked off.
    pub fn class(&self) -> u16 {
        self.0 & !Self::FLAG_BIT
    }

    /// QU on a question, cache-flush on an answer.
    pub fn flag(&self) -> bool {
        self.0 & Self::FLAG_BIT != 0
    }

    pub fn set_flag(&mut self, flag: bool) {
        if flag {
            self.0 |= Self::FLAG_BIT;
        } else {
            self.0 &= !Self::FLAG_BIT;
        }
    }
}

impl<'a> ToFromNetworkOrder<'a> for ClassField {
    fn to_network_bytes(&self, buffer: &mut Vec<u8>) -> std::io::Result<usize> {
        self.0.to_network_bytes(buffer)
    }

    fn from_network_bytes(&mut self, buffer: &mut Cursor<&'a [u8]>) -> DNSResult<()> {
        self.0.from_network_bytes(buffer)
    }
}

/// A question section entry (RFC1035 §4.1.2). Sequential fields, so the
/// derive applies cleanly; the name itself only ever round-trips
/// uncompressed here, since questions are always first in the message and
/// so never have anything earlier to point back to.
#[derive(Debug, Clone, PartialEq, Eq, Default, DnsStruct)]
pub struct Question {
    pub qname: DomainName,
    pub qtype: QType,
    pub qclass: ClassField,
}

impl Question {
    pub fn new(qname: DomainName, qtype: QType, unicast_response: bool) -> Self {
        Question {
            qname,
            qtype,
            qclass: if unicast_response {
                ClassField::with_flag(ClassField::IN)
            } else {
                ClassField::new(ClassField::IN)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_round_trip() {
        let flags = Flags {
            qr: PacketType::Response,
            opcode: OpCode::Query,
            authoritative: true,
            truncated: false,
            recursion_desired: false,
            recursion_available: false,
            rcode: ResponseCode::NoError,
        };

        let mut buffer = Vec::new();
        flags.to_network_bytes(&mut buffer).unwrap();
        assert_eq!(buffer, &[0x84, 0x00]);

        let mut cursor = Cursor::new(buffer.as_slice());
        let mut decoded = Flags::default();
        decoded.from_network_bytes(&mut cursor).unwrap();
        assert_eq!(decoded, flags);
    }

    #[test]
    fn header_round_trip() {
        let header = Header {
            id: 0,
            flags: Flags {
                qr: PacketType::Query,
                ..Default::default()
            },
            qd_count: 1,
            an_count: 0,
            ns_count: 0,
            ar_count: 0,
        };

        let mut buffer = Vec::new();
        header.to_network_bytes(&mut buffer).unwrap();
        assert_eq!(buffer.len(), 12);

        let mut cursor = Cursor::new(buffer.as_slice());
        let mut decoded = Header::default();
        decoded.from_network_bytes(&mut cursor).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn qtype_unknown_round_trip() {
        let qtype = QType::from(999);
        assert_eq!(qtype, QType::Unknown(999));

        let mut buffer = Vec::new();
        qtype.to_network_bytes(&mut buffer).unwrap();
        let mut cursor = Cursor::new(buffer.as_slice());
        let mut decoded = QType::default();
        decoded.from_network_bytes(&mut cursor).unwrap();
        assert_eq!(decoded, qtype);
    }

    #[test]
    fn class_field_flag_is_independent_of_class() {
        let mut c = ClassField::new(ClassField::IN);
        assert_eq!(c.class(), 1);
        assert!(!c.flag());

        c.set_flag(true);
        assert_eq!(c.class(), 1);
        assert!(c.flag());
    }

    #[test]
    fn question_round_trip() {
        let q = Question::new(
            DomainName::try_from("_http._tcp.local").unwrap(),
            QType::Ptr,
            true,
        );

        let mut buffer = Vec::new();
        q.to_network_bytes(&mut buffer).unwrap();

        let mut cursor = Cursor::new(buffer.as_slice());
        let mut decoded = Question::default();
        decoded.from_network_bytes(&mut cursor).unwrap();
        assert_eq!(decoded, q);
        assert!(decoded.qclass.flag());
    }
}
