//! A full DNS message (RFC1035 §4.1): header plus its four sections. The
//! donor's own message type held a single `Option<ResourceRecord>` per
//! section; mDNS responses routinely carry several answers, authorities and
//! additionals in one packet, so here each section is a `Vec` whose length
//! is driven by the header's `*_count` fields rather than inferred from the
//! remaining buffer length.
use std::io::Cursor;

use crate::error::{DNSError, DNSResult, InternalError};
use crate::name::CompressionTable;
use crate::network_order::ToFromNetworkOrder;
use crate::records::ResourceRecord;
use crate::rfc1035::Header;
use crate::rfc1035::Question;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl Message {
    pub fn new(header: Header) -> Self {
        Message {
            header,
            ..Default::default()
        }
    }

    pub fn push_question(&mut self, question: Question) {
        self.questions.push(question);
        self.header.qd_count = self.questions.len() as u16;
    }

    pub fn push_answer(&mut self, rr: ResourceRecord) {
        self.answers.push(rr);
        self.header.an_count = self.answers.len() as u16;
    }

    pub fn push_authority(&mut self, rr: ResourceRecord) {
        self.authorities.push(rr);
        self.header.ns_count = self.authorities.len() as u16;
    }

    pub fn push_additional(&mut self, rr: ResourceRecord) {
        self.additionals.push(rr);
        self.header.ar_count = self.additionals.len() as u16;
    }

    pub fn to_bytes(&self) -> DNSResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut table = CompressionTable::new();

        self.header
            .to_network_bytes(&mut buffer)
            .map_err(DNSError::Io)?;

        for q in &self.questions {
            q.qname.write_compressed(&mut buffer, &mut table)?;
            q.qtype.to_network_bytes(&mut buffer).map_err(DNSError::Io)?;
            q.qclass
                .to_network_bytes(&mut buffer)
                .map_err(DNSError::Io)?;
        }

        for section in [&self.answers, &self.authorities, &self.additionals] {
            for rr in section {
                rr.to_network_bytes_compressed(&mut buffer, &mut table)?;
            }
        }

        Ok(buffer)
    }

    pub fn from_bytes(buffer: &[u8]) -> DNSResult<Self> {
        let mut cursor = Cursor::new(buffer);
        let mut header = Header::default();
        header.from_network_bytes(&mut cursor)?;

        let mut pos = cursor.position() as usize;

        let mut questions = Vec::with_capacity(header.qd_count as usize);
        for _ in 0..header.qd_count {
            let mut q = Question::default();
            let mut qc = Cursor::new(&buffer[pos..]);
            let (qname, name_end) = crate::name::DomainName::decode_at(buffer, pos)?;
            q.qname = qname;
            qc.set_position((name_end - pos) as u64);
            q.qtype.from_network_bytes(&mut qc)?;
            q.qclass.from_network_bytes(&mut qc)?;
            pos += qc.position() as usize;
            questions.push(q);
        }

        let decode_section = |count: u16, pos: &mut usize| -> DNSResult<Vec<ResourceRecord>> {
            let mut section = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (rr, next) = ResourceRecord::decode_at(buffer, *pos)?;
                *pos = next;
                section.push(rr);
            }
            Ok(section)
        };

        let answers = decode_section(header.an_count, &mut pos)?;
        let authorities = decode_section(header.ns_count, &mut pos)?;
        let additionals = decode_section(header.ar_count, &mut pos)?;

        if header.qd_count as usize != questions.len() {
            return Err(DNSError::DNSInternalError(InternalError::MalformedMessage));
        }

        Ok(Message {
            header,
            questions,
            answers,
            authorities,
            additionals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::DomainName;
    use crate::rfc1035::{ClassField, Flags, PacketType, QType};
    use std::net::Ipv4Addr;

    #[test]
    fn query_round_trip() {
        let mut header = Header::default();
        header.flags = Flags {
            qr: PacketType::Query,
            ..Default::default()
        };

        let mut msg = Message::new(header);
        msg.push_question(Question::new(
            DomainName::try_from("_http._tcp.local").unwrap(),
            QType::Ptr,
            false,
        ));

        let bytes = msg.to_bytes().unwrap();
        let decoded = Message::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn response_with_multiple_answers_round_trips() {
        let mut header = Header::default();
        header.flags = Flags {
            qr: PacketType::Response,
            authoritative: true,
            ..Default::default()
        };

        let mut msg = Message::new(header);

        msg.push_answer(ResourceRecord::new(
            DomainName::try_from("_http._tcp.local").unwrap(),
            ClassField::new(ClassField::IN),
            4500,
            crate::records::RData::Ptr(
                DomainName::try_from("My Printer._http._tcp.local").unwrap(),
            ),
        ));
        msg.push_answer(ResourceRecord::new(
            DomainName::try_from("My Printer._http._tcp.local").unwrap(),
            ClassField::with_flag(ClassField::IN),
            120,
            crate::records::RData::Srv {
                priority: 0,
                weight: 0,
                port: 631,
                target: DomainName::try_from("My Printer.local").unwrap(),
            },
        ));
        msg.push_additional(ResourceRecord::new(
            DomainName::try_from("My Printer.local").unwrap(),
            ClassField::with_flag(ClassField::IN),
            120,
            crate::records::RData::A(Ipv4Addr::new(192, 168, 1, 10)),
        ));

        let bytes = msg.to_bytes().unwrap();
        let decoded = Message::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.header.an_count, 2);
        assert_eq!(decoded.header.ar_count, 1);
    }

    #[test]
    fn truncated_buffer_is_rejected_not_panicked() {
        let mut header = Header::default();
        header.qd_count = 1;
        let mut buffer = Vec::new();
        header.to_network_bytes(&mut buffer).unwrap();
        // no question actually follows
        assert!(Message::from_bytes(&buffer).is_err());
    }
}
