//! Resource records (RFC1035 §4.1.3) and their RDATA payloads, restricted
//! to the closed set DNS-SD actually uses plus a catch-all for anything
//! else observed on the wire.
use std::io::Cursor;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::{DNSError, DNSResult, InternalError};
use crate::name::{CompressionTable, DomainName};
use crate::network_order::ToFromNetworkOrder;
use crate::rfc1035::{ClassField, QType};

/// The RDATA payloads this implementation understands. Anything outside
/// this set decodes to `Unknown` and is carried as opaque bytes, so it can
/// still be forwarded or re-encoded without being misinterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ptr(DomainName),
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: DomainName,
    },
    Txt(Vec<Vec<u8>>),
    /// RFC6762 §6.1: a synthesized NSEC record asserting a name exists but
    /// only has the bitmapped types present, used for negative responses.
    Nsec {
        next_domain: DomainName,
        type_bitmap: Vec<NsecBlock>,
    },
    Unknown {
        rtype: u16,
        rdata: Vec<u8>,
    },
}

/// One `{window, bitmap}` block of an NSEC type bitmap (RFC4034 §4.1.2):
/// `window` selects which 256-value range of RR types `bitmap` covers.
/// Stored and re-emitted opaquely — this implementation never synthesizes
/// NSEC records of its own, only parses ones it receives well enough to
/// skip them, so no window/bit is ever interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsecBlock {
    pub window: u8,
    pub bitmap: Vec<u8>,
}

impl RData {
    pub fn qtype(&self) -> QType {
        match self {
            RData::A(_) => QType::A,
            RData::Aaaa(_) => QType::Aaaa,
            RData::Ptr(_) => QType::Ptr,
            RData::Srv { .. } => QType::Srv,
            RData::Txt(_) => QType::Txt,
            RData::Nsec { .. } => QType::Nsec,
            RData::Unknown { rtype, .. } => QType::from(*rtype),
        }
    }

    fn encode_uncompressed(&self, buffer: &mut Vec<u8>) -> DNSResult<usize> {
        let start = buffer.len();

        match self {
            RData::A(addr) => buffer.extend_from_slice(&addr.octets()),
            RData::Aaaa(addr) => buffer.extend_from_slice(&addr.octets()),
            RData::Ptr(name) => {
                name.write_uncompressed(buffer)?;
            }
            RData::Srv {
                priority,
                weight,
                port,
                target,
            } => {
                priority.to_network_bytes(buffer)?;
                weight.to_network_bytes(buffer)?;
                port.to_network_bytes(buffer)?;
                target.write_uncompressed(buffer)?;
            }
            RData::Txt(strings) => {
                for s in strings {
                    if s.len() > 255 {
                        return Err(DNSError::DNSInternalError(InternalError::LabelTooLong));
                    }
                    buffer.push(s.len() as u8);
                    buffer.extend_from_slice(s);
                }
            }
            RData::Nsec {
                next_domain,
                type_bitmap,
            } => {
                next_domain.write_uncompressed(buffer)?;
                for block in type_bitmap {
                    if block.bitmap.len() > 32 {
                        return Err(DNSError::DNSInternalError(InternalError::MalformedMessage));
                    }
                    buffer.push(block.window);
                    buffer.push(block.bitmap.len() as u8);
                    buffer.extend_from_slice(&block.bitmap);
                }
            }
            RData::Unknown { rdata, .. } => buffer.extend_from_slice(rdata),
        }

        Ok(buffer.len() - start)
    }

    /// SRV and PTR names compress against the rest of the message; A/AAAA,
    /// TXT and the unknown catch-all never contain a name to compress.
    fn encode_compressed(
        &self,
        buffer: &mut Vec<u8>,
        table: &mut CompressionTable,
    ) -> DNSResult<usize> {
        let start = buffer.len();

        match self {
            RData::Ptr(name) => {
                name.write_compressed(buffer, table)?;
            }
            RData::Srv {
                priority,
                weight,
                port,
                target,
            } => {
                priority.to_network_bytes(buffer)?;
                weight.to_network_bytes(buffer)?;
                port.to_network_bytes(buffer)?;
                target.write_compressed(buffer, table)?;
            }
            _ => {
                self.encode_uncompressed(buffer)?;
            }
        }

        Ok(buffer.len() - start)
    }

    /// Decodes the RDATA for a record whose header occupies
    /// `[rdata_start, rdata_start + rdlength)` of the full message `buffer`.
    /// PTR/SRV/NSEC names take the full buffer and an absolute offset,
    /// never a sub-slice, because a compression pointer inside them is an
    /// offset into the whole message (typically pointing *before*
    /// `rdata_start`, e.g. back at the record's own owner name) — decoding
    /// against a disconnected RDATA-local slice would misinterpret that
    /// offset or reject it outright.
    fn decode(qtype: QType, buffer: &[u8], rdata_start: usize, rdlength: u16) -> DNSResult<Self> {
        let rdata_end = rdata_start + rdlength as usize;
        let slice = &buffer[rdata_start..rdata_end];
        let mut cursor = Cursor::new(slice);

        Ok(match qtype {
            QType::A => {
                if slice.len() != 4 {
                    return Err(DNSError::DNSInternalError(InternalError::MalformedMessage));
                }
                RData::A(Ipv4Addr::new(slice[0], slice[1], slice[2], slice[3]))
            }
            QType::Aaaa => {
                if slice.len() != 16 {
                    return Err(DNSError::DNSInternalError(InternalError::MalformedMessage));
                }
                let mut octets = [0u8; 16];
                octets.copy_from_slice(slice);
                RData::Aaaa(Ipv6Addr::from(octets))
            }
            QType::Ptr => {
                let (name, next) = DomainName::decode_at(buffer, rdata_start)?;
                if next > rdata_end {
                    return Err(DNSError::DNSInternalError(InternalError::MalformedMessage));
                }
                RData::Ptr(name)
            }
            QType::Srv => {
                let mut priority = 0u16;
                let mut weight = 0u16;
                let mut port = 0u16;
                priority.from_network_bytes(&mut cursor)?;
                weight.from_network_bytes(&mut cursor)?;
                port.from_network_bytes(&mut cursor)?;
                let target_start = rdata_start + cursor.position() as usize;
                let (target, next) = DomainName::decode_at(buffer, target_start)?;
                if next > rdata_end {
                    return Err(DNSError::DNSInternalError(InternalError::MalformedMessage));
                }
                RData::Srv {
                    priority,
                    weight,
                    port,
                    target,
                }
            }
            QType::Txt => {
                let mut strings = Vec::new();
                let mut pos = 0usize;
                while pos < slice.len() {
                    let len = slice[pos] as usize;
                    pos += 1;
                    if pos + len > slice.len() {
                        return Err(DNSError::DNSInternalError(InternalError::MalformedMessage));
                    }
                    strings.push(slice[pos..pos + len].to_vec());
                    pos += len;
                }
                RData::Txt(strings)
            }
            QType::Nsec => {
                let (next_domain, next) = DomainName::decode_at(buffer, rdata_start)?;
                if next > rdata_end {
                    return Err(DNSError::DNSInternalError(InternalError::MalformedMessage));
                }
                let type_bitmap = decode_nsec_bitmap(&buffer[next..rdata_end])?;
                RData::Nsec {
                    next_domain,
                    type_bitmap,
                }
            }
            QType::Any | QType::Unknown(_) => RData::Unknown {
                rtype: qtype.code(),
                rdata: slice.to_vec(),
            },
        })
    }
}

/// Parses a sequence of RFC4034 §4.1.2 `{window, bitmap_len, bitmap}`
/// blocks. Any window value or bitmap content is accepted as-is — per
/// §4.B, the decoder must not reject blocks it doesn't understand, only
/// a structurally truncated block (one that claims more bitmap bytes than
/// remain) is malformed.
fn decode_nsec_bitmap(slice: &[u8]) -> DNSResult<Vec<NsecBlock>> {
    let mut blocks = Vec::new();
    let mut pos = 0usize;

    while pos < slice.len() {
        if pos + 2 > slice.len() {
            return Err(DNSError::DNSInternalError(InternalError::MalformedMessage));
        }
        let window = slice[pos];
        let bitmap_len = slice[pos + 1] as usize;
        pos += 2;

        if pos + bitmap_len > slice.len() {
            return Err(DNSError::DNSInternalError(InternalError::MalformedMessage));
        }
        blocks.push(NsecBlock {
            window,
            bitmap: slice[pos..pos + bitmap_len].to_vec(),
        });
        pos += bitmap_len;
    }

    Ok(blocks)
}

/// A single resource record (RFC1035 §4.1.3): owner name, type/class,
/// cache lifetime and RDATA. Hand-written codec: RDATA is variable-length
/// and type-dispatched, and the owner name wants compression against the
/// rest of the message, neither of which the sequential `DnsStruct` derive
/// can express.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: DomainName,
    pub class: ClassField,
    pub ttl: u32,
    pub rdata: RData,
}

impl ResourceRecord {
    pub fn new(name: DomainName, class: ClassField, ttl: u32, rdata: RData) -> Self {
        ResourceRecord {
            name,
            class,
            ttl,
            rdata,
        }
    }

    pub fn to_network_bytes_compressed(
        &self,
        buffer: &mut Vec<u8>,
        table: &mut CompressionTable,
    ) -> DNSResult<usize> {
        let start = buffer.len();

        self.name.write_compressed(buffer, table)?;
        self.rdata.qtype().to_network_bytes(buffer)?;
        self.class.to_network_bytes(buffer)?;
        self.ttl.to_network_bytes(buffer)?;

        // rdlength is filled in after we know the encoded payload's size
        let rdlength_pos = buffer.len();
        0u16.to_network_bytes(buffer)?;

        let rdata_start = buffer.len();
        self.rdata.encode_compressed(buffer, table)?;
        let rdlength = (buffer.len() - rdata_start) as u16;
        buffer[rdlength_pos..rdlength_pos + 2].copy_from_slice(&rdlength.to_be_bytes());

        Ok(buffer.len() - start)
    }

    /// Decodes a record starting at `pos` within the full message `buffer`,
    /// returning it along with the position immediately following.
    pub fn decode_at(buffer: &[u8], pos: usize) -> DNSResult<(Self, usize)> {
        let (name, mut index) = DomainName::decode_at(buffer, pos)?;

        let mut cursor = Cursor::new(&buffer[index..]);
        let mut qtype = QType::default();
        qtype.from_network_bytes(&mut cursor)?;
        let mut class = ClassField::default();
        class.from_network_bytes(&mut cursor)?;
        let mut ttl = 0u32;
        ttl.from_network_bytes(&mut cursor)?;
        let mut rdlength = 0u16;
        rdlength.from_network_bytes(&mut cursor)?;

        index += cursor.position() as usize;

        if index + rdlength as usize > buffer.len() {
            return Err(DNSError::DNSInternalError(InternalError::MalformedMessage));
        }

        let rdata = RData::decode(qtype, buffer, index, rdlength)?;
        index += rdlength as usize;

        Ok((
            ResourceRecord {
                name,
                class,
                ttl,
                rdata,
            },
            index,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_record_round_trip() {
        let rr = ResourceRecord::new(
            DomainName::try_from("host.local").unwrap(),
            ClassField::new(ClassField::IN),
            120,
            RData::A(Ipv4Addr::new(192, 168, 1, 42)),
        );

        let mut buffer = Vec::new();
        let mut table = CompressionTable::new();
        rr.to_network_bytes_compressed(&mut buffer, &mut table)
            .unwrap();

        let (decoded, next) = ResourceRecord::decode_at(&buffer, 0).unwrap();
        assert_eq!(decoded, rr);
        assert_eq!(next, buffer.len());
    }

    #[test]
    fn srv_record_compresses_target_against_owner() {
        let name = DomainName::try_from("My Printer._http._tcp.local").unwrap();
        let rr = ResourceRecord::new(
            name.clone(),
            ClassField::with_flag(ClassField::IN),
            120,
            RData::Srv {
                priority: 0,
                weight: 0,
                port: 631,
                target: DomainName::try_from("My Printer.local").unwrap(),
            },
        );

        let mut buffer = Vec::new();
        let mut table = CompressionTable::new();
        rr.to_network_bytes_compressed(&mut buffer, &mut table)
            .unwrap();

        let (decoded, _) = ResourceRecord::decode_at(&buffer, 0).unwrap();
        assert_eq!(decoded, rr);
        assert!(decoded.class.flag());
    }

    #[test]
    fn txt_record_multiple_strings() {
        let rr = ResourceRecord::new(
            DomainName::try_from("My Printer._http._tcp.local").unwrap(),
            ClassField::new(ClassField::IN),
            4500,
            RData::Txt(vec![b"txtvers=1".to_vec(), b"path=/".to_vec()]),
        );

        let mut buffer = Vec::new();
        let mut table = CompressionTable::new();
        rr.to_network_bytes_compressed(&mut buffer, &mut table)
            .unwrap();

        let (decoded, _) = ResourceRecord::decode_at(&buffer, 0).unwrap();
        assert_eq!(decoded, rr);
    }

    #[test]
    fn ptr_target_compresses_against_earlier_owner_name_in_full_message() {
        // Mirrors a real PTR answer: the target shares a suffix with a name
        // already written earlier in the message (here, standing in for the
        // record's own owner name or a preceding question), so its encoding
        // ends in a pointer back into that earlier name rather than staying
        // self-contained within the RDATA.
        let mut buffer = Vec::new();
        let mut table = CompressionTable::new();
        DomainName::try_from("_http._tcp.local")
            .unwrap()
            .write_compressed(&mut buffer, &mut table)
            .unwrap();

        let rr = ResourceRecord::new(
            DomainName::try_from("_http._tcp.local").unwrap(),
            ClassField::new(ClassField::IN),
            4500,
            RData::Ptr(DomainName::try_from("My Printer._http._tcp.local").unwrap()),
        );
        let rr_start = buffer.len();
        rr.to_network_bytes_compressed(&mut buffer, &mut table)
            .unwrap();

        let (decoded, next) = ResourceRecord::decode_at(&buffer, rr_start).unwrap();
        assert_eq!(decoded, rr);
        assert_eq!(next, buffer.len());
    }

    #[test]
    fn nsec_record_round_trips_bitmap_blocks() {
        let rr = ResourceRecord::new(
            DomainName::try_from("host.local").unwrap(),
            ClassField::new(ClassField::IN),
            4500,
            RData::Nsec {
                next_domain: DomainName::try_from("host.local").unwrap(),
                type_bitmap: vec![
                    NsecBlock {
                        window: 0,
                        bitmap: vec![0x40, 0x01],
                    },
                    NsecBlock {
                        window: 1,
                        bitmap: vec![0x00, 0x08],
                    },
                ],
            },
        );

        let mut buffer = Vec::new();
        let mut table = CompressionTable::new();
        rr.to_network_bytes_compressed(&mut buffer, &mut table)
            .unwrap();

        let (decoded, next) = ResourceRecord::decode_at(&buffer, 0).unwrap();
        assert_eq!(decoded, rr);
        assert_eq!(next, buffer.len());
    }

    #[test]
    fn unknown_rtype_round_trips_as_opaque_bytes() {
        let mut buffer = Vec::new();
        DomainName::try_from("host.local")
            .unwrap()
            .write_uncompressed(&mut buffer)
            .unwrap();
        QType::Unknown(64).to_network_bytes(&mut buffer).unwrap();
        ClassField::new(ClassField::IN)
            .to_network_bytes(&mut buffer)
            .unwrap();
        120u32.to_network_bytes(&mut buffer).unwrap();
        let payload = [0xDE, 0xAD, 0xBE, 0xEF];
        (payload.len() as u16)
            .to_network_bytes(&mut buffer)
            .unwrap();
        buffer.extend_from_slice(&payload);

        let (decoded, next) = ResourceRecord::decode_at(&buffer, 0).unwrap();
        assert_eq!(next, buffer.len());
        assert_eq!(
            decoded.rdata,
            RData::Unknown {
                rtype: 64,
                rdata: payload.to_vec()
            }
        );
    }
}
