//! Domain name codec: RFC1035 §4.1.4 labels, plus the compression scheme
//! used throughout DNS and mandatory for mDNS/DNS-SD senders to at least
//! accept on receive.
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::Cursor;

use crate::error::{DNSError, DNSResult, InternalError};
use crate::network_order::ToFromNetworkOrder;
use crate::util::is_pointer;

/// Labels are restricted to 63 octets or less (the top two bits of the
/// length octet are reserved to flag a compression pointer instead).
pub const MAX_LABEL_LEN: usize = 63;

/// A fully-qualified name's wire form (labels + length octets + terminator)
/// may not exceed 255 bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Hard cap on the number of pointer hops followed while decoding a single
/// name, to defeat a message that points a name at itself.
pub const MAX_POINTER_CHASES: usize = 128;

/// An upper bound on pointer offsets: the offset field is only 14 bits wide.
pub const MAX_POINTER_OFFSET: usize = 0x3FFF;

/// A domain name as an ordered list of labels, root-terminated implicitly
/// (there is no explicit label for the root - the wire form's `0x00`
/// terminator is reconstructed on encode). Byte case is preserved as parsed;
/// equality and hashing are case-insensitive, matching the comparison rules
/// the zone and querier matcher rely on.
#[derive(Debug, Clone, Default)]
pub struct DomainName(pub Vec<String>);

impl DomainName {
    pub fn root() -> Self {
        DomainName(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends another name's labels to this one, e.g.
    /// `DomainName::try_from("_http._tcp")?.append(&domain)`.
    pub fn append(&mut self, other: &DomainName) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn eq_ignore_case(&self, other: &DomainName) -> bool {
        self == other
    }

    /// Decodes a name starting at `pos` within the full message `buffer`,
    /// following compression pointers as needed. Returns the decoded name
    /// and the position in `buffer` immediately following this name's own
    /// encoding (i.e. *not* following a pointer jump: per RFC1035, reading
    /// of the enclosing record resumes right after the 2-byte pointer).
    pub fn decode_at(buffer: &[u8], pos: usize) -> DNSResult<(Self, usize)> {
        let mut labels = Vec::new();
        let mut index = pos;
        let mut chases = 0usize;
        // position to report back to the caller: set once, on the first
        // pointer encountered (or the position right after the terminator
        // if there never was one).
        let mut return_pos: Option<usize> = None;

        loop {
            if index >= buffer.len() {
                return Err(DNSError::malformed_name());
            }

            let len_byte = buffer[index];

            if len_byte == 0 {
                if return_pos.is_none() {
                    return_pos = Some(index + 1);
                }
                break;
            }

            if is_pointer(len_byte) {
                if index + 1 >= buffer.len() {
                    return Err(DNSError::malformed_name());
                }

                chases += 1;
                if chases > MAX_POINTER_CHASES {
                    return Err(DNSError::malformed_name());
                }

                let pointer = u16::from_be_bytes([len_byte, buffer[index + 1]]);
                let offset = (pointer & 0x3FFF) as usize;

                if return_pos.is_none() {
                    return_pos = Some(index + 2);
                }

                // a pointer must point strictly backwards, into already
                // parsed message data, or we could loop forever chasing
                // forward references.
                if offset >= pos && pos != 0 {
                    return Err(DNSError::malformed_name());
                }

                index = offset;
                continue;
            }

            let size = len_byte as usize;
            if size > MAX_LABEL_LEN {
                return Err(DNSError::malformed_name());
            }
            if index + 1 + size > buffer.len() {
                return Err(DNSError::malformed_name());
            }

            let label_bytes = &buffer[index + 1..index + 1 + size];
            let label = std::str::from_utf8(label_bytes)?;
            labels.push(label.to_string());

            index += 1 + size;
        }

        if labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1 > MAX_NAME_LEN {
            return Err(DNSError::DNSInternalError(
                InternalError::DnsDomainNameTooLong,
            ));
        }

        Ok((DomainName(labels), return_pos.unwrap()))
    }

    /// Writes this name without attempting compression. Always legal per
    /// §4.B ("SHOULD be emitted on send, not mandated for conformance").
    pub fn write_uncompressed(&self, buffer: &mut Vec<u8>) -> DNSResult<usize> {
        let mut written = 0usize;

        for label in &self.0 {
            if label.len() > MAX_LABEL_LEN {
                return Err(DNSError::DNSInternalError(InternalError::LabelTooLong));
            }
            buffer.push(label.len() as u8);
            buffer.extend_from_slice(label.as_bytes());
            written += 1 + label.len();
        }

        buffer.push(0);
        written += 1;

        Ok(written)
    }

    /// Writes this name, compressing any suffix already present in `table`
    /// and registering every suffix of this name (at an offset small enough
    /// to be pointed to) for future callers.
    pub fn write_compressed(
        &self,
        buffer: &mut Vec<u8>,
        table: &mut CompressionTable,
    ) -> DNSResult<usize> {
        let start_len = buffer.len();

        for i in 0..self.0.len() {
            let suffix = self.0[i..].join(".").to_ascii_lowercase();

            if let Some(offset) = table.lookup(&suffix) {
                buffer.extend_from_slice(&(0xC000u16 | offset).to_be_bytes());
                return Ok(buffer.len() - start_len);
            }

            if buffer.len() <= MAX_POINTER_OFFSET {
                table.insert(suffix, buffer.len());
            }

            let label = &self.0[i];
            if label.len() > MAX_LABEL_LEN {
                return Err(DNSError::DNSInternalError(InternalError::LabelTooLong));
            }
            buffer.push(label.len() as u8);
            buffer.extend_from_slice(label.as_bytes());
        }

        buffer.push(0);
        Ok(buffer.len() - start_len)
    }
}

impl<'a> ToFromNetworkOrder<'a> for DomainName {
    fn to_network_bytes(&self, buffer: &mut Vec<u8>) -> std::io::Result<usize> {
        self.write_uncompressed(buffer)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{:?}", e)))
    }

    fn from_network_bytes(&mut self, buffer: &mut Cursor<&'a [u8]>) -> DNSResult<()> {
        let pos = buffer.position() as usize;
        let (name, next) = DomainName::decode_at(buffer.get_ref(), pos)?;
        *self = name;
        buffer.set_position(next as u64);
        Ok(())
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl TryFrom<&str> for DomainName {
    type Error = DNSError;

    fn try_from(domain: &str) -> DNSResult<Self> {
        if domain.is_empty() {
            return Err(DNSError::DNSInternalError(InternalError::EmptyDomainName));
        }

        if domain == "." {
            return Ok(DomainName::root());
        }

        let labels: Vec<String> = domain
            .trim_end_matches('.')
            .split('.')
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect();

        for label in &labels {
            if label.len() > MAX_LABEL_LEN {
                return Err(DNSError::DNSInternalError(InternalError::LabelTooLong));
            }
        }

        Ok(DomainName(labels))
    }
}

impl PartialEq for DomainName {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}
impl Eq for DomainName {}

impl Hash for DomainName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for label in &self.0 {
            label.to_ascii_lowercase().hash(state);
        }
    }
}

/// Maps a lowercased, dotted name suffix to the absolute byte offset within
/// the message being packed where that suffix was first written. Only
/// offsets that fit in the pointer's 14-bit field are ever recorded.
#[derive(Debug, Default)]
pub struct CompressionTable(HashMap<String, u16>);

impl CompressionTable {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn lookup(&self, suffix: &str) -> Option<u16> {
        self.0.get(suffix).copied()
    }

    pub fn insert(&mut self, suffix: String, offset: usize) {
        if offset <= MAX_POINTER_OFFSET {
            self.0.entry(suffix).or_insert(offset as u16);
        }
    }
}
