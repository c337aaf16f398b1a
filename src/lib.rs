//! A pure-userland implementation of Multicast DNS (RFC 6762) and
//! DNS-based Service Discovery (RFC 6763): a wire codec for the record
//! types DNS-SD needs, a responder that answers queries from a local
//! zone, and a querier that correlates fragments of PTR/SRV/TXT/A/AAAA
//! records into complete service entries.
pub mod error;
pub mod iface;
pub mod message;
pub mod name;
pub mod network_order;
pub mod querier;
pub mod records;
pub mod responder;
pub mod rfc1035;
pub mod socket;
pub mod util;
pub mod zone;

pub use error::{DNSError, DNSResult};
pub use querier::{query, QuerierConfig, ServiceEntry};
pub use responder::Responder;
pub use socket::SocketSetConfig;
pub use zone::MDNSService;
