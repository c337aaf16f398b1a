//! Querier correlation engine (§4.F): sends a PTR query, then folds
//! arriving PTR/SRV/A/AAAA/TXT records from every socket into
//! `ServiceEntry` values, aliasing instance and host names so records for
//! either key land on the same entry.
use std::cell::RefCell;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::rc::Rc;
use std::time::Duration;

use log::trace;
use rand::Rng;
use tokio::net::UdpSocket;
use tokio::time::Instant;

use crate::error::{DNSError, DNSResult};
use crate::iface::InterfaceSource;
use crate::message::Message;
use crate::name::DomainName;
use crate::records::RData;
use crate::rfc1035::{Flags, Header, OpCode, PacketType, Question, QType};
use crate::socket::{multicast_addr_v4, multicast_addr_v6, SocketSet, SocketSetConfig};

#[derive(Debug, Clone, Default)]
pub struct ServiceEntry {
    pub name: DomainName,
    pub host: Option<DomainName>,
    pub addrs_v4: Vec<Ipv4Addr>,
    pub addrs_v6: Vec<Ipv6Addr>,
    pub port: u16,
    pub info: Option<Vec<u8>>,
    pub info_fields: Vec<Vec<u8>>,
    pub has_txt: bool,
    pub sent: bool,
}

impl ServiceEntry {
    pub fn is_complete(&self) -> bool {
        (!self.addrs_v4.is_empty() || !self.addrs_v6.is_empty()) && self.port != 0 && self.has_txt
    }
}

#[derive(Debug, Clone)]
pub struct QuerierConfig {
    pub service: String,
    pub domain: String,
    pub timeout: Duration,
    pub want_unicast_response: bool,
    pub socket: SocketSetConfig,
}

impl Default for QuerierConfig {
    fn default() -> Self {
        QuerierConfig {
            service: String::new(),
            domain: "local".to_string(),
            timeout: Duration::from_secs(5),
            want_unicast_response: false,
            socket: SocketSetConfig::default(),
        }
    }
}

type Entry = Rc<RefCell<ServiceEntry>>;

/// Owns the alias-aware `name -> ServiceEntry` map described in §4.F and
/// §9 ("Decision: shared ownership via `Rc<RefCell<ServiceEntry>>`"); the
/// whole querier runs on a single task, so interior mutability alone is
/// enough, no `Arc`/`Mutex` needed.
#[derive(Default)]
struct Correlator {
    entries: HashMap<DomainName, Entry>,
}

impl Correlator {
    fn ensure(&mut self, name: &DomainName) -> Entry {
        if let Some(entry) = self.entries.get(name) {
            return entry.clone();
        }
        let entry = Rc::new(RefCell::new(ServiceEntry {
            name: name.clone(),
            ..Default::default()
        }));
        self.entries.insert(name.clone(), entry.clone());
        entry
    }

    fn alias(&mut self, name: &DomainName, target: &DomainName) {
        let entry = self.ensure(target);
        self.entries.insert(name.clone(), entry);
    }

    fn fold(&mut self, rdata: &RData, owner: &DomainName) {
        match rdata {
            RData::Ptr(target) => {
                self.ensure(target).borrow_mut().name = target.clone();
                self.alias(owner, target);
            }
            RData::Srv {
                port, target, ..
            } => {
                let entry = self.ensure(owner);
                let mut e = entry.borrow_mut();
                e.host = Some(target.clone());
                e.port = *port;
            }
            RData::A(v4) => {
                self.ensure(owner).borrow_mut().addrs_v4.push(*v4);
                self.propagate_address(owner, IpAddr::V4(*v4));
            }
            RData::Aaaa(v6) => {
                self.ensure(owner).borrow_mut().addrs_v6.push(*v6);
                self.propagate_address(owner, IpAddr::V6(*v6));
            }
            RData::Txt(strings) => {
                let entry = self.ensure(owner);
                let mut e = entry.borrow_mut();
                e.info_fields = strings.clone();
                e.info = strings.first().cloned();
                e.has_txt = true;
            }
            RData::Nsec { .. } | RData::Unknown { .. } => {}
        }
    }

    /// An A/AAAA record for a host propagates to every other entry whose
    /// `host` matches, not just the entry keyed on that exact name.
    fn propagate_address(&mut self, host: &DomainName, addr: IpAddr) {
        for entry in self.entries.values() {
            let mut e = entry.borrow_mut();
            if e.host.as_ref() == Some(host) && e.name != *host {
                match addr {
                    IpAddr::V4(v4) if !e.addrs_v4.contains(&v4) => e.addrs_v4.push(v4),
                    IpAddr::V6(v6) if !e.addrs_v6.contains(&v6) => e.addrs_v6.push(v6),
                    _ => {}
                }
            }
        }
    }

    fn ready_to_emit(&self, matcher: &ServiceMatcher) -> Vec<Entry> {
        let mut seen = std::collections::HashSet::new();
        let mut ready = Vec::new();

        for entry in self.entries.values() {
            let ptr = Rc::as_ptr(entry) as usize;
            if seen.contains(&ptr) {
                continue;
            }
            seen.insert(ptr);

            let e = entry.borrow();
            if e.is_complete() && !e.sent && matcher.matches(&e.name) {
                ready.push(entry.clone());
            }
        }

        ready
    }
}

/// §4.F's matcher: an entry matches the query iff its lowercased,
/// trailing-dot name either equals `<service>.<domain>.`, or has exactly
/// one extra leading label in front of it (the instance label).
struct ServiceMatcher {
    service_domain: DomainName,
}

impl ServiceMatcher {
    fn new(service: &str, domain: &str) -> Self {
        ServiceMatcher {
            service_domain: DomainName::try_from(format!("{}.{}", service, domain).as_str())
                .unwrap(),
        }
    }

    fn matches(&self, name: &DomainName) -> bool {
        if *name == self.service_domain {
            return true;
        }
        if name.0.len() == self.service_domain.0.len() + 1 {
            let suffix = DomainName(name.0[1..].to_vec());
            return suffix == self.service_domain;
        }
        false
    }
}

/// Runs one querier operation to completion and returns every
/// `ServiceEntry` that became complete before the timeout.
pub async fn query(config: QuerierConfig, interfaces: &dyn InterfaceSource) -> DNSResult<Vec<ServiceEntry>> {
    let sockets = SocketSet::bind_querier(&config.socket, interfaces)?;
    let matcher = ServiceMatcher::new(&config.service, &config.domain);

    let mut id_rng = rand::thread_rng();
    let id: u16 = id_rng.gen();

    let qname = DomainName::try_from(format!("{}.{}", config.service, config.domain).as_str())
        .map_err(|_| DNSError::new("invalid service/domain"))?;

    let mut header = Header::default();
    header.id = id;
    header.flags = Flags {
        qr: PacketType::Query,
        opcode: OpCode::Query,
        ..Default::default()
    };
    let mut msg = Message::new(header);
    msg.push_question(Question::new(qname, QType::Ptr, config.want_unicast_response));
    let bytes = msg.to_bytes()?;

    let mut sent_any = false;
    if let Some(v4) = &sockets.v4 {
        if v4.send_multicast(&bytes, multicast_addr_v4()).await.is_ok() {
            sent_any = true;
        }
    }
    if let Some(v6) = &sockets.v6 {
        if v6.send_multicast(&bytes, multicast_addr_v6()).await.is_ok() {
            sent_any = true;
        }
    }

    if !sent_any {
        return Err(DNSError::DNSInternalError(
            crate::error::InternalError::SendFailed,
        ));
    }

    let mut correlator = Correlator::default();
    let mut emitted = Vec::new();
    let deadline = Instant::now() + config.timeout;
    let mut buf = vec![0u8; 9000];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        let received = tokio::select! {
            _ = tokio::time::sleep(remaining) => None,
            r = recv_any(&sockets, &mut buf) => Some(r),
        };

        let Some(len) = received else { break };

        let message = match Message::from_bytes(&buf[..len]) {
            Ok(m) => m,
            Err(e) => {
                trace!("dropping malformed datagram: {:?}", e);
                continue;
            }
        };

        if message.answers.is_empty() && message.additionals.is_empty() {
            continue;
        }

        for rr in message.answers.iter().chain(message.additionals.iter()) {
            correlator.fold(&rr.rdata, &rr.name);
        }

        for entry in correlator.ready_to_emit(&matcher) {
            entry.borrow_mut().sent = true;
            emitted.push(entry.borrow().clone());
        }
    }

    Ok(emitted)
}

/// Races a read across every socket the querier holds (both families'
/// multicast and unicast sockets), returning whichever arrives first.
async fn recv_any(sockets: &SocketSet, buf: &mut [u8]) -> usize {
    let v4_multicast = sockets.v4.as_ref().map(|f| &f.multicast);
    let v4_unicast = sockets.v4.as_ref().and_then(|f| f.unicast.as_ref());
    let v6_multicast = sockets.v6.as_ref().map(|f| &f.multicast);
    let v6_unicast = sockets.v6.as_ref().and_then(|f| f.unicast.as_ref());

    // split the buffer so the four branches can each hold an independent
    // mutable slice; only the branch that actually fires writes into its
    // own half, and we report that length back to the same backing array.
    let mut a = vec![0u8; buf.len()];
    let mut b = vec![0u8; buf.len()];
    let mut c = vec![0u8; buf.len()];
    let mut d = vec![0u8; buf.len()];

    let (len, data) = tokio::select! {
        r = recv_from_optional(v4_multicast, &mut a) => (r, a),
        r = recv_from_optional(v4_unicast, &mut b) => (r, b),
        r = recv_from_optional(v6_multicast, &mut c) => (r, c),
        r = recv_from_optional(v6_unicast, &mut d) => (r, d),
    };

    buf[..len].copy_from_slice(&data[..len]);
    len
}

async fn recv_from_optional(socket: Option<&UdpSocket>, buf: &mut [u8]) -> usize {
    match socket {
        Some(socket) => socket.recv(buf).await.unwrap_or(0),
        None => std::future::pending().await,
    }
}
