//! Responder state machine (§4.E): `Stopped -> Running -> Stopped`,
//! answering inbound queries from the configured `Zone` and splitting
//! answers between multicast and unicast delivery by the QU bit.
use std::net::SocketAddr;

use log::{debug, trace, warn};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

use crate::error::{DNSError, DNSResult, InternalError};
use crate::iface::InterfaceSource;
use crate::message::Message;
use crate::rfc1035::{Flags, Header, OpCode, PacketType, ResponseCode};
use crate::socket::{multicast_addr_v4, multicast_addr_v6, FamilySockets, SocketSet, SocketSetConfig};
use crate::zone::Zone;

const RECV_BUFFER_SIZE: usize = 9000;

enum State {
    Stopped,
    Running { shutdown: oneshot::Sender<()> },
}

pub struct Responder<Z: Zone> {
    zone: Z,
    config: SocketSetConfig,
    state: State,
}

impl<Z: Zone + Clone + Send + 'static> Responder<Z> {
    pub fn new(zone: Z, config: SocketSetConfig) -> Self {
        Responder {
            zone,
            config,
            state: State::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    /// Binds the socket set and spawns the read loop as a background task.
    pub async fn start(&mut self, interfaces: &dyn InterfaceSource) -> DNSResult<()> {
        if self.is_running() {
            return Err(DNSError::DNSInternalError(InternalError::AlreadyRunning));
        }

        let sockets = SocketSet::bind_responder(&self.config, interfaces)?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let zone = self.zone.clone();

        tokio::spawn(run_loop(sockets, zone, shutdown_rx));

        self.state = State::Running {
            shutdown: shutdown_tx,
        };
        Ok(())
    }

    pub fn stop(&mut self) {
        if let State::Running { shutdown } = std::mem::replace(&mut self.state, State::Stopped) {
            let _ = shutdown.send(());
        }
    }
}

async fn run_loop(sockets: SocketSet, zone: impl Zone, mut shutdown: oneshot::Receiver<()>) {
    let mut buf_v4 = vec![0u8; RECV_BUFFER_SIZE];
    let mut buf_v6 = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("responder stopping");
                break;
            }
            result = recv_or_pending(sockets.v4.as_ref().map(|f| &f.multicast), &mut buf_v4) => {
                if let Some((len, from)) = result {
                    handle_datagram(&buf_v4[..len], from, sockets.v4.as_ref(), multicast_addr_v4(), &zone).await;
                }
            }
            result = recv_or_pending(sockets.v6.as_ref().map(|f| &f.multicast), &mut buf_v6) => {
                if let Some((len, from)) = result {
                    handle_datagram(&buf_v6[..len], from, sockets.v6.as_ref(), multicast_addr_v6(), &zone).await;
                }
            }
        }
    }
}

async fn recv_or_pending(
    socket: Option<&UdpSocket>,
    buf: &mut [u8],
) -> Option<(usize, SocketAddr)> {
    match socket {
        Some(socket) => socket.recv_from(buf).await.ok(),
        None => std::future::pending().await,
    }
}

async fn handle_datagram(
    data: &[u8],
    from: SocketAddr,
    sockets: Option<&FamilySockets>,
    group_addr: SocketAddr,
    zone: &impl Zone,
) {
    let sockets = match sockets {
        Some(s) => s,
        None => return,
    };

    let query = match Message::from_bytes(data) {
        Ok(m) => m,
        Err(e) => {
            trace!("dropping malformed datagram from {}: {:?}", from, e);
            return;
        }
    };

    if query.header.flags.qr == PacketType::Response {
        trace!("ignoring response-flagged datagram from {}", from);
        return;
    }
    if query.header.flags.opcode != OpCode::Query || query.header.flags.rcode != ResponseCode::NoError
    {
        trace!("ignoring non-standard query from {}", from);
        return;
    }

    let mut multicast_answer = Message::new(response_header(0));
    let mut unicast_answer = Message::new(response_header(query.header.id));

    for question in &query.questions {
        let zone_answer = zone.records(&question.qname, question.qtype);
        if zone_answer.is_empty() {
            continue;
        }

        let target = if question.qclass.flag() {
            &mut unicast_answer
        } else {
            &mut multicast_answer
        };

        for rr in zone_answer.answers {
            target.push_answer(rr);
        }
        for rr in zone_answer.additionals {
            target.push_additional(rr);
        }
    }

    if multicast_answer.header.an_count > 0 {
        if let Ok(bytes) = multicast_answer.to_bytes() {
            if let Err(e) = sockets.send_multicast(&bytes, group_addr).await {
                warn!("failed to send multicast response: {}", e);
            }
        }
    }

    if unicast_answer.header.an_count > 0 {
        if let Ok(bytes) = unicast_answer.to_bytes() {
            if let Err(e) = sockets.multicast.send_to(&bytes, from).await {
                warn!("failed to send unicast response to {}: {}", from, e);
            }
        }
    }
}

fn response_header(id: u16) -> Header {
    Header {
        id,
        flags: Flags {
            qr: PacketType::Response,
            authoritative: true,
            ..Default::default()
        },
        qd_count: 0,
        an_count: 0,
        ns_count: 0,
        ar_count: 0,
    }
}
