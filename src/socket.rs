//! Socket set: binds the multicast and unicast sockets for each enabled
//! address family and joins the mDNS multicast groups (§4.D). Built on
//! `socket2` for the options `tokio::net::UdpSocket` doesn't expose
//! (multicast join, hop limit, SO_REUSEPORT), then handed off to tokio for
//! the actual async I/O, the same bridging the donor pack's own mDNS code
//! uses to get a tokio socket out of a socket2 one.
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use log::{debug, warn};
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tokio::net::UdpSocket;

use crate::error::{DNSError, DNSResult, InternalError};
use crate::iface::{Interface, InterfaceSource};

pub const MDNS_PORT: u16 = 5353;
pub const MDNS_GROUP_V4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
pub const MDNS_GROUP_V6: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb);

#[derive(Debug, Clone)]
pub struct SocketSetConfig {
    pub reuse_addr: bool,
    pub reuse_port: bool,
    pub multicast_hops: u32,
    pub join_multicast_on_all_interfaces: bool,
    pub network_interface: Option<String>,
    pub want_unicast_response: bool,
    pub disable_ipv4: bool,
    pub disable_ipv6: bool,
}

impl Default for SocketSetConfig {
    fn default() -> Self {
        SocketSetConfig {
            reuse_addr: true,
            reuse_port: false,
            multicast_hops: 1,
            join_multicast_on_all_interfaces: true,
            network_interface: None,
            want_unicast_response: false,
            disable_ipv4: false,
            disable_ipv6: false,
        }
    }
}

/// The pair of sockets for one address family: a shared multicast socket
/// bound to port 5353, plus (querier-only) a unicast socket on an ephemeral
/// port bound for outbound selection on a specific interface.
pub struct FamilySockets {
    pub multicast: UdpSocket,
    pub unicast: Option<UdpSocket>,
    pub joined_interfaces: Vec<Interface>,
}

impl FamilySockets {
    /// Sends one datagram to `group`, per §4.D's "rotate the outbound
    /// interface" rule: one send per joined interface for IPv4, where
    /// `IP_MULTICAST_IF` can be set per-send without owning the socket.
    /// IPv6 has no such per-send selector available here (`if_addrs`
    /// doesn't surface scope ids, see `interface_scope_id`), so it sends
    /// once on whatever interface the OS already joined the socket on.
    pub async fn send_multicast(&self, bytes: &[u8], group: SocketAddr) -> DNSResult<()> {
        if self.joined_interfaces.is_empty() {
            self.multicast.send_to(bytes, group).await?;
            return Ok(());
        }

        let v4_interfaces: Vec<Ipv4Addr> = self
            .joined_interfaces
            .iter()
            .filter_map(|iface| match iface.addr {
                IpAddr::V4(addr) => Some(addr),
                IpAddr::V6(_) => None,
            })
            .collect();

        if group.is_ipv4() && !v4_interfaces.is_empty() {
            let sock_ref = SockRef::from(&self.multicast);
            for addr in v4_interfaces {
                if let Err(e) = sock_ref.set_multicast_if_v4(&addr) {
                    warn!("failed to select outbound interface {}: {}", addr, e);
                    continue;
                }
                self.multicast.send_to(bytes, group).await?;
            }
            return Ok(());
        }

        self.multicast.send_to(bytes, group).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct SocketSet {
    pub v4: Option<FamilySockets>,
    pub v6: Option<FamilySockets>,
}

impl SocketSet {
    /// Builds a socket set suitable for the responder: multicast sockets
    /// only, no unicast sockets (the responder answers unicast queries by
    /// sending back out the socket the query arrived on).
    pub fn bind_responder(
        config: &SocketSetConfig,
        interfaces: &dyn InterfaceSource,
    ) -> DNSResult<Self> {
        Self::bind(config, interfaces, false)
    }

    /// Builds a socket set suitable for the querier: both multicast and
    /// unicast sockets per family, since the querier both sends the
    /// initial multicast query and may receive unicast replies.
    pub fn bind_querier(config: &SocketSetConfig, interfaces: &dyn InterfaceSource) -> DNSResult<Self> {
        Self::bind(config, interfaces, true)
    }

    fn bind(
        config: &SocketSetConfig,
        interfaces: &dyn InterfaceSource,
        need_unicast: bool,
    ) -> DNSResult<Self> {
        let all_interfaces = interfaces.interfaces()?;

        let v4 = if config.disable_ipv4 {
            None
        } else {
            bind_family_v4(config, &all_interfaces, need_unicast).unwrap_or_else(|e| {
                warn!("ipv4 socket set unavailable: {}", e);
                None
            })
        };

        let v6 = if config.disable_ipv6 {
            None
        } else {
            bind_family_v6(config, &all_interfaces, need_unicast).unwrap_or_else(|e| {
                warn!("ipv6 socket set unavailable: {}", e);
                None
            })
        };

        if v4.is_none() && v6.is_none() {
            return Err(DNSError::DNSInternalError(InternalError::NoUsableSocket));
        }

        Ok(SocketSet { v4, v6 })
    }
}

fn selected_interfaces<'a>(
    config: &SocketSetConfig,
    all: &'a [Interface],
    want_v4: bool,
) -> Vec<&'a Interface> {
    all.iter()
        .filter(|iface| !iface.is_loopback)
        .filter(|iface| if want_v4 { iface.is_ipv4() } else { iface.is_ipv6() })
        .filter(|iface| match &config.network_interface {
            Some(name) => &iface.name == name,
            None => true,
        })
        .collect()
}

fn bind_family_v4(
    config: &SocketSetConfig,
    all_interfaces: &[Interface],
    need_unicast: bool,
) -> DNSResult<Option<FamilySockets>> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;

    socket
        .set_reuse_address(config.reuse_addr)
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;
    #[cfg(unix)]
    socket
        .set_reuse_port(config.reuse_port)
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;
    socket
        .set_multicast_ttl_v4(config.multicast_hops)
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;
    socket
        .set_nonblocking(true)
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, MDNS_PORT);
    socket
        .bind(&bind_addr.into())
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;

    let candidates = selected_interfaces(config, all_interfaces, true);
    let mut joined = Vec::new();

    for iface in &candidates {
        let addr = match iface.addr {
            std::net::IpAddr::V4(addr) => addr,
            std::net::IpAddr::V6(_) => continue,
        };
        match socket.join_multicast_v4(&MDNS_GROUP_V4, &addr) {
            Ok(()) => joined.push((*iface).clone()),
            Err(e) => warn!(
                "multicast join failed on interface {}: {}",
                iface.name, e
            ),
        }
        if !config.join_multicast_on_all_interfaces {
            break;
        }
    }

    if joined.is_empty() {
        // last resort: join on the OS default interface.
        match socket.join_multicast_v4(&MDNS_GROUP_V4, &Ipv4Addr::UNSPECIFIED) {
            Ok(()) => debug!("joined ipv4 multicast group on default interface"),
            Err(_) => {
                return Err(DNSError::DNSInternalError(
                    InternalError::MulticastJoinFailed("ipv4/all".to_string()),
                ))
            }
        }
    }

    let std_socket: std::net::UdpSocket = socket.into();
    let multicast = UdpSocket::from_std(std_socket)?;

    let unicast = if need_unicast {
        Some(bind_unicast_v4(config, all_interfaces)?)
    } else {
        None
    };

    if need_unicast && unicast.is_none() {
        return Ok(None);
    }

    Ok(Some(FamilySockets {
        multicast,
        unicast,
        joined_interfaces: joined,
    }))
}

fn bind_unicast_v4(
    config: &SocketSetConfig,
    all_interfaces: &[Interface],
) -> DNSResult<UdpSocket> {
    let bind_ip = selected_interfaces(config, all_interfaces, true)
        .first()
        .map(|iface| match iface.addr {
            std::net::IpAddr::V4(v4) => v4,
            _ => Ipv4Addr::UNSPECIFIED,
        })
        .unwrap_or(Ipv4Addr::UNSPECIFIED);

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;
    socket
        .set_nonblocking(true)
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;
    socket
        .bind(&SocketAddrV4::new(bind_ip, 0).into())
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;

    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}

fn bind_family_v6(
    config: &SocketSetConfig,
    all_interfaces: &[Interface],
    need_unicast: bool,
) -> DNSResult<Option<FamilySockets>> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;

    socket
        .set_reuse_address(config.reuse_addr)
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;
    #[cfg(unix)]
    socket
        .set_reuse_port(config.reuse_port)
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;
    socket
        .set_multicast_hops_v6(config.multicast_hops)
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;
    socket
        .set_only_v6(true)
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;
    socket
        .set_nonblocking(true)
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;

    let bind_addr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, MDNS_PORT, 0, 0);
    socket
        .bind(&bind_addr.into())
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;

    let candidates = selected_interfaces(config, all_interfaces, false);
    let mut joined = Vec::new();

    for iface in &candidates {
        let scope_id = interface_scope_id(&iface.name).unwrap_or(0);
        match socket.join_multicast_v6(&MDNS_GROUP_V6, scope_id) {
            Ok(()) => joined.push((*iface).clone()),
            Err(e) => warn!(
                "multicast join failed on interface {}: {}",
                iface.name, e
            ),
        }
        if !config.join_multicast_on_all_interfaces {
            break;
        }
    }

    if joined.is_empty() {
        match socket.join_multicast_v6(&MDNS_GROUP_V6, 0) {
            Ok(()) => debug!("joined ipv6 multicast group on default interface"),
            Err(_) => {
                return Err(DNSError::DNSInternalError(
                    InternalError::MulticastJoinFailed("ipv6/all".to_string()),
                ))
            }
        }
    }

    let std_socket: std::net::UdpSocket = socket.into();
    let multicast = UdpSocket::from_std(std_socket)?;

    let unicast = if need_unicast {
        Some(bind_unicast_v6()?)
    } else {
        None
    };

    if need_unicast && unicast.is_none() {
        return Ok(None);
    }

    Ok(Some(FamilySockets {
        multicast,
        unicast,
        joined_interfaces: joined,
    }))
}

fn bind_unicast_v6() -> DNSResult<UdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;
    socket
        .set_nonblocking(true)
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;
    socket
        .bind(&SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0).into())
        .map_err(|_| DNSError::DNSInternalError(InternalError::SocketBindFailed))?;

    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}

/// Best-effort interface-name -> scope-id lookup for IPv6 multicast joins.
/// `if_addrs` does not surface the scope id; we fall back to 0 (default
/// zone) when it can't be resolved, which still works on most single-homed
/// hosts.
fn interface_scope_id(_name: &str) -> Option<u32> {
    None
}

pub fn multicast_addr_v4() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(MDNS_GROUP_V4, MDNS_PORT))
}

pub fn multicast_addr_v6() -> SocketAddr {
    SocketAddr::V6(SocketAddrV6::new(MDNS_GROUP_V6, MDNS_PORT, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iface::FixedInterfaces;
    use std::net::IpAddr;

    #[test]
    fn both_families_disabled_yields_no_usable_socket() {
        let config = SocketSetConfig {
            disable_ipv4: true,
            disable_ipv6: true,
            ..Default::default()
        };
        let interfaces = FixedInterfaces(vec![]);
        let result = SocketSet::bind_responder(&config, &interfaces);
        assert!(result.is_err());
    }

    #[test]
    fn selected_interfaces_filters_loopback_and_family() {
        let interfaces = vec![
            Interface {
                name: "lo".to_string(),
                addr: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
                is_loopback: true,
            },
            Interface {
                name: "eth0".to_string(),
                addr: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5)),
                is_loopback: false,
            },
            Interface {
                name: "eth0".to_string(),
                addr: IpAddr::V6(Ipv6Addr::LOCALHOST),
                is_loopback: false,
            },
        ];

        let config = SocketSetConfig::default();
        let selected = selected_interfaces(&config, &interfaces, true);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "eth0");
    }
}
