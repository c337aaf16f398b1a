//! Network interface enumeration. Spec §1 treats this as an external
//! collaborator (an OS-provided listing of named interfaces and the
//! addresses they carry); the socket set depends on it only through
//! `InterfaceSource` so tests can drive it with a fixed list instead of the
//! host's real table (§4.D).
use std::net::IpAddr;

use crate::error::DNSResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub addr: IpAddr,
    pub is_loopback: bool,
}

pub trait InterfaceSource {
    fn interfaces(&self) -> DNSResult<Vec<Interface>>;
}

/// The real, OS-backed interface listing, built on `if_addrs`.
#[derive(Debug, Default)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self) -> DNSResult<Vec<Interface>> {
        let found = if_addrs::get_if_addrs()?;

        Ok(found
            .into_iter()
            .map(|iface| Interface {
                name: iface.name,
                addr: iface.ip(),
                is_loopback: iface.is_loopback(),
            })
            .collect())
    }
}

impl Interface {
    pub fn is_ipv4(&self) -> bool {
        self.addr.is_ipv4()
    }

    pub fn is_ipv6(&self) -> bool {
        self.addr.is_ipv6()
    }
}

/// A fixed list, used by tests in place of the host's real interfaces.
#[derive(Debug, Clone, Default)]
pub struct FixedInterfaces(pub Vec<Interface>);

impl InterfaceSource for FixedInterfaces {
    fn interfaces(&self) -> DNSResult<Vec<Interface>> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn fixed_interfaces_roundtrip_untouched() {
        let list = vec![Interface {
            name: "eth0".to_string(),
            addr: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)),
            is_loopback: false,
        }];
        let source = FixedInterfaces(list.clone());
        assert_eq!(source.interfaces().unwrap(), list);
    }

    #[test]
    fn loopback_and_family_helpers() {
        let iface = Interface {
            name: "lo".to_string(),
            addr: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            is_loopback: true,
        };
        assert!(iface.is_loopback);
        assert!(iface.is_ipv4());
        assert!(!iface.is_ipv6());
    }
}
