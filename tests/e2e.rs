//! End-to-end scenarios (ambient-stack test tooling, real loopback UDP
//! sockets): a responder and a querier talk to each other over the
//! loopback interface exactly as they would over a real network.
//!
//! `FixedInterfaces` hands the socket set a loopback address tagged
//! `is_loopback: false` so the normal "skip loopback" filter doesn't
//! exclude it -- on Linux `lo` is multicast-capable, so joining
//! 224.0.0.251 against 127.0.0.1 works the same way it would against a
//! real NIC address.
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use mdnslib::iface::{FixedInterfaces, Interface};
use mdnslib::name::DomainName;
use mdnslib::{query, MDNSService, QuerierConfig, Responder, SocketSetConfig};

fn loopback_v4(name: &str) -> FixedInterfaces {
    FixedInterfaces(vec![Interface {
        name: name.to_string(),
        addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        is_loopback: false,
    }])
}

fn loopback_dual_stack(name: &str) -> FixedInterfaces {
    FixedInterfaces(vec![
        Interface {
            name: name.to_string(),
            addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            is_loopback: false,
        },
        Interface {
            name: name.to_string(),
            addr: IpAddr::V6(Ipv6Addr::LOCALHOST),
            is_loopback: false,
        },
    ])
}

fn v4_only_config() -> SocketSetConfig {
    SocketSetConfig {
        disable_ipv6: true,
        ..SocketSetConfig::default()
    }
}

#[tokio::test]
async fn happy_path_ptr_discovery() {
    let service = MDNSService::new(
        "Dart Test Server",
        "_e2ehappy._tcp",
        DomainName::try_from("host-e2ehappy.local").unwrap(),
        12056,
        vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 5))],
        vec![b"path=/api".to_vec()],
    );

    let mut responder = Responder::new(service, v4_only_config());
    responder
        .start(&loopback_v4("lo"))
        .await
        .expect("responder should bind on loopback");

    let config = QuerierConfig {
        service: "_e2ehappy._tcp".to_string(),
        timeout: Duration::from_millis(800),
        socket: v4_only_config(),
        ..QuerierConfig::default()
    };
    let entries = query(config, &loopback_v4("lo")).await.unwrap();

    responder.stop();

    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(
        entry.name,
        DomainName::try_from("Dart Test Server._e2ehappy._tcp.local").unwrap()
    );
    assert_eq!(
        entry.host,
        Some(DomainName::try_from("host-e2ehappy.local").unwrap())
    );
    assert_eq!(entry.port, 12056);
    assert_eq!(entry.addrs_v4, vec![Ipv4Addr::new(192, 0, 2, 5)]);
    assert_eq!(entry.info_fields, vec![b"path=/api".to_vec()]);
}

#[tokio::test]
async fn unicast_response_reaches_the_querier() {
    let service = MDNSService::new(
        "Dart Test Server",
        "_e2eunicast._tcp",
        DomainName::try_from("host-e2eunicast.local").unwrap(),
        12057,
        vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 6))],
        vec![b"path=/api".to_vec()],
    );

    let mut responder = Responder::new(service, v4_only_config());
    responder.start(&loopback_v4("lo")).await.unwrap();

    let config = QuerierConfig {
        service: "_e2eunicast._tcp".to_string(),
        timeout: Duration::from_millis(800),
        want_unicast_response: true,
        socket: v4_only_config(),
        ..QuerierConfig::default()
    };
    let entries = query(config, &loopback_v4("lo")).await.unwrap();

    responder.stop();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].port, 12057);
}

#[tokio::test]
async fn dual_stack_addresses_both_land_on_one_entry() {
    let service = MDNSService::new(
        "Dart Test Server",
        "_e2edual._tcp",
        DomainName::try_from("host-e2edual.local").unwrap(),
        12058,
        vec![
            IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7)),
            IpAddr::V6("2001:db8::5".parse().unwrap()),
        ],
        vec![b"path=/api".to_vec()],
    );

    let mut responder = Responder::new(service, SocketSetConfig::default());
    responder.start(&loopback_dual_stack("lo")).await.unwrap();

    let config = QuerierConfig {
        service: "_e2edual._tcp".to_string(),
        timeout: Duration::from_millis(800),
        ..QuerierConfig::default()
    };
    let entries = query(config, &loopback_dual_stack("lo")).await.unwrap();

    responder.stop();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].addrs_v4, vec![Ipv4Addr::new(192, 0, 2, 7)]);
    assert_eq!(
        entries[0].addrs_v6,
        vec!["2001:db8::5".parse::<Ipv6Addr>().unwrap()]
    );
}

#[tokio::test]
async fn address_propagates_across_instances_sharing_a_hostname() {
    let hostname = DomainName::try_from("host-e2eshared.local").unwrap();
    let addr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 8));

    let service_a = MDNSService::new(
        "Instance A",
        "_e2eshared._tcp",
        hostname.clone(),
        1001,
        vec![addr],
        vec![b"k=a".to_vec()],
    );
    let service_b = MDNSService::new(
        "Instance B",
        "_e2eshared._tcp",
        hostname,
        1002,
        vec![addr],
        vec![b"k=b".to_vec()],
    );

    let mut responder_a = Responder::new(service_a, v4_only_config());
    let mut responder_b = Responder::new(service_b, v4_only_config());
    responder_a.start(&loopback_v4("lo")).await.unwrap();
    responder_b.start(&loopback_v4("lo")).await.unwrap();

    let config = QuerierConfig {
        service: "_e2eshared._tcp".to_string(),
        timeout: Duration::from_millis(800),
        socket: v4_only_config(),
        ..QuerierConfig::default()
    };
    let mut entries = query(config, &loopback_v4("lo")).await.unwrap();

    responder_a.stop();
    responder_b.stop();

    entries.sort_by_key(|e| e.port);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].addrs_v4, vec![Ipv4Addr::new(192, 0, 2, 8)]);
    assert_eq!(entries[1].addrs_v4, vec![Ipv4Addr::new(192, 0, 2, 8)]);
}

#[tokio::test]
async fn interleaved_garbage_and_unrelated_traffic_is_ignored() {
    use mdnslib::name::DomainName as Name;
    use mdnslib::records::{RData, ResourceRecord};
    use mdnslib::rfc1035::{ClassField, Flags, Header, PacketType};
    use mdnslib::socket::multicast_addr_v4;
    use tokio::net::UdpSocket;

    let service = MDNSService::new(
        "Dart Test Server",
        "_e2ewanted._tcp",
        DomainName::try_from("host-e2ewanted.local").unwrap(),
        12059,
        vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 9))],
        vec![b"path=/api".to_vec()],
    );
    let mut responder = Responder::new(service, v4_only_config());
    responder.start(&loopback_v4("lo")).await.unwrap();

    let noise = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;

        let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sock.connect(multicast_addr_v4()).await.unwrap();

        // a truncated, unparseable datagram.
        let _ = sock.send(&[0xAA, 0xBB, 0xCC]).await;

        // a well-formed response, but for a service nobody asked about.
        let mut header = Header::default();
        header.flags = Flags {
            qr: PacketType::Response,
            authoritative: true,
            ..Default::default()
        };
        let mut msg = mdnslib::message::Message::new(header);
        msg.push_answer(ResourceRecord::new(
            Name::try_from("_unrelated._tcp.local").unwrap(),
            ClassField::new(ClassField::IN),
            4500,
            RData::Ptr(Name::try_from("Other Thing._unrelated._tcp.local").unwrap()),
        ));
        let bytes = msg.to_bytes().unwrap();
        let _ = sock.send(&bytes).await;
    });

    let config = QuerierConfig {
        service: "_e2ewanted._tcp".to_string(),
        timeout: Duration::from_millis(800),
        socket: v4_only_config(),
        ..QuerierConfig::default()
    };
    let entries = query(config, &loopback_v4("lo")).await.unwrap();

    responder.stop();
    noise.await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].port, 12059);
}

#[tokio::test]
async fn timeout_without_responders_returns_promptly() {
    let config = QuerierConfig {
        service: "_e2enobody._tcp".to_string(),
        timeout: Duration::from_millis(200),
        socket: v4_only_config(),
        ..QuerierConfig::default()
    };

    let started = tokio::time::Instant::now();
    let entries = query(config, &loopback_v4("lo")).await.unwrap();
    let elapsed = started.elapsed();

    assert!(entries.is_empty());
    assert!(elapsed < Duration::from_millis(400), "took {:?}", elapsed);
}
