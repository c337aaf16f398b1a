//! Demonstration binary: advertises one DNS-SD service over mDNS until
//! interrupted.
use std::net::IpAddr;

use log::{debug, info};

use mdnslib::error::DNSResult;
use mdnslib::iface::{InterfaceSource, SystemInterfaces};
use mdnslib::name::DomainName;
use mdnslib::{MDNSService, Responder, SocketSetConfig};

mod args;
use args::CliOptions;

#[tokio::main]
async fn main() -> DNSResult<()> {
    pretty_env_logger::init();

    let options = match CliOptions::options() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("argument error: {:?}", e);
            std::process::exit(1);
        }
    };
    debug!("options: {:?}", &options);

    let hostname = DomainName::try_from("host.local")?;
    let addresses: Vec<IpAddr> = SystemInterfaces
        .interfaces()
        .map(|v| v.into_iter().filter(|i| !i.is_loopback).map(|i| i.addr).collect())
        .unwrap_or_default();

    let service = MDNSService::new(
        options.name.clone(),
        options.service.clone(),
        hostname,
        options.port,
        addresses,
        vec![b"txtvers=1".to_vec()],
    );

    let mut responder = Responder::new(service, SocketSetConfig::default());
    responder.start(&SystemInterfaces).await?;
    info!(
        "advertising {}.{} on port {}",
        options.name, options.service, options.port
    );

    tokio::signal::ctrl_c().await.ok();
    responder.stop();

    Ok(())
}
