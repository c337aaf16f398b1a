//! Demonstration binary: browses for a DNS-SD service and prints every
//! instance discovered before the timeout elapses.
use log::debug;

use mdnslib::error::DNSResult;
use mdnslib::iface::SystemInterfaces;
use mdnslib::{query, QuerierConfig};

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

    let config = QuerierConfig {
        service: options.service.clone(),
        domain: options.domain.clone(),
        timeout: options.timeout,
        want_unicast_response: false,
        ..QuerierConfig::default()
    };

    let entries = query(config, &SystemInterfaces).await?;

    if entries.is_empty() {
        println!("no instances of {}.{} found", options.service, options.domain);
        return Ok(());
    }

    for entry in &entries {
        println!("{}", entry.name);
        if let Some(host) = &entry.host {
            println!("  host: {} port: {}", host, entry.port);
        }
        for addr in &entry.addrs_v4 {
            println!("  address: {}", addr);
        }
        for addr in &entry.addrs_v6 {
            println!("  address: {}", addr);
        }
        for field in &entry.info_fields {
            println!("  txt: {}", String::from_utf8_lossy(field));
        }
    }

    Ok(())
}
