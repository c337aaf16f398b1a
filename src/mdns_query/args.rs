//! Manage command line arguments here.
use std::time::Duration;

use clap::{App, Arg};

use mdnslib::error::{DNSError, DNSResult, InternalError};

/// This structure holds the command line arguments.
#[derive(Debug)]
pub struct CliOptions {
    pub service: String,
    pub domain: String,
    pub timeout: Duration,
    pub debug: bool,
}

impl CliOptions {
    pub fn options() -> DNSResult<Self> {
        let matches = App::new("mDNS/DNS-SD query")
            .version("0.1")
            .about("Browses for instances of a DNS-SD service on the local network")
            .arg(
                Arg::new("service")
                    .long("service")
                    .long_help("Service type to browse for, e.g. _puupee._tcp")
                    .takes_value(true)
                    .default_value("_puupee._tcp"),
            )
            .arg(
                Arg::new("domain")
                    .long("domain")
                    .long_help("Domain to browse in")
                    .takes_value(true)
                    .default_value("local"),
            )
            .arg(
                Arg::new("timeout")
                    .long("timeout")
                    .long_help("Seconds to wait for responses before giving up")
                    .takes_value(true)
                    .default_value("5"),
            )
            .arg(
                Arg::new("debug")
                    .long("debug")
                    .required(false)
                    .long_help("Verbose logging")
                    .takes_value(false),
            )
            .get_matches();

        let timeout_secs: u64 = matches.value_of("timeout").unwrap().parse().map_err(|_| {
            DNSError::DNSInternalError(InternalError::IllegalArgument(
                "timeout must be a whole number of seconds".to_string(),
            ))
        })?;

        Ok(CliOptions {
            service: matches.value_of("service").unwrap().to_string(),
            domain: matches.value_of("domain").unwrap().to_string(),
            timeout: Duration::from_secs(timeout_secs),
            debug: matches.is_present("debug")
                || std::env::var("MDNS_DEBUG").map(|v| v == "1").unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn default_timeout_is_five_seconds() {
        assert_eq!("5".parse::<u64>().unwrap(), 5);
    }
}
