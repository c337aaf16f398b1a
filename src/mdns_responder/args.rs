//! Manage command line arguments here.
use clap::{App, Arg};

use mdnslib::error::{DNSError, DNSResult, InternalError};

/// This structure holds the command line arguments.
#[derive(Debug, Default)]
pub struct CliOptions {
    pub service: String,
    pub port: u16,
    pub name: String,
    pub debug: bool,
}

impl CliOptions {
    pub fn options() -> DNSResult<Self> {
        let matches = App::new("mDNS/DNS-SD responder")
            .version("0.1")
            .about("Advertises a local service via mDNS and DNS-SD")
            .arg(
                Arg::new("service")
                    .long("service")
                    .long_help("Service type, e.g. _puupee._tcp")
                    .takes_value(true)
                    .default_value("_puupee._tcp"),
            )
            .arg(
                Arg::new("port")
                    .long("port")
                    .long_help("Port the advertised service listens on")
                    .takes_value(true)
                    .default_value("12056"),
            )
            .arg(
                Arg::new("name")
                    .long("name")
                    .long_help("Instance name advertised for the service")
                    .takes_value(true)
                    .default_value("Dart Test Server"),
            )
            .arg(
                Arg::new("debug")
                    .long("debug")
                    .required(false)
                    .long_help("Verbose logging")
                    .takes_value(false),
            )
            .get_matches();

        let mut options = CliOptions::default();
        options.service = matches.value_of("service").unwrap().to_string();
        options.name = matches.value_of("name").unwrap().to_string();
        options.port = matches.value_of("port").unwrap().parse().map_err(|_| {
            DNSError::DNSInternalError(InternalError::IllegalArgument(
                "port must be a valid u16".to_string(),
            ))
        })?;
        options.debug = matches.is_present("debug")
            || std::env::var("MDNS_DEBUG").map(|v| v == "1").unwrap_or(false);

        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_without_args() {
        // CliOptions::options() reads real argv, so only the default
        // literals it falls back to are exercised here directly.
        assert_eq!("12056".parse::<u16>().unwrap(), 12056);
    }
}
