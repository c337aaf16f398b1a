//! A dedicated error for all possible errors in DNS queries: I/O, DNS packet
//! inconsistencies, socket setup, responder/querier state, etc.
use std::fmt;
use std::io;
use std::str;

#[derive(Debug)]
pub enum DNSError {
    Io(io::Error),
    FromUtf8(std::string::FromUtf8Error),
    Utf8(str::Utf8Error),
    LoggerError(log::SetLoggerError),
    DNS(String),
    DNSInternalError(InternalError),
}

#[derive(Debug)]
pub enum InternalError {
    DnsDomainNameTooLong,
    EmptyDomainName,
    LabelTooLong,
    MalformedMessage,
    /// A name's compression pointer either chased more than
    /// [`crate::name::MAX_POINTER_CHASES`] hops, pointed forward into
    /// unparsed data, or was missing its terminator.
    MalformedName,
    SocketBindFailed,
    /// A single interface's multicast join failed. Carries the interface
    /// name purely for logging; this variant is always non-fatal on its own.
    MulticastJoinFailed(String),
    NoUsableSocket,
    SendFailed,
    AlreadyRunning,
    IllegalArgument(String),
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalError::DnsDomainNameTooLong => write!(f, "domain name exceeds 255 bytes"),
            InternalError::EmptyDomainName => write!(f, "domain name is empty"),
            InternalError::LabelTooLong => write!(f, "a label exceeds 63 bytes"),
            InternalError::MalformedMessage => write!(f, "malformed DNS message"),
            InternalError::MalformedName => write!(f, "malformed domain name"),
            InternalError::SocketBindFailed => write!(f, "socket bind failed"),
            InternalError::MulticastJoinFailed(iface) => {
                write!(f, "multicast join failed on interface {}", iface)
            }
            InternalError::NoUsableSocket => write!(f, "no usable socket for any address family"),
            InternalError::SendFailed => write!(f, "send failed on every address family"),
            InternalError::AlreadyRunning => write!(f, "responder is already running"),
            InternalError::IllegalArgument(msg) => write!(f, "illegal argument: {}", msg),
        }
    }
}

impl DNSError {
    // Helper function to create a new DNS error from a string
    pub fn new(s: &str) -> Self {
        DNSError::DNS(String::from(s))
    }

    pub fn malformed_name() -> Self {
        DNSError::DNSInternalError(InternalError::MalformedName)
    }
}

/// A specific custom `Result` for all functions
pub type DNSResult<T> = Result<T, DNSError>;

// All conversions for internal errors into DNSError
impl From<io::Error> for DNSError {
    fn from(err: io::Error) -> Self {
        DNSError::Io(err)
    }
}

impl From<String> for DNSError {
    fn from(err: String) -> Self {
        DNSError::DNS(err)
    }
}

impl From<std::string::FromUtf8Error> for DNSError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        DNSError::FromUtf8(err)
    }
}

impl From<str::Utf8Error> for DNSError {
    fn from(err: str::Utf8Error) -> Self {
        DNSError::Utf8(err)
    }
}

impl From<log::SetLoggerError> for DNSError {
    fn from(err: log::SetLoggerError) -> Self {
        DNSError::LoggerError(err)
    }
}
