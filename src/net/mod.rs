//! Network utilities for TIPC stream sockets
//!
//! This module provides idiomatic Rust interfaces for the TIPC address
//! family: textual service address parsing, the `sockaddr_tipc` wire
//! layout, and stream connections/listeners that can be used through the
//! transport-agnostic [`Conn`], [`Listener`] and [`Addr`] traits.

pub mod addr;
pub mod conn;
pub mod family;
pub mod poll;
pub mod resolver;
pub mod sockaddr;
pub mod tipc;

use std::io;

pub use addr::{AddrType, Scope, TipcAddr};
pub use conn::{Addr, Conn, Listener, TcpConn};
pub use resolver::{
    join_service_instance, join_service_instance_range, resolve_tipc_addr, AddressParser,
};
pub use sockaddr::{sockaddr_to_tipc, RawSockaddr};
pub use tipc::{dial_tipc, listen_tipc, TipcConn, TipcDialer, TipcListener, TipcListenerBuilder};

/// Result type for network operations
pub type Result<T> = std::result::Result<T, Error>;

/// Network operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A system call failed; the OS error is passed through untouched.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unknown network {0}")]
    UnknownNetwork(String),

    #[error("malformed address: {0}")]
    MalformedAddress(String),

    #[error("missing address")]
    MissingAddress,

    /// The connection or listener was closed or never set up.
    #[error("invalid descriptor")]
    InvalidDescriptor,

    #[error("i/o timeout")]
    Timeout,

    /// An error annotated with the operation, network and address that
    /// produced it.
    #[error("{op} {net} {addr}: {source}")]
    Op {
        op: &'static str,
        net: String,
        addr: String,
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn op(
        op: &'static str,
        net: &str,
        addr: Option<&TipcAddr>,
        err: impl Into<Error>,
    ) -> Self {
        Error::Op {
            op,
            net: net.to_string(),
            addr: TipcAddr::describe(addr),
            source: Box::new(err.into()),
        }
    }

    /// The innermost error, with all [`Error::Op`] context stripped.
    pub fn cause(&self) -> &Error {
        match self {
            Error::Op { source, .. } => source.cause(),
            other => other,
        }
    }

    /// Whether the error is a deadline expiry rather than a failure.
    pub fn is_timeout(&self) -> bool {
        match self.cause() {
            Error::Timeout => true,
            Error::Io(err) => err.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self.cause() {
            Error::Io(err) => err.kind(),
            Error::Timeout => io::ErrorKind::TimedOut,
            Error::InvalidDescriptor => io::ErrorKind::NotConnected,
            Error::UnknownNetwork(_) | Error::MalformedAddress(_) | Error::MissingAddress => {
                io::ErrorKind::InvalidInput
            }
            Error::Op { .. } => io::ErrorKind::Other,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            other => io::Error::new(other.io_kind(), other),
        }
    }
}
