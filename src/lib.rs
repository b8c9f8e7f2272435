//! tipc-net
//!
//! Stream sockets for the TIPC address family: service/instance address
//! parsing, the `sockaddr_tipc` wire layout, and connection/listener types
//! that plug into a transport-agnostic [`net::Conn`] / [`net::Listener`] API.

pub mod net;
